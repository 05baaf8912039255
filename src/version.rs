//! Firmware version parsing and the update decision gate.
//!
//! Versions are `major.minor.patch` triples of non-negative integers,
//! ordered lexicographically on the triple.  A malformed version string
//! is a typed parse error, never a silent zero.

use core::fmt;
use core::str::FromStr;

// ───────────────────────────────────────────────────────────────
// Version
// ───────────────────────────────────────────────────────────────

/// A `major.minor.patch` firmware version.
///
/// `Ord` compares major, then minor, then patch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Version {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl Version {
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Errors from parsing a version string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionParseError {
    /// Fewer than three dot-separated fields.
    MissingField,
    /// More than three dot-separated fields.
    ExtraField,
    /// A field is empty, non-numeric, or overflows `u32`.
    InvalidNumber,
}

impl fmt::Display for VersionParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingField => write!(f, "expected major.minor.patch"),
            Self::ExtraField => write!(f, "trailing fields after patch"),
            Self::InvalidNumber => write!(f, "field is not a valid number"),
        }
    }
}

impl FromStr for Version {
    type Err = VersionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut fields = s.split('.');
        let mut next = || -> Result<u32, VersionParseError> {
            fields
                .next()
                .ok_or(VersionParseError::MissingField)?
                .parse::<u32>()
                .map_err(|_| VersionParseError::InvalidNumber)
        };
        let major = next()?;
        let minor = next()?;
        let patch = next()?;
        if fields.next().is_some() {
            return Err(VersionParseError::ExtraField);
        }
        Ok(Self {
            major,
            minor,
            patch,
        })
    }
}

// ───────────────────────────────────────────────────────────────
// Comparison + decision gate
// ───────────────────────────────────────────────────────────────

/// Result of comparing an installed version against a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    /// The subject is older than the target.
    Older,
    /// The subject is newer than the target.
    Newer,
    /// Equal triples.
    Equal,
}

/// Compare `subject` (currently installed) against `target` (reported by
/// the update service), major first, then minor, then patch.
pub fn compare(subject: &Version, target: &Version) -> Relation {
    use core::cmp::Ordering;
    match subject.cmp(target) {
        Ordering::Less => Relation::Older,
        Ordering::Greater => Relation::Newer,
        Ordering::Equal => Relation::Equal,
    }
}

/// Decision policy consumed by the OTA engine.
///
/// An update proceeds iff the installed version is older than the one the
/// service reports, or no local version record exists at all (first boot
/// updates unconditionally).
pub fn update_required(installed: Option<&Version>, available: &Version) -> bool {
    match installed {
        None => true,
        Some(current) => compare(current, available) == Relation::Older,
    }
}

// ───────────────────────────────────────────────────────────────
// Tests
// ───────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_triple() {
        let v: Version = "1.2.3".parse().unwrap();
        assert_eq!(v, Version::new(1, 2, 3));
    }

    #[test]
    fn rejects_two_fields() {
        assert_eq!(
            "1.2".parse::<Version>(),
            Err(VersionParseError::MissingField)
        );
    }

    #[test]
    fn rejects_four_fields() {
        assert_eq!(
            "1.2.3.4".parse::<Version>(),
            Err(VersionParseError::ExtraField)
        );
    }

    #[test]
    fn rejects_non_numeric_field() {
        assert_eq!(
            "1.x.3".parse::<Version>(),
            Err(VersionParseError::InvalidNumber)
        );
        assert_eq!(
            "..".parse::<Version>(),
            Err(VersionParseError::InvalidNumber)
        );
    }

    #[test]
    fn rejects_overflowing_field() {
        assert_eq!(
            "1.4294967296.0".parse::<Version>(),
            Err(VersionParseError::InvalidNumber)
        );
    }

    #[test]
    fn patch_difference_orders() {
        let a: Version = "1.2.3".parse().unwrap();
        let b: Version = "1.2.4".parse().unwrap();
        assert_eq!(compare(&a, &b), Relation::Older);
    }

    #[test]
    fn major_beats_minor_and_patch() {
        let a: Version = "2.0.0".parse().unwrap();
        let b: Version = "1.9.9".parse().unwrap();
        assert_eq!(compare(&a, &b), Relation::Newer);
    }

    #[test]
    fn equal_triples_compare_equal() {
        let a: Version = "1.0.0".parse().unwrap();
        assert_eq!(compare(&a, &a), Relation::Equal);
    }

    #[test]
    fn absent_record_always_updates() {
        let available = Version::new(0, 0, 1);
        assert!(update_required(None, &available));
    }

    #[test]
    fn older_installed_updates() {
        let installed = Version::new(1, 0, 0);
        let available = Version::new(1, 0, 1);
        assert!(update_required(Some(&installed), &available));
    }

    #[test]
    fn equal_or_newer_installed_does_not_update() {
        let installed = Version::new(1, 0, 1);
        assert!(!update_required(Some(&installed), &installed));
        let older_remote = Version::new(1, 0, 0);
        assert!(!update_required(Some(&installed), &older_remote));
    }

    #[test]
    fn display_roundtrip() {
        let v = Version::new(10, 20, 30);
        let s = v.to_string();
        assert_eq!(s, "10.20.30");
        assert_eq!(s.parse::<Version>().unwrap(), v);
    }
}
