//! Flash / OTA partition adapter.
//!
//! Implements [`FlashPort`] over the raw ESP-IDF app-update API
//! (`esp_ota_*`).  Sequential writes let the partition be erased
//! incrementally as data streams in; `esp_ota_end` runs the full image
//! validation (magic, checksum, and secure-boot signature when fused)
//! before the boot target is ever touched.
//!
//! The simulation backend keeps two fake app partitions in memory and
//! performs a shallow image check (magic byte + minimum header block),
//! enough for host tests to exercise every failure edge.

use log::{info, warn};

use crate::agent::ports::{FlashError, FlashPort, PartitionPair, PartitionRef};

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

/// ESP application image magic byte.
#[cfg(not(target_os = "espidf"))]
const ESP_IMAGE_MAGIC: u8 = 0xE9;
/// Image header + first segment header + app descriptor.
#[cfg(not(target_os = "espidf"))]
const MIN_VALID_IMAGE: usize = 24 + 8 + 256;

pub struct FlashAdapter {
    #[cfg(target_os = "espidf")]
    handle: Option<esp_ota_handle_t>,
    #[cfg(target_os = "espidf")]
    target: Option<*const esp_partition_t>,
    #[cfg(not(target_os = "espidf"))]
    sim: SimFlash,
}

impl FlashAdapter {
    pub fn new() -> Self {
        Self {
            #[cfg(target_os = "espidf")]
            handle: None,
            #[cfg(target_os = "espidf")]
            target: None,
            #[cfg(not(target_os = "espidf"))]
            sim: SimFlash::new(),
        }
    }

    /// Simulation-only view of the write buffer, for tests.
    #[cfg(not(target_os = "espidf"))]
    pub fn sim(&self) -> &SimFlash {
        &self.sim
    }

    #[cfg(target_os = "espidf")]
    fn partition_ref(part: *const esp_partition_t) -> Result<PartitionRef, FlashError> {
        // SAFETY: the pointer comes from esp_ota_get_* and stays valid
        // for the lifetime of the firmware.
        let p = unsafe { part.as_ref() }.ok_or(FlashError::PartitionNotFound)?;
        let label_bytes: Vec<u8> = p
            .label
            .iter()
            .take_while(|&&c| c != 0)
            .map(|&c| c as u8)
            .collect();
        let mut label = heapless::String::new();
        let _ = label.push_str(core::str::from_utf8(&label_bytes).unwrap_or("?"));
        Ok(PartitionRef {
            label,
            offset: p.address,
            size: p.size,
        })
    }
}

#[cfg(target_os = "espidf")]
impl FlashPort for FlashAdapter {
    fn resolve_partitions(&mut self) -> Result<PartitionPair, FlashError> {
        let running = unsafe { esp_ota_get_running_partition() };
        let update = unsafe { esp_ota_get_next_update_partition(core::ptr::null()) };
        if running.is_null() || update.is_null() {
            return Err(FlashError::PartitionNotFound);
        }
        self.target = Some(update);
        Ok(PartitionPair {
            running: Self::partition_ref(running)?,
            update_target: Self::partition_ref(update)?,
        })
    }

    fn begin(&mut self, _target: &PartitionRef) -> Result<(), FlashError> {
        let part = self.target.ok_or(FlashError::PartitionNotFound)?;
        let mut handle: esp_ota_handle_t = 0;
        // Sequential writes: the partition is erased as data arrives
        // instead of in one long blocking erase up front.
        let ret = unsafe { esp_ota_begin(part, OTA_WITH_SEQUENTIAL_WRITES as usize, &mut handle) };
        if ret != ESP_OK {
            warn!("FlashAdapter: esp_ota_begin failed ({})", ret);
            return Err(FlashError::BeginFailed);
        }
        self.handle = Some(handle);
        Ok(())
    }

    fn write(&mut self, data: &[u8]) -> Result<(), FlashError> {
        let handle = self.handle.ok_or(FlashError::NotWriting)?;
        let ret = unsafe { esp_ota_write(handle, data.as_ptr() as *const _, data.len()) };
        if ret != ESP_OK {
            warn!("FlashAdapter: esp_ota_write failed ({})", ret);
            return Err(FlashError::WriteFailed);
        }
        Ok(())
    }

    fn finalize(&mut self) -> Result<(), FlashError> {
        let handle = self.handle.take().ok_or(FlashError::NotWriting)?;
        let ret = unsafe { esp_ota_end(handle) };
        if ret == ESP_OK {
            Ok(())
        } else if ret == ESP_ERR_OTA_VALIDATE_FAILED {
            warn!("FlashAdapter: image validation failed");
            Err(FlashError::ImageValidationFailed)
        } else {
            warn!("FlashAdapter: esp_ota_end failed ({})", ret);
            Err(FlashError::WriteFailed)
        }
    }

    fn abort(&mut self) {
        if let Some(handle) = self.handle.take() {
            unsafe {
                esp_ota_abort(handle);
            }
            info!("FlashAdapter: partial write aborted");
        }
    }

    fn arm_boot_target(&mut self, _target: &PartitionRef) -> Result<(), FlashError> {
        let part = self.target.ok_or(FlashError::PartitionNotFound)?;
        let ret = unsafe { esp_ota_set_boot_partition(part) };
        if ret != ESP_OK {
            warn!("FlashAdapter: esp_ota_set_boot_partition failed ({})", ret);
            return Err(FlashError::BootArmFailed);
        }
        Ok(())
    }
}

// ── Simulation backend ────────────────────────────────────────

/// Two fake app partitions plus a boot-target register.
#[cfg(not(target_os = "espidf"))]
pub struct SimFlash {
    running_label: &'static str,
    update_label: &'static str,
    buffer: Vec<u8>,
    writing: bool,
    finalized: bool,
    boot_target: Option<String>,
}

#[cfg(not(target_os = "espidf"))]
impl SimFlash {
    fn new() -> Self {
        Self {
            running_label: "ota_0",
            update_label: "ota_1",
            buffer: Vec::new(),
            writing: false,
            finalized: false,
            boot_target: None,
        }
    }

    pub fn written(&self) -> &[u8] {
        &self.buffer
    }

    pub fn boot_target(&self) -> Option<&str> {
        self.boot_target.as_deref()
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    fn part(label: &str, offset: u32) -> PartitionRef {
        let mut l = heapless::String::new();
        let _ = l.push_str(label);
        PartitionRef {
            label: l,
            offset,
            size: 0x1a_0000,
        }
    }
}

#[cfg(not(target_os = "espidf"))]
impl FlashPort for FlashAdapter {
    fn resolve_partitions(&mut self) -> Result<PartitionPair, FlashError> {
        Ok(PartitionPair {
            running: SimFlash::part(self.sim.running_label, 0x1_0000),
            update_target: SimFlash::part(self.sim.update_label, 0x1b_0000),
        })
    }

    fn begin(&mut self, _target: &PartitionRef) -> Result<(), FlashError> {
        self.sim.buffer.clear();
        self.sim.writing = true;
        self.sim.finalized = false;
        Ok(())
    }

    fn write(&mut self, data: &[u8]) -> Result<(), FlashError> {
        if !self.sim.writing {
            return Err(FlashError::NotWriting);
        }
        self.sim.buffer.extend_from_slice(data);
        Ok(())
    }

    fn finalize(&mut self) -> Result<(), FlashError> {
        if !self.sim.writing {
            return Err(FlashError::NotWriting);
        }
        self.sim.writing = false;
        // Shallow image check, mirroring what esp_ota_end rejects first.
        if self.sim.buffer.len() < MIN_VALID_IMAGE || self.sim.buffer[0] != ESP_IMAGE_MAGIC {
            warn!("SimFlash: image validation failed ({} B)", self.sim.buffer.len());
            return Err(FlashError::ImageValidationFailed);
        }
        self.sim.finalized = true;
        Ok(())
    }

    fn abort(&mut self) {
        if self.sim.writing {
            self.sim.buffer.clear();
            self.sim.writing = false;
            info!("SimFlash: partial write aborted");
        }
    }

    fn arm_boot_target(&mut self, target: &PartitionRef) -> Result<(), FlashError> {
        if !self.sim.finalized {
            return Err(FlashError::BootArmFailed);
        }
        self.sim.boot_target = Some(target.label.as_str().to_string());
        Ok(())
    }
}

#[cfg(all(test, not(target_os = "espidf")))]
mod tests {
    use super::*;

    fn valid_image() -> Vec<u8> {
        let mut img = vec![0u8; MIN_VALID_IMAGE + 32];
        img[0] = ESP_IMAGE_MAGIC;
        img
    }

    #[test]
    fn full_write_cycle_arms_the_update_partition() {
        let mut flash = FlashAdapter::new();
        let pair = flash.resolve_partitions().unwrap();
        assert_ne!(pair.running.label, pair.update_target.label);

        flash.begin(&pair.update_target).unwrap();
        flash.write(&valid_image()).unwrap();
        flash.finalize().unwrap();
        flash.arm_boot_target(&pair.update_target).unwrap();

        assert_eq!(flash.sim().boot_target(), Some("ota_1"));
        assert_eq!(flash.sim().written().len(), MIN_VALID_IMAGE + 32);
    }

    #[test]
    fn bad_magic_fails_validation() {
        let mut flash = FlashAdapter::new();
        let pair = flash.resolve_partitions().unwrap();
        flash.begin(&pair.update_target).unwrap();
        let mut img = valid_image();
        img[0] = 0x00;
        flash.write(&img).unwrap();
        assert_eq!(flash.finalize(), Err(FlashError::ImageValidationFailed));
    }

    #[test]
    fn truncated_image_fails_validation() {
        let mut flash = FlashAdapter::new();
        let pair = flash.resolve_partitions().unwrap();
        flash.begin(&pair.update_target).unwrap();
        flash.write(&[ESP_IMAGE_MAGIC; 64]).unwrap();
        assert_eq!(flash.finalize(), Err(FlashError::ImageValidationFailed));
    }

    #[test]
    fn write_without_begin_is_rejected() {
        let mut flash = FlashAdapter::new();
        assert_eq!(flash.write(b"data"), Err(FlashError::NotWriting));
    }

    #[test]
    fn arm_without_finalize_is_rejected() {
        let mut flash = FlashAdapter::new();
        let pair = flash.resolve_partitions().unwrap();
        flash.begin(&pair.update_target).unwrap();
        flash.write(&valid_image()).unwrap();
        assert_eq!(
            flash.arm_boot_target(&pair.update_target),
            Err(FlashError::BootArmFailed)
        );
    }

    #[test]
    fn abort_discards_partial_write() {
        let mut flash = FlashAdapter::new();
        let pair = flash.resolve_partitions().unwrap();
        flash.begin(&pair.update_target).unwrap();
        flash.write(&[ESP_IMAGE_MAGIC; 100]).unwrap();
        flash.abort();
        assert!(flash.sim().written().is_empty());
        assert_eq!(flash.sim().boot_target(), None);
    }
}
