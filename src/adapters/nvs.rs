//! NVS (Non-Volatile Storage) adapter.
//!
//! Implements [`StoragePort`] over ESP-IDF NVS.  Each logical area uses
//! its own namespace; the credential namespace lives on the encrypted
//! NVS partition in production (AES-XTS via the nvs_key partition), and
//! the same API works transparently with encryption off in development.
//!
//! Batched writes share one handle and one `nvs_commit`, so a
//! multi-entry record lands in flash as a unit.  The simulation backend
//! is a plain in-memory map (dev/test only).

use log::info;
#[cfg(target_os = "espidf")]
use log::warn;

use crate::agent::ports::{StorageError, StoragePort};

#[cfg(not(target_os = "espidf"))]
use std::collections::HashMap;

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

pub struct NvsAdapter {
    #[cfg(not(target_os = "espidf"))]
    store: std::cell::RefCell<HashMap<String, Vec<u8>>>,
}

impl NvsAdapter {
    /// Create the adapter and initialise NVS flash.
    ///
    /// On first boot or after an IDF version mismatch the partition is
    /// erased and re-initialised automatically.
    pub fn new() -> Result<Self, StorageError> {
        #[cfg(target_os = "espidf")]
        {
            // SAFETY: nvs_flash_init / nvs_flash_erase run from the
            // single main-task context before any concurrent NVS access.
            let ret = unsafe { nvs_flash_init() };
            if ret == ESP_ERR_NVS_NO_FREE_PAGES || ret == ESP_ERR_NVS_NEW_VERSION_FOUND {
                warn!("NVS: erasing and re-initialising flash partition");
                let ret2 = unsafe { nvs_flash_erase() };
                if ret2 != ESP_OK {
                    return Err(StorageError::Io);
                }
                let ret3 = unsafe { nvs_flash_init() };
                if ret3 != ESP_OK {
                    return Err(StorageError::Io);
                }
            } else if ret != ESP_OK {
                return Err(StorageError::Io);
            }
            info!("NvsAdapter: ESP-IDF NVS initialised");
        }

        #[cfg(not(target_os = "espidf"))]
        info!("NvsAdapter: simulation backend");

        Ok(Self {
            #[cfg(not(target_os = "espidf"))]
            store: std::cell::RefCell::new(HashMap::new()),
        })
    }

    #[cfg(not(target_os = "espidf"))]
    fn composite_key(namespace: &str, key: &str) -> String {
        format!("{}::{}", namespace, key)
    }

    /// Open an NVS namespace, execute a closure with the handle, then close.
    #[cfg(target_os = "espidf")]
    fn with_nvs_handle<F, T>(namespace: &str, write: bool, f: F) -> Result<T, i32>
    where
        F: FnOnce(nvs_handle_t) -> Result<T, i32>,
    {
        let mut ns_buf = [0u8; 16];
        let ns_bytes = namespace.as_bytes();
        let len = ns_bytes.len().min(15);
        ns_buf[..len].copy_from_slice(&ns_bytes[..len]);

        let mut handle: nvs_handle_t = 0;
        let mode = if write {
            nvs_open_mode_t_NVS_READWRITE
        } else {
            nvs_open_mode_t_NVS_READONLY
        };

        let ret = unsafe { nvs_open(ns_buf.as_ptr() as *const _, mode, &mut handle) };
        if ret != ESP_OK {
            return Err(ret);
        }

        let result = f(handle);
        unsafe {
            nvs_close(handle);
        }
        result
    }

    /// NVS key names are limited to 15 bytes plus NUL.
    #[cfg(target_os = "espidf")]
    fn key_cstr(key: &str) -> [u8; 16] {
        let mut key_buf = [0u8; 16];
        let kb = key.as_bytes();
        let kl = kb.len().min(15);
        key_buf[..kl].copy_from_slice(&kb[..kl]);
        key_buf
    }

    #[cfg(target_os = "espidf")]
    fn set_blob_raw(handle: nvs_handle_t, key: &str, data: &[u8]) -> Result<(), i32> {
        let key_buf = Self::key_cstr(key);
        let ret = unsafe {
            nvs_set_blob(
                handle,
                key_buf.as_ptr() as *const _,
                data.as_ptr() as *const _,
                data.len(),
            )
        };
        if ret != ESP_OK {
            return Err(ret);
        }
        Ok(())
    }
}

impl StoragePort for NvsAdapter {
    fn read(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError> {
        #[cfg(not(target_os = "espidf"))]
        {
            let composite = Self::composite_key(namespace, key);
            match self.store.borrow().get(&composite) {
                Some(data) if data.len() > buf.len() => Err(StorageError::BufferTooSmall),
                Some(data) => {
                    buf[..data.len()].copy_from_slice(data);
                    Ok(data.len())
                }
                None => Err(StorageError::NotFound),
            }
        }

        #[cfg(target_os = "espidf")]
        {
            let result = Self::with_nvs_handle(namespace, false, |handle| {
                let key_buf = Self::key_cstr(key);

                // Size probe first, so an oversized value is a typed
                // error rather than a silent truncation.
                let mut size: usize = 0;
                let ret = unsafe {
                    nvs_get_blob(
                        handle,
                        key_buf.as_ptr() as *const _,
                        core::ptr::null_mut(),
                        &mut size,
                    )
                };
                if ret != ESP_OK {
                    return Err(ret);
                }
                if size > buf.len() {
                    return Err(ESP_ERR_NVS_INVALID_LENGTH);
                }

                let mut size = buf.len();
                let ret = unsafe {
                    nvs_get_blob(
                        handle,
                        key_buf.as_ptr() as *const _,
                        buf.as_mut_ptr() as *mut _,
                        &mut size,
                    )
                };
                if ret != ESP_OK {
                    return Err(ret);
                }
                Ok(size)
            });
            match result {
                Ok(size) => Ok(size),
                Err(e) if e == ESP_ERR_NVS_NOT_FOUND => Err(StorageError::NotFound),
                Err(e) if e == ESP_ERR_NVS_INVALID_LENGTH => Err(StorageError::BufferTooSmall),
                Err(_) => Err(StorageError::Io),
            }
        }
    }

    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError> {
        #[cfg(not(target_os = "espidf"))]
        {
            let composite = Self::composite_key(namespace, key);
            self.store.borrow_mut().insert(composite, data.to_vec());
            Ok(())
        }

        #[cfg(target_os = "espidf")]
        {
            let result = Self::with_nvs_handle(namespace, true, |handle| {
                Self::set_blob_raw(handle, key, data)?;
                let ret = unsafe { nvs_commit(handle) };
                if ret != ESP_OK {
                    return Err(ret);
                }
                Ok(())
            });
            match result {
                Ok(()) => Ok(()),
                Err(e) if e == ESP_ERR_NVS_NOT_ENOUGH_SPACE => Err(StorageError::Full),
                Err(e) => {
                    warn!("NvsAdapter: NVS write error {}", e);
                    Err(StorageError::CommitFailed)
                }
            }
        }
    }

    fn write_batch(
        &mut self,
        namespace: &str,
        entries: &[(&str, &[u8])],
    ) -> Result<(), StorageError> {
        #[cfg(not(target_os = "espidf"))]
        {
            let mut store = self.store.borrow_mut();
            for (key, data) in entries {
                store.insert(Self::composite_key(namespace, key), data.to_vec());
            }
            Ok(())
        }

        #[cfg(target_os = "espidf")]
        {
            // One handle, N set_blob calls, one commit.
            let result = Self::with_nvs_handle(namespace, true, |handle| {
                for (key, data) in entries {
                    Self::set_blob_raw(handle, key, data)?;
                }
                let ret = unsafe { nvs_commit(handle) };
                if ret != ESP_OK {
                    return Err(ret);
                }
                Ok(())
            });
            match result {
                Ok(()) => Ok(()),
                Err(e) if e == ESP_ERR_NVS_NOT_ENOUGH_SPACE => Err(StorageError::Full),
                Err(e) => {
                    warn!("NvsAdapter: NVS batch write error {}", e);
                    Err(StorageError::CommitFailed)
                }
            }
        }
    }

    fn delete(&mut self, namespace: &str, key: &str) -> Result<(), StorageError> {
        #[cfg(not(target_os = "espidf"))]
        {
            let composite = Self::composite_key(namespace, key);
            self.store
                .borrow_mut()
                .remove(&composite)
                .map(|_| ())
                .ok_or(StorageError::NotFound)
        }

        #[cfg(target_os = "espidf")]
        {
            let result = Self::with_nvs_handle(namespace, true, |handle| {
                let key_buf = Self::key_cstr(key);
                let ret = unsafe { nvs_erase_key(handle, key_buf.as_ptr() as *const _) };
                if ret != ESP_OK {
                    return Err(ret);
                }
                let ret = unsafe { nvs_commit(handle) };
                if ret != ESP_OK {
                    return Err(ret);
                }
                Ok(())
            });
            match result {
                Ok(()) => Ok(()),
                Err(e) if e == ESP_ERR_NVS_NOT_FOUND => Err(StorageError::NotFound),
                Err(_) => Err(StorageError::Io),
            }
        }
    }

    fn exists(&self, namespace: &str, key: &str) -> bool {
        #[cfg(not(target_os = "espidf"))]
        {
            let composite = Self::composite_key(namespace, key);
            self.store.borrow().contains_key(&composite)
        }

        #[cfg(target_os = "espidf")]
        {
            let result = Self::with_nvs_handle(namespace, false, |handle| {
                let key_buf = Self::key_cstr(key);
                let ret = unsafe {
                    nvs_find_key(handle, key_buf.as_ptr() as *const _, core::ptr::null_mut())
                };
                Ok(ret == ESP_OK)
            });
            result.unwrap_or(false)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_round_trip() {
        let mut nvs = NvsAdapter::new().unwrap();
        let data = b"hello NVS";
        nvs.write("test_ns", "greeting", data).unwrap();
        assert!(nvs.exists("test_ns", "greeting"));

        let mut buf = [0u8; 64];
        let len = nvs.read("test_ns", "greeting", &mut buf).unwrap();
        assert_eq!(&buf[..len], data);

        nvs.delete("test_ns", "greeting").unwrap();
        assert!(!nvs.exists("test_ns", "greeting"));
    }

    #[test]
    fn read_missing_key_is_not_found() {
        let nvs = NvsAdapter::new().unwrap();
        let mut buf = [0u8; 64];
        assert!(matches!(
            nvs.read("ns", "nope", &mut buf),
            Err(StorageError::NotFound)
        ));
    }

    #[test]
    fn oversized_value_is_rejected_not_truncated() {
        let mut nvs = NvsAdapter::new().unwrap();
        nvs.write("ns", "blob", &[0xAA; 128]).unwrap();
        let mut buf = [0u8; 64];
        assert!(matches!(
            nvs.read("ns", "blob", &mut buf),
            Err(StorageError::BufferTooSmall)
        ));
    }

    #[test]
    fn batch_write_lands_every_entry() {
        let mut nvs = NvsAdapter::new().unwrap();
        nvs.write_batch("mtls_auth", &[("private_key", b"KEY"), ("cert", b"CERT")])
            .unwrap();
        assert!(nvs.exists("mtls_auth", "private_key"));
        assert!(nvs.exists("mtls_auth", "cert"));
    }

    #[test]
    fn namespace_isolation() {
        let mut nvs = NvsAdapter::new().unwrap();
        nvs.write("ns_a", "key", b"alpha").unwrap();
        nvs.write("ns_b", "key", b"bravo").unwrap();

        let mut buf = [0u8; 64];
        let len = nvs.read("ns_a", "key", &mut buf).unwrap();
        assert_eq!(&buf[..len], b"alpha");

        let len = nvs.read("ns_b", "key", &mut buf).unwrap();
        assert_eq!(&buf[..len], b"bravo");
    }
}
