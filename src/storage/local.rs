//! Browser `localStorage` adapter (`wasm` feature).
//!
//! Guarded by existence checks: without a `window` or with storage disabled
//! (private mode, sandboxed iframes) reads return `None` and writes are no-ops.

use async_trait::async_trait;

use super::AsyncStorage;
use crate::error::StorageError;

#[derive(Debug, Clone, Copy, Default)]
pub struct LocalStorage;

impl LocalStorage {
    pub fn new() -> Self {
        Self
    }

    fn storage() -> Option<web_sys::Storage> {
        web_sys::window()?.local_storage().ok().flatten()
    }
}

#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
impl AsyncStorage for LocalStorage {
    async fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        let Some(storage) = Self::storage() else {
            return Ok(None);
        };
        storage
            .get_item(key)
            .map_err(|e| StorageError::Unavailable(format!("{:?}", e)))
    }

    async fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let Some(storage) = Self::storage() else {
            return Ok(());
        };
        storage
            .set_item(key, value)
            .map_err(|e| StorageError::WriteFailed {
                key: key.to_string(),
                reason: format!("{:?}", e),
            })
    }

    async fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        let Some(storage) = Self::storage() else {
            return Ok(());
        };
        storage
            .remove_item(key)
            .map_err(|e| StorageError::Unavailable(format!("{:?}", e)))
    }
}
