//! Storage adapter: async key/value persistence for session state.
//!
//! The manager remembers the last-connected wallet (and in-app wallets their
//! auth token) through an [`AsyncStorage`] passed in explicitly at build time.
//! Semantics are last-write-wins; there are no transactions.
//!
//! - [`MemoryStorage`]: in-process map, the default on native targets.
//! - [`LocalStorage`]: browser `localStorage` (`wasm` feature); every call is
//!   a no-op outside a browser context.

pub mod memory;

#[cfg(feature = "wasm")]
pub mod local;

pub use memory::MemoryStorage;

#[cfg(feature = "wasm")]
pub use local::LocalStorage;

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::StorageError;

/// Last wallet made active by the manager.
pub const ACTIVE_WALLET_ID_KEY: &str = "thirdweb:active-wallet-id";
/// JSON array of every connected wallet id, active first.
pub const CONNECTED_WALLET_IDS_KEY: &str = "thirdweb:connected-wallet-ids";
/// JSON chain id of the active wallet's chain.
pub const ACTIVE_CHAIN_KEY: &str = "thirdweb:active-chain";
/// Auth provider last used by the in-app wallet (`email`, `guest`, ...).
pub const IN_APP_AUTH_PROVIDER_KEY: &str = "thirdweb:in-app:auth-provider";
/// Prefix for the in-app session token, suffixed with the client id.
pub const IN_APP_AUTH_TOKEN_KEY_PREFIX: &str = "thirdweb:in-app:auth-token";
/// Random id reused by every guest login from this storage.
pub const IN_APP_GUEST_SESSION_KEY: &str = "thirdweb:in-app:guest-session-id";

/// Async key/value storage.
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
pub trait AsyncStorage: Send + Sync {
    async fn get_item(&self, key: &str) -> Result<Option<String>, StorageError>;
    async fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError>;
    async fn remove_item(&self, key: &str) -> Result<(), StorageError>;
}

/// The platform default: `localStorage` in the browser, memory elsewhere.
pub fn default_storage() -> Arc<dyn AsyncStorage> {
    #[cfg(all(feature = "wasm", target_arch = "wasm32"))]
    {
        Arc::new(LocalStorage::new())
    }
    #[cfg(not(all(feature = "wasm", target_arch = "wasm32")))]
    {
        Arc::new(MemoryStorage::new())
    }
}
