//! Read/subscribe handles over connection manager state.
//!
//! Each accessor mirrors one UI hook: `active_wallet`, `active_account`,
//! `active_wallet_chain`, `connection_status`, `is_auto_connecting`,
//! `connected_wallets`, and `disconnect_handle`. A [`Subscription`] reads the
//! current value with `get()` and yields every later value from `changes()`.
//!
//! ```rust,ignore
//! let status = manager.connection_status();
//! let mut changes = status.changes();
//! while let Some(s) = changes.next().await {
//!     println!("status: {}", s);
//! }
//! ```

use futures::stream::{BoxStream, StreamExt};
use std::sync::Arc;

use crate::chain::Chain;
use crate::error::SdkError;
use crate::manager::{ActiveSession, ConnectionManager, ConnectionStatus, ManagerEvent};
use crate::shared::Store;
use crate::wallet::{Account, Wallet};

/// A value derived from one manager store.
pub struct Subscription<T> {
    get: Arc<dyn Fn() -> T + Send + Sync>,
    changes: Arc<dyn Fn() -> BoxStream<'static, T> + Send + Sync>,
}

impl<T: Clone + Send + 'static> Subscription<T> {
    fn of(store: Store<T>) -> Self {
        Self::project(store, T::clone)
    }

    fn project<S>(store: Store<S>, f: fn(&S) -> T) -> Self
    where
        S: Clone + Send + 'static,
    {
        let read = store.clone();
        Self {
            get: Arc::new(move || f(&read.get())),
            changes: Arc::new(move || store.subscribe().map(move |s| f(&s)).boxed()),
        }
    }

    /// Current value.
    pub fn get(&self) -> T {
        (self.get)()
    }

    /// Every value set after this call. The current value is not replayed.
    pub fn changes(&self) -> BoxStream<'static, T> {
        (self.changes)()
    }
}

impl<T> Clone for Subscription<T> {
    fn clone(&self) -> Self {
        Self {
            get: self.get.clone(),
            changes: self.changes.clone(),
        }
    }
}

/// Cloneable handle that disconnects wallets through the manager.
#[derive(Clone)]
pub struct DisconnectHandle {
    manager: ConnectionManager,
}

impl DisconnectHandle {
    pub async fn disconnect(&self, wallet: &Arc<dyn Wallet>) -> Result<(), SdkError> {
        self.manager.disconnect(wallet).await
    }
}

impl ConnectionManager {
    pub fn active_wallet(&self) -> Subscription<Option<Arc<dyn Wallet>>> {
        Subscription::project(self.active.clone(), |s: &Option<ActiveSession>| {
            s.as_ref().map(|s| s.wallet.clone())
        })
    }

    pub fn active_account(&self) -> Subscription<Option<Arc<dyn Account>>> {
        Subscription::project(self.active.clone(), |s: &Option<ActiveSession>| {
            s.as_ref().map(|s| s.account.clone())
        })
    }

    pub fn active_wallet_chain(&self) -> Subscription<Option<Chain>> {
        Subscription::project(self.active.clone(), |s: &Option<ActiveSession>| {
            s.as_ref().map(|s| s.chain.clone())
        })
    }

    pub fn connection_status(&self) -> Subscription<ConnectionStatus> {
        Subscription::of(self.status.clone())
    }

    pub fn is_auto_connecting(&self) -> Subscription<bool> {
        Subscription::of(self.is_auto_connecting.clone())
    }

    pub fn connected_wallets(&self) -> Subscription<Vec<Arc<dyn Wallet>>> {
        Subscription::of(self.connected.clone())
    }

    /// State transition events as a stream.
    pub fn events(&self) -> BoxStream<'static, ManagerEvent> {
        self.events.subscribe().boxed()
    }

    pub fn disconnect_handle(&self) -> DisconnectHandle {
        DisconnectHandle {
            manager: self.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscription_reads_and_streams() {
        let store = Store::new(1u32);
        let sub = Subscription::of(store.clone());
        assert_eq!(sub.get(), 1);

        let mut changes = sub.changes();
        store.set(2);
        assert_eq!(changes.next().await, Some(2));
        assert_eq!(sub.get(), 2);
    }

    #[tokio::test]
    async fn test_projection_maps_each_value() {
        let store = Store::new((1u8, "a"));
        let sub = Subscription::project(store.clone(), |(n, _): &(u8, &str)| *n * 10);
        let mut changes = sub.clone().changes();
        store.set((4, "b"));
        assert_eq!(changes.next().await, Some(40));
        assert_eq!(sub.get(), 40);
    }

    #[tokio::test]
    async fn test_manager_handles_start_empty() {
        let manager = ConnectionManager::builder()
            .storage(Arc::new(crate::storage::MemoryStorage::new()))
            .build();
        assert!(manager.active_wallet().get().is_none());
        assert!(manager.active_account().get().is_none());
        assert!(manager.active_wallet_chain().get().is_none());
        assert_eq!(manager.connection_status().get(), ConnectionStatus::Unknown);
        assert!(!manager.is_auto_connecting().get());
        assert!(manager.connected_wallets().get().is_empty());
    }
}
