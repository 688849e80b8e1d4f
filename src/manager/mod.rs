//! Connection manager: the single source of truth for which wallet is
//! active, on which chain, and in what connection state.
//!
//! State lives in observable [`Store`]s so the subscription layer can hand out
//! read handles. Every mutating operation (connect, disconnect, switch chain,
//! auto-connect) holds one async mutex for its whole duration, so concurrent
//! calls on one manager apply one at a time in lock order.
//!
//! Persistence after a state change is best-effort: a storage failure is
//! logged and never fails the operation that changed state.

pub mod state;

use async_lock::Mutex;
use futures::future::{select, Either};
use futures_timer::Delay;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::chain::{ethereum, get_chain_by_id, Chain};
use crate::client::Client;
use crate::error::{SdkError, WalletError};
use crate::shared::{ChainId, Listeners, Store, WalletId};
use crate::storage::{
    default_storage, AsyncStorage, ACTIVE_CHAIN_KEY, ACTIVE_WALLET_ID_KEY,
    CONNECTED_WALLET_IDS_KEY,
};
use crate::wallet::{same_wallet, Account, ConnectOptions, Wallet};

pub use state::{ActiveSession, ConnectionStatus, ManagerEvent};

/// Default bound on a single auto-connect attempt.
pub const DEFAULT_AUTO_CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

/// Options for [`ConnectionManager::auto_connect`].
#[derive(Clone, Default)]
pub struct AutoConnectOptions {
    /// Candidate wallets; the persisted id is matched against their ids.
    pub wallets: Vec<Arc<dyn Wallet>>,
    /// Chain to reconnect on. Falls back to the persisted chain.
    pub chain: Option<Chain>,
    /// Overrides the manager's auto-connect timeout.
    pub timeout: Option<Duration>,
    /// Base options passed to each wallet (personal account, ...).
    pub connect: ConnectOptions,
}

impl AutoConnectOptions {
    pub fn new(wallets: Vec<Arc<dyn Wallet>>) -> Self {
        Self {
            wallets,
            ..Default::default()
        }
    }

    pub fn with_chain(mut self, chain: Chain) -> Self {
        self.chain = Some(chain);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_connect_options(mut self, options: ConnectOptions) -> Self {
        self.connect = options;
        self
    }
}

impl std::fmt::Debug for AutoConnectOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AutoConnectOptions")
            .field(
                "wallets",
                &self.wallets.iter().map(|w| w.id()).collect::<Vec<_>>(),
            )
            .field("chain", &self.chain.as_ref().map(|c| c.id))
            .field("timeout", &self.timeout)
            .field("connect", &self.connect)
            .finish()
    }
}

/// Tracks connected wallets and the active one. Clones share state.
#[derive(Clone)]
pub struct ConnectionManager {
    pub(crate) storage: Arc<dyn AsyncStorage>,
    pub(crate) active: Store<Option<ActiveSession>>,
    pub(crate) status: Store<ConnectionStatus>,
    pub(crate) is_auto_connecting: Store<bool>,
    pub(crate) connected: Store<Vec<Arc<dyn Wallet>>>,
    pub(crate) events: Listeners<ManagerEvent>,
    op_lock: Arc<Mutex<()>>,
    auto_connect_timeout: Option<Duration>,
}

impl ConnectionManager {
    pub fn builder() -> ConnectionManagerBuilder {
        ConnectionManagerBuilder::default()
    }

    /// A manager persisting through `client`'s storage.
    pub fn new(client: &Client) -> Self {
        Self::builder().storage(client.storage()).build()
    }

    pub fn storage(&self) -> Arc<dyn AsyncStorage> {
        self.storage.clone()
    }

    /// Snapshot of the active session.
    pub fn active_session(&self) -> Option<ActiveSession> {
        self.active.get()
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status.get()
    }

    /// Subscribe to state transition events.
    pub fn subscribe_events(&self) -> futures::channel::mpsc::UnboundedReceiver<ManagerEvent> {
        self.events.subscribe()
    }

    // ── Operations ───────────────────────────────────────────────────────

    /// Connect `wallet` and make it active.
    ///
    /// On failure the status reverts to what it was and nothing else
    /// changes. Wallet errors surface as `SdkError::Wallet` unchanged.
    pub async fn connect(
        &self,
        wallet: Arc<dyn Wallet>,
        options: ConnectOptions,
    ) -> Result<Arc<dyn Account>, SdkError> {
        let _guard = self.op_lock.lock().await;
        let prior = self.status.get();
        self.status.set(ConnectionStatus::Connecting);
        tracing::debug!(wallet = %wallet.id(), "connecting");

        let account = match wallet.connect(options.clone()).await {
            Ok(account) => account,
            Err(e) => {
                tracing::debug!(wallet = %wallet.id(), "connect failed: {}", e);
                self.status.set(prior);
                return Err(e.into());
            }
        };
        let chain = self.reported_chain(&wallet, options.chain).await;
        self.activate(wallet, account.clone(), chain).await;
        Ok(account)
    }

    /// Make an already-connected wallet the active one.
    pub async fn set_active_wallet(&self, wallet: Arc<dyn Wallet>) -> Result<(), SdkError> {
        let _guard = self.op_lock.lock().await;
        if !self.is_connected(&wallet) {
            return Err(SdkError::WalletNotFound(wallet.id()));
        }
        let account = wallet
            .get_account()
            .await
            .ok_or(WalletError::NotConnected)?;
        let chain = self.reported_chain(&wallet, None).await;
        self.activate(wallet, account, chain).await;
        Ok(())
    }

    /// Disconnect `wallet`.
    ///
    /// Manager state is cleared even when the wallet's own disconnect fails;
    /// that error is returned afterwards. Disconnecting a wallet other than
    /// the active one leaves the active session untouched.
    pub async fn disconnect(&self, wallet: &Arc<dyn Wallet>) -> Result<(), SdkError> {
        let _guard = self.op_lock.lock().await;
        let id = wallet.id();
        let result = wallet.disconnect().await;
        if let Err(e) = &result {
            tracing::warn!(wallet = %id, "wallet disconnect failed, clearing state anyway: {}", e);
        }

        let was_connected = self.is_connected(wallet);
        self.connected
            .update(|wallets| wallets.retain(|w| !same_wallet(w, wallet)));

        let was_active = self
            .active
            .get()
            .map(|s| same_wallet(&s.wallet, wallet))
            .unwrap_or(false);
        if was_active {
            self.active.set(None);
            self.status.set(ConnectionStatus::Disconnected);
            self.forget(ACTIVE_WALLET_ID_KEY).await;
            self.forget(ACTIVE_CHAIN_KEY).await;
        }
        self.persist_connected_ids().await;

        tracing::debug!(wallet = %id, was_active, was_connected, "disconnected");
        if was_connected || was_active {
            self.events.emit(&ManagerEvent::Disconnected { wallet_id: id });
        }
        result.map_err(Into::into)
    }

    /// Disconnect the active wallet, if any.
    pub async fn disconnect_active(&self) -> Result<(), SdkError> {
        match self.active.get() {
            Some(session) => self.disconnect(&session.wallet).await,
            None => Ok(()),
        }
    }

    /// Switch the active wallet to `chain`.
    ///
    /// No-op (and no provider call) when the wallet already reports `chain`.
    pub async fn switch_chain(&self, chain: &Chain) -> Result<(), SdkError> {
        let _guard = self.op_lock.lock().await;
        let session = self.active.get().ok_or(SdkError::NoActiveWallet)?;

        let current = session
            .wallet
            .get_chain()
            .await
            .map(|c| c.id)
            .unwrap_or(session.chain.id);
        if current == chain.id {
            if session.chain.id != chain.id {
                self.replace_chain(&session, chain.clone(), session.account.clone());
                self.persist_chain(chain.id).await;
            }
            return Ok(());
        }

        session.wallet.switch_chain(chain).await?;

        // Some wallets (smart accounts) derive a new account per chain.
        let account = session
            .wallet
            .get_account()
            .await
            .unwrap_or_else(|| session.account.clone());
        self.replace_chain(&session, chain.clone(), account);
        self.persist_chain(chain.id).await;
        tracing::debug!(wallet = %session.wallet_id(), chain_id = chain.id, "chain switched");
        Ok(())
    }

    /// Silently reconnect the last active wallet.
    ///
    /// Returns `Ok(None)` when nothing was persisted or the persisted wallet
    /// is not among `options.wallets`. Other previously connected wallets are
    /// reconnected too; their failures are logged, not returned.
    pub async fn auto_connect(
        &self,
        options: AutoConnectOptions,
    ) -> Result<Option<Arc<dyn Account>>, SdkError> {
        let _guard = self.op_lock.lock().await;

        let last_id = self.read(ACTIVE_WALLET_ID_KEY).await;
        let Some(last_id) = last_id else {
            tracing::debug!("no persisted wallet, skipping auto-connect");
            self.status.set(ConnectionStatus::Disconnected);
            return Ok(None);
        };
        let Some(wallet) = find_wallet(&options.wallets, &last_id) else {
            tracing::debug!(wallet = %last_id, "persisted wallet not offered, skipping auto-connect");
            self.status.set(ConnectionStatus::Disconnected);
            return Ok(None);
        };

        let chain = match options.chain.clone() {
            Some(chain) => Some(chain),
            None => self.persisted_chain().await,
        };
        // Read before activation rewrites the list.
        let previously_connected = self.persisted_connected_ids().await;
        let connect_options = ConnectOptions {
            chain: chain.clone(),
            ..options.connect.clone()
        };
        let timeout = options.timeout.or(self.auto_connect_timeout);

        self.is_auto_connecting.set(true);
        self.status.set(ConnectionStatus::Connecting);
        let result = with_timeout(wallet.auto_connect(connect_options.clone()), timeout).await;

        let outcome = match result {
            Ok(account) => {
                let chain = self.reported_chain(&wallet, chain).await;
                self.activate(wallet.clone(), account.clone(), chain).await;
                self.reconnect_others(
                    &previously_connected,
                    &options.wallets,
                    &wallet,
                    &connect_options,
                    timeout,
                )
                .await;
                Ok(Some(account))
            }
            Err(e) => {
                tracing::debug!(wallet = %last_id, "auto-connect failed: {}", e);
                self.status.set(ConnectionStatus::Disconnected);
                Err(e)
            }
        };
        self.is_auto_connecting.set(false);
        outcome
    }

    // ── Internals ────────────────────────────────────────────────────────

    fn is_connected(&self, wallet: &Arc<dyn Wallet>) -> bool {
        self.connected.get().iter().any(|w| same_wallet(w, wallet))
    }

    /// The chain the wallet reports, else the requested one, else mainnet.
    async fn reported_chain(&self, wallet: &Arc<dyn Wallet>, requested: Option<Chain>) -> Chain {
        match wallet.get_chain().await {
            Some(chain) => chain,
            None => requested.unwrap_or_else(ethereum),
        }
    }

    async fn activate(&self, wallet: Arc<dyn Wallet>, account: Arc<dyn Account>, chain: Chain) {
        let session = ActiveSession::new(wallet.clone(), account, chain);
        let event = ManagerEvent::Connected {
            wallet_id: session.wallet_id(),
            address: session.address().clone(),
            chain_id: session.chain.id,
        };
        tracing::debug!(wallet = %session.wallet_id(), address = %session.address(), chain_id = session.chain.id, "wallet active");

        self.add_connected(&wallet);
        self.active.set(Some(session.clone()));
        self.status.set(ConnectionStatus::Connected);
        self.events.emit(&event);

        self.persist(ACTIVE_WALLET_ID_KEY, session.wallet_id().as_str())
            .await;
        self.persist_chain(session.chain.id).await;
        self.persist_connected_ids().await;
    }

    fn add_connected(&self, wallet: &Arc<dyn Wallet>) {
        if !self.is_connected(wallet) {
            let wallet = wallet.clone();
            self.connected.update(move |wallets| wallets.push(wallet));
        }
    }

    fn replace_chain(&self, session: &ActiveSession, chain: Chain, account: Arc<dyn Account>) {
        let wallet_id = session.wallet_id();
        let account_changed = account.address() != session.account.address();
        let next = ActiveSession {
            wallet: session.wallet.clone(),
            account,
            chain,
            connected_at: session.connected_at,
        };
        let chain_id = next.chain.id;
        let address = next.address().clone();
        self.active.set(Some(next));
        self.events.emit(&ManagerEvent::ChainChanged {
            wallet_id: wallet_id.clone(),
            chain_id,
        });
        if account_changed {
            self.events
                .emit(&ManagerEvent::AccountChanged { wallet_id, address });
        }
    }

    async fn reconnect_others(
        &self,
        ids: &[WalletId],
        wallets: &[Arc<dyn Wallet>],
        active: &Arc<dyn Wallet>,
        options: &ConnectOptions,
        timeout: Option<Duration>,
    ) {
        let mut reconnected = false;
        for id in ids {
            let Some(wallet) = find_wallet(wallets, id.as_str()) else {
                continue;
            };
            if same_wallet(&wallet, active) || self.is_connected(&wallet) {
                continue;
            }
            match with_timeout(wallet.auto_connect(options.clone()), timeout).await {
                Ok(_) => {
                    self.add_connected(&wallet);
                    reconnected = true;
                }
                Err(e) => tracing::debug!(wallet = %id, "secondary auto-connect failed: {}", e),
            }
        }
        if reconnected {
            self.persist_connected_ids().await;
        }
    }

    async fn persisted_connected_ids(&self) -> Vec<WalletId> {
        let Some(raw) = self.read(CONNECTED_WALLET_IDS_KEY).await else {
            return Vec::new();
        };
        serde_json::from_str(&raw).unwrap_or_else(|e| {
            tracing::warn!("ignoring malformed connected wallet ids: {}", e);
            Vec::new()
        })
    }

    async fn persisted_chain(&self) -> Option<Chain> {
        let raw = self.read(ACTIVE_CHAIN_KEY).await?;
        match serde_json::from_str::<ChainId>(&raw) {
            Ok(id) => Some(get_chain_by_id(id)),
            Err(e) => {
                tracing::warn!("ignoring malformed persisted chain {:?}: {}", raw, e);
                None
            }
        }
    }

    async fn persist_chain(&self, chain_id: ChainId) {
        self.persist(ACTIVE_CHAIN_KEY, &chain_id.to_string()).await;
    }

    /// Active wallet first, then the rest in connection order.
    async fn persist_connected_ids(&self) {
        let active = self.active.get().map(|s| s.wallet_id());
        let mut ids: Vec<WalletId> = active.iter().cloned().collect();
        for wallet in self.connected.get() {
            let id = wallet.id();
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
        match serde_json::to_string(&ids) {
            Ok(json) => self.persist(CONNECTED_WALLET_IDS_KEY, &json).await,
            Err(e) => tracing::warn!("failed to encode connected wallet ids: {}", e),
        }
    }

    async fn read(&self, key: &str) -> Option<String> {
        match self.storage.get_item(key).await {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(key, "storage read failed: {}", e);
                None
            }
        }
    }

    async fn persist(&self, key: &str, value: &str) {
        if let Err(e) = self.storage.set_item(key, value).await {
            tracing::warn!(key, "storage write failed: {}", e);
        }
    }

    async fn forget(&self, key: &str) {
        if let Err(e) = self.storage.remove_item(key).await {
            tracing::warn!(key, "storage remove failed: {}", e);
        }
    }
}

fn find_wallet(wallets: &[Arc<dyn Wallet>], id: &str) -> Option<Arc<dyn Wallet>> {
    wallets.iter().find(|w| w.id().as_str() == id).cloned()
}

async fn with_timeout<F>(attempt: F, timeout: Option<Duration>) -> Result<Arc<dyn Account>, SdkError>
where
    F: Future<Output = Result<Arc<dyn Account>, WalletError>> + Unpin,
{
    let Some(timeout) = timeout else {
        return attempt.await.map_err(Into::into);
    };
    match select(attempt, Delay::new(timeout)).await {
        Either::Left((result, _)) => result.map_err(Into::into),
        Either::Right(_) => Err(SdkError::AutoConnectTimeout(timeout.as_millis() as u64)),
    }
}

// ═════════════════════════════════════════════════════════════════════════════
// Builder
// ═════════════════════════════════════════════════════════════════════════════

pub struct ConnectionManagerBuilder {
    storage: Option<Arc<dyn AsyncStorage>>,
    auto_connect_timeout: Option<Duration>,
}

impl Default for ConnectionManagerBuilder {
    fn default() -> Self {
        Self {
            storage: None,
            auto_connect_timeout: Some(DEFAULT_AUTO_CONNECT_TIMEOUT),
        }
    }
}

impl ConnectionManagerBuilder {
    pub fn storage(mut self, storage: Arc<dyn AsyncStorage>) -> Self {
        self.storage = Some(storage);
        self
    }

    /// `None` disables the bound.
    pub fn auto_connect_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.auto_connect_timeout = timeout;
        self
    }

    pub fn build(self) -> ConnectionManager {
        ConnectionManager {
            storage: self.storage.unwrap_or_else(default_storage),
            active: Store::new(None),
            status: Store::new(ConnectionStatus::Unknown),
            is_auto_connecting: Store::new(false),
            connected: Store::new(Vec::new()),
            events: Listeners::new(),
            op_lock: Arc::new(Mutex::new(())),
            auto_connect_timeout: self.auto_connect_timeout,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;
    use crate::wallet::injected::InjectedWallet;
    use crate::wallet::eip1193::testing::MockProvider;
    use futures::StreamExt;

    const ALICE: &str = "0x00000000000000000000000000000000000a11ce";

    fn provider() -> Arc<MockProvider> {
        let p = Arc::new(MockProvider::new());
        p.respond("eth_requestAccounts", Ok(serde_json::json!([ALICE])));
        p.respond("eth_accounts", Ok(serde_json::json!([ALICE])));
        p.respond("eth_chainId", Ok(serde_json::json!("0x1")));
        p.respond("wallet_switchEthereumChain", Ok(serde_json::Value::Null));
        p
    }

    fn manager(storage: Arc<MemoryStorage>) -> ConnectionManager {
        ConnectionManager::builder().storage(storage).build()
    }

    #[tokio::test]
    async fn test_initial_state() {
        let m = manager(Arc::new(MemoryStorage::new()));
        assert_eq!(m.status(), ConnectionStatus::Unknown);
        assert!(m.active_session().is_none());
        assert!(!m.is_auto_connecting.get());
    }

    #[tokio::test]
    async fn test_connect_persists_id_chain_and_list() {
        let storage = Arc::new(MemoryStorage::new());
        let m = manager(storage.clone());
        let wallet: Arc<dyn Wallet> = Arc::new(InjectedWallet::new("io.metamask", provider()));

        m.connect(wallet, ConnectOptions::default()).await.unwrap();
        assert_eq!(m.status(), ConnectionStatus::Connected);
        assert_eq!(
            storage.get_item(ACTIVE_WALLET_ID_KEY).await.unwrap().as_deref(),
            Some("io.metamask")
        );
        assert_eq!(
            storage.get_item(ACTIVE_CHAIN_KEY).await.unwrap().as_deref(),
            Some("1")
        );
        assert_eq!(
            storage.get_item(CONNECTED_WALLET_IDS_KEY).await.unwrap().as_deref(),
            Some(r#"["io.metamask"]"#)
        );
    }

    #[tokio::test]
    async fn test_switch_chain_emits_chain_changed() {
        let m = manager(Arc::new(MemoryStorage::new()));
        let p = provider();
        let wallet: Arc<dyn Wallet> = Arc::new(InjectedWallet::new("io.metamask", p.clone()));
        m.connect(wallet, ConnectOptions::default()).await.unwrap();

        let mut events = m.subscribe_events();
        m.switch_chain(&crate::chain::polygon()).await.unwrap();
        assert_eq!(
            events.next().await,
            Some(ManagerEvent::ChainChanged {
                wallet_id: WalletId::from("io.metamask"),
                chain_id: 137
            })
        );
        assert_eq!(m.active_session().map(|s| s.chain.id), Some(137));
        assert_eq!(p.count("wallet_switchEthereumChain"), 1);
    }

    #[tokio::test]
    async fn test_switch_chain_fast_path_persists_reported_chain() {
        let storage = Arc::new(MemoryStorage::new());
        let m = manager(storage.clone());
        let p = provider();
        let wallet: Arc<dyn Wallet> = Arc::new(InjectedWallet::new("io.metamask", p.clone()));
        m.connect(wallet.clone(), ConnectOptions::default()).await.unwrap();

        // The wallet moves on its own; the session still says chain 1.
        wallet.switch_chain(&crate::chain::polygon()).await.unwrap();
        m.switch_chain(&crate::chain::polygon()).await.unwrap();

        assert_eq!(p.count("wallet_switchEthereumChain"), 1);
        assert_eq!(m.active_session().map(|s| s.chain.id), Some(137));
        assert_eq!(
            storage.get_item(ACTIVE_CHAIN_KEY).await.unwrap().as_deref(),
            Some("137")
        );
    }

    #[tokio::test]
    async fn test_auto_connect_does_not_switch_to_persisted_chain() {
        let storage = Arc::new(MemoryStorage::new());
        storage.set_item(ACTIVE_WALLET_ID_KEY, "io.metamask").await.unwrap();
        storage.set_item(ACTIVE_CHAIN_KEY, "137").await.unwrap();
        let m = manager(storage.clone());
        let p = provider();
        let wallet: Arc<dyn Wallet> = Arc::new(InjectedWallet::new("io.metamask", p.clone()));

        let account = m
            .auto_connect(AutoConnectOptions::new(vec![wallet]))
            .await
            .unwrap();
        assert!(account.is_some());
        assert_eq!(p.count("eth_requestAccounts"), 0);
        assert_eq!(p.count("wallet_switchEthereumChain"), 0);
        assert_eq!(p.count("wallet_addEthereumChain"), 0);
        assert_eq!(m.active_session().map(|s| s.chain.id), Some(1));
        assert_eq!(
            storage.get_item(ACTIVE_CHAIN_KEY).await.unwrap().as_deref(),
            Some("1")
        );
    }

    #[tokio::test]
    async fn test_disconnect_of_unknown_wallet_emits_nothing() {
        let m = manager(Arc::new(MemoryStorage::new()));
        let stranger: Arc<dyn Wallet> = Arc::new(InjectedWallet::new("io.rabby", provider()));
        let wallet: Arc<dyn Wallet> = Arc::new(InjectedWallet::new("io.metamask", provider()));

        let mut events = m.subscribe_events();
        m.disconnect(&stranger).await.unwrap();
        m.connect(wallet, ConnectOptions::default()).await.unwrap();

        assert_eq!(
            events.next().await,
            Some(ManagerEvent::Connected {
                wallet_id: WalletId::from("io.metamask"),
                address: crate::shared::Address::parse(ALICE).unwrap(),
                chain_id: 1,
            })
        );
    }

    #[tokio::test]
    async fn test_switch_chain_without_active_wallet() {
        let m = manager(Arc::new(MemoryStorage::new()));
        let err = m.switch_chain(&crate::chain::base()).await.unwrap_err();
        assert!(matches!(err, SdkError::NoActiveWallet));
    }

    #[tokio::test]
    async fn test_set_active_wallet_requires_connection() {
        let m = manager(Arc::new(MemoryStorage::new()));
        let wallet: Arc<dyn Wallet> = Arc::new(InjectedWallet::new("io.metamask", provider()));
        let err = m.set_active_wallet(wallet).await.unwrap_err();
        assert!(matches!(err, SdkError::WalletNotFound(_)));
    }

    #[tokio::test]
    async fn test_malformed_persisted_chain_is_ignored() {
        let storage = Arc::new(MemoryStorage::new());
        storage.set_item(ACTIVE_CHAIN_KEY, "not-a-number").await.unwrap();
        let m = manager(storage);
        assert!(m.persisted_chain().await.is_none());
    }

    #[tokio::test]
    async fn test_with_timeout_expires() {
        let never = Box::pin(futures::future::pending::<Result<Arc<dyn Account>, WalletError>>());
        let err = with_timeout(never, Some(Duration::from_millis(10)))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, SdkError::AutoConnectTimeout(10)));
    }
}
