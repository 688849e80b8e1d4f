//! WalletConnect: a mobile or desktop wallet reached through a relay session.
//!
//! The relay protocol itself lives behind [`WalletConnectSession`]; this module
//! drives pairing and then treats the session as an EIP-1193 provider.

use async_lock::RwLock;
use async_trait::async_trait;
use std::sync::Arc;

use crate::chain::{get_chain_by_id, Chain};
use crate::error::WalletError;
use crate::shared::{caip2, ChainId, WalletId};
use crate::wallet::eip1193::{self, Eip1193Account, Eip1193Provider, ProviderError};
use crate::wallet::{Account, ConnectOptions, Wallet};

/// A WalletConnect relay session.
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
pub trait WalletConnectSession: Send + Sync {
    /// Start pairing for the given CAIP-2 chains. Returns the `wc:` URI to
    /// show the user.
    async fn pair(&self, chains: &[String]) -> Result<String, ProviderError>;

    /// Wait until the remote wallet approves the pairing.
    async fn approve(&self) -> Result<(), ProviderError>;

    /// Whether a previously approved session is still alive on the relay.
    async fn is_active(&self) -> bool;

    async fn close(&self) -> Result<(), ProviderError>;

    /// EIP-1193 view of the approved session.
    fn provider(&self) -> Arc<dyn Eip1193Provider>;
}

struct Connection {
    account: Arc<dyn Account>,
    chain: Chain,
}

pub struct WalletConnectWallet {
    session: Arc<dyn WalletConnectSession>,
    /// Chains requested as optional namespaces during pairing.
    optional_chains: Vec<ChainId>,
    connection: RwLock<Option<Connection>>,
}

impl WalletConnectWallet {
    pub fn new(session: Arc<dyn WalletConnectSession>) -> Self {
        Self {
            session,
            optional_chains: Vec::new(),
            connection: RwLock::new(None),
        }
    }

    pub fn with_optional_chains(mut self, chains: &[ChainId]) -> Self {
        self.optional_chains = chains.to_vec();
        self
    }

    fn pairing_chains(&self, target: Option<&Chain>) -> Vec<String> {
        let mut ids: Vec<ChainId> = target.map(|c| vec![c.id]).unwrap_or_default();
        for id in &self.optional_chains {
            if !ids.contains(id) {
                ids.push(*id);
            }
        }
        if ids.is_empty() {
            ids.push(1);
        }
        ids.into_iter().map(caip2).collect()
    }

    /// Reads the session's accounts. Only an interactive connect may switch
    /// the session to the requested chain.
    async fn finish(
        &self,
        options: &ConnectOptions,
        interactive: bool,
    ) -> Result<Arc<dyn Account>, WalletError> {
        let provider = self.session.provider();
        let (address, mut chain_id) =
            eip1193::connect(provider.as_ref(), options.chain.as_ref(), true).await?;
        if let Some(target) = options.chain.as_ref().filter(|_| interactive) {
            if target.id != chain_id {
                eip1193::switch_chain(provider.as_ref(), target).await?;
                chain_id = target.id;
            }
        }
        let chain = match &options.chain {
            Some(c) if c.id == chain_id => c.clone(),
            _ => get_chain_by_id(chain_id),
        };
        let account: Arc<dyn Account> = Arc::new(Eip1193Account::new(address, provider));
        *self.connection.write().await = Some(Connection {
            account: account.clone(),
            chain,
        });
        Ok(account)
    }
}

#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
impl Wallet for WalletConnectWallet {
    fn id(&self) -> WalletId {
        WalletId::from(WalletId::WALLET_CONNECT)
    }

    async fn connect(&self, options: ConnectOptions) -> Result<Arc<dyn Account>, WalletError> {
        let chains = self.pairing_chains(options.chain.as_ref());
        let uri = self.session.pair(&chains).await?;
        tracing::debug!(?chains, "walletconnect pairing started");
        if let Some(on_display_uri) = &options.on_display_uri {
            on_display_uri(&uri);
        }
        self.session.approve().await?;
        self.finish(&options, true).await
    }

    async fn auto_connect(
        &self,
        options: ConnectOptions,
    ) -> Result<Arc<dyn Account>, WalletError> {
        if !self.session.is_active().await {
            return Err(WalletError::NotConnected);
        }
        self.finish(&options, false).await
    }

    async fn disconnect(&self) -> Result<(), WalletError> {
        *self.connection.write().await = None;
        self.session.close().await.map_err(Into::into)
    }

    async fn switch_chain(&self, chain: &Chain) -> Result<(), WalletError> {
        eip1193::switch_chain(self.session.provider().as_ref(), chain).await?;
        if let Some(conn) = self.connection.write().await.as_mut() {
            conn.chain = chain.clone();
        }
        Ok(())
    }

    async fn get_account(&self) -> Option<Arc<dyn Account>> {
        self.connection
            .read()
            .await
            .as_ref()
            .map(|c| c.account.clone())
    }

    async fn get_chain(&self) -> Option<Chain> {
        self.connection.read().await.as_ref().map(|c| c.chain.clone())
    }
}
