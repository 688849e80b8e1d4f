//! Injected wallets: browser extensions and anything else exposing EIP-1193.

use async_lock::RwLock;
use async_trait::async_trait;
use std::sync::Arc;

use crate::chain::{get_chain_by_id, Chain};
use crate::error::WalletError;
use crate::shared::WalletId;
use crate::wallet::eip1193::{self, Eip1193Account, Eip1193Provider};
use crate::wallet::{Account, ConnectOptions, Wallet};

struct Connection {
    account: Arc<dyn Account>,
    chain: Chain,
}

/// A wallet backed by an injected EIP-1193 provider, identified by its RDNS
/// id (e.g. `"io.metamask"`).
pub struct InjectedWallet {
    id: WalletId,
    provider: Arc<dyn Eip1193Provider>,
    connection: RwLock<Option<Connection>>,
}

impl InjectedWallet {
    pub fn new(id: impl Into<WalletId>, provider: Arc<dyn Eip1193Provider>) -> Self {
        Self {
            id: id.into(),
            provider,
            connection: RwLock::new(None),
        }
    }

    pub fn provider(&self) -> Arc<dyn Eip1193Provider> {
        self.provider.clone()
    }

    async fn establish(
        &self,
        options: &ConnectOptions,
        silent: bool,
    ) -> Result<Arc<dyn Account>, WalletError> {
        let (address, chain_id) =
            eip1193::connect(self.provider.as_ref(), options.chain.as_ref(), silent).await?;

        let chain = match &options.chain {
            Some(c) if c.id == chain_id => c.clone(),
            _ => get_chain_by_id(chain_id),
        };
        let account: Arc<dyn Account> =
            Arc::new(Eip1193Account::new(address.clone(), self.provider.clone()));

        tracing::debug!(wallet = %self.id, %address, chain_id, silent, "injected wallet connected");
        *self.connection.write().await = Some(Connection {
            account: account.clone(),
            chain,
        });
        Ok(account)
    }
}

#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
impl Wallet for InjectedWallet {
    fn id(&self) -> WalletId {
        self.id.clone()
    }

    async fn connect(&self, options: ConnectOptions) -> Result<Arc<dyn Account>, WalletError> {
        self.establish(&options, false).await
    }

    async fn auto_connect(
        &self,
        options: ConnectOptions,
    ) -> Result<Arc<dyn Account>, WalletError> {
        self.establish(&options, true).await
    }

    async fn disconnect(&self) -> Result<(), WalletError> {
        // Not every provider implements revocation (EIP-2255); the local
        // session is dropped regardless.
        if let Err(e) = self
            .provider
            .request(
                "wallet_revokePermissions",
                serde_json::json!([{ "eth_accounts": {} }]),
            )
            .await
        {
            tracing::debug!(wallet = %self.id, "wallet_revokePermissions failed: {}", e);
        }
        *self.connection.write().await = None;
        Ok(())
    }

    async fn switch_chain(&self, chain: &Chain) -> Result<(), WalletError> {
        eip1193::switch_chain(self.provider.as_ref(), chain).await?;
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::{base, polygon};
    use crate::wallet::eip1193::testing::MockProvider;
    use crate::wallet::eip1193::ProviderError;

    const ALICE: &str = "0x00000000000000000000000000000000000a11ce";

    fn connected_provider(chain_hex: &str) -> Arc<MockProvider> {
        let p = Arc::new(MockProvider::new());
        p.respond("eth_requestAccounts", Ok(serde_json::json!([ALICE])));
        p.respond("eth_accounts", Ok(serde_json::json!([ALICE])));
        p.respond("eth_chainId", Ok(serde_json::json!(chain_hex)));
        p
    }

    #[tokio::test]
    async fn test_connect_records_account_and_chain() {
        let p = connected_provider("0x2105");
        let wallet = InjectedWallet::new("io.metamask", p.clone());

        let account = wallet.connect(ConnectOptions::default()).await.unwrap();
        assert_eq!(account.address().as_str(), ALICE);
        assert_eq!(wallet.get_chain().await, Some(base()));
        assert!(wallet.get_account().await.is_some());
    }

    #[tokio::test]
    async fn test_auto_connect_never_prompts() {
        let p = connected_provider("0x1");
        let wallet = InjectedWallet::new("io.metamask", p.clone());
        wallet.auto_connect(ConnectOptions::default()).await.unwrap();
        assert_eq!(p.count("eth_requestAccounts"), 0);
        assert_eq!(p.count("eth_accounts"), 1);
    }

    #[tokio::test]
    async fn test_disconnect_clears_even_if_revoke_unsupported() {
        let p = connected_provider("0x1");
        let wallet = InjectedWallet::new("io.metamask", p.clone());
        wallet.connect(ConnectOptions::default()).await.unwrap();

        wallet.disconnect().await.unwrap();
        assert!(wallet.get_account().await.is_none());
        assert!(wallet.get_chain().await.is_none());
        assert_eq!(p.count("wallet_revokePermissions"), 1);
    }

    #[tokio::test]
    async fn test_switch_chain_updates_chain() {
        let p = connected_provider("0x1");
        p.respond("wallet_switchEthereumChain", Ok(serde_json::Value::Null));
        let wallet = InjectedWallet::new("io.metamask", p.clone());
        wallet.connect(ConnectOptions::default()).await.unwrap();

        wallet.switch_chain(&polygon()).await.unwrap();
        assert_eq!(wallet.get_chain().await.map(|c| c.id), Some(137));
    }

    #[tokio::test]
    async fn test_failed_switch_keeps_chain() {
        let p = connected_provider("0x1");
        p.respond(
            "wallet_switchEthereumChain",
            Err(ProviderError::new(4001, "rejected")),
        );
        let wallet = InjectedWallet::new("io.metamask", p.clone());
        wallet.connect(ConnectOptions::default()).await.unwrap();

        let err = wallet.switch_chain(&polygon()).await.unwrap_err();
        assert!(matches!(err, WalletError::UserRejected));
        assert_eq!(wallet.get_chain().await.map(|c| c.id), Some(1));
    }
}
