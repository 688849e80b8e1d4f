//! Wallets: the capability interface and its variants.
//!
//! Every variant implements [`Wallet`]: connect, auto-connect, disconnect,
//! switch chain, and expose the current [`Account`]. Each variant speaks its own
//! protocol underneath; there is no shared state machine beyond the trait.
//!
//! | Variant | Protocol |
//! |---|---|
//! | [`injected::InjectedWallet`] | EIP-1193 provider (`window.ethereum` or a bridge) |
//! | [`wallet_connect::WalletConnectWallet`] | WalletConnect relay session |
//! | [`in_app::InAppWallet`] | Hosted embedded-wallet auth service |
//! | [`smart::SmartWallet`] | ERC-4337 bundler + paymaster over a personal account |

pub mod eip1193;
pub mod in_app;
pub mod injected;
pub mod smart;
pub mod wallet_connect;

use async_trait::async_trait;
use std::sync::Arc;

use crate::chain::Chain;
use crate::error::WalletError;
use crate::shared::{Address, TxHash, WalletId};

pub use in_app::InAppAuth;

/// An authorized address with signing capability, owned by its wallet.
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
pub trait Account: Send + Sync {
    fn address(&self) -> &Address;

    /// EIP-191 `personal_sign` over `message`. Returns the `0x` signature.
    async fn sign_message(&self, message: &[u8]) -> Result<String, WalletError>;

    async fn send_transaction(&self, tx: &TransactionRequest) -> Result<TxHash, WalletError>;
}

/// A connection method to an account.
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
pub trait Wallet: Send + Sync {
    fn id(&self) -> WalletId;

    /// Interactive connect (may prompt the user).
    async fn connect(&self, options: ConnectOptions) -> Result<Arc<dyn Account>, WalletError>;

    /// Silent reconnect from a previous session. Must never prompt.
    async fn auto_connect(&self, options: ConnectOptions)
        -> Result<Arc<dyn Account>, WalletError>;

    async fn disconnect(&self) -> Result<(), WalletError>;

    async fn switch_chain(&self, chain: &Chain) -> Result<(), WalletError>;

    async fn get_account(&self) -> Option<Arc<dyn Account>>;

    async fn get_chain(&self) -> Option<Chain>;
}

/// Callback receiving a WalletConnect pairing URI (to render as a QR code).
pub type DisplayUriCallback = Arc<dyn Fn(&str) + Send + Sync>;

/// Options for [`Wallet::connect`] / [`Wallet::auto_connect`].
///
/// Each variant reads the fields it needs and ignores the rest.
#[derive(Clone, Default)]
pub struct ConnectOptions {
    /// Chain to land on after connecting.
    pub chain: Option<Chain>,
    /// Auth strategy for in-app wallets.
    pub in_app: Option<InAppAuth>,
    /// Admin signer for smart wallets.
    pub personal_account: Option<Arc<dyn Account>>,
    /// Receives the pairing URI for WalletConnect.
    pub on_display_uri: Option<DisplayUriCallback>,
}

impl ConnectOptions {
    pub fn with_chain(mut self, chain: Chain) -> Self {
        self.chain = Some(chain);
        self
    }

    pub fn with_in_app(mut self, auth: InAppAuth) -> Self {
        self.in_app = Some(auth);
        self
    }

    pub fn with_personal_account(mut self, account: Arc<dyn Account>) -> Self {
        self.personal_account = Some(account);
        self
    }

    pub fn with_display_uri(mut self, callback: DisplayUriCallback) -> Self {
        self.on_display_uri = Some(callback);
        self
    }
}

impl std::fmt::Debug for ConnectOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectOptions")
            .field("chain", &self.chain.as_ref().map(|c| c.id))
            .field("in_app", &self.in_app)
            .field(
                "personal_account",
                &self.personal_account.as_ref().map(|a| a.address().clone()),
            )
            .field("on_display_uri", &self.on_display_uri.is_some())
            .finish()
    }
}

/// A transaction to send from an account.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TransactionRequest {
    pub to: Option<Address>,
    /// Value in wei.
    pub value: u128,
    pub data: Vec<u8>,
    pub gas: Option<u64>,
}

impl TransactionRequest {
    pub fn transfer(to: Address, value: u128) -> Self {
        Self {
            to: Some(to),
            value,
            ..Default::default()
        }
    }

    pub fn call(to: Address, data: Vec<u8>) -> Self {
        Self {
            to: Some(to),
            data,
            ..Default::default()
        }
    }
}

/// Whether two handles point at the same wallet instance.
pub fn same_wallet(a: &Arc<dyn Wallet>, b: &Arc<dyn Wallet>) -> bool {
    Arc::as_ptr(a) as *const () == Arc::as_ptr(b) as *const ()
}
