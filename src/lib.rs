//! # thirdweb-connect
//!
//! Wallet connection and session management for EVM chains, for native and
//! WASM targets.
//!
//! ## Architecture
//!
//! The crate is organized in layers:
//!
//! 1. **Core**: Newtypes, chain descriptors, errors, storage adapter
//! 2. **Transport**: `ApiHttp` with per-call retry policies, JSON-RPC client
//! 3. **Wallets**: `Wallet` trait with injected, WalletConnect, in-app and smart-account variants
//! 4. **Connection Manager**: Observable active wallet, chain and status
//! 5. **Subscriptions**: Read/subscribe handles over manager state
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use thirdweb_connect::prelude::*;
//!
//! let client = Client::builder().client_id("your-client-id").build()?;
//! let manager = ConnectionManager::new(&client);
//!
//! let wallet: Arc<dyn Wallet> = Arc::new(InjectedWallet::new("io.metamask", provider));
//! let account = manager.connect(wallet, ConnectOptions::default()).await?;
//! manager.switch_chain(&base()).await?;
//!
//! let mut status = manager.connection_status().changes();
//! ```

// ── Layer 1: Core ────────────────────────────────────────────────────────────

/// Shared newtypes and observable stores.
pub mod shared;

/// Chain descriptors and the built-in chains.
pub mod chain;

/// Unified error types.
pub mod error;

/// Network URL and contract address constants.
pub mod network;

/// Async key/value storage for session persistence.
pub mod storage;

// ── Layer 2: Transport ───────────────────────────────────────────────────────

/// HTTP client with retry policies.
pub mod http;

/// JSON-RPC client for nodes and bundlers.
pub mod rpc;

/// `Client`: client id, endpoints and storage.
pub mod client;

// ── Layer 3: Wallets ─────────────────────────────────────────────────────────

/// The `Wallet` / `Account` traits and their variants.
pub mod wallet;

// ── Layer 4: Connection Manager ──────────────────────────────────────────────

/// `ConnectionManager`: active wallet, chain and status.
pub mod manager;

// ── Layer 5: Subscriptions ───────────────────────────────────────────────────

/// Hook-style read/subscribe handles.
pub mod subscriptions;

// ── Prelude ──────────────────────────────────────────────────────────────────

pub mod prelude {
    pub use std::sync::Arc;

    // Shared newtypes
    pub use crate::shared::{Address, ChainId, TxHash, WalletId};

    // Chains
    pub use crate::chain::{
        arbitrum, base, base_sepolia, define_chain, ethereum, get_chain_by_id, optimism, polygon,
        sepolia, Chain,
    };

    // Errors
    pub use crate::error::{SdkError, WalletError};

    // Configuration
    pub use crate::client::{Client, ClientBuilder};
    pub use crate::http::retry::{RetryConfig, RetryPolicy};

    // Storage
    pub use crate::storage::{AsyncStorage, MemoryStorage};

    // Wallets
    pub use crate::wallet::eip1193::{Eip1193Provider, ProviderError};
    pub use crate::wallet::in_app::{InAppAuth, InAppWallet, OtpChannel};
    pub use crate::wallet::injected::InjectedWallet;
    pub use crate::wallet::smart::{SmartWallet, SmartWalletOptions};
    pub use crate::wallet::wallet_connect::{WalletConnectSession, WalletConnectWallet};
    pub use crate::wallet::{Account, ConnectOptions, TransactionRequest, Wallet};

    // Connection manager
    pub use crate::manager::{
        ActiveSession, AutoConnectOptions, ConnectionManager, ConnectionStatus, ManagerEvent,
    };

    // Subscriptions
    pub use crate::subscriptions::{DisconnectHandle, Subscription};
}
