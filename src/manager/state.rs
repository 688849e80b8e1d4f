//! Manager state: connection status, the active session, emitted events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::chain::Chain;
use crate::shared::{Address, ChainId, WalletId};
use crate::wallet::{Account, Wallet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    Connecting,
    Connected,
    Disconnected,
    /// Nothing attempted yet (before the first connect or auto-connect).
    Unknown,
}

impl std::fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Disconnected => "disconnected",
            Self::Unknown => "unknown",
        };
        write!(f, "{}", s)
    }
}

/// The active wallet, its account and chain. Replaced as one value.
pub struct ActiveSession {
    pub wallet: Arc<dyn Wallet>,
    pub account: Arc<dyn Account>,
    pub chain: Chain,
    pub connected_at: DateTime<Utc>,
}

impl ActiveSession {
    pub fn new(wallet: Arc<dyn Wallet>, account: Arc<dyn Account>, chain: Chain) -> Self {
        Self {
            wallet,
            account,
            chain,
            connected_at: Utc::now(),
        }
    }

    pub fn wallet_id(&self) -> WalletId {
        self.wallet.id()
    }

    pub fn address(&self) -> &Address {
        self.account.address()
    }
}

impl Clone for ActiveSession {
    fn clone(&self) -> Self {
        Self {
            wallet: self.wallet.clone(),
            account: self.account.clone(),
            chain: self.chain.clone(),
            connected_at: self.connected_at,
        }
    }
}

impl std::fmt::Debug for ActiveSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActiveSession")
            .field("wallet", &self.wallet.id())
            .field("account", self.account.address())
            .field("chain", &self.chain.id)
            .field("connected_at", &self.connected_at)
            .finish()
    }
}

/// Emitted on every manager state transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManagerEvent {
    Connected {
        wallet_id: WalletId,
        address: Address,
        chain_id: ChainId,
    },
    Disconnected {
        wallet_id: WalletId,
    },
    ChainChanged {
        wallet_id: WalletId,
        chain_id: ChainId,
    },
    AccountChanged {
        wallet_id: WalletId,
        address: Address,
    },
}
