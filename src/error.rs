//! Unified SDK error types.

use thiserror::Error;

use crate::shared::WalletId;

/// Top-level SDK error.
///
/// Errors raised by a wallet or its provider are wrapped, never reinterpreted:
/// `SdkError::Wallet(e)` carries exactly what the wallet returned.
#[derive(Error, Debug)]
pub enum SdkError {
    #[error("Wallet error: {0}")]
    Wallet(#[from] WalletError),

    #[error("HTTP error: {0}")]
    Http(#[from] HttpError),

    #[error("RPC error: {0}")]
    Rpc(#[from] RpcError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("No active wallet")]
    NoActiveWallet,

    #[error("Wallet not found: {0}")]
    WalletNotFound(WalletId),

    #[error("Auto-connect timed out after {0}ms")]
    AutoConnectTimeout(u64),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// HTTP-layer errors.
#[derive(Error, Debug)]
pub enum HttpError {
    #[error("Request failed: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Server error {status}: {body}")]
    ServerError { status: u16, body: String },

    #[error("Rate limited (retry after {retry_after_ms:?}ms)")]
    RateLimited { retry_after_ms: Option<u64> },

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Timeout")]
    Timeout,

    #[error("Max retries exceeded after {attempts} attempts: {last_error}")]
    MaxRetriesExceeded { attempts: u32, last_error: String },
}

/// JSON-RPC errors (chain nodes and bundlers).
#[derive(Error, Debug)]
pub enum RpcError {
    #[error("Transport error: {0}")]
    Http(#[from] HttpError),

    #[error("RPC error {code}: {message}")]
    Rpc {
        code: i64,
        message: String,
        data: Option<serde_json::Value>,
    },

    #[error("Invalid RPC response: {0}")]
    InvalidResponse(String),
}

/// Errors raised by wallets and accounts.
#[derive(Error, Debug)]
pub enum WalletError {
    #[error("User rejected the request")]
    UserRejected,

    #[error("Provider error {code}: {message}")]
    Provider { code: i64, message: String },

    #[error("Wallet not connected")]
    NotConnected,

    #[error("Smart wallet requires a personal account")]
    MissingPersonalAccount,

    #[error("Missing auth strategy for in-app wallet")]
    MissingAuthStrategy,

    #[error("Unsupported operation: {0}")]
    Unsupported(&'static str),

    #[error("Not authenticated")]
    NotAuthenticated,

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("HTTP error: {0}")]
    Http(#[from] HttpError),

    #[error("RPC error: {0}")]
    Rpc(#[from] RpcError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Storage adapter errors.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    #[error("Write failed for key {key}: {reason}")]
    WriteFailed { key: String, reason: String },
}

/// Client configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("clientId is required")]
    MissingClientId,

    #[error("Invalid URL for {field}: {value}")]
    InvalidUrl { field: &'static str, value: String },

    #[error("Failed to build HTTP client: {0}")]
    HttpClient(String),
}
