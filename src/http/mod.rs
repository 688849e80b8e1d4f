//! HTTP transport: `ApiHttp` with per-request retry policies.
//!
//! Shared by the in-app wallet (auth service), the JSON-RPC client (chain
//! nodes, bundlers, paymasters) and anything else that talks to a hosted API.

pub mod client;
pub mod retry;

pub use client::ApiHttp;
pub use retry::{RetryConfig, RetryPolicy};
