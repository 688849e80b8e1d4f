//! JSON-RPC client for chain nodes, bundlers and paymasters.
//!
//! One `RpcClient` per endpoint. Reads use the idempotent retry policy;
//! anything that submits (`eth_sendRawTransaction`, `eth_sendUserOperation`)
//! goes out exactly once.

pub mod wire;

use serde::de::DeserializeOwned;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::error::RpcError;
use crate::http::{ApiHttp, RetryPolicy};
use crate::shared::hex::{parse_hex_u128, parse_hex_u64};
use crate::shared::{Address, ChainId, TxHash};

use wire::{BlockHeader, CallRequest, RpcRequest, RpcResponse};

/// EIP-1559 fee suggestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeEstimate {
    pub max_fee_per_gas: u128,
    pub max_priority_fee_per_gas: u128,
}

impl FeeEstimate {
    /// `2 × base fee + tip`; pre-London chains use the legacy gas price for both.
    pub fn from_parts(base_fee: Option<u128>, priority_fee: u128, gas_price: u128) -> Self {
        match base_fee {
            Some(base) => Self {
                max_fee_per_gas: base.saturating_mul(2).saturating_add(priority_fee),
                max_priority_fee_per_gas: priority_fee,
            },
            None => Self {
                max_fee_per_gas: gas_price,
                max_priority_fee_per_gas: gas_price,
            },
        }
    }
}

pub struct RpcClient {
    http: ApiHttp,
    next_id: Arc<AtomicU64>,
}

impl RpcClient {
    pub fn new(http: ApiHttp) -> Self {
        Self {
            http,
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    pub fn url(&self) -> &str {
        self.http.base_url()
    }

    /// Send a raw JSON-RPC call and deserialize `result`.
    pub async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: serde_json::Value,
        retry: RetryPolicy,
    ) -> Result<T, RpcError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = RpcRequest::new(id, method, params);
        tracing::trace!(method, id, url = self.url(), "rpc call");

        let response: RpcResponse = self.http.post(self.http.base_url(), &request, retry).await?;
        decode_response(method, response)
    }

    // ── Reads ────────────────────────────────────────────────────────────

    pub async fn chain_id(&self) -> Result<ChainId, RpcError> {
        let hex: String = self
            .call("eth_chainId", serde_json::json!([]), RetryPolicy::Idempotent)
            .await?;
        parse_hex_u64(&hex).map_err(RpcError::InvalidResponse)
    }

    pub async fn block_number(&self) -> Result<u64, RpcError> {
        let hex: String = self
            .call("eth_blockNumber", serde_json::json!([]), RetryPolicy::Idempotent)
            .await?;
        parse_hex_u64(&hex).map_err(RpcError::InvalidResponse)
    }

    pub async fn get_balance(&self, address: &Address) -> Result<u128, RpcError> {
        let hex: String = self
            .call(
                "eth_getBalance",
                serde_json::json!([address, "latest"]),
                RetryPolicy::Idempotent,
            )
            .await?;
        parse_hex_u128(&hex).map_err(RpcError::InvalidResponse)
    }

    /// Deployed bytecode at `address` (`"0x"` when none).
    pub async fn get_code(&self, address: &Address) -> Result<String, RpcError> {
        self.call(
            "eth_getCode",
            serde_json::json!([address, "latest"]),
            RetryPolicy::Idempotent,
        )
        .await
    }

    pub async fn get_transaction_count(&self, address: &Address) -> Result<u64, RpcError> {
        let hex: String = self
            .call(
                "eth_getTransactionCount",
                serde_json::json!([address, "pending"]),
                RetryPolicy::Idempotent,
            )
            .await?;
        parse_hex_u64(&hex).map_err(RpcError::InvalidResponse)
    }

    pub async fn eth_call(&self, call: &CallRequest) -> Result<String, RpcError> {
        self.call(
            "eth_call",
            serde_json::json!([call, "latest"]),
            RetryPolicy::Idempotent,
        )
        .await
    }

    pub async fn estimate_gas(&self, call: &CallRequest) -> Result<u64, RpcError> {
        let hex: String = self
            .call("eth_estimateGas", serde_json::json!([call]), RetryPolicy::Idempotent)
            .await?;
        parse_hex_u64(&hex).map_err(RpcError::InvalidResponse)
    }

    pub async fn gas_price(&self) -> Result<u128, RpcError> {
        let hex: String = self
            .call("eth_gasPrice", serde_json::json!([]), RetryPolicy::Idempotent)
            .await?;
        parse_hex_u128(&hex).map_err(RpcError::InvalidResponse)
    }

    pub async fn max_priority_fee_per_gas(&self) -> Result<u128, RpcError> {
        let hex: String = self
            .call(
                "eth_maxPriorityFeePerGas",
                serde_json::json!([]),
                RetryPolicy::Idempotent,
            )
            .await?;
        parse_hex_u128(&hex).map_err(RpcError::InvalidResponse)
    }

    /// Base fee of the latest block, `None` on pre-London chains.
    pub async fn latest_base_fee(&self) -> Result<Option<u128>, RpcError> {
        let block: BlockHeader = self
            .call(
                "eth_getBlockByNumber",
                serde_json::json!(["latest", false]),
                RetryPolicy::Idempotent,
            )
            .await?;
        block
            .base_fee_per_gas
            .map(|fee| parse_hex_u128(&fee).map_err(RpcError::InvalidResponse))
            .transpose()
    }

    /// Suggested EIP-1559 fees for the next block.
    pub async fn estimate_fees(&self) -> Result<FeeEstimate, RpcError> {
        let base_fee = self.latest_base_fee().await?;
        let gas_price = self.gas_price().await?;
        let priority_fee = match base_fee {
            Some(base) => match self.max_priority_fee_per_gas().await {
                Ok(tip) => tip,
                Err(e) => {
                    tracing::debug!("eth_maxPriorityFeePerGas unavailable, deriving tip: {}", e);
                    gas_price.saturating_sub(base)
                }
            },
            None => gas_price,
        };
        Ok(FeeEstimate::from_parts(base_fee, priority_fee, gas_price))
    }

    // ── Writes ───────────────────────────────────────────────────────────

    pub async fn send_raw_transaction(&self, raw_tx: &str) -> Result<TxHash, RpcError> {
        self.call(
            "eth_sendRawTransaction",
            serde_json::json!([raw_tx]),
            RetryPolicy::None,
        )
        .await
    }
}

impl Clone for RpcClient {
    fn clone(&self) -> Self {
        Self {
            http: self.http.clone(),
            next_id: self.next_id.clone(),
        }
    }
}

fn decode_response<T: DeserializeOwned>(method: &str, response: RpcResponse) -> Result<T, RpcError> {
    if let Some(err) = response.error {
        return Err(RpcError::Rpc {
            code: err.code,
            message: err.message,
            data: err.data,
        });
    }
    let result = response.result.unwrap_or(serde_json::Value::Null);
    serde_json::from_value(result)
        .map_err(|e| RpcError::InvalidResponse(format!("{}: {}", method, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(json: serde_json::Value) -> RpcResponse {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn test_request_envelope() {
        let req = RpcRequest::new(7, "eth_chainId", serde_json::json!([]));
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["jsonrpc"], "2.0");
        assert_eq!(json["id"], 7);
        assert_eq!(json["method"], "eth_chainId");
    }

    #[test]
    fn test_decode_result() {
        let r = response(serde_json::json!({"jsonrpc":"2.0","id":1,"result":"0x2105"}));
        let hex: String = decode_response("eth_chainId", r).unwrap();
        assert_eq!(hex, "0x2105");
    }

    #[test]
    fn test_decode_error_object() {
        let r = response(serde_json::json!({
            "jsonrpc":"2.0","id":1,
            "error":{"code":-32000,"message":"execution reverted","data":"0x08c379a0"}
        }));
        let err = decode_response::<String>("eth_call", r).unwrap_err();
        match err {
            RpcError::Rpc { code, message, data } => {
                assert_eq!(code, -32000);
                assert_eq!(message, "execution reverted");
                assert_eq!(data, Some(serde_json::json!("0x08c379a0")));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_null_result_decodes_into_option() {
        let r = response(serde_json::json!({"jsonrpc":"2.0","id":1,"result":null}));
        let v: Option<String> = decode_response("eth_getUserOperationReceipt", r).unwrap();
        assert!(v.is_none());
    }

    #[test]
    fn test_type_mismatch_is_invalid_response() {
        let r = response(serde_json::json!({"jsonrpc":"2.0","id":1,"result":42}));
        let err = decode_response::<String>("eth_chainId", r).unwrap_err();
        assert!(matches!(err, RpcError::InvalidResponse(m) if m.starts_with("eth_chainId")));
    }

    #[test]
    fn test_fee_estimate_london() {
        let fees = FeeEstimate::from_parts(Some(10), 2, 15);
        assert_eq!(fees.max_fee_per_gas, 22);
        assert_eq!(fees.max_priority_fee_per_gas, 2);
    }

    #[test]
    fn test_fee_estimate_legacy() {
        let fees = FeeEstimate::from_parts(None, 0, 15);
        assert_eq!(fees.max_fee_per_gas, 15);
        assert_eq!(fees.max_priority_fee_per_gas, 15);
    }

    #[test]
    fn test_call_request_skips_empty_fields() {
        let call = CallRequest {
            to: Some("0x00000000000000000000000000000000000000ff".into()),
            data: "0x".into(),
            ..Default::default()
        };
        let json = serde_json::to_value(&call).unwrap();
        assert!(json.get("from").is_none());
        assert!(json.get("value").is_none());
    }

    #[test]
    fn test_deploy_call_request_omits_to() {
        let call = CallRequest {
            data: "0x6080".into(),
            ..Default::default()
        };
        let json = serde_json::to_value(&call).unwrap();
        assert!(json.get("to").is_none());
        assert_eq!(json["data"], "0x6080");
    }
}
