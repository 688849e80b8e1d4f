//! ERC-4337 v0.6 user operations and the bundler/paymaster JSON-RPC surface.

use futures_timer::Delay;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{RpcError, WalletError};
use crate::http::RetryPolicy;
use crate::rpc::RpcClient;
use crate::shared::{Address, ChainId, TxHash};

use super::abi::{address_word, keccak256, uint_word};

/// Placeholder signature accepted by the account's validation during gas
/// estimation. Shaped like a real ECDSA signature so estimates match.
pub const DUMMY_SIGNATURE: &str = "0xfffffffffffffffffffffffffffffff0000000000000000000000000000000007aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa1c";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserOperation {
    pub sender: Address,
    #[serde(with = "quantity")]
    pub nonce: u128,
    #[serde(with = "data")]
    pub init_code: Vec<u8>,
    #[serde(with = "data")]
    pub call_data: Vec<u8>,
    #[serde(with = "quantity")]
    pub call_gas_limit: u128,
    #[serde(with = "quantity")]
    pub verification_gas_limit: u128,
    #[serde(with = "quantity")]
    pub pre_verification_gas: u128,
    #[serde(with = "quantity")]
    pub max_fee_per_gas: u128,
    #[serde(with = "quantity")]
    pub max_priority_fee_per_gas: u128,
    #[serde(with = "data")]
    pub paymaster_and_data: Vec<u8>,
    #[serde(with = "data")]
    pub signature: Vec<u8>,
}

impl UserOperation {
    /// An unsigned, unsponsored operation with zeroed gas fields.
    pub fn new(sender: Address, nonce: u128, init_code: Vec<u8>, call_data: Vec<u8>) -> Self {
        Self {
            sender,
            nonce,
            init_code,
            call_data,
            call_gas_limit: 0,
            verification_gas_limit: 0,
            pre_verification_gas: 0,
            max_fee_per_gas: 0,
            max_priority_fee_per_gas: 0,
            paymaster_and_data: Vec::new(),
            signature: Vec::new(),
        }
    }

    /// `abi.encode` of every field except the signature, dynamic fields hashed.
    pub fn pack(&self) -> Vec<u8> {
        let words: [[u8; 32]; 10] = [
            address_word(&self.sender),
            uint_word(self.nonce),
            keccak256(&self.init_code),
            keccak256(&self.call_data),
            uint_word(self.call_gas_limit),
            uint_word(self.verification_gas_limit),
            uint_word(self.pre_verification_gas),
            uint_word(self.max_fee_per_gas),
            uint_word(self.max_priority_fee_per_gas),
            keccak256(&self.paymaster_and_data),
        ];
        words.concat()
    }

    /// `keccak256(abi.encode(keccak256(pack(op)), entryPoint, chainId))`
    pub fn hash(&self, entry_point: &Address, chain_id: ChainId) -> [u8; 32] {
        let mut buf = Vec::with_capacity(96);
        buf.extend_from_slice(&keccak256(&self.pack()));
        buf.extend_from_slice(&address_word(entry_point));
        buf.extend_from_slice(&uint_word(chain_id as u128));
        keccak256(&buf)
    }
}

mod quantity {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &u128, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&crate::shared::hex::quantity(*value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<u128, D::Error> {
        let s = String::deserialize(d)?;
        crate::shared::hex::parse_hex_u128(&s).map_err(serde::de::Error::custom)
    }
}

mod data {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &[u8], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&crate::shared::hex::to_hex(value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(d)?;
        crate::shared::hex::decode(&s).map_err(serde::de::Error::custom)
    }
}

// ─── Bundler responses ───────────────────────────────────────────────────────

/// `eth_estimateUserOperationGas`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GasEstimate {
    #[serde(with = "quantity")]
    pub pre_verification_gas: u128,
    #[serde(with = "quantity")]
    pub verification_gas_limit: u128,
    #[serde(with = "quantity")]
    pub call_gas_limit: u128,
}

/// `pm_sponsorUserOperation`. Gas limits are present when the paymaster
/// estimated them itself.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sponsorship {
    #[serde(with = "data")]
    pub paymaster_and_data: Vec<u8>,
    #[serde(default, with = "opt_quantity")]
    pub pre_verification_gas: Option<u128>,
    #[serde(default, with = "opt_quantity")]
    pub verification_gas_limit: Option<u128>,
    #[serde(default, with = "opt_quantity")]
    pub call_gas_limit: Option<u128>,
}

mod opt_quantity {
    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<u128>, D::Error> {
        Option::<String>::deserialize(d)?
            .map(|s| crate::shared::hex::parse_hex_u128(&s).map_err(serde::de::Error::custom))
            .transpose()
    }
}

/// `eth_getUserOperationReceipt`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserOperationReceipt {
    pub user_op_hash: String,
    pub success: bool,
    #[serde(default)]
    pub reason: Option<String>,
    pub receipt: TransactionReceipt,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionReceipt {
    pub transaction_hash: TxHash,
}

// ─── Bundler client ──────────────────────────────────────────────────────────

/// Bundler + paymaster endpoint for one chain.
#[derive(Clone)]
pub struct Bundler {
    rpc: RpcClient,
    entry_point: Address,
}

impl Bundler {
    pub fn new(rpc: RpcClient, entry_point: Address) -> Self {
        Self { rpc, entry_point }
    }

    pub fn entry_point(&self) -> &Address {
        &self.entry_point
    }

    pub async fn sponsor(&self, op: &UserOperation) -> Result<Sponsorship, RpcError> {
        self.rpc
            .call(
                "pm_sponsorUserOperation",
                serde_json::json!([op, self.entry_point]),
                RetryPolicy::Idempotent,
            )
            .await
    }

    pub async fn estimate_gas(&self, op: &UserOperation) -> Result<GasEstimate, RpcError> {
        self.rpc
            .call(
                "eth_estimateUserOperationGas",
                serde_json::json!([op, self.entry_point]),
                RetryPolicy::Idempotent,
            )
            .await
    }

    /// Submit a signed operation. Returns the bundler's user-op hash.
    pub async fn send(&self, op: &UserOperation) -> Result<String, RpcError> {
        self.rpc
            .call(
                "eth_sendUserOperation",
                serde_json::json!([op, self.entry_point]),
                RetryPolicy::None,
            )
            .await
    }

    pub async fn receipt(&self, user_op_hash: &str) -> Result<Option<UserOperationReceipt>, RpcError> {
        self.rpc
            .call(
                "eth_getUserOperationReceipt",
                serde_json::json!([user_op_hash]),
                RetryPolicy::Idempotent,
            )
            .await
    }

    /// Poll for the receipt every `interval`, at most `attempts` times.
    pub async fn wait_for_receipt(
        &self,
        user_op_hash: &str,
        interval: Duration,
        attempts: u32,
    ) -> Result<UserOperationReceipt, WalletError> {
        for attempt in 0..attempts {
            if let Some(receipt) = self.receipt(user_op_hash).await? {
                if !receipt.success {
                    return Err(WalletError::InvalidResponse(format!(
                        "user operation {} reverted: {}",
                        user_op_hash,
                        receipt.reason.as_deref().unwrap_or("unknown reason")
                    )));
                }
                return Ok(receipt);
            }
            tracing::trace!(user_op_hash, attempt, "user operation receipt not yet available");
            if attempt + 1 < attempts {
                Delay::new(interval).await;
            }
        }
        Err(WalletError::Timeout(format!(
            "no receipt for user operation {} after {} attempts",
            user_op_hash, attempts
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::ENTRYPOINT_ADDRESS_V0_6;
    use crate::wallet::smart::abi::execute_call;

    fn sample() -> UserOperation {
        let call_data = execute_call(
            &Address::parse("0x2222222222222222222222222222222222222222").unwrap(),
            1000,
            &[],
        );
        let mut op = UserOperation::new(
            Address::parse("0x1111111111111111111111111111111111111111").unwrap(),
            0,
            Vec::new(),
            call_data,
        );
        op.call_gas_limit = 100_000;
        op.verification_gas_limit = 200_000;
        op.pre_verification_gas = 50_000;
        op.max_fee_per_gas = 2_000_000_000;
        op.max_priority_fee_per_gas = 1_000_000_000;
        op
    }

    #[test]
    fn test_hash_matches_fixed_vector() {
        let entry_point = Address::parse(ENTRYPOINT_ADDRESS_V0_6).unwrap();
        let hash = sample().hash(&entry_point, 8453);
        assert_eq!(
            hex::encode(hash),
            "8c999bbd19c3c8a004a65c7bb828b9bd5c2ff4723009d45ce4cd065822c636ff"
        );
    }

    #[test]
    fn test_hash_ignores_signature_but_binds_chain() {
        let entry_point = Address::parse(ENTRYPOINT_ADDRESS_V0_6).unwrap();
        let op = sample();
        let mut signed = op.clone();
        signed.signature = vec![1, 2, 3];
        assert_eq!(op.hash(&entry_point, 1), signed.hash(&entry_point, 1));
        assert_ne!(op.hash(&entry_point, 1), op.hash(&entry_point, 137));
    }

    #[test]
    fn test_pack_is_ten_words() {
        assert_eq!(sample().pack().len(), 320);
    }

    #[test]
    fn test_wire_format() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["sender"], "0x1111111111111111111111111111111111111111");
        assert_eq!(json["nonce"], "0x0");
        assert_eq!(json["initCode"], "0x");
        assert_eq!(json["callGasLimit"], "0x186a0");
        assert_eq!(json["maxFeePerGas"], "0x77359400");
        assert_eq!(json["paymasterAndData"], "0x");

        let back: UserOperation = serde_json::from_value(json).unwrap();
        assert_eq!(back, sample());
    }

    #[test]
    fn test_sponsorship_gas_fields_optional() {
        let s: Sponsorship =
            serde_json::from_value(serde_json::json!({ "paymasterAndData": "0xabcd" })).unwrap();
        assert_eq!(s.paymaster_and_data, vec![0xab, 0xcd]);
        assert_eq!(s.call_gas_limit, None);

        let s: Sponsorship = serde_json::from_value(serde_json::json!({
            "paymasterAndData": "0x",
            "callGasLimit": "0x10",
            "verificationGasLimit": "0x20",
            "preVerificationGas": "0x30"
        }))
        .unwrap();
        assert_eq!(s.call_gas_limit, Some(16));
        assert_eq!(s.pre_verification_gas, Some(48));
    }

    #[test]
    fn test_dummy_signature_is_65_bytes() {
        assert_eq!(crate::shared::hex::decode(DUMMY_SIGNATURE).unwrap().len(), 65);
    }
}
