//! EIP-1193 provider seam and the request flows shared by injected and
//! WalletConnect wallets.

use async_trait::async_trait;
use std::sync::Arc;

use crate::chain::Chain;
use crate::error::WalletError;
use crate::shared::hex::{parse_hex_u64, quantity, to_hex};
use crate::shared::{Address, ChainId, TxHash};
use crate::wallet::{Account, TransactionRequest};

/// User rejected the request.
pub const USER_REJECTED: i64 = 4001;
/// The provider does not know the requested chain.
pub const UNRECOGNIZED_CHAIN: i64 = 4902;

/// Error object returned by an EIP-1193 `request`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("provider error {code}: {message}")]
pub struct ProviderError {
    pub code: i64,
    pub message: String,
}

impl ProviderError {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl From<ProviderError> for WalletError {
    fn from(e: ProviderError) -> Self {
        match e.code {
            USER_REJECTED => WalletError::UserRejected,
            code => WalletError::Provider {
                code,
                message: e.message,
            },
        }
    }
}

/// An EIP-1193 provider: `request({ method, params })`.
///
/// Supplied by the host: the browser's injected provider, a desktop bridge,
/// a WalletConnect session, or a test double.
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
pub trait Eip1193Provider: Send + Sync {
    async fn request(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> Result<serde_json::Value, ProviderError>;
}

// ─── Shared flows ────────────────────────────────────────────────────────────

/// `eth_requestAccounts` (prompting) or `eth_accounts` (silent).
pub async fn request_accounts(
    provider: &dyn Eip1193Provider,
    silent: bool,
) -> Result<Vec<Address>, WalletError> {
    let method = if silent { "eth_accounts" } else { "eth_requestAccounts" };
    let value = provider.request(method, serde_json::json!([])).await?;
    let raw: Vec<String> = serde_json::from_value(value)?;
    raw.iter()
        .map(|a| Address::parse(a).map_err(|e| WalletError::InvalidResponse(e.to_string())))
        .collect()
}

pub async fn chain_id(provider: &dyn Eip1193Provider) -> Result<ChainId, WalletError> {
    let value = provider.request("eth_chainId", serde_json::json!([])).await?;
    // Some providers answer with a decimal number instead of a hex string.
    match value {
        serde_json::Value::String(s) => parse_hex_u64(&s).map_err(WalletError::InvalidResponse),
        serde_json::Value::Number(n) => n
            .as_u64()
            .ok_or_else(|| WalletError::InvalidResponse(format!("chain id {}", n))),
        other => Err(WalletError::InvalidResponse(format!("chain id {}", other))),
    }
}

/// `wallet_switchEthereumChain`, adding the chain first if the provider
/// reports it as unknown.
pub async fn switch_chain(
    provider: &dyn Eip1193Provider,
    chain: &Chain,
) -> Result<(), WalletError> {
    let params = serde_json::json!([{ "chainId": chain.hex_id() }]);
    match provider.request("wallet_switchEthereumChain", params.clone()).await {
        Ok(_) => Ok(()),
        Err(e) if e.code == UNRECOGNIZED_CHAIN => {
            tracing::debug!(chain_id = chain.id, "chain unknown to provider, adding it");
            provider
                .request(
                    "wallet_addEthereumChain",
                    serde_json::json!([chain.to_add_chain_params()]),
                )
                .await?;
            provider.request("wallet_switchEthereumChain", params).await?;
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

/// Connect flow: accounts, then chain, then switch if a target chain was asked for.
/// Returns the first account and the chain id the provider ends up on.
///
/// A silent connect never switches: switching prompts the user, so the
/// provider's current chain is reported as is.
pub async fn connect(
    provider: &dyn Eip1193Provider,
    target: Option<&Chain>,
    silent: bool,
) -> Result<(Address, ChainId), WalletError> {
    let accounts = request_accounts(provider, silent).await?;
    let address = accounts.into_iter().next().ok_or(WalletError::NotConnected)?;

    let mut current = chain_id(provider).await?;
    if let Some(target) = target.filter(|_| !silent) {
        if target.id != current {
            switch_chain(provider, target).await?;
            current = target.id;
        }
    }
    Ok((address, current))
}

// ─── Account ─────────────────────────────────────────────────────────────────

/// An account whose signing is done by an EIP-1193 provider.
pub struct Eip1193Account {
    address: Address,
    provider: Arc<dyn Eip1193Provider>,
}

impl Eip1193Account {
    pub fn new(address: Address, provider: Arc<dyn Eip1193Provider>) -> Self {
        Self { address, provider }
    }
}

#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
impl Account for Eip1193Account {
    fn address(&self) -> &Address {
        &self.address
    }

    async fn sign_message(&self, message: &[u8]) -> Result<String, WalletError> {
        let value = self
            .provider
            .request(
                "personal_sign",
                serde_json::json!([to_hex(message), self.address]),
            )
            .await?;
        serde_json::from_value(value).map_err(Into::into)
    }

    async fn send_transaction(&self, tx: &TransactionRequest) -> Result<TxHash, WalletError> {
        let mut call = serde_json::json!({
            "from": self.address,
            "value": quantity(tx.value),
            "data": to_hex(&tx.data),
        });
        if let Some(to) = &tx.to {
            call["to"] = serde_json::json!(to);
        }
        if let Some(gas) = tx.gas {
            call["gas"] = serde_json::json!(quantity(gas as u128));
        }
        let value = self
            .provider
            .request("eth_sendTransaction", serde_json::json!([call]))
            .await?;
        serde_json::from_value(value).map_err(Into::into)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! A scripted provider that records every request.

    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    pub struct MockProvider {
        pub calls: Mutex<Vec<(String, serde_json::Value)>>,
        responses: Mutex<HashMap<String, Vec<Result<serde_json::Value, ProviderError>>>>,
    }

    impl MockProvider {
        pub fn new() -> Self {
            Self::default()
        }

        /// Queue a response for `method`. The last queued response repeats.
        pub fn respond(&self, method: &str, r: Result<serde_json::Value, ProviderError>) {
            self.responses
                .lock()
                .unwrap()
                .entry(method.to_string())
                .or_default()
                .push(r);
        }

        pub fn methods(&self) -> Vec<String> {
            self.calls.lock().unwrap().iter().map(|(m, _)| m.clone()).collect()
        }

        pub fn count(&self, method: &str) -> usize {
            self.methods().iter().filter(|m| *m == method).count()
        }
    }

    #[async_trait]
    impl Eip1193Provider for MockProvider {
        async fn request(
            &self,
            method: &str,
            params: serde_json::Value,
        ) -> Result<serde_json::Value, ProviderError> {
            self.calls
                .lock()
                .unwrap()
                .push((method.to_string(), params));
            let mut responses = self.responses.lock().unwrap();
            match responses.get_mut(method) {
                Some(queue) if queue.len() > 1 => queue.remove(0),
                Some(queue) if !queue.is_empty() => queue[0].clone(),
                _ => Err(ProviderError::new(4200, format!("unsupported: {}", method))),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::MockProvider;
    use super::*;
    use crate::chain::{base, polygon};

    const ALICE: &str = "0x00000000000000000000000000000000000a11ce";

    #[tokio::test]
    async fn test_connect_without_target_chain() {
        let p = MockProvider::new();
        p.respond("eth_requestAccounts", Ok(serde_json::json!([ALICE])));
        p.respond("eth_chainId", Ok(serde_json::json!("0x2105")));

        let (addr, chain) = connect(&p, None, false).await.unwrap();
        assert_eq!(addr.as_str(), ALICE);
        assert_eq!(chain, 8453);
        assert_eq!(p.methods(), vec!["eth_requestAccounts", "eth_chainId"]);
    }

    #[tokio::test]
    async fn test_silent_connect_uses_eth_accounts() {
        let p = MockProvider::new();
        p.respond("eth_accounts", Ok(serde_json::json!([])));
        let err = connect(&p, None, true).await.unwrap_err();
        assert!(matches!(err, WalletError::NotConnected));
        assert_eq!(p.count("eth_requestAccounts"), 0);
    }

    #[tokio::test]
    async fn test_connect_switches_to_target_chain() {
        let p = MockProvider::new();
        p.respond("eth_requestAccounts", Ok(serde_json::json!([ALICE])));
        p.respond("eth_chainId", Ok(serde_json::json!("0x1")));
        p.respond("wallet_switchEthereumChain", Ok(serde_json::Value::Null));

        let (_, chain) = connect(&p, Some(&base()), false).await.unwrap();
        assert_eq!(chain, 8453);
        assert_eq!(p.count("wallet_switchEthereumChain"), 1);
    }

    #[tokio::test]
    async fn test_silent_connect_keeps_provider_chain() {
        let p = MockProvider::new();
        p.respond("eth_accounts", Ok(serde_json::json!([ALICE])));
        p.respond("eth_chainId", Ok(serde_json::json!("0x1")));

        let (_, chain) = connect(&p, Some(&polygon()), true).await.unwrap();
        assert_eq!(chain, 1);
        assert_eq!(p.count("wallet_switchEthereumChain"), 0);
        assert_eq!(p.count("wallet_addEthereumChain"), 0);
    }

    #[tokio::test]
    async fn test_switch_adds_unknown_chain() {
        let p = MockProvider::new();
        p.respond(
            "wallet_switchEthereumChain",
            Err(ProviderError::new(UNRECOGNIZED_CHAIN, "Unrecognized chain")),
        );
        p.respond("wallet_switchEthereumChain", Ok(serde_json::Value::Null));
        p.respond("wallet_addEthereumChain", Ok(serde_json::Value::Null));

        switch_chain(&p, &polygon()).await.unwrap();
        assert_eq!(
            p.methods(),
            vec![
                "wallet_switchEthereumChain",
                "wallet_addEthereumChain",
                "wallet_switchEthereumChain"
            ]
        );
    }

    #[tokio::test]
    async fn test_user_rejection_maps_to_user_rejected() {
        let p = MockProvider::new();
        p.respond(
            "eth_requestAccounts",
            Err(ProviderError::new(USER_REJECTED, "User rejected")),
        );
        let err = connect(&p, None, false).await.unwrap_err();
        assert!(matches!(err, WalletError::UserRejected));
    }

    #[tokio::test]
    async fn test_decimal_chain_id_is_accepted() {
        let p = MockProvider::new();
        p.respond("eth_chainId", Ok(serde_json::json!(137)));
        assert_eq!(chain_id(&p).await.unwrap(), 137);
    }

    #[tokio::test]
    async fn test_account_sign_message_hex_encodes() {
        let p = Arc::new(MockProvider::new());
        p.respond("personal_sign", Ok(serde_json::json!("0xsig")));
        let account = Eip1193Account::new(Address::parse(ALICE).unwrap(), p.clone());

        let sig = account.sign_message(b"hello").await.unwrap();
        assert_eq!(sig, "0xsig");
        let calls = p.calls.lock().unwrap();
        assert_eq!(calls[0].1, serde_json::json!(["0x68656c6c6f", ALICE]));
    }

    #[tokio::test]
    async fn test_account_send_transaction_payload() {
        let p = Arc::new(MockProvider::new());
        p.respond("eth_sendTransaction", Ok(serde_json::json!("0xabc")));
        let account = Eip1193Account::new(Address::parse(ALICE).unwrap(), p.clone());

        let to = Address::parse("0x00000000000000000000000000000000000000b0").unwrap();
        let hash = account
            .send_transaction(&TransactionRequest::transfer(to.clone(), 1_000))
            .await
            .unwrap();
        assert_eq!(hash.as_str(), "0xabc");

        let calls = p.calls.lock().unwrap();
        let tx = &calls[0].1[0];
        assert_eq!(tx["from"], ALICE);
        assert_eq!(tx["to"], to.as_str());
        assert_eq!(tx["value"], "0x3e8");
        assert_eq!(tx["data"], "0x");
        assert!(tx.get("gas").is_none());
    }
}
