//! Client configuration: `Client` and its builder.
//!
//! A `Client` carries the client id, endpoint templates, the shared HTTP
//! connection pool and the storage adapter. Wallets and the connection manager
//! take one explicitly; there is no process-wide global.

use std::sync::Arc;
use std::time::Duration;

use crate::chain::Chain;
use crate::error::ConfigError;
use crate::http::ApiHttp;
use crate::network::{
    resolve_template, DEFAULT_BUNDLER_URL_TEMPLATE, DEFAULT_IN_APP_API_URL,
};
use crate::rpc::RpcClient;
use crate::storage::{default_storage, AsyncStorage};

/// Shared configuration for wallets and the connection manager.
pub struct Client {
    client_id: String,
    secret_key: Option<String>,
    in_app_api_url: String,
    bundler_url_template: String,
    http: reqwest::Client,
    storage: Arc<dyn AsyncStorage>,
}

impl Client {
    pub fn builder() -> ClientBuilder {
        ClientBuilder::default()
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn storage(&self) -> Arc<dyn AsyncStorage> {
        self.storage.clone()
    }

    pub fn in_app_api_url(&self) -> &str {
        &self.in_app_api_url
    }

    /// An `ApiHttp` rooted at `base_url` carrying this client's id headers.
    pub fn api(&self, base_url: &str) -> ApiHttp {
        ApiHttp::new(self.http.clone(), base_url)
            .with_client_headers(&self.client_id, self.secret_key.as_deref())
    }

    /// RPC URL for `chain`. Hosted RPC endpoints get the client id appended.
    pub fn rpc_url(&self, chain: &Chain) -> String {
        if is_hosted(&chain.rpc, "rpc.thirdweb.com") && !chain.rpc.ends_with(&self.client_id) {
            format!("{}/{}", chain.rpc.trim_end_matches('/'), self.client_id)
        } else {
            chain.rpc.clone()
        }
    }

    pub fn bundler_url(&self, chain: &Chain) -> String {
        resolve_template(&self.bundler_url_template, chain.id)
    }

    /// JSON-RPC client for the chain's node.
    pub fn rpc(&self, chain: &Chain) -> RpcClient {
        RpcClient::new(self.api(&self.rpc_url(chain)))
    }

    /// JSON-RPC client for the chain's bundler (also serves paymaster calls).
    pub fn bundler(&self, chain: &Chain) -> RpcClient {
        RpcClient::new(self.api(&self.bundler_url(chain)))
    }
}

fn is_hosted(url: &str, host_suffix: &str) -> bool {
    url.split("://")
        .nth(1)
        .and_then(|rest| rest.split('/').next())
        .map(|host| host.ends_with(host_suffix))
        .unwrap_or(false)
}

impl Clone for Client {
    fn clone(&self) -> Self {
        Self {
            client_id: self.client_id.clone(),
            secret_key: self.secret_key.clone(),
            in_app_api_url: self.in_app_api_url.clone(),
            bundler_url_template: self.bundler_url_template.clone(),
            http: self.http.clone(),
            storage: self.storage.clone(),
        }
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("client_id", &self.client_id)
            .field("secret_key", &self.secret_key.as_ref().map(|_| "<redacted>"))
            .field("in_app_api_url", &self.in_app_api_url)
            .field("bundler_url_template", &self.bundler_url_template)
            .finish()
    }
}

// ═════════════════════════════════════════════════════════════════════════════
// Builder
// ═════════════════════════════════════════════════════════════════════════════

pub struct ClientBuilder {
    client_id: Option<String>,
    secret_key: Option<String>,
    in_app_api_url: String,
    bundler_url_template: String,
    request_timeout: Duration,
    storage: Option<Arc<dyn AsyncStorage>>,
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self {
            client_id: None,
            secret_key: None,
            in_app_api_url: DEFAULT_IN_APP_API_URL.to_string(),
            bundler_url_template: DEFAULT_BUNDLER_URL_TEMPLATE.to_string(),
            request_timeout: Duration::from_secs(30),
            storage: None,
        }
    }
}

impl ClientBuilder {
    pub fn client_id(mut self, client_id: &str) -> Self {
        self.client_id = Some(client_id.to_string());
        self
    }

    /// Secret key for server-side use. Never ship this to a browser.
    pub fn secret_key(mut self, secret_key: &str) -> Self {
        self.secret_key = Some(secret_key.to_string());
        self
    }

    pub fn in_app_api_url(mut self, url: &str) -> Self {
        self.in_app_api_url = url.trim_end_matches('/').to_string();
        self
    }

    /// Bundler endpoint template; `{chainId}` is substituted per chain.
    pub fn bundler_url_template(mut self, template: &str) -> Self {
        self.bundler_url_template = template.to_string();
        self
    }

    /// Per-request timeout (native only; the browser manages its own).
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn storage(mut self, storage: Arc<dyn AsyncStorage>) -> Self {
        self.storage = Some(storage);
        self
    }

    pub fn build(self) -> Result<Client, ConfigError> {
        let client_id = self
            .client_id
            .filter(|id| !id.trim().is_empty())
            .ok_or(ConfigError::MissingClientId)?;

        for (field, value) in [
            ("in_app_api_url", &self.in_app_api_url),
            ("bundler_url_template", &self.bundler_url_template),
        ] {
            if !value.starts_with("https://") && !value.starts_with("http://") {
                return Err(ConfigError::InvalidUrl {
                    field,
                    value: value.clone(),
                });
            }
        }

        #[allow(unused_mut)]
        let mut builder = reqwest::Client::builder();
        #[cfg(not(target_arch = "wasm32"))]
        {
            builder = builder
                .timeout(self.request_timeout)
                .pool_max_idle_per_host(10);
        }
        let http = builder
            .build()
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;

        Ok(Client {
            client_id,
            secret_key: self.secret_key,
            in_app_api_url: self.in_app_api_url,
            bundler_url_template: self.bundler_url_template,
            http,
            storage: self.storage.unwrap_or_else(default_storage),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::{base, define_chain};

    fn client() -> Client {
        Client::builder().client_id("abc123").build().unwrap()
    }

    #[test]
    fn test_missing_client_id_is_rejected() {
        assert!(matches!(
            Client::builder().build(),
            Err(ConfigError::MissingClientId)
        ));
        assert!(matches!(
            Client::builder().client_id("  ").build(),
            Err(ConfigError::MissingClientId)
        ));
    }

    #[test]
    fn test_invalid_url_is_rejected() {
        let err = Client::builder()
            .client_id("abc")
            .in_app_api_url("embedded-wallet.example.com")
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidUrl { field: "in_app_api_url", .. }));
    }

    #[test]
    fn test_hosted_rpc_gets_client_id() {
        let c = client();
        assert_eq!(c.rpc_url(&base()), "https://8453.rpc.thirdweb.com/abc123");
        let custom = define_chain(31337).with_rpc("http://localhost:8545");
        assert_eq!(c.rpc_url(&custom), "http://localhost:8545");
    }

    #[test]
    fn test_bundler_url_from_template() {
        let c = Client::builder()
            .client_id("abc")
            .bundler_url_template("https://bundler.example/{chainId}")
            .build()
            .unwrap();
        assert_eq!(c.bundler_url(&base()), "https://bundler.example/8453");
    }

    #[test]
    fn test_debug_redacts_secret() {
        let c = Client::builder()
            .client_id("abc")
            .secret_key("super-secret")
            .build()
            .unwrap();
        let dbg = format!("{:?}", c);
        assert!(!dbg.contains("super-secret"));
        assert!(dbg.contains("<redacted>"));
    }
}
