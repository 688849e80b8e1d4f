//! In-app (embedded) wallet: keys custodied by the hosted auth service.
//!
//! ## Flow
//!
//! 1. Email/phone only: [`InAppWallet::pre_authenticate`] sends a one-time code.
//! 2. `connect` with an [`InAppAuth`] strategy exchanges the code (or guest
//!    session / JWT) for a session token. The token is persisted through the
//!    client's storage under a per-client-id key.
//! 3. `auto_connect` re-hydrates from the stored token. A 401 from the
//!    service wipes the stored token.
//!
//! Signing happens server-side: messages via `sign-message`, transactions via
//! `sign-transaction` followed by `eth_sendRawTransaction` on the chain RPC.

pub mod client;
pub mod wire;

use async_lock::RwLock;
use async_trait::async_trait;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::chain::{ethereum, Chain};
use crate::client::Client;
use crate::error::{HttpError, WalletError};
use crate::rpc::wire::CallRequest;
use crate::shared::hex::{quantity, to_hex};
use crate::shared::{Address, TxHash, WalletId};
use crate::storage::{
    IN_APP_AUTH_PROVIDER_KEY, IN_APP_AUTH_TOKEN_KEY_PREFIX, IN_APP_GUEST_SESSION_KEY,
};
use crate::wallet::{Account, ConnectOptions, TransactionRequest, Wallet};

use client::AuthService;
use wire::{AuthResponse, MessagePayload, SignMessageRequest, SignTransactionRequest, TransactionPayload};

// ─── Auth strategies ─────────────────────────────────────────────────────────

/// How an in-app wallet user proves who they are.
#[derive(Clone, PartialEq, Eq)]
pub enum InAppAuth {
    Email {
        email: String,
        verification_code: String,
    },
    Phone {
        phone_number: String,
        verification_code: String,
    },
    /// Anonymous session, stable per storage.
    Guest,
    /// Bring-your-own auth: a JWT verified by the service.
    Jwt { jwt: String },
}

impl InAppAuth {
    pub fn provider(&self) -> AuthProvider {
        match self {
            Self::Email { .. } => AuthProvider::Email,
            Self::Phone { .. } => AuthProvider::Phone,
            Self::Guest => AuthProvider::Guest,
            Self::Jwt { .. } => AuthProvider::Jwt,
        }
    }
}

impl std::fmt::Debug for InAppAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Email { email, .. } => f
                .debug_struct("Email")
                .field("email", email)
                .field("verification_code", &"<redacted>")
                .finish(),
            Self::Phone { phone_number, .. } => f
                .debug_struct("Phone")
                .field("phone_number", phone_number)
                .field("verification_code", &"<redacted>")
                .finish(),
            Self::Guest => f.write_str("Guest"),
            Self::Jwt { .. } => f.debug_struct("Jwt").field("jwt", &"<redacted>").finish(),
        }
    }
}

/// Where a one-time code should be sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OtpChannel {
    Email(String),
    Phone(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthProvider {
    Email,
    Phone,
    Guest,
    Jwt,
}

impl AuthProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Email => "email",
            Self::Phone => "phone",
            Self::Guest => "guest",
            Self::Jwt => "jwt",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "email" => Some(Self::Email),
            "phone" => Some(Self::Phone),
            "guest" => Some(Self::Guest),
            "jwt" => Some(Self::Jwt),
            _ => None,
        }
    }
}

impl std::fmt::Display for AuthProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ─── Account ─────────────────────────────────────────────────────────────────

/// An embedded-wallet account. Signing is delegated to the auth service.
pub struct InAppAccount {
    address: Address,
    auth: AuthService,
    client: Client,
    chain: Arc<RwLock<Chain>>,
}

impl InAppAccount {
    /// Gas estimation call for `tx`; deployments leave `to` unset.
    fn estimate_request(&self, tx: &TransactionRequest) -> CallRequest {
        CallRequest {
            from: Some(self.address.to_string()),
            to: tx.to.as_ref().map(|a| a.to_string()),
            value: Some(quantity(tx.value)),
            data: to_hex(&tx.data),
        }
    }
}

#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
impl Account for InAppAccount {
    fn address(&self) -> &Address {
        &self.address
    }

    async fn sign_message(&self, message: &[u8]) -> Result<String, WalletError> {
        let chain_id = self.chain.read().await.id;
        let req = SignMessageRequest {
            message_payload: MessagePayload {
                message: to_hex(message),
                is_raw: true,
                chain_id,
            },
        };
        self.auth.sign_message(&req).await.map_err(Into::into)
    }

    async fn send_transaction(&self, tx: &TransactionRequest) -> Result<TxHash, WalletError> {
        let chain = self.chain.read().await.clone();
        let rpc = self.client.rpc(&chain);

        let call = self.estimate_request(tx);
        let nonce = rpc.get_transaction_count(&self.address).await?;
        let gas = match tx.gas {
            Some(gas) => gas,
            None => rpc.estimate_gas(&call).await?,
        };
        let fees = rpc.estimate_fees().await?;

        let req = SignTransactionRequest {
            transaction_payload: TransactionPayload {
                to: tx.to.clone(),
                value: quantity(tx.value),
                data: to_hex(&tx.data),
                chain_id: chain.id,
                nonce: quantity(nonce as u128),
                gas: quantity(gas as u128),
                max_fee_per_gas: quantity(fees.max_fee_per_gas),
                max_priority_fee_per_gas: quantity(fees.max_priority_fee_per_gas),
            },
        };
        let signed = self.auth.sign_transaction(&req).await?;
        let hash = rpc.send_raw_transaction(&signed).await?;
        tracing::debug!(address = %self.address, chain_id = chain.id, %hash, "in-app transaction sent");
        Ok(hash)
    }
}

// ─── Wallet ──────────────────────────────────────────────────────────────────

struct Session {
    account: Arc<InAppAccount>,
    provider: AuthProvider,
}

pub struct InAppWallet {
    client: Client,
    auth: AuthService,
    chain: Arc<RwLock<Chain>>,
    session: RwLock<Option<Session>>,
}

impl InAppWallet {
    pub fn new(client: Client) -> Self {
        let auth = AuthService::new(client.api(client.in_app_api_url()));
        Self {
            client,
            auth,
            chain: Arc::new(RwLock::new(ethereum())),
            session: RwLock::new(None),
        }
    }

    fn token_key(&self) -> String {
        format!("{}:{}", IN_APP_AUTH_TOKEN_KEY_PREFIX, self.client.client_id())
    }

    /// Send a one-time verification code.
    pub async fn pre_authenticate(&self, channel: &OtpChannel) -> Result<(), WalletError> {
        match channel {
            OtpChannel::Email(email) => self.auth.send_email_otp(email).await?,
            OtpChannel::Phone(phone) => self.auth.send_phone_otp(phone).await?,
        }
        Ok(())
    }

    /// The auth provider of the current session, if any.
    pub async fn auth_provider(&self) -> Option<AuthProvider> {
        self.session.read().await.as_ref().map(|s| s.provider)
    }

    /// The auth provider remembered from the last login.
    pub async fn last_auth_provider(&self) -> Result<Option<AuthProvider>, WalletError> {
        let stored = self.client.storage().get_item(IN_APP_AUTH_PROVIDER_KEY).await?;
        Ok(stored.as_deref().and_then(AuthProvider::parse))
    }

    async fn guest_session_id(&self) -> Result<String, WalletError> {
        let storage = self.client.storage();
        if let Some(id) = storage.get_item(IN_APP_GUEST_SESSION_KEY).await? {
            return Ok(id);
        }
        let mut bytes = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut bytes);
        let id = ::hex::encode(bytes);
        storage.set_item(IN_APP_GUEST_SESSION_KEY, &id).await?;
        Ok(id)
    }

    async fn login(&self, strategy: &InAppAuth) -> Result<AuthResponse, WalletError> {
        let resp = match strategy {
            InAppAuth::Email {
                email,
                verification_code,
            } => self.auth.verify_email(email, verification_code).await?,
            InAppAuth::Phone {
                phone_number,
                verification_code,
            } => self.auth.verify_phone(phone_number, verification_code).await?,
            InAppAuth::Guest => {
                let session_id = self.guest_session_id().await?;
                self.auth.login_guest(&session_id).await?
            }
            InAppAuth::Jwt { jwt } => self.auth.login_jwt(jwt).await?,
        };
        Ok(resp)
    }

    /// Address of the user's enclave wallet, generating one for new users.
    async fn resolve_address(&self) -> Result<Address, WalletError> {
        let details = self.auth.user_details().await?;
        if let Some(wallet) = details.wallets.into_iter().next() {
            return Ok(wallet.address);
        }
        tracing::debug!("no enclave wallet yet, generating one");
        Ok(self.auth.generate_wallet().await?.wallet.address)
    }

    async fn start_session(
        &self,
        address: Address,
        provider: AuthProvider,
        options: &ConnectOptions,
    ) -> Arc<dyn Account> {
        if let Some(chain) = &options.chain {
            *self.chain.write().await = chain.clone();
        }
        let account = Arc::new(InAppAccount {
            address,
            auth: self.auth.clone(),
            client: self.client.clone(),
            chain: self.chain.clone(),
        });
        *self.session.write().await = Some(Session {
            account: account.clone(),
            provider,
        });
        account
    }
}

#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
impl Wallet for InAppWallet {
    fn id(&self) -> WalletId {
        WalletId::from(WalletId::IN_APP)
    }

    async fn connect(&self, options: ConnectOptions) -> Result<Arc<dyn Account>, WalletError> {
        let strategy = options
            .in_app
            .as_ref()
            .ok_or(WalletError::MissingAuthStrategy)?;

        let resp = self.login(strategy).await?;
        let token = resp.stored_token.cookie_string;
        self.auth.set_token(Some(token.clone())).await;

        let address = match self.resolve_address().await {
            Ok(a) => a,
            Err(e) => {
                self.auth.clear_token().await;
                return Err(e);
            }
        };

        let provider = strategy.provider();
        let storage = self.client.storage();
        storage.set_item(&self.token_key(), &token).await?;
        storage
            .set_item(IN_APP_AUTH_PROVIDER_KEY, provider.as_str())
            .await?;

        tracing::debug!(%address, %provider, new_user = resp.stored_token.is_new_user, "in-app wallet connected");
        Ok(self.start_session(address, provider, &options).await)
    }

    async fn auto_connect(
        &self,
        options: ConnectOptions,
    ) -> Result<Arc<dyn Account>, WalletError> {
        let storage = self.client.storage();
        let token = storage
            .get_item(&self.token_key())
            .await?
            .ok_or(WalletError::NotAuthenticated)?;
        self.auth.set_token(Some(token)).await;

        let address = match self.resolve_address().await {
            Ok(a) => a,
            Err(WalletError::Http(HttpError::Unauthorized)) => {
                tracing::debug!("stored in-app session rejected, clearing it");
                self.auth.clear_token().await;
                storage.remove_item(&self.token_key()).await?;
                return Err(WalletError::NotAuthenticated);
            }
            Err(e) => {
                self.auth.clear_token().await;
                return Err(e);
            }
        };

        let provider = self
            .last_auth_provider()
            .await?
            .unwrap_or(AuthProvider::Email);
        Ok(self.start_session(address, provider, &options).await)
    }

    async fn disconnect(&self) -> Result<(), WalletError> {
        if self.auth.has_token().await {
            if let Err(e) = self.auth.logout().await {
                tracing::warn!("in-app logout failed, clearing local session anyway: {}", e);
            }
        }
        self.auth.clear_token().await;
        let storage = self.client.storage();
        storage.remove_item(&self.token_key()).await?;
        storage.remove_item(IN_APP_AUTH_PROVIDER_KEY).await?;
        *self.session.write().await = None;
        Ok(())
    }

    /// Custodial keys sign for any chain; switching only retargets the account.
    async fn switch_chain(&self, chain: &Chain) -> Result<(), WalletError> {
        *self.chain.write().await = chain.clone();
        Ok(())
    }

    async fn get_account(&self) -> Option<Arc<dyn Account>> {
        self.session
            .read()
            .await
            .as_ref()
            .map(|s| s.account.clone() as Arc<dyn Account>)
    }

    async fn get_chain(&self) -> Option<Chain> {
        if self.session.read().await.is_none() {
            return None;
        }
        Some(self.chain.read().await.clone())
    }
}
