//! Auth service client: one method per embedded-wallet endpoint.

use crate::error::HttpError;
use crate::http::client::TokenScheme;
use crate::http::{ApiHttp, RetryPolicy};

use super::wire::{
    AuthResponse, GenerateWalletResponse, GuestLoginRequest, JwtLoginRequest, SendEmailOtpRequest,
    SendPhoneOtpRequest, SignMessageRequest, SignTransactionRequest, SignatureResponse,
    UserDetails, VerifyEmailRequest, VerifyPhoneRequest,
};

/// HTTP client for the embedded-wallet auth service.
///
/// Holds the session token once logged in; every call after login is
/// authenticated with it.
#[derive(Clone)]
pub struct AuthService {
    http: ApiHttp,
}

impl AuthService {
    pub fn new(http: ApiHttp) -> Self {
        Self {
            http: http.with_token_scheme(TokenScheme::EmbeddedWallet),
        }
    }

    pub async fn set_token(&self, token: Option<String>) {
        self.http.set_auth_token(token).await;
    }

    pub async fn clear_token(&self) {
        self.http.clear_auth_token().await;
    }

    pub async fn has_token(&self) -> bool {
        self.http.has_auth_token().await
    }

    // ── OTP ──────────────────────────────────────────────────────────────

    pub async fn send_email_otp(&self, email: &str) -> Result<(), HttpError> {
        let url = self.http.url("/api/2024-05-05/login/email");
        let _: serde_json::Value = self
            .http
            .post(&url, &SendEmailOtpRequest { email }, RetryPolicy::None)
            .await?;
        Ok(())
    }

    pub async fn send_phone_otp(&self, phone: &str) -> Result<(), HttpError> {
        let url = self.http.url("/api/2024-05-05/login/phone");
        let _: serde_json::Value = self
            .http
            .post(&url, &SendPhoneOtpRequest { phone }, RetryPolicy::None)
            .await?;
        Ok(())
    }

    // ── Login ────────────────────────────────────────────────────────────

    pub async fn verify_email(&self, email: &str, code: &str) -> Result<AuthResponse, HttpError> {
        let url = self.http.url("/api/2024-05-05/login/email/callback");
        self.http
            .post(&url, &VerifyEmailRequest { email, code }, RetryPolicy::None)
            .await
    }

    pub async fn verify_phone(&self, phone: &str, code: &str) -> Result<AuthResponse, HttpError> {
        let url = self.http.url("/api/2024-05-05/login/phone/callback");
        self.http
            .post(&url, &VerifyPhoneRequest { phone, code }, RetryPolicy::None)
            .await
    }

    pub async fn login_guest(&self, session_id: &str) -> Result<AuthResponse, HttpError> {
        let url = self.http.url("/api/2024-05-05/login/guest/callback");
        self.http
            .post(&url, &GuestLoginRequest { session_id }, RetryPolicy::None)
            .await
    }

    pub async fn login_jwt(&self, jwt: &str) -> Result<AuthResponse, HttpError> {
        let url = self.http.url("/api/2024-05-05/login/jwt/callback");
        self.http
            .post(&url, &JwtLoginRequest { jwt }, RetryPolicy::None)
            .await
    }

    pub async fn logout(&self) -> Result<(), HttpError> {
        let url = self.http.url("/api/2024-05-05/logout");
        let _: serde_json::Value = self
            .http
            .post(&url, &serde_json::json!({}), RetryPolicy::None)
            .await?;
        Ok(())
    }

    // ── Wallet ───────────────────────────────────────────────────────────

    pub async fn user_details(&self) -> Result<UserDetails, HttpError> {
        let url = self.http.url("/api/2024-05-05/accounts");
        self.http.get(&url, RetryPolicy::Idempotent).await
    }

    pub async fn generate_wallet(&self) -> Result<GenerateWalletResponse, HttpError> {
        let url = self.http.url("/api/v1/enclave-wallet/generate");
        self.http
            .post(&url, &serde_json::json!({}), RetryPolicy::None)
            .await
    }

    pub async fn sign_message(&self, req: &SignMessageRequest) -> Result<String, HttpError> {
        let url = self.http.url("/api/v1/enclave-wallet/sign-message");
        let resp: SignatureResponse = self.http.post(&url, req, RetryPolicy::None).await?;
        Ok(resp.signature)
    }

    /// Returns the signed, RLP-encoded transaction ready for broadcast.
    pub async fn sign_transaction(&self, req: &SignTransactionRequest) -> Result<String, HttpError> {
        let url = self.http.url("/api/v1/enclave-wallet/sign-transaction");
        let resp: SignatureResponse = self.http.post(&url, req, RetryPolicy::None).await?;
        Ok(resp.signature)
    }
}
