//! Wire types for the embedded-wallet auth service.

use serde::{Deserialize, Serialize};

use crate::shared::{Address, ChainId};

#[derive(Debug, Clone, Serialize)]
pub struct SendEmailOtpRequest<'a> {
    pub email: &'a str,
}

#[derive(Debug, Clone, Serialize)]
pub struct SendPhoneOtpRequest<'a> {
    pub phone: &'a str,
}

#[derive(Debug, Clone, Serialize)]
pub struct VerifyEmailRequest<'a> {
    pub email: &'a str,
    pub code: &'a str,
}

#[derive(Debug, Clone, Serialize)]
pub struct VerifyPhoneRequest<'a> {
    pub phone: &'a str,
    pub code: &'a str,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GuestLoginRequest<'a> {
    pub session_id: &'a str,
}

#[derive(Debug, Clone, Serialize)]
pub struct JwtLoginRequest<'a> {
    pub jwt: &'a str,
}

/// Response of every `login/*/callback` endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub stored_token: StoredToken,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredToken {
    pub auth_provider: String,
    pub cookie_string: String,
    #[serde(default)]
    pub is_new_user: bool,
    #[serde(default)]
    pub auth_details: AuthDetails,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthDetails {
    pub email: Option<String>,
    pub phone_number: Option<String>,
    pub user_wallet_id: Option<String>,
}

/// `GET /api/2024-05-05/accounts`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDetails {
    #[serde(default)]
    pub wallets: Vec<UserWallet>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UserWallet {
    pub address: Address,
    #[serde(rename = "type")]
    pub wallet_type: String,
}

/// `POST /api/v1/enclave-wallet/generate`
#[derive(Debug, Clone, Deserialize)]
pub struct GenerateWalletResponse {
    pub wallet: UserWallet,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignMessageRequest {
    pub message_payload: MessagePayload,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePayload {
    /// Hex-encoded when `is_raw`, UTF-8 otherwise.
    pub message: String,
    pub is_raw: bool,
    pub chain_id: ChainId,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignTransactionRequest {
    pub transaction_payload: TransactionPayload,
}

/// EIP-1559 transaction fields, all quantities `0x` hex.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<Address>,
    pub value: String,
    pub data: String,
    pub chain_id: ChainId,
    pub nonce: String,
    pub gas: String,
    pub max_fee_per_gas: String,
    pub max_priority_fee_per_gas: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SignatureResponse {
    pub signature: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_response_parses() {
        let json = serde_json::json!({
            "storedToken": {
                "authProvider": "email",
                "cookieString": "cookie-abc",
                "isNewUser": true,
                "authDetails": { "email": "a@b.co", "userWalletId": "w1" },
                "developerClientId": "abc123"
            }
        });
        let resp: AuthResponse = serde_json::from_value(json).unwrap();
        assert_eq!(resp.stored_token.cookie_string, "cookie-abc");
        assert!(resp.stored_token.is_new_user);
        assert_eq!(resp.stored_token.auth_details.email.as_deref(), Some("a@b.co"));
    }

    #[test]
    fn test_user_details_defaults_to_no_wallets() {
        let details: UserDetails = serde_json::from_value(serde_json::json!({
            "status": "Logged In, Wallet Uninitialized"
        }))
        .unwrap();
        assert!(details.wallets.is_empty());
    }

    #[test]
    fn test_sign_message_request_shape() {
        let req = SignMessageRequest {
            message_payload: MessagePayload {
                message: "0x68690a".into(),
                is_raw: true,
                chain_id: 1,
            },
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["messagePayload"]["isRaw"], true);
        assert_eq!(json["messagePayload"]["chainId"], 1);
    }
}
