//! Backend token exchange.
//!
//! The transport has its own notion of users. The backend bridges the
//! two identity spaces: presented with a wallet account and its
//! authorization credential, it returns the transport user id and token
//! for that wallet.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use hashchat_core::{AccountIdentity, AuthorizationCredential};

use crate::error::{Result, TransportError};

/// Credentials for authenticating to the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportCredentials {
    /// The transport user id mapped to the wallet account.
    pub user_id: String,
    /// Bearer token for the transport connection.
    pub token: String,
}

/// Seam to the backend token exchange.
#[async_trait]
pub trait TokenExchange: Send + Sync {
    /// Exchange a wallet identity for transport credentials.
    async fn exchange(
        &self,
        account: &AccountIdentity,
        credential: &AuthorizationCredential,
    ) -> Result<TransportCredentials>;
}

/// HTTP implementation: `POST {base}/token/{accountId}` with the
/// credential in the `x-lit-token` header.
pub struct HttpTokenExchange {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Deserialize)]
struct TokenResponse {
    #[serde(rename = "userId")]
    user_id: String,
    token: String,
}

impl HttpTokenExchange {
    /// Create a client against a backend base URL.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl TokenExchange for HttpTokenExchange {
    async fn exchange(
        &self,
        account: &AccountIdentity,
        credential: &AuthorizationCredential,
    ) -> Result<TransportCredentials> {
        let url = format!("{}/token/{}", self.base_url, account);

        let response = self
            .client
            .post(&url)
            .header("x-lit-token", hex::encode(credential.as_bytes()))
            .send()
            .await
            .map_err(|e| TransportError::TokenExchange(e.to_string()))?
            .error_for_status()
            .map_err(|e| TransportError::TokenExchange(e.to_string()))?;

        let body: TokenResponse = response
            .json()
            .await
            .map_err(|e| TransportError::TokenExchange(e.to_string()))?;

        debug!(account = %account, user_id = %body.user_id, "token exchange succeeded");
        Ok(TransportCredentials {
            user_id: body.user_id,
            token: body.token,
        })
    }
}

/// In-process token exchange for tests.
///
/// Mints the deterministic user id a real backend would: the account's
/// transport-safe encoding.
pub mod local {
    use super::*;

    #[derive(Debug, Clone, Default)]
    pub struct LocalTokenExchange;

    impl LocalTokenExchange {
        pub fn new() -> Self {
            Self
        }
    }

    #[async_trait]
    impl TokenExchange for LocalTokenExchange {
        async fn exchange(
            &self,
            account: &AccountIdentity,
            credential: &AuthorizationCredential,
        ) -> Result<TransportCredentials> {
            if credential.as_bytes().is_empty() {
                return Err(TransportError::TokenExchange("empty credential".into()));
            }
            let user_id = account.to_user_id();
            Ok(TransportCredentials {
                token: format!("local-{user_id}"),
                user_id,
            })
        }
    }
}
