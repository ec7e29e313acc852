//! Email/password sign-in against the Identity Toolkit REST API.

use async_trait::async_trait;
use attend_core::auth::{self, AuthError, AuthProvider, AuthUser};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const IDENTITY_TOOLKIT_URL: &str = "https://identitytoolkit.googleapis.com/v1";

/// Provider error codes that mean the user typed something wrong.
const CREDENTIAL_CODES: [&str; 5] = [
    "EMAIL_NOT_FOUND",
    "INVALID_PASSWORD",
    "INVALID_LOGIN_CREDENTIALS",
    "INVALID_EMAIL",
    "USER_DISABLED",
];

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SignInRequest<'a> {
    email: &'a str,
    password: &'a str,
    return_secure_token: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignInReply {
    local_id: String,
    email: String,
    #[serde(default)]
    id_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

pub struct IdentityToolkitAuth {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl IdentityToolkitAuth {
    pub fn new(api_key: impl Into<String>, timeout: Duration) -> Result<Self, AuthError> {
        Self::with_base_url(IDENTITY_TOOLKIT_URL, api_key, timeout)
    }

    pub fn with_base_url(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, AuthError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AuthError::Provider(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        })
    }

    fn sign_in_url(&self) -> String {
        format!("{}/accounts:signInWithPassword", self.base_url)
    }
}

/// Map an error reply body to an `AuthError`.
fn provider_error(body: &[u8]) -> AuthError {
    let Ok(envelope) = serde_json::from_slice::<ErrorEnvelope>(body) else {
        return AuthError::Provider("unreadable error reply".into());
    };
    // Codes may carry a suffix, e.g. "TOO_MANY_ATTEMPTS_TRY_LATER : ...".
    let code = envelope
        .error
        .message
        .split_whitespace()
        .next()
        .unwrap_or_default()
        .to_string();
    if CREDENTIAL_CODES.contains(&code.as_str()) {
        AuthError::InvalidCredentials(code)
    } else {
        AuthError::Provider(envelope.error.message)
    }
}

#[async_trait]
impl AuthProvider for IdentityToolkitAuth {
    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthUser, AuthError> {
        if self.api_key.is_empty() {
            return Err(AuthError::Provider("no API key configured".into()));
        }

        let resp = self
            .client
            .post(self.sign_in_url())
            .query(&[("key", self.api_key.as_str())])
            .json(&SignInRequest {
                email,
                password,
                return_secure_token: true,
            })
            .send()
            .await
            .map_err(|e| AuthError::Unreachable(e.to_string()))?;

        let status = resp.status();
        let body = resp
            .bytes()
            .await
            .map_err(|e| AuthError::Unreachable(e.to_string()))?;

        if !status.is_success() {
            let err = provider_error(&body);
            tracing::warn!(%status, error = %err, "sign-in refused");
            return Err(err);
        }

        let reply: SignInReply = serde_json::from_slice(&body)
            .map_err(|e| AuthError::Provider(format!("unexpected sign-in reply: {e}")))?;
        let user = AuthUser {
            uid: reply.local_id,
            email: reply.email,
            id_token: reply.id_token,
        };
        auth::establish(user.clone());
        Ok(user)
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        auth::invalidate();
        Ok(())
    }
}
