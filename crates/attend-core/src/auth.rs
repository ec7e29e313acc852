//! Authentication collaborator contract and the process-wide credential.
//!
//! The signed-in user lives in a single process-wide slot. It is filled at
//! startup (restored session) or by a provider's `sign_in`, and cleared by
//! `sign_out` or session expiry. Everything else only reads it.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::RwLock;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("not signed in")]
    NotSignedIn,
    #[error("invalid credentials: {0}")]
    InvalidCredentials(String),
    #[error("identity provider unreachable: {0}")]
    Unreachable(String),
    #[error("identity provider error: {0}")]
    Provider(String),
}

/// The authenticated principal as far as this client cares.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    pub uid: String,
    pub email: String,
    /// Bearer token from the identity provider, if it issues one.
    #[serde(default)]
    pub id_token: Option<String>,
}

#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthUser, AuthError>;
    async fn sign_out(&self) -> Result<(), AuthError>;
}

static CURRENT_USER: RwLock<Option<AuthUser>> = RwLock::new(None);

/// Snapshot of the signed-in user, if any.
pub fn current_user() -> Option<AuthUser> {
    CURRENT_USER
        .read()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .clone()
}

pub fn is_signed_in() -> bool {
    CURRENT_USER
        .read()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .is_some()
}

/// Gate for pages that require a signed-in user.
pub fn require_user() -> Result<AuthUser, AuthError> {
    current_user().ok_or(AuthError::NotSignedIn)
}

/// Install `user` as the current principal. Reserved for auth providers and
/// startup session restore.
pub fn establish(user: AuthUser) {
    tracing::info!(uid = %user.uid, email = %user.email, "credential established");
    *CURRENT_USER
        .write()
        .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(user);
}

/// Clear the current principal, returning whoever was signed in.
pub fn invalidate() -> Option<AuthUser> {
    let previous = CURRENT_USER
        .write()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .take();
    if let Some(user) = &previous {
        tracing::info!(uid = %user.uid, "credential invalidated");
    }
    previous
}

#[cfg(test)]
mod tests {
    use super::*;

    // Single test: the slot is process-wide and tests run in parallel.
    #[test]
    fn test_credential_lifecycle() {
        invalidate();
        assert!(!is_signed_in());
        assert!(matches!(require_user(), Err(AuthError::NotSignedIn)));

        let user = AuthUser {
            uid: "u1".into(),
            email: "admin@example.com".into(),
            id_token: None,
        };
        establish(user.clone());
        assert!(is_signed_in());
        assert_eq!(require_user().unwrap(), user);

        assert_eq!(invalidate(), Some(user));
        assert_eq!(invalidate(), None);
        assert!(current_user().is_none());
    }
}
