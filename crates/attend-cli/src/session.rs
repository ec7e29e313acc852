//! Signed-in user persisted across invocations.
//!
//! The file is read into the process-wide credential at startup and kept in
//! step with it by `PersistentAuth`.

use anyhow::{Context, Result};
use async_trait::async_trait;
use attend_core::auth::{self, AuthError, AuthProvider, AuthUser};
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub fn load(path: &Path) -> Result<Option<AuthUser>> {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e).with_context(|| format!("failed to read {}", path.display())),
    };
    let user = serde_json::from_str(&text)
        .with_context(|| format!("corrupt session file {}", path.display()))?;
    Ok(Some(user))
}

pub fn save(path: &Path, user: &AuthUser) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(user)?;
    std::fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))
}

pub fn clear(path: &Path) -> Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e).with_context(|| format!("failed to remove {}", path.display())),
    }
}

/// Install the persisted user, if any, as the current credential. A corrupt
/// file is discarded rather than blocking startup.
pub fn restore(path: &Path) -> Option<AuthUser> {
    match load(path) {
        Ok(Some(user)) => {
            auth::establish(user.clone());
            Some(user)
        }
        Ok(None) => None,
        Err(err) => {
            tracing::warn!(error = %err, "discarding unreadable session");
            if let Err(err) = clear(path) {
                tracing::warn!(error = %err, "failed to remove session file");
            }
            None
        }
    }
}

/// Wraps a provider so sign-in and sign-out also update the session file.
pub struct PersistentAuth {
    inner: Arc<dyn AuthProvider>,
    path: PathBuf,
}

impl PersistentAuth {
    pub fn new(inner: Arc<dyn AuthProvider>, path: PathBuf) -> Self {
        Self { inner, path }
    }
}

#[async_trait]
impl AuthProvider for PersistentAuth {
    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthUser, AuthError> {
        let user = self.inner.sign_in(email, password).await?;
        save(&self.path, &user).map_err(|e| AuthError::Provider(format!("{e:#}")))?;
        Ok(user)
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        // Forget the local copy even if the provider complains.
        let outcome = self.inner.sign_out().await;
        clear(&self.path).map_err(|e| AuthError::Provider(format!("{e:#}")))?;
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct LocalOnly;

    #[async_trait]
    impl AuthProvider for LocalOnly {
        async fn sign_in(&self, email: &str, _password: &str) -> Result<AuthUser, AuthError> {
            Ok(AuthUser {
                uid: "u1".into(),
                email: email.into(),
                id_token: None,
            })
        }

        async fn sign_out(&self) -> Result<(), AuthError> {
            Ok(())
        }
    }

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("attend-cli-{}-{name}", std::process::id()))
            .join("session.json")
    }

    #[test]
    fn test_save_load_clear() {
        let path = temp_path("roundtrip");
        assert_eq!(load(&path).unwrap(), None);

        let user = AuthUser {
            uid: "u1".into(),
            email: "admin@example.com".into(),
            id_token: Some("tok".into()),
        };
        save(&path, &user).unwrap();
        assert_eq!(load(&path).unwrap(), Some(user));

        clear(&path).unwrap();
        clear(&path).unwrap();
        assert_eq!(load(&path).unwrap(), None);
    }

    #[test]
    fn test_corrupt_file_is_error() {
        let path = temp_path("corrupt");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "{not json").unwrap();
        assert!(load(&path).is_err());
        clear(&path).unwrap();
    }

    #[tokio::test]
    async fn test_persistent_auth_tracks_file() {
        let path = temp_path("persistent");
        let auth = PersistentAuth::new(Arc::new(LocalOnly), path.clone());

        auth.sign_in("kiosk@example.com", "pw").await.unwrap();
        assert_eq!(load(&path).unwrap().unwrap().email, "kiosk@example.com");

        auth.sign_out().await.unwrap();
        assert!(!path.exists());
    }
}
