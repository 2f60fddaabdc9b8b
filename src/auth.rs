//! Signed-in user and bearer token.
//!
//! Obtaining a token is someone else's job (an OAuth flow, `gcloud auth
//! print-access-token`, ...). This module only stores what `login` is given
//! and hands it to the Drive client. `GEOSNAP_ACCESS_TOKEN` overrides the
//! stored token for one run.

use crate::store::{LocalStore, StoreError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub const ACCESS_TOKEN_KEY: &str = "google_access_token";
pub const USER_INFO_KEY: &str = "google_user_info";
pub const TOKEN_ENV: &str = "GEOSNAP_ACCESS_TOKEN";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserInfo {
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[async_trait]
pub trait TokenSource: Send + Sync {
    /// Whether a user is signed in. Checked before any network call.
    fn is_authenticated(&self) -> bool;
    /// Current bearer token, if one can be produced.
    async fn access_token(&self) -> Option<String>;
    fn user(&self) -> Option<UserInfo>;
}

/// Token source backed by the local store.
pub struct StoredSession {
    store: Arc<LocalStore>,
    env_token: Option<String>,
}

impl StoredSession {
    /// Reads `GEOSNAP_ACCESS_TOKEN` once.
    pub fn new(store: Arc<LocalStore>) -> Self {
        let env_token = std::env::var(TOKEN_ENV).ok();
        Self::with_env_token(store, env_token)
    }

    pub fn with_env_token(store: Arc<LocalStore>, env_token: Option<String>) -> Self {
        Self {
            store,
            env_token: env_token.filter(|t| !t.trim().is_empty()),
        }
    }
}

#[async_trait]
impl TokenSource for StoredSession {
    fn is_authenticated(&self) -> bool {
        self.env_token.is_some() || self.user().is_some()
    }

    async fn access_token(&self) -> Option<String> {
        self.env_token
            .clone()
            .or_else(|| self.store.get(ACCESS_TOKEN_KEY))
            .filter(|t| !t.is_empty())
    }

    fn user(&self) -> Option<UserInfo> {
        let raw = self.store.get(USER_INFO_KEY)?;
        match serde_json::from_str(&raw) {
            Ok(user) => Some(user),
            Err(e) => {
                tracing::warn!("ignoring unreadable user info: {e}");
                None
            }
        }
    }
}

/// Remember a signed-in user and their token.
pub fn login(store: &LocalStore, user: &UserInfo, access_token: &str) -> Result<(), StoreError> {
    store.set(USER_INFO_KEY, &serde_json::to_string(user)?)?;
    store.set(ACCESS_TOKEN_KEY, access_token)?;
    tracing::info!(email = %user.email, "signed in");
    Ok(())
}

/// Forget the user and token.
pub fn logout(store: &LocalStore) -> Result<(), StoreError> {
    store.remove(ACCESS_TOKEN_KEY)?;
    store.remove(USER_INFO_KEY)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn user() -> UserInfo {
        UserInfo {
            email: "inspector@example.com".into(),
            name: Some("Inspector".into()),
        }
    }

    fn session(tmp: &TempDir, env: Option<&str>) -> (Arc<LocalStore>, StoredSession) {
        let store = Arc::new(LocalStore::in_dir(tmp.path()).unwrap());
        let session = StoredSession::with_env_token(Arc::clone(&store), env.map(String::from));
        (store, session)
    }

    #[tokio::test]
    async fn signed_out_by_default() {
        let tmp = TempDir::new().unwrap();
        let (_, session) = session(&tmp, None);
        assert!(!session.is_authenticated());
        assert_eq!(session.access_token().await, None);
        assert_eq!(session.user(), None);
    }

    #[tokio::test]
    async fn login_then_logout() {
        let tmp = TempDir::new().unwrap();
        let (store, session) = session(&tmp, None);

        login(&store, &user(), "ya29.token").unwrap();
        assert!(session.is_authenticated());
        assert_eq!(session.access_token().await.as_deref(), Some("ya29.token"));
        assert_eq!(session.user(), Some(user()));

        logout(&store).unwrap();
        assert!(!session.is_authenticated());
        assert_eq!(session.access_token().await, None);
    }

    #[tokio::test]
    async fn env_token_overrides_store() {
        let tmp = TempDir::new().unwrap();
        let (store, session) = session(&tmp, Some("from-env"));
        login(&store, &user(), "stored").unwrap();
        assert_eq!(session.access_token().await.as_deref(), Some("from-env"));
    }

    #[tokio::test]
    async fn blank_env_token_ignored() {
        let tmp = TempDir::new().unwrap();
        let (_, session) = session(&tmp, Some("  "));
        assert!(!session.is_authenticated());
    }

    #[tokio::test]
    async fn user_without_token_is_authenticated_but_tokenless() {
        let tmp = TempDir::new().unwrap();
        let (store, session) = session(&tmp, None);
        store
            .set(USER_INFO_KEY, r#"{"email":"a@b.c"}"#)
            .unwrap();
        assert!(session.is_authenticated());
        assert_eq!(session.access_token().await, None);
    }
}
