//! Fixed-table identity provider
//!
//! Resolves identity tokens from an in-memory table. Used by tests and for
//! running the server without a Firebase project.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{IdentityClaim, IdentityProvider, ProviderError};

#[derive(Debug, Default)]
pub struct StaticIdentityProvider {
    entries: RwLock<HashMap<String, Result<IdentityClaim, ProviderError>>>,
    calls: AtomicUsize,
}

impl StaticIdentityProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept `id_token` and resolve it to `claim`
    pub async fn insert(&self, id_token: impl Into<String>, claim: IdentityClaim) {
        self.entries.write().await.insert(id_token.into(), Ok(claim));
    }

    /// Reject `id_token` with `error`
    pub async fn insert_error(&self, id_token: impl Into<String>, error: ProviderError) {
        self.entries
            .write()
            .await
            .insert(id_token.into(), Err(error));
    }

    /// Number of verification calls served so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IdentityProvider for StaticIdentityProvider {
    async fn verify_id_token(&self, id_token: &str) -> Result<IdentityClaim, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.entries
            .read()
            .await
            .get(id_token)
            .cloned()
            .unwrap_or_else(|| {
                Err(ProviderError::InvalidToken(
                    "unknown identity token".to_string(),
                ))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_lookup() {
        let provider = StaticIdentityProvider::new();
        provider
            .insert("good", IdentityClaim::new("uid-1", "+15550001111"))
            .await;
        provider
            .insert_error("disabled", ProviderError::UserDisabled)
            .await;

        let claim = provider.verify_id_token("good").await.unwrap();
        assert_eq!(claim.subject.as_deref(), Some("uid-1"));
        assert_eq!(
            provider.verify_id_token("disabled").await,
            Err(ProviderError::UserDisabled)
        );
        assert!(matches!(
            provider.verify_id_token("missing").await,
            Err(ProviderError::InvalidToken(_))
        ));
        assert_eq!(provider.calls(), 3);
    }
}
