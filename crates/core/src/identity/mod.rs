//! Identity provider module
//!
//! Verifies externally-issued identity tokens and returns the decoded claims.

mod firebase;
mod static_provider;

pub use firebase::{FirebaseVerifier, GOOGLE_JWKS_URI};
pub use static_provider::StaticIdentityProvider;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Claims decoded from a verified identity token
///
/// `subject` and `phone_number` are optional here because providers may
/// omit them; callers decide whether their absence is acceptable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityClaim {
    pub subject: Option<String>,
    pub phone_number: Option<String>,
    pub email: Option<String>,
    pub name: Option<String>,
    pub email_verified: Option<bool>,
    pub picture: Option<String>,
}

impl IdentityClaim {
    pub fn new(subject: impl Into<String>, phone_number: impl Into<String>) -> Self {
        Self {
            subject: Some(subject.into()),
            phone_number: Some(phone_number.into()),
            ..Self::default()
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProviderError {
    #[error("identity token has expired")]
    TokenExpired,
    #[error("identity token has been revoked")]
    TokenRevoked,
    #[error("user account is disabled")]
    UserDisabled,
    #[error("user account not found")]
    UserNotFound,
    #[error("invalid identity token: {0}")]
    InvalidToken(String),
    #[error("identity provider unavailable: {0}")]
    Unavailable(String),
}

impl ProviderError {
    /// Map a Firebase Auth error code to a provider error
    pub fn from_code(code: &str, message: impl Into<String>) -> Self {
        match code {
            "auth/id-token-expired" => Self::TokenExpired,
            "auth/id-token-revoked" => Self::TokenRevoked,
            "auth/user-disabled" => Self::UserDisabled,
            "auth/user-not-found" => Self::UserNotFound,
            _ => Self::InvalidToken(message.into()),
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::TokenExpired => "auth/id-token-expired",
            Self::TokenRevoked => "auth/id-token-revoked",
            Self::UserDisabled => "auth/user-disabled",
            Self::UserNotFound => "auth/user-not-found",
            Self::InvalidToken(_) => "auth/invalid-id-token",
            Self::Unavailable(_) => "auth/internal-error",
        }
    }
}

/// Client for an external identity provider
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Verify an identity token and return its claims
    async fn verify_id_token(&self, id_token: &str) -> Result<IdentityClaim, ProviderError>;
}
