//! Session service
//!
//! Turns a verified identity token into a session token pair, redeems
//! refresh tokens and authorizes access tokens. Holds no per-session state;
//! the only stateful step is the directory upsert.

use std::sync::Arc;

use crate::error::AuthError;
use crate::identity::{IdentityClaim, IdentityProvider};
use crate::stable_id::derive_stable_id;
use crate::token::{SessionTokenPayload, TokenIssuer, TokenResponse};
use crate::user::{ProfileUpdate, UserDirectory, UserRecord, UserUpsert};
use crate::Result;

/// Progress of a single authentication attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthStage {
    Received,
    ProviderVerified,
    UserResolved,
    TokensIssued,
    Rejected,
}

impl AuthStage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Received => "received",
            Self::ProviderVerified => "provider_verified",
            Self::UserResolved => "user_resolved",
            Self::TokensIssued => "tokens_issued",
            Self::Rejected => "rejected",
        }
    }
}

#[derive(Clone)]
pub struct SessionService {
    provider: Arc<dyn IdentityProvider>,
    directory: Arc<dyn UserDirectory>,
    issuer: TokenIssuer,
}

impl SessionService {
    pub fn new(
        provider: Arc<dyn IdentityProvider>,
        directory: Arc<dyn UserDirectory>,
        issuer: TokenIssuer,
    ) -> Self {
        Self {
            provider,
            directory,
            issuer,
        }
    }

    pub fn issuer(&self) -> &TokenIssuer {
        &self.issuer
    }

    /// Exchange an external identity token for a session token pair
    pub async fn generate_session(&self, id_token: &str) -> Result<TokenResponse> {
        let mut stage = AuthStage::Received;
        let result = self.run_generate(id_token, &mut stage).await;
        match &result {
            Ok(_) => tracing::info!(stage = stage.as_str(), "session generated"),
            Err(err) => tracing::warn!(
                stage = AuthStage::Rejected.as_str(),
                failed_after = stage.as_str(),
                code = err.code(),
                error = %err,
                "session generation rejected"
            ),
        }
        result
    }

    async fn run_generate(&self, id_token: &str, stage: &mut AuthStage) -> Result<TokenResponse> {
        let claim = self.provider.verify_id_token(id_token).await?;
        advance(stage, AuthStage::ProviderVerified);

        let IdentityClaim {
            subject,
            phone_number,
            email,
            name,
            ..
        } = claim;
        let subject = required(subject, "subject")?;
        let phone_number = required(phone_number, "phone number")?;
        let stable_id = derive_stable_id(&phone_number);

        let user = self
            .directory
            .upsert_by_phone_number(
                &phone_number,
                UserUpsert {
                    stable_id: stable_id.clone(),
                    email: email.clone(),
                    name: name.clone(),
                },
            )
            .await?;
        advance(stage, AuthStage::UserResolved);
        tracing::debug!(user_id = %user.id, stable_id = %user.stable_id, "user resolved");

        let payload = SessionTokenPayload {
            subject,
            phone_number,
            stable_id,
            email,
            name,
        };
        let tokens = self.issuer.issue_token_pair(&payload)?;
        advance(stage, AuthStage::TokensIssued);
        Ok(tokens)
    }

    /// Redeem a refresh token for a new pair carrying the same payload.
    ///
    /// The directory is not consulted; profile changes made after the
    /// original login appear after the next `generate_session`.
    pub async fn refresh_session(&self, refresh_token: &str) -> Result<TokenResponse> {
        let result = self
            .issuer
            .verify_refresh_token(refresh_token)
            .map_err(AuthError::from)
            .and_then(|payload| {
                self.issuer
                    .issue_token_pair(&payload)
                    .map_err(AuthError::from)
            });
        match &result {
            Ok(_) => tracing::info!("session refreshed"),
            Err(err) => tracing::warn!(code = err.code(), error = %err, "session refresh rejected"),
        }
        result
    }

    /// Verify an access token and return its payload
    pub fn authorize(&self, access_token: &str) -> Result<SessionTokenPayload> {
        self.issuer
            .verify_access_token(access_token)
            .map_err(AuthError::from)
    }

    /// Load the directory record for an authorized caller
    pub async fn profile(&self, caller: &SessionTokenPayload) -> Result<UserRecord> {
        self.directory
            .find_by_stable_id(&caller.stable_id)
            .await?
            .ok_or(AuthError::UserNotFound)
    }

    /// Update profile fields of an authorized caller
    pub async fn update_profile(
        &self,
        caller: &SessionTokenPayload,
        update: ProfileUpdate,
    ) -> Result<UserRecord> {
        let user = self
            .directory
            .update_profile(&caller.stable_id, update)
            .await?;
        tracing::info!(user_id = %user.id, "profile updated");
        Ok(user)
    }
}

fn advance(stage: &mut AuthStage, next: AuthStage) {
    tracing::debug!(from = stage.as_str(), to = next.as_str(), "auth stage");
    *stage = next;
}

fn required(value: Option<String>, field: &str) -> Result<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .ok_or_else(|| {
            AuthError::InvalidTokenPayload(format!("identity token missing required {}", field))
        })
}
