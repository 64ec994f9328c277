//! Session token issuing and verification
//!
//! Access and refresh tokens carry the same payload but are signed with
//! separate HS256 secrets, so one kind never verifies as the other.

use chrono::Utc;
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::{parse_lifetime, SessionConfig};

/// Identity claims embedded in every session token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionTokenPayload {
    #[serde(rename = "sub")]
    pub subject: String,
    pub phone_number: String,
    #[serde(default)]
    pub stable_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Token pair returned to clients. Lifetimes are in seconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub access_token_expires_in: u64,
    pub refresh_token_expires_in: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Access,
    Refresh,
}

impl TokenKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Access => "access",
            Self::Refresh => "refresh",
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("token has expired")]
    Expired,
    #[error("invalid token: {0}")]
    Invalid(String),
    #[error("token payload is missing stableId")]
    MissingStableId,
    #[error("failed to sign token: {0}")]
    Signing(String),
}

#[derive(Debug, Serialize, Deserialize)]
struct SessionClaims {
    #[serde(flatten)]
    payload: SessionTokenPayload,
    #[serde(default)]
    iat: i64,
    exp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    aud: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    iss: Option<String>,
}

#[derive(Clone)]
struct SigningKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    lifetime_seconds: u64,
}

impl SigningKeys {
    fn new(secret: &str, lifetime: &str) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            lifetime_seconds: parse_lifetime(lifetime),
        }
    }
}

#[derive(Clone)]
pub struct TokenIssuer {
    access: SigningKeys,
    refresh: SigningKeys,
    audience: Option<String>,
    issuer: Option<String>,
    validation: Validation,
}

impl std::fmt::Debug for TokenIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenIssuer")
            .field("access_lifetime_seconds", &self.access.lifetime_seconds)
            .field("refresh_lifetime_seconds", &self.refresh.lifetime_seconds)
            .field("audience", &self.audience)
            .field("issuer", &self.issuer)
            .finish_non_exhaustive()
    }
}

impl TokenIssuer {
    pub fn new(config: &SessionConfig) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        let mut required = vec!["exp"];
        match config.audience.as_deref() {
            Some(audience) => {
                validation.set_audience(&[audience]);
                required.push("aud");
            }
            None => validation.validate_aud = false,
        }
        if let Some(issuer) = config.issuer.as_deref() {
            validation.set_issuer(&[issuer]);
            required.push("iss");
        }
        validation.set_required_spec_claims(required.as_slice());

        Self {
            access: SigningKeys::new(&config.access_secret, &config.access_lifetime),
            refresh: SigningKeys::new(&config.refresh_secret, &config.refresh_lifetime),
            audience: config.audience.clone(),
            issuer: config.issuer.clone(),
            validation,
        }
    }

    pub fn access_lifetime_seconds(&self) -> u64 {
        self.access.lifetime_seconds
    }

    pub fn refresh_lifetime_seconds(&self) -> u64 {
        self.refresh.lifetime_seconds
    }

    /// Sign `payload` as both an access and a refresh token
    pub fn issue_token_pair(
        &self,
        payload: &SessionTokenPayload,
    ) -> Result<TokenResponse, TokenError> {
        let issued_at = Utc::now().timestamp();
        let access_token = self.sign(TokenKind::Access, payload, issued_at)?;
        let refresh_token = self.sign(TokenKind::Refresh, payload, issued_at)?;

        Ok(TokenResponse {
            access_token,
            refresh_token,
            access_token_expires_in: self.access.lifetime_seconds,
            refresh_token_expires_in: self.refresh.lifetime_seconds,
        })
    }

    pub fn verify_access_token(&self, token: &str) -> Result<SessionTokenPayload, TokenError> {
        self.verify(TokenKind::Access, token)
    }

    pub fn verify_refresh_token(&self, token: &str) -> Result<SessionTokenPayload, TokenError> {
        self.verify(TokenKind::Refresh, token)
    }

    fn keys(&self, kind: TokenKind) -> &SigningKeys {
        match kind {
            TokenKind::Access => &self.access,
            TokenKind::Refresh => &self.refresh,
        }
    }

    fn sign(
        &self,
        kind: TokenKind,
        payload: &SessionTokenPayload,
        issued_at: i64,
    ) -> Result<String, TokenError> {
        let keys = self.keys(kind);
        let lifetime = i64::try_from(keys.lifetime_seconds).unwrap_or(i64::MAX);
        let claims = SessionClaims {
            payload: payload.clone(),
            iat: issued_at,
            exp: issued_at.saturating_add(lifetime),
            aud: self.audience.clone(),
            iss: self.issuer.clone(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &keys.encoding).map_err(|err| {
            TokenError::Signing(format!("{} token: {}", kind.as_str(), err))
        })
    }

    fn verify(&self, kind: TokenKind, token: &str) -> Result<SessionTokenPayload, TokenError> {
        let claims = decode::<SessionClaims>(token, &self.keys(kind).decoding, &self.validation)
            .map_err(|err| match err.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Invalid(format!("{} token: {}", kind.as_str(), err)),
            })?
            .claims;

        // The library accepts exp == now; a zero lifetime must already be expired.
        if claims.exp <= Utc::now().timestamp() {
            return Err(TokenError::Expired);
        }
        if claims.payload.stable_id.trim().is_empty() {
            return Err(TokenError::MissingStableId);
        }
        Ok(claims.payload)
    }
}
