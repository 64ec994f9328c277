//! Error types for the session service
//!
//! Component errors (provider, token, directory, config) are folded into
//! [`AuthError`] at the session boundary.

use thiserror::Error;

use crate::config::ConfigError;
use crate::identity::ProviderError;
use crate::token::TokenError;
use crate::user::DirectoryError;

/// What a caller should do after a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recovery {
    /// Obtain a new identity token and start over
    Reauthenticate,
    /// The account needs manual attention
    ContactSupport,
    /// The account does not exist yet
    Register,
    /// Transient failure, the same request may succeed later
    Retry,
    /// The request itself is wrong
    FixRequest,
    /// Startup cannot continue
    Fatal,
}

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Identity token has expired")]
    ProviderTokenExpired,

    #[error("Identity token has been revoked")]
    ProviderTokenRevoked,

    #[error("User account is disabled")]
    ProviderUserDisabled,

    #[error("User account not found")]
    ProviderUserNotFound,

    #[error("Invalid identity token: {0}")]
    ProviderInvalidToken(String),

    #[error("Identity provider unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("Invalid token payload: {0}")]
    InvalidTokenPayload(String),

    #[error("Session token has expired")]
    SessionTokenExpired,

    #[error("Invalid session token: {0}")]
    SessionTokenInvalid(String),

    #[error("User profile not found")]
    UserNotFound,

    #[error("Invalid profile update: {0}")]
    InvalidProfileUpdate(String),

    #[error("Directory conflict: {0}")]
    DirectoryConflict(String),

    #[error("User directory unavailable: {0}")]
    DirectoryUnavailable(String),

    #[error("Failed to sign session token: {0}")]
    TokenSigning(String),

    #[error("Configuration missing: {0}")]
    ConfigurationMissing(String),
}

impl AuthError {
    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            Self::ProviderTokenExpired => "TOKEN_EXPIRED",
            Self::ProviderTokenRevoked => "TOKEN_REVOKED",
            Self::ProviderUserDisabled => "USER_DISABLED",
            Self::ProviderUserNotFound => "USER_NOT_FOUND",
            Self::ProviderInvalidToken(_) => "INVALID_TOKEN",
            Self::ProviderUnavailable(_) => "PROVIDER_UNAVAILABLE",
            Self::InvalidTokenPayload(_) => "INVALID_TOKEN_PAYLOAD",
            Self::SessionTokenExpired => "SESSION_EXPIRED",
            Self::SessionTokenInvalid(_) => "SESSION_INVALID",
            Self::UserNotFound => "PROFILE_NOT_FOUND",
            Self::InvalidProfileUpdate(_) => "INVALID_PROFILE_UPDATE",
            Self::DirectoryConflict(_) => "DIRECTORY_CONFLICT",
            Self::DirectoryUnavailable(_) => "DIRECTORY_UNAVAILABLE",
            Self::TokenSigning(_) => "TOKEN_SIGNING_FAILED",
            Self::ConfigurationMissing(_) => "CONFIGURATION_MISSING",
        }
    }

    pub fn recovery(&self) -> Recovery {
        match self {
            Self::ProviderTokenExpired
            | Self::ProviderTokenRevoked
            | Self::ProviderInvalidToken(_)
            | Self::InvalidTokenPayload(_)
            | Self::SessionTokenExpired
            | Self::SessionTokenInvalid(_)
            | Self::UserNotFound => Recovery::Reauthenticate,
            Self::ProviderUserDisabled | Self::DirectoryConflict(_) => Recovery::ContactSupport,
            Self::ProviderUserNotFound => Recovery::Register,
            Self::ProviderUnavailable(_) | Self::DirectoryUnavailable(_) | Self::TokenSigning(_) => {
                Recovery::Retry
            }
            Self::InvalidProfileUpdate(_) => Recovery::FixRequest,
            Self::ConfigurationMissing(_) => Recovery::Fatal,
        }
    }

    /// Message suitable for end users
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::ProviderTokenExpired => {
                "Your identity token has expired. Please log in again to continue."
            }
            Self::ProviderTokenRevoked => {
                "Your identity token has been revoked. Please log in again to continue."
            }
            Self::ProviderUserDisabled => "Your account has been disabled. Please contact support.",
            Self::ProviderUserNotFound => "User account not found. Please register first.",
            Self::ProviderInvalidToken(_) | Self::InvalidTokenPayload(_) => {
                "Invalid authentication token. Please try logging in again."
            }
            Self::SessionTokenExpired => "Your session has expired. Please log in again.",
            Self::SessionTokenInvalid(_) => "Invalid or expired token.",
            Self::UserNotFound => "User not found.",
            Self::InvalidProfileUpdate(_) => "Invalid profile data.",
            Self::DirectoryConflict(_) => {
                "Your account could not be linked. Please contact support."
            }
            Self::ProviderUnavailable(_) | Self::DirectoryUnavailable(_) | Self::TokenSigning(_) => {
                "Service temporarily unavailable. Please try again."
            }
            Self::ConfigurationMissing(_) => "Service is misconfigured.",
        }
    }
}

impl From<ProviderError> for AuthError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::TokenExpired => Self::ProviderTokenExpired,
            ProviderError::TokenRevoked => Self::ProviderTokenRevoked,
            ProviderError::UserDisabled => Self::ProviderUserDisabled,
            ProviderError::UserNotFound => Self::ProviderUserNotFound,
            ProviderError::InvalidToken(reason) => Self::ProviderInvalidToken(reason),
            ProviderError::Unavailable(reason) => Self::ProviderUnavailable(reason),
        }
    }
}

impl From<TokenError> for AuthError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Expired => Self::SessionTokenExpired,
            TokenError::Invalid(reason) => Self::SessionTokenInvalid(reason),
            TokenError::MissingStableId => {
                Self::InvalidTokenPayload("session token is missing stableId".to_string())
            }
            TokenError::Signing(reason) => Self::TokenSigning(reason),
        }
    }
}

impl From<DirectoryError> for AuthError {
    fn from(err: DirectoryError) -> Self {
        match err {
            DirectoryError::NotFound(_) => Self::UserNotFound,
            DirectoryError::Conflict(reason) => Self::DirectoryConflict(reason),
            DirectoryError::InvalidInput(reason) => Self::InvalidProfileUpdate(reason),
            other => Self::DirectoryUnavailable(other.to_string()),
        }
    }
}

impl From<ConfigError> for AuthError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Missing(name) => Self::ConfigurationMissing(name.to_string()),
        }
    }
}
