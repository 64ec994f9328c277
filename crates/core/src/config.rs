//! Session token configuration
//!
//! Values are read through a lookup function so callers can supply the
//! process environment or a fixed table.

use thiserror::Error;

pub const ACCESS_SECRET_VAR: &str = "JWT_SECRET";
pub const ACCESS_LIFETIME_VAR: &str = "JWT_EXPIRES_IN";
pub const REFRESH_SECRET_VAR: &str = "REFRESH_TOKEN_SECRET";
pub const REFRESH_LIFETIME_VAR: &str = "REFRESH_TOKEN_EXPIRES_IN";
pub const AUDIENCE_VAR: &str = "JWT_AUDIENCE";
pub const ISSUER_VAR: &str = "JWT_ISSUER";

pub const DEFAULT_ACCESS_LIFETIME: &str = "30m";
pub const DEFAULT_REFRESH_LIFETIME: &str = "7d";

/// Seconds used when a lifetime literal cannot be understood
pub const FALLBACK_LIFETIME_SECONDS: u64 = 1800;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required configuration: {0}")]
    Missing(&'static str),
}

#[derive(Clone)]
pub struct SessionConfig {
    pub access_secret: String,
    pub access_lifetime: String,
    pub refresh_secret: String,
    pub refresh_lifetime: String,
    pub audience: Option<String>,
    pub issuer: Option<String>,
}

// Secrets stay out of logs.
impl std::fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionConfig")
            .field("access_lifetime", &self.access_lifetime)
            .field("refresh_lifetime", &self.refresh_lifetime)
            .field("audience", &self.audience)
            .field("issuer", &self.issuer)
            .finish_non_exhaustive()
    }
}

impl SessionConfig {
    /// Build from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary key lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let access_secret =
            get(ACCESS_SECRET_VAR).ok_or(ConfigError::Missing(ACCESS_SECRET_VAR))?;
        let refresh_secret =
            get(REFRESH_SECRET_VAR).ok_or(ConfigError::Missing(REFRESH_SECRET_VAR))?;

        Ok(Self {
            access_secret,
            access_lifetime: get(ACCESS_LIFETIME_VAR)
                .unwrap_or_else(|| DEFAULT_ACCESS_LIFETIME.to_string()),
            refresh_secret,
            refresh_lifetime: get(REFRESH_LIFETIME_VAR)
                .unwrap_or_else(|| DEFAULT_REFRESH_LIFETIME.to_string()),
            audience: get(AUDIENCE_VAR),
            issuer: get(ISSUER_VAR),
        })
    }

    /// Config with explicit secrets and default lifetimes
    pub fn new(access_secret: impl Into<String>, refresh_secret: impl Into<String>) -> Self {
        Self {
            access_secret: access_secret.into(),
            access_lifetime: DEFAULT_ACCESS_LIFETIME.to_string(),
            refresh_secret: refresh_secret.into(),
            refresh_lifetime: DEFAULT_REFRESH_LIFETIME.to_string(),
            audience: None,
            issuer: None,
        }
    }

    pub fn with_lifetimes(
        mut self,
        access_lifetime: impl Into<String>,
        refresh_lifetime: impl Into<String>,
    ) -> Self {
        self.access_lifetime = access_lifetime.into();
        self.refresh_lifetime = refresh_lifetime.into();
        self
    }

    pub fn with_audience(mut self, audience: impl Into<String>) -> Self {
        self.audience = Some(audience.into());
        self
    }

    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = Some(issuer.into());
        self
    }
}

/// Convert a lifetime literal such as `30m` or `7d` to seconds.
///
/// Unknown units and unparsable numbers fall back to
/// [`FALLBACK_LIFETIME_SECONDS`] instead of failing.
pub fn parse_lifetime(literal: &str) -> u64 {
    let literal = literal.trim();
    let Some(unit) = literal.chars().last() else {
        tracing::warn!(literal, "empty token lifetime, using fallback");
        return FALLBACK_LIFETIME_SECONDS;
    };

    let multiplier = match unit {
        's' => 1,
        'm' => 60,
        'h' => 60 * 60,
        'd' => 60 * 60 * 24,
        _ => {
            tracing::warn!(literal, "unrecognized token lifetime unit, using fallback");
            return FALLBACK_LIFETIME_SECONDS;
        }
    };

    match literal[..literal.len() - unit.len_utf8()].trim().parse::<u64>() {
        Ok(value) => value.saturating_mul(multiplier),
        Err(_) => {
            tracing::warn!(literal, "unparsable token lifetime, using fallback");
            FALLBACK_LIFETIME_SECONDS
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let table: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        move |name| table.get(name).cloned()
    }

    #[test]
    fn test_parse_lifetime_units() {
        assert_eq!(parse_lifetime("45s"), 45);
        assert_eq!(parse_lifetime("30m"), 1800);
        assert_eq!(parse_lifetime("2h"), 7200);
        assert_eq!(parse_lifetime("7d"), 604_800);
        assert_eq!(parse_lifetime("0s"), 0);
    }

    #[test]
    fn test_parse_lifetime_fallback() {
        assert_eq!(parse_lifetime("10w"), FALLBACK_LIFETIME_SECONDS);
        assert_eq!(parse_lifetime("3600"), FALLBACK_LIFETIME_SECONDS);
        assert_eq!(parse_lifetime("xm"), FALLBACK_LIFETIME_SECONDS);
        assert_eq!(parse_lifetime(""), FALLBACK_LIFETIME_SECONDS);
    }

    #[test]
    fn test_from_lookup_defaults() {
        let config = SessionConfig::from_lookup(lookup(&[
            (ACCESS_SECRET_VAR, "access"),
            (REFRESH_SECRET_VAR, "refresh"),
        ]))
        .unwrap();

        assert_eq!(config.access_secret, "access");
        assert_eq!(config.refresh_secret, "refresh");
        assert_eq!(config.access_lifetime, "30m");
        assert_eq!(config.refresh_lifetime, "7d");
        assert!(config.audience.is_none());
        assert!(config.issuer.is_none());
    }

    #[test]
    fn test_from_lookup_overrides() {
        let config = SessionConfig::from_lookup(lookup(&[
            (ACCESS_SECRET_VAR, "access"),
            (REFRESH_SECRET_VAR, "refresh"),
            (ACCESS_LIFETIME_VAR, "15m"),
            (REFRESH_LIFETIME_VAR, "30d"),
            (AUDIENCE_VAR, "credmate-app"),
            (ISSUER_VAR, "credmate-api"),
        ]))
        .unwrap();

        assert_eq!(config.access_lifetime, "15m");
        assert_eq!(config.refresh_lifetime, "30d");
        assert_eq!(config.audience.as_deref(), Some("credmate-app"));
        assert_eq!(config.issuer.as_deref(), Some("credmate-api"));
    }

    #[test]
    fn test_missing_secret_is_fatal() {
        let err = SessionConfig::from_lookup(lookup(&[(REFRESH_SECRET_VAR, "refresh")]))
            .unwrap_err();
        assert_eq!(err, ConfigError::Missing(ACCESS_SECRET_VAR));

        let err = SessionConfig::from_lookup(lookup(&[
            (ACCESS_SECRET_VAR, "access"),
            (REFRESH_SECRET_VAR, "   "),
        ]))
        .unwrap_err();
        assert_eq!(err, ConfigError::Missing(REFRESH_SECRET_VAR));
    }

    #[test]
    fn test_debug_hides_secrets() {
        let rendered = format!("{:?}", SessionConfig::new("top-secret", "also-secret"));
        assert!(!rendered.contains("top-secret"));
        assert!(!rendered.contains("also-secret"));
    }
}
