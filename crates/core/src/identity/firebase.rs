//! Firebase ID token verification
//!
//! Tokens are RS256 JWTs signed by Google. Public keys come from Google's
//! JWK endpoint and are cached for `key_ttl`. An unknown `kid` forces a
//! refresh so key rotation is picked up without a restart, at most once per
//! `refresh_cooldown`.
//!
//! Only the token itself is checked. Revocation and disabled-account checks
//! need the Firebase Admin API and are not performed here.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use jsonwebtoken::{
    decode, decode_header, errors::ErrorKind, jwk::JwkSet, Algorithm, DecodingKey, Validation,
};
use serde::Deserialize;
use tokio::sync::RwLock;

use super::{IdentityClaim, IdentityProvider, ProviderError};

pub const GOOGLE_JWKS_URI: &str =
    "https://www.googleapis.com/service_accounts/v1/jwk/securetoken@system.gserviceaccount.com";

const FIREBASE_ISSUER_PREFIX: &str = "https://securetoken.google.com/";
const DEFAULT_KEY_TTL: Duration = Duration::from_secs(60 * 60);
const DEFAULT_REFRESH_COOLDOWN: Duration = Duration::from_secs(60);
const MAX_SUBJECT_LEN: usize = 128;

#[derive(Debug, Deserialize)]
struct FirebaseClaims {
    sub: String,
    #[serde(default)]
    phone_number: Option<String>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    email_verified: Option<bool>,
    #[serde(default)]
    picture: Option<String>,
    #[serde(default)]
    auth_time: Option<i64>,
}

impl From<FirebaseClaims> for IdentityClaim {
    fn from(claims: FirebaseClaims) -> Self {
        Self {
            subject: Some(claims.sub),
            phone_number: claims.phone_number,
            email: claims.email,
            name: claims.name,
            email_verified: claims.email_verified,
            picture: claims.picture,
        }
    }
}

struct CachedKeys {
    keys: JwkSet,
    fetched_at: Instant,
}

#[derive(Default)]
struct KeyCache {
    current: Option<CachedKeys>,
    last_forced_refresh: Option<Instant>,
}

impl KeyCache {
    fn fresh(&self, ttl: Duration) -> Option<&CachedKeys> {
        self.current
            .as_ref()
            .filter(|cached| cached.fetched_at.elapsed() < ttl)
    }
}

fn key_for(keys: &JwkSet, kid: &str) -> Result<Option<DecodingKey>, ProviderError> {
    match keys.find(kid) {
        Some(jwk) => DecodingKey::from_jwk(jwk).map(Some).map_err(|err| {
            ProviderError::InvalidToken(format!("unusable signing key '{}': {}", kid, err))
        }),
        None => Ok(None),
    }
}

fn unknown_kid(kid: &str) -> ProviderError {
    ProviderError::InvalidToken(format!("unknown signing key id '{}'", kid))
}

/// Verifies Firebase ID tokens for a single project
pub struct FirebaseVerifier {
    project_id: String,
    jwks_uri: String,
    client: reqwest::Client,
    key_ttl: Duration,
    refresh_cooldown: Duration,
    validation: Validation,
    cache: RwLock<KeyCache>,
}

impl std::fmt::Debug for FirebaseVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FirebaseVerifier")
            .field("project_id", &self.project_id)
            .field("jwks_uri", &self.jwks_uri)
            .field("key_ttl", &self.key_ttl)
            .finish_non_exhaustive()
    }
}

impl FirebaseVerifier {
    pub fn new(project_id: impl Into<String>) -> Self {
        let project_id = project_id.into();
        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_audience(&[project_id.as_str()]);
        validation.set_issuer(&[format!("{}{}", FIREBASE_ISSUER_PREFIX, project_id)]);
        validation.set_required_spec_claims(&["exp", "aud", "iss", "sub"]);

        Self {
            project_id,
            jwks_uri: GOOGLE_JWKS_URI.to_string(),
            client: reqwest::Client::new(),
            key_ttl: DEFAULT_KEY_TTL,
            refresh_cooldown: DEFAULT_REFRESH_COOLDOWN,
            validation,
            cache: RwLock::new(KeyCache::default()),
        }
    }

    pub fn with_jwks_uri(mut self, jwks_uri: impl Into<String>) -> Self {
        self.jwks_uri = jwks_uri.into();
        self
    }

    pub fn with_key_ttl(mut self, key_ttl: Duration) -> Self {
        self.key_ttl = key_ttl;
        self
    }

    /// Minimum spacing between refreshes forced by unknown key ids
    pub fn with_refresh_cooldown(mut self, refresh_cooldown: Duration) -> Self {
        self.refresh_cooldown = refresh_cooldown;
        self
    }

    /// Seed the key cache, skipping the first network fetch
    pub fn with_keys(self, keys: JwkSet) -> Self {
        Self {
            cache: RwLock::new(KeyCache {
                current: Some(CachedKeys {
                    keys,
                    fetched_at: Instant::now(),
                }),
                last_forced_refresh: None,
            }),
            ..self
        }
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    async fn decoding_key(&self, kid: &str) -> Result<DecodingKey, ProviderError> {
        {
            let cache = self.cache.read().await;
            if let Some(cached) = cache.fresh(self.key_ttl) {
                if let Some(key) = key_for(&cached.keys, kid)? {
                    return Ok(key);
                }
            }
        }

        // Held across the fetch so concurrent misses share one request.
        let mut cache = self.cache.write().await;
        let cached_key = match cache.fresh(self.key_ttl) {
            Some(cached) => Some(key_for(&cached.keys, kid)?),
            None => None,
        };
        if let Some(cached_key) = cached_key {
            if let Some(key) = cached_key {
                return Ok(key);
            }
            if cache
                .last_forced_refresh
                .is_some_and(|at| at.elapsed() < self.refresh_cooldown)
            {
                tracing::debug!(kid, "unknown key id within refresh cooldown");
                return Err(unknown_kid(kid));
            }
            cache.last_forced_refresh = Some(Instant::now());
        }

        let keys = self.fetch_keys().await?;
        let key = key_for(&keys, kid)?;
        cache.current = Some(CachedKeys {
            keys,
            fetched_at: Instant::now(),
        });
        key.ok_or_else(|| unknown_kid(kid))
    }

    async fn fetch_keys(&self) -> Result<JwkSet, ProviderError> {
        tracing::debug!(uri = %self.jwks_uri, "fetching identity provider signing keys");
        self.client
            .get(&self.jwks_uri)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|err| ProviderError::Unavailable(format!("Failed to fetch keys: {}", err)))?
            .json::<JwkSet>()
            .await
            .map_err(|err| ProviderError::Unavailable(format!("Failed to parse keys: {}", err)))
    }
}

#[async_trait]
impl IdentityProvider for FirebaseVerifier {
    async fn verify_id_token(&self, id_token: &str) -> Result<IdentityClaim, ProviderError> {
        let header = decode_header(id_token)
            .map_err(|err| ProviderError::InvalidToken(format!("Malformed token: {}", err)))?;
        if header.alg != Algorithm::RS256 {
            return Err(ProviderError::InvalidToken(format!(
                "Unexpected algorithm {:?}",
                header.alg
            )));
        }
        let kid = header
            .kid
            .ok_or_else(|| ProviderError::InvalidToken("Token has no key id".to_string()))?;

        let key = self.decoding_key(&kid).await?;
        let claims = decode::<FirebaseClaims>(id_token, &key, &self.validation)
            .map_err(|err| match err.kind() {
                ErrorKind::ExpiredSignature => ProviderError::TokenExpired,
                _ => ProviderError::InvalidToken(err.to_string()),
            })?
            .claims;

        if claims.sub.is_empty() || claims.sub.len() > MAX_SUBJECT_LEN {
            return Err(ProviderError::InvalidToken(
                "Token subject is empty or too long".to_string(),
            ));
        }
        let latest_auth_time = Utc::now().timestamp() + self.validation.leeway as i64;
        if claims
            .auth_time
            .is_some_and(|auth_time| auth_time > latest_auth_time)
        {
            return Err(ProviderError::InvalidToken(
                "Token auth_time is in the future".to_string(),
            ));
        }

        Ok(claims.into())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde_json::{json, Value};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinSet;

    use super::*;

    const PROJECT: &str = "credmate-test";
    const SIGNING_KEY: &str = include_str!("testdata/signing_key.pem");
    const JWKS: &str = include_str!("testdata/jwks.json");

    fn verifier() -> FirebaseVerifier {
        let keys: JwkSet = serde_json::from_str(JWKS).unwrap();
        FirebaseVerifier::new(PROJECT)
            .with_jwks_uri("http://127.0.0.1:9/unreachable")
            .with_keys(keys)
    }

    fn claims(overrides: Value) -> Value {
        let now = Utc::now().timestamp();
        let mut claims = json!({
            "iss": format!("{}{}", FIREBASE_ISSUER_PREFIX, PROJECT),
            "aud": PROJECT,
            "sub": "firebase-uid-1",
            "iat": now - 10,
            "exp": now + 3600,
            "auth_time": now - 10,
            "phone_number": "+12345678900",
            "email": "asha@example.com",
            "email_verified": true,
            "name": "Asha",
        });
        if let (Some(base), Some(extra)) = (claims.as_object_mut(), overrides.as_object()) {
            for (key, value) in extra {
                base.insert(key.clone(), value.clone());
            }
        }
        claims
    }

    fn sign(claims: &Value, kid: &str) -> String {
        let mut header = Header::new(Algorithm::RS256);
        header.kid = Some(kid.to_string());
        encode(
            &header,
            claims,
            &EncodingKey::from_rsa_pem(SIGNING_KEY.as_bytes()).unwrap(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_valid_token() {
        let token = sign(&claims(json!({})), "test-key-1");
        let claim = verifier().verify_id_token(&token).await.unwrap();

        assert_eq!(claim.subject.as_deref(), Some("firebase-uid-1"));
        assert_eq!(claim.phone_number.as_deref(), Some("+12345678900"));
        assert_eq!(claim.email.as_deref(), Some("asha@example.com"));
        assert_eq!(claim.name.as_deref(), Some("Asha"));
        assert_eq!(claim.email_verified, Some(true));
    }

    #[tokio::test]
    async fn test_missing_phone_still_verifies() {
        let mut body = claims(json!({}));
        body.as_object_mut().unwrap().remove("phone_number");
        let token = sign(&body, "test-key-1");

        let claim = verifier().verify_id_token(&token).await.unwrap();
        assert!(claim.phone_number.is_none());
    }

    #[tokio::test]
    async fn test_expired_token() {
        let now = Utc::now().timestamp();
        let token = sign(
            &claims(json!({ "iat": now - 7200, "exp": now - 3600, "auth_time": now - 7200 })),
            "test-key-1",
        );
        assert_eq!(
            verifier().verify_id_token(&token).await,
            Err(ProviderError::TokenExpired)
        );
    }

    #[tokio::test]
    async fn test_wrong_audience_or_issuer() {
        let token = sign(&claims(json!({ "aud": "another-project" })), "test-key-1");
        assert!(matches!(
            verifier().verify_id_token(&token).await,
            Err(ProviderError::InvalidToken(_))
        ));

        let token = sign(
            &claims(json!({ "iss": "https://securetoken.google.com/another-project" })),
            "test-key-1",
        );
        assert!(matches!(
            verifier().verify_id_token(&token).await,
            Err(ProviderError::InvalidToken(_))
        ));
    }

    #[tokio::test]
    async fn test_empty_subject_rejected() {
        let token = sign(&claims(json!({ "sub": "" })), "test-key-1");
        assert!(matches!(
            verifier().verify_id_token(&token).await,
            Err(ProviderError::InvalidToken(_))
        ));
    }

    #[tokio::test]
    async fn test_future_auth_time_rejected() {
        let future = Utc::now().timestamp() + 3600;
        let token = sign(&claims(json!({ "auth_time": future })), "test-key-1");
        assert!(matches!(
            verifier().verify_id_token(&token).await,
            Err(ProviderError::InvalidToken(_))
        ));
    }

    #[tokio::test]
    async fn test_unknown_kid_with_unreachable_endpoint() {
        let token = sign(&claims(json!({})), "rotated-key");
        assert!(matches!(
            verifier().verify_id_token(&token).await,
            Err(ProviderError::Unavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_hmac_token_rejected() {
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims(json!({})),
            &EncodingKey::from_secret(b"guess"),
        )
        .unwrap();
        assert!(matches!(
            verifier().verify_id_token(&token).await,
            Err(ProviderError::InvalidToken(_))
        ));
    }

    /// Serve the test JWKS over HTTP and count the requests answered
    async fn serve_jwks() -> (String, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();

        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    break;
                };
                let counter = counter.clone();
                tokio::spawn(async move {
                    let mut request = Vec::new();
                    let mut buf = [0u8; 1024];
                    while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                        match socket.read(&mut buf).await {
                            Ok(0) | Err(_) => return,
                            Ok(n) => request.extend_from_slice(&buf[..n]),
                        }
                    }
                    counter.fetch_add(1, Ordering::SeqCst);
                    let response = format!(
                        "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                        JWKS.len(),
                        JWKS
                    );
                    let _ = socket.write_all(response.as_bytes()).await;
                    let _ = socket.shutdown().await;
                });
            }
        });

        (format!("http://{}/jwks", addr), hits)
    }

    #[tokio::test]
    async fn test_unknown_kids_share_one_forced_refresh() {
        let (uri, hits) = serve_jwks().await;
        let keys: JwkSet = serde_json::from_str(JWKS).unwrap();
        let verifier = FirebaseVerifier::new(PROJECT)
            .with_jwks_uri(uri)
            .with_keys(keys);

        for i in 0..10 {
            let token = sign(&claims(json!({})), &format!("unknown-{}", i));
            assert!(matches!(
                verifier.verify_id_token(&token).await,
                Err(ProviderError::InvalidToken(_))
            ));
        }
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        let token = sign(&claims(json!({})), "test-key-1");
        assert!(verifier.verify_id_token(&token).await.is_ok());
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cold_cache_fetches_once_for_concurrent_requests() {
        let (uri, hits) = serve_jwks().await;
        let verifier = Arc::new(FirebaseVerifier::new(PROJECT).with_jwks_uri(uri));
        let token = sign(&claims(json!({})), "test-key-1");

        let mut tasks = JoinSet::new();
        for _ in 0..8 {
            let verifier = verifier.clone();
            let token = token.clone();
            tasks.spawn(async move { verifier.verify_id_token(&token).await });
        }
        while let Some(result) = tasks.join_next().await {
            assert!(result.unwrap().is_ok());
        }
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_forced_refresh_allowed_after_cooldown() {
        let (uri, hits) = serve_jwks().await;
        let keys: JwkSet = serde_json::from_str(JWKS).unwrap();
        let verifier = FirebaseVerifier::new(PROJECT)
            .with_jwks_uri(uri)
            .with_refresh_cooldown(Duration::ZERO)
            .with_keys(keys);

        for i in 0..3 {
            let token = sign(&claims(json!({})), &format!("unknown-{}", i));
            assert!(verifier.verify_id_token(&token).await.is_err());
        }
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }
}
