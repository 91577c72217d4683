//! ID token verification against the provider's published certificates.

use crate::config::IdTokenConfig;
use crate::error::{IdTokenError, IdTokenResult};
use async_trait::async_trait;
use jsonwebtoken::errors::{Error as JwtError, ErrorKind};
use jsonwebtoken::jwk::{AlgorithmParameters, Jwk, JwkSet};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode, decode_header};
use ras_identity_core::VerifiedClaims;
use reqwest::Client;
use serde_json::{Map, Value};
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

/// Cryptographic verification of an ID token.
///
/// This is the only place a token may be declared valid.
#[async_trait]
pub trait TokenVerifier: Send + Sync {
    /// Verify `token` for `audience`.
    ///
    /// `Ok(None)` means the token verified but carried no usable claims.
    async fn verify_id_token(
        &self,
        token: &str,
        audience: &str,
    ) -> IdTokenResult<Option<VerifiedClaims>>;
}

#[derive(Debug)]
struct CachedCertificates {
    jwks: JwkSet,
    fetched_at: Instant,
}

/// Verifies RS/ES/PS-signed tokens against a JWK set fetched over HTTPS and
/// cached in memory.
pub struct CertificateVerifier {
    http_client: Client,
    certs_url: String,
    issuers: Vec<String>,
    algorithms: Vec<Algorithm>,
    cache_ttl: Duration,
    refresh_interval: Duration,
    leeway: u64,
    cache: RwLock<Option<CachedCertificates>>,
    /// Held across every fetch. Records when an unknown `kid` last forced one.
    refresh: Mutex<Option<Instant>>,
}

impl CertificateVerifier {
    pub fn new(config: &IdTokenConfig) -> IdTokenResult<Self> {
        let http_client = Client::builder()
            .timeout(config.http_timeout())
            .build()
            .map_err(|e| IdTokenError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            certs_url: config.certs_url.clone(),
            issuers: config.issuers.clone(),
            algorithms: config.signing_algorithms()?,
            cache_ttl: config.certs_cache_ttl(),
            refresh_interval: config.certs_refresh_interval(),
            leeway: config.clock_skew_secs,
            cache: RwLock::new(None),
            refresh: Mutex::new(None),
        })
    }

    /// Drop cached certificates; the next verification refetches them.
    pub async fn clear_cache(&self) {
        *self.cache.write().await = None;
    }

    async fn cached_certificates(&self) -> Option<JwkSet> {
        self.cache
            .read()
            .await
            .as_ref()
            .filter(|cached| cached.fetched_at.elapsed() < self.cache_ttl)
            .map(|cached| cached.jwks.clone())
    }

    /// Cached certificates, fetched when missing or stale. Concurrent misses
    /// share one fetch.
    async fn certificates(&self) -> IdTokenResult<JwkSet> {
        if let Some(jwks) = self.cached_certificates().await {
            return Ok(jwks);
        }

        let _refresh = self.refresh.lock().await;
        if let Some(jwks) = self.cached_certificates().await {
            return Ok(jwks);
        }

        self.refresh_cache().await
    }

    /// Refetch for a `kid` missing from the cached set, at most once per
    /// refresh interval.
    async fn refresh_for_kid(&self, kid: &str) -> IdTokenResult<Option<Jwk>> {
        let mut last_forced = self.refresh.lock().await;

        // Another attempt may have refreshed while this one waited.
        if let Some(jwks) = self.cached_certificates().await {
            if let Some(key) = jwks.find(kid) {
                return Ok(Some(key.clone()));
            }
        }

        if last_forced.is_some_and(|at| at.elapsed() < self.refresh_interval) {
            debug!("Certificates refreshed recently, not refetching for {}", kid);
            return Ok(None);
        }

        *last_forced = Some(Instant::now());
        let jwks = self.refresh_cache().await?;
        Ok(jwks.find(kid).cloned())
    }

    async fn refresh_cache(&self) -> IdTokenResult<JwkSet> {
        let jwks = self.fetch_certificates().await?;

        *self.cache.write().await = Some(CachedCertificates {
            jwks: jwks.clone(),
            fetched_at: Instant::now(),
        });

        Ok(jwks)
    }

    async fn fetch_certificates(&self) -> IdTokenResult<JwkSet> {
        debug!("Fetching provider certificates from {}", self.certs_url);

        let response = self
            .http_client
            .get(&self.certs_url)
            .send()
            .await
            .map_err(|e| IdTokenError::CertificateFetch(e.to_string()))?;

        if !response.status().is_success() {
            return Err(IdTokenError::CertificateFetch(format!(
                "HTTP {} from {}",
                response.status(),
                self.certs_url
            )));
        }

        let jwks: JwkSet = response
            .json()
            .await
            .map_err(|e| IdTokenError::CertificateFetch(format!("Invalid JWK set: {}", e)))?;

        info!(
            "Fetched {} provider certificates from {}",
            jwks.keys.len(),
            self.certs_url
        );

        Ok(jwks)
    }

    /// Candidate signing keys. A `kid` selects exactly one key and an unknown
    /// one may trigger a refresh; without a `kid` every published key of the
    /// right type is a candidate.
    async fn signing_keys(&self, kid: Option<&str>, alg: Algorithm) -> IdTokenResult<Vec<Jwk>> {
        let Some(kid) = kid else {
            let keys: Vec<Jwk> = self
                .certificates()
                .await?
                .keys
                .into_iter()
                .filter(|jwk| key_fits(jwk, alg))
                .collect();

            if keys.is_empty() {
                return Err(IdTokenError::KeyNotFound(format!(
                    "no published key for {:?}",
                    alg
                )));
            }
            return Ok(keys);
        };

        if let Some(key) = self.certificates().await?.find(kid) {
            return Ok(vec![key.clone()]);
        }

        debug!("Signing key {} not cached, refreshing certificates", kid);
        self.refresh_for_kid(kid)
            .await?
            .map(|key| vec![key])
            .ok_or_else(|| IdTokenError::KeyNotFound(kid.to_string()))
    }
}

fn key_fits(jwk: &Jwk, alg: Algorithm) -> bool {
    matches!(
        (&jwk.algorithm, alg),
        (
            AlgorithmParameters::RSA(_),
            Algorithm::RS256
                | Algorithm::RS384
                | Algorithm::RS512
                | Algorithm::PS256
                | Algorithm::PS384
                | Algorithm::PS512
        ) | (
            AlgorithmParameters::EllipticCurve(_),
            Algorithm::ES256 | Algorithm::ES384
        ) | (AlgorithmParameters::OctetKeyPair(_), Algorithm::EdDSA)
    )
}

fn decode_error(error: JwtError, audience: &str) -> IdTokenError {
    match error.kind() {
        ErrorKind::ExpiredSignature => IdTokenError::TokenExpired,
        ErrorKind::InvalidSignature => IdTokenError::InvalidSignature,
        ErrorKind::InvalidIssuer => IdTokenError::InvalidIssuer,
        ErrorKind::InvalidAudience => IdTokenError::InvalidAudience(audience.to_string()),
        _ => IdTokenError::InvalidToken(error.to_string()),
    }
}

#[async_trait]
impl TokenVerifier for CertificateVerifier {
    async fn verify_id_token(
        &self,
        token: &str,
        audience: &str,
    ) -> IdTokenResult<Option<VerifiedClaims>> {
        let header = decode_header(token)
            .map_err(|e| IdTokenError::InvalidToken(format!("Invalid header: {}", e)))?;

        if !self.algorithms.contains(&header.alg) {
            warn!("Rejected ID token signed with {:?}", header.alg);
            return Err(IdTokenError::UnsupportedAlgorithm(header.alg));
        }

        let keys = self.signing_keys(header.kid.as_deref(), header.alg).await?;

        let mut validation = Validation::new(header.alg);
        validation.set_audience(&[audience]);
        validation.set_issuer(&self.issuers);
        validation.leeway = self.leeway;

        for jwk in &keys {
            let key = DecodingKey::from_jwk(jwk)
                .map_err(|e| IdTokenError::InvalidToken(format!("Unusable signing key: {}", e)))?;

            match decode::<Map<String, Value>>(token, &key, &validation) {
                Ok(data) => return Ok(VerifiedClaims::from_verified(data.claims)),
                Err(e) if matches!(e.kind(), ErrorKind::InvalidSignature) => {
                    debug!("Signature does not match key {:?}", jwk.common.key_id);
                }
                Err(e) => return Err(decode_error(e, audience)),
            }
        }

        Err(IdTokenError::InvalidSignature)
    }
}
