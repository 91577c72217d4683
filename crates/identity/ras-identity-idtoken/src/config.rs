//! ID token strategy configuration.
//!
//! Values come from code (`IdTokenConfig::new(..).with_*`) or from an optional
//! TOML file plus `IDTOKEN__*` environment variables via [`IdTokenConfig::load`].
//! Environment variables take precedence over the file.

use crate::error::{IdTokenError, IdTokenResult};
use config::{Config, Environment, File};
use jsonwebtoken::Algorithm;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

pub const GOOGLE_CERTS_URL: &str = "https://www.googleapis.com/oauth2/v3/certs";

/// Configuration for one ID token strategy instance. Immutable once the
/// strategy is built.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdTokenConfig {
    /// Client identifier; tokens must carry it as their audience.
    pub client_id: String,

    /// Provider tag written into every profile (default: google)
    #[serde(default = "default_provider")]
    pub provider: String,

    /// Request field holding the token (default: id_token)
    #[serde(default = "default_token_field")]
    pub token_field: String,

    /// JWK set endpoint publishing the provider's signing certificates
    #[serde(default = "default_certs_url")]
    pub certs_url: String,

    /// Accepted `iss` values
    #[serde(default = "default_issuers")]
    pub issuers: Vec<String>,

    /// Accepted signing algorithms (default: RS256)
    #[serde(default = "default_algorithms")]
    pub algorithms: Vec<String>,

    /// Upper bound on a single verification, certificate fetch included.
    /// Millisecond granularity.
    #[serde(default = "default_verification_timeout_ms")]
    pub verification_timeout_ms: u64,

    /// HTTP client timeout for certificate requests
    #[serde(default = "default_http_timeout")]
    pub http_timeout_secs: u64,

    /// How long fetched certificates are reused
    #[serde(default = "default_certs_cache_ttl")]
    pub certs_cache_ttl_secs: u64,

    /// Minimum time between refetches forced by an unknown key id
    #[serde(default = "default_certs_refresh_interval")]
    pub certs_refresh_interval_secs: u64,

    /// Leeway applied to `exp`/`nbf`
    #[serde(default = "default_clock_skew")]
    pub clock_skew_secs: u64,
}

fn default_provider() -> String {
    "google".to_string()
}

fn default_token_field() -> String {
    "id_token".to_string()
}

fn default_certs_url() -> String {
    GOOGLE_CERTS_URL.to_string()
}

fn default_issuers() -> Vec<String> {
    vec![
        "accounts.google.com".to_string(),
        "https://accounts.google.com".to_string(),
    ]
}

fn default_algorithms() -> Vec<String> {
    vec!["RS256".to_string()]
}

fn default_verification_timeout_ms() -> u64 {
    10_000
}

fn default_http_timeout() -> u64 {
    30
}

fn default_certs_cache_ttl() -> u64 {
    3600 // 1 hour
}

fn default_certs_refresh_interval() -> u64 {
    60
}

fn default_clock_skew() -> u64 {
    60
}

impl IdTokenConfig {
    pub fn new(client_id: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            provider: default_provider(),
            token_field: default_token_field(),
            certs_url: default_certs_url(),
            issuers: default_issuers(),
            algorithms: default_algorithms(),
            verification_timeout_ms: default_verification_timeout_ms(),
            http_timeout_secs: default_http_timeout(),
            certs_cache_ttl_secs: default_certs_cache_ttl(),
            certs_refresh_interval_secs: default_certs_refresh_interval(),
            clock_skew_secs: default_clock_skew(),
        }
    }

    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = provider.into();
        self
    }

    pub fn with_certs_url(mut self, url: impl Into<String>) -> Self {
        self.certs_url = url.into();
        self
    }

    pub fn with_issuers(mut self, issuers: Vec<String>) -> Self {
        self.issuers = issuers;
        self
    }

    /// Stored in whole milliseconds; sub-millisecond parts are dropped and
    /// durations beyond `u64::MAX` ms saturate.
    pub fn with_verification_timeout(mut self, timeout: Duration) -> Self {
        self.verification_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn with_http_timeout(mut self, seconds: u64) -> Self {
        self.http_timeout_secs = seconds;
        self
    }

    pub fn with_certs_cache_ttl(mut self, seconds: u64) -> Self {
        self.certs_cache_ttl_secs = seconds;
        self
    }

    pub fn with_certs_refresh_interval(mut self, seconds: u64) -> Self {
        self.certs_refresh_interval_secs = seconds;
        self
    }

    /// Load configuration from an optional TOML file and `IDTOKEN__*`
    /// environment variables (e.g. `IDTOKEN__CLIENT_ID`), then validate it.
    pub fn load(path: Option<&Path>) -> IdTokenResult<Self> {
        let mut builder = Config::builder();

        match path {
            Some(path) if path.exists() => {
                info!("Loading ID token configuration from {}", path.display());
                builder = builder.add_source(File::from(path));
            }
            Some(path) => {
                debug!("No config file found at {}, using environment", path.display());
            }
            None => {}
        }

        builder = builder.add_source(
            Environment::with_prefix("IDTOKEN")
                .separator("__")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("issuers")
                .with_list_parse_key("algorithms"),
        );

        let config: IdTokenConfig = builder.build()?.try_deserialize()?;
        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> IdTokenResult<()> {
        if self.client_id.trim().is_empty() {
            return Err(IdTokenError::Config("client_id cannot be empty".to_string()));
        }

        if self.token_field.is_empty() {
            return Err(IdTokenError::Config("token_field cannot be empty".to_string()));
        }

        if self.certs_url.is_empty() {
            return Err(IdTokenError::Config("certs_url cannot be empty".to_string()));
        }

        if self.issuers.is_empty() {
            return Err(IdTokenError::Config(
                "At least one trusted issuer is required".to_string(),
            ));
        }

        self.signing_algorithms()?;

        if self.verification_timeout_ms == 0 {
            return Err(IdTokenError::Config(
                "Verification timeout must be at least 1 ms".to_string(),
            ));
        }

        if self.http_timeout_secs == 0 {
            return Err(IdTokenError::Config("HTTP timeout must be positive".to_string()));
        }

        Ok(())
    }

    /// Parsed algorithm allow-list. HMAC algorithms are rejected.
    pub fn signing_algorithms(&self) -> IdTokenResult<Vec<Algorithm>> {
        if self.algorithms.is_empty() {
            return Err(IdTokenError::Config(
                "At least one signing algorithm is required".to_string(),
            ));
        }

        self.algorithms
            .iter()
            .map(|name| {
                let algorithm = Algorithm::from_str(name).map_err(|_| {
                    IdTokenError::Config(format!("Unknown signing algorithm '{}'", name))
                })?;
                match algorithm {
                    Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512 => {
                        Err(IdTokenError::Config(format!(
                            "Symmetric algorithm '{}' is not allowed",
                            name
                        )))
                    }
                    _ => Ok(algorithm),
                }
            })
            .collect()
    }

    pub fn verification_timeout(&self) -> Duration {
        Duration::from_millis(self.verification_timeout_ms)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn certs_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.certs_cache_ttl_secs)
    }

    pub fn certs_refresh_interval(&self) -> Duration {
        Duration::from_secs(self.certs_refresh_interval_secs)
    }
}
