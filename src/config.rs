use std::{net::SocketAddr, num::NonZeroU64, time::Duration};

use jsonwebtoken::Algorithm;
use serde::Deserialize;
use url::Url;

/// Path under the identity provider's domain where its JWK set is published.
pub const JWKS_PATH: &str = ".well-known/jwks.json";

/// Static settings of the authorization core, built once at startup and handed to the verifier.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    domain: String,
    audience: String,
    jwks_url: Url,
    jwks_timeout: Duration,
    jwks_cache_ttl: Option<Duration>,
    jwks_min_refresh_interval: Duration,
    jwks_rate_limit: Option<(NonZeroU64, Duration)>,
}

impl AuthConfig {
    /// Settings for tokens issued by `https://<domain>/` for `audience`.
    ///
    /// Fails if `domain` does not form a valid URL host.
    pub fn new(domain: impl Into<String>, audience: impl Into<String>) -> Result<Self, url::ParseError> {
        let domain = domain.into();
        let jwks_url = Url::parse(&format!("https://{domain}/"))?.join(JWKS_PATH)?;
        Ok(Self {
            domain,
            audience: audience.into(),
            jwks_url,
            jwks_timeout: Duration::from_secs(10),
            jwks_cache_ttl: None,
            jwks_min_refresh_interval: Duration::from_secs(30),
            jwks_rate_limit: None,
        })
    }

    /// Fetch the JWK set from `url` instead of the domain's well-known location.
    pub fn with_jwks_url(mut self, url: Url) -> Self {
        self.jwks_url = url;
        self
    }

    pub fn with_jwks_timeout(mut self, timeout: Duration) -> Self {
        self.jwks_timeout = timeout;
        self
    }

    pub fn with_jwks_cache(mut self, time_to_live: Duration) -> Self {
        self.jwks_cache_ttl = Some(time_to_live);
        self
    }

    /// Minimum time between refreshes of a cached set triggered by an unknown `kid`.
    pub fn with_jwks_min_refresh_interval(mut self, interval: Duration) -> Self {
        self.jwks_min_refresh_interval = interval;
        self
    }

    pub fn with_jwks_rate_limit(mut self, num: NonZeroU64, per: Duration) -> Self {
        self.jwks_rate_limit = Some((num, per));
        self
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn audience(&self) -> &str {
        &self.audience
    }

    /// Expected `iss` claim.
    pub fn issuer(&self) -> String {
        format!("https://{}/", self.domain)
    }

    /// Accepted signing algorithms. Fixed; tokens never get to choose.
    pub fn algorithms(&self) -> &'static [Algorithm] {
        &[Algorithm::RS256]
    }

    pub fn jwks_url(&self) -> &Url {
        &self.jwks_url
    }

    pub fn jwks_timeout(&self) -> Duration {
        self.jwks_timeout
    }

    pub fn jwks_cache_ttl(&self) -> Option<Duration> {
        self.jwks_cache_ttl
    }

    pub fn jwks_min_refresh_interval(&self) -> Duration {
        self.jwks_min_refresh_interval
    }

    pub fn jwks_rate_limit(&self) -> Option<(NonZeroU64, Duration)> {
        self.jwks_rate_limit
    }
}

/// Process configuration loaded from environment variables.
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Server host (default: 0.0.0.0)
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port (default: 8080)
    #[serde(default = "default_port")]
    pub port: u16,

    /// Identity provider domain, e.g. `tenant.us.auth0.com`
    pub auth0_domain: String,

    /// Expected `aud` claim
    pub api_audience: String,

    /// Overrides `https://<auth0_domain>/.well-known/jwks.json`
    #[serde(default)]
    pub jwks_url: Option<Url>,

    /// JWK set cache lifetime in seconds; 0 fetches on every request (default: 300)
    #[serde(default = "default_jwks_cache_ttl")]
    pub jwks_cache_ttl_secs: u64,

    /// Minimum seconds between refreshes caused by an unknown `kid` (default: 30)
    #[serde(default = "default_jwks_min_refresh")]
    pub jwks_min_refresh_secs: u64,

    /// JWK set fetch timeout in seconds (default: 10)
    #[serde(default = "default_jwks_timeout")]
    pub jwks_timeout_secs: u64,

    /// Max JWK set fetches per `jwks_rate_limit_period_secs` (default: unlimited)
    #[serde(default)]
    pub jwks_rate_limit: Option<NonZeroU64>,

    #[serde(default = "default_jwks_rate_limit_period")]
    pub jwks_rate_limit_period_secs: u64,

    /// Insert a sample drink at startup
    #[serde(default)]
    pub seed_drinks: bool,

    /// Log level (default: info)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log format: "json" or "pretty" (default: json)
    #[serde(default = "default_log_format")]
    pub log_format: String,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_jwks_cache_ttl() -> u64 {
    300
}

fn default_jwks_min_refresh() -> u64 {
    30
}

fn default_jwks_timeout() -> u64 {
    10
}

fn default_jwks_rate_limit_period() -> u64 {
    60
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error(transparent)]
    Env(#[from] envy::Error),
    #[error("invalid identity provider domain: {0}")]
    Domain(#[from] url::ParseError),
    #[error("invalid listen address: {0}")]
    ListenAddr(#[from] std::net::AddrParseError),
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Variables are the uppercase field names, e.g. `AUTH0_DOMAIN`, `JWKS_CACHE_TTL_SECS`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(envy::from_env()?)
    }

    pub fn listen_addr(&self) -> Result<SocketAddr, ConfigError> {
        Ok(format!("{}:{}", self.host, self.port).parse()?)
    }

    pub fn auth(&self) -> Result<AuthConfig, ConfigError> {
        let mut auth = AuthConfig::new(&self.auth0_domain, &self.api_audience)?
            .with_jwks_timeout(Duration::from_secs(self.jwks_timeout_secs))
            .with_jwks_min_refresh_interval(Duration::from_secs(self.jwks_min_refresh_secs));
        if let Some(url) = &self.jwks_url {
            auth = auth.with_jwks_url(url.clone());
        }
        if self.jwks_cache_ttl_secs > 0 {
            auth = auth.with_jwks_cache(Duration::from_secs(self.jwks_cache_ttl_secs));
        }
        if let Some(num) = self.jwks_rate_limit {
            auth = auth.with_jwks_rate_limit(
                num,
                Duration::from_secs(self.jwks_rate_limit_period_secs),
            );
        }
        Ok(auth)
    }
}
