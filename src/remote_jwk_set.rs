use std::{
    num::NonZeroU64,
    sync::Arc,
    task::{Context, Poll},
    time::{Duration, Instant},
};

use futures::future::BoxFuture;
use jsonwebtoken::jwk::{Jwk, JwkSet};
use parking_lot::Mutex;
use reqwest::Client;
use tower::{
    buffer::BufferLayer, limit::RateLimitLayer, util::BoxCloneService, BoxError, Layer, Service,
    ServiceBuilder, ServiceExt,
};
use tower_layer::layer_fn;
use tracing::{debug, info};
use url::Url;

use crate::{jwks_cache::JwksCacheLayer, JwksError};

/// What a lookup asks of the service stack.
#[derive(Debug, Clone)]
pub(crate) enum Fetch {
    /// Any snapshot that has not expired will do.
    Cached,
    /// The given snapshot lacked a key; replace it unless someone already has.
    Refresh(Arc<JwkSet>),
}

struct CacheConfig {
    time_to_live: Duration,
}

struct RateLimitConfig {
    num: NonZeroU64,
    per: Duration,
}

/// Builder for configuring a `RemoteJwkSet` with optional caching and rate limiting.
pub struct RemoteJwkSetBuilder {
    url: Url,
    timeout: Duration,
    min_refresh_interval: Duration,
    cache_config: Option<CacheConfig>,
    rate_limit_config: Option<RateLimitConfig>,
}

impl RemoteJwkSetBuilder {
    /// Creates a new builder with the given JWKS URL.
    pub fn new(url: Url) -> Self {
        Self {
            url,
            timeout: Duration::from_secs(10),
            min_refresh_interval: Duration::from_secs(30),
            cache_config: None,
            rate_limit_config: None,
        }
    }

    /// Bounds each outgoing request. A timed out fetch fails like any other.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Enables caching to avoid re-fetching the remote JWK set on every authentication request.
    pub fn with_cache(mut self, time_to_live: Duration) -> Self {
        self.cache_config = Some(CacheConfig { time_to_live });
        self
    }

    /// Minimum time between two refreshes caused by an unknown `kid`. Only relevant with a cache.
    pub fn with_min_refresh_interval(mut self, min_refresh_interval: Duration) -> Self {
        self.min_refresh_interval = min_refresh_interval;
        self
    }

    /// Allows at most `num` outgoing requests per `per`. Cache hits don't count.
    pub fn with_rate_limit(mut self, num: NonZeroU64, per: Duration) -> Self {
        self.rate_limit_config = Some(RateLimitConfig { num, per });
        self
    }

    /// Builds the `RemoteJwkSet` with the configured options.
    ///
    /// Must be called from within a Tokio runtime when rate limiting is enabled.
    pub fn build(self) -> Result<RemoteJwkSet, JwksError> {
        let http_client = Client::builder().timeout(self.timeout).build()?;
        let request_service = JwkSetRequestService {
            http_client,
            url: self.url,
        };

        let cached = self.cache_config.is_some();
        let cache_layer = self
            .cache_config
            .map(|cache_config| JwksCacheLayer::new(cache_config.time_to_live));

        let rate_limit_layer = self.rate_limit_config.map(|rate_limit_config| {
            layer_fn(move |inner: JwkSetRequestService| {
                let rate_limited_service =
                    RateLimitLayer::new(rate_limit_config.num.get(), rate_limit_config.per)
                        .layer(inner);

                // `RateLimit` is not `Clone`; the buffer makes it shareable.
                BufferLayer::<Fetch>::new(1024)
                    .layer(rate_limited_service)
                    .map_err(buffer_error)
            })
        });

        let service_tower = ServiceBuilder::new()
            .option_layer(cache_layer)
            .option_layer(rate_limit_layer)
            .service(request_service);

        Ok(RemoteJwkSet {
            cached,
            min_refresh_interval: self.min_refresh_interval,
            last_refresh: Arc::new(Mutex::new(None)),
            service_tower: Arc::new(Mutex::new(BoxCloneService::new(service_tower))),
        })
    }
}

fn buffer_error(err: BoxError) -> JwksError {
    match err.downcast::<JwksError>() {
        Ok(err) => *err,
        Err(err) => JwksError::Unavailable(err.to_string()),
    }
}

/// The identity provider's JWK set, fetched over HTTP.
///
/// Cheap to clone; clones share the cache and the rate limit.
#[derive(Clone)]
pub struct RemoteJwkSet {
    cached: bool,
    min_refresh_interval: Duration,
    last_refresh: Arc<Mutex<Option<Instant>>>,
    service_tower: Arc<Mutex<BoxCloneService<Fetch, Arc<JwkSet>, JwksError>>>,
}

impl RemoteJwkSet {
    /// Creates a builder for configuring a `RemoteJwkSet`.
    pub fn builder(url: Url) -> RemoteJwkSetBuilder {
        RemoteJwkSetBuilder::new(url)
    }

    pub async fn jwk_set(&self) -> Result<Arc<JwkSet>, JwksError> {
        self.call(Fetch::Cached).await
    }

    /// Looks up the key with the given `kid`.
    ///
    /// A cached set that lacks the key is refreshed once, so rotated keys are picked up before the cache expires.
    /// Such refreshes happen at most once per minimum refresh interval, however many unknown `kid`s arrive.
    pub async fn find(&self, kid: &str) -> Result<Option<Jwk>, JwksError> {
        let jwk_set = self.call(Fetch::Cached).await?;
        if let Some(jwk) = jwk_set.find(kid) {
            return Ok(Some(jwk.clone()));
        }
        if !self.cached {
            return Ok(None);
        }
        if !self.claim_refresh() {
            debug!(kid, "kid not in cached JWK set, refreshed too recently");
            return Ok(None);
        }

        debug!(kid, "kid not in cached JWK set, refreshing");
        let jwk_set = self.call(Fetch::Refresh(jwk_set)).await?;
        Ok(jwk_set.find(kid).cloned())
    }

    fn claim_refresh(&self) -> bool {
        let mut last_refresh = self.last_refresh.lock();
        let now = Instant::now();
        if last_refresh.is_some_and(|at| now.duration_since(at) < self.min_refresh_interval) {
            return false;
        }
        *last_refresh = Some(now);
        true
    }

    async fn call(&self, fetch: Fetch) -> Result<Arc<JwkSet>, JwksError> {
        let service = self.service_tower.lock().clone();
        service.oneshot(fetch).await
    }
}

/// Helper service wrapping a `reqwest::Client` to fetch a JWK Set from a given URL.
#[derive(Clone)]
struct JwkSetRequestService {
    http_client: Client,
    url: Url,
}

impl Service<Fetch> for JwkSetRequestService {
    type Response = Arc<JwkSet>;
    type Error = JwksError;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, _req: Fetch) -> Self::Future {
        let http_client = self.http_client.clone();
        let url = self.url.clone();
        Box::pin(async move {
            let response = http_client.get(url.clone()).send().await?;

            if !response.status().is_success() {
                return Err(JwksError::ErrorResponse {
                    status_code: response.status(),
                });
            }

            let body = response.bytes().await?;
            let jwk_set: JwkSet = serde_json::from_slice(&body)
                .map_err(|err| JwksError::Malformed(err.to_string()))?;
            info!(url = %url, keys = jwk_set.keys.len(), "fetched JWK set");
            Ok(Arc::new(jwk_set))
        })
    }
}

#[cfg(test)]
mod test {
    use std::num::NonZeroU64;
    use std::time::Duration;

    use http::StatusCode;
    use wiremock::{
        matchers::{method, path},
        Mock, MockServer, ResponseTemplate,
    };

    use super::RemoteJwkSet;
    use crate::testing::MockIdentityProvider;
    use crate::JwksError;

    #[tokio::test]
    async fn test_fetches_on_every_lookup_without_cache() {
        let provider = MockIdentityProvider::start().await;
        let remote_jwk_set = RemoteJwkSet::builder(provider.jwks_url()).build().unwrap();

        for _ in 0..3 {
            let jwk = remote_jwk_set.find(provider.kid()).await.unwrap();
            assert!(jwk.is_some());
        }
        assert_eq!(provider.jwks_requests().await, 3);
    }

    #[tokio::test]
    async fn test_cache_serves_repeated_lookups() {
        let provider = MockIdentityProvider::start().await;
        let remote_jwk_set = RemoteJwkSet::builder(provider.jwks_url())
            .with_cache(Duration::from_secs(60))
            .build()
            .unwrap();

        for _ in 0..3 {
            assert!(remote_jwk_set.find(provider.kid()).await.unwrap().is_some());
        }
        assert_eq!(provider.jwks_requests().await, 1);
    }

    #[tokio::test]
    async fn test_concurrent_misses_share_one_fetch() {
        let provider = MockIdentityProvider::start().await;
        let remote_jwk_set = RemoteJwkSet::builder(provider.jwks_url())
            .with_cache(Duration::from_secs(60))
            .build()
            .unwrap();

        let lookups = (0..8).map(|_| {
            let remote_jwk_set = remote_jwk_set.clone();
            tokio::spawn(async move { remote_jwk_set.jwk_set().await })
        });
        for lookup in futures::future::join_all(lookups).await {
            assert_eq!(lookup.unwrap().unwrap().keys.len(), 1);
        }
        assert_eq!(provider.jwks_requests().await, 1);
    }

    #[tokio::test]
    async fn test_unknown_kid_refreshes_cached_set_once() {
        let provider = MockIdentityProvider::start().await;
        let remote_jwk_set = RemoteJwkSet::builder(provider.jwks_url())
            .with_cache(Duration::from_secs(60))
            .build()
            .unwrap();

        assert!(remote_jwk_set.find("rotated").await.unwrap().is_none());
        assert_eq!(provider.jwks_requests().await, 2);

        // The refreshed snapshot is cached again.
        assert!(remote_jwk_set.find(provider.kid()).await.unwrap().is_some());
        assert_eq!(provider.jwks_requests().await, 2);
    }

    #[tokio::test]
    async fn test_unknown_kids_refresh_at_most_once_per_interval() {
        let provider = MockIdentityProvider::start().await;
        let remote_jwk_set = RemoteJwkSet::builder(provider.jwks_url())
            .with_cache(Duration::from_secs(300))
            .build()
            .unwrap();

        assert!(remote_jwk_set.find(provider.kid()).await.unwrap().is_some());
        for i in 0..20 {
            let kid = format!("bogus-{i}");
            assert!(remote_jwk_set.find(&kid).await.unwrap().is_none());
        }
        assert_eq!(provider.jwks_requests().await, 2);
    }

    #[tokio::test]
    async fn test_unknown_kid_refreshes_again_after_interval() {
        let provider = MockIdentityProvider::start().await;
        let remote_jwk_set = RemoteJwkSet::builder(provider.jwks_url())
            .with_cache(Duration::from_secs(300))
            .with_min_refresh_interval(Duration::from_millis(50))
            .build()
            .unwrap();

        assert!(remote_jwk_set.find("rotated").await.unwrap().is_none());
        assert!(remote_jwk_set.find("rotated").await.unwrap().is_none());
        assert_eq!(provider.jwks_requests().await, 2);

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(remote_jwk_set.find("rotated").await.unwrap().is_none());
        assert_eq!(provider.jwks_requests().await, 3);
    }

    #[tokio::test]
    async fn test_rate_limited_fetches_still_succeed() {
        let provider = MockIdentityProvider::start().await;
        let remote_jwk_set = RemoteJwkSet::builder(provider.jwks_url())
            .with_rate_limit(NonZeroU64::new(10).unwrap(), Duration::from_secs(1))
            .build()
            .unwrap();

        for _ in 0..3 {
            assert!(remote_jwk_set.find(provider.kid()).await.unwrap().is_some());
        }
    }

    #[tokio::test]
    async fn test_error_status_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/.well-known/jwks.json"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;
        let url = url::Url::parse(&server.uri())
            .unwrap()
            .join(".well-known/jwks.json")
            .unwrap();

        let remote_jwk_set = RemoteJwkSet::builder(url).build().unwrap();
        assert_eq!(
            remote_jwk_set.jwk_set().await.unwrap_err(),
            JwksError::ErrorResponse {
                status_code: StatusCode::SERVICE_UNAVAILABLE
            }
        );
    }

    #[tokio::test]
    async fn test_malformed_body_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let remote_jwk_set = RemoteJwkSet::builder(url::Url::parse(&server.uri()).unwrap())
            .build()
            .unwrap();
        assert!(matches!(
            remote_jwk_set.jwk_set().await,
            Err(JwksError::Malformed(_))
        ));
    }

    #[tokio::test]
    async fn test_slow_endpoint_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"keys": []}))
                    .set_delay(Duration::from_secs(5)),
            )
            .mount(&server)
            .await;

        let remote_jwk_set = RemoteJwkSet::builder(url::Url::parse(&server.uri()).unwrap())
            .with_timeout(Duration::from_millis(100))
            .build()
            .unwrap();
        assert_eq!(
            remote_jwk_set.jwk_set().await.unwrap_err(),
            JwksError::Timeout
        );
    }
}
