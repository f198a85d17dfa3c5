use std::{
    sync::Arc,
    task::{Context, Poll},
    time::Duration,
};

use futures::future::BoxFuture;
use jsonwebtoken::jwk::JwkSet;
use moka::future::Cache;
use tower::{Layer, Service, ServiceExt};
use tracing::debug;

use crate::{remote_jwk_set::Fetch, JwksError};

const CACHE_KEY: &str = "jwk_set";

/// Keeps the last fetched JWK set for a bounded time.
///
/// Concurrent misses are coalesced into a single call to the inner service; every waiter receives the same
/// snapshot or the same error.
#[derive(Clone)]
pub(crate) struct JwksCacheLayer {
    cache: Cache<&'static str, Arc<JwkSet>>,
}

impl JwksCacheLayer {
    pub(crate) fn new(time_to_live: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(1)
            .time_to_live(time_to_live)
            .build();
        JwksCacheLayer { cache }
    }
}

impl<S> Layer<S> for JwksCacheLayer {
    type Service = JwksCacheService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        JwksCacheService {
            inner,
            cache: self.cache.clone(),
        }
    }
}

/// Can safely be cloned and shared across threads since moka internally uses an Arc.
#[derive(Clone)]
pub(crate) struct JwksCacheService<S> {
    inner: S,
    cache: Cache<&'static str, Arc<JwkSet>>,
}

impl<S> Service<Fetch> for JwksCacheService<S>
where
    S: Service<Fetch, Response = Arc<JwkSet>, Error = JwksError> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = Arc<JwkSet>;
    type Error = JwksError;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        // The inner service is only driven on a miss, inside the returned future.
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, fetch: Fetch) -> Self::Future {
        let inner = self.inner.clone();
        let cache = self.cache.clone();
        Box::pin(async move {
            if let Fetch::Refresh(stale) = &fetch {
                let current = cache.get(CACHE_KEY).await;
                if current.is_some_and(|current| Arc::ptr_eq(&current, stale)) {
                    debug!("invalidating cached JWK set");
                    cache.invalidate(CACHE_KEY).await;
                }
            }

            cache
                .try_get_with(CACHE_KEY, inner.oneshot(fetch))
                .await
                .map_err(|err| JwksError::clone(&err))
        })
    }
}
