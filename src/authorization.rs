use std::{
    future::Future,
    sync::Arc,
    task::{Context, Poll},
};

use axum::extract::{FromRequestParts, Request};
use axum::http::{header::AUTHORIZATION, request::Parts, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use futures::future::BoxFuture;
use tower::Layer;
use tower_service::Service;
use tracing::{debug, error};

use crate::{bearer, permissions::check_permission, verifier::TokenVerifier, AuthError, Claims};

/// Gate for operations that require a single permission.
///
/// Runs the token extraction, verification and permission check in order and stops at the first failure.
#[derive(Clone)]
pub struct Guard {
    verifier: Arc<TokenVerifier>,
    permission: String,
}

impl Guard {
    pub fn new(verifier: Arc<TokenVerifier>, permission: impl Into<String>) -> Self {
        Self {
            verifier,
            permission: permission.into(),
        }
    }

    pub fn permission(&self) -> &str {
        &self.permission
    }

    /// Authorizes a request carrying the given `Authorization` header value.
    pub async fn authorize(&self, header: Option<&HeaderValue>) -> Result<Claims, AuthError> {
        let token = bearer::token_from_header_value(header)?;
        let claims = self.verifier.verify(token).await?;
        check_permission(&self.permission, &claims)?;
        Ok(claims)
    }

    /// Invokes `operation` with the decoded claims, but only once the request is authorized.
    pub async fn run<F, Fut, T>(
        &self,
        header: Option<&HeaderValue>,
        operation: F,
    ) -> Result<T, AuthError>
    where
        F: FnOnce(Claims) -> Fut,
        Fut: Future<Output = T>,
    {
        let claims = self.authorize(header).await?;
        Ok(operation(claims).await)
    }

    /// Wraps a route handler in this guard.
    pub fn layer(&self) -> AuthorizationLayer {
        AuthorizationLayer {
            guard: self.clone(),
        }
    }
}

/// Per-route middleware that admits a request only if its bearer token grants the guard's permission.
///
/// Admitted requests carry their [`Claims`] in the request extensions; rejected ones are answered with the
/// [`AuthError`] and never reach the handler.
#[derive(Clone)]
pub struct AuthorizationLayer {
    guard: Guard,
}

impl<S> Layer<S> for AuthorizationLayer {
    type Service = AuthorizationService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        AuthorizationService {
            inner,
            guard: self.guard.clone(),
        }
    }
}

#[derive(Clone)]
pub struct AuthorizationService<S> {
    inner: S,
    guard: Guard,
}

impl<S> Service<Request> for AuthorizationService<S>
where
    S: Service<Request, Response = Response> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request) -> Self::Future {
        // Only the service `poll_ready` was called on may be called; keep the clone for the next request.
        // https://docs.rs/tower/latest/tower/trait.Service.html#be-careful-when-cloning-inner-services
        let inner_clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, inner_clone);

        let guard = self.guard.clone();
        Box::pin(async move {
            let authorize_result = guard.authorize(req.headers().get(AUTHORIZATION)).await;
            match authorize_result {
                Ok(claims) => {
                    req.extensions_mut().insert(claims);
                    inner.call(req).await
                }
                Err(auth_error) => {
                    debug!(
                        permission = guard.permission(),
                        code = %auth_error.code(),
                        "request rejected"
                    );
                    Ok(auth_error.into_response())
                }
            }
        })
    }
}

/// Hands the claims of an authorized request to a handler.
///
/// Only available behind an [`AuthorizationLayer`]; elsewhere the request fails with a 500.
#[axum::async_trait]
impl<S> FromRequestParts<S> for Claims
where
    S: Send + Sync,
{
    type Rejection = StatusCode;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts.extensions.get::<Claims>().cloned().ok_or_else(|| {
            error!("claims requested by a handler without an authorization layer");
            StatusCode::INTERNAL_SERVER_ERROR
        })
    }
}
