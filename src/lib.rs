//! Drinks menu backend for a coffee shop, guarded by permissions carried in
//! [JSON Web Tokens (JWT)](https://datatracker.ietf.org/doc/html/rfc7519) issued by an external identity provider.
//!
//! ## Overview
//!
//! Every protected operation passes through the same chain before it runs:
//!
//! - **Token extraction**: the bearer token is pulled out of the `Authorization` header. Malformed headers are
//!   rejected without any network traffic.
//! - **Token verification**: the token's `kid` is resolved against the identity provider's
//!   [JWK set](https://datatracker.ietf.org/doc/html/rfc7517), its RS256 signature is checked and its `exp`, `aud`
//!   and `iss` claims are validated.
//! - **Permission check**: the verified `permissions` claim must contain the operation's permission string, e.g.
//!   `post:drinks`.
//!
//! The first failing step decides the response, which is always a JSON body of the form
//! `{"success": false, "error": <status>, "message": <description>}`.
//!
//! ## Key set caching
//!
//! The JWK set is fetched from `https://<domain>/.well-known/jwks.json`. To avoid a fetch per request, fetched sets
//! are cached with a configurable time-to-live; concurrent misses share one in-flight fetch and a token signed with
//! an unknown `kid` triggers a single refresh so rotated keys are picked up early. Outgoing fetches may additionally
//! be rate limited.
//!
//! ## Quickstart
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use axum::{handler::Handler, routing::get, Router};
//! use coffeeshop::{AuthConfig, Claims, Guard, TokenVerifier};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = AuthConfig::new("your-tenant.auth0.com", "coffeeshop")?;
//!     let verifier = Arc::new(TokenVerifier::from_config(&config)?);
//!
//!     let detail = |claims: Claims| async move { format!("hello {}", claims.subject().unwrap_or_default()) };
//!     let router: Router = Router::new().route(
//!         "/drinks-detail",
//!         get(detail.layer(Guard::new(verifier, "get:drinks-detail").layer())),
//!     );
//!
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
//!     axum::serve(listener, router).await?;
//!     Ok(())
//! }
//! ```

pub mod app;
pub mod authorization;
pub mod bearer;
pub mod claims;
pub mod config;
pub mod drinks;
pub mod observability;
pub mod permissions;
pub mod verifier;

pub use authorization::{AuthorizationLayer, Guard};
pub use claims::Claims;
pub use config::{AuthConfig, Config};
pub use error::{AuthError, ErrorCode, JwksError};
pub use key_source::KeySource;
pub use remote_jwk_set::RemoteJwkSet;
pub use verifier::TokenVerifier;

mod error;
mod jwks_cache;
mod key_source;
mod remote_jwk_set;

#[cfg(test)]
mod testing;
