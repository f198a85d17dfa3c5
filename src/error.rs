use std::fmt;

use axum::{
    response::{IntoResponse, Response},
    Json,
};
use http::StatusCode;
use serde_json::json;

/// Machine-readable failure code carried by every [`AuthError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    AuthorizationHeaderMissing,
    InvalidHeader,
    TokenExpired,
    InvalidClaims,
    Invalid,
    Unauthorized,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::AuthorizationHeaderMissing => "authorization_header_missing",
            ErrorCode::InvalidHeader => "invalid_header",
            ErrorCode::TokenExpired => "token_expired",
            ErrorCode::InvalidClaims => "invalid_claims",
            ErrorCode::Invalid => "invalid",
            ErrorCode::Unauthorized => "unauthorized",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The single failure type that leaves the authorization core.
///
/// Every step (header extraction, key lookup, token verification, permission check) reports its failure as one of
/// the constructors below. Rendering into an HTTP response happens only at the boundary, via [`IntoResponse`].
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("{code}: {description}")]
pub struct AuthError {
    code: ErrorCode,
    description: &'static str,
    status_code: StatusCode,
}

impl AuthError {
    const fn new(code: ErrorCode, description: &'static str, status_code: StatusCode) -> Self {
        Self {
            code,
            description,
            status_code,
        }
    }

    pub fn code(&self) -> ErrorCode {
        self.code
    }

    pub fn description(&self) -> &'static str {
        self.description
    }

    pub fn status_code(&self) -> StatusCode {
        self.status_code
    }

    pub(crate) const fn header_missing() -> Self {
        Self::new(
            ErrorCode::AuthorizationHeaderMissing,
            "Authorization header is expected.",
            StatusCode::UNAUTHORIZED,
        )
    }

    pub(crate) const fn missing_token() -> Self {
        Self::new(
            ErrorCode::InvalidHeader,
            "There is no token in the header.",
            StatusCode::UNAUTHORIZED,
        )
    }

    pub(crate) const fn malformed_header() -> Self {
        Self::new(
            ErrorCode::InvalidHeader,
            "Authorization must satisfy BEARER token format.",
            StatusCode::UNAUTHORIZED,
        )
    }

    pub(crate) const fn wrong_scheme() -> Self {
        Self::new(
            ErrorCode::InvalidHeader,
            "Authorization type needs to be \"BEARER\".",
            StatusCode::UNAUTHORIZED,
        )
    }

    pub(crate) const fn missing_kid() -> Self {
        Self::new(
            ErrorCode::InvalidHeader,
            "Authorization malformed.",
            StatusCode::UNAUTHORIZED,
        )
    }

    pub(crate) const fn key_set_unavailable() -> Self {
        Self::new(
            ErrorCode::InvalidHeader,
            "Unable to fetch the signing keys.",
            StatusCode::BAD_REQUEST,
        )
    }

    pub(crate) const fn no_matching_key() -> Self {
        Self::new(
            ErrorCode::InvalidHeader,
            "Unable to find the appropriate key.",
            StatusCode::BAD_REQUEST,
        )
    }

    pub(crate) const fn unparseable_token() -> Self {
        Self::new(
            ErrorCode::InvalidHeader,
            "Unable to parse authentication token.",
            StatusCode::BAD_REQUEST,
        )
    }

    pub(crate) const fn token_expired() -> Self {
        Self::new(
            ErrorCode::TokenExpired,
            "Token expired.",
            StatusCode::UNAUTHORIZED,
        )
    }

    pub(crate) const fn invalid_claims() -> Self {
        Self::new(
            ErrorCode::InvalidClaims,
            "Incorrect claims. Please check the audience and issuer.",
            StatusCode::UNAUTHORIZED,
        )
    }

    pub(crate) const fn no_permissions() -> Self {
        Self::new(
            ErrorCode::Invalid,
            "No permissions in JWT.",
            StatusCode::BAD_REQUEST,
        )
    }

    pub(crate) const fn permission_not_found() -> Self {
        Self::new(
            ErrorCode::Unauthorized,
            "Permission not found.",
            StatusCode::UNAUTHORIZED,
        )
    }
}

impl From<JwksError> for AuthError {
    fn from(_: JwksError) -> Self {
        AuthError::key_set_unavailable()
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "success": false,
            "error": self.status_code.as_u16(),
            "message": self.description,
        }));
        (self.status_code, body).into_response()
    }
}

/// Failures while retrieving the identity provider's JWK set.
///
/// Variants hold rendered messages rather than source errors so a failed fetch can be handed to every waiter of a
/// shared cache refresh.
#[non_exhaustive]
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum JwksError {
    #[error("failed to fetch JWK set: {0}")]
    Request(String),
    #[error("JWK set request timed out")]
    Timeout,
    #[error("received error response when fetching JWK set: {status_code}")]
    ErrorResponse { status_code: StatusCode },
    #[error("failed to parse JWK set: {0}")]
    Malformed(String),
    #[error("JWK set fetcher unavailable: {0}")]
    Unavailable(String),
}

impl From<reqwest::Error> for JwksError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            JwksError::Timeout
        } else {
            JwksError::Request(err.to_string())
        }
    }
}
