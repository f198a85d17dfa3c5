//! Bearer token extraction from the `Authorization` header.

use http::{header::AUTHORIZATION, HeaderMap, HeaderValue};

use crate::AuthError;

/// Extracts the token from the request's `Authorization` header.
pub fn token_from_headers(headers: &HeaderMap) -> Result<&str, AuthError> {
    token_from_header_value(headers.get(AUTHORIZATION))
}

/// Extracts the token from a raw header value, which must be visible ASCII.
pub fn token_from_header_value(value: Option<&HeaderValue>) -> Result<&str, AuthError> {
    match value {
        None => Err(AuthError::header_missing()),
        Some(value) => {
            let value = value.to_str().map_err(|_| AuthError::malformed_header())?;
            extract_token(Some(value))
        }
    }
}

/// Splits `Bearer <token>` and returns the token part unchanged.
///
/// An empty or all-whitespace header counts as missing.
pub fn extract_token(header: Option<&str>) -> Result<&str, AuthError> {
    let header = header.ok_or_else(AuthError::header_missing)?;

    let mut parts = header.split_whitespace();
    let (scheme, token) = match (parts.next(), parts.next(), parts.next()) {
        (None, _, _) => return Err(AuthError::header_missing()),
        (Some(_), None, _) => return Err(AuthError::missing_token()),
        (Some(_), Some(_), Some(_)) => return Err(AuthError::malformed_header()),
        (Some(scheme), Some(token), None) => (scheme, token),
    };

    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(AuthError::wrong_scheme());
    }
    Ok(token)
}
