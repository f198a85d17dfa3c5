//! Permission checks against the `permissions` claim.

use serde_json::Value;
use tracing::debug;

use crate::{AuthError, Claims};

/// Succeeds if `permission` is one of the strings in the token's `permissions` array.
///
/// A token without a `permissions` claim is rejected with a `400` (`invalid`), which is distinct from a token whose
/// claim lacks the permission (`401`, `unauthorized`). A `permissions` value that is not an array grants nothing.
pub fn check_permission(permission: &str, claims: &Claims) -> Result<(), AuthError> {
    let permissions = claims.permissions().ok_or_else(AuthError::no_permissions)?;

    let granted = match permissions {
        Value::Array(permissions) => permissions
            .iter()
            .any(|granted| granted.as_str() == Some(permission)),
        _ => false,
    };

    if !granted {
        debug!(permission, subject = ?claims.subject(), "permission not granted");
        return Err(AuthError::permission_not_found());
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use http::StatusCode;
    use serde_json::json;

    use super::*;
    use crate::ErrorCode;

    fn claims(value: Value) -> Claims {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_granted_permission() {
        let claims = claims(json!({"permissions": ["get:drinks-detail", "post:drinks"]}));
        assert!(check_permission("post:drinks", &claims).is_ok());
        assert!(check_permission("get:drinks-detail", &claims).is_ok());
    }

    #[test]
    fn test_missing_permission() {
        let claims = claims(json!({"permissions": ["get:drinks-detail"]}));
        let err = check_permission("post:drinks", &claims).unwrap_err();
        assert_eq!(err.code(), ErrorCode::Unauthorized);
        assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(err.description(), "Permission not found.");
    }

    #[test]
    fn test_missing_claim_is_a_bad_request_for_any_permission() {
        // Deliberately a 400 while a missing grant is a 401.
        let claims = claims(json!({"sub": "auth0|barista"}));
        for permission in ["get:drinks-detail", "post:drinks", ""] {
            let err = check_permission(permission, &claims).unwrap_err();
            assert_eq!(err.code(), ErrorCode::Invalid);
            assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
            assert_eq!(err.description(), "No permissions in JWT.");
        }
    }

    #[test]
    fn test_empty_permissions_grant_nothing() {
        let claims = claims(json!({"permissions": []}));
        let err = check_permission("get:drinks-detail", &claims).unwrap_err();
        assert_eq!(err.code(), ErrorCode::Unauthorized);
    }

    #[test]
    fn test_non_array_permissions_grant_nothing() {
        // No substring matching on a string-valued claim.
        let claims = claims(json!({"permissions": "get:drinks-detail post:drinks"}));
        let err = check_permission("post:drinks", &claims).unwrap_err();
        assert_eq!(err.code(), ErrorCode::Unauthorized);
    }

    #[test]
    fn test_match_is_exact() {
        let claims = claims(json!({"permissions": ["post:drinks"]}));
        assert!(check_permission("post:drink", &claims).is_err());
        assert!(check_permission("POST:drinks", &claims).is_err());
    }
}
