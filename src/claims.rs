use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Claims of a token that passed signature and standard-claim verification.
///
/// Kept as the raw JSON object so custom claims survive untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Claims(Map<String, Value>);

impl Claims {
    pub fn new(claims: Map<String, Value>) -> Self {
        Self(claims)
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    /// The `sub` claim, if it is a string.
    pub fn subject(&self) -> Option<&str> {
        self.get("sub").and_then(Value::as_str)
    }

    /// The raw `permissions` claim, whatever its shape.
    pub fn permissions(&self) -> Option<&Value> {
        self.get("permissions")
    }
}

impl From<Map<String, Value>> for Claims {
    fn from(claims: Map<String, Value>) -> Self {
        Self(claims)
    }
}

#[cfg(test)]
mod test {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_accessors() {
        let claims: Claims = serde_json::from_value(json!({
            "sub": "auth0|barista",
            "permissions": ["get:drinks-detail"],
        }))
        .unwrap();

        assert_eq!(claims.subject(), Some("auth0|barista"));
        assert_eq!(claims.permissions(), Some(&json!(["get:drinks-detail"])));
        assert_eq!(claims.get("aud"), None);
    }

    #[test]
    fn test_non_object_is_rejected() {
        assert!(serde_json::from_value::<Claims>(json!(["sub"])).is_err());
    }
}
