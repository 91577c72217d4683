//! Claims that have passed cryptographic verification.

use serde::Serialize;
use serde_json::{Map, Value};

/// Claim set produced by a token verifier.
///
/// Has no `Deserialize` impl, so request payloads cannot be parsed into it.
/// [`VerifiedClaims::from_verified`] is public; by convention only
/// `TokenVerifier` implementations call it, after checking the signature.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct VerifiedClaims {
    #[serde(skip)]
    subject: String,
    claims: Map<String, Value>,
}

impl VerifiedClaims {
    /// Wraps a claim set whose signature the caller has already checked.
    ///
    /// Returns `None` when the payload has no usable subject (`sub` missing,
    /// not a string, or empty).
    pub fn from_verified(claims: Map<String, Value>) -> Option<Self> {
        let subject = claims
            .get("sub")
            .and_then(Value::as_str)
            .filter(|sub| !sub.is_empty())?
            .to_string();

        Some(Self { subject, claims })
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.claims.get(name)
    }

    /// Returns the claim as a string slice; non-string values count as absent.
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.claims.get(name).and_then(Value::as_str)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.claims
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.claims
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_subject_required() {
        assert!(VerifiedClaims::from_verified(map(json!({"email": "a@b.c"}))).is_none());
        assert!(VerifiedClaims::from_verified(map(json!({"sub": ""}))).is_none());
        assert!(VerifiedClaims::from_verified(map(json!({"sub": 42}))).is_none());

        let claims = VerifiedClaims::from_verified(map(json!({"sub": "1234"}))).unwrap();
        assert_eq!(claims.subject(), "1234");
    }

    #[test]
    fn test_accessors() {
        let claims = VerifiedClaims::from_verified(map(json!({
            "sub": "1234",
            "name": "Test User",
            "email_verified": true
        })))
        .unwrap();

        assert_eq!(claims.get_str("name"), Some("Test User"));
        assert_eq!(claims.get_str("email_verified"), None);
        assert_eq!(claims.get("email_verified"), Some(&json!(true)));
        assert_eq!(claims.as_map().len(), 3);
    }

    #[test]
    fn test_serializes_as_plain_claim_map() {
        let claims =
            VerifiedClaims::from_verified(map(json!({"sub": "1234", "hd": "example.com"})))
                .unwrap();
        let value = serde_json::to_value(&claims).unwrap();
        assert_eq!(value, json!({"sub": "1234", "hd": "example.com"}));
    }
}
