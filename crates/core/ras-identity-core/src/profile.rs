//! Normalized, provider-tagged identity profile.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Identity record derived from verified claims.
///
/// Field names on the wire follow the profile shape host frameworks expect
/// (`displayName`, `name.familyName`, `_json`, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub provider: String,
    pub id: String,
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<ProfileName>,
    /// Zero or one entries.
    #[serde(default)]
    pub emails: Vec<ProfileEmail>,
    /// Zero or one entries.
    #[serde(default)]
    pub photos: Vec<ProfilePhoto>,
    /// The full verified claim set, for callers needing provider-specific data.
    #[serde(rename = "_json", default)]
    pub json: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileName {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub family_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub given_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileEmail {
    pub value: String,
    pub verified: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfilePhoto {
    pub value: String,
}

impl Profile {
    pub fn primary_email(&self) -> Option<&ProfileEmail> {
        self.emails.first()
    }

    pub fn photo(&self) -> Option<&str> {
        self.photos.first().map(|photo| photo.value.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_profile_wire_shape() {
        let profile = Profile {
            provider: "google".to_string(),
            id: "1234".to_string(),
            display_name: "Test User".to_string(),
            name: Some(ProfileName {
                family_name: Some("User".to_string()),
                given_name: None,
            }),
            emails: vec![ProfileEmail {
                value: "user@example.com".to_string(),
                verified: true,
            }],
            photos: vec![],
            json: json!({"sub": "1234"}).as_object().cloned().unwrap(),
        };

        let value = serde_json::to_value(&profile).unwrap();
        assert_eq!(
            value,
            json!({
                "provider": "google",
                "id": "1234",
                "displayName": "Test User",
                "name": {"familyName": "User"},
                "emails": [{"value": "user@example.com", "verified": true}],
                "photos": [],
                "_json": {"sub": "1234"}
            })
        );

        assert_eq!(profile.primary_email().unwrap().value, "user@example.com");
        assert_eq!(profile.photo(), None);
    }

    #[test]
    fn test_absent_name_is_omitted() {
        let json = r#"{
            "provider": "google",
            "id": "1234",
            "displayName": ""
        }"#;

        let profile: Profile = serde_json::from_str(json).unwrap();
        assert!(profile.name.is_none());
        assert!(profile.emails.is_empty());
        assert!(profile.json.is_empty());

        let value = serde_json::to_value(&profile).unwrap();
        assert!(value.get("name").is_none());
    }
}
