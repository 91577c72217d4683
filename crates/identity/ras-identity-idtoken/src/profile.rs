//! Verified claims to profile mapping.

use ras_identity_core::{Profile, ProfileEmail, ProfileName, ProfilePhoto, VerifiedClaims};
use serde_json::Value;

/// Map verified claims into a profile tagged with `provider`.
///
/// Total and deterministic: absent or non-string optional claims yield empty
/// lists or unset fields, never an error.
pub fn map_profile(provider: &str, claims: &VerifiedClaims) -> Profile {
    let family_name = claims.get_str("family_name").map(String::from);
    let given_name = claims.get_str("given_name").map(String::from);
    let name = if family_name.is_some() || given_name.is_some() {
        Some(ProfileName {
            family_name,
            given_name,
        })
    } else {
        None
    };

    let emails = claims
        .get_str("email")
        .map(|email| ProfileEmail {
            value: email.to_string(),
            verified: email_verified(claims.get("email_verified")),
        })
        .into_iter()
        .collect();

    let photos = claims
        .get_str("picture")
        .map(|picture| ProfilePhoto {
            value: picture.to_string(),
        })
        .into_iter()
        .collect();

    Profile {
        provider: provider.to_string(),
        id: claims.subject().to_string(),
        display_name: claims.get_str("name").unwrap_or_default().to_string(),
        name,
        emails,
        photos,
        json: claims.as_map().clone(),
    }
}

// Some providers send the flag as a string.
fn email_verified(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Bool(verified)) => *verified,
        Some(Value::String(verified)) => verified.eq_ignore_ascii_case("true"),
        _ => false,
    }
}
