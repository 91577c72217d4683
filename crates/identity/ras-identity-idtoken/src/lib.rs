//! ID token authentication strategy.
//!
//! Reads an ID token from an inbound request (body, then query, then headers),
//! verifies it against the identity provider's published certificates, maps the
//! verified claims into a normalized [`Profile`], and hands the profile to
//! caller-supplied verify logic. Every attempt ends in exactly one
//! [`Outcome`]: success, rejection, or error.
//!
//! ```rust,ignore
//! let strategy = IdTokenStrategy::new(
//!     IdTokenConfig::new("my-client-id.apps.googleusercontent.com"),
//!     |_access: String, _refresh: String, profile: Profile, done: Done<User>| async move {
//!         match users.find(&profile.id).await {
//!             Some(user) => done.success(user, None),
//!             None => done.fail(Some(AuthInfo::new("no such user"))),
//!         }
//!     },
//! )?;
//!
//! match strategy.authenticate(&request).await {
//!     Outcome::Success { user, .. } => { /* attach user */ }
//!     Outcome::Fail { info } => { /* 401 */ }
//!     Outcome::Error(cause) => { /* 500 */ }
//! }
//! ```

mod config;
mod error;
mod profile;
mod request;
mod strategy;
mod verifier;


pub use config::{GOOGLE_CERTS_URL, IdTokenConfig};
pub use error::{IdTokenError, IdTokenResult};
pub use profile::map_profile;
pub use request::{
    InboundRequest, LOOKUP_ORDER, MAX_BODY_BYTES, TokenAccessor, TokenSource, locate_token,
};
pub use strategy::{
    Done, IdTokenStrategy, STAND_IN_ACCESS_TOKEN, STAND_IN_REFRESH_TOKEN, STRATEGY_NAME,
    VerifyFuture, VerifyProfile, VerifyProfileWithRequest,
};
pub use verifier::{CertificateVerifier, TokenVerifier};

// Re-export common types for convenience
pub use ras_identity_core::{
    AuthInfo, AuthenticationError, Outcome, OutcomeHandlers, Profile, VerifiedClaims,
};
