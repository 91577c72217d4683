//! Core identity types shared by authentication strategies and the host framework.
//!
//! A strategy turns an inbound credential into [`VerifiedClaims`], normalizes them
//! into a [`Profile`], and reports exactly one [`Outcome`] per attempt.

mod claims;
mod outcome;
mod profile;

pub use claims::VerifiedClaims;
pub use outcome::{AuthInfo, AuthenticationError, BoxError, Outcome, OutcomeHandlers};
pub use profile::{Profile, ProfileEmail, ProfileName, ProfilePhoto};
