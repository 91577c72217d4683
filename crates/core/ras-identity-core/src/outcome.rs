//! Authentication outcomes and the handlers that consume them.

use http::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Informational message attached to a success or a rejection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthInfo {
    pub message: String,
}

impl AuthInfo {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<&str> for AuthInfo {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

/// Cause carried by [`Outcome::Error`].
#[derive(Debug, Error)]
pub enum AuthenticationError {
    /// The credential could not be verified (bad signature, expired, wrong
    /// audience, certificate fetch failure, missing claims, timeout).
    #[error("Token verification failed: {0}")]
    Verification(BoxError),

    /// The caller-supplied verify logic reported an error.
    #[error("Verify callback failed: {0}")]
    Callback(BoxError),

    /// Anything unexpected, including a panic inside the attempt.
    #[error("Internal authentication error: {0}")]
    Internal(String),
}

impl AuthenticationError {
    pub fn verification(error: impl Into<BoxError>) -> Self {
        Self::Verification(error.into())
    }

    pub fn callback(error: impl Into<BoxError>) -> Self {
        Self::Callback(error.into())
    }
}

/// Result of one authentication attempt. Exactly one per attempt.
#[derive(Debug)]
pub enum Outcome<U> {
    Success { user: U, info: Option<AuthInfo> },
    Fail { info: Option<AuthInfo> },
    Error(AuthenticationError),
}

impl<U> Outcome<U> {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success { .. })
    }

    pub fn is_fail(&self) -> bool {
        matches!(self, Outcome::Fail { .. })
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Outcome::Error(_))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Outcome::Success { .. } => "success",
            Outcome::Fail { .. } => "fail",
            Outcome::Error(_) => "error",
        }
    }

    /// Typical host mapping: success continues, rejection is 401, error is 500.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Outcome::Success { .. } => StatusCode::OK,
            Outcome::Fail { .. } => StatusCode::UNAUTHORIZED,
            Outcome::Error(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// `Ok(Some(user))` on success, `Ok(None)` on rejection.
    pub fn into_result(self) -> Result<Option<U>, AuthenticationError> {
        match self {
            Outcome::Success { user, .. } => Ok(Some(user)),
            Outcome::Fail { .. } => Ok(None),
            Outcome::Error(error) => Err(error),
        }
    }

    /// Invokes exactly one handler method.
    pub fn dispatch<H>(self, handlers: &mut H)
    where
        H: OutcomeHandlers<U> + ?Sized,
    {
        match self {
            Outcome::Success { user, info } => handlers.success(user, info),
            Outcome::Fail { info } => handlers.fail(info),
            Outcome::Error(error) => handlers.error(error),
        }
    }
}

/// Host framework callbacks for the three outcome channels.
pub trait OutcomeHandlers<U> {
    fn success(&mut self, user: U, info: Option<AuthInfo>);

    fn fail(&mut self, info: Option<AuthInfo>);

    fn error(&mut self, error: AuthenticationError);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        calls: Vec<String>,
    }

    impl OutcomeHandlers<u32> for Recorder {
        fn success(&mut self, user: u32, _info: Option<AuthInfo>) {
            self.calls.push(format!("success:{user}"));
        }

        fn fail(&mut self, info: Option<AuthInfo>) {
            self.calls
                .push(format!("fail:{}", info.map(|i| i.message).unwrap_or_default()));
        }

        fn error(&mut self, error: AuthenticationError) {
            self.calls.push(format!("error:{error}"));
        }
    }

    #[test]
    fn test_dispatch_invokes_single_handler() {
        let mut recorder = Recorder::default();
        Outcome::Success {
            user: 7,
            info: None,
        }
        .dispatch(&mut recorder);
        assert_eq!(recorder.calls, vec!["success:7"]);

        let mut recorder = Recorder::default();
        Outcome::<u32>::Fail {
            info: Some("no such user".into()),
        }
        .dispatch(&mut recorder);
        assert_eq!(recorder.calls, vec!["fail:no such user"]);

        let mut recorder = Recorder::default();
        Outcome::<u32>::Error(AuthenticationError::Internal("boom".to_string()))
            .dispatch(&mut recorder);
        assert_eq!(
            recorder.calls,
            vec!["error:Internal authentication error: boom"]
        );
    }

    #[test]
    fn test_status_codes() {
        let success = Outcome::Success {
            user: 1,
            info: None,
        };
        let fail = Outcome::<u32>::Fail { info: None };
        let error = Outcome::<u32>::Error(AuthenticationError::callback("db down"));

        assert_eq!(success.status_code(), StatusCode::OK);
        assert_eq!(fail.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(error.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(error.kind(), "error");
    }

    #[test]
    fn test_into_result() {
        assert_eq!(
            Outcome::Success {
                user: 1,
                info: None
            }
            .into_result()
            .unwrap(),
            Some(1)
        );
        assert_eq!(
            Outcome::<u32>::Fail { info: None }.into_result().unwrap(),
            None
        );
        assert!(
            Outcome::<u32>::Error(AuthenticationError::verification("expired"))
                .into_result()
                .is_err()
        );
    }
}
