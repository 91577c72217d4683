//! Verification-and-profile pipeline.

use crate::config::IdTokenConfig;
use crate::error::{IdTokenError, IdTokenResult};
use crate::profile::map_profile;
use crate::request::{InboundRequest, locate_token};
use crate::verifier::{CertificateVerifier, TokenVerifier};
use futures::FutureExt;
use ras_identity_core::{
    AuthInfo, AuthenticationError, BoxError, Outcome, OutcomeHandlers, Profile,
};
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};

pub const STRATEGY_NAME: &str = "google-id-token";

/// Passed where an OAuth access token would be. No token exchange happens in
/// an ID-token-only flow, so this is never a real credential.
pub const STAND_IN_ACCESS_TOKEN: &str = "id-token-flow-no-access-token";

/// Passed where an OAuth refresh token would be. Never a real credential.
pub const STAND_IN_REFRESH_TOKEN: &str = "id-token-flow-no-refresh-token";

/// Boxed future returned by verify callbacks.
pub type VerifyFuture<'a> = Pin<Box<dyn Future<Output = ()> + Send + 'a>>;

type Completion<U> = (Option<BoxError>, Option<U>, Option<AuthInfo>);

/// One-shot completion handle given to the verify callback.
///
/// Consumed by value, so it resolves an attempt at most once. Dropping it
/// without completing reports an error.
pub struct Done<U> {
    sender: oneshot::Sender<Completion<U>>,
}

impl<U> Done<U> {
    fn channel() -> (Self, oneshot::Receiver<Completion<U>>) {
        let (sender, receiver) = oneshot::channel();
        (Self { sender }, receiver)
    }

    /// Complete with the `(error, user, info)` triple: an error wins, a missing
    /// user is a rejection, otherwise success.
    pub fn complete(self, error: Option<BoxError>, user: Option<U>, info: Option<AuthInfo>) {
        // The receiver only goes away if the attempt itself was dropped.
        let _ = self.sender.send((error, user, info));
    }

    pub fn success(self, user: U, info: Option<AuthInfo>) {
        self.complete(None, Some(user), info);
    }

    pub fn fail(self, info: Option<AuthInfo>) {
        self.complete(None, None, info);
    }

    pub fn error(self, error: impl Into<BoxError>) {
        self.complete(Some(error.into()), None, None);
    }
}

/// Verify callback receiving `(access_token, refresh_token, profile, done)`.
pub trait VerifyProfile<U>: Send + Sync + 'static {
    fn verify(
        &self,
        access_token: String,
        refresh_token: String,
        profile: Profile,
        done: Done<U>,
    ) -> VerifyFuture<'_>;
}

impl<U, F, Fut> VerifyProfile<U> for F
where
    F: Fn(String, String, Profile, Done<U>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    fn verify(
        &self,
        access_token: String,
        refresh_token: String,
        profile: Profile,
        done: Done<U>,
    ) -> VerifyFuture<'_> {
        Box::pin(self(access_token, refresh_token, profile, done))
    }
}

/// Verify callback that also receives the original request first.
pub trait VerifyProfileWithRequest<U>: Send + Sync + 'static {
    fn verify(
        &self,
        request: InboundRequest,
        access_token: String,
        refresh_token: String,
        profile: Profile,
        done: Done<U>,
    ) -> VerifyFuture<'_>;
}

impl<U, F, Fut> VerifyProfileWithRequest<U> for F
where
    F: Fn(InboundRequest, String, String, Profile, Done<U>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    fn verify(
        &self,
        request: InboundRequest,
        access_token: String,
        refresh_token: String,
        profile: Profile,
        done: Done<U>,
    ) -> VerifyFuture<'_> {
        Box::pin(self(request, access_token, refresh_token, profile, done))
    }
}

enum VerifyCallback<U> {
    Profile(Arc<dyn VerifyProfile<U>>),
    WithRequest(Arc<dyn VerifyProfileWithRequest<U>>),
}

/// Authenticates requests carrying a provider-issued ID token.
///
/// Each call to [`authenticate`](Self::authenticate) yields exactly one
/// [`Outcome`]; no state is kept between attempts.
pub struct IdTokenStrategy<U> {
    config: IdTokenConfig,
    verifier: Arc<dyn TokenVerifier>,
    callback: VerifyCallback<U>,
}

impl<U: Send + 'static> IdTokenStrategy<U> {
    /// Build a strategy whose verify callback does not see the request.
    pub fn new<V>(config: IdTokenConfig, verify: V) -> IdTokenResult<Self>
    where
        V: VerifyProfile<U>,
    {
        Self::build(config, VerifyCallback::Profile(Arc::new(verify)))
    }

    /// Build a strategy whose verify callback receives the request first.
    pub fn with_request<V>(config: IdTokenConfig, verify: V) -> IdTokenResult<Self>
    where
        V: VerifyProfileWithRequest<U>,
    {
        Self::build(config, VerifyCallback::WithRequest(Arc::new(verify)))
    }

    fn build(config: IdTokenConfig, callback: VerifyCallback<U>) -> IdTokenResult<Self> {
        config.validate()?;
        let verifier = CertificateVerifier::new(&config)?;

        info!(
            "Configured {} strategy for provider {}",
            STRATEGY_NAME, config.provider
        );

        Ok(Self {
            config,
            verifier: Arc::new(verifier),
            callback,
        })
    }

    /// Replace the verification engine.
    pub fn with_verifier(mut self, verifier: Arc<dyn TokenVerifier>) -> Self {
        self.verifier = verifier;
        self
    }

    pub fn name(&self) -> &'static str {
        STRATEGY_NAME
    }

    pub fn config(&self) -> &IdTokenConfig {
        &self.config
    }

    /// Whether the verify callback receives the original request.
    pub fn passes_request(&self) -> bool {
        matches!(self.callback, VerifyCallback::WithRequest(_))
    }

    /// Run one authentication attempt. Never panics and never returns early
    /// without an outcome.
    pub async fn authenticate(&self, request: &InboundRequest) -> Outcome<U> {
        let outcome = match AssertUnwindSafe(self.run(request)).catch_unwind().await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(err)) => {
                warn!("ID token verification failed: {}", err);
                Outcome::Error(AuthenticationError::verification(err))
            }
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                error!("ID token authentication panicked: {}", message);
                Outcome::Error(AuthenticationError::Internal(message))
            }
        };

        debug!("ID token authentication finished: {}", outcome.kind());
        outcome
    }

    /// Run one attempt and report it through exactly one handler method.
    pub async fn authenticate_with<H>(&self, request: &InboundRequest, handlers: &mut H)
    where
        H: OutcomeHandlers<U> + ?Sized,
    {
        self.authenticate(request).await.dispatch(handlers);
    }

    async fn run(&self, request: &InboundRequest) -> IdTokenResult<Outcome<U>> {
        let token = match locate_token(request, &self.config.token_field) {
            Some((source, token)) => {
                debug!("Found {} in request {:?}", self.config.token_field, source);
                token
            }
            None => {
                debug!("No {} on request", self.config.token_field);
                String::new()
            }
        };

        let timeout = self.config.verification_timeout();
        let claims = tokio::time::timeout(
            timeout,
            self.verifier.verify_id_token(&token, &self.config.client_id),
        )
        .await
        .map_err(|_| IdTokenError::Timeout(timeout))??
        .ok_or(IdTokenError::MissingClaims)?;

        let profile = map_profile(&self.config.provider, &claims);
        debug!("Verified ID token for subject {}", profile.id);

        let (done, completion) = Done::channel();
        let access_token = STAND_IN_ACCESS_TOKEN.to_string();
        let refresh_token = STAND_IN_REFRESH_TOKEN.to_string();

        match &self.callback {
            VerifyCallback::Profile(verify) => {
                verify
                    .verify(access_token, refresh_token, profile, done)
                    .await
            }
            VerifyCallback::WithRequest(verify) => {
                verify
                    .verify(request.clone(), access_token, refresh_token, profile, done)
                    .await
            }
        }

        Ok(match completion.await {
            Ok(completion) => resolve(completion),
            Err(_) => Outcome::Error(AuthenticationError::Internal(
                "verify callback completed without a result".to_string(),
            )),
        })
    }
}

fn resolve<U>(completion: Completion<U>) -> Outcome<U> {
    match completion {
        (Some(error), _, _) => Outcome::Error(AuthenticationError::Callback(error)),
        (None, None, info) => Outcome::Fail { info },
        (None, Some(user), info) => Outcome::Success { user, info },
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "panic during authentication".to_string()
    }
}
