//! Example showing how to sign users in with a Google ID token
//!
//! Configuration comes from `idtoken.toml` in the working directory and/or
//! `IDTOKEN__*` environment variables:
//!
//! ```text
//! IDTOKEN__CLIENT_ID=your-client-id.apps.googleusercontent.com \
//!     cargo run -p ras-identity-idtoken --example axum_id_token
//! curl -X POST localhost:3000/auth/google -d id_token=eyJ...
//! ```

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use http::StatusCode;
use ras_identity_idtoken::{
    AuthInfo, Done, IdTokenConfig, IdTokenStrategy, InboundRequest, Outcome, Profile,
};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

#[derive(Debug, Clone)]
struct AppUser {
    id: String,
    email: Option<String>,
    name: String,
}

type UserStore = Arc<RwLock<HashMap<String, AppUser>>>;

async fn sign_in(
    State(strategy): State<Arc<IdTokenStrategy<AppUser>>>,
    request: InboundRequest,
) -> (StatusCode, Json<Value>) {
    let outcome = strategy.authenticate(&request).await;
    let status = outcome.status_code();

    let body = match outcome {
        Outcome::Success { user, info } => json!({
            "id": user.id,
            "email": user.email,
            "name": user.name,
            "message": info.map(|info| info.message),
        }),
        Outcome::Fail { info } => json!({
            "error": "unauthorized",
            "message": info.map(|info| info.message),
        }),
        Outcome::Error(error) => {
            tracing::warn!("Sign-in error: {}", error);
            json!({ "error": "authentication_error" })
        }
    };

    (status, Json(body))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,ras_identity_idtoken=debug".into()),
        )
        .init();

    let config = IdTokenConfig::load(Some(Path::new("idtoken.toml")))?;

    // Users sign up on first sign-in if their email is verified.
    let users: UserStore = Arc::new(RwLock::new(HashMap::new()));
    let strategy = IdTokenStrategy::new(
        config,
        move |_access: String, _refresh: String, profile: Profile, done: Done<AppUser>| {
            let users = users.clone();
            async move {
                if let Some(user) = users.read().await.get(&profile.id).cloned() {
                    done.success(user, Some(AuthInfo::new("welcome back")));
                    return;
                }

                match profile.primary_email() {
                    Some(email) if email.verified => {
                        let user = AppUser {
                            id: profile.id.clone(),
                            email: Some(email.value.clone()),
                            name: profile.display_name.clone(),
                        };
                        users.write().await.insert(profile.id.clone(), user.clone());
                        done.success(user, Some(AuthInfo::new("account created")));
                    }
                    _ => done.fail(Some(AuthInfo::new("a verified email is required"))),
                }
            }
        },
    )?;

    let app = Router::new()
        .route("/auth/google", post(sign_in))
        .with_state(Arc::new(strategy));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:3000").await?;
    info!("Listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}
