//! HTTP layer for the Campus records backend.
//!
//! Exposes an axum [`Router`] backed by any [`RecordStore`]. Every `/api`
//! route except login authenticates the bearer credential, resolves the
//! principal and checks the route's static role allow-list before the handler
//! body runs.

pub mod auth;
pub mod error;
pub mod handlers;
pub mod token;

pub use error::Error;

use std::{path::PathBuf, sync::Arc};

use axum::{
  Router,
  http::{HeaderValue, Method, header},
  routing::{get, patch, post},
};
use campus_core::store::RecordStore;
use serde::Deserialize;
use tower_http::{
  cors::{AllowOrigin, CorsLayer},
  trace::TraceLayer,
};

use token::CredentialVerifier;

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` and
/// `CAMPUS_*` environment variables.
#[derive(Deserialize, Clone)]
pub struct ServerConfig {
  pub host:            String,
  pub port:            u16,
  pub store_path:      PathBuf,
  /// HS256 signing secret for bearer tokens.
  pub jwt_secret:      String,
  #[serde(default = "default_token_ttl_secs")]
  pub token_ttl_secs:  u64,
  /// Origins allowed to call the API from a browser. Empty disables CORS.
  #[serde(default)]
  pub allowed_origins: Vec<String>,
}

fn default_token_ttl_secs() -> u64 { 8 * 60 * 60 }

impl ServerConfig {
  /// Bearer token lifetime. Zero, or too large for a [`chrono::Duration`],
  /// is a configuration error.
  pub fn token_ttl(&self) -> Result<chrono::Duration, Error> {
    i64::try_from(self.token_ttl_secs)
      .ok()
      .and_then(chrono::Duration::try_seconds)
      .filter(|ttl| *ttl > chrono::Duration::zero())
      .ok_or_else(|| {
        Error::Config(format!("token_ttl_secs {} is out of range", self.token_ttl_secs))
      })
  }
}

// ─── Application state ────────────────────────────────────────────────────────

/// Shared state threaded through all axum handlers.
pub struct AppState<S: RecordStore> {
  pub store:    Arc<S>,
  pub config:   Arc<ServerConfig>,
  pub verifier: Arc<CredentialVerifier>,
}

impl<S: RecordStore> Clone for AppState<S> {
  fn clone(&self) -> Self {
    Self {
      store:    Arc::clone(&self.store),
      config:   Arc::clone(&self.config),
      verifier: Arc::clone(&self.verifier),
    }
  }
}

impl<S: RecordStore> AppState<S> {
  /// Build state from a store and configuration, deriving the verifier from
  /// the configured secret and token lifetime.
  pub fn new(store: S, config: ServerConfig) -> Result<Self, Error> {
    let verifier = CredentialVerifier::new(config.jwt_secret.as_bytes(), config.token_ttl()?);
    Ok(Self {
      store:    Arc::new(store),
      config:   Arc::new(config),
      verifier: Arc::new(verifier),
    })
  }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build the axum [`Router`] for the server.
pub fn router<S>(state: AppState<S>) -> Router
where
  S: RecordStore + 'static,
{
  let api = Router::new()
    .route("/auth/login",              post(handlers::auth::login::<S>))
    .route("/auth/me",                 get(handlers::auth::me))
    .route("/fees/assign",             post(handlers::fees::assign::<S>))
    .route("/obligations",             get(handlers::obligations::list::<S>))
    .route("/obligations/mine",        get(handlers::obligations::mine::<S>))
    .route("/obligations/{id}/status", patch(handlers::obligations::update_status::<S>));

  let cors = cors_layer(&state.config.allowed_origins);

  Router::new()
    .route("/health", get(handlers::health))
    .nest("/api", api)
    .layer(cors)
    .layer(TraceLayer::new_for_http())
    .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
  let origins: Vec<HeaderValue> = origins
    .iter()
    .filter_map(|o| match HeaderValue::from_str(o) {
      Ok(v) => Some(v),
      Err(_) => {
        tracing::warn!(origin = %o, "ignoring unparseable CORS origin");
        None
      }
    })
    .collect();

  CorsLayer::new()
    .allow_origin(AllowOrigin::list(origins))
    .allow_methods([Method::GET, Method::POST, Method::PATCH])
    .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
}
