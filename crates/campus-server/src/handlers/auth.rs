//! Handlers for `/auth` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/auth/login` | Body: `{"email":"…","password":"…"}`; public |
//! | `GET`  | `/auth/me` | Any role; returns the request identity |

use std::sync::LazyLock;

use argon2::{
  Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::SaltString,
};
use axum::{
  Json,
  extract::{State, rejection::JsonRejection},
};
use campus_core::{principal::Identity, store::RecordStore};
use chrono::{DateTime, Utc};
use rand_core::OsRng;
use serde::{Deserialize, Serialize};

use crate::{
  AppState,
  auth::{AnyRole, Require},
  error::Error,
};

/// Verified against when the email is unknown, so both outcomes pay for one
/// argon2 verification.
static UNKNOWN_ACCOUNT_HASH: LazyLock<String> = LazyLock::new(|| {
  let salt = SaltString::generate(&mut OsRng);
  Argon2::default()
    .hash_password(b"campus-unknown-account", &salt)
    .map(|h| h.to_string())
    .unwrap_or_default()
});

#[derive(Debug, Deserialize)]
pub struct LoginBody {
  pub email:    String,
  pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
  pub token:      String,
  pub expires_at: DateTime<Utc>,
  pub identity:   Identity,
}

/// `POST /auth/login`
///
/// The password is checked before the account state so a caller without the
/// password learns nothing about whether the account is pending.
pub async fn login<S>(
  State(state): State<AppState<S>>,
  body: Result<Json<LoginBody>, JsonRejection>,
) -> Result<Json<LoginResponse>, Error>
where
  S: RecordStore + 'static,
{
  let Json(body) = body?;

  let principal = state
    .store
    .find_principal_by_email(body.email)
    .await
    .map_err(Error::store)?;

  let hash = principal.as_ref().map(|p| p.password_hash.clone());
  let verified = tokio::task::spawn_blocking(move || {
    let hash = hash.as_deref().unwrap_or(UNKNOWN_ACCOUNT_HASH.as_str());
    PasswordHash::new(hash)
      .and_then(|parsed| Argon2::default().verify_password(body.password.as_bytes(), &parsed))
      .is_ok()
  })
  .await
  .map_err(|e| Error::Internal(format!("password check panicked: {e}")))?;

  let principal = match principal {
    Some(p) if verified => p,
    _ => return Err(Error::InvalidLogin),
  };

  let identity = Identity::from_principal(&principal).map_err(|_| Error::PrincipalSuspended)?;
  let issued = state.verifier.issue(&principal, Utc::now())?;

  tracing::info!(principal_id = %principal.principal_id, role = %principal.role, "login");
  Ok(Json(LoginResponse { token: issued.token, expires_at: issued.expires_at, identity }))
}

/// `GET /auth/me`
pub async fn me(access: Require<AnyRole>) -> Json<Identity> { Json(access.identity) }
