//! Request authentication and role gating.
//!
//! [`Authenticated`] runs the credential verifier and the principal resolver
//! and caches the resulting [`Identity`] in the request extensions.
//! [`Require`] additionally passes that identity through the role gate for a
//! statically declared [`RoleSet`].

use std::marker::PhantomData;

use axum::{
  extract::FromRequestParts,
  http::{header, request::Parts},
};
use campus_core::{
  authz::authorize,
  principal::{Identity, Role},
  store::RecordStore,
};
use uuid::Uuid;

use crate::{AppState, error::Error};

// ─── Principal resolver ──────────────────────────────────────────────────────

/// Load the principal named by a verified credential and snapshot it.
///
/// A missing principal is reported as [`Error::PrincipalNotFound`], which the
/// client cannot tell apart from a bad token.
pub async fn resolve<S>(store: &S, principal_id: Uuid) -> Result<Identity, Error>
where
  S: RecordStore,
{
  let principal = store
    .get_principal(principal_id)
    .await
    .map_err(Error::store)?
    .ok_or(Error::PrincipalNotFound)?;

  Identity::from_principal(&principal).map_err(|_| {
    tracing::info!(%principal_id, state = %principal.state, "rejecting inactive principal");
    Error::PrincipalSuspended
  })
}

// ─── Extractors ──────────────────────────────────────────────────────────────

/// Present in a handler means the request carried a valid credential for an
/// active principal.
#[derive(Debug, Clone)]
pub struct Authenticated(pub Identity);

impl<S> FromRequestParts<AppState<S>> for Authenticated
where
  S: RecordStore + 'static,
{
  type Rejection = Error;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &AppState<S>,
  ) -> Result<Self, Self::Rejection> {
    if let Some(identity) = parts.extensions.get::<Identity>() {
      return Ok(Self(identity.clone()));
    }

    let principal_id = state
      .verifier
      .verify_header(parts.headers.get(header::AUTHORIZATION))?;
    let identity = resolve(state.store.as_ref(), principal_id).await?;

    parts.extensions.insert(identity.clone());
    Ok(Self(identity))
  }
}

/// The roles an operation accepts.
pub trait RoleSet: Send + Sync + 'static {
  const ROLES: &'static [Role];
}

pub struct AdminOnly;
pub struct Staff;
pub struct StudentOnly;
pub struct AnyRole;

impl RoleSet for AdminOnly {
  const ROLES: &'static [Role] = &[Role::Admin];
}

impl RoleSet for Staff {
  const ROLES: &'static [Role] = &[Role::Admin, Role::Teacher];
}

impl RoleSet for StudentOnly {
  const ROLES: &'static [Role] = &[Role::Student];
}

impl RoleSet for AnyRole {
  const ROLES: &'static [Role] = &[Role::Admin, Role::Teacher, Role::Student, Role::Parent];
}

/// An authenticated identity whose role is in `R::ROLES`.
pub struct Require<R: RoleSet> {
  pub identity: Identity,
  _roles:       PhantomData<fn() -> R>,
}

impl<S, R> FromRequestParts<AppState<S>> for Require<R>
where
  S: RecordStore + 'static,
  R: RoleSet,
{
  type Rejection = Error;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &AppState<S>,
  ) -> Result<Self, Self::Rejection> {
    let Authenticated(identity) = Authenticated::from_request_parts(parts, state).await?;
    authorize(Some(&identity), R::ROLES)?;
    Ok(Self { identity, _roles: PhantomData })
  }
}

#[cfg(test)]
mod tests {
  use std::sync::Arc;

  use axum::http::Request;
  use campus_core::{
    memory::MemoryStore,
    principal::{NewPrincipal, OperableState},
  };
  use chrono::{Duration, Utc};

  use super::*;
  use crate::{ServerConfig, token::CredentialVerifier};

  const SECRET: &str = "0123456789abcdef0123456789abcdef";

  fn make_state() -> AppState<MemoryStore> {
    AppState {
      store:    Arc::new(MemoryStore::new()),
      verifier: Arc::new(CredentialVerifier::new(SECRET.as_bytes(), Duration::hours(1))),
      config:   Arc::new(ServerConfig {
        host:            "127.0.0.1".to_string(),
        port:            8080,
        store_path:      ":memory:".into(),
        jwt_secret:      SECRET.to_string(),
        token_ttl_secs:  3600,
        allowed_origins: Vec::new(),
      }),
    }
  }

  async fn add(state: &AppState<MemoryStore>, role: Role, st: OperableState) -> campus_core::principal::Principal {
    state
      .store
      .add_principal(NewPrincipal::new(role, "P", format!("{}@school.test", Uuid::new_v4())).with_state(st))
      .await
      .unwrap()
  }

  fn request(token: Option<&str>) -> Request<axum::body::Body> {
    let mut builder = Request::builder();
    if let Some(t) = token {
      builder = builder.header(header::AUTHORIZATION, format!("Bearer {t}"));
    }
    builder.body(axum::body::Body::empty()).unwrap()
  }

  async fn extract<R: RoleSet>(
    req: Request<axum::body::Body>,
    state: &AppState<MemoryStore>,
  ) -> Result<Require<R>, Error> {
    let (mut parts, _) = req.into_parts();
    Require::<R>::from_request_parts(&mut parts, state).await
  }

  #[tokio::test]
  async fn valid_token_yields_stored_role() {
    let state = make_state();
    for role in [Role::Admin, Role::Teacher, Role::Student, Role::Parent] {
      let p = add(&state, role, OperableState::Active).await;
      let token = state.verifier.issue(&p, Utc::now()).unwrap().token;
      let access = extract::<AnyRole>(request(Some(&token)), &state).await.unwrap();
      assert_eq!(access.identity.role(), role);
      assert_eq!(access.identity.principal_id(), p.principal_id);
    }
  }

  #[tokio::test]
  async fn expired_token_never_touches_the_store() {
    let state = make_state();
    let p = add(&state, Role::Admin, OperableState::Active).await;
    let token = state.verifier.issue(&p, Utc::now() - Duration::hours(3)).unwrap().token;

    let before = state.store.principal_lookups();
    let err = extract::<AnyRole>(request(Some(&token)), &state).await.err().unwrap();
    assert!(matches!(err, Error::ExpiredCredential));
    assert_eq!(state.store.principal_lookups(), before);
  }

  #[tokio::test]
  async fn inactive_principal_is_suspended_before_the_gate() {
    let state = make_state();
    for st in [OperableState::Pending, OperableState::Suspended] {
      // Admin is in the allow-list, so only the resolver can reject this.
      let p = add(&state, Role::Admin, st).await;
      let token = state.verifier.issue(&p, Utc::now()).unwrap().token;
      let err = extract::<AdminOnly>(request(Some(&token)), &state).await.err().unwrap();
      assert!(matches!(err, Error::PrincipalSuspended));
    }
  }

  #[tokio::test]
  async fn deleted_principal_is_not_found() {
    let state = make_state();
    let mut ghost = add(&state, Role::Admin, OperableState::Active).await;
    ghost.principal_id = Uuid::new_v4();
    let token = state.verifier.issue(&ghost, Utc::now()).unwrap().token;
    let err = extract::<AnyRole>(request(Some(&token)), &state).await.err().unwrap();
    assert!(matches!(err, Error::PrincipalNotFound));
  }

  #[tokio::test]
  async fn wrong_role_is_forbidden() {
    let state = make_state();
    let p = add(&state, Role::Teacher, OperableState::Active).await;
    let token = state.verifier.issue(&p, Utc::now()).unwrap().token;
    let err = extract::<AdminOnly>(request(Some(&token)), &state).await.err().unwrap();
    assert!(matches!(err, Error::Forbidden(Role::Teacher)));
  }

  #[tokio::test]
  async fn missing_header_is_missing_credential() {
    let state = make_state();
    let err = extract::<AnyRole>(request(None), &state).await.err().unwrap();
    assert!(matches!(err, Error::MissingCredential));
  }

  #[tokio::test]
  async fn identity_is_resolved_once_per_request() {
    let state = make_state();
    let p = add(&state, Role::Admin, OperableState::Active).await;
    let token = state.verifier.issue(&p, Utc::now()).unwrap().token;
    let (mut parts, _) = request(Some(&token)).into_parts();

    let before = state.store.principal_lookups();
    Require::<AdminOnly>::from_request_parts(&mut parts, &state).await.unwrap();
    Require::<AnyRole>::from_request_parts(&mut parts, &state).await.unwrap();
    assert_eq!(state.store.principal_lookups(), before + 1);
  }
}
