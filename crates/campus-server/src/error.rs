//! Error types and axum `IntoResponse` implementation.
//!
//! Every failure renders as `{"status": "<category>", "message": "<text>"}`.
//! Store and internal failures are logged here and reach the client only as a
//! generic message.

use axum::{
  Json,
  extract::rejection::{JsonRejection, PathRejection, QueryRejection},
  http::{HeaderValue, StatusCode, header},
  response::{IntoResponse, Response},
};
use campus_core::{
  assign::AssignError,
  authz::AuthzError,
  principal::Role,
};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("missing bearer credential")]
  MissingCredential,
  #[error("invalid credential")]
  InvalidCredential,
  #[error("credential has expired")]
  ExpiredCredential,
  /// Rendered exactly like [`Error::InvalidCredential`].
  #[error("principal not found")]
  PrincipalNotFound,
  #[error("account is not active")]
  PrincipalSuspended,
  #[error("authentication required")]
  Unauthenticated,
  #[error("role {0} may not perform this operation")]
  Forbidden(Role),
  #[error("invalid email or password")]
  InvalidLogin,
  #[error("not found: {0}")]
  NotFound(String),
  #[error("bad request: {0}")]
  BadRequest(String),
  #[error("fee assignment aborted after {created} obligations were created: {source}")]
  AssignmentAborted {
    created: usize,
    #[source]
    source:  Box<dyn std::error::Error + Send + Sync>,
  },
  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
  #[error("internal error: {0}")]
  Internal(String),
  #[error("invalid configuration: {0}")]
  Config(String),
}

impl Error {
  pub fn store<E>(e: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::Store(Box::new(e))
  }

  fn parts(&self) -> (StatusCode, &'static str, String) {
    const UNAUTHENTICATED: &str = "unauthenticated";
    const FORBIDDEN: &str = "forbidden";
    match self {
      Error::MissingCredential
      | Error::InvalidCredential
      | Error::ExpiredCredential
      | Error::Unauthenticated
      | Error::InvalidLogin => {
        (StatusCode::UNAUTHORIZED, UNAUTHENTICATED, self.to_string())
      }
      Error::PrincipalNotFound => (
        StatusCode::UNAUTHORIZED,
        UNAUTHENTICATED,
        Error::InvalidCredential.to_string(),
      ),
      Error::PrincipalSuspended | Error::Forbidden(_) => {
        (StatusCode::FORBIDDEN, FORBIDDEN, self.to_string())
      }
      Error::NotFound(m) => (StatusCode::NOT_FOUND, "not_found", m.clone()),
      Error::BadRequest(m) => (StatusCode::BAD_REQUEST, "bad_request", m.clone()),
      Error::AssignmentAborted { created, .. } => (
        StatusCode::INTERNAL_SERVER_ERROR,
        "internal",
        format!("fee assignment aborted after {created} obligations were created"),
      ),
      Error::Store(_) | Error::Internal(_) | Error::Config(_) => (
        StatusCode::INTERNAL_SERVER_ERROR,
        "internal",
        "internal server error".to_owned(),
      ),
    }
  }
}

impl IntoResponse for Error {
  fn into_response(self) -> Response {
    let (status, category, message) = self.parts();
    if status.is_server_error() {
      tracing::error!(error = %self, "request failed");
    } else {
      tracing::debug!(error = %self, %status, "request rejected");
    }

    let mut res = (status, Json(json!({ "status": category, "message": message })))
      .into_response();
    if status == StatusCode::UNAUTHORIZED {
      res
        .headers_mut()
        .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer realm=\"campus\""));
    }
    res
  }
}

impl From<AuthzError> for Error {
  fn from(e: AuthzError) -> Self {
    match e {
      AuthzError::Unauthenticated => Error::Unauthenticated,
      AuthzError::Forbidden(role) => Error::Forbidden(role),
    }
  }
}

impl From<AssignError> for Error {
  fn from(e: AssignError) -> Self {
    match e {
      AssignError::TemplateNotFound(id) => {
        Error::NotFound(format!("fee structure {id} not found"))
      }
      AssignError::Store { partial, source } => Error::AssignmentAborted {
        created: partial.created.len(),
        source,
      },
    }
  }
}

impl From<JsonRejection> for Error {
  fn from(e: JsonRejection) -> Self { Error::BadRequest(e.body_text()) }
}

impl From<QueryRejection> for Error {
  fn from(e: QueryRejection) -> Self { Error::BadRequest(e.body_text()) }
}

impl From<PathRejection> for Error {
  fn from(e: PathRejection) -> Self { Error::BadRequest(e.body_text()) }
}

#[cfg(test)]
mod tests {
  use super::*;

  async fn body_json(res: Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
  }

  #[tokio::test]
  async fn missing_principal_looks_like_a_bad_token() {
    let a = Error::PrincipalNotFound.into_response();
    let b = Error::InvalidCredential.into_response();
    assert_eq!(a.status(), b.status());
    assert_eq!(body_json(a).await, body_json(b).await);
  }

  #[tokio::test]
  async fn store_details_are_not_leaked() {
    let io = std::io::Error::other("disk /var/lib/campus.db is full");
    let res = Error::store(io).into_response();
    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_json(res).await;
    assert_eq!(body["status"], "internal");
    assert!(!body["message"].as_str().unwrap().contains("disk"));
  }

  #[tokio::test]
  async fn unauthorized_carries_bearer_challenge() {
    let res = Error::ExpiredCredential.into_response();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert!(res.headers().get(header::WWW_AUTHENTICATE).is_some());
    let body = body_json(res).await;
    assert_eq!(body["status"], "unauthenticated");
    assert_eq!(body["message"], "credential has expired");
  }

  #[tokio::test]
  async fn aborted_assignment_reports_count_without_store_details() {
    use campus_core::{assign::AssignOutcome, obligation::NewObligation};
    use chrono::{NaiveDate, Utc};
    use rust_decimal::Decimal;
    use uuid::Uuid;

    let obligation = || {
      NewObligation {
        student_id:  Uuid::new_v4(),
        group_id:    Uuid::new_v4(),
        template_id: Uuid::new_v4(),
        amount:      Decimal::new(100, 0),
        currency:    "LKR".into(),
        due_date:    NaiveDate::from_ymd_opt(2026, 1, 31).unwrap(),
      }
      .into_obligation(Utc::now())
    };
    let aborted = AssignError::Store {
      partial: Box::new(AssignOutcome {
        created: vec![obligation(), obligation()],
        ..Default::default()
      }),
      source:  Box::new(std::io::Error::other("disk /var/lib/campus.db is full")),
    };

    let res = Error::from(aborted).into_response();
    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_json(res).await;
    assert_eq!(body["status"], "internal");
    let message = body["message"].as_str().unwrap();
    assert!(message.contains("after 2 obligations"), "{message}");
    assert!(!body.to_string().contains("disk"), "{body}");
  }

  #[tokio::test]
  async fn suspended_is_forbidden() {
    let res = Error::PrincipalSuspended.into_response();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_json(res).await["status"], "forbidden");
  }
}
