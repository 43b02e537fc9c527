//! Handlers for `/obligations` endpoints.
//!
//! | Method  | Path | Notes |
//! |---------|------|-------|
//! | `GET`   | `/obligations` | Admin, teacher. Optional `student_id`, `group_id`, `template_id`, `status` |
//! | `GET`   | `/obligations/mine` | Student; the caller's own fees |
//! | `PATCH` | `/obligations/:id/status` | Admin. Body: `{"status":"paid"}` |

use axum::{
  Json,
  extract::{
    Path, Query, State,
    rejection::{JsonRejection, PathRejection, QueryRejection},
  },
};
use campus_core::{
  obligation::{Obligation, ObligationStatus},
  store::{ObligationQuery, RecordStore},
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
  AppState,
  auth::{AdminOnly, Require, Staff, StudentOnly},
  error::Error,
};

// ─── List ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
  pub student_id:  Option<Uuid>,
  pub group_id:    Option<Uuid>,
  pub template_id: Option<Uuid>,
  pub status:      Option<ObligationStatus>,
}

impl From<ListParams> for ObligationQuery {
  fn from(p: ListParams) -> Self {
    Self {
      student_id:  p.student_id,
      group_id:    p.group_id,
      template_id: p.template_id,
      status:      p.status,
    }
  }
}

/// `GET /obligations[?student_id=..][&group_id=..][&template_id=..][&status=..]`
pub async fn list<S>(
  _access: Require<Staff>,
  State(state): State<AppState<S>>,
  params: Result<Query<ListParams>, QueryRejection>,
) -> Result<Json<Vec<Obligation>>, Error>
where
  S: RecordStore + 'static,
{
  let Query(params) = params?;
  let obligations = state
    .store
    .list_obligations(params.into())
    .await
    .map_err(Error::store)?;
  Ok(Json(obligations))
}

/// `GET /obligations/mine`
pub async fn mine<S>(
  access: Require<StudentOnly>,
  State(state): State<AppState<S>>,
) -> Result<Json<Vec<Obligation>>, Error>
where
  S: RecordStore + 'static,
{
  let query = ObligationQuery {
    student_id: Some(access.identity.principal_id()),
    ..Default::default()
  };
  let obligations = state.store.list_obligations(query).await.map_err(Error::store)?;
  Ok(Json(obligations))
}

// ─── Status update ────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct StatusBody {
  pub status: ObligationStatus,
}

/// `PATCH /obligations/:id/status`
pub async fn update_status<S>(
  access: Require<AdminOnly>,
  State(state): State<AppState<S>>,
  id: Result<Path<Uuid>, PathRejection>,
  body: Result<Json<StatusBody>, JsonRejection>,
) -> Result<Json<Obligation>, Error>
where
  S: RecordStore + 'static,
{
  let Path(id) = id?;
  let Json(body) = body?;

  let obligation = state
    .store
    .update_obligation_status(id, body.status)
    .await
    .map_err(Error::store)?
    .ok_or_else(|| Error::NotFound(format!("obligation {id} not found")))?;

  tracing::info!(
    admin = %access.identity.principal_id(),
    obligation_id = %id,
    status = %body.status,
    "obligation status updated"
  );
  Ok(Json(obligation))
}
