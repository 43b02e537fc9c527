//! Handler for bulk fee assignment.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/fees/assign` | Admin only. Body: [`AssignBody`]; returns 201 + [`AssignOutcome`] |

use axum::{
  Json,
  extract::{State, rejection::JsonRejection},
  http::StatusCode,
};
use campus_core::{
  assign::{AssignOptions, AssignOutcome, assign as assign_fees},
  store::RecordStore,
};
use chrono::NaiveDate;
use serde::Deserialize;
use uuid::Uuid;

use crate::{
  AppState,
  auth::{AdminOnly, Require},
  error::Error,
};

#[derive(Debug, Deserialize)]
pub struct AssignBody {
  pub template_id: Uuid,
  pub group_ids:   Vec<Uuid>,
  pub due_date:    NaiveDate,
  /// Optional `atomic` and `deduplicate` flags, both default `false`.
  #[serde(flatten)]
  pub options:     AssignOptions,
}

/// `POST /fees/assign`
pub async fn assign<S>(
  access: Require<AdminOnly>,
  State(state): State<AppState<S>>,
  body: Result<Json<AssignBody>, JsonRejection>,
) -> Result<(StatusCode, Json<AssignOutcome>), Error>
where
  S: RecordStore + 'static,
{
  let Json(body) = body?;

  tracing::info!(
    admin = %access.identity.principal_id(),
    template_id = %body.template_id,
    groups = body.group_ids.len(),
    atomic = body.options.atomic,
    deduplicate = body.options.deduplicate,
    "assigning fees"
  );

  let outcome = assign_fees(
    state.store.as_ref(),
    body.template_id,
    &body.group_ids,
    body.due_date,
    body.options,
  )
  .await?;

  Ok((StatusCode::CREATED, Json(outcome)))
}
