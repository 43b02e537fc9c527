//! The `RecordStore` trait and supporting query types.
//!
//! The trait is implemented by storage backends (e.g. `campus-store-sqlite`).
//! The assignment engine and the HTTP layer depend on this abstraction, not on
//! any concrete backend.

use std::future::Future;

use uuid::Uuid;

use crate::{
  group::{Group, NewGroup},
  obligation::{NewObligation, Obligation, ObligationStatus, ObligationTemplate, NewTemplate},
  principal::{NewPrincipal, Principal},
};

// ─── Query type ──────────────────────────────────────────────────────────────

/// Parameters for [`RecordStore::list_obligations`]. Unset fields do not
/// filter.
#[derive(Debug, Clone, Default)]
pub struct ObligationQuery {
  pub student_id:  Option<Uuid>,
  pub group_id:    Option<Uuid>,
  pub template_id: Option<Uuid>,
  pub status:      Option<ObligationStatus>,
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over the shared record store.
///
/// Each method is an independent operation; nothing here spans calls, so two
/// callers interleaving writes see each other's effects immediately.
///
/// All methods return `Send` futures so the trait can be used in multi-threaded
/// async runtimes (e.g. tokio with `axum`).
pub trait RecordStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Principals ────────────────────────────────────────────────────────

  /// Persist a new principal. Fails if the email is already registered.
  fn add_principal(
    &self,
    input: NewPrincipal,
  ) -> impl Future<Output = Result<Principal, Self::Error>> + Send + '_;

  /// Retrieve a principal by UUID. Returns `None` if not found.
  fn get_principal(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Principal>, Self::Error>> + Send + '_;

  /// Retrieve every principal whose id is in `ids`. Unknown ids are absent
  /// from the result; order is unspecified.
  fn get_principals(
    &self,
    ids: Vec<Uuid>,
  ) -> impl Future<Output = Result<Vec<Principal>, Self::Error>> + Send + '_;

  fn find_principal_by_email(
    &self,
    email: String,
  ) -> impl Future<Output = Result<Option<Principal>, Self::Error>> + Send + '_;

  // ── Groups ────────────────────────────────────────────────────────────

  fn add_group(
    &self,
    input: NewGroup,
  ) -> impl Future<Output = Result<Group, Self::Error>> + Send + '_;

  /// Retrieve every group whose id is in `ids`, members in enrolment order.
  /// Unknown ids are absent from the result; order is unspecified.
  fn get_groups(
    &self,
    ids: Vec<Uuid>,
  ) -> impl Future<Output = Result<Vec<Group>, Self::Error>> + Send + '_;

  // ── Templates ─────────────────────────────────────────────────────────

  fn add_template(
    &self,
    input: NewTemplate,
  ) -> impl Future<Output = Result<ObligationTemplate, Self::Error>> + Send + '_;

  fn get_template(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<ObligationTemplate>, Self::Error>>
  + Send
  + '_;

  // ── Obligations ───────────────────────────────────────────────────────

  /// Persist one obligation with status `pending`.
  fn create_obligation(
    &self,
    input: NewObligation,
  ) -> impl Future<Output = Result<Obligation, Self::Error>> + Send + '_;

  /// Persist all of `inputs` in a single transaction: either every record is
  /// written or none is. Results are in input order.
  fn create_obligations(
    &self,
    inputs: Vec<NewObligation>,
  ) -> impl Future<Output = Result<Vec<Obligation>, Self::Error>> + Send + '_;

  /// Return an obligation carrying `key`, if one exists. Duplicates are
  /// permitted, so this returns the earliest one.
  fn find_obligation_by_key(
    &self,
    key: String,
  ) -> impl Future<Output = Result<Option<Obligation>, Self::Error>> + Send + '_;

  /// Obligations matching `query`, oldest first.
  fn list_obligations(
    &self,
    query: ObligationQuery,
  ) -> impl Future<Output = Result<Vec<Obligation>, Self::Error>> + Send + '_;

  /// Set the status of an obligation. Returns `None` if it does not exist.
  fn update_obligation_status(
    &self,
    id: Uuid,
    status: ObligationStatus,
  ) -> impl Future<Output = Result<Option<Obligation>, Self::Error>> + Send + '_;
}
