//! An in-process [`RecordStore`] for tests.
//!
//! Supports failure injection on obligation writes and counts principal
//! lookups so callers can assert which stages touched the store.

use std::sync::{
  Mutex, MutexGuard, PoisonError,
  atomic::{AtomicUsize, Ordering},
};

use chrono::Utc;
use thiserror::Error;
use uuid::Uuid;

use crate::{
  group::{Group, NewGroup},
  obligation::{
    NewObligation, NewTemplate, Obligation, ObligationStatus, ObligationTemplate,
  },
  principal::{NewPrincipal, Principal},
  store::{ObligationQuery, RecordStore},
};

#[derive(Debug, Error)]
pub enum MemoryError {
  #[error("injected obligation write failure")]
  Injected,

  #[error("email already registered: {0}")]
  DuplicateEmail(String),
}

#[derive(Default)]
struct Inner {
  principals:  Vec<Principal>,
  groups:      Vec<Group>,
  templates:   Vec<ObligationTemplate>,
  obligations: Vec<Obligation>,
  /// Obligation writes allowed before every further write fails.
  write_budget: Option<usize>,
}

#[derive(Default)]
pub struct MemoryStore {
  inner:             Mutex<Inner>,
  principal_lookups: AtomicUsize,
}

impl MemoryStore {
  pub fn new() -> Self { Self::default() }

  /// Let `n` more obligation writes succeed, then fail all subsequent ones.
  pub fn fail_obligation_writes_after(&self, n: usize) {
    self.lock().write_budget = Some(n);
  }

  /// Number of principal reads served so far.
  pub fn principal_lookups(&self) -> usize {
    self.principal_lookups.load(Ordering::SeqCst)
  }

  /// Every stored obligation, in creation order.
  pub fn obligations(&self) -> Vec<Obligation> { self.lock().obligations.clone() }

  fn lock(&self) -> MutexGuard<'_, Inner> {
    self.inner.lock().unwrap_or_else(PoisonError::into_inner)
  }

  fn count_lookup(&self) { self.principal_lookups.fetch_add(1, Ordering::SeqCst); }
}

impl RecordStore for MemoryStore {
  type Error = MemoryError;

  async fn add_principal(&self, input: NewPrincipal) -> Result<Principal, MemoryError> {
    let mut inner = self.lock();
    if inner.principals.iter().any(|p| p.email == input.email) {
      return Err(MemoryError::DuplicateEmail(input.email));
    }
    let principal = Principal {
      principal_id:  Uuid::new_v4(),
      role:          input.role,
      state:         input.state,
      name:          input.name,
      email:         input.email,
      class_ids:     input.class_ids,
      password_hash: input.password_hash,
      created_at:    Utc::now(),
    };
    inner.principals.push(principal.clone());
    Ok(principal)
  }

  async fn get_principal(&self, id: Uuid) -> Result<Option<Principal>, MemoryError> {
    self.count_lookup();
    Ok(self.lock().principals.iter().find(|p| p.principal_id == id).cloned())
  }

  async fn get_principals(&self, ids: Vec<Uuid>) -> Result<Vec<Principal>, MemoryError> {
    self.count_lookup();
    Ok(
      self
        .lock()
        .principals
        .iter()
        .filter(|p| ids.contains(&p.principal_id))
        .cloned()
        .collect(),
    )
  }

  async fn find_principal_by_email(
    &self,
    email: String,
  ) -> Result<Option<Principal>, MemoryError> {
    self.count_lookup();
    Ok(self.lock().principals.iter().find(|p| p.email == email).cloned())
  }

  async fn add_group(&self, input: NewGroup) -> Result<Group, MemoryError> {
    let group = input.into_group(Uuid::new_v4());
    self.lock().groups.push(group.clone());
    Ok(group)
  }

  async fn get_groups(&self, ids: Vec<Uuid>) -> Result<Vec<Group>, MemoryError> {
    Ok(
      self
        .lock()
        .groups
        .iter()
        .filter(|g| ids.contains(&g.group_id))
        .cloned()
        .collect(),
    )
  }

  async fn add_template(&self, input: NewTemplate) -> Result<ObligationTemplate, MemoryError> {
    let template = ObligationTemplate {
      template_id: Uuid::new_v4(),
      name:        input.name,
      amount:      input.amount,
      currency:    input.currency,
    };
    self.lock().templates.push(template.clone());
    Ok(template)
  }

  async fn get_template(&self, id: Uuid) -> Result<Option<ObligationTemplate>, MemoryError> {
    Ok(self.lock().templates.iter().find(|t| t.template_id == id).cloned())
  }

  async fn create_obligation(&self, input: NewObligation) -> Result<Obligation, MemoryError> {
    let mut inner = self.lock();
    if let Some(n) = inner.write_budget.as_mut() {
      if *n == 0 {
        return Err(MemoryError::Injected);
      }
      *n -= 1;
    }
    let obligation = input.into_obligation(Utc::now());
    inner.obligations.push(obligation.clone());
    Ok(obligation)
  }

  async fn create_obligations(
    &self,
    inputs: Vec<NewObligation>,
  ) -> Result<Vec<Obligation>, MemoryError> {
    let mut inner = self.lock();
    if let Some(n) = inner.write_budget {
      if n < inputs.len() {
        return Err(MemoryError::Injected);
      }
      inner.write_budget = Some(n - inputs.len());
    }
    let now = Utc::now();
    let created: Vec<Obligation> =
      inputs.into_iter().map(|input| input.into_obligation(now)).collect();
    inner.obligations.extend(created.iter().cloned());
    Ok(created)
  }

  async fn find_obligation_by_key(&self, key: String) -> Result<Option<Obligation>, MemoryError> {
    Ok(
      self
        .lock()
        .obligations
        .iter()
        .find(|o| o.idempotency_key == key)
        .cloned(),
    )
  }

  async fn list_obligations(
    &self,
    query: ObligationQuery,
  ) -> Result<Vec<Obligation>, MemoryError> {
    Ok(
      self
        .lock()
        .obligations
        .iter()
        .filter(|o| query.student_id.is_none_or(|id| o.student_id == id))
        .filter(|o| query.group_id.is_none_or(|id| o.group_id == id))
        .filter(|o| query.template_id.is_none_or(|id| o.template_id == id))
        .filter(|o| query.status.is_none_or(|s| o.status == s))
        .cloned()
        .collect(),
    )
  }

  async fn update_obligation_status(
    &self,
    id: Uuid,
    status: ObligationStatus,
  ) -> Result<Option<Obligation>, MemoryError> {
    let mut inner = self.lock();
    Ok(inner.obligations.iter_mut().find(|o| o.obligation_id == id).map(|o| {
      o.status = status;
      o.clone()
    }))
  }
}
