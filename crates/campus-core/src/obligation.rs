//! Fee structures and the per-student obligations issued from them.
//!
//! An [`Obligation`] copies its amount and currency from the template at
//! creation time, so later edits to a template never change issued records.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use strum::{AsRefStr, Display, EnumString};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Templates ───────────────────────────────────────────────────────────────

/// A reusable fee definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObligationTemplate {
  pub template_id: Uuid,
  pub name:        String,
  pub amount:      Decimal,
  /// Currency code, e.g. `"LKR"`.
  pub currency:    String,
}

/// Input to [`crate::store::RecordStore::add_template`].
#[derive(Debug, Clone)]
pub struct NewTemplate {
  pub name:     String,
  pub amount:   Decimal,
  pub currency: String,
}

// ─── Status ──────────────────────────────────────────────────────────────────

#[derive(
  Debug,
  Clone,
  Copy,
  Default,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ObligationStatus {
  #[default]
  Pending,
  Paid,
  Overdue,
}

impl ObligationStatus {
  pub fn parse(s: &str) -> Result<Self> {
    s.parse().map_err(|_| Error::UnknownValue {
      kind:  "obligation status",
      value: s.to_owned(),
    })
  }
}

// ─── Obligation ──────────────────────────────────────────────────────────────

/// A fee owed by one student, issued against one template and one class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Obligation {
  pub obligation_id:   Uuid,
  pub student_id:      Uuid,
  pub group_id:        Uuid,
  pub template_id:     Uuid,
  pub amount:          Decimal,
  pub currency:        String,
  pub due_date:        NaiveDate,
  pub status:          ObligationStatus,
  /// See [`idempotency_key`].
  pub idempotency_key: String,
  pub created_at:      DateTime<Utc>,
}

/// Input to [`crate::store::RecordStore::create_obligation`].
/// The id, status and `created_at` are assigned by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewObligation {
  pub student_id:  Uuid,
  pub group_id:    Uuid,
  pub template_id: Uuid,
  pub amount:      Decimal,
  pub currency:    String,
  pub due_date:    NaiveDate,
}

impl NewObligation {
  /// Build an obligation for `student_id` in `group_id`, copying the amount
  /// and currency out of `template`.
  pub fn from_template(
    template: &ObligationTemplate,
    group_id: Uuid,
    student_id: Uuid,
    due_date: NaiveDate,
  ) -> Self {
    Self {
      student_id,
      group_id,
      template_id: template.template_id,
      amount: template.amount,
      currency: template.currency.clone(),
      due_date,
    }
  }

  pub fn idempotency_key(&self) -> String {
    idempotency_key(self.student_id, self.template_id, self.due_date)
  }

  /// The stored form of this obligation: a fresh id, status `pending`, and
  /// the idempotency key of its (student, template, due date).
  pub fn into_obligation(self, created_at: DateTime<Utc>) -> Obligation {
    let idempotency_key = self.idempotency_key();
    Obligation {
      obligation_id: Uuid::new_v4(),
      student_id: self.student_id,
      group_id: self.group_id,
      template_id: self.template_id,
      amount: self.amount,
      currency: self.currency,
      due_date: self.due_date,
      status: ObligationStatus::Pending,
      idempotency_key,
      created_at,
    }
  }
}

/// Deterministic key for the (student, template, due date) tuple: lowercase
/// hex SHA-256 over the student and template UUID bytes and the ISO date.
pub fn idempotency_key(
  student_id: Uuid,
  template_id: Uuid,
  due_date: NaiveDate,
) -> String {
  let mut hasher = Sha256::new();
  hasher.update(student_id.as_bytes());
  hasher.update(template_id.as_bytes());
  hasher.update(due_date.format("%Y-%m-%d").to_string().as_bytes());
  hex::encode(hasher.finalize())
}
