//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are RFC 3339 strings, dates are `YYYY-MM-DD`, amounts are
//! decimal strings and UUIDs are hyphenated lowercase strings. Enums use the
//! same lowercase names as their serde form.

use std::str::FromStr as _;

use campus_core::{
  group::Group,
  obligation::{Obligation, ObligationStatus, ObligationTemplate},
  principal::{OperableState, Principal, Role},
};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::{Error, Result};

// ─── Scalars ─────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

pub fn encode_date(d: NaiveDate) -> String { d.format("%Y-%m-%d").to_string() }

pub fn decode_date(s: &str) -> Result<NaiveDate> {
  NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| Error::DateParse(e.to_string()))
}

pub fn encode_decimal(d: Decimal) -> String { d.to_string() }

pub fn decode_decimal(s: &str) -> Result<Decimal> { Ok(Decimal::from_str(s)?) }

pub fn encode_uuids(ids: &[Uuid]) -> Result<String> { Ok(serde_json::to_string(ids)?) }

pub fn decode_uuids(s: &str) -> Result<Vec<Uuid>> { Ok(serde_json::from_str(s)?) }

// ─── Raw rows ────────────────────────────────────────────────────────────────

/// A `principals` row before decoding.
pub struct RawPrincipal {
  pub principal_id:  String,
  pub role:          String,
  pub state:         String,
  pub name:          String,
  pub email:         String,
  pub class_ids:     String,
  pub password_hash: String,
  pub created_at:    String,
}

pub const PRINCIPAL_COLUMNS: &str =
  "principal_id, role, state, name, email, class_ids, password_hash, created_at";

impl RawPrincipal {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      principal_id:  row.get(0)?,
      role:          row.get(1)?,
      state:         row.get(2)?,
      name:          row.get(3)?,
      email:         row.get(4)?,
      class_ids:     row.get(5)?,
      password_hash: row.get(6)?,
      created_at:    row.get(7)?,
    })
  }

  pub fn into_principal(self) -> Result<Principal> {
    Ok(Principal {
      principal_id:  decode_uuid(&self.principal_id)?,
      role:          Role::parse(&self.role)?,
      state:         OperableState::parse(&self.state)?,
      name:          self.name,
      email:         self.email,
      class_ids:     decode_uuids(&self.class_ids)?,
      password_hash: self.password_hash,
      created_at:    decode_dt(&self.created_at)?,
    })
  }
}

/// A `classes` row joined with its enrolments, member ids in position order.
pub struct RawGroup {
  pub group_id:   String,
  pub name:       String,
  pub member_ids: Vec<String>,
}

impl RawGroup {
  pub fn into_group(self) -> Result<Group> {
    Ok(Group {
      group_id:   decode_uuid(&self.group_id)?,
      name:       self.name,
      member_ids: self
        .member_ids
        .iter()
        .map(|s| decode_uuid(s))
        .collect::<Result<_>>()?,
    })
  }
}

pub struct RawTemplate {
  pub template_id: String,
  pub name:        String,
  pub amount:      String,
  pub currency:    String,
}

impl RawTemplate {
  pub fn into_template(self) -> Result<ObligationTemplate> {
    Ok(ObligationTemplate {
      template_id: decode_uuid(&self.template_id)?,
      name:        self.name,
      amount:      decode_decimal(&self.amount)?,
      currency:    self.currency,
    })
  }
}

pub struct RawObligation {
  pub obligation_id:   String,
  pub student_id:      String,
  pub group_id:        String,
  pub template_id:     String,
  pub amount:          String,
  pub currency:        String,
  pub due_date:        String,
  pub status:          String,
  pub idempotency_key: String,
  pub created_at:      String,
}

pub const OBLIGATION_COLUMNS: &str = "obligation_id, student_id, group_id, template_id, amount, \
                                      currency, due_date, status, idempotency_key, created_at";

impl RawObligation {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      obligation_id:   row.get(0)?,
      student_id:      row.get(1)?,
      group_id:        row.get(2)?,
      template_id:     row.get(3)?,
      amount:          row.get(4)?,
      currency:        row.get(5)?,
      due_date:        row.get(6)?,
      status:          row.get(7)?,
      idempotency_key: row.get(8)?,
      created_at:      row.get(9)?,
    })
  }

  /// Encode a domain obligation for insertion.
  pub fn from_obligation(o: &Obligation) -> Self {
    Self {
      obligation_id:   encode_uuid(o.obligation_id),
      student_id:      encode_uuid(o.student_id),
      group_id:        encode_uuid(o.group_id),
      template_id:     encode_uuid(o.template_id),
      amount:          encode_decimal(o.amount),
      currency:        o.currency.clone(),
      due_date:        encode_date(o.due_date),
      status:          o.status.as_ref().to_owned(),
      idempotency_key: o.idempotency_key.clone(),
      created_at:      encode_dt(o.created_at),
    }
  }

  pub fn insert(&self, conn: &rusqlite::Connection) -> rusqlite::Result<()> {
    conn.execute(
      &format!(
        "INSERT INTO student_fees ({OBLIGATION_COLUMNS})
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)"
      ),
      rusqlite::params![
        self.obligation_id,
        self.student_id,
        self.group_id,
        self.template_id,
        self.amount,
        self.currency,
        self.due_date,
        self.status,
        self.idempotency_key,
        self.created_at,
      ],
    )?;
    Ok(())
  }

  pub fn into_obligation(self) -> Result<Obligation> {
    Ok(Obligation {
      obligation_id:   decode_uuid(&self.obligation_id)?,
      student_id:      decode_uuid(&self.student_id)?,
      group_id:        decode_uuid(&self.group_id)?,
      template_id:     decode_uuid(&self.template_id)?,
      amount:          decode_decimal(&self.amount)?,
      currency:        self.currency,
      due_date:        decode_date(&self.due_date)?,
      status:          ObligationStatus::parse(&self.status)?,
      idempotency_key: self.idempotency_key,
      created_at:      decode_dt(&self.created_at)?,
    })
  }
}
