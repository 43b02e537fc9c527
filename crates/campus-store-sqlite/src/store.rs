//! The SQLite implementation of [`RecordStore`].

use std::path::Path;

use campus_core::{
  group::{Group, NewGroup},
  obligation::{
    NewObligation, NewTemplate, Obligation, ObligationStatus, ObligationTemplate,
  },
  principal::{NewPrincipal, Principal},
  store::{ObligationQuery, RecordStore},
};
use chrono::Utc;
use rusqlite::OptionalExtension as _;
use uuid::Uuid;

use crate::{
  encode::{
    encode_decimal, encode_dt, encode_uuid, encode_uuids, RawGroup, RawObligation,
    RawPrincipal, RawTemplate, OBLIGATION_COLUMNS, PRINCIPAL_COLUMNS,
  },
  schema::SCHEMA,
  Result,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Campus record store backed by a single SQLite file.
///
/// Clones share one connection thread.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

/// Ids bound per `IN (…)` query; SQLite caps the number of variables in
/// one statement.
const IN_CHUNK: usize = 500;

/// `?1, ?2, …, ?n` for an `IN (…)` clause.
fn placeholders(n: usize) -> String {
  (1..=n).map(|i| format!("?{i}")).collect::<Vec<_>>().join(", ")
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn query_obligations(
    &self,
    where_clause: String,
    params: Vec<String>,
  ) -> Result<Vec<Obligation>> {
    let raws: Vec<RawObligation> = self
      .conn
      .call(move |conn| {
        let sql = format!(
          "SELECT {OBLIGATION_COLUMNS} FROM student_fees {where_clause} ORDER BY rowid"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params_from_iter(params.iter()), RawObligation::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawObligation::into_obligation).collect()
  }
}

// ─── RecordStore impl ────────────────────────────────────────────────────────

impl RecordStore for SqliteStore {
  type Error = crate::Error;

  // ── Principals ────────────────────────────────────────────────────────────

  async fn add_principal(&self, input: NewPrincipal) -> Result<Principal> {
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

    let id_str     = encode_uuid(principal.principal_id);
    let role_str   = principal.role.as_ref().to_owned();
    let state_str  = principal.state.as_ref().to_owned();
    let name       = principal.name.clone();
    let email      = principal.email.clone();
    let classes    = encode_uuids(&principal.class_ids)?;
    let hash       = principal.password_hash.clone();
    let at_str     = encode_dt(principal.created_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          &format!(
            "INSERT INTO principals ({PRINCIPAL_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"
          ),
          rusqlite::params![id_str, role_str, state_str, name, email, classes, hash, at_str],
        )?;
        Ok(())
      })
      .await?;

    Ok(principal)
  }

  async fn get_principal(&self, id: Uuid) -> Result<Option<Principal>> {
    let id_str = encode_uuid(id);

    let raw: Option<RawPrincipal> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {PRINCIPAL_COLUMNS} FROM principals WHERE principal_id = ?1"),
              rusqlite::params![id_str],
              RawPrincipal::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawPrincipal::into_principal).transpose()
  }

  async fn get_principals(&self, ids: Vec<Uuid>) -> Result<Vec<Principal>> {
    if ids.is_empty() {
      return Ok(Vec::new());
    }
    let id_strs: Vec<String> = ids.into_iter().map(encode_uuid).collect();

    let raws: Vec<RawPrincipal> = self
      .conn
      .call(move |conn| {
        let mut rows = Vec::with_capacity(id_strs.len());
        for chunk in id_strs.chunks(IN_CHUNK) {
          let sql = format!(
            "SELECT {PRINCIPAL_COLUMNS} FROM principals WHERE principal_id IN ({})",
            placeholders(chunk.len())
          );
          let mut stmt = conn.prepare_cached(&sql)?;
          let found = stmt
            .query_map(rusqlite::params_from_iter(chunk.iter()), RawPrincipal::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
          rows.extend(found);
        }
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawPrincipal::into_principal).collect()
  }

  async fn find_principal_by_email(&self, email: String) -> Result<Option<Principal>> {
    let raw: Option<RawPrincipal> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {PRINCIPAL_COLUMNS} FROM principals WHERE email = ?1"),
              rusqlite::params![email],
              RawPrincipal::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawPrincipal::into_principal).transpose()
  }

  // ── Groups ────────────────────────────────────────────────────────────────

  async fn add_group(&self, input: NewGroup) -> Result<Group> {
    let group = input.into_group(Uuid::new_v4());

    let id_str      = encode_uuid(group.group_id);
    let name        = group.name.clone();
    let member_strs: Vec<String> = group.member_ids.iter().copied().map(encode_uuid).collect();

    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        tx.execute(
          "INSERT INTO classes (group_id, name) VALUES (?1, ?2)",
          rusqlite::params![id_str, name],
        )?;
        for (position, member) in member_strs.iter().enumerate() {
          tx.execute(
            "INSERT INTO enrolments (group_id, principal_id, position)
             VALUES (?1, ?2, ?3)",
            rusqlite::params![id_str, member, position as i64],
          )?;
        }
        tx.commit()?;
        Ok(())
      })
      .await?;

    Ok(group)
  }

  async fn get_groups(&self, ids: Vec<Uuid>) -> Result<Vec<Group>> {
    if ids.is_empty() {
      return Ok(Vec::new());
    }
    let id_strs: Vec<String> = ids.into_iter().map(encode_uuid).collect();

    let raws: Vec<RawGroup> = self
      .conn
      .call(move |conn| {
        let mut classes = Vec::new();
        for chunk in id_strs.chunks(IN_CHUNK) {
          let sql = format!(
            "SELECT group_id, name FROM classes WHERE group_id IN ({})",
            placeholders(chunk.len())
          );
          let mut stmt = conn.prepare_cached(&sql)?;
          let found = stmt
            .query_map(rusqlite::params_from_iter(chunk.iter()), |row| {
              Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
          classes.extend(found);
        }

        let mut members = conn.prepare(
          "SELECT principal_id FROM enrolments WHERE group_id = ?1 ORDER BY position",
        )?;
        let mut groups = Vec::with_capacity(classes.len());
        for (group_id, name) in classes {
          let member_ids = members
            .query_map(rusqlite::params![group_id], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
          groups.push(RawGroup { group_id, name, member_ids });
        }
        Ok(groups)
      })
      .await?;

    raws.into_iter().map(RawGroup::into_group).collect()
  }

  // ── Templates ─────────────────────────────────────────────────────────────

  async fn add_template(&self, input: NewTemplate) -> Result<ObligationTemplate> {
    let template = ObligationTemplate {
      template_id: Uuid::new_v4(),
      name:        input.name,
      amount:      input.amount,
      currency:    input.currency,
    };

    let id_str     = encode_uuid(template.template_id);
    let name       = template.name.clone();
    let amount_str = encode_decimal(template.amount);
    let currency   = template.currency.clone();

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO fee_structures (template_id, name, amount, currency)
           VALUES (?1, ?2, ?3, ?4)",
          rusqlite::params![id_str, name, amount_str, currency],
        )?;
        Ok(())
      })
      .await?;

    Ok(template)
  }

  async fn get_template(&self, id: Uuid) -> Result<Option<ObligationTemplate>> {
    let id_str = encode_uuid(id);

    let raw: Option<RawTemplate> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT template_id, name, amount, currency
               FROM fee_structures WHERE template_id = ?1",
              rusqlite::params![id_str],
              |row| {
                Ok(RawTemplate {
                  template_id: row.get(0)?,
                  name:        row.get(1)?,
                  amount:      row.get(2)?,
                  currency:    row.get(3)?,
                })
              },
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawTemplate::into_template).transpose()
  }

  // ── Obligations ───────────────────────────────────────────────────────────

  async fn create_obligation(&self, input: NewObligation) -> Result<Obligation> {
    let obligation = input.into_obligation(Utc::now());
    let raw = RawObligation::from_obligation(&obligation);

    self
      .conn
      .call(move |conn| {
        raw.insert(conn)?;
        Ok(())
      })
      .await?;

    Ok(obligation)
  }

  async fn create_obligations(&self, inputs: Vec<NewObligation>) -> Result<Vec<Obligation>> {
    let now = Utc::now();
    let obligations: Vec<Obligation> =
      inputs.into_iter().map(|input| input.into_obligation(now)).collect();
    let raws: Vec<RawObligation> =
      obligations.iter().map(RawObligation::from_obligation).collect();

    self
      .conn
      .call(move |conn| {
        // Dropping the transaction without commit rolls every insert back.
        let tx = conn.transaction()?;
        for raw in &raws {
          raw.insert(&tx)?;
        }
        tx.commit()?;
        Ok(())
      })
      .await?;

    Ok(obligations)
  }

  async fn find_obligation_by_key(&self, key: String) -> Result<Option<Obligation>> {
    let mut found = self
      .query_obligations("WHERE idempotency_key = ?1".to_owned(), vec![key])
      .await?;
    Ok(if found.is_empty() { None } else { Some(found.swap_remove(0)) })
  }

  async fn list_obligations(&self, query: ObligationQuery) -> Result<Vec<Obligation>> {
    let mut conds:  Vec<String> = Vec::new();
    let mut params: Vec<String> = Vec::new();

    let filters = [
      ("student_id", query.student_id.map(encode_uuid)),
      ("group_id", query.group_id.map(encode_uuid)),
      ("template_id", query.template_id.map(encode_uuid)),
      ("status", query.status.map(|s| s.as_ref().to_owned())),
    ];
    for (column, value) in filters {
      if let Some(value) = value {
        params.push(value);
        conds.push(format!("{column} = ?{}", params.len()));
      }
    }

    let where_clause = if conds.is_empty() {
      String::new()
    } else {
      format!("WHERE {}", conds.join(" AND "))
    };

    self.query_obligations(where_clause, params).await
  }

  async fn update_obligation_status(
    &self,
    id: Uuid,
    status: ObligationStatus,
  ) -> Result<Option<Obligation>> {
    let id_str     = encode_uuid(id);
    let status_str = status.as_ref().to_owned();

    let changed: usize = self
      .conn
      .call({
        let id_str = id_str.clone();
        move |conn| {
          Ok(conn.execute(
            "UPDATE student_fees SET status = ?1 WHERE obligation_id = ?2",
            rusqlite::params![status_str, id_str],
          )?)
        }
      })
      .await?;

    if changed == 0 {
      return Ok(None);
    }
    let mut found = self
      .query_obligations("WHERE obligation_id = ?1".to_owned(), vec![id_str])
      .await?;
    Ok(found.pop())
  }
}
