//! Bulk fee assignment: one fee structure, many classes, one obligation per
//! enrolled student.
//!
//! Classes are visited in the order the caller supplied them and members in
//! enrolment order. Classes and members that do not resolve are skipped and
//! reported in the [`AssignOutcome`] rather than failing the run.
//!
//! By default every obligation is an independent write and a storage failure
//! part-way through leaves the earlier records in place; the error carries
//! them. [`AssignOptions::atomic`] switches to a single transactional batch.

use std::collections::{HashMap, HashSet};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::{
  obligation::{NewObligation, Obligation},
  principal::{Principal, Role},
  store::RecordStore,
};

// ─── Options and outcome ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct AssignOptions {
  /// Write every obligation in one transaction.
  #[serde(default)]
  pub atomic:      bool,
  /// Skip students that already hold an obligation with the same
  /// (student, template, due date) key.
  #[serde(default)]
  pub deduplicate: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
  /// The class lists a member with no principal record.
  MissingPrincipal,
  /// The member's principal is not a student.
  NotStudent,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedMember {
  pub group_id:     Uuid,
  pub principal_id: Uuid,
  pub reason:       SkipReason,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedDuplicate {
  pub group_id:        Uuid,
  pub student_id:      Uuid,
  pub idempotency_key: String,
}

/// Everything an assignment run did, including what it chose not to do.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AssignOutcome {
  pub created:            Vec<Obligation>,
  /// Requested class ids that did not resolve.
  pub skipped_groups:     Vec<Uuid>,
  pub skipped_members:    Vec<SkippedMember>,
  pub skipped_duplicates: Vec<SkippedDuplicate>,
}

#[derive(Debug, Error)]
pub enum AssignError {
  #[error("fee structure not found: {0}")]
  TemplateNotFound(Uuid),

  /// The store failed. `partial.created` lists obligations that were already
  /// persisted and remain so.
  #[error(
    "store error after {} obligations were created: {source}",
    .partial.created.len()
  )]
  Store {
    partial: Box<AssignOutcome>,
    #[source]
    source:  Box<dyn std::error::Error + Send + Sync>,
  },
}

impl AssignError {
  fn store<E>(partial: AssignOutcome, source: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::Store { partial: Box::new(partial), source: Box::new(source) }
  }
}

// ─── Engine ──────────────────────────────────────────────────────────────────

/// Issue one obligation per student enrolled in each of `group_ids`, with the
/// amount and currency of `template_id` and the given due date.
pub async fn assign<S>(
  store: &S,
  template_id: Uuid,
  group_ids: &[Uuid],
  due_date: NaiveDate,
  options: AssignOptions,
) -> Result<AssignOutcome, AssignError>
where
  S: RecordStore,
{
  let mut outcome = AssignOutcome::default();

  let template = match store.get_template(template_id).await {
    Ok(Some(t)) => t,
    Ok(None) => return Err(AssignError::TemplateNotFound(template_id)),
    Err(e) => return Err(AssignError::store(outcome, e)),
  };

  // Repeated ids in the request are visited once, at their first position.
  let mut seen = HashSet::new();
  let requested: Vec<Uuid> =
    group_ids.iter().copied().filter(|id| seen.insert(*id)).collect();

  let mut groups: HashMap<Uuid, _> = match store.get_groups(requested.clone()).await {
    Ok(found) => found.into_iter().map(|g| (g.group_id, g)).collect(),
    Err(e) => return Err(AssignError::store(outcome, e)),
  };

  let mut ordered = Vec::with_capacity(requested.len());
  for id in requested {
    match groups.remove(&id) {
      Some(group) => ordered.push(group),
      None => {
        warn!(group_id = %id, "skipping unknown class in fee assignment");
        outcome.skipped_groups.push(id);
      }
    }
  }

  let member_ids: Vec<Uuid> = {
    let mut seen = HashSet::new();
    ordered
      .iter()
      .flat_map(|g| g.member_ids.iter().copied())
      .filter(|id| seen.insert(*id))
      .collect()
  };
  let principals: HashMap<Uuid, Principal> = match store.get_principals(member_ids).await {
    Ok(found) => found.into_iter().map(|p| (p.principal_id, p)).collect(),
    Err(e) => return Err(AssignError::store(outcome, e)),
  };

  let mut plan = Vec::new();
  for group in &ordered {
    for member_id in &group.member_ids {
      let reason = match principals.get(member_id) {
        None => Some(SkipReason::MissingPrincipal),
        Some(p) if p.role != Role::Student => Some(SkipReason::NotStudent),
        Some(_) => None,
      };
      match reason {
        Some(reason) => {
          warn!(
            group_id = %group.group_id,
            principal_id = %member_id,
            ?reason,
            "skipping class member in fee assignment"
          );
          outcome.skipped_members.push(SkippedMember {
            group_id: group.group_id,
            principal_id: *member_id,
            reason,
          });
        }
        None => plan.push(NewObligation::from_template(
          &template,
          group.group_id,
          *member_id,
          due_date,
        )),
      }
    }
  }

  if options.deduplicate {
    plan = match drop_duplicates(store, plan, &mut outcome).await {
      Ok(plan) => plan,
      Err(e) => return Err(AssignError::store(outcome, e)),
    };
  }

  if options.atomic {
    match store.create_obligations(plan).await {
      Ok(created) => outcome.created = created,
      Err(e) => {
        error!(%template_id, error = %e, "batch fee assignment rolled back");
        return Err(AssignError::store(outcome, e));
      }
    }
  } else {
    for input in plan {
      match store.create_obligation(input).await {
        Ok(obligation) => outcome.created.push(obligation),
        Err(e) => {
          error!(
            %template_id,
            created = outcome.created.len(),
            error = %e,
            "fee assignment aborted part-way"
          );
          return Err(AssignError::store(outcome, e));
        }
      }
    }
  }

  info!(
    %template_id,
    %due_date,
    created = outcome.created.len(),
    skipped_groups = outcome.skipped_groups.len(),
    skipped_members = outcome.skipped_members.len(),
    skipped_duplicates = outcome.skipped_duplicates.len(),
    "fee assignment complete"
  );
  Ok(outcome)
}

/// Remove planned obligations whose key already exists in the store or
/// earlier in the plan (a student enrolled in two of the requested classes).
async fn drop_duplicates<S>(
  store: &S,
  plan: Vec<NewObligation>,
  outcome: &mut AssignOutcome,
) -> Result<Vec<NewObligation>, S::Error>
where
  S: RecordStore,
{
  let mut planned_keys = HashSet::new();
  let mut kept = Vec::with_capacity(plan.len());
  for input in plan {
    let key = input.idempotency_key();
    let exists = !planned_keys.insert(key.clone())
      || store.find_obligation_by_key(key.clone()).await?.is_some();
    if exists {
      outcome.skipped_duplicates.push(SkippedDuplicate {
        group_id:        input.group_id,
        student_id:      input.student_id,
        idempotency_key: key,
      });
    } else {
      kept.push(input);
    }
  }
  Ok(kept)
}
