//! Groups (classes) and their enrolment lists.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A class or cohort. The assignment engine only reads membership.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
  pub group_id:   Uuid,
  pub name:       String,
  /// Enrolled principals in enrolment order.
  pub member_ids: Vec<Uuid>,
}

/// Input to [`crate::store::RecordStore::add_group`].
#[derive(Debug, Clone)]
pub struct NewGroup {
  pub name:       String,
  pub member_ids: Vec<Uuid>,
}

impl NewGroup {
  pub fn new(name: impl Into<String>, member_ids: Vec<Uuid>) -> Self {
    Self { name: name.into(), member_ids }
  }

  /// The stored form of this group. A member listed more than once keeps
  /// only its first position.
  pub fn into_group(self, group_id: Uuid) -> Group {
    let mut seen = HashSet::new();
    let member_ids = self.member_ids.into_iter().filter(|id| seen.insert(*id)).collect();
    Group { group_id, name: self.name, member_ids }
  }
}
