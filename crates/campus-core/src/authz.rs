//! The authorization gate: a static role allow-list check.
//!
//! - No IO
//! - No hidden state
//! - No hierarchy: `admin` does not implicitly include any other role

use thiserror::Error;

use crate::principal::{Identity, Role};

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum AuthzError {
  #[error("authentication required")]
  Unauthenticated,

  #[error("role {0} may not perform this operation")]
  Forbidden(Role),
}

/// Permit the operation iff an identity is present and its role is listed in
/// `required`.
pub fn authorize(
  identity: Option<&Identity>,
  required: &[Role],
) -> Result<(), AuthzError> {
  let identity = identity.ok_or(AuthzError::Unauthenticated)?;
  if required.contains(&identity.role()) {
    Ok(())
  } else {
    Err(AuthzError::Forbidden(identity.role()))
  }
}

#[cfg(test)]
mod tests {
  use chrono::Utc;
  use uuid::Uuid;

  use super::*;
  use crate::principal::{OperableState, Principal};

  fn identity(role: Role) -> Identity {
    Identity::from_principal(&Principal {
      principal_id:  Uuid::new_v4(),
      role,
      state:         OperableState::Active,
      name:          "Test".into(),
      email:         "test@school.test".into(),
      class_ids:     Vec::new(),
      password_hash: String::new(),
      created_at:    Utc::now(),
    })
    .unwrap()
  }

  #[test]
  fn listed_role_is_allowed() {
    let id = identity(Role::Teacher);
    assert_eq!(authorize(Some(&id), &[Role::Admin, Role::Teacher]), Ok(()));
  }

  #[test]
  fn unlisted_role_is_forbidden() {
    let id = identity(Role::Student);
    assert_eq!(
      authorize(Some(&id), &[Role::Admin]),
      Err(AuthzError::Forbidden(Role::Student))
    );
  }

  #[test]
  fn admin_gets_no_implicit_grants() {
    let id = identity(Role::Admin);
    assert!(authorize(Some(&id), &[Role::Student]).is_err());
  }

  #[test]
  fn missing_identity_is_unauthenticated() {
    assert_eq!(authorize(None, &[Role::Admin]), Err(AuthzError::Unauthenticated));
  }

  #[test]
  fn empty_allow_list_denies_everyone() {
    let id = identity(Role::Admin);
    assert!(authorize(Some(&id), &[]).is_err());
  }

  #[test]
  fn same_inputs_give_same_answer() {
    for role in [Role::Admin, Role::Teacher, Role::Student, Role::Parent] {
      let id = identity(role);
      let required = [Role::Admin, Role::Parent];
      assert_eq!(authorize(Some(&id), &required), authorize(Some(&id), &required));
    }
  }
}
