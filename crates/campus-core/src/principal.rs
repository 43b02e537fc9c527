//! Principals and the request-scoped [`Identity`] snapshot derived from them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Enums ───────────────────────────────────────────────────────────────────

/// The closed set of roles a principal can hold. Operations declare the roles
/// they accept as a static slice of these.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
  Admin,
  Teacher,
  Student,
  Parent,
}

/// Whether a principal's account can be used.
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
pub enum OperableState {
  Active,
  /// Registered but awaiting approval.
  #[default]
  Pending,
  Suspended,
}

impl Role {
  pub fn parse(s: &str) -> Result<Self> {
    s.parse().map_err(|_| Error::UnknownValue {
      kind:  "role",
      value: s.to_owned(),
    })
  }
}

impl OperableState {
  pub fn parse(s: &str) -> Result<Self> {
    s.parse().map_err(|_| Error::UnknownValue {
      kind:  "operable state",
      value: s.to_owned(),
    })
  }
}

// ─── Principal ───────────────────────────────────────────────────────────────

/// A stored account. Registration, approval and suspension happen outside
/// this crate; here principals are read-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Principal {
  pub principal_id:  Uuid,
  pub role:          Role,
  pub state:         OperableState,
  pub name:          String,
  pub email:         String,
  /// Classes this principal belongs to.
  pub class_ids:     Vec<Uuid>,
  /// argon2 PHC string. Never leaves the server.
  #[serde(skip_serializing, default)]
  pub password_hash: String,
  pub created_at:    DateTime<Utc>,
}

impl Principal {
  pub fn is_active(&self) -> bool { self.state == OperableState::Active }
}

/// Input to [`crate::store::RecordStore::add_principal`].
#[derive(Debug, Clone)]
pub struct NewPrincipal {
  pub role:          Role,
  pub state:         OperableState,
  pub name:          String,
  pub email:         String,
  pub class_ids:     Vec<Uuid>,
  pub password_hash: String,
}

impl NewPrincipal {
  /// An active principal with no class memberships and no usable password.
  pub fn new(role: Role, name: impl Into<String>, email: impl Into<String>) -> Self {
    Self {
      role,
      state: OperableState::Active,
      name: name.into(),
      email: email.into(),
      class_ids: Vec::new(),
      password_hash: String::new(),
    }
  }

  pub fn with_state(mut self, state: OperableState) -> Self {
    self.state = state;
    self
  }
}

// ─── Identity ────────────────────────────────────────────────────────────────

/// The resolved, read-only view of an authenticated principal attached to a
/// request.
///
/// Fields are private so the only way to obtain one is
/// [`Identity::from_principal`], which refuses principals that are not
/// [`OperableState::Active`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identity {
  principal_id: Uuid,
  role:         Role,
  state:        OperableState,
  name:         String,
  email:        String,
  class_ids:    Vec<Uuid>,
}

impl Identity {
  pub fn from_principal(principal: &Principal) -> Result<Self> {
    if !principal.is_active() {
      return Err(Error::PrincipalNotActive(
        principal.principal_id,
        principal.state,
      ));
    }
    Ok(Self {
      principal_id: principal.principal_id,
      role:         principal.role,
      state:        principal.state,
      name:         principal.name.clone(),
      email:        principal.email.clone(),
      class_ids:    principal.class_ids.clone(),
    })
  }

  pub fn principal_id(&self) -> Uuid { self.principal_id }

  pub fn role(&self) -> Role { self.role }

  pub fn state(&self) -> OperableState { self.state }

  pub fn name(&self) -> &str { &self.name }

  pub fn email(&self) -> &str { &self.email }

  pub fn class_ids(&self) -> &[Uuid] { &self.class_ids }
}
