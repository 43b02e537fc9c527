//! Error types for `campus-core`.

use thiserror::Error;
use uuid::Uuid;

use crate::principal::OperableState;

#[derive(Debug, Error)]
pub enum Error {
  #[error("principal {0} is {1}, not active")]
  PrincipalNotActive(Uuid, OperableState),

  #[error("unknown {kind} value: {value:?}")]
  UnknownValue { kind: &'static str, value: String },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
