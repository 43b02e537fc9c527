//! Core types and trait definitions for the Campus records backend.
//!
//! No HTTP or database code lives here. It holds the domain model, the
//! [`store::RecordStore`] abstraction, the role gate in [`authz`], and the
//! bulk fee assignment engine in [`assign`].

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod assign;
pub mod authz;
pub mod error;
pub mod group;
pub mod obligation;
pub mod principal;
pub mod store;

#[cfg(any(test, feature = "memory"))]
pub mod memory;

pub use error::{Error, Result};
