//! Append-only store of authentication lifecycle events.

pub mod models;
pub mod repo;

pub use models::{AuthEvent, EventKind, NewEvent};
