//! Security alerts raised from qualifying risk assessments.

pub mod consolidator;
pub mod models;
pub mod repo;

pub use consolidator::{record_if_qualifying, ConsolidationOutcome, ConsolidationSettings};
pub use models::{Alert, AlertStatus};
