//! Risk scoring for authentication events.
//!
//! Two paths produce a [`RiskAssessment`]: an optional assisted path that
//! consults an external assessor under a bounded timeout, and the
//! deterministic rule path that is always available and serves as the
//! fallback for every assisted-path failure mode.

pub mod assessor;
pub mod models;
pub mod rules;
pub mod scorer;

pub use assessor::{HttpAssessor, NoopAssessor, RiskAssessor};
pub use models::RiskAssessment;
pub use scorer::RiskScorer;
