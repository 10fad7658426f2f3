//! Request/response payloads for the ingestion and query APIs.
//!
//! These types are shared between handlers and `OpenAPI` generation.

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::alerts::models::Alert;
use crate::events::models::AuthEvent;
use crate::events::repo::Statistics;

/// Structured error payload: `fields` is populated for validation failures.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    pub detail: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<FieldDetail>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct FieldDetail {
    pub field: String,
    pub message: String,
}

/// Authentication event as received from the identity provider.
#[derive(Debug, Deserialize, ToSchema)]
pub struct IngestEventRequest {
    pub subject_id: i64,
    pub display_name: String,
    /// One of the eight authentication event kinds, e.g. `login_failure`.
    pub kind: String,
    pub ip: Option<String>,
    pub client_signature: Option<String>,
    /// RFC 3339 timestamp of the event at the identity provider.
    pub timestamp: String,
    /// Flat map of scalar values.
    #[schema(value_type = Object)]
    pub metadata: Option<serde_json::Value>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct IngestResponse {
    pub id: String,
    pub status: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct EventResponse {
    pub id: String,
    pub subject_id: i64,
    pub display_name: String,
    pub kind: String,
    pub ip: Option<String>,
    pub client_signature: Option<String>,
    pub timestamp: String,
    #[schema(value_type = Object)]
    pub metadata: serde_json::Value,
    pub risk_score: Option<f64>,
    pub risk_reason: Option<String>,
    pub analyzed_at: Option<String>,
}

impl From<AuthEvent> for EventResponse {
    fn from(event: AuthEvent) -> Self {
        Self {
            id: event.id.to_string(),
            subject_id: event.subject_id,
            display_name: event.display_name,
            kind: event.kind.as_str().to_string(),
            ip: event.ip,
            client_signature: event.client_signature,
            timestamp: event.occurred_at.to_rfc3339(),
            metadata: event.metadata,
            risk_score: event.risk_score,
            risk_reason: event.risk_reason,
            analyzed_at: event.analyzed_at.map(|at| at.to_rfc3339()),
        }
    }
}

#[derive(Debug, Deserialize, IntoParams, Default)]
#[into_params(parameter_in = Query)]
pub struct EventListParams {
    /// Filter by subject id.
    pub subject_id: Option<i64>,
    /// Filter by event kind.
    pub kind: Option<String>,
    /// Events at or after this RFC 3339 timestamp.
    pub start: Option<String>,
    /// Events strictly before this RFC 3339 timestamp.
    pub end: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct EventListResponse {
    pub items: Vec<EventResponse>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

#[derive(Debug, Deserialize, IntoParams, Default)]
#[into_params(parameter_in = Query)]
pub struct AssessmentListParams {
    /// Filter by subject id.
    pub subject_id: Option<i64>,
    /// Minimum risk score, inclusive.
    pub min_score: Option<f64>,
    /// Maximum risk score, inclusive.
    pub max_score: Option<f64>,
    /// Events at or after this RFC 3339 timestamp.
    pub start: Option<String>,
    /// Events strictly before this RFC 3339 timestamp.
    pub end: Option<String>,
    /// Sort field: `score` (default) or `timestamp`.
    pub sort: Option<String>,
    /// Sort order: `asc` or `desc` (default).
    pub order: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AssessmentResponse {
    pub event: EventResponse,
    pub risk_score: f64,
    pub notify: bool,
    pub reason: String,
    pub analyzed_at: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AssessmentListResponse {
    pub items: Vec<AssessmentResponse>,
    pub statistics: Statistics,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

#[derive(Debug, Deserialize, IntoParams, Default)]
#[into_params(parameter_in = Query)]
pub struct AlertListParams {
    /// Filter by alert status: `open`, `reviewed`, or `resolved`.
    pub status: Option<String>,
    /// Minimum risk score, inclusive.
    pub min_score: Option<f64>,
    /// Filter by subject id.
    pub subject_id: Option<i64>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AlertResponse {
    pub id: String,
    pub subject_id: i64,
    pub display_name: String,
    pub event_ids: Vec<String>,
    pub risk_score: f64,
    pub reason: String,
    pub status: String,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Alert> for AlertResponse {
    fn from(alert: Alert) -> Self {
        Self {
            id: alert.id.to_string(),
            subject_id: alert.subject_id,
            display_name: alert.display_name,
            event_ids: alert
                .event_ids
                .into_iter()
                .map(|id| id.to_string())
                .collect(),
            risk_score: alert.risk_score,
            reason: alert.reason,
            status: alert.status.as_str().to_string(),
            created_at: alert.created_at.to_rfc3339(),
            updated_at: alert.updated_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AlertListResponse {
    pub items: Vec<AlertResponse>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

/// Human review transition applied to one alert.
#[derive(Debug, Deserialize, ToSchema)]
pub struct AlertStatusUpdate {
    /// New status: `open`, `reviewed`, or `resolved`.
    pub status: String,
}
