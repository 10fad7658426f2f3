use axum::response::{IntoResponse, Json};
use serde_json::json;

/// Service blurb for the bare root path; intentionally undocumented.
pub async fn root() -> impl IntoResponse {
    Json(json!({
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running",
    }))
}
