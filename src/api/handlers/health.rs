//! Health probe for orchestrators and operators.

use axum::{
    body::Body,
    extract::Extension,
    http::{Method, StatusCode},
    response::{IntoResponse, Json},
};
use serde::{Deserialize, Serialize};
use sqlx::{Connection, PgPool};
use tracing::{error, Instrument};
use utoipa::ToSchema;

use crate::cli::globals::GlobalArgs;
use crate::GIT_COMMIT_HASH;

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct Health {
    commit: String,
    name: String,
    version: String,
    database: String,
    assessor: String,
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Database connection is healthy", body = Health),
        (status = 503, description = "Database connection is unhealthy", body = Health)
    ),
    tag = "health"
)]
/// Report database connectivity and assessor configuration.
pub async fn health(
    method: Method,
    Extension(pool): Extension<PgPool>,
    Extension(globals): Extension<GlobalArgs>,
) -> impl IntoResponse {
    let acquire_span = tracing::info_span!(
        "db.acquire",
        db.system = "postgresql",
        db.operation = "ACQUIRE"
    );
    let result = match pool.acquire().instrument(acquire_span).await {
        Ok(mut conn) => {
            let ping_span =
                tracing::info_span!("db.ping", db.system = "postgresql", db.operation = "PING");
            match conn.ping().instrument(ping_span).await {
                Ok(()) => Ok(()),
                Err(error) => {
                    error!("Failed to ping database: {}", error);
                    Err(StatusCode::SERVICE_UNAVAILABLE)
                }
            }
        }
        Err(error) => {
            error!("Failed to acquire database connection: {}", error);
            Err(StatusCode::SERVICE_UNAVAILABLE)
        }
    };

    let health = Health {
        commit: GIT_COMMIT_HASH.to_string(),
        name: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        database: if result.is_ok() {
            "ok".to_string()
        } else {
            "error".to_string()
        },
        assessor: if globals.assessor_url.is_some() {
            "available".to_string()
        } else {
            "disabled".to_string()
        },
    };

    let body = if method == Method::GET {
        Json(&health).into_response()
    } else {
        Body::empty().into_response()
    };

    match result {
        Ok(()) => (StatusCode::OK, body).into_response(),
        Err(status) => (status, body).into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn health_serializes_all_fields() -> Result<(), serde_json::Error> {
        let health = Health {
            commit: "abcdef1".to_string(),
            name: "waspada".to_string(),
            version: "0.1.0".to_string(),
            database: "ok".to_string(),
            assessor: "disabled".to_string(),
        };
        let value = serde_json::to_value(&health)?;
        assert_eq!(value["database"], "ok");
        assert_eq!(value["assessor"], "disabled");
        Ok(())
    }
}
