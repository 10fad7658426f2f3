use super::handlers::{alerts, assessments, events, health, ingest};
use utoipa::openapi::{InfoBuilder, OpenApiBuilder, Tag};
use utoipa_axum::{router::OpenApiRouter, routes};

#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    // Reuse the same router wiring and only return the generated OpenAPI spec.
    let (_router, openapi) = api_router().split_for_parts();
    openapi
}

/// Build the router that also drives the `OpenAPI` document.
///
/// Add new endpoints here via `.routes(routes!(...))` so they are both served
/// and included in the generated `OpenAPI` spec. Handlers that share a path
/// must be registered in the same `routes!` call.
/// Routes added outside (like `/` or `OPTIONS /health`) are intentionally not
/// documented.
pub(crate) fn api_router() -> OpenApiRouter {
    let mut events_tag = Tag::new("events");
    events_tag.description = Some("Authentication event ingestion and listing".to_string());

    let mut assessments_tag = Tag::new("assessments");
    assessments_tag.description = Some("Risk assessment results and statistics".to_string());

    let mut alerts_tag = Tag::new("alerts");
    alerts_tag.description = Some("Security alert review".to_string());

    let mut openapi = cargo_openapi();
    openapi.tags = Some(vec![events_tag, assessments_tag, alerts_tag]);

    // `routes!` reads #[utoipa::path] to bind HTTP method + path and add the route to OpenAPI.
    OpenApiRouter::with_openapi(openapi)
        .routes(routes!(health::health))
        .routes(routes!(ingest::ingest, events::list))
        .routes(routes!(assessments::list))
        .routes(routes!(alerts::list))
        .routes(routes!(alerts::get, alerts::update_status))
}

fn cargo_openapi() -> utoipa::openapi::OpenApi {
    // Use Cargo.toml metadata instead of the utoipa-axum crate info defaults.
    let info = InfoBuilder::new()
        .title(env!("CARGO_PKG_NAME"))
        .version(env!("CARGO_PKG_VERSION"))
        .description(Some(env!("CARGO_PKG_DESCRIPTION")))
        .build();

    OpenApiBuilder::new().info(info).build()
}
