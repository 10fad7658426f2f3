//! Assessed-event listing with aggregate risk statistics.

use axum::{
    extract::{Extension, Query},
    response::Json,
};
use sqlx::PgPool;

use super::types::{
    AssessmentListParams, AssessmentListResponse, AssessmentResponse, ErrorBody, EventResponse,
};
use super::{pagination, parse_timestamp, reject_if_invalid};
use crate::cli::globals::GlobalArgs;
use crate::error::{Error, FieldViolation};
use crate::events::repo::{self, AssessmentFilter, AssessmentSort, SortOrder};

fn parse_sort(
    params_sort: Option<&str>,
    params_order: Option<&str>,
    violations: &mut Vec<FieldViolation>,
) -> (AssessmentSort, SortOrder) {
    let sort = match params_sort {
        None | Some("score") => AssessmentSort::Score,
        Some("timestamp") => AssessmentSort::Timestamp,
        Some(other) => {
            violations.push(FieldViolation::new(
                "sort",
                format!("must be 'score' or 'timestamp', got '{other}'"),
            ));
            AssessmentSort::Score
        }
    };

    let order = match params_order {
        None | Some("desc") => SortOrder::Desc,
        Some("asc") => SortOrder::Asc,
        Some(other) => {
            violations.push(FieldViolation::new(
                "order",
                format!("must be 'asc' or 'desc', got '{other}'"),
            ));
            SortOrder::Desc
        }
    };

    (sort, order)
}

fn validate_score_bounds(
    min_score: Option<f64>,
    max_score: Option<f64>,
    violations: &mut Vec<FieldViolation>,
) {
    if let Some(min) = min_score {
        if !(0.0..=1.0).contains(&min) {
            violations.push(FieldViolation::new(
                "min_score",
                "must be between 0.0 and 1.0",
            ));
        }
    }
    if let Some(max) = max_score {
        if !(0.0..=1.0).contains(&max) {
            violations.push(FieldViolation::new(
                "max_score",
                "must be between 0.0 and 1.0",
            ));
        }
    }
    if let (Some(min), Some(max)) = (min_score, max_score) {
        if min > max {
            violations.push(FieldViolation::new(
                "min_score",
                "must not be greater than max_score",
            ));
        }
    }
}

#[utoipa::path(
    get,
    path = "/v1/assessments",
    params(AssessmentListParams),
    responses(
        (status = 200, description = "Assessed events with aggregate statistics.", body = AssessmentListResponse),
        (status = 422, description = "Invalid filter parameters.", body = ErrorBody),
    ),
    tag = "assessments"
)]
/// List assessed events sorted by score or timestamp, with band counts and
/// the mean score computed over the same filtered set.
/// An inverted score range is rejected before any query runs.
pub async fn list(
    Extension(pool): Extension<PgPool>,
    Extension(globals): Extension<GlobalArgs>,
    Query(params): Query<AssessmentListParams>,
) -> Result<Json<AssessmentListResponse>, Error> {
    let mut violations = Vec::new();

    validate_score_bounds(params.min_score, params.max_score, &mut violations);
    let (sort, order) = parse_sort(params.sort.as_deref(), params.order.as_deref(), &mut violations);
    let start = parse_timestamp("start", params.start.as_deref(), &mut violations);
    let end = parse_timestamp("end", params.end.as_deref(), &mut violations);
    let (limit, offset) = pagination(params.limit, params.offset, &mut violations);
    reject_if_invalid(violations)?;

    let filter = AssessmentFilter {
        subject_id: params.subject_id,
        min_score: params.min_score,
        max_score: params.max_score,
        start,
        end,
    };

    let statistics = repo::statistics(&pool, &filter).await?;
    let (events, total) = repo::query_assessed(&pool, &filter, sort, order, limit, offset).await?;

    let threshold = globals.risk_threshold;
    let items = events
        .into_iter()
        .map(|event| {
            let risk_score = event.risk_score.unwrap_or(0.0);
            let reason = event
                .risk_reason
                .clone()
                .unwrap_or_else(|| "No analysis reason provided".to_string());
            let analyzed_at = event.analyzed_at.map(|at| at.to_rfc3339());
            AssessmentResponse {
                event: EventResponse::from(event),
                risk_score,
                notify: risk_score >= threshold,
                reason,
                analyzed_at,
            }
        })
        .collect();

    Ok(Json(AssessmentListResponse {
        items,
        statistics,
        total,
        limit,
        offset,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sort_defaults_to_score_desc() {
        let mut violations = Vec::new();
        let (sort, order) = parse_sort(None, None, &mut violations);
        assert_eq!(sort, AssessmentSort::Score);
        assert_eq!(order, SortOrder::Desc);
        assert!(violations.is_empty());
    }

    #[test]
    fn unknown_sort_field_is_rejected() {
        let mut violations = Vec::new();
        parse_sort(Some("reason"), Some("asc"), &mut violations);
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].field, "sort");
    }

    #[test]
    fn inverted_score_range_is_rejected() {
        let mut violations = Vec::new();
        validate_score_bounds(Some(0.8), Some(0.2), &mut violations);
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].field, "min_score");
    }

    #[test]
    fn out_of_range_scores_are_rejected() {
        let mut violations = Vec::new();
        validate_score_bounds(Some(-0.1), Some(1.2), &mut violations);
        assert_eq!(violations.len(), 2);
    }

    #[test]
    fn equal_bounds_are_accepted() {
        let mut violations = Vec::new();
        validate_score_bounds(Some(0.5), Some(0.5), &mut violations);
        assert!(violations.is_empty());
    }
}
