use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;

use crate::api::AppState;
use crate::domain::SalesCode;
use crate::error::AppError;
use crate::stats::{Period, Scope, StatsSnapshot};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsQuery {
    pub period: Option<String>,
    /// Explicit staleness tolerance; omitted means the configured default.
    pub max_staleness_ms: Option<i64>,
}

fn parse_period(raw: Option<&str>) -> Result<Period, AppError> {
    match raw {
        None => Ok(Period::All),
        Some(s) => Period::parse(s)
            .ok_or_else(|| AppError::BadRequest(format!("invalid period: {}", s))),
    }
}

fn validate_staleness(max_staleness_ms: Option<i64>) -> Result<(), AppError> {
    if let Some(ms) = max_staleness_ms {
        if ms < 0 {
            return Err(AppError::BadRequest(
                "maxStalenessMs must not be negative".to_string(),
            ));
        }
    }
    Ok(())
}

/// Global snapshot, exclusion filter applied.
pub async fn get_overview(
    Query(params): Query<StatsQuery>,
    State(state): State<AppState>,
) -> Result<Json<StatsSnapshot>, AppError> {
    let period = parse_period(params.period.as_deref())?;
    validate_staleness(params.max_staleness_ms)?;
    let snapshot = state
        .aggregator
        .get(&Scope::Global, period, params.max_staleness_ms)
        .await?;
    Ok(Json(snapshot))
}

/// Per-account snapshot. Individual scope never applies the exclusion
/// filter.
pub async fn get_account_stats(
    Path(sales_code): Path<String>,
    Query(params): Query<StatsQuery>,
    State(state): State<AppState>,
) -> Result<Json<StatsSnapshot>, AppError> {
    let period = parse_period(params.period.as_deref())?;
    validate_staleness(params.max_staleness_ms)?;
    let code = SalesCode::new(sales_code);
    if state.repo.get_account(&code).await?.is_none() {
        return Err(AppError::NotFound(format!("unknown sales code: {}", code)));
    }
    let snapshot = state
        .aggregator
        .get(&Scope::Account(code), period, params.max_staleness_ms)
        .await?;
    Ok(Json(snapshot))
}
