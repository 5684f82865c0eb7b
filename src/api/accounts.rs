use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use crate::api::AppState;
use crate::domain::{AccountKind, Amount, SalesAccount, SalesCode};
use crate::error::AppError;
use crate::orchestration::RegisterAccountInput;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterAccountRequest {
    pub sales_code: String,
    pub name: String,
    pub kind: AccountKind,
    pub parent_sales_code: Option<String>,
    pub commission_rate: Option<Amount>,
}

pub async fn register_account(
    State(state): State<AppState>,
    Json(req): Json<RegisterAccountRequest>,
) -> Result<(StatusCode, Json<SalesAccount>), AppError> {
    let sales_code = req.sales_code.trim();
    if sales_code.is_empty() {
        return Err(AppError::BadRequest("salesCode must not be empty".to_string()));
    }
    let account = state
        .settlement
        .register_account(RegisterAccountInput {
            sales_code: SalesCode::new(sales_code),
            name: req.name,
            kind: req.kind,
            parent_sales_code: req.parent_sales_code.map(SalesCode::new),
            commission_rate: req.commission_rate,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(account)))
}

/// `{"rate": 0}` configures a zero rate; `{"rate": null}` (or an absent
/// field) clears the configuration. The two are distinct end-to-end.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetRateRequest {
    pub rate: Option<Amount>,
}

pub async fn set_rate(
    Path(sales_code): Path<String>,
    State(state): State<AppState>,
    Json(req): Json<SetRateRequest>,
) -> Result<StatusCode, AppError> {
    state
        .settlement
        .set_commission_rate(&SalesCode::new(sales_code), req.rate)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetExclusionRequest {
    pub active: bool,
    pub reason: Option<String>,
}

pub async fn set_exclusion(
    Path(sales_code): Path<String>,
    State(state): State<AppState>,
    Json(req): Json<SetExclusionRequest>,
) -> Result<StatusCode, AppError> {
    state
        .settlement
        .set_exclusion(
            &SalesCode::new(sales_code),
            req.active,
            req.reason.unwrap_or_default(),
        )
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
