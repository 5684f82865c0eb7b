use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::AppState;
use crate::domain::{Amount, Order, OrderStatus, SalesCode};
use crate::error::AppError;
use crate::orchestration::CreateOrderInput;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    pub sales_code: String,
    /// Free-text duration label, normalized server-side.
    pub duration: String,
    pub amount: Amount,
    /// `null`/absent means "not recorded"; `0` is a real recorded amount.
    pub actual_payment_amount: Option<Amount>,
    pub tradingview_username: String,
}

pub async fn create_order(
    State(state): State<AppState>,
    Json(req): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<Order>), AppError> {
    let username = req.tradingview_username.trim();
    if username.is_empty() {
        return Err(AppError::BadRequest(
            "tradingviewUsername must not be empty".to_string(),
        ));
    }
    if req.amount.is_negative() {
        return Err(AppError::BadRequest("amount must not be negative".to_string()));
    }

    let order = state
        .orders
        .create_order(CreateOrderInput {
            sales_code: SalesCode::new(req.sales_code),
            duration: req.duration,
            amount: req.amount,
            actual_payment_amount: req.actual_payment_amount,
            tradingview_username: username.to_string(),
        })
        .await?;
    Ok((StatusCode::CREATED, Json(order)))
}

pub async fn get_order(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<Order>, AppError> {
    let order = state.orders.get_order(id).await?;
    Ok(Json(order))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionRequest {
    pub target_status: OrderStatus,
}

pub async fn transition_order(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Json(req): Json<TransitionRequest>,
) -> Result<Json<Order>, AppError> {
    let order = state.orders.transition_order(id, req.target_status).await?;
    Ok(Json(order))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepResponse {
    pub activated: u64,
    pub expired: u64,
}

pub async fn expiry_sweep(
    State(state): State<AppState>,
) -> Result<Json<SweepResponse>, AppError> {
    let (activated, expired) = state.orders.run_expiry_sweep().await?;
    Ok(Json(SweepResponse { activated, expired }))
}
