use axum::extract::{Path, State};
use axum::http::header;
use axum::response::IntoResponse;
use axum::Json;

use crate::api::AppState;
use crate::domain::SalesCode;
use crate::error::AppError;
use crate::orchestration::{AccountSettlement, SettlementService};

/// Reconciliation view for one account. Always exclusion-bypassing.
pub async fn get_settlement(
    Path(sales_code): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<AccountSettlement>, AppError> {
    let settlement = state
        .settlement
        .account_settlement(&SalesCode::new(sales_code))
        .await?;
    Ok(Json(settlement))
}

/// CSV download of the same reconciliation view.
pub async fn export_settlement(
    Path(sales_code): Path<String>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let code = SalesCode::new(sales_code);
    let settlement = state.settlement.account_settlement(&code).await?;
    let csv = SettlementService::settlement_csv(&settlement)?;
    let headers = [
        (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"settlement_{}.csv\"", code),
        ),
    ];
    Ok((headers, csv))
}
