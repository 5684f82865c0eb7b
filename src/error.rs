use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::domain::{OrderNo, OrderStatus, SalesCode};

/// Validation failures surfaced synchronously to callers, never coerced.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("invalid transition: {from} -> {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },
    #[error("unknown sales code: {0}")]
    UnknownSalesCode(SalesCode),
    #[error("duplicate free trial for {username}: existing order {existing_order_no}")]
    DuplicateFreeTrial {
        username: String,
        existing_order_no: OrderNo,
    },
    #[error("invalid duration label: {0:?}")]
    InvalidDuration(String),
    #[error("invalid commission rate: {0}")]
    InvalidRate(String),
    #[error("invalid parent linkage: {0}")]
    InvalidParent(String),
    #[error("sales code already registered: {0}")]
    DuplicateSalesCode(SalesCode),
    /// The order changed between read and write; the caller retries.
    #[error("concurrent update detected for order {0}")]
    VersionConflict(uuid::Uuid),
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Internal server error: {0}")]
    Internal(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Bad request: {0}")]
    BadRequest(String),
    #[error("Conflict: {0}")]
    Conflict(String),
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<crate::orchestration::OrderServiceError> for AppError {
    fn from(err: crate::orchestration::OrderServiceError) -> Self {
        use crate::orchestration::OrderServiceError;
        match err {
            OrderServiceError::Domain(domain) => domain.into(),
            OrderServiceError::OrderNotFound(id) => {
                AppError::NotFound(format!("order not found: {}", id))
            }
            OrderServiceError::Db(e) => AppError::Internal(e.to_string()),
        }
    }
}

impl From<crate::orchestration::SettlementError> for AppError {
    fn from(err: crate::orchestration::SettlementError) -> Self {
        use crate::orchestration::SettlementError;
        match err {
            SettlementError::Domain(domain) => domain.into(),
            SettlementError::Db(e) => AppError::Internal(e.to_string()),
            SettlementError::Csv(msg) => AppError::Internal(msg),
        }
    }
}

impl From<DomainError> for AppError {
    fn from(err: DomainError) -> Self {
        match &err {
            DomainError::UnknownSalesCode(_) => AppError::NotFound(err.to_string()),
            DomainError::InvalidDuration(_)
            | DomainError::InvalidRate(_)
            | DomainError::InvalidParent(_) => AppError::BadRequest(err.to_string()),
            DomainError::InvalidTransition { .. }
            | DomainError::DuplicateFreeTrial { .. }
            | DomainError::DuplicateSalesCode(_)
            | DomainError::VersionConflict(_) => AppError::Conflict(err.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::Config(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_trial_references_existing_order() {
        let err = DomainError::DuplicateFreeTrial {
            username: "u1".to_string(),
            existing_order_no: OrderNo::new("RL123"),
        };
        assert!(err.to_string().contains("RL123"));
    }

    #[test]
    fn test_http_status_mapping() {
        let unknown: AppError = DomainError::UnknownSalesCode(SalesCode::new("X")).into();
        assert!(matches!(unknown, AppError::NotFound(_)));

        let bad: AppError = DomainError::InvalidDuration("??".to_string()).into();
        assert!(matches!(bad, AppError::BadRequest(_)));

        let conflict: AppError = DomainError::InvalidTransition {
            from: OrderStatus::Rejected,
            to: OrderStatus::ConfirmedPayment,
        }
        .into();
        assert!(matches!(conflict, AppError::Conflict(_)));
    }
}
