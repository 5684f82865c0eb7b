//! Order use-cases: creation with validation guards, administrative status
//! transitions, and the time-driven expiry sweep.

use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::db::Repository;
use crate::domain::{Amount, DurationCode, Order, OrderStatus, SalesCode, TimeMs};
use crate::engine::{plan_commission_update, CommissionUpdate};
use crate::error::DomainError;

/// Transitions retried on an optimistic-version conflict before giving up.
const TRANSITION_RETRIES: u32 = 3;

#[derive(Debug, Error)]
pub enum OrderServiceError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("order not found: {0}")]
    OrderNotFound(Uuid),
    #[error(transparent)]
    Db(#[from] sqlx::Error),
}

#[derive(Debug, Clone)]
pub struct CreateOrderInput {
    pub sales_code: SalesCode,
    /// Free-text duration label; normalized before anything else happens.
    pub duration: String,
    pub amount: Amount,
    pub actual_payment_amount: Option<Amount>,
    pub tradingview_username: String,
}

#[derive(Clone)]
pub struct OrderService {
    repo: Arc<Repository>,
}

impl OrderService {
    pub fn new(repo: Arc<Repository>) -> Self {
        Self { repo }
    }

    /// Create an order after running the validation guards.
    ///
    /// # Errors
    /// `InvalidDuration` for labels the normalizer cannot place,
    /// `UnknownSalesCode` for missing/inactive accounts, `DuplicateFreeTrial`
    /// when the subscriber already used a trial.
    pub async fn create_order(&self, input: CreateOrderInput) -> Result<Order, OrderServiceError> {
        let duration = DurationCode::normalize(&input.duration);
        if duration == DurationCode::Unknown {
            return Err(DomainError::InvalidDuration(input.duration).into());
        }

        let account = self
            .repo
            .get_account(&input.sales_code)
            .await?
            .filter(|a| a.active)
            .ok_or_else(|| DomainError::UnknownSalesCode(input.sales_code.clone()))?;

        let order = Order::new(
            account.sales_code.clone(),
            duration,
            input.amount,
            input.actual_payment_amount,
            input.tradingview_username,
            TimeMs::now(),
        );

        // One free trial per subscriber: a prior non-cancelled trial order
        // for the same tradingview username blocks a new zero-basis trial.
        if duration.is_trial() && order.commission_basis().is_zero() {
            if let Some(existing) = self
                .repo
                .find_trial_order(&order.tradingview_username)
                .await?
            {
                return Err(DomainError::DuplicateFreeTrial {
                    username: order.tradingview_username.clone(),
                    existing_order_no: existing.order_no,
                }
                .into());
            }
        }

        self.repo.insert_order(&order).await?;
        info!(
            order_no = %order.order_no,
            sales_code = %order.sales_code,
            duration = %order.duration_code,
            status = %order.status,
            "order created"
        );
        Ok(order)
    }

    /// Apply an administrative status transition.
    ///
    /// Runs read-validate-write under optimistic versioning: if the order's
    /// `updated_at` moved between read and write the whole step is re-run,
    /// so the commission record never mixes two concurrent states.
    pub async fn transition_order(
        &self,
        id: Uuid,
        target: OrderStatus,
    ) -> Result<Order, OrderServiceError> {
        for _ in 0..TRANSITION_RETRIES {
            let order = self
                .repo
                .get_order(id)
                .await?
                .ok_or(OrderServiceError::OrderNotFound(id))?;

            if !order.status.can_transition_to(target) {
                return Err(DomainError::InvalidTransition {
                    from: order.status,
                    to: target,
                }
                .into());
            }

            let expected = order.updated_at;
            let updated = self.apply_transition(order, target).await?;
            if self.repo.update_order_versioned(&updated, expected).await? {
                info!(
                    order_no = %updated.order_no,
                    status = %updated.status,
                    "order transitioned"
                );
                return Ok(updated);
            }
            warn!(order_id = %id, "concurrent order update, retrying transition");
        }
        Err(DomainError::VersionConflict(id).into())
    }

    async fn apply_transition(
        &self,
        mut order: Order,
        target: OrderStatus,
    ) -> Result<Order, OrderServiceError> {
        let now = TimeMs::now();
        order.status = target;
        match target {
            OrderStatus::ConfirmedPayment => {
                order.payment_confirmed_at = Some(now);
            }
            OrderStatus::ConfirmedConfig => {
                order.config_confirmed_at = Some(now);
                order.effective_at = Some(now);
                order.expires_at = order.duration_code.expiry_from(now);
            }
            _ => {}
        }

        let rate = self
            .repo
            .get_account(&order.sales_code)
            .await?
            .and_then(|a| a.commission_rate);
        match plan_commission_update(&order, rate) {
            CommissionUpdate::Set(record) => {
                order.commission_rate_used = Some(record.rate_used);
                order.commission_amount = Some(record.amount);
            }
            CommissionUpdate::Clear => {
                order.commission_rate_used = None;
                order.commission_amount = None;
            }
            CommissionUpdate::Defer => {
                info!(
                    order_no = %order.order_no,
                    sales_code = %order.sales_code,
                    "commission deferred: rate not configured"
                );
            }
            CommissionUpdate::Keep => {}
        }

        // The version token must move even within one millisecond.
        order.updated_at = TimeMs::new(now.as_ms().max(order.updated_at.as_ms() + 1));
        Ok(order)
    }

    /// Scheduled/triggered sweep advancing settled orders through their
    /// temporal states. Not reachable via `transition_order`.
    pub async fn run_expiry_sweep(&self) -> Result<(u64, u64), OrderServiceError> {
        let (activated, expired) = self.repo.expiry_sweep(TimeMs::now()).await?;
        if activated > 0 || expired > 0 {
            info!(activated, expired, "expiry sweep applied");
        }
        Ok((activated, expired))
    }

    pub async fn get_order(&self, id: Uuid) -> Result<Order, OrderServiceError> {
        self.repo
            .get_order(id)
            .await?
            .ok_or(OrderServiceError::OrderNotFound(id))
    }
}
