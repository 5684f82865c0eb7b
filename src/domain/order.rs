//! Order type: a purchase of a subscription period by one sales account.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{Amount, DurationCode, OrderNo, OrderStatus, SalesCode, TimeMs};

/// A purchase of a subscription period, owned by exactly one sales account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: Uuid,
    pub order_no: OrderNo,
    pub sales_code: SalesCode,
    pub duration_code: DurationCode,
    /// Nominal subscription price.
    pub amount: Amount,
    /// Amount actually collected, when recorded. `Some(0)` is a real value
    /// (fully discounted), distinct from `None` (not recorded).
    pub actual_payment_amount: Option<Amount>,
    pub status: OrderStatus,
    /// Subscriber identity used by the free-trial guard.
    pub tradingview_username: String,
    pub created_at: TimeMs,
    pub payment_confirmed_at: Option<TimeMs>,
    pub config_confirmed_at: Option<TimeMs>,
    pub effective_at: Option<TimeMs>,
    pub expires_at: Option<TimeMs>,
    /// Bumped on every write; the optimistic-versioning token.
    pub updated_at: TimeMs,
    /// Rate in force when the commission record was computed.
    pub commission_rate_used: Option<Amount>,
    /// Commission computed at settlement; `None` until settled or while the
    /// account's rate is unconfigured.
    pub commission_amount: Option<Amount>,
}

impl Order {
    /// Create a fresh order. Zero-basis (free trial) orders skip the payment
    /// stage and start in `PendingConfig`.
    pub fn new(
        sales_code: SalesCode,
        duration_code: DurationCode,
        amount: Amount,
        actual_payment_amount: Option<Amount>,
        tradingview_username: String,
        now: TimeMs,
    ) -> Self {
        let basis_is_zero =
            actual_payment_amount.unwrap_or(amount).is_zero();
        let status = if basis_is_zero {
            OrderStatus::PendingConfig
        } else {
            OrderStatus::PendingPayment
        };
        Order {
            id: Uuid::new_v4(),
            order_no: OrderNo::generate(now),
            sales_code,
            duration_code,
            amount,
            actual_payment_amount,
            status,
            tradingview_username,
            created_at: now,
            payment_confirmed_at: None,
            config_confirmed_at: None,
            effective_at: None,
            expires_at: None,
            updated_at: now,
            commission_rate_used: None,
            commission_amount: None,
        }
    }

    /// Revenue base for commission: the recorded actual payment wins when
    /// present (including a recorded zero); only an unrecorded actual falls
    /// back to the nominal amount.
    pub fn commission_basis(&self) -> Amount {
        self.actual_payment_amount.unwrap_or(self.amount)
    }

    pub fn is_settled(&self) -> bool {
        self.status.is_settled()
    }
}
