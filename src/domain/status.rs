//! Order lifecycle statuses and the explicit transition table.
//!
//! The allowed-successor table is the only place transition legality is
//! defined. Administrative transitions go through [`OrderStatus::can_transition_to`];
//! the time-driven `ConfirmedConfig -> Active -> Expired` progression belongs
//! to the expiry sweep and is deliberately absent from the table.

use serde::{Deserialize, Serialize};

/// Lifecycle status of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Created, waiting for the payment to be confirmed.
    PendingPayment,
    /// Payment confirmed, waiting for configuration.
    ConfirmedPayment,
    /// Waiting for the subscription configuration to be applied.
    PendingConfig,
    /// Configuration confirmed; the order is settled.
    ConfirmedConfig,
    /// Settled and currently within its validity period.
    Active,
    /// Settled and past its validity period.
    Expired,
    Rejected,
    Cancelled,
    Refunded,
}

impl OrderStatus {
    /// Administrative successor set for this status.
    ///
    /// Branch terminals (rejected/cancelled/refunded) are reachable from
    /// every non-terminal state. Terminal statuses have no successors.
    pub fn successors(&self) -> &'static [OrderStatus] {
        use OrderStatus::*;
        match self {
            PendingPayment => &[ConfirmedPayment, Rejected, Cancelled, Refunded],
            ConfirmedPayment => &[PendingConfig, Rejected, Cancelled, Refunded],
            PendingConfig => &[ConfirmedConfig, Rejected, Cancelled, Refunded],
            ConfirmedConfig | Active | Expired | Rejected | Cancelled | Refunded => &[],
        }
    }

    pub fn can_transition_to(&self, target: OrderStatus) -> bool {
        self.successors().contains(&target)
    }

    /// Terminal for administrative transitions (immutable afterwards).
    pub fn is_terminal(&self) -> bool {
        self.successors().is_empty()
    }

    /// Settled statuses are the only ones contributing to commission and
    /// statistics. `Active`/`Expired` are temporal refinements of a settled
    /// order, so they stay in the settled set.
    pub fn is_settled(&self) -> bool {
        matches!(
            self,
            OrderStatus::ConfirmedConfig | OrderStatus::Active | OrderStatus::Expired
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::PendingPayment => "pending_payment",
            OrderStatus::ConfirmedPayment => "confirmed_payment",
            OrderStatus::PendingConfig => "pending_config",
            OrderStatus::ConfirmedConfig => "confirmed_config",
            OrderStatus::Active => "active",
            OrderStatus::Expired => "expired",
            OrderStatus::Rejected => "rejected",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::Refunded => "refunded",
        }
    }

    pub fn parse(s: &str) -> Option<OrderStatus> {
        Some(match s {
            "pending_payment" => OrderStatus::PendingPayment,
            "confirmed_payment" => OrderStatus::ConfirmedPayment,
            "pending_config" => OrderStatus::PendingConfig,
            "confirmed_config" => OrderStatus::ConfirmedConfig,
            "active" => OrderStatus::Active,
            "expired" => OrderStatus::Expired,
            "rejected" => OrderStatus::Rejected,
            "cancelled" => OrderStatus::Cancelled,
            "refunded" => OrderStatus::Refunded,
            _ => return None,
        })
    }

    /// All statuses, in reporting order.
    pub fn all() -> [OrderStatus; 9] {
        [
            OrderStatus::PendingPayment,
            OrderStatus::ConfirmedPayment,
            OrderStatus::PendingConfig,
            OrderStatus::ConfirmedConfig,
            OrderStatus::Active,
            OrderStatus::Expired,
            OrderStatus::Rejected,
            OrderStatus::Cancelled,
            OrderStatus::Refunded,
        ]
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
