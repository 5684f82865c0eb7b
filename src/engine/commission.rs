//! Commission computation: per-order records and per-account totals.
//!
//! Per-order records are recomputed idempotently from current data until the
//! order settles, then frozen. Account totals are always derived fresh from
//! settled orders and current rates, so a rate edit before settlement is
//! reflected and stale values cannot survive a status change.

use std::collections::HashMap;

use crate::domain::{Amount, Order, SalesCode};
use crate::engine::hierarchy::{HierarchyIndex, ResolvedKind};
use crate::error::DomainError;

/// Commission fields persisted on an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommissionRecord {
    pub rate_used: Amount,
    pub amount: Amount,
}

/// What a recompute should do to an order's commission record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommissionUpdate {
    /// Settled with a record already frozen; leave it alone.
    Keep,
    /// Settled, rate available: write this record.
    Set(CommissionRecord),
    /// Settled but the account rate is unconfigured; computation deferred.
    Defer,
    /// Not settled: any stored record is stale and must be cleared.
    Clear,
}

/// Decide the commission record an order should carry given the account's
/// current rate.
pub fn plan_commission_update(order: &Order, rate: Option<Amount>) -> CommissionUpdate {
    if !order.is_settled() {
        // Rejected/cancelled/refunded/pending orders contribute zero no
        // matter what an earlier computation stored on them.
        return CommissionUpdate::Clear;
    }
    if order.commission_amount.is_some() {
        return CommissionUpdate::Keep;
    }
    match rate {
        Some(rate) => CommissionUpdate::Set(CommissionRecord {
            rate_used: rate,
            amount: order.commission_basis() * rate,
        }),
        None => CommissionUpdate::Defer,
    }
}

/// Per-account commission summary.
///
/// All commission fields are `None` while the account's rate is unconfigured:
/// deferred, never a silent zero.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountCommission {
    pub rate: Option<Amount>,
    pub direct_commission: Option<Amount>,
    pub team_share_commission: Option<Amount>,
    pub total_commission: Option<Amount>,
    pub paid_commission: Amount,
    /// May be negative: an overpaid account is a valid, reportable state.
    pub pending_commission: Option<Amount>,
    /// Subordinates skipped from the team share because their own rate is
    /// unconfigured.
    pub deferred_subordinates: Vec<SalesCode>,
}

/// Computes account-level commission from settled revenue and the hierarchy.
pub struct CommissionCalculator<'a> {
    index: &'a HierarchyIndex,
    clamp_negative_team_share: bool,
}

impl<'a> CommissionCalculator<'a> {
    pub fn new(index: &'a HierarchyIndex, clamp_negative_team_share: bool) -> Self {
        Self {
            index,
            clamp_negative_team_share,
        }
    }

    /// Sum settled commission bases per owning account.
    pub fn settled_basis_by_account(orders: &[Order]) -> HashMap<SalesCode, Amount> {
        let mut basis: HashMap<SalesCode, Amount> = HashMap::new();
        for order in orders.iter().filter(|o| o.is_settled()) {
            let entry = basis.entry(order.sales_code.clone()).or_insert_with(Amount::zero);
            *entry = *entry + order.commission_basis();
        }
        basis
    }

    /// Full commission summary for one account.
    ///
    /// `settled_basis` maps each account to its settled revenue base;
    /// accounts absent from the map simply have no settled orders.
    ///
    /// # Errors
    /// `UnknownSalesCode` when the code does not resolve.
    pub fn account_commission(
        &self,
        sales_code: &SalesCode,
        settled_basis: &HashMap<SalesCode, Amount>,
        paid_commission: Amount,
    ) -> Result<AccountCommission, DomainError> {
        let resolved = self.index.resolve(sales_code)?;
        let own_basis = settled_basis
            .get(sales_code)
            .copied()
            .unwrap_or_else(Amount::zero);

        let Some(rate) = resolved.rate else {
            return Ok(AccountCommission {
                rate: None,
                direct_commission: None,
                team_share_commission: None,
                total_commission: None,
                paid_commission,
                pending_commission: None,
                deferred_subordinates: Vec::new(),
            });
        };

        let direct = own_basis * rate;

        let mut team_share = Amount::zero();
        let mut deferred = Vec::new();
        if resolved.kind == ResolvedKind::Primary {
            for sub_code in self.index.subordinates(sales_code) {
                let sub = self.index.resolve(sub_code)?;
                let Some(sub_rate) = sub.rate else {
                    deferred.push(sub_code.clone());
                    continue;
                };
                let sub_basis = settled_basis
                    .get(sub_code)
                    .copied()
                    .unwrap_or_else(Amount::zero);
                // The parent earns the spread between its own rate and the
                // rate conceded to the secondary.
                let mut spread = sub_basis * rate - sub_basis * sub_rate;
                if self.clamp_negative_team_share && spread.is_negative() {
                    spread = Amount::zero();
                }
                team_share = team_share + spread;
            }
        }

        let total = direct + team_share;
        Ok(AccountCommission {
            rate: Some(rate),
            direct_commission: Some(direct),
            team_share_commission: Some(team_share),
            total_commission: Some(total),
            paid_commission,
            pending_commission: Some(total - paid_commission),
            deferred_subordinates: deferred,
        })
    }
}
