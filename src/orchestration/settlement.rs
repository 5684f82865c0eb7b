//! Settlement and account administration use-cases.
//!
//! The settlement/reconciliation view always bypasses the exclusion filter:
//! an account excluded from aggregate statistics still sees its own numbers
//! unchanged.

use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use crate::config::Config;
use crate::db::Repository;
use crate::domain::{
    AccountKind, Amount, ExclusionEntry, Order, SalesAccount, SalesCode, TimeMs,
};
use crate::engine::{
    plan_commission_update, AccountCommission, CommissionCalculator, CommissionUpdate,
    HierarchyIndex, ResolvedKind,
};
use crate::error::DomainError;

#[derive(Debug, Error)]
pub enum SettlementError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Db(#[from] sqlx::Error),
    #[error("csv export failed: {0}")]
    Csv(String),
}

/// Exclusion-bypassing reconciliation view for one account.
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountSettlement {
    pub account: SalesAccount,
    pub kind: ResolvedKind,
    pub orders: Vec<Order>,
    #[serde(flatten)]
    pub commission: AccountCommission,
}

#[derive(Debug, Clone)]
pub struct RegisterAccountInput {
    pub sales_code: SalesCode,
    pub name: String,
    pub kind: AccountKind,
    pub parent_sales_code: Option<SalesCode>,
    pub commission_rate: Option<Amount>,
}

#[derive(Clone)]
pub struct SettlementService {
    repo: Arc<Repository>,
    config: Config,
}

impl SettlementService {
    pub fn new(repo: Arc<Repository>, config: Config) -> Self {
        Self { repo, config }
    }

    /// Full settlement view: the account, its own orders, and commission
    /// totals including any team share earned on subordinates.
    pub async fn account_settlement(
        &self,
        sales_code: &SalesCode,
    ) -> Result<AccountSettlement, SettlementError> {
        let accounts = self.repo.list_accounts().await?;
        let index = HierarchyIndex::build(&accounts);
        let resolved = index.resolve(sales_code)?.clone();

        let account = accounts
            .iter()
            .find(|a| &a.sales_code == sales_code)
            .cloned()
            .ok_or_else(|| DomainError::UnknownSalesCode(sales_code.clone()))?;

        // Team share needs subordinate revenue, so the basis map is built
        // over all orders; the exclusion filter plays no part here.
        let all_orders = self.repo.list_orders_for_aggregation(None, &[]).await?;
        let settled_basis = CommissionCalculator::settled_basis_by_account(&all_orders);
        let calculator =
            CommissionCalculator::new(&index, self.config.clamp_negative_team_share);
        let commission =
            calculator.account_commission(sales_code, &settled_basis, account.paid_commission)?;

        let orders = self.repo.list_orders_for_account(sales_code).await?;

        Ok(AccountSettlement {
            account,
            kind: resolved.kind,
            orders,
            commission,
        })
    }

    /// CSV rendering of the settlement view's order list, for operator
    /// reconciliation downloads.
    pub fn settlement_csv(settlement: &AccountSettlement) -> Result<String, SettlementError> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer
            .write_record([
                "order_no",
                "status",
                "duration",
                "amount",
                "actual_payment_amount",
                "commission_basis",
                "commission_rate_used",
                "commission_amount",
                "created_at",
            ])
            .map_err(|e| SettlementError::Csv(e.to_string()))?;
        for order in &settlement.orders {
            writer
                .write_record([
                    order.order_no.as_str().to_string(),
                    order.status.to_string(),
                    order.duration_code.to_string(),
                    order.amount.to_canonical_string(),
                    order
                        .actual_payment_amount
                        .map(|a| a.to_canonical_string())
                        .unwrap_or_default(),
                    order.commission_basis().to_canonical_string(),
                    order
                        .commission_rate_used
                        .map(|a| a.to_canonical_string())
                        .unwrap_or_default(),
                    order
                        .commission_amount
                        .map(|a| a.to_canonical_string())
                        .unwrap_or_default(),
                    order.created_at.as_ms().to_string(),
                ])
                .map_err(|e| SettlementError::Csv(e.to_string()))?;
        }
        let bytes = writer
            .into_inner()
            .map_err(|e| SettlementError::Csv(e.to_string()))?;
        String::from_utf8(bytes).map_err(|e| SettlementError::Csv(e.to_string()))
    }

    /// Register a sales account, validating parent linkage for secondaries.
    pub async fn register_account(
        &self,
        input: RegisterAccountInput,
    ) -> Result<SalesAccount, SettlementError> {
        if let Some(rate) = input.commission_rate {
            if !rate.is_valid_rate() {
                return Err(DomainError::InvalidRate(rate.to_canonical_string()).into());
            }
        }

        if self.repo.get_account(&input.sales_code).await?.is_some() {
            return Err(DomainError::DuplicateSalesCode(input.sales_code).into());
        }

        match (&input.kind, &input.parent_sales_code) {
            (AccountKind::Primary, Some(_)) => {
                return Err(DomainError::InvalidParent(
                    "primary accounts cannot have a parent".to_string(),
                )
                .into());
            }
            (AccountKind::Secondary, Some(parent)) => {
                let parent_account = self
                    .repo
                    .get_account(parent)
                    .await?
                    .filter(|a| a.active)
                    .ok_or_else(|| {
                        DomainError::InvalidParent(format!("unknown parent {}", parent))
                    })?;
                if parent_account.kind != AccountKind::Primary {
                    return Err(DomainError::InvalidParent(format!(
                        "{} is not a primary account",
                        parent
                    ))
                    .into());
                }
            }
            _ => {}
        }

        let account = SalesAccount::new(
            input.sales_code,
            input.name,
            input.kind,
            input.parent_sales_code,
            input.commission_rate,
            TimeMs::now(),
        );
        self.repo.insert_account(&account).await?;
        info!(sales_code = %account.sales_code, kind = account.kind.as_str(), "account registered");
        Ok(account)
    }

    /// Set or clear a commission rate. `None` clears to "not configured",
    /// which is distinct from `Some(0)` at every layer.
    pub async fn set_commission_rate(
        &self,
        sales_code: &SalesCode,
        rate: Option<Amount>,
    ) -> Result<(), SettlementError> {
        if let Some(rate) = rate {
            if !rate.is_valid_rate() {
                return Err(DomainError::InvalidRate(rate.to_canonical_string()).into());
            }
        }
        let found = self
            .repo
            .set_commission_rate(sales_code, rate, TimeMs::now())
            .await?;
        if !found {
            return Err(DomainError::UnknownSalesCode(sales_code.clone()).into());
        }
        match rate {
            Some(rate) => {
                info!(sales_code = %sales_code, rate = %rate, "commission rate set");
                self.backfill_deferred_commission(sales_code, rate).await?;
            }
            None => info!(sales_code = %sales_code, "commission rate cleared (unconfigured)"),
        }
        Ok(())
    }

    /// Reprice orders that settled while the account had no rate. Orders
    /// with a frozen record keep it; only deferred ones gain one.
    async fn backfill_deferred_commission(
        &self,
        sales_code: &SalesCode,
        rate: Amount,
    ) -> Result<(), SettlementError> {
        let mut backfilled = 0u64;
        for mut order in self.repo.list_orders_for_account(sales_code).await? {
            let CommissionUpdate::Set(record) = plan_commission_update(&order, Some(rate)) else {
                continue;
            };
            let expected = order.updated_at;
            order.commission_rate_used = Some(record.rate_used);
            order.commission_amount = Some(record.amount);
            // The version token must move even within one millisecond.
            order.updated_at = TimeMs::new(TimeMs::now().as_ms().max(expected.as_ms() + 1));
            if self.repo.update_order_versioned(&order, expected).await? {
                backfilled += 1;
            }
        }
        if backfilled > 0 {
            info!(sales_code = %sales_code, backfilled, "deferred commission backfilled");
        }
        Ok(())
    }

    /// Toggle aggregate exclusion. Reversible and audit-logged; mutates no
    /// order or account data.
    pub async fn set_exclusion(
        &self,
        sales_code: &SalesCode,
        active: bool,
        reason: String,
    ) -> Result<(), SettlementError> {
        if self.repo.get_account(sales_code).await?.is_none() {
            return Err(DomainError::UnknownSalesCode(sales_code.clone()).into());
        }
        let entry = ExclusionEntry {
            sales_code: sales_code.clone(),
            active,
            reason,
            updated_at: TimeMs::now(),
        };
        self.repo.upsert_exclusion(&entry).await?;
        info!(
            sales_code = %sales_code,
            active,
            reason = %entry.reason,
            "aggregate exclusion toggled"
        );
        Ok(())
    }
}
