//! Pre-indexed resolver for the two-level sales hierarchy.
//!
//! Built once per computation pass from the active account set, then queried
//! O(1) for every order the commission calculator and aggregator touch.
//! Resolution is side-effect free.

use std::collections::HashMap;

use crate::domain::{AccountKind, Amount, SalesAccount, SalesCode};
use crate::error::DomainError;

/// Effective role of an account once parent linkage is taken into account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolvedKind {
    Primary,
    /// Secondary linked to a Primary; feeds its parent's team-share pool.
    Secondary,
    /// Secondary-shaped account with no parent; behaves like a Primary for
    /// its own orders and produces no team share.
    Independent,
}

/// Resolution result for one sales code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    pub kind: ResolvedKind,
    pub parent: Option<SalesCode>,
    pub rate: Option<Amount>,
}

/// O(1) lookup index over active sales accounts.
#[derive(Debug, Default)]
pub struct HierarchyIndex {
    accounts: HashMap<SalesCode, Resolved>,
    children: HashMap<SalesCode, Vec<SalesCode>>,
}

impl HierarchyIndex {
    /// Build the index from an account snapshot. Inactive accounts are left
    /// out entirely, so resolving them fails the same way as a missing code.
    pub fn build(accounts: &[SalesAccount]) -> Self {
        let mut index = HierarchyIndex::default();
        for account in accounts.iter().filter(|a| a.active) {
            let (kind, parent) = match (account.kind, &account.parent_sales_code) {
                (AccountKind::Primary, _) => (ResolvedKind::Primary, None),
                (AccountKind::Secondary, Some(parent)) => {
                    (ResolvedKind::Secondary, Some(parent.clone()))
                }
                (AccountKind::Secondary, None) => (ResolvedKind::Independent, None),
            };
            if let Some(parent) = &parent {
                index
                    .children
                    .entry(parent.clone())
                    .or_default()
                    .push(account.sales_code.clone());
            }
            index.accounts.insert(
                account.sales_code.clone(),
                Resolved {
                    kind,
                    parent,
                    rate: account.commission_rate,
                },
            );
        }
        // Deterministic subordinate order regardless of input order.
        for subs in index.children.values_mut() {
            subs.sort();
        }
        index
    }

    /// Resolve a sales code to its effective role, parent and rate.
    ///
    /// # Errors
    /// `UnknownSalesCode` when no active account carries the code.
    pub fn resolve(&self, sales_code: &SalesCode) -> Result<&Resolved, DomainError> {
        self.accounts
            .get(sales_code)
            .ok_or_else(|| DomainError::UnknownSalesCode(sales_code.clone()))
    }

    /// Active subordinate secondaries of a primary, sorted by code.
    pub fn subordinates(&self, sales_code: &SalesCode) -> &[SalesCode] {
        self.children
            .get(sales_code)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// All indexed codes, sorted, for deterministic aggregation sweeps.
    pub fn codes(&self) -> Vec<SalesCode> {
        let mut codes: Vec<SalesCode> = self.accounts.keys().cloned().collect();
        codes.sort();
        codes
    }
}
