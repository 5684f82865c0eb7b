//! Sales accounts and aggregate-exclusion entries.

use serde::{Deserialize, Serialize};

use crate::domain::{Amount, SalesCode, TimeMs};

/// Stored shape of a sales account. A `Secondary` without a parent operates
/// independently (no team share in either direction); the hierarchy resolver
/// reports that case as its own kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountKind {
    Primary,
    Secondary,
}

impl AccountKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountKind::Primary => "primary",
            AccountKind::Secondary => "secondary",
        }
    }

    pub fn parse(s: &str) -> Option<AccountKind> {
        match s {
            "primary" => Some(AccountKind::Primary),
            "secondary" => Some(AccountKind::Secondary),
            _ => None,
        }
    }
}

/// A referral sales account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SalesAccount {
    pub sales_code: SalesCode,
    pub name: String,
    pub kind: AccountKind,
    /// Secondary accounts may link to an owning Primary. Always `None` for
    /// Primary accounts.
    pub parent_sales_code: Option<SalesCode>,
    /// `None` means "not configured" and defers commission computation;
    /// `Some(0)` means "configured to pay nothing".
    pub commission_rate: Option<Amount>,
    /// Running total of payouts already made, maintained administratively.
    pub paid_commission: Amount,
    /// Accounts are deactivated, never deleted.
    pub active: bool,
    pub created_at: TimeMs,
    pub updated_at: TimeMs,
}

impl SalesAccount {
    pub fn new(
        sales_code: SalesCode,
        name: String,
        kind: AccountKind,
        parent_sales_code: Option<SalesCode>,
        commission_rate: Option<Amount>,
        now: TimeMs,
    ) -> Self {
        SalesAccount {
            sales_code,
            name,
            kind,
            parent_sales_code,
            commission_rate,
            paid_commission: Amount::zero(),
            active: true,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Marks a sales account for omission from aggregate statistics. Only the
/// aggregator consults these; settlement views never do.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExclusionEntry {
    pub sales_code: SalesCode,
    pub active: bool,
    pub reason: String,
    pub updated_at: TimeMs,
}
