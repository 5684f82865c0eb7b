//! Repository layer for database operations.
//!
//! Methods are organized across submodules by domain:
//! - `orders.rs` - order CRUD, transitions, the expiry sweep
//! - `accounts.rs` - sales accounts and exclusion entries
//! - `snapshots.rs` - stats snapshot cache rows
//!
//! Amounts and rates are stored as canonical decimal TEXT so a present-but-
//! zero value never collapses into SQL NULL; `Option` fields map to nullable
//! columns one-to-one.

mod accounts;
mod orders;
mod snapshots;

use sqlx::sqlite::{SqlitePool, SqliteRow};
use sqlx::Row;
use uuid::Uuid;

use crate::domain::{
    AccountKind, Amount, DurationCode, Order, OrderNo, OrderStatus, SalesAccount, SalesCode,
    TimeMs,
};

/// Repository for database operations.
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Repository { pool }
    }
}

fn decode_err(column: &str, detail: impl std::fmt::Display) -> sqlx::Error {
    sqlx::Error::ColumnDecode {
        index: column.to_string(),
        source: format!("{}", detail).into(),
    }
}

pub(crate) fn parse_amount(column: &str, raw: &str) -> Result<Amount, sqlx::Error> {
    Amount::from_str_canonical(raw).map_err(|e| decode_err(column, e))
}

pub(crate) fn parse_opt_amount(
    column: &str,
    raw: Option<String>,
) -> Result<Option<Amount>, sqlx::Error> {
    raw.map(|s| parse_amount(column, &s)).transpose()
}

/// Map an `orders` row to the domain type.
pub(crate) fn order_from_row(row: &SqliteRow) -> Result<Order, sqlx::Error> {
    let id: String = row.try_get("id")?;
    let id = Uuid::parse_str(&id).map_err(|e| decode_err("id", e))?;

    let status: String = row.try_get("status")?;
    let status =
        OrderStatus::parse(&status).ok_or_else(|| decode_err("status", "unknown status"))?;

    let duration_code: String = row.try_get("duration_code")?;

    Ok(Order {
        id,
        order_no: OrderNo::new(row.try_get::<String, _>("order_no")?),
        sales_code: SalesCode::new(row.try_get::<String, _>("sales_code")?),
        // Stored labels are canonical; anything else degrades to Unknown so
        // malformed historical rows stay visible instead of failing reads.
        duration_code: DurationCode::from_code(&duration_code),
        amount: parse_amount("amount", &row.try_get::<String, _>("amount")?)?,
        actual_payment_amount: parse_opt_amount(
            "actual_payment_amount",
            row.try_get("actual_payment_amount")?,
        )?,
        status,
        tradingview_username: row.try_get("tradingview_username")?,
        created_at: TimeMs::new(row.try_get("created_at")?),
        payment_confirmed_at: row
            .try_get::<Option<i64>, _>("payment_confirmed_at")?
            .map(TimeMs::new),
        config_confirmed_at: row
            .try_get::<Option<i64>, _>("config_confirmed_at")?
            .map(TimeMs::new),
        effective_at: row.try_get::<Option<i64>, _>("effective_at")?.map(TimeMs::new),
        expires_at: row.try_get::<Option<i64>, _>("expires_at")?.map(TimeMs::new),
        updated_at: TimeMs::new(row.try_get("updated_at")?),
        commission_rate_used: parse_opt_amount(
            "commission_rate_used",
            row.try_get("commission_rate_used")?,
        )?,
        commission_amount: parse_opt_amount(
            "commission_amount",
            row.try_get("commission_amount")?,
        )?,
    })
}

/// Map a `sales_accounts` row to the domain type.
pub(crate) fn account_from_row(row: &SqliteRow) -> Result<SalesAccount, sqlx::Error> {
    let kind: String = row.try_get("kind")?;
    let kind =
        AccountKind::parse(&kind).ok_or_else(|| decode_err("kind", "unknown account kind"))?;

    Ok(SalesAccount {
        sales_code: SalesCode::new(row.try_get::<String, _>("sales_code")?),
        name: row.try_get("name")?,
        kind,
        parent_sales_code: row
            .try_get::<Option<String>, _>("parent_sales_code")?
            .map(SalesCode::new),
        commission_rate: parse_opt_amount("commission_rate", row.try_get("commission_rate")?)?,
        paid_commission: parse_amount(
            "paid_commission",
            &row.try_get::<String, _>("paid_commission")?,
        )?,
        active: row.try_get::<i64, _>("active")? != 0,
        created_at: TimeMs::new(row.try_get("created_at")?),
        updated_at: TimeMs::new(row.try_get("updated_at")?),
    })
}
