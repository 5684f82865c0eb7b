//! Sales account and exclusion-entry persistence.

use sqlx::Row;

use crate::domain::{Amount, ExclusionEntry, SalesAccount, SalesCode, TimeMs};

use super::{account_from_row, Repository};

impl Repository {
    pub async fn insert_account(&self, account: &SalesAccount) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO sales_accounts (
                sales_code, name, kind, parent_sales_code, commission_rate,
                paid_commission, active, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(account.sales_code.as_str())
        .bind(account.name.as_str())
        .bind(account.kind.as_str())
        .bind(account.parent_sales_code.as_ref().map(|c| c.as_str()))
        .bind(account.commission_rate.map(|r| r.to_canonical_string()))
        .bind(account.paid_commission.to_canonical_string())
        .bind(account.active as i64)
        .bind(account.created_at.as_ms())
        .bind(account.updated_at.as_ms())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_account(
        &self,
        sales_code: &SalesCode,
    ) -> Result<Option<SalesAccount>, sqlx::Error> {
        let row = sqlx::query("SELECT * FROM sales_accounts WHERE sales_code = ?")
            .bind(sales_code.as_str())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(account_from_row).transpose()
    }

    /// All accounts, active or not; the hierarchy index filters on activity.
    pub async fn list_accounts(&self) -> Result<Vec<SalesAccount>, sqlx::Error> {
        let rows = sqlx::query("SELECT * FROM sales_accounts ORDER BY sales_code ASC")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(account_from_row).collect()
    }

    /// Set or clear an account's commission rate. SQL NULL carries the
    /// "not configured" state; a zero rate is stored as the string '0'.
    /// Returns false when the account does not exist.
    pub async fn set_commission_rate(
        &self,
        sales_code: &SalesCode,
        rate: Option<Amount>,
        now: TimeMs,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE sales_accounts SET commission_rate = ?, updated_at = ? WHERE sales_code = ?",
        )
        .bind(rate.map(|r| r.to_canonical_string()))
        .bind(now.as_ms())
        .bind(sales_code.as_str())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Record an administrative payout total adjustment.
    pub async fn set_paid_commission(
        &self,
        sales_code: &SalesCode,
        paid: Amount,
        now: TimeMs,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE sales_accounts SET paid_commission = ?, updated_at = ? WHERE sales_code = ?",
        )
        .bind(paid.to_canonical_string())
        .bind(now.as_ms())
        .bind(sales_code.as_str())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Deactivate an account. Accounts are never deleted.
    pub async fn deactivate_account(
        &self,
        sales_code: &SalesCode,
        now: TimeMs,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE sales_accounts SET active = 0, updated_at = ? WHERE sales_code = ?",
        )
        .bind(now.as_ms())
        .bind(sales_code.as_str())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    // =========================================================================
    // Exclusion entries

    /// Toggle aggregate exclusion for an account. Fully reversible; touches
    /// no order or account rows.
    pub async fn upsert_exclusion(&self, entry: &ExclusionEntry) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO exclusion_entries (sales_code, active, reason, updated_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(sales_code) DO UPDATE SET
                active = excluded.active,
                reason = excluded.reason,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(entry.sales_code.as_str())
        .bind(entry.active as i64)
        .bind(entry.reason.as_str())
        .bind(entry.updated_at.as_ms())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_exclusion(
        &self,
        sales_code: &SalesCode,
    ) -> Result<Option<ExclusionEntry>, sqlx::Error> {
        let row = sqlx::query("SELECT * FROM exclusion_entries WHERE sales_code = ?")
            .bind(sales_code.as_str())
            .fetch_optional(&self.pool)
            .await?;
        row.map(|row| {
            Ok(ExclusionEntry {
                sales_code: SalesCode::new(row.try_get::<String, _>("sales_code")?),
                active: row.try_get::<i64, _>("active")? != 0,
                reason: row.try_get("reason")?,
                updated_at: TimeMs::new(row.try_get("updated_at")?),
            })
        })
        .transpose()
    }

    /// Codes currently excluded from aggregate statistics, sorted.
    pub async fn list_active_exclusions(&self) -> Result<Vec<SalesCode>, sqlx::Error> {
        let rows = sqlx::query(
            "SELECT sales_code FROM exclusion_entries WHERE active = 1 ORDER BY sales_code ASC",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.iter()
            .map(|row| Ok(SalesCode::new(row.try_get::<String, _>("sales_code")?)))
            .collect()
    }
}
