//! Order persistence: CRUD, versioned updates, trial lookup, expiry sweep.

use sqlx::Row;
use uuid::Uuid;

use crate::domain::{Order, OrderStatus, SalesCode, TimeMs};

use super::{order_from_row, Repository};

impl Repository {
    /// Insert a freshly created order.
    ///
    /// # Errors
    /// Returns an error if the insert fails (including an order_no collision).
    pub async fn insert_order(&self, order: &Order) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO orders (
                id, order_no, sales_code, duration_code, amount,
                actual_payment_amount, status, tradingview_username,
                created_at, payment_confirmed_at, config_confirmed_at,
                effective_at, expires_at, updated_at,
                commission_rate_used, commission_amount
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(order.id.to_string())
        .bind(order.order_no.as_str())
        .bind(order.sales_code.as_str())
        .bind(order.duration_code.as_str())
        .bind(order.amount.to_canonical_string())
        .bind(order.actual_payment_amount.map(|a| a.to_canonical_string()))
        .bind(order.status.as_str())
        .bind(order.tradingview_username.as_str())
        .bind(order.created_at.as_ms())
        .bind(order.payment_confirmed_at.map(|t| t.as_ms()))
        .bind(order.config_confirmed_at.map(|t| t.as_ms()))
        .bind(order.effective_at.map(|t| t.as_ms()))
        .bind(order.expires_at.map(|t| t.as_ms()))
        .bind(order.updated_at.as_ms())
        .bind(order.commission_rate_used.map(|a| a.to_canonical_string()))
        .bind(order.commission_amount.map(|a| a.to_canonical_string()))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_order(&self, id: Uuid) -> Result<Option<Order>, sqlx::Error> {
        let row = sqlx::query("SELECT * FROM orders WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(order_from_row).transpose()
    }

    /// Write back a mutated order, guarded by optimistic versioning on
    /// `updated_at`. Returns false when the row moved under us; the caller
    /// re-reads and retries.
    pub async fn update_order_versioned(
        &self,
        order: &Order,
        expected_updated_at: TimeMs,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE orders SET
                status = ?,
                payment_confirmed_at = ?,
                config_confirmed_at = ?,
                effective_at = ?,
                expires_at = ?,
                updated_at = ?,
                commission_rate_used = ?,
                commission_amount = ?
            WHERE id = ? AND updated_at = ?
            "#,
        )
        .bind(order.status.as_str())
        .bind(order.payment_confirmed_at.map(|t| t.as_ms()))
        .bind(order.config_confirmed_at.map(|t| t.as_ms()))
        .bind(order.effective_at.map(|t| t.as_ms()))
        .bind(order.expires_at.map(|t| t.as_ms()))
        .bind(order.updated_at.as_ms())
        .bind(order.commission_rate_used.map(|a| a.to_canonical_string()))
        .bind(order.commission_amount.map(|a| a.to_canonical_string()))
        .bind(order.id.to_string())
        .bind(expected_updated_at.as_ms())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Earliest prior trial-duration order for a subscriber, ignoring
    /// cancelled ones. Feeds the duplicate-free-trial guard.
    pub async fn find_trial_order(
        &self,
        tradingview_username: &str,
    ) -> Result<Option<Order>, sqlx::Error> {
        let row = sqlx::query(
            r#"
            SELECT * FROM orders
            WHERE tradingview_username = ?
              AND duration_code = 'trial_7d'
              AND status != 'cancelled'
            ORDER BY created_at ASC
            LIMIT 1
            "#,
        )
        .bind(tradingview_username)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(order_from_row).transpose()
    }

    /// All orders owned by one sales account, oldest first. This is the
    /// settlement/reconciliation source and deliberately ignores exclusions.
    pub async fn list_orders_for_account(
        &self,
        sales_code: &SalesCode,
    ) -> Result<Vec<Order>, sqlx::Error> {
        let rows = sqlx::query(
            "SELECT * FROM orders WHERE sales_code = ? ORDER BY created_at ASC, id ASC",
        )
        .bind(sales_code.as_str())
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(order_from_row).collect()
    }

    /// Aggregation source query: orders created at/after `from`, minus those
    /// owned by excluded accounts. This is the only query that applies the
    /// exclusion filter.
    pub async fn list_orders_for_aggregation(
        &self,
        from: Option<TimeMs>,
        excluded: &[SalesCode],
    ) -> Result<Vec<Order>, sqlx::Error> {
        let mut sql = String::from("SELECT * FROM orders WHERE created_at >= ?");
        if !excluded.is_empty() {
            let placeholders = vec!["?"; excluded.len()].join(", ");
            sql.push_str(&format!(" AND sales_code NOT IN ({})", placeholders));
        }
        sql.push_str(" ORDER BY created_at ASC, id ASC");

        let mut query = sqlx::query(&sql).bind(from.map(|t| t.as_ms()).unwrap_or(i64::MIN));
        for code in excluded {
            query = query.bind(code.as_str());
        }
        let rows = query.fetch_all(&self.pool).await?;
        rows.iter().map(order_from_row).collect()
    }

    /// Time-driven progression of settled orders: ConfirmedConfig becomes
    /// Active once effective, Active (or a not-yet-activated ConfirmedConfig)
    /// becomes Expired once past expiry. Returns (activated, expired).
    pub async fn expiry_sweep(&self, now: TimeMs) -> Result<(u64, u64), sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let expired = sqlx::query(
            r#"
            UPDATE orders SET status = ?, updated_at = ?
            WHERE status IN (?, ?)
              AND expires_at IS NOT NULL AND expires_at <= ?
            "#,
        )
        .bind(OrderStatus::Expired.as_str())
        .bind(now.as_ms())
        .bind(OrderStatus::ConfirmedConfig.as_str())
        .bind(OrderStatus::Active.as_str())
        .bind(now.as_ms())
        .execute(&mut *tx)
        .await?
        .rows_affected();

        let activated = sqlx::query(
            r#"
            UPDATE orders SET status = ?, updated_at = ?
            WHERE status = ?
              AND effective_at IS NOT NULL AND effective_at <= ?
              AND (expires_at IS NULL OR expires_at > ?)
            "#,
        )
        .bind(OrderStatus::Active.as_str())
        .bind(now.as_ms())
        .bind(OrderStatus::ConfirmedConfig.as_str())
        .bind(now.as_ms())
        .bind(now.as_ms())
        .execute(&mut *tx)
        .await?
        .rows_affected();

        tx.commit().await?;
        Ok((activated, expired))
    }

    /// Order count, primarily for tests and health reporting.
    pub async fn count_orders(&self) -> Result<i64, sqlx::Error> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM orders")
            .fetch_one(&self.pool)
            .await?;
        row.try_get("n")
    }
}
