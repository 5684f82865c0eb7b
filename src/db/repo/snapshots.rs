//! Stats snapshot cache rows.
//!
//! A snapshot row is replaced atomically inside one transaction; a recompute
//! that fails before commit leaves the previous snapshot untouched, so
//! readers never observe a torn aggregate.

use sqlx::Row;

use crate::domain::TimeMs;
use crate::stats::{Period, Scope, SnapshotBody, StatsSnapshot};

use super::Repository;

fn body_codec_err(detail: impl std::fmt::Display) -> sqlx::Error {
    sqlx::Error::ColumnDecode {
        index: "body".to_string(),
        source: format!("{}", detail).into(),
    }
}

impl Repository {
    pub async fn get_snapshot(
        &self,
        scope: &Scope,
        period: Period,
    ) -> Result<Option<StatsSnapshot>, sqlx::Error> {
        let (scope_kind, scope_key) = scope.storage_key();
        let row = sqlx::query(
            r#"
            SELECT body, data_version, last_calculated_at
            FROM stats_snapshots
            WHERE scope_kind = ? AND scope_key = ? AND period = ?
            "#,
        )
        .bind(scope_kind)
        .bind(scope_key)
        .bind(period.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| {
            let body: String = row.try_get("body")?;
            let body: SnapshotBody = serde_json::from_str(&body).map_err(body_codec_err)?;
            Ok(StatsSnapshot {
                period,
                body,
                data_version: row.try_get("data_version")?,
                last_calculated_at: TimeMs::new(row.try_get("last_calculated_at")?),
            })
        })
        .transpose()
    }

    /// Persist a freshly computed snapshot body, bumping `data_version` from
    /// whatever the stored row carries. Last writer wins; recompute is
    /// deterministic so that is safe.
    pub async fn upsert_snapshot(
        &self,
        scope: &Scope,
        period: Period,
        body: &SnapshotBody,
        now: TimeMs,
    ) -> Result<StatsSnapshot, sqlx::Error> {
        let (scope_kind, scope_key) = scope.storage_key();
        let body_json = serde_json::to_string(body).map_err(body_codec_err)?;

        let mut tx = self.pool.begin().await?;

        let current_version: i64 = sqlx::query(
            r#"
            SELECT data_version FROM stats_snapshots
            WHERE scope_kind = ? AND scope_key = ? AND period = ?
            "#,
        )
        .bind(scope_kind)
        .bind(scope_key)
        .bind(period.as_str())
        .fetch_optional(&mut *tx)
        .await?
        .map(|row| row.try_get("data_version"))
        .transpose()?
        .unwrap_or(0);

        let data_version = current_version + 1;
        sqlx::query(
            r#"
            INSERT INTO stats_snapshots (
                scope_kind, scope_key, period, body, data_version, last_calculated_at
            ) VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(scope_kind, scope_key, period) DO UPDATE SET
                body = excluded.body,
                data_version = excluded.data_version,
                last_calculated_at = excluded.last_calculated_at
            "#,
        )
        .bind(scope_kind)
        .bind(scope_key)
        .bind(period.as_str())
        .bind(&body_json)
        .bind(data_version)
        .bind(now.as_ms())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(StatsSnapshot {
            period,
            body: body.clone(),
            data_version,
            last_calculated_at: now,
        })
    }
}
