//! Snapshot aggregator: deterministic recompute plus an explicit-staleness
//! cache read path.
//!
//! Concurrency: recomputes for one `(scope, period)` key collapse onto a
//! per-key async mutex; last writer wins on `data_version`, which is safe
//! because recompute is deterministic and idempotent. A failed recompute
//! never replaces the stored snapshot.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use backoff::ExponentialBackoffBuilder;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::db::Repository;
use crate::domain::{Amount, SalesCode, TimeMs};
use crate::engine::{CommissionCalculator, HierarchyIndex};
use crate::stats::{Period, Scope, SnapshotBody, StatsSnapshot};

pub struct Aggregator {
    repo: Arc<Repository>,
    config: Config,
    inflight: Mutex<HashMap<(Scope, Period), Arc<Mutex<()>>>>,
}

impl Aggregator {
    pub fn new(repo: Arc<Repository>, config: Config) -> Self {
        Self {
            repo,
            config,
            inflight: Mutex::new(HashMap::new()),
        }
    }

    /// Cached read with an explicit consistency/latency tradeoff.
    ///
    /// Serves the stored snapshot when its age is within `max_staleness_ms`
    /// (falling back to the configured default), otherwise recomputes
    /// synchronously. If the recompute fails and a prior snapshot exists,
    /// that snapshot is served and the event logged; with no prior snapshot
    /// the failure propagates.
    pub async fn get(
        &self,
        scope: &Scope,
        period: Period,
        max_staleness_ms: Option<i64>,
    ) -> Result<StatsSnapshot, sqlx::Error> {
        let max_staleness = max_staleness_ms.unwrap_or(self.config.default_max_staleness_ms);

        if let Some(snapshot) = self.repo.get_snapshot(scope, period).await? {
            if snapshot.is_fresh(TimeMs::now(), max_staleness) {
                return Ok(snapshot);
            }
        }

        let key_lock = self.lock_for(scope, period).await;
        let _guard = key_lock.lock().await;

        // Another request may have finished the recompute while we waited.
        if let Some(snapshot) = self.repo.get_snapshot(scope, period).await? {
            if snapshot.is_fresh(TimeMs::now(), max_staleness) {
                return Ok(snapshot);
            }
        }

        match self.recompute_with_retry(scope, period).await {
            Ok(snapshot) => Ok(snapshot),
            Err(err) => match self.repo.get_snapshot(scope, period).await? {
                Some(stale) => {
                    warn!(
                        period = %period,
                        age_ms = stale.age_at(TimeMs::now()),
                        error = %err,
                        "stale snapshot served: recompute failed"
                    );
                    Ok(stale)
                }
                None => Err(err),
            },
        }
    }

    /// Recompute and persist the snapshot for a key, collapsing concurrent
    /// callers to a single in-flight computation.
    pub async fn recompute(
        &self,
        scope: &Scope,
        period: Period,
    ) -> Result<StatsSnapshot, sqlx::Error> {
        let key_lock = self.lock_for(scope, period).await;
        let _guard = key_lock.lock().await;
        self.recompute_inner(scope, period).await
    }

    async fn lock_for(&self, scope: &Scope, period: Period) -> Arc<Mutex<()>> {
        let mut inflight = self.inflight.lock().await;
        inflight
            .entry((scope.clone(), period))
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Transient persistence failures are retried with exponential backoff;
    /// the prior good snapshot keeps serving readers in the interim.
    async fn recompute_with_retry(
        &self,
        scope: &Scope,
        period: Period,
    ) -> Result<StatsSnapshot, sqlx::Error> {
        let policy = ExponentialBackoffBuilder::new()
            .with_initial_interval(Duration::from_millis(50))
            .with_max_elapsed_time(Some(Duration::from_secs(2)))
            .build();
        backoff::future::retry(policy, || async {
            self.recompute_inner(scope, period)
                .await
                .map_err(backoff::Error::transient)
        })
        .await
    }

    async fn recompute_inner(
        &self,
        scope: &Scope,
        period: Period,
    ) -> Result<StatsSnapshot, sqlx::Error> {
        let now = TimeMs::now();
        let body = self.compute_body(scope, period, now).await?;
        let snapshot = self.repo.upsert_snapshot(scope, period, &body, now).await?;
        info!(
            period = %period,
            data_version = snapshot.data_version,
            order_count = snapshot.body.order_count,
            "snapshot recomputed"
        );
        Ok(snapshot)
    }

    /// Deterministic pure function of (orders in period, hierarchy,
    /// exclusion set) as read at call time.
    async fn compute_body(
        &self,
        scope: &Scope,
        period: Period,
        now: TimeMs,
    ) -> Result<SnapshotBody, sqlx::Error> {
        let window_start = period.window_start(now);
        let accounts = self.repo.list_accounts().await?;
        let index = HierarchyIndex::build(&accounts);
        let calculator =
            CommissionCalculator::new(&index, self.config.clamp_negative_team_share);

        let paid_by_code: HashMap<SalesCode, Amount> = accounts
            .iter()
            .map(|a| (a.sales_code.clone(), a.paid_commission))
            .collect();

        let (orders, commission_codes, settled_basis) = match scope {
            Scope::Global => {
                // The exclusion filter applies here and nowhere else.
                let excluded = self.repo.list_active_exclusions().await?;
                let orders = self
                    .repo
                    .list_orders_for_aggregation(window_start, &excluded)
                    .await?;
                let excluded_set: HashSet<SalesCode> = excluded.into_iter().collect();
                let codes: Vec<SalesCode> = index
                    .codes()
                    .into_iter()
                    .filter(|code| !excluded_set.contains(code))
                    .collect();
                let basis = CommissionCalculator::settled_basis_by_account(&orders);
                (orders, codes, basis)
            }
            Scope::Account(code) => {
                // Buckets cover the account's own orders, but team share
                // depends on subordinate orders too, so the basis map is
                // built from the full unexcluded window.
                let all_orders = self
                    .repo
                    .list_orders_for_aggregation(window_start, &[])
                    .await?;
                let basis = CommissionCalculator::settled_basis_by_account(&all_orders);
                let mut orders = self.repo.list_orders_for_account(code).await?;
                if let Some(start) = window_start {
                    orders.retain(|o| o.created_at >= start);
                }
                (orders, vec![code.clone()], basis)
            }
        };

        let mut body = SnapshotBody::from_orders(&orders);
        let mut total = Amount::zero();
        let mut paid = Amount::zero();
        let mut pending = Amount::zero();
        for code in &commission_codes {
            let account_paid = paid_by_code.get(code).copied().unwrap_or_else(Amount::zero);
            let summary = match calculator.account_commission(code, &settled_basis, account_paid) {
                Ok(summary) => summary,
                // Account scope can name an unknown/inactive code; the order
                // buckets still stand, commission stays zero.
                Err(err) => {
                    debug!(code = %code, error = %err, "commission skipped in snapshot");
                    continue;
                }
            };
            // Accounts with an unconfigured rate are deferred, not zeroed:
            // they are left out of all three sums until a rate is set.
            let (Some(account_total), Some(account_pending)) =
                (summary.total_commission, summary.pending_commission)
            else {
                debug!(code = %code, "rate unconfigured, commission deferred from snapshot");
                continue;
            };
            total = total + account_total;
            paid = paid + summary.paid_commission;
            pending = pending + account_pending;
        }
        body.total_commission = total;
        body.paid_commission = paid;
        body.pending_commission = pending;

        Ok(body)
    }
}
