//! Snapshot statistics: scopes, periods and the cached aggregate shape.
//!
//! Snapshot bodies are pure functions of the source data; the envelope
//! (`data_version`, `last_calculated_at`) is the only part that moves between
//! recomputes over unchanged data.

pub mod aggregator;

pub use aggregator::Aggregator;

use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, Duration, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{Amount, DurationCode, Order, OrderStatus, SalesCode, TimeMs};

/// What a snapshot covers: everything, or one account's slice.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Scope {
    Global,
    Account(SalesCode),
}

impl Scope {
    /// (kind, key) pair used as part of the storage key.
    pub fn storage_key(&self) -> (&'static str, &str) {
        match self {
            Scope::Global => ("global", ""),
            Scope::Account(code) => ("account", code.as_str()),
        }
    }
}

/// Calendar window a snapshot aggregates over, in UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Period {
    All,
    Today,
    Week,
    Month,
    Year,
}

impl Period {
    pub fn as_str(&self) -> &'static str {
        match self {
            Period::All => "all",
            Period::Today => "today",
            Period::Week => "week",
            Period::Month => "month",
            Period::Year => "year",
        }
    }

    pub fn parse(s: &str) -> Option<Period> {
        Some(match s {
            "all" => Period::All,
            "today" => Period::Today,
            "week" => Period::Week,
            "month" => Period::Month,
            "year" => Period::Year,
            _ => return None,
        })
    }

    /// Inclusive lower bound on `created_at` for this period, or `None` for
    /// the all-time window. Week starts on ISO Monday.
    pub fn window_start(&self, now: TimeMs) -> Option<TimeMs> {
        let now_dt: DateTime<Utc> = DateTime::from_timestamp_millis(now.as_ms())?;
        let midnight = NaiveTime::from_hms_opt(0, 0, 0)?;
        let date = now_dt.date_naive();
        let start_date = match self {
            Period::All => return None,
            Period::Today => date,
            Period::Week => date - Duration::days(date.weekday().num_days_from_monday() as i64),
            Period::Month => date.with_day(1)?,
            Period::Year => date.with_day(1)?.with_month(1)?,
        };
        let start = start_date.and_time(midnight).and_utc();
        Some(TimeMs::new(start.timestamp_millis()))
    }

    pub fn all() -> [Period; 5] {
        [
            Period::All,
            Period::Today,
            Period::Week,
            Period::Month,
            Period::Year,
        ]
    }
}

impl std::fmt::Display for Period {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Order count and amount sum for one status.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StatusBucket {
    pub count: i64,
    pub amount: Amount,
}

/// Order count and share-of-total for one duration category.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DurationBucket {
    pub count: i64,
    pub pct: Amount,
}

/// The deterministic content of a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotBody {
    pub order_count: i64,
    /// Keyed by canonical status string; BTreeMap keeps serialization stable.
    pub status_buckets: BTreeMap<String, StatusBucket>,
    /// Keyed by canonical duration code string.
    pub duration_buckets: BTreeMap<String, DurationBucket>,
    pub settled_amount: Amount,
    pub total_commission: Amount,
    pub paid_commission: Amount,
    pub pending_commission: Amount,
}

impl SnapshotBody {
    /// Build the order-derived buckets from a pre-filtered order slice.
    /// Commission totals are filled in by the aggregator.
    pub fn from_orders(orders: &[Order]) -> Self {
        let mut status_buckets: BTreeMap<String, StatusBucket> = BTreeMap::new();
        let mut duration_counts: BTreeMap<String, i64> = BTreeMap::new();
        let mut settled_amount = Amount::zero();

        for status in OrderStatus::all() {
            status_buckets.insert(status.as_str().to_string(), StatusBucket::default());
        }
        for code in DurationCode::all() {
            duration_counts.insert(code.as_str().to_string(), 0);
        }

        for order in orders {
            let bucket = status_buckets
                .entry(order.status.as_str().to_string())
                .or_default();
            bucket.count += 1;
            bucket.amount = bucket.amount + order.commission_basis();

            *duration_counts
                .entry(order.duration_code.as_str().to_string())
                .or_default() += 1;

            if order.is_settled() {
                settled_amount = settled_amount + order.commission_basis();
            }
        }

        let total = Amount::from(orders.len() as i64);
        let duration_buckets = duration_counts
            .into_iter()
            .map(|(code, count)| {
                let pct = Amount::from(count).pct_of(total);
                (code, DurationBucket { count, pct })
            })
            .collect();

        SnapshotBody {
            order_count: orders.len() as i64,
            status_buckets,
            duration_buckets,
            settled_amount,
            total_commission: Amount::zero(),
            paid_commission: Amount::zero(),
            pending_commission: Amount::zero(),
        }
    }
}

/// A cached aggregate: key, deterministic body, and freshness envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsSnapshot {
    pub period: Period,
    #[serde(flatten)]
    pub body: SnapshotBody,
    /// Monotonic per `(scope, period)` key; readers compare versions to spot
    /// a stale observation.
    pub data_version: i64,
    pub last_calculated_at: TimeMs,
}

impl StatsSnapshot {
    pub fn age_at(&self, now: TimeMs) -> i64 {
        now.as_ms() - self.last_calculated_at.as_ms()
    }

    /// A snapshot exactly at the tolerance still counts as fresh.
    pub fn is_fresh(&self, now: TimeMs, max_staleness_ms: i64) -> bool {
        self.age_at(now) <= max_staleness_ms
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::SalesCode;

    fn amt(s: &str) -> Amount {
        Amount::from_str_canonical(s).unwrap()
    }

    fn order(status: OrderStatus, duration: DurationCode, amount: &str) -> Order {
        let mut o = Order::new(
            SalesCode::new("P001"),
            duration,
            amt(amount),
            None,
            "tv".to_string(),
            TimeMs::new(1_700_000_000_000),
        );
        o.status = status;
        o
    }

    #[test]
    fn test_period_parse_roundtrip() {
        for period in Period::all() {
            assert_eq!(Period::parse(period.as_str()), Some(period));
        }
        assert_eq!(Period::parse("fortnight"), None);
    }

    #[test]
    fn test_window_start_boundaries() {
        // 2024-03-13 was a Wednesday.
        let now = TimeMs::new(1_710_331_200_000); // 2024-03-13T12:00:00Z
        let fmt = |t: TimeMs| {
            DateTime::from_timestamp_millis(t.as_ms())
                .unwrap()
                .format("%Y-%m-%dT%H:%M:%S")
                .to_string()
        };
        assert_eq!(Period::All.window_start(now), None);
        assert_eq!(
            fmt(Period::Today.window_start(now).unwrap()),
            "2024-03-13T00:00:00"
        );
        assert_eq!(
            fmt(Period::Week.window_start(now).unwrap()),
            "2024-03-11T00:00:00"
        );
        assert_eq!(
            fmt(Period::Month.window_start(now).unwrap()),
            "2024-03-01T00:00:00"
        );
        assert_eq!(
            fmt(Period::Year.window_start(now).unwrap()),
            "2024-01-01T00:00:00"
        );
    }

    #[test]
    fn test_body_from_orders_buckets() {
        let orders = vec![
            order(OrderStatus::ConfirmedConfig, DurationCode::Month1, "100"),
            order(OrderStatus::ConfirmedConfig, DurationCode::Month1, "200"),
            order(OrderStatus::Rejected, DurationCode::Year1, "900"),
            order(OrderStatus::PendingPayment, DurationCode::Trial7d, "0"),
        ];
        let body = SnapshotBody::from_orders(&orders);

        assert_eq!(body.order_count, 4);
        let settled = &body.status_buckets["confirmed_config"];
        assert_eq!(settled.count, 2);
        assert_eq!(settled.amount, amt("300"));
        assert_eq!(body.status_buckets["rejected"].count, 1);
        assert_eq!(body.settled_amount, amt("300"));

        assert_eq!(body.duration_buckets["month_1"].count, 2);
        assert_eq!(body.duration_buckets["month_1"].pct, amt("50"));
        assert_eq!(body.duration_buckets["lifetime"].count, 0);
    }

    #[test]
    fn test_body_deterministic_over_same_orders() {
        let orders = vec![
            order(OrderStatus::ConfirmedConfig, DurationCode::Month3, "150"),
            order(OrderStatus::Cancelled, DurationCode::Unknown, "80"),
        ];
        let a = SnapshotBody::from_orders(&orders);
        let b = SnapshotBody::from_orders(&orders);
        assert_eq!(a, b);
        assert_eq!(
            serde_json::to_string(&a).unwrap(),
            serde_json::to_string(&b).unwrap()
        );
    }

    #[test]
    fn test_empty_order_set() {
        let body = SnapshotBody::from_orders(&[]);
        assert_eq!(body.order_count, 0);
        assert_eq!(body.settled_amount, Amount::zero());
        assert_eq!(body.duration_buckets["month_1"].pct, Amount::zero());
    }

    #[test]
    fn test_freshness() {
        let snapshot = StatsSnapshot {
            period: Period::All,
            body: SnapshotBody::from_orders(&[]),
            data_version: 1,
            last_calculated_at: TimeMs::new(1_000),
        };
        assert!(snapshot.is_fresh(TimeMs::new(1_500), 600));
        // Inclusive boundary: age equal to the tolerance is still fresh.
        assert!(snapshot.is_fresh(TimeMs::new(1_600), 600));
        assert!(!snapshot.is_fresh(TimeMs::new(2_000), 600));
    }
}
