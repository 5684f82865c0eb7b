//! Canonical purchase-duration codes and the authoritative label normalizer.
//!
//! Historical order data carries free-text duration labels in mixed languages
//! and spellings. `DurationCode::normalize` is the single mapping from that
//! open set onto the canonical enum; call sites must never re-implement label
//! matching. The function is total: anything unmatched becomes `Unknown`,
//! which keeps malformed rows visible in reports without breaking
//! aggregation.

use chrono::{DateTime, Duration, Months, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::TimeMs;

/// Canonical subscription duration categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DurationCode {
    // Renamed explicitly: serde's snake_case would render these as
    // "trial7d"/"month1", but the stored canonical labels keep the
    // digit separated.
    #[serde(rename = "trial_7d")]
    Trial7d,
    #[serde(rename = "month_1")]
    Month1,
    #[serde(rename = "month_3")]
    Month3,
    #[serde(rename = "month_6")]
    Month6,
    #[serde(rename = "year_1")]
    Year1,
    #[serde(rename = "lifetime")]
    Lifetime,
    /// Fallback for labels the table does not recognize.
    #[serde(rename = "unknown")]
    Unknown,
}

impl DurationCode {
    /// Map a free-text duration label to its canonical code.
    ///
    /// Total function: trims, lowercases and strips inner spaces before the
    /// table lookup, and returns `Unknown` for anything unmatched.
    pub fn normalize(raw: &str) -> DurationCode {
        let key: String = raw.trim().to_lowercase().split_whitespace().collect();
        match key.as_str() {
            "7天" | "7days" | "7day" | "7日" | "七天" | "七日" | "7d" | "trial" | "试用"
            | "试用7天" | "免费试用" | "freetrial" => DurationCode::Trial7d,
            "1个月" | "一个月" | "1月" | "1month" | "1mo" | "1m" | "月付" | "monthly"
            | "30天" | "30days" => DurationCode::Month1,
            "3个月" | "三个月" | "3月" | "3months" | "3month" | "3mo" | "3m" | "季付"
            | "quarterly" | "90天" | "90days" => DurationCode::Month3,
            "6个月" | "六个月" | "6月" | "6months" | "6month" | "6mo" | "6m" | "半年"
            | "halfyear" | "180天" | "180days" => DurationCode::Month6,
            "1年" | "一年" | "1year" | "1yr" | "1y" | "年付" | "yearly" | "annual"
            | "12个月" | "12months" | "365天" | "365days" => DurationCode::Year1,
            "终身" | "终生" | "永久" | "lifetime" | "forever" | "life" | "permanent" => {
                DurationCode::Lifetime
            }
            _ => DurationCode::Unknown,
        }
    }

    /// The canonical wire/storage label for this code.
    pub fn as_str(&self) -> &'static str {
        match self {
            DurationCode::Trial7d => "trial_7d",
            DurationCode::Month1 => "month_1",
            DurationCode::Month3 => "month_3",
            DurationCode::Month6 => "month_6",
            DurationCode::Year1 => "year_1",
            DurationCode::Lifetime => "lifetime",
            DurationCode::Unknown => "unknown",
        }
    }

    /// Parse a stored canonical label back into its code.
    pub fn from_code(code: &str) -> DurationCode {
        match code {
            "trial_7d" => DurationCode::Trial7d,
            "month_1" => DurationCode::Month1,
            "month_3" => DurationCode::Month3,
            "month_6" => DurationCode::Month6,
            "year_1" => DurationCode::Year1,
            "lifetime" => DurationCode::Lifetime,
            _ => DurationCode::Unknown,
        }
    }

    /// True for the free-trial duration used by the duplicate-trial guard.
    pub fn is_trial(&self) -> bool {
        matches!(self, DurationCode::Trial7d)
    }

    /// Expiry timestamp for a subscription effective at `from`.
    ///
    /// `None` for lifetime (never expires) and unknown (cannot be derived).
    pub fn expiry_from(&self, from: TimeMs) -> Option<TimeMs> {
        let start: DateTime<Utc> = DateTime::from_timestamp_millis(from.as_ms())?;
        let end = match self {
            DurationCode::Trial7d => start + Duration::days(7),
            DurationCode::Month1 => start.checked_add_months(Months::new(1))?,
            DurationCode::Month3 => start.checked_add_months(Months::new(3))?,
            DurationCode::Month6 => start.checked_add_months(Months::new(6))?,
            DurationCode::Year1 => start.checked_add_months(Months::new(12))?,
            DurationCode::Lifetime | DurationCode::Unknown => return None,
        };
        Some(TimeMs::new(end.timestamp_millis()))
    }

    /// All canonical codes, in reporting order.
    pub fn all() -> [DurationCode; 7] {
        [
            DurationCode::Trial7d,
            DurationCode::Month1,
            DurationCode::Month3,
            DurationCode::Month6,
            DurationCode::Year1,
            DurationCode::Lifetime,
            DurationCode::Unknown,
        ]
    }
}

impl std::fmt::Display for DurationCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trial_spellings_converge() {
        for label in ["7天", "7days", "7日", "七天", "trial", " 7d ", "试用"] {
            assert_eq!(
                DurationCode::normalize(label),
                DurationCode::Trial7d,
                "label {:?}",
                label
            );
        }
    }

    #[test]
    fn test_month_and_year_spellings() {
        assert_eq!(DurationCode::normalize("1个月"), DurationCode::Month1);
        assert_eq!(DurationCode::normalize("1Month"), DurationCode::Month1);
        assert_eq!(DurationCode::normalize("季付"), DurationCode::Month3);
        assert_eq!(DurationCode::normalize("半年"), DurationCode::Month6);
        assert_eq!(DurationCode::normalize("12 months"), DurationCode::Year1);
        assert_eq!(DurationCode::normalize("年付"), DurationCode::Year1);
    }

    #[test]
    fn test_lifetime_spellings() {
        assert_eq!(DurationCode::normalize("终身"), DurationCode::Lifetime);
        assert_eq!(DurationCode::normalize("LIFETIME"), DurationCode::Lifetime);
    }

    #[test]
    fn test_unrecognized_falls_back_to_unknown() {
        assert_eq!(
            DurationCode::normalize("unrecognized-string"),
            DurationCode::Unknown
        );
        assert_eq!(DurationCode::normalize(""), DurationCode::Unknown);
    }

    #[test]
    fn test_code_roundtrip() {
        for code in DurationCode::all() {
            assert_eq!(DurationCode::from_code(code.as_str()), code);
        }
    }

    #[test]
    fn test_serde_labels_match_canonical_strings() {
        for code in DurationCode::all() {
            let json = serde_json::to_string(&code).unwrap();
            assert_eq!(json, format!("\"{}\"", code.as_str()));
            let back: DurationCode = serde_json::from_str(&json).unwrap();
            assert_eq!(back, code);
        }
    }

    #[test]
    fn test_expiry_trial() {
        let from = TimeMs::new(0);
        let expiry = DurationCode::Trial7d.expiry_from(from).unwrap();
        assert_eq!(expiry.as_ms(), 7 * 24 * 3600 * 1000);
    }

    #[test]
    fn test_expiry_month_is_calendar_month() {
        // 2024-01-31 + 1 month clamps to 2024-02-29 (leap year).
        let from = TimeMs::new(1_706_659_200_000); // 2024-01-31T00:00:00Z
        let expiry = DurationCode::Month1.expiry_from(from).unwrap();
        let end = DateTime::from_timestamp_millis(expiry.as_ms()).unwrap();
        assert_eq!(end.format("%Y-%m-%d").to_string(), "2024-02-29");
    }

    #[test]
    fn test_lifetime_and_unknown_never_expire() {
        assert!(DurationCode::Lifetime.expiry_from(TimeMs::new(0)).is_none());
        assert!(DurationCode::Unknown.expiry_from(TimeMs::new(0)).is_none());
    }
}
