use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// Storage format for every timestamp column. Fixed width, so text order is time order.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S"))
        .ok()
        .map(|naive| naive.and_utc())
}

/// One absolute earnings reading for one wallet.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Observation {
    pub seq: i64,
    pub wallet_id: String,
    pub wallet_name: Option<String>,
    pub unclaimed_earnings: f64,
    pub observed_at: DateTime<Utc>,
}

/// A wallet as listed by the remote source during one collector cycle.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WalletInfo {
    #[serde(rename = "walletID", alias = "wallet_id")]
    pub wallet_id: String,
    #[serde(rename = "walletNodeName", alias = "wallet_name")]
    pub wallet_name: String,
}

/// Accrual over the trailing 24 hours, summed from consecutive reading deltas.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WalletDelta {
    pub wallet_id: String,
    pub wallet_name: Option<String>,
    pub delta: f64,
}

/// Sum of every reading taken on one calendar day, across all wallets.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyTotal {
    pub day: NaiveDate,
    pub total: f64,
}

/// What the collector does when a wallet's earnings could not be fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissingReadingPolicy {
    /// Append nothing; aggregates keep using the previous reading.
    Skip,
    /// Append a 0.0 reading so every listed wallet gets a row each cycle.
    RecordZero,
}

impl MissingReadingPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Skip => "skip",
            Self::RecordZero => "record_zero",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_timestamp_is_fixed_width() {
        let a = Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap();
        assert_eq!(format_timestamp(a), "2026-01-02 03:04:05.000");
        let b = a + chrono::Duration::milliseconds(12);
        assert_eq!(format_timestamp(b), "2026-01-02 03:04:05.012");
        assert!(format_timestamp(a) < format_timestamp(b));
    }

    #[test]
    fn test_parse_timestamp_accepts_both_precisions() {
        let ts = Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap();
        assert_eq!(parse_timestamp("2026-01-02 03:04:05.000"), Some(ts));
        assert_eq!(parse_timestamp("2026-01-02 03:04:05"), Some(ts));
        assert_eq!(parse_timestamp("yesterday"), None);
    }

    #[test]
    fn test_wallet_info_deserializes_api_field_names() {
        let json = r#"{"walletID":"w-1","walletNodeName":"node-a"}"#;
        let w: WalletInfo = serde_json::from_str(json).unwrap();
        assert_eq!(w.wallet_id, "w-1");
        assert_eq!(w.wallet_name, "node-a");
    }
}
