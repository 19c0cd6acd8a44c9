//! Raw transaction as delivered by the ingress layer

use crate::error::DecisionError;
use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};

/// A single transaction to be assessed. Immutable once received.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawTransaction {
    /// Customer identifier
    pub customer_id: String,

    /// KYC status (1 = verified, 0 = not verified)
    pub kyc_verified: u8,

    /// Days since the account was opened
    pub account_age_days: u32,

    /// Transaction amount in account currency
    pub transaction_amount: f64,

    /// Channel as reported by the caller ("atm", "mobile", "international", ...)
    pub channel: String,

    /// ISO-8601 timestamp, kept verbatim for the alert key
    pub timestamp: String,
}

impl RawTransaction {
    /// Create a verified, year-old account transaction. Mostly useful in tests.
    pub fn new(customer_id: &str, transaction_amount: f64, channel: &str, timestamp: &str) -> Self {
        Self {
            customer_id: customer_id.to_string(),
            kyc_verified: 1,
            account_age_days: 365,
            transaction_amount,
            channel: channel.to_string(),
            timestamp: timestamp.to_string(),
        }
    }

    pub fn is_kyc_verified(&self) -> bool {
        self.kyc_verified == 1
    }

    /// Lower-cased channel as used by the rule table.
    pub fn channel_normalized(&self) -> String {
        self.channel.trim().to_ascii_lowercase()
    }

    pub fn channel_kind(&self) -> Channel {
        Channel::parse(&self.channel)
    }

    /// Check the field-level constraints the schema layer cannot express.
    pub fn validate(&self) -> Result<(), DecisionError> {
        if self.customer_id.trim().is_empty() {
            return Err(DecisionError::malformed("customer_id", "must not be empty"));
        }
        if self.kyc_verified > 1 {
            return Err(DecisionError::malformed(
                "kyc_verified",
                format!("expected 0 or 1, got {}", self.kyc_verified),
            ));
        }
        if !self.transaction_amount.is_finite() || self.transaction_amount < 0.0 {
            return Err(DecisionError::malformed(
                "transaction_amount",
                format!("expected a non-negative amount, got {}", self.transaction_amount),
            ));
        }
        self.parsed_timestamp().map(|_| ())
    }

    /// Wall-clock instant of the transaction in the sender's own offset.
    pub fn parsed_timestamp(&self) -> Result<NaiveDateTime, DecisionError> {
        parse_timestamp(&self.timestamp)
    }

    /// Alert key. Not unique under duplicate submissions.
    pub fn transaction_key(&self) -> String {
        format!("{}_{}", self.customer_id, self.timestamp)
    }
}

/// Calendar fields extracted from a transaction timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeParts {
    /// 0-23
    pub hour: u32,
    /// 1-31
    pub day: u32,
    /// 0-6, Monday = 0
    pub weekday: u32,
}

impl From<NaiveDateTime> for TimeParts {
    fn from(dt: NaiveDateTime) -> Self {
        Self {
            hour: dt.hour(),
            day: dt.day(),
            weekday: dt.weekday().num_days_from_monday(),
        }
    }
}

const NAIVE_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Parse an ISO-8601 timestamp. Offsets are honoured by keeping the local
/// wall-clock time they describe; naive and date-only forms are accepted.
pub fn parse_timestamp(raw: &str) -> Result<NaiveDateTime, DecisionError> {
    let s = raw.trim();
    if s.is_empty() {
        return Err(DecisionError::malformed("timestamp", "must not be empty"));
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.naive_local());
    }
    if let Ok(dt) = DateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f%z") {
        return Ok(dt.naive_local());
    }
    for format in NAIVE_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, format) {
            return Ok(dt);
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Ok(date.and_time(NaiveTime::MIN));
    }

    Err(DecisionError::malformed(
        "timestamp",
        format!("`{}` is not an ISO-8601 instant", raw),
    ))
}

/// Channels known to the model's one-hot encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Atm,
    Mobile,
    Pos,
    Web,
    /// Anything else ("international", "wire", ...). Valid for rules only.
    Other,
}

impl Channel {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "atm" => Channel::Atm,
            "mobile" => Channel::Mobile,
            "pos" => Channel::Pos,
            "web" => Channel::Web,
            _ => Channel::Other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transaction_deserialization() {
        let json = r#"{
            "customer_id": "C-1001",
            "kyc_verified": 0,
            "account_age_days": 2,
            "transaction_amount": 15000.0,
            "channel": "international",
            "timestamp": "2024-03-09T03:15:00"
        }"#;

        let tx: RawTransaction = serde_json::from_str(json).unwrap();
        assert_eq!(tx.customer_id, "C-1001");
        assert!(!tx.is_kyc_verified());
        assert_eq!(tx.channel_kind(), Channel::Other);
        assert!(tx.validate().is_ok());
    }

    #[test]
    fn test_timestamp_formats() {
        let naive = parse_timestamp("2024-03-09T03:15:00").unwrap();
        assert_eq!(TimeParts::from(naive).hour, 3);

        let offset = parse_timestamp("2024-03-09T03:15:00+05:30").unwrap();
        assert_eq!(TimeParts::from(offset).hour, 3);

        let zulu = parse_timestamp("2024-03-09T23:59:59.250Z").unwrap();
        assert_eq!(TimeParts::from(zulu).hour, 23);

        let spaced = parse_timestamp("2024-03-09 14:00:00").unwrap();
        assert_eq!(TimeParts::from(spaced).hour, 14);

        let date_only = parse_timestamp("2024-03-09").unwrap();
        assert_eq!(TimeParts::from(date_only).hour, 0);
    }

    #[test]
    fn test_time_parts() {
        // 2024-03-09 is a Saturday
        let parts = TimeParts::from(parse_timestamp("2024-03-09T03:15:00").unwrap());
        assert_eq!(parts, TimeParts { hour: 3, day: 9, weekday: 5 });
    }

    #[test]
    fn test_invalid_timestamp_rejected() {
        let tx = RawTransaction::new("C-1", 10.0, "pos", "yesterday at noon");
        match tx.validate() {
            Err(DecisionError::MalformedInput { field, .. }) => assert_eq!(field, "timestamp"),
            other => panic!("expected malformed timestamp, got {:?}", other),
        }

        assert!(parse_timestamp("2024-02-30T10:00:00").is_err());
        assert!(parse_timestamp("").is_err());
    }

    #[test]
    fn test_field_validation() {
        let mut tx = RawTransaction::new("C-1", 10.0, "pos", "2024-03-09T10:00:00");
        tx.kyc_verified = 2;
        assert!(tx.validate().is_err());

        let mut tx = RawTransaction::new("  ", 10.0, "pos", "2024-03-09T10:00:00");
        assert!(tx.validate().is_err());
        tx.customer_id = "C-1".to_string();
        tx.transaction_amount = -1.0;
        assert!(tx.validate().is_err());
        tx.transaction_amount = f64::NAN;
        assert!(tx.validate().is_err());
    }

    #[test]
    fn test_channel_parse_is_case_insensitive() {
        assert_eq!(Channel::parse("ATM"), Channel::Atm);
        assert_eq!(Channel::parse(" Mobile "), Channel::Mobile);
        assert_eq!(Channel::parse("wire"), Channel::Other);
    }

    #[test]
    fn test_transaction_key() {
        let tx = RawTransaction::new("C-7", 10.0, "pos", "2024-03-09T10:00:00");
        assert_eq!(tx.transaction_key(), "C-7_2024-03-09T10:00:00");
    }
}
