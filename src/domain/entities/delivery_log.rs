//! Delivery log entity: the audit row of one attempted send.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Outcome of a single delivery attempt.
///
/// A row is created `Pending` and moves exactly once to `Sent` or `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    Pending,
    Sent,
    Failed,
}

impl DeliveryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Sent => "sent",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeliveryStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "sent" => Ok(Self::Sent),
            "failed" => Ok(Self::Failed),
            other => Err(format!("unknown delivery status '{other}'")),
        }
    }
}

/// One recipient's delivery record for one campaign.
///
/// The contact address and unsubscribe token are denormalized at dispatch
/// time so the send loop never reads the account store.
#[derive(Debug, Clone, PartialEq)]
pub struct DeliveryLog {
    pub id: i64,
    pub campaign_id: i64,
    pub recipient_id: i64,
    pub email: String,
    pub unsubscribe_token: String,
    pub status: DeliveryStatus,
    pub sent_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Input data for one pending row created at dispatch time.
#[derive(Debug, Clone, PartialEq)]
pub struct NewDeliveryLog {
    pub recipient_id: i64,
    pub email: String,
    pub unsubscribe_token: String,
}

/// Row counts of a campaign grouped by status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DeliveryCounts {
    pub pending: i64,
    pub sent: i64,
    pub failed: i64,
}

impl DeliveryCounts {
    pub fn total(&self) -> i64 {
        self.pending + self.sent + self.failed
    }

    /// True once every row has been attempted.
    pub fn is_settled(&self) -> bool {
        self.pending == 0
    }

    pub fn record(&mut self, status: DeliveryStatus) {
        match status {
            DeliveryStatus::Pending => self.pending += 1,
            DeliveryStatus::Sent => self.sent += 1,
            DeliveryStatus::Failed => self.failed += 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_record_and_total() {
        let mut counts = DeliveryCounts::default();
        counts.record(DeliveryStatus::Sent);
        counts.record(DeliveryStatus::Sent);
        counts.record(DeliveryStatus::Failed);
        counts.record(DeliveryStatus::Pending);

        assert_eq!(counts.sent, 2);
        assert_eq!(counts.failed, 1);
        assert_eq!(counts.total(), 4);
        assert!(!counts.is_settled());
    }

    #[test]
    fn test_status_parse() {
        assert_eq!("failed".parse::<DeliveryStatus>(), Ok(DeliveryStatus::Failed));
        assert!("bounced".parse::<DeliveryStatus>().is_err());
    }
}
