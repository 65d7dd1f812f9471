use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::{BotError, Result};

/// Dates in the ledger are day-granular, matching the daily income report.
pub const LEDGER_DATE_FORMAT: &str = "%Y-%m-%d";

/// One confirmed payment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionRecord {
    /// Sequence number, assigned on append
    pub id: u64,

    /// Member the payment belongs to
    pub member_id: String,

    /// Display name at confirmation time
    pub member_name: String,

    /// Amount paid
    pub amount: f64,

    /// Day of the confirmation (UTC)
    pub date: String,
}

/// Append-only ledger of confirmed payments, consulted for reporting only
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionLedger {
    /// Schema version for migrations
    pub version: u32,

    /// Next sequence number to assign
    pub next_id: u64,

    /// Every recorded transaction, in append order
    pub entries: Vec<TransactionRecord>,
}

impl Default for TransactionLedger {
    fn default() -> Self {
        Self {
            version: 1,
            next_id: 1,
            entries: Vec::new(),
        }
    }
}

impl TransactionLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from a JSON file, or create new if not exists
    pub async fn load(path: &str) -> Result<Self> {
        match tokio::fs::read_to_string(path).await {
            Ok(content) => {
                serde_json::from_str(&content).map_err(|e| BotError::StateParse {
                    path: path.to_string(),
                    source: e,
                })
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::new()),
            Err(e) => Err(BotError::StateLoad {
                path: path.to_string(),
                source: e,
            }),
        }
    }

    /// Save to a JSON file atomically
    pub async fn save(&self, path: &str) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;

        let temp_path = format!("{}.tmp", path);
        tokio::fs::write(&temp_path, &content)
            .await
            .map_err(|e| BotError::StateSave {
                path: path.to_string(),
                source: e,
            })?;

        tokio::fs::rename(&temp_path, path)
            .await
            .map_err(|e| BotError::StateSave {
                path: path.to_string(),
                source: e,
            })?;

        Ok(())
    }

    /// Append a confirmed payment and return its sequence number.
    pub fn append(
        &mut self,
        member_id: &str,
        member_name: &str,
        amount: f64,
        now: DateTime<Utc>,
    ) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.entries.push(TransactionRecord {
            id,
            member_id: member_id.to_string(),
            member_name: member_name.to_string(),
            amount,
            date: now.format(LEDGER_DATE_FORMAT).to_string(),
        });
        id
    }

    /// Sum of every payment recorded on the given day.
    pub fn total_for_day(&self, day: &str) -> f64 {
        self.entries
            .iter()
            .filter(|t| t.date == day)
            .map(|t| t.amount)
            .sum()
    }

    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }
}

/// Shared ledger type
pub type SharedLedger = Arc<tokio::sync::RwLock<TransactionLedger>>;

pub fn create_shared_ledger(ledger: TransactionLedger) -> SharedLedger {
    Arc::new(tokio::sync::RwLock::new(ledger))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_append_assigns_sequence_numbers() {
        let mut ledger = TransactionLedger::new();
        let now = Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap();

        assert_eq!(ledger.append("42", "Mon", 5000.0, now), 1);
        assert_eq!(ledger.append("43", "Tue", 5000.0, now), 2);
        assert_eq!(ledger.entry_count(), 2);
    }

    #[test]
    fn test_total_for_day_sums_matching_dates_only() {
        let mut ledger = TransactionLedger::new();
        let day_one = Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap();
        let day_two = Utc.with_ymd_and_hms(2025, 3, 2, 9, 0, 0).unwrap();

        ledger.append("42", "Mon", 5000.0, day_one);
        ledger.append("43", "Tue", 2500.0, day_one);
        ledger.append("44", "Wed", 9999.0, day_two);

        assert_eq!(ledger.total_for_day("2025-03-01"), 7500.0);
        assert_eq!(ledger.total_for_day("2025-03-02"), 9999.0);
        assert_eq!(ledger.total_for_day("2025-03-03"), 0.0);
    }
}
