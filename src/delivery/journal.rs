//! Journal of failed delivery attempts.
//!
//! The monitor and the broadcaster deliberately continue past individual
//! delivery failures; this journal is what keeps those swallowed failures
//! visible. The operator can page through recent entries with the
//! `/deliveries` command.

use std::sync::Arc;

/// One failed delivery attempt
#[derive(Debug, Clone)]
pub struct FailedDelivery {
    pub at: chrono::DateTime<chrono::Utc>,
    /// Human-readable target, e.g. "member 42"
    pub target: String,
    /// What the bot was doing, e.g. "escalation" or "broadcast"
    pub context: String,
    pub reason: String,
}

impl FailedDelivery {
    /// Format as a single line for display
    pub fn format(&self) -> String {
        format!(
            "{} [{}] {}: {}",
            self.at.format("%Y-%m-%d %H:%M:%S"),
            self.context,
            self.target,
            self.reason
        )
    }
}

/// Bounded in-memory ring of recent failures
pub struct DeliveryJournal {
    recent: parking_lot::RwLock<Vec<FailedDelivery>>,
    max_entries: usize,
}

impl DeliveryJournal {
    pub fn new(max_entries: usize) -> Self {
        Self {
            recent: parking_lot::RwLock::new(Vec::with_capacity(max_entries)),
            max_entries,
        }
    }

    /// Record a failed attempt
    pub fn record(&self, entry: FailedDelivery) {
        let mut recent = self.recent.write();
        if recent.len() >= self.max_entries {
            recent.remove(0);
        }
        recent.push(entry);
    }

    /// Get the most recent entries, oldest first
    pub fn get_recent(&self, count: usize) -> Vec<FailedDelivery> {
        let recent = self.recent.read();
        let start = recent.len().saturating_sub(count);
        recent[start..].to_vec()
    }
}

/// Shared journal type
pub type SharedDeliveryJournal = Arc<DeliveryJournal>;

pub fn create_shared_journal(max_entries: usize) -> SharedDeliveryJournal {
    Arc::new(DeliveryJournal::new(max_entries))
}
