use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{BotError, Result};

/// Timestamps are stored as plain UTC strings so the files stay greppable.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Payment state of an enrolled member
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MemberStatus {
    /// Awaiting payment confirmation; eligible for escalation.
    Pending,
    /// Payment confirmed by the operator; left alone by the monitor.
    Confirmed,
}

/// A single enrolled member
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemberRecord {
    /// Discord user ID (snowflake as string)
    pub member_id: String,

    /// Display name used in reminder and oversight messages
    pub display_name: String,

    /// Payment status
    pub status: MemberStatus,

    /// When the member first registered (UTC)
    pub created_at: String,

    /// When the most recent reminder went out; starts equal to `created_at`
    pub last_reminder_at: String,
}

impl MemberRecord {
    /// Parse `last_reminder_at`. A record that fails here is skipped by the
    /// monitor rather than aborting the whole tick.
    pub fn last_reminder_time(&self) -> Result<DateTime<Utc>> {
        parse_timestamp(&self.last_reminder_at).ok_or_else(|| BotError::MalformedTimestamp {
            member_id: self.member_id.clone(),
            value: self.last_reminder_at.clone(),
        })
    }
}

/// Database tracking every enrolled member, keyed by member ID
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemberStore {
    /// Schema version for migrations
    pub version: u32,

    /// Last update timestamp (UTC string)
    pub last_updated: String,

    /// Map of member ID to record
    pub members: HashMap<String, MemberRecord>,
}

impl Default for MemberStore {
    fn default() -> Self {
        Self {
            version: 1,
            last_updated: format_timestamp(Utc::now()),
            members: HashMap::new(),
        }
    }
}

impl MemberStore {
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

        // Write to temp file first, then rename for atomicity
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

    /// Insert a new member, or overwrite an existing registration.
    ///
    /// Both timestamps reset to `now`; there is no history.
    pub fn upsert(&mut self, member_id: &str, display_name: &str, status: MemberStatus, now: DateTime<Utc>) {
        let stamp = format_timestamp(now);
        self.members.insert(
            member_id.to_string(),
            MemberRecord {
                member_id: member_id.to_string(),
                display_name: display_name.to_string(),
                status,
                created_at: stamp.clone(),
                last_reminder_at: stamp,
            },
        );
        self.touch_updated(now);
    }

    /// Update status only, for an existing member.
    pub fn set_status(&mut self, member_id: &str, status: MemberStatus) -> Result<()> {
        let record = self
            .members
            .get_mut(member_id)
            .ok_or_else(|| BotError::MemberNotFound {
                member_id: member_id.to_string(),
            })?;
        record.status = status;
        self.touch_updated(Utc::now());
        Ok(())
    }

    /// Record that a reminder went out at `now`.
    pub fn touch_reminder(&mut self, member_id: &str, now: DateTime<Utc>) -> Result<()> {
        let record = self
            .members
            .get_mut(member_id)
            .ok_or_else(|| BotError::MemberNotFound {
                member_id: member_id.to_string(),
            })?;
        record.last_reminder_at = format_timestamp(now);
        self.touch_updated(now);
        Ok(())
    }

    /// Snapshot of all pending members, excluding one ID (the operator).
    pub fn list_pending(&self, exclude_id: &str) -> Vec<MemberRecord> {
        self.members
            .values()
            .filter(|m| m.status == MemberStatus::Pending && m.member_id != exclude_id)
            .cloned()
            .collect()
    }

    /// Snapshot of every member ID, for broadcast fan-out.
    pub fn member_ids(&self) -> Vec<String> {
        self.members.keys().cloned().collect()
    }

    /// Look up a single member
    pub fn get(&self, member_id: &str) -> Option<&MemberRecord> {
        self.members.get(member_id)
    }

    /// Whether a member is already registered
    pub fn contains(&self, member_id: &str) -> bool {
        self.members.contains_key(member_id)
    }

    /// Get member count
    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    fn touch_updated(&mut self, now: DateTime<Utc>) {
        self.last_updated = format_timestamp(now);
    }
}

pub fn format_timestamp(time: DateTime<Utc>) -> String {
    time.format(TIMESTAMP_FORMAT).to_string()
}

pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(raw, TIMESTAMP_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}

/// Shared member store type
pub type SharedMemberStore = Arc<tokio::sync::RwLock<MemberStore>>;

pub fn create_shared_member_store(store: MemberStore) -> SharedMemberStore {
    Arc::new(tokio::sync::RwLock::new(store))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn test_upsert_inserts_with_matching_timestamps() {
        let mut store = MemberStore::new();
        store.upsert("42", "Mon", MemberStatus::Pending, at(0));

        let record = store.get("42").unwrap();
        assert_eq!(record.display_name, "Mon");
        assert_eq!(record.status, MemberStatus::Pending);
        assert_eq!(record.created_at, record.last_reminder_at);
    }

    #[test]
    fn test_upsert_is_idempotent_in_shape() {
        let mut store = MemberStore::new();
        store.upsert("42", "Mon", MemberStatus::Pending, at(0));
        store.upsert("42", "Mon", MemberStatus::Pending, at(60));

        assert_eq!(store.member_count(), 1);
        let record = store.get("42").unwrap();
        // Timestamps reset to the second call's time
        assert_eq!(record.last_reminder_time().unwrap(), at(60));
        assert_eq!(record.created_at, format_timestamp(at(60)));
    }

    #[test]
    fn test_set_status_requires_existing_member() {
        let mut store = MemberStore::new();
        assert!(store.set_status("42", MemberStatus::Confirmed).is_err());

        store.upsert("42", "Mon", MemberStatus::Pending, at(0));
        store.set_status("42", MemberStatus::Confirmed).unwrap();
        assert_eq!(store.get("42").unwrap().status, MemberStatus::Confirmed);
        // A status change must not move the reminder clock
        assert_eq!(store.get("42").unwrap().last_reminder_at, format_timestamp(at(0)));
    }

    #[test]
    fn test_list_pending_excludes_operator_and_confirmed() {
        let mut store = MemberStore::new();
        store.upsert("1", "Operator", MemberStatus::Pending, at(0));
        store.upsert("2", "Paid", MemberStatus::Confirmed, at(0));
        store.upsert("3", "Waiting", MemberStatus::Pending, at(0));

        let pending = store.list_pending("1");
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].member_id, "3");
    }

    #[test]
    fn test_touch_reminder_moves_clock_forward() {
        let mut store = MemberStore::new();
        store.upsert("42", "Mon", MemberStatus::Pending, at(0));
        store.touch_reminder("42", at(240)).unwrap();

        let record = store.get("42").unwrap();
        assert_eq!(record.last_reminder_time().unwrap(), at(240));
        // created_at is untouched by reminders
        assert_eq!(record.created_at, format_timestamp(at(0)));
    }

    #[test]
    fn test_malformed_timestamp_is_reported() {
        let record = MemberRecord {
            member_id: "42".to_string(),
            display_name: "Mon".to_string(),
            status: MemberStatus::Pending,
            created_at: "yesterday".to_string(),
            last_reminder_at: "yesterday".to_string(),
        };
        assert!(record.last_reminder_time().is_err());
    }

    #[tokio::test]
    async fn test_load_missing_file_starts_empty() {
        let path = std::env::temp_dir().join("duesy-missing-members.json");
        let _ = tokio::fs::remove_file(&path).await;

        let store = MemberStore::load(path.to_str().unwrap()).await.unwrap();
        assert_eq!(store.member_count(), 0);
    }

    #[tokio::test]
    async fn test_save_and_reload_round_trip() {
        let path = std::env::temp_dir().join("duesy-members-roundtrip.json");
        let path = path.to_str().unwrap().to_string();

        let mut store = MemberStore::new();
        store.upsert("42", "Mon", MemberStatus::Pending, at(0));
        store.save(&path).await.unwrap();

        let reloaded = MemberStore::load(&path).await.unwrap();
        assert_eq!(reloaded.member_count(), 1);
        assert_eq!(reloaded.get("42").unwrap().display_name, "Mon");

        let _ = tokio::fs::remove_file(&path).await;
    }
}
