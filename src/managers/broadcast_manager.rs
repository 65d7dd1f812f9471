use chrono::Utc;
use dashmap::DashMap;
use poise::serenity_prelude::UserId;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::delivery::{
    DeliveryTarget, FailedDelivery, MessageContent, Notifier, SharedDeliveryJournal,
};
use crate::state::SharedMemberStore;

/// Pause between consecutive sends. Exceeding the platform's outbound rate
/// limit can suspend the sending account, so this is a correctness
/// requirement rather than a tunable.
const SEND_THROTTLE: Duration = Duration::from_millis(50);

/// Outcome of one fan-out pass
#[derive(Debug, Clone, Default)]
pub struct BroadcastReport {
    /// IDs in the snapshot, i.e. delivery attempts made
    pub attempted: usize,
    /// Attempts that succeeded
    pub delivered: usize,
    /// Members whose delivery failed
    pub failed: Vec<String>,
}

impl BroadcastReport {
    /// One-line summary for the operator's reply
    pub fn summary(&self) -> String {
        if self.failed.is_empty() {
            format!("✅ Broadcast delivered to all {} members.", self.delivered)
        } else {
            format!(
                "✅ Broadcast finished: {} attempted, {} delivered, {} failed ({})",
                self.attempted,
                self.delivered,
                self.failed.len(),
                self.failed.join(", ")
            )
        }
    }
}

/// A broadcast conversation waiting for its content
#[derive(Debug, Clone)]
pub struct PendingBroadcast {
    pub started_at: chrono::DateTime<chrono::Utc>,
}

/// Operator-triggered fan-out of one message to every member.
///
/// The conversation is a small state machine: `/broadcast` enters the
/// collecting state, the next operator message (or `/cancel`) leaves it.
/// Once sending starts it always runs to completion over the snapshot of
/// member IDs taken at the start; per-recipient failures are journaled and
/// skipped.
pub struct BroadcastManager {
    member_store: SharedMemberStore,
    notifier: Arc<dyn Notifier>,
    journal: SharedDeliveryJournal,

    /// Operators currently in the collecting state
    collecting: DashMap<UserId, PendingBroadcast>,
}

impl BroadcastManager {
    pub fn new(
        member_store: SharedMemberStore,
        notifier: Arc<dyn Notifier>,
        journal: SharedDeliveryJournal,
    ) -> Self {
        Self {
            member_store,
            notifier,
            journal,
            collecting: DashMap::new(),
        }
    }

    /// Enter the collecting state for an operator.
    pub fn begin(&self, operator: UserId) {
        self.collecting.insert(
            operator,
            PendingBroadcast {
                started_at: Utc::now(),
            },
        );
        info!("Broadcast started by {}", operator);
    }

    /// When the operator entered the collecting state, if they are in it.
    pub fn collecting_since(&self, operator: UserId) -> Option<chrono::DateTime<chrono::Utc>> {
        self.collecting.get(&operator).map(|p| p.started_at)
    }

    /// Leave the collecting state without sending. Returns false if there
    /// was nothing to cancel.
    pub fn cancel(&self, operator: UserId) -> bool {
        match self.collecting.remove(&operator) {
            Some((_, pending)) => {
                info!(
                    "Broadcast cancelled by {} after {}s of collecting",
                    operator,
                    (Utc::now() - pending.started_at).num_seconds()
                );
                true
            }
            None => false,
        }
    }

    /// Move collecting → sending. Returns false if the operator was not
    /// collecting; once this returns true there is no cancellation.
    pub fn take_collecting(&self, operator: UserId) -> bool {
        match self.collecting.remove(&operator) {
            Some((_, pending)) => {
                debug!(
                    "Broadcast content from {} after {}s of collecting",
                    operator,
                    (Utc::now() - pending.started_at).num_seconds()
                );
                true
            }
            None => false,
        }
    }

    /// Deliver `content` to every member known at the moment the snapshot is
    /// taken. Always terminates after attempting every recipient.
    pub async fn execute(&self, content: &MessageContent) -> BroadcastReport {
        let member_ids = {
            let store = self.member_store.read().await;
            store.member_ids()
        };

        let mut report = BroadcastReport {
            attempted: member_ids.len(),
            ..Default::default()
        };

        for member_id in member_ids {
            let target = match member_id.parse::<u64>() {
                Ok(id) => DeliveryTarget::Member(UserId::new(id)),
                Err(_) => {
                    warn!("Member id '{}' is not a valid user id", member_id);
                    report.failed.push(member_id);
                    continue;
                }
            };

            match self.notifier.send(target, content).await {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    // No retry; the member simply misses this broadcast
                    warn!("Broadcast to {} failed: {}", target, e);
                    self.journal.record(FailedDelivery {
                        at: Utc::now(),
                        target: target.to_string(),
                        context: "broadcast".to_string(),
                        reason: e.to_string(),
                    });
                    report.failed.push(member_id);
                }
            }

            tokio::time::sleep(SEND_THROTTLE).await;
        }

        info!(
            "Broadcast finished: {} attempted, {} delivered, {} failed",
            report.attempted,
            report.delivered,
            report.failed.len()
        );
        report
    }
}

/// Shared broadcast manager type
pub type SharedBroadcastManager = Arc<BroadcastManager>;

pub fn create_shared_broadcast_manager(
    member_store: SharedMemberStore,
    notifier: Arc<dyn Notifier>,
    journal: SharedDeliveryJournal,
) -> SharedBroadcastManager {
    Arc::new(BroadcastManager::new(member_store, notifier, journal))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delivery::{create_shared_journal, DeliveryError};
    use crate::state::{create_shared_member_store, MemberStatus, MemberStore};
    use async_trait::async_trait;
    use chrono::TimeZone;
    use std::collections::HashSet;

    struct RecordingNotifier {
        sent: parking_lot::Mutex<Vec<DeliveryTarget>>,
        fail_members: HashSet<u64>,
    }

    impl RecordingNotifier {
        fn new(fail_members: &[u64]) -> Self {
            Self {
                sent: parking_lot::Mutex::new(Vec::new()),
                fail_members: fail_members.iter().copied().collect(),
            }
        }
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn send(
            &self,
            target: DeliveryTarget,
            _content: &MessageContent,
        ) -> Result<(), DeliveryError> {
            self.sent.lock().push(target);
            if let DeliveryTarget::Member(id) = target {
                if self.fail_members.contains(&id.get()) {
                    return Err(DeliveryError::Send {
                        target: target.to_string(),
                        message: "bot blocked".to_string(),
                    });
                }
            }
            Ok(())
        }
    }

    fn populated_store(ids: &[u64]) -> SharedMemberStore {
        let mut store = MemberStore::new();
        let now = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        for id in ids {
            store.upsert(&id.to_string(), "Member", MemberStatus::Pending, now);
        }
        create_shared_member_store(store)
    }

    #[tokio::test]
    async fn test_broadcast_attempts_every_member_once() {
        let notifier = Arc::new(RecordingNotifier::new(&[]));
        let manager = BroadcastManager::new(
            populated_store(&[1, 2, 3]),
            notifier.clone(),
            create_shared_journal(100),
        );

        let report = manager
            .execute(&MessageContent::Text("Hello".to_string()))
            .await;

        assert_eq!(report.attempted, 3);
        assert_eq!(report.delivered, 3);
        assert!(report.failed.is_empty());
        assert_eq!(notifier.sent.lock().len(), 3);
    }

    #[tokio::test]
    async fn test_one_failure_does_not_stop_the_pass() {
        let notifier = Arc::new(RecordingNotifier::new(&[2]));
        let manager = BroadcastManager::new(
            populated_store(&[1, 2, 3]),
            notifier.clone(),
            create_shared_journal(100),
        );

        let report = manager
            .execute(&MessageContent::Text("Hello".to_string()))
            .await;

        // All three were attempted even though member 2 failed
        assert_eq!(report.attempted, 3);
        assert_eq!(report.delivered, 2);
        assert_eq!(report.failed, vec!["2".to_string()]);
        assert_eq!(notifier.sent.lock().len(), 3);
    }

    #[tokio::test]
    async fn test_failures_are_journaled() {
        let journal = create_shared_journal(100);
        let manager = BroadcastManager::new(
            populated_store(&[2]),
            Arc::new(RecordingNotifier::new(&[2])),
            journal.clone(),
        );

        manager
            .execute(&MessageContent::Text("Hello".to_string()))
            .await;

        let entries = journal.get_recent(10);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].context, "broadcast");
    }

    #[tokio::test]
    async fn test_empty_cohort_completes_immediately() {
        let manager = BroadcastManager::new(
            populated_store(&[]),
            Arc::new(RecordingNotifier::new(&[])),
            create_shared_journal(100),
        );

        let report = manager
            .execute(&MessageContent::Text("Hello".to_string()))
            .await;

        assert_eq!(report.attempted, 0);
        assert_eq!(report.delivered, 0);
    }

    #[tokio::test]
    async fn test_collecting_state_machine() {
        let manager = BroadcastManager::new(
            populated_store(&[]),
            Arc::new(RecordingNotifier::new(&[])),
            create_shared_journal(100),
        );
        let operator = UserId::new(1);

        assert!(manager.collecting_since(operator).is_none());
        assert!(!manager.cancel(operator));

        manager.begin(operator);
        assert!(manager.collecting_since(operator).is_some());

        // Cancel leaves the collecting state
        assert!(manager.cancel(operator));
        assert!(manager.collecting_since(operator).is_none());

        // Content arriving consumes the collecting state exactly once
        manager.begin(operator);
        assert!(manager.take_collecting(operator));
        assert!(!manager.take_collecting(operator));
    }

    /// Delivery callback that enrolls a fresh member on every send, so the
    /// store grows while the pass is running.
    struct EnrollingNotifier {
        store: SharedMemberStore,
        sent: parking_lot::Mutex<Vec<DeliveryTarget>>,
    }

    #[async_trait]
    impl Notifier for EnrollingNotifier {
        async fn send(
            &self,
            target: DeliveryTarget,
            _content: &MessageContent,
        ) -> Result<(), DeliveryError> {
            self.sent.lock().push(target);
            let mut store = self.store.write().await;
            let newcomer = 100 + store.member_count() as u64;
            store.upsert(
                &newcomer.to_string(),
                "Latecomer",
                MemberStatus::Pending,
                Utc::now(),
            );
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_members_added_mid_broadcast_are_not_attempted() {
        let store = populated_store(&[1, 2, 3]);
        let notifier = Arc::new(EnrollingNotifier {
            store: store.clone(),
            sent: parking_lot::Mutex::new(Vec::new()),
        });
        let manager =
            BroadcastManager::new(store.clone(), notifier.clone(), create_shared_journal(100));

        let report = manager
            .execute(&MessageContent::Text("Hello".to_string()))
            .await;

        // The pass covers the snapshot, not the grown store
        assert_eq!(report.attempted, 3);
        assert_eq!(report.delivered, 3);
        assert_eq!(notifier.sent.lock().len(), 3);
        assert_eq!(store.read().await.member_count(), 6);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sends_are_spaced_by_the_throttle() {
        let manager = BroadcastManager::new(
            populated_store(&[1, 2, 3]),
            Arc::new(RecordingNotifier::new(&[])),
            create_shared_journal(100),
        );

        let started = tokio::time::Instant::now();
        manager
            .execute(&MessageContent::Text("Hello".to_string()))
            .await;

        // Paused time only advances when the throttle sleeps fire
        assert!(started.elapsed() >= SEND_THROTTLE * 3);
    }
}
