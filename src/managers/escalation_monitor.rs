use chrono::{DateTime, Utc};
use poise::serenity_prelude::UserId;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::delivery::{
    DeliveryTarget, FailedDelivery, MessageContent, Notifier, SharedDeliveryJournal,
};
use crate::error::Result;
use crate::state::SharedMemberStore;

/// What one monitor tick did
#[derive(Debug, Clone, Copy, Default)]
pub struct TickReport {
    /// Pending members considered
    pub scanned: usize,
    /// Members that got a reminder this tick
    pub escalated: usize,
    /// Records skipped because their timestamp would not parse
    pub skipped: usize,
}

/// Scans the member store on a fixed interval and escalates overdue members.
///
/// Each escalation is a direct reminder to the member plus a mirror message
/// to the oversight channel, after which the member's reminder clock resets.
/// The reset happens even when delivery fails: a member who has blocked the
/// bot must not generate a fresh alert on every tick.
pub struct EscalationMonitor {
    member_store: SharedMemberStore,
    store_path: String,
    notifier: Arc<dyn Notifier>,
    journal: SharedDeliveryJournal,
    operator_id: UserId,
    cooldown: chrono::Duration,
}

impl EscalationMonitor {
    pub fn new(
        member_store: SharedMemberStore,
        store_path: String,
        notifier: Arc<dyn Notifier>,
        journal: SharedDeliveryJournal,
        operator_id: UserId,
        cooldown: chrono::Duration,
    ) -> Self {
        Self {
            member_store,
            store_path,
            notifier,
            journal,
            operator_id,
            cooldown,
        }
    }

    /// Run forever on the given interval. Spawned as its own task so a slow
    /// tick cannot stall command or event handling.
    pub async fn run(self: Arc<Self>, tick_interval: std::time::Duration) {
        let mut interval = tokio::time::interval(tick_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        info!(
            "Escalation monitor running (interval {:?}, cooldown {} min)",
            tick_interval,
            self.cooldown.num_minutes()
        );

        loop {
            interval.tick().await;
            match self.tick(Utc::now()).await {
                Ok(report) if report.escalated > 0 || report.skipped > 0 => {
                    info!(
                        "Monitor tick: {} pending scanned, {} escalated, {} skipped",
                        report.scanned, report.escalated, report.skipped
                    );
                }
                Ok(_) => debug!("Monitor tick: nothing due"),
                // Storage trouble fails the whole tick; the next one starts fresh
                Err(e) => error!("Monitor tick failed: {}", e),
            }
        }
    }

    /// One pass over the pending cohort.
    ///
    /// `now` is captured once by the caller so every record in the tick is
    /// compared against the same instant.
    pub async fn tick(&self, now: DateTime<Utc>) -> Result<TickReport> {
        let pending = {
            let store = self.member_store.read().await;
            store.list_pending(&self.operator_id.to_string())
        };

        let mut report = TickReport {
            scanned: pending.len(),
            ..Default::default()
        };

        for member in pending {
            let last_reminder = match member.last_reminder_time() {
                Ok(time) => time,
                Err(e) => {
                    // Data-integrity fault: skip this record, keep the tick alive
                    warn!("Skipping member {}: {}", member.member_id, e);
                    report.skipped += 1;
                    continue;
                }
            };

            if now < last_reminder + self.cooldown {
                continue;
            }

            self.escalate(&member.member_id, &member.display_name, now)
                .await;

            {
                let mut store = self.member_store.write().await;
                store.touch_reminder(&member.member_id, now)?;
                store.save(&self.store_path).await?;
            }
            report.escalated += 1;
        }

        Ok(report)
    }

    /// Send the direct reminder and its oversight mirror. Failures are
    /// journaled and otherwise ignored; the caller resets the cooldown
    /// regardless of what happened here.
    async fn escalate(&self, member_id: &str, display_name: &str, now: DateTime<Utc>) {
        let reminder = format!(
            "⏰ **Time's up, {}!**\nYour payment receipt is more than {} minutes overdue. \
             Please send it as soon as possible.",
            display_name,
            self.cooldown.num_minutes()
        );
        let mirror = format!("⚠️ [ID: `{}`] {}", member_id, reminder);

        let direct_target = member_id
            .parse::<u64>()
            .map(|id| DeliveryTarget::Member(UserId::new(id)));

        match direct_target {
            Ok(target) => {
                if let Err(e) = self
                    .notifier
                    .send(target, &MessageContent::Text(reminder))
                    .await
                {
                    warn!("Reminder to member {} not delivered: {}", member_id, e);
                    self.journal.record(FailedDelivery {
                        at: now,
                        target: target.to_string(),
                        context: "escalation".to_string(),
                        reason: e.to_string(),
                    });
                }
            }
            Err(_) => warn!("Member id '{}' is not a valid user id", member_id),
        }

        if let Err(e) = self
            .notifier
            .send(DeliveryTarget::Oversight, &MessageContent::Text(mirror))
            .await
        {
            warn!("Oversight mirror for member {} not delivered: {}", member_id, e);
            self.journal.record(FailedDelivery {
                at: now,
                target: DeliveryTarget::Oversight.to_string(),
                context: "escalation".to_string(),
                reason: e.to_string(),
            });
        }
    }
}
