use std::time::Duration;

use poise::serenity_prelude::{ChannelId, UserId};

use crate::error::{BotError, Result};

/// Runtime configuration, built once at startup and passed by reference.
///
/// Everything comes from the environment (`.env` is loaded in `main`);
/// nothing in the bot reads an env var after this is constructed.
#[derive(Debug, Clone)]
pub struct BotConfig {
    /// The single identity allowed to broadcast, confirm payments and view reports.
    pub operator_id: UserId,

    /// Channel that mirrors every escalation so operators can follow along.
    pub oversight_channel_id: ChannelId,

    /// How often the escalation monitor wakes up.
    pub tick_interval: Duration,

    /// Minimum elapsed time between two reminders to the same member.
    pub reminder_cooldown: chrono::Duration,

    /// Directory holding the member store and transaction ledger files.
    pub state_path: String,

    /// Invite link shown to newly enrolled members.
    pub community_link: Option<String>,

    /// Contact link for reaching the operator directly.
    pub contact_link: Option<String>,
}

const DEFAULT_TICK_INTERVAL_SECS: u64 = 30;
const DEFAULT_COOLDOWN_SECS: i64 = 180;

impl BotConfig {
    /// Build the configuration from process environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let operator_id = UserId::new(require_parsed(&lookup, "OPERATOR_ID")?);
        let oversight_channel_id = ChannelId::new(require_parsed(&lookup, "OVERSIGHT_CHANNEL_ID")?);

        let tick_secs: u64 = optional_parsed(&lookup, "MONITOR_INTERVAL_SECS")?
            .unwrap_or(DEFAULT_TICK_INTERVAL_SECS);
        let cooldown_secs: i64 = optional_parsed(&lookup, "REMINDER_COOLDOWN_SECS")?
            .unwrap_or(DEFAULT_COOLDOWN_SECS);

        Ok(Self {
            operator_id,
            oversight_channel_id,
            tick_interval: Duration::from_secs(tick_secs),
            reminder_cooldown: chrono::Duration::seconds(cooldown_secs),
            state_path: lookup("STATE_PATH").unwrap_or_else(|| "state".to_string()),
            community_link: lookup("COMMUNITY_LINK"),
            contact_link: lookup("CONTACT_LINK"),
        })
    }

    /// Path of the member store file inside the state directory.
    pub fn member_store_path(&self) -> String {
        format!("{}/members.json", self.state_path)
    }

    /// Path of the transaction ledger file inside the state directory.
    pub fn ledger_path(&self) -> String {
        format!("{}/transactions.json", self.state_path)
    }
}

fn require_parsed<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &str,
) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    let raw = lookup(var).ok_or_else(|| BotError::ConfigMissing {
        var: var.to_string(),
    })?;
    raw.trim().parse().map_err(|e: T::Err| BotError::ConfigInvalid {
        var: var.to_string(),
        message: e.to_string(),
    })
}

fn optional_parsed<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &str,
) -> Result<Option<T>>
where
    T::Err: std::fmt::Display,
{
    match lookup(var) {
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e: T::Err| BotError::ConfigInvalid {
                var: var.to_string(),
                message: e.to_string(),
            }),
        None => Ok(None),
    }
}
