//! Outbound message delivery.
//!
//! Everything that leaves the bot goes through [`Notifier::send`], which
//! returns a per-attempt result and never unwinds past its boundary. One
//! recipient failing (blocked bot, deleted account, network blip) must never
//! affect any other recipient, the monitor tick or a running broadcast.

pub mod journal;

use async_trait::async_trait;
use poise::serenity_prelude as serenity;
use std::sync::Arc;
use thiserror::Error;

pub use journal::{create_shared_journal, DeliveryJournal, FailedDelivery, SharedDeliveryJournal};

/// Where a message goes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeliveryTarget {
    /// Direct message to one member
    Member(serenity::UserId),
    /// The fixed oversight channel
    Oversight,
}

impl std::fmt::Display for DeliveryTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeliveryTarget::Member(id) => write!(f, "member {}", id),
            DeliveryTarget::Oversight => write!(f, "oversight channel"),
        }
    }
}

/// What gets sent
#[derive(Debug, Clone, PartialEq)]
pub enum MessageContent {
    Text(String),
    Image {
        url: String,
        caption: Option<String>,
    },
}

#[derive(Error, Debug)]
pub enum DeliveryError {
    #[error("could not open a direct channel to member {member_id}: {message}")]
    DirectChannel {
        member_id: serenity::UserId,
        message: String,
    },

    #[error("send to {target} failed: {message}")]
    Send { target: String, message: String },
}

/// A single delivery attempt to a single recipient.
///
/// Implementations report failure through the result; they never panic and
/// never retry.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(
        &self,
        target: DeliveryTarget,
        content: &MessageContent,
    ) -> Result<(), DeliveryError>;
}

/// Delivery over the Discord REST API
pub struct DiscordNotifier {
    http: Arc<serenity::Http>,
    oversight_channel: serenity::ChannelId,
}

impl DiscordNotifier {
    pub fn new(http: Arc<serenity::Http>, oversight_channel: serenity::ChannelId) -> Self {
        Self {
            http,
            oversight_channel,
        }
    }

    fn build_message(content: &MessageContent) -> serenity::CreateMessage {
        match content {
            MessageContent::Text(text) => serenity::CreateMessage::new().content(text.clone()),
            MessageContent::Image { url, caption } => {
                let embed = serenity::CreateEmbed::new().image(url.clone());
                let mut message = serenity::CreateMessage::new().embed(embed);
                if let Some(caption) = caption {
                    message = message.content(caption.clone());
                }
                message
            }
        }
    }
}

#[async_trait]
impl Notifier for DiscordNotifier {
    async fn send(
        &self,
        target: DeliveryTarget,
        content: &MessageContent,
    ) -> Result<(), DeliveryError> {
        let message = Self::build_message(content);

        let channel_id = match target {
            DeliveryTarget::Member(member_id) => member_id
                .create_dm_channel(&self.http)
                .await
                .map_err(|e| DeliveryError::DirectChannel {
                    member_id,
                    message: e.to_string(),
                })?
                .id,
            DeliveryTarget::Oversight => self.oversight_channel,
        };

        channel_id
            .send_message(&self.http, message)
            .await
            .map(|_| ())
            .map_err(|e| DeliveryError::Send {
                target: target.to_string(),
                message: e.to_string(),
            })
    }
}
