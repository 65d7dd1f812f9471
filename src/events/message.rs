use chrono::Utc;
use poise::serenity_prelude as serenity;
use tracing::{debug, info};

use crate::delivery::MessageContent;
use crate::state::MemberStatus;
use crate::{Data, Error};

/// Handle incoming messages
pub async fn handle_message(
    ctx: &serenity::Context,
    msg: &serenity::Message,
    data: &Data,
) -> Result<(), Error> {
    // Ignore bot messages
    if msg.author.bot {
        return Ok(());
    }

    // An operator message while collecting becomes the broadcast content
    if msg.author.id == data.config.operator_id
        && data.broadcast_manager.take_collecting(msg.author.id)
    {
        return handle_broadcast_content(ctx, msg, data).await;
    }

    // First interaction enrolls the sender as pending; later messages
    // must not reset their reminder clock
    let member_id = msg.author.id.to_string();
    let already_known = {
        let store = data.member_store.read().await;
        store.contains(&member_id)
    };
    if !already_known {
        let display_name = msg
            .author
            .global_name
            .clone()
            .unwrap_or_else(|| msg.author.name.clone());
        let mut store = data.member_store.write().await;
        store.upsert(&member_id, &display_name, MemberStatus::Pending, Utc::now());
        store.save(&data.config.member_store_path()).await?;
        info!("Enrolled member {} ({}) on first contact", display_name, member_id);
    } else {
        debug!("Message from known member {}", member_id);
    }

    Ok(())
}

/// What the operator's message means while a broadcast is collecting
#[derive(Debug, Clone, PartialEq)]
enum OperatorReply {
    /// Explicit cancel signal
    Cancel,
    /// Nothing broadcastable: empty, or command text
    NotContent,
    /// Content to fan out
    Content(MessageContent),
}

/// Decide what to do with the operator's reply. Command-style text never
/// fans out to the cohort; typed "/cancel" ends the conversation even when
/// no command prefix is configured and it arrives as a plain message.
fn classify_reply(text: &str, attachment_url: Option<&str>) -> OperatorReply {
    if let Some(url) = attachment_url {
        let caption = if text.is_empty() {
            None
        } else {
            Some(text.to_string())
        };
        return OperatorReply::Content(MessageContent::Image {
            url: url.to_string(),
            caption,
        });
    }

    let trimmed = text.trim();
    if trimmed == "/cancel" {
        return OperatorReply::Cancel;
    }
    if trimmed.is_empty() || trimmed.starts_with('/') {
        return OperatorReply::NotContent;
    }

    OperatorReply::Content(MessageContent::Text(text.to_string()))
}

/// Turn the operator's message into broadcast content and fan it out.
///
/// The caller already consumed the collecting state; anything that is not
/// deliverable content re-enters it.
async fn handle_broadcast_content(
    ctx: &serenity::Context,
    msg: &serenity::Message,
    data: &Data,
) -> Result<(), Error> {
    let reply = classify_reply(&msg.content, msg.attachments.first().map(|a| a.url.as_str()));

    match reply {
        OperatorReply::Cancel => {
            info!("Broadcast cancelled by {}", msg.author.name);
            msg.reply(&ctx.http, "Broadcast cancelled.").await?;
        }
        OperatorReply::NotContent => {
            // Stay in the collecting state and prompt again
            data.broadcast_manager.begin(msg.author.id);
            msg.reply(
                &ctx.http,
                "Send plain text or an image to broadcast, or /cancel.",
            )
            .await?;
        }
        OperatorReply::Content(content) => {
            info!("Executing broadcast for {}", msg.author.name);
            let report = data.broadcast_manager.execute(&content).await;
            msg.reply(&ctx.http, report.summary()).await?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_becomes_content() {
        assert_eq!(
            classify_reply("Hello everyone", None),
            OperatorReply::Content(MessageContent::Text("Hello everyone".to_string()))
        );
    }

    #[test]
    fn test_cancel_text_ends_the_conversation() {
        assert_eq!(classify_reply("/cancel", None), OperatorReply::Cancel);
        assert_eq!(classify_reply("  /cancel ", None), OperatorReply::Cancel);
    }

    #[test]
    fn test_command_text_is_never_broadcast() {
        assert_eq!(classify_reply("/broadcast", None), OperatorReply::NotContent);
        assert_eq!(classify_reply("/help please", None), OperatorReply::NotContent);
    }

    #[test]
    fn test_empty_message_is_not_content() {
        assert_eq!(classify_reply("", None), OperatorReply::NotContent);
        assert_eq!(classify_reply("   ", None), OperatorReply::NotContent);
    }

    #[test]
    fn test_attachment_becomes_image_with_caption() {
        assert_eq!(
            classify_reply("March schedule", Some("https://cdn.example/a.png")),
            OperatorReply::Content(MessageContent::Image {
                url: "https://cdn.example/a.png".to_string(),
                caption: Some("March schedule".to_string()),
            })
        );
        assert_eq!(
            classify_reply("", Some("https://cdn.example/a.png")),
            OperatorReply::Content(MessageContent::Image {
                url: "https://cdn.example/a.png".to_string(),
                caption: None,
            })
        );
    }
}
