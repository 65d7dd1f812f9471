use tracing::info;

use crate::commands::require_operator;
use crate::{Context, Error};

/// Start a broadcast to every member
///
/// The next message you send (text, or an image with an optional caption)
/// goes out to the whole cohort. Use /cancel to back out before sending.
#[poise::command(prefix_command, slash_command)]
pub async fn broadcast(ctx: Context<'_>) -> Result<(), Error> {
    if !require_operator(&ctx).await? {
        return Ok(());
    }

    let manager = &ctx.data().broadcast_manager;
    if let Some(since) = manager.collecting_since(ctx.author().id) {
        ctx.send(
            poise::CreateReply::default()
                .content(format!(
                    "Already in broadcast mode (since {} UTC). Send the content, or /cancel.",
                    since.format("%H:%M:%S")
                ))
                .ephemeral(true),
        )
        .await?;
        return Ok(());
    }

    manager.begin(ctx.author().id);
    ctx.send(
        poise::CreateReply::default()
            .content(
                "📢 **Broadcast mode**\nSend the text or image to deliver to every member. \
                 Use /cancel to stop.",
            )
            .ephemeral(true),
    )
    .await?;
    Ok(())
}

/// Cancel a broadcast before its content is sent
#[poise::command(prefix_command, slash_command)]
pub async fn cancel(ctx: Context<'_>) -> Result<(), Error> {
    if !require_operator(&ctx).await? {
        return Ok(());
    }

    let content = if ctx.data().broadcast_manager.cancel(ctx.author().id) {
        info!("Broadcast cancelled by {}", ctx.author().name);
        "Broadcast cancelled."
    } else {
        "No broadcast in progress."
    };

    ctx.send(
        poise::CreateReply::default()
            .content(content)
            .ephemeral(true),
    )
    .await?;
    Ok(())
}
