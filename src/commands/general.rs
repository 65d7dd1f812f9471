use chrono::Utc;
use poise::serenity_prelude as serenity;
use tracing::info;

use crate::state::MemberStatus;
use crate::{Context, Error};

/// Check if the bot is running
#[poise::command(prefix_command, slash_command)]
pub async fn ping(ctx: Context<'_>) -> Result<(), Error> {
    info!("Ping command called by {}", ctx.author().name);
    ctx.send(
        poise::CreateReply::default()
            .content("Pong! Bot is working!")
            .ephemeral(true),
    )
    .await?;
    Ok(())
}

/// Show help information
#[poise::command(prefix_command, slash_command)]
pub async fn help(ctx: Context<'_>) -> Result<(), Error> {
    let config = &ctx.data().config;

    let mut embed = serenity::CreateEmbed::new()
        .title("Bot Commands")
        .description("Available commands:")
        .field("/start", "Enroll and start the payment workflow", false)
        .field("/ping", "Check if the bot is running", false)
        .field("/broadcast", "Send a message to every member (Operator)", false)
        .field("/cancel", "Cancel a broadcast before sending (Operator)", false)
        .field("/confirm", "Mark a member's payment as confirmed (Operator)", false)
        .field("/pending", "List members awaiting confirmation (Operator)", false)
        .field("/report", "Today's confirmed income (Operator)", false)
        .field("/deliveries", "Recent failed deliveries (Operator)", false)
        .color(0x3498db);

    if let Some(link) = &config.community_link {
        embed = embed.field("Community", link, false);
    }
    if let Some(link) = &config.contact_link {
        embed = embed.field("Contact the operator", link, false);
    }

    ctx.send(poise::CreateReply::default().embed(embed).ephemeral(true))
        .await?;
    Ok(())
}

/// Enroll in the payment workflow
///
/// Registers you as pending until the operator confirms your payment.
/// Running it again resets your registration.
#[poise::command(prefix_command, slash_command)]
pub async fn start(ctx: Context<'_>) -> Result<(), Error> {
    let author = ctx.author();
    let member_id = author.id.to_string();
    let display_name = author
        .global_name
        .clone()
        .unwrap_or_else(|| author.name.clone());

    {
        let mut store = ctx.data().member_store.write().await;
        store.upsert(&member_id, &display_name, MemberStatus::Pending, Utc::now());
        store.save(&ctx.data().config.member_store_path()).await?;
    }
    info!("Enrolled member {} ({}) as pending", display_name, member_id);

    let mut embed = serenity::CreateEmbed::new()
        .title("🚀 You're enrolled!")
        .description(
            "Send your payment receipt to the operator. You'll get a reminder \
             here until your payment is confirmed.",
        )
        .color(0x2ecc71);

    if let Some(link) = &ctx.data().config.contact_link {
        embed = embed.field("Contact the operator", link, false);
    }

    ctx.send(poise::CreateReply::default().embed(embed).ephemeral(true))
        .await?;
    Ok(())
}
