use chrono::Utc;
use poise::serenity_prelude as serenity;
use tracing::info;

use crate::commands::require_operator;
use crate::error::BotError;
use crate::state::ledger::LEDGER_DATE_FORMAT;
use crate::state::MemberStatus;
use crate::{Context, Error};

/// Mark a member's payment as confirmed
///
/// Stops reminders for the member and records the amount in the ledger.
#[poise::command(prefix_command, slash_command)]
pub async fn confirm(
    ctx: Context<'_>,
    #[description = "The member whose payment arrived"] member: serenity::User,
    #[description = "Amount paid"] amount: f64,
) -> Result<(), Error> {
    if !require_operator(&ctx).await? {
        return Ok(());
    }

    let member_id = member.id.to_string();
    let now = Utc::now();

    let display_name = {
        let mut store = ctx.data().member_store.write().await;
        match store.set_status(&member_id, MemberStatus::Confirmed) {
            Ok(()) => {}
            Err(BotError::MemberNotFound { .. }) => {
                ctx.send(
                    poise::CreateReply::default()
                        .content(format!("{} is not enrolled.", member.name))
                        .ephemeral(true),
                )
                .await?;
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        }
        store.save(&ctx.data().config.member_store_path()).await?;
        store
            .get(&member_id)
            .map(|r| r.display_name.clone())
            .unwrap_or_else(|| member.name.clone())
    };

    {
        let mut ledger = ctx.data().ledger.write().await;
        ledger.append(&member_id, &display_name, amount, now);
        ledger.save(&ctx.data().config.ledger_path()).await?;
    }

    info!("Payment confirmed for {} ({}): {}", display_name, member_id, amount);
    ctx.send(
        poise::CreateReply::default()
            .content(format!("✅ Confirmed {} for {:.0}.", display_name, amount))
            .ephemeral(true),
    )
    .await?;
    Ok(())
}

/// List members still awaiting payment confirmation
#[poise::command(prefix_command, slash_command)]
pub async fn pending(ctx: Context<'_>) -> Result<(), Error> {
    if !require_operator(&ctx).await? {
        return Ok(());
    }

    let pending = {
        let store = ctx.data().member_store.read().await;
        store.list_pending(&ctx.data().config.operator_id.to_string())
    };

    if pending.is_empty() {
        ctx.send(
            poise::CreateReply::default()
                .content("Nobody is pending. 🎉")
                .ephemeral(true),
        )
        .await?;
        return Ok(());
    }

    let lines: Vec<String> = pending
        .iter()
        .map(|m| {
            format!(
                "• {} (`{}`) — last reminded {}",
                m.display_name, m.member_id, m.last_reminder_at
            )
        })
        .collect();

    let embed = serenity::CreateEmbed::new()
        .title(format!("⚙️ Pending members ({})", pending.len()))
        .description(lines.join("\n"))
        .color(0xe67e22);

    ctx.send(poise::CreateReply::default().embed(embed).ephemeral(true))
        .await?;
    Ok(())
}

/// Today's confirmed income
#[poise::command(prefix_command, slash_command)]
pub async fn report(ctx: Context<'_>) -> Result<(), Error> {
    if !require_operator(&ctx).await? {
        return Ok(());
    }

    let today = Utc::now().format(LEDGER_DATE_FORMAT).to_string();
    let total = {
        let ledger = ctx.data().ledger.read().await;
        ledger.total_for_day(&today)
    };

    ctx.send(
        poise::CreateReply::default()
            .content(format!("📊 **Income today ({}):** {:.0}", today, total))
            .ephemeral(true),
    )
    .await?;
    Ok(())
}

/// Recent failed deliveries
///
/// The monitor and the broadcaster never retry a failed send; this shows
/// what was dropped.
#[poise::command(prefix_command, slash_command)]
pub async fn deliveries(ctx: Context<'_>) -> Result<(), Error> {
    if !require_operator(&ctx).await? {
        return Ok(());
    }

    let recent = ctx.data().journal.get_recent(15);
    let content = if recent.is_empty() {
        "No failed deliveries recorded.".to_string()
    } else {
        recent
            .iter()
            .map(|e| e.format())
            .collect::<Vec<_>>()
            .join("\n")
    };

    ctx.send(
        poise::CreateReply::default()
            .content(content)
            .ephemeral(true),
    )
    .await?;
    Ok(())
}
