use anyhow::Result;
use clap::Parser;
use dotenv::dotenv;
use poise::serenity_prelude as serenity;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Discord bot that tracks payment confirmation for a community cohort
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Force re-sync of slash commands to all guilds (use when commands aren't showing up)
    #[arg(long, short = 's')]
    sync_commands: bool,

    /// Register commands per-guild instead of globally (faster for testing)
    #[arg(long)]
    guild_commands: bool,

    /// Specific guild ID to sync commands to (for testing)
    #[arg(long)]
    guild_id: Option<u64>,
}

mod commands;
mod config;
mod delivery;
mod error;
mod events;
mod managers;
mod state;

use commands::{broadcast, cancel, confirm, deliveries, help, pending, ping, report, start};
use config::BotConfig;
use delivery::{create_shared_journal, DiscordNotifier, Notifier};
use events::handle_message;
use managers::{create_shared_broadcast_manager, EscalationMonitor, SharedBroadcastManager};
use state::{
    create_shared_ledger, create_shared_member_store, MemberStore, SharedLedger,
    SharedMemberStore, TransactionLedger,
};

type Error = Box<dyn std::error::Error + Send + Sync>;
type Context<'a> = poise::Context<'a, Data, Error>;

/// Shared application state
pub struct Data {
    pub config: Arc<BotConfig>,
    pub member_store: SharedMemberStore,
    pub ledger: SharedLedger,
    pub broadcast_manager: SharedBroadcastManager,
    pub journal: delivery::SharedDeliveryJournal,
}

async fn event_handler(
    ctx: &serenity::Context,
    event: &serenity::FullEvent,
    _framework: poise::FrameworkContext<'_, Data, Error>,
    data: &Data,
) -> Result<(), Error> {
    match event {
        serenity::FullEvent::Message { new_message } => {
            if let Err(e) = handle_message(ctx, new_message, data).await {
                error!("Failed to handle message: {}", e);
            }
        }
        _ => {}
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    let args = Args::parse();

    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_level(true),
        )
        .with(tracing_subscriber::filter::LevelFilter::INFO)
        .init();

    let token = std::env::var("DISCORD_TOKEN").expect("Missing DISCORD_TOKEN environment variable");

    let bot_config = Arc::new(BotConfig::from_env()?);
    info!(
        "Operator: {}, oversight channel: {}, tick every {:?}, cooldown {} min",
        bot_config.operator_id,
        bot_config.oversight_channel_id,
        bot_config.tick_interval,
        bot_config.reminder_cooldown.num_minutes()
    );

    // Ensure state directory exists
    tokio::fs::create_dir_all(&bot_config.state_path).await.ok();

    info!("Loading member store...");
    let member_store = MemberStore::load(&bot_config.member_store_path())
        .await
        .unwrap_or_else(|e| {
            warn!("Could not load member store: {}, starting empty", e);
            MemberStore::new()
        });
    info!("{} members known", member_store.member_count());
    let shared_member_store = create_shared_member_store(member_store);

    info!("Loading transaction ledger...");
    let ledger = TransactionLedger::load(&bot_config.ledger_path())
        .await
        .unwrap_or_else(|e| {
            warn!("Could not load ledger: {}, starting empty", e);
            TransactionLedger::new()
        });
    let shared_ledger = create_shared_ledger(ledger);

    let journal = create_shared_journal(500);

    // Extract CLI flags for use in setup
    let sync_commands = args.sync_commands;
    let guild_commands = args.guild_commands;
    let target_guild_id = args.guild_id;

    if sync_commands {
        info!("--sync-commands: Will force re-register slash commands");
    }
    if guild_commands {
        info!("--guild-commands: Will register commands per-guild (faster for testing)");
    } else {
        info!("Registering commands globally by default (takes up to 1 hour to propagate)");
    }

    // Build framework
    let framework = poise::Framework::builder()
        .options(poise::FrameworkOptions {
            commands: vec![
                ping(),
                help(),
                start(),
                broadcast(),
                cancel(),
                confirm(),
                pending(),
                report(),
                deliveries(),
            ],
            event_handler: |ctx, event, framework, data| {
                Box::pin(event_handler(ctx, event, framework, data))
            },
            pre_command: |ctx| {
                Box::pin(async move {
                    info!(
                        "Command '{}' invoked by {} (ID: {})",
                        ctx.command().qualified_name,
                        ctx.author().name,
                        ctx.author().id
                    );
                })
            },
            on_error: |error| {
                Box::pin(async move {
                    match error {
                        poise::FrameworkError::Command { error, ctx, .. } => {
                            error!(
                                "Error in command '{}': {}",
                                ctx.command().qualified_name,
                                error
                            );
                            let _ = ctx.say(format!("An error occurred: {}", error)).await;
                        }
                        poise::FrameworkError::ArgumentParse {
                            error, input, ctx, ..
                        } => {
                            error!(
                                "Argument parse error in '{}': {} (input: {:?})",
                                ctx.command().qualified_name,
                                error,
                                input
                            );
                        }
                        other => {
                            error!("Other framework error: {}", other);
                        }
                    }
                })
            },
            ..Default::default()
        })
        .setup(move |ctx, ready, framework| {
            let bot_config = bot_config.clone();
            let shared_member_store = shared_member_store.clone();
            let shared_ledger = shared_ledger.clone();
            let journal = journal.clone();

            Box::pin(async move {
                info!("Bot logged in as: {}", ready.user.name);

                // Determine which guilds to register commands for
                let guilds_to_register: Vec<serenity::GuildId> = if let Some(gid) = target_guild_id
                {
                    vec![serenity::GuildId::new(gid)]
                } else {
                    ready.guilds.iter().map(|g| g.id).collect()
                };

                if guild_commands || sync_commands {
                    for guild_id in &guilds_to_register {
                        info!("Registering commands to guild: {}", guild_id);
                        if let Err(e) = poise::builtins::register_in_guild(
                            ctx,
                            &framework.options().commands,
                            *guild_id,
                        )
                        .await
                        {
                            error!("Failed to register commands for guild {}: {}", guild_id, e);
                        }
                    }
                } else {
                    info!("Registering commands globally...");
                    if let Err(e) =
                        poise::builtins::register_globally(ctx, &framework.options().commands).await
                    {
                        error!("Failed to register commands globally: {}", e);
                    }
                }

                let notifier: Arc<dyn Notifier> = Arc::new(DiscordNotifier::new(
                    ctx.http.clone(),
                    bot_config.oversight_channel_id,
                ));

                let broadcast_manager = create_shared_broadcast_manager(
                    shared_member_store.clone(),
                    notifier.clone(),
                    journal.clone(),
                );

                // The monitor gets its own task and timer so a slow tick can
                // never stall command or event handling
                let monitor = Arc::new(EscalationMonitor::new(
                    shared_member_store.clone(),
                    bot_config.member_store_path(),
                    notifier,
                    journal.clone(),
                    bot_config.operator_id,
                    bot_config.reminder_cooldown,
                ));
                tokio::spawn(monitor.run(bot_config.tick_interval));

                Ok(Data {
                    config: bot_config,
                    member_store: shared_member_store,
                    ledger: shared_ledger,
                    broadcast_manager,
                    journal,
                })
            })
        })
        .build();

    let intents = serenity::GatewayIntents::non_privileged()
        | serenity::GatewayIntents::MESSAGE_CONTENT;

    let mut client = serenity::ClientBuilder::new(token, intents)
        .framework(framework)
        .await?;

    info!("Starting bot...");
    if let Err(e) = client.start().await {
        let err_str = e.to_string();
        if err_str.contains("Disallowed") || err_str.contains("intents") {
            error!("Failed to start bot: {}", e);
            error!("Enable the MESSAGE_CONTENT privileged intent in the Discord Developer Portal");
            return Err(anyhow::anyhow!(
                "Disallowed gateway intents. Enable MESSAGE_CONTENT in the Discord Developer Portal"
            ));
        }
        return Err(e.into());
    }
    warn!("Bot ended.");

    Ok(())
}
