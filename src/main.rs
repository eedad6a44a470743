mod config;
mod moderation;

use std::sync::Arc;

use teloxide::prelude::*;
use teloxide::types::{Chat, ChatMemberUpdated};
use tracing::{error, info, warn};
use tracing_subscriber::prelude::*;

use config::Config;
use moderation::telegram::{classify_transition, participant};
use moderation::{
    ChatMessage, MembershipChange, Moderator, ModeratorConfig, Participant, PipelineConfig, Policy,
    Store, TelegramClient,
};

struct BotState {
    config: Config,
    moderator: Moderator,
}

impl BotState {
    fn is_served(&self, chat: &Chat) -> bool {
        self.config.is_served(chat.is_supergroup(), chat.id)
    }
}

#[tokio::main]
async fn main() {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "groupwarden.json".to_string());
    let config = match Config::load(&config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    };

    // Setup logging
    let log_dir = config.data_dir.join("logs");
    std::fs::create_dir_all(&log_dir).ok();
    let log_file = match std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_dir.join("groupwarden.log"))
    {
        Ok(file) => file,
        Err(e) => {
            eprintln!("Failed to open log file: {e}");
            std::process::exit(1);
        }
    };
    let (non_blocking, _guard) = tracing_appender::non_blocking(log_file);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stdout)
                .with_filter(
                    tracing_subscriber::EnvFilter::from_default_env()
                        .add_directive(tracing::Level::INFO.into()),
                ),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_filter(
                    tracing_subscriber::EnvFilter::from_default_env()
                        .add_directive(tracing::Level::INFO.into()),
                ),
        )
        .init();

    info!("🚀 Starting groupwarden...");
    info!("Loaded config from {config_path}");
    info!("Owner IDs: {:?}", config.owner_ids);

    let store = match Store::open(&config.data_dir.join("bot_data.db")) {
        Ok(store) => Arc::new(store),
        Err(e) => {
            error!("Failed to open store: {e}");
            std::process::exit(1);
        }
    };

    match store.list_admins() {
        Ok(admins) => info!("Admins: {:?}", admins),
        Err(e) => warn!("Failed to list admins: {e}"),
    }

    let bot = Bot::new(&config.telegram_bot_token);

    let bot_username = match bot.get_me().await {
        Ok(me) => {
            info!("Bot user ID: {}, username: @{}", me.id, me.username());
            Some(me.username().to_string())
        }
        Err(e) => {
            warn!("Failed to get bot info: {e}");
            None
        }
    };

    let moderator_config = ModeratorConfig {
        pipeline: PipelineConfig {
            bot_username,
            top_limit: config.top_limit,
            silent_denials: config.silent_denials,
        },
        trigger_penalty: i64::from(config.trigger_penalty),
    };
    let policy = Policy::new(config.owner_ids.iter().map(|id| id.0 as i64));
    let moderator = Moderator::new(
        moderator_config,
        store,
        policy,
        Arc::new(TelegramClient::new(bot.clone())),
        Box::new(config.triggers.clone()),
    );

    let state = Arc::new(BotState { config, moderator });

    let handler = dptree::entry()
        .branch(Update::filter_message().endpoint(handle_message))
        .branch(Update::filter_chat_member().endpoint(handle_chat_member));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state.clone()])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    state.moderator.shutdown();
    info!("Stopped");
}

async fn handle_message(msg: Message, state: Arc<BotState>) -> ResponseResult<()> {
    if !state.is_served(&msg.chat) {
        return Ok(());
    }

    let user = match msg.from {
        Some(ref u) if !u.is_bot => u,
        _ => return Ok(()),
    };

    let text = match msg.text() {
        Some(t) => t,
        None => return Ok(()),
    };

    let reply_to = msg
        .reply_to_message()
        .and_then(|reply| reply.from.as_ref())
        .map(participant);

    let chat_msg = ChatMessage {
        chat_id: msg.chat.id.0,
        from: participant(user),
        text: text.to_string(),
        reply_to,
    };
    state.moderator.handle_message(&chat_msg).await;

    Ok(())
}

async fn handle_chat_member(update: ChatMemberUpdated, state: Arc<BotState>) -> ResponseResult<()> {
    if !state.is_served(&update.chat) {
        return Ok(());
    }

    let user = &update.new_chat_member.user;
    let change = MembershipChange {
        chat_id: update.chat.id.0,
        member: Participant::new(user.id.0 as i64, user.full_name()),
        transition: classify_transition(&update.old_chat_member.kind, &update.new_chat_member.kind),
    };
    state.moderator.handle_membership(&change).await;

    Ok(())
}
