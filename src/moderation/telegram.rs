//! Telegram client using teloxide.

use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::{ChatMemberKind, ChatMemberStatus, ChatPermissions, User};
use tracing::{info, warn};

use crate::moderation::error::PlatformError;
use crate::moderation::message::{MembershipTransition, Participant};
use crate::moderation::platform::ChatPlatform;

/// Telegram API client.
pub struct TelegramClient {
    bot: Bot,
}

impl TelegramClient {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

fn failed(what: &str, e: teloxide::RequestError) -> PlatformError {
    let msg = format!("Failed to {what}: {e}");
    warn!("{}", msg);
    PlatformError(msg)
}

#[async_trait]
impl ChatPlatform for TelegramClient {
    async fn send_message(&self, chat_id: i64, text: &str) -> Result<(), PlatformError> {
        self.bot
            .send_message(ChatId(chat_id), text)
            .await
            .map_err(|e| failed("send", e))?;
        Ok(())
    }

    async fn restrict_user_send(
        &self,
        chat_id: i64,
        user_id: i64,
        allowed: bool,
    ) -> Result<(), PlatformError> {
        let permissions = if allowed {
            info!("🔊 Allowing user {} to write in chat {}", user_id, chat_id);
            ChatPermissions::SEND_MESSAGES
        } else {
            info!("🔇 Muting user {} in chat {}", user_id, chat_id);
            ChatPermissions::empty()
        };

        self.bot
            .restrict_chat_member(ChatId(chat_id), UserId(user_id as u64), permissions)
            .await
            .map_err(|e| failed("restrict user", e))?;
        Ok(())
    }

    async fn ban_user(&self, chat_id: i64, user_id: i64) -> Result<(), PlatformError> {
        info!("🚫 Banning user {} from chat {}", user_id, chat_id);

        self.bot
            .ban_chat_member(ChatId(chat_id), UserId(user_id as u64))
            .await
            .map_err(|e| failed("ban user", e))?;
        Ok(())
    }

    async fn lift_ban(&self, chat_id: i64, user_id: i64) -> Result<(), PlatformError> {
        info!("✅ Unbanning user {} in chat {}", user_id, chat_id);

        // Without only_if_banned Telegram kicks users who are still present.
        self.bot
            .unban_chat_member(ChatId(chat_id), UserId(user_id as u64))
            .only_if_banned(true)
            .await
            .map_err(|e| failed("unban user", e))?;
        Ok(())
    }
}

/// Convert a Telegram user into a participant named by first name.
pub fn participant(user: &User) -> Participant {
    Participant::new(user.id.0 as i64, user.first_name.clone())
}

/// Classify a chat member update from its old and new membership.
///
/// Restricted users count as present only while `is_member` is set, so a
/// muted user who leaves and comes back is still a join.
pub fn classify_transition(old: &ChatMemberKind, new: &ChatMemberKind) -> MembershipTransition {
    classify_presence(old.is_present(), new.is_present(), new.status())
}

fn classify_presence(was_present: bool, present: bool, status: ChatMemberStatus) -> MembershipTransition {
    match (was_present, present) {
        (false, true) => MembershipTransition::Joined,
        (true, false) if status == ChatMemberStatus::Banned => MembershipTransition::Banned,
        (true, false) => MembershipTransition::Left,
        _ => MembershipTransition::Other,
    }
}
