//! Command pipeline: parse, resolve target, authorize, execute.

use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::moderation::command::{self, Effect, Invocation, Mutation, ParsedCommand, Reply};
use crate::moderation::error::{ModerationError, StoreError};
use crate::moderation::message::{ChatMessage, Participant};
use crate::moderation::platform::ChatPlatform;
use crate::moderation::policy::{Decision, Policy};
use crate::moderation::store::Store;

/// Furthest point a command reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Received,
    TargetResolved,
    Authorized,
    Executed,
}

#[derive(Debug)]
pub enum Outcome {
    /// Not a command for this bot.
    Ignored,
    Executed { command: ParsedCommand, replies: Vec<String> },
    /// Stopped at a gate; `stage` is the last stage passed.
    Rejected { command: ParsedCommand, stage: Stage, error: ModerationError },
}

/// Pipeline settings.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub bot_username: Option<String>,
    pub top_limit: usize,
    /// Drop Forbidden notices instead of answering them.
    pub silent_denials: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self { bot_username: None, top_limit: 10, silent_denials: false }
    }
}

pub struct Pipeline {
    config: PipelineConfig,
    store: Arc<Store>,
    policy: Policy,
    platform: Arc<dyn ChatPlatform>,
}

impl Pipeline {
    pub fn new(
        config: PipelineConfig,
        store: Arc<Store>,
        policy: Policy,
        platform: Arc<dyn ChatPlatform>,
    ) -> Self {
        Self { config, store, policy, platform }
    }

    /// Run a message through the pipeline and answer in the chat.
    ///
    /// Never fails: rejections become notices, delivery errors are logged.
    pub async fn handle(&self, msg: &ChatMessage) -> Outcome {
        let outcome = self.execute(msg).await;

        let notices: Vec<String> = match &outcome {
            Outcome::Ignored => Vec::new(),
            Outcome::Executed { replies, .. } => replies.clone(),
            Outcome::Rejected { command, error, .. } => {
                self.notice(command, &msg.from, error).into_iter().collect()
            }
        };

        for text in notices {
            if let Err(e) = self.platform.send_message(msg.chat_id, &text).await {
                warn!("Reply to {} not delivered: {}", msg.from.user_id, e);
            }
        }

        outcome
    }

    /// Run the pipeline without answering. Platform enforcement still happens.
    pub async fn execute(&self, msg: &ChatMessage) -> Outcome {
        let Some(command) = command::parse(&msg.text, self.config.bot_username.as_deref()) else {
            return Outcome::Ignored;
        };

        let mut stage = Stage::Received;
        match self.advance(msg, &command, &mut stage).await {
            Ok(replies) => {
                info!(
                    "/{} by {} ({}) executed",
                    command.kind.name(),
                    msg.from.display_name,
                    msg.from.user_id
                );
                Outcome::Executed { command, replies }
            }
            Err(error) => {
                match &error {
                    ModerationError::Store(e) => error!("/{} failed: {}", command.kind.name(), e),
                    ModerationError::Platform(e) => warn!("/{} failed: {}", command.kind.name(), e),
                    other => info!(
                        "/{} by {} rejected: {}",
                        command.kind.name(),
                        msg.from.user_id,
                        other
                    ),
                }
                Outcome::Rejected { command, stage, error }
            }
        }
    }

    async fn advance(
        &self,
        msg: &ChatMessage,
        command: &ParsedCommand,
        stage: &mut Stage,
    ) -> Result<Vec<String>, ModerationError> {
        let kind = command.kind;

        let target = if kind.requires_target() {
            let target = msg.reply_to.as_ref().ok_or(ModerationError::NoTarget)?;
            if target.user_id == msg.from.user_id {
                return Err(ModerationError::InvalidArgument(
                    "reply to someone other than yourself".to_string(),
                ));
            }
            Some(target)
        } else {
            None
        };
        *stage = Stage::TargetResolved;
        debug!("/{}: target {:?}", kind.name(), target.map(|t| t.user_id));

        if let Some(action) = kind.action()
            && self.policy.authorize(&self.store, msg.from.user_id, action)? == Decision::Deny
        {
            return Err(ModerationError::Forbidden { action });
        }
        *stage = Stage::Authorized;

        let invocation = Invocation { actor: &msg.from, target, args: &command.args };
        let effects = command::handler(kind)(&invocation)?;
        let replies = self.apply(msg.chat_id, effects).await?;
        *stage = Stage::Executed;
        Ok(replies)
    }

    /// Apply effects in order, stopping at the first failure.
    async fn apply(&self, chat_id: i64, effects: Vec<Effect>) -> Result<Vec<String>, ModerationError> {
        let mut replies = Vec::new();
        let mut recorded = None;
        for effect in effects {
            match effect {
                Effect::Enforce(action) => self.platform.enforce(chat_id, action).await?,
                Effect::Record(mutation) => recorded = self.record(mutation)?,
                Effect::Reply(reply) => replies.push(self.render(reply, recorded)?),
            }
        }
        Ok(replies)
    }

    /// Perform a store write. Counter updates return the new value.
    fn record(&self, mutation: Mutation) -> Result<Option<i64>, StoreError> {
        let store = &self.store;
        match mutation {
            Mutation::EnsureUser(id) => store.ensure_user(id).map(|_| None),
            Mutation::GrantAdmin(id) => store.grant_admin(id).map(|_| None),
            Mutation::RevokeAdmin(id) => store.revoke_admin(id).map(|_| None),
            Mutation::Ban(id) => store.ban(id).map(|_| None),
            Mutation::Unban(id) => store.unban(id).map(|_| None),
            Mutation::Mute(id) => store.mute(id).map(|_| None),
            Mutation::Unmute(id) => store.unmute(id).map(|_| None),
            Mutation::Warn(id) => store.increment_warn(id).map(|n| Some(i64::from(n))),
            Mutation::ResetWarns(id) => store.reset_warns(id).map(|_| None),
            Mutation::AdjustReputation { user_id, delta } => {
                store.adjust_reputation(user_id, delta).map(Some)
            }
        }
    }

    /// `recorded` is the value returned by the last counter write, so replies
    /// about a write never read the store again after it committed.
    fn render(&self, reply: Reply, recorded: Option<i64>) -> Result<String, StoreError> {
        let text = match reply {
            Reply::Text(text) => text,
            Reply::Profile(user) => {
                let record = self.store.get_user(user.user_id)?.unwrap_or_default();
                format!(
                    "👤 Profile of {}\n⭐ Reputation: {}\n⚠️ Warnings: {}\n📩 Messages: {}",
                    user.display_name, record.reputation, record.warn_count, record.message_count
                )
            }
            Reply::Warned { actor, target } => format!(
                "⚠️ {}, {} has been warned ({} total).",
                actor.display_name,
                target.display_name,
                recorded.unwrap_or_default()
            ),
            Reply::Reputation { actor, target, delta } => {
                let verb = if delta > 0 { "raised" } else { "lowered" };
                format!(
                    "⭐ {}, reputation of {} {} to {}.",
                    actor.display_name,
                    target.display_name,
                    verb,
                    recorded.unwrap_or_default()
                )
            }
            Reply::Leaderboard { limit } => {
                let top = self.store.top_by_message_count(limit.unwrap_or(self.config.top_limit))?;
                if top.is_empty() {
                    "🏆 Nobody has written anything yet.".to_string()
                } else {
                    let lines: Vec<String> = top
                        .iter()
                        .enumerate()
                        .map(|(i, (user_id, count))| format!("{}. {} — {} messages", i + 1, user_id, count))
                        .collect();
                    format!("🏆 Most active:\n{}", lines.join("\n"))
                }
            }
            Reply::BanList => id_list("🚫 Banned", &self.store.list_banned()?),
            Reply::MuteList => id_list("🔇 Muted", &self.store.list_muted()?),
        };
        Ok(text)
    }

    /// User-visible text for a rejection, if any.
    fn notice(&self, command: &ParsedCommand, actor: &Participant, error: &ModerationError) -> Option<String> {
        let name = command.kind.name();
        match error {
            ModerationError::NoTarget => {
                Some("👀 User not found! Reply to a message from the user you mean.".to_string())
            }
            ModerationError::Forbidden { .. } if self.config.silent_denials => None,
            ModerationError::Forbidden { .. } => {
                Some(format!("⛔ {}, only admins can use /{}.", actor.display_name, name))
            }
            ModerationError::InvalidArgument(msg) => Some(format!("⚠️ /{}: {}", name, msg)),
            ModerationError::Platform(_) => Some(format!("❌ Telegram refused /{}, nothing was changed.", name)),
            ModerationError::Store(_) => None,
        }
    }
}

fn id_list(label: &str, ids: &std::collections::BTreeSet<i64>) -> String {
    if ids.is_empty() {
        return format!("{label}: nobody.");
    }
    let ids: Vec<String> = ids.iter().map(|id| id.to_string()).collect();
    format!("{label}: {}", ids.join(", "))
}
