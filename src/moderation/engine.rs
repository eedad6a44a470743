//! Moderator engine - routes group updates to the pipeline, the reactor and
//! activity tracking.

use std::sync::Arc;
use tracing::{error, info, warn};

use crate::moderation::error::StoreError;
use crate::moderation::message::{ChatMessage, MembershipChange};
use crate::moderation::pipeline::{Outcome, Pipeline, PipelineConfig};
use crate::moderation::platform::ChatPlatform;
use crate::moderation::policy::Policy;
use crate::moderation::reactor;
use crate::moderation::store::Store;
use crate::moderation::trigger::TriggerDetector;

/// Moderator configuration.
#[derive(Debug, Clone)]
pub struct ModeratorConfig {
    pub pipeline: PipelineConfig,
    /// Reputation removed per trigger hit.
    pub trigger_penalty: i64,
}

impl Default for ModeratorConfig {
    fn default() -> Self {
        Self { pipeline: PipelineConfig::default(), trigger_penalty: 1 }
    }
}

/// The moderator.
pub struct Moderator {
    store: Arc<Store>,
    platform: Arc<dyn ChatPlatform>,
    pipeline: Pipeline,
    trigger: Box<dyn TriggerDetector>,
    trigger_penalty: i64,
}

impl Moderator {
    pub fn new(
        config: ModeratorConfig,
        store: Arc<Store>,
        policy: Policy,
        platform: Arc<dyn ChatPlatform>,
        trigger: Box<dyn TriggerDetector>,
    ) -> Self {
        let pipeline = Pipeline::new(config.pipeline, store.clone(), policy, platform.clone());
        Self {
            store,
            platform,
            pipeline,
            trigger,
            trigger_penalty: config.trigger_penalty,
        }
    }

    /// Handle a text message from a served group.
    pub async fn handle_message(&self, msg: &ChatMessage) -> Option<Outcome> {
        if msg.is_command() {
            let outcome = self.pipeline.handle(msg).await;
            if !matches!(outcome, Outcome::Ignored) {
                return Some(outcome);
            }
        }

        if let Err(e) = self.record_activity(msg).await {
            error!("Failed to record message from {}: {}", msg.from.user_id, e);
        }
        None
    }

    async fn record_activity(&self, msg: &ChatMessage) -> Result<(), StoreError> {
        let user_id = msg.from.user_id;
        self.store.increment_message_count(user_id)?;

        if !self.trigger.matches(&msg.text) {
            return Ok(());
        }

        let reputation = if self.trigger_penalty != 0 {
            self.store.adjust_reputation(user_id, -self.trigger_penalty)?
        } else {
            self.store.get_user(user_id)?.unwrap_or_default().reputation
        };
        info!("🤐 Trigger word from {} ({}), reputation now {}", msg.from.display_name, user_id, reputation);

        let text = if self.trigger_penalty != 0 {
            format!(
                "🤐 Mind your language, {}! Reputation -{} (now {}).",
                msg.from.display_name, self.trigger_penalty, reputation
            )
        } else {
            format!("🤐 Mind your language, {}!", msg.from.display_name)
        };
        if let Err(e) = self.platform.send_message(msg.chat_id, &text).await {
            warn!("Trigger notice not delivered: {}", e);
        }
        Ok(())
    }

    /// Handle a membership change in a served group.
    pub async fn handle_membership(&self, change: &MembershipChange) {
        if let Err(e) = reactor::react(self.platform.as_ref(), change).await {
            warn!("Welcome for {} not delivered: {}", change.member.user_id, e);
        }
    }

    /// Close the store. Called once at shutdown.
    pub fn shutdown(&self) {
        match self.store.close() {
            Ok(()) => info!("Store closed"),
            Err(e) => error!("Failed to close store: {}", e),
        }
    }
}
