//! Outbound calls to the chat platform.

use async_trait::async_trait;

use crate::moderation::error::PlatformError;

/// Enforcement a command asks the platform to carry out in the current chat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlatformAction {
    /// Allow or forbid the user to send messages.
    RestrictSend { user_id: i64, allowed: bool },
    Ban { user_id: i64 },
    LiftBan { user_id: i64 },
}

/// The chat client. Timeouts and retries are the implementation's business;
/// callers only see success or failure.
#[async_trait]
pub trait ChatPlatform: Send + Sync {
    async fn send_message(&self, chat_id: i64, text: &str) -> Result<(), PlatformError>;

    async fn restrict_user_send(
        &self,
        chat_id: i64,
        user_id: i64,
        allowed: bool,
    ) -> Result<(), PlatformError>;

    async fn ban_user(&self, chat_id: i64, user_id: i64) -> Result<(), PlatformError>;

    async fn lift_ban(&self, chat_id: i64, user_id: i64) -> Result<(), PlatformError>;

    async fn enforce(&self, chat_id: i64, action: PlatformAction) -> Result<(), PlatformError> {
        match action {
            PlatformAction::RestrictSend { user_id, allowed } => {
                self.restrict_user_send(chat_id, user_id, allowed).await
            }
            PlatformAction::Ban { user_id } => self.ban_user(chat_id, user_id).await,
            PlatformAction::LiftBan { user_id } => self.lift_ban(chat_id, user_id).await,
        }
    }
}
