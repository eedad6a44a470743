//! Reactions to membership changes.

use tracing::info;

use crate::moderation::error::PlatformError;
use crate::moderation::message::{MembershipChange, MembershipTransition};
use crate::moderation::platform::ChatPlatform;

pub fn welcome_text(display_name: &str) -> String {
    format!("👋 Welcome, {display_name}!")
}

/// Greet new members. Returns whether a welcome was sent.
pub async fn react(platform: &dyn ChatPlatform, change: &MembershipChange) -> Result<bool, PlatformError> {
    if change.transition != MembershipTransition::Joined {
        return Ok(false);
    }

    info!("👋 Member joined: {} ({})", change.member.display_name, change.member.user_id);
    platform
        .send_message(change.chat_id, &welcome_text(&change.member.display_name))
        .await?;
    Ok(true)
}
