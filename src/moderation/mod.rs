//! Moderation module - user stats, ban/mute/admin lists and group commands.

pub mod command;
pub mod engine;
pub mod error;
pub mod message;
pub mod pipeline;
pub mod platform;
pub mod policy;
pub mod reactor;
pub mod store;
pub mod telegram;
pub mod trigger;

#[cfg(test)]
mod tests;

pub use engine::{Moderator, ModeratorConfig};
pub use message::{ChatMessage, MembershipChange, Participant};
pub use pipeline::PipelineConfig;
pub use policy::Policy;
pub use store::Store;
pub use telegram::TelegramClient;
pub use trigger::WordListDetector;
