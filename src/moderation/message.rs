//! Platform-neutral inbound events.

/// A chat user as seen in an update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Participant {
    pub user_id: i64,
    pub display_name: String,
}

impl Participant {
    pub fn new(user_id: i64, display_name: impl Into<String>) -> Self {
        Self { user_id, display_name: display_name.into() }
    }
}

/// A text message in a served group.
#[derive(Debug, Clone)]
pub struct ChatMessage {
    pub chat_id: i64,
    pub from: Participant,
    pub text: String,
    /// Author of the message this one replies to.
    pub reply_to: Option<Participant>,
}

impl ChatMessage {
    pub fn is_command(&self) -> bool {
        self.text.starts_with('/')
    }
}

/// How a membership update changed the user's presence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MembershipTransition {
    Joined,
    Left,
    Banned,
    Other,
}

#[derive(Debug, Clone)]
pub struct MembershipChange {
    pub chat_id: i64,
    pub member: Participant,
    pub transition: MembershipTransition,
}
