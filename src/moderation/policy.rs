//! Who may run which moderation action.

use std::collections::HashSet;

use crate::moderation::error::StoreError;
use crate::moderation::store::Store;

/// Privileged operations a command can perform on a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    GrantAdmin,
    RevokeAdmin,
    Ban,
    Unban,
    Mute,
    Unmute,
    Warn,
    ResetWarns,
    AdjustReputation,
}

impl Action {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::GrantAdmin => "grant_admin",
            Self::RevokeAdmin => "revoke_admin",
            Self::Ban => "ban",
            Self::Unban => "unban",
            Self::Mute => "mute",
            Self::Unmute => "unmute",
            Self::Warn => "warn",
            Self::ResetWarns => "reset_warns",
            Self::AdjustReputation => "adjust_reputation",
        }
    }

    /// Reputation votes are open to every member; everything else is admin-only.
    pub fn requires_admin(self) -> bool {
        !matches!(self, Self::AdjustReputation)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny,
}

/// Authorization policy.
///
/// Super-actors (the configured owners) pass every gate. This is how the
/// first admin gets appointed on a fresh database.
#[derive(Debug, Clone, Default)]
pub struct Policy {
    super_actors: HashSet<i64>,
}

impl Policy {
    pub fn new(super_actors: impl IntoIterator<Item = i64>) -> Self {
        Self { super_actors: super_actors.into_iter().collect() }
    }

    pub fn is_super_actor(&self, user_id: i64) -> bool {
        self.super_actors.contains(&user_id)
    }

    /// Pure decision given what is already known about the actor.
    pub fn decide(&self, actor: i64, actor_is_admin: bool, action: Action) -> Decision {
        if !action.requires_admin() || actor_is_admin || self.is_super_actor(actor) {
            Decision::Allow
        } else {
            Decision::Deny
        }
    }

    /// Decide, reading the admin list only when the answer depends on it.
    pub fn authorize(&self, store: &Store, actor: i64, action: Action) -> Result<Decision, StoreError> {
        if !action.requires_admin() || self.is_super_actor(actor) {
            return Ok(Decision::Allow);
        }
        Ok(self.decide(actor, store.is_admin(actor)?, action))
    }
}
