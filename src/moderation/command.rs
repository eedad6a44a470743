//! Command parsing and the command table.
//!
//! Each command maps to a pure handler that turns an [`Invocation`] into an
//! ordered list of [`Effect`]s. Handlers never touch the store or the
//! platform themselves; the pipeline applies the effects in order, so a
//! platform enforcement listed before a store write gates that write.

use crate::moderation::error::ModerationError;
use crate::moderation::message::Participant;
use crate::moderation::platform::PlatformAction;
use crate::moderation::policy::Action;

/// Largest leaderboard a user may request.
pub const MAX_TOP_LIMIT: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    Profile,
    SetAdmin,
    RemoveAdmin,
    Ban,
    Unban,
    Mute,
    Unmute,
    Warn,
    ResetWarns,
    Reputation,
    Top,
    BanList,
    MuteList,
}

impl CommandKind {
    pub const ALL: [CommandKind; 13] = [
        Self::Profile,
        Self::SetAdmin,
        Self::RemoveAdmin,
        Self::Ban,
        Self::Unban,
        Self::Mute,
        Self::Unmute,
        Self::Warn,
        Self::ResetWarns,
        Self::Reputation,
        Self::Top,
        Self::BanList,
        Self::MuteList,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Profile => "profile",
            Self::SetAdmin => "setadmin",
            Self::RemoveAdmin => "removeadmin",
            Self::Ban => "ban",
            Self::Unban => "unban",
            Self::Mute => "mute",
            Self::Unmute => "unmute",
            Self::Warn => "warn",
            Self::ResetWarns => "resetwarns",
            Self::Reputation => "rep",
            Self::Top => "top",
            Self::BanList => "banlist",
            Self::MuteList => "mutelist",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }

    /// Whether the command acts on the author of the replied-to message.
    pub fn requires_target(self) -> bool {
        self.action().is_some()
    }

    /// The gated action, if any.
    pub fn action(self) -> Option<Action> {
        match self {
            Self::SetAdmin => Some(Action::GrantAdmin),
            Self::RemoveAdmin => Some(Action::RevokeAdmin),
            Self::Ban => Some(Action::Ban),
            Self::Unban => Some(Action::Unban),
            Self::Mute => Some(Action::Mute),
            Self::Unmute => Some(Action::Unmute),
            Self::Warn => Some(Action::Warn),
            Self::ResetWarns => Some(Action::ResetWarns),
            Self::Reputation => Some(Action::AdjustReputation),
            Self::Profile | Self::Top | Self::BanList | Self::MuteList => None,
        }
    }
}

/// A command recognised in message text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCommand {
    pub kind: CommandKind,
    pub args: Vec<String>,
}

/// Parse `/name[@bot] args...`.
///
/// Returns `None` for plain text, unknown commands, and commands addressed
/// to a different bot.
pub fn parse(text: &str, bot_username: Option<&str>) -> Option<ParsedCommand> {
    let mut words = text.split_whitespace();
    let head = words.next()?.strip_prefix('/')?;

    let name = match head.split_once('@') {
        Some((name, addressee)) => {
            let ours = bot_username.is_some_and(|b| b.eq_ignore_ascii_case(addressee));
            if !ours {
                return None;
            }
            name
        }
        None => head,
    };

    let kind = CommandKind::from_name(&name.to_lowercase())?;
    Some(ParsedCommand { kind, args: words.map(str::to_string).collect() })
}

/// Everything a handler may look at.
#[derive(Debug, Clone)]
pub struct Invocation<'a> {
    pub actor: &'a Participant,
    /// Present for every command whose kind requires a target, and never
    /// the actor.
    pub target: Option<&'a Participant>,
    pub args: &'a [String],
}

impl Invocation<'_> {
    fn target(&self) -> Result<&Participant, ModerationError> {
        self.target.ok_or(ModerationError::NoTarget)
    }
}

/// Store writes a command can request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mutation {
    EnsureUser(i64),
    GrantAdmin(i64),
    RevokeAdmin(i64),
    Ban(i64),
    Unban(i64),
    Mute(i64),
    Unmute(i64),
    Warn(i64),
    ResetWarns(i64),
    AdjustReputation { user_id: i64, delta: i64 },
}

/// Replies rendered by the pipeline after the preceding effects ran.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Text(String),
    Profile(Participant),
    /// Rendered with the warning count the preceding write returned.
    Warned { actor: Participant, target: Participant },
    /// Rendered with the reputation the preceding write returned.
    Reputation { actor: Participant, target: Participant, delta: i64 },
    Leaderboard { limit: Option<usize> },
    BanList,
    MuteList,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    Enforce(PlatformAction),
    Record(Mutation),
    Reply(Reply),
}

pub type Handler = fn(&Invocation<'_>) -> Result<Vec<Effect>, ModerationError>;

/// The command table.
pub fn handler(kind: CommandKind) -> Handler {
    match kind {
        CommandKind::Profile => profile,
        CommandKind::SetAdmin => set_admin,
        CommandKind::RemoveAdmin => remove_admin,
        CommandKind::Ban => ban,
        CommandKind::Unban => unban,
        CommandKind::Mute => mute,
        CommandKind::Unmute => unmute,
        CommandKind::Warn => warn,
        CommandKind::ResetWarns => reset_warns,
        CommandKind::Reputation => reputation,
        CommandKind::Top => top,
        CommandKind::BanList => ban_list,
        CommandKind::MuteList => mute_list,
    }
}

/// A confirmation addressed to the actor.
fn confirm(inv: &Invocation<'_>, icon: &str, what: String) -> Effect {
    Effect::Reply(Reply::Text(format!("{icon} {}, {what}", inv.actor.display_name)))
}

fn profile(inv: &Invocation<'_>) -> Result<Vec<Effect>, ModerationError> {
    Ok(vec![
        Effect::Record(Mutation::EnsureUser(inv.actor.user_id)),
        Effect::Reply(Reply::Profile(inv.actor.clone())),
    ])
}

fn set_admin(inv: &Invocation<'_>) -> Result<Vec<Effect>, ModerationError> {
    let target = inv.target()?;
    Ok(vec![
        Effect::Record(Mutation::GrantAdmin(target.user_id)),
        confirm(inv, "✅", format!("{} is now an admin!", target.display_name)),
    ])
}

fn remove_admin(inv: &Invocation<'_>) -> Result<Vec<Effect>, ModerationError> {
    let target = inv.target()?;
    Ok(vec![
        Effect::Record(Mutation::RevokeAdmin(target.user_id)),
        confirm(inv, "❌", format!("{} is no longer an admin.", target.display_name)),
    ])
}

fn ban(inv: &Invocation<'_>) -> Result<Vec<Effect>, ModerationError> {
    let target = inv.target()?;
    Ok(vec![
        Effect::Enforce(PlatformAction::Ban { user_id: target.user_id }),
        Effect::Record(Mutation::Ban(target.user_id)),
        confirm(inv, "🚫", format!("{} has been banned.", target.display_name)),
    ])
}

fn unban(inv: &Invocation<'_>) -> Result<Vec<Effect>, ModerationError> {
    let target = inv.target()?;
    Ok(vec![
        Effect::Enforce(PlatformAction::LiftBan { user_id: target.user_id }),
        Effect::Record(Mutation::Unban(target.user_id)),
        confirm(inv, "✅", format!("{} has been unbanned!", target.display_name)),
    ])
}

fn mute(inv: &Invocation<'_>) -> Result<Vec<Effect>, ModerationError> {
    let target = inv.target()?;
    Ok(vec![
        Effect::Enforce(PlatformAction::RestrictSend { user_id: target.user_id, allowed: false }),
        Effect::Record(Mutation::Mute(target.user_id)),
        confirm(inv, "🔇", format!("{} has been muted.", target.display_name)),
    ])
}

fn unmute(inv: &Invocation<'_>) -> Result<Vec<Effect>, ModerationError> {
    let target = inv.target()?;
    Ok(vec![
        Effect::Enforce(PlatformAction::RestrictSend { user_id: target.user_id, allowed: true }),
        Effect::Record(Mutation::Unmute(target.user_id)),
        confirm(inv, "🔊", format!("{} can write again!", target.display_name)),
    ])
}

fn warn(inv: &Invocation<'_>) -> Result<Vec<Effect>, ModerationError> {
    let target = inv.target()?;
    Ok(vec![
        Effect::Record(Mutation::Warn(target.user_id)),
        Effect::Reply(Reply::Warned { actor: inv.actor.clone(), target: target.clone() }),
    ])
}

fn reset_warns(inv: &Invocation<'_>) -> Result<Vec<Effect>, ModerationError> {
    let target = inv.target()?;
    Ok(vec![
        Effect::Record(Mutation::ResetWarns(target.user_id)),
        confirm(inv, "🧹", format!("warnings of {} have been cleared.", target.display_name)),
    ])
}

fn reputation(inv: &Invocation<'_>) -> Result<Vec<Effect>, ModerationError> {
    let target = inv.target()?;
    let delta = match inv.args.first().map(String::as_str) {
        None | Some("+") | Some("+1") => 1,
        Some("-") | Some("-1") => -1,
        Some(other) => {
            return Err(ModerationError::InvalidArgument(format!(
                "expected + or -, got '{other}'"
            )));
        }
    };

    Ok(vec![
        Effect::Record(Mutation::AdjustReputation { user_id: target.user_id, delta }),
        Effect::Reply(Reply::Reputation { actor: inv.actor.clone(), target: target.clone(), delta }),
    ])
}

fn top(inv: &Invocation<'_>) -> Result<Vec<Effect>, ModerationError> {
    let limit = match inv.args.first() {
        None => None,
        Some(arg) => match arg.parse::<usize>() {
            Ok(n) if (1..=MAX_TOP_LIMIT).contains(&n) => Some(n),
            _ => {
                return Err(ModerationError::InvalidArgument(format!(
                    "leaderboard size must be between 1 and {MAX_TOP_LIMIT}"
                )));
            }
        },
    };
    Ok(vec![Effect::Reply(Reply::Leaderboard { limit })])
}

fn ban_list(_: &Invocation<'_>) -> Result<Vec<Effect>, ModerationError> {
    Ok(vec![Effect::Reply(Reply::BanList)])
}

fn mute_list(_: &Invocation<'_>) -> Result<Vec<Effect>, ModerationError> {
    Ok(vec![Effect::Reply(Reply::MuteList)])
}
