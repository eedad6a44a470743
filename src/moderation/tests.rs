//! End-to-end tests for the moderation pipeline, the reactor and activity
//! tracking, against a recording fake platform.

use super::*;
use crate::moderation::error::{ModerationError, PlatformError};
use crate::moderation::message::MembershipTransition;
use crate::moderation::pipeline::{Outcome, Stage};
use crate::moderation::platform::ChatPlatform;
use crate::moderation::policy::Action;
use async_trait::async_trait;
use std::sync::{Arc, Mutex};

const CHAT: i64 = -100200;
const OWNER: i64 = 1;
const ADMIN: i64 = 2;
const MEMBER: i64 = 3;
const TARGET: i64 = 4;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Call {
    Send { chat_id: i64, text: String },
    Restrict { user_id: i64, allowed: bool },
    Ban { user_id: i64 },
    LiftBan { user_id: i64 },
}

/// Records every call; `fail_enforcement` makes restrict/ban/unban fail.
#[derive(Default)]
struct FakePlatform {
    calls: Mutex<Vec<Call>>,
    fail_enforcement: bool,
    fail_send: bool,
}

impl FakePlatform {
    fn failing() -> Self {
        Self { fail_enforcement: true, ..Default::default() }
    }

    fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn sent(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Send { text, .. } => Some(text),
                _ => None,
            })
            .collect()
    }

    fn enforcement(&self, call: Call) -> Result<(), PlatformError> {
        self.calls.lock().unwrap().push(call);
        if self.fail_enforcement {
            Err(PlatformError("Bad Request: not enough rights".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl ChatPlatform for FakePlatform {
    async fn send_message(&self, chat_id: i64, text: &str) -> Result<(), PlatformError> {
        self.calls.lock().unwrap().push(Call::Send { chat_id, text: text.to_string() });
        if self.fail_send {
            Err(PlatformError("network down".to_string()))
        } else {
            Ok(())
        }
    }

    async fn restrict_user_send(&self, _chat_id: i64, user_id: i64, allowed: bool) -> Result<(), PlatformError> {
        self.enforcement(Call::Restrict { user_id, allowed })
    }

    async fn ban_user(&self, _chat_id: i64, user_id: i64) -> Result<(), PlatformError> {
        self.enforcement(Call::Ban { user_id })
    }

    async fn lift_ban(&self, _chat_id: i64, user_id: i64) -> Result<(), PlatformError> {
        self.enforcement(Call::LiftBan { user_id })
    }
}

struct Harness {
    store: Arc<Store>,
    platform: Arc<FakePlatform>,
    moderator: Moderator,
}

fn harness_with(platform: FakePlatform, config: ModeratorConfig) -> Harness {
    let store = Arc::new(Store::open_in_memory().unwrap());
    store.grant_admin(ADMIN).unwrap();
    let platform = Arc::new(platform);
    let words = vec!["клоун".to_string(), "дурак".to_string()];
    let moderator = Moderator::new(
        config,
        store.clone(),
        Policy::new([OWNER]),
        platform.clone(),
        Box::new(WordListDetector::new(&words).unwrap()),
    );
    Harness { store, platform, moderator }
}

fn harness() -> Harness {
    harness_with(FakePlatform::default(), ModeratorConfig::default())
}

fn user(id: i64) -> Participant {
    let name = match id {
        OWNER => "Owner",
        ADMIN => "Ada",
        MEMBER => "Max",
        TARGET => "Tom",
        _ => "Someone",
    };
    Participant::new(id, name)
}

fn msg(from: i64, text: &str) -> ChatMessage {
    ChatMessage { chat_id: CHAT, from: user(from), text: text.to_string(), reply_to: None }
}

fn reply(from: i64, to: i64, text: &str) -> ChatMessage {
    ChatMessage { reply_to: Some(user(to)), ..msg(from, text) }
}

async fn run(h: &Harness, m: ChatMessage) -> Outcome {
    h.moderator.handle_message(&m).await.expect("expected a command outcome")
}

fn assert_rejected(outcome: &Outcome, expected_stage: Stage) -> &ModerationError {
    match outcome {
        Outcome::Rejected { stage, error, .. } => {
            assert_eq!(*stage, expected_stage);
            error
        }
        other => panic!("expected rejection, got {:?}", other),
    }
}

// =============================================================================
// TARGET RESOLUTION
// =============================================================================

mod target_resolution {
    use super::*;

    #[tokio::test]
    async fn test_setadmin_without_reply_is_no_target() {
        let h = harness();
        let outcome = run(&h, msg(OWNER, "/setadmin")).await;

        let error = assert_rejected(&outcome, Stage::Received);
        assert!(matches!(error, ModerationError::NoTarget));
        assert!(!h.store.is_admin(TARGET).unwrap());
        assert_eq!(h.store.list_admins().unwrap().len(), 1);
        assert!(h.platform.sent()[0].contains("User not found"));
    }

    #[tokio::test]
    async fn test_no_target_checked_before_authorization() {
        let h = harness();
        let outcome = run(&h, msg(MEMBER, "/ban")).await;
        assert!(matches!(assert_rejected(&outcome, Stage::Received), ModerationError::NoTarget));
    }

    #[tokio::test]
    async fn test_admin_cannot_target_self() {
        let h = harness();
        let outcome = run(&h, reply(ADMIN, ADMIN, "/ban")).await;

        let error = assert_rejected(&outcome, Stage::Received);
        assert!(matches!(error, ModerationError::InvalidArgument(_)));
        assert!(!h.store.is_banned(ADMIN).unwrap());
        assert!(!h.platform.calls().iter().any(|c| matches!(c, Call::Ban { .. })));
        assert!(h.platform.sent()[0].contains("someone other than yourself"));
    }

    #[tokio::test]
    async fn test_self_target_rejected_for_every_targeted_command() {
        let h = harness();
        for text in ["/setadmin", "/removeadmin", "/unban", "/mute", "/unmute", "/warn", "/resetwarns", "/rep +"] {
            let outcome = run(&h, reply(OWNER, OWNER, text)).await;
            assert!(
                matches!(assert_rejected(&outcome, Stage::Received), ModerationError::InvalidArgument(_)),
                "{text}"
            );
        }
        assert_eq!(h.store.user_count().unwrap(), 0);
        assert_eq!(h.store.list_admins().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_profile_needs_no_target() {
        let h = harness();
        let outcome = run(&h, msg(MEMBER, "/profile")).await;
        assert!(matches!(outcome, Outcome::Executed { .. }));
    }
}

// =============================================================================
// AUTHORIZATION
// =============================================================================

mod authorization {
    use super::*;

    #[tokio::test]
    async fn test_unban_by_member_is_forbidden() {
        let h = harness();
        h.store.ban(TARGET).unwrap();

        let outcome = run(&h, reply(MEMBER, TARGET, "/unban")).await;

        let error = assert_rejected(&outcome, Stage::TargetResolved);
        assert!(matches!(error, ModerationError::Forbidden { action: Action::Unban }));
        assert!(h.store.is_banned(TARGET).unwrap());
        assert!(!h.platform.calls().iter().any(|c| matches!(c, Call::LiftBan { .. })));
        assert!(h.platform.sent()[0].contains("only admins"));
    }

    #[tokio::test]
    async fn test_silent_denials() {
        let mut config = ModeratorConfig::default();
        config.pipeline.silent_denials = true;
        let h = harness_with(FakePlatform::default(), config);

        let outcome = run(&h, reply(MEMBER, TARGET, "/mute")).await;
        assert!(matches!(
            assert_rejected(&outcome, Stage::TargetResolved),
            ModerationError::Forbidden { .. }
        ));
        assert!(h.platform.calls().is_empty());
    }

    #[tokio::test]
    async fn test_owner_bootstraps_first_admin() {
        let h = harness();
        run(&h, reply(OWNER, MEMBER, "/setadmin")).await;
        assert!(h.store.is_admin(MEMBER).unwrap());

        // The new admin can now moderate.
        let outcome = run(&h, reply(MEMBER, TARGET, "/warn")).await;
        assert!(matches!(outcome, Outcome::Executed { .. }));
    }

    #[tokio::test]
    async fn test_removed_admin_loses_rights() {
        let h = harness();
        run(&h, reply(OWNER, ADMIN, "/removeadmin")).await;
        assert!(!h.store.is_admin(ADMIN).unwrap());

        let outcome = run(&h, reply(ADMIN, TARGET, "/warn")).await;
        assert!(matches!(
            assert_rejected(&outcome, Stage::TargetResolved),
            ModerationError::Forbidden { .. }
        ));
    }

    #[tokio::test]
    async fn test_reputation_open_to_members() {
        let h = harness();
        let outcome = run(&h, reply(MEMBER, TARGET, "/rep +")).await;
        match outcome {
            Outcome::Executed { replies, .. } => {
                assert_eq!(replies, vec!["⭐ Max, reputation of Tom raised to 1.".to_string()])
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(h.store.get_user(TARGET).unwrap().unwrap().reputation, 1);
    }

    #[tokio::test]
    async fn test_reputation_reply_reports_written_value() {
        let h = harness();
        h.store.adjust_reputation(TARGET, 5).unwrap();
        let outcome = run(&h, reply(MEMBER, TARGET, "/rep -")).await;
        match outcome {
            Outcome::Executed { replies, .. } => {
                assert_eq!(replies, vec!["⭐ Max, reputation of Tom lowered to 4.".to_string()])
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}

// =============================================================================
// EXECUTION
// =============================================================================

mod execution {
    use super::*;

    #[tokio::test]
    async fn test_unban_by_admin() {
        let h = harness();
        h.store.ban(TARGET).unwrap();

        let outcome = run(&h, reply(ADMIN, TARGET, "/unban")).await;

        assert!(matches!(outcome, Outcome::Executed { .. }));
        assert!(!h.store.is_banned(TARGET).unwrap());
        let lifts: Vec<_> = h
            .platform
            .calls()
            .into_iter()
            .filter(|c| matches!(c, Call::LiftBan { .. }))
            .collect();
        assert_eq!(lifts, vec![Call::LiftBan { user_id: TARGET }]);
        assert_eq!(h.platform.sent(), vec!["✅ Ada, Tom has been unbanned!".to_string()]);
    }

    #[tokio::test]
    async fn test_ban_then_mute_then_lift() {
        let h = harness();
        run(&h, reply(ADMIN, TARGET, "/ban")).await;
        run(&h, reply(ADMIN, TARGET, "/mute")).await;
        assert!(h.store.is_banned(TARGET).unwrap());
        assert!(h.store.is_muted(TARGET).unwrap());

        run(&h, reply(ADMIN, TARGET, "/unmute")).await;
        assert!(!h.store.is_muted(TARGET).unwrap());
        assert!(h.store.is_banned(TARGET).unwrap());

        let enforcement: Vec<_> = h
            .platform
            .calls()
            .into_iter()
            .filter(|c| !matches!(c, Call::Send { .. }))
            .collect();
        assert_eq!(
            enforcement,
            vec![
                Call::Ban { user_id: TARGET },
                Call::Restrict { user_id: TARGET, allowed: false },
                Call::Restrict { user_id: TARGET, allowed: true },
            ]
        );
    }

    #[tokio::test]
    async fn test_warn_reports_running_count() {
        let h = harness();
        run(&h, reply(ADMIN, TARGET, "/warn")).await;
        let outcome = run(&h, reply(ADMIN, TARGET, "/warn")).await;

        match outcome {
            Outcome::Executed { replies, .. } => assert_eq!(replies, vec!["⚠️ Ada, Tom has been warned (2 total).".to_string()]),
            other => panic!("unexpected {:?}", other),
        }

        run(&h, reply(ADMIN, TARGET, "/resetwarns")).await;
        assert_eq!(h.store.get_user(TARGET).unwrap().unwrap().warn_count, 0);
    }

    #[tokio::test]
    async fn test_profile_creates_and_reports() {
        let h = harness();
        h.store.increment_message_count(MEMBER).unwrap();
        h.store.increment_warn(MEMBER).unwrap();
        h.store.adjust_reputation(MEMBER, -2).unwrap();

        run(&h, msg(MEMBER, "/profile")).await;
        let sent = h.platform.sent();
        assert_eq!(
            sent,
            vec!["👤 Profile of Max\n⭐ Reputation: -2\n⚠️ Warnings: 1\n📩 Messages: 1".to_string()]
        );
        assert_eq!(h.store.user_count().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_profile_ensures_record() {
        let h = harness();
        run(&h, msg(MEMBER, "/profile")).await;
        assert!(h.store.get_user(MEMBER).unwrap().is_some());
        assert!(h.platform.sent()[0].contains("Reputation: 0"));
    }

    #[tokio::test]
    async fn test_top_and_lists() {
        let h = harness();
        for _ in 0..3 {
            h.store.increment_message_count(MEMBER).unwrap();
        }
        h.store.increment_message_count(TARGET).unwrap();
        h.store.ban(10).unwrap();

        run(&h, msg(MEMBER, "/top 1")).await;
        run(&h, msg(MEMBER, "/banlist")).await;
        run(&h, msg(MEMBER, "/mutelist")).await;

        let sent = h.platform.sent();
        assert_eq!(sent[0], "🏆 Most active:\n1. 3 — 3 messages");
        assert_eq!(sent[1], "🚫 Banned: 10");
        assert_eq!(sent[2], "🔇 Muted: nobody.");
    }

    #[tokio::test]
    async fn test_invalid_argument_rejected_after_authorization() {
        let h = harness();
        let outcome = run(&h, reply(MEMBER, TARGET, "/rep lots")).await;
        assert!(matches!(
            assert_rejected(&outcome, Stage::Authorized),
            ModerationError::InvalidArgument(_)
        ));
        assert!(h.store.get_user(TARGET).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_commands_for_other_bots_are_ignored() {
        let mut config = ModeratorConfig::default();
        config.pipeline.bot_username = Some("wardenbot".to_string());
        let h = harness_with(FakePlatform::default(), config);

        assert!(h.moderator.handle_message(&reply(ADMIN, TARGET, "/ban@otherbot")).await.is_none());
        assert!(!h.store.is_banned(TARGET).unwrap());

        let outcome = run(&h, reply(ADMIN, TARGET, "/ban@WardenBot")).await;
        assert!(matches!(outcome, Outcome::Executed { .. }));
    }
}

// =============================================================================
// PLATFORM FAILURES
// =============================================================================

mod platform_failures {
    use super::*;

    #[tokio::test]
    async fn test_failed_unmute_keeps_mute_entry() {
        let h = harness_with(FakePlatform::failing(), ModeratorConfig::default());
        h.store.mute(TARGET).unwrap();

        let outcome = run(&h, reply(ADMIN, TARGET, "/unmute")).await;

        assert!(matches!(
            assert_rejected(&outcome, Stage::Authorized),
            ModerationError::Platform(_)
        ));
        assert!(h.store.is_muted(TARGET).unwrap());
        assert!(h.platform.sent()[0].contains("nothing was changed"));
    }

    #[tokio::test]
    async fn test_failed_ban_records_nothing() {
        let h = harness_with(FakePlatform::failing(), ModeratorConfig::default());
        run(&h, reply(ADMIN, TARGET, "/ban")).await;
        assert!(!h.store.is_banned(TARGET).unwrap());
    }

    #[tokio::test]
    async fn test_failed_reply_still_applies_state() {
        let platform = FakePlatform { fail_send: true, ..Default::default() };
        let h = harness_with(platform, ModeratorConfig::default());

        let outcome = run(&h, reply(ADMIN, TARGET, "/mute")).await;
        assert!(matches!(outcome, Outcome::Executed { .. }));
        assert!(h.store.is_muted(TARGET).unwrap());
    }

    #[tokio::test]
    async fn test_store_failure_is_contained() {
        let h = harness();
        h.store.close().unwrap();

        let outcome = run(&h, reply(OWNER, TARGET, "/setadmin")).await;
        assert!(matches!(
            assert_rejected(&outcome, Stage::Authorized),
            ModerationError::Store(_)
        ));
        assert!(h.platform.sent().is_empty());
    }
}

// =============================================================================
// ACTIVITY AND TRIGGERS
// =============================================================================

mod activity {
    use super::*;

    #[tokio::test]
    async fn test_plain_messages_are_counted() {
        let h = harness();
        for text in ["hi", "how are you", "/dance"] {
            assert!(h.moderator.handle_message(&msg(MEMBER, text)).await.is_none());
        }
        assert_eq!(h.store.get_user(MEMBER).unwrap().unwrap().message_count, 3);
        assert!(h.platform.calls().is_empty());
    }

    #[tokio::test]
    async fn test_commands_are_not_counted() {
        let h = harness();
        run(&h, msg(MEMBER, "/profile")).await;
        assert_eq!(h.store.get_user(MEMBER).unwrap().unwrap().message_count, 0);
    }

    #[tokio::test]
    async fn test_trigger_word_costs_reputation() {
        let h = harness();
        h.moderator.handle_message(&msg(MEMBER, "сам ты КЛОУН")).await;

        let record = h.store.get_user(MEMBER).unwrap().unwrap();
        assert_eq!(record.reputation, -1);
        assert_eq!(record.message_count, 1);
        assert_eq!(h.platform.sent(), vec!["🤐 Mind your language, Max! Reputation -1 (now -1).".to_string()]);
    }

    #[tokio::test]
    async fn test_zero_penalty_only_warns() {
        let config = ModeratorConfig { trigger_penalty: 0, ..Default::default() };
        let h = harness_with(FakePlatform::default(), config);
        h.moderator.handle_message(&msg(MEMBER, "дураки кругом")).await;

        assert_eq!(h.store.get_user(MEMBER).unwrap().unwrap().reputation, 0);
        assert_eq!(h.platform.sent(), vec!["🤐 Mind your language, Max!".to_string()]);
    }
}

// =============================================================================
// MEMBERSHIP
// =============================================================================

mod membership {
    use super::*;

    fn change(transition: MembershipTransition) -> MembershipChange {
        MembershipChange { chat_id: CHAT, member: Participant::new(9, "Nina Petrova"), transition }
    }

    #[tokio::test]
    async fn test_join_is_welcomed() {
        let h = harness();
        h.moderator.handle_membership(&change(MembershipTransition::Joined)).await;
        assert_eq!(
            h.platform.calls(),
            vec![Call::Send { chat_id: CHAT, text: "👋 Welcome, Nina Petrova!".to_string() }]
        );
        assert_eq!(h.store.user_count().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_other_transitions_are_silent() {
        let h = harness();
        for t in [MembershipTransition::Left, MembershipTransition::Banned, MembershipTransition::Other] {
            h.moderator.handle_membership(&change(t)).await;
        }
        assert!(h.platform.calls().is_empty());
    }

    #[tokio::test]
    async fn test_reactor_reports_delivery_failure() {
        let platform = FakePlatform { fail_send: true, ..Default::default() };
        let result = reactor::react(&platform, &change(MembershipTransition::Joined)).await;
        assert!(result.is_err());
    }
}
