//! Black-box scoring scenarios against the `score(message) -> verdict`
//! entry point.

use std::sync::Arc;

use chrono::{Duration, Utc};
use moderation::{
    Action, AdminCheck, ChannelId, Message, ModerationConfig, ScoringEngine, SenderId,
    ViolationCategory,
};

fn engine() -> (ScoringEngine, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let config = ModerationConfig {
        data_dir: dir.path().to_path_buf(),
        ..ModerationConfig::default()
    };
    (ScoringEngine::new(config), dir)
}

#[tokio::test]
async fn dm_solicitation_from_unknown_sender_is_banned() {
    let (engine, _dir) = engine();
    let msg = Message::text(10, -100, "DM me now for guaranteed profit").with_reputation(0);

    let verdict = engine.score(&msg).await;
    assert!(verdict.is_spam);
    assert_eq!(verdict.action, Action::Ban);
    assert!(verdict
        .categories
        .contains(&ViolationCategory::DmSolicitation));
}

#[tokio::test]
async fn ordinary_question_scores_clean() {
    let (engine, _dir) = engine();
    let msg = Message::text(11, -100, "How do I set a trailing stop loss?");

    let verdict = engine.score(&msg).await;
    assert!(!verdict.is_spam);
    assert_eq!(verdict.action, Action::None);
}

#[tokio::test]
async fn allow_listed_phrase_takes_precedence_over_everything() {
    let (engine, _dir) = engine();

    let with_allowed = Message::text(
        12,
        -100,
        "DM me now for guaranteed profit, also how to get promo code in mudrex?",
    )
    .with_reputation(0);
    let verdict = engine.score(&with_allowed).await;
    assert!(!verdict.is_spam);
    assert_eq!(verdict.action, Action::None);

    // Without the literal allow-listed substring the ban stands
    let without = Message::text(12, -100, "DM me now for guaranteed profit").with_reputation(0);
    let verdict = engine.score(&without).await;
    assert_eq!(verdict.action, Action::Ban);
}

#[tokio::test]
async fn disqualification_short_circuits_weighted_scoring() {
    let (engine, _dir) = engine();
    // Carries weighted triggers (keywords, link) alongside the casino phrase
    let msg = Message::text(
        13,
        -100,
        "casino bonus and free spins, click here https://bit.ly/offer",
    );

    let verdict = engine.score(&msg).await;
    assert!(verdict.is_spam);
    assert_eq!(verdict.action, Action::Ban);
    assert_eq!(verdict.categories, vec![ViolationCategory::CasinoSpam]);
    assert!(!verdict
        .categories
        .contains(&ViolationCategory::SuspiciousUrl));
}

#[tokio::test]
async fn money_emoji_verdict_depends_only_on_reputation() {
    let text = "💰💰 big day today";
    let joined = Utc::now() - Duration::hours(1);

    let (engine, _dir) = engine();
    let new_sender = Message::text(14, -100, text)
        .with_joined_at(joined)
        .with_reputation(0);
    let verdict = engine.score(&new_sender).await;
    assert!(verdict.is_spam);
    assert!(verdict.categories.contains(&ViolationCategory::MoneyEmoji));

    // Same text, same join time, trusted reputation
    let trusted = Message::text(15, -100, text)
        .with_joined_at(joined)
        .with_reputation(250);
    let verdict = engine.score(&trusted).await;
    assert!(!verdict.is_spam);
}

#[tokio::test]
async fn obfuscated_casino_phrase_is_still_disqualifying() {
    let (engine, _dir) = engine();
    // Cyrillic lookalikes inside "casino"
    let msg = Message::text(16, -100, "grab your саsіnо bonus today");

    let verdict = engine.score(&msg).await;
    assert!(verdict.is_spam);
    assert_eq!(verdict.action, Action::Ban);
}

#[tokio::test]
async fn clean_history_downgrades_a_disqualification_ban() {
    let (engine, _dir) = engine();
    let sender = 17;
    let base = Utc::now();

    for i in 0..6 {
        let msg = Message {
            timestamp: base + Duration::minutes(i * 10),
            ..Message::text(sender, -100, format!("market note number {i}, all quiet"))
        };
        let verdict = engine.score(&msg).await;
        assert_eq!(verdict.action, Action::None);
    }

    let spam = Message::text(sender, -100, "casino bonus for everyone");
    let verdict = engine.score(&spam).await;
    assert!(verdict.is_spam);
    assert_eq!(verdict.action, Action::DeleteAndWarn);
    assert!(verdict.reasons.iter().any(|r| r.contains("Downgraded")));
}

#[tokio::test]
async fn very_severe_content_bans_even_immune_senders() {
    let (engine, _dir) = engine();
    engine.on_admin_override(18);

    let msg = Message::text(18, -100, "free porn collection here").with_reputation(500);
    let verdict = engine.score(&msg).await;
    assert_eq!(verdict.action, Action::Ban);
}

#[tokio::test]
async fn immunity_downgrades_non_severe_disqualifications() {
    let (engine, _dir) = engine();
    engine.on_admin_override(19);

    let msg = Message::text(19, -100, "casino bonus for everyone");
    let verdict = engine.score(&msg).await;
    assert!(verdict.is_spam);
    assert_eq!(verdict.action, Action::DeleteAndWarn);
}

#[tokio::test]
async fn unclassified_link_forces_a_mute() {
    let (engine, _dir) = engine();
    let msg = Message::text(20, -100, "check this out https://sketchy-site.example/offer");

    let verdict = engine.score(&msg).await;
    assert!(verdict.is_spam);
    assert_eq!(verdict.action, Action::Mute);
    assert!(verdict
        .categories
        .contains(&ViolationCategory::SuspiciousUrl));
}

#[tokio::test]
async fn empty_message_yields_no_action() {
    let (engine, _dir) = engine();
    let verdict = engine.score(&Message::text(21, -100, "   ")).await;
    assert!(!verdict.is_spam);
    assert_eq!(verdict.action, Action::None);
    assert_eq!(verdict.score, 0.0);
}

#[tokio::test]
async fn raid_signal_does_not_change_per_message_scoring() {
    let (engine, _dir) = engine();
    let now = Utc::now();

    let mut signal = None;
    for i in 0..11 {
        signal = engine.record_join(-5, now + Duration::seconds(i * 10));
    }
    assert!(signal.is_some());

    let first_message = Message::text(99, -5, "hello everyone, glad to be here")
        .with_joined_at(now);
    let verdict = engine.score(&first_message).await;
    assert_eq!(verdict.action, Action::None);
}

#[test]
fn daily_point_cap_is_idempotent_across_calls() {
    let (engine, _dir) = engine();
    let now = Utc::now();
    for _ in 0..10 {
        engine.reputation().add_points(5, 30, "grant", now);
    }
    assert_eq!(engine.reputation().points(5), 50);
}

#[test]
fn threshold_corrections_never_leave_their_ranges() {
    let (engine, _dir) = engine();
    for _ in 0..30 {
        engine.adaptive_thresholds().record_false_positive(-7);
    }
    let up = engine.adaptive_thresholds().thresholds(-7);
    assert_eq!((up.escalate, up.moderate, up.flag), (0.95, 0.85, 0.5));

    for _ in 0..60 {
        engine.adaptive_thresholds().record_false_negative(-7);
    }
    let down = engine.adaptive_thresholds().thresholds(-7);
    assert_eq!((down.escalate, down.moderate, down.flag), (0.5, 0.3, 0.1));
}

#[test]
fn false_positive_feedback_reaches_every_component() {
    let (engine, _dir) = engine();
    let before = engine.adaptive_thresholds().thresholds(-2).escalate;

    engine.on_false_positive(-2, 3, "a perfectly normal discussion message");

    assert!(engine.adaptive_thresholds().thresholds(-2).escalate > before);
    assert_eq!(engine.reputation().points(3), 15);
}

#[test]
fn warnings_track_and_penalize() {
    let (engine, _dir) = engine();
    let now = Utc::now();

    assert_eq!(engine.add_warning(4, now), 1);
    assert_eq!(engine.add_warning(4, now), 2);
    assert_eq!(engine.warnings(4), 2);
    assert_eq!(engine.reputation().points(4), -20);

    engine.clear_warnings(4);
    assert_eq!(engine.warnings(4), 0);
}

struct FixedAdmin(SenderId);

impl AdminCheck for FixedAdmin {
    fn is_admin(&self, _channel: ChannelId, sender: SenderId) -> bool {
        sender == self.0
    }
}

#[tokio::test]
async fn admin_messages_are_never_scored() {
    let dir = tempfile::tempdir().unwrap();
    let config = ModerationConfig {
        data_dir: dir.path().to_path_buf(),
        ..ModerationConfig::default()
    };
    let engine = ScoringEngine::new(config).with_admin_check(Arc::new(FixedAdmin(42)));

    let verdict = engine
        .score(&Message::text(42, -1, "casino bonus free spins"))
        .await;
    assert!(!verdict.is_spam);
    assert_eq!(verdict.action, Action::None);

    // The same text from a non-admin is still disqualifying
    let verdict = engine
        .score(&Message::text(43, -1, "casino bonus free spins"))
        .await;
    assert_eq!(verdict.action, Action::Ban);
}

#[tokio::test]
async fn stats_count_scored_messages() {
    let (engine, _dir) = engine();
    engine.score(&Message::text(30, -1, "good morning")).await;
    engine
        .score(&Message::text(31, -1, "casino bonus time"))
        .await;

    let stats = engine.stats();
    assert_eq!(stats.messages_scored, 2);
    assert_eq!(stats.spam_detected, 1);
    assert_eq!(stats.disqualifications, 1);
    assert_eq!(stats.banned, 1);
}
