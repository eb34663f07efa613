//! # Chatwarden Moderation
//!
//! Layered spam and abuse scoring engine for chat platforms.
//! Computes a verdict and a recommended enforcement action for each incoming
//! message from lightweight sender context (history, join time, reputation).
//!
//! ## Features
//!
//! - **Lexical matchers**: keyword, regex and obfuscation-tolerant pattern
//!   detection with an instant-disqualification tier
//! - **Behavior profiling**: per-sender rolling statistics and anomaly scoring
//! - **Context analysis**: conversation-aware false-positive suppression
//! - **Adaptive thresholds**: per-channel action cut-points learned from
//!   confirmed corrections
//! - **Reputation ledger**: points, levels, streaks and immunity
//! - **Statistical classifier**: incrementally retrainable text classifier
//!
//! ## Architecture
//!
//! The scoring pipeline runs per message:
//! disqualification checks, weighted heuristic accumulation, classifier
//! opinion, context discount, then the threshold decision with reputation
//! leniency and a history-tempered downgrade gate. Enforcement of the verdict
//! is the caller's job; confirmed outcomes feed back into the thresholds,
//! the ledger and the classifier training corpus.
//!
//! ## Example
//!
//! ```rust,no_run
//! use moderation::{Message, ModerationConfig, ScoringEngine};
//!
//! #[tokio::main]
//! async fn main() {
//!     let engine = ScoringEngine::new(ModerationConfig::default());
//!     let verdict = engine.score(&Message::text(1001, -42, "gm everyone")).await;
//!     println!("{:?} ({:.2})", verdict.action, verdict.score);
//! }
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub mod behavior;
pub mod classifier;
pub mod config;
pub mod context;
pub mod decision;
pub mod engine;
pub mod error;
pub mod metrics;
pub mod patterns;
pub mod reputation;
pub mod scanner;
pub mod text;
pub mod thresholds;
pub mod trackers;

pub use behavior::{AnomalyReport, BehaviorProfile, BehaviorProfiler};
pub use classifier::{ExampleLabel, Prediction, SpamClassifier};
pub use config::ModerationConfig;
pub use context::{ContextAnalyzer, ContextDiscount};
pub use decision::{Decision, DecisionEngine};
pub use engine::ScoringEngine;
pub use error::{ModerationError, Result};
pub use metrics::{DetectionStats, StatsSnapshot};
pub use patterns::LexicalMatchers;
pub use reputation::{ReputationLedger, ReputationLevel};
pub use scanner::{InferenceScanner, ScanOpinion, ZeroShotScanner};
pub use thresholds::{ActionThresholds, AdaptiveThresholds};
pub use trackers::RaidSignal;

/// Identifier of a message sender.
pub type SenderId = u64;

/// Identifier of a chat channel.
pub type ChannelId = i64;

/// Capability check the caller supplies. Keeps the core free of platform
/// API calls: whatever "is an admin" means on the host platform is decided
/// outside the engine.
pub trait AdminCheck: Send + Sync {
    /// True when the sender administrates the channel.
    fn is_admin(&self, channel: ChannelId, sender: SenderId) -> bool;
}

/// Ordered enforcement tiers, least to most severe.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// No action
    #[default]
    None,
    /// Log for review, leave the message in place
    Flag,
    /// Remove the message
    Delete,
    /// Remove the message and warn the sender
    DeleteAndWarn,
    /// Remove the message and restrict the sender
    Mute,
    /// Remove the sender
    Ban,
}

impl Action {
    /// Escalation-tier actions are the ones the decision gate may soften.
    pub fn is_escalation(&self) -> bool {
        matches!(self, Action::Mute | Action::Ban)
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Action::None => write!(f, "none"),
            Action::Flag => write!(f, "flag"),
            Action::Delete => write!(f, "delete"),
            Action::DeleteAndWarn => write!(f, "delete_and_warn"),
            Action::Mute => write!(f, "mute"),
            Action::Ban => write!(f, "ban"),
        }
    }
}

/// Categories a detector can attribute a violation to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationCategory {
    /// Explicit adult content, obfuscated or not
    AdultContent,
    /// Link to a disallowed automation account
    BotLink,
    /// Definite casino or betting spam
    CasinoSpam,
    /// Aggressive direct-message solicitation
    DmSolicitation,
    /// Configured instant keyword
    InstantKeyword,
    /// Combinatorial recruitment-scam score over the cutoff
    RecruitmentScam,
    /// Flexible scam regex (trading testimonials and similar)
    ScamPattern,
    /// Flood of custom-emoji entities
    PremiumEmojiFlood,
    /// Rich hyperlink entity decorated with emoji
    HyperlinkEmoji,
    /// Promotional emoji flood
    PromoFlood,
    /// Currency emoji from a new or low-reputation sender
    MoneyEmoji,
    /// Characters from a disallowed script range
    DisallowedScript,
    /// Weighted keyword-list hits
    SpamKeywords,
    /// Deny-listed or unclassified external link
    SuspiciousUrl,
    /// New sender posting links
    NewSenderLink,
    /// Cryptocurrency address shaped substring
    CryptoAddress,
    /// Formatting abuse (caps, repeats, emoji overload)
    Formatting,
    /// Repeated @-mention spam
    MentionSpam,
    /// Profanity list hits
    Profanity,
    /// Sending messages too fast
    RateLimit,
    /// Same text repeated across the channel
    DuplicateMessage,
    /// Deviation from the sender's own behavioral baseline
    BehaviorAnomaly,
    /// In-process statistical classifier opinion
    Classifier,
    /// Remote inference scanner opinion
    RemoteScanner,
    /// Malicious payload (caller-attributed)
    Malware,
    /// Automated account (caller-attributed)
    BotAccount,
}

impl ViolationCategory {
    /// Categories that override both immunity and history-based leniency.
    pub fn is_very_severe(&self) -> bool {
        matches!(
            self,
            ViolationCategory::AdultContent
                | ViolationCategory::BotLink
                | ViolationCategory::Malware
                | ViolationCategory::BotAccount
        )
    }
}

/// Kinds of rich entity spans a message can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// A bare URL span
    Url,
    /// Text carrying a hidden hyperlink
    TextLink,
    /// A platform custom emoji
    CustomEmoji,
    /// An @-mention span
    Mention,
}

/// A rich entity span attached to a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageEntity {
    /// Entity kind
    pub kind: EntityKind,
    /// Byte offset into the text
    pub offset: usize,
    /// Span length in bytes
    pub length: usize,
}

impl MessageEntity {
    /// Create an entity span.
    pub fn new(kind: EntityKind, offset: usize, length: usize) -> Self {
        Self {
            kind,
            offset,
            length,
        }
    }
}

/// An incoming message plus the lightweight sender context the caller
/// already holds. Input only; the engine never mutates it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Sender identifier
    pub sender: SenderId,
    /// Channel identifier
    pub channel: ChannelId,
    /// Raw message text
    pub text: String,
    /// Rich entity spans, if the transport provides them
    pub entities: Vec<MessageEntity>,
    /// Message timestamp
    pub timestamp: DateTime<Utc>,
    /// When the sender joined the channel, if known
    pub sender_joined_at: Option<DateTime<Utc>>,
    /// Reputation snapshot; computed from the ledger when absent
    pub sender_reputation: Option<i64>,
    /// True when this is the sender's first message in the channel
    pub is_first_message: bool,
}

impl Message {
    /// Build a plain text message timestamped now.
    pub fn text(sender: SenderId, channel: ChannelId, text: impl Into<String>) -> Self {
        Self {
            sender,
            channel,
            text: text.into(),
            entities: Vec::new(),
            timestamp: Utc::now(),
            sender_joined_at: None,
            sender_reputation: None,
            is_first_message: false,
        }
    }

    /// Attach entity spans.
    pub fn with_entities(mut self, entities: Vec<MessageEntity>) -> Self {
        self.entities = entities;
        self
    }

    /// Attach the sender's join timestamp.
    pub fn with_joined_at(mut self, joined_at: DateTime<Utc>) -> Self {
        self.sender_joined_at = Some(joined_at);
        self
    }

    /// Attach a reputation snapshot.
    pub fn with_reputation(mut self, points: i64) -> Self {
        self.sender_reputation = Some(points);
        self
    }
}

/// The outcome of scoring one message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Verdict {
    /// Verdict id
    pub id: String,
    /// Whether the message is considered spam
    pub is_spam: bool,
    /// Final accumulated score
    pub score: f64,
    /// Recommended enforcement action
    pub action: Action,
    /// Human-readable reasons contributing to the verdict
    pub reasons: Vec<String>,
    /// Detector categories that fired
    pub categories: Vec<ViolationCategory>,
    /// When the verdict was produced
    pub timestamp: DateTime<Utc>,
}

impl Verdict {
    /// A clean verdict with no action.
    pub fn clean() -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            is_spam: false,
            score: 0.0,
            action: Action::None,
            reasons: Vec::new(),
            categories: Vec::new(),
            timestamp: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_ordering_matches_severity() {
        assert!(Action::None < Action::Flag);
        assert!(Action::Flag < Action::Delete);
        assert!(Action::Delete < Action::DeleteAndWarn);
        assert!(Action::DeleteAndWarn < Action::Mute);
        assert!(Action::Mute < Action::Ban);
    }

    #[test]
    fn escalation_tiers() {
        assert!(Action::Mute.is_escalation());
        assert!(Action::Ban.is_escalation());
        assert!(!Action::DeleteAndWarn.is_escalation());
        assert!(!Action::None.is_escalation());
    }

    #[test]
    fn very_severe_categories_override_leniency() {
        assert!(ViolationCategory::AdultContent.is_very_severe());
        assert!(ViolationCategory::BotLink.is_very_severe());
        assert!(!ViolationCategory::CasinoSpam.is_very_severe());
        assert!(!ViolationCategory::SpamKeywords.is_very_severe());
    }

    #[test]
    fn clean_verdict_has_no_action() {
        let verdict = Verdict::clean();
        assert!(!verdict.is_spam);
        assert_eq!(verdict.action, Action::None);
        assert_eq!(verdict.score, 0.0);
    }
}
