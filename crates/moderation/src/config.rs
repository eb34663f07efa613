//! Configuration for the moderation engine
//!
//! Every tuning constant of the scoring pipeline is enumerated here with a
//! documented default. The defaults reproduce the reference policy; they are
//! starting points for per-deployment tuning, not derived truths.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{error::Result, Action, ModerationError};

/// Configuration for the moderation engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ModerationConfig {
    /// Directory holding the persisted stores
    pub data_dir: PathBuf,

    /// Lexical matcher configuration
    pub lexical: LexicalConfig,

    /// Behavior profiler configuration
    pub behavior: BehaviorConfig,

    /// Context analyzer configuration
    pub context: ContextConfig,

    /// Adaptive threshold configuration
    pub thresholds: ThresholdConfig,

    /// Reputation ledger configuration
    pub reputation: ReputationConfig,

    /// Decision gate configuration
    pub decision: DecisionConfig,

    /// Statistical classifier configuration
    pub classifier: ClassifierConfig,

    /// Remote inference scanner configuration
    pub scanner: ScannerConfig,

    /// Rate, duplicate and join tracker configuration
    pub tracking: TrackingConfig,

    /// Minimum reputation before clean messages are learned as legitimate
    /// classifier examples
    pub learn_legitimate_min_reputation: i64,

    /// Minimum text length before clean messages are learned
    pub learn_legitimate_min_len: usize,
}

impl Default for ModerationConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            lexical: LexicalConfig::default(),
            behavior: BehaviorConfig::default(),
            context: ContextConfig::default(),
            thresholds: ThresholdConfig::default(),
            reputation: ReputationConfig::default(),
            decision: DecisionConfig::default(),
            classifier: ClassifierConfig::default(),
            scanner: ScannerConfig::default(),
            tracking: TrackingConfig::default(),
            learn_legitimate_min_reputation: 50,
            learn_legitimate_min_len: 15,
        }
    }
}

impl ModerationConfig {
    /// Load configuration from a TOML file. Unknown keys are rejected so a
    /// typo is a startup error, not a silent fallback to a default.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        toml::from_str(&raw).map_err(|err| ModerationError::Configuration(err.to_string()))
    }
}

/// A contiguous Unicode range belonging to a named script.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptRange {
    /// Script label used in verdict reasons
    pub name: String,
    /// First code point of the range
    pub start: u32,
    /// Last code point of the range
    pub end: u32,
}

impl ScriptRange {
    fn new(name: &str, start: u32, end: u32) -> Self {
        Self {
            name: name.to_string(),
            start,
            end,
        }
    }

    /// True when `c` falls in this range.
    pub fn contains(&self, c: char) -> bool {
        (self.start..=self.end).contains(&(c as u32))
    }
}

/// Lexical matcher configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LexicalConfig {
    /// Phrases that bypass disqualification entirely. A verbatim substring
    /// match on any of these yields a clean verdict regardless of what else
    /// the text contains.
    pub allow_phrases: Vec<String>,

    /// Extra instant-disqualification keywords beyond the built-in families
    pub instant_keywords: Vec<String>,

    /// Bot handles exempt from the bot-link disqualifier
    pub safe_bot_handles: Vec<String>,

    /// Definite casino/betting phrases (disqualifying on their own)
    pub casino_phrases: Vec<String>,

    /// Aggressive direct-message solicitation phrases
    pub dm_phrases: Vec<String>,

    /// Weighted spam keyword list
    pub spam_keywords: Vec<String>,

    /// Domains that always pass URL classification
    pub allowed_domains: Vec<String>,

    /// Domains that always add weight (shorteners, known abuse)
    pub suspicious_domains: Vec<String>,

    /// Profanity detection toggle
    pub profanity_enabled: bool,

    /// Profanity word list, matched on word boundaries
    pub profanity_words: Vec<String>,

    /// Money-emoji rule configuration
    pub money_emoji: MoneyEmojiConfig,

    /// Custom-emoji entities at or above this count disqualify
    pub premium_emoji_threshold: usize,

    /// Emoji count above which a hyperlink entity disqualifies
    pub hyperlink_emoji_threshold: usize,

    /// Decorative glyph count that disqualifies when a link is present
    pub promo_flood_with_link: usize,

    /// Decorative glyph count that disqualifies alongside promo keywords
    pub promo_flood_without_link: usize,

    /// Promo keyword matches required by the no-link flood rule
    pub promo_flood_min_keywords: usize,

    /// Recruitment-scam composite configuration
    pub recruitment: RecruitmentConfig,

    /// Script disqualification toggle
    pub script_check_enabled: bool,

    /// Unicode ranges that disqualify a message
    pub blocked_scripts: Vec<ScriptRange>,

    /// Unicode ranges that never disqualify, even when visually similar
    pub allowed_scripts: Vec<ScriptRange>,

    /// Hours after joining during which posting a link adds weight
    pub new_sender_link_hours: i64,
}

impl Default for LexicalConfig {
    fn default() -> Self {
        Self {
            allow_phrases: vec![
                "how to get promo code".to_string(),
                "where do i enter the promo code".to_string(),
                "is there a promo code".to_string(),
            ],
            instant_keywords: Vec::new(),
            safe_bot_handles: vec!["chatwarden_bot".to_string()],
            casino_phrases: vec![
                "1win".to_string(),
                "1xbet".to_string(),
                "xwin".to_string(),
                "22bet".to_string(),
                "melbet".to_string(),
                "mostbet".to_string(),
                "linebet".to_string(),
                "casino bonus".to_string(),
                "free spins".to_string(),
                "slot machine".to_string(),
                "betting bonus".to_string(),
                "on your balance".to_string(),
                "activate the promo".to_string(),
                "activate promo".to_string(),
                "play anywhere".to_string(),
                "your balance".to_string(),
                "$200 free".to_string(),
                "$100 free".to_string(),
            ],
            dm_phrases: vec![
                "dm me now".to_string(),
                "dm me".to_string(),
                "inbox me".to_string(),
                "message me now".to_string(),
            ],
            spam_keywords: vec![
                "dm me for".to_string(),
                "dm for gains".to_string(),
                "100x".to_string(),
                "guaranteed profit".to_string(),
                "free airdrop".to_string(),
                "claim now".to_string(),
                "act fast".to_string(),
                "limited time".to_string(),
                "wallet connect".to_string(),
                "validate wallet".to_string(),
                "sync wallet".to_string(),
                "click here".to_string(),
                "join now".to_string(),
                "hurry up".to_string(),
                "don't miss".to_string(),
                "make money fast".to_string(),
                "work from home".to_string(),
                "be your own boss".to_string(),
                "invest with me".to_string(),
                "trading signals".to_string(),
                "binary options".to_string(),
                "forex signals".to_string(),
            ],
            allowed_domains: vec![
                "mudrex.com".to_string(),
                "binance.com".to_string(),
                "bybit.com".to_string(),
                "coingecko.com".to_string(),
                "coinmarketcap.com".to_string(),
                "tradingview.com".to_string(),
                "github.com".to_string(),
            ],
            suspicious_domains: vec![
                "bit.ly".to_string(),
                "tinyurl".to_string(),
                "t.co".to_string(),
                "goo.gl".to_string(),
                "telegram.me".to_string(),
                "t.me".to_string(),
            ],
            profanity_enabled: true,
            profanity_words: vec![
                "fuck".to_string(),
                "shit".to_string(),
                "bitch".to_string(),
                "asshole".to_string(),
                "bastard".to_string(),
            ],
            money_emoji: MoneyEmojiConfig::default(),
            premium_emoji_threshold: 5,
            hyperlink_emoji_threshold: 2,
            promo_flood_with_link: 8,
            promo_flood_without_link: 15,
            promo_flood_min_keywords: 2,
            recruitment: RecruitmentConfig::default(),
            script_check_enabled: true,
            blocked_scripts: vec![
                ScriptRange::new("chinese", 0x4E00, 0x9FFF),
                ScriptRange::new("chinese", 0x3400, 0x4DBF),
                ScriptRange::new("korean", 0xAC00, 0xD7A3),
                ScriptRange::new("korean", 0x1100, 0x11FF),
                ScriptRange::new("russian", 0x0400, 0x04FF),
                ScriptRange::new("japanese", 0x3040, 0x309F),
                ScriptRange::new("japanese", 0x30A0, 0x30FF),
                ScriptRange::new("arabic", 0x0600, 0x06FF),
                ScriptRange::new("thai", 0x0E00, 0x0E7F),
                ScriptRange::new("vietnamese", 0x1EA0, 0x1EFF),
            ],
            allowed_scripts: vec![
                ScriptRange::new("devanagari", 0x0900, 0x097F),
                ScriptRange::new("bengali", 0x0980, 0x09FF),
                ScriptRange::new("gurmukhi", 0x0A00, 0x0A7F),
                ScriptRange::new("gujarati", 0x0A80, 0x0AFF),
                ScriptRange::new("oriya", 0x0B00, 0x0B7F),
                ScriptRange::new("tamil", 0x0B80, 0x0BFF),
                ScriptRange::new("telugu", 0x0C00, 0x0C7F),
                ScriptRange::new("kannada", 0x0C80, 0x0CFF),
                ScriptRange::new("malayalam", 0x0D00, 0x0D7F),
            ],
            new_sender_link_hours: 24,
        }
    }
}

/// Money-emoji rule configuration. The same glyphs are benign from an
/// established sender, so the rule fires only for "new" senders.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MoneyEmojiConfig {
    /// Rule toggle
    pub enabled: bool,

    /// Currency glyphs the rule counts
    pub emojis: Vec<char>,

    /// Minimum glyph count before the rule applies
    pub threshold: usize,

    /// Senders below this reputation count as new
    pub min_reputation: i64,

    /// Senders at or above this reputation are exempt from the rule
    /// regardless of join time
    pub trusted_floor: i64,

    /// Senders joined within this many hours count as new
    pub new_sender_hours: i64,

    /// Action the rule recommends
    pub action: Action,
}

impl Default for MoneyEmojiConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            emojis: vec!['💰', '💵', '💸', '🤑', '💲', '💳', '🏧', '💎', '🪙'],
            threshold: 2,
            min_reputation: 1,
            trusted_floor: 201,
            new_sender_hours: 48,
            action: Action::Mute,
        }
    }
}

/// Weights and cutoff for the recruitment-scam composite. Individual
/// signals are weak on their own; the scam shape is the combination.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RecruitmentConfig {
    /// Weight of an external handle mention
    pub handle_weight: f64,
    /// Weight of a dollar-earnings claim
    pub earnings_weight: f64,
    /// Weight of remote-work phrasing
    pub remote_weight: f64,
    /// Weight of recruitment phrasing
    pub recruitment_weight: f64,
    /// Weight of a direct-message request
    pub dm_weight: f64,
    /// Weight of easy-money phrasing
    pub easy_weight: f64,
    /// Weight of attention-grabber glyphs
    pub attention_weight: f64,
    /// Weight of legitimacy-claim words
    pub legitimacy_weight: f64,
    /// Bonus when handle, attention glyphs and recruitment co-occur
    pub combo_bonus: f64,
    /// Combined score at or above this disqualifies
    pub cutoff: f64,
}

impl Default for RecruitmentConfig {
    fn default() -> Self {
        Self {
            handle_weight: 1.5,
            earnings_weight: 2.0,
            remote_weight: 1.0,
            recruitment_weight: 1.5,
            dm_weight: 2.0,
            easy_weight: 1.0,
            attention_weight: 1.0,
            legitimacy_weight: 0.5,
            combo_bonus: 1.0,
            cutoff: 3.5,
        }
    }
}

/// Behavior profiler configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BehaviorConfig {
    /// Rolling window capacity per sender
    pub window: usize,

    /// Minimum recorded messages before anomaly evaluation
    pub min_history: usize,

    /// Anomaly score at or above which the flag is set
    pub anomaly_threshold: f64,

    /// Profiles idle longer than this many days are pruned on persistence
    pub profile_retention_days: i64,
}

impl Default for BehaviorConfig {
    fn default() -> Self {
        Self {
            window: 100,
            min_history: 5,
            anomaly_threshold: 0.5,
            profile_retention_days: 90,
        }
    }
}

/// Context analyzer configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ContextConfig {
    /// Conversation window capacity per channel
    pub window: usize,

    /// Conversation window time limit in minutes
    pub window_minutes: i64,

    /// Legitimacy score at or above which the discount applies
    pub legitimacy_threshold: f64,

    /// Absolute cap on the score reduction
    pub max_reduction: f64,

    /// Fraction of the current score the reduction may reach
    pub reduction_factor: f64,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            window: 20,
            window_minutes: 30,
            legitimacy_threshold: 0.5,
            max_reduction: 0.4,
            reduction_factor: 0.6,
        }
    }
}

/// Adaptive threshold configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ThresholdConfig {
    /// Default escalate threshold (delete and warn)
    pub default_escalate: f64,
    /// Default moderate threshold (delete)
    pub default_moderate: f64,
    /// Default flag threshold
    pub default_flag: f64,

    /// Fixed nudge step applied per confirmed correction
    pub step: f64,

    /// Escalate tier clamp range
    pub escalate_min: f64,
    /// Escalate tier clamp range
    pub escalate_max: f64,
    /// Moderate tier clamp range
    pub moderate_min: f64,
    /// Moderate tier clamp range
    pub moderate_max: f64,
    /// Flag tier clamp range
    pub flag_min: f64,
    /// Flag tier clamp range
    pub flag_max: f64,

    /// Recorded outcomes required before batch learning runs
    pub min_outcomes: usize,

    /// Outcome history capacity per channel
    pub outcome_capacity: usize,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            default_escalate: 0.7,
            default_moderate: 0.5,
            default_flag: 0.3,
            step: 0.05,
            escalate_min: 0.5,
            escalate_max: 0.95,
            moderate_min: 0.3,
            moderate_max: 0.85,
            flag_min: 0.1,
            flag_max: 0.5,
            min_outcomes: 10,
            outcome_capacity: 100,
        }
    }
}

/// Reputation ledger configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReputationConfig {
    /// Points for the first message of a UTC day
    pub daily_activity_points: i64,
    /// Points for a report that led to action
    pub valid_report_points: i64,
    /// Penalty applied on a warning
    pub warning_penalty: i64,
    /// Penalty applied on a mute
    pub mute_penalty: i64,
    /// Credit applied when a mute is overturned
    pub unmute_bonus: i64,

    /// Maximum positive points a sender can earn per UTC day
    pub max_daily_points: i64,

    /// Minimum seconds between report credits
    pub report_cooldown_secs: i64,

    /// Bonus for a 7-day unbroken activity streak
    pub streak_week_bonus: i64,
    /// Bonus for a 30-day unbroken activity streak
    pub streak_month_bonus: i64,

    /// Points at which a sender becomes Member
    pub level_member: i64,
    /// Points at which a sender becomes Trusted
    pub level_trusted: i64,
    /// Points at which a sender becomes VIP
    pub level_vip: i64,

    /// Point balance at or above which a sender is immune
    pub immunity_floor: i64,
}

impl Default for ReputationConfig {
    fn default() -> Self {
        Self {
            daily_activity_points: 1,
            valid_report_points: 10,
            warning_penalty: 10,
            mute_penalty: 25,
            unmute_bonus: 15,
            max_daily_points: 50,
            report_cooldown_secs: 300,
            streak_week_bonus: 5,
            streak_month_bonus: 25,
            level_member: 51,
            level_trusted: 201,
            level_vip: 501,
            immunity_floor: 201,
        }
    }
}

/// Decision gate configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DecisionConfig {
    /// Message-quality history capacity per sender
    pub history: usize,

    /// Maximum senders tracked before LRU eviction
    pub max_senders: usize,

    /// Minimum history entries before leniency is considered
    pub min_history: usize,

    /// Scores below this count as safe messages
    pub safe_score: f64,

    /// Fraction of safe messages required for a downgrade
    pub safe_ratio: f64,
}

impl Default for DecisionConfig {
    fn default() -> Self {
        Self {
            history: 10,
            max_senders: 5000,
            min_history: 5,
            safe_score: 0.4,
            safe_ratio: 0.8,
        }
    }
}

/// Statistical classifier configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClassifierConfig {
    /// Minimum corpus size before a model is trained
    pub min_samples: usize,

    /// New spam examples that trigger a retrain
    pub retrain_batch: usize,

    /// Vocabulary cap for the n-gram features
    pub vocabulary: usize,

    /// Confidence at or above which the strong contribution applies
    pub high_confidence: f64,

    /// Confidence at or above which the weak contribution applies
    pub medium_confidence: f64,

    /// Score added at high confidence
    pub high_weight: f64,

    /// Score added at medium confidence
    pub medium_weight: f64,

    /// Examples shorter than this are not added to the corpus
    pub min_example_len: usize,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            min_samples: 20,
            retrain_batch: 10,
            vocabulary: 1500,
            high_confidence: 0.75,
            medium_confidence: 0.6,
            high_weight: 0.4,
            medium_weight: 0.2,
            min_example_len: 10,
        }
    }
}

/// Remote inference scanner configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScannerConfig {
    /// Scanner toggle
    pub enabled: bool,

    /// Inference endpoint URL
    pub endpoint: String,

    /// Bearer token, if the endpoint requires one
    pub api_key: Option<String>,

    /// Requests-per-minute budget
    pub rpm_limit: usize,

    /// Per-call timeout in seconds
    pub timeout_secs: u64,

    /// Candidate labels for zero-shot classification
    pub labels: Vec<String>,

    /// Labels that count as spam when they win
    pub spam_labels: Vec<String>,

    /// Minimum winning score before the opinion counts
    pub min_score: f64,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        let spam_labels = vec![
            "casino gambling spam".to_string(),
            "recruitment job scam".to_string(),
            "trading investment scam".to_string(),
            "phishing malicious link".to_string(),
        ];
        let mut labels = spam_labels.clone();
        labels.push("legitimate crypto discussion".to_string());
        labels.push("normal conversation".to_string());
        Self {
            enabled: false,
            endpoint: String::new(),
            api_key: None,
            rpm_limit: 10,
            timeout_secs: 10,
            labels,
            spam_labels,
            min_score: 0.6,
        }
    }
}

/// Rate, duplicate and join tracker configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TrackingConfig {
    /// Messages per minute before the rate score applies
    pub max_messages_per_minute: usize,

    /// Senders repeating the same text this many times count as a flood
    pub duplicate_threshold: usize,

    /// Distinct recent texts kept by the duplicate tracker
    pub duplicate_capacity: usize,

    /// Maximum senders tracked by the rate limiter
    pub max_tracked_senders: usize,

    /// Join window length in minutes for raid detection
    pub raid_window_minutes: i64,

    /// Joins within the window that signal a raid
    pub raid_threshold: usize,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            max_messages_per_minute: 10,
            duplicate_threshold: 3,
            duplicate_capacity: 100,
            max_tracked_senders: 10_000,
            raid_window_minutes: 5,
            raid_threshold: 10,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = ModerationConfig::default();
        assert!(config.lexical.script_check_enabled);
        assert!(config.lexical.money_emoji.enabled);
        assert!(!config.scanner.enabled);
        assert_eq!(config.thresholds.default_escalate, 0.7);
        assert_eq!(config.reputation.max_daily_points, 50);
    }

    #[test]
    fn config_serialization() {
        let config = ModerationConfig::default();
        let serialized = serde_json::to_string(&config).unwrap();
        let deserialized: ModerationConfig = serde_json::from_str(&serialized).unwrap();

        assert_eq!(
            config.lexical.spam_keywords,
            deserialized.lexical.spam_keywords
        );
        assert_eq!(config.decision.safe_score, deserialized.decision.safe_score);
    }

    #[test]
    fn partial_toml_uses_defaults() {
        let config: ModerationConfig = toml::from_str(
            r#"
            data_dir = "state"

            [thresholds]
            default_escalate = 0.8
            "#,
        )
        .unwrap();

        assert_eq!(config.data_dir, PathBuf::from("state"));
        assert_eq!(config.thresholds.default_escalate, 0.8);
        assert_eq!(config.thresholds.default_flag, 0.3);
        assert_eq!(config.tracking.raid_threshold, 10);
    }

    #[test]
    fn script_range_contains() {
        let range = ScriptRange::new("russian", 0x0400, 0x04FF);
        assert!(range.contains('д'));
        assert!(!range.contains('d'));
    }
}
