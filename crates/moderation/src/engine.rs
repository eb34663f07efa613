//! Scoring orchestrator
//!
//! Composes the detectors into one verdict per message. Stages run in a
//! fixed order: disqualification checks (each can short-circuit), weighted
//! accumulation, classifier opinion, context discount, then the threshold
//! decision with reputation leniency and the history-tempered downgrade
//! gate. A failing or absent detector contributes nothing; the pipeline
//! always terminates with a valid verdict.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use store::JsonStore;
use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    behavior::BehaviorProfiler,
    classifier::{ExampleLabel, SpamClassifier},
    config::ModerationConfig,
    context::ContextAnalyzer,
    decision::DecisionEngine,
    metrics::{DetectionStats, StatsSnapshot},
    patterns::{Disqualification, LexicalMatchers, TextVariants},
    reputation::ReputationLedger,
    scanner::InferenceScanner,
    thresholds::AdaptiveThresholds,
    trackers::{DuplicateTracker, JoinTracker, RaidSignal, RateTracker, WarningCounter},
    Action, AdminCheck, ChannelId, Message, SenderId, Verdict, ViolationCategory,
};

/// The scoring pipeline and its feedback surface.
pub struct ScoringEngine {
    config: ModerationConfig,
    lexical: LexicalMatchers,
    behavior: BehaviorProfiler,
    context: ContextAnalyzer,
    thresholds: AdaptiveThresholds,
    reputation: ReputationLedger,
    decision: DecisionEngine,
    classifier: Arc<SpamClassifier>,
    scanner: Option<Arc<dyn InferenceScanner>>,
    admin_check: Option<Arc<dyn AdminCheck>>,
    rate: RateTracker,
    duplicates: DuplicateTracker,
    warnings: WarningCounter,
    joins: JoinTracker,
    store: JsonStore,
    stats: DetectionStats,
}

impl ScoringEngine {
    /// Build the engine, loading persisted state from the configured data
    /// directory and training the classifier if no model exists yet.
    pub fn new(config: ModerationConfig) -> Self {
        let store = JsonStore::new(&config.data_dir);
        info!(data_dir = %config.data_dir.display(), "Initializing moderation engine");

        Self {
            lexical: LexicalMatchers::new(config.lexical.clone()),
            behavior: BehaviorProfiler::new(config.behavior.clone()),
            context: ContextAnalyzer::new(config.context.clone()),
            thresholds: AdaptiveThresholds::new(config.thresholds.clone(), store.clone()),
            reputation: ReputationLedger::new(config.reputation.clone(), store.clone()),
            decision: DecisionEngine::new(config.decision.clone()),
            classifier: Arc::new(SpamClassifier::new(config.classifier.clone(), store.clone())),
            scanner: None,
            admin_check: None,
            rate: RateTracker::new(config.tracking.clone()),
            duplicates: DuplicateTracker::new(config.tracking.clone()),
            warnings: WarningCounter::new(),
            joins: JoinTracker::new(config.tracking.clone()),
            stats: DetectionStats::new(),
            store,
            config,
        }
    }

    /// Attach an optional remote inference scanner.
    pub fn with_scanner(mut self, scanner: Arc<dyn InferenceScanner>) -> Self {
        self.scanner = Some(scanner);
        self
    }

    /// Attach the caller's admin capability check. Messages from admins
    /// are never scored.
    pub fn with_admin_check(mut self, admin_check: Arc<dyn AdminCheck>) -> Self {
        self.admin_check = Some(admin_check);
        self
    }

    /// Score one message. Never fails: malformed input scores zero and
    /// detector failures degrade to no contribution.
    pub async fn score(&self, msg: &Message) -> Verdict {
        if msg.text.trim().is_empty() {
            let verdict = Verdict::clean();
            self.stats.record(verdict.action, false, false);
            return verdict;
        }

        if let Some(admin_check) = &self.admin_check {
            if admin_check.is_admin(msg.channel, msg.sender) {
                let verdict = Verdict::clean();
                self.stats.record(verdict.action, false, false);
                return verdict;
            }
        }

        let variants = TextVariants::derive(&msg.text);
        let reputation = msg
            .sender_reputation
            .unwrap_or_else(|| self.reputation.points(msg.sender));

        // Allow-list precedence: checked before every disqualifying
        // pattern, and before weighted scoring
        if let Some(phrase) = self.lexical.allow_listed(&variants) {
            debug!(sender = msg.sender, phrase, "Allow-listed phrase");
            let mut verdict = Verdict::clean();
            verdict.reasons.push(format!("Allow-listed phrase: {phrase}"));
            self.record_message(msg, 0.0);
            self.stats.record(verdict.action, false, false);
            return verdict;
        }

        // Disqualification stage, fixed order; each rule short-circuits
        if let Some(disq) = self.lexical.disqualify(msg, &variants) {
            return self.finalize_disqualification(msg, disq, reputation, 1.0);
        }
        if let Some(disq) = self.lexical.money_emoji(msg, reputation) {
            return self.finalize_disqualification(msg, disq, reputation, 0.8);
        }
        if let Some(disq) = self.lexical.script_violation(&msg.text) {
            return self.finalize_disqualification(msg, disq, reputation, 1.0);
        }

        // Weighted accumulation
        let mut score = 0.0;
        let mut reasons: Vec<String> = Vec::new();
        let mut categories: Vec<ViolationCategory> = Vec::new();
        let mut forced_action: Option<Action> = None;

        for hit in self.lexical.weighted(msg, &variants) {
            score += hit.score;
            reasons.push(hit.reason);
            categories.push(hit.category);
            if let Some(action) = hit.forced_action {
                forced_action = Some(forced_action.map_or(action, |f: Action| f.max(action)));
            }
        }

        let anomaly = self.behavior.anomaly(msg.sender, &msg.text, msg.timestamp);
        if anomaly.score > 0.0 {
            score += anomaly.score;
            reasons.extend(anomaly.reasons);
            categories.push(ViolationCategory::BehaviorAnomaly);
        }

        let rate_score = self.rate.record_and_score(msg.sender, msg.timestamp);
        if rate_score > 0.0 {
            score += rate_score;
            reasons.push("Sending messages too fast".to_string());
            categories.push(ViolationCategory::RateLimit);
        }

        let dup_score = self.duplicates.record_and_score(&msg.text, msg.sender);
        if dup_score > 0.0 {
            score += dup_score;
            reasons.push("Duplicate/repetitive message".to_string());
            categories.push(ViolationCategory::DuplicateMessage);
        }

        // Classifier opinion: additive, never disqualifying, and silent
        // below the confidence floor
        if let Some(prediction) = self.classifier.predict(&msg.text) {
            if prediction.is_spam {
                let contribution = self.classifier_contribution(prediction.confidence);
                if contribution > 0.0 {
                    score += contribution;
                    reasons.push(format!(
                        "Classifier: {:.0}% spam confidence",
                        prediction.confidence * 100.0
                    ));
                    categories.push(ViolationCategory::Classifier);
                }
            }
        }

        // Remote scanner under the same no-opinion contract
        if let Some(scanner) = &self.scanner {
            if let Some(opinion) = scanner.classify(&msg.text).await {
                if opinion.is_spam {
                    let contribution = self.classifier_contribution(opinion.confidence);
                    if contribution > 0.0 {
                        score += contribution;
                        reasons.push(format!(
                            "Remote scanner: {} ({:.0}%)",
                            opinion.label,
                            opinion.confidence * 100.0
                        ));
                        categories.push(ViolationCategory::RemoteScanner);
                    }
                }
            }
        }

        // Context discount
        let discount = self
            .context
            .discount(msg.channel, msg.sender, &msg.text, score);
        if discount.reduction > 0.0 {
            score = discount.adjusted;
            reasons.extend(discount.reasons);
        }

        // Threshold decision
        let tiers = self.thresholds.thresholds(msg.channel);
        let mut action = if score >= tiers.escalate {
            Action::DeleteAndWarn
        } else if score >= tiers.moderate {
            Action::Delete
        } else if score >= tiers.flag {
            Action::Flag
        } else {
            Action::None
        };
        let mut is_spam = score >= tiers.moderate;

        // A non-allow-listed link forces its action at full score
        if let Some(forced) = forced_action {
            if forced > action {
                action = forced;
                is_spam = true;
                score = 1.0;
            }
        }

        // Reputation leniency, except for very severe categories
        let very_severe = categories.iter().any(ViolationCategory::is_very_severe);
        if self.immune(msg.sender, reputation) && !very_severe {
            let downgraded = match action {
                Action::Ban => Some(Action::DeleteAndWarn),
                Action::Mute => Some(Action::Delete),
                Action::DeleteAndWarn if score < 0.9 => Some(Action::Delete),
                _ => None,
            };
            if let Some(new_action) = downgraded {
                reasons.push(format!(
                    "High reputation: {action} reduced to {new_action}"
                ));
                action = new_action;
            }
        }

        // Escalations pass the history-tempered gate before finalizing
        if action.is_escalation() {
            let primary = categories
                .first()
                .copied()
                .unwrap_or(ViolationCategory::SpamKeywords);
            let decision = self.decision.decide(msg.sender, action, primary);
            if decision.action != action {
                reasons.push(decision.reason);
                action = decision.action;
            }
        }

        self.record_message(msg, score);
        self.stats.record(action, is_spam, false);

        // Clean messages from reputable senders grow the legitimate corpus
        if action == Action::None
            && reputation >= self.config.learn_legitimate_min_reputation
            && msg.text.chars().count() > self.config.learn_legitimate_min_len
        {
            self.classifier.add_example(&msg.text, ExampleLabel::Legitimate);
        }

        Verdict {
            id: Uuid::new_v4().to_string(),
            is_spam,
            score,
            action,
            reasons,
            categories,
            timestamp: Utc::now(),
        }
    }

    /// Finish a verdict decided by the disqualification stage. Weighted
    /// scoring never runs; immunity and the decision gate still apply
    /// unless the category is very severe.
    fn finalize_disqualification(
        &self,
        msg: &Message,
        disq: Disqualification,
        reputation: i64,
        score: f64,
    ) -> Verdict {
        let mut action = disq.action;
        let mut reasons = vec![disq.reason];

        if self.immune(msg.sender, reputation)
            && !disq.category.is_very_severe()
            && action.is_escalation()
        {
            let new_action = match action {
                Action::Ban => Action::DeleteAndWarn,
                _ => Action::Delete,
            };
            reasons.push(format!("High reputation: {action} reduced to {new_action}"));
            action = new_action;
        }

        if action.is_escalation() {
            let decision = self.decision.decide(msg.sender, action, disq.category);
            if decision.action != action {
                reasons.push(decision.reason);
                action = decision.action;
            }
        }

        self.record_message(msg, score);
        self.stats.record(action, true, true);

        Verdict {
            id: Uuid::new_v4().to_string(),
            is_spam: true,
            score,
            action,
            reasons,
            categories: vec![disq.category],
            timestamp: Utc::now(),
        }
    }

    /// Feed the message into the per-sender and per-channel state owned by
    /// the history-driven components.
    fn record_message(&self, msg: &Message, score: f64) {
        self.decision.record(msg.sender, score, msg.timestamp);
        self.behavior.record(msg.sender, &msg.text, msg.timestamp);
        self.context
            .record(msg.channel, msg.sender, &msg.text, msg.timestamp);
    }

    fn classifier_contribution(&self, confidence: f64) -> f64 {
        let cfg = &self.config.classifier;
        if confidence >= cfg.high_confidence {
            cfg.high_weight
        } else if confidence >= cfg.medium_confidence {
            cfg.medium_weight
        } else {
            0.0
        }
    }

    fn immune(&self, sender: SenderId, reputation: i64) -> bool {
        self.reputation.is_immune(sender) || reputation >= self.config.reputation.immunity_floor
    }

    // ---- feedback surface -------------------------------------------------

    /// An admin confirmed a message as spam.
    pub fn on_confirmed_spam(&self, text: &str) {
        self.classifier.add_example(text, ExampleLabel::Spam);
    }

    /// A flagged/actioned message was overturned as a false positive.
    pub fn on_false_positive(&self, channel: ChannelId, sender: SenderId, text: &str) {
        self.classifier.add_example(text, ExampleLabel::Legitimate);
        self.thresholds.record_false_positive(channel);
        self.reputation.on_unmute(sender, Utc::now());
    }

    /// The system under-reacted and an admin escalated.
    pub fn on_confirmed_escalation(&self, channel: ChannelId) {
        self.thresholds.record_false_negative(channel);
    }

    /// An admin granted a sender immunity.
    pub fn on_admin_override(&self, sender: SenderId) {
        self.reputation.set_immune(sender, true);
    }

    /// Record a channel join; returns a raid signal for the caller when
    /// the join window crosses its threshold. Per-message scoring is not
    /// affected by joins.
    pub fn record_join(&self, channel: ChannelId, now: DateTime<Utc>) -> Option<RaidSignal> {
        self.joins.record_join(channel, now)
    }

    /// Add a warning against a sender, applying the reputation penalty.
    /// Returns the new warning total.
    pub fn add_warning(&self, sender: SenderId, now: DateTime<Utc>) -> u32 {
        self.reputation.on_warning(sender, now);
        self.warnings.add(sender)
    }

    /// Current warning count for a sender.
    pub fn warnings(&self, sender: SenderId) -> u32 {
        self.warnings.get(sender)
    }

    /// Clear a sender's warnings.
    pub fn clear_warnings(&self, sender: SenderId) {
        self.warnings.clear(sender);
    }

    /// The reputation ledger.
    pub fn reputation(&self) -> &ReputationLedger {
        &self.reputation
    }

    /// The adaptive threshold learner.
    pub fn adaptive_thresholds(&self) -> &AdaptiveThresholds {
        &self.thresholds
    }

    /// The statistical classifier.
    pub fn classifier(&self) -> &Arc<SpamClassifier> {
        &self.classifier
    }

    /// Persist behavior profiles, pruning stale senders.
    pub fn persist_profiles(&self, now: DateTime<Utc>) {
        self.behavior.persist(&self.store, now);
    }

    /// Counters snapshot.
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }
}
