//! Decision gate
//!
//! Reviews a proposed escalation against the sender's recent message
//! quality and can downgrade it. Strictly softening: it never returns an
//! action more severe than the one proposed, and a fixed set of very severe
//! violations is exempt from leniency entirely.

use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tracing::info;

use crate::{config::DecisionConfig, Action, SenderId, ViolationCategory};

/// One remembered message score.
#[derive(Debug, Clone, Copy)]
struct MessageQuality {
    score: f64,
}

/// The gate's verdict on a proposed action.
#[derive(Debug, Clone)]
pub struct Decision {
    /// Final action, never more severe than the proposal
    pub action: Action,
    /// Why the gate decided the way it did
    pub reason: String,
}

/// History-tempered softening gate for escalation-tier actions.
pub struct DecisionEngine {
    config: DecisionConfig,
    history: Mutex<HashMap<SenderId, VecDeque<MessageQuality>>>,
    last_access: Mutex<HashMap<SenderId, DateTime<Utc>>>,
}

impl DecisionEngine {
    /// Create the gate from configuration.
    pub fn new(config: DecisionConfig) -> Self {
        Self {
            config,
            history: Mutex::new(HashMap::new()),
            last_access: Mutex::new(HashMap::new()),
        }
    }

    /// Record a scored message into the sender's quality history.
    pub fn record(&self, sender: SenderId, score: f64, now: DateTime<Utc>) {
        self.evict_if_needed();

        let mut history = self.history.lock();
        let window = history.entry(sender).or_default();
        if window.len() >= self.config.history {
            window.pop_front();
        }
        window.push_back(MessageQuality { score });
        self.last_access.lock().insert(sender, now);
    }

    /// Review a proposed action. Escalations against a sender with a
    /// mostly-clean recent history are downgraded one tier; everything
    /// else passes through unchanged.
    pub fn decide(
        &self,
        sender: SenderId,
        proposed: Action,
        violation: ViolationCategory,
    ) -> Decision {
        if violation.is_very_severe() {
            return Decision {
                action: proposed,
                reason: format!("Severe violation ({violation:?}) overrides history"),
            };
        }

        if !proposed.is_escalation() {
            return Decision {
                action: proposed,
                reason: "Not an escalation-tier action".to_string(),
            };
        }

        let history = self.history.lock();
        let Some(window) = history.get(&sender) else {
            return Decision {
                action: proposed,
                reason: "No history".to_string(),
            };
        };

        let count = window.len();
        let safe = window
            .iter()
            .filter(|m| m.score < self.config.safe_score)
            .count();
        let safe_ratio = if count > 0 {
            safe as f64 / count as f64
        } else {
            0.0
        };

        if count >= self.config.min_history && safe_ratio >= self.config.safe_ratio {
            let reason = format!(
                "Downgraded to warn (safe ratio {:.0}% over {count} messages)",
                safe_ratio * 100.0
            );
            info!(sender, %proposed, "Escalation spared: {reason}");
            return Decision {
                action: Action::DeleteAndWarn,
                reason,
            };
        }

        Decision {
            action: proposed,
            reason: "History does not warrant leniency".to_string(),
        }
    }

    /// LRU eviction once the tracked-sender cap is hit.
    fn evict_if_needed(&self) {
        let mut history = self.history.lock();
        if history.len() <= self.config.max_senders {
            return;
        }
        let mut last_access = self.last_access.lock();
        let mut by_age: Vec<(SenderId, DateTime<Utc>)> = last_access
            .iter()
            .map(|(sender, ts)| (*sender, *ts))
            .collect();
        by_age.sort_by_key(|(_, ts)| *ts);

        let to_remove = self.config.max_senders / 10;
        for (sender, _) in by_age.into_iter().take(to_remove) {
            history.remove(&sender);
            last_access.remove(&sender);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> DecisionEngine {
        DecisionEngine::new(DecisionConfig::default())
    }

    #[test]
    fn no_history_passes_through() {
        let e = engine();
        let decision = e.decide(1, Action::Ban, ViolationCategory::CasinoSpam);
        assert_eq!(decision.action, Action::Ban);
    }

    #[test]
    fn clean_history_downgrades_a_ban() {
        let e = engine();
        let now = Utc::now();
        for _ in 0..6 {
            e.record(1, 0.1, now);
        }
        let decision = e.decide(1, Action::Ban, ViolationCategory::CasinoSpam);
        assert_eq!(decision.action, Action::DeleteAndWarn);
        assert!(decision.reason.contains("safe ratio"));
    }

    #[test]
    fn short_history_is_not_enough() {
        let e = engine();
        let now = Utc::now();
        for _ in 0..4 {
            e.record(1, 0.1, now);
        }
        let decision = e.decide(1, Action::Ban, ViolationCategory::CasinoSpam);
        assert_eq!(decision.action, Action::Ban);
    }

    #[test]
    fn spammy_history_is_not_spared() {
        let e = engine();
        let now = Utc::now();
        for _ in 0..10 {
            e.record(1, 0.6, now);
        }
        let decision = e.decide(1, Action::Mute, ViolationCategory::SpamKeywords);
        assert_eq!(decision.action, Action::Mute);
    }

    #[test]
    fn very_severe_violations_get_no_leniency() {
        let e = engine();
        let now = Utc::now();
        for _ in 0..10 {
            e.record(1, 0.0, now);
        }
        let decision = e.decide(1, Action::Ban, ViolationCategory::AdultContent);
        assert_eq!(decision.action, Action::Ban);
    }

    #[test]
    fn never_escalates_a_proposal() {
        let e = engine();
        let now = Utc::now();
        for _ in 0..10 {
            e.record(1, 0.9, now);
        }
        for proposed in [Action::None, Action::Flag, Action::Delete, Action::DeleteAndWarn] {
            let decision = e.decide(1, proposed, ViolationCategory::SpamKeywords);
            assert!(decision.action <= proposed);
        }
    }

    #[test]
    fn history_window_is_bounded() {
        let e = engine();
        let now = Utc::now();
        for _ in 0..50 {
            e.record(1, 0.1, now);
        }
        assert_eq!(e.history.lock().get(&1).unwrap().len(), 10);
    }
}
