//! Adaptive thresholds
//!
//! Per-channel learned cut-points for the action tiers. Confirmed false
//! positives nudge all tiers up (less aggressive), confirmed false negatives
//! nudge them down. Fixed-step coarse reinforcement, deliberately not
//! proportional, so a burst of corrections cannot swing a channel wildly.

use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use store::JsonStore;
use tracing::info;

use crate::{config::ThresholdConfig, ChannelId};

/// Name of the persisted thresholds store
const THRESHOLDS_STORE: &str = "adaptive_thresholds";

/// The three action cut-points for one channel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ActionThresholds {
    /// Score at or above which the escalation tier applies
    pub escalate: f64,
    /// Score at or above which the message is removed
    pub moderate: f64,
    /// Score at or above which the message is flagged for review
    pub flag: f64,
}

/// How an admin corrected one automated outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeKind {
    /// The system escalated and the action was overturned
    Overturned,
    /// The system under-reacted and an admin escalated
    UnderEscalated,
}

/// A recorded moderation outcome used by batch learning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Outcome {
    /// Score the engine assigned
    pub score: f64,
    /// Correction direction
    pub kind: OutcomeKind,
    /// When the correction was recorded
    pub timestamp: DateTime<Utc>,
}

/// Learned state for one channel.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ChannelLearning {
    thresholds: Option<ActionThresholds>,
    false_positives: u32,
    false_negatives: u32,
    outcomes: VecDeque<Outcome>,
}

/// Persisted shape of the whole store.
#[derive(Debug, Default, Serialize, Deserialize)]
struct ThresholdData {
    channels: HashMap<ChannelId, ChannelLearning>,
}

/// Per-channel learned action thresholds.
pub struct AdaptiveThresholds {
    config: ThresholdConfig,
    data: Mutex<ThresholdData>,
    store: JsonStore,
}

impl AdaptiveThresholds {
    /// Create the threshold learner, loading any persisted state.
    pub fn new(config: ThresholdConfig, store: JsonStore) -> Self {
        let data = store.load_or_default(THRESHOLDS_STORE);
        Self {
            config,
            data: Mutex::new(data),
            store,
        }
    }

    /// Channel-agnostic defaults.
    pub fn defaults(&self) -> ActionThresholds {
        self.clamp(ActionThresholds {
            escalate: self.config.default_escalate,
            moderate: self.config.default_moderate,
            flag: self.config.default_flag,
        })
    }

    /// Current thresholds for a channel, falling back to the defaults.
    pub fn thresholds(&self, channel: ChannelId) -> ActionThresholds {
        let data = self.data.lock();
        data.channels
            .get(&channel)
            .and_then(|learning| learning.thresholds)
            .map(|t| self.clamp(t))
            .unwrap_or_else(|| self.defaults())
    }

    /// A message was flagged/actioned and the action was overturned:
    /// raise all tiers by one step.
    pub fn record_false_positive(&self, channel: ChannelId) {
        let mut data = self.data.lock();
        let learning = data.channels.entry(channel).or_default();
        learning.false_positives += 1;
        let current = learning.thresholds.unwrap_or(ActionThresholds {
            escalate: self.config.default_escalate,
            moderate: self.config.default_moderate,
            flag: self.config.default_flag,
        });
        learning.thresholds = Some(self.clamp(ActionThresholds {
            escalate: current.escalate + self.config.step,
            moderate: current.moderate + self.config.step,
            flag: current.flag + self.config.step,
        }));
        info!(channel, "Thresholds nudged up (less aggressive)");
        self.store.save_logged(THRESHOLDS_STORE, &*data);
    }

    /// A message slipped through and an admin escalated: lower all tiers
    /// by one step.
    pub fn record_false_negative(&self, channel: ChannelId) {
        let mut data = self.data.lock();
        let learning = data.channels.entry(channel).or_default();
        learning.false_negatives += 1;
        let current = learning.thresholds.unwrap_or(ActionThresholds {
            escalate: self.config.default_escalate,
            moderate: self.config.default_moderate,
            flag: self.config.default_flag,
        });
        learning.thresholds = Some(self.clamp(ActionThresholds {
            escalate: current.escalate - self.config.step,
            moderate: current.moderate - self.config.step,
            flag: current.flag - self.config.step,
        }));
        info!(channel, "Thresholds nudged down (more aggressive)");
        self.store.save_logged(THRESHOLDS_STORE, &*data);
    }

    /// Record a corrected outcome for later batch learning.
    pub fn record_outcome(
        &self,
        channel: ChannelId,
        score: f64,
        kind: OutcomeKind,
        timestamp: DateTime<Utc>,
    ) {
        let mut data = self.data.lock();
        let learning = data.channels.entry(channel).or_default();
        if learning.outcomes.len() >= self.config.outcome_capacity {
            learning.outcomes.pop_front();
        }
        learning.outcomes.push_back(Outcome {
            score,
            kind,
            timestamp,
        });
        self.store.save_logged(THRESHOLDS_STORE, &*data);
    }

    /// Batch learning over recorded outcomes. Compares the mean score of
    /// overturned actions against the mean score of under-escalations and
    /// nudges once in whichever direction the evidence points. Requires a
    /// minimum number of outcomes; the fixed step keeps it rate-limited.
    pub fn learn_from_history(&self, channel: ChannelId) {
        let (overturned_mean, under_mean, escalate) = {
            let data = self.data.lock();
            let Some(learning) = data.channels.get(&channel) else {
                return;
            };
            if learning.outcomes.len() < self.config.min_outcomes {
                return;
            }

            let scores = |kind: OutcomeKind| {
                let values: Vec<f64> = learning
                    .outcomes
                    .iter()
                    .filter(|o| o.kind == kind)
                    .map(|o| o.score)
                    .collect();
                if values.is_empty() {
                    None
                } else {
                    Some(values.iter().sum::<f64>() / values.len() as f64)
                }
            };
            let escalate = learning
                .thresholds
                .map(|t| t.escalate)
                .unwrap_or(self.config.default_escalate);
            (
                scores(OutcomeKind::Overturned),
                scores(OutcomeKind::UnderEscalated),
                escalate,
            )
        };

        if let Some(mean) = overturned_mean {
            if mean > escalate {
                self.record_false_positive(channel);
            }
        }
        if let Some(mean) = under_mean {
            if mean < escalate {
                self.record_false_negative(channel);
            }
        }
    }

    /// Correction counters for a channel.
    pub fn correction_counts(&self, channel: ChannelId) -> (u32, u32) {
        let data = self.data.lock();
        data.channels
            .get(&channel)
            .map(|l| (l.false_positives, l.false_negatives))
            .unwrap_or((0, 0))
    }

    /// Clamp each tier to its configured range, then restore monotonicity
    /// (escalate >= moderate >= flag). Inverted configuration is corrected
    /// here rather than propagated, so the decision stage always sees a
    /// valid tier set.
    fn clamp(&self, t: ActionThresholds) -> ActionThresholds {
        let escalate = t
            .escalate
            .clamp(self.config.escalate_min, self.config.escalate_max);
        let moderate = t
            .moderate
            .clamp(self.config.moderate_min, self.config.moderate_max)
            .min(escalate);
        let flag = t
            .flag
            .clamp(self.config.flag_min, self.config.flag_max)
            .min(moderate);
        ActionThresholds {
            escalate,
            moderate,
            flag,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn learner() -> AdaptiveThresholds {
        let dir = tempfile::tempdir().unwrap();
        AdaptiveThresholds::new(ThresholdConfig::default(), JsonStore::new(dir.path()))
    }

    #[test]
    fn defaults_until_corrections_arrive() {
        let t = learner();
        let thresholds = t.thresholds(-1);
        assert_eq!(thresholds.escalate, 0.7);
        assert_eq!(thresholds.moderate, 0.5);
        assert_eq!(thresholds.flag, 0.3);
    }

    #[test]
    fn false_positives_converge_to_maxima() {
        let t = learner();
        for _ in 0..30 {
            t.record_false_positive(-1);
        }
        let thresholds = t.thresholds(-1);
        assert_eq!(thresholds.escalate, 0.95);
        assert_eq!(thresholds.moderate, 0.85);
        assert_eq!(thresholds.flag, 0.5);
    }

    #[test]
    fn false_negatives_converge_to_minima() {
        let t = learner();
        for _ in 0..30 {
            t.record_false_negative(-1);
        }
        let thresholds = t.thresholds(-1);
        assert_eq!(thresholds.escalate, 0.5);
        assert_eq!(thresholds.moderate, 0.3);
        assert_eq!(thresholds.flag, 0.1);
    }

    #[test]
    fn tiers_stay_monotonic() {
        let t = learner();
        for _ in 0..30 {
            t.record_false_positive(-1);
        }
        let thresholds = t.thresholds(-1);
        assert!(thresholds.escalate >= thresholds.moderate);
        assert!(thresholds.moderate >= thresholds.flag);
    }

    #[test]
    fn batch_learning_needs_enough_outcomes() {
        let t = learner();
        for _ in 0..5 {
            t.record_outcome(-1, 0.9, OutcomeKind::Overturned, Utc::now());
        }
        t.learn_from_history(-1);
        assert_eq!(t.thresholds(-1).escalate, 0.7);
    }

    #[test]
    fn batch_learning_raises_after_high_score_overturns() {
        let t = learner();
        for _ in 0..10 {
            t.record_outcome(-1, 0.9, OutcomeKind::Overturned, Utc::now());
        }
        t.learn_from_history(-1);
        assert!(t.thresholds(-1).escalate > 0.7);
    }

    #[test]
    fn batch_learning_lowers_after_low_score_escalations() {
        let t = learner();
        for _ in 0..10 {
            t.record_outcome(-1, 0.4, OutcomeKind::UnderEscalated, Utc::now());
        }
        t.learn_from_history(-1);
        assert!(t.thresholds(-1).escalate < 0.7);
    }

    #[test]
    fn state_survives_reload() {
        let dir = tempfile::tempdir().unwrap();
        {
            let t = AdaptiveThresholds::new(ThresholdConfig::default(), JsonStore::new(dir.path()));
            for _ in 0..4 {
                t.record_false_positive(-1);
            }
        }
        let t = AdaptiveThresholds::new(ThresholdConfig::default(), JsonStore::new(dir.path()));
        assert!((t.thresholds(-1).escalate - 0.9).abs() < 1e-9);
    }
}
