//! Context analysis
//!
//! Short-term conversation window per channel, used to soften scores for
//! messages that look like genuine discussion. Context can meaningfully
//! reduce a spam score but never fully erase a high one.

use std::collections::{HashSet, VecDeque};

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::{config::ContextConfig, text::is_stopword, ChannelId, SenderId};

/// Curated sentence shapes of legitimate discussion
static LEGITIMATE_RES: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"how (to|do|can|does)",
        r"what (is|are|does|do)",
        r"why (is|are|does|do)",
        r"when (is|are|does|do|will)",
        r"can (you|i|we)",
        r"help (me|with)",
        r"explain",
        r"question",
        r"asking about",
        r"i (think|believe|feel)",
        r"in my opinion",
        r"what do you think",
        r"discuss",
        r"according to",
        r"based on",
        r"from what i (know|understand)",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid discussion regex"))
    .collect()
});

/// Question-like lead words
const QUESTION_WORDS: &[&str] = &[
    "?", "how", "what", "why", "when", "where", "who", "can", "should", "would",
];

/// Discussion-continuation phrases
const CONTINUATION_WORDS: &[&str] = &[
    "yes",
    "no",
    "i agree",
    "i disagree",
    "also",
    "but",
    "however",
    "actually",
    "exactly",
    "that's",
];

/// One remembered message in a channel window.
#[derive(Debug, Clone)]
struct ContextEntry {
    sender: SenderId,
    text: String,
    timestamp: DateTime<Utc>,
}

/// The result of applying the context discount.
#[derive(Debug, Clone)]
pub struct ContextDiscount {
    /// Score after the reduction
    pub adjusted: f64,
    /// Amount removed from the proposed score
    pub reduction: f64,
    /// Signals that justified the reduction
    pub reasons: Vec<String>,
}

/// Per-channel conversation windows and the legitimacy discount.
pub struct ContextAnalyzer {
    config: ContextConfig,
    windows: DashMap<ChannelId, VecDeque<ContextEntry>>,
}

impl ContextAnalyzer {
    /// Create an analyzer from configuration.
    pub fn new(config: ContextConfig) -> Self {
        Self {
            config,
            windows: DashMap::new(),
        }
    }

    /// Append a message to the channel window, evicting entries over
    /// capacity or older than the time window.
    pub fn record(
        &self,
        channel: ChannelId,
        sender: SenderId,
        text: &str,
        timestamp: DateTime<Utc>,
    ) {
        let mut window = self.windows.entry(channel).or_default();
        if window.len() >= self.config.window {
            window.pop_front();
        }
        window.push_back(ContextEntry {
            sender,
            text: text.to_string(),
            timestamp,
        });

        let cutoff = timestamp - Duration::minutes(self.config.window_minutes);
        while window
            .front()
            .map(|entry| entry.timestamp < cutoff)
            .unwrap_or(false)
        {
            window.pop_front();
        }
    }

    /// Compute the legitimacy score of a message against the channel's
    /// recent conversation.
    fn legitimacy(&self, channel: ChannelId, sender: SenderId, text: &str) -> (f64, Vec<String>) {
        let lower = text.to_lowercase();
        let mut score = 0.0;
        let mut reasons = Vec::new();

        let Some(window) = self.windows.get(&channel) else {
            return (0.0, reasons);
        };
        if window.is_empty() {
            return (0.0, reasons);
        }

        if QUESTION_WORDS.iter().any(|w| lower.contains(w)) {
            score += 0.3;
            reasons.push("Message appears to be a question".to_string());
        }

        if window.len() >= 2 {
            if CONTINUATION_WORDS.iter().any(|w| lower.contains(w)) {
                score += 0.4;
                reasons.push("Message continues a discussion".to_string());
            }

            // Lexical overlap with the last few messages: shared distinctive
            // words, stopwords excluded
            let recent_words: HashSet<String> = window
                .iter()
                .rev()
                .take(3)
                .flat_map(|entry| {
                    entry
                        .text
                        .to_lowercase()
                        .split_whitespace()
                        .map(str::to_string)
                        .collect::<Vec<_>>()
                })
                .collect();
            let shared = lower
                .split_whitespace()
                .filter(|w| w.len() > 4 && !is_stopword(w) && recent_words.contains(*w))
                .collect::<HashSet<_>>()
                .len();
            if shared >= 2 {
                score += 0.3;
                reasons.push(format!("References recent discussion ({shared} shared terms)"));
            }
        }

        if LEGITIMATE_RES.iter().any(|re| re.is_match(&lower)) {
            score += 0.5;
            reasons.push("Matches a legitimate discussion pattern".to_string());
        }

        // Participation in an active multi-sender thread
        if window.len() >= 3 {
            let recent_senders: HashSet<SenderId> = window
                .iter()
                .rev()
                .take(5)
                .map(|entry| entry.sender)
                .collect();
            if recent_senders.len() >= 2 && recent_senders.contains(&sender) {
                score += 0.2;
                reasons.push("Part of an active discussion".to_string());
            }
        }

        (score, reasons)
    }

    /// Apply the legitimacy discount to a proposed spam score. The
    /// reduction is capped both absolutely and as a fraction of the score.
    pub fn discount(
        &self,
        channel: ChannelId,
        sender: SenderId,
        text: &str,
        proposed: f64,
    ) -> ContextDiscount {
        let (legitimacy, mut reasons) = self.legitimacy(channel, sender, text);

        if legitimacy < self.config.legitimacy_threshold || proposed <= 0.0 {
            return ContextDiscount {
                adjusted: proposed,
                reduction: 0.0,
                reasons: Vec::new(),
            };
        }

        let reduction = self
            .config
            .max_reduction
            .min(proposed * self.config.reduction_factor);
        reasons.push(format!("Context reduced spam score by {reduction:.2}"));

        ContextDiscount {
            adjusted: (proposed - reduction).max(0.0),
            reduction,
            reasons,
        }
    }

    /// Drop windows that have gone entirely stale. Called periodically.
    pub fn cleanup(&self, now: DateTime<Utc>) {
        let cutoff = now - Duration::minutes(self.config.window_minutes * 2);
        self.windows.retain(|_, window| {
            while window
                .front()
                .map(|entry| entry.timestamp < cutoff)
                .unwrap_or(false)
            {
                window.pop_front();
            }
            !window.is_empty()
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 10, 12, minute, 0).unwrap()
    }

    fn analyzer() -> ContextAnalyzer {
        ContextAnalyzer::new(ContextConfig::default())
    }

    #[test]
    fn empty_context_gives_no_discount() {
        let a = analyzer();
        let result = a.discount(-1, 1, "how does staking work?", 0.6);
        assert_eq!(result.adjusted, 0.6);
        assert_eq!(result.reduction, 0.0);
    }

    #[test]
    fn question_in_active_thread_is_discounted() {
        let a = analyzer();
        a.record(-1, 2, "anyone tried the new staking pool?", ts(0));
        a.record(-1, 3, "yes, the staking rewards are decent", ts(1));
        a.record(-1, 1, "interesting", ts(2));

        let result = a.discount(-1, 1, "how does the staking pool handle rewards?", 0.6);
        assert!(result.adjusted < 0.6);
        assert!(result.reduction > 0.0);
    }

    #[test]
    fn discount_is_capped() {
        let a = analyzer();
        a.record(-1, 2, "what do you think about fees?", ts(0));
        a.record(-1, 3, "i think fees are fine", ts(1));
        a.record(-1, 1, "agreed", ts(2));

        let result = a.discount(-1, 1, "however, what do you think about the fees increase?", 0.9);
        assert!(result.reduction <= 0.4 + f64::EPSILON);
        assert!(result.adjusted >= 0.5);
    }

    #[test]
    fn window_is_bounded_by_capacity_and_time() {
        let config = ContextConfig {
            window: 5,
            window_minutes: 30,
            ..ContextConfig::default()
        };
        let a = ContextAnalyzer::new(config);
        for i in 0..10 {
            a.record(-1, 1, &format!("message {i}"), ts(i));
        }
        assert!(a.windows.get(&-1).unwrap().len() <= 5);

        // Everything ages out past the time window
        a.record(-1, 1, "much later", ts(0) + Duration::hours(2));
        assert_eq!(a.windows.get(&-1).unwrap().len(), 1);
    }

    #[test]
    fn promotional_text_gets_no_discount() {
        let a = analyzer();
        a.record(-1, 2, "discussing the eth merge", ts(0));
        a.record(-1, 3, "the merge was smooth", ts(1));

        let result = a.discount(-1, 1, "JOIN FAST BONUS SIGNUP TODAY", 0.8);
        assert_eq!(result.adjusted, 0.8);
    }
}
