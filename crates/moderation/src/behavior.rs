//! Behavior profiling
//!
//! Per-sender rolling statistics and anomaly scoring against the sender's
//! own history. A message is compared to the sender's baseline, never to a
//! global one: an emoji-heavy message is normal from one sender and a strong
//! signal from another.

use std::collections::{BTreeSet, HashMap, VecDeque};

use chrono::{DateTime, NaiveDate, Timelike, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use store::JsonStore;
use tracing::debug;

use crate::{
    config::BehaviorConfig,
    text::{count_links, emoji_count},
    SenderId,
};

/// Name of the persisted profile store
const PROFILE_STORE: &str = "behavior_profiles";

/// Rolling windows for one sender. Bounded FIFO: the oldest entry is
/// evicted first once a window is full.
#[derive(Debug, Default)]
struct SenderWindows {
    hours: VecDeque<u32>,
    lengths: VecDeque<usize>,
    links: VecDeque<usize>,
    emojis: VecDeque<usize>,
    days: BTreeSet<NaiveDate>,
    daily_counts: HashMap<NaiveDate, u32>,
    last_seen: Option<DateTime<Utc>>,
}

/// Derived aggregate over a sender's rolling windows.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BehaviorProfile {
    /// Messages currently in the window
    pub message_count: usize,
    /// Mean message length
    pub avg_length: f64,
    /// Mean links per message
    pub avg_links: f64,
    /// Mean emoji per message
    pub avg_emojis: f64,
    /// Distinct posting hours observed
    pub active_hours: Vec<u32>,
    /// Distinct active days observed
    pub active_days: usize,
    /// Messages per active day
    pub messages_per_day: f64,
    /// Last recorded activity
    pub last_seen: Option<DateTime<Utc>>,
}

/// Result of comparing a message against the sender's baseline.
#[derive(Debug, Clone)]
pub struct AnomalyReport {
    /// Whether the combined score crossed the anomaly threshold
    pub is_anomalous: bool,
    /// Combined score in 0..1
    pub score: f64,
    /// Signals that contributed
    pub reasons: Vec<String>,
}

impl AnomalyReport {
    fn none() -> Self {
        Self {
            is_anomalous: false,
            score: 0.0,
            reasons: Vec::new(),
        }
    }
}

/// Tracks per-sender behavior and scores deviations from it.
pub struct BehaviorProfiler {
    config: BehaviorConfig,
    windows: DashMap<SenderId, SenderWindows>,
}

impl BehaviorProfiler {
    /// Create a profiler from configuration.
    pub fn new(config: BehaviorConfig) -> Self {
        Self {
            config,
            windows: DashMap::new(),
        }
    }

    /// Record a message into the sender's rolling windows.
    pub fn record(&self, sender: SenderId, text: &str, timestamp: DateTime<Utc>) {
        let cap = self.config.window;
        let mut entry = self.windows.entry(sender).or_default();

        push_bounded(&mut entry.hours, timestamp.hour(), cap);
        push_bounded(&mut entry.lengths, text.chars().count(), cap);
        push_bounded(&mut entry.links, count_links(text), cap);
        push_bounded(&mut entry.emojis, emoji_count(text), cap);

        let day = timestamp.date_naive();
        entry.days.insert(day);
        *entry.daily_counts.entry(day).or_insert(0) += 1;
        entry.last_seen = Some(timestamp);
    }

    /// Current derived aggregate for a sender.
    pub fn profile(&self, sender: SenderId) -> BehaviorProfile {
        let Some(windows) = self.windows.get(&sender) else {
            return BehaviorProfile::default();
        };

        let mut active_hours: Vec<u32> = windows.hours.iter().copied().collect();
        active_hours.sort_unstable();
        active_hours.dedup();

        let active_days = windows.days.len();
        let total_messages: u32 = windows.daily_counts.values().sum();

        BehaviorProfile {
            message_count: windows.hours.len(),
            avg_length: mean_of(&windows.lengths),
            avg_links: mean_of(&windows.links),
            avg_emojis: mean_of(&windows.emojis),
            active_hours,
            active_days,
            messages_per_day: if active_days > 0 {
                total_messages as f64 / active_days as f64
            } else {
                0.0
            },
            last_seen: windows.last_seen,
        }
    }

    /// Compare a message against the sender's baseline. Requires a minimum
    /// history before evaluating; with too little history every message
    /// reports "not anomalous".
    pub fn anomaly(
        &self,
        sender: SenderId,
        text: &str,
        timestamp: DateTime<Utc>,
    ) -> AnomalyReport {
        let profile = self.profile(sender);
        if profile.message_count < self.config.min_history {
            return AnomalyReport::none();
        }

        let mut score = 0.0;
        let mut reasons = Vec::new();

        // Length far outside the sender's usual range
        let current_len = text.chars().count() as f64;
        if profile.avg_length > 0.0 {
            let ratio = current_len / profile.avg_length;
            if !(0.2..=3.0).contains(&ratio) {
                score += 0.3;
                reasons.push(format!("Unusual message length ({ratio:.1}x baseline)"));
            }
        }

        // Links from a sender that historically posts none
        let current_links = count_links(text);
        if profile.avg_links < 0.1 && current_links > 0 {
            score += 0.4;
            reasons.push(format!(
                "Sender rarely posts links, message contains {current_links}"
            ));
        } else if profile.avg_links > 0.0 && current_links as f64 > profile.avg_links * 2.0 {
            score += 0.3;
            reasons.push(format!(
                "Unusual link count ({current_links} vs {:.1} baseline)",
                profile.avg_links
            ));
        }

        // Emoji burst from a sender that historically uses none
        let current_emojis = emoji_count(text);
        if profile.avg_emojis < 1.0 && current_emojis > 5 {
            score += 0.2;
            reasons.push(format!(
                "Unusual emoji usage ({current_emojis} vs {:.1} baseline)",
                profile.avg_emojis
            ));
        }

        // Posting hour outside the sender's active span, with tolerance
        let hour = timestamp.hour() as i64;
        if !profile.active_hours.contains(&timestamp.hour()) {
            if let (Some(&start), Some(&end)) =
                (profile.active_hours.first(), profile.active_hours.last())
            {
                if hour < start as i64 - 3 || hour > end as i64 + 3 {
                    score += 0.2;
                    reasons.push(format!(
                        "Unusual posting time ({hour}:00 vs typical {start}:00-{end}:00)"
                    ));
                }
            }
        }

        AnomalyReport {
            is_anomalous: score >= self.config.anomaly_threshold,
            score: score.min(1.0),
            reasons,
        }
    }

    /// Persist derived profiles, pruning senders idle past the retention
    /// window.
    pub fn persist(&self, store: &JsonStore, now: DateTime<Utc>) {
        let cutoff = now - chrono::Duration::days(self.config.profile_retention_days);
        // Two passes: dashmap deadlocks when the map is read while an
        // iteration guard is still held.
        let active: Vec<SenderId> = self
            .windows
            .iter()
            .filter(|entry| entry.value().last_seen.map(|seen| seen > cutoff).unwrap_or(false))
            .map(|entry| *entry.key())
            .collect();
        let snapshot: HashMap<SenderId, BehaviorProfile> = active
            .into_iter()
            .map(|sender| (sender, self.profile(sender)))
            .collect();
        debug!(profiles = snapshot.len(), "Persisting behavior profiles");
        store.save_logged(PROFILE_STORE, &snapshot);
    }

    /// Number of senders currently tracked.
    pub fn tracked_senders(&self) -> usize {
        self.windows.len()
    }
}

fn push_bounded<T>(window: &mut VecDeque<T>, value: T, cap: usize) {
    if window.len() >= cap {
        window.pop_front();
    }
    window.push_back(value);
}

fn mean_of(window: &VecDeque<usize>) -> f64 {
    if window.is_empty() {
        return 0.0;
    }
    window.iter().sum::<usize>() as f64 / window.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 10, hour, 0, 0).unwrap()
    }

    fn profiler() -> BehaviorProfiler {
        BehaviorProfiler::new(BehaviorConfig::default())
    }

    #[test]
    fn too_little_history_is_never_anomalous() {
        let p = profiler();
        p.record(1, "hello", ts(10));
        p.record(1, "hi there", ts(11));

        let report = p.anomaly(1, "https://x.example ".repeat(30).as_str(), ts(3));
        assert!(!report.is_anomalous);
        assert_eq!(report.score, 0.0);
    }

    #[test]
    fn link_burst_from_linkless_sender_is_anomalous() {
        let p = profiler();
        for i in 0..10 {
            p.record(1, "just chatting about the market", ts(10 + i % 3));
        }

        let report = p.anomaly(
            1,
            "wow check https://a.example https://b.example https://c.example",
            ts(11),
        );
        assert!(report.score >= 0.4);
        assert!(report.reasons.iter().any(|r| r.contains("links")));
    }

    #[test]
    fn oversized_message_scores_length_signal() {
        let p = profiler();
        for _ in 0..8 {
            p.record(1, "short note", ts(12));
        }

        let long = "a very long message ".repeat(40);
        let report = p.anomaly(1, &long, ts(12));
        assert!(report.reasons.iter().any(|r| r.contains("length")));
    }

    #[test]
    fn posting_hour_outside_span_scores() {
        let p = profiler();
        for i in 0..10 {
            p.record(1, "daytime chat", ts(9 + i % 3));
        }

        let report = p.anomaly(1, "night owl suddenly", ts(3));
        assert!(report.reasons.iter().any(|r| r.contains("posting time")));
    }

    #[test]
    fn windows_never_exceed_capacity() {
        let config = BehaviorConfig {
            window: 100,
            ..BehaviorConfig::default()
        };
        let p = BehaviorProfiler::new(config);
        for i in 0..250 {
            p.record(1, &format!("message {i}"), ts(10));
        }

        assert_eq!(p.profile(1).message_count, 100);
    }

    #[test]
    fn persist_prunes_stale_profiles() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::new(dir.path());
        let p = profiler();

        p.record(1, "fresh sender", ts(10));
        let report_time = ts(10) + chrono::Duration::days(120);
        p.persist(&store, report_time);

        let saved: HashMap<SenderId, BehaviorProfile> =
            store.load_or_default("behavior_profiles");
        assert!(saved.is_empty());
    }
}
