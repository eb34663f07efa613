//! Rolling trackers
//!
//! Small bounded per-sender and per-channel trackers: message rate,
//! duplicate-text floods, warning counts and channel join bursts. Rate and
//! duplicate signals are weighted contributors to the score, never
//! disqualifiers; the join tracker only signals the caller's raid handling
//! and never affects per-message scoring.

use std::collections::VecDeque;

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use sha2::{Digest, Sha256};
use tracing::{info, warn};

use crate::{config::TrackingConfig, ChannelId, SenderId};

/// Fingerprint of a normalized message text.
type TextDigest = [u8; 32];

/// Per-sender sliding one-minute message-rate window.
pub struct RateTracker {
    config: TrackingConfig,
    windows: DashMap<SenderId, VecDeque<DateTime<Utc>>>,
}

impl RateTracker {
    /// Create the tracker from configuration.
    pub fn new(config: TrackingConfig) -> Self {
        Self {
            config,
            windows: DashMap::new(),
        }
    }

    /// Record a message and return the rate contribution for it.
    pub fn record_and_score(&self, sender: SenderId, now: DateTime<Utc>) -> f64 {
        self.prune_if_needed(now);

        let mut window = self.windows.entry(sender).or_default();
        let cutoff = now - Duration::minutes(1);
        while window.front().map(|t| *t < cutoff).unwrap_or(false) {
            window.pop_front();
        }
        window.push_back(now);

        let count = window.len();
        let limit = self.config.max_messages_per_minute;
        if count > limit {
            0.5
        } else if count as f64 > limit as f64 * 0.7 {
            0.2
        } else {
            0.0
        }
    }

    /// Drop senders with no recent activity once the tracked cap is hit.
    fn prune_if_needed(&self, now: DateTime<Utc>) {
        if self.windows.len() <= self.config.max_tracked_senders {
            return;
        }
        let cutoff = now - Duration::minutes(1);
        let before = self.windows.len();
        self.windows
            .retain(|_, window| window.back().map(|t| *t >= cutoff).unwrap_or(false));
        info!(
            pruned = before - self.windows.len(),
            "Pruned stale senders from rate tracker"
        );
    }
}

/// Bounded table of recently seen message texts, for duplicate floods.
pub struct DuplicateTracker {
    config: TrackingConfig,
    seen: parking_lot::Mutex<DuplicateTable>,
}

#[derive(Default)]
struct DuplicateTable {
    order: VecDeque<TextDigest>,
    senders: std::collections::HashMap<TextDigest, Vec<SenderId>>,
}

impl DuplicateTracker {
    /// Create the tracker from configuration.
    pub fn new(config: TrackingConfig) -> Self {
        Self {
            config,
            seen: parking_lot::Mutex::new(DuplicateTable::default()),
        }
    }

    /// Record a message text and return the duplicate contribution for it.
    pub fn record_and_score(&self, text: &str, sender: SenderId) -> f64 {
        let digest: TextDigest = Sha256::digest(text.trim().to_lowercase().as_bytes()).into();
        let mut table = self.seen.lock();

        if !table.senders.contains_key(&digest) {
            if table.order.len() >= self.config.duplicate_capacity {
                if let Some(oldest) = table.order.pop_front() {
                    table.senders.remove(&oldest);
                }
            }
            table.order.push_back(digest);
        }
        let repeats = {
            let entry = table.senders.entry(digest).or_default();
            entry.push(sender);
            entry.len()
        };

        if repeats >= self.config.duplicate_threshold {
            warn!(repeats, "Duplicate message flood");
            0.6
        } else {
            0.0
        }
    }
}

/// Plain per-sender warning counter with explicit clear.
#[derive(Default)]
pub struct WarningCounter {
    counts: DashMap<SenderId, u32>,
}

impl WarningCounter {
    /// Create an empty counter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a warning, returning the new total.
    pub fn add(&self, sender: SenderId) -> u32 {
        let mut entry = self.counts.entry(sender).or_insert(0);
        *entry += 1;
        *entry
    }

    /// Current warning count.
    pub fn get(&self, sender: SenderId) -> u32 {
        self.counts.get(&sender).map(|c| *c).unwrap_or(0)
    }

    /// Reset a sender's warnings.
    pub fn clear(&self, sender: SenderId) {
        self.counts.remove(&sender);
    }
}

/// A raid signal for the caller's join handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RaidSignal {
    /// Joins observed inside the window
    pub joined: usize,
}

/// Per-channel rolling join window. Raid detection is collaborator-facing:
/// the signal goes to the caller and per-message scoring is unaffected.
pub struct JoinTracker {
    config: TrackingConfig,
    joins: DashMap<ChannelId, VecDeque<DateTime<Utc>>>,
}

impl JoinTracker {
    /// Create the tracker from configuration.
    pub fn new(config: TrackingConfig) -> Self {
        Self {
            config,
            joins: DashMap::new(),
        }
    }

    /// Record a join. Returns a signal when the rolling window crosses the
    /// raid threshold.
    pub fn record_join(&self, channel: ChannelId, now: DateTime<Utc>) -> Option<RaidSignal> {
        let mut window = self.joins.entry(channel).or_default();
        let cutoff = now - Duration::minutes(self.config.raid_window_minutes);
        while window.front().map(|t| *t < cutoff).unwrap_or(false) {
            window.pop_front();
        }
        window.push_back(now);

        let joined = window.len();
        (joined >= self.config.raid_threshold).then(|| {
            warn!(channel, joined, "Join burst over raid threshold");
            RaidSignal { joined }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(second: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 10, 12, second / 60, second % 60)
            .unwrap()
    }

    #[test]
    fn rate_score_rises_with_message_rate() {
        let tracker = RateTracker::new(TrackingConfig::default());
        let mut score = 0.0;
        for i in 0..12 {
            score = tracker.record_and_score(1, ts(i));
        }
        assert_eq!(score, 0.5);
    }

    #[test]
    fn slow_senders_score_zero() {
        let tracker = RateTracker::new(TrackingConfig::default());
        assert_eq!(tracker.record_and_score(1, ts(0)), 0.0);
        assert_eq!(tracker.record_and_score(1, ts(30)), 0.0);
    }

    #[test]
    fn rate_window_slides() {
        let tracker = RateTracker::new(TrackingConfig::default());
        for i in 0..12 {
            tracker.record_and_score(1, ts(i));
        }
        // Two minutes later the window is empty again
        assert_eq!(tracker.record_and_score(1, ts(0) + Duration::minutes(2)), 0.0);
    }

    #[test]
    fn duplicate_flood_scores_at_threshold() {
        let tracker = DuplicateTracker::new(TrackingConfig::default());
        assert_eq!(tracker.record_and_score("same text", 1), 0.0);
        assert_eq!(tracker.record_and_score("Same Text", 2), 0.0);
        // Case and surrounding whitespace fold into the same fingerprint
        assert_eq!(tracker.record_and_score("  same text  ", 3), 0.6);
    }

    #[test]
    fn duplicate_table_is_bounded() {
        let config = TrackingConfig {
            duplicate_capacity: 10,
            ..TrackingConfig::default()
        };
        let tracker = DuplicateTracker::new(config);
        for i in 0..50 {
            tracker.record_and_score(&format!("text {i}"), 1);
        }
        let table = tracker.seen.lock();
        assert!(table.order.len() <= 10);
        assert_eq!(table.order.len(), table.senders.len());
    }

    #[test]
    fn warnings_count_and_clear() {
        let warnings = WarningCounter::new();
        assert_eq!(warnings.add(1), 1);
        assert_eq!(warnings.add(1), 2);
        assert_eq!(warnings.get(1), 2);
        warnings.clear(1);
        assert_eq!(warnings.get(1), 0);
    }

    #[test]
    fn join_burst_signals_a_raid() {
        let tracker = JoinTracker::new(TrackingConfig::default());
        let mut signal = None;
        for i in 0..11 {
            signal = tracker.record_join(-1, ts(i * 10));
        }
        assert_eq!(signal, Some(RaidSignal { joined: 11 }));
    }

    #[test]
    fn spread_out_joins_do_not_signal() {
        let tracker = JoinTracker::new(TrackingConfig::default());
        for i in 0..11 {
            let signal = tracker.record_join(-1, ts(0) + Duration::minutes(i * 10));
            assert!(signal.is_none());
        }
    }
}
