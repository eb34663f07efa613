//! Detection statistics

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::Action;

/// Running counters for the scoring pipeline.
#[derive(Debug, Default)]
pub struct DetectionStats {
    messages_scored: AtomicU64,
    spam_detected: AtomicU64,
    disqualifications: AtomicU64,
    flagged: AtomicU64,
    deleted: AtomicU64,
    warned: AtomicU64,
    muted: AtomicU64,
    banned: AtomicU64,
}

/// A point-in-time copy of the counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    /// Messages scored
    pub messages_scored: u64,
    /// Verdicts with `is_spam` set
    pub spam_detected: u64,
    /// Verdicts decided by the disqualification tier
    pub disqualifications: u64,
    /// Flag actions recommended
    pub flagged: u64,
    /// Delete actions recommended
    pub deleted: u64,
    /// Delete-and-warn actions recommended
    pub warned: u64,
    /// Mute actions recommended
    pub muted: u64,
    /// Ban actions recommended
    pub banned: u64,
}

impl DetectionStats {
    /// Create zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one scored message and its outcome.
    pub fn record(&self, action: Action, is_spam: bool, disqualified: bool) {
        self.messages_scored.fetch_add(1, Ordering::Relaxed);
        if is_spam {
            self.spam_detected.fetch_add(1, Ordering::Relaxed);
        }
        if disqualified {
            self.disqualifications.fetch_add(1, Ordering::Relaxed);
        }
        let counter = match action {
            Action::None => return,
            Action::Flag => &self.flagged,
            Action::Delete => &self.deleted,
            Action::DeleteAndWarn => &self.warned,
            Action::Mute => &self.muted,
            Action::Ban => &self.banned,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Copy the counters.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            messages_scored: self.messages_scored.load(Ordering::Relaxed),
            spam_detected: self.spam_detected.load(Ordering::Relaxed),
            disqualifications: self.disqualifications.load(Ordering::Relaxed),
            flagged: self.flagged.load(Ordering::Relaxed),
            deleted: self.deleted.load(Ordering::Relaxed),
            warned: self.warned.load(Ordering::Relaxed),
            muted: self.muted.load(Ordering::Relaxed),
            banned: self.banned.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate() {
        let stats = DetectionStats::new();
        stats.record(Action::None, false, false);
        stats.record(Action::Ban, true, true);
        stats.record(Action::Delete, true, false);

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.messages_scored, 3);
        assert_eq!(snapshot.spam_detected, 2);
        assert_eq!(snapshot.disqualifications, 1);
        assert_eq!(snapshot.banned, 1);
        assert_eq!(snapshot.deleted, 1);
        assert_eq!(snapshot.flagged, 0);
    }
}
