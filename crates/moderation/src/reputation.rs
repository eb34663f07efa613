//! Reputation ledger
//!
//! Point balances, levels, activity streaks and immunity per sender.
//! Positive gains are capped per sender per UTC day; penalties always apply
//! in full. Levels are display/leniency signals — capability gating is the
//! calling policy's decision, not the ledger's.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::{DateTime, Duration, NaiveDate, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use store::JsonStore;
use tracing::{debug, info};

use crate::{config::ReputationConfig, SenderId};

/// Name of the persisted ledger store
const REPUTATION_STORE: &str = "reputation";

/// Ordered reputation tiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ReputationLevel {
    /// Below the member floor
    Newcomer,
    /// Established participant
    Member,
    /// Long-standing participant
    Trusted,
    /// Top tier
    Vip,
}

impl std::fmt::Display for ReputationLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReputationLevel::Newcomer => write!(f, "Newcomer"),
            ReputationLevel::Member => write!(f, "Member"),
            ReputationLevel::Trusted => write!(f, "Trusted"),
            ReputationLevel::Vip => write!(f, "VIP"),
        }
    }
}

/// Persisted state for one sender.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SenderRecord {
    /// Point balance. Can go negative; levels treat it as >= 0.
    pub points: i64,
    /// Warnings received
    pub warnings: u32,
    /// Reports that led to action
    pub valid_reports: u32,
    /// Admin-granted immunity flag
    pub immune: bool,
    /// Positive points earned per UTC day, for the daily cap
    daily_earned: BTreeMap<NaiveDate, i64>,
    /// Days with recorded activity, for streaks
    activity_days: BTreeSet<NaiveDate>,
    /// Last report credit, for the cooldown
    last_report_credit: Option<DateTime<Utc>>,
    /// Last recorded activity
    pub last_active: Option<DateTime<Utc>>,
}

/// Persisted shape of the whole ledger.
#[derive(Debug, Default, Serialize, Deserialize)]
struct LedgerData {
    senders: HashMap<SenderId, SenderRecord>,
}

/// Point balances and the rules that mutate them. Persisted on every
/// mutation; a failed save is logged and the in-memory ledger stays
/// authoritative.
pub struct ReputationLedger {
    config: ReputationConfig,
    data: Mutex<LedgerData>,
    store: JsonStore,
}

impl ReputationLedger {
    /// Create the ledger, loading any persisted state.
    pub fn new(config: ReputationConfig, store: JsonStore) -> Self {
        let data = store.load_or_default(REPUTATION_STORE);
        Self {
            config,
            data: Mutex::new(data),
            store,
        }
    }

    /// Apply a signed point delta. Positive deltas are capped by the
    /// remaining daily allowance and silently dropped once it is exhausted;
    /// negative deltas always apply in full. Returns the new balance.
    pub fn add_points(
        &self,
        sender: SenderId,
        delta: i64,
        reason: &str,
        now: DateTime<Utc>,
    ) -> i64 {
        let mut data = self.data.lock();
        let record = data.senders.entry(sender).or_default();
        let today = now.date_naive();

        let mut applied = delta;
        if delta > 0 {
            let earned_today = record.daily_earned.get(&today).copied().unwrap_or(0);
            let allowance = (self.config.max_daily_points - earned_today).max(0);
            if allowance == 0 {
                debug!(sender, delta, reason, "Daily cap reached, dropping gain");
                return record.points;
            }
            applied = delta.min(allowance);
            *record.daily_earned.entry(today).or_insert(0) += applied;

            // Keep only the last week of daily counters
            let cutoff = today - Duration::days(7);
            record.daily_earned.retain(|day, _| *day >= cutoff);
        }

        record.points += applied;
        record.last_active = Some(now);
        info!(
            sender,
            applied, reason, total = record.points, "Reputation adjusted"
        );
        self.store.save_logged(REPUTATION_STORE, &*data);
        data.senders[&sender].points
    }

    /// Current point balance.
    pub fn points(&self, sender: SenderId) -> i64 {
        self.data
            .lock()
            .senders
            .get(&sender)
            .map(|r| r.points)
            .unwrap_or(0)
    }

    /// Overwrite a sender's balance (admin tool).
    pub fn set_points(&self, sender: SenderId, points: i64) -> i64 {
        let mut data = self.data.lock();
        data.senders.entry(sender).or_default().points = points;
        self.store.save_logged(REPUTATION_STORE, &*data);
        points
    }

    /// Record daily activity. Awards the activity credit once per UTC day
    /// and checks for exact 7- and 30-day unbroken streaks, each worth a
    /// one-time bonus. Returns true when any points were awarded.
    pub fn daily_activity(&self, sender: SenderId, now: DateTime<Utc>) -> bool {
        let today = now.date_naive();
        let streak = {
            let mut data = self.data.lock();
            let record = data.senders.entry(sender).or_default();
            if record.activity_days.contains(&today) {
                record.last_active = Some(now);
                self.store.save_logged(REPUTATION_STORE, &*data);
                return false;
            }
            record.activity_days.insert(today);
            streak_length(&record.activity_days, today)
        };

        self.add_points(sender, self.config.daily_activity_points, "daily activity", now);

        if streak == 7 {
            self.add_points(
                sender,
                self.config.streak_week_bonus,
                "7-day activity streak",
                now,
            );
        } else if streak == 30 {
            self.add_points(
                sender,
                self.config.streak_month_bonus,
                "30-day activity streak",
                now,
            );
        }
        true
    }

    /// Penalty for a warning.
    pub fn on_warning(&self, sender: SenderId, now: DateTime<Utc>) -> i64 {
        {
            let mut data = self.data.lock();
            data.senders.entry(sender).or_default().warnings += 1;
        }
        self.add_points(sender, -self.config.warning_penalty.abs(), "warning received", now)
    }

    /// Penalty for a mute.
    pub fn on_mute(&self, sender: SenderId, now: DateTime<Utc>) -> i64 {
        self.add_points(sender, -self.config.mute_penalty.abs(), "muted", now)
    }

    /// Credit when a mute is overturned as a false positive.
    pub fn on_unmute(&self, sender: SenderId, now: DateTime<Utc>) -> i64 {
        self.add_points(
            sender,
            self.config.unmute_bonus,
            "unmuted (false positive)",
            now,
        )
    }

    /// Credit for a report that led to action. Subject to a cooldown:
    /// within it the call is a no-op.
    pub fn on_valid_report(&self, sender: SenderId, now: DateTime<Utc>) -> i64 {
        {
            let mut data = self.data.lock();
            let record = data.senders.entry(sender).or_default();
            if let Some(last) = record.last_report_credit {
                let elapsed = (now - last).num_seconds();
                if elapsed < self.config.report_cooldown_secs {
                    debug!(sender, elapsed, "Report credit cooldown active");
                    return record.points;
                }
            }
            record.valid_reports += 1;
            record.last_report_credit = Some(now);
        }
        self.add_points(
            sender,
            self.config.valid_report_points,
            "valid spam report",
            now,
        )
    }

    /// Map the balance to a tier. Display/leniency signal only.
    pub fn level(&self, sender: SenderId) -> ReputationLevel {
        let points = self.points(sender).max(0);
        if points >= self.config.level_vip {
            ReputationLevel::Vip
        } else if points >= self.config.level_trusted {
            ReputationLevel::Trusted
        } else if points >= self.config.level_member {
            ReputationLevel::Member
        } else {
            ReputationLevel::Newcomer
        }
    }

    /// True when the sender has the admin-granted flag or a balance at or
    /// above the immunity floor.
    pub fn is_immune(&self, sender: SenderId) -> bool {
        let data = self.data.lock();
        data.senders
            .get(&sender)
            .map(|r| r.immune || r.points >= self.config.immunity_floor)
            .unwrap_or(false)
    }

    /// Grant or revoke the admin immunity flag.
    pub fn set_immune(&self, sender: SenderId, immune: bool) {
        let mut data = self.data.lock();
        data.senders.entry(sender).or_default().immune = immune;
        self.store.save_logged(REPUTATION_STORE, &*data);
    }

    /// Warning count recorded against a sender.
    pub fn warnings(&self, sender: SenderId) -> u32 {
        self.data
            .lock()
            .senders
            .get(&sender)
            .map(|r| r.warnings)
            .unwrap_or(0)
    }

    /// Drop activity-day entries older than `keep_days` (maintenance).
    pub fn cleanup_activity(&self, keep_days: i64, now: DateTime<Utc>) {
        let cutoff = now.date_naive() - Duration::days(keep_days);
        let mut data = self.data.lock();
        for record in data.senders.values_mut() {
            record.activity_days.retain(|day| *day >= cutoff);
        }
        self.store.save_logged(REPUTATION_STORE, &*data);
    }
}

/// Length of the unbroken run of activity days ending at `today`,
/// computed by walking backward day-by-day until a gap.
fn streak_length(days: &BTreeSet<NaiveDate>, today: NaiveDate) -> u32 {
    let mut length = 0;
    let mut day = today;
    while days.contains(&day) {
        length += 1;
        match day.pred_opt() {
            Some(prev) => day = prev,
            None => break,
        }
    }
    length
}
