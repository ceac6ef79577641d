//! Kids and the records the engine keeps per kid.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::badge::{CumulativeBadgeProgress, KidBadgeProgress};
use super::chore::ChoreProgress;
use crate::stats::{
    record_points, BadgeCounters, PeriodicStats, PointCounters, PointSource, RewardCounters,
};

/// A kid and everything the engine tracks for them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Kid {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub points: f64,
    /// Derived from the current cumulative badge tier.
    #[serde(default = "default_multiplier")]
    pub points_multiplier: f64,
    #[serde(default)]
    pub chore_progress: BTreeMap<String, ChoreProgress>,
    #[serde(default)]
    pub badge_progress: BTreeMap<String, KidBadgeProgress>,
    #[serde(default)]
    pub cumulative_progress: CumulativeBadgeProgress,
    #[serde(default)]
    pub badges_earned: BTreeMap<String, BadgeEarnRecord>,
    #[serde(default)]
    pub reward_data: BTreeMap<String, KidRewardData>,
    #[serde(default)]
    pub bonus_applies: BTreeMap<String, u32>,
    #[serde(default)]
    pub penalty_applies: BTreeMap<String, u32>,
    #[serde(default)]
    pub point_stats: PeriodicStats<PointCounters>,
    /// Last overdue notification per chore.
    #[serde(default)]
    pub overdue_notified: BTreeMap<String, DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

fn default_multiplier() -> f64 {
    1.0
}

/// Earn history for one badge.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BadgeEarnRecord {
    #[serde(default)]
    pub last_awarded: Option<DateTime<Utc>>,
    #[serde(default)]
    pub stats: PeriodicStats<BadgeCounters>,
}

/// Reward claim tracking for one reward.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KidRewardData {
    #[serde(default)]
    pub pending_count: u32,
    #[serde(default)]
    pub last_claimed: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_approved: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_disapproved: Option<DateTime<Utc>>,
    #[serde(default)]
    pub stats: PeriodicStats<RewardCounters>,
}

impl Kid {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            points: 0.0,
            points_multiplier: 1.0,
            chore_progress: BTreeMap::new(),
            badge_progress: BTreeMap::new(),
            cumulative_progress: CumulativeBadgeProgress::default(),
            badges_earned: BTreeMap::new(),
            reward_data: BTreeMap::new(),
            bonus_applies: BTreeMap::new(),
            penalty_applies: BTreeMap::new(),
            point_stats: PeriodicStats::new(),
            overdue_notified: BTreeMap::new(),
            created_at: Utc::now(),
        }
    }

    /// Move the balance by `delta` and book it in the ledger.
    ///
    /// Positive movements also count toward the cumulative badge cycle,
    /// except badge award points. Returns the new balance.
    pub fn apply_points(&mut self, delta: f64, source: PointSource, at: DateTime<Utc>) -> f64 {
        self.points += delta;
        record_points(&mut self.point_stats, at, delta, source);
        if delta > 0.0 && source != PointSource::Badges {
            self.cumulative_progress.cycle_points += delta;
        }
        self.points
    }

    pub fn progress(&self, chore_id: &str) -> Option<&ChoreProgress> {
        self.chore_progress.get(chore_id)
    }

    /// Lifetime approvals of one chore, or of all chores.
    pub fn lifetime_approvals(&self, chore_id: Option<&str>) -> u32 {
        self.chore_progress
            .iter()
            .filter(|(id, _)| chore_id.map_or(true, |c| c == id.as_str()))
            .map(|(_, p)| p.stats.all_time().approved)
            .sum()
    }

    /// Approvals on `date`, of one chore or of all chores.
    pub fn approvals_on(&self, date: NaiveDate, chore_id: Option<&str>) -> u32 {
        self.chore_progress
            .iter()
            .filter(|(id, _)| chore_id.map_or(true, |c| c == id.as_str()))
            .filter_map(|(_, p)| p.stats.on_date(date))
            .map(|c| c.approved)
            .sum()
    }

    /// Record one earn of `badge_id`.
    pub fn record_badge_earned(&mut self, badge_id: &str, at: DateTime<Utc>) {
        let record = self.badges_earned.entry(badge_id.to_string()).or_default();
        record.last_awarded = Some(at);
        record.stats.record(at, |c| c.earned += 1);
    }

    pub fn has_earned(&self, badge_id: &str) -> bool {
        self.badges_earned.contains_key(badge_id)
    }
}
