//! Counter records stored in [`PeriodicStats`] buckets.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::accumulator::PeriodicStats;

/// Where a point movement came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PointSource {
    Chores,
    Rewards,
    Bonuses,
    Penalties,
    Badges,
    Achievements,
    Challenges,
    Manual,
}

/// Point ledger bucket.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PointCounters {
    #[serde(default)]
    pub earned: f64,
    #[serde(default)]
    pub spent: f64,
    #[serde(default)]
    pub net: f64,
    #[serde(default)]
    pub by_source: BTreeMap<PointSource, f64>,
    #[serde(default)]
    pub transactions: u32,
}

impl PointCounters {
    pub fn from_source(&self, source: PointSource) -> f64 {
        self.by_source.get(&source).copied().unwrap_or(0.0)
    }
}

/// Record a signed point movement in a ledger.
pub fn record_points(
    ledger: &mut PeriodicStats<PointCounters>,
    at: DateTime<Utc>,
    delta: f64,
    source: PointSource,
) {
    ledger.record(at, |bucket| {
        if delta >= 0.0 {
            bucket.earned += delta;
        } else {
            bucket.spent += -delta;
        }
        bucket.net += delta;
        *bucket.by_source.entry(source).or_insert(0.0) += delta;
        bucket.transactions += 1;
    });
}

/// Per kid x chore completion counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChoreCounters {
    #[serde(default)]
    pub approved: u32,
    #[serde(default)]
    pub claimed: u32,
    #[serde(default)]
    pub disapproved: u32,
    #[serde(default)]
    pub overdue: u32,
    #[serde(default)]
    pub points: f64,
    /// Longest streak observed within the bucket's period
    #[serde(default)]
    pub longest_streak: u32,
}

/// Per kid x badge earn counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BadgeCounters {
    #[serde(default)]
    pub earned: u32,
}

/// Per kid x reward counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RewardCounters {
    #[serde(default)]
    pub claimed: u32,
    #[serde(default)]
    pub approved: u32,
    #[serde(default)]
    pub disapproved: u32,
    #[serde(default)]
    pub points_spent: f64,
}
