//! Badge definitions and per-kid badge progress.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::schedule::Recurrence;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BadgeType {
    /// A rung on the lifetime-points ladder.
    Cumulative,
    /// Re-earnable every cycle of its reset schedule.
    Periodic,
    /// Periodic with a one-day cycle.
    Daily,
    /// Only in effect on its occasion date each year.
    SpecialOccasion,
}

/// What a periodic badge counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TargetKind {
    /// Chore points earned in the cycle
    #[default]
    Points,
    /// Chore approvals in the cycle
    ChoreCount,
    /// Days in the cycle on which the day rule was met
    DaysCompleted,
    /// Consecutive days on which the day rule was met
    Streak,
}

/// When a single day counts as "completed".
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DayRule {
    /// Every tracked chore approved
    #[default]
    All,
    /// At least 80% of tracked chores approved
    Percent80,
    /// At least this many approvals
    MinCount(u32),
}

impl DayRule {
    pub const PERCENT_THRESHOLD: f64 = 0.8;

    /// Whether a day with `completed` of `tracked` chores and `approvals`
    /// total approvals meets the rule.
    pub fn is_met(self, completed: usize, tracked: usize, approvals: u32) -> bool {
        match self {
            DayRule::All => tracked > 0 && completed >= tracked,
            DayRule::Percent80 => {
                tracked > 0 && completed as f64 / tracked as f64 >= Self::PERCENT_THRESHOLD
            }
            DayRule::MinCount(min) => approvals >= min,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct BadgeTarget {
    #[serde(default)]
    pub kind: TargetKind,
    /// Points threshold for cumulative tiers, target value otherwise.
    pub threshold: f64,
    #[serde(default)]
    pub day_rule: DayRule,
    /// Only chores due on the day are tracked.
    #[serde(default)]
    pub due_today_only: bool,
    /// A chore that went overdue on the day does not count as completed.
    #[serde(default)]
    pub exclude_overdue: bool,
    /// Cumulative tiers: points needed per maintenance window.
    #[serde(default)]
    pub maintenance_required: f64,
}

/// Cycle or maintenance schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ResetSchedule {
    #[serde(default)]
    pub recurrence: Recurrence,
    #[serde(default)]
    pub grace_days: u32,
    #[serde(default)]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_date: Option<DateTime<Utc>>,
}

/// What a kid receives when a badge is awarded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct AwardManifest {
    #[serde(default)]
    pub points: f64,
    /// Points multiplier while this cumulative tier is current.
    #[serde(default)]
    pub multiplier: Option<f64>,
    #[serde(default)]
    pub rewards: Vec<String>,
    #[serde(default)]
    pub bonuses: Vec<String>,
    /// Applied only when a recurring target is missed.
    #[serde(default)]
    pub penalties: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Badge {
    pub id: String,
    pub name: String,
    pub badge_type: BadgeType,
    pub target: BadgeTarget,
    #[serde(default)]
    pub reset_schedule: ResetSchedule,
    #[serde(default)]
    pub occasion_date: Option<NaiveDate>,
    #[serde(default)]
    pub award: AwardManifest,
    #[serde(default)]
    pub assigned_kids: Vec<String>,
    /// Chores counted by the badge; empty means all of the kid's chores.
    #[serde(default)]
    pub tracked_chores: Vec<String>,
    #[serde(default)]
    pub earned_by: Vec<String>,
}

impl Badge {
    pub fn new(name: impl Into<String>, badge_type: BadgeType, threshold: f64) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            badge_type,
            target: BadgeTarget {
                threshold,
                ..Default::default()
            },
            reset_schedule: ResetSchedule::default(),
            occasion_date: None,
            award: AwardManifest::default(),
            assigned_kids: Vec::new(),
            tracked_chores: Vec::new(),
            earned_by: Vec::new(),
        }
    }

    pub fn is_assigned(&self, kid_id: &str) -> bool {
        self.assigned_kids.iter().any(|k| k == kid_id)
    }

    pub fn is_cumulative(&self) -> bool {
        self.badge_type == BadgeType::Cumulative
    }

    /// Recurrence of the badge's cycle.
    pub fn cycle_recurrence(&self) -> Recurrence {
        match self.badge_type {
            BadgeType::Daily => Recurrence::daily(),
            _ => self.reset_schedule.recurrence,
        }
    }

    pub fn is_recurring(&self) -> bool {
        self.cycle_recurrence().is_recurring()
    }

    pub fn tracks(&self, chore_id: &str) -> bool {
        self.tracked_chores.is_empty() || self.tracked_chores.iter().any(|c| c == chore_id)
    }

    pub fn is_in_effect(&self, now: DateTime<Utc>) -> bool {
        if self.reset_schedule.start_date.is_some_and(|start| now < start) {
            return false;
        }
        if self.reset_schedule.end_date.is_some_and(|end| now > end) {
            return false;
        }
        match (self.badge_type, self.occasion_date) {
            (BadgeType::SpecialOccasion, Some(date)) => {
                date.month() == now.month() && date.day() == now.day()
            }
            (BadgeType::SpecialOccasion, None) => false,
            _ => true,
        }
    }

    pub fn mark_earned_by(&mut self, kid_id: &str) {
        if !self.earned_by.iter().any(|k| k == kid_id) {
            self.earned_by.push(kid_id.to_string());
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BadgeProgressStatus {
    /// One-time badge not earned yet
    #[default]
    InProgress,
    /// Recurring badge with a running, not yet met cycle
    ActiveCycle,
    /// Met (this cycle, or for good on one-time badges)
    Earned,
}

/// Per kid x badge progress for non-cumulative badges.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KidBadgeProgress {
    #[serde(default)]
    pub status: BadgeProgressStatus,
    #[serde(default)]
    pub cycle_start: Option<DateTime<Utc>>,
    #[serde(default)]
    pub cycle_end: Option<DateTime<Utc>>,
    /// Last day already folded into the cycle accumulators.
    #[serde(default)]
    pub last_rolled: Option<NaiveDate>,
    #[serde(default)]
    pub cycle_points: f64,
    #[serde(default)]
    pub cycle_chore_count: u32,
    #[serde(default)]
    pub cycle_days_completed: u32,
    #[serde(default)]
    pub current_streak: u32,
    #[serde(default)]
    pub best_streak: u32,
    /// Today's not yet rolled contribution.
    #[serde(default)]
    pub today_value: f64,
    #[serde(default)]
    pub criteria_met: bool,
    /// Start of the last cycle whose miss was penalized. Outlives the cycle
    /// so a replayed close never penalizes twice.
    #[serde(default)]
    pub penalized_cycle: Option<DateTime<Utc>>,
}

impl KidBadgeProgress {
    /// Clear accumulators for a new cycle.
    pub fn start_cycle(&mut self, start: DateTime<Utc>, end: Option<DateTime<Utc>>) {
        self.status = BadgeProgressStatus::ActiveCycle;
        self.cycle_start = Some(start);
        self.cycle_end = end;
        self.cycle_points = 0.0;
        self.cycle_chore_count = 0;
        self.cycle_days_completed = 0;
        self.current_streak = 0;
        self.today_value = 0.0;
        self.criteria_met = false;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CumulativeStatus {
    #[default]
    Active,
    Grace,
    Demoted,
}

/// One per kid: position on the cumulative badge ladder.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CumulativeBadgeProgress {
    #[serde(default)]
    pub status: CumulativeStatus,
    /// Points banked from earlier cycles.
    #[serde(default)]
    pub baseline: f64,
    /// Points earned since the baseline last rolled forward.
    #[serde(default)]
    pub cycle_points: f64,
    #[serde(default)]
    pub current_badge: Option<String>,
    #[serde(default)]
    pub highest_earned: Option<String>,
    #[serde(default)]
    pub next_higher: Option<String>,
    #[serde(default)]
    pub next_lower: Option<String>,
    #[serde(default)]
    pub maintenance_end: Option<DateTime<Utc>>,
    #[serde(default)]
    pub grace_end: Option<DateTime<Utc>>,
}

impl CumulativeBadgeProgress {
    pub fn total(&self) -> f64 {
        self.baseline + self.cycle_points
    }

    /// Bank the cycle into the baseline.
    pub fn roll_forward(&mut self) {
        self.baseline += self.cycle_points;
        self.cycle_points = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn day_rules() {
        assert!(DayRule::All.is_met(3, 3, 3));
        assert!(!DayRule::All.is_met(2, 3, 2));
        assert!(!DayRule::All.is_met(0, 0, 0));
        assert!(DayRule::Percent80.is_met(4, 5, 4));
        assert!(!DayRule::Percent80.is_met(3, 5, 3));
        assert!(DayRule::MinCount(2).is_met(0, 0, 2));
    }

    #[test]
    fn special_occasion_only_on_its_day() {
        let mut badge = Badge::new("Birthday helper", BadgeType::SpecialOccasion, 1.0);
        badge.occasion_date = NaiveDate::from_ymd_opt(2019, 10, 16);
        let on = Utc.with_ymd_and_hms(2026, 10, 16, 8, 0, 0).unwrap();
        let off = Utc.with_ymd_and_hms(2026, 10, 17, 8, 0, 0).unwrap();
        assert!(badge.is_in_effect(on));
        assert!(!badge.is_in_effect(off));
    }

    #[test]
    fn roll_forward_banks_cycle() {
        let mut progress = CumulativeBadgeProgress {
            baseline: 40.0,
            cycle_points: 25.0,
            ..Default::default()
        };
        progress.roll_forward();
        assert_eq!(progress.baseline, 65.0);
        assert_eq!(progress.cycle_points, 0.0);
        assert_eq!(progress.total(), 65.0);
    }
}
