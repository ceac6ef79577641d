//! One-shot achievements and time-boxed challenges.
//!
//! Both carry their per-kid progress inline; once `awarded` is set it is
//! never cleared by evaluation.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::badge::AwardManifest;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AchievementKind {
    /// Consecutive days with at least one approval of the linked chore.
    ChoreStreak,
    /// Approvals since assignment.
    ChoreTotal,
    /// Approvals on a single day.
    DailyMinimum,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AchievementProgress {
    #[serde(default)]
    pub awarded: bool,
    #[serde(default)]
    pub awarded_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub streak: u32,
    #[serde(default)]
    pub last_streak_date: Option<NaiveDate>,
    /// Lifetime approvals at the moment the kid was assigned.
    #[serde(default)]
    pub baseline: u32,
    #[serde(default)]
    pub current: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Achievement {
    pub id: String,
    pub name: String,
    pub kind: AchievementKind,
    pub target: u32,
    /// Linked chore; `None` counts every chore.
    #[serde(default)]
    pub chore_id: Option<String>,
    #[serde(default)]
    pub assigned_kids: Vec<String>,
    #[serde(default)]
    pub award: AwardManifest,
    #[serde(default)]
    pub progress: BTreeMap<String, AchievementProgress>,
}

impl Achievement {
    pub fn new(name: impl Into<String>, kind: AchievementKind, target: u32) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            kind,
            target,
            chore_id: None,
            assigned_kids: Vec::new(),
            award: AwardManifest::default(),
            progress: BTreeMap::new(),
        }
    }

    pub fn is_assigned(&self, kid_id: &str) -> bool {
        self.assigned_kids.iter().any(|k| k == kid_id)
    }

    /// Whether an approval of `chore_id` counts toward this achievement.
    pub fn selects(&self, chore_id: &str) -> bool {
        self.chore_id.as_deref().map_or(true, |c| c == chore_id)
    }

    pub fn is_awarded(&self, kid_id: &str) -> bool {
        self.progress.get(kid_id).is_some_and(|p| p.awarded)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChallengeKind {
    /// Approvals counted while the window is open.
    TotalWithinWindow,
    /// A minimum number of approvals on every day of the window.
    DailyMinimum,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChallengeProgress {
    #[serde(default)]
    pub awarded: bool,
    #[serde(default)]
    pub awarded_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub count: u32,
    /// Approvals per day inside the window, keyed `YYYY-MM-DD`.
    #[serde(default)]
    pub daily_counts: BTreeMap<String, u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Challenge {
    pub id: String,
    pub name: String,
    pub kind: ChallengeKind,
    pub target: u32,
    #[serde(default)]
    pub chore_id: Option<String>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    #[serde(default)]
    pub assigned_kids: Vec<String>,
    #[serde(default)]
    pub award: AwardManifest,
    #[serde(default)]
    pub progress: BTreeMap<String, ChallengeProgress>,
}

impl Challenge {
    pub fn new(
        name: impl Into<String>,
        kind: ChallengeKind,
        target: u32,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            kind,
            target,
            chore_id: None,
            start,
            end,
            assigned_kids: Vec::new(),
            award: AwardManifest::default(),
            progress: BTreeMap::new(),
        }
    }

    pub fn is_assigned(&self, kid_id: &str) -> bool {
        self.assigned_kids.iter().any(|k| k == kid_id)
    }

    pub fn selects(&self, chore_id: &str) -> bool {
        self.chore_id.as_deref().map_or(true, |c| c == chore_id)
    }

    pub fn is_open(&self, now: DateTime<Utc>) -> bool {
        self.start <= now && now <= self.end
    }

    /// Calendar days covered by the window.
    pub fn window_days(&self) -> impl Iterator<Item = NaiveDate> {
        let end = self.end.date_naive();
        self.start
            .date_naive()
            .iter_days()
            .take_while(move |day| *day <= end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn unlinked_achievement_selects_every_chore() {
        let mut achievement = Achievement::new("Helper", AchievementKind::ChoreTotal, 10);
        assert!(achievement.selects("anything"));
        achievement.chore_id = Some("dishes".into());
        assert!(achievement.selects("dishes"));
        assert!(!achievement.selects("laundry"));
    }

    #[test]
    fn challenge_window_is_inclusive() {
        let start = Utc.with_ymd_and_hms(2026, 10, 12, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2026, 10, 14, 23, 59, 59).unwrap();
        let challenge = Challenge::new("Busy week", ChallengeKind::DailyMinimum, 1, start, end);
        assert!(challenge.is_open(start));
        assert!(challenge.is_open(end));
        assert_eq!(challenge.window_days().count(), 3);
    }
}
