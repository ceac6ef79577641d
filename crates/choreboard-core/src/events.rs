use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::model::ChoreState;
use crate::stats::PointSource;

/// Every state change the engine makes produces an Event.
/// Subscribers receive them through [`Engine::subscribe`](crate::Engine::subscribe).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    ChoreClaimed {
        kid_id: String,
        chore_id: String,
        at: DateTime<Utc>,
    },
    ChoreApproved {
        kid_id: String,
        chore_id: String,
        points: f64,
        at: DateTime<Utc>,
    },
    ChoreDisapproved {
        kid_id: String,
        chore_id: String,
        at: DateTime<Utc>,
    },
    /// Throttled reminder that a chore is past due.
    ChoreOverdue {
        kid_id: String,
        chore_id: String,
        due_date: DateTime<Utc>,
        at: DateTime<Utc>,
    },
    /// A slot went back to pending through an automatic reset.
    ChoreReset {
        kid_id: String,
        chore_id: String,
        previous: ChoreState,
        at: DateTime<Utc>,
    },
    DueDateChanged {
        chore_id: String,
        kid_id: Option<String>,
        due_date: Option<DateTime<Utc>>,
        at: DateTime<Utc>,
    },
    PointsChanged {
        kid_id: String,
        delta: f64,
        balance: f64,
        source: PointSource,
        at: DateTime<Utc>,
    },
    RewardClaimed {
        kid_id: String,
        reward_id: String,
        at: DateTime<Utc>,
    },
    RewardApproved {
        kid_id: String,
        reward_id: String,
        cost: f64,
        at: DateTime<Utc>,
    },
    RewardDisapproved {
        kid_id: String,
        reward_id: String,
        at: DateTime<Utc>,
    },
    BonusApplied {
        kid_id: String,
        bonus_id: String,
        points: f64,
        at: DateTime<Utc>,
    },
    PenaltyApplied {
        kid_id: String,
        penalty_id: String,
        points: f64,
        at: DateTime<Utc>,
    },
    BadgeEarned {
        kid_id: String,
        badge_id: String,
        at: DateTime<Utc>,
    },
    BadgeRemoved {
        kid_id: String,
        badge_id: String,
        at: DateTime<Utc>,
    },
    /// Cumulative tier kept for another maintenance window.
    BadgeMaintained {
        kid_id: String,
        badge_id: String,
        at: DateTime<Utc>,
    },
    BadgeGraceStarted {
        kid_id: String,
        badge_id: String,
        grace_end: DateTime<Utc>,
        at: DateTime<Utc>,
    },
    BadgeDemoted {
        kid_id: String,
        from_badge: String,
        to_badge: Option<String>,
        at: DateTime<Utc>,
    },
    AchievementUnlocked {
        kid_id: String,
        achievement_id: String,
        at: DateTime<Utc>,
    },
    ChallengeCompleted {
        kid_id: String,
        challenge_id: String,
        at: DateTime<Utc>,
    },
}

impl Event {
    /// Kid the event concerns, if any.
    pub fn kid_id(&self) -> Option<&str> {
        match self {
            Event::ChoreClaimed { kid_id, .. }
            | Event::ChoreApproved { kid_id, .. }
            | Event::ChoreDisapproved { kid_id, .. }
            | Event::ChoreOverdue { kid_id, .. }
            | Event::ChoreReset { kid_id, .. }
            | Event::PointsChanged { kid_id, .. }
            | Event::RewardClaimed { kid_id, .. }
            | Event::RewardApproved { kid_id, .. }
            | Event::RewardDisapproved { kid_id, .. }
            | Event::BonusApplied { kid_id, .. }
            | Event::PenaltyApplied { kid_id, .. }
            | Event::BadgeEarned { kid_id, .. }
            | Event::BadgeRemoved { kid_id, .. }
            | Event::BadgeMaintained { kid_id, .. }
            | Event::BadgeGraceStarted { kid_id, .. }
            | Event::BadgeDemoted { kid_id, .. }
            | Event::AchievementUnlocked { kid_id, .. }
            | Event::ChallengeCompleted { kid_id, .. } => Some(kid_id),
            Event::DueDateChanged { kid_id, .. } => kid_id.as_deref(),
        }
    }
}

/// What one operation produced: events to publish and kids whose
/// gamification state must be re-evaluated.
#[derive(Debug, Default)]
pub struct Effects {
    pub events: Vec<Event>,
    pub dirty_kids: BTreeSet<String>,
}

impl Effects {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn emit(&mut self, event: Event) {
        self.events.push(event);
    }

    pub fn mark_dirty(&mut self, kid_id: &str) {
        self.dirty_kids.insert(kid_id.to_string());
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty() && self.dirty_kids.is_empty()
    }

    pub fn extend(&mut self, other: Effects) {
        self.events.extend(other.events);
        self.dirty_kids.extend(other.dirty_kids);
    }
}
