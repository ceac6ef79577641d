//! Chores and per-kid chore progress.
//!
//! Per-kid state transitions:
//!
//! ```text
//!   Pending ──claim──> Claimed ──approve──> Approved ──reset──> Pending
//!      ^  \              |                     |
//!      |   due passes    disapprove            (UponCompletion: immediately)
//!      |      v          v
//!      +── Overdue     Pending
//!
//!   SharedFirst only: siblings of a claimant -> CompletedByOther
//! ```
//!
//! A chore's aggregate state is never stored; it is derived from the
//! progress records of its assigned kids, see [`crate::chore::aggregate_state`].

use chrono::{DateTime, Datelike, NaiveDate, Utc, Weekday};
use serde::{Deserialize, Serialize};

use crate::schedule::{Frequency, Recurrence};
use crate::stats::{ChoreCounters, PeriodicStats};

/// Which assigned kids must act, and how their progress composes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CompletionCriteria {
    /// Every kid has their own copy of the chore and their own due date.
    #[default]
    Independent,
    /// Every assigned kid must complete it.
    Shared,
    /// The first kid to claim it completes it for everyone.
    SharedFirst,
}

/// When an approval stops counting and the chore becomes claimable again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalResetType {
    #[default]
    AtMidnightOnce,
    AtMidnightMulti,
    AtDueDateOnce,
    AtDueDateMulti,
    UponCompletion,
}

impl ApprovalResetType {
    /// Whether several claims/approvals may stack within one period.
    pub fn allows_multiple_claims(self) -> bool {
        matches!(
            self,
            ApprovalResetType::AtMidnightMulti
                | ApprovalResetType::AtDueDateMulti
                | ApprovalResetType::UponCompletion
        )
    }

    pub fn resets_at_due_date(self) -> bool {
        matches!(
            self,
            ApprovalResetType::AtDueDateOnce | ApprovalResetType::AtDueDateMulti
        )
    }
}

/// Whether and how a missed due date becomes `Overdue`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OverdueHandling {
    Never,
    #[default]
    AtDueDate,
    /// Overdue at the due date, then reset at the next midnight.
    AtDueDateThenReset,
}

/// What an automatic reset does with a claim still awaiting approval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PendingClaimAction {
    /// Keep the claim and skip the reset.
    Hold,
    /// Drop the claim and reset.
    #[default]
    Clear,
    /// Approve the claim, then reset.
    AutoApprove,
}

/// Per kid x chore state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ChoreState {
    #[default]
    Pending,
    Claimed,
    Approved,
    Overdue,
    /// Shared-first chore that another kid claimed.
    CompletedByOther,
}

impl std::fmt::Display for ChoreState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            ChoreState::Pending => "pending",
            ChoreState::Claimed => "claimed",
            ChoreState::Approved => "approved",
            ChoreState::Overdue => "overdue",
            ChoreState::CompletedByOther => "completed_by_other",
        };
        f.write_str(text)
    }
}

/// A chore definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chore {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_points")]
    pub default_points: f64,
    #[serde(default)]
    pub assigned_kids: Vec<String>,
    #[serde(default)]
    pub completion_criteria: CompletionCriteria,
    #[serde(default)]
    pub recurrence: Recurrence,
    /// Weekdays a due date may land on; empty means any day.
    #[serde(default)]
    pub applicable_days: Vec<Weekday>,
    /// Chore-level due date. For independent chores this is only the template
    /// copied into each kid's progress.
    #[serde(default)]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub approval_reset: ApprovalResetType,
    #[serde(default)]
    pub overdue_handling: OverdueHandling,
    #[serde(default)]
    pub pending_claim_action: PendingClaimAction,
    #[serde(default)]
    pub auto_approve: bool,
    /// Start of the current approval period for shared chores.
    #[serde(default)]
    pub approval_period_start: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

fn default_points() -> f64 {
    10.0
}

impl Chore {
    pub fn new(name: impl Into<String>, default_points: f64) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            description: None,
            default_points,
            assigned_kids: Vec::new(),
            completion_criteria: CompletionCriteria::Independent,
            recurrence: Recurrence::none(),
            applicable_days: Vec::new(),
            due_date: None,
            approval_reset: ApprovalResetType::AtMidnightOnce,
            overdue_handling: OverdueHandling::AtDueDate,
            pending_claim_action: PendingClaimAction::Clear,
            auto_approve: false,
            approval_period_start: None,
            created_at: Utc::now(),
        }
    }

    pub fn is_assigned(&self, kid_id: &str) -> bool {
        self.assigned_kids.iter().any(|k| k == kid_id)
    }

    pub fn is_recurring(&self) -> bool {
        self.recurrence.is_recurring()
    }

    /// Due date that applies to `progress`'s kid.
    pub fn due_date_for(&self, progress: Option<&ChoreProgress>) -> Option<DateTime<Utc>> {
        match self.completion_criteria {
            CompletionCriteria::Independent => progress.and_then(|p| p.due_date),
            CompletionCriteria::Shared | CompletionCriteria::SharedFirst => self.due_date,
        }
    }

    /// Approval period start that applies to `progress`'s kid.
    pub fn period_start_for(&self, progress: &ChoreProgress) -> Option<DateTime<Utc>> {
        match self.completion_criteria {
            CompletionCriteria::Independent => progress.approval_period_start,
            CompletionCriteria::Shared | CompletionCriteria::SharedFirst => {
                self.approval_period_start
            }
        }
    }

    /// Whether the chore counts as due on `date`, given the kid's due date.
    pub fn is_due_on(&self, date: NaiveDate, due: Option<DateTime<Utc>>) -> bool {
        if !self.applicable_days.is_empty() && !self.applicable_days.contains(&date.weekday()) {
            return false;
        }
        match due {
            Some(due) if self.recurrence.frequency != Frequency::Daily => due.date_naive() == date,
            Some(_) => true,
            None => {
                self.recurrence.frequency == Frequency::Daily || !self.applicable_days.is_empty()
            }
        }
    }
}

/// Per kid x chore progress.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChoreProgress {
    #[serde(default)]
    pub state: ChoreState,
    /// Claims waiting for approval. Only multi-claim reset types stack.
    #[serde(default)]
    pub pending_claim_count: u32,
    #[serde(default)]
    pub last_claimed: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_approved: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_disapproved: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_overdue: Option<DateTime<Utc>>,
    /// Independent chores only.
    #[serde(default)]
    pub approval_period_start: Option<DateTime<Utc>>,
    /// Independent chores only.
    #[serde(default)]
    pub due_date: Option<DateTime<Utc>>,
    /// End of the period the last approval belongs to (independent chores,
    /// whose due date moves forward on approval).
    #[serde(default)]
    pub period_end: Option<DateTime<Utc>>,
    /// Shared-first: the kid whose claim completed this chore.
    #[serde(default)]
    pub completed_by: Option<String>,
    #[serde(default)]
    pub current_streak: u32,
    #[serde(default)]
    pub last_completed: Option<NaiveDate>,
    #[serde(default)]
    pub stats: PeriodicStats<ChoreCounters>,
}

impl ChoreProgress {
    pub fn new(due_date: Option<DateTime<Utc>>) -> Self {
        Self {
            due_date,
            ..Default::default()
        }
    }

    /// Approved within the period that started at `period_start`.
    pub fn is_approved_in_period(&self, period_start: Option<DateTime<Utc>>) -> bool {
        match (self.last_approved, period_start) {
            (None, _) => false,
            (Some(_), None) => true,
            (Some(approved), Some(start)) => approved >= start,
        }
    }

    pub fn has_pending_claim(&self) -> bool {
        self.pending_claim_count > 0
    }

    /// Latest timestamp at which anything happened to this slot.
    pub fn last_activity(&self) -> Option<DateTime<Utc>> {
        [
            self.last_claimed,
            self.last_approved,
            self.last_disapproved,
            self.last_overdue,
            self.approval_period_start,
        ]
        .into_iter()
        .flatten()
        .max()
    }

    /// Bump the streak and completion counters for an approval at `at`.
    ///
    /// The streak continues when the previous completion is no more than one
    /// recurrence period back.
    pub fn record_approval(&mut self, at: DateTime<Utc>, points: f64, recurrence: &Recurrence) {
        let today = at.date_naive();
        let tolerance = recurrence.period_days().unwrap_or(1);
        self.current_streak = match self.last_completed {
            Some(prev) if prev == today => self.current_streak.max(1),
            Some(prev) if (today - prev).num_days() <= tolerance => self.current_streak + 1,
            _ => 1,
        };
        self.last_completed = Some(today);

        let streak = self.current_streak;
        self.stats.record(at, |c| {
            c.approved += 1;
            c.points += points;
            c.longest_streak = c.longest_streak.max(streak);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn at(d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, d, h, 0, 0).unwrap()
    }

    #[test]
    fn approved_in_period_rules() {
        let mut progress = ChoreProgress::default();
        assert!(!progress.is_approved_in_period(None));

        progress.last_approved = Some(at(10, 9));
        assert!(progress.is_approved_in_period(None));
        assert!(progress.is_approved_in_period(Some(at(10, 9))));
        assert!(!progress.is_approved_in_period(Some(at(11, 0))));
    }

    #[test]
    fn multi_claim_reset_types() {
        assert!(!ApprovalResetType::AtMidnightOnce.allows_multiple_claims());
        assert!(!ApprovalResetType::AtDueDateOnce.allows_multiple_claims());
        assert!(ApprovalResetType::AtMidnightMulti.allows_multiple_claims());
        assert!(ApprovalResetType::UponCompletion.allows_multiple_claims());
    }

    #[test]
    fn streak_continues_within_one_period() {
        let mut progress = ChoreProgress::default();
        let daily = Recurrence::daily();
        progress.record_approval(at(10, 9), 5.0, &daily);
        progress.record_approval(at(11, 9), 5.0, &daily);
        progress.record_approval(at(11, 18), 5.0, &daily);
        assert_eq!(progress.current_streak, 2);

        progress.record_approval(at(11, 9) + Duration::days(3), 5.0, &daily);
        assert_eq!(progress.current_streak, 1);
        assert_eq!(progress.stats.all_time().approved, 4);
        assert_eq!(progress.stats.all_time().longest_streak, 2);
    }

    #[test]
    fn weekly_streak_tolerates_a_week_gap() {
        let mut progress = ChoreProgress::default();
        let weekly = Recurrence::weekly();
        progress.record_approval(at(2, 9), 5.0, &weekly);
        progress.record_approval(at(9, 9), 5.0, &weekly);
        assert_eq!(progress.current_streak, 2);
    }

    #[test]
    fn due_on_respects_applicable_days() {
        let mut chore = Chore::new("Dishes", 5.0);
        chore.recurrence = Recurrence::daily();
        chore.applicable_days = vec![Weekday::Mon];
        // 2026-10-16 is a Friday, 2026-10-19 a Monday
        assert!(!chore.is_due_on(at(16, 0).date_naive(), None));
        assert!(chore.is_due_on(at(19, 0).date_naive(), None));
    }
}
