//! Aggregate (chore-level) state, derived from per-kid progress.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::model::{Chore, ChoreState, CompletionCriteria, Kid};

/// Chore-level state shown for a chore with several assigned kids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregateState {
    Pending,
    Claimed,
    Approved,
    Overdue,
    CompletedByOther,
    /// Shared: some kids have claimed, not all
    ClaimedInPart,
    /// Shared: some kids are approved, not all
    ApprovedInPart,
    /// Independent chore whose kids are in different states
    Independent,
    Unknown,
}

impl From<ChoreState> for AggregateState {
    fn from(state: ChoreState) -> Self {
        match state {
            ChoreState::Pending => AggregateState::Pending,
            ChoreState::Claimed => AggregateState::Claimed,
            ChoreState::Approved => AggregateState::Approved,
            ChoreState::Overdue => AggregateState::Overdue,
            ChoreState::CompletedByOther => AggregateState::CompletedByOther,
        }
    }
}

/// Per-kid state of every assigned kid; kids without progress count as
/// pending.
pub fn kid_states(chore: &Chore, kids: &BTreeMap<String, Kid>) -> Vec<ChoreState> {
    chore
        .assigned_kids
        .iter()
        .map(|kid_id| {
            kids.get(kid_id)
                .and_then(|kid| kid.progress(&chore.id))
                .map(|p| p.state)
                .unwrap_or_default()
        })
        .collect()
}

/// Derive the chore-level state from its kids' states.
pub fn aggregate_state(criteria: CompletionCriteria, states: &[ChoreState]) -> AggregateState {
    let Some(first) = states.first() else {
        return AggregateState::Pending;
    };
    if states.iter().all(|s| s == first) {
        return (*first).into();
    }

    let any = |wanted: ChoreState| states.contains(&wanted);
    match criteria {
        CompletionCriteria::Independent => AggregateState::Independent,
        CompletionCriteria::Shared => {
            if any(ChoreState::Overdue) {
                AggregateState::Overdue
            } else if any(ChoreState::Approved) {
                AggregateState::ApprovedInPart
            } else if any(ChoreState::Claimed) {
                AggregateState::ClaimedInPart
            } else {
                AggregateState::Unknown
            }
        }
        CompletionCriteria::SharedFirst => {
            if any(ChoreState::Approved) {
                AggregateState::Approved
            } else if any(ChoreState::Claimed) {
                AggregateState::Claimed
            } else if any(ChoreState::Overdue) {
                AggregateState::Overdue
            } else {
                AggregateState::Pending
            }
        }
    }
}

/// One kid's row in a [`ChoreStatus`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KidChoreStatus {
    pub kid_id: String,
    pub state: ChoreState,
    pub due_date: Option<DateTime<Utc>>,
    pub pending_claims: u32,
    pub approved_in_period: bool,
}

/// Snapshot of a chore for display or scripting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChoreStatus {
    pub chore_id: String,
    pub name: String,
    pub aggregate: AggregateState,
    pub kids: Vec<KidChoreStatus>,
}

pub fn chore_status(chore: &Chore, kids: &BTreeMap<String, Kid>) -> ChoreStatus {
    let rows = chore
        .assigned_kids
        .iter()
        .map(|kid_id| {
            let progress = kids.get(kid_id).and_then(|k| k.progress(&chore.id));
            KidChoreStatus {
                kid_id: kid_id.clone(),
                state: progress.map(|p| p.state).unwrap_or_default(),
                due_date: chore.due_date_for(progress),
                pending_claims: progress.map_or(0, |p| p.pending_claim_count),
                approved_in_period: progress
                    .is_some_and(|p| p.is_approved_in_period(chore.period_start_for(p))),
            }
        })
        .collect();

    ChoreStatus {
        chore_id: chore.id.clone(),
        name: chore.name.clone(),
        aggregate: aggregate_state(chore.completion_criteria, &kid_states(chore, kids)),
        kids: rows,
    }
}
