//! Chore state machine and aggregate state.

mod engine;
mod state;

pub use engine::{ChoreStateEngine, DEFAULT_OVERDUE_NOTIFY_INTERVAL_HOURS};
pub use state::{aggregate_state, chore_status, kid_states, AggregateState, ChoreStatus, KidChoreStatus};
