//! Statistics module for Choreboard
//!
//! A single generic accumulator ([`PeriodicStats`]) is reused for the point
//! ledger, chore completion counters, badge earn counters and reward counters.

mod accumulator;
mod counters;

pub use accumulator::{Period, PeriodicStats, Retention};
pub use counters::{
    record_points, BadgeCounters, ChoreCounters, PointCounters, PointSource, RewardCounters,
};
