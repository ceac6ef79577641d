//! # Choreboard Core Library
//!
//! Rules engine of a household chore and rewards tracker. For every kid and
//! chore it decides task state, overdue transitions and due-date rollover;
//! downstream of approvals it decides badges, achievements and challenges,
//! and it keeps a points ledger aggregated into periodic statistics.
//!
//! ## Architecture
//!
//! - **Schedule**: pure recurrence and date arithmetic
//! - **Chore state machine**: per-kid and aggregate chore state under the
//!   independent, shared and shared-first completion criteria
//! - **Stats**: one generic periodic-bucket accumulator reused for every ledger
//! - **Gamification**: periodic and cumulative badges, achievements, challenges
//! - **Storage**: SQLite persistence of one JSON document and TOML configuration
//!
//! ## Key Components
//!
//! - [`Engine`]: command surface; persists and publishes after every command
//! - [`ChoreStateEngine`]: chore transitions on a borrowed [`Store`]
//! - [`GamificationEngine`]: batched evaluation of dirty kids
//! - [`Ticker`]: async loop running sweeps and debounced evaluation

pub mod chore;
pub mod engine;
pub mod error;
pub mod events;
pub mod gamification;
pub mod model;
pub mod rewards;
pub mod runtime;
pub mod schedule;
pub mod stats;
pub mod storage;
pub mod store;

pub use chore::{AggregateState, ChoreStateEngine, ChoreStatus};
pub use engine::{Engine, TickReport};
pub use error::{ConfigError, CoreError, DatabaseError, EntityKind, InvalidStateReason, Result};
pub use events::{Effects, Event};
pub use gamification::GamificationEngine;
pub use runtime::{DirtyQueue, Ticker};
pub use schedule::{Frequency, IntervalUnit, Recurrence};
pub use stats::{PeriodicStats, PointSource, Retention};
pub use storage::{Database, EngineConfig};
pub use store::Store;
