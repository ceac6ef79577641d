//! Debounced background work: the persisted dirty queue and the ticker.

mod dirty_queue;
mod ticker;

pub use dirty_queue::DirtyQueue;
pub use ticker::Ticker;
