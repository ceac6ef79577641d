//! Durable set of kids awaiting gamification, with debounce.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::error::Result;
use crate::storage::database::{Database, DIRTY_QUEUE_KEY};

/// On-disk form of the queue.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct PersistedQueue {
    kids: BTreeSet<String>,
    deadline: Option<DateTime<Utc>>,
}

/// Kids whose gamification state must be re-evaluated.
///
/// Every mark restarts a single deadline; the batch is ready once `debounce`
/// has passed without further marks.
#[derive(Debug, Clone)]
pub struct DirtyQueue {
    pending: BTreeSet<String>,
    deadline: Option<DateTime<Utc>>,
    debounce: Duration,
}

impl DirtyQueue {
    pub fn new(debounce: Duration) -> Self {
        Self {
            pending: BTreeSet::new(),
            deadline: None,
            debounce,
        }
    }

    pub fn set_debounce(&mut self, debounce: Duration) {
        self.debounce = debounce;
    }

    /// Mark kids dirty at `now`. Restarts the deadline when anything was given.
    pub fn mark<I, S>(&mut self, kid_ids: I, now: DateTime<Utc>)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut touched = false;
        for kid_id in kid_ids {
            self.pending.insert(kid_id.into());
            touched = true;
        }
        if touched {
            self.deadline = Some(now + self.debounce);
        }
    }

    /// Drop a kid, e.g. after deletion.
    pub fn remove(&mut self, kid_id: &str) {
        self.pending.remove(kid_id);
        if self.pending.is_empty() {
            self.deadline = None;
        }
    }

    pub fn is_ready(&self, now: DateTime<Utc>) -> bool {
        !self.pending.is_empty() && self.deadline.map_or(true, |d| d <= now)
    }

    /// Take the whole batch if the deadline has passed.
    pub fn take_ready(&mut self, now: DateTime<Utc>) -> Option<Vec<String>> {
        if !self.is_ready(now) {
            return None;
        }
        Some(self.take_all())
    }

    /// Take the whole batch regardless of the deadline.
    pub fn take_all(&mut self) -> Vec<String> {
        self.deadline = None;
        std::mem::take(&mut self.pending).into_iter().collect()
    }

    pub fn deadline(&self) -> Option<DateTime<Utc>> {
        self.deadline
    }

    /// Time left until the batch is ready, zero if overdue.
    pub fn time_until_ready(&self, now: DateTime<Utc>) -> Option<Duration> {
        if self.pending.is_empty() {
            return None;
        }
        Some(self.deadline.map_or(Duration::zero(), |d| {
            if d > now {
                d - now
            } else {
                Duration::zero()
            }
        }))
    }

    pub fn contains(&self, kid_id: &str) -> bool {
        self.pending.contains(kid_id)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Persist the queue.
    pub fn persist(&self, db: &Database) -> Result<()> {
        db.save_json(
            DIRTY_QUEUE_KEY,
            &PersistedQueue {
                kids: self.pending.clone(),
                deadline: self.deadline,
            },
        )
    }

    /// Load a persisted queue, keeping the configured debounce.
    pub fn load(&mut self, db: &Database) -> Result<()> {
        if let Some(saved) = db.load_json::<PersistedQueue>(DIRTY_QUEUE_KEY)? {
            self.pending = saved.kids;
            self.deadline = if self.pending.is_empty() {
                None
            } else {
                saved.deadline
            };
        }
        Ok(())
    }
}
