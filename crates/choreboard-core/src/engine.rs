//! Command surface.
//!
//! [`Engine`] owns the store, runs every command to completion, then marks
//! the affected kids dirty, persists and publishes the resulting events, in
//! that order. The background [`Ticker`](crate::runtime::Ticker) drives
//! [`Engine::tick`].

use chrono::{DateTime, Duration, NaiveDate, Utc};
use std::sync::Arc;
use tokio::sync::{broadcast, Notify};
use tracing::{debug, info};

use crate::chore::{chore_status, ChoreStateEngine, ChoreStatus};
use crate::error::Result;
use crate::events::{Effects, Event};
use crate::gamification::GamificationEngine;
use crate::model::{Achievement, Badge, Bonus, Challenge, Chore, Kid, Parent, Penalty, Reward};
use crate::rewards;
use crate::runtime::DirtyQueue;
use crate::storage::{Database, EngineConfig};
use crate::store::Store;

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// What one [`Engine::tick`] did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickReport {
    /// Periodic reset and overdue sweep ran.
    pub swept: bool,
    /// Kids evaluated by the gamification batch.
    pub evaluated: usize,
    /// Stats buckets pruned.
    pub pruned: usize,
    /// When the next tick has work to do.
    pub next_due: Option<DateTime<Utc>>,
}

pub struct Engine {
    store: Store,
    config: EngineConfig,
    db: Option<Database>,
    dirty: DirtyQueue,
    events: broadcast::Sender<Event>,
    wake: Arc<Notify>,
    last_sweep: Option<DateTime<Utc>>,
    last_prune: Option<NaiveDate>,
}

impl Engine {
    /// An engine without persistence.
    pub fn in_memory(config: EngineConfig) -> Self {
        Self::with_store(Store::new(), config, None)
    }

    /// Open an engine on `db`, resuming its document and dirty queue.
    pub fn open(db: Database, config: EngineConfig) -> Result<Self> {
        let store = db.load_store()?.unwrap_or_default();
        let mut engine = Self::with_store(store, config, None);
        engine.dirty.load(&db)?;
        if !engine.dirty.is_empty() {
            info!(pending = engine.dirty.len(), "resuming gamification queue");
        }
        engine.db = Some(db);
        Ok(engine)
    }

    /// Open the default database and configuration in the data directory.
    pub fn open_default() -> Result<Self> {
        let config = EngineConfig::load()?;
        Self::open(Database::open()?, config)
    }

    fn with_store(store: Store, config: EngineConfig, db: Option<Database>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            store,
            dirty: DirtyQueue::new(config.debounce()),
            config,
            db,
            events,
            wake: Arc::new(Notify::new()),
            last_sweep: None,
            last_prune: None,
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: EngineConfig) {
        self.dirty.set_debounce(config.debounce());
        self.config = config;
    }

    pub fn dirty_queue(&self) -> &DirtyQueue {
        &self.dirty
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.events.subscribe()
    }

    /// Notified whenever a kid is marked dirty.
    pub fn wake_handle(&self) -> Arc<Notify> {
        Arc::clone(&self.wake)
    }

    fn persist(&self) -> Result<()> {
        if let Some(db) = &self.db {
            db.save_store(&self.store)?;
            self.dirty.persist(db)?;
        }
        Ok(())
    }

    fn commit(&mut self, effects: Effects, now: DateTime<Utc>) -> Result<()> {
        let marked = !effects.dirty_kids.is_empty();
        self.dirty.mark(effects.dirty_kids, now);
        self.persist()?;
        for event in effects.events {
            // No subscribers is fine.
            let _ = self.events.send(event);
        }
        if marked {
            self.wake.notify_one();
        }
        Ok(())
    }

    fn run<T>(
        &mut self,
        now: DateTime<Utc>,
        op: impl FnOnce(&mut Store, &mut Effects) -> Result<T>,
    ) -> Result<T> {
        let mut effects = Effects::new();
        let out = op(&mut self.store, &mut effects)?;
        self.commit(effects, now)?;
        Ok(out)
    }

    fn run_chores<T>(
        &mut self,
        now: DateTime<Utc>,
        op: impl FnOnce(&mut ChoreStateEngine<'_>) -> Result<T>,
    ) -> Result<T> {
        let interval = self.config.overdue_notify_interval();
        self.run(now, |store, effects| {
            let mut chores =
                ChoreStateEngine::new(store, effects).with_overdue_notify_interval(interval);
            op(&mut chores)
        })
    }

    fn run_gamification<T>(
        &mut self,
        now: DateTime<Utc>,
        op: impl FnOnce(&mut GamificationEngine<'_>) -> Result<T>,
    ) -> Result<T> {
        let retention = self.config.retention;
        self.run(now, |store, effects| {
            let mut gamification = GamificationEngine::new(store, effects).with_retention(retention);
            op(&mut gamification)
        })
    }

    // Chores

    pub fn claim_chore(&mut self, kid_id: &str, chore_id: &str, now: DateTime<Utc>) -> Result<()> {
        self.run_chores(now, |c| c.claim(kid_id, chore_id, now))
    }

    /// Approve a claim. Returns the points credited.
    pub fn approve_chore(
        &mut self,
        kid_id: &str,
        chore_id: &str,
        points: Option<f64>,
        now: DateTime<Utc>,
    ) -> Result<f64> {
        self.run_chores(now, |c| c.approve(kid_id, chore_id, points, now))
    }

    pub fn disapprove_chore(
        &mut self,
        kid_id: &str,
        chore_id: &str,
        now: DateTime<Utc>,
    ) -> Result<()> {
        self.run_chores(now, |c| c.disapprove(kid_id, chore_id, now))
    }

    pub fn set_due_date(
        &mut self,
        chore_id: &str,
        kid_id: Option<&str>,
        due_date: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<()> {
        self.run_chores(now, |c| c.set_due_date(chore_id, kid_id, due_date, now))
    }

    pub fn skip_due_date(
        &mut self,
        chore_id: &str,
        kid_id: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<()> {
        self.run_chores(now, |c| c.skip_due_date(chore_id, kid_id, now))
    }

    pub fn reset_overdue(
        &mut self,
        chore_id: &str,
        kid_id: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<()> {
        self.run_chores(now, |c| c.reset_overdue(chore_id, kid_id, now))
    }

    pub fn chore_status(&self, chore_id: &str) -> Result<ChoreStatus> {
        Ok(chore_status(self.store.chore(chore_id)?, &self.store.kids))
    }

    // Rewards, bonuses, penalties

    pub fn redeem_reward(&mut self, kid_id: &str, reward_id: &str, now: DateTime<Utc>) -> Result<()> {
        self.run(now, |s, e| rewards::redeem_reward(s, e, kid_id, reward_id, now))
    }

    /// Approve a redemption. Returns the new balance.
    pub fn approve_reward(&mut self, kid_id: &str, reward_id: &str, now: DateTime<Utc>) -> Result<f64> {
        self.run(now, |s, e| rewards::approve_reward(s, e, kid_id, reward_id, now))
    }

    pub fn disapprove_reward(
        &mut self,
        kid_id: &str,
        reward_id: &str,
        now: DateTime<Utc>,
    ) -> Result<()> {
        self.run(now, |s, e| rewards::disapprove_reward(s, e, kid_id, reward_id, now))
    }

    pub fn undo_reward_claim(&mut self, kid_id: &str, reward_id: &str, now: DateTime<Utc>) -> Result<()> {
        self.run(now, |s, _| rewards::undo_reward_claim(s, kid_id, reward_id))
    }

    pub fn apply_bonus(&mut self, kid_id: &str, bonus_id: &str, now: DateTime<Utc>) -> Result<f64> {
        self.run(now, |s, e| rewards::apply_bonus(s, e, kid_id, bonus_id, now))
    }

    pub fn apply_penalty(&mut self, kid_id: &str, penalty_id: &str, now: DateTime<Utc>) -> Result<f64> {
        self.run(now, |s, e| rewards::apply_penalty(s, e, kid_id, penalty_id, now))
    }

    pub fn reset_rewards(&mut self, kid_id: Option<&str>, reward_id: Option<&str>) -> Result<()> {
        self.run(Utc::now(), |s, _| rewards::reset_rewards(s, kid_id, reward_id))
    }

    pub fn reset_bonuses(&mut self, kid_id: Option<&str>, bonus_id: Option<&str>) -> Result<()> {
        self.run(Utc::now(), |s, _| rewards::reset_bonuses(s, kid_id, bonus_id))
    }

    pub fn reset_penalties(&mut self, kid_id: Option<&str>, penalty_id: Option<&str>) -> Result<()> {
        self.run(Utc::now(), |s, _| rewards::reset_penalties(s, kid_id, penalty_id))
    }

    // Badges

    /// Award a badge by hand. Returns the kids it was awarded to.
    pub fn award_badge(
        &mut self,
        kid_id: Option<&str>,
        badge_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<String>> {
        self.run_gamification(now, |g| g.award_badge(kid_id, badge_id, now))
    }

    pub fn remove_awarded_badge(
        &mut self,
        kid_id: Option<&str>,
        badge_id: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<usize> {
        self.run_gamification(now, |g| g.remove_awarded_badge(kid_id, badge_id, now))
    }

    // Entity management

    pub fn add_kid(&mut self, kid: Kid) -> Result<String> {
        self.run(Utc::now(), |s, _| Ok(s.add_kid(kid)))
    }

    pub fn add_parent(&mut self, parent: Parent) -> Result<String> {
        self.run(Utc::now(), |s, _| s.add_parent(parent))
    }

    pub fn add_chore(&mut self, chore: Chore) -> Result<String> {
        self.run(Utc::now(), |s, _| s.add_chore(chore))
    }

    pub fn assign_chore(&mut self, chore_id: &str, kid_id: &str) -> Result<()> {
        self.run(Utc::now(), |s, _| s.assign_chore(chore_id, kid_id))
    }

    pub fn add_badge(&mut self, badge: Badge) -> Result<String> {
        let now = Utc::now();
        self.run(now, |s, e| {
            let kids = badge.assigned_kids.clone();
            let id = s.add_badge(badge)?;
            kids.iter().for_each(|k| e.mark_dirty(k));
            Ok(id)
        })
    }

    pub fn add_achievement(&mut self, achievement: Achievement) -> Result<String> {
        self.run(Utc::now(), |s, _| s.add_achievement(achievement))
    }

    pub fn add_challenge(&mut self, challenge: Challenge) -> Result<String> {
        self.run(Utc::now(), |s, _| s.add_challenge(challenge))
    }

    pub fn add_reward(&mut self, reward: Reward) -> Result<String> {
        self.run(Utc::now(), |s, _| Ok(s.add_reward(reward)))
    }

    pub fn add_bonus(&mut self, bonus: Bonus) -> Result<String> {
        self.run(Utc::now(), |s, _| Ok(s.add_bonus(bonus)))
    }

    pub fn add_penalty(&mut self, penalty: Penalty) -> Result<String> {
        self.run(Utc::now(), |s, _| Ok(s.add_penalty(penalty)))
    }

    pub fn delete_kid(&mut self, kid_id: &str) -> Result<Kid> {
        let kid = self.store.delete_kid(kid_id)?;
        self.dirty.remove(kid_id);
        self.persist()?;
        info!(kid = kid_id, "kid deleted");
        Ok(kid)
    }

    pub fn delete_chore(&mut self, chore_id: &str) -> Result<Chore> {
        let chore = self.store.delete_chore(chore_id)?;
        self.persist()?;
        info!(chore = chore_id, "chore deleted");
        Ok(chore)
    }

    // Background work

    fn sweep_due(&self, now: DateTime<Utc>) -> bool {
        let interval = Duration::seconds(self.config.scheduler.sweep_interval_secs as i64);
        self.last_sweep.map_or(true, |last| now - last >= interval)
    }

    /// Earliest moment the next tick has work to do.
    pub fn next_due(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let interval = Duration::seconds(self.config.scheduler.sweep_interval_secs as i64);
        let sweep_at = self.last_sweep.map_or(now, |last| last + interval);
        match self.dirty.deadline() {
            Some(deadline) if !self.dirty.is_empty() => sweep_at.min(deadline),
            _ => sweep_at,
        }
    }

    /// Run whatever background work is due at `now`: periodic reset and
    /// overdue sweep on the sweep interval, stats pruning once per day, and
    /// the gamification batch once the debounce deadline has passed.
    pub fn tick(&mut self, now: DateTime<Utc>) -> Result<TickReport> {
        let mut report = TickReport::default();
        let mut effects = Effects::new();

        if self.sweep_due(now) {
            ChoreStateEngine::new(&mut self.store, &mut effects)
                .with_overdue_notify_interval(self.config.overdue_notify_interval())
                .periodic_reset(now);
            self.last_sweep = Some(now);
            report.swept = true;
        }

        let today = now.date_naive();
        if self.last_prune != Some(today) {
            report.pruned = self.store.prune_stats(now, &self.config.retention);
            self.last_prune = Some(today);
        }

        // Kids dirtied by this tick's sweep wait for the next debounce window.
        if let Some(batch) = self.dirty.take_ready(now) {
            report.evaluated = GamificationEngine::new(&mut self.store, &mut effects)
                .with_retention(self.config.retention)
                .evaluate_batch(&batch, now);
        }

        self.commit(effects, now)?;
        report.next_due = Some(self.next_due(now));
        debug!(?report, "tick finished");
        Ok(report)
    }

    /// Evaluate every dirty kid now, ignoring the debounce.
    pub fn evaluate_now(&mut self, now: DateTime<Utc>) -> Result<usize> {
        let batch = self.dirty.take_all();
        let mut effects = Effects::new();
        let evaluated = GamificationEngine::new(&mut self.store, &mut effects)
            .with_retention(self.config.retention)
            .evaluate_batch(&batch, now);
        self.commit(effects, now)?;
        Ok(evaluated)
    }

    /// Evaluate one kid now, whether dirty or not.
    pub fn evaluate_kid(&mut self, kid_id: &str, now: DateTime<Utc>) -> Result<()> {
        self.dirty.remove(kid_id);
        self.run_gamification(now, |g| g.evaluate_kid(kid_id, now))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 16, h, m, 0).unwrap()
    }

    fn engine_with_chore() -> (Engine, String, String) {
        let mut engine = Engine::in_memory(EngineConfig::default());
        let kid = engine.add_kid(Kid::new("Ava")).unwrap();
        let mut chore = Chore::new("Dishes", 10.0);
        chore.assigned_kids.push(kid.clone());
        let chore = engine.add_chore(chore).unwrap();
        (engine, kid, chore)
    }

    #[test]
    fn commands_publish_events_and_mark_dirty() {
        let (mut engine, kid, chore) = engine_with_chore();
        let mut rx = engine.subscribe();
        engine.claim_chore(&kid, &chore, at(9, 0)).unwrap();

        assert!(matches!(rx.try_recv().unwrap(), Event::ChoreClaimed { .. }));
        assert!(engine.dirty_queue().contains(&kid));
        assert_eq!(engine.dirty_queue().deadline(), Some(at(9, 0) + Duration::seconds(5)));
    }

    #[test]
    fn tick_waits_for_debounce_before_evaluating() {
        let (mut engine, kid, chore) = engine_with_chore();
        engine.claim_chore(&kid, &chore, at(9, 0)).unwrap();
        engine.approve_chore(&kid, &chore, None, at(9, 0)).unwrap();

        let early = engine.tick(at(9, 0)).unwrap();
        assert!(early.swept);
        assert_eq!(early.evaluated, 0);

        let later = engine.tick(at(9, 1)).unwrap();
        assert!(!later.swept);
        assert_eq!(later.evaluated, 1);
        assert!(engine.dirty_queue().is_empty());
    }

    #[test]
    fn failed_command_leaves_queue_untouched() {
        let (mut engine, kid, _) = engine_with_chore();
        assert!(engine.claim_chore(&kid, "missing", at(9, 0)).is_err());
        assert!(engine.dirty_queue().is_empty());
    }

    #[test]
    fn deleting_kid_drops_it_from_queue() {
        let (mut engine, kid, chore) = engine_with_chore();
        engine.claim_chore(&kid, &chore, at(9, 0)).unwrap();
        engine.delete_kid(&kid).unwrap();
        assert!(engine.dirty_queue().is_empty());
        assert!(engine.store().chore(&chore).unwrap().assigned_kids.is_empty());
    }
}
