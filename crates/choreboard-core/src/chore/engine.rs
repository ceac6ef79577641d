//! Chore state machine: claims, approvals, overdue detection and resets.

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, warn};

use crate::error::{CoreError, EntityKind, InvalidStateReason, Result};
use crate::events::{Effects, Event};
use crate::gamification::achievements;
use crate::model::{
    ApprovalResetType, Chore, ChoreProgress, ChoreState, CompletionCriteria, Kid,
    OverdueHandling, PendingClaimAction,
};
use crate::schedule::{self, next_midnight, next_period_boundary};
use crate::stats::PointSource;
use crate::store::{lookup_mut, seed_progress, Store};

/// Default minimum gap between two overdue reminders for the same kid and chore.
pub const DEFAULT_OVERDUE_NOTIFY_INTERVAL_HOURS: i64 = 24;

/// Drives per-kid chore state inside one command or sweep.
///
/// Borrows the store for the duration of the operation and collects what
/// happened into `effects`; the caller persists and publishes.
pub struct ChoreStateEngine<'a> {
    store: &'a mut Store,
    effects: &'a mut Effects,
    overdue_notify_interval: Duration,
}

impl<'a> ChoreStateEngine<'a> {
    pub fn new(store: &'a mut Store, effects: &'a mut Effects) -> Self {
        Self {
            store,
            effects,
            overdue_notify_interval: Duration::hours(DEFAULT_OVERDUE_NOTIFY_INTERVAL_HOURS),
        }
    }

    pub fn with_overdue_notify_interval(mut self, interval: Duration) -> Self {
        self.overdue_notify_interval = interval;
        self
    }

    /// Resolve both ids and check the assignment. Returns a copy of the chore
    /// definition so the store stays free for mutation.
    fn assigned_chore(&self, kid_id: &str, chore_id: &str) -> Result<Chore> {
        self.store.kid(kid_id)?;
        let chore = self.store.chore(chore_id)?;
        if !chore.is_assigned(kid_id) {
            return Err(CoreError::not_assigned(kid_id, EntityKind::Chore, chore_id));
        }
        Ok(chore.clone())
    }

    fn progress_mut(&mut self, kid_id: &str, chore: &Chore) -> Result<&mut ChoreProgress> {
        let kid = lookup_mut(&mut self.store.kids, EntityKind::Kid, kid_id)?;
        Ok(seed_progress(kid, chore))
    }

    fn chore_period_start(&self, chore_id: &str) -> Option<DateTime<Utc>> {
        self.store
            .chores
            .get(chore_id)
            .and_then(|c| c.approval_period_start)
    }

    /// Claim a chore for a kid.
    pub fn claim(&mut self, kid_id: &str, chore_id: &str, now: DateTime<Utc>) -> Result<()> {
        let chore = self.assigned_chore(kid_id, chore_id)?;
        let multi = chore.approval_reset.allows_multiple_claims();
        let shared_start = self.chore_period_start(chore_id);

        let progress = self.progress_mut(kid_id, &chore)?;
        let period_start = match chore.completion_criteria {
            CompletionCriteria::Independent => progress.approval_period_start,
            _ => shared_start,
        };
        if progress.state == ChoreState::CompletedByOther {
            return Err(CoreError::invalid_state(
                kid_id,
                chore_id,
                InvalidStateReason::ClaimedByOther,
            ));
        }
        if !multi && progress.has_pending_claim() {
            return Err(CoreError::invalid_state(
                kid_id,
                chore_id,
                InvalidStateReason::PendingClaim,
            ));
        }
        if !multi && progress.is_approved_in_period(period_start) {
            return Err(CoreError::invalid_state(
                kid_id,
                chore_id,
                InvalidStateReason::AlreadyApproved,
            ));
        }
        if chore.completion_criteria == CompletionCriteria::SharedFirst
            && self.sibling_has_claimed(&chore, kid_id)
        {
            return Err(CoreError::invalid_state(
                kid_id,
                chore_id,
                InvalidStateReason::ClaimedByOther,
            ));
        }

        let progress = self.progress_mut(kid_id, &chore)?;
        progress.pending_claim_count += 1;
        progress.state = ChoreState::Claimed;
        progress.last_claimed = Some(now);
        progress.stats.record(now, |c| c.claimed += 1);

        if let Some(kid) = self.store.kids.get_mut(kid_id) {
            kid.overdue_notified.remove(chore_id);
        }

        if chore.completion_criteria == CompletionCriteria::SharedFirst {
            self.complete_for_siblings(&chore, kid_id);
        }

        info!(kid = kid_id, chore = %chore.name, "chore claimed");
        self.effects.emit(Event::ChoreClaimed {
            kid_id: kid_id.to_string(),
            chore_id: chore_id.to_string(),
            at: now,
        });
        self.effects.mark_dirty(kid_id);

        if chore.auto_approve {
            self.approve(kid_id, chore_id, None, now)?;
        }
        Ok(())
    }

    /// Shared-first: every other assigned kid becomes `CompletedByOther`.
    fn complete_for_siblings(&mut self, chore: &Chore, kid_id: &str) {
        for other in chore.assigned_kids.iter().filter(|k| *k != kid_id) {
            let Some(kid) = self.store.kids.get_mut(other) else {
                continue;
            };
            let sibling = seed_progress(kid, chore);
            if sibling.state == ChoreState::CompletedByOther {
                continue;
            }
            sibling.state = ChoreState::CompletedByOther;
            sibling.completed_by = Some(kid_id.to_string());
            self.effects.mark_dirty(other);
        }
    }

    fn sibling_has_claimed(&self, chore: &Chore, kid_id: &str) -> bool {
        chore
            .assigned_kids
            .iter()
            .filter(|k| *k != kid_id)
            .filter_map(|k| self.store.kids.get(k))
            .filter_map(|kid| kid.progress(&chore.id))
            .any(|p| {
                p.state == ChoreState::Claimed
                    || (p.state == ChoreState::Approved
                        && p.is_approved_in_period(chore.approval_period_start))
            })
    }

    /// Approve a kid's chore, crediting `points` (or the chore default)
    /// times the kid's multiplier. Returns the points credited.
    pub fn approve(
        &mut self,
        kid_id: &str,
        chore_id: &str,
        points: Option<f64>,
        now: DateTime<Utc>,
    ) -> Result<f64> {
        let chore = self.assigned_chore(kid_id, chore_id)?;
        let multi = chore.approval_reset.allows_multiple_claims();
        let shared_start = self.chore_period_start(chore_id);
        if chore.completion_criteria == CompletionCriteria::SharedFirst
            && self.sibling_has_claimed(&chore, kid_id)
        {
            return Err(CoreError::invalid_state(
                kid_id,
                chore_id,
                InvalidStateReason::CompletedByOther,
            ));
        }

        let kid = lookup_mut(&mut self.store.kids, EntityKind::Kid, kid_id)?;
        let multiplier = kid.points_multiplier;
        let progress = seed_progress(kid, &chore);
        let period_start = match chore.completion_criteria {
            CompletionCriteria::Independent => progress.approval_period_start,
            _ => shared_start,
        };
        if progress.state == ChoreState::CompletedByOther {
            return Err(CoreError::invalid_state(
                kid_id,
                chore_id,
                InvalidStateReason::CompletedByOther,
            ));
        }
        if !multi && progress.is_approved_in_period(period_start) {
            return Err(CoreError::invalid_state(
                kid_id,
                chore_id,
                InvalidStateReason::AlreadyApproved,
            ));
        }

        let awarded = points.unwrap_or(chore.default_points) * multiplier;
        progress.pending_claim_count = progress.pending_claim_count.saturating_sub(1);
        // Stacked claims keep the slot waiting on the parent.
        progress.state = if progress.has_pending_claim() {
            ChoreState::Claimed
        } else {
            ChoreState::Approved
        };
        progress.last_approved = Some(now);
        progress.record_approval(now, awarded, &chore.recurrence);

        let mut due_change = None;
        if chore.completion_criteria == CompletionCriteria::Independent && chore.is_recurring() {
            match progress.due_date {
                Some(due) => {
                    progress.period_end = Some(period_end_for(&chore, due));
                    let next = schedule::next_due(
                        due,
                        &chore.recurrence,
                        &chore.applicable_days,
                        due.max(now),
                    );
                    if next.is_some() {
                        progress.due_date = next;
                        due_change = next;
                    }
                }
                None => {
                    progress.period_end = next_period_boundary(&chore.recurrence, now);
                }
            }
        }

        kid.overdue_notified.remove(chore_id);
        let balance = kid.apply_points(awarded, PointSource::Chores, now);

        info!(kid = kid_id, chore = %chore.name, points = awarded, "chore approved");
        self.effects.emit(Event::ChoreApproved {
            kid_id: kid_id.to_string(),
            chore_id: chore_id.to_string(),
            points: awarded,
            at: now,
        });
        self.effects.emit(Event::PointsChanged {
            kid_id: kid_id.to_string(),
            delta: awarded,
            balance,
            source: PointSource::Chores,
            at: now,
        });
        if let Some(due) = due_change {
            self.effects.emit(Event::DueDateChanged {
                chore_id: chore_id.to_string(),
                kid_id: Some(kid_id.to_string()),
                due_date: Some(due),
                at: now,
            });
        }
        self.effects.mark_dirty(kid_id);
        if chore.completion_criteria == CompletionCriteria::SharedFirst {
            self.complete_for_siblings(&chore, kid_id);
        }

        if let Some(kid) = self.store.kids.get(kid_id) {
            achievements::record_chore_approval(
                &mut self.store.achievements,
                &mut self.store.challenges,
                kid,
                chore_id,
                now,
            );
        }

        if chore.approval_reset == ApprovalResetType::UponCompletion {
            self.reset_upon_completion(&chore, kid_id, now);
        }
        Ok(awarded)
    }

    fn reset_upon_completion(&mut self, chore: &Chore, kid_id: &str, now: DateTime<Utc>) {
        match chore.completion_criteria {
            CompletionCriteria::Independent => {
                self.reset_independent_slot(chore, kid_id, now);
            }
            CompletionCriteria::Shared => {
                let start = self.chore_period_start(&chore.id);
                let all_done = chore.assigned_kids.iter().all(|k| {
                    self.store
                        .kids
                        .get(k)
                        .and_then(|kid| kid.progress(&chore.id))
                        .is_some_and(|p| {
                            p.state == ChoreState::Approved && p.is_approved_in_period(start)
                        })
                });
                if all_done {
                    self.reset_shared_unit(chore, now);
                }
            }
            CompletionCriteria::SharedFirst => self.reset_shared_unit(chore, now),
        }
    }

    /// Refuse a pending claim. Under shared-first every assigned kid returns
    /// to pending.
    pub fn disapprove(&mut self, kid_id: &str, chore_id: &str, now: DateTime<Utc>) -> Result<()> {
        let chore = self.assigned_chore(kid_id, chore_id)?;

        let progress = self.progress_mut(kid_id, &chore)?;
        if progress.state == ChoreState::CompletedByOther {
            return Err(CoreError::invalid_state(
                kid_id,
                chore_id,
                InvalidStateReason::CompletedByOther,
            ));
        }
        if !progress.has_pending_claim() {
            return Err(CoreError::invalid_state(
                kid_id,
                chore_id,
                InvalidStateReason::NoPendingClaim,
            ));
        }
        progress.pending_claim_count -= 1;
        progress.state = if progress.has_pending_claim() {
            ChoreState::Claimed
        } else {
            ChoreState::Pending
        };
        progress.last_disapproved = Some(now);
        progress.completed_by = None;
        progress.stats.record(now, |c| c.disapproved += 1);
        if chore.completion_criteria == CompletionCriteria::Independent
            && progress.state == ChoreState::Pending
        {
            progress.approval_period_start = Some(now);
        }

        if chore.completion_criteria == CompletionCriteria::SharedFirst {
            for other in chore.assigned_kids.iter().filter(|k| *k != kid_id) {
                let Some(kid) = self.store.kids.get_mut(other) else {
                    continue;
                };
                let sibling = seed_progress(kid, &chore);
                sibling.state = ChoreState::Pending;
                sibling.completed_by = None;
                self.effects.mark_dirty(other);
            }
            if let Some(stored) = self.store.chores.get_mut(chore_id) {
                stored.approval_period_start = Some(now);
            }
        }

        info!(kid = kid_id, chore = %chore.name, "chore disapproved");
        self.effects.emit(Event::ChoreDisapproved {
            kid_id: kid_id.to_string(),
            chore_id: chore_id.to_string(),
            at: now,
        });
        self.effects.mark_dirty(kid_id);
        Ok(())
    }

    /// Mark every slot whose due date has passed as overdue and send
    /// throttled reminders.
    pub fn sweep_overdue(&mut self, now: DateTime<Utc>) {
        let chore_ids: Vec<String> = self.store.chores.keys().cloned().collect();
        for chore_id in chore_ids {
            let Some(chore) = self.store.chores.get(&chore_id).cloned() else {
                continue;
            };
            if chore.overdue_handling == OverdueHandling::Never {
                continue;
            }
            for kid_id in &chore.assigned_kids {
                let Some(kid) = self.store.kids.get_mut(kid_id) else {
                    warn!(chore = %chore.id, kid = %kid_id, "overdue sweep: assigned kid missing, skipping");
                    continue;
                };
                sweep_slot(&chore, kid, now, self.overdue_notify_interval, self.effects);
            }
        }
    }

    /// Return slots whose approval period has ended to pending, then re-run
    /// the overdue sweep.
    pub fn periodic_reset(&mut self, now: DateTime<Utc>) {
        let chore_ids: Vec<String> = self.store.chores.keys().cloned().collect();
        for chore_id in chore_ids {
            let Some(chore) = self.store.chores.get(&chore_id).cloned() else {
                continue;
            };
            if !chore.is_recurring() {
                continue;
            }
            match chore.completion_criteria {
                CompletionCriteria::Independent => {
                    for kid_id in &chore.assigned_kids {
                        self.reset_independent_if_due(&chore, kid_id, now);
                    }
                }
                CompletionCriteria::Shared | CompletionCriteria::SharedFirst => {
                    self.reset_shared_if_due(&chore, now);
                }
            }
        }
        self.sweep_overdue(now);
    }

    fn reset_independent_if_due(&mut self, chore: &Chore, kid_id: &str, now: DateTime<Utc>) {
        let Some(kid) = self.store.kids.get_mut(kid_id) else {
            warn!(chore = %chore.id, kid = %kid_id, "periodic reset: assigned kid missing, skipping");
            return;
        };
        let progress = seed_progress(kid, chore);
        let due = progress.due_date;
        if !boundary_reached(chore, progress, due, progress.last_activity(), now) {
            return;
        }
        if progress.has_pending_claim() && !self.settle_pending_claim(chore, kid_id, now) {
            return;
        }
        self.reset_independent_slot(chore, kid_id, now);
    }

    fn reset_shared_if_due(&mut self, chore: &Chore, now: DateTime<Utc>) {
        let slots: Vec<(String, ChoreProgress)> = chore
            .assigned_kids
            .iter()
            .filter_map(|k| {
                let progress = self.store.kids.get(k)?.progress(&chore.id)?;
                Some((k.clone(), progress.clone()))
            })
            .collect();
        let last_activity = slots.iter().filter_map(|(_, p)| p.last_activity()).max();
        let reached = slots.iter().any(|(_, p)| {
            boundary_reached(chore, p, chore.due_date, last_activity, now)
        });
        if !reached {
            return;
        }

        let held = slots.iter().any(|(_, p)| p.has_pending_claim())
            && chore.pending_claim_action == PendingClaimAction::Hold;
        if held {
            debug!(chore = %chore.name, "periodic reset held by a pending claim");
            return;
        }
        for (kid_id, progress) in &slots {
            if progress.has_pending_claim() {
                self.settle_pending_claim(chore, kid_id, now);
            }
        }
        self.reset_shared_unit(chore, now);
    }

    /// Apply the chore's pending-claim action. Returns false when the reset
    /// must be skipped.
    fn settle_pending_claim(&mut self, chore: &Chore, kid_id: &str, now: DateTime<Utc>) -> bool {
        match chore.pending_claim_action {
            PendingClaimAction::Hold => false,
            PendingClaimAction::Clear => {
                self.clear_pending_claims(chore, kid_id);
                true
            }
            PendingClaimAction::AutoApprove => {
                let pending = self
                    .store
                    .kids
                    .get(kid_id)
                    .and_then(|k| k.progress(&chore.id))
                    .map_or(0, |p| p.pending_claim_count);
                for _ in 0..pending {
                    if let Err(err) = self.approve(kid_id, &chore.id, None, now) {
                        warn!(chore = %chore.id, kid = %kid_id, error = %err, "auto-approve on reset failed, clearing claim");
                        self.clear_pending_claims(chore, kid_id);
                        break;
                    }
                }
                true
            }
        }
    }

    fn clear_pending_claims(&mut self, chore: &Chore, kid_id: &str) {
        if let Some(progress) = self
            .store
            .kids
            .get_mut(kid_id)
            .and_then(|k| k.chore_progress.get_mut(&chore.id))
        {
            progress.pending_claim_count = 0;
        }
    }

    fn reset_independent_slot(&mut self, chore: &Chore, kid_id: &str, now: DateTime<Utc>) {
        let Some(kid) = self.store.kids.get_mut(kid_id) else {
            return;
        };
        let progress = seed_progress(kid, chore);
        let previous = progress.state;
        reset_progress(progress);
        progress.approval_period_start = Some(now);

        let advanced = match progress.due_date {
            Some(due) if due <= now => {
                schedule::next_due(due, &chore.recurrence, &chore.applicable_days, now)
            }
            _ => None,
        };
        if advanced.is_some() {
            progress.due_date = advanced;
        }

        self.after_reset(chore, kid_id, previous, now);
        if let Some(due) = advanced {
            self.effects.emit(Event::DueDateChanged {
                chore_id: chore.id.clone(),
                kid_id: Some(kid_id.to_string()),
                due_date: Some(due),
                at: now,
            });
        }
    }

    /// Reset every assigned kid of a shared chore together.
    fn reset_shared_unit(&mut self, chore: &Chore, now: DateTime<Utc>) {
        let then_reset = chore.overdue_handling == OverdueHandling::AtDueDateThenReset;
        for kid_id in &chore.assigned_kids {
            let Some(kid) = self.store.kids.get_mut(kid_id) else {
                continue;
            };
            let progress = seed_progress(kid, chore);
            let previous = progress.state;
            let resets = match previous {
                ChoreState::Pending => false,
                ChoreState::Overdue => {
                    then_reset
                        && progress
                            .last_overdue
                            .is_some_and(|at| now >= next_midnight(at))
                }
                ChoreState::Claimed | ChoreState::Approved | ChoreState::CompletedByOther => true,
            };
            if resets {
                reset_progress(progress);
                self.after_reset(chore, kid_id, previous, now);
            }
        }

        let mut advanced = None;
        if let Some(stored) = self.store.chores.get_mut(&chore.id) {
            stored.approval_period_start = Some(now);
            if let Some(due) = stored.due_date.filter(|due| *due <= now) {
                advanced =
                    schedule::next_due(due, &stored.recurrence, &stored.applicable_days, now);
                if advanced.is_some() {
                    stored.due_date = advanced;
                }
            }
        }
        if let Some(due) = advanced {
            self.effects.emit(Event::DueDateChanged {
                chore_id: chore.id.clone(),
                kid_id: None,
                due_date: Some(due),
                at: now,
            });
        }
    }

    fn after_reset(&mut self, chore: &Chore, kid_id: &str, previous: ChoreState, now: DateTime<Utc>) {
        if let Some(kid) = self.store.kids.get_mut(kid_id) {
            kid.overdue_notified.remove(&chore.id);
        }
        debug!(kid = kid_id, chore = %chore.name, from = %previous, "chore reset");
        self.effects.emit(Event::ChoreReset {
            kid_id: kid_id.to_string(),
            chore_id: chore.id.clone(),
            previous,
            at: now,
        });
        self.effects.mark_dirty(kid_id);
    }

    /// Set (or clear) a due date.
    ///
    /// Independent chores with a kid change that kid only; without a kid the
    /// template and every kid change. Shared chores have one due date.
    pub fn set_due_date(
        &mut self,
        chore_id: &str,
        kid_id: Option<&str>,
        due_date: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let chore = self.store.chore(chore_id)?.clone();
        if let Some(kid_id) = kid_id {
            self.assigned_chore(kid_id, chore_id)?;
        }
        schedule::validate(&chore.recurrence, due_date.is_some(), &chore.id)?;

        let targets = self.target_kids(&chore, kid_id);
        match chore.completion_criteria {
            CompletionCriteria::Independent => {
                if kid_id.is_none() {
                    self.store.chore_mut(chore_id)?.due_date = due_date;
                }
                for target in &targets {
                    let progress = self.progress_mut(target, &chore)?;
                    progress.due_date = due_date;
                    progress.period_end = None;
                    if progress.state == ChoreState::Overdue {
                        progress.state = ChoreState::Pending;
                        progress.approval_period_start = Some(now);
                    }
                }
            }
            CompletionCriteria::Shared | CompletionCriteria::SharedFirst => {
                self.store.chore_mut(chore_id)?.due_date = due_date;
                for target in &chore.assigned_kids {
                    let progress = self.progress_mut(target, &chore)?;
                    if progress.state == ChoreState::Overdue {
                        progress.state = ChoreState::Pending;
                    }
                }
            }
        }
        for target in &chore.assigned_kids {
            if let Some(kid) = self.store.kids.get_mut(target) {
                kid.overdue_notified.remove(chore_id);
            }
            self.effects.mark_dirty(target);
        }

        info!(chore = %chore.name, kid = ?kid_id, due = ?due_date, "due date set");
        self.effects.emit(Event::DueDateChanged {
            chore_id: chore_id.to_string(),
            kid_id: kid_id.map(str::to_string),
            due_date,
            at: now,
        });
        Ok(())
    }

    /// Advance a recurring chore's due date to the next occurrence after
    /// both the current due date and `now`.
    pub fn skip_due_date(
        &mut self,
        chore_id: &str,
        kid_id: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let chore = self.store.chore(chore_id)?.clone();
        if let Some(kid_id) = kid_id {
            self.assigned_chore(kid_id, chore_id)?;
        }
        if !chore.is_recurring() {
            return Err(CoreError::InvalidFrequency {
                chore: chore.id.clone(),
                message: "only recurring chores can skip a due date".to_string(),
            });
        }
        let missing_due = || CoreError::MissingField {
            entity: format!("chore {}", chore.id),
            field: "due_date",
        };
        let step = |due: DateTime<Utc>| {
            schedule::next_due(due, &chore.recurrence, &chore.applicable_days, due.max(now))
                .ok_or_else(|| CoreError::InvalidFrequency {
                    chore: chore.id.clone(),
                    message: "recurrence produced no next occurrence".to_string(),
                })
        };

        match chore.completion_criteria {
            CompletionCriteria::Independent => {
                let targets = self.target_kids(&chore, kid_id);
                let mut updates = Vec::with_capacity(targets.len());
                for target in &targets {
                    let progress = self.progress_mut(target, &chore)?;
                    let due = progress.due_date.ok_or_else(missing_due)?;
                    updates.push((target.clone(), step(due)?));
                }
                for (target, next) in updates {
                    let progress = self.progress_mut(&target, &chore)?;
                    progress.due_date = Some(next);
                    if progress.state == ChoreState::Overdue {
                        progress.state = ChoreState::Pending;
                        progress.approval_period_start = Some(now);
                    }
                    self.effects.emit(Event::DueDateChanged {
                        chore_id: chore_id.to_string(),
                        kid_id: Some(target.clone()),
                        due_date: Some(next),
                        at: now,
                    });
                    self.effects.mark_dirty(&target);
                }
            }
            CompletionCriteria::Shared | CompletionCriteria::SharedFirst => {
                let due = chore.due_date.ok_or_else(missing_due)?;
                let next = step(due)?;
                self.store.chore_mut(chore_id)?.due_date = Some(next);
                for target in &chore.assigned_kids {
                    let progress = self.progress_mut(target, &chore)?;
                    if progress.state == ChoreState::Overdue {
                        progress.state = ChoreState::Pending;
                    }
                    self.effects.mark_dirty(target);
                }
                self.effects.emit(Event::DueDateChanged {
                    chore_id: chore_id.to_string(),
                    kid_id: None,
                    due_date: Some(next),
                    at: now,
                });
            }
        }
        info!(chore = %chore.name, kid = ?kid_id, "due date skipped");
        Ok(())
    }

    /// Return overdue slots to pending, advancing past-due recurring due dates.
    pub fn reset_overdue(
        &mut self,
        chore_id: &str,
        kid_id: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let chore = self.store.chore(chore_id)?.clone();
        if let Some(kid_id) = kid_id {
            self.assigned_chore(kid_id, chore_id)?;
        }

        for target in self.target_kids(&chore, kid_id) {
            let progress = self.progress_mut(&target, &chore)?;
            if progress.state != ChoreState::Overdue {
                continue;
            }
            progress.state = ChoreState::Pending;
            if chore.completion_criteria == CompletionCriteria::Independent {
                progress.approval_period_start = Some(now);
                if chore.is_recurring() {
                    if let Some(due) = progress.due_date.filter(|d| *d <= now) {
                        progress.due_date = schedule::next_due(
                            due,
                            &chore.recurrence,
                            &chore.applicable_days,
                            now,
                        )
                        .or(Some(due));
                    }
                }
            }
            self.after_reset(&chore, &target, ChoreState::Overdue, now);
        }

        if chore.completion_criteria != CompletionCriteria::Independent && chore.is_recurring() {
            let stored = self.store.chore_mut(chore_id)?;
            if let Some(due) = stored.due_date.filter(|d| *d <= now) {
                stored.due_date =
                    schedule::next_due(due, &stored.recurrence, &stored.applicable_days, now)
                        .or(Some(due));
            }
        }
        Ok(())
    }

    fn target_kids(&self, chore: &Chore, kid_id: Option<&str>) -> Vec<String> {
        match kid_id {
            Some(kid_id) => vec![kid_id.to_string()],
            None => chore.assigned_kids.clone(),
        }
    }
}

fn sweep_slot(
    chore: &Chore,
    kid: &mut Kid,
    now: DateTime<Utc>,
    interval: Duration,
    effects: &mut Effects,
) {
    let progress = seed_progress(kid, chore);
    if matches!(
        progress.state,
        ChoreState::Claimed | ChoreState::CompletedByOther
    ) || progress.has_pending_claim()
        || progress.is_approved_in_period(chore.period_start_for(progress))
    {
        return;
    }
    let Some(due) = chore.due_date_for(Some(progress)) else {
        return;
    };
    if due >= now {
        return;
    }

    if progress.state != ChoreState::Overdue {
        progress.state = ChoreState::Overdue;
        progress.last_overdue = Some(now);
        progress.stats.record(now, |c| c.overdue += 1);
        info!(kid = %kid.id, chore = %chore.name, "chore overdue");
        effects.mark_dirty(&kid.id);
    }

    let due_for_reminder = match kid.overdue_notified.get(&chore.id) {
        Some(last) => now - *last >= interval,
        None => true,
    };
    if due_for_reminder {
        kid.overdue_notified.insert(chore.id.clone(), now);
        effects.emit(Event::ChoreOverdue {
            kid_id: kid.id.clone(),
            chore_id: chore.id.clone(),
            due_date: due,
            at: now,
        });
    }
}

/// Clear claim bookkeeping and return the slot to pending.
fn reset_progress(progress: &mut ChoreProgress) {
    progress.state = ChoreState::Pending;
    progress.pending_claim_count = 0;
    progress.completed_by = None;
    progress.period_end = None;
}

/// End of the approval period an approval against `due` belongs to.
fn period_end_for(chore: &Chore, due: DateTime<Utc>) -> DateTime<Utc> {
    if chore.approval_reset.resets_at_due_date() {
        due
    } else {
        next_midnight(due)
    }
}

/// Whether a slot's approval period has ended at `now`.
fn boundary_reached(
    chore: &Chore,
    progress: &ChoreProgress,
    due: Option<DateTime<Utc>>,
    last_activity: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> bool {
    match progress.state {
        ChoreState::Pending => false,
        ChoreState::Overdue => {
            chore.overdue_handling == OverdueHandling::AtDueDateThenReset
                && progress
                    .last_overdue
                    .is_some_and(|at| now >= next_midnight(at))
        }
        ChoreState::Claimed | ChoreState::Approved | ChoreState::CompletedByOther => {
            let boundary = match (progress.period_end, due) {
                (Some(end), _) => Some(end),
                (None, Some(due)) => Some(period_end_for(chore, due)),
                (None, None) => {
                    last_activity.and_then(|at| next_period_boundary(&chore.recurrence, at))
                }
            };
            boundary.is_some_and(|b| now >= b)
        }
    }
}
