use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use super::{achievements, awards, cumulative, periodic};
use crate::error::{CoreError, EntityKind, Result};
use crate::events::{Effects, Event};
use crate::model::Badge;
use crate::stats::{PointSource, Retention};
use crate::store::{lookup, lookup_mut, Store};

use cumulative::TierChange;

/// Evaluates badges, achievements and challenges for dirty kids.
///
/// Like [`ChoreStateEngine`](crate::chore::ChoreStateEngine) it borrows the
/// store for one pass and records what happened into `effects`.
pub struct GamificationEngine<'a> {
    store: &'a mut Store,
    effects: &'a mut Effects,
    retention: Retention,
}

impl<'a> GamificationEngine<'a> {
    pub fn new(store: &'a mut Store, effects: &'a mut Effects) -> Self {
        Self {
            store,
            effects,
            retention: Retention::default(),
        }
    }

    /// Daily retention bounds how far back unrolled badge days are read.
    pub fn with_retention(mut self, retention: Retention) -> Self {
        self.retention = retention;
        self
    }

    /// Evaluate every kid in `kid_ids`. A failing kid is logged and skipped.
    /// Returns how many kids were evaluated successfully.
    pub fn evaluate_batch<I, S>(&mut self, kid_ids: I, now: DateTime<Utc>) -> usize
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut evaluated = 0;
        for kid_id in kid_ids {
            let kid_id = kid_id.as_ref();
            match self.evaluate_kid(kid_id, now) {
                Ok(()) => evaluated += 1,
                Err(e) => warn!(kid = kid_id, "gamification evaluation skipped: {e}"),
            }
        }
        debug!(evaluated, "gamification batch finished");
        evaluated
    }

    pub fn evaluate_kid(&mut self, kid_id: &str, now: DateTime<Utc>) -> Result<()> {
        self.store.kid(kid_id)?;
        self.evaluate_periodic_badges(kid_id, now)?;
        self.evaluate_cumulative(kid_id, now)?;
        self.evaluate_unlocks(kid_id, now)
    }

    fn evaluate_periodic_badges(&mut self, kid_id: &str, now: DateTime<Utc>) -> Result<()> {
        let max_backfill_days = self.retention.daily_days;
        let mut outcomes = Vec::new();
        {
            let Store {
                kids,
                chores,
                badges,
                ..
            } = &mut *self.store;
            let kid = lookup_mut(kids, EntityKind::Kid, kid_id)?;
            for badge in badges.values() {
                if badge.is_cumulative() || !badge.is_assigned(kid_id) || !badge.is_in_effect(now)
                {
                    continue;
                }
                let progress = kid.badge_progress.entry(badge.id.clone()).or_default();
                let outcome = periodic::evaluate(
                    badge,
                    kid_id,
                    progress,
                    chores,
                    &kid.chore_progress,
                    now,
                    max_backfill_days,
                );
                if outcome.awarded || outcome.missed_cycle {
                    outcomes.push((badge.clone(), outcome));
                }
            }
        }

        for (badge, outcome) in outcomes {
            if outcome.missed_cycle {
                info!(kid = kid_id, badge = %badge.id, "badge cycle missed");
                awards::apply_penalties(self.store, self.effects, kid_id, &badge.award.penalties, now);
            }
            if outcome.awarded {
                self.grant_badge(kid_id, &badge, now)?;
            }
        }
        Ok(())
    }

    fn evaluate_cumulative(&mut self, kid_id: &str, now: DateTime<Utc>) -> Result<()> {
        let changes = {
            let Store { kids, badges, .. } = &mut *self.store;
            let kid = lookup_mut(kids, EntityKind::Kid, kid_id)?;
            let ladder = cumulative::ladder(badges.values(), kid_id);
            let changes = cumulative::evaluate(&mut kid.cumulative_progress, &ladder, now);
            kid.points_multiplier = cumulative::multiplier_for(
                &ladder,
                kid.cumulative_progress.current_badge.as_deref(),
            );
            changes
        };

        for change in changes {
            match change {
                TierChange::Promoted { badge_id } => {
                    info!(kid = kid_id, badge = %badge_id, "cumulative badge promoted");
                    let badge = self.store.badge(&badge_id)?.clone();
                    self.grant_badge(kid_id, &badge, now)?;
                }
                TierChange::Maintained { badge_id } => {
                    self.effects.emit(Event::BadgeMaintained {
                        kid_id: kid_id.to_string(),
                        badge_id,
                        at: now,
                    });
                }
                TierChange::GraceStarted {
                    badge_id,
                    grace_end,
                } => {
                    info!(kid = kid_id, badge = %badge_id, %grace_end, "badge grace period started");
                    self.effects.emit(Event::BadgeGraceStarted {
                        kid_id: kid_id.to_string(),
                        badge_id,
                        grace_end,
                        at: now,
                    });
                }
                TierChange::Demoted { from, to } => {
                    info!(kid = kid_id, from = %from, to = ?to, "cumulative badge demoted");
                    self.effects.emit(Event::BadgeDemoted {
                        kid_id: kid_id.to_string(),
                        from_badge: from,
                        to_badge: to,
                        at: now,
                    });
                }
            }
        }
        Ok(())
    }

    fn evaluate_unlocks(&mut self, kid_id: &str, now: DateTime<Utc>) -> Result<()> {
        let (unlocked, completed) = {
            let Store {
                kids,
                achievements,
                challenges,
                ..
            } = &mut *self.store;
            let kid = lookup(kids, EntityKind::Kid, kid_id)?;
            (
                achievements::evaluate_achievements(achievements, kid, now),
                achievements::evaluate_challenges(challenges, kid_id, now),
            )
        };

        for achievement_id in unlocked {
            let award = lookup(&self.store.achievements, EntityKind::Achievement, &achievement_id)?
                .award
                .clone();
            info!(kid = kid_id, achievement = %achievement_id, "achievement unlocked");
            self.effects.emit(Event::AchievementUnlocked {
                kid_id: kid_id.to_string(),
                achievement_id,
                at: now,
            });
            awards::apply_manifest(
                self.store,
                self.effects,
                kid_id,
                &award,
                PointSource::Achievements,
                now,
            )?;
        }
        for challenge_id in completed {
            let award = lookup(&self.store.challenges, EntityKind::Challenge, &challenge_id)?
                .award
                .clone();
            info!(kid = kid_id, challenge = %challenge_id, "challenge completed");
            self.effects.emit(Event::ChallengeCompleted {
                kid_id: kid_id.to_string(),
                challenge_id,
                at: now,
            });
            awards::apply_manifest(
                self.store,
                self.effects,
                kid_id,
                &award,
                PointSource::Challenges,
                now,
            )?;
        }
        Ok(())
    }

    fn grant_badge(&mut self, kid_id: &str, badge: &Badge, now: DateTime<Utc>) -> Result<()> {
        self.store.kid_mut(kid_id)?.record_badge_earned(&badge.id, now);
        if let Some(stored) = self.store.badges.get_mut(&badge.id) {
            stored.mark_earned_by(kid_id);
        }
        self.effects.emit(Event::BadgeEarned {
            kid_id: kid_id.to_string(),
            badge_id: badge.id.clone(),
            at: now,
        });
        awards::apply_manifest(
            self.store,
            self.effects,
            kid_id,
            &badge.award,
            PointSource::Badges,
            now,
        )
    }

    /// Award a badge by hand to one assigned kid, or to every assigned kid.
    pub fn award_badge(
        &mut self,
        kid_id: Option<&str>,
        badge_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<String>> {
        let badge = self.store.badge(badge_id)?.clone();
        let targets = match kid_id {
            Some(kid_id) => {
                self.store.kid(kid_id)?;
                if !badge.is_assigned(kid_id) {
                    return Err(CoreError::not_assigned(kid_id, EntityKind::Badge, badge_id));
                }
                vec![kid_id.to_string()]
            }
            None => badge.assigned_kids.clone(),
        };

        for kid_id in &targets {
            if badge.is_cumulative() {
                let Store { kids, badges, .. } = &mut *self.store;
                let kid = lookup_mut(kids, EntityKind::Kid, kid_id)?;
                let ladder = cumulative::ladder(badges.values(), kid_id);
                cumulative::set_tier(&mut kid.cumulative_progress, &ladder, badge_id, now);
                kid.points_multiplier = cumulative::multiplier_for(
                    &ladder,
                    kid.cumulative_progress.current_badge.as_deref(),
                );
            }
            info!(kid = %kid_id, badge = badge_id, "badge awarded manually");
            self.grant_badge(kid_id, &badge, now)?;
        }
        Ok(targets)
    }

    /// Take back awarded badges. `None` widens the scope to every kid or
    /// every badge. Returns how many awards were removed.
    pub fn remove_awarded_badge(
        &mut self,
        kid_id: Option<&str>,
        badge_id: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<usize> {
        if let Some(kid_id) = kid_id {
            self.store.kid(kid_id)?;
        }
        if let Some(badge_id) = badge_id {
            self.store.badge(badge_id)?;
        }

        let Store { kids, badges, .. } = &mut *self.store;
        let mut removed = 0;
        for kid in kids.values_mut() {
            if kid_id.is_some_and(|id| id != kid.id) {
                continue;
            }
            let earned: Vec<String> = kid
                .badges_earned
                .keys()
                .filter(|id| badge_id.map_or(true, |b| b == id.as_str()))
                .cloned()
                .collect();
            for id in earned {
                kid.badges_earned.remove(&id);
                kid.badge_progress.remove(&id);
                if let Some(badge) = badges.get_mut(&id) {
                    badge.earned_by.retain(|k| k != &kid.id);
                    if badge.is_cumulative() {
                        let ladder = cumulative::ladder(badges.values(), &kid.id);
                        let earned = &kid.badges_earned;
                        cumulative::revoke_tier(&mut kid.cumulative_progress, &ladder, &id, |t| {
                            earned.contains_key(t)
                        });
                        kid.points_multiplier = cumulative::multiplier_for(
                            &ladder,
                            kid.cumulative_progress.current_badge.as_deref(),
                        );
                    }
                }
                self.effects.emit(Event::BadgeRemoved {
                    kid_id: kid.id.clone(),
                    badge_id: id,
                    at: now,
                });
                self.effects.mark_dirty(&kid.id);
                removed += 1;
            }
        }
        Ok(removed)
    }
}
