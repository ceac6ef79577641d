//! Owned in-memory document holding every entity, keyed by stable id.
//!
//! The store is what gets persisted; see [`crate::storage::Database`].
//! Back-references (assigned kids, earned-by lists, parent associations) are
//! plain id lists, so deleting a kid or chore walks every collection.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{CoreError, EntityKind, Result};
use crate::model::{
    Achievement, AchievementKind, Badge, Bonus, Challenge, Chore, ChoreProgress, ChoreState,
    CompletionCriteria, Kid, Parent, Penalty, Reward,
};
use crate::schedule;

/// Document schema version written by this build.
pub const SCHEMA_VERSION: u32 = 3;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Meta {
    pub schema_version: u32,
}

impl Default for Meta {
    fn default() -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Store {
    #[serde(default)]
    pub meta: Meta,
    #[serde(default)]
    pub kids: BTreeMap<String, Kid>,
    #[serde(default)]
    pub chores: BTreeMap<String, Chore>,
    #[serde(default)]
    pub badges: BTreeMap<String, Badge>,
    #[serde(default)]
    pub achievements: BTreeMap<String, Achievement>,
    #[serde(default)]
    pub challenges: BTreeMap<String, Challenge>,
    #[serde(default)]
    pub rewards: BTreeMap<String, Reward>,
    #[serde(default)]
    pub bonuses: BTreeMap<String, Bonus>,
    #[serde(default)]
    pub penalties: BTreeMap<String, Penalty>,
    #[serde(default)]
    pub parents: BTreeMap<String, Parent>,
}

/// Resolve `id` in one of the store's collections.
pub fn lookup<'a, T>(map: &'a BTreeMap<String, T>, kind: EntityKind, id: &str) -> Result<&'a T> {
    map.get(id).ok_or_else(|| CoreError::not_found(kind, id))
}

pub fn lookup_mut<'a, T>(
    map: &'a mut BTreeMap<String, T>,
    kind: EntityKind,
    id: &str,
) -> Result<&'a mut T> {
    map.get_mut(id).ok_or_else(|| CoreError::not_found(kind, id))
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn kid(&self, id: &str) -> Result<&Kid> {
        lookup(&self.kids, EntityKind::Kid, id)
    }

    pub fn kid_mut(&mut self, id: &str) -> Result<&mut Kid> {
        lookup_mut(&mut self.kids, EntityKind::Kid, id)
    }

    pub fn chore(&self, id: &str) -> Result<&Chore> {
        lookup(&self.chores, EntityKind::Chore, id)
    }

    pub fn chore_mut(&mut self, id: &str) -> Result<&mut Chore> {
        lookup_mut(&mut self.chores, EntityKind::Chore, id)
    }

    pub fn badge(&self, id: &str) -> Result<&Badge> {
        lookup(&self.badges, EntityKind::Badge, id)
    }

    pub fn reward(&self, id: &str) -> Result<&Reward> {
        lookup(&self.rewards, EntityKind::Reward, id)
    }

    pub fn bonus(&self, id: &str) -> Result<&Bonus> {
        lookup(&self.bonuses, EntityKind::Bonus, id)
    }

    pub fn penalty(&self, id: &str) -> Result<&Penalty> {
        lookup(&self.penalties, EntityKind::Penalty, id)
    }

    /// Find a kid by id or, failing that, by exact name.
    pub fn find_kid(&self, id_or_name: &str) -> Option<&Kid> {
        self.kids
            .get(id_or_name)
            .or_else(|| self.kids.values().find(|k| k.name == id_or_name))
    }

    /// Find a chore by id or, failing that, by exact name.
    pub fn find_chore(&self, id_or_name: &str) -> Option<&Chore> {
        self.chores
            .get(id_or_name)
            .or_else(|| self.chores.values().find(|c| c.name == id_or_name))
    }

    fn ensure_kids_exist(&self, kid_ids: &[String]) -> Result<()> {
        kid_ids.iter().try_for_each(|id| self.kid(id).map(|_| ()))
    }

    pub fn add_kid(&mut self, kid: Kid) -> String {
        let id = kid.id.clone();
        self.kids.insert(id.clone(), kid);
        id
    }

    /// Insert a chore and seed a progress record for each assigned kid.
    pub fn add_chore(&mut self, chore: Chore) -> Result<String> {
        schedule::validate(&chore.recurrence, chore.due_date.is_some(), &chore.id)?;
        self.ensure_kids_exist(&chore.assigned_kids)?;

        for kid_id in &chore.assigned_kids {
            if let Some(kid) = self.kids.get_mut(kid_id) {
                seed_progress(kid, &chore);
            }
        }
        let id = chore.id.clone();
        self.chores.insert(id.clone(), chore);
        Ok(id)
    }

    /// Add `kid_id` to a chore's assignment list.
    pub fn assign_chore(&mut self, chore_id: &str, kid_id: &str) -> Result<()> {
        self.kid(kid_id)?;
        let chore = lookup_mut(&mut self.chores, EntityKind::Chore, chore_id)?;
        if !chore.is_assigned(kid_id) {
            chore.assigned_kids.push(kid_id.to_string());
        }
        if let Some(kid) = self.kids.get_mut(kid_id) {
            seed_progress(kid, chore);
        }
        Ok(())
    }

    pub fn add_badge(&mut self, badge: Badge) -> Result<String> {
        self.ensure_kids_exist(&badge.assigned_kids)?;
        let id = badge.id.clone();
        self.badges.insert(id.clone(), badge);
        Ok(id)
    }

    /// Insert an achievement, recording each assigned kid's starting totals.
    pub fn add_achievement(&mut self, mut achievement: Achievement) -> Result<String> {
        self.ensure_kids_exist(&achievement.assigned_kids)?;
        for kid_id in &achievement.assigned_kids {
            let progress = achievement.progress.entry(kid_id.clone()).or_default();
            if achievement.kind == AchievementKind::ChoreTotal {
                if let Some(kid) = self.kids.get(kid_id) {
                    progress.baseline = kid.lifetime_approvals(achievement.chore_id.as_deref());
                }
            }
        }
        let id = achievement.id.clone();
        self.achievements.insert(id.clone(), achievement);
        Ok(id)
    }

    pub fn add_challenge(&mut self, mut challenge: Challenge) -> Result<String> {
        self.ensure_kids_exist(&challenge.assigned_kids)?;
        for kid_id in &challenge.assigned_kids {
            challenge.progress.entry(kid_id.clone()).or_default();
        }
        let id = challenge.id.clone();
        self.challenges.insert(id.clone(), challenge);
        Ok(id)
    }

    pub fn add_reward(&mut self, reward: Reward) -> String {
        let id = reward.id.clone();
        self.rewards.insert(id.clone(), reward);
        id
    }

    pub fn add_bonus(&mut self, bonus: Bonus) -> String {
        let id = bonus.id.clone();
        self.bonuses.insert(id.clone(), bonus);
        id
    }

    pub fn add_penalty(&mut self, penalty: Penalty) -> String {
        let id = penalty.id.clone();
        self.penalties.insert(id.clone(), penalty);
        id
    }

    pub fn add_parent(&mut self, parent: Parent) -> Result<String> {
        self.ensure_kids_exist(&parent.associated_kids)?;
        let id = parent.id.clone();
        self.parents.insert(id.clone(), parent);
        Ok(id)
    }

    /// Remove a kid and every back-reference to them.
    pub fn delete_kid(&mut self, kid_id: &str) -> Result<Kid> {
        let kid = self
            .kids
            .remove(kid_id)
            .ok_or_else(|| CoreError::not_found(EntityKind::Kid, kid_id))?;

        for chore in self.chores.values_mut() {
            chore.assigned_kids.retain(|k| k != kid_id);
            if chore.completion_criteria == CompletionCriteria::SharedFirst {
                release_completed_by(&mut self.kids, chore, kid_id);
            }
        }
        for badge in self.badges.values_mut() {
            badge.assigned_kids.retain(|k| k != kid_id);
            badge.earned_by.retain(|k| k != kid_id);
        }
        for achievement in self.achievements.values_mut() {
            achievement.assigned_kids.retain(|k| k != kid_id);
            achievement.progress.remove(kid_id);
        }
        for challenge in self.challenges.values_mut() {
            challenge.assigned_kids.retain(|k| k != kid_id);
            challenge.progress.remove(kid_id);
        }
        for parent in self.parents.values_mut() {
            parent.associated_kids.retain(|k| k != kid_id);
        }
        Ok(kid)
    }

    /// Remove a chore and every kid's progress on it.
    pub fn delete_chore(&mut self, chore_id: &str) -> Result<Chore> {
        let chore = self
            .chores
            .remove(chore_id)
            .ok_or_else(|| CoreError::not_found(EntityKind::Chore, chore_id))?;

        for kid in self.kids.values_mut() {
            kid.chore_progress.remove(chore_id);
            kid.overdue_notified.remove(chore_id);
        }
        for badge in self.badges.values_mut() {
            badge.tracked_chores.retain(|c| c != chore_id);
        }
        Ok(chore)
    }

    /// Drop rolling statistics older than the retention window across every
    /// kid. Returns how many buckets were removed.
    pub fn prune_stats(&mut self, now: DateTime<Utc>, retention: &crate::stats::Retention) -> usize {
        let mut removed = 0;
        for kid in self.kids.values_mut() {
            removed += kid.point_stats.prune(now, retention);
            for progress in kid.chore_progress.values_mut() {
                removed += progress.stats.prune(now, retention);
            }
            for record in kid.badges_earned.values_mut() {
                removed += record.stats.prune(now, retention);
            }
            for data in kid.reward_data.values_mut() {
                removed += data.stats.prune(now, retention);
            }
        }
        removed
    }
}

/// Progress record for `chore` on `kid`, created from the chore template if
/// missing.
pub fn seed_progress<'a>(kid: &'a mut Kid, chore: &Chore) -> &'a mut ChoreProgress {
    kid.chore_progress.entry(chore.id.clone()).or_insert_with(|| {
        let due = match chore.completion_criteria {
            CompletionCriteria::Independent => chore.due_date,
            CompletionCriteria::Shared | CompletionCriteria::SharedFirst => None,
        };
        ChoreProgress::new(due)
    })
}

fn release_completed_by(kids: &mut BTreeMap<String, Kid>, chore: &Chore, claimant: &str) {
    for kid_id in &chore.assigned_kids {
        let Some(progress) = kids
            .get_mut(kid_id)
            .and_then(|k| k.chore_progress.get_mut(&chore.id))
        else {
            continue;
        };
        if progress.completed_by.as_deref() == Some(claimant) {
            progress.state = ChoreState::Pending;
            progress.completed_by = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::BadgeType;

    fn store_with_kid() -> (Store, String) {
        let mut store = Store::new();
        let id = store.add_kid(Kid::new("Ava"));
        (store, id)
    }

    #[test]
    fn lookup_reports_kind_and_id() {
        let store = Store::new();
        let err = store.chore("missing").unwrap_err();
        assert!(matches!(
            err,
            CoreError::NotFound {
                kind: EntityKind::Chore,
                ..
            }
        ));
    }

    #[test]
    fn add_chore_seeds_progress_from_template() {
        let (mut store, kid_id) = store_with_kid();
        let mut chore = Chore::new("Dishes", 5.0);
        chore.due_date = Some(Utc::now());
        chore.assigned_kids.push(kid_id.clone());
        let chore_id = store.add_chore(chore).unwrap();

        let progress = store.kid(&kid_id).unwrap().progress(&chore_id).unwrap();
        assert!(progress.due_date.is_some());
        assert_eq!(progress.state, ChoreState::Pending);
    }

    #[test]
    fn add_chore_rejects_unknown_kid() {
        let mut store = Store::new();
        let mut chore = Chore::new("Dishes", 5.0);
        chore.assigned_kids.push("ghost".into());
        assert!(store.add_chore(chore).is_err());
    }

    #[test]
    fn delete_kid_cascades() {
        let (mut store, kid_id) = store_with_kid();
        let mut chore = Chore::new("Dishes", 5.0);
        chore.assigned_kids.push(kid_id.clone());
        let chore_id = store.add_chore(chore).unwrap();

        let mut badge = Badge::new("Starter", BadgeType::Cumulative, 10.0);
        badge.assigned_kids.push(kid_id.clone());
        badge.earned_by.push(kid_id.clone());
        let badge_id = store.add_badge(badge).unwrap();

        let mut parent = Parent::new("Sam");
        parent.associated_kids.push(kid_id.clone());
        let parent_id = store.add_parent(parent).unwrap();

        store.delete_kid(&kid_id).unwrap();

        assert!(store.chore(&chore_id).unwrap().assigned_kids.is_empty());
        assert!(store.badge(&badge_id).unwrap().earned_by.is_empty());
        assert!(store.parents[&parent_id].associated_kids.is_empty());
        assert!(store.delete_kid(&kid_id).is_err());
    }

    #[test]
    fn delete_chore_drops_progress() {
        let (mut store, kid_id) = store_with_kid();
        let mut chore = Chore::new("Dishes", 5.0);
        chore.assigned_kids.push(kid_id.clone());
        let chore_id = store.add_chore(chore).unwrap();

        store.delete_chore(&chore_id).unwrap();
        assert!(store.kid(&kid_id).unwrap().progress(&chore_id).is_none());
    }
}
