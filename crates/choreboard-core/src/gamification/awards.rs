//! Applying award manifests.

use chrono::{DateTime, Utc};
use tracing::warn;

use crate::error::Result;
use crate::events::{Effects, Event};
use crate::model::AwardManifest;
use crate::rewards;
use crate::stats::PointSource;
use crate::store::Store;

/// Grant the points, rewards and bonuses a manifest lists to one kid.
/// Penalty items are only applied through [`apply_penalties`].
///
/// Manifest points are credited as-is under `source`, never scaled by the
/// kid's multiplier. A dangling reward or bonus reference is logged and
/// skipped.
pub fn apply_manifest(
    store: &mut Store,
    effects: &mut Effects,
    kid_id: &str,
    manifest: &AwardManifest,
    source: PointSource,
    now: DateTime<Utc>,
) -> Result<()> {
    if manifest.points != 0.0 {
        let kid = store.kid_mut(kid_id)?;
        let balance = kid.apply_points(manifest.points, source, now);
        effects.emit(Event::PointsChanged {
            kid_id: kid_id.to_string(),
            delta: manifest.points,
            balance,
            source,
            at: now,
        });
    }

    for reward_id in &manifest.rewards {
        if let Err(e) = rewards::grant_reward(store, effects, kid_id, reward_id, now) {
            warn!(kid = kid_id, reward = %reward_id, "skipping award reward: {e}");
        }
    }
    for bonus_id in &manifest.bonuses {
        if let Err(e) = rewards::apply_bonus(store, effects, kid_id, bonus_id, now) {
            warn!(kid = kid_id, bonus = %bonus_id, "skipping award bonus: {e}");
        }
    }
    Ok(())
}

/// Apply a manifest's penalty items only, used when a cycle is missed.
pub fn apply_penalties(
    store: &mut Store,
    effects: &mut Effects,
    kid_id: &str,
    penalties: &[String],
    now: DateTime<Utc>,
) {
    for penalty_id in penalties {
        if let Err(e) = rewards::apply_penalty(store, effects, kid_id, penalty_id, now) {
            warn!(kid = kid_id, penalty = %penalty_id, "skipping award penalty: {e}");
        }
    }
}
