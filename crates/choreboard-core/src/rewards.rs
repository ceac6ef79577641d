//! Reward redemption, bonuses and penalties.
//!
//! Every function here mutates the store and records what happened in the
//! given [`Effects`]; the engine persists and publishes afterwards.

use chrono::{DateTime, Utc};
use tracing::info;

use crate::error::{CoreError, Result};
use crate::events::{Effects, Event};
use crate::model::Kid;
use crate::stats::PointSource;
use crate::store::Store;

fn ensure_balance(kid: &Kid, cost: f64) -> Result<()> {
    if kid.points < cost {
        return Err(CoreError::InsufficientBalance {
            kid: kid.id.clone(),
            required: cost,
            available: kid.points,
        });
    }
    Ok(())
}

/// A kid asks for a reward. The balance is checked now and again at approval.
pub fn redeem_reward(
    store: &mut Store,
    effects: &mut Effects,
    kid_id: &str,
    reward_id: &str,
    now: DateTime<Utc>,
) -> Result<()> {
    let cost = store.reward(reward_id)?.cost;
    let kid = store.kid_mut(kid_id)?;
    ensure_balance(kid, cost)?;

    let data = kid.reward_data.entry(reward_id.to_string()).or_default();
    data.pending_count += 1;
    data.last_claimed = Some(now);
    data.stats.record(now, |c| c.claimed += 1);

    info!(kid = kid_id, reward = reward_id, "reward claimed");
    effects.emit(Event::RewardClaimed {
        kid_id: kid_id.to_string(),
        reward_id: reward_id.to_string(),
        at: now,
    });
    effects.mark_dirty(kid_id);
    Ok(())
}

/// Approve a reward and deduct its cost. Returns the new balance.
pub fn approve_reward(
    store: &mut Store,
    effects: &mut Effects,
    kid_id: &str,
    reward_id: &str,
    now: DateTime<Utc>,
) -> Result<f64> {
    let cost = store.reward(reward_id)?.cost;
    let kid = store.kid_mut(kid_id)?;
    ensure_balance(kid, cost)?;

    let data = kid.reward_data.entry(reward_id.to_string()).or_default();
    data.pending_count = data.pending_count.saturating_sub(1);
    data.last_approved = Some(now);
    data.stats.record(now, |c| {
        c.approved += 1;
        c.points_spent += cost;
    });
    let balance = kid.apply_points(-cost, PointSource::Rewards, now);

    info!(kid = kid_id, reward = reward_id, cost, "reward approved");
    effects.emit(Event::RewardApproved {
        kid_id: kid_id.to_string(),
        reward_id: reward_id.to_string(),
        cost,
        at: now,
    });
    effects.emit(Event::PointsChanged {
        kid_id: kid_id.to_string(),
        delta: -cost,
        balance,
        source: PointSource::Rewards,
        at: now,
    });
    effects.mark_dirty(kid_id);
    Ok(balance)
}

pub fn disapprove_reward(
    store: &mut Store,
    effects: &mut Effects,
    kid_id: &str,
    reward_id: &str,
    now: DateTime<Utc>,
) -> Result<()> {
    store.reward(reward_id)?;
    let kid = store.kid_mut(kid_id)?;
    let data = kid.reward_data.entry(reward_id.to_string()).or_default();
    data.pending_count = data.pending_count.saturating_sub(1);
    data.last_disapproved = Some(now);
    data.stats.record(now, |c| c.disapproved += 1);

    effects.emit(Event::RewardDisapproved {
        kid_id: kid_id.to_string(),
        reward_id: reward_id.to_string(),
        at: now,
    });
    effects.mark_dirty(kid_id);
    Ok(())
}

/// Withdraw a pending claim without counting it as a disapproval.
pub fn undo_reward_claim(store: &mut Store, kid_id: &str, reward_id: &str) -> Result<()> {
    store.reward(reward_id)?;
    let kid = store.kid_mut(kid_id)?;
    if let Some(data) = kid.reward_data.get_mut(reward_id) {
        data.pending_count = data.pending_count.saturating_sub(1);
    }
    Ok(())
}

/// Hand out a reward at no cost, as part of a badge or achievement award.
pub fn grant_reward(
    store: &mut Store,
    effects: &mut Effects,
    kid_id: &str,
    reward_id: &str,
    now: DateTime<Utc>,
) -> Result<()> {
    store.reward(reward_id)?;
    let kid = store.kid_mut(kid_id)?;
    let data = kid.reward_data.entry(reward_id.to_string()).or_default();
    data.last_approved = Some(now);
    data.stats.record(now, |c| c.approved += 1);

    effects.emit(Event::RewardApproved {
        kid_id: kid_id.to_string(),
        reward_id: reward_id.to_string(),
        cost: 0.0,
        at: now,
    });
    Ok(())
}

/// Credit a bonus. Bonuses are not scaled by the kid's multiplier.
pub fn apply_bonus(
    store: &mut Store,
    effects: &mut Effects,
    kid_id: &str,
    bonus_id: &str,
    now: DateTime<Utc>,
) -> Result<f64> {
    let points = store.bonus(bonus_id)?.points;
    let kid = store.kid_mut(kid_id)?;
    let balance = kid.apply_points(points, PointSource::Bonuses, now);
    *kid.bonus_applies.entry(bonus_id.to_string()).or_insert(0) += 1;

    info!(kid = kid_id, bonus = bonus_id, points, "bonus applied");
    effects.emit(Event::BonusApplied {
        kid_id: kid_id.to_string(),
        bonus_id: bonus_id.to_string(),
        points,
        at: now,
    });
    effects.emit(Event::PointsChanged {
        kid_id: kid_id.to_string(),
        delta: points,
        balance,
        source: PointSource::Bonuses,
        at: now,
    });
    effects.mark_dirty(kid_id);
    Ok(balance)
}

/// Deduct a penalty. The balance may go negative.
pub fn apply_penalty(
    store: &mut Store,
    effects: &mut Effects,
    kid_id: &str,
    penalty_id: &str,
    now: DateTime<Utc>,
) -> Result<f64> {
    let points = store.penalty(penalty_id)?.points;
    let kid = store.kid_mut(kid_id)?;
    let balance = kid.apply_points(-points, PointSource::Penalties, now);
    *kid.penalty_applies.entry(penalty_id.to_string()).or_insert(0) += 1;

    info!(kid = kid_id, penalty = penalty_id, points, "penalty applied");
    effects.emit(Event::PenaltyApplied {
        kid_id: kid_id.to_string(),
        penalty_id: penalty_id.to_string(),
        points,
        at: now,
    });
    effects.emit(Event::PointsChanged {
        kid_id: kid_id.to_string(),
        delta: -points,
        balance,
        source: PointSource::Penalties,
        at: now,
    });
    effects.mark_dirty(kid_id);
    Ok(balance)
}

/// Kids in scope for a reset: one kid, or all of them.
fn scoped_kids<'a>(store: &'a mut Store, kid_id: Option<&str>) -> Result<Vec<&'a mut Kid>> {
    match kid_id {
        Some(id) => Ok(vec![store.kid_mut(id)?]),
        None => Ok(store.kids.values_mut().collect()),
    }
}

/// Clear reward tracking for one kid or all kids, for one reward or all.
pub fn reset_rewards(store: &mut Store, kid_id: Option<&str>, reward_id: Option<&str>) -> Result<()> {
    if let Some(reward_id) = reward_id {
        store.reward(reward_id)?;
    }
    for kid in scoped_kids(store, kid_id)? {
        match reward_id {
            Some(reward_id) => {
                kid.reward_data.remove(reward_id);
            }
            None => kid.reward_data.clear(),
        }
    }
    Ok(())
}

pub fn reset_bonuses(store: &mut Store, kid_id: Option<&str>, bonus_id: Option<&str>) -> Result<()> {
    if let Some(bonus_id) = bonus_id {
        store.bonus(bonus_id)?;
    }
    for kid in scoped_kids(store, kid_id)? {
        match bonus_id {
            Some(bonus_id) => {
                kid.bonus_applies.remove(bonus_id);
            }
            None => kid.bonus_applies.clear(),
        }
    }
    Ok(())
}

pub fn reset_penalties(
    store: &mut Store,
    kid_id: Option<&str>,
    penalty_id: Option<&str>,
) -> Result<()> {
    if let Some(penalty_id) = penalty_id {
        store.penalty(penalty_id)?;
    }
    for kid in scoped_kids(store, kid_id)? {
        match penalty_id {
            Some(penalty_id) => {
                kid.penalty_applies.remove(penalty_id);
            }
            None => kid.penalty_applies.clear(),
        }
    }
    Ok(())
}
