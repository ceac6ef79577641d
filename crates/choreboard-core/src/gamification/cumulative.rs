//! Cumulative badge ladder: promotion, maintenance, grace and demotion.

use chrono::{DateTime, Duration, Utc};
use std::cmp::Ordering;

use crate::model::{Badge, CumulativeBadgeProgress, CumulativeStatus};
use crate::schedule::next_occurrence;

/// Where a points total sits on a ladder.
#[derive(Debug, Clone, PartialEq)]
pub struct TierPosition {
    pub highest: Option<String>,
    pub next_higher: Option<String>,
    pub next_lower: Option<String>,
    /// Points still needed for `next_higher`.
    pub points_to_next: Option<f64>,
}

/// A ladder transition the engine has to act on.
#[derive(Debug, Clone, PartialEq)]
pub enum TierChange {
    Promoted {
        badge_id: String,
    },
    Maintained {
        badge_id: String,
    },
    GraceStarted {
        badge_id: String,
        grace_end: DateTime<Utc>,
    },
    Demoted {
        from: String,
        to: Option<String>,
    },
}

/// Cumulative badges assigned to `kid_id`, lowest threshold first.
pub fn ladder<'a>(badges: impl IntoIterator<Item = &'a Badge>, kid_id: &str) -> Vec<&'a Badge> {
    let mut tiers: Vec<&Badge> = badges
        .into_iter()
        .filter(|b| b.is_cumulative() && b.is_assigned(kid_id))
        .collect();
    tiers.sort_by(|a, b| {
        a.target
            .threshold
            .partial_cmp(&b.target.threshold)
            .unwrap_or(Ordering::Equal)
    });
    tiers
}

fn rank(ladder: &[&Badge], badge_id: Option<&str>) -> Option<usize> {
    let id = badge_id?;
    ladder.iter().position(|b| b.id == id)
}

/// Compute the ladder position for a total. Pure.
pub fn position(ladder: &[&Badge], total: f64) -> TierPosition {
    let reached = ladder
        .iter()
        .rposition(|tier| tier.target.threshold <= total);
    let next_index = reached.map_or(0, |i| i + 1);
    let next_higher = ladder.get(next_index);

    TierPosition {
        highest: reached.map(|i| ladder[i].id.clone()),
        next_higher: next_higher.map(|b| b.id.clone()),
        next_lower: reached
            .and_then(|i| i.checked_sub(1))
            .map(|i| ladder[i].id.clone()),
        points_to_next: next_higher.map(|b| b.target.threshold - total),
    }
}

/// Multiplier granted by a tier, 1.0 without one.
pub fn multiplier_for(ladder: &[&Badge], badge_id: Option<&str>) -> f64 {
    rank(ladder, badge_id)
        .and_then(|i| ladder[i].award.multiplier)
        .unwrap_or(1.0)
}

/// Maintenance and grace window ends for a tier, measured from `from`.
fn windows(tier: &Badge, from: DateTime<Utc>) -> (Option<DateTime<Utc>>, Option<DateTime<Utc>>) {
    let maintenance_end = next_occurrence(from, &tier.reset_schedule.recurrence, from);
    let grace_end = match tier.reset_schedule.grace_days {
        0 => None,
        days => maintenance_end.map(|end| end + Duration::days(i64::from(days))),
    };
    (maintenance_end, grace_end)
}

/// Advance a kid's ladder state at `now`.
///
/// Returns the transitions that happened, in order. The caller applies
/// award manifests and updates the kid's multiplier from the returned
/// progress.
pub fn evaluate(
    progress: &mut CumulativeBadgeProgress,
    ladder: &[&Badge],
    now: DateTime<Utc>,
) -> Vec<TierChange> {
    let mut changes = Vec::new();
    if ladder.is_empty() {
        return changes;
    }

    let reached = position(ladder, progress.total());
    let reached_rank = rank(ladder, reached.highest.as_deref());
    let recorded_rank = rank(ladder, progress.highest_earned.as_deref());

    if reached_rank > recorded_rank {
        if let Some(tier) = reached_rank.map(|i| ladder[i]) {
            progress.roll_forward();
            progress.highest_earned = Some(tier.id.clone());
            progress.current_badge = Some(tier.id.clone());
            progress.status = CumulativeStatus::Active;
            let (maintenance_end, grace_end) = windows(tier, now);
            progress.maintenance_end = maintenance_end;
            progress.grace_end = grace_end;
            changes.push(TierChange::Promoted {
                badge_id: tier.id.clone(),
            });
        }
    } else if let Some(highest) = recorded_rank.map(|i| ladder[i]) {
        let required = highest.target.maintenance_required;
        match progress.status {
            CumulativeStatus::Grace => {
                if progress.cycle_points >= required {
                    changes.push(renew(progress, highest, now));
                } else if progress.grace_end.is_some_and(|end| now >= end) {
                    changes.extend(demote(progress, ladder, now));
                }
            }
            CumulativeStatus::Active | CumulativeStatus::Demoted => {
                if let Some(end) = progress.maintenance_end.filter(|end| now >= *end) {
                    if progress.cycle_points >= required {
                        changes.push(renew(progress, highest, now));
                    } else if highest.reset_schedule.grace_days > 0 {
                        let grace_end =
                            end + Duration::days(i64::from(highest.reset_schedule.grace_days));
                        progress.status = CumulativeStatus::Grace;
                        progress.grace_end = Some(grace_end);
                        changes.push(TierChange::GraceStarted {
                            badge_id: progress
                                .current_badge
                                .clone()
                                .unwrap_or_else(|| highest.id.clone()),
                            grace_end,
                        });
                    } else {
                        changes.extend(demote(progress, ladder, now));
                    }
                }
            }
        }
    }

    let settled = position(ladder, progress.total());
    progress.next_higher = settled.next_higher;
    progress.next_lower = rank(ladder, progress.current_badge.as_deref())
        .and_then(|i| i.checked_sub(1))
        .map(|i| ladder[i].id.clone());
    changes
}

/// Put a kid directly on a tier, as a parent's manual award does.
/// Returns false when `badge_id` is not on the ladder.
pub fn set_tier(
    progress: &mut CumulativeBadgeProgress,
    ladder: &[&Badge],
    badge_id: &str,
    now: DateTime<Utc>,
) -> bool {
    let Some(index) = rank(ladder, Some(badge_id)) else {
        return false;
    };
    let tier = ladder[index];
    if rank(ladder, progress.highest_earned.as_deref()) < Some(index) {
        progress.highest_earned = Some(tier.id.clone());
    }
    progress.current_badge = Some(tier.id.clone());
    progress.status = CumulativeStatus::Active;
    let (maintenance_end, grace_end) = windows(tier, now);
    progress.maintenance_end = maintenance_end;
    progress.grace_end = grace_end;
    progress.next_lower = index.checked_sub(1).map(|i| ladder[i].id.clone());
    true
}

/// Drop a tier from a kid's record after it was revoked. The kid falls back
/// to the highest tier below it that `still_earned` accepts.
pub fn revoke_tier(
    progress: &mut CumulativeBadgeProgress,
    ladder: &[&Badge],
    badge_id: &str,
    still_earned: impl Fn(&str) -> bool,
) {
    let Some(index) = rank(ladder, Some(badge_id)) else {
        return;
    };
    let fallback = ladder[..index]
        .iter()
        .rev()
        .find(|tier| still_earned(&tier.id))
        .map(|tier| tier.id.clone());
    if progress.highest_earned.as_deref() == Some(badge_id) {
        progress.highest_earned = fallback.clone();
    }
    if progress.current_badge.as_deref() == Some(badge_id) {
        progress.current_badge = fallback;
    }
    progress.next_lower = rank(ladder, progress.current_badge.as_deref())
        .and_then(|i| i.checked_sub(1))
        .map(|i| ladder[i].id.clone());
}

fn renew(progress: &mut CumulativeBadgeProgress, highest: &Badge, now: DateTime<Utc>) -> TierChange {
    progress.roll_forward();
    progress.status = CumulativeStatus::Active;
    progress.current_badge = Some(highest.id.clone());
    let (maintenance_end, grace_end) = windows(highest, now);
    progress.maintenance_end = maintenance_end;
    progress.grace_end = grace_end;
    TierChange::Maintained {
        badge_id: highest.id.clone(),
    }
}

fn demote(
    progress: &mut CumulativeBadgeProgress,
    ladder: &[&Badge],
    now: DateTime<Utc>,
) -> Option<TierChange> {
    let current_rank = rank(ladder, progress.current_badge.as_deref());
    let from = current_rank.map(|i| ladder[i]);
    let to = current_rank
        .and_then(|i| i.checked_sub(1))
        .map(|i| ladder[i]);

    progress.roll_forward();
    progress.status = CumulativeStatus::Demoted;
    progress.current_badge = to.map(|b| b.id.clone());

    // The highest tier's schedule keeps running so the kid can win it back.
    let schedule_tier = rank(ladder, progress.highest_earned.as_deref())
        .map(|i| ladder[i])
        .or(from);
    let (maintenance_end, grace_end) = schedule_tier.map_or((None, None), |t| windows(t, now));
    progress.maintenance_end = maintenance_end;
    progress.grace_end = grace_end;

    from.map(|from| TierChange::Demoted {
        from: from.id.clone(),
        to: to.map(|b| b.id.clone()),
    })
}
