//! Periodic, daily and special-occasion badges.
//!
//! Completed days are folded into the cycle accumulators the first time a
//! later day is observed. The current day is only ever a tentative
//! contribution (`today_value`) until it is rolled.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use std::collections::BTreeMap;

use crate::model::{
    Badge, BadgeProgressStatus, BadgeType, Chore, ChoreProgress, KidBadgeProgress, TargetKind,
};
use crate::schedule::{next_midnight, next_occurrence, start_of_day};

/// What happened to one kid's progress on one badge in an evaluation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BadgeOutcome {
    /// Criteria met for the first time in the current cycle.
    pub awarded: bool,
    /// A cycle ended with the target missed.
    pub missed_cycle: bool,
}

/// One day's contribution across a badge's tracked chores.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DayTally {
    pub points: f64,
    pub approvals: u32,
    pub completed: usize,
    pub tracked: usize,
    pub met: bool,
}

/// Tally `date` for a kid from their daily chore buckets.
pub fn day_tally(
    badge: &Badge,
    kid_id: &str,
    chores: &BTreeMap<String, Chore>,
    progress: &BTreeMap<String, ChoreProgress>,
    date: NaiveDate,
) -> DayTally {
    let mut tally = DayTally::default();
    for chore in chores.values() {
        if !chore.is_assigned(kid_id) || !badge.tracks(&chore.id) {
            continue;
        }
        let slot = progress.get(&chore.id);
        if badge.target.due_today_only && !chore.is_due_on(date, chore.due_date_for(slot)) {
            continue;
        }
        tally.tracked += 1;

        let Some(counters) = slot.and_then(|p| p.stats.on_date(date)) else {
            continue;
        };
        tally.approvals += counters.approved;
        tally.points += counters.points;
        let went_overdue = badge.target.exclude_overdue && counters.overdue > 0;
        if counters.approved > 0 && !went_overdue {
            tally.completed += 1;
        }
    }
    tally.met = badge
        .target
        .day_rule
        .is_met(tally.completed, tally.tracked, tally.approvals);
    tally
}

fn fold_day(progress: &mut KidBadgeProgress, tally: &DayTally) {
    progress.cycle_points += tally.points;
    progress.cycle_chore_count += tally.approvals;
    if tally.met {
        progress.cycle_days_completed += 1;
        progress.current_streak += 1;
        progress.best_streak = progress.best_streak.max(progress.current_streak);
    } else {
        progress.current_streak = 0;
    }
}

/// Accumulated value plus today's tentative contribution.
fn target_value(kind: TargetKind, progress: &KidBadgeProgress, today: &DayTally) -> f64 {
    let met_today = if today.met { 1.0 } else { 0.0 };
    match kind {
        TargetKind::Points => progress.cycle_points + today.points,
        TargetKind::ChoreCount => (progress.cycle_chore_count + today.approvals) as f64,
        TargetKind::DaysCompleted => progress.cycle_days_completed as f64 + met_today,
        TargetKind::Streak => progress.current_streak as f64 + met_today,
    }
}

/// Bounds of the cycle that contains `now`, starting no earlier than `from`.
fn cycle_window(badge: &Badge, from: DateTime<Utc>) -> (DateTime<Utc>, Option<DateTime<Utc>>) {
    let start = start_of_day(from.date_naive());
    let end = match badge.badge_type {
        BadgeType::Daily | BadgeType::SpecialOccasion => Some(next_midnight(start)),
        BadgeType::Periodic | BadgeType::Cumulative => {
            let recurrence = badge.cycle_recurrence();
            next_occurrence(start, &recurrence, start)
        }
    };
    (start, end)
}

/// Evaluate one non-cumulative badge for one kid.
///
/// `max_backfill_days` bounds how far back unrolled days are read; older
/// daily buckets have been pruned.
pub fn evaluate(
    badge: &Badge,
    kid_id: &str,
    badge_progress: &mut KidBadgeProgress,
    chores: &BTreeMap<String, Chore>,
    chore_progress: &BTreeMap<String, ChoreProgress>,
    now: DateTime<Utc>,
    max_backfill_days: u32,
) -> BadgeOutcome {
    let mut outcome = BadgeOutcome::default();
    let today = now.date_naive();
    let yesterday = today - Duration::days(1);
    let recurring = badge.is_recurring() || badge.badge_type == BadgeType::SpecialOccasion;

    if !recurring && badge_progress.status == BadgeProgressStatus::Earned {
        return outcome;
    }

    if badge_progress.cycle_start.is_none() {
        let (start, end) = cycle_window(badge, now);
        badge_progress.start_cycle(start, if recurring { end } else { None });
        if !recurring {
            badge_progress.status = BadgeProgressStatus::InProgress;
        }
        badge_progress.last_rolled = Some(yesterday);
    }

    let oldest = today - Duration::days(i64::from(max_backfill_days));
    let roll_until = |progress: &mut KidBadgeProgress, last_day: NaiveDate| {
        let first = progress
            .last_rolled
            .map(|d| d + Duration::days(1))
            .unwrap_or(last_day)
            .max(oldest);
        let cycle_first = progress
            .cycle_start
            .map(|s| s.date_naive())
            .unwrap_or(first);
        let mut day = first.max(cycle_first);
        while day <= last_day {
            let tally = day_tally(badge, kid_id, chores, chore_progress, day);
            fold_day(progress, &tally);
            day += Duration::days(1);
        }
        if progress.last_rolled.map_or(true, |d| d < last_day) {
            progress.last_rolled = Some(last_day);
        }
    };

    // Close a cycle that has ended since the last pass.
    if let Some(end) = badge_progress.cycle_end.filter(|end| *end <= now) {
        let last_day_of_cycle = end.date_naive() - Duration::days(1);
        roll_until(badge_progress, last_day_of_cycle);
        if !badge_progress.criteria_met {
            let closing = badge_progress.cycle_start;
            let value = target_value(badge.target.kind, badge_progress, &DayTally::default());
            if value >= badge.target.threshold {
                outcome.awarded = true;
            } else if badge.badge_type != BadgeType::SpecialOccasion
                && badge_progress.penalized_cycle != closing
            {
                badge_progress.penalized_cycle = closing;
                outcome.missed_cycle = true;
            }
        }

        // Skip whole cycles that passed without any observation.
        let (start, next_end) = match badge.badge_type {
            BadgeType::Periodic | BadgeType::Cumulative => {
                let recurrence = badge.cycle_recurrence();
                let mut start = end;
                let mut next_end = None;
                while let Some(candidate) = next_occurrence(end, &recurrence, start) {
                    if candidate > now {
                        next_end = Some(candidate);
                        break;
                    }
                    start = candidate;
                }
                (start, next_end)
            }
            BadgeType::Daily | BadgeType::SpecialOccasion => cycle_window(badge, now),
        };
        badge_progress.start_cycle(start, next_end);
        badge_progress.last_rolled = Some(start.date_naive() - Duration::days(1));
    }

    if outcome.awarded {
        return outcome;
    }

    roll_until(badge_progress, yesterday);
    let today_tally = day_tally(badge, kid_id, chores, chore_progress, today);
    let value = target_value(badge.target.kind, badge_progress, &today_tally);
    badge_progress.today_value = match badge.target.kind {
        TargetKind::Points => today_tally.points,
        TargetKind::ChoreCount => f64::from(today_tally.approvals),
        TargetKind::DaysCompleted | TargetKind::Streak => {
            if today_tally.met {
                1.0
            } else {
                0.0
            }
        }
    };

    if !badge_progress.criteria_met && value >= badge.target.threshold {
        badge_progress.criteria_met = true;
        badge_progress.status = BadgeProgressStatus::Earned;
        outcome.awarded = true;
    }
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DayRule, Kid};
    use crate::schedule::Recurrence;
    use chrono::TimeZone;

    fn at(d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, d, h, 0, 0).unwrap()
    }

    fn kid_with_chores(approvals: &[(u32, &str)]) -> (Kid, BTreeMap<String, Chore>) {
        let mut kid = Kid::new("Ava");
        let mut chores = BTreeMap::new();
        for name in ["dishes", "laundry"] {
            let mut chore = Chore::new(name, 5.0);
            chore.id = name.to_string();
            chore.assigned_kids.push(kid.id.clone());
            chores.insert(chore.id.clone(), chore);
        }
        for (day, chore_id) in approvals {
            kid.chore_progress
                .entry(chore_id.to_string())
                .or_default()
                .record_approval(at(*day, 10), 5.0, &Recurrence::daily());
        }
        (kid, chores)
    }

    #[test]
    fn day_rule_all_needs_every_tracked_chore() {
        let mut badge = Badge::new("Clean sweep", BadgeType::Daily, 1.0);
        badge.target.kind = TargetKind::DaysCompleted;
        let (kid, chores) = kid_with_chores(&[(16, "dishes")]);
        let tally = day_tally(&badge, &kid.id, &chores, &kid.chore_progress, at(16, 0).date_naive());
        assert_eq!(tally.tracked, 2);
        assert!(!tally.met);

        badge.target.day_rule = DayRule::MinCount(1);
        let tally = day_tally(&badge, &kid.id, &chores, &kid.chore_progress, at(16, 0).date_naive());
        assert!(tally.met);
    }

    #[test]
    fn weekly_points_badge_awards_once_per_cycle() {
        let mut badge = Badge::new("Busy bee", BadgeType::Periodic, 10.0);
        badge.reset_schedule.recurrence = Recurrence::weekly();
        let (mut kid, chores) = kid_with_chores(&[(12, "dishes")]);
        let mut progress = KidBadgeProgress::default();

        let first = evaluate(&badge, &kid.id, &mut progress, &chores, &kid.chore_progress, at(12, 12), 7);
        assert!(!first.awarded);

        kid.chore_progress
            .entry("laundry".into())
            .or_default()
            .record_approval(at(13, 10), 5.0, &Recurrence::daily());
        let second = evaluate(&badge, &kid.id, &mut progress, &chores, &kid.chore_progress, at(13, 12), 7);
        assert!(second.awarded);
        assert_eq!(progress.cycle_points, 5.0);

        let third = evaluate(&badge, &kid.id, &mut progress, &chores, &kid.chore_progress, at(13, 18), 7);
        assert!(!third.awarded);
    }

    #[test]
    fn missed_daily_cycle_is_reported() {
        let mut badge = Badge::new("Daily helper", BadgeType::Daily, 1.0);
        badge.target.kind = TargetKind::ChoreCount;
        let (kid, chores) = kid_with_chores(&[]);
        let mut progress = KidBadgeProgress::default();

        evaluate(&badge, &kid.id, &mut progress, &chores, &kid.chore_progress, at(15, 12), 7);
        let next_day = evaluate(&badge, &kid.id, &mut progress, &chores, &kid.chore_progress, at(16, 8), 7);
        assert!(next_day.missed_cycle);
        assert_eq!(progress.cycle_start, Some(at(16, 0)));
        assert_eq!(progress.penalized_cycle, Some(at(15, 0)));
    }

    #[test]
    fn replayed_cycle_close_is_penalized_once() {
        let mut badge = Badge::new("Daily helper", BadgeType::Daily, 1.0);
        badge.target.kind = TargetKind::ChoreCount;
        let (kid, chores) = kid_with_chores(&[]);
        let mut progress = KidBadgeProgress::default();
        evaluate(&badge, &kid.id, &mut progress, &chores, &kid.chore_progress, at(15, 12), 7);
        let before_close = progress.clone();

        let first = evaluate(&badge, &kid.id, &mut progress, &chores, &kid.chore_progress, at(16, 8), 7);
        assert!(first.missed_cycle);

        // Same cycle state as before the close, but the marker was kept.
        let mut replay = KidBadgeProgress {
            penalized_cycle: progress.penalized_cycle,
            ..before_close
        };
        let second = evaluate(&badge, &kid.id, &mut replay, &chores, &kid.chore_progress, at(16, 8), 7);
        assert!(!second.missed_cycle);
        assert_eq!(replay.cycle_start, Some(at(16, 0)));
    }
}
