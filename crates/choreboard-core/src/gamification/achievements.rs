//! Achievement and challenge counters.
//!
//! Counters move when a chore is approved ([`record_chore_approval`]); the
//! batch evaluation only compares them with targets and flips `awarded`.

use chrono::{DateTime, Duration, Utc};
use std::collections::BTreeMap;

use crate::model::{Achievement, AchievementKind, Challenge, ChallengeKind, Kid};
use crate::stats::Period;

/// Update every achievement and challenge selecting `chore_id` after the
/// kid's approval at `now`. Awarded records are left alone.
pub fn record_chore_approval(
    achievements: &mut BTreeMap<String, Achievement>,
    challenges: &mut BTreeMap<String, Challenge>,
    kid: &Kid,
    chore_id: &str,
    now: DateTime<Utc>,
) {
    let today = now.date_naive();
    for achievement in achievements.values_mut() {
        if !achievement.is_assigned(&kid.id)
            || !achievement.selects(chore_id)
            || achievement.is_awarded(&kid.id)
        {
            continue;
        }
        let linked = achievement.chore_id.clone();
        let progress = achievement.progress.entry(kid.id.clone()).or_default();
        match achievement.kind {
            AchievementKind::ChoreStreak => {
                progress.streak = match progress.last_streak_date {
                    Some(last) if last == today => progress.streak.max(1),
                    Some(last) if last + Duration::days(1) == today => progress.streak + 1,
                    _ => 1,
                };
                progress.last_streak_date = Some(today);
            }
            AchievementKind::ChoreTotal => {
                progress.current = kid
                    .lifetime_approvals(linked.as_deref())
                    .saturating_sub(progress.baseline);
            }
            AchievementKind::DailyMinimum => {
                progress.current = kid.approvals_on(today, linked.as_deref());
            }
        }
    }

    let day_key = Period::Daily.key(now);
    for challenge in challenges.values_mut() {
        if !challenge.is_assigned(&kid.id) || !challenge.selects(chore_id) || !challenge.is_open(now)
        {
            continue;
        }
        let progress = challenge.progress.entry(kid.id.clone()).or_default();
        if progress.awarded {
            continue;
        }
        progress.count += 1;
        *progress.daily_counts.entry(day_key.clone()).or_insert(0) += 1;
    }
}

/// Award achievements whose target `kid` has reached. Returns the ids
/// awarded by this call.
pub fn evaluate_achievements(
    achievements: &mut BTreeMap<String, Achievement>,
    kid: &Kid,
    now: DateTime<Utc>,
) -> Vec<String> {
    let today = now.date_naive();
    let mut awarded = Vec::new();
    for achievement in achievements.values_mut() {
        if !achievement.is_assigned(&kid.id) || achievement.is_awarded(&kid.id) {
            continue;
        }
        let target = achievement.target;
        let linked = achievement.chore_id.clone();
        let progress = achievement.progress.entry(kid.id.clone()).or_default();
        let value = match achievement.kind {
            AchievementKind::ChoreStreak => {
                let alive = progress
                    .last_streak_date
                    .is_some_and(|last| last + Duration::days(1) >= today);
                if alive {
                    progress.streak
                } else {
                    0
                }
            }
            AchievementKind::ChoreTotal => progress.current,
            AchievementKind::DailyMinimum => kid.approvals_on(today, linked.as_deref()),
        };
        if value >= target {
            progress.awarded = true;
            progress.awarded_at = Some(now);
            awarded.push(achievement.id.clone());
        }
    }
    awarded
}

/// Award challenges `kid` has completed. Returns the ids awarded.
pub fn evaluate_challenges(
    challenges: &mut BTreeMap<String, Challenge>,
    kid_id: &str,
    now: DateTime<Utc>,
) -> Vec<String> {
    let today = now.date_naive();
    let mut awarded = Vec::new();
    for challenge in challenges.values_mut() {
        if !challenge.is_assigned(kid_id) || now < challenge.start {
            continue;
        }
        let target = challenge.target;
        let done = {
            let Some(progress) = challenge.progress.get(kid_id) else {
                continue;
            };
            if progress.awarded {
                continue;
            }
            match challenge.kind {
                ChallengeKind::TotalWithinWindow => {
                    challenge.is_open(now) && progress.count >= target
                }
                ChallengeKind::DailyMinimum => {
                    let last_day = challenge.end.date_naive();
                    today >= last_day
                        && challenge.window_days().all(|day| {
                            let key = Period::Daily.key_for_date(day);
                            progress.daily_counts.get(&key).copied().unwrap_or(0) >= target
                        })
                }
            }
        };
        if done {
            if let Some(progress) = challenge.progress.get_mut(kid_id) {
                progress.awarded = true;
                progress.awarded_at = Some(now);
            }
            awarded.push(challenge.id.clone());
        }
    }
    awarded
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::Recurrence;
    use chrono::TimeZone;

    fn at(d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, d, h, 0, 0).unwrap()
    }

    fn approve(kid: &mut Kid, chore: &str, when: DateTime<Utc>) {
        kid.chore_progress
            .entry(chore.to_string())
            .or_default()
            .record_approval(when, 5.0, &Recurrence::daily());
    }

    #[test]
    fn streak_achievement_needs_consecutive_days() {
        let mut kid = Kid::new("Ava");
        let mut achievement = Achievement::new("Three in a row", AchievementKind::ChoreStreak, 3);
        achievement.assigned_kids.push(kid.id.clone());
        let id = achievement.id.clone();
        let mut achievements = BTreeMap::from([(id.clone(), achievement)]);
        let mut challenges = BTreeMap::new();

        for (day, expect) in [(10, 1), (11, 2), (13, 1), (14, 2), (15, 3)] {
            approve(&mut kid, "dishes", at(day, 9));
            record_chore_approval(&mut achievements, &mut challenges, &kid, "dishes", at(day, 9));
            assert_eq!(achievements[&id].progress[&kid.id].streak, expect);
        }
        assert_eq!(evaluate_achievements(&mut achievements, &kid, at(15, 9)), vec![id.clone()]);
        assert!(evaluate_achievements(&mut achievements, &kid, at(15, 10)).is_empty());
    }

    #[test]
    fn total_counts_from_assignment_baseline() {
        let mut kid = Kid::new("Ava");
        approve(&mut kid, "dishes", at(10, 9));
        let mut achievement = Achievement::new("Two more", AchievementKind::ChoreTotal, 2);
        achievement.assigned_kids.push(kid.id.clone());
        achievement.progress.entry(kid.id.clone()).or_default().baseline =
            kid.lifetime_approvals(None);
        let id = achievement.id.clone();
        let mut achievements = BTreeMap::from([(id.clone(), achievement)]);
        let mut challenges = BTreeMap::new();

        approve(&mut kid, "dishes", at(11, 9));
        record_chore_approval(&mut achievements, &mut challenges, &kid, "dishes", at(11, 9));
        assert!(evaluate_achievements(&mut achievements, &kid, at(11, 9)).is_empty());

        approve(&mut kid, "laundry", at(12, 9));
        record_chore_approval(&mut achievements, &mut challenges, &kid, "laundry", at(12, 9));
        assert_eq!(evaluate_achievements(&mut achievements, &kid, at(12, 9)).len(), 1);
    }

    #[test]
    fn daily_minimum_challenge_needs_every_day() {
        let mut kid = Kid::new("Ava");
        let mut challenge = Challenge::new(
            "Weekend warrior",
            ChallengeKind::DailyMinimum,
            1,
            at(10, 0),
            at(11, 23),
        );
        challenge.assigned_kids.push(kid.id.clone());
        challenge.progress.insert(kid.id.clone(), Default::default());
        let id = challenge.id.clone();
        let mut challenges = BTreeMap::from([(id.clone(), challenge)]);
        let mut achievements = BTreeMap::new();

        approve(&mut kid, "dishes", at(10, 9));
        record_chore_approval(&mut achievements, &mut challenges, &kid, "dishes", at(10, 9));
        assert!(evaluate_challenges(&mut challenges, &kid.id, at(10, 9)).is_empty());

        approve(&mut kid, "dishes", at(11, 9));
        record_chore_approval(&mut achievements, &mut challenges, &kid, "dishes", at(11, 9));
        assert_eq!(evaluate_challenges(&mut challenges, &kid.id, at(11, 9)), vec![id]);
    }

    #[test]
    fn approvals_outside_window_do_not_count() {
        let mut kid = Kid::new("Ava");
        let mut challenge = Challenge::new(
            "Sprint",
            ChallengeKind::TotalWithinWindow,
            1,
            at(12, 0),
            at(13, 0),
        );
        challenge.assigned_kids.push(kid.id.clone());
        let id = challenge.id.clone();
        let mut challenges = BTreeMap::from([(id.clone(), challenge)]);
        let mut achievements = BTreeMap::new();

        approve(&mut kid, "dishes", at(10, 9));
        record_chore_approval(&mut achievements, &mut challenges, &kid, "dishes", at(10, 9));
        assert!(challenges[&id].progress.get(&kid.id).is_none());
    }
}
