//! Property tests for invariants that must hold for any input sequence.

use chrono::{DateTime, Duration, TimeZone, Utc};
use choreboard_core::chore::{chore_status, AggregateState, ChoreStateEngine};
use choreboard_core::gamification::cumulative;
use choreboard_core::model::{
    ApprovalResetType, Badge, BadgeType, Chore, ChoreState, CompletionCriteria,
    CumulativeBadgeProgress, Kid,
};
use choreboard_core::schedule::next_occurrence;
use choreboard_core::stats::{
    record_points, Period, PeriodicStats, PointCounters, PointSource, Retention,
};
use choreboard_core::{Effects, IntervalUnit, Recurrence, Store};
use proptest::prelude::*;

fn epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap()
}

fn recurrence() -> impl Strategy<Value = Recurrence> {
    prop_oneof![
        Just(Recurrence::daily()),
        Just(Recurrence::weekly()),
        Just(Recurrence::monthly()),
        (1u32..40).prop_map(|n| Recurrence::custom(n, IntervalUnit::Days)),
        (1u32..10).prop_map(|n| Recurrence::custom(n, IntervalUnit::Weeks)),
        (1u32..13).prop_map(|n| Recurrence::custom(n, IntervalUnit::Months)),
    ]
}

#[derive(Debug, Clone, Copy)]
enum Op {
    Claim(usize),
    Approve(usize),
    Disapprove(usize),
    Reset,
}

fn ops(kids: usize) -> impl Strategy<Value = Vec<(Op, i64)>> {
    let op = prop_oneof![
        (0..kids).prop_map(Op::Claim),
        (0..kids).prop_map(Op::Approve),
        (0..kids).prop_map(Op::Disapprove),
        Just(Op::Reset),
    ];
    prop::collection::vec((op, 1i64..600), 1..40)
}

fn setup(kids: usize, configure: impl FnOnce(&mut Chore)) -> (Store, Vec<String>, String) {
    let mut store = Store::new();
    let kid_ids: Vec<String> = (0..kids)
        .map(|i| store.add_kid(Kid::new(format!("kid{i}"))))
        .collect();
    let mut chore = Chore::new("Dishes", 10.0);
    chore.assigned_kids = kid_ids.clone();
    configure(&mut chore);
    let chore_id = store.add_chore(chore).unwrap();
    (store, kid_ids, chore_id)
}

/// Apply one op, ignoring refusals. Returns whether it succeeded.
fn apply(store: &mut Store, kids: &[String], chore: &str, op: Op, now: DateTime<Utc>) -> bool {
    let mut effects = Effects::new();
    let mut engine = ChoreStateEngine::new(store, &mut effects);
    match op {
        Op::Claim(i) => engine.claim(&kids[i], chore, now).is_ok(),
        Op::Approve(i) => engine.approve(&kids[i], chore, None, now).is_ok(),
        Op::Disapprove(i) => engine.disapprove(&kids[i], chore, now).is_ok(),
        Op::Reset => {
            engine.periodic_reset(now);
            true
        }
    }
}

proptest! {
    #[test]
    fn next_occurrence_is_strictly_after_now(
        rec in recurrence(),
        base_days in 0i64..2000,
        now_days in 0i64..2000,
        now_minutes in 0i64..1440,
    ) {
        let base = epoch() + Duration::days(base_days);
        let now = epoch() + Duration::days(now_days) + Duration::minutes(now_minutes);
        let next = next_occurrence(base, &rec, now).unwrap();
        prop_assert!(next > now);
        prop_assert!(next > base);
    }

    #[test]
    fn pruning_never_touches_all_time(
        events in prop::collection::vec((0i64..800, -50.0f64..50.0), 1..60),
        prune_day in 0i64..900,
    ) {
        let mut ledger: PeriodicStats<PointCounters> = PeriodicStats::new();
        for (day, delta) in &events {
            let source = if *delta >= 0.0 { PointSource::Chores } else { PointSource::Penalties };
            record_points(&mut ledger, epoch() + Duration::days(*day), *delta, source);
        }
        let before = ledger.all_time().clone();
        let now = epoch() + Duration::days(prune_day);
        let today = ledger.get(Period::Daily, now).cloned();

        ledger.prune(now, &Retention::default());
        prop_assert_eq!(ledger.all_time(), &before);
        prop_assert_eq!(before.transactions as usize, events.len());
        prop_assert_eq!(ledger.get(Period::Daily, now).cloned(), today);
    }

    #[test]
    fn cumulative_baseline_never_decreases(
        steps in prop::collection::vec((0.0f64..120.0, 1i64..20), 1..30),
    ) {
        let mut tiers = Vec::new();
        for (i, threshold) in [50.0, 150.0, 300.0, 600.0].into_iter().enumerate() {
            let mut badge = Badge::new(format!("tier{i}"), BadgeType::Cumulative, threshold);
            badge.assigned_kids.push("kid".into());
            badge.target.maintenance_required = 40.0;
            badge.reset_schedule.recurrence = Recurrence::weekly();
            badge.reset_schedule.grace_days = (i as u32) * 2;
            tiers.push(badge);
        }
        let ladder = cumulative::ladder(tiers.iter(), "kid");
        let mut progress = CumulativeBadgeProgress::default();
        let mut now = epoch();
        let mut earned_total = 0.0;

        for (points, days) in steps {
            progress.cycle_points += points;
            earned_total += points;
            now += Duration::days(days);
            let baseline = progress.baseline;
            cumulative::evaluate(&mut progress, &ladder, now);
            prop_assert!(progress.baseline >= baseline);
            prop_assert!((progress.total() - earned_total).abs() < 1e-6);
        }
    }

    #[test]
    fn single_kid_aggregate_mirrors_the_kid(
        criteria in prop_oneof![
            Just(CompletionCriteria::Independent),
            Just(CompletionCriteria::Shared),
            Just(CompletionCriteria::SharedFirst),
        ],
        steps in ops(1),
    ) {
        let (mut store, kids, chore) = setup(1, |c| {
            c.completion_criteria = criteria;
            c.recurrence = Recurrence::daily();
            c.due_date = Some(epoch() + Duration::hours(18));
        });
        let mut now = epoch();
        for (op, minutes) in steps {
            now += Duration::minutes(minutes);
            apply(&mut store, &kids, &chore, op, now);
            let status = chore_status(store.chore(&chore).unwrap(), &store.kids);
            prop_assert_eq!(status.aggregate, AggregateState::from(status.kids[0].state));
        }
    }

    #[test]
    fn shared_first_has_at_most_one_active_kid(steps in ops(3)) {
        let (mut store, kids, chore) = setup(3, |c| {
            c.completion_criteria = CompletionCriteria::SharedFirst;
            c.recurrence = Recurrence::daily();
            c.due_date = Some(epoch() + Duration::hours(18));
        });
        let mut now = epoch();
        for (op, minutes) in steps {
            now += Duration::minutes(minutes);
            apply(&mut store, &kids, &chore, op, now);
            let active = kids
                .iter()
                .filter(|k| {
                    let state = store.kid(k).unwrap().progress(&chore).unwrap().state;
                    matches!(state, ChoreState::Claimed | ChoreState::Approved)
                })
                .count();
            prop_assert!(active <= 1, "{} kids active after {:?}", active, op);
        }
    }

    #[test]
    fn pending_claims_move_by_one(steps in ops(1)) {
        let (mut store, kids, chore) = setup(1, |c| {
            c.approval_reset = ApprovalResetType::AtMidnightMulti;
        });
        let mut expected: u32 = 0;
        let mut now = epoch();
        for (op, minutes) in steps {
            now += Duration::minutes(minutes);
            if matches!(op, Op::Reset) {
                continue;
            }
            let accepted = apply(&mut store, &kids, &chore, op, now);
            match op {
                Op::Claim(_) => {
                    prop_assert!(accepted);
                    expected += 1;
                }
                Op::Approve(_) => {
                    prop_assert!(accepted);
                    expected = expected.saturating_sub(1);
                }
                Op::Disapprove(_) => {
                    prop_assert_eq!(accepted, expected > 0);
                    if accepted {
                        expected -= 1;
                    }
                }
                Op::Reset => unreachable!(),
            }
            let progress = store.kid(&kids[0]).unwrap().progress(&chore).unwrap();
            prop_assert_eq!(progress.pending_claim_count, expected);
        }
    }
}
