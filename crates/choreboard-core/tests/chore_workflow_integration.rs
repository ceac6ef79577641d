//! Integration tests for the chore workflow through the engine's command
//! surface: claims, approvals, shared-first locking, overdue sweeps and
//! the events published along the way.

use chrono::{DateTime, Duration, TimeZone, Utc};
use choreboard_core::model::{ApprovalResetType, Chore, ChoreState, CompletionCriteria, Kid};
use choreboard_core::{AggregateState, Engine, EngineConfig, Event, InvalidStateReason, Recurrence};

fn at(day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 10, day, hour, 0, 0).unwrap()
}

fn engine() -> Engine {
    Engine::in_memory(EngineConfig::default())
}

fn add_chore(engine: &mut Engine, kids: &[&String], configure: impl FnOnce(&mut Chore)) -> String {
    let mut chore = Chore::new("Dishes", 10.0);
    chore.assigned_kids = kids.iter().map(|k| k.to_string()).collect();
    configure(&mut chore);
    engine.add_chore(chore).unwrap()
}

fn state(engine: &Engine, kid: &str, chore: &str) -> ChoreState {
    engine.store().kid(kid).unwrap().progress(chore).unwrap().state
}

#[test]
fn test_claim_approve_then_reclaim_is_refused() {
    let mut engine = engine();
    let kid = engine.add_kid(Kid::new("K")).unwrap();
    let chore = add_chore(&mut engine, &[&kid], |_| {});

    engine.claim_chore(&kid, &chore, at(16, 9)).unwrap();
    let progress = engine.store().kid(&kid).unwrap().progress(&chore).unwrap();
    assert_eq!(progress.state, ChoreState::Claimed);
    assert_eq!(progress.pending_claim_count, 1);

    let credited = engine.approve_chore(&kid, &chore, None, at(16, 10)).unwrap();
    assert_eq!(credited, 10.0);
    let k = engine.store().kid(&kid).unwrap();
    assert_eq!(k.points, 10.0);
    assert_eq!(k.progress(&chore).unwrap().state, ChoreState::Approved);
    assert_eq!(k.progress(&chore).unwrap().pending_claim_count, 0);

    let err = engine.claim_chore(&kid, &chore, at(16, 11)).unwrap_err();
    assert_eq!(
        err.invalid_state_reason(),
        Some(InvalidStateReason::AlreadyApproved)
    );
}

#[test]
fn test_disapprove_requires_pending_claim() {
    let mut engine = engine();
    let kid = engine.add_kid(Kid::new("Ava")).unwrap();
    let chore = add_chore(&mut engine, &[&kid], |_| {});

    engine.claim_chore(&kid, &chore, at(16, 9)).unwrap();
    engine.approve_chore(&kid, &chore, None, at(16, 10)).unwrap();
    let err = engine.disapprove_chore(&kid, &chore, at(16, 11)).unwrap_err();
    assert_eq!(
        err.invalid_state_reason(),
        Some(InvalidStateReason::NoPendingClaim)
    );

    assert!(engine.claim_chore(&kid, &chore, at(16, 12)).is_err());
    assert!(engine.approve_chore(&kid, &chore, None, at(16, 13)).is_err());
    assert_eq!(engine.store().kid(&kid).unwrap().points, 10.0);
    assert_eq!(state(&engine, &kid, &chore), ChoreState::Approved);

    let fresh = add_chore(&mut engine, &[&kid], |_| {});
    assert!(engine.disapprove_chore(&kid, &fresh, at(16, 14)).is_err());
    assert_eq!(state(&engine, &kid, &fresh), ChoreState::Pending);
}

#[test]
fn test_multi_claim_chores_stack_claims() {
    let mut engine = engine();
    let kid = engine.add_kid(Kid::new("Ava")).unwrap();
    let chore = add_chore(&mut engine, &[&kid], |c| {
        c.approval_reset = ApprovalResetType::AtMidnightMulti;
    });

    engine.claim_chore(&kid, &chore, at(16, 9)).unwrap();
    engine.claim_chore(&kid, &chore, at(16, 10)).unwrap();
    engine.disapprove_chore(&kid, &chore, at(16, 11)).unwrap();
    assert_eq!(state(&engine, &kid, &chore), ChoreState::Claimed);

    engine.approve_chore(&kid, &chore, None, at(16, 12)).unwrap();
    engine.claim_chore(&kid, &chore, at(16, 13)).unwrap();
    let progress = engine.store().kid(&kid).unwrap().progress(&chore).unwrap();
    assert_eq!(progress.pending_claim_count, 1);
}

#[test]
fn test_shared_first_locks_siblings_until_disapproved() {
    let mut engine = engine();
    let ava = engine.add_kid(Kid::new("Ava")).unwrap();
    let ben = engine.add_kid(Kid::new("Ben")).unwrap();
    let chore = add_chore(&mut engine, &[&ava, &ben], |c| {
        c.completion_criteria = CompletionCriteria::SharedFirst;
    });

    engine.claim_chore(&ava, &chore, at(16, 9)).unwrap();
    assert_eq!(state(&engine, &ben, &chore), ChoreState::CompletedByOther);
    assert_eq!(
        engine.chore_status(&chore).unwrap().aggregate,
        AggregateState::Claimed
    );

    let err = engine.approve_chore(&ben, &chore, None, at(16, 10)).unwrap_err();
    assert_eq!(
        err.invalid_state_reason(),
        Some(InvalidStateReason::CompletedByOther)
    );

    engine.disapprove_chore(&ava, &chore, at(16, 11)).unwrap();
    assert_eq!(state(&engine, &ava, &chore), ChoreState::Pending);
    assert_eq!(state(&engine, &ben, &chore), ChoreState::Pending);

    engine.claim_chore(&ben, &chore, at(16, 12)).unwrap();
    assert_eq!(state(&engine, &ava, &chore), ChoreState::CompletedByOther);
}

#[test]
fn test_direct_approval_under_shared_first_locks_siblings() {
    let mut engine = engine();
    let ava = engine.add_kid(Kid::new("Ava")).unwrap();
    let ben = engine.add_kid(Kid::new("Ben")).unwrap();
    let chore = add_chore(&mut engine, &[&ava, &ben], |c| {
        c.completion_criteria = CompletionCriteria::SharedFirst;
    });

    engine.approve_chore(&ava, &chore, None, at(16, 9)).unwrap();
    assert_eq!(state(&engine, &ben, &chore), ChoreState::CompletedByOther);
    assert!(engine.approve_chore(&ben, &chore, None, at(16, 10)).is_err());
}

#[test]
fn test_overdue_sweep_and_reset() {
    let mut engine = engine();
    let kid = engine.add_kid(Kid::new("Ava")).unwrap();
    let chore = add_chore(&mut engine, &[&kid], |c| {
        c.recurrence = Recurrence::daily();
        c.due_date = Some(at(16, 18));
    });
    let mut events = engine.subscribe();

    let report = engine.tick(at(16, 19)).unwrap();
    assert!(report.swept);
    assert_eq!(state(&engine, &kid, &chore), ChoreState::Overdue);

    let mut saw_overdue = false;
    while let Ok(event) = events.try_recv() {
        saw_overdue |= matches!(event, Event::ChoreOverdue { .. });
    }
    assert!(saw_overdue);

    engine.reset_overdue(&chore, None, at(16, 20)).unwrap();
    assert_eq!(state(&engine, &kid, &chore), ChoreState::Pending);
}

#[test]
fn test_approval_publishes_events_and_marks_dirty() {
    let mut engine = engine();
    let kid = engine.add_kid(Kid::new("Ava")).unwrap();
    let chore = add_chore(&mut engine, &[&kid], |_| {});
    let mut events = engine.subscribe();

    engine.claim_chore(&kid, &chore, at(16, 9)).unwrap();
    engine.approve_chore(&kid, &chore, Some(4.0), at(16, 10)).unwrap();

    let received: Vec<Event> = std::iter::from_fn(|| events.try_recv().ok()).collect();
    assert!(matches!(received[0], Event::ChoreClaimed { .. }));
    assert!(received.iter().any(|e| matches!(
        e,
        Event::PointsChanged { delta, .. } if *delta == 4.0
    )));
    assert!(engine.dirty_queue().contains(&kid));
    assert_eq!(
        engine.dirty_queue().deadline(),
        Some(at(16, 10) + Duration::seconds(5))
    );
}

#[test]
fn test_deleting_a_kid_scrubs_assignments() {
    let mut engine = engine();
    let ava = engine.add_kid(Kid::new("Ava")).unwrap();
    let ben = engine.add_kid(Kid::new("Ben")).unwrap();
    let chore = add_chore(&mut engine, &[&ava, &ben], |_| {});
    engine.claim_chore(&ava, &chore, at(16, 9)).unwrap();

    engine.delete_kid(&ava).unwrap();
    assert!(!engine.store().chore(&chore).unwrap().is_assigned(&ava));
    assert!(!engine.dirty_queue().contains(&ava));
    assert!(engine.claim_chore(&ava, &chore, at(16, 10)).is_err());
}
