//! Integration tests for persistence: the store document, the dirty queue
//! and the TOML config all survive a restart.

use chrono::{DateTime, TimeZone, Utc};
use choreboard_core::model::{Chore, ChoreState, Kid};
use choreboard_core::{Database, Engine, EngineConfig};

fn at(hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 10, 16, hour, minute, 0).unwrap()
}

fn slow_config() -> EngineConfig {
    let mut config = EngineConfig::default();
    config.scheduler.debounce_secs = 3600;
    config
}

#[test]
fn test_restart_resumes_store_and_dirty_queue() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("choreboard.db");

    let (kid, chore) = {
        let mut engine = Engine::open(Database::open_at(&path).unwrap(), slow_config()).unwrap();
        let kid = engine.add_kid(Kid::new("Ava")).unwrap();
        let mut chore = Chore::new("Dishes", 10.0);
        chore.assigned_kids.push(kid.clone());
        let chore = engine.add_chore(chore).unwrap();
        engine.claim_chore(&kid, &chore, at(9, 0)).unwrap();
        (kid, chore)
    };

    let mut engine = Engine::open(Database::open_at(&path).unwrap(), slow_config()).unwrap();
    let progress = engine.store().kid(&kid).unwrap().progress(&chore).unwrap();
    assert_eq!(progress.state, ChoreState::Claimed);
    assert_eq!(progress.pending_claim_count, 1);

    assert!(engine.dirty_queue().contains(&kid));
    assert_eq!(engine.tick(at(9, 30)).unwrap().evaluated, 0);
    assert_eq!(engine.tick(at(10, 1)).unwrap().evaluated, 1);
    assert!(engine.dirty_queue().is_empty());

    drop(engine);
    let engine = Engine::open(Database::open_at(&path).unwrap(), slow_config()).unwrap();
    assert!(engine.dirty_queue().is_empty());
}

#[test]
fn test_evaluate_now_ignores_debounce() {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::open_at(&dir.path().join("choreboard.db")).unwrap();
    let mut engine = Engine::open(db, slow_config()).unwrap();
    let kid = engine.add_kid(Kid::new("Ava")).unwrap();
    let mut chore = Chore::new("Dishes", 10.0);
    chore.assigned_kids.push(kid.clone());
    let chore = engine.add_chore(chore).unwrap();
    engine.approve_chore(&kid, &chore, None, at(9, 0)).unwrap();

    assert_eq!(engine.evaluate_now(at(9, 0)).unwrap(), 1);
    assert!(engine.dirty_queue().is_empty());
}

#[test]
fn test_config_file_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");

    let mut config = EngineConfig::load_from(&path).unwrap();
    assert_eq!(config, EngineConfig::default());
    assert!(path.exists());

    config.set("scheduler.sweep_interval_secs", "60").unwrap();
    config.set("points.label", "Stars").unwrap();
    config.save_to(&path).unwrap();

    let reloaded = EngineConfig::load_from(&path).unwrap();
    assert_eq!(reloaded.scheduler.sweep_interval_secs, 60);
    assert_eq!(reloaded.get("points.label").as_deref(), Some("Stars"));
    assert!(reloaded.clone().set("scheduler.nope", "1").is_err());
}

#[test]
fn test_corrupt_config_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "scheduler = 12").unwrap();
    assert!(EngineConfig::load_from(&path).is_err());
}
