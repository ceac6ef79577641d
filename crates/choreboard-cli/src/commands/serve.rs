use chrono::Utc;
use choreboard_core::{Engine, Ticker};
use serde_json::json;
use std::sync::Arc;
use tokio::sync::{broadcast, watch, Mutex};
use tracing::{info, warn};

use super::{print_json, CmdResult};

/// One pass of the background work, for cron-style use.
pub fn tick(evaluate: bool) -> CmdResult {
    let mut engine = Engine::open_default()?;
    let now = Utc::now();
    let evaluated_now = if evaluate { engine.evaluate_now(now)? } else { 0 };
    let report = engine.tick(now)?;
    print_json(&json!({
        "swept": report.swept,
        "evaluated": report.evaluated + evaluated_now,
        "pruned": report.pruned,
        "next_due": report.next_due,
    }))
}

/// Run the ticker until Ctrl-C, printing every event as one JSON line.
pub fn serve() -> CmdResult {
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async {
        let engine = Engine::open_default()?;
        let mut events = engine.subscribe();
        let wake = engine.wake_handle();
        let engine = Arc::new(Mutex::new(engine));
        let (stop_tx, stop_rx) = watch::channel(false);
        let ticker = Ticker::new(Arc::clone(&engine), wake, stop_rx).spawn();

        info!("serving, press Ctrl-C to stop");
        let ctrl_c = tokio::signal::ctrl_c();
        tokio::pin!(ctrl_c);
        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Ok(event) => println!("{}", serde_json::to_string(&event)?),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "event stream lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
                _ = &mut ctrl_c => break,
            }
        }

        // Receiver errors only mean the ticker already exited.
        let _ = stop_tx.send(true);
        ticker.await?;
        info!("stopped");
        Ok::<(), Box<dyn std::error::Error>>(())
    })
}
