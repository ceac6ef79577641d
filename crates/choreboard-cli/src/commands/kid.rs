use clap::Subcommand;
use choreboard_core::model::Kid;
use choreboard_core::Engine;
use serde_json::json;

use super::{print_json, resolve, CmdResult};

#[derive(Subcommand)]
pub enum KidAction {
    /// Add a kid
    Add {
        /// Display name
        name: String,
    },
    /// List kids with their balances
    List,
    /// Show everything tracked for a kid
    Show {
        /// Kid id or name
        kid: String,
    },
    /// Delete a kid and scrub them from every assignment
    Delete {
        /// Kid id or name
        kid: String,
    },
}

pub fn kid_id(engine: &Engine, key: &str) -> Result<String, Box<dyn std::error::Error>> {
    resolve(&engine.store().kids, "kid", key, |k| k.name.as_str())
}

pub fn run(action: KidAction) -> CmdResult {
    let mut engine = Engine::open_default()?;
    match action {
        KidAction::Add { name } => {
            let id = engine.add_kid(Kid::new(name))?;
            println!("{id}");
        }
        KidAction::List => {
            let rows: Vec<_> = engine
                .store()
                .kids
                .values()
                .map(|k| {
                    json!({
                        "id": k.id,
                        "name": k.name,
                        "points": k.points,
                        "multiplier": k.points_multiplier,
                        "badges": k.badges_earned.len(),
                        "dirty": engine.dirty_queue().contains(&k.id),
                    })
                })
                .collect();
            print_json(&rows)?;
        }
        KidAction::Show { kid } => {
            let id = kid_id(&engine, &kid)?;
            print_json(engine.store().kid(&id)?)?;
        }
        KidAction::Delete { kid } => {
            let id = kid_id(&engine, &kid)?;
            let removed = engine.delete_kid(&id)?;
            println!("deleted {}", removed.name);
        }
    }
    Ok(())
}
