use chrono::Utc;
use clap::{Subcommand, ValueEnum};
use choreboard_core::stats::{Period, PeriodicStats};
use choreboard_core::Engine;
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;

use super::chore::chore_id;
use super::kid::kid_id;
use super::{print_json, CmdResult};

#[derive(Clone, Copy, ValueEnum)]
pub enum PeriodArg {
    Today,
    Week,
    Month,
    Year,
    All,
}

impl PeriodArg {
    fn period(self) -> Option<Period> {
        match self {
            PeriodArg::Today => Some(Period::Daily),
            PeriodArg::Week => Some(Period::Weekly),
            PeriodArg::Month => Some(Period::Monthly),
            PeriodArg::Year => Some(Period::Yearly),
            PeriodArg::All => None,
        }
    }
}

#[derive(Subcommand)]
pub enum StatsAction {
    /// Point ledger of a kid
    Points {
        kid: String,
        #[arg(long, value_enum, default_value = "all")]
        period: PeriodArg,
    },
    /// Chore completion counters of a kid
    Chores {
        kid: String,
        /// Only this chore
        #[arg(long)]
        chore: Option<String>,
        #[arg(long, value_enum, default_value = "all")]
        period: PeriodArg,
    },
    /// Badge earn counters of a kid
    Badges { kid: String },
}

/// The current bucket for `period`, or the all-time bucket.
fn bucket<C>(stats: &PeriodicStats<C>, period: PeriodArg) -> Value
where
    C: Default + Serialize,
{
    let now = Utc::now();
    let value = match period.period() {
        Some(p) => stats.get(p, now).map(serde_json::to_value),
        None => Some(serde_json::to_value(stats.all_time())),
    };
    match value {
        Some(Ok(v)) => v,
        Some(Err(_)) | None => serde_json::to_value(C::default()).unwrap_or(Value::Null),
    }
}

pub fn run(action: StatsAction) -> CmdResult {
    let engine = Engine::open_default()?;
    match action {
        StatsAction::Points { kid, period } => {
            let kid = engine.store().kid(&kid_id(&engine, &kid)?)?;
            print_json(&json!({
                "kid": kid.name,
                "balance": kid.points,
                "multiplier": kid.points_multiplier,
                "points": bucket(&kid.point_stats, period),
            }))?;
        }
        StatsAction::Chores { kid, chore, period } => {
            let only = chore.map(|c| chore_id(&engine, &c)).transpose()?;
            let kid = engine.store().kid(&kid_id(&engine, &kid)?)?;
            let rows: BTreeMap<&str, Value> = kid
                .chore_progress
                .iter()
                .filter(|(id, _)| only.as_deref().map_or(true, |o| o == id.as_str()))
                .map(|(id, progress)| {
                    let name = engine
                        .store()
                        .chores
                        .get(id)
                        .map_or(id.as_str(), |c| c.name.as_str());
                    (
                        name,
                        json!({
                            "state": progress.state,
                            "streak": progress.current_streak,
                            "counters": bucket(&progress.stats, period),
                        }),
                    )
                })
                .collect();
            print_json(&rows)?;
        }
        StatsAction::Badges { kid } => {
            let kid = engine.store().kid(&kid_id(&engine, &kid)?)?;
            let rows: BTreeMap<&str, Value> = kid
                .badges_earned
                .iter()
                .map(|(id, record)| {
                    let name = engine
                        .store()
                        .badges
                        .get(id)
                        .map_or(id.as_str(), |b| b.name.as_str());
                    (
                        name,
                        json!({
                            "last_awarded": record.last_awarded,
                            "earned": record.stats.all_time().earned,
                        }),
                    )
                })
                .collect();
            print_json(&rows)?;
        }
    }
    Ok(())
}
