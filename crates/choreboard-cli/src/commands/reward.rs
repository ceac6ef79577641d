use chrono::Utc;
use clap::{Subcommand, ValueEnum};
use choreboard_core::model::{Bonus, Penalty, Reward};
use choreboard_core::Engine;
use serde_json::json;

use super::kid::kid_id;
use super::{print_json, resolve, CmdResult};

#[derive(Clone, Copy, ValueEnum)]
pub enum Ledger {
    Rewards,
    Bonuses,
    Penalties,
}

#[derive(Subcommand)]
pub enum RewardAction {
    /// Define a reward
    Add { name: String, cost: f64 },
    /// Define a bonus
    AddBonus { name: String, points: f64 },
    /// Define a penalty (points are deducted when applied)
    AddPenalty { name: String, points: f64 },
    /// List rewards, bonuses and penalties
    List,
    /// A kid asks for a reward
    Redeem { kid: String, reward: String },
    /// Approve a pending redemption and deduct its cost
    Approve { kid: String, reward: String },
    /// Reject a pending redemption
    Disapprove { kid: String, reward: String },
    /// Withdraw a pending redemption without counting it
    Undo { kid: String, reward: String },
    /// Apply a bonus to a kid
    Bonus { kid: String, bonus: String },
    /// Apply a penalty to a kid
    Penalty { kid: String, penalty: String },
    /// Clear tracking counters
    Reset {
        #[arg(value_enum)]
        ledger: Ledger,
        #[arg(long)]
        kid: Option<String>,
        /// Reward, bonus or penalty id
        #[arg(long)]
        item: Option<String>,
    },
}

pub fn run(action: RewardAction) -> CmdResult {
    let mut engine = Engine::open_default()?;
    let now = Utc::now();
    match action {
        RewardAction::Add { name, cost } => {
            let id = engine.add_reward(Reward::new(name, cost))?;
            println!("{id}");
        }
        RewardAction::AddBonus { name, points } => {
            let id = engine.add_bonus(Bonus::new(name, points))?;
            println!("{id}");
        }
        RewardAction::AddPenalty { name, points } => {
            let id = engine.add_penalty(Penalty::new(name, points))?;
            println!("{id}");
        }
        RewardAction::List => {
            let store = engine.store();
            print_json(&json!({
                "rewards": store.rewards.values().collect::<Vec<_>>(),
                "bonuses": store.bonuses.values().collect::<Vec<_>>(),
                "penalties": store.penalties.values().collect::<Vec<_>>(),
            }))?;
        }
        RewardAction::Redeem { kid, reward } => {
            let kid = kid_id(&engine, &kid)?;
            let reward = reward_id(&engine, &reward)?;
            engine.redeem_reward(&kid, &reward, now)?;
            println!("pending approval");
        }
        RewardAction::Approve { kid, reward } => {
            let kid = kid_id(&engine, &kid)?;
            let reward = reward_id(&engine, &reward)?;
            let balance = engine.approve_reward(&kid, &reward, now)?;
            println!("approved (balance {balance})");
        }
        RewardAction::Disapprove { kid, reward } => {
            let kid = kid_id(&engine, &kid)?;
            let reward = reward_id(&engine, &reward)?;
            engine.disapprove_reward(&kid, &reward, now)?;
            println!("disapproved");
        }
        RewardAction::Undo { kid, reward } => {
            let kid = kid_id(&engine, &kid)?;
            let reward = reward_id(&engine, &reward)?;
            engine.undo_reward_claim(&kid, &reward, now)?;
            println!("ok");
        }
        RewardAction::Bonus { kid, bonus } => {
            let kid = kid_id(&engine, &kid)?;
            let bonus = resolve(&engine.store().bonuses, "bonus", &bonus, |b| b.name.as_str())?;
            let balance = engine.apply_bonus(&kid, &bonus, now)?;
            println!("balance {balance}");
        }
        RewardAction::Penalty { kid, penalty } => {
            let kid = kid_id(&engine, &kid)?;
            let penalty =
                resolve(&engine.store().penalties, "penalty", &penalty, |p| p.name.as_str())?;
            let balance = engine.apply_penalty(&kid, &penalty, now)?;
            println!("balance {balance}");
        }
        RewardAction::Reset { ledger, kid, item } => {
            let kid = kid.map(|k| kid_id(&engine, &k)).transpose()?;
            match ledger {
                Ledger::Rewards => engine.reset_rewards(kid.as_deref(), item.as_deref())?,
                Ledger::Bonuses => engine.reset_bonuses(kid.as_deref(), item.as_deref())?,
                Ledger::Penalties => engine.reset_penalties(kid.as_deref(), item.as_deref())?,
            }
            println!("ok");
        }
    }
    Ok(())
}

fn reward_id(engine: &Engine, key: &str) -> Result<String, Box<dyn std::error::Error>> {
    resolve(&engine.store().rewards, "reward", key, |r| r.name.as_str())
}
