use chrono::{NaiveDate, Utc};
use clap::{Subcommand, ValueEnum};
use choreboard_core::model::{
    Achievement, AchievementKind, AwardManifest, Badge, BadgeType, Challenge, ChallengeKind,
    TargetKind,
};
use choreboard_core::Engine;
use serde_json::json;

use super::chore::{chore_id, recurrence, FrequencyArg, UnitArg};
use super::kid::kid_id;
use super::{parse_when, print_json, resolve, CmdResult};

#[derive(Clone, Copy, ValueEnum)]
pub enum BadgeTypeArg {
    Cumulative,
    Periodic,
    Daily,
    SpecialOccasion,
}

impl From<BadgeTypeArg> for BadgeType {
    fn from(arg: BadgeTypeArg) -> Self {
        match arg {
            BadgeTypeArg::Cumulative => BadgeType::Cumulative,
            BadgeTypeArg::Periodic => BadgeType::Periodic,
            BadgeTypeArg::Daily => BadgeType::Daily,
            BadgeTypeArg::SpecialOccasion => BadgeType::SpecialOccasion,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
pub enum TargetArg {
    Points,
    ChoreCount,
    DaysCompleted,
    Streak,
}

impl From<TargetArg> for TargetKind {
    fn from(arg: TargetArg) -> Self {
        match arg {
            TargetArg::Points => TargetKind::Points,
            TargetArg::ChoreCount => TargetKind::ChoreCount,
            TargetArg::DaysCompleted => TargetKind::DaysCompleted,
            TargetArg::Streak => TargetKind::Streak,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
pub enum AchievementArg {
    ChoreStreak,
    ChoreTotal,
    DailyMinimum,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum ChallengeArg {
    TotalWithinWindow,
    DailyMinimum,
}

/// Assignment and award options shared by badges, achievements and challenges.
#[derive(clap::Args)]
pub struct AwardArgs {
    /// Assigned kid (id or name), repeatable
    #[arg(long = "kid")]
    kids: Vec<String>,
    /// Points granted on award
    #[arg(long, default_value_t = 0.0)]
    points: f64,
    /// Reward granted on award (id), repeatable
    #[arg(long = "reward")]
    rewards: Vec<String>,
    /// Bonus applied on award (id), repeatable
    #[arg(long = "bonus")]
    bonuses: Vec<String>,
}

impl AwardArgs {
    fn manifest(&self) -> AwardManifest {
        AwardManifest {
            points: self.points,
            rewards: self.rewards.clone(),
            bonuses: self.bonuses.clone(),
            ..Default::default()
        }
    }

    fn kid_ids(&self, engine: &Engine) -> Result<Vec<String>, Box<dyn std::error::Error>> {
        self.kids.iter().map(|k| kid_id(engine, k)).collect()
    }
}

#[derive(Subcommand)]
pub enum BadgeAction {
    /// Define a badge
    Add {
        name: String,
        #[arg(long = "type", value_enum)]
        badge_type: BadgeTypeArg,
        /// Lifetime points for cumulative tiers, target value otherwise
        #[arg(long)]
        threshold: f64,
        #[arg(long, value_enum, default_value = "points")]
        target: TargetArg,
        /// Tracked chore (id or name), repeatable; none tracks every chore
        #[arg(long = "chore")]
        chores: Vec<String>,
        /// Cycle or maintenance frequency
        #[arg(long, value_enum, default_value = "none")]
        frequency: FrequencyArg,
        #[arg(long)]
        interval: Option<u32>,
        #[arg(long, value_enum)]
        unit: Option<UnitArg>,
        #[arg(long, default_value_t = 0)]
        grace_days: u32,
        /// Cumulative tiers: points required per maintenance window
        #[arg(long, default_value_t = 0.0)]
        maintenance: f64,
        /// Cumulative tiers: points multiplier while current
        #[arg(long)]
        multiplier: Option<f64>,
        /// Penalty applied when a cycle is missed (id), repeatable
        #[arg(long = "penalty")]
        penalties: Vec<String>,
        /// Special occasions: the day the badge is in effect (YYYY-MM-DD)
        #[arg(long)]
        occasion: Option<NaiveDate>,
        #[command(flatten)]
        award: AwardArgs,
    },
    /// Define an achievement
    AddAchievement {
        name: String,
        #[arg(long, value_enum)]
        kind: AchievementArg,
        #[arg(long)]
        target: u32,
        /// Linked chore (id or name); omit to count every chore
        #[arg(long)]
        chore: Option<String>,
        #[command(flatten)]
        award: AwardArgs,
    },
    /// Define a time-boxed challenge
    AddChallenge {
        name: String,
        #[arg(long, value_enum)]
        kind: ChallengeArg,
        #[arg(long)]
        target: u32,
        #[arg(long)]
        start: String,
        #[arg(long)]
        end: String,
        #[arg(long)]
        chore: Option<String>,
        #[command(flatten)]
        award: AwardArgs,
    },
    /// List badges, achievements and challenges
    List,
    /// Award a badge by hand, to one kid or every assigned kid
    Award {
        badge: String,
        #[arg(long)]
        kid: Option<String>,
    },
    /// Remove awarded badges
    Remove {
        #[arg(long)]
        badge: Option<String>,
        #[arg(long)]
        kid: Option<String>,
    },
}

fn badge_id(engine: &Engine, key: &str) -> Result<String, Box<dyn std::error::Error>> {
    resolve(&engine.store().badges, "badge", key, |b| b.name.as_str())
}

pub fn run(action: BadgeAction) -> CmdResult {
    let mut engine = Engine::open_default()?;
    let now = Utc::now();
    match action {
        BadgeAction::Add {
            name,
            badge_type,
            threshold,
            target,
            chores,
            frequency,
            interval,
            unit,
            grace_days,
            maintenance,
            multiplier,
            penalties,
            occasion,
            award,
        } => {
            let mut badge = Badge::new(name, badge_type.into(), threshold);
            badge.target.kind = target.into();
            badge.target.maintenance_required = maintenance;
            badge.tracked_chores = chores
                .iter()
                .map(|c| chore_id(&engine, c))
                .collect::<Result<_, _>>()?;
            badge.reset_schedule.recurrence = recurrence(frequency, interval, unit)?;
            badge.reset_schedule.grace_days = grace_days;
            badge.occasion_date = occasion;
            badge.award = AwardManifest {
                multiplier,
                penalties,
                ..award.manifest()
            };
            badge.assigned_kids = award.kid_ids(&engine)?;
            let id = engine.add_badge(badge)?;
            println!("{id}");
        }
        BadgeAction::AddAchievement {
            name,
            kind,
            target,
            chore,
            award,
        } => {
            let kind = match kind {
                AchievementArg::ChoreStreak => AchievementKind::ChoreStreak,
                AchievementArg::ChoreTotal => AchievementKind::ChoreTotal,
                AchievementArg::DailyMinimum => AchievementKind::DailyMinimum,
            };
            let mut achievement = Achievement::new(name, kind, target);
            achievement.chore_id = chore.map(|c| chore_id(&engine, &c)).transpose()?;
            achievement.award = award.manifest();
            achievement.assigned_kids = award.kid_ids(&engine)?;
            let id = engine.add_achievement(achievement)?;
            println!("{id}");
        }
        BadgeAction::AddChallenge {
            name,
            kind,
            target,
            start,
            end,
            chore,
            award,
        } => {
            let kind = match kind {
                ChallengeArg::TotalWithinWindow => ChallengeKind::TotalWithinWindow,
                ChallengeArg::DailyMinimum => ChallengeKind::DailyMinimum,
            };
            let mut challenge =
                Challenge::new(name, kind, target, parse_when(&start)?, parse_when(&end)?);
            challenge.chore_id = chore.map(|c| chore_id(&engine, &c)).transpose()?;
            challenge.award = award.manifest();
            challenge.assigned_kids = award.kid_ids(&engine)?;
            let id = engine.add_challenge(challenge)?;
            println!("{id}");
        }
        BadgeAction::List => {
            let store = engine.store();
            print_json(&json!({
                "badges": store.badges.values().collect::<Vec<_>>(),
                "achievements": store.achievements.values().collect::<Vec<_>>(),
                "challenges": store.challenges.values().collect::<Vec<_>>(),
            }))?;
        }
        BadgeAction::Award { badge, kid } => {
            let badge = badge_id(&engine, &badge)?;
            let kid = kid.map(|k| kid_id(&engine, &k)).transpose()?;
            let awarded = engine.award_badge(kid.as_deref(), &badge, now)?;
            print_json(&awarded)?;
        }
        BadgeAction::Remove { badge, kid } => {
            let badge = badge.map(|b| badge_id(&engine, &b)).transpose()?;
            let kid = kid.map(|k| kid_id(&engine, &k)).transpose()?;
            let removed = engine.remove_awarded_badge(kid.as_deref(), badge.as_deref(), now)?;
            println!("removed {removed}");
        }
    }
    Ok(())
}
