use chrono::Utc;
use clap::{Subcommand, ValueEnum};
use choreboard_core::model::{
    ApprovalResetType, Chore, CompletionCriteria, OverdueHandling, PendingClaimAction,
};
use choreboard_core::{Engine, Frequency, IntervalUnit, Recurrence};
use serde_json::json;

use super::kid::kid_id;
use super::{parse_when, print_json, resolve, CmdResult};

#[derive(Clone, Copy, ValueEnum)]
pub enum CriteriaArg {
    Independent,
    Shared,
    SharedFirst,
}

impl From<CriteriaArg> for CompletionCriteria {
    fn from(arg: CriteriaArg) -> Self {
        match arg {
            CriteriaArg::Independent => CompletionCriteria::Independent,
            CriteriaArg::Shared => CompletionCriteria::Shared,
            CriteriaArg::SharedFirst => CompletionCriteria::SharedFirst,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
pub enum FrequencyArg {
    None,
    Daily,
    Weekly,
    Biweekly,
    Monthly,
    Custom,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum UnitArg {
    Days,
    Weeks,
    Months,
}

/// Build a recurrence from command-line parts.
pub fn recurrence(
    frequency: FrequencyArg,
    interval: Option<u32>,
    unit: Option<UnitArg>,
) -> Result<Recurrence, Box<dyn std::error::Error>> {
    Ok(match frequency {
        FrequencyArg::None => Recurrence::none(),
        FrequencyArg::Daily => Recurrence::daily(),
        FrequencyArg::Weekly => Recurrence::weekly(),
        FrequencyArg::Biweekly => Recurrence::of(Frequency::Biweekly),
        FrequencyArg::Monthly => Recurrence::monthly(),
        FrequencyArg::Custom => {
            let interval = interval.ok_or("--interval is required for custom frequency")?;
            let unit = match unit.ok_or("--unit is required for custom frequency")? {
                UnitArg::Days => IntervalUnit::Days,
                UnitArg::Weeks => IntervalUnit::Weeks,
                UnitArg::Months => IntervalUnit::Months,
            };
            Recurrence::custom(interval, unit)
        }
    })
}

#[derive(Clone, Copy, ValueEnum)]
pub enum ResetArg {
    AtMidnightOnce,
    AtMidnightMulti,
    AtDueDateOnce,
    AtDueDateMulti,
    UponCompletion,
}

impl From<ResetArg> for ApprovalResetType {
    fn from(arg: ResetArg) -> Self {
        match arg {
            ResetArg::AtMidnightOnce => ApprovalResetType::AtMidnightOnce,
            ResetArg::AtMidnightMulti => ApprovalResetType::AtMidnightMulti,
            ResetArg::AtDueDateOnce => ApprovalResetType::AtDueDateOnce,
            ResetArg::AtDueDateMulti => ApprovalResetType::AtDueDateMulti,
            ResetArg::UponCompletion => ApprovalResetType::UponCompletion,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
pub enum OverdueArg {
    Never,
    AtDueDate,
    AtDueDateThenReset,
}

impl From<OverdueArg> for OverdueHandling {
    fn from(arg: OverdueArg) -> Self {
        match arg {
            OverdueArg::Never => OverdueHandling::Never,
            OverdueArg::AtDueDate => OverdueHandling::AtDueDate,
            OverdueArg::AtDueDateThenReset => OverdueHandling::AtDueDateThenReset,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
pub enum PendingArg {
    Hold,
    Clear,
    AutoApprove,
}

impl From<PendingArg> for PendingClaimAction {
    fn from(arg: PendingArg) -> Self {
        match arg {
            PendingArg::Hold => PendingClaimAction::Hold,
            PendingArg::Clear => PendingClaimAction::Clear,
            PendingArg::AutoApprove => PendingClaimAction::AutoApprove,
        }
    }
}

#[derive(Subcommand)]
pub enum ChoreAction {
    /// Add a chore
    Add {
        name: String,
        /// Points credited on approval
        #[arg(long, default_value_t = 10.0)]
        points: f64,
        /// Assigned kid (id or name), repeatable
        #[arg(long = "kid")]
        kids: Vec<String>,
        #[arg(long, value_enum, default_value = "independent")]
        criteria: CriteriaArg,
        #[arg(long, value_enum, default_value = "none")]
        frequency: FrequencyArg,
        /// Custom frequency interval
        #[arg(long)]
        interval: Option<u32>,
        /// Custom frequency unit
        #[arg(long, value_enum)]
        unit: Option<UnitArg>,
        /// First due date (YYYY-MM-DD or RFC 3339)
        #[arg(long)]
        due: Option<String>,
        #[arg(long, value_enum, default_value = "at-midnight-once")]
        reset: ResetArg,
        #[arg(long, value_enum, default_value = "at-due-date")]
        overdue: OverdueArg,
        /// What automatic resets do with claims awaiting approval
        #[arg(long, value_enum, default_value = "clear")]
        pending_claims: PendingArg,
        /// Approve claims immediately
        #[arg(long)]
        auto_approve: bool,
    },
    /// List chores with their aggregate state
    List,
    /// Show per-kid status of a chore
    Status { chore: String },
    /// Assign an existing chore to a kid
    Assign { chore: String, kid: String },
    /// Claim a chore for a kid
    Claim { kid: String, chore: String },
    /// Approve a kid's claim
    Approve {
        kid: String,
        chore: String,
        /// Override the chore's default points
        #[arg(long)]
        points: Option<f64>,
    },
    /// Reject a kid's claim
    Disapprove { kid: String, chore: String },
    /// Set or clear a due date
    SetDue {
        chore: String,
        /// Only this kid (independent chores)
        #[arg(long)]
        kid: Option<String>,
        /// New due date; omit to clear it
        #[arg(long)]
        due: Option<String>,
    },
    /// Skip to the next due date without crediting anything
    Skip {
        chore: String,
        #[arg(long)]
        kid: Option<String>,
    },
    /// Return overdue kids to pending
    ResetOverdue {
        chore: String,
        #[arg(long)]
        kid: Option<String>,
    },
    /// Delete a chore
    Delete { chore: String },
}

pub fn chore_id(engine: &Engine, key: &str) -> Result<String, Box<dyn std::error::Error>> {
    resolve(&engine.store().chores, "chore", key, |c| c.name.as_str())
}

fn optional_kid(
    engine: &Engine,
    kid: Option<&str>,
) -> Result<Option<String>, Box<dyn std::error::Error>> {
    kid.map(|k| kid_id(engine, k)).transpose()
}

pub fn run(action: ChoreAction) -> CmdResult {
    let mut engine = Engine::open_default()?;
    let now = Utc::now();
    match action {
        ChoreAction::Add {
            name,
            points,
            kids,
            criteria,
            frequency,
            interval,
            unit,
            due,
            reset,
            overdue,
            pending_claims,
            auto_approve,
        } => {
            let mut chore = Chore::new(name, points);
            chore.assigned_kids = kids
                .iter()
                .map(|k| kid_id(&engine, k))
                .collect::<Result<_, _>>()?;
            chore.completion_criteria = criteria.into();
            chore.recurrence = recurrence(frequency, interval, unit)?;
            chore.due_date = due.as_deref().map(parse_when).transpose()?;
            chore.approval_reset = reset.into();
            chore.overdue_handling = overdue.into();
            chore.pending_claim_action = pending_claims.into();
            chore.auto_approve = auto_approve;
            let id = engine.add_chore(chore)?;
            println!("{id}");
        }
        ChoreAction::List => {
            let rows = engine
                .store()
                .chores
                .keys()
                .map(|id| {
                    let status = engine.chore_status(id)?;
                    Ok(json!({
                        "id": status.chore_id,
                        "name": status.name,
                        "state": status.aggregate,
                        "kids": status.kids.len(),
                    }))
                })
                .collect::<Result<Vec<_>, choreboard_core::CoreError>>()?;
            print_json(&rows)?;
        }
        ChoreAction::Status { chore } => {
            let id = chore_id(&engine, &chore)?;
            print_json(&engine.chore_status(&id)?)?;
        }
        ChoreAction::Assign { chore, kid } => {
            let chore = chore_id(&engine, &chore)?;
            let kid = kid_id(&engine, &kid)?;
            engine.assign_chore(&chore, &kid)?;
            println!("ok");
        }
        ChoreAction::Claim { kid, chore } => {
            let kid = kid_id(&engine, &kid)?;
            let chore = chore_id(&engine, &chore)?;
            engine.claim_chore(&kid, &chore, now)?;
            println!("claimed");
        }
        ChoreAction::Approve { kid, chore, points } => {
            let kid = kid_id(&engine, &kid)?;
            let chore = chore_id(&engine, &chore)?;
            let credited = engine.approve_chore(&kid, &chore, points, now)?;
            println!("approved (+{credited})");
        }
        ChoreAction::Disapprove { kid, chore } => {
            let kid = kid_id(&engine, &kid)?;
            let chore = chore_id(&engine, &chore)?;
            engine.disapprove_chore(&kid, &chore, now)?;
            println!("disapproved");
        }
        ChoreAction::SetDue { chore, kid, due } => {
            let chore = chore_id(&engine, &chore)?;
            let kid = optional_kid(&engine, kid.as_deref())?;
            let due = due.as_deref().map(parse_when).transpose()?;
            engine.set_due_date(&chore, kid.as_deref(), due, now)?;
            println!("ok");
        }
        ChoreAction::Skip { chore, kid } => {
            let chore = chore_id(&engine, &chore)?;
            let kid = optional_kid(&engine, kid.as_deref())?;
            engine.skip_due_date(&chore, kid.as_deref(), now)?;
            println!("ok");
        }
        ChoreAction::ResetOverdue { chore, kid } => {
            let chore = chore_id(&engine, &chore)?;
            let kid = optional_kid(&engine, kid.as_deref())?;
            engine.reset_overdue(&chore, kid.as_deref(), now)?;
            println!("ok");
        }
        ChoreAction::Delete { chore } => {
            let id = chore_id(&engine, &chore)?;
            let removed = engine.delete_chore(&id)?;
            println!("deleted {}", removed.name);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn custom_frequency_needs_interval_and_unit() {
        assert!(recurrence(FrequencyArg::Custom, None, Some(UnitArg::Days)).is_err());
        assert!(recurrence(FrequencyArg::Custom, Some(3), None).is_err());
        let r = recurrence(FrequencyArg::Custom, Some(3), Some(UnitArg::Weeks)).unwrap();
        assert_eq!(r, Recurrence::custom(3, IntervalUnit::Weeks));
        assert_eq!(
            recurrence(FrequencyArg::Biweekly, None, None).unwrap().frequency,
            Frequency::Biweekly
        );
    }
}
