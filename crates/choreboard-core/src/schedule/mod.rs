//! Recurrence and calendar arithmetic.
//!
//! Everything here is pure: no stored state, every function takes the
//! reference time it should reason about. All calendar math is done in UTC.

use chrono::{DateTime, Datelike, Duration, Months, NaiveDate, NaiveTime, TimeZone, Utc, Weekday};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// How often a chore or badge cycle repeats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Frequency {
    /// One-off, never rescheduled
    #[default]
    None,
    Daily,
    Weekly,
    Biweekly,
    Monthly,
    /// Every `interval` units, see [`Recurrence::interval`]
    Custom,
}

/// Unit for custom recurrence intervals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntervalUnit {
    Days,
    Weeks,
    Months,
}

/// Frequency plus the optional custom interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Recurrence {
    pub frequency: Frequency,
    #[serde(default)]
    pub interval: Option<u32>,
    #[serde(default)]
    pub unit: Option<IntervalUnit>,
}

/// A single calendar step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Days(i64),
    Months(u32),
}

impl Recurrence {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn of(frequency: Frequency) -> Self {
        Self {
            frequency,
            interval: None,
            unit: None,
        }
    }

    pub fn daily() -> Self {
        Self::of(Frequency::Daily)
    }

    pub fn weekly() -> Self {
        Self::of(Frequency::Weekly)
    }

    pub fn monthly() -> Self {
        Self::of(Frequency::Monthly)
    }

    pub fn custom(interval: u32, unit: IntervalUnit) -> Self {
        Self {
            frequency: Frequency::Custom,
            interval: Some(interval),
            unit: Some(unit),
        }
    }

    pub fn is_recurring(&self) -> bool {
        self.frequency != Frequency::None
    }

    fn step(&self) -> Option<Step> {
        match self.frequency {
            Frequency::None => None,
            Frequency::Daily => Some(Step::Days(1)),
            Frequency::Weekly => Some(Step::Days(7)),
            Frequency::Biweekly => Some(Step::Days(14)),
            Frequency::Monthly => Some(Step::Months(1)),
            Frequency::Custom => {
                let interval = self.interval.filter(|n| *n > 0)?;
                match self.unit? {
                    IntervalUnit::Days => Some(Step::Days(interval as i64)),
                    IntervalUnit::Weeks => Some(Step::Days(interval as i64 * 7)),
                    IntervalUnit::Months => Some(Step::Months(interval)),
                }
            }
        }
    }

    /// Approximate length of one period in days.
    ///
    /// Months count as 31 days so that a streak across a short month is not
    /// broken by the approximation.
    pub fn period_days(&self) -> Option<i64> {
        match self.step()? {
            Step::Days(n) => Some(n),
            Step::Months(m) => Some(m as i64 * 31),
        }
    }
}

fn advance(base: DateTime<Utc>, step: Step, times: u32) -> Option<DateTime<Utc>> {
    match step {
        Step::Days(n) => base.checked_add_signed(Duration::days(n.checked_mul(times as i64)?)),
        Step::Months(m) => base.checked_add_months(Months::new(m.checked_mul(times)?)),
    }
}

/// Next occurrence of `recurrence` after `base` that is strictly later than
/// `reference_now`.
///
/// Monthly steps are always taken from `base`, so the anchor day survives
/// clamping (Jan 31 -> Feb 28 -> Mar 31). Returns `None` for non-recurring or
/// malformed recurrences.
pub fn next_occurrence(
    base: DateTime<Utc>,
    recurrence: &Recurrence,
    reference_now: DateTime<Utc>,
) -> Option<DateTime<Utc>> {
    let step = recurrence.step()?;

    // Jump close to `reference_now` first so a stale base after long downtime
    // does not walk one period at a time.
    let mut times: u32 = match step {
        Step::Days(n) if reference_now > base => {
            let gap = (reference_now - base).num_days();
            u32::try_from(gap / n).unwrap_or(u32::MAX).max(1)
        }
        Step::Months(m) if reference_now > base => {
            let gap = (reference_now.year() - base.year()) * 12 + reference_now.month() as i32
                - base.month() as i32;
            (gap.max(0) as u32 / m).max(1)
        }
        _ => 1,
    };

    loop {
        let candidate = advance(base, step, times)?;
        if candidate > reference_now {
            return Some(candidate);
        }
        times = times.checked_add(1)?;
    }
}

/// Move `datetime` forward (keeping the time of day) to the first day whose
/// weekday is in `allowed`. No-op when `allowed` is empty.
pub fn snap_to_applicable_weekday(datetime: DateTime<Utc>, allowed: &[Weekday]) -> DateTime<Utc> {
    if allowed.is_empty() {
        return datetime;
    }
    (0..7)
        .map(|offset| datetime + Duration::days(offset))
        .find(|candidate| allowed.contains(&candidate.weekday()))
        .unwrap_or(datetime)
}

/// Next due date for a recurring item: next occurrence, then weekday snapping.
pub fn next_due(
    base: DateTime<Utc>,
    recurrence: &Recurrence,
    applicable_days: &[Weekday],
    reference_now: DateTime<Utc>,
) -> Option<DateTime<Utc>> {
    next_occurrence(base, recurrence, reference_now)
        .map(|next| snap_to_applicable_weekday(next, applicable_days))
}

/// Midnight at the start of `date`.
pub fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_time(NaiveTime::default()))
}

/// First midnight strictly after `after`.
pub fn next_midnight(after: DateTime<Utc>) -> DateTime<Utc> {
    start_of_day(after.date_naive() + Duration::days(1))
}

fn next_monday(after: DateTime<Utc>) -> DateTime<Utc> {
    let days = 7 - after.weekday().num_days_from_monday() as i64;
    start_of_day(after.date_naive() + Duration::days(days))
}

fn next_month_start(after: DateTime<Utc>) -> DateTime<Utc> {
    let (year, month) = if after.month() == 12 {
        (after.year() + 1, 1)
    } else {
        (after.year(), after.month() + 1)
    };
    NaiveDate::from_ymd_opt(year, month, 1)
        .map(start_of_day)
        .unwrap_or_else(|| next_midnight(after))
}

/// Next calendar boundary (new day, ISO week, or month) for a recurrence
/// with no due date. `None` for non-recurring items.
pub fn next_period_boundary(recurrence: &Recurrence, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let boundary = match recurrence.frequency {
        Frequency::None => return None,
        Frequency::Daily => next_midnight(after),
        Frequency::Weekly | Frequency::Biweekly => next_monday(after),
        Frequency::Monthly => next_month_start(after),
        Frequency::Custom => match recurrence.unit {
            Some(IntervalUnit::Weeks) => next_monday(after),
            Some(IntervalUnit::Months) => next_month_start(after),
            Some(IntervalUnit::Days) | None => next_midnight(after),
        },
    };
    Some(boundary)
}

/// Check a recurrence against the presence of a due date.
///
/// Daily and weekly items may float without a due date; every other
/// recurring frequency needs one to anchor its steps.
pub fn validate(recurrence: &Recurrence, has_due_date: bool, owner: &str) -> Result<()> {
    let invalid = |message: &str| CoreError::InvalidFrequency {
        chore: owner.to_string(),
        message: message.to_string(),
    };

    if recurrence.frequency == Frequency::Custom {
        if recurrence.interval.unwrap_or(0) == 0 {
            return Err(invalid("custom frequency needs a positive interval"));
        }
        if recurrence.unit.is_none() {
            return Err(invalid("custom frequency needs an interval unit"));
        }
    }

    match recurrence.frequency {
        Frequency::None | Frequency::Daily | Frequency::Weekly => Ok(()),
        _ if has_due_date => Ok(()),
        _ => Err(invalid("this frequency requires a due date")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    #[test]
    fn daily_advances_one_day() {
        let base = at(2026, 3, 10, 18);
        let next = next_occurrence(base, &Recurrence::daily(), base).unwrap();
        assert_eq!(next, at(2026, 3, 11, 18));
    }

    #[test]
    fn stale_base_catches_up_past_now() {
        let base = at(2026, 1, 1, 9);
        let now = at(2026, 3, 15, 12);
        let next = next_occurrence(base, &Recurrence::weekly(), now).unwrap();
        assert!(next > now);
        assert!(next - now <= Duration::days(7));
        assert_eq!(next.weekday(), base.weekday());
    }

    #[test]
    fn monthly_clamps_and_keeps_anchor_day() {
        let base = at(2026, 1, 31, 8);
        let feb = next_occurrence(base, &Recurrence::monthly(), base).unwrap();
        assert_eq!(feb, at(2026, 2, 28, 8));

        let mar = next_occurrence(base, &Recurrence::monthly(), feb).unwrap();
        assert_eq!(mar, at(2026, 3, 31, 8));
    }

    #[test]
    fn custom_interval_in_weeks() {
        let base = at(2026, 5, 4, 7);
        let rec = Recurrence::custom(3, IntervalUnit::Weeks);
        let next = next_occurrence(base, &rec, base).unwrap();
        assert_eq!(next, at(2026, 5, 25, 7));
    }

    #[test]
    fn custom_interval_in_months() {
        let base = at(2026, 8, 31, 7);
        let rec = Recurrence::custom(2, IntervalUnit::Months);
        let next = next_occurrence(base, &rec, base).unwrap();
        assert_eq!(next, at(2026, 10, 31, 7));
    }

    #[test]
    fn non_recurring_never_reschedules() {
        let base = at(2026, 5, 4, 7);
        assert!(next_occurrence(base, &Recurrence::none(), base).is_none());
        let broken = Recurrence {
            frequency: Frequency::Custom,
            interval: None,
            unit: Some(IntervalUnit::Days),
        };
        assert!(next_occurrence(base, &broken, base).is_none());
    }

    #[test]
    fn snap_moves_forward_and_keeps_time() {
        // 2026-10-16 is a Friday
        let friday = at(2026, 10, 16, 17);
        let snapped = snap_to_applicable_weekday(friday, &[Weekday::Mon, Weekday::Wed]);
        assert_eq!(snapped, at(2026, 10, 19, 17));
        assert_eq!(snap_to_applicable_weekday(friday, &[]), friday);
        assert_eq!(snap_to_applicable_weekday(friday, &[Weekday::Fri]), friday);
    }

    #[test]
    fn period_boundaries() {
        let friday = at(2026, 10, 16, 17);
        assert_eq!(next_midnight(friday), at(2026, 10, 17, 0));
        assert_eq!(
            next_period_boundary(&Recurrence::weekly(), friday),
            Some(at(2026, 10, 19, 0))
        );
        assert_eq!(
            next_period_boundary(&Recurrence::monthly(), at(2026, 12, 5, 3)),
            Some(at(2027, 1, 1, 0))
        );
        assert_eq!(next_period_boundary(&Recurrence::none(), friday), None);
    }

    #[test]
    fn validate_requires_due_date_for_anchored_frequencies() {
        assert!(validate(&Recurrence::daily(), false, "c").is_ok());
        assert!(validate(&Recurrence::weekly(), false, "c").is_ok());
        assert!(validate(&Recurrence::none(), false, "c").is_ok());
        assert!(matches!(
            validate(&Recurrence::monthly(), false, "c"),
            Err(CoreError::InvalidFrequency { .. })
        ));
        assert!(validate(&Recurrence::monthly(), true, "c").is_ok());
        let zero = Recurrence {
            frequency: Frequency::Custom,
            interval: Some(0),
            unit: Some(IntervalUnit::Days),
        };
        assert!(validate(&zero, true, "c").is_err());
    }
}
