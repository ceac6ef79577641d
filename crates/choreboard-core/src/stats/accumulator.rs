//! Generic periodic-bucket accumulator.
//!
//! Every recorded event lands in four rolling buckets (day, ISO week, month,
//! year) and in one permanent all-time bucket. The all-time bucket is updated
//! incrementally and is never rebuilt from the rolling buckets, so pruning
//! old history cannot change lifetime totals.

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Rolling bucket granularity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Period {
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl Period {
    pub const ALL: [Period; 4] = [Period::Daily, Period::Weekly, Period::Monthly, Period::Yearly];

    /// Bucket key for a calendar date.
    ///
    /// Keys are zero-padded so lexicographic order matches chronological order.
    pub fn key_for_date(self, date: NaiveDate) -> String {
        match self {
            Period::Daily => date.format("%Y-%m-%d").to_string(),
            Period::Weekly => {
                let week = date.iso_week();
                format!("{:04}-W{:02}", week.year(), week.week())
            }
            Period::Monthly => format!("{:04}-{:02}", date.year(), date.month()),
            Period::Yearly => format!("{:04}", date.year()),
        }
    }

    pub fn key(self, at: DateTime<Utc>) -> String {
        self.key_for_date(at.date_naive())
    }
}

/// How long rolling buckets are kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Retention {
    #[serde(default = "default_daily_days")]
    pub daily_days: u32,
    #[serde(default = "default_weekly_weeks")]
    pub weekly_weeks: u32,
    #[serde(default = "default_monthly_months")]
    pub monthly_months: u32,
    #[serde(default = "default_yearly_years")]
    pub yearly_years: u32,
}

fn default_daily_days() -> u32 {
    7
}
fn default_weekly_weeks() -> u32 {
    5
}
fn default_monthly_months() -> u32 {
    3
}
fn default_yearly_years() -> u32 {
    3
}

impl Default for Retention {
    fn default() -> Self {
        Self {
            daily_days: default_daily_days(),
            weekly_weeks: default_weekly_weeks(),
            monthly_months: default_monthly_months(),
            yearly_years: default_yearly_years(),
        }
    }
}

impl Retention {
    /// Oldest key (inclusive) that survives pruning for `period`.
    fn cutoff_key(&self, period: Period, now: DateTime<Utc>) -> String {
        let today = now.date_naive();
        match period {
            Period::Daily => {
                Period::Daily.key_for_date(today - Duration::days(self.daily_days as i64))
            }
            Period::Weekly => Period::Weekly
                .key_for_date(today - Duration::weeks(self.weekly_weeks as i64)),
            Period::Monthly => {
                let index = today.year() * 12 + today.month0() as i32 - self.monthly_months as i32;
                format!("{:04}-{:02}", index.div_euclid(12), index.rem_euclid(12) + 1)
            }
            Period::Yearly => format!("{:04}", today.year() - self.yearly_years as i32),
        }
    }
}

/// Rolling and all-time buckets of one counter record type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound(
    serialize = "C: Serialize",
    deserialize = "C: Deserialize<'de> + Default"
))]
pub struct PeriodicStats<C> {
    #[serde(default)]
    pub daily: BTreeMap<String, C>,
    #[serde(default)]
    pub weekly: BTreeMap<String, C>,
    #[serde(default)]
    pub monthly: BTreeMap<String, C>,
    #[serde(default)]
    pub yearly: BTreeMap<String, C>,
    #[serde(default)]
    pub all_time: C,
}

impl<C: Default> Default for PeriodicStats<C> {
    fn default() -> Self {
        Self {
            daily: BTreeMap::new(),
            weekly: BTreeMap::new(),
            monthly: BTreeMap::new(),
            yearly: BTreeMap::new(),
            all_time: C::default(),
        }
    }
}

impl<C: Default> PeriodicStats<C> {
    pub fn new() -> Self {
        Self::default()
    }

    fn buckets(&self, period: Period) -> &BTreeMap<String, C> {
        match period {
            Period::Daily => &self.daily,
            Period::Weekly => &self.weekly,
            Period::Monthly => &self.monthly,
            Period::Yearly => &self.yearly,
        }
    }

    fn buckets_mut(&mut self, period: Period) -> &mut BTreeMap<String, C> {
        match period {
            Period::Daily => &mut self.daily,
            Period::Weekly => &mut self.weekly,
            Period::Monthly => &mut self.monthly,
            Period::Yearly => &mut self.yearly,
        }
    }

    /// Apply `update` to every bucket `at` falls into, all-time included.
    pub fn record<F>(&mut self, at: DateTime<Utc>, mut update: F)
    where
        F: FnMut(&mut C),
    {
        for period in Period::ALL {
            let key = period.key(at);
            update(self.buckets_mut(period).entry(key).or_default());
        }
        update(&mut self.all_time);
    }

    pub fn get(&self, period: Period, at: DateTime<Utc>) -> Option<&C> {
        self.buckets(period).get(&period.key(at))
    }

    /// Daily bucket for a calendar date.
    pub fn on_date(&self, date: NaiveDate) -> Option<&C> {
        self.daily.get(&Period::Daily.key_for_date(date))
    }

    pub fn all_time(&self) -> &C {
        &self.all_time
    }

    /// Drop rolling entries older than the retention window.
    ///
    /// Returns how many entries were removed.
    pub fn prune(&mut self, now: DateTime<Utc>, retention: &Retention) -> usize {
        let mut removed = 0;
        for period in Period::ALL {
            let cutoff = retention.cutoff_key(period, now);
            let buckets = self.buckets_mut(period);
            let before = buckets.len();
            buckets.retain(|key, _| key.as_str() >= cutoff.as_str());
            removed += before - buckets.len();
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    struct Tally {
        count: u32,
    }

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap()
    }

    #[test]
    fn record_fills_every_granularity() {
        let mut stats: PeriodicStats<Tally> = PeriodicStats::new();
        stats.record(at(2026, 10, 16), |t| t.count += 1);
        stats.record(at(2026, 10, 16), |t| t.count += 1);

        assert_eq!(stats.daily["2026-10-16"].count, 2);
        assert_eq!(stats.weekly["2026-W42"].count, 2);
        assert_eq!(stats.monthly["2026-10"].count, 2);
        assert_eq!(stats.yearly["2026"].count, 2);
        assert_eq!(stats.all_time().count, 2);
    }

    #[test]
    fn iso_week_key_uses_iso_year() {
        let date = NaiveDate::from_ymd_opt(2027, 1, 1).unwrap();
        assert_eq!(Period::Weekly.key_for_date(date), "2026-W53");
    }

    #[test]
    fn prune_keeps_all_time_and_in_window_entries() {
        let mut stats: PeriodicStats<Tally> = PeriodicStats::new();
        for day in 1..=30 {
            stats.record(at(2026, 9, day), |t| t.count += 1);
        }
        let now = at(2026, 9, 30);
        let removed = stats.prune(now, &Retention::default());

        assert!(removed > 0);
        assert_eq!(stats.all_time().count, 30);
        assert!(stats.daily.contains_key("2026-09-30"));
        assert!(stats.daily.contains_key("2026-09-23"));
        assert!(!stats.daily.contains_key("2026-09-22"));
        assert!(stats.monthly.contains_key("2026-09"));
        assert!(stats.yearly.contains_key("2026"));
    }

    #[test]
    fn monthly_cutoff_wraps_year() {
        let retention = Retention {
            monthly_months: 3,
            ..Default::default()
        };
        assert_eq!(retention.cutoff_key(Period::Monthly, at(2026, 2, 10)), "2025-11");
    }

    #[test]
    fn missing_all_time_deserializes_to_default() {
        let stats: PeriodicStats<Tally> = serde_json::from_str("{}").unwrap();
        assert_eq!(stats.all_time().count, 0);
        assert!(stats.daily.is_empty());
    }
}
