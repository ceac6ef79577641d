pub mod badge;
pub mod chore;
pub mod config;
pub mod kid;
pub mod reward;
pub mod serve;
pub mod stats;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::error::Error;

pub type CmdResult = Result<(), Box<dyn Error>>;

pub fn print_json<T: Serialize>(value: &T) -> CmdResult {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Resolve an id or a unique name to an id.
pub fn resolve<T>(
    map: &BTreeMap<String, T>,
    what: &str,
    key: &str,
    name_of: impl Fn(&T) -> &str,
) -> Result<String, Box<dyn Error>> {
    if map.contains_key(key) {
        return Ok(key.to_string());
    }
    let mut hits = map
        .iter()
        .filter(|(_, v)| name_of(v) == key)
        .map(|(id, _)| id);
    match (hits.next(), hits.next()) {
        (Some(id), None) => Ok(id.clone()),
        (Some(_), Some(_)) => Err(format!("{what} name is ambiguous, use the id: {key}").into()),
        _ => Err(format!("{what} not found: {key}").into()),
    }
}

/// Parse RFC 3339, or a bare date meaning the end of that day in UTC.
pub fn parse_when(text: &str) -> Result<DateTime<Utc>, Box<dyn Error>> {
    if let Ok(at) = DateTime::parse_from_rfc3339(text) {
        return Ok(at.with_timezone(&Utc));
    }
    let date = NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .map_err(|_| format!("invalid date: {text} (expected YYYY-MM-DD or RFC 3339)"))?;
    date.and_hms_opt(23, 59, 59)
        .map(|at| at.and_utc())
        .ok_or_else(|| format!("invalid date: {text}").into())
}
