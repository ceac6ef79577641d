//! TOML-based engine configuration.
//!
//! Holds the tunables of the background runtime:
//! - Sweep interval and gamification debounce
//! - Overdue reminder throttling
//! - Statistics retention
//! - Points label
//!
//! Configuration is stored at `~/.config/choreboard/config.toml`.

use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::data_dir;
use crate::error::ConfigError;
use crate::stats::Retention;

/// Background scheduler configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Seconds between periodic reset / overdue sweeps.
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
    /// Quiet period after the last mutation before gamification runs.
    #[serde(default = "default_debounce_secs")]
    pub debounce_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverdueConfig {
    /// Minimum hours between two overdue reminders for one kid and chore.
    #[serde(default = "default_notify_interval_hours")]
    pub notify_interval_hours: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointsConfig {
    #[serde(default = "default_points_label")]
    pub label: String,
}

/// Engine configuration.
///
/// Serialized to/from TOML at `~/.config/choreboard/config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct EngineConfig {
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub overdue: OverdueConfig,
    #[serde(default)]
    pub retention: Retention,
    #[serde(default)]
    pub points: PointsConfig,
}

fn default_sweep_interval_secs() -> u64 {
    300
}
fn default_debounce_secs() -> u64 {
    5
}
fn default_notify_interval_hours() -> i64 {
    24
}
fn default_points_label() -> String {
    "Points".into()
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            sweep_interval_secs: default_sweep_interval_secs(),
            debounce_secs: default_debounce_secs(),
        }
    }
}

impl Default for OverdueConfig {
    fn default() -> Self {
        Self {
            notify_interval_hours: default_notify_interval_hours(),
        }
    }
}

impl Default for PointsConfig {
    fn default() -> Self {
        Self {
            label: default_points_label(),
        }
    }
}

impl EngineConfig {
    fn get_json_value_by_path<'a>(
        root: &'a serde_json::Value,
        key: &str,
    ) -> Option<&'a serde_json::Value> {
        if key.is_empty() {
            return None;
        }
        key.split('.').try_fold(root, |current, part| current.get(part))
    }

    fn set_json_value_by_path(
        root: &mut serde_json::Value,
        key: &str,
        value: &str,
    ) -> Result<(), ConfigError> {
        let unknown = || ConfigError::UnknownKey(key.to_string());
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };

        let (parent_path, leaf) = match key.rsplit_once('.') {
            Some((parent, leaf)) => (Some(parent), leaf),
            None => (None, key),
        };
        if leaf.is_empty() {
            return Err(unknown());
        }

        let mut current = root;
        for part in parent_path.into_iter().flat_map(|p| p.split('.')) {
            current = current.get_mut(part).ok_or_else(unknown)?;
        }
        let obj = current.as_object_mut().ok_or_else(unknown)?;
        let existing = obj.get(leaf).ok_or_else(unknown)?;

        let new_value = match existing {
            serde_json::Value::Bool(_) => serde_json::Value::Bool(
                value
                    .parse::<bool>()
                    .map_err(|e| invalid(e.to_string()))?,
            ),
            serde_json::Value::Number(_) => {
                if let Ok(n) = value.parse::<i64>() {
                    serde_json::Value::Number(n.into())
                } else {
                    value
                        .parse::<f64>()
                        .ok()
                        .and_then(serde_json::Number::from_f64)
                        .map(serde_json::Value::Number)
                        .ok_or_else(|| invalid(format!("cannot parse '{value}' as number")))?
                }
            }
            serde_json::Value::Object(_) | serde_json::Value::Array(_) => {
                return Err(invalid("not a leaf setting".into()));
            }
            _ => serde_json::Value::String(value.into()),
        };

        obj.insert(leaf.to_string(), new_value);
        Ok(())
    }

    pub fn path() -> Result<PathBuf, ConfigError> {
        Ok(data_dir()?.join("config.toml"))
    }

    /// Load from the data directory, writing the defaults on first run.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed,
    /// or if the default config cannot be written to disk.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(|e| ConfigError::LoadFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            }),
            Err(_) => {
                let cfg = Self::default();
                cfg.save_to(path)?;
                Ok(cfg)
            }
        }
    }

    /// Persist to the data directory.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let save_failed = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| save_failed(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| save_failed(e.to_string()))
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        match Self::get_json_value_by_path(&json, key)? {
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Set a value by dot-separated key, in memory only. Call [`save`](Self::save)
    /// to persist.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown or the value does not parse
    /// as the setting's type.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let invalid = |e: serde_json::Error| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        };
        let mut json = serde_json::to_value(&*self).map_err(invalid)?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        *self = serde_json::from_value(json).map_err(invalid)?;
        Ok(())
    }

    pub fn sweep_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.scheduler.sweep_interval_secs.max(1))
    }

    pub fn debounce(&self) -> Duration {
        Duration::seconds(self.scheduler.debounce_secs as i64)
    }

    pub fn overdue_notify_interval(&self) -> Duration {
        Duration::hours(self.overdue.notify_interval_hours)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_roundtrip() {
        let cfg = EngineConfig::default();
        let toml_str = toml::to_string_pretty(&cfg).unwrap();
        let parsed: EngineConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed, cfg);
        assert_eq!(parsed.scheduler.sweep_interval_secs, 300);
        assert_eq!(parsed.retention.daily_days, 7);
    }

    #[test]
    fn partial_file_falls_back_to_defaults() {
        let parsed: EngineConfig = toml::from_str("[scheduler]\ndebounce_secs = 2\n").unwrap();
        assert_eq!(parsed.scheduler.debounce_secs, 2);
        assert_eq!(parsed.scheduler.sweep_interval_secs, 300);
        assert_eq!(parsed.points.label, "Points");
    }

    #[test]
    fn get_supports_dot_path_keys() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.get("overdue.notify_interval_hours").as_deref(), Some("24"));
        assert_eq!(cfg.get("points.label").as_deref(), Some("Points"));
        assert!(cfg.get("points.missing").is_none());
        assert!(cfg.get("").is_none());
    }

    #[test]
    fn set_updates_number_and_string() {
        let mut cfg = EngineConfig::default();
        cfg.set("retention.daily_days", "30").unwrap();
        cfg.set("points.label", "Stars").unwrap();
        assert_eq!(cfg.retention.daily_days, 30);
        assert_eq!(cfg.points.label, "Stars");
    }

    #[test]
    fn set_rejects_unknown_key_and_bad_value() {
        let mut cfg = EngineConfig::default();
        assert!(matches!(
            cfg.set("scheduler.nope", "1"),
            Err(ConfigError::UnknownKey(_))
        ));
        assert!(matches!(
            cfg.set("scheduler.debounce_secs", "soon"),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(matches!(
            cfg.set("retention", "1"),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn load_from_writes_defaults_on_first_run() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let cfg = EngineConfig::load_from(&path).unwrap();
        assert_eq!(cfg, EngineConfig::default());
        assert!(path.exists());

        std::fs::write(&path, "scheduler = 3").unwrap();
        assert!(matches!(
            EngineConfig::load_from(&path),
            Err(ConfigError::LoadFailed { .. })
        ));
    }
}
