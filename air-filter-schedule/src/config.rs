//! Scheduler configuration file support.
//!
//! Every setting has a default, so an empty file (or no file at all) gives
//! Monday-anchored five-day weeks and the best-status policy.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

use crate::error::{Result, ScheduleError};
use crate::schedule::{
    AssignmentPolicy, EngineOptions, ScheduleWindow, StatusPriority, UnitOrder, WeekLayout,
};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub window: WindowSettings,
    #[serde(default)]
    pub engine: EngineSettings,
    #[serde(default)]
    pub server: ServerSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowSettings {
    #[serde(default = "default_anchor")]
    pub anchor: Weekday,
    #[serde(default = "default_length_days")]
    pub length_days: u32,
    #[serde(default = "default_max_weeks")]
    pub max_weeks: usize,
    #[serde(default = "default_working_weeks")]
    pub working_weeks: Vec<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineSettings {
    #[serde(default)]
    pub policy: AssignmentPolicy,
    #[serde(default)]
    pub unit_order: UnitOrder,
    #[serde(default)]
    pub status_priority: StatusPriority,
    #[serde(default)]
    pub excluded_weekdays: Vec<Weekday>,
    #[serde(default)]
    pub holidays: Vec<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_roster_path")]
    pub roster_path: PathBuf,
    #[serde(default = "default_roster_ttl_secs")]
    pub roster_ttl_secs: i64,
}

fn default_anchor() -> Weekday {
    Weekday::Mon
}

fn default_length_days() -> u32 {
    5
}

fn default_max_weeks() -> usize {
    4
}

fn default_working_weeks() -> Vec<usize> {
    vec![1, 2, 3, 4]
}

fn default_port() -> u16 {
    8080
}

fn default_roster_path() -> PathBuf {
    PathBuf::from("air_filter_schedule.csv")
}

fn default_roster_ttl_secs() -> i64 {
    300
}

impl Default for WindowSettings {
    fn default() -> Self {
        Self {
            anchor: default_anchor(),
            length_days: default_length_days(),
            max_weeks: default_max_weeks(),
            working_weeks: default_working_weeks(),
        }
    }
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            port: default_port(),
            roster_path: default_roster_path(),
            roster_ttl_secs: default_roster_ttl_secs(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads `path` when given, defaults otherwise
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !(1..=7).contains(&self.window.length_days) {
            return Err(ScheduleError::InvalidConfig(format!(
                "window.length_days must be between 1 and 7, got {}",
                self.window.length_days
            )));
        }
        if self.window.max_weeks == 0 {
            return Err(ScheduleError::InvalidConfig(
                "window.max_weeks must be at least 1".to_string(),
            ));
        }
        if self.server.roster_ttl_secs < 0 {
            return Err(ScheduleError::InvalidConfig(
                "server.roster_ttl_secs cannot be negative".to_string(),
            ));
        }
        Ok(())
    }

    pub fn layout(&self) -> WeekLayout {
        WeekLayout {
            anchor: self.window.anchor,
            length_days: self.window.length_days,
            max_weeks: self.window.max_weeks,
        }
    }

    pub fn engine_options(&self) -> EngineOptions {
        EngineOptions {
            policy: self.engine.policy,
            unit_order: self.engine.unit_order,
            status_priority: self.engine.status_priority.clone(),
        }
    }

    pub fn is_working_week(&self, week: usize) -> bool {
        self.window.working_weeks.contains(&week)
    }

    /// Window dates left after excluded weekdays and holidays.
    /// `None` when nothing is excluded.
    pub fn allowed_dates(&self, window: &ScheduleWindow) -> Option<BTreeSet<NaiveDate>> {
        if self.engine.excluded_weekdays.is_empty() && self.engine.holidays.is_empty() {
            return None;
        }
        Some(
            window
                .dates()
                .into_iter()
                .filter(|d| !self.engine.excluded_weekdays.contains(&d.weekday()))
                .filter(|d| !self.engine.holidays.contains(d))
                .collect(),
        )
    }
}
