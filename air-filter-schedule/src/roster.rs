//! The air-filter roster: which units are serviced in which week of the
//! month, and the ladder/filter details crews need on site.
//!
//! Roster data lives in a shared spreadsheet. The scheduler never fetches it
//! itself; callers hand in a timestamped [`RosterSnapshot`] from a
//! [`RosterSource`] and decide how fresh it has to be.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Result, ScheduleError};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RosterEntry {
    #[serde(rename = "Unit_Code")]
    pub unit: String,
    #[serde(rename = "Week", default, deserialize_with = "csv::invalid_option")]
    pub week: Option<f64>,
    #[serde(rename = "Ladder?", default)]
    pub ladder: String,
    #[serde(rename = "Filters", default)]
    pub filters: String,
    #[serde(rename = "#", default)]
    pub filter_count: String,
}

impl RosterEntry {
    pub fn week_number(&self) -> Option<usize> {
        self.week
            .filter(|w| w.is_finite() && *w >= 0.0)
            .map(|w| w as usize)
    }
}

/// Roster contents as of `fetched_at`
#[derive(Debug, Clone, PartialEq)]
pub struct RosterSnapshot {
    pub fetched_at: DateTime<Utc>,
    pub entries: Vec<RosterEntry>,
}

impl RosterSnapshot {
    pub fn new(entries: Vec<RosterEntry>) -> Self {
        Self {
            fetched_at: Utc::now(),
            entries,
        }
    }

    /// Units due in `week`, in roster order
    pub fn units_for_week(&self, week: usize) -> Vec<String> {
        self.entries
            .iter()
            .filter(|e| e.week_number() == Some(week))
            .map(|e| e.unit.clone())
            .collect()
    }

    /// Distinct week numbers present in the roster, ascending
    pub fn weeks(&self) -> Vec<usize> {
        let weeks: BTreeSet<usize> = self.entries.iter().filter_map(|e| e.week_number()).collect();
        weeks.into_iter().collect()
    }

    pub fn entry(&self, unit: &str) -> Option<&RosterEntry> {
        self.entries.iter().find(|e| e.unit == unit)
    }

    pub fn is_fresh(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        now - self.fetched_at < ttl
    }
}

/// Somewhere a roster snapshot can be read from
pub trait RosterSource {
    fn fetch(&self) -> Result<RosterSnapshot>;
}

/// Roster exported from the spreadsheet as CSV
#[derive(Debug, Clone)]
pub struct CsvRoster {
    pub path: PathBuf,
}

impl CsvRoster {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

/// Reads roster rows; rows without a unit code are dropped
pub fn read_roster<R: std::io::Read>(input: R) -> Result<Vec<RosterEntry>> {
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(input);
    let mut entries = Vec::new();
    for result in reader.deserialize() {
        let entry: RosterEntry = result?;
        if entry.unit.trim().is_empty() {
            continue;
        }
        entries.push(RosterEntry {
            unit: entry.unit.trim().to_string(),
            ..entry
        });
    }
    Ok(entries)
}

impl RosterSource for CsvRoster {
    fn fetch(&self) -> Result<RosterSnapshot> {
        let file = std::fs::File::open(&self.path)?;
        let entries = read_roster(file)?;
        info!("Read {} roster entries from {}", entries.len(), self.path.display());
        Ok(RosterSnapshot::new(entries))
    }
}

/// Keeps the last snapshot from `source` for `ttl`
pub struct CachedRoster<S> {
    source: S,
    ttl: Duration,
    cached: Mutex<Option<RosterSnapshot>>,
}

impl<S: RosterSource> CachedRoster<S> {
    pub fn new(source: S, ttl: Duration) -> Self {
        Self {
            source,
            ttl,
            cached: Mutex::new(None),
        }
    }

    pub fn snapshot(&self) -> Result<RosterSnapshot> {
        let mut cached = self
            .cached
            .lock()
            .map_err(|_| ScheduleError::Poisoned("roster cache"))?;

        if let Some(snapshot) = cached.as_ref() {
            if snapshot.is_fresh(Utc::now(), self.ttl) {
                debug!("Using cached roster from {}", snapshot.fetched_at);
                return Ok(snapshot.clone());
            }
        }

        let snapshot = self.source.fetch()?;
        *cached = Some(snapshot.clone());
        Ok(snapshot)
    }

    /// Drops the cached snapshot so the next read goes to the source
    pub fn invalidate(&self) {
        if let Ok(mut cached) = self.cached.lock() {
            *cached = None;
        }
    }
}
