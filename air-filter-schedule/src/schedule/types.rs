use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::ScheduleError;

/// One occupancy record from the housekeeping report
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Stay {
    pub unit: String,
    pub start: NaiveDate,
    pub departure: NaiveDate,
}

/// Day categories derived from a unit's stay history
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitDayClassification {
    pub arriving: BTreeSet<NaiveDate>,
    pub departing: BTreeSet<NaiveDate>,
    pub occupied: BTreeSet<NaiveDate>,
    pub vacant: BTreeSet<NaiveDate>,
}

/// How disruptive servicing a unit is on a given day
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Status {
    #[serde(rename = "VACANT")]
    Vacant,
    #[serde(rename = "B2B")]
    B2b,
    #[serde(rename = "ARRIVAL")]
    Arrival,
    #[serde(rename = "DEPARTURE")]
    Departure,
    #[serde(rename = "OCCUPIED")]
    Occupied,
}

impl Status {
    pub const ALL: [Status; 5] = [
        Status::Vacant,
        Status::B2b,
        Status::Arrival,
        Status::Departure,
        Status::Occupied,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Vacant => "VACANT",
            Status::B2b => "B2B",
            Status::Arrival => "ARRIVAL",
            Status::Departure => "DEPARTURE",
            Status::Occupied => "OCCUPIED",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = ScheduleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Status::ALL
            .iter()
            .copied()
            .find(|status| status.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ScheduleError::InvalidConfig(format!("unknown status '{}'", s)))
    }
}

/// Total order over statuses, least disruptive first
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Status>", into = "Vec<Status>")]
pub struct StatusPriority {
    order: Vec<Status>,
}

impl StatusPriority {
    pub fn new(order: Vec<Status>) -> Result<Self, ScheduleError> {
        let distinct: BTreeSet<Status> = order.iter().copied().collect();
        if order.len() != Status::ALL.len() || distinct.len() != Status::ALL.len() {
            return Err(ScheduleError::InvalidConfig(
                "status priority must list every status exactly once".to_string(),
            ));
        }
        Ok(Self { order })
    }

    /// 1-based rank, lower is less disruptive
    pub fn rank(&self, status: Status) -> usize {
        self.order
            .iter()
            .position(|s| *s == status)
            .map(|i| i + 1)
            .unwrap_or(Status::ALL.len() + 1)
    }

    pub fn order(&self) -> &[Status] {
        &self.order
    }
}

impl Default for StatusPriority {
    fn default() -> Self {
        Self {
            order: Status::ALL.to_vec(),
        }
    }
}

impl TryFrom<Vec<Status>> for StatusPriority {
    type Error = ScheduleError;

    fn try_from(order: Vec<Status>) -> Result<Self, Self::Error> {
        StatusPriority::new(order)
    }
}

impl From<StatusPriority> for Vec<Status> {
    fn from(priority: StatusPriority) -> Self {
        priority.order
    }
}

/// Inclusive date range of one scheduling run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl ScheduleWindow {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    /// Every date in the window, in order. Empty when `end < start`.
    pub fn dates(&self) -> Vec<NaiveDate> {
        let mut dates = Vec::new();
        let mut day = Some(self.start);
        while let Some(current) = day.filter(|d| *d <= self.end) {
            dates.push(current);
            day = current.checked_add_signed(Duration::days(1));
        }
        dates
    }
}

/// Which assignment heuristic the engine runs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AssignmentPolicy {
    /// One pass, candidates from the single best status class
    #[default]
    BestStatus,
    /// Greedy over every candidate, then max-to-min rebalancing
    Balanced,
}

impl FromStr for AssignmentPolicy {
    type Err = ScheduleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "best-status" | "best_status" | "a" => Ok(AssignmentPolicy::BestStatus),
            "balanced" | "b" => Ok(AssignmentPolicy::Balanced),
            other => Err(ScheduleError::InvalidConfig(format!("unknown policy '{}'", other))),
        }
    }
}

/// Order in which the balanced policy places units
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UnitOrder {
    /// As given by the caller
    #[default]
    Presented,
    /// Units with the fewest candidate days first
    FewestCandidates,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineOptions {
    #[serde(default)]
    pub policy: AssignmentPolicy,
    #[serde(default)]
    pub unit_order: UnitOrder,
    #[serde(default)]
    pub status_priority: StatusPriority,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    pub unit: String,
    pub date: NaiveDate,
    pub status: Status,
}

/// A unit moved from one day to another while rebalancing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Move {
    pub unit: String,
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub status: Status,
}

/// Per-day assignment lists for the dates of one run
#[derive(Debug, Clone, Default)]
pub struct DayBook {
    days: BTreeMap<NaiveDate, Vec<Assignment>>,
}

impl DayBook {
    pub fn new<I: IntoIterator<Item = NaiveDate>>(dates: I) -> Self {
        Self {
            days: dates.into_iter().map(|d| (d, Vec::new())).collect(),
        }
    }

    pub fn load(&self, date: &NaiveDate) -> usize {
        self.days.get(date).map(Vec::len).unwrap_or(0)
    }

    pub fn day(&self, date: &NaiveDate) -> &[Assignment] {
        self.days.get(date).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn place(&mut self, unit: &str, date: NaiveDate, status: Status) {
        self.days.entry(date).or_default().push(Assignment {
            unit: unit.to_string(),
            date,
            status,
        });
    }

    /// Removes and returns the unit's assignment on `date`
    pub fn take(&mut self, unit: &str, date: &NaiveDate) -> Option<Assignment> {
        let day = self.days.get_mut(date)?;
        let index = day.iter().position(|a| a.unit == unit)?;
        Some(day.remove(index))
    }

    /// Busiest and quietest days, earliest date wins ties
    pub fn extremes(&self) -> Option<(NaiveDate, NaiveDate)> {
        let busiest = self
            .days
            .iter()
            .max_by(|a, b| a.1.len().cmp(&b.1.len()).then(b.0.cmp(a.0)))?;
        let quietest = self.days.iter().min_by_key(|(_, day)| day.len())?;
        Some((*busiest.0, *quietest.0))
    }

    pub fn into_result(self, skipped: Vec<String>, rebalance_moves: usize) -> ScheduleResult {
        let load = self.days.iter().map(|(d, day)| (*d, day.len())).collect();
        let assignments = self
            .days
            .into_iter()
            .filter(|(_, day)| !day.is_empty())
            .collect();
        ScheduleResult {
            assignments,
            load,
            skipped,
            rebalance_moves,
        }
    }
}

/// Output of one engine run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScheduleResult {
    pub assignments: BTreeMap<NaiveDate, Vec<Assignment>>,
    pub load: BTreeMap<NaiveDate, usize>,
    /// Requested units that had no classification
    pub skipped: Vec<String>,
    pub rebalance_moves: usize,
}

impl ScheduleResult {
    pub fn assigned_count(&self) -> usize {
        self.assignments.values().map(Vec::len).sum()
    }

    /// Gap between the busiest and quietest day
    pub fn load_spread(&self) -> usize {
        let max = self.load.values().max().copied().unwrap_or(0);
        let min = self.load.values().min().copied().unwrap_or(0);
        max - min
    }

    pub fn find(&self, unit: &str) -> Option<&Assignment> {
        self.assignments
            .values()
            .flat_map(|day| day.iter())
            .find(|a| a.unit == unit)
    }
}
