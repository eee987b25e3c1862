use std::collections::{BTreeMap, BTreeSet, HashSet};

use chrono::NaiveDate;
use tracing::{debug, info, warn};

use super::occupancy::back_to_back;
use super::rebalance::rebalance;
use super::types::{
    AssignmentPolicy, DayBook, EngineOptions, ScheduleResult, ScheduleWindow, Status,
    StatusPriority, UnitDayClassification, UnitOrder,
};

/// A unit's classified days restricted to the dates of one run
#[derive(Debug, Clone, Default)]
pub struct UnitCandidates {
    pub unit: String,
    pub vacant: Vec<NaiveDate>,
    pub b2b: Vec<NaiveDate>,
    pub arriving: Vec<NaiveDate>,
    pub departing: Vec<NaiveDate>,
    pub occupied: Vec<NaiveDate>,
}

impl UnitCandidates {
    /// Intersects each class with `dates` and splits out back-to-back days
    pub fn derive(
        unit: &str,
        classification: &UnitDayClassification,
        dates: &BTreeSet<NaiveDate>,
    ) -> Self {
        let within = |set: &BTreeSet<NaiveDate>| -> Vec<NaiveDate> {
            set.iter().filter(|d| dates.contains(d)).copied().collect()
        };

        let b2b = within(&back_to_back(classification));
        let arriving = within(&classification.arriving);
        let departing = within(&classification.departing);

        Self {
            unit: unit.to_string(),
            vacant: within(&classification.vacant),
            arriving: arriving.into_iter().filter(|d| !b2b.contains(d)).collect(),
            departing: departing.into_iter().filter(|d| !b2b.contains(d)).collect(),
            occupied: within(&classification.occupied),
            b2b,
        }
    }

    pub fn class(&self, status: Status) -> &[NaiveDate] {
        match status {
            Status::Vacant => &self.vacant,
            Status::B2b => &self.b2b,
            Status::Arrival => &self.arriving,
            Status::Departure => &self.departing,
            Status::Occupied => &self.occupied,
        }
    }

    /// Status of the unit on `date`, `None` when the date is in no class
    pub fn status_on(&self, date: &NaiveDate) -> Option<Status> {
        Status::ALL
            .iter()
            .copied()
            .find(|status| self.class(*status).contains(date))
    }

    /// Every candidate date across all classes, sorted
    pub fn all(&self) -> Vec<NaiveDate> {
        let dates: BTreeSet<NaiveDate> = Status::ALL
            .iter()
            .flat_map(|status| self.class(*status).iter().copied())
            .collect();
        dates.into_iter().collect()
    }
}

/// Assigns one day of `window` to each unit in `units`.
///
/// `allowed_dates` narrows the window (weekends, holidays). Units without a
/// classification are skipped and reported on the result. Duplicate unit codes
/// are assigned once.
pub fn assign(
    classifications: &BTreeMap<String, UnitDayClassification>,
    window: &ScheduleWindow,
    units: &[String],
    allowed_dates: Option<&BTreeSet<NaiveDate>>,
    options: &EngineOptions,
) -> ScheduleResult {
    let dates: BTreeSet<NaiveDate> = window
        .dates()
        .into_iter()
        .filter(|d| allowed_dates.map_or(true, |allowed| allowed.contains(d)))
        .collect();

    let mut book = DayBook::new(dates.iter().copied());
    if dates.is_empty() {
        warn!(
            "No schedulable dates between {} and {}",
            window.start, window.end
        );
        return book.into_result(Vec::new(), 0);
    }

    let mut seen = HashSet::new();
    let mut skipped = Vec::new();
    let mut candidates = Vec::new();
    for unit in units {
        if !seen.insert(unit.as_str()) {
            continue;
        }
        match classifications.get(unit) {
            Some(classification) => {
                candidates.push(UnitCandidates::derive(unit, classification, &dates))
            }
            None => {
                warn!("Unit {} has no occupancy data, skipping", unit);
                skipped.push(unit.clone());
            }
        }
    }

    let fallback: Vec<NaiveDate> = dates.iter().copied().collect();
    let moves = match options.policy {
        AssignmentPolicy::BestStatus => {
            assign_best_status(&candidates, &fallback, &options.status_priority, &mut book);
            0
        }
        AssignmentPolicy::Balanced => {
            order_units(&mut candidates, options.unit_order);
            assign_balanced(&candidates, &fallback, &options.status_priority, &mut book);
            let by_unit: BTreeMap<&str, &UnitCandidates> =
                candidates.iter().map(|c| (c.unit.as_str(), c)).collect();
            rebalance(&mut book, &by_unit, &options.status_priority, candidates.len()).len()
        }
    };

    let result = book.into_result(skipped, moves);
    info!(
        "Assigned {} units between {} and {} (spread {}, {} moves, {} skipped)",
        result.assigned_count(),
        window.start,
        window.end,
        result.load_spread(),
        result.rebalance_moves,
        result.skipped.len()
    );
    result
}

fn order_units(candidates: &mut [UnitCandidates], order: UnitOrder) {
    match order {
        // Placement follows the caller's order
        UnitOrder::Presented => {}
        UnitOrder::FewestCandidates => candidates.sort_by_key(|c| c.all().len()),
    }
}

/// Single pass: take the best non-empty status class and the least loaded
/// day inside it
fn assign_best_status(
    candidates: &[UnitCandidates],
    fallback: &[NaiveDate],
    priority: &StatusPriority,
    book: &mut DayBook,
) {
    for unit in candidates {
        let (status, pool) = priority
            .order()
            .iter()
            .map(|status| (*status, unit.class(*status)))
            .find(|(_, dates)| !dates.is_empty())
            .unwrap_or_else(|| {
                warn!(
                    "Unit {} has no candidate days in the window, using every day",
                    unit.unit
                );
                (Status::Vacant, fallback)
            });

        let Some(chosen) = pool.iter().min_by_key(|d| book.load(d)).copied() else {
            continue;
        };
        debug!("{} -> {} ({})", unit.unit, chosen, status);
        book.place(&unit.unit, chosen, status);
    }
}

/// Greedy over all candidates, least loaded day first, then least disruptive
fn assign_balanced(
    candidates: &[UnitCandidates],
    fallback: &[NaiveDate],
    priority: &StatusPriority,
    book: &mut DayBook,
) {
    for unit in candidates {
        let mut pool = unit.all();
        if pool.is_empty() {
            warn!(
                "Unit {} has no candidate days in the window, using every day",
                unit.unit
            );
            pool = fallback.to_vec();
        }

        let chosen = pool.into_iter().min_by_key(|d| {
            let status = unit.status_on(d).unwrap_or(Status::Vacant);
            (book.load(d), priority.rank(status))
        });
        let Some(chosen) = chosen else {
            continue;
        };
        let status = unit.status_on(&chosen).unwrap_or(Status::Vacant);
        debug!("{} -> {} ({})", unit.unit, chosen, status);
        book.place(&unit.unit, chosen, status);
    }
}
