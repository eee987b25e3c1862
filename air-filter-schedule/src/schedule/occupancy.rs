use std::collections::{BTreeMap, BTreeSet};

use chrono::{Duration, NaiveDate};

use super::types::{Stay, UnitDayClassification};

/// Classifies the days of one unit's stay history.
///
/// Stays must already satisfy `departure > start`. Arrival and departure days
/// are carved out of both `occupied` and `vacant`, which only matters when
/// stays in the report overlap.
pub fn classify(stays: &[Stay]) -> UnitDayClassification {
    let mut classification = UnitDayClassification::default();

    let (span_start, span_end) = match (
        stays.iter().map(|s| s.start).min(),
        stays.iter().map(|s| s.departure).max(),
    ) {
        (Some(start), Some(end)) => (start, end),
        _ => return classification,
    };

    for stay in stays {
        classification.arriving.insert(stay.start);
        classification.departing.insert(stay.departure);

        let mut day = stay.start + Duration::days(1);
        while day < stay.departure {
            classification.occupied.insert(day);
            day += Duration::days(1);
        }
    }

    let transitions: BTreeSet<NaiveDate> = classification
        .arriving
        .union(&classification.departing)
        .copied()
        .collect();
    classification.occupied.retain(|day| !transitions.contains(day));

    let mut day = Some(span_start);
    while let Some(current) = day.filter(|d| *d <= span_end) {
        if !classification.occupied.contains(&current) && !transitions.contains(&current) {
            classification.vacant.insert(current);
        }
        day = current.checked_add_signed(Duration::days(1));
    }

    classification
}

/// Groups stays by unit code and classifies each unit
pub fn classify_units(stays: &[Stay]) -> BTreeMap<String, UnitDayClassification> {
    let mut by_unit: BTreeMap<&str, Vec<Stay>> = BTreeMap::new();
    for stay in stays {
        by_unit.entry(stay.unit.as_str()).or_default().push(stay.clone());
    }

    by_unit
        .into_iter()
        .map(|(unit, unit_stays)| (unit.to_string(), classify(&unit_stays)))
        .collect()
}

/// Dates that are both an arrival and a departure
pub fn back_to_back(classification: &UnitDayClassification) -> BTreeSet<NaiveDate> {
    classification
        .arriving
        .intersection(&classification.departing)
        .copied()
        .collect()
}
