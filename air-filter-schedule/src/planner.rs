use chrono::NaiveDate;
use serde::Serialize;
use thiserror::Error;
use tracing::info;

use crate::config::AppConfig;
use crate::export::{build_deliverable, materialize, DeliverableRow};
use crate::roster::RosterSnapshot;
use crate::schedule::{
    assign, classify_units, resolve_window, EngineOptions, ScheduleResult, ScheduleWindow, Stay,
    WindowResolution,
};

/// Air-filter plan for the next scheduling week
#[derive(Debug, Clone, Serialize)]
pub struct WeekPlan {
    pub week: usize,
    pub window: ScheduleWindow,
    pub result: ScheduleResult,
    pub rows: Vec<DeliverableRow>,
}

/// Why no plan was produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum NoPlan {
    #[error("no scheduling week found around this date")]
    EmptyWindow,
    #[error("no next scheduling week")]
    NoNextWeek,
    #[error("week {0} is not a working week")]
    NotWorkingWeek(usize),
}

/// Plans the week after `today`: classifies stays, assigns the roster's units
/// for that week and joins roster details into the deliverable.
pub fn plan_next_week(
    stays: &[Stay],
    roster: &RosterSnapshot,
    today: NaiveDate,
    config: &AppConfig,
    options: &EngineOptions,
) -> Result<WeekPlan, NoPlan> {
    let resolution: WindowResolution = resolve_window(today, &config.layout());
    if resolution.is_empty() {
        return Err(NoPlan::EmptyWindow);
    }

    let (Some(week), Some(window)) = (resolution.next_index, resolution.next) else {
        return Err(NoPlan::NoNextWeek);
    };
    if !config.is_working_week(week) {
        return Err(NoPlan::NotWorkingWeek(week));
    }

    let classifications = classify_units(stays);
    let units = roster.units_for_week(week);
    info!(
        "Planning week {} ({} to {}) for {} units",
        week,
        window.start,
        window.end,
        units.len()
    );

    let allowed = config.allowed_dates(&window);
    let result = assign(&classifications, &window, &units, allowed.as_ref(), options);
    let records = materialize(&result.assignments);
    let rows = build_deliverable(week, &records, roster);

    Ok(WeekPlan {
        week,
        window,
        result,
        rows,
    })
}
