use chrono::{Datelike, Duration, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

use super::types::ScheduleWindow;

/// How scheduling weeks are laid out inside a month
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeekLayout {
    pub anchor: Weekday,
    pub length_days: u32,
    pub max_weeks: usize,
}

impl Default for WeekLayout {
    fn default() -> Self {
        Self {
            anchor: Weekday::Mon,
            length_days: 5,
            max_weeks: 4,
        }
    }
}

/// Where a reference date sits relative to the month's scheduling weeks.
///
/// `current_index` is 0 when the date comes before the first week of its month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WindowResolution {
    pub current_index: Option<usize>,
    pub current: Option<ScheduleWindow>,
    pub next_index: Option<usize>,
    pub next: Option<ScheduleWindow>,
}

impl WindowResolution {
    /// True when neither window resolved and the period should be skipped
    pub fn is_empty(&self) -> bool {
        self.current.is_none() && self.next.is_none()
    }
}

fn following_month(year: i32, month: u32) -> (i32, u32) {
    if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    }
}

/// `None` when the week would run past the last representable date
fn window_at(start: NaiveDate, layout: &WeekLayout) -> Option<ScheduleWindow> {
    let span = i64::from(layout.length_days.max(1)) - 1;
    let end = start.checked_add_signed(Duration::days(span))?;
    Some(ScheduleWindow::new(start, end))
}

/// Start of the first week that fits entirely inside the month
pub fn first_full_week_start(year: i32, month: u32, layout: &WeekLayout) -> Option<NaiveDate> {
    let first_day = NaiveDate::from_ymd_opt(year, month, 1)?;
    let offset = (7 + layout.anchor.num_days_from_monday() as i64
        - first_day.weekday().num_days_from_monday() as i64)
        % 7;
    let mut start = first_day.checked_add_signed(Duration::days(offset))?;

    if window_at(start, layout)?.end.month() != month {
        start = start.checked_add_signed(Duration::days(7))?;
    }

    if start.month() == month {
        Some(start)
    } else {
        None
    }
}

/// Up to `max_weeks` non-overlapping weeks, one every seven days
pub fn month_weeks(year: i32, month: u32, layout: &WeekLayout) -> Vec<ScheduleWindow> {
    let Some(first) = first_full_week_start(year, month, layout) else {
        return Vec::new();
    };

    let mut weeks = Vec::new();
    for i in 0..layout.max_weeks {
        let Some(window) = first
            .checked_add_signed(Duration::weeks(i as i64))
            .and_then(|start| window_at(start, layout))
        else {
            break;
        };
        if window.start.month() != month || window.end.month() != month {
            break;
        }
        weeks.push(window);
    }
    weeks
}

/// Locates the current and next scheduling weeks for `today`.
///
/// A date that falls after a week has ended but before the next one starts
/// (the weekend after a five-day week, or the days after the month's last
/// week) still resolves: the week that started last is current. Resolution
/// only comes back empty when no week can be laid out at all, unlike a
/// lookup that requires `today` to sit inside a week.
pub fn resolve_window(today: NaiveDate, layout: &WeekLayout) -> WindowResolution {
    let weeks = month_weeks(today.year(), today.month(), layout);
    let (next_year, next_month) = following_month(today.year(), today.month());
    let first_of_next_month = || {
        month_weeks(next_year, next_month, layout)
            .first()
            .copied()
    };

    let Some(first) = weeks.first() else {
        let next = first_of_next_month();
        return WindowResolution {
            current_index: None,
            current: None,
            next_index: next.map(|_| 1),
            next,
        };
    };

    if today < first.start {
        return WindowResolution {
            current_index: Some(0),
            current: None,
            next_index: Some(1),
            next: Some(*first),
        };
    }

    // Last week that has started by `today`; covers dates inside a week and
    // the gaps between shorter-than-seven-day weeks.
    let position = weeks
        .iter()
        .rposition(|week| week.start <= today)
        .unwrap_or(0);
    let current_index = position + 1;

    let (next_index, next) = match weeks.get(current_index) {
        Some(week) => (Some(current_index + 1), Some(*week)),
        None => match first_of_next_month() {
            Some(week) => (Some(1), Some(week)),
            None => (None, None),
        },
    };

    WindowResolution {
        current_index: Some(current_index),
        current: Some(weeks[position]),
        next_index,
        next,
    }
}
