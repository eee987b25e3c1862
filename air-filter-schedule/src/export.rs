use std::collections::BTreeMap;
use std::fs::File;
use std::io::Write;
use std::path::Path;

use chrono::NaiveDate;
use csv::WriterBuilder;
use serde::Serialize;

use crate::error::Result;
use crate::roster::RosterSnapshot;
use crate::schedule::{Assignment, ScheduleWindow, Status};

/// One flattened assignment, ready for display
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScheduleRecord {
    pub date: String,
    pub weekday: String,
    pub unit: String,
    pub status: Status,
}

/// Flattens the per-day assignments into records ordered by date, then unit
pub fn materialize(assignments: &BTreeMap<NaiveDate, Vec<Assignment>>) -> Vec<ScheduleRecord> {
    let mut rows: Vec<(NaiveDate, &Assignment)> = assignments
        .iter()
        .flat_map(|(date, day)| day.iter().map(move |a| (*date, a)))
        .collect();
    rows.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.unit.cmp(&b.1.unit)));

    rows.into_iter()
        .map(|(date, a)| ScheduleRecord {
            date: date.format("%Y-%m-%d").to_string(),
            weekday: date.format("%A").to_string(),
            unit: a.unit.clone(),
            status: a.status,
        })
        .collect()
}

/// A deliverable row: a schedule record with the roster's on-site details
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeliverableRow {
    #[serde(rename = "Week")]
    pub week: usize,
    #[serde(rename = "Date")]
    pub date: String,
    #[serde(rename = "Day")]
    pub day: String,
    #[serde(rename = "Unit_Code")]
    pub unit: String,
    #[serde(rename = "Status")]
    pub status: Status,
    #[serde(rename = "Ladder?")]
    pub ladder: String,
    #[serde(rename = "Filters")]
    pub filters: String,
    #[serde(rename = "#")]
    pub filter_count: String,
}

/// Joins roster details onto the records. Units missing from the roster keep
/// their row with empty details.
pub fn build_deliverable(
    week: usize,
    records: &[ScheduleRecord],
    roster: &RosterSnapshot,
) -> Vec<DeliverableRow> {
    records
        .iter()
        .map(|record| {
            let entry = roster.entry(&record.unit);
            DeliverableRow {
                week,
                date: record.date.clone(),
                day: record.weekday.clone(),
                unit: record.unit.clone(),
                status: record.status,
                ladder: entry.map(|e| e.ladder.clone()).unwrap_or_default(),
                filters: entry.map(|e| e.filters.clone()).unwrap_or_default(),
                filter_count: entry.map(|e| e.filter_count.clone()).unwrap_or_default(),
            }
        })
        .collect()
}

/// `AFS_{MM-DD}_{MM-DD-YYYY}.csv` from the window's first and last day
pub fn deliverable_file_name(window: &ScheduleWindow) -> String {
    format!(
        "AFS_{}_{}.csv",
        window.start.format("%m-%d"),
        window.end.format("%m-%d-%Y")
    )
}

pub fn write_deliverable<W: Write>(rows: &[DeliverableRow], output: W) -> Result<()> {
    let mut wtr = WriterBuilder::new().has_headers(true).from_writer(output);
    for row in rows {
        wtr.serialize(row)?;
    }
    wtr.flush()?;
    Ok(())
}

/// Writes the deliverable to `csv_path`, replacing any previous file
pub fn export_deliverable(rows: &[DeliverableRow], csv_path: &Path) -> Result<()> {
    let file = File::create(csv_path)?;
    write_deliverable(rows, file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roster::RosterEntry;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn assignment(unit: &str, date: NaiveDate, status: Status) -> Assignment {
        Assignment {
            unit: unit.to_string(),
            date,
            status,
        }
    }

    fn sample() -> BTreeMap<NaiveDate, Vec<Assignment>> {
        let mut map = BTreeMap::new();
        map.insert(
            date(2026, 10, 20),
            vec![assignment("RR303", date(2026, 10, 20), Status::Occupied)],
        );
        map.insert(
            date(2026, 10, 19),
            vec![
                assignment("RR202", date(2026, 10, 19), Status::B2b),
                assignment("RR101", date(2026, 10, 19), Status::Vacant),
            ],
        );
        map
    }

    #[test]
    fn records_sorted_by_date_then_unit() {
        let records = materialize(&sample());
        let order: Vec<(&str, &str)> = records
            .iter()
            .map(|r| (r.date.as_str(), r.unit.as_str()))
            .collect();
        assert_eq!(
            order,
            vec![
                ("2026-10-19", "RR101"),
                ("2026-10-19", "RR202"),
                ("2026-10-20", "RR303"),
            ]
        );
        assert_eq!(records[0].weekday, "Monday");
        assert_eq!(records[2].weekday, "Tuesday");
        assert_eq!(records[1].status, Status::B2b);
    }

    #[test]
    fn empty_map_gives_no_records() {
        assert!(materialize(&BTreeMap::new()).is_empty());
    }

    #[test]
    fn roster_details_are_left_joined() {
        let roster = RosterSnapshot::new(vec![RosterEntry {
            unit: "RR101".to_string(),
            week: Some(3.0),
            ladder: "Yes".to_string(),
            filters: "2:(16 X 25 X 1)".to_string(),
            filter_count: "2".to_string(),
        }]);
        let rows = build_deliverable(3, &materialize(&sample()), &roster);

        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].week, 3);
        assert_eq!(rows[0].ladder, "Yes");
        assert_eq!(rows[0].filter_count, "2");
        assert_eq!(rows[1].unit, "RR202");
        assert!(rows[1].filters.is_empty());
    }

    #[test]
    fn file_name_uses_window_bounds() {
        let window = ScheduleWindow::new(date(2026, 10, 19), date(2026, 10, 23));
        assert_eq!(deliverable_file_name(&window), "AFS_10-19_10-23-2026.csv");
    }

    #[test]
    fn writes_deliverable_csv() {
        let roster = RosterSnapshot::new(Vec::new());
        let rows = build_deliverable(1, &materialize(&sample()), &roster);

        let mut out = Vec::new();
        write_deliverable(&rows, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next(),
            Some("Week,Date,Day,Unit_Code,Status,Ladder?,Filters,#")
        );
        assert_eq!(lines.next(), Some("1,2026-10-19,Monday,RR101,VACANT,,,"));
        assert_eq!(text.lines().count(), 4);
    }

    #[test]
    fn exports_to_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("AFS.csv");
        export_deliverable(&[], &path).unwrap();
        assert!(path.exists());
    }
}
