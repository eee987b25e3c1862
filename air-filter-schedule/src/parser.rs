use csv::{ReaderBuilder, StringRecord};
use chrono::NaiveDate;
use std::collections::HashSet;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::{info, warn};

use crate::error::{Result, ScheduleError};
use crate::schedule::Stay;

/// Stays read from a housekeeping report
#[derive(Debug, Clone, Default)]
pub struct StayReport {
    pub stays: Vec<Stay>,
    /// Rows whose departure was not after their start
    pub rejected: usize,
    /// Rows with a missing unit or unreadable dates
    pub skipped: usize,
    pub duplicates: usize,
}

// Two-digit years go first, "%Y" would read "26" as year 26
const DATE_FORMATS: [&str; 4] = ["%Y-%m-%d", "%m/%d/%y", "%m/%d/%Y", "%Y/%m/%d"];

/// Parses a report date, ignoring any time part after the date
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    let date_part = value
        .trim()
        .split(|c: char| c.is_whitespace() || c == 'T')
        .next()
        .unwrap_or("");
    if date_part.is_empty() {
        return None;
    }

    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(date_part, format).ok())
}

/// Checks that a stay ends after it starts
pub fn validate_stay(unit: &str, start: NaiveDate, departure: NaiveDate) -> Result<Stay> {
    if departure <= start {
        return Err(ScheduleError::InvalidStay {
            unit: unit.to_string(),
            start,
            departure,
        });
    }
    Ok(Stay {
        unit: unit.to_string(),
        start,
        departure,
    })
}

fn find_column(headers: &StringRecord, names: &[&str]) -> Result<usize> {
    headers
        .iter()
        .position(|h| {
            let header = h.trim().to_lowercase();
            names.iter().any(|name| header.contains(name))
        })
        .ok_or_else(|| ScheduleError::MissingColumn(names[0].to_string()))
}

/// Loads stays from a housekeeping arrival/departure report on disk
pub fn load_stays<P: AsRef<Path>>(csv_path: P) -> Result<StayReport> {
    let file = File::open(csv_path)?;
    read_stays(file)
}

/// Reads stays from CSV with `Unit_Code`, `Start_Date` and `Departure` columns.
///
/// Columns are located by header name, so extra report columns are ignored.
/// Duplicate rows are dropped and invalid stays are rejected.
pub fn read_stays<R: Read>(input: R) -> Result<StayReport> {
    let mut reader = ReaderBuilder::new().flexible(true).from_reader(input);
    let headers = reader.headers()?.clone();

    let unit_col = find_column(&headers, &["unit_code", "unit code"])?;
    let start_col = find_column(&headers, &["start_date", "start date"])?;
    let departure_col = find_column(&headers, &["departure"])?;

    let mut report = StayReport::default();
    let mut seen: HashSet<Stay> = HashSet::new();

    for result in reader.records() {
        let record = result?;

        let unit = record.get(unit_col).unwrap_or("").trim();
        let start = parse_date(record.get(start_col).unwrap_or(""));
        let departure = parse_date(record.get(departure_col).unwrap_or(""));

        let (start, departure) = match (unit.is_empty(), start, departure) {
            (false, Some(start), Some(departure)) => (start, departure),
            _ => {
                report.skipped += 1;
                continue;
            }
        };

        match validate_stay(unit, start, departure) {
            Ok(stay) => {
                if seen.insert(stay.clone()) {
                    report.stays.push(stay);
                } else {
                    report.duplicates += 1;
                }
            }
            Err(e) => {
                warn!("{}", e);
                report.rejected += 1;
            }
        }
    }

    if report.skipped > 0 {
        warn!("Skipped {} incomplete report rows", report.skipped);
    }
    info!(
        "Loaded {} stays ({} rejected, {} duplicates)",
        report.stays.len(),
        report.rejected,
        report.duplicates
    );

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn parses_common_report_date_formats() {
        assert_eq!(parse_date("2026-10-05"), Some(date(2026, 10, 5)));
        assert_eq!(parse_date("10/05/2026"), Some(date(2026, 10, 5)));
        assert_eq!(parse_date("10/5/26"), Some(date(2026, 10, 5)));
        assert_eq!(parse_date("2026-10-05 16:00:00"), Some(date(2026, 10, 5)));
        assert_eq!(parse_date("2026-10-05T16:00:00"), Some(date(2026, 10, 5)));
        assert_eq!(parse_date(""), None);
        assert_eq!(parse_date("soon"), None);
    }

    #[test]
    fn rejects_stay_departing_on_arrival_day() {
        let err = validate_stay("RR1", date(2026, 10, 5), date(2026, 10, 5)).unwrap_err();
        assert!(matches!(err, ScheduleError::InvalidStay { .. }));
        assert!(validate_stay("RR1", date(2026, 10, 5), date(2026, 10, 6)).is_ok());
    }

    #[test]
    fn reads_report_columns_by_name() {
        let csv = "Reservation,Unit_Code,Guest,Start_Date,Departure\n\
                   R1,RR101,Lee,10/01/2026,10/04/2026\n\
                   R2,RR101,Lee,10/01/2026,10/04/2026\n\
                   R3,RR202,Moreno,2026-10-03,2026-10-03\n\
                   R4,,Patel,2026-10-03,2026-10-06\n\
                   R5,RR303,Patel,2026-10-03,2026-10-06\n";

        let report = read_stays(csv.as_bytes()).unwrap();
        assert_eq!(report.stays.len(), 2);
        assert_eq!(report.duplicates, 1);
        assert_eq!(report.rejected, 1);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.stays[0].unit, "RR101");
        assert_eq!(report.stays[1].departure, date(2026, 10, 6));
    }

    #[test]
    fn missing_column_is_an_error() {
        let csv = "Unit_Code,Start_Date\nRR1,2026-10-01\n";
        let err = read_stays(csv.as_bytes()).unwrap_err();
        assert!(matches!(err, ScheduleError::MissingColumn(_)));
    }

    #[test]
    fn loads_report_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "Unit_Code,Start_Date,Departure").unwrap();
        writeln!(file, "RR1,2026-10-01,2026-10-08").unwrap();

        let report = load_stays(file.path()).unwrap();
        assert_eq!(report.stays.len(), 1);
    }
}
