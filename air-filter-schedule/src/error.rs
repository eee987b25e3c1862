use chrono::NaiveDate;
use thiserror::Error;

/// Errors raised while reading reports, rosters and configuration
#[derive(Debug, Error)]
pub enum ScheduleError {
    #[error("invalid stay for unit {unit}: departure {departure} is not after start {start}")]
    InvalidStay {
        unit: String,
        start: NaiveDate,
        departure: NaiveDate,
    },

    #[error("missing column: {0}")]
    MissingColumn(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("{0} lock poisoned")]
    Poisoned(&'static str),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Toml(#[from] toml::de::Error),

    #[error(transparent)]
    Regex(#[from] regex::Error),
}

pub type Result<T> = std::result::Result<T, ScheduleError>;
