pub mod config;
pub mod display;
pub mod error;
pub mod export;
pub mod ordering;
pub mod parser;
pub mod planner;
pub mod roster;
pub mod schedule;
pub mod web;

pub use error::{Result, ScheduleError};
