pub mod types;
pub mod occupancy;
pub mod weeks;
pub mod generic;
pub mod rebalance;

pub use types::{
    Assignment, AssignmentPolicy, EngineOptions, ScheduleResult, ScheduleWindow, Stay, Status,
    StatusPriority, UnitDayClassification, UnitOrder,
};
pub use occupancy::{classify, classify_units};
pub use weeks::{month_weeks, resolve_window, WeekLayout, WindowResolution};
pub use generic::assign;
