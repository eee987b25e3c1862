use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::export::ScheduleRecord;
use crate::ordering::VendorOrder;
use crate::schedule::{ScheduleResult, ScheduleWindow, WindowResolution};

fn format_window(window: Option<&ScheduleWindow>) -> String {
    match window {
        Some(w) => format!("{} to {}", w.start.format("%m/%d/%Y"), w.end.format("%m/%d/%Y")),
        None => "none".to_string(),
    }
}

fn format_index(index: Option<usize>) -> String {
    index.map(|i| i.to_string()).unwrap_or_else(|| "-".to_string())
}

/// One line per window date, formatted `Weekday MM/DD/YYYY: count`
pub fn workload_lines(load: &BTreeMap<NaiveDate, usize>) -> Vec<String> {
    load.iter()
        .map(|(date, count)| format!("{}: {}", date.format("%A %m/%d/%Y"), count))
        .collect()
}

pub fn print_resolution(today: NaiveDate, resolution: &WindowResolution) {
    println!("\n=== Scheduling weeks around {} ===", today.format("%m/%d/%Y"));
    if resolution.is_empty() {
        println!("No scheduling week found");
        return;
    }
    println!(
        "Current week {}: {}",
        format_index(resolution.current_index),
        format_window(resolution.current.as_ref())
    );
    println!(
        "Next week {}: {}",
        format_index(resolution.next_index),
        format_window(resolution.next.as_ref())
    );
}

pub fn print_workload(result: &ScheduleResult) {
    println!("\n=== Workload ===");
    for line in workload_lines(&result.load) {
        println!("  {}", line);
    }
    println!(
        "Assigned {} units, spread {} ({} rebalancing moves)",
        result.assigned_count(),
        result.load_spread(),
        result.rebalance_moves
    );
    if !result.skipped.is_empty() {
        println!("⚠️  Units without stay history ({}):", result.skipped.len());
        for unit in &result.skipped {
            println!("  - {}", unit);
        }
    }
}

pub fn print_schedule(records: &[ScheduleRecord]) {
    println!("\n=== Schedule ===");
    if records.is_empty() {
        println!("  [EMPTY]");
        return;
    }
    for record in records {
        println!(
            "  {} {:<9} {:<10} {}",
            record.date, record.weekday, record.unit, record.status
        );
    }
}

pub fn print_orders(orders: &[VendorOrder]) {
    println!("\n=== Filter orders ===");
    if orders.is_empty() {
        println!("Nothing to order");
        return;
    }
    for order in orders {
        println!("{}", order.vendor);
        for line in &order.lines {
            println!(
                "  {:<16} {:>3} cases @ ${:.2} = ${:.2}",
                line.size, line.cases, line.cost, line.total_cost
            );
        }
        println!(
            "  Total: {} cases, ${:.2}",
            order.total_cases(),
            order.total_cost()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn workload_lines_list_every_date() {
        let mut load = BTreeMap::new();
        load.insert(NaiveDate::from_ymd_opt(2026, 10, 19).unwrap(), 3);
        load.insert(NaiveDate::from_ymd_opt(2026, 10, 20).unwrap(), 0);
        assert_eq!(
            workload_lines(&load),
            vec!["Monday 10/19/2026: 3", "Tuesday 10/20/2026: 0"]
        );
    }
}
