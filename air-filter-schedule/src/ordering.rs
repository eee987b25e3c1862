//! Filter ordering: how many filters of each size are installed, how many
//! the remaining weeks of the month need, and how many cases to buy per vendor.

use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use csv::WriterBuilder;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::Result;
use crate::roster::{RosterEntry, RosterSnapshot};

/// Parses roster filter descriptions such as `2:(16 X 25 X 1), 1:(20 X 20 X 1)`
pub struct FilterParser {
    groups: Regex,
    size: Regex,
}

impl FilterParser {
    pub fn new() -> Result<Self> {
        Ok(Self {
            groups: Regex::new(r"(\d+):\(([^)]+)\)")?,
            size: Regex::new(r"^(\d+(?:\.\d+)?) X (\d+(?:\.\d+)?) X (\d+(?:\.\d+)?)$")?,
        })
    }

    /// One entry per physical filter
    pub fn expand_sizes(&self, filters: &str) -> Vec<String> {
        let mut sizes = Vec::new();
        for caps in self.groups.captures_iter(filters) {
            let qty: usize = caps[1].parse().unwrap_or(0);
            sizes.extend(std::iter::repeat(caps[2].to_string()).take(qty));
        }
        sizes
    }

    /// Length, width and height of a well-formed size
    pub fn dimensions(&self, size: &str) -> Option<(f64, f64, f64)> {
        let caps = self.size.captures(size)?;
        Some((
            caps[1].parse().ok()?,
            caps[2].parse().ok()?,
            caps[3].parse().ok()?,
        ))
    }

    /// Counts filters per size, dropping sizes that are not `L X W X H`
    pub fn count_sizes<'a, I>(&self, entries: I) -> Vec<SizeCount>
    where
        I: IntoIterator<Item = &'a RosterEntry>,
    {
        let mut counts: HashMap<String, usize> = HashMap::new();
        for entry in entries {
            for size in self.expand_sizes(&entry.filters) {
                *counts.entry(size).or_insert(0) += 1;
            }
        }

        let mut sized: Vec<((f64, f64, f64), SizeCount)> = counts
            .into_iter()
            .filter_map(|(size, count)| {
                let dims = self.dimensions(&size)?;
                Some((dims, SizeCount { size, count }))
            })
            .collect();
        sized.sort_by(|a, b| {
            a.0.partial_cmp(&b.0)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.1.size.cmp(&b.1.size))
        });
        sized.into_iter().map(|(_, count)| count).collect()
    }
}

/// Filters still to change this month, counted over the roster entries due
/// in `weeks`. An empty `weeks` means every week the roster lists.
pub fn remaining_counts(
    parser: &FilterParser,
    roster: &RosterSnapshot,
    weeks: &[usize],
) -> Vec<SizeCount> {
    let weeks = if weeks.is_empty() {
        roster.weeks()
    } else {
        weeks.to_vec()
    };
    parser.count_sizes(
        roster
            .entries
            .iter()
            .filter(|e| e.week_number().is_some_and(|w| weeks.contains(&w))),
    )
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SizeCount {
    #[serde(rename = "Size")]
    pub size: String,
    #[serde(rename = "Count")]
    pub count: usize,
}

/// A row of the filter catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    #[serde(rename = "Size")]
    pub size: String,
    #[serde(rename = "Vendor")]
    pub vendor: String,
    #[serde(rename = "Cost")]
    pub cost: f64,
    #[serde(rename = "Quantity_Per_Case")]
    pub quantity_per_case: u32,
}

/// Inventory position for one size
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InventoryLine {
    pub size: String,
    pub in_warehouse: i64,
    pub needed_this_month: i64,
    pub needed_next_month: i64,
    pub remainder: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VendorLine {
    pub size: String,
    pub cost: f64,
    pub cases: u32,
    pub total_cost: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VendorOrder {
    pub vendor: String,
    pub lines: Vec<VendorLine>,
}

impl VendorOrder {
    pub fn total_cases(&self) -> u32 {
        self.lines.iter().map(|l| l.cases).sum()
    }

    pub fn total_cost(&self) -> f64 {
        self.lines.iter().map(|l| l.total_cost).sum()
    }
}

#[derive(Serialize)]
struct OrderRow<'a> {
    #[serde(rename = "Size")]
    size: &'a str,
    #[serde(rename = "Cases")]
    cases: u32,
}

#[derive(Serialize)]
struct NeededRow<'a> {
    #[serde(rename = "Size")]
    size: &'a str,
    #[serde(rename = "Count")]
    count: Option<usize>,
}

pub const NEEDED_TEMPLATE_FILE: &str = "needed_filters_template.csv";

/// `order_{vendor}.csv`, vendor lowercased with spaces as underscores
pub fn order_file_name(vendor: &str) -> String {
    format!("order_{}.csv", vendor.to_lowercase().replace(' ', "_"))
}

/// Writes a vendor order as `Size,Cases`
pub fn write_vendor_order<W: Write>(order: &VendorOrder, output: W) -> Result<()> {
    let mut wtr = WriterBuilder::new().has_headers(true).from_writer(output);
    for line in &order.lines {
        wtr.serialize(OrderRow {
            size: &line.size,
            cases: line.cases,
        })?;
    }
    wtr.flush()?;
    Ok(())
}

/// Writes a `Size,Count` warehouse template with every count left blank
pub fn write_needed_template<W: Write>(sizes: &[SizeCount], output: W) -> Result<()> {
    let mut wtr = WriterBuilder::new().has_headers(true).from_writer(output);
    for size in sizes {
        wtr.serialize(NeededRow {
            size: &size.size,
            count: None,
        })?;
    }
    wtr.flush()?;
    Ok(())
}

/// Writes one order file per vendor and the needed-filters template into
/// `dir`, returning the paths written
pub fn export_orders(
    orders: &[VendorOrder],
    sizes: &[SizeCount],
    dir: &Path,
) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir)?;
    let mut written = Vec::new();

    for order in orders {
        let path = dir.join(order_file_name(&order.vendor));
        write_vendor_order(order, File::create(&path)?)?;
        written.push(path);
    }

    let template = dir.join(NEEDED_TEMPLATE_FILE);
    write_needed_template(sizes, File::create(&template)?)?;
    written.push(template);

    info!("Wrote {} order files to {}", written.len(), dir.display());
    Ok(written)
}

pub fn read_counts<R: Read>(input: R) -> Result<Vec<SizeCount>> {
    let mut reader = csv::Reader::from_reader(input);
    let mut counts = Vec::new();
    for result in reader.deserialize() {
        let row: SizeCount = result?;
        counts.push(row);
    }
    Ok(counts)
}

pub fn read_catalog<R: Read>(input: R) -> Result<Vec<CatalogEntry>> {
    let mut reader = csv::Reader::from_reader(input);
    let mut catalog = Vec::new();
    for result in reader.deserialize() {
        let row: CatalogEntry = result?;
        catalog.push(row);
    }
    Ok(catalog)
}

/// Warehouse stock minus everything installed and everything still due this
/// month, for every size found in homes
pub fn inventory(
    in_homes: &[SizeCount],
    this_month: &[SizeCount],
    warehouse: &[SizeCount],
) -> Vec<InventoryLine> {
    let lookup = |counts: &[SizeCount], size: &str| -> i64 {
        counts
            .iter()
            .find(|c| c.size == size)
            .map(|c| c.count as i64)
            .unwrap_or(0)
    };

    in_homes
        .iter()
        .map(|home| {
            let in_warehouse = lookup(warehouse, &home.size);
            let needed_this_month = lookup(this_month, &home.size);
            let needed_next_month = home.count as i64;
            InventoryLine {
                size: home.size.clone(),
                in_warehouse,
                needed_this_month,
                needed_next_month,
                remainder: in_warehouse - needed_next_month - needed_this_month,
            }
        })
        .collect()
}

/// Cases to order per vendor for every size running short
pub fn vendor_orders(lines: &[InventoryLine], catalog: &[CatalogEntry]) -> Vec<VendorOrder> {
    let mut by_vendor: BTreeMap<String, Vec<VendorLine>> = BTreeMap::new();

    for line in lines.iter().filter(|l| l.remainder < 0) {
        let Some(item) = catalog.iter().find(|c| c.size == line.size) else {
            warn!("Size {} is not in the filter catalog", line.size);
            continue;
        };
        if item.quantity_per_case == 0 {
            warn!("Catalog lists zero filters per case for {}", item.size);
            continue;
        }

        let needed = line.remainder.unsigned_abs();
        let per_case = u64::from(item.quantity_per_case);
        let cases = needed.div_ceil(per_case) as u32;
        by_vendor.entry(item.vendor.clone()).or_default().push(VendorLine {
            size: line.size.clone(),
            cost: item.cost,
            cases,
            total_cost: item.cost * f64::from(cases),
        });
    }

    by_vendor
        .into_iter()
        .map(|(vendor, lines)| VendorOrder { vendor, lines })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(unit: &str, week: f64, filters: &str) -> RosterEntry {
        RosterEntry {
            unit: unit.to_string(),
            week: Some(week),
            filters: filters.to_string(),
            ..Default::default()
        }
    }

    fn count(size: &str, count: usize) -> SizeCount {
        SizeCount {
            size: size.to_string(),
            count,
        }
    }

    #[test]
    fn expands_quantity_groups() {
        let parser = FilterParser::new().unwrap();
        let sizes = parser.expand_sizes("2:(16 X 25 X 1), 1:(20 X 20 X 1)");
        assert_eq!(sizes, vec!["16 X 25 X 1", "16 X 25 X 1", "20 X 20 X 1"]);
        assert!(parser.expand_sizes("none").is_empty());
    }

    #[test]
    fn counts_only_well_formed_sizes_in_numeric_order() {
        let parser = FilterParser::new().unwrap();
        let roster = vec![
            entry("A", 1.0, "2:(20 X 20 X 1)"),
            entry("B", 2.0, "1:(9 X 30 X 1), 1:(custom)"),
            entry("C", 1.0, "1:(20 X 20 X 1), 1:(14.5 X 20 X 1)"),
        ];

        let counts = parser.count_sizes(&roster);
        assert_eq!(
            counts,
            vec![
                count("9 X 30 X 1", 1),
                count("14.5 X 20 X 1", 1),
                count("20 X 20 X 1", 3),
            ]
        );
    }

    #[test]
    fn shortfall_becomes_cases_per_vendor() {
        let in_homes = vec![count("16 X 25 X 1", 10), count("20 X 20 X 1", 4)];
        let this_month = vec![count("16 X 25 X 1", 3)];
        let warehouse = vec![count("16 X 25 X 1", 5), count("20 X 20 X 1", 6)];

        let lines = inventory(&in_homes, &this_month, &warehouse);
        assert_eq!(lines[0].remainder, 5 - 10 - 3);
        assert_eq!(lines[1].remainder, 2);

        let catalog = vec![CatalogEntry {
            size: "16 X 25 X 1".to_string(),
            vendor: "Filtration Supply".to_string(),
            cost: 42.5,
            quantity_per_case: 12,
        }];
        let orders = vendor_orders(&lines, &catalog);
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].lines[0].cases, 1);
        assert_eq!(orders[0].total_cases(), 1);
        assert!((orders[0].total_cost() - 42.5).abs() < 1e-9);
    }

    #[test]
    fn remaining_counts_default_to_every_roster_week() {
        let parser = FilterParser::new().unwrap();
        let roster = RosterSnapshot::new(vec![
            entry("A", 1.0, "2:(20 X 20 X 1)"),
            entry("B", 3.0, "1:(20 X 20 X 1)"),
            RosterEntry {
                unit: "C".to_string(),
                week: None,
                filters: "1:(20 X 20 X 1)".to_string(),
                ..Default::default()
            },
        ]);

        assert_eq!(
            remaining_counts(&parser, &roster, &[]),
            vec![count("20 X 20 X 1", 3)]
        );
        assert_eq!(
            remaining_counts(&parser, &roster, &[3]),
            vec![count("20 X 20 X 1", 1)]
        );
    }

    #[test]
    fn unselected_weeks_still_raise_the_shortfall() {
        let parser = FilterParser::new().unwrap();
        let roster = RosterSnapshot::new(vec![
            entry("A", 1.0, "4:(16 X 25 X 1)"),
            entry("B", 2.0, "4:(16 X 25 X 1)"),
        ]);
        let in_homes = parser.count_sizes(&roster.entries);
        let this_month = remaining_counts(&parser, &roster, &[]);
        let warehouse = vec![count("16 X 25 X 1", 10)];

        let lines = inventory(&in_homes, &this_month, &warehouse);
        assert_eq!(lines[0].needed_this_month, 8);
        assert_eq!(lines[0].remainder, 10 - 8 - 8);
    }

    #[test]
    fn vendor_file_names_are_slugged() {
        assert_eq!(order_file_name("Filtration Supply Co"), "order_filtration_supply_co.csv");
        assert_eq!(order_file_name("Acme"), "order_acme.csv");
    }

    #[test]
    fn vendor_order_csv_lists_size_and_cases() {
        let order = VendorOrder {
            vendor: "Acme".to_string(),
            lines: vec![VendorLine {
                size: "16 X 25 X 1".to_string(),
                cost: 30.0,
                cases: 2,
                total_cost: 60.0,
            }],
        };
        let mut out = Vec::new();
        write_vendor_order(&order, &mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "Size,Cases\n16 X 25 X 1,2\n");
    }

    #[test]
    fn needed_template_leaves_counts_blank() {
        let mut out = Vec::new();
        write_needed_template(&[count("9 X 30 X 1", 4), count("20 X 20 X 1", 1)], &mut out)
            .unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "Size,Count\n9 X 30 X 1,\n20 X 20 X 1,\n"
        );
    }

    #[test]
    fn exports_one_file_per_vendor_plus_template() {
        let dir = tempfile::tempdir().unwrap();
        let line = |size: &str| VendorLine {
            size: size.to_string(),
            cost: 10.0,
            cases: 1,
            total_cost: 10.0,
        };
        let orders = vec![
            VendorOrder {
                vendor: "Acme".to_string(),
                lines: vec![line("16 X 25 X 1")],
            },
            VendorOrder {
                vendor: "Air Depot".to_string(),
                lines: vec![line("20 X 20 X 1")],
            },
        ];

        let written = export_orders(&orders, &[count("16 X 25 X 1", 2)], dir.path()).unwrap();
        assert_eq!(written.len(), 3);
        assert!(dir.path().join("order_acme.csv").exists());
        assert!(dir.path().join("order_air_depot.csv").exists());
        let template = std::fs::read_to_string(dir.path().join(NEEDED_TEMPLATE_FILE)).unwrap();
        assert_eq!(template, "Size,Count\n16 X 25 X 1,\n");
    }

    #[test]
    fn reads_warehouse_and_catalog_csv() {
        let counts = read_counts("Size,Count\n16 X 25 X 1,4\n".as_bytes()).unwrap();
        assert_eq!(counts, vec![count("16 X 25 X 1", 4)]);

        let catalog = read_catalog(
            "Size,Vendor,Cost,Quantity_Per_Case\n16 X 25 X 1,Acme,30.0,6\n".as_bytes(),
        )
        .unwrap();
        assert_eq!(catalog[0].quantity_per_case, 6);
    }
}
