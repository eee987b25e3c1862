use std::fs::File;
use std::path::PathBuf;

use anyhow::Context;
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use air_filter_schedule::config::AppConfig;
use air_filter_schedule::display::{print_orders, print_resolution, print_schedule, print_workload};
use air_filter_schedule::export::{deliverable_file_name, export_deliverable, materialize};
use air_filter_schedule::ordering::{
    export_orders, inventory, read_catalog, read_counts, remaining_counts, vendor_orders,
    FilterParser,
};
use air_filter_schedule::parser::{load_stays, parse_date};
use air_filter_schedule::planner::plan_next_week;
use air_filter_schedule::roster::{CsvRoster, RosterSource};
use air_filter_schedule::schedule::{resolve_window, AssignmentPolicy};
use air_filter_schedule::web;

#[derive(Parser)]
#[command(name = "air-filter-schedule")]
#[command(about = "Plans weekly air-filter changes around guest stays", long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the current and next scheduling week
    Weeks {
        #[arg(long, value_parser = parse_date_arg)]
        date: Option<NaiveDate>,
    },
    /// Plan next week's filter changes and write the deliverable CSV
    Schedule {
        #[arg(long)]
        stays: PathBuf,
        #[arg(long)]
        roster: PathBuf,
        #[arg(long, value_parser = parse_date_arg)]
        date: Option<NaiveDate>,
        #[arg(long)]
        policy: Option<AssignmentPolicy>,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Work out filter orders per vendor
    Order {
        #[arg(long)]
        roster: PathBuf,
        #[arg(long)]
        warehouse: PathBuf,
        #[arg(long)]
        catalog: PathBuf,
        /// Weeks of this month still to be serviced, every roster week by default
        #[arg(long, value_delimiter = ',')]
        weeks: Vec<usize>,
        /// Directory for per-vendor order files and the needed-filters template
        #[arg(long)]
        out_dir: Option<PathBuf>,
    },
    /// Start the HTTP server
    Web {
        #[arg(long)]
        port: Option<u16>,
    },
}

fn parse_date_arg(value: &str) -> Result<NaiveDate, String> {
    parse_date(value).ok_or_else(|| format!("unrecognised date '{}'", value))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let mut config = AppConfig::load(cli.config.as_deref()).context("failed to load configuration")?;
    let today = || Local::now().date_naive();

    match cli.command {
        Commands::Weeks { date } => {
            let date = date.unwrap_or_else(today);
            print_resolution(date, &resolve_window(date, &config.layout()));
        }
        Commands::Schedule {
            stays,
            roster,
            date,
            policy,
            out,
        } => {
            let report = load_stays(&stays)
                .with_context(|| format!("failed to read stays from {}", stays.display()))?;
            let roster = CsvRoster::new(&roster)
                .fetch()
                .with_context(|| format!("failed to read roster from {}", roster.display()))?;

            let mut options = config.engine_options();
            if let Some(policy) = policy {
                options.policy = policy;
            }

            let plan = match plan_next_week(
                &report.stays,
                &roster,
                date.unwrap_or_else(today),
                &config,
                &options,
            ) {
                Ok(plan) => plan,
                Err(reason) => {
                    println!("Nothing to schedule: {}", reason);
                    return Ok(());
                }
            };

            print_workload(&plan.result);
            print_schedule(&materialize(&plan.result.assignments));

            let out = out.unwrap_or_else(|| PathBuf::from(deliverable_file_name(&plan.window)));
            export_deliverable(&plan.rows, &out)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("\nSchedule saved to {}", out.display());
        }
        Commands::Order {
            roster,
            warehouse,
            catalog,
            weeks,
            out_dir,
        } => {
            let roster = CsvRoster::new(&roster)
                .fetch()
                .with_context(|| format!("failed to read roster from {}", roster.display()))?;
            let warehouse = read_counts(
                File::open(&warehouse)
                    .with_context(|| format!("failed to open {}", warehouse.display()))?,
            )?;
            let catalog = read_catalog(
                File::open(&catalog).with_context(|| format!("failed to open {}", catalog.display()))?,
            )?;

            let parser = FilterParser::new()?;
            let in_homes = parser.count_sizes(&roster.entries);
            let this_month = remaining_counts(&parser, &roster, &weeks);

            let lines = inventory(&in_homes, &this_month, &warehouse);
            let orders = vendor_orders(&lines, &catalog);
            print_orders(&orders);

            if let Some(dir) = out_dir {
                let written = export_orders(&orders, &in_homes, &dir)
                    .with_context(|| format!("failed to write orders to {}", dir.display()))?;
                println!("\nOrder files saved:");
                for path in written {
                    println!("  - {}", path.display());
                }
            }
        }
        Commands::Web { port } => {
            if let Some(port) = port {
                config.server.port = port;
            }
            let password = std::env::var("ADMIN_PASSWORD")
                .context("ADMIN_PASSWORD must be set to start the web server")?;

            info!("Starting web server on port {}", config.server.port);
            web::start_server(config, password).await?;
        }
    }

    Ok(())
}
