//! # CASEFORGE Simulator
//!
//! Opens cases from many threads against the in-memory catalog and prints
//! the observed rarity histogram next to the configured chances.
//!
//! ```bash
//! # Defaults: data/catalog.toml, built-in rarity table
//! cargo run --release --bin caseforge_sim -- --case chroma --users 16 --opens 2000
//!
//! # Reproducible run with a custom table
//! RUST_LOG=debug cargo run --bin caseforge_sim -- --config data/config.toml --seed 7
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use caseforge::{SimulationPlan, SimulationReport};
use caseforge_economy::{CaseId, EconomyConfig, FixedPoint, MemoryStore};
use clap::Parser;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Concurrent case-opening simulation")]
struct Args {
    /// Economy config (rarities, limits, leveling). Built-in defaults if omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Catalog of items, cases and users.
    #[arg(long, default_value = "data/catalog.toml")]
    catalog: PathBuf,

    /// Case every simulated user opens.
    #[arg(long, default_value = "chroma")]
    case: String,

    /// Concurrent simulated users.
    #[arg(short, long, default_value_t = 8)]
    users: usize,

    /// Open requests per user.
    #[arg(short, long, default_value_t = 1000)]
    opens: u32,

    /// Cases per request.
    #[arg(short, long, default_value_t = 5)]
    quantity: u32,

    /// Starting balance per user. Enough for every request if omitted.
    #[arg(long)]
    balance: Option<FixedPoint>,

    /// Seed for a reproducible run.
    #[arg(long)]
    seed: Option<u64>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => EconomyConfig::from_toml(path)?,
        None => EconomyConfig::default(),
    };
    let store = Arc::new(MemoryStore::from_toml(&args.catalog)?);

    let plan = SimulationPlan {
        case_id: CaseId::new(args.case),
        users: args.users,
        opens_per_user: args.opens,
        quantity: args.quantity,
        balance: args.balance,
        seed: args.seed,
    };

    let report = caseforge::run(&config, &store, &plan)?;
    print_report(&plan, &report);
    Ok(())
}

fn print_report(plan: &SimulationPlan, report: &SimulationReport) {
    println!("═══════════════════════════════════════════════════════════════════");
    println!("                    CASEFORGE SIMULATION: {}", plan.case_id);
    println!("═══════════════════════════════════════════════════════════════════");
    println!();
    println!("  Users:      {}", plan.users);
    println!("  Openings:   {}", report.openings);
    println!("  Draws:      {}", report.stats.total_draws);
    println!("  Elapsed:    {:?}", report.elapsed);
    println!();
    println!("  {:<10} {:>12} {:>12} {:>10}", "RARITY", "CONFIGURED", "OBSERVED", "COUNT");
    for row in report.rows() {
        let configured = row
            .configured
            .map_or_else(|| "-".to_owned(), |chance| format!("{:.4}%", chance * 100.0));
        println!(
            "  {:<10} {:>12} {:>11.4}% {:>10}",
            row.rarity.as_str(),
            configured,
            row.observed * 100.0,
            row.count
        );
    }
    println!();

    if !report.rejections.is_empty() {
        println!("  Rejected requests:");
        let mut rejections: Vec<_> = report.rejections.iter().collect();
        rejections.sort();
        for (message, count) in rejections {
            println!("    {count:>8}  {message}");
        }
        println!();
    }

    println!(
        "  Events:     {} caseOpened, {} userDataUpdated ({} dropped)",
        report.global_events, report.private_events, report.broadcast.dropped
    );
    println!("═══════════════════════════════════════════════════════════════════");
}
