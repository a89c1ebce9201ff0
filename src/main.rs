mod model;
mod pipeline;
mod settings;
mod store;

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::Result;
use chrono::{DateTime, Local};
use clap::{Args, Parser, Subcommand};
use tracing::info;

use model::{CanonicalRecord, Listings, Statistics};
use pipeline::ListingSorter;
use settings::Criteria;

#[derive(Parser)]
#[command(name = "listing_sorter", about = "Sort scraped rental listings into valid and rejected")]
struct Cli {
    #[command(flatten)]
    criteria: CriteriaArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct CriteriaArgs {
    /// Lowest acceptable rent (inclusive)
    #[arg(long, global = true)]
    min_price: Option<f64>,
    /// Highest acceptable rent (inclusive)
    #[arg(long, global = true)]
    max_price: Option<f64>,
    /// Smallest acceptable surface in m²
    #[arg(long, global = true)]
    min_surface: Option<f64>,
}

#[derive(Subcommand)]
enum Commands {
    /// List the default data files found in the working directory
    Files,
    /// Sort a listing snapshot and print statistics
    Sort {
        /// Snapshot to read (default: first data file found)
        input: Option<PathBuf>,
        /// Write statistics and both listing sets to this file
        #[arg(short, long)]
        export: Option<PathBuf>,
    },
    /// Print statistics only
    Stats {
        input: Option<PathBuf>,
    },
    /// Listings table
    Show {
        input: Option<PathBuf>,
        /// Show rejected listings instead of valid ones
        #[arg(short, long)]
        rejected: bool,
        /// Max rows to display
        #[arg(short = 'n', long, default_value = "50")]
        limit: usize,
    },
}

fn main() -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "listing_sorter=info".into());
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Files => {
            let files = store::discover(Path::new("."));
            if files.is_empty() {
                println!("No data file found. Run the scraper first or place a snapshot here.");
                return Ok(());
            }
            println!("{:<28} | {:>8} | {:<19}", "File", "Entries", "Modified");
            println!("{}", "-".repeat(62));
            for f in &files {
                let modified = f
                    .modified
                    .map(|t| DateTime::<Local>::from(t).format("%Y-%m-%d %H:%M:%S").to_string())
                    .unwrap_or_else(|| "-".into());
                println!(
                    "{:<28} | {:>8} | {:<19}",
                    truncate(&f.path.display().to_string(), 28),
                    f.entries,
                    modified
                );
            }
            Ok(())
        }
        Commands::Sort { input, export } => {
            let sorter = run_pipeline(input.as_deref(), &cli.criteria)?;
            print_stats(sorter.statistics());
            report_skipped(&sorter);
            if let Some(path) = export {
                sorter.export_results(&path)?;
                println!("Results exported to {}", path.display());
            }
            Ok(())
        }
        Commands::Stats { input } => {
            let sorter = run_pipeline(input.as_deref(), &cli.criteria)?;
            print_stats(sorter.statistics());
            report_skipped(&sorter);
            Ok(())
        }
        Commands::Show {
            input,
            rejected,
            limit,
        } => {
            let sorter = run_pipeline(input.as_deref(), &cli.criteria)?;
            let (label, rows) = if rejected {
                ("rejected", sorter.rejected())
            } else {
                ("valid", sorter.valid())
            };
            if rows.is_empty() {
                println!("No {} listings.", label);
                return Ok(());
            }
            print_table(rows, limit);
            println!("\n{} {} listings", rows.len(), label);
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

fn run_pipeline(input: Option<&Path>, args: &CriteriaArgs) -> Result<ListingSorter> {
    let criteria = Criteria::load()?.with_overrides(args.min_price, args.max_price, args.min_surface)?;
    let path = store::resolve_input(input, Path::new("."))?;
    let raw = store::load_records(&path)?;
    let sorter = ListingSorter::new(&raw, criteria);
    let c = sorter.criteria();
    info!(
        "Sorted {} (price {}-{}, surface >= {} m²)",
        path.display(),
        c.min_price,
        c.max_price,
        c.min_surface
    );
    Ok(sorter)
}

fn report_skipped(sorter: &ListingSorter) {
    let n = sorter.skipped().len();
    if n > 0 {
        println!(
            "{} records skipped during normalization ({} kept)",
            n,
            sorter.total_count()
        );
    }
}

fn print_stats(s: &Statistics) {
    println!("{}", "=".repeat(50));
    println!("Total:           {}", s.total_listings);
    println!("Valid:           {}", s.valid_count);
    println!("Rejected:        {}", s.rejected_count);
    println!("Validation rate: {}%", s.validation_rate);
    println!("Average price:   {} €", s.average_price);
    println!("Average surface: {} m²", s.average_surface);
    println!("{}", "=".repeat(50));
}

fn print_table(rows: &Listings, limit: usize) {
    println!(
        "{:<16} | {:>10} | {:<18} | {:<20} | {:>7} | {:>6} | {:<24} | {:<28}",
        "Key", "Price", "Type", "Location", "Surface", "Rooms", "Amenities", "Outcome"
    );
    println!("{}", "-".repeat(150));

    for (key, r) in rows.iter().take(limit) {
        let surface = r
            .resolved_surface()
            .map(|s| format!("{} m²", s))
            .unwrap_or_else(|| "-".into());
        let rooms = r
            .resolved_rooms()
            .map(|n| n.to_string())
            .unwrap_or_else(|| "-".into());
        let outcome = r.outcome.as_ref().map(|o| o.reason_text()).unwrap_or_default();

        println!(
            "{:<16} | {:>10} | {:<18} | {:<20} | {:>7} | {:>6} | {:<24} | {:<28}",
            truncate(key, 16),
            truncate(&r.price_raw.to_string(), 10),
            truncate(&r.property_type, 18),
            truncate(&r.location, 20),
            surface,
            rooms,
            truncate(&amenities(r), 24),
            truncate(&outcome, 28),
        );
    }

    // Links last so the table stays narrow
    let with_links: Vec<_> = rows
        .iter()
        .take(limit)
        .filter_map(|(k, r)| r.link.as_deref().map(|l| (k, l)))
        .collect();
    if !with_links.is_empty() {
        println!("\n--- Links ---");
        for (key, link) in with_links {
            println!("  {}: {}", truncate(key, 16), link);
        }
    }
}

/// Features that are not surface, rooms or floor; first three.
fn amenities(r: &CanonicalRecord) -> String {
    r.features
        .iter()
        .filter(|f| !f.contains("Étage") && !f.contains("m²") && !f.contains("pièce"))
        .take(3)
        .cloned()
        .collect::<Vec<_>>()
        .join(", ")
}

/// Cut a table cell to `width` characters, marking the cut with `…`.
fn truncate(cell: &str, width: usize) -> String {
    match cell.char_indices().nth(width) {
        Some((cut, _)) => format!("{}…", &cell[..cut]),
        None => cell.to_string(),
    }
}

fn format_duration(d: Duration) -> String {
    let (mins, secs) = (d.as_secs() / 60, d.as_secs() % 60);
    match mins {
        0 => format!("{:.1}s", d.as_secs_f64()),
        m if m < 60 => format!("{}m {:02}s", m, secs),
        m => format!("{}h {:02}m {:02}s", m / 60, m % 60, secs),
    }
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_counts_characters() {
        assert_eq!(truncate("Dijon", 10), "Dijon");
        assert_eq!(truncate("Appartement meublé", 11), "Appartement…");
        assert_eq!(truncate("Étage 2/4", 5), "Étage…");
    }

    #[test]
    fn durations() {
        assert_eq!(format_duration(Duration::from_millis(2500)), "2.5s");
        assert_eq!(format_duration(Duration::from_secs(125)), "2m 05s");
        assert_eq!(format_duration(Duration::from_secs(3725)), "1h 02m 05s");
    }
}
