use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;

use covercat::catalog::{Catalog, CoverageTable, FormatTable, SeriesTable};
use covercat::coverage::CoverageContext;
use covercat::Config;

/// Print the series, formats and coverage rows of a catalog database
#[derive(Parser, Debug)]
#[command(name = "inspect_catalog")]
struct Args {
    /// Path to the SQLite catalog database
    database: PathBuf,

    /// Only show this series
    #[arg(short, long)]
    series: Option<String>,

    /// Maximum number of coverage rows printed per series
    #[arg(short, long, default_value = "20")]
    limit: usize,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let config = Config::default();

    println!("Inspecting catalog: {}", args.database.display());
    let catalog = Arc::new(
        Catalog::open_path(&args.database, &config)
            .with_context(|| format!("opening {}", args.database.display()))?,
    );
    let context = Arc::new(CoverageContext::new(&config.cache));
    let formats = FormatTable::new(catalog.clone());

    let series = SeriesTable::new(catalog.clone())
        .list()
        .context("reading the series table")?;

    for series in series
        .iter()
        .filter(|s| args.series.as_deref().map_or(true, |name| s.name == name))
    {
        println!("\n=== SERIES {} (id {}) ===", series.name, series.id);
        if let Some(remarks) = &series.remarks {
            println!("  {}", remarks);
        }
        if let Some(period) = series.period {
            println!("  period: {} h", period.num_hours());
        }

        println!("\nSubseries:");
        for subseries in &series.subseries {
            println!(
                "  {} (id {}) format={} path={}",
                subseries.name,
                subseries.id,
                subseries.format,
                catalog.resolve_directory(&subseries.path).display()
            );
            match formats.get(&subseries.format) {
                Ok(format) => {
                    println!(
                        "    {} [{}] .{} geophysics={}",
                        format.name, format.mime, format.extension, format.geophysics
                    );
                    for dimension in &format.sample_dimensions {
                        println!(
                            "    band {} units={}",
                            dimension.band,
                            dimension.units.as_deref().unwrap_or("-")
                        );
                        for category in &dimension.categories {
                            let kind = if category.is_quantitative() {
                                "quantitative"
                            } else {
                                "qualitative"
                            };
                            println!(
                                "      [{}..{}] {} ({}, {} colors)",
                                category.lower,
                                category.upper,
                                category.name,
                                kind,
                                category.colors.len()
                            );
                        }
                    }
                }
                Err(e) => println!("    Error reading format: {}", e),
            }
        }

        let table = CoverageTable::new(catalog.clone(), context.clone(), &series.name)?;
        match table.records() {
            Ok(records) => {
                println!("\nCoverages ({} rows):", records.len());
                for record in records.iter().take(args.limit) {
                    let time = |t: Option<chrono::DateTime<chrono::Utc>>| {
                        t.map_or_else(|| "-".to_string(), |t| t.to_rfc3339())
                    };
                    println!(
                        "  {} {} .. {} subseries={} extent={}",
                        record.filename,
                        time(record.time_range.start),
                        time(record.time_range.end),
                        record.subseries,
                        record.extent
                    );
                }
                if records.len() > args.limit {
                    println!("  ... {} more", records.len() - args.limit);
                }
            }
            Err(e) => println!("  Error reading coverages: {}", e),
        }
    }

    formats.release();
    Ok(())
}
