mod config;
mod dataset;
mod error;
mod http;
mod links;
mod report;
mod scrub;
mod table;

use std::path::PathBuf;
use std::time::{Duration, Instant};

use clap::{Parser, Subcommand};
use tracing::{info, warn};

use config::Settings;
use error::StageError;
use http::Fetcher;

#[derive(Parser)]
#[command(name = "crash_scraper", about = "Plane crash database scraper and scrubber")]
struct Cli {
    /// Settings file (TOML). Defaults to ./crash_scraper.toml when present.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory for every intermediate and output file
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Collect year-index links from the database page
    Links,
    /// Collect crash-page links from every year-index page
    Expand,
    /// Keep only links that look like crash pages
    Filter,
    /// Turn relative crash-page links into absolute URLs
    Repair,
    /// Fetch crash pages and append their tables to the raw table
    Extract {
        /// Max pages to fetch (default: all)
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },
    /// Rebuild the scrubbed dataset from the raw table
    Scrub,
    /// Links, expand, filter, repair, extract and scrub in one go
    Run {
        /// Max crash pages to fetch
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },
    /// Statistics and charts over the scrubbed dataset
    Report {
        /// Also write the report as JSON
        #[arg(long)]
        json: bool,
    },
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();
}

fn main() -> anyhow::Result<()> {
    init_tracing();

    let t0 = Instant::now();
    let cli = Cli::parse();

    let mut settings = Settings::load(cli.config.as_deref())?;
    if let Some(dir) = cli.data_dir {
        settings.paths.data_dir = dir;
    }
    info!(data_dir = %settings.paths.data_dir.display(), layout = ?settings.raw_layout, "settings loaded");

    match cli.command {
        Commands::Links => {
            let fetcher = Fetcher::new(&settings.http)?;
            run_links(&settings, &fetcher);
        }
        Commands::Expand => {
            let fetcher = Fetcher::new(&settings.http)?;
            run_expand(&settings, &fetcher);
        }
        Commands::Filter => run_filter(&settings),
        Commands::Repair => run_repair(&settings),
        Commands::Extract { limit } => {
            let fetcher = Fetcher::new(&settings.http)?;
            run_extract(&settings, &fetcher, limit);
        }
        Commands::Scrub => run_scrub(&settings),
        Commands::Run { limit } => {
            let fetcher = Fetcher::new(&settings.http)?;
            run_links(&settings, &fetcher);
            run_expand(&settings, &fetcher);
            run_filter(&settings);
            run_repair(&settings);
            run_extract(&settings, &fetcher, limit);
            run_scrub(&settings);
        }
        Commands::Report { json } => run_report(&settings, json)?,
    }

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }
    Ok(())
}

// ── Stages ──
// Each stage reports its own failure and returns; later stages still run.

fn report_failure(stage: &str, err: StageError) {
    warn!("{} skipped: {}", stage, err);
}

fn run_links(settings: &Settings, fetcher: &Fetcher) {
    let url = settings.site.index_url();
    let out = settings.paths.year_index();
    match links::collect_links(fetcher, &url, &out, links::WriteMode::Overwrite) {
        Ok(n) => println!("Extracted {} links from {} into {}", n, url, out.display()),
        Err(e) => report_failure("links", e),
    }
}

fn run_expand(settings: &Settings, fetcher: &Fetcher) {
    let out = settings.paths.crash_pages();
    match links::expand_index(
        fetcher,
        settings.site.base(),
        &settings.paths.year_index(),
        &out,
        delay(settings),
    ) {
        Ok(s) => println!(
            "Processed {} year pages ({} failed), {} links appended to {}",
            s.pages,
            s.failed,
            s.links,
            out.display()
        ),
        Err(e) => report_failure("expand", e),
    }
}

fn run_filter(settings: &Settings) {
    let out = settings.paths.crash_pages_clean();
    match links::filter_crash_links(&settings.paths.crash_pages(), &out) {
        Ok(s) => println!("Kept {} links, filtered {}. Saved to {}", s.kept, s.dropped, out.display()),
        Err(e) => report_failure("filter", e),
    }
}

fn run_repair(settings: &Settings) {
    let out = settings.paths.crash_urls();
    match links::repair_urls(settings.site.base(), &settings.paths.crash_pages_clean(), &out) {
        Ok(n) => println!("Wrote {} crash-page URLs to {}", n, out.display()),
        Err(e) => report_failure("repair", e),
    }
}

fn run_extract(settings: &Settings, fetcher: &Fetcher, limit: Option<usize>) {
    let out = settings.paths.raw_table();
    match table::extract_all(
        fetcher,
        &settings.paths.crash_urls(),
        &out,
        settings.raw_layout,
        delay(settings),
        limit,
    ) {
        Ok(s) => println!(
            "Extracted {} pages ({} ok, {} skipped) into {}",
            s.total,
            s.ok,
            s.failed,
            out.display()
        ),
        Err(e) => report_failure("extract", e),
    }
}

fn run_scrub(settings: &Settings) {
    let out = settings.paths.scrubbed();
    match scrub::scrub_file(&settings.paths.raw_table(), &out, settings.raw_layout) {
        Ok(s) => {
            println!("Scrubbed {} records into {}", s.records, out.display());
            if s.duplicate_datetimes > 0 {
                println!(
                    "  {} records share a DateTime with an earlier one; ids also use the location",
                    s.duplicate_datetimes
                );
            }
            if s.null_datetimes > 0 {
                println!("  {} records have no usable DateTime", s.null_datetimes);
            }
            if s.unmatched_aboard + s.unmatched_fatalities > 0 {
                println!(
                    "  counts defaulted to 0: {} aboard, {} fatalities ({} aboard entries contain '?')",
                    s.unmatched_aboard, s.unmatched_fatalities, s.aboard_with_unknowns
                );
            }
        }
        Err(e) => report_failure("scrub", e),
    }
}

fn run_report(settings: &Settings, json: bool) -> anyhow::Result<()> {
    let records = match dataset::read_records(&settings.paths.scrubbed()) {
        Ok(r) => r,
        Err(e) => {
            report_failure("report", e);
            return Ok(());
        }
    };
    let report = report::build(&records);
    report::render::print_report(&report);

    if json {
        let path = settings.paths.report();
        report::write_json(&path, &report)?;
        println!("\nReport written to {}", path.display());
    }
    Ok(())
}

fn delay(settings: &Settings) -> Duration {
    Duration::from_millis(settings.http.request_delay_ms)
}

fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
