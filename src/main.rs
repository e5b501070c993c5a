mod db;
mod fetcher;
mod flatten;
mod links;
mod parser;
mod settings;

use std::path::PathBuf;
use std::time::Instant;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::warn;

use flatten::anonymize::Sha256Anonymizer;
use flatten::levels::{LevelSchema, SETS, SET_COMPONENTS, WORKOUTS, WORKOUT_COMPONENTS};
use settings::Settings;

#[derive(Parser)]
#[command(name = "workout_etl", about = "Workout log scraper and flattener")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load workout log URLs into the queue
    Init {
        /// File with one workout log URL per line
        #[arg(short, long)]
        links: PathBuf,
    },
    /// Fetch unvisited workout pages
    Scrape {
        /// Max pages to fetch (default: all unvisited)
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },
    /// Extract and flatten fetched pages into the workout tables
    Process {
        /// Max pages to process (default: all unprocessed)
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },
    /// Scrape + process in one pipeline
    Run {
        /// Max pages to scrape+process
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },
    /// Extract one page and print the nested document as JSON
    Extract {
        /// Saved HTML file, or a workout log URL to fetch
        source: String,
        /// URL a saved file was fetched from (defaults to the source)
        #[arg(short, long)]
        url: Option<String>,
    },
    /// Flatten a nested JSON document and print the records per level
    Flatten {
        /// JSON file holding one workout document
        file: PathBuf,
    },
    /// Show pipeline statistics
    Stats,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();
    let settings = Settings::load()?;

    let result = match cli.command {
        Commands::Init { links: path } => {
            let conn = db::connect(&settings.db_path)?;
            db::init_schema(&conn)?;
            let pages = links::read_link_file(&path)?;
            let inserted = db::insert_pages(&conn, &pages)?;
            println!("Inserted {} new workout URLs ({} total found)", inserted, pages.len());
            Ok(())
        }
        Commands::Scrape { limit } => {
            let conn = db::connect(&settings.db_path)?;
            db::init_schema(&conn)?;
            let pages = db::fetch_unvisited(&conn, limit)?;
            if pages.is_empty() {
                println!("No unvisited pages. Run 'init' first or all pages are fetched.");
                return Ok(());
            }
            println!("Fetching {} pages (streaming to DB)...", pages.len());
            let stats = fetcher::fetch_pages_streaming(&conn, &settings, pages).await?;
            println!(
                "Done: {} fetched ({} ok, {} errors).",
                stats.total, stats.ok, stats.errors
            );
            Ok(())
        }
        Commands::Process { limit } => {
            let conn = db::connect(&settings.db_path)?;
            db::init_schema(&conn)?;
            let pages = db::fetch_unprocessed(&conn, limit)?;
            if pages.is_empty() {
                println!("No unprocessed pages. Run 'scrape' first.");
                return Ok(());
            }
            println!("Processing {} pages...", pages.len());
            let counts = process_pages(&conn, &settings, &pages)?;
            counts.print();
            Ok(())
        }
        Commands::Run { limit } => {
            let conn = db::connect(&settings.db_path)?;
            db::init_schema(&conn)?;
            let pages = db::fetch_unvisited(&conn, limit)?;
            if pages.is_empty() {
                println!("No unvisited pages. Run 'init' first.");
                return Ok(());
            }

            // Phase 1: Fetch (streaming to DB)
            let t_fetch = Instant::now();
            println!("Pipeline: fetching {} pages (streaming to DB)...", pages.len());
            let stats = fetcher::fetch_pages_streaming(&conn, &settings, pages).await?;
            println!(
                "Fetched {} pages ({} ok, {} errors) in {:.1}s",
                stats.total, stats.ok, stats.errors, t_fetch.elapsed().as_secs_f64()
            );

            // Phase 2: Process
            let t_process = Instant::now();
            let unprocessed = db::fetch_unprocessed(&conn, None)?;
            if unprocessed.is_empty() {
                println!("Nothing to process (all fetched pages had errors).");
                return Ok(());
            }
            println!("Processing {} pages...", unprocessed.len());
            let counts = process_pages(&conn, &settings, &unprocessed)?;
            println!("Processed in {:.1}s", t_process.elapsed().as_secs_f64());
            counts.print();
            Ok(())
        }
        Commands::Extract { source, url } => {
            let html = if source.starts_with("http://") || source.starts_with("https://") {
                fetcher::fetch_single_page(&settings, &source).await?
            } else {
                std::fs::read_to_string(&source).with_context(|| format!("Failed to read {}", source))?
            };
            let url = url.unwrap_or(source);
            let doc = parser::extract::extract(&html, &url)?;
            println!("{}", serde_json::to_string_pretty(&doc)?);
            Ok(())
        }
        Commands::Flatten { file } => {
            let raw = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let root: serde_json::Value = serde_json::from_str(&raw)
                .with_context(|| format!("{} is not valid JSON", file.display()))?;
            let anonymizer = Sha256Anonymizer::new(&settings.anon_salt);
            let flat = flatten::flatten(&root, &LevelSchema::workout(), &anonymizer)?;
            println!("{}", serde_json::to_string_pretty(&flat)?);
            Ok(())
        }
        Commands::Stats => {
            let conn = db::connect(&settings.db_path)?;
            db::init_schema(&conn)?;
            let s = db::get_stats(&conn)?;
            println!("Total:        {}", s.total);
            println!("Visited:      {}", s.visited);
            println!("Unvisited:    {}", s.unvisited);
            println!("Fetched:      {}", s.scraped);
            println!("Fetch errors: {}", s.fetch_errors);
            println!("Processed:    {}", s.processed);
            println!("Parse errors: {}", s.parse_errors);
            println!("Workouts:     {}", s.workouts);
            println!("Set entries:  {}", s.set_components);
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

#[derive(Default)]
struct ProcessCounts {
    pages: usize,
    failed: usize,
    workouts: usize,
    components: usize,
    sets: usize,
    entries: usize,
}

impl ProcessCounts {
    fn print(&self) {
        println!(
            "Saved {} workouts, {} components, {} sets, {} set entries ({} of {} pages failed).",
            self.workouts, self.components, self.sets, self.entries, self.failed, self.pages,
        );
    }
}

fn process_pages(
    conn: &rusqlite::Connection,
    settings: &Settings,
    pages: &[db::ScrapedPage],
) -> anyhow::Result<ProcessCounts> {
    use indicatif::{ProgressBar, ProgressStyle};
    use rayon::prelude::*;

    let pb = ProgressBar::new(pages.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec})")?
            .progress_chars("#>-"),
    );

    let schema = LevelSchema::workout();
    let anonymizer = Sha256Anonymizer::new(&settings.anon_salt);
    let mut counts = ProcessCounts::default();

    for chunk in pages.chunks(settings.chunk_size.max(1)) {
        let results: Vec<_> = chunk
            .par_iter()
            .map(|page| parser::process_page(page, &schema, &anonymizer))
            .collect();

        let mut flattened = Vec::new();
        let mut outcomes = Vec::with_capacity(results.len());

        for done in results {
            counts.pages += 1;
            match done.outcome {
                Ok(flat) => {
                    counts.workouts += flat.records(WORKOUTS).len();
                    counts.components += flat.records(WORKOUT_COMPONENTS).len();
                    counts.sets += flat.records(SETS).len();
                    counts.entries += flat.records(SET_COMPONENTS).len();
                    flattened.push(flat);
                    outcomes.push((done.page_data_id, None));
                }
                Err(e) => {
                    warn!("Skipping {}: {}", done.url, e);
                    counts.failed += 1;
                    outcomes.push((done.page_data_id, Some(e.to_string())));
                }
            }
        }

        db::save_flattened(conn, &flattened)?;
        db::mark_processed(conn, &outcomes)?;
        pb.inc(chunk.len() as u64);
    }

    pb.finish_and_clear();
    Ok(counts)
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
