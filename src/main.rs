//! # apocrawl CLI Application
//!
//! This module implements the command-line interface for apocrawl.
//!
//! ## Key Components
//!
//! - CLI argument parsing with clap
//! - Subcommands:
//!   - `crawl`: resolve homepages for a range of entities and crawl them
//!   - `check`: audit an output directory for incomplete entities
//!
//! ## Features
//!
//! - Resumable runs (`--resume`, also spelled `--continue-scraper`)
//! - Graceful Ctrl-C: the current page finishes, the next one is not started
//! - Progress tracking over the entity range
//! - Logs on stderr and in `<log-dir>/crawler.log`; entity failures are
//!   additionally appended to `<log-dir>/errors.txt`

mod telemetry;

use anyhow::Context;
use apocrawl::crawler::{CrawlerConfig, HttpFetcher, JsonFileStore, RecursiveCrawler};
use apocrawl::entity::{InputOptions, load_entities, select_range};
use apocrawl::orchestrator::{EntityCrawlOrchestrator, ErrorLog, check_output};
use apocrawl::resolver::{ContentValidator, HomepageResolver, MatchPolicy};
use apocrawl::search::{DEFAULT_SEARCH_ENDPOINT, WebSearchProvider};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{info, instrument, warn};

#[derive(Parser)]
#[command(author, version, about = "Find and archive the websites of businesses known only by name and address", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Resolve homepages for a range of entities and crawl them
    Crawl(CrawlArgs),

    /// Report entities without an overview or without homepages
    Check(CheckArgs),
}

#[derive(Args, Debug)]
struct CrawlArgs {
    /// Entity table (columns name, street, zip, city)
    #[arg(required = true)]
    input: PathBuf,

    /// Directory receiving overview, frontier and page records
    #[arg(short, long, default_value = "output")]
    output_dir: PathBuf,

    /// Directory for crawler.log and errors.txt
    #[arg(long, default_value = "log")]
    log_dir: PathBuf,

    /// Column delimiter of the entity table
    #[arg(long, default_value_t = ';')]
    delimiter: char,

    /// Text encoding of the entity table
    #[arg(long, default_value = "windows-1252")]
    encoding: String,

    /// Number of search results to consider per entity
    #[arg(short = 'q', long, default_value = "10")]
    search_qty: usize,

    /// First entity index to process
    #[arg(short, long, default_value = "0")]
    start_index: usize,

    /// Last entity index to process (inclusive, defaults to the last row)
    #[arg(short, long)]
    end_index: Option<usize>,

    /// Continue a previous run, keeping stored overviews and pages
    #[arg(short, long, visible_alias = "continue-scraper")]
    resume: bool,

    /// Maximum number of fetches per homepage
    #[arg(short = 'p', long, default_value = "100")]
    max_pages: usize,

    /// Search endpoint queried for homepage candidates
    #[arg(long, default_value = DEFAULT_SEARCH_ENDPOINT)]
    search_url: String,

    /// How many identifying fields a candidate page must mention
    #[arg(long, value_enum, default_value_t = MatchPolicy::Any)]
    match_policy: MatchPolicy,

    /// Minimum similarity score (exclusive) for ranked search results, 50 to 99
    #[arg(long, default_value = "50", value_parser = clap::value_parser!(u8).range(50..100))]
    min_score: u8,

    /// Request timeout in milliseconds
    #[arg(long, default_value = "30000")]
    timeout_ms: u64,

    /// Connect timeout in milliseconds
    #[arg(long, default_value = "10000")]
    connect_timeout_ms: u64,

    /// Retries after a transport error
    #[arg(long, default_value = "2")]
    retries: u32,

    /// Initial retry backoff in milliseconds, doubled per attempt
    #[arg(long, default_value = "500")]
    retry_backoff_ms: u64,
}

#[derive(Args, Debug)]
struct CheckArgs {
    /// Output directory of a previous crawl
    #[arg(default_value = "output")]
    output_dir: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse command line arguments
    let cli = Cli::parse();

    // Execute the appropriate command
    match cli.command {
        Some(Commands::Crawl(args)) => {
            let _telemetry = telemetry::init_tracing_subscriber(&args.log_dir)?;
            crawl_command(args).await?;
        }
        Some(Commands::Check(args)) => {
            check_command(args).await?;
        }
        None => {
            // If no command is provided, show help
            let _ = Cli::parse_from(["apocrawl", "--help"]);
        }
    }

    Ok(())
}

#[instrument]
async fn crawl_command(args: CrawlArgs) -> anyhow::Result<()> {
    let delimiter = u8::try_from(args.delimiter)
        .ok()
        .filter(u8::is_ascii)
        .with_context(|| format!("Delimiter {:?} is not a single ASCII character", args.delimiter))?;
    let input_options = InputOptions {
        delimiter,
        encoding: args.encoding.clone(),
    };
    let entities = load_entities(&args.input, &input_options)
        .with_context(|| format!("Failed to read {}", args.input.display()))?;
    let entities = select_range(entities, args.start_index, args.end_index);
    info!("Processing {} entities", entities.len());

    let config = CrawlerConfig::builder()
        .max_pages(args.max_pages)
        .resume(args.resume)
        .search_qty(args.search_qty)
        .min_score(args.min_score)
        .match_policy(args.match_policy)
        .timeouts_ms(args.timeout_ms, args.connect_timeout_ms)
        .retries(args.retries, args.retry_backoff_ms)
        .build();

    let shutdown = Arc::new(AtomicBool::new(false));
    tokio::spawn(watch_ctrl_c(shutdown.clone()));

    let fetcher = Arc::new(HttpFetcher::new(config.fetch.clone())?);
    let provider = WebSearchProvider::with_endpoint(fetcher.clone(), &args.search_url)?;
    let validator = ContentValidator::new(fetcher.clone(), config.match_policy);
    let resolver = HomepageResolver::new(provider, validator)
        .with_min_score(config.min_score)
        .with_shutdown(shutdown.clone());

    let crawler = RecursiveCrawler::new(fetcher, JsonFileStore::new(&args.output_dir))
        .with_shutdown(shutdown.clone());
    let orchestrator =
        EntityCrawlOrchestrator::new(resolver, crawler, config, ErrorLog::new(&args.log_dir));

    // Create progress bar
    let progress_bar = ProgressBar::new(entities.len() as u64);
    progress_bar.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} ({eta}) {msg}")?
            .progress_chars("##-"),
    );

    let start_time = std::time::Instant::now();
    let mut failed = 0usize;
    for entity in &entities {
        if shutdown.load(Ordering::SeqCst) {
            break;
        }
        progress_bar.set_message(format!("#{} {}", entity.id, entity.name));
        if orchestrator.process(entity).await.is_none() {
            failed += 1;
        }
        progress_bar.inc(1);
    }
    progress_bar.finish_with_message("Done");

    info!(
        "Processed {} of {} entities in {:.2?} ({} failed)",
        progress_bar.position(),
        entities.len(),
        start_time.elapsed(),
        failed
    );
    if shutdown.load(Ordering::SeqCst) {
        println!("Interrupted; rerun with --resume to continue");
    }

    Ok(())
}

/// First Ctrl-C requests a graceful stop, the second one exits immediately
async fn watch_ctrl_c(shutdown: Arc<AtomicBool>) {
    while tokio::signal::ctrl_c().await.is_ok() {
        if shutdown.swap(true, Ordering::SeqCst) {
            eprintln!("Second Ctrl-C, exiting without waiting");
            std::process::exit(130);
        }
        warn!("Ctrl-C received, finishing the current page; press again to exit");
    }
}

async fn check_command(args: CheckArgs) -> anyhow::Result<()> {
    let findings = check_output(&args.output_dir)
        .await
        .with_context(|| format!("Failed to scan {}", args.output_dir.display()))?;

    for finding in &findings {
        println!("{}", finding);
    }
    println!("{} incomplete entities", findings.len());

    Ok(())
}
