use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use lnsort::config::{
    Config, DEFAULT_CATALOG_URL, DEFAULT_MAX_DEPTH, DEFAULT_SIMILARITY_CUTOFF,
    DEFAULT_TIMEOUT_SECS,
};
use lnsort::{
    logging, ArchiveConfig, CatalogClient, Extractor, FailureLedger, HttpCatalog, Organizer,
    TransferSummary,
};
use log::{info, warn};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(
    name = "lnsort",
    version,
    about = "Sort light-novel EPUBs by catalog author and series"
)]
struct Cli {
    /// Source directories to scan
    #[arg(default_value = ".")]
    inputs: Vec<PathBuf>,

    /// Output root
    #[arg(short, long, default_value = "output")]
    output: PathBuf,

    /// Scratch directory for extracted archives (default: a temporary dir)
    #[arg(short, long)]
    temp: Option<PathBuf>,

    /// Extra archive password, tried after the built-in ones
    #[arg(long = "password")]
    passwords: Vec<String>,

    #[arg(long, default_value = DEFAULT_CATALOG_URL)]
    catalog_url: String,

    /// Minimum similarity for a catalog match (0..=1)
    #[arg(long, default_value_t = DEFAULT_SIMILARITY_CUTOFF)]
    cutoff: f64,

    /// Retries for network failures
    #[arg(long, default_value_t = 0)]
    retries: usize,

    /// Request timeout in seconds
    #[arg(long, default_value_t = DEFAULT_TIMEOUT_SECS)]
    timeout: u64,

    /// Maximum archive nesting
    #[arg(long, default_value_t = DEFAULT_MAX_DEPTH)]
    max_depth: usize,

    /// Leave extracted archives in the scratch directory
    #[arg(long, action = ArgAction::SetTrue)]
    keep_extracted: bool,

    #[arg(long, action = ArgAction::SetTrue)]
    debug: bool,
}

fn main() -> Result<()> {
    let args = Cli::parse();

    std::fs::create_dir_all(&args.output)
        .with_context(|| format!("cannot create output directory {:?}", args.output))?;
    logging::init(&args.output, args.debug);

    // Held until the end of main so the scratch tree outlives every walk.
    let scratch_guard = match args.temp {
        Some(_) => None,
        None => Some(tempfile::tempdir().context("cannot create scratch directory")?),
    };
    let scratch_root = args
        .temp
        .clone()
        .or_else(|| scratch_guard.as_ref().map(|g| g.path().to_path_buf()))
        .context("no scratch directory")?;

    let mut cfg = Config::new(&args.output, scratch_root);
    cfg.catalog.base_url = args.catalog_url.clone();
    cfg.catalog.similarity_cutoff = args.cutoff;
    cfg.catalog.retries = args.retries;
    cfg.catalog.timeout = Duration::from_secs(args.timeout);
    cfg.archive = ArchiveConfig {
        max_depth: args.max_depth,
        keep_extracted: args.keep_extracted,
        ..ArchiveConfig::with_extra_passwords(args.passwords.iter().cloned())
    };

    let api = HttpCatalog::new(&cfg.catalog).context("cannot build HTTP client")?;
    let ledger = match FailureLedger::open(&cfg.failure_ledger()) {
        Ok(l) => l,
        Err(e) => {
            warn!("cannot open failure ledger {:?}: {e}", cfg.failure_ledger());
            FailureLedger::disabled()
        }
    };
    let mut organizer = Organizer::new(
        CatalogClient::new(api, &cfg.catalog),
        Extractor::new(&cfg.scratch_root, &cfg.archive),
        &cfg.output_root,
        ledger,
    )
    .with_progress();

    let mut total = TransferSummary::default();
    for input in &args.inputs {
        total += organizer.transfer(input);
    }
    info!(
        "Done: {} books, {} copied ({} unclassified), {} failed; {} archives opened, {} failed",
        total.books,
        total.copied,
        total.degraded,
        total.copy_failures,
        total.archives_opened,
        total.archive_failures
    );
    Ok(())
}
