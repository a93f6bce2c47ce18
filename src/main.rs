use std::path::PathBuf;

use clap::Parser;
use tracing::info;

use npi_resolver::config::Settings;
use npi_resolver::core::taxonomy::SpecialtyCrosswalk;
use npi_resolver::core::Resolver;
use npi_resolver::services::{NpiRegistryClient, RosterStore};
use npi_resolver::{fill_specialty_codes, run_batch};

/// Resolve provider roster rows to NPIs via adaptive query relaxation
#[derive(Parser, Debug)]
#[command(name = "npi-resolver", version)]
struct Args {
    /// Input roster CSV (requires first_name and last_name columns)
    #[arg(long)]
    input: PathBuf,

    /// Output roster CSV, rewritten after every settled row
    #[arg(long)]
    output: PathBuf,

    /// Re-resolve rows that already carry an NPI
    #[arg(long)]
    overwrite: bool,

    /// Concurrent in-flight resolutions (overrides configuration)
    #[arg(long)]
    concurrency: Option<usize>,

    /// Specialty crosswalk CSV for free-text specialty labels
    #[arg(long)]
    crosswalk: Option<PathBuf>,

    /// Configuration file (defaults to config/default.toml + config/local.toml)
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file if present
    dotenv::dotenv().ok();

    let args = Args::parse();

    let settings = match &args.config {
        Some(path) => Settings::load_from(path)?,
        None => Settings::load()?,
    };

    // Initialize logging
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&settings.logging.level));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_level(true);
    if settings.logging.format == "pretty" {
        subscriber.pretty().init();
    } else {
        subscriber.init();
    }

    info!("Starting NPI resolution batch...");

    // Option validation happens here, before any network call.
    let resolver = Resolver::new(settings.resolver_options()?)?;
    let client = NpiRegistryClient::new(
        settings.registry.base_url.clone(),
        settings.registry.version.clone(),
        settings.registry.timeout_secs,
        settings.registry.max_retries,
    )?;

    info!(
        registry = %settings.registry.base_url,
        page_size = resolver.options().page_size,
        start_index = resolver.options().start_index,
        "resolver initialized"
    );

    let mut rows = RosterStore::load(&args.input)?;
    info!(rows = rows.len(), input = %args.input.display(), "roster loaded");

    // Map free-text specialty labels to taxonomy codes before resolving.
    let crosswalk_path = args
        .crosswalk
        .clone()
        .or_else(|| settings.taxonomy.crosswalk.as_ref().map(PathBuf::from));
    if let Some(path) = crosswalk_path {
        let crosswalk = SpecialtyCrosswalk::from_csv_path(&path, settings.taxonomy.threshold)?;
        let filled = fill_specialty_codes(&mut rows, &crosswalk);
        info!(filled, crosswalk = %path.display(), "specialty labels mapped");
    }

    let mut batch_options = settings.batch_options();
    if args.overwrite {
        batch_options.overwrite = true;
    }
    if let Some(concurrency) = args.concurrency {
        batch_options.concurrency = concurrency;
    }

    let store = RosterStore::new(&args.output);
    let summary = run_batch(&mut rows, &resolver, &client, &store, &batch_options).await?;

    info!(
        resolved = summary.resolved,
        skipped = summary.skipped,
        exhausted = summary.exhausted,
        oscillated = summary.oscillated,
        upstream = summary.upstream_failures,
        invalid = summary.invalid,
        output = %args.output.display(),
        "batch finished"
    );

    Ok(())
}
