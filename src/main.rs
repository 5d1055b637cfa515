//! sleet: load a CSV file into a PostgreSQL or SQLite table in chunks.
//!
//! Progress lines go to stdout; logs go to stderr.

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use sleet::cli::Args;
use sleet::error::PipelineError;
use sleet::{dry_run, run_ingest};

#[snafu::report]
fn main() -> Result<(), PipelineError> {
    let args = Args::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    info!("sleet starting");

    let config = args.to_config()?;
    info!(
        "Loading {} into {} at {}",
        config.source.path,
        config.table_name,
        config.connection.redacted_url()
    );

    if args.dry_run {
        info!("Dry run mode - nothing will be written");
        println!("{}", dry_run(&config)?);
        return Ok(());
    }

    let stats = run_ingest(&config)?;

    info!("Ingestion completed successfully");
    info!("  Chunks written: {}", stats.chunks);
    info!("  Rows written: {}", stats.rows_written);
    info!("  Elapsed: {:.3}s", stats.elapsed.as_secs_f64());

    Ok(())
}
