//! Archive pipeline service.
//!
//! Run-once batch job: convert raw grid files to Zarr, index the converted
//! tree by (month, parameter), and merge everything into the per-month
//! archives on object storage. `--inspect` prints archive coverage instead.
//!
//! Exactly one archiver may run against a bucket at a time; concurrent runs
//! against the same (month, parameter) archives are not safe.

mod config;
mod convert;

use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::Parser;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use archive::inspect::{inspect_archives, ParameterStatus};
use archive::merge::{MergeConfig, MergeEngine};
use archive::index_directory;
use storage::{ObjectStorage, ObjectStorageConfig};

#[derive(Parser, Debug)]
#[command(name = "archiver")]
#[command(about = "Merges converted meteo grids into per-month Zarr archives")]
struct Args {
    /// Directory tree of raw/converted grid files
    #[arg(long, env = "METEO_DATA_DIR", default_value = "/data/meteo")]
    data_dir: PathBuf,

    /// Configuration directory (contains models/*.yaml)
    #[arg(long, env = "CONFIG_DIR", default_value = "config")]
    config_dir: PathBuf,

    /// Report archive coverage instead of merging
    #[arg(long)]
    inspect: bool,

    /// Skip the GRIB conversion pass (converted stores already on disk)
    #[arg(long)]
    skip_convert: bool,

    /// Extension of raw grid files
    #[arg(long, default_value = "grb")]
    raw_extension: String,

    /// Commit attempts per batch before giving up
    #[arg(long, default_value = "3")]
    max_commit_attempts: u32,

    /// S3 bucket holding the archives
    #[arg(long, env = "METEO_BUCKET", default_value = "meteodatabucket")]
    bucket: String,

    /// AWS region
    #[arg(long, env = "AWS_REGION", default_value = "eu-central-1")]
    region: String,

    /// AWS access key id
    #[arg(long, env = "AWS_ACCESS_KEY_ID", default_value = "")]
    access_key_id: String,

    /// AWS secret access key
    #[arg(long, env = "AWS_SECRET_ACCESS_KEY", default_value = "")]
    secret_access_key: String,

    /// Optional S3-compatible endpoint (MinIO etc.)
    #[arg(long, env = "METEO_S3_ENDPOINT")]
    endpoint: Option<String>,

    /// Allow plain-HTTP endpoints (local MinIO)
    #[arg(long)]
    allow_http: bool,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,
}

impl Args {
    fn storage_config(&self) -> ObjectStorageConfig {
        ObjectStorageConfig {
            bucket: self.bucket.clone(),
            region: self.region.clone(),
            access_key_id: self.access_key_id.clone(),
            secret_access_key: self.secret_access_key.clone(),
            endpoint: self.endpoint.clone(),
            allow_http: self.allow_http,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment from .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Initialize tracing
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let storage = ObjectStorage::new(&args.storage_config())?;

    if args.inspect {
        return run_inspect(&storage).await;
    }

    info!(data_dir = %args.data_dir.display(), "Starting archive run");

    if !args.skip_convert {
        match config::load_grid_model(&args.config_dir)?.and_then(|model| model.grid) {
            Some(grid) => {
                convert::convert_all(&args.data_dir, &args.raw_extension, &grid);
            }
            None => {
                warn!("No grid model configuration found, skipping conversion pass");
            }
        }
    }

    let groups = index_directory(&args.data_dir, "zarr");
    if groups.is_empty() {
        info!("No converted grid files found, nothing to merge");
        return Ok(());
    }

    let engine = MergeEngine::new(
        &storage,
        MergeConfig {
            max_commit_attempts: args.max_commit_attempts,
            ..MergeConfig::default()
        },
    );
    let report = engine.merge_all(&groups).await;

    info!(
        parameters = report.parameters_merged,
        added = report.records_added,
        deduplicated = report.records_deduplicated,
        "Archive run finished"
    );

    if !report.failures.is_empty() {
        for (identity, error) in &report.failures {
            warn!(archive = %identity, error = %error, "Parameter merge failed");
        }
        bail!("{} parameter merges failed", report.failures.len());
    }

    Ok(())
}

/// Print the archive structure month by month.
async fn run_inspect(storage: &ObjectStorage) -> Result<()> {
    let reports = inspect_archives(storage).await?;

    if reports.is_empty() {
        println!("No archives found.");
        return Ok(());
    }

    for month in reports {
        println!("Month: {}", month.month);
        for status in month.parameters {
            match status {
                ParameterStatus::Ok(report) => println!("  - {}", report),
                ParameterStatus::Failed { parameter, error } => {
                    println!("  - {}: failed to open ({})", parameter, error)
                }
            }
        }
    }

    Ok(())
}
