//! Meteo data downloader service.
//!
//! Fetches ALADIN NWP grid files (bz2-compressed GRIB) and radar composites
//! from the CHMI open-data service:
//! - NWP files are decompressed and laid out on the local filesystem for the
//!   converter/archiver
//! - radar composites are passed through unchanged to object storage
//! - at most 5 transfers are in flight at any time

mod config;
mod fetch;
mod nwp;
mod radar;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use clap::Parser;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use storage::{ObjectStorage, ObjectStorageConfig};

use fetch::Fetcher;
use nwp::AladinSweep;
use radar::RadarSweep;

#[derive(Parser, Debug)]
#[command(name = "downloader")]
#[command(about = "Meteo data downloader for NWP grids and radar composites")]
struct Args {
    /// Directory for decompressed NWP grid files
    #[arg(long, env = "METEO_DATA_DIR", default_value = "/data/meteo")]
    output_dir: PathBuf,

    /// Configuration directory (contains models/*.yaml)
    #[arg(long, env = "CONFIG_DIR", default_value = "config")]
    config_dir: PathBuf,

    /// Skip the NWP grid sweep
    #[arg(long)]
    skip_nwp: bool,

    /// Skip the radar composite sweep
    #[arg(long)]
    skip_radar: bool,

    /// S3 bucket for radar composites
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

    /// HTTP request timeout in seconds
    #[arg(long, default_value = "600")]
    request_timeout_secs: u64,

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

    info!("Starting meteo data downloader");

    let fetcher = Fetcher::new(Duration::from_secs(args.request_timeout_secs))?;
    let configs = config::load_model_configs(&args.config_dir)?;

    if configs.is_empty() {
        warn!("No model configurations found, nothing to download");
        return Ok(());
    }

    for model in &configs {
        if !args.skip_nwp && !model.parameters.is_empty() {
            let sweep = AladinSweep::new(&fetcher, model, &args.output_dir);
            let dates = sweep.target_dates();
            sweep.run(&dates).await?;
        }

        if !args.skip_radar && !model.composites.is_empty() {
            let storage = ObjectStorage::new(&args.storage_config())?;
            let sweep = RadarSweep::new(&fetcher, &storage, model);
            sweep.run(Utc::now()).await?;
        }
    }

    info!("Download run complete");
    Ok(())
}
