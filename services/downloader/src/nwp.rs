//! ALADIN NWP grid download sweep.
//!
//! For each cycle of each target day and each configured parameter, fetches
//! the bz2-compressed GRIB file, decompresses it, and lays it out as
//! `{root}/{cycle:02}/{YYYYMMDDHH}/{YYYYMMDDHH}_{TOKEN}.grb` for the
//! converter. Per-file failures never abort the sweep.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{Duration, NaiveDate, Utc};
use futures::stream::{self, StreamExt};
use tracing::{info, warn};

use crate::config::{ModelConfig, ParameterConfig};
use crate::fetch::{decompress_bz2, Fetcher};

/// Upper bound on simultaneous in-flight transfers, to respect the upstream
/// open-data service.
pub const MAX_CONCURRENT_TRANSFERS: usize = 5;

/// Result counters for one sweep.
#[derive(Debug, Clone, Copy, Default)]
pub struct SweepSummary {
    pub attempted: usize,
    pub completed: usize,
}

/// One sweep over the ALADIN download matrix (dates x cycles x parameters).
pub struct AladinSweep<'a> {
    fetcher: &'a Fetcher,
    config: &'a ModelConfig,
    output_root: PathBuf,
}

impl<'a> AladinSweep<'a> {
    pub fn new(fetcher: &'a Fetcher, config: &'a ModelConfig, output_root: &Path) -> Self {
        Self {
            fetcher,
            config,
            output_root: output_root.to_path_buf(),
        }
    }

    /// Days to sweep: the configured number of days back from today.
    pub fn target_dates(&self) -> Vec<NaiveDate> {
        let today = Utc::now().date_naive();
        (1..=self.config.schedule.nwp_lookback_days)
            .map(|back| today - Duration::days(back as i64))
            .collect()
    }

    /// Run the sweep with bounded concurrency.
    pub async fn run(&self, dates: &[NaiveDate]) -> Result<SweepSummary> {
        let mut tasks = Vec::new();
        for date in dates {
            for &cycle in &self.config.schedule.cycles {
                for param in &self.config.parameters {
                    tasks.push((*date, cycle, param));
                }
            }
        }

        info!(
            model = %self.config.model.id,
            files = tasks.len(),
            "Starting NWP download sweep"
        );

        let results: Vec<bool> = stream::iter(tasks)
            .map(|(date, cycle, param)| async move {
                match self.download_one(date, cycle, param).await {
                    Ok(fetched) => fetched,
                    Err(e) => {
                        warn!(
                            date = %date,
                            cycle = cycle,
                            parameter = %param.name,
                            error = %e,
                            "Download failed"
                        );
                        false
                    }
                }
            })
            .buffer_unordered(MAX_CONCURRENT_TRANSFERS)
            .collect()
            .await;

        let summary = SweepSummary {
            attempted: results.len(),
            completed: results.iter().filter(|ok| **ok).count(),
        };
        info!(
            model = %self.config.model.id,
            attempted = summary.attempted,
            completed = summary.completed,
            "NWP download sweep complete"
        );
        Ok(summary)
    }

    /// Fetch, decompress, and store one grid file.
    ///
    /// Returns `Ok(false)` when the file is not published upstream.
    async fn download_one(
        &self,
        date: NaiveDate,
        cycle: u32,
        param: &ParameterConfig,
    ) -> Result<bool> {
        let stamp = format!("{}{:02}", date.format("%Y%m%d"), cycle);
        let remote_name = format!("{}_{}.grb.bz2", stamp, param.file_token());
        let url = format!(
            "{}{:02}{}{}",
            self.config.source.base_url, cycle, self.config.source.subpath, remote_name
        );

        let Some(compressed) = self.fetcher.fetch_bytes(&url).await? else {
            return Ok(false);
        };

        let decompressed = match decompress_bz2(&compressed) {
            Ok(data) => data,
            Err(e) => {
                warn!(url = %url, error = %e, "Skipping corrupt bz2 payload");
                return Ok(false);
            }
        };

        let dir = self
            .output_root
            .join(format!("{:02}", cycle))
            .join(&stamp);
        tokio::fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("Failed to create {}", dir.display()))?;

        let output = dir.join(format!("{}_{}.grb", stamp, param.file_token()));
        tokio::fs::write(&output, decompressed)
            .await
            .with_context(|| format!("Failed to write {}", output.display()))?;

        info!(path = %output.display(), "Saved decompressed grid file");
        Ok(true)
    }
}
