//! Radar composite download sweep.
//!
//! Fetches 5-minute radar composites (maxz, echotop) for the lookback
//! window and uploads them unchanged to object storage under
//! `radar/{kind}/{YYYYMMDD}/{filename}`.

use anyhow::Result;
use chrono::{DateTime, Duration, NaiveTime, Utc};
use futures::stream::{self, StreamExt};
use tracing::{info, warn};

use storage::{ObjectStorage, StoragePath};

use crate::config::{CompositeConfig, ModelConfig};
use crate::fetch::Fetcher;
use crate::nwp::{SweepSummary, MAX_CONCURRENT_TRANSFERS};

/// Safety buffer behind "now"; the newest composites are still being
/// published.
const PUBLISH_DELAY_MINUTES: i64 = 10;

/// One sweep over the radar composite matrix (timestamps x composites).
pub struct RadarSweep<'a> {
    fetcher: &'a Fetcher,
    storage: &'a ObjectStorage,
    config: &'a ModelConfig,
}

impl<'a> RadarSweep<'a> {
    pub fn new(fetcher: &'a Fetcher, storage: &'a ObjectStorage, config: &'a ModelConfig) -> Self {
        Self {
            fetcher,
            storage,
            config,
        }
    }

    /// Composite timestamps for the lookback window ending at `now`.
    pub fn target_times(&self, now: DateTime<Utc>) -> Vec<DateTime<Utc>> {
        let step = Duration::minutes(self.config.schedule.radar_step_minutes as i64);
        let latest = now - Duration::minutes(PUBLISH_DELAY_MINUTES);
        let today = now.date_naive();

        let mut times = Vec::new();
        for back in (0..self.config.schedule.radar_lookback_days).rev() {
            let date = today - Duration::days(back as i64);
            let mut current = date
                .and_time(NaiveTime::from_hms_opt(0, 0, 0).expect("midnight is valid"))
                .and_utc();

            // Align to the composite step grid.
            while current.date_naive() == date && current <= latest {
                times.push(current);
                current += step;
            }
        }
        times
    }

    /// Run the sweep with bounded concurrency.
    pub async fn run(&self, now: DateTime<Utc>) -> Result<SweepSummary> {
        let times = self.target_times(now);

        let mut tasks = Vec::new();
        for ts in &times {
            for composite in &self.config.composites {
                tasks.push((*ts, composite));
            }
        }

        info!(files = tasks.len(), "Starting radar download sweep");

        let results: Vec<bool> = stream::iter(tasks)
            .map(|(ts, composite)| async move {
                match self.transfer_one(ts, composite).await {
                    Ok(fetched) => fetched,
                    Err(e) => {
                        warn!(
                            composite = %composite.name,
                            time = %ts,
                            error = %e,
                            "Radar transfer failed"
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
            attempted = summary.attempted,
            completed = summary.completed,
            "Radar download sweep complete"
        );
        Ok(summary)
    }

    /// Fetch one composite and pass it through to object storage.
    async fn transfer_one(&self, ts: DateTime<Utc>, composite: &CompositeConfig) -> Result<bool> {
        let filename = format!(
            "T_{}_C_OKPR_{}.hdf",
            composite.code,
            ts.format("%Y%m%d%H%M%S")
        );
        let url = format!("{}{}", composite.base_url, filename);

        let Some(data) = self.fetcher.fetch_bytes(&url).await? else {
            return Ok(false);
        };

        let object_path = StoragePath::radar_file(
            &composite.name,
            &ts.format("%Y%m%d").to_string(),
            &filename,
        );
        self.storage.put(&object_path, data).await?;

        info!(path = %object_path, "Uploaded radar composite");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScheduleConfig;
    use chrono::{TimeZone, Timelike};

    fn config_with_schedule(schedule: ScheduleConfig) -> ModelConfig {
        let yaml = r#"
model:
  id: aladin
  name: "ALADIN CZ"
source:
  base_url: "https://example.org/"
composites:
  - name: maxz
    code: PABV23
    base_url: "https://example.org/radar/maxz/"
"#;
        let mut config: ModelConfig = serde_yaml::from_str(yaml).unwrap();
        config.schedule = schedule;
        config
    }

    #[test]
    fn test_target_times_respect_publish_delay() {
        let config = config_with_schedule(ScheduleConfig {
            cycles: vec![],
            nwp_lookback_days: 1,
            radar_lookback_days: 1,
            radar_step_minutes: 5,
        });
        let fetcher = Fetcher::new(std::time::Duration::from_secs(5)).unwrap();
        let storage = storage::ObjectStorage::from_store(
            std::sync::Arc::new(object_store_memory()),
            "test",
        );
        let sweep = RadarSweep::new(&fetcher, &storage, &config);

        let now = Utc.with_ymd_and_hms(2025, 4, 1, 12, 0, 0).unwrap();
        let times = sweep.target_times(now);

        // 00:00 through 11:50 in 5-minute steps
        assert_eq!(times.first().unwrap().time().hour(), 0);
        let last = *times.last().unwrap();
        assert_eq!(last, Utc.with_ymd_and_hms(2025, 4, 1, 11, 50, 0).unwrap());
        assert_eq!(times.len(), 143);
    }

    #[test]
    fn test_target_times_cover_full_past_days() {
        let config = config_with_schedule(ScheduleConfig {
            cycles: vec![],
            nwp_lookback_days: 1,
            radar_lookback_days: 2,
            radar_step_minutes: 5,
        });
        let fetcher = Fetcher::new(std::time::Duration::from_secs(5)).unwrap();
        let storage = storage::ObjectStorage::from_store(
            std::sync::Arc::new(object_store_memory()),
            "test",
        );
        let sweep = RadarSweep::new(&fetcher, &storage, &config);

        let now = Utc.with_ymd_and_hms(2025, 4, 2, 0, 30, 0).unwrap();
        let times = sweep.target_times(now);

        // All 288 slots of April 1st plus the early slots of April 2nd.
        let yesterday_slots = times
            .iter()
            .filter(|t| t.date_naive() == chrono::NaiveDate::from_ymd_opt(2025, 4, 1).unwrap())
            .count();
        assert_eq!(yesterday_slots, 288);
    }

    fn object_store_memory() -> object_store::memory::InMemory {
        object_store::memory::InMemory::new()
    }
}
