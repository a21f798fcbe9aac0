//! Read-only archive inspector.
//!
//! Walks the archive hierarchy and reports per-parameter coverage and
//! time-axis regularity. Never mutates; per-parameter failures are isolated.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use tracing::warn;

use grid_store::ArchiveStore;
use meteo_common::{format_archive_time, MonthKey, MeteoResult};
use storage::{ObjectStorage, StoragePath};

/// Coverage report for one parameter store.
#[derive(Debug, Clone)]
pub struct ParameterReport {
    pub parameter: String,
    pub measurements: usize,
    pub distinct_days: usize,
    pub time_min: DateTime<Utc>,
    pub time_max: DateTime<Utc>,
    /// Distinct consecutive gap sizes in seconds; more than one distinct gap
    /// means irregular spacing.
    pub gap_sizes: Vec<i64>,
}

impl ParameterReport {
    pub fn is_irregular(&self) -> bool {
        self.gap_sizes.len() > 1
    }
}

impl std::fmt::Display for ParameterReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}: {} days, {} measurements, time range: {} to {}",
            self.parameter,
            self.distinct_days,
            self.measurements,
            format_archive_time(self.time_min),
            format_archive_time(self.time_max),
        )?;
        if self.is_irregular() {
            write!(f, " (irregular intervals: {:?}s)", self.gap_sizes)?;
        }
        Ok(())
    }
}

/// Outcome of inspecting one parameter store.
#[derive(Debug, Clone)]
pub enum ParameterStatus {
    Ok(ParameterReport),
    Failed { parameter: String, error: String },
}

/// All parameter stores found under one month prefix.
#[derive(Debug, Clone)]
pub struct MonthReport {
    pub month: MonthKey,
    pub parameters: Vec<ParameterStatus>,
}

/// Build a report from a time axis.
fn report_from_times(parameter: &str, times: &[DateTime<Utc>]) -> Option<ParameterReport> {
    let time_min = *times.iter().min()?;
    let time_max = *times.iter().max()?;

    let distinct_days: BTreeSet<_> = times.iter().map(|t| t.date_naive()).collect();

    let mut gaps: BTreeSet<i64> = BTreeSet::new();
    for pair in times.windows(2) {
        gaps.insert((pair[1] - pair[0]).num_seconds());
    }

    Some(ParameterReport {
        parameter: parameter.to_string(),
        measurements: times.len(),
        distinct_days: distinct_days.len(),
        time_min,
        time_max,
        gap_sizes: gaps.into_iter().collect(),
    })
}

/// Walk every month prefix and report each parameter store found.
pub async fn inspect_archives(storage: &ObjectStorage) -> MeteoResult<Vec<MonthReport>> {
    let mut reports = Vec::new();

    if !storage.exists_prefix(StoragePath::ARCHIVE_ROOT).await? {
        return Ok(reports);
    }

    for month_dir in storage.list_dirs(StoragePath::ARCHIVE_ROOT).await? {
        let Ok(month) = MonthKey::parse(&month_dir) else {
            warn!(dir = %month_dir, "Skipping non-month directory in archive root");
            continue;
        };

        let mut parameters = Vec::new();
        for store_dir in storage.list_dirs(&StoragePath::month_prefix(month)).await? {
            let Some(parameter) = StoragePath::parameter_from_store_dir(&store_dir) else {
                continue;
            };

            let prefix = StoragePath::archive_store(month, parameter);
            let store = ArchiveStore::new(storage.store(), &prefix);

            match store.read_time_axis() {
                Ok(times) => match report_from_times(parameter, &times) {
                    Some(report) => parameters.push(ParameterStatus::Ok(report)),
                    None => parameters.push(ParameterStatus::Failed {
                        parameter: parameter.to_string(),
                        error: "empty time axis".to_string(),
                    }),
                },
                Err(e) => {
                    warn!(archive = %prefix, error = %e, "Failed to open parameter store");
                    parameters.push(ParameterStatus::Failed {
                        parameter: parameter.to_string(),
                        error: e.to_string(),
                    });
                }
            }
        }

        reports.push(MonthReport { month, parameters });
    }

    Ok(reports)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 4, day, hour, 0, 0).unwrap()
    }

    #[test]
    fn test_regular_spacing_single_gap() {
        let times = vec![ts(1, 0), ts(1, 6), ts(1, 12), ts(1, 18)];
        let report = report_from_times("CLSTEMPERATURE", &times).unwrap();

        assert_eq!(report.measurements, 4);
        assert_eq!(report.distinct_days, 1);
        assert!(!report.is_irregular());
        assert_eq!(report.gap_sizes, vec![6 * 3600]);
    }

    #[test]
    fn test_irregular_spacing_flagged() {
        let times = vec![ts(1, 0), ts(1, 6), ts(2, 0)];
        let report = report_from_times("CLSTEMPERATURE", &times).unwrap();

        assert_eq!(report.distinct_days, 2);
        assert!(report.is_irregular());
        assert_eq!(report.gap_sizes, vec![6 * 3600, 18 * 3600]);
    }

    #[test]
    fn test_empty_time_axis_yields_no_report() {
        assert!(report_from_times("X", &[]).is_none());
    }
}
