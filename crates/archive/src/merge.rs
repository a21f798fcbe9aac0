//! Archive merge engine.
//!
//! For each (month, parameter) batch: probe the archive prefix, pick
//! create-vs-append, drop timestamps already present, and commit durably
//! with a bounded number of attempts.
//!
//! The engine assumes a single writer per archive identity at a time. There
//! is no internal lock; running two merge processes against the same
//! (month, parameter) concurrently is a caller error and can corrupt the
//! store.

use std::collections::HashSet;

use tracing::{error, info, warn};

use grid_store::{ArchiveStore, CommitMode, Dataset};
use meteo_common::MonthKey;
use storage::{ObjectStorage, StoragePath};

use crate::error::{ArchiveError, Result};
use crate::index::{GridRecord, MonthGroups};
use crate::loader::{load_batch, BATCH_SIZE};

/// Target archive for a merge: the (month, parameter) pair within the
/// configured bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveIdentity {
    pub month: MonthKey,
    pub parameter: String,
}

impl ArchiveIdentity {
    pub fn new(month: MonthKey, parameter: impl Into<String>) -> Self {
        Self {
            month,
            parameter: parameter.into(),
        }
    }

    /// Store prefix within the bucket.
    pub fn store_prefix(&self) -> String {
        StoragePath::archive_store(self.month, &self.parameter)
    }
}

impl std::fmt::Display for ArchiveIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.month, self.parameter)
    }
}

/// Tunables for the merge engine.
#[derive(Debug, Clone)]
pub struct MergeConfig {
    /// Commit attempts per batch before giving up.
    pub max_commit_attempts: u32,
    /// Records per batch.
    pub batch_size: usize,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            max_commit_attempts: 3,
            batch_size: BATCH_SIZE,
        }
    }
}

/// What happened to one batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeOutcome {
    /// A new archive was created with `added` records.
    Created { added: usize },
    /// Records were appended to an existing archive.
    Appended {
        added: usize,
        deduplicated: usize,
        /// True when the existing time axis could not be read and the
        /// append proceeded without de-duplication.
        dedup_degraded: bool,
    },
    /// Every record already existed; nothing was written.
    SkippedDuplicate { deduplicated: usize },
}

/// Accumulated result of merging one parameter's records.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParameterSummary {
    pub batches_committed: usize,
    pub batches_skipped: usize,
    pub records_added: usize,
    pub records_deduplicated: usize,
}

/// Overall result of a merge run; per-parameter failures are isolated here
/// rather than aborting sibling parameters or months.
#[derive(Debug, Clone, Default)]
pub struct MergeReport {
    pub parameters_merged: usize,
    pub records_added: usize,
    pub records_deduplicated: usize,
    /// (archive identity, error) for parameters whose merge failed.
    pub failures: Vec<(String, String)>,
}

/// Run `op` up to `max_attempts` times with the same payload, surfacing the
/// final error. Returns the number of attempts used.
pub(crate) fn commit_with_retry<F>(max_attempts: u32, mut op: F) -> Result<u32>
where
    F: FnMut() -> grid_store::Result<()>,
{
    let mut attempt = 0;
    loop {
        attempt += 1;
        match op() {
            Ok(()) => return Ok(attempt),
            Err(e) if attempt < max_attempts => {
                warn!(
                    attempt = attempt,
                    max_attempts = max_attempts,
                    error = %e,
                    "Commit attempt failed, retrying"
                );
            }
            Err(e) => {
                return Err(ArchiveError::CommitExhausted {
                    attempts: attempt,
                    message: e.to_string(),
                })
            }
        }
    }
}

/// The merge engine: one storage client, one configuration, strictly
/// sequential batch processing.
pub struct MergeEngine<'a> {
    storage: &'a ObjectStorage,
    config: MergeConfig,
}

impl<'a> MergeEngine<'a> {
    pub fn new(storage: &'a ObjectStorage, config: MergeConfig) -> Self {
        Self { storage, config }
    }

    /// Merge one batch dataset into its target archive.
    ///
    /// State machine: probe the store prefix, then either create a new
    /// archive or de-duplicate against the existing time axis and append.
    pub async fn merge_batch(
        &self,
        identity: &ArchiveIdentity,
        batch: Dataset,
    ) -> Result<MergeOutcome> {
        let prefix = identity.store_prefix();

        // A probe failure is an error here, never "absent": guessing create
        // mode against a live archive would clobber it.
        let exists = self.storage.exists_prefix(&prefix).await?;
        let store = ArchiveStore::new(self.storage.store(), &prefix);

        if !exists {
            let added = batch.time.len();
            info!(archive = %identity, records = added, "Creating new archive");

            self.commit(&store, &batch, CommitMode::Create, identity)?;
            return Ok(MergeOutcome::Created { added });
        }

        let (batch, deduplicated, dedup_degraded) = match store.read_time_axis() {
            Ok(times) => {
                let existing: HashSet<_> = times.into_iter().collect();
                let incoming = batch.time.len();
                let deduped = batch.without_times(&existing);
                let dropped = incoming - deduped.time.len();

                if dropped > 0 {
                    info!(
                        archive = %identity,
                        duplicates = dropped,
                        "Dropping timestamps already present in archive"
                    );
                }
                if deduped.is_empty() {
                    info!(archive = %identity, "All timestamps already archived, skipping batch");
                    return Ok(MergeOutcome::SkippedDuplicate {
                        deduplicated: dropped,
                    });
                }

                (deduped, dropped, false)
            }
            Err(e) => {
                // Degraded path: the time axis could not be read. Appending
                // anyway trades the uniqueness invariant for availability.
                warn!(
                    archive = %identity,
                    error = %e,
                    "Could not read existing time axis; appending without de-duplication, \
                     duplicate timestamps possible"
                );
                (batch, 0, true)
            }
        };

        let added = batch.time.len();
        info!(archive = %identity, records = added, "Appending to archive");

        self.commit(&store, &batch, CommitMode::Append, identity)?;
        Ok(MergeOutcome::Appended {
            added,
            deduplicated,
            dedup_degraded,
        })
    }

    /// Merge every record of one parameter, in bounded batches, strictly in
    /// order. The first failed batch aborts this parameter; siblings are
    /// unaffected because the caller isolates per parameter.
    pub async fn merge_parameter(
        &self,
        identity: &ArchiveIdentity,
        records: &[GridRecord],
    ) -> Result<ParameterSummary> {
        let mut summary = ParameterSummary::default();
        let total_batches = records.len().div_ceil(self.config.batch_size);

        for (batch_idx, chunk) in records.chunks(self.config.batch_size).enumerate() {
            info!(
                archive = %identity,
                batch = batch_idx + 1,
                total = total_batches,
                "Processing batch"
            );

            // Batch dataset lives only within this iteration; it is dropped
            // before the next batch is loaded to bound peak memory.
            let Some(batch) = load_batch(chunk)? else {
                summary.batches_skipped += 1;
                continue;
            };

            match self.merge_batch(identity, batch).await? {
                MergeOutcome::Created { added } => {
                    summary.batches_committed += 1;
                    summary.records_added += added;
                }
                MergeOutcome::Appended {
                    added,
                    deduplicated,
                    ..
                } => {
                    summary.batches_committed += 1;
                    summary.records_added += added;
                    summary.records_deduplicated += deduplicated;
                }
                MergeOutcome::SkippedDuplicate { deduplicated } => {
                    summary.batches_skipped += 1;
                    summary.records_deduplicated += deduplicated;
                }
            }
        }

        Ok(summary)
    }

    /// Merge a full indexed tree, month by month, parameter by parameter.
    ///
    /// Parameter failures are logged and collected; they never abort the
    /// remaining parameters or months.
    pub async fn merge_all(&self, groups: &MonthGroups) -> MergeReport {
        let mut report = MergeReport::default();

        for (month, params) in groups {
            info!(month = %month, parameters = params.len(), "Processing month");

            for (parameter, records) in params {
                let identity = ArchiveIdentity::new(*month, parameter.clone());

                match self.merge_parameter(&identity, records).await {
                    Ok(summary) => {
                        report.parameters_merged += 1;
                        report.records_added += summary.records_added;
                        report.records_deduplicated += summary.records_deduplicated;
                    }
                    Err(e) => {
                        error!(archive = %identity, error = %e, "Parameter merge failed");
                        report.failures.push((identity.to_string(), e.to_string()));
                    }
                }
            }
        }

        info!(
            parameters = report.parameters_merged,
            added = report.records_added,
            deduplicated = report.records_deduplicated,
            failed = report.failures.len(),
            "Merge run complete"
        );

        report
    }

    fn commit(
        &self,
        store: &ArchiveStore,
        batch: &Dataset,
        mode: CommitMode,
        identity: &ArchiveIdentity,
    ) -> Result<()> {
        let attempts =
            commit_with_retry(self.config.max_commit_attempts, || store.write(batch, mode))?;

        info!(
            archive = %identity,
            mode = ?mode,
            attempts = attempts,
            "Batch committed"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use grid_store::GridStoreError;

    #[test]
    fn test_retry_succeeds_on_third_attempt() {
        let mut calls = 0;

        let attempts = commit_with_retry(3, || {
            calls += 1;
            if calls < 3 {
                Err(GridStoreError::WriteFailed("transient".to_string()))
            } else {
                Ok(())
            }
        })
        .unwrap();

        assert_eq!(attempts, 3);
        assert_eq!(calls, 3);
    }

    #[test]
    fn test_retry_surfaces_final_error() {
        let mut calls = 0;

        let result = commit_with_retry(3, || {
            calls += 1;
            Err(GridStoreError::WriteFailed("still broken".to_string()))
        });

        match result {
            Err(ArchiveError::CommitExhausted { attempts, message }) => {
                assert_eq!(attempts, 3);
                assert!(message.contains("still broken"));
            }
            other => panic!("expected CommitExhausted, got {:?}", other),
        }
        assert_eq!(calls, 3);
    }

    #[test]
    fn test_retry_stops_after_first_success() {
        let mut calls = 0;

        let attempts = commit_with_retry(3, || {
            calls += 1;
            Ok(())
        })
        .unwrap();

        assert_eq!(attempts, 1);
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_identity_store_prefix() {
        let identity = ArchiveIdentity::new(MonthKey::new(2025, 4).unwrap(), "CLSTEMPERATURE");
        assert_eq!(
            identity.store_prefix(),
            "meteo_data/202504/CLSTEMPERATURE.zarr"
        );
    }
}
