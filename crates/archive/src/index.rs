//! Grid file indexer.
//!
//! Scans a directory tree of converted grid files, derives each file's
//! (timestamp, parameter) identity from its name, and groups records by
//! (month, parameter) ready for batch loading.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use walkdir::WalkDir;

use meteo_common::{parse_filename_datetime, MonthKey};

/// One converted grid file with its filename-derived identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GridRecord {
    pub path: PathBuf,
    /// Hour-truncated timestamp from the leading `YYYYMMDDHH` digits.
    pub timestamp: DateTime<Utc>,
    /// Canonical parameter name (dashes normalized to underscores).
    pub parameter: String,
}

/// Records grouped by month key, then by parameter, each sub-group sorted by
/// timestamp ascending.
pub type MonthGroups = BTreeMap<MonthKey, BTreeMap<String, Vec<GridRecord>>>;

/// Parse a converted-grid filename of the form `{YYYYMMDDHH}_{PARAM}.{ext}`.
///
/// Pure function of the filename string. Returns None for anything that does
/// not match the pattern — those files are excluded from processing, not an
/// error.
pub fn parse_grid_filename(filename: &str) -> Option<(DateTime<Utc>, String)> {
    let (stem, _ext) = filename.rsplit_once('.')?;
    if stem.len() < 12 {
        return None;
    }

    let (digits, rest) = stem.split_at(10);
    let timestamp = parse_filename_datetime(digits)?;

    let parameter = rest.strip_prefix('_')?;
    if parameter.is_empty() {
        return None;
    }

    // Store variable names cannot carry dashes.
    Some((timestamp, parameter.replace('-', "_")))
}

/// Lazily walk `root` for entries with the given extension.
///
/// Traversal order is unspecified; callers sort wherever order matters.
/// Converted stores are directories, so both files and directories match.
pub fn scan_files<'a>(
    root: &Path,
    extension: &'a str,
) -> impl Iterator<Item = PathBuf> + 'a {
    WalkDir::new(root)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(move |entry| {
            entry
                .path()
                .extension()
                .map_or(false, |ext| ext == extension)
        })
        .map(|entry| entry.into_path())
}

/// Index a directory tree into (month, parameter) groups.
///
/// Files whose names do not match the identity pattern are skipped silently.
pub fn index_directory(root: &Path, extension: &str) -> MonthGroups {
    let mut groups: MonthGroups = BTreeMap::new();

    for path in scan_files(root, extension) {
        let Some(filename) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let Some((timestamp, parameter)) = parse_grid_filename(filename) else {
            continue;
        };

        let record = GridRecord {
            path,
            timestamp,
            parameter: parameter.clone(),
        };

        groups
            .entry(MonthKey::of(timestamp))
            .or_default()
            .entry(parameter)
            .or_default()
            .push(record);
    }

    for params in groups.values_mut() {
        for records in params.values_mut() {
            records.sort_by_key(|r| r.timestamp);
        }
    }

    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_parse_valid_filename() {
        let (ts, param) = parse_grid_filename("2025012112_CLS_VISICLD.zarr").unwrap();
        assert_eq!(ts, Utc.with_ymd_and_hms(2025, 1, 21, 12, 0, 0).unwrap());
        assert_eq!(param, "CLS_VISICLD");
    }

    #[test]
    fn test_parse_normalizes_dashes() {
        let (_, param) = parse_grid_filename("2025012112_CLS-VISICLD.zarr").unwrap();
        assert_eq!(param, "CLS_VISICLD");
    }

    #[test]
    fn test_parse_is_deterministic() {
        let a = parse_grid_filename("2025040106_CLSTEMPERATURE.zarr");
        let b = parse_grid_filename("2025040106_CLSTEMPERATURE.zarr");
        assert_eq!(a, b);
    }

    #[test]
    fn test_parse_rejects_non_matching_names() {
        assert!(parse_grid_filename("README.md").is_none());
        assert!(parse_grid_filename("2025012112.zarr").is_none()); // no parameter
        assert!(parse_grid_filename("202501211_X.zarr").is_none()); // 9 digits
        assert!(parse_grid_filename("2025012199_X.zarr").is_none()); // hour 99
        assert!(parse_grid_filename("noextension").is_none());
    }

    #[test]
    fn test_index_groups_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        let names = [
            "2025040112_CLSTEMPERATURE.zarr",
            "2025040100_CLSTEMPERATURE.zarr",
            "2025040100_CLS_VISICLD.zarr",
            "2025030118_CLSTEMPERATURE.zarr",
            "not_a_grid_file.txt",
            "2025040100_CLSTEMPERATURE.grb", // wrong extension
        ];
        for name in names {
            std::fs::write(dir.path().join(name), b"").unwrap();
        }

        let groups = index_directory(dir.path(), "zarr");

        let months: Vec<String> = groups.keys().map(|m| m.to_string()).collect();
        assert_eq!(months, vec!["202503", "202504"]);

        let april = &groups[&MonthKey::new(2025, 4).unwrap()];
        assert_eq!(april.len(), 2);

        let temps = &april["CLSTEMPERATURE"];
        assert_eq!(temps.len(), 2);
        // Sorted ascending regardless of walk order
        assert!(temps[0].timestamp < temps[1].timestamp);
    }
}
