//! Storage path conventions for the archive layout.

use meteo_common::MonthKey;

/// Path builder for the fixed storage layout.
pub struct StoragePath;

impl StoragePath {
    /// Root prefix for all per-month parameter archives.
    pub const ARCHIVE_ROOT: &'static str = "meteo_data";

    /// Prefix for one month of archives.
    /// Format: meteo_data/{YYYYMM}
    pub fn month_prefix(month: MonthKey) -> String {
        format!("{}/{}", Self::ARCHIVE_ROOT, month)
    }

    /// Store prefix for one (month, parameter) archive.
    /// Format: meteo_data/{YYYYMM}/{PARAMETER}.zarr
    pub fn archive_store(month: MonthKey, parameter: &str) -> String {
        format!("{}/{}/{}.zarr", Self::ARCHIVE_ROOT, month, parameter)
    }

    /// Path for a raw radar composite file.
    /// Format: radar/{kind}/{YYYYMMDD}/{filename}
    pub fn radar_file(kind: &str, date: &str, filename: &str) -> String {
        format!("radar/{}/{}/{}", kind, date, filename)
    }

    /// Recover the parameter name from a `{PARAMETER}.zarr` directory name.
    pub fn parameter_from_store_dir(dir: &str) -> Option<&str> {
        dir.strip_suffix(".zarr")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_paths() {
        let month = MonthKey::new(2025, 4).unwrap();

        assert_eq!(StoragePath::month_prefix(month), "meteo_data/202504");
        assert_eq!(
            StoragePath::archive_store(month, "CLSTEMPERATURE"),
            "meteo_data/202504/CLSTEMPERATURE.zarr"
        );
        assert_eq!(
            StoragePath::radar_file("maxz", "20250401", "T_PABV23_C_OKPR_20250401120500.hdf"),
            "radar/maxz/20250401/T_PABV23_C_OKPR_20250401120500.hdf"
        );
    }

    #[test]
    fn test_parameter_from_store_dir() {
        assert_eq!(
            StoragePath::parameter_from_store_dir("CLSTEMPERATURE.zarr"),
            Some("CLSTEMPERATURE")
        );
        assert_eq!(StoragePath::parameter_from_store_dir("notastore"), None);
    }
}
