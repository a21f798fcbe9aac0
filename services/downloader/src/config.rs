//! Configuration loading for download sources.
//!
//! Loads model configurations from YAML files in config/models/

use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::{debug, info, warn};

/// Root configuration loaded from a model YAML file.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelConfig {
    pub model: ModelInfo,
    pub source: SourceConfig,
    #[serde(default)]
    pub grid: Option<GridConfig>,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub parameters: Vec<ParameterConfig>,
    #[serde(default)]
    pub composites: Vec<CompositeConfig>,
}

/// Basic model identification.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelInfo {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

/// NWP data source configuration.
///
/// Download URLs are `{base_url}{cycle:02}{subpath}{YYYYMMDDHH}_{token}.grb.bz2`.
#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    pub base_url: String,
    #[serde(default)]
    pub subpath: String,
}

/// Grid geometry of the model output, used by the GRIB converter.
#[derive(Debug, Clone, Deserialize)]
pub struct GridConfig {
    /// Number of grid columns.
    pub nx: usize,
    /// Number of grid rows.
    pub ny: usize,
    pub bbox: BBox,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BBox {
    pub min_lon: f64,
    pub min_lat: f64,
    pub max_lon: f64,
    pub max_lat: f64,
}

/// Schedule configuration for downloads.
#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleConfig {
    /// Model cycles (e.g., [0, 6, 12, 18])
    #[serde(default = "default_cycles")]
    pub cycles: Vec<u32>,
    /// Days back from today to sweep for NWP files
    #[serde(default = "default_nwp_lookback")]
    pub nwp_lookback_days: u32,
    /// Days back from today to sweep for radar composites (inclusive of today)
    #[serde(default = "default_radar_lookback")]
    pub radar_lookback_days: u32,
    /// Minutes between radar composites
    #[serde(default = "default_radar_step")]
    pub radar_step_minutes: u32,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            cycles: default_cycles(),
            nwp_lookback_days: default_nwp_lookback(),
            radar_lookback_days: default_radar_lookback(),
            radar_step_minutes: default_radar_step(),
        }
    }
}

fn default_cycles() -> Vec<u32> {
    vec![0, 6, 12, 18]
}

fn default_nwp_lookback() -> u32 {
    1
}

fn default_radar_lookback() -> u32 {
    3
}

fn default_radar_step() -> u32 {
    5
}

/// One downloadable NWP parameter.
#[derive(Debug, Clone, Deserialize)]
pub struct ParameterConfig {
    /// Canonical parameter name used in archives.
    pub name: String,
    /// Token appearing in remote filenames; defaults to the name.
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub description: String,
}

impl ParameterConfig {
    pub fn file_token(&self) -> &str {
        self.token.as_deref().unwrap_or(&self.name)
    }
}

/// One radar composite product.
#[derive(Debug, Clone, Deserialize)]
pub struct CompositeConfig {
    /// Product name (e.g., "maxz", "echotop"); also the storage prefix key.
    pub name: String,
    /// WMO-style product code in remote filenames (e.g., "PABV23").
    pub code: String,
    pub base_url: String,
}

impl ModelConfig {
    /// Load a model configuration from a YAML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: ModelConfig = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        debug!(model = %config.model.id, path = %path.display(), "Loaded model config");
        Ok(config)
    }
}

/// Load all enabled model configurations from a directory.
pub fn load_model_configs(config_dir: &Path) -> Result<Vec<ModelConfig>> {
    let models_dir = config_dir.join("models");

    if !models_dir.exists() {
        warn!(path = %models_dir.display(), "Models config directory not found");
        return Ok(Vec::new());
    }

    let mut configs = Vec::new();

    for entry in std::fs::read_dir(&models_dir)? {
        let entry = entry?;
        let path = entry.path();

        if path
            .extension()
            .map_or(false, |ext| ext == "yaml" || ext == "yml")
        {
            match ModelConfig::load(&path) {
                Ok(config) => {
                    if config.model.enabled {
                        info!(
                            model = %config.model.id,
                            name = %config.model.name,
                            "Loaded model configuration"
                        );
                        configs.push(config);
                    } else {
                        debug!(model = %config.model.id, "Skipping disabled model");
                    }
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Failed to load model config");
                }
            }
        }
    }

    info!(count = configs.len(), "Loaded model configurations");
    Ok(configs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_aladin_config() {
        let yaml = r#"
model:
  id: aladin
  name: "ALADIN CZ"
  enabled: true

source:
  base_url: "https://opendata.chmi.cz/meteorology/weather/nwp_aladin/"
  subpath: "/grib/"

grid:
  nx: 309
  ny: 225
  bbox:
    min_lon: 10.06
    min_lat: 46.24
    max_lon: 20.34
    max_lat: 52.26

schedule:
  cycles: [0, 6, 12, 18]

parameters:
  - name: CLSTEMPERATURE
  - name: CLS_VISICLD
    token: CLS-VISICLD

composites:
  - name: maxz
    code: PABV23
    base_url: "https://opendata.chmi.cz/meteorology/weather/radar/composite/maxz/hdf5/"
"#;

        let config: ModelConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.model.id, "aladin");
        assert_eq!(config.schedule.cycles, vec![0, 6, 12, 18]);
        assert_eq!(config.parameters[0].file_token(), "CLSTEMPERATURE");
        assert_eq!(config.parameters[1].file_token(), "CLS-VISICLD");
        assert_eq!(config.composites[0].code, "PABV23");
        assert_eq!(config.grid.unwrap().nx, 309);
    }

    #[test]
    fn test_schedule_defaults() {
        let yaml = r#"
model:
  id: aladin
  name: "ALADIN CZ"

source:
  base_url: "https://example.org/"
"#;
        let config: ModelConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.schedule.cycles, vec![0, 6, 12, 18]);
        assert_eq!(config.schedule.radar_step_minutes, 5);
        assert!(config.parameters.is_empty());
    }
}
