//! Model configuration for the archiver.
//!
//! Reads the same `config/models/*.yaml` files as the downloader; only the
//! grid geometry matters here, the rest of the schema is ignored.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Deserialize)]
pub struct ModelConfig {
    pub model: ModelInfo,
    #[serde(default)]
    pub grid: Option<GridConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModelInfo {
    pub id: String,
    pub name: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

/// Grid geometry of the model output; GRIB payloads are validated against it.
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

impl ModelConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: ModelConfig = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        debug!(model = %config.model.id, path = %path.display(), "Loaded model config");
        Ok(config)
    }
}

/// Load the first enabled model config that carries a grid specification.
pub fn load_grid_model(config_dir: &Path) -> Result<Option<ModelConfig>> {
    let models_dir = config_dir.join("models");

    if !models_dir.exists() {
        warn!(path = %models_dir.display(), "Models config directory not found");
        return Ok(None);
    }

    for entry in std::fs::read_dir(&models_dir)? {
        let entry = entry?;
        let path = entry.path();

        if !path
            .extension()
            .map_or(false, |ext| ext == "yaml" || ext == "yml")
        {
            continue;
        }

        match ModelConfig::load(&path) {
            Ok(config) if config.model.enabled && config.grid.is_some() => {
                info!(model = %config.model.id, "Using model grid configuration");
                return Ok(Some(config));
            }
            Ok(_) => {}
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to load model config");
            }
        }
    }

    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_grid_config() {
        let yaml = r#"
model:
  id: aladin
  name: "ALADIN CZ"

grid:
  nx: 309
  ny: 225
  bbox:
    min_lon: 10.06
    min_lat: 46.24
    max_lon: 20.34
    max_lat: 52.26

parameters:
  - name: CLSTEMPERATURE
"#;
        let config: ModelConfig = serde_yaml::from_str(yaml).unwrap();
        let grid = config.grid.unwrap();
        assert_eq!(grid.nx, 309);
        assert_eq!(grid.ny, 225);
    }
}
