use super::error::DatasetError;
use crate::core::models::charge::ChargeType;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

pub const DEFAULT_MAX_ATOM: usize = 100;

/// Dataset-wide settings persisted as `config.toml` next to the series files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct DatasetConfig {
    pub max_atom: usize,
    #[serde(default)]
    pub charge_type: ChargeType,
    /// Whether the stored structures are expressed in principal-axis coordinates.
    #[serde(default)]
    pub mi_coordinates: bool,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            max_atom: DEFAULT_MAX_ATOM,
            charge_type: ChargeType::default(),
            mi_coordinates: false,
        }
    }
}

impl DatasetConfig {
    pub fn load(path: &Path) -> Result<Self, DatasetError> {
        let content = fs::read_to_string(path).map_err(|e| DatasetError::io(path, e))?;
        let config: Self = toml::from_str(&content).map_err(|e| DatasetError::Config {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        if config.max_atom == 0 {
            return Err(DatasetError::Config {
                path: path.to_path_buf(),
                message: "max-atom must be at least 1".to_string(),
            });
        }
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<(), DatasetError> {
        let content = toml::to_string(self).map_err(|e| DatasetError::Config {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        fs::write(path, content).map_err(|e| DatasetError::io(path, e))
    }
}
