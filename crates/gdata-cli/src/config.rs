use crate::cli::ReadArgs;
use crate::error::{CliError, Result};
use gdata::dataset::{ChargeType, DatasetConfig};
use serde::Deserialize;
use std::path::Path;
use tracing::debug;

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct PartialDatasetConfig {
    max_atom: Option<usize>,
    charge_type: Option<ChargeType>,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct PartialReadConfig {
    validation: Option<bool>,
    header: Option<bool>,
}

/// The `--config` file of the `read` command; every key is optional.
#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields)]
pub struct PartialReadSettings {
    dataset: Option<PartialDatasetConfig>,
    read: Option<PartialReadConfig>,
}

/// Fully resolved settings of one `read` run.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadSettings {
    pub dataset: DatasetConfig,
    pub validation: bool,
    pub header: bool,
}

impl PartialReadSettings {
    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("Loading configuration from file: {:?}", path);
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| CliError::FileParsing {
            path: path.to_path_buf(),
            source: e.into(),
        })
    }

    /// Layers CLI flags over the file values over the built-in defaults.
    pub fn merge_with_cli(self, args: &ReadArgs) -> Result<ReadSettings> {
        let defaults = DatasetConfig::default();
        let dataset_file = self.dataset.unwrap_or_default();
        let read_file = self.read.unwrap_or_default();

        let max_atom = args
            .max_atom
            .or(dataset_file.max_atom)
            .unwrap_or(defaults.max_atom);
        if max_atom == 0 {
            return Err(CliError::Config("max-atom must be at least 1".to_string()));
        }
        let charge_type = args
            .charge_type
            .or(dataset_file.charge_type)
            .unwrap_or(defaults.charge_type);

        let validation = !args.no_validation && read_file.validation.unwrap_or(true);
        let header = !args.no_header && read_file.header.unwrap_or(true);

        Ok(ReadSettings {
            dataset: DatasetConfig {
                max_atom,
                charge_type,
                mi_coordinates: false,
            },
            validation,
            header,
        })
    }
}
