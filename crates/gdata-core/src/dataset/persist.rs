//! `.npy` persistence of the dataset series.
//!
//! Every series lives in its own file so that a dataset can be saved or loaded
//! partially. The dataset configuration travels as `config.toml` beside them.

use super::Dataset;
use super::config::DatasetConfig;
use super::error::DatasetError;
use crate::core::io::npy::{self, NpyArray};
use crate::core::models::record::STRUCTURE_COLUMNS;
use crate::core::models::series::{PaddedSeries, Series};
use nalgebra::Scalar;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const STRUCTURE_FILE: &str = "structure.npy";
const CHARGE_FILE: &str = "charge.npy";
const NAME_FILE: &str = "name.npy";
const TOPOLOGY_FILE: &str = "topology.npy";
const DIPOLE_FILE: &str = "dipole.npy";
const CONFIG_FILE: &str = "config.toml";

/// Target files of a save or load. A series without a path is skipped on save and
/// left absent on load.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeriesPaths {
    pub structures: Option<PathBuf>,
    pub charges: Option<PathBuf>,
    pub names: Option<PathBuf>,
    pub topologies: Option<PathBuf>,
    pub dipoles: Option<PathBuf>,
    pub config: Option<PathBuf>,
}

impl SeriesPaths {
    /// The standard file layout inside `dir`.
    pub fn in_directory(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            structures: Some(dir.join(STRUCTURE_FILE)),
            charges: Some(dir.join(CHARGE_FILE)),
            names: Some(dir.join(NAME_FILE)),
            topologies: Some(dir.join(TOPOLOGY_FILE)),
            dipoles: Some(dir.join(DIPOLE_FILE)),
            config: Some(dir.join(CONFIG_FILE)),
        }
    }

    pub fn get(&self, series: Series) -> Option<&Path> {
        match series {
            Series::Structures => self.structures.as_deref(),
            Series::Charges => self.charges.as_deref(),
            Series::Names => self.names.as_deref(),
            Series::Topologies => self.topologies.as_deref(),
            Series::Dipoles => self.dipoles.as_deref(),
        }
    }

    /// Drops every path that does not name an existing file.
    fn existing_only(self) -> Self {
        let keep = |p: Option<PathBuf>| p.filter(|p| p.is_file());
        Self {
            structures: keep(self.structures),
            charges: keep(self.charges),
            names: keep(self.names),
            topologies: keep(self.topologies),
            dipoles: keep(self.dipoles),
            config: keep(self.config),
        }
    }
}

impl Dataset {
    /// Writes every series that has a path, plus the configuration if requested.
    /// Untracked series are written as zero-length arrays.
    pub fn save(&self, paths: &SeriesPaths) -> Result<(), DatasetError> {
        let n = self.max_atom;

        if let Some(path) = &paths.structures {
            let shape = [self.structures.len(), n, STRUCTURE_COLUMNS];
            npy::write_floats_to_path(path, &shape, self.structures.raw())
                .map_err(|e| DatasetError::from_npy(path, e))?;
        }
        if let Some(path) = &paths.charges {
            let shape = [self.charges.len(), n];
            npy::write_floats_to_path(path, &shape, self.charges.raw())
                .map_err(|e| DatasetError::from_npy(path, e))?;
        }
        if let Some(path) = &paths.names {
            npy::write_strings_to_path(path, &self.names)
                .map_err(|e| DatasetError::from_npy(path, e))?;
        }
        if let Some(path) = &paths.topologies {
            let shape = [self.topologies.len(), n, n];
            let values: Vec<i64> = self.topologies.raw().iter().map(|&b| i64::from(b)).collect();
            npy::write_ints_to_path(path, &shape, &values)
                .map_err(|e| DatasetError::from_npy(path, e))?;
        }
        if let Some(path) = &paths.dipoles {
            let shape = [self.dipoles.len(), 3];
            npy::write_floats_to_path(path, &shape, self.dipoles.raw())
                .map_err(|e| DatasetError::from_npy(path, e))?;
        }
        if let Some(path) = &paths.config {
            self.config().save(path)?;
        }

        debug!(molecules = self.len(), "Saved dataset series");
        Ok(())
    }

    /// Replaces the dataset with the series found at `paths`.
    ///
    /// Without a config path the current `max_atom`, charge type and MI flag are
    /// kept and every file must match them.
    ///
    /// # Arguments
    ///
    /// * `paths` - One optional `.npy` path per series plus the optional config path.
    ///   A series without a path is left untracked.
    ///
    /// # Errors
    ///
    /// Fails with [`DatasetError::ShapeMismatch`] when a file's per-molecule shape
    /// disagrees with `max_atom`, [`DatasetError::Persistence`] on unreadable or
    /// mistyped files and [`DatasetError::InvariantViolation`] when the loaded
    /// series do not form a valid dataset. The dataset is unchanged on failure.
    pub fn load(&mut self, paths: &SeriesPaths) -> Result<(), DatasetError> {
        let config = match &paths.config {
            Some(path) => DatasetConfig::load(path)?,
            None => self.config(),
        };
        let mut candidate = Dataset::from_config(&config)?;
        let n = candidate.max_atom;

        if let Some(path) = &paths.structures {
            let array = read_array(path)?;
            check_dimensions(Series::Structures, &array, &[n, STRUCTURE_COLUMNS])?;
            let values = array.into_floats().map_err(|e| DatasetError::from_npy(path, e))?;
            candidate.structures = into_series(Series::Structures, values, n, STRUCTURE_COLUMNS)?;
        }
        if let Some(path) = &paths.charges {
            let array = read_array(path)?;
            check_dimensions(Series::Charges, &array, &[n])?;
            let values = array.into_floats().map_err(|e| DatasetError::from_npy(path, e))?;
            candidate.charges = into_series(Series::Charges, values, n, 1)?;
        }
        if let Some(path) = &paths.names {
            let array = read_array(path)?;
            check_dimensions(Series::Names, &array, &[])?;
            candidate.names = array
                .into_strings()
                .map_err(|e| DatasetError::from_npy(path, e))?;
        }
        if let Some(path) = &paths.topologies {
            let array = read_array(path)?;
            check_dimensions(Series::Topologies, &array, &[n, n])?;
            let values = array
                .into_ints()
                .map_err(|e| DatasetError::from_npy(path, e))?
                .into_iter()
                .map(|v| {
                    u8::try_from(v).map_err(|_| DatasetError::InvalidRecord {
                        series: Series::Topologies,
                        reason: format!("bond order {} is out of range", v),
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;
            candidate.topologies = into_series(Series::Topologies, values, n, n)?;
        }
        if let Some(path) = &paths.dipoles {
            let array = read_array(path)?;
            check_dimensions(Series::Dipoles, &array, &[3])?;
            let values = array.into_floats().map_err(|e| DatasetError::from_npy(path, e))?;
            candidate.dipoles = into_series(Series::Dipoles, values, 1, 3)?;
        }

        candidate.validate()?;
        info!(
            molecules = candidate.len(),
            max_atom = candidate.max_atom,
            "Loaded dataset"
        );
        *self = candidate;
        Ok(())
    }

    /// Saves every series and the configuration under `dir`, creating it if needed.
    pub fn save_all(&self, dir: impl AsRef<Path>) -> Result<(), DatasetError> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir).map_err(|e| DatasetError::io(dir, e))?;
        self.save(&SeriesPaths::in_directory(dir))?;
        info!(dir = %dir.display(), molecules = self.len(), "Saved dataset");
        Ok(())
    }

    /// Loads whatever standard files exist under `dir`; missing series stay absent.
    pub fn load_all(&mut self, dir: impl AsRef<Path>) -> Result<(), DatasetError> {
        self.load(&SeriesPaths::in_directory(dir).existing_only())
    }
}

fn read_array(path: &Path) -> Result<NpyArray, DatasetError> {
    npy::read_from_path(path).map_err(|e| DatasetError::from_npy(path, e))
}

/// Checks that `array` is a stack of blocks shaped `per_molecule`.
fn check_dimensions(
    series: Series,
    array: &NpyArray,
    per_molecule: &[usize],
) -> Result<(), DatasetError> {
    let matches = array.shape.len() == per_molecule.len() + 1 && array.shape[1..] == *per_molecule;
    if !matches {
        let found = if array.shape.len() == per_molecule.len() + 1 {
            array.shape[1..].to_vec()
        } else {
            array.shape.clone()
        };
        return Err(DatasetError::ShapeMismatch {
            series,
            expected: per_molecule.to_vec(),
            found,
        });
    }
    Ok(())
}

fn into_series<T>(
    series: Series,
    values: Vec<T>,
    rows: usize,
    cols: usize,
) -> Result<PaddedSeries<T>, DatasetError>
where
    T: Scalar + Copy + Default,
{
    PaddedSeries::from_raw(values, rows, cols).ok_or_else(|| {
        DatasetError::InvariantViolation(format!("{} data is not a whole number of molecules", series))
    })
}
