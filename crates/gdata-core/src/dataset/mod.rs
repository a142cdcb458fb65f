//! # Dataset Module
//!
//! The [`Dataset`] container and everything that operates on it as a whole.
//!
//! A dataset keeps five parallel per-molecule series, all indexed by the same molecule
//! index and padded to one dataset-wide `max_atom`:
//!
//! - **structures** - `max_atom x 4` arrays of atomic number and Cartesian coordinates
//! - **charges** - one partial charge per atom slot, of the dataset's [`ChargeType`]
//! - **names** - unique labels used as the join key by [`merge()`]
//! - **topologies** - symmetric `max_atom x max_atom` bond-order matrices
//! - **dipoles** - one dipole vector per molecule
//!
//! A series is either tracked for every molecule or absent for all of them. Absent
//! fields of a record are zero-filled for tracked series on insertion.
//!
//! ## Submodules
//!
//! - **Ingestion** ([`ingest`]) - Single-file and directory reads through the format
//!   parsers, batch failure reports and xyz export
//! - **Derivations** ([`derive`]) - Geometric and graph projections
//! - **Persistence** ([`persist`]) - `.npy` save/load of each series
//! - **Merge** ([`merge`](mod@merge)) - Name-keyed union of two datasets
//! - **Configuration** ([`config`]), **Errors** ([`error`]), **Progress** ([`progress`])

pub mod config;
pub mod derive;
pub mod error;
pub mod ingest;
pub mod merge;
pub mod persist;
pub mod progress;

pub use crate::core::models::charge::ChargeType;
pub use crate::core::models::record::MoleculeRecord;
pub use crate::core::models::series::Series;
pub use config::DatasetConfig;
pub use error::DatasetError;
pub use ingest::{BatchFailure, BatchReport, FailureReason};
pub use merge::{MergeOptions, merge};
pub use persist::SeriesPaths;
pub use progress::{Progress, ProgressReporter};

use crate::core::elements::element_lookup;
use crate::core::models::record::STRUCTURE_COLUMNS;
use crate::core::models::series::PaddedSeries;
use nalgebra::{DVector, Vector3};
use std::collections::HashSet;
use tracing::{debug, info, warn};

const DIPOLE_COMPONENTS: usize = 3;

/// Molecule count of every series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DataShape {
    pub structures: usize,
    pub charges: usize,
    pub names: usize,
    pub topologies: usize,
    pub dipoles: usize,
}

impl DataShape {
    pub fn get(&self, series: Series) -> usize {
        match series {
            Series::Structures => self.structures,
            Series::Charges => self.charges,
            Series::Names => self.names,
            Series::Topologies => self.topologies,
            Series::Dipoles => self.dipoles,
        }
    }
}

/// A batch of molecules stored as five parallel, padded series.
///
/// The dataset is exclusively owned; every operation runs synchronously and leaves
/// the dataset unchanged when it fails.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    max_atom: usize,
    charge_type: ChargeType,
    mi_coordinates: bool,
    structures: PaddedSeries<f64>,
    charges: PaddedSeries<f64>,
    names: Vec<String>,
    topologies: PaddedSeries<u8>,
    dipoles: PaddedSeries<f64>,
}

impl Default for Dataset {
    fn default() -> Self {
        let config = DatasetConfig::default();
        Self::empty(config.max_atom, config.charge_type)
    }
}

impl Dataset {
    /// Creates an empty dataset.
    ///
    /// # Arguments
    ///
    /// * `max_atom` - Number of atom slots every molecule is padded to.
    /// * `charge_type` - The population analysis whose charges the dataset stores.
    ///
    /// # Return
    ///
    /// Returns a dataset tracking no series yet; the first added record decides which
    /// series are tracked.
    ///
    /// # Errors
    ///
    /// Returns [`DatasetError::InvalidMaxAtom`] if `max_atom` is zero.
    pub fn new(max_atom: usize, charge_type: ChargeType) -> Result<Self, DatasetError> {
        if max_atom == 0 {
            return Err(DatasetError::InvalidMaxAtom);
        }
        Ok(Self::empty(max_atom, charge_type))
    }

    pub fn from_config(config: &DatasetConfig) -> Result<Self, DatasetError> {
        let mut dataset = Self::new(config.max_atom, config.charge_type)?;
        dataset.mi_coordinates = config.mi_coordinates;
        Ok(dataset)
    }

    fn empty(max_atom: usize, charge_type: ChargeType) -> Self {
        Self {
            max_atom,
            charge_type,
            mi_coordinates: false,
            structures: PaddedSeries::new(max_atom, STRUCTURE_COLUMNS),
            charges: PaddedSeries::new(max_atom, 1),
            names: Vec::new(),
            topologies: PaddedSeries::new(max_atom, max_atom),
            dipoles: PaddedSeries::new(1, DIPOLE_COMPONENTS),
        }
    }

    pub fn config(&self) -> DatasetConfig {
        DatasetConfig {
            max_atom: self.max_atom,
            charge_type: self.charge_type,
            mi_coordinates: self.mi_coordinates,
        }
    }

    pub fn max_atom(&self) -> usize {
        self.max_atom
    }

    pub fn charge_type(&self) -> ChargeType {
        self.charge_type
    }

    /// Whether the structures have been converted to principal-axis coordinates.
    pub fn is_mi_coordinates(&self) -> bool {
        self.mi_coordinates
    }

    /// Number of molecules, i.e. the length of the tracked series.
    pub fn len(&self) -> usize {
        Series::ALL
            .iter()
            .map(|&s| self.series_len(s))
            .max()
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn series_len(&self, series: Series) -> usize {
        match series {
            Series::Structures => self.structures.len(),
            Series::Charges => self.charges.len(),
            Series::Names => self.names.len(),
            Series::Topologies => self.topologies.len(),
            Series::Dipoles => self.dipoles.len(),
        }
    }

    pub fn is_tracked(&self, series: Series) -> bool {
        self.series_len(series) > 0
    }

    pub fn tracked_series(&self) -> Vec<Series> {
        Series::ALL
            .into_iter()
            .filter(|&s| self.is_tracked(s))
            .collect()
    }

    pub fn get_data_shape(&self) -> DataShape {
        DataShape {
            structures: self.structures.len(),
            charges: self.charges.len(),
            names: self.names.len(),
            topologies: self.topologies.len(),
            dipoles: self.dipoles.len(),
        }
    }

    /// Appends one molecule.
    ///
    /// Every array in `record` must already be padded to `max_atom`. In an empty
    /// dataset the fields present in `record` decide which series are tracked; later
    /// records may omit per-atom or dipole fields (stored as zeros) but may not add
    /// a series the dataset does not track, nor omit the name once names are tracked.
    ///
    /// # Arguments
    ///
    /// * `record` - The molecule to append, consumed on success and on failure.
    ///
    /// # Errors
    ///
    /// Returns an error and leaves the dataset unchanged if the record is empty,
    /// mis-shaped, holds invalid content, duplicates a name or breaks series presence.
    pub fn add_data(&mut self, record: MoleculeRecord) -> Result<(), DatasetError> {
        self.check_record(&record)?;
        self.check_presence(&record)?;

        let populated = !self.is_empty();
        match &record.structure {
            Some(s) => self.structures.push_matrix(s),
            None if populated && !self.structures.is_empty() => self.structures.push_zeros(),
            None => {}
        }
        match &record.charges {
            Some(c) => self.charges.push_slice(c.as_slice()),
            None if populated && !self.charges.is_empty() => self.charges.push_zeros(),
            None => {}
        }
        match &record.topology {
            Some(t) => self.topologies.push_matrix(t),
            None if populated && !self.topologies.is_empty() => self.topologies.push_zeros(),
            None => {}
        }
        match &record.dipole {
            Some(d) => self.dipoles.push_slice(d.as_slice()),
            None if populated && !self.dipoles.is_empty() => self.dipoles.push_zeros(),
            None => {}
        }
        if let Some(name) = record.name {
            self.names.push(name);
        }

        debug!(molecules = self.len(), "Added molecule to dataset");
        Ok(())
    }

    fn check_record(&self, record: &MoleculeRecord) -> Result<(), DatasetError> {
        if record.is_empty() {
            return Err(DatasetError::SeriesPresence(
                "record carries no data".to_string(),
            ));
        }
        let n = self.max_atom;

        if let Some(structure) = &record.structure {
            check_shape(Series::Structures, &[n, STRUCTURE_COLUMNS], structure.shape())?;
            check_structure_block(structure.transpose().as_slice())?;
        }
        if let Some(charges) = &record.charges {
            check_shape(Series::Charges, &[n], (charges.len(), 1))?;
        }
        if let Some(topology) = &record.topology {
            check_shape(Series::Topologies, &[n, n], topology.shape())?;
            check_topology_block(topology.as_slice(), n)?;
            if let Some(structure) = &record.structure {
                check_bonds_on_atoms(structure.transpose().as_slice(), topology.as_slice(), n)?;
            }
        }
        if let Some(name) = &record.name {
            check_name(name)?;
            if self.names.contains(name) {
                return Err(DatasetError::DuplicateName(name.clone()));
            }
        }
        Ok(())
    }

    fn check_presence(&self, record: &MoleculeRecord) -> Result<(), DatasetError> {
        if self.is_empty() {
            return Ok(());
        }
        let provided = [
            (Series::Structures, record.structure.is_some()),
            (Series::Charges, record.charges.is_some()),
            (Series::Names, record.name.is_some()),
            (Series::Topologies, record.topology.is_some()),
            (Series::Dipoles, record.dipole.is_some()),
        ];
        for (series, present) in provided {
            let tracked = self.is_tracked(series);
            if present && !tracked {
                return Err(DatasetError::SeriesPresence(format!(
                    "{} are not tracked by this dataset of {} molecules",
                    series,
                    self.len()
                )));
            }
            if series == Series::Names && tracked && !present {
                return Err(DatasetError::SeriesPresence(
                    "molecules of this dataset are named but the record has no name".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// Returns one molecule's tracked fields.
    pub fn get_record(&self, index: usize) -> Option<MoleculeRecord> {
        if index >= self.len() {
            return None;
        }
        let mut record = MoleculeRecord::new();
        if self.structures.len() > index {
            record.structure = Some(self.structures.matrix(index));
        }
        if self.charges.len() > index {
            record.charges = Some(DVector::from_row_slice(self.charges.block(index)));
        }
        if let Some(name) = self.names.get(index) {
            record.name = Some(name.clone());
        }
        if self.topologies.len() > index {
            record.topology = Some(self.topologies.matrix(index));
        }
        if self.dipoles.len() > index {
            record.dipole = Some(Vector3::from_row_slice(self.dipoles.block(index)));
        }
        Some(record)
    }

    pub fn delete_structures(&mut self) {
        self.structures.clear();
        self.mi_coordinates = false;
        debug!("Deleted structures");
    }

    pub fn delete_charges(&mut self) {
        self.charges.clear();
        debug!("Deleted charges");
    }

    pub fn delete_names(&mut self) {
        self.names.clear();
        debug!("Deleted names");
    }

    pub fn delete_topologies(&mut self) {
        self.topologies.clear();
        debug!("Deleted topologies");
    }

    pub fn delete_dipole(&mut self) {
        self.dipoles.clear();
        debug!("Deleted dipoles");
    }

    /// One past the last atom slot of molecule `index` holding a non-zero value in any
    /// per-atom series.
    fn occupied_slots(&self, index: usize) -> usize {
        let n = self.max_atom;
        let mut occupied = 0;
        if index < self.structures.len() {
            let rows = self.structures.block(index).chunks_exact(STRUCTURE_COLUMNS);
            occupied = occupied.max(last_nonzero_row(rows));
        }
        if index < self.charges.len() {
            let rows = self.charges.block(index).chunks_exact(1);
            occupied = occupied.max(last_nonzero_row(rows));
        }
        if index < self.topologies.len() {
            let rows = self.topologies.block(index).chunks_exact(n);
            occupied = occupied.max(last_nonzero_row(rows));
        }
        occupied
    }

    /// Smallest `max_atom` that holds every stored molecule without truncation.
    pub fn required_max_atom(&self) -> usize {
        (0..self.len())
            .map(|i| self.occupied_slots(i))
            .max()
            .unwrap_or(0)
    }

    /// Re-pads or truncates every per-atom series to `max_atom`.
    ///
    /// # Arguments
    ///
    /// * `max_atom` - The new slot count. Smaller values are accepted only down to
    ///   [`Dataset::required_max_atom`].
    ///
    /// # Errors
    ///
    /// Returns [`DatasetError::InvalidMaxAtom`] for zero and
    /// [`DatasetError::Truncation`] if a non-padding slot would be discarded; the
    /// dataset is unchanged in both cases.
    pub fn change_max_atom(&mut self, max_atom: usize) -> Result<(), DatasetError> {
        if max_atom == 0 {
            return Err(DatasetError::InvalidMaxAtom);
        }
        let required = self.required_max_atom();
        if max_atom < required {
            return Err(DatasetError::Truncation {
                requested: max_atom,
                required,
            });
        }
        self.resize(max_atom);
        Ok(())
    }

    /// Shrinks `max_atom` to the largest number of occupied atom slots and returns
    /// the new value. A dataset without any occupied slot keeps its `max_atom`.
    pub fn minimise(&mut self) -> usize {
        let required = self.required_max_atom();
        if required > 0 {
            self.resize(required);
        }
        self.max_atom
    }

    fn resize(&mut self, max_atom: usize) {
        if max_atom == self.max_atom {
            return;
        }
        info!(from = self.max_atom, to = max_atom, "Changing max_atom");
        self.structures.reshape(max_atom, STRUCTURE_COLUMNS);
        self.charges.reshape(max_atom, 1);
        self.topologies.reshape(max_atom, max_atom);
        self.max_atom = max_atom;
    }

    /// Checks every dataset invariant, returning the first violation found.
    ///
    /// # Errors
    ///
    /// Returns [`DatasetError::InvariantViolation`] describing the violation.
    pub fn validate(&self) -> Result<(), DatasetError> {
        let violation = |message: String| DatasetError::InvariantViolation(message);

        let lengths: Vec<(Series, usize)> = Series::ALL
            .into_iter()
            .map(|s| (s, self.series_len(s)))
            .filter(|&(_, len)| len > 0)
            .collect();
        if lengths.windows(2).any(|w| w[0].1 != w[1].1) {
            let listed: Vec<String> = lengths
                .iter()
                .map(|(s, len)| format!("{}={}", s, len))
                .collect();
            return Err(violation(format!("series lengths differ ({})", listed.join(", "))));
        }

        let n = self.max_atom;
        let buffers = [
            (Series::Structures, self.structures.shape(), (n, STRUCTURE_COLUMNS), self.structures.is_consistent()),
            (Series::Charges, self.charges.shape(), (n, 1), self.charges.is_consistent()),
            (Series::Topologies, self.topologies.shape(), (n, n), self.topologies.is_consistent()),
            (Series::Dipoles, self.dipoles.shape(), (1, DIPOLE_COMPONENTS), self.dipoles.is_consistent()),
        ];
        for (series, shape, expected, consistent) in buffers {
            if shape != expected || !consistent {
                return Err(violation(format!(
                    "{} buffer does not match max_atom {}",
                    series, n
                )));
            }
        }

        for (i, block) in self.structures.blocks().enumerate() {
            check_structure_block(block)
                .map_err(|e| violation(format!("molecule {}: {}", i, e)))?;
        }
        for (i, block) in self.topologies.blocks().enumerate() {
            check_topology_block(block, n)
                .map_err(|e| violation(format!("molecule {}: {}", i, e)))?;
            if i < self.structures.len() {
                check_bonds_on_atoms(self.structures.block(i), block, n)
                    .map_err(|e| violation(format!("molecule {}: {}", i, e)))?;
            }
        }

        let mut seen = HashSet::with_capacity(self.names.len());
        for name in &self.names {
            check_name(name).map_err(|e| violation(e.to_string()))?;
            if !seen.insert(name.as_str()) {
                return Err(violation(format!("duplicate molecule name '{}'", name)));
            }
        }
        Ok(())
    }

    /// Returns whether every invariant holds. Never mutates the dataset; a violation
    /// is logged as a warning.
    pub fn self_check(&self) -> bool {
        match self.validate() {
            Ok(()) => true,
            Err(e) => {
                warn!("Dataset self-check failed: {}", e);
                false
            }
        }
    }
}

fn last_nonzero_row<'a, T: PartialEq + Default + 'a>(
    mut rows: impl DoubleEndedIterator<Item = &'a [T]> + ExactSizeIterator,
) -> usize {
    let zero = T::default();
    rows.rposition(|row| row.iter().any(|v| *v != zero))
        .map_or(0, |i| i + 1)
}

fn check_shape(series: Series, expected: &[usize], found: (usize, usize)) -> Result<(), DatasetError> {
    let found = if expected.len() == 1 {
        vec![found.0]
    } else {
        vec![found.0, found.1]
    };
    if found != expected {
        return Err(DatasetError::ShapeMismatch {
            series,
            expected: expected.to_vec(),
            found,
        });
    }
    Ok(())
}

/// Checks a row-major `max_atom x 4` block: known elements, real atoms first, then
/// all-zero padding rows.
fn check_structure_block(block: &[f64]) -> Result<(), DatasetError> {
    let mut padding_from = None;
    for (slot, row) in block.chunks_exact(STRUCTURE_COLUMNS).enumerate() {
        if row[0] == 0.0 {
            if row[1..].iter().any(|&v| v != 0.0) {
                return Err(invalid_record(
                    Series::Structures,
                    format!("padding slot {} holds coordinates", slot),
                ));
            }
            padding_from.get_or_insert(slot);
        } else {
            if let Some(first) = padding_from {
                return Err(invalid_record(
                    Series::Structures,
                    format!("atom in slot {} follows padding slot {}", slot, first),
                ));
            }
            element_lookup(row[0])?;
        }
    }
    Ok(())
}

fn check_topology_block(block: &[u8], n: usize) -> Result<(), DatasetError> {
    for i in 0..n {
        if block[i * n + i] != 0 {
            return Err(invalid_record(
                Series::Topologies,
                format!("slot {} is bonded to itself", i),
            ));
        }
        for j in (i + 1)..n {
            if block[i * n + j] != block[j * n + i] {
                return Err(invalid_record(
                    Series::Topologies,
                    format!("bond between slots {} and {} is not symmetric", i, j),
                ));
            }
        }
    }
    Ok(())
}

/// Number of real atoms in a row-major structure block. Zero for a placeholder.
pub(crate) fn real_atom_count(structure: &[f64]) -> usize {
    structure
        .chunks_exact(STRUCTURE_COLUMNS)
        .take_while(|row| row[0] != 0.0)
        .count()
}

/// Rejects bonds on padding slots. An all-zero placeholder structure constrains
/// nothing.
fn check_bonds_on_atoms(structure: &[f64], topology: &[u8], n: usize) -> Result<(), DatasetError> {
    let atoms = real_atom_count(structure);
    if atoms == 0 {
        return Ok(());
    }
    for i in 0..n {
        for j in 0..n {
            if (i >= atoms || j >= atoms) && topology[i * n + j] != 0 {
                let (padding, partner) = if i >= atoms { (i, j) } else { (j, i) };
                return Err(invalid_record(
                    Series::Topologies,
                    format!("padding slot {} is bonded to slot {}", padding, partner),
                ));
            }
        }
    }
    Ok(())
}

fn check_name(name: &str) -> Result<(), DatasetError> {
    if name.trim().is_empty() {
        return Err(invalid_record(Series::Names, "empty molecule name".to_string()));
    }
    Ok(())
}

fn invalid_record(series: Series, reason: String) -> DatasetError {
    DatasetError::InvalidRecord { series, reason }
}
