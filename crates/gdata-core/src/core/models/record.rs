use nalgebra::{DMatrix, DVector, Point3, Vector3};
use thiserror::Error;

/// Number of columns of a structure row: atomic number followed by x, y, z.
pub const STRUCTURE_COLUMNS: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Molecule has {found} atoms but max_atom is {max_atom}")]
pub struct AtomCountExceededError {
    pub found: usize,
    pub max_atom: usize,
}

/// An atom as read from a molecule file, before padding.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParsedAtom {
    pub atomic_number: u8,
    pub position: Point3<f64>,
}

impl ParsedAtom {
    pub fn new(atomic_number: u8, position: Point3<f64>) -> Self {
        Self {
            atomic_number,
            position,
        }
    }
}

/// One molecule's data, with every array already padded to the dataset's `max_atom`.
///
/// Fields left as `None` are absent for this molecule. The dataset decides whether an
/// absent field becomes a zero placeholder or is rejected, depending on which series
/// it currently tracks.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MoleculeRecord {
    /// `max_atom x 4` array: atomic number, x, y, z per atom slot.
    pub structure: Option<DMatrix<f64>>,
    /// One partial charge per atom slot.
    pub charges: Option<DVector<f64>>,
    pub name: Option<String>,
    /// `max_atom x max_atom` symmetric bond-order matrix with a zero diagonal.
    pub topology: Option<DMatrix<u8>>,
    /// Dipole moment components in Debye.
    pub dipole: Option<Vector3<f64>>,
}

impl MoleculeRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_structure(mut self, structure: DMatrix<f64>) -> Self {
        self.structure = Some(structure);
        self
    }
    pub fn with_charges(mut self, charges: DVector<f64>) -> Self {
        self.charges = Some(charges);
        self
    }
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
    pub fn with_topology(mut self, topology: DMatrix<u8>) -> Self {
        self.topology = Some(topology);
        self
    }
    pub fn with_dipole(mut self, dipole: Vector3<f64>) -> Self {
        self.dipole = Some(dipole);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.structure.is_none()
            && self.charges.is_none()
            && self.name.is_none()
            && self.topology.is_none()
            && self.dipole.is_none()
    }

    /// Number of real (non-padding) atoms in the structure, if one is present.
    pub fn atom_count(&self) -> Option<usize> {
        self.structure
            .as_ref()
            .map(|s| s.column(0).iter().take_while(|&&z| z != 0.0).count())
    }
}

pub(crate) fn pad_structure(
    atoms: &[ParsedAtom],
    max_atom: usize,
) -> Result<DMatrix<f64>, AtomCountExceededError> {
    check_atom_count(atoms.len(), max_atom)?;
    let mut structure = DMatrix::zeros(max_atom, STRUCTURE_COLUMNS);
    for (i, atom) in atoms.iter().enumerate() {
        structure[(i, 0)] = atom.atomic_number as f64;
        structure[(i, 1)] = atom.position.x;
        structure[(i, 2)] = atom.position.y;
        structure[(i, 3)] = atom.position.z;
    }
    Ok(structure)
}

pub(crate) fn pad_charges(
    charges: &[f64],
    max_atom: usize,
) -> Result<DVector<f64>, AtomCountExceededError> {
    check_atom_count(charges.len(), max_atom)?;
    let mut padded = DVector::zeros(max_atom);
    padded.rows_mut(0, charges.len()).copy_from_slice(charges);
    Ok(padded)
}

/// Builds a symmetric topology from zero-based `(atom, atom, order)` triples.
///
/// Callers validate the indices; self bonds are ignored so the diagonal stays zero.
pub(crate) fn build_topology(bonds: &[(usize, usize, u8)], max_atom: usize) -> DMatrix<u8> {
    let mut topology = DMatrix::zeros(max_atom, max_atom);
    for &(a, b, order) in bonds {
        if a == b {
            continue;
        }
        topology[(a, b)] = order;
        topology[(b, a)] = order;
    }
    topology
}

fn check_atom_count(found: usize, max_atom: usize) -> Result<(), AtomCountExceededError> {
    if found > max_atom {
        Err(AtomCountExceededError { found, max_atom })
    } else {
        Ok(())
    }
}
