//! Read-only projections of a dataset, plus the principal-axis conversion.
//!
//! Projections of a series the dataset does not track are empty vectors. The
//! geometric quantities that need coordinates fail with
//! [`DatasetError::EmptySeries`] instead.

use super::Dataset;
use super::error::DatasetError;
use super::real_atom_count;
use crate::core::elements::atomic_mass;
use crate::core::models::record::STRUCTURE_COLUMNS;
use crate::core::models::series::Series;
use crate::core::utils::geometry::{inertia_tensor, mass_centre, orient_axes, principal_axes};
use nalgebra::{DMatrix, DVector, Matrix3, Point3, Vector3};
use tracing::info;

/// Masses and positions of the real atoms of one row-major structure block.
fn real_atoms(block: &[f64]) -> Result<(Vec<f64>, Vec<Point3<f64>>), DatasetError> {
    let mut masses = Vec::new();
    let mut positions = Vec::new();
    for row in block.chunks_exact(STRUCTURE_COLUMNS) {
        if row[0] == 0.0 {
            continue;
        }
        masses.push(atomic_mass(row[0])?);
        positions.push(Point3::new(row[1], row[2], row[3]));
    }
    Ok((masses, positions))
}

impl Dataset {
    fn require_structures(&self) -> Result<(), DatasetError> {
        if self.structures.is_empty() {
            Err(DatasetError::EmptySeries(Series::Structures))
        } else {
            Ok(())
        }
    }

    /// Whether slot `slot` of molecule `index` holds an atom. Without a structure, or
    /// with an all-zero placeholder, a slot counts as real if it has any bond.
    fn is_real_slot(&self, index: usize, slot: usize) -> bool {
        if index < self.structures.len() {
            let block = self.structures.block(index);
            if real_atom_count(block) > 0 {
                return block[slot * STRUCTURE_COLUMNS] != 0.0;
            }
        }
        if index < self.topologies.len() {
            let n = self.max_atom;
            self.topologies.block(index)[slot * n..(slot + 1) * n]
                .iter()
                .any(|&b| b != 0)
        } else {
            false
        }
    }

    /// Atomic mass of every atom slot, zero for padding.
    pub fn get_atom_weight(&self) -> Result<Vec<DVector<f64>>, DatasetError> {
        self.structures
            .blocks()
            .map(|block| -> Result<DVector<f64>, DatasetError> {
                let masses = block
                    .chunks_exact(STRUCTURE_COLUMNS)
                    .map(|row| if row[0] == 0.0 { Ok(0.0) } else { atomic_mass(row[0]) })
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(DVector::from_vec(masses))
            })
            .collect()
    }

    /// Mass-weighted average position of each molecule.
    pub fn get_mass_centre(&self) -> Result<Vec<Point3<f64>>, DatasetError> {
        self.require_structures()?;
        self.structures
            .blocks()
            .map(|block| -> Result<Point3<f64>, DatasetError> {
                let (masses, positions) = real_atoms(block)?;
                Ok(mass_centre(&masses, &positions))
            })
            .collect()
    }

    /// Inertia tensor of each molecule about its mass centre.
    pub fn get_moment_of_inertia_tensor(&self) -> Result<Vec<Matrix3<f64>>, DatasetError> {
        self.require_structures()?;
        self.structures
            .blocks()
            .map(|block| -> Result<Matrix3<f64>, DatasetError> {
                let (masses, positions) = real_atoms(block)?;
                let centre = mass_centre(&masses, &positions);
                Ok(inertia_tensor(&masses, &positions, &centre))
            })
            .collect()
    }

    /// Overwrites the stored structures with principal-axis coordinates and returns
    /// them.
    ///
    /// Coordinates are taken relative to the mass centre and projected onto the
    /// inertia eigenvectors, ordered by ascending eigenvalue. Each axis is oriented so
    /// that the largest-magnitude coordinate along it is positive. Padding rows stay
    /// zero.
    ///
    /// # Errors
    ///
    /// Fails with [`DatasetError::EmptySeries`] without structures; nothing is
    /// modified on failure.
    pub fn convert_to_mi_coordinate(&mut self) -> Result<Vec<DMatrix<f64>>, DatasetError> {
        self.require_structures()?;

        let mut converted = Vec::with_capacity(self.structures.len());
        for block in self.structures.blocks() {
            let (masses, positions) = real_atoms(block)?;
            let centre = mass_centre(&masses, &positions);
            let tensor = inertia_tensor(&masses, &positions, &centre);
            let (_, axes) = principal_axes(&tensor);
            let relative: Vec<Vector3<f64>> = positions.iter().map(|p| p - centre).collect();
            let axes = orient_axes(&axes, &relative);
            let transform = axes.transpose();
            converted.push(relative.iter().map(|r| transform * r).collect::<Vec<_>>());
        }

        for (index, coordinates) in converted.into_iter().enumerate() {
            let block = self.structures.block_mut(index);
            for (slot, r) in coordinates.iter().enumerate() {
                let row = &mut block[slot * STRUCTURE_COLUMNS..(slot + 1) * STRUCTURE_COLUMNS];
                row[1] = r.x;
                row[2] = r.y;
                row[3] = r.z;
            }
        }
        self.mi_coordinates = true;
        info!(
            molecules = self.structures.len(),
            "Converted structures to principal-axis coordinates"
        );
        Ok(self.get_structures(false))
    }

    /// Pairwise distances between atom slots, zero wherever either slot is padding.
    pub fn get_atomic_distance(&self) -> Vec<DMatrix<f64>> {
        let n = self.max_atom;
        self.structures
            .blocks()
            .map(|block| {
                let rows: Vec<&[f64]> = block.chunks_exact(STRUCTURE_COLUMNS).collect();
                DMatrix::from_fn(n, n, |i, j| {
                    if rows[i][0] == 0.0 || rows[j][0] == 0.0 {
                        return 0.0;
                    }
                    let a = Point3::new(rows[i][1], rows[i][2], rows[i][3]);
                    let b = Point3::new(rows[j][1], rows[j][2], rows[j][3]);
                    (a - b).norm()
                })
            })
            .collect()
    }

    /// Stored bond-order matrices, with a unit diagonal on real atom slots when
    /// `self_loop` is set.
    pub fn get_topologies(&self, self_loop: bool) -> Vec<DMatrix<u8>> {
        (0..self.topologies.len())
            .map(|index| {
                let mut topology = self.topologies.matrix(index);
                if self_loop {
                    self.add_self_loops(index, &mut topology);
                }
                topology
            })
            .collect()
    }

    /// 0/1 adjacency matrices derived from the topologies.
    pub fn get_adjacency(&self, self_loop: bool) -> Vec<DMatrix<u8>> {
        (0..self.topologies.len())
            .map(|index| {
                let mut adjacency = self.topologies.matrix(index).map(|b| u8::from(b != 0));
                if self_loop {
                    self.add_self_loops(index, &mut adjacency);
                }
                adjacency
            })
            .collect()
    }

    fn add_self_loops(&self, index: usize, matrix: &mut DMatrix<u8>) {
        for slot in 0..self.max_atom {
            if self.is_real_slot(index, slot) {
                matrix[(slot, slot)] = 1;
            }
        }
    }

    /// Diagonal matrices of per-atom bond counts.
    pub fn get_degree(&self) -> Vec<DMatrix<u32>> {
        self.get_adjacency(false)
            .iter()
            .map(|adjacency| {
                let degrees = DVector::from_fn(adjacency.nrows(), |i, _| {
                    adjacency.row(i).iter().map(|&b| b as u32).sum::<u32>()
                });
                DMatrix::from_diagonal(&degrees)
            })
            .collect()
    }

    /// Atomic number of every atom slot, zero for padding.
    pub fn get_atom_info(&self) -> Vec<DVector<u8>> {
        self.structures
            .blocks()
            .map(|block| {
                DVector::from_iterator(
                    self.max_atom,
                    block
                        .chunks_exact(STRUCTURE_COLUMNS)
                        .map(|row| row[0] as u8),
                )
            })
            .collect()
    }

    /// Atomic numbers on the diagonal of a `max_atom x max_atom` matrix.
    pub fn get_atom_info_matrix(&self) -> Vec<DMatrix<u8>> {
        self.get_atom_info()
            .iter()
            .map(DMatrix::from_diagonal)
            .collect()
    }

    /// One `max_atom` vector of partial charges per molecule. Padding slots hold 0.
    pub fn get_charges(&self) -> Vec<DVector<f64>> {
        self.charges
            .blocks()
            .map(|block| DVector::from_vec(block.to_vec()))
            .collect()
    }

    /// Charges on the diagonal of a `max_atom x max_atom` matrix.
    pub fn get_charges_matrix(&self) -> Vec<DMatrix<f64>> {
        self.get_charges()
            .iter()
            .map(DMatrix::from_diagonal)
            .collect()
    }

    /// Stored structures; with `coor_only` the atomic-number column is dropped.
    pub fn get_structures(&self, coor_only: bool) -> Vec<DMatrix<f64>> {
        self.structures
            .matrices()
            .into_iter()
            .map(|m| if coor_only { m.columns(1, 3).into_owned() } else { m })
            .collect()
    }

    /// Molecule names in insertion order; empty when names are not tracked.
    pub fn get_names(&self) -> &[String] {
        &self.names
    }

    /// Dipole moment vector of each molecule, in Debye.
    pub fn get_dipole_xyz(&self) -> Vec<Vector3<f64>> {
        self.dipoles
            .blocks()
            .map(Vector3::from_row_slice)
            .collect()
    }

    /// Magnitude of each dipole moment.
    pub fn get_dipole_norm(&self) -> Vec<f64> {
        self.get_dipole_xyz().iter().map(|d| d.norm()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::ChargeType;
    use crate::dataset::test_support::{methane, water};

    const EPS: f64 = 1e-9;

    fn water_and_methane() -> Dataset {
        let mut d = Dataset::new(6, ChargeType::Mulliken).unwrap();
        d.add_data(water(6, "water")).unwrap();
        d.add_data(methane(6, "methane")).unwrap();
        d
    }

    mod geometry_tests {
        use super::*;

        #[test]
        fn atom_weights_are_zero_on_padding() {
            let weights = water_and_methane().get_atom_weight().unwrap();
            assert_eq!(weights[0].as_slice(), &[15.999, 1.008, 1.008, 0.0, 0.0, 0.0]);
            assert_eq!(weights[1][0], 12.011);
        }

        #[test]
        fn mass_centre_is_mass_weighted() {
            let centres = water_and_methane().get_mass_centre().unwrap();
            let expected_z = (15.999 * 0.1173 + 2.0 * 1.008 * -0.4692) / (15.999 + 2.0 * 1.008);
            assert!(centres[0].x.abs() < EPS);
            assert!(centres[0].y.abs() < EPS);
            assert!((centres[0].z - expected_z).abs() < EPS);
            assert!(centres[1].coords.norm() < EPS);
        }

        #[test]
        fn inertia_tensor_is_symmetric_and_isotropic_for_methane() {
            let tensors = water_and_methane().get_moment_of_inertia_tensor().unwrap();
            for t in &tensors {
                assert!((t - t.transpose()).norm() < EPS);
            }
            let methane = tensors[1];
            assert!((methane[(0, 1)]).abs() < EPS);
            assert!((methane[(0, 0)] - methane[(2, 2)]).abs() < EPS);
            // Water lies in the yz-plane: I_xx = I_yy + I_zz.
            let w = tensors[0];
            assert!((w[(0, 0)] - w[(1, 1)] - w[(2, 2)]).abs() < EPS);
        }

        #[test]
        fn geometry_requires_structures() {
            let mut d = water_and_methane();
            d.delete_structures();
            assert!(matches!(
                d.get_mass_centre(),
                Err(DatasetError::EmptySeries(Series::Structures))
            ));
            assert!(d.get_moment_of_inertia_tensor().is_err());
            assert!(d.convert_to_mi_coordinate().is_err());
            assert!(d.get_atom_weight().unwrap().is_empty());
        }

        #[test]
        fn mi_conversion_diagonalises_inertia_and_keeps_distances() {
            let mut d = water_and_methane();
            let distances = d.get_atomic_distance();
            let structures = d.convert_to_mi_coordinate().unwrap();
            assert!(d.is_mi_coordinates());
            assert_eq!(structures, d.get_structures(false));

            let tensor = d.get_moment_of_inertia_tensor().unwrap()[0];
            assert!(tensor[(0, 1)].abs() < 1e-8);
            assert!(tensor[(0, 2)].abs() < 1e-8);
            assert!(tensor[(1, 2)].abs() < 1e-8);
            assert!(tensor[(0, 0)] <= tensor[(1, 1)] && tensor[(1, 1)] <= tensor[(2, 2)]);

            for c in d.get_mass_centre().unwrap() {
                assert!(c.coords.norm() < 1e-9);
            }
            for (before, after) in distances.iter().zip(d.get_atomic_distance()) {
                assert!((before - after).norm() < 1e-9);
            }
            assert!(d.self_check());
        }

        #[test]
        fn mi_conversion_makes_largest_projection_positive() {
            let mut d = water_and_methane();
            let structures = d.convert_to_mi_coordinate().unwrap();
            let water = &structures[0];
            for axis in 1..4 {
                let mut column: Vec<f64> = water.column(axis).iter().copied().collect();
                column.sort_by(|a, b| b.abs().total_cmp(&a.abs()));
                // Mirror-image atoms tie; only a unique extreme fixes the sign.
                if column[0].abs() - column[1].abs() > 1e-9 {
                    assert!(column[0] > 0.0);
                }
            }
            assert!(water.rows(3, 3).iter().all(|&v| v == 0.0));
        }

        #[test]
        fn mi_conversion_is_reproducible() {
            let mut a = water_and_methane();
            let mut b = water_and_methane();
            assert_eq!(
                a.convert_to_mi_coordinate().unwrap(),
                b.convert_to_mi_coordinate().unwrap()
            );
        }

        #[test]
        fn atomic_distances_skip_padding() {
            let distances = water_and_methane().get_atomic_distance();
            let oh = (0.7572_f64.powi(2) + (0.1173_f64 + 0.4692).powi(2)).sqrt();
            assert!((distances[0][(0, 1)] - oh).abs() < EPS);
            assert_eq!(distances[0][(0, 4)], 0.0);
            assert_eq!(distances[0][(1, 1)], 0.0);
        }
    }

    mod graph_tests {
        use super::*;

        #[test]
        fn adjacency_self_loops_cover_real_slots_only() {
            let d = water_and_methane();
            let plain = d.get_adjacency(false);
            let looped = d.get_adjacency(true);
            for k in 0..6 {
                assert_eq!(plain[0][(k, k)], 0);
            }
            assert_eq!(
                (0..6).map(|k| looped[0][(k, k)]).collect::<Vec<_>>(),
                vec![1, 1, 1, 0, 0, 0]
            );
            assert_eq!(
                (0..6).map(|k| looped[1][(k, k)]).collect::<Vec<_>>(),
                vec![1, 1, 1, 1, 1, 0]
            );
        }

        #[test]
        fn adjacency_is_binary_while_topologies_keep_bond_orders() {
            let mut d = Dataset::new(3, ChargeType::Mulliken).unwrap();
            let mut record = water(3, "w");
            let t = record.topology.as_mut().unwrap();
            t[(0, 1)] = 2;
            t[(1, 0)] = 2;
            d.add_data(record).unwrap();

            assert_eq!(d.get_topologies(false)[0][(0, 1)], 2);
            assert_eq!(d.get_adjacency(false)[0][(0, 1)], 1);
            assert_eq!(d.get_topologies(true)[0][(2, 2)], 1);
        }

        #[test]
        fn degree_counts_bonds_per_atom() {
            let degree = water_and_methane().get_degree();
            assert_eq!(degree[0].diagonal().as_slice(), &[2, 1, 1, 0, 0, 0]);
            assert_eq!(degree[1].diagonal().as_slice(), &[4, 1, 1, 1, 1, 0]);
            assert_eq!(degree[0][(0, 1)], 0);
        }

        #[test]
        fn self_loops_on_placeholder_structures_use_bonded_slots() {
            let mut d = water_and_methane();
            let mut record = methane(6, "no geometry");
            record.structure = None;
            d.add_data(record).unwrap();

            let looped = d.get_adjacency(true);
            assert_eq!(
                (0..6).map(|k| looped[2][(k, k)]).collect::<Vec<_>>(),
                vec![1, 1, 1, 1, 1, 0]
            );
            assert_eq!(d.get_degree()[2].diagonal().as_slice(), &[4, 1, 1, 1, 1, 0]);
        }

        #[test]
        fn self_loops_without_structures_use_bonded_slots() {
            let mut d = water_and_methane();
            d.delete_structures();
            let looped = d.get_adjacency(true);
            assert_eq!(
                (0..6).map(|k| looped[0][(k, k)]).collect::<Vec<_>>(),
                vec![1, 1, 1, 0, 0, 0]
            );
        }
    }

    mod projection_tests {
        use super::*;

        #[test]
        fn atom_info_in_array_and_matrix_form() {
            let d = water_and_methane();
            assert_eq!(d.get_atom_info()[0].as_slice(), &[8, 1, 1, 0, 0, 0]);
            let m = &d.get_atom_info_matrix()[1];
            assert_eq!(m.shape(), (6, 6));
            assert_eq!(m[(0, 0)], 6);
            assert_eq!(m[(0, 1)], 0);
        }

        #[test]
        fn charges_in_vector_and_matrix_form() {
            let d = water_and_methane();
            assert_eq!(d.get_charges()[0].as_slice(), &[-0.8, 0.4, 0.4, 0.0, 0.0, 0.0]);
            let m = &d.get_charges_matrix()[0];
            assert_eq!(m[(1, 1)], 0.4);
            assert_eq!(m[(1, 0)], 0.0);
        }

        #[test]
        fn structures_with_and_without_atomic_numbers() {
            let d = water_and_methane();
            let full = d.get_structures(false);
            let coords = d.get_structures(true);
            assert_eq!(full[0].shape(), (6, 4));
            assert_eq!(coords[0].shape(), (6, 3));
            assert_eq!(coords[0][(1, 1)], full[0][(1, 2)]);
        }

        #[test]
        fn dipoles_as_vectors_and_norms() {
            let d = water_and_methane();
            assert_eq!(d.get_dipole_xyz()[0], Vector3::new(0.0, 0.0, 2.1));
            assert_eq!(d.get_dipole_norm(), vec![2.1, 0.0]);
            assert_eq!(d.get_names(), &["water".to_string(), "methane".to_string()]);
        }

        #[test]
        fn absent_series_project_to_empty_vectors() {
            let mut d = water_and_methane();
            d.delete_charges();
            d.delete_topologies();
            d.delete_dipole();
            assert!(d.get_charges().is_empty());
            assert!(d.get_adjacency(true).is_empty());
            assert!(d.get_degree().is_empty());
            assert!(d.get_dipole_norm().is_empty());
        }
    }
}
