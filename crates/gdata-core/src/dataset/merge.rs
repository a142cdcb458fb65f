//! Name-keyed union of two datasets.

use super::Dataset;
use super::error::DatasetError;
use crate::core::models::record::{MoleculeRecord, STRUCTURE_COLUMNS};
use crate::core::models::series::Series;
use nalgebra::{DMatrix, DVector, Vector3};
use std::borrow::Cow;
use std::collections::HashMap;
use tracing::info;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeOptions {
    /// Pad the input with the smaller `max_atom` up to the larger one instead of
    /// failing.
    pub repad: bool,
}

/// Joins `a` and `b` on molecule names.
///
/// The result holds `a`'s molecules in order, each combined with the molecule of
/// the same name in `b`, followed by the molecules only `b` has. A field present on
/// both sides must agree unless one side holds an all-zero placeholder, which yields
/// to the other side. Series tracked by only one input are zero-filled for the
/// molecules of the other.
///
/// # Arguments
///
/// * `a` - The left input; its molecule order leads the result.
/// * `b` - The right input.
/// * `options` - Whether differing `max_atom` values are re-padded to the larger one.
///
/// # Return
///
/// Returns a new dataset; its `max_atom` and charge type are those of the inputs.
///
/// # Errors
///
/// Fails if either input is invalid, the charge types differ, the `max_atom`
/// values differ without `repad`, a non-empty input has no names, or a field
/// conflicts. The inputs are never modified.
pub fn merge(a: &Dataset, b: &Dataset, options: MergeOptions) -> Result<Dataset, DatasetError> {
    a.validate()?;
    b.validate()?;
    if a.charge_type != b.charge_type {
        return Err(DatasetError::IncompatibleChargeType {
            left: a.charge_type,
            right: b.charge_type,
        });
    }
    if a.max_atom != b.max_atom && !options.repad {
        return Err(DatasetError::IncompatibleMaxAtom {
            left: a.max_atom,
            right: b.max_atom,
        });
    }
    for input in [a, b] {
        if !input.is_empty() && !input.is_tracked(Series::Names) {
            return Err(DatasetError::SeriesPresence(
                "merging requires every molecule to be named".to_string(),
            ));
        }
    }

    let max_atom = a.max_atom.max(b.max_atom);
    let a = padded_to(a, max_atom)?;
    let b = padded_to(b, max_atom)?;

    let tracked: Vec<Series> = Series::ALL
        .into_iter()
        .filter(|&s| a.is_tracked(s) || b.is_tracked(s))
        .collect();
    let partners: HashMap<&str, usize> = b
        .names
        .iter()
        .enumerate()
        .map(|(i, name)| (name.as_str(), i))
        .collect();

    let mut merged = Dataset::new(max_atom, a.charge_type)?;
    let mut matched = vec![false; b.len()];
    for index in 0..a.len() {
        let left = a.get_record(index).unwrap_or_default();
        let record = match partners.get(a.names[index].as_str()) {
            Some(&partner) => {
                matched[partner] = true;
                let right = b.get_record(partner).unwrap_or_default();
                merge_records(&a.names[index], left, right)?
            }
            None => left,
        };
        merged.add_data(with_placeholders(record, &tracked, max_atom))?;
    }
    for index in (0..b.len()).filter(|&i| !matched[i]) {
        let record = b.get_record(index).unwrap_or_default();
        merged.add_data(with_placeholders(record, &tracked, max_atom))?;
    }
    merged.mi_coordinates = a.mi_coordinates && b.mi_coordinates;

    info!(
        left = a.len(),
        right = b.len(),
        merged = merged.len(),
        "Merged datasets"
    );
    Ok(merged)
}

fn padded_to(dataset: &Dataset, max_atom: usize) -> Result<Cow<'_, Dataset>, DatasetError> {
    if dataset.max_atom == max_atom {
        return Ok(Cow::Borrowed(dataset));
    }
    let mut repadded = dataset.clone();
    repadded.change_max_atom(max_atom)?;
    Ok(Cow::Owned(repadded))
}

fn merge_records(
    name: &str,
    left: MoleculeRecord,
    right: MoleculeRecord,
) -> Result<MoleculeRecord, DatasetError> {
    Ok(MoleculeRecord {
        structure: merge_field(name, Series::Structures, left.structure, right.structure, |m| {
            m.iter().all(|&v| v == 0.0)
        })?,
        charges: merge_field(name, Series::Charges, left.charges, right.charges, |c| {
            c.iter().all(|&v| v == 0.0)
        })?,
        name: left.name.or(right.name),
        topology: merge_field(name, Series::Topologies, left.topology, right.topology, |t| {
            t.iter().all(|&v| v == 0)
        })?,
        dipole: merge_field(name, Series::Dipoles, left.dipole, right.dipole, |d| {
            d.iter().all(|&v| v == 0.0)
        })?,
    })
}

fn merge_field<T: PartialEq>(
    name: &str,
    series: Series,
    left: Option<T>,
    right: Option<T>,
    is_placeholder: impl Fn(&T) -> bool,
) -> Result<Option<T>, DatasetError> {
    match (left, right) {
        (Some(l), Some(r)) => {
            if l == r || is_placeholder(&r) {
                Ok(Some(l))
            } else if is_placeholder(&l) {
                Ok(Some(r))
            } else {
                Err(DatasetError::ConflictingData {
                    name: name.to_string(),
                    series,
                })
            }
        }
        (l, r) => Ok(l.or(r)),
    }
}

/// Zero-fills every series in `tracked` that `record` lacks.
fn with_placeholders(mut record: MoleculeRecord, tracked: &[Series], max_atom: usize) -> MoleculeRecord {
    for series in tracked {
        match series {
            Series::Structures if record.structure.is_none() => {
                record.structure = Some(DMatrix::zeros(max_atom, STRUCTURE_COLUMNS));
            }
            Series::Charges if record.charges.is_none() => {
                record.charges = Some(DVector::zeros(max_atom));
            }
            Series::Topologies if record.topology.is_none() => {
                record.topology = Some(DMatrix::zeros(max_atom, max_atom));
            }
            Series::Dipoles if record.dipole.is_none() => {
                record.dipole = Some(Vector3::zeros());
            }
            _ => {}
        }
    }
    record
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::ChargeType;
    use crate::dataset::test_support::{methane, water};

    fn dataset(max_atom: usize, records: Vec<MoleculeRecord>) -> Dataset {
        let mut d = Dataset::new(max_atom, ChargeType::Mulliken).unwrap();
        for record in records {
            d.add_data(record).unwrap();
        }
        d
    }

    #[test]
    fn disjoint_inputs_are_concatenated() {
        let a = dataset(6, vec![water(6, "w1"), methane(6, "m1")]);
        let b = dataset(6, vec![water(6, "w2")]);
        let merged = merge(&a, &b, MergeOptions::default()).unwrap();

        assert_eq!(merged.len(), 3);
        assert_eq!(merged.get_names(), &["w1".to_string(), "m1".to_string(), "w2".to_string()]);
        assert!(merged.self_check());
    }

    #[test]
    fn matched_molecules_combine_complementary_series() {
        let mut left = water(5, "w");
        left.charges = None;
        left.dipole = None;
        let mut right = water(5, "w");
        right.structure = None;
        right.topology = None;
        let mut only_right = methane(5, "m");
        only_right.structure = None;
        only_right.topology = None;
        let a = dataset(5, vec![left]);
        let b = dataset(5, vec![right, only_right]);

        let merged = merge(&a, &b, MergeOptions::default()).unwrap();
        assert_eq!(merged.len(), 2);
        assert_eq!(merged.get_record(0).unwrap(), water(5, "w"));

        // The molecule only b has receives zero structures and topologies.
        let only_b = merged.get_record(1).unwrap();
        assert_eq!(only_b.name.as_deref(), Some("m"));
        assert!(only_b.structure.unwrap().iter().all(|&v| v == 0.0));
        assert!(merged.self_check());
    }

    #[test]
    fn identical_fields_merge_without_conflict() {
        let a = dataset(6, vec![water(6, "w")]);
        let merged = merge(&a, &a.clone(), MergeOptions::default()).unwrap();
        assert_eq!(merged, a);
    }

    #[test]
    fn zero_placeholders_yield_to_real_data() {
        let mut placeholder = methane(6, "m");
        placeholder.charges = None;
        let a = dataset(6, vec![water(6, "w"), placeholder]);
        let b = dataset(6, vec![methane(6, "m")]);

        let merged = merge(&a, &b, MergeOptions::default()).unwrap();
        assert_eq!(merged.get_charges()[1][0], -0.4);
    }

    #[test]
    fn differing_values_conflict() {
        let a = dataset(6, vec![water(6, "w")]);
        let b = dataset(6, vec![water(6, "w").with_dipole(Vector3::new(0.0, 0.0, 1.9))]);
        match merge(&a, &b, MergeOptions::default()) {
            Err(DatasetError::ConflictingData { name, series }) => {
                assert_eq!(name, "w");
                assert_eq!(series, Series::Dipoles);
            }
            other => panic!("expected a conflict, got {:?}", other),
        }
    }

    #[test]
    fn max_atom_mismatch_needs_repad() {
        let a = dataset(5, vec![water(5, "w")]);
        let b = dataset(7, vec![methane(7, "m")]);
        assert!(matches!(
            merge(&a, &b, MergeOptions::default()),
            Err(DatasetError::IncompatibleMaxAtom { left: 5, right: 7 })
        ));

        let merged = merge(&a, &b, MergeOptions { repad: true }).unwrap();
        assert_eq!(merged.max_atom(), 7);
        assert_eq!(merged.get_record(0).unwrap(), water(7, "w"));
        assert_eq!(a.max_atom(), 5);
    }

    #[test]
    fn charge_types_must_agree() {
        let a = dataset(5, vec![water(5, "w")]);
        let mut b = Dataset::new(5, ChargeType::Hirshfeld).unwrap();
        b.add_data(methane(5, "m")).unwrap();
        assert!(matches!(
            merge(&a, &b, MergeOptions::default()),
            Err(DatasetError::IncompatibleChargeType { .. })
        ));
    }

    #[test]
    fn unnamed_molecules_cannot_be_merged() {
        let mut unnamed = water(5, "w");
        unnamed.name = None;
        let a = dataset(5, vec![unnamed]);
        let b = dataset(5, vec![methane(5, "m")]);
        assert!(matches!(
            merge(&a, &b, MergeOptions::default()),
            Err(DatasetError::SeriesPresence(_))
        ));
        // An empty side needs no names.
        let empty = Dataset::new(5, ChargeType::Mulliken).unwrap();
        assert_eq!(merge(&b, &empty, MergeOptions::default()).unwrap(), b);
    }

    #[test]
    fn mi_flag_survives_only_when_both_inputs_carry_it() {
        let mut a = dataset(6, vec![water(6, "w")]);
        let mut b = dataset(6, vec![methane(6, "m")]);
        a.convert_to_mi_coordinate().unwrap();
        assert!(!merge(&a, &b, MergeOptions::default()).unwrap().is_mi_coordinates());
        b.convert_to_mi_coordinate().unwrap();
        assert!(merge(&a, &b, MergeOptions::default()).unwrap().is_mi_coordinates());
    }
}
