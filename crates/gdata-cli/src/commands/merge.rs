use super::load_dataset;
use crate::cli::MergeArgs;
use crate::error::Result;
use gdata::dataset::{MergeOptions, merge};
use tracing::info;

pub fn run(args: MergeArgs) -> Result<()> {
    let first = load_dataset(&args.first)?;
    let second = load_dataset(&args.second)?;

    info!(
        "Merging {} and {} molecule(s)...",
        first.len(),
        second.len()
    );
    let merged = merge(&first, &second, MergeOptions { repad: args.repad })?;
    merged.save_all(&args.output)?;

    println!(
        "✓ Merged dataset with {} molecule(s) written to: {}",
        merged.len(),
        args.output.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CliError;
    use gdata::dataset::{ChargeType, Dataset, DatasetError};
    use std::path::Path;
    use tempfile::tempdir;

    fn save_xyz_dataset(dir: &Path, max_atom: usize, name: &str, xyz: &str) {
        let input = tempdir().unwrap();
        let file = input.path().join(format!("{}.xyz", name));
        std::fs::write(&file, xyz).unwrap();
        let mut dataset = Dataset::new(max_atom, ChargeType::Mulliken).unwrap();
        dataset.read_xyz_file(&file, true).unwrap();
        dataset.save_all(dir).unwrap();
    }

    const WATER_XYZ: &str = "3\n\nO 0.0 0.0 0.1173\nH 0.0 0.7572 -0.4692\nH 0.0 -0.7572 -0.4692\n";
    const HF_XYZ: &str = "2\n\nH 0.0 0.0 0.0\nF 0.0 0.0 0.917\n";

    #[test]
    fn merges_two_saved_datasets() {
        let root = tempdir().unwrap();
        let (a, b, out) = (root.path().join("a"), root.path().join("b"), root.path().join("out"));
        save_xyz_dataset(&a, 4, "water", WATER_XYZ);
        save_xyz_dataset(&b, 4, "hf", HF_XYZ);

        run(MergeArgs {
            first: a,
            second: b,
            output: out.clone(),
            repad: false,
        })
        .unwrap();

        let mut merged = Dataset::default();
        merged.load_all(&out).unwrap();
        assert_eq!(merged.get_names(), &["water".to_string(), "hf".to_string()]);
    }

    #[test]
    fn differing_max_atom_needs_repad() {
        let root = tempdir().unwrap();
        let (a, b, out) = (root.path().join("a"), root.path().join("b"), root.path().join("out"));
        save_xyz_dataset(&a, 4, "water", WATER_XYZ);
        save_xyz_dataset(&b, 2, "hf", HF_XYZ);

        let result = run(MergeArgs {
            first: a.clone(),
            second: b.clone(),
            output: out.clone(),
            repad: false,
        });
        assert!(matches!(
            result,
            Err(CliError::Dataset(DatasetError::IncompatibleMaxAtom { .. }))
        ));

        run(MergeArgs {
            first: a,
            second: b,
            output: out.clone(),
            repad: true,
        })
        .unwrap();
        let mut merged = Dataset::default();
        merged.load_all(&out).unwrap();
        assert_eq!(merged.max_atom(), 4);
    }
}
