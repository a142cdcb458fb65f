use super::load_dataset;
use crate::cli::PrincipalAxesArgs;
use crate::error::Result;
use tracing::info;

pub fn run(args: PrincipalAxesArgs) -> Result<()> {
    let mut dataset = load_dataset(&args.dataset)?;
    info!("Converting {} structure(s) to principal axes...", dataset.len());
    dataset.convert_to_mi_coordinate()?;
    dataset.save_all(&args.output)?;
    println!(
        "✓ Principal-axis dataset written to: {}",
        args.output.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CliError;
    use gdata::dataset::{ChargeType, Dataset, DatasetError};
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn converted_dataset_is_saved_with_mi_flag() {
        let root = tempdir().unwrap();
        let xyz = root.path().join("water.xyz");
        fs::write(
            &xyz,
            "3\n\nO 1.0 2.0 3.1173\nH 1.0 2.7572 2.5308\nH 1.0 1.2428 2.5308\n",
        )
        .unwrap();
        let mut dataset = Dataset::new(3, ChargeType::Mulliken).unwrap();
        dataset.read_xyz_file(&xyz, true).unwrap();
        let saved = root.path().join("dataset");
        dataset.save_all(&saved).unwrap();

        let out = root.path().join("mi");
        run(PrincipalAxesArgs {
            dataset: saved,
            output: out.clone(),
        })
        .unwrap();

        let mut converted = Dataset::default();
        converted.load_all(&out).unwrap();
        assert!(converted.is_mi_coordinates());
        let centre = converted.get_mass_centre().unwrap()[0];
        assert!(centre.coords.norm() < 1e-9);
    }

    #[test]
    fn dataset_without_structures_is_rejected() {
        let root = tempdir().unwrap();
        let saved = root.path().join("empty");
        Dataset::default().save_all(&saved).unwrap();

        let result = run(PrincipalAxesArgs {
            dataset: saved,
            output: root.path().join("out"),
        });
        assert!(matches!(
            result,
            Err(CliError::Dataset(DatasetError::EmptySeries(_)))
        ));
    }
}
