use super::load_dataset;
use crate::cli::ExportArgs;
use crate::error::Result;
use tracing::warn;

pub fn run(args: ExportArgs) -> Result<()> {
    let dataset = load_dataset(&args.dataset)?;
    let report = dataset.convert_to_xyz(&args.output, !args.no_header)?;

    for failure in &report.failures {
        warn!("Could not write {:?}: {}", failure.path, failure.detail);
    }
    println!(
        "✓ Wrote {} xyz file(s) to: {}",
        report.succeeded,
        args.output.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use gdata::dataset::{ChargeType, Dataset};
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn exports_one_file_per_molecule() {
        let root = tempdir().unwrap();
        let xyz = root.path().join("nh3.xyz");
        fs::write(
            &xyz,
            "4\n\nN 0.0 0.0 0.0\nH 0.0 0.94 -0.38\nH 0.81 -0.47 -0.38\nH -0.81 -0.47 -0.38\n",
        )
        .unwrap();
        let mut dataset = Dataset::new(6, ChargeType::Mulliken).unwrap();
        dataset.read_xyz_file(&xyz, true).unwrap();
        let saved = root.path().join("dataset");
        dataset.save_all(&saved).unwrap();

        let out = root.path().join("xyz");
        run(ExportArgs {
            dataset: saved,
            output: out.clone(),
            no_header: false,
        })
        .unwrap();

        let written = fs::read_to_string(out.join("nh3.xyz")).unwrap();
        let lines: Vec<&str> = written.lines().collect();
        assert_eq!(lines[0], "4");
        assert_eq!(lines.len(), 6);
        assert!(lines[2].starts_with("N "));
    }
}
