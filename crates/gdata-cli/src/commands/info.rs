use super::load_dataset;
use crate::cli::InfoArgs;
use crate::error::Result;
use gdata::dataset::{Dataset, Series};
use std::fmt::Write;

pub fn run(args: InfoArgs) -> Result<()> {
    let dataset = load_dataset(&args.dataset)?;
    print!("{}", summarise(&dataset));
    Ok(())
}

fn summarise(dataset: &Dataset) -> String {
    let shape = dataset.get_data_shape();
    let mut out = String::new();
    let _ = writeln!(out, "molecules:       {}", dataset.len());
    let _ = writeln!(out, "max_atom:        {}", dataset.max_atom());
    let _ = writeln!(out, "charge type:     {}", dataset.charge_type());
    let _ = writeln!(out, "MI coordinates:  {}", dataset.is_mi_coordinates());
    for series in Series::ALL {
        let _ = writeln!(out, "  {:<13}  {}", series, shape.get(series));
    }
    let check = if dataset.self_check() { "passed" } else { "FAILED" };
    let _ = writeln!(out, "self-check:      {}", check);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CliError;
    use gdata::dataset::ChargeType;
    use std::path::PathBuf;

    #[test]
    fn summary_lists_counts_and_settings() {
        let dataset = Dataset::new(12, ChargeType::Hirshfeld).unwrap();
        let summary = summarise(&dataset);
        assert!(summary.contains("molecules:       0"));
        assert!(summary.contains("max_atom:        12"));
        assert!(summary.contains("charge type:     Hirshfeld"));
        assert!(summary.contains("topologies"));
        assert!(summary.contains("self-check:      passed"));
    }

    #[test]
    fn missing_directory_is_reported() {
        let result = run(InfoArgs {
            dataset: PathBuf::from("/nonexistent/gdata/dataset"),
        });
        assert!(matches!(result, Err(CliError::Argument(_))));
    }
}
