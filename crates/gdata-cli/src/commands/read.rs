use crate::cli::{InputFormat, ReadArgs};
use crate::config::{PartialReadSettings, ReadSettings};
use crate::error::{CliError, Result};
use crate::utils::progress::CliProgressHandler;
use gdata::dataset::{BatchReport, Dataset, ProgressReporter};
use tracing::{info, warn};

pub fn run(args: ReadArgs) -> Result<()> {
    let partial = match &args.config {
        Some(path) => PartialReadSettings::from_file(path)?,
        None => PartialReadSettings::default(),
    };
    info!("Merging configuration from file and CLI arguments...");
    let settings = partial.merge_with_cli(&args)?;
    let mut dataset = Dataset::from_config(&settings.dataset)?;

    if args.input.is_dir() {
        let report = read_directory(&mut dataset, &args, &settings)?;
        println!(
            "Read {} file(s), skipped {}.",
            report.succeeded,
            report.failed()
        );
        for failure in &report.failures {
            warn!(
                "Skipped {:?} ({:?}): {}",
                failure.path, failure.reason, failure.detail
            );
        }
        if let Some(path) = &args.failure_report {
            report.write_csv(path)?;
            println!("Failure report written to: {}", path.display());
        }
    } else if args.input.is_file() {
        match args.format {
            InputFormat::Log => dataset.read_log_file(&args.input, settings.validation)?,
            InputFormat::Zmat => dataset.read_zmat_file(&args.input)?,
            InputFormat::Xyz => dataset.read_xyz_file(&args.input, settings.header)?,
        }
    } else {
        return Err(CliError::Argument(format!(
            "input path '{}' does not exist",
            args.input.display()
        )));
    }

    if args.minimise {
        let max_atom = dataset.minimise();
        info!("Minimised max_atom to {}", max_atom);
    }

    dataset.save_all(&args.output)?;
    println!(
        "✓ Saved {} molecule(s) with max_atom {} to: {}",
        dataset.len(),
        dataset.max_atom(),
        args.output.display()
    );
    Ok(())
}

fn read_directory(
    dataset: &mut Dataset,
    args: &ReadArgs,
    settings: &ReadSettings,
) -> Result<BatchReport> {
    let progress_handler = CliProgressHandler::new();
    let reporter = ProgressReporter::with_callback(progress_handler.get_callback());
    let dir = &args.input;

    let report = match args.format {
        InputFormat::Log => dataset.read_log_dir_with_progress(dir, settings.validation, &reporter)?,
        InputFormat::Zmat => dataset.read_zmat_dir_with_progress(dir, &reporter)?,
        InputFormat::Xyz => dataset.read_xyz_dir_with_progress(dir, settings.header, &reporter)?,
    };
    Ok(report)
}
