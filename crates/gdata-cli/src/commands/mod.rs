pub mod export;
pub mod info;
pub mod merge;
pub mod principal_axes;
pub mod read;

use crate::error::{CliError, Result};
use gdata::dataset::Dataset;
use std::path::Path;
use tracing::info;

/// Loads a dataset saved with `save_all`.
fn load_dataset(dir: &Path) -> Result<Dataset> {
    if !dir.is_dir() {
        return Err(CliError::Argument(format!(
            "dataset directory '{}' does not exist",
            dir.display()
        )));
    }
    info!("Loading dataset from {:?}", dir);
    let mut dataset = Dataset::default();
    dataset.load_all(dir)?;
    Ok(dataset)
}
