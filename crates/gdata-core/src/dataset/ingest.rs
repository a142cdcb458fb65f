use super::Dataset;
use super::error::DatasetError;
use super::progress::{Progress, ProgressReporter};
use crate::core::io::log::{LogFile, LogOptions};
use crate::core::io::traits::MoleculeFile;
use crate::core::io::xyz::{XyzFile, XyzOptions};
use crate::core::io::zmat::ZmatFile;
use crate::core::models::series::Series;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument, warn};

/// Why a file of a batch was skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureReason {
    /// The file could not be opened, read or written.
    Io,
    /// A log file without a normal-termination marker.
    Validation,
    /// Malformed content, an unknown element, too many atoms, or a record the dataset
    /// rejected.
    Content,
}

impl FailureReason {
    fn of(error: &DatasetError) -> Self {
        match error {
            DatasetError::Io { .. } => Self::Io,
            e if e.is_abnormal_termination() => Self::Validation,
            _ => Self::Content,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchFailure {
    pub path: PathBuf,
    pub reason: FailureReason,
    pub detail: String,
}

impl BatchFailure {
    fn new(path: PathBuf, error: &DatasetError) -> Self {
        Self {
            path,
            reason: FailureReason::of(error),
            detail: error.to_string(),
        }
    }
}

/// Outcome of a directory batch. Failed files are recorded here instead of aborting.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub succeeded: usize,
    pub failures: Vec<BatchFailure>,
}

#[derive(Serialize)]
struct FailureRow<'a> {
    path: String,
    reason: FailureReason,
    detail: &'a str,
}

impl BatchReport {
    pub fn failed(&self) -> usize {
        self.failures.len()
    }

    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    /// Writes the failures as CSV with a `path,reason,detail` header.
    pub fn write_csv(&self, path: &Path) -> Result<(), DatasetError> {
        let to_io = |e: csv::Error| DatasetError::io(path, e.into());
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_path(path)
            .map_err(to_io)?;
        writer
            .write_record(["path", "reason", "detail"])
            .map_err(to_io)?;
        for failure in &self.failures {
            writer
                .serialize(FailureRow {
                    path: failure.path.display().to_string(),
                    reason: failure.reason,
                    detail: &failure.detail,
                })
                .map_err(to_io)?;
        }
        writer.flush().map_err(|e| DatasetError::io(path, e))
    }
}

impl Dataset {
    /// Reads one Gaussian log file and appends it, named after the file stem.
    ///
    /// # Arguments
    ///
    /// * `path` - The log file to read.
    /// * `validation` - Reject a file whose last line is not the normal-termination
    ///   marker.
    ///
    /// # Errors
    ///
    /// Returns [`DatasetError::MalformedLog`] when validation fails or the content
    /// does not parse, an I/O, unknown-element or atom-count error when the file
    /// cannot be read, and any [`Dataset::add_data`] error. The dataset is unchanged
    /// on failure.
    pub fn read_log_file<P: AsRef<Path>>(
        &mut self,
        path: P,
        validation: bool,
    ) -> Result<(), DatasetError> {
        let options = self.log_options(validation);
        self.read_file::<LogFile>(path.as_ref(), &options, DatasetError::from_log)
    }

    pub fn read_zmat_file<P: AsRef<Path>>(&mut self, path: P) -> Result<(), DatasetError> {
        self.read_file::<ZmatFile>(path.as_ref(), &(), DatasetError::from_zmat)
    }

    pub fn read_xyz_file<P: AsRef<Path>>(&mut self, path: P, header: bool) -> Result<(), DatasetError> {
        self.read_file::<XyzFile>(path.as_ref(), &XyzOptions { header }, DatasetError::from_xyz)
    }

    /// Reads every regular file of `dir` in file-name order.
    ///
    /// Files that fail are skipped and recorded in the returned report; abnormal
    /// terminations are recorded as [`FailureReason::Validation`].
    ///
    /// # Errors
    ///
    /// Only fails if the directory itself cannot be listed.
    pub fn read_log_dir<P: AsRef<Path>>(
        &mut self,
        dir: P,
        validation: bool,
    ) -> Result<BatchReport, DatasetError> {
        self.read_log_dir_with_progress(dir, validation, &ProgressReporter::new())
    }

    pub fn read_log_dir_with_progress<P: AsRef<Path>>(
        &mut self,
        dir: P,
        validation: bool,
        reporter: &ProgressReporter,
    ) -> Result<BatchReport, DatasetError> {
        let options = self.log_options(validation);
        self.read_dir::<LogFile>(dir.as_ref(), &options, DatasetError::from_log, reporter)
    }

    pub fn read_zmat_dir<P: AsRef<Path>>(&mut self, dir: P) -> Result<BatchReport, DatasetError> {
        self.read_zmat_dir_with_progress(dir, &ProgressReporter::new())
    }

    pub fn read_zmat_dir_with_progress<P: AsRef<Path>>(
        &mut self,
        dir: P,
        reporter: &ProgressReporter,
    ) -> Result<BatchReport, DatasetError> {
        self.read_dir::<ZmatFile>(dir.as_ref(), &(), DatasetError::from_zmat, reporter)
    }

    pub fn read_xyz_dir<P: AsRef<Path>>(
        &mut self,
        dir: P,
        header: bool,
    ) -> Result<BatchReport, DatasetError> {
        self.read_xyz_dir_with_progress(dir, header, &ProgressReporter::new())
    }

    pub fn read_xyz_dir_with_progress<P: AsRef<Path>>(
        &mut self,
        dir: P,
        header: bool,
        reporter: &ProgressReporter,
    ) -> Result<BatchReport, DatasetError> {
        self.read_dir::<XyzFile>(
            dir.as_ref(),
            &XyzOptions { header },
            DatasetError::from_xyz,
            reporter,
        )
    }

    /// Writes one xyz file per molecule into `dir`, named `<name>.xyz` or
    /// `molecule_<index>.xyz` when names are not tracked.
    ///
    /// # Errors
    ///
    /// Fails with [`DatasetError::EmptySeries`] without structures, or if `dir` cannot
    /// be created. Failures of individual files are recorded in the report.
    pub fn convert_to_xyz<P: AsRef<Path>>(
        &self,
        dir: P,
        header: bool,
    ) -> Result<BatchReport, DatasetError> {
        let dir = dir.as_ref();
        if self.structures.is_empty() {
            return Err(DatasetError::EmptySeries(Series::Structures));
        }
        fs::create_dir_all(dir).map_err(|e| DatasetError::io(dir, e))?;

        let mut report = BatchReport::default();
        for i in 0..self.structures.len() {
            let name = self
                .names
                .get(i)
                .cloned()
                .unwrap_or_else(|| format!("molecule_{}", i));
            let path = dir.join(format!("{}.xyz", file_safe(&name)));
            match XyzFile::write_to_path(&self.structures.matrix(i), &name, header, &path) {
                Ok(()) => report.succeeded += 1,
                Err(e) => {
                    let error = DatasetError::from_xyz(&path, e);
                    warn!(path = %path.display(), "Failed to write xyz file: {}", error);
                    report.failures.push(BatchFailure::new(path, &error));
                }
            }
        }
        info!(
            written = report.succeeded,
            failed = report.failed(),
            "Exported structures to xyz"
        );
        Ok(report)
    }

    fn log_options(&self, validation: bool) -> LogOptions {
        LogOptions {
            charge_type: self.charge_type,
            validation,
        }
    }

    fn read_file<F: MoleculeFile>(
        &mut self,
        path: &Path,
        options: &F::Options,
        lift: fn(&Path, F::Error) -> DatasetError,
    ) -> Result<(), DatasetError> {
        let mut record =
            F::read_from_path(path, self.max_atom, options).map_err(|e| lift(path, e))?;
        if self.is_empty() || self.is_tracked(Series::Names) {
            record.name = Some(molecule_name(path));
        }
        self.add_data(record)
    }

    #[instrument(skip_all, fields(dir = %dir.display()))]
    fn read_dir<F: MoleculeFile>(
        &mut self,
        dir: &Path,
        options: &F::Options,
        lift: fn(&Path, F::Error) -> DatasetError,
        reporter: &ProgressReporter,
    ) -> Result<BatchReport, DatasetError> {
        let files = list_files(dir)?;
        info!(files = files.len(), "Reading directory");

        reporter.report(Progress::PhaseStart {
            name: "Reading files",
        });
        reporter.report(Progress::TaskStart {
            total_steps: files.len() as u64,
        });

        let mut report = BatchReport::default();
        for path in files {
            match self.read_file::<F>(&path, options, lift) {
                Ok(()) => {
                    debug!(path = %path.display(), "Read file");
                    report.succeeded += 1;
                }
                Err(error) => {
                    warn!(path = %path.display(), "Skipping file: {}", error);
                    let failure = BatchFailure::new(path, &error);
                    if !reporter.is_silent() {
                        reporter.report(Progress::FileSkipped {
                            path: failure.path.clone(),
                            detail: failure.detail.clone(),
                        });
                    }
                    report.failures.push(failure);
                }
            }
            reporter.report(Progress::TaskIncrement);
        }

        reporter.report(Progress::TaskFinish);
        reporter.report(Progress::PhaseFinish);
        info!(
            read = report.succeeded,
            failed = report.failed(),
            "Finished reading directory"
        );
        Ok(report)
    }
}

/// Regular files of `dir`, sorted by file name.
fn list_files(dir: &Path) -> Result<Vec<PathBuf>, DatasetError> {
    let entries = fs::read_dir(dir).map_err(|e| DatasetError::io(dir, e))?;
    let mut files = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| DatasetError::io(dir, e))?.path();
        if path.is_file() {
            files.push(path);
        }
    }
    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}

fn molecule_name(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn file_safe(name: &str) -> String {
    name.chars()
        .map(|c| if c == '/' || c == '\\' { '_' } else { c })
        .collect()
}
