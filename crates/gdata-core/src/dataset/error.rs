use crate::core::elements::UnknownElementError;
use crate::core::io::log::LogError;
use crate::core::io::npy::NpyError;
use crate::core::io::xyz::XyzError;
use crate::core::io::zmat::ZmatError;
use crate::core::models::charge::ChargeType;
use crate::core::models::record::AtomCountExceededError;
use crate::core::models::series::Series;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DatasetError {
    #[error(transparent)]
    UnknownElement(#[from] UnknownElementError),

    #[error("Malformed log file '{}': {source}", .path.display())]
    MalformedLog { path: PathBuf, source: LogError },

    #[error("Malformed z-matrix file '{}': {source}", .path.display())]
    MalformedZmat { path: PathBuf, source: ZmatError },

    #[error("Malformed xyz file '{}': {source}", .path.display())]
    MalformedXyz { path: PathBuf, source: XyzError },

    #[error(transparent)]
    AtomCountExceeded(#[from] AtomCountExceededError),

    #[error("Shape mismatch in {series}: expected {expected:?}, found {found:?}")]
    ShapeMismatch {
        series: Series,
        expected: Vec<usize>,
        found: Vec<usize>,
    },

    #[error("Series presence violation: {0}")]
    SeriesPresence(String),

    #[error("Cannot change max_atom to {requested}: stored molecules occupy {required} atom slots")]
    Truncation { requested: usize, required: usize },

    #[error("Conflicting {series} data for molecule '{name}'")]
    ConflictingData { name: String, series: Series },

    #[error("Datasets have different max_atom values ({left} vs {right})")]
    IncompatibleMaxAtom { left: usize, right: usize },

    #[error("I/O error on '{}': {source}", .path.display())]
    Io { path: PathBuf, source: io::Error },

    #[error("Failed to persist '{}': {source}", .path.display())]
    Persistence { path: PathBuf, source: NpyError },

    #[error("Invalid dataset configuration '{}': {message}", .path.display())]
    Config { path: PathBuf, message: String },

    #[error("Duplicate molecule name '{0}'")]
    DuplicateName(String),

    #[error("Invalid {series} record: {reason}")]
    InvalidRecord { series: Series, reason: String },

    #[error("max_atom must be at least 1")]
    InvalidMaxAtom,

    #[error("Datasets use different charge types ({left} vs {right})")]
    IncompatibleChargeType { left: ChargeType, right: ChargeType },

    #[error("The {0} series is empty")]
    EmptySeries(Series),

    #[error("Dataset invariant violated: {0}")]
    InvariantViolation(String),
}

impl DatasetError {
    pub(crate) fn io(path: &Path, source: io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    pub(crate) fn from_log(path: &Path, error: LogError) -> Self {
        match error {
            LogError::Io(source) => Self::io(path, source),
            LogError::UnknownElement(e) => Self::UnknownElement(e),
            LogError::AtomCountExceeded(e) => Self::AtomCountExceeded(e),
            source => Self::MalformedLog {
                path: path.to_path_buf(),
                source,
            },
        }
    }

    pub(crate) fn from_zmat(path: &Path, error: ZmatError) -> Self {
        match error {
            ZmatError::Io(source) => Self::io(path, source),
            ZmatError::UnknownElement(e) => Self::UnknownElement(e),
            ZmatError::AtomCountExceeded(e) => Self::AtomCountExceeded(e),
            source => Self::MalformedZmat {
                path: path.to_path_buf(),
                source,
            },
        }
    }

    pub(crate) fn from_xyz(path: &Path, error: XyzError) -> Self {
        match error {
            XyzError::Io(source) => Self::io(path, source),
            XyzError::UnknownElement(e) => Self::UnknownElement(e),
            XyzError::AtomCountExceeded(e) => Self::AtomCountExceeded(e),
            source => Self::MalformedXyz {
                path: path.to_path_buf(),
                source,
            },
        }
    }

    pub(crate) fn from_npy(path: &Path, error: NpyError) -> Self {
        match error {
            NpyError::Io(source) => Self::io(path, source),
            source => Self::Persistence {
                path: path.to_path_buf(),
                source,
            },
        }
    }

    /// Whether this is a log file rejected only for lacking a normal-termination marker.
    pub fn is_abnormal_termination(&self) -> bool {
        matches!(
            self,
            Self::MalformedLog {
                source: LogError::AbnormalTermination,
                ..
            }
        )
    }
}
