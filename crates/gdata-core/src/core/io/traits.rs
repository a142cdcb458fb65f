use crate::core::models::record::MoleculeRecord;
use std::error::Error;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

/// Common interface of the single-molecule text formats.
///
/// A reader turns one file into one [`MoleculeRecord`] whose arrays are already
/// padded to `max_atom`. Readers never set the record's name; the caller decides how
/// a molecule is labelled (the dataset uses the file stem).
pub trait MoleculeFile {
    /// Format-specific switches such as header handling or termination checks.
    type Options: Default;

    /// The error type for parsing and I/O failures.
    type Error: Error + From<io::Error>;

    /// Reads one molecule from a buffered reader.
    ///
    /// # Arguments
    ///
    /// * `reader` - Source positioned at the start of the molecule.
    /// * `max_atom` - Slot count the returned arrays are padded to.
    /// * `options` - Format-specific switches.
    ///
    /// # Return
    ///
    /// Returns an unnamed record holding every field the format provides.
    ///
    /// # Errors
    ///
    /// Returns an error if the content is malformed, names an unknown element, holds
    /// more than `max_atom` atoms, or the reader fails.
    fn read_from(
        reader: &mut impl BufRead,
        max_atom: usize,
        options: &Self::Options,
    ) -> Result<MoleculeRecord, Self::Error>;

    /// Reads one molecule from a file path.
    ///
    /// The file is opened and closed within this call.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be opened, otherwise as
    /// [`MoleculeFile::read_from`].
    fn read_from_path<P: AsRef<Path>>(
        path: P,
        max_atom: usize,
        options: &Self::Options,
    ) -> Result<MoleculeRecord, Self::Error> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);
        Self::read_from(&mut reader, max_atom, options)
    }
}
