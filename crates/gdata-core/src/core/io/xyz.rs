use crate::core::elements::{UnknownElementError, element_symbol, parse_element_token};
use crate::core::io::traits::MoleculeFile;
use crate::core::models::record::{
    AtomCountExceededError, MoleculeRecord, ParsedAtom, pad_structure,
};
use nalgebra::{DMatrix, Point3};
use std::fs::File;
use std::io::{self, BufRead, BufWriter, Write};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum XyzError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Parse error on line {line}: {kind}")]
    Parse { line: usize, kind: XyzParseErrorKind },
    #[error("Header declares {expected} atoms but {found} atom lines follow")]
    CountMismatch { expected: usize, found: usize },
    #[error("File is empty")]
    Empty,
    #[error(transparent)]
    UnknownElement(#[from] UnknownElementError),
    #[error(transparent)]
    AtomCountExceeded(#[from] AtomCountExceededError),
}

#[derive(Debug, Error)]
pub enum XyzParseErrorKind {
    #[error("Invalid atom count '{0}'")]
    InvalidCount(String),
    #[error("Invalid coordinate '{0}'")]
    InvalidFloat(String),
    #[error("Atom line needs an element and three coordinates")]
    TooFewColumns,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct XyzOptions {
    /// Whether the file starts with an atom-count line and a comment line.
    pub header: bool,
}

impl Default for XyzOptions {
    fn default() -> Self {
        Self { header: true }
    }
}

pub struct XyzFile;

impl MoleculeFile for XyzFile {
    type Options = XyzOptions;
    type Error = XyzError;

    fn read_from(
        reader: &mut impl BufRead,
        max_atom: usize,
        options: &Self::Options,
    ) -> Result<MoleculeRecord, Self::Error> {
        let lines = reader.lines().collect::<Result<Vec<_>, _>>()?;
        let mut body: &[String] = &lines;
        let mut expected = None;

        if options.header {
            let count_line = lines.first().ok_or(XyzError::Empty)?;
            let count = count_line
                .split_whitespace()
                .next()
                .and_then(|t| t.parse::<usize>().ok())
                .ok_or_else(|| XyzError::Parse {
                    line: 1,
                    kind: XyzParseErrorKind::InvalidCount(count_line.trim().to_string()),
                })?;
            expected = Some(count);
            body = lines.get(2..).unwrap_or(&[]);
        }

        let first_line = if options.header { 3 } else { 1 };
        let mut atoms = Vec::new();
        let trailing = body
            .iter()
            .rposition(|l| !l.trim().is_empty())
            .map_or(0, |last| last + 1);

        for (offset, line) in body[..trailing].iter().enumerate() {
            let line_num = first_line + offset;
            if line.trim().is_empty() {
                if options.header {
                    // Blank lines inside a counted block are never atom lines.
                    return Err(XyzError::CountMismatch {
                        expected: expected.unwrap_or(0),
                        found: atoms.len(),
                    });
                }
                continue;
            }
            atoms.push(parse_atom_line(line, line_num)?);
        }

        if let Some(expected) = expected {
            if expected != atoms.len() {
                return Err(XyzError::CountMismatch {
                    expected,
                    found: atoms.len(),
                });
            }
        }
        if atoms.is_empty() {
            return Err(XyzError::Empty);
        }

        let structure = pad_structure(&atoms, max_atom)?;
        Ok(MoleculeRecord::new().with_structure(structure))
    }
}

impl XyzFile {
    /// Writes the real atoms of a padded `max_atom x 4` structure.
    ///
    /// Rows whose atomic number is zero are padding and are not written.
    pub fn write_to(
        structure: &DMatrix<f64>,
        comment: &str,
        header: bool,
        writer: &mut impl Write,
    ) -> Result<(), XyzError> {
        let real_rows: Vec<usize> = (0..structure.nrows())
            .filter(|&i| structure[(i, 0)] != 0.0)
            .collect();

        if header {
            writeln!(writer, "{}", real_rows.len())?;
            writeln!(writer, "{}", comment)?;
        }
        for i in real_rows {
            let z = structure[(i, 0)];
            if z.fract() != 0.0 || !(1.0..=255.0).contains(&z) {
                return Err(UnknownElementError(z.to_string()).into());
            }
            let symbol = element_symbol(z as u8)?;
            writeln!(
                writer,
                "{:<2} {:>14.6} {:>14.6} {:>14.6}",
                symbol,
                structure[(i, 1)],
                structure[(i, 2)],
                structure[(i, 3)]
            )?;
        }
        writer.flush()?;
        Ok(())
    }

    pub fn write_to_path<P: AsRef<Path>>(
        structure: &DMatrix<f64>,
        comment: &str,
        header: bool,
        path: P,
    ) -> Result<(), XyzError> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        Self::write_to(structure, comment, header, &mut writer)
    }
}

fn parse_atom_line(line: &str, line_num: usize) -> Result<ParsedAtom, XyzError> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() < 4 {
        return Err(XyzError::Parse {
            line: line_num,
            kind: XyzParseErrorKind::TooFewColumns,
        });
    }
    let atomic_number = parse_element_token(fields[0])?;
    let mut coords = [0.0; 3];
    for (slot, field) in coords.iter_mut().zip(&fields[1..4]) {
        *slot = field.parse::<f64>().map_err(|_| XyzError::Parse {
            line: line_num,
            kind: XyzParseErrorKind::InvalidFloat(field.to_string()),
        })?;
    }
    Ok(ParsedAtom::new(
        atomic_number,
        Point3::new(coords[0], coords[1], coords[2]),
    ))
}
