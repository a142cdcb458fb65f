use crate::core::elements::{UnknownElementError, parse_element_token};
use crate::core::io::traits::MoleculeFile;
use crate::core::models::charge::ChargeType;
use crate::core::models::record::{
    AtomCountExceededError, MoleculeRecord, ParsedAtom, pad_charges, pad_structure,
};
use nalgebra::{Point3, Vector3};
use std::io::{self, BufRead};
use thiserror::Error;

const STANDARD_ORIENTATION: &str = "Standard orientation:";
const INPUT_ORIENTATION: &str = "Input orientation:";
const MULLIKEN_HEADER: &str = "Mulliken charges:";
const MULLIKEN_SPIN_HEADER: &str = "Mulliken charges and spin densities:";
const MULLIKEN_END: &str = "Sum of Mulliken charges";
const HIRSHFELD_HEADER: &str = "Hirshfeld charges, spin densities, dipoles, and CM5 charges";
const HIRSHFELD_END: &str = "Tot";
const DIPOLE_HEADER: &str = "Dipole moment (field-independent basis, Debye):";
const NORMAL_TERMINATION: &str = "Normal termination of Gaussian";

/// Lines between an orientation header and its first atom row.
const ORIENTATION_HEADER_LINES: usize = 5;
/// Lines between a charge header and its first atom row.
const CHARGE_HEADER_LINES: usize = 2;

#[derive(Debug, Error)]
pub enum LogError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Parse error on line {line}: {kind}")]
    Parse { line: usize, kind: LogParseErrorKind },
    #[error("Missing required block: {0}")]
    MissingBlock(&'static str),
    #[error("Block '{block}' starting on line {line} is not terminated")]
    UnterminatedBlock { block: &'static str, line: usize },
    #[error("Geometry has {atoms} atoms but the {charge_type} block lists {charges} charges")]
    ChargeCountMismatch {
        charge_type: ChargeType,
        atoms: usize,
        charges: usize,
    },
    #[error("Calculation did not terminate normally")]
    AbnormalTermination,
    #[error(transparent)]
    UnknownElement(#[from] UnknownElementError),
    #[error(transparent)]
    AtomCountExceeded(#[from] AtomCountExceededError),
}

#[derive(Debug, Error)]
pub enum LogParseErrorKind {
    #[error("Expected at least {0} columns")]
    TooFewColumns(usize),
    #[error("Invalid number '{0}'")]
    InvalidFloat(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogOptions {
    /// Which charge block to extract.
    pub charge_type: ChargeType,
    /// Require the normal-termination marker on the last non-blank line.
    pub validation: bool,
}

impl Default for LogOptions {
    fn default() -> Self {
        Self {
            charge_type: ChargeType::default(),
            validation: true,
        }
    }
}

/// Gaussian output files.
///
/// Only the last geometry, charge and dipole blocks are used, so a multi-step
/// optimisation yields its converged geometry.
pub struct LogFile;

impl MoleculeFile for LogFile {
    type Options = LogOptions;
    type Error = LogError;

    fn read_from(
        reader: &mut impl BufRead,
        max_atom: usize,
        options: &Self::Options,
    ) -> Result<MoleculeRecord, Self::Error> {
        let lines = reader.lines().collect::<Result<Vec<_>, _>>()?;

        if options.validation && !terminated_normally(&lines) {
            return Err(LogError::AbnormalTermination);
        }

        let atoms = parse_geometry(&lines)?;
        let charges = parse_charges(&lines, options.charge_type)?;
        if charges.len() != atoms.len() {
            return Err(LogError::ChargeCountMismatch {
                charge_type: options.charge_type,
                atoms: atoms.len(),
                charges: charges.len(),
            });
        }
        let dipole = parse_dipole(&lines)?;

        Ok(MoleculeRecord::new()
            .with_structure(pad_structure(&atoms, max_atom)?)
            .with_charges(pad_charges(&charges, max_atom)?)
            .with_dipole(dipole))
    }
}

fn terminated_normally(lines: &[String]) -> bool {
    lines
        .iter()
        .rev()
        .find(|l| !l.trim().is_empty())
        .is_some_and(|l| l.contains(NORMAL_TERMINATION))
}

fn last_line_matching(lines: &[String], predicate: impl Fn(&str) -> bool) -> Option<usize> {
    lines.iter().rposition(|l| predicate(l.as_str()))
}

/// Collects the rows of the block whose header sits at `header`, starting `skip` lines
/// below it and stopping at the first line matching `is_end`.
fn block_rows<'a>(
    lines: &'a [String],
    header: usize,
    skip: usize,
    block: &'static str,
    is_end: impl Fn(&str) -> bool,
) -> Result<Vec<(usize, &'a str)>, LogError> {
    let mut rows = Vec::new();
    for (index, line) in lines.iter().enumerate().skip(header + skip) {
        if is_end(line.as_str()) {
            return Ok(rows);
        }
        rows.push((index + 1, line.as_str()));
    }
    Err(LogError::UnterminatedBlock {
        block,
        line: header + 1,
    })
}

fn parse_float(token: &str, line: usize) -> Result<f64, LogError> {
    token.parse::<f64>().map_err(|_| LogError::Parse {
        line,
        kind: LogParseErrorKind::InvalidFloat(token.to_string()),
    })
}

fn parse_geometry(lines: &[String]) -> Result<Vec<ParsedAtom>, LogError> {
    let header = last_line_matching(lines, |l| l.contains(STANDARD_ORIENTATION))
        .or_else(|| last_line_matching(lines, |l| l.contains(INPUT_ORIENTATION)))
        .ok_or(LogError::MissingBlock("orientation"))?;

    let rows = block_rows(lines, header, ORIENTATION_HEADER_LINES, "orientation", |l| {
        l.trim_start().starts_with("---")
    })?;

    let mut atoms = Vec::with_capacity(rows.len());
    for (line_num, row) in rows {
        let fields: Vec<&str> = row.split_whitespace().collect();
        // Older outputs omit the atomic-type column.
        let coords = match fields.len() {
            n if n >= 6 => &fields[3..6],
            5 => &fields[2..5],
            _ => {
                return Err(LogError::Parse {
                    line: line_num,
                    kind: LogParseErrorKind::TooFewColumns(5),
                });
            }
        };
        let atomic_number = parse_element_token(fields[1])?;
        let position = Point3::new(
            parse_float(coords[0], line_num)?,
            parse_float(coords[1], line_num)?,
            parse_float(coords[2], line_num)?,
        );
        atoms.push(ParsedAtom::new(atomic_number, position));
    }
    if atoms.is_empty() {
        return Err(LogError::MissingBlock("orientation"));
    }
    Ok(atoms)
}

fn parse_charges(lines: &[String], charge_type: ChargeType) -> Result<Vec<f64>, LogError> {
    let (header, block, rows) = match charge_type {
        ChargeType::Mulliken => {
            let header = last_line_matching(lines, |l| {
                let t = l.trim();
                t == MULLIKEN_HEADER || t.starts_with(MULLIKEN_SPIN_HEADER)
            })
            .ok_or(LogError::MissingBlock("Mulliken charges"))?;
            let rows = block_rows(lines, header, CHARGE_HEADER_LINES, "Mulliken charges", |l| {
                l.contains(MULLIKEN_END)
            })?;
            (header, "Mulliken charges", rows)
        }
        ChargeType::Hirshfeld => {
            let header = last_line_matching(lines, |l| l.contains(HIRSHFELD_HEADER))
                .ok_or(LogError::MissingBlock("Hirshfeld charges"))?;
            let rows = block_rows(lines, header, CHARGE_HEADER_LINES, "Hirshfeld charges", |l| {
                l.trim_start().starts_with(HIRSHFELD_END)
            })?;
            (header, "Hirshfeld charges", rows)
        }
    };

    let mut charges = Vec::with_capacity(rows.len());
    for (line_num, row) in rows {
        let fields: Vec<&str> = row.split_whitespace().collect();
        let token = fields.get(2).ok_or(LogError::Parse {
            line: line_num,
            kind: LogParseErrorKind::TooFewColumns(3),
        })?;
        charges.push(parse_float(token, line_num)?);
    }
    if charges.is_empty() {
        return Err(LogError::UnterminatedBlock {
            block,
            line: header + 1,
        });
    }
    Ok(charges)
}

fn parse_dipole(lines: &[String]) -> Result<Vector3<f64>, LogError> {
    let header = last_line_matching(lines, |l| l.contains(DIPOLE_HEADER))
        .ok_or(LogError::MissingBlock("dipole moment"))?;
    let line_num = header + 2;
    let line = lines
        .get(header + 1)
        .ok_or(LogError::MissingBlock("dipole moment"))?;

    // `X= x Y= y Z= z Tot= t`
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() < 6 {
        return Err(LogError::Parse {
            line: line_num,
            kind: LogParseErrorKind::TooFewColumns(6),
        });
    }
    Ok(Vector3::new(
        parse_float(fields[1], line_num)?,
        parse_float(fields[3], line_num)?,
        parse_float(fields[5], line_num)?,
    ))
}

#[cfg(test)]
pub(crate) mod fixtures {
    /// A two-step water optimisation with Mulliken and Hirshfeld populations.
    pub const WATER_LOG: &str = r#" Entering Gaussian System, Link 0=g16
 #p opt b3lyp/6-31g(d) pop=hirshfeld

                          Input orientation:
 ---------------------------------------------------------------------
 Center     Atomic      Atomic             Coordinates (Angstroms)
 Number     Number       Type             X           Y           Z
 ---------------------------------------------------------------------
      1          8           0        0.000000    0.000000    0.000000
      2          1           0        0.000000    0.000000    1.000000
      3          1           0        0.000000    1.000000    0.000000
 ---------------------------------------------------------------------
                         Standard orientation:
 ---------------------------------------------------------------------
 Center     Atomic      Atomic             Coordinates (Angstroms)
 Number     Number       Type             X           Y           Z
 ---------------------------------------------------------------------
      1          8           0        0.000000    0.000000    0.100000
      2          1           0        0.000000    0.800000   -0.400000
      3          1           0        0.000000   -0.800000   -0.400000
 ---------------------------------------------------------------------
 Mulliken charges:
               1
     1  O   -0.700000
     2  H    0.350000
     3  H    0.350000
 Sum of Mulliken charges =   0.00000
 Dipole moment (field-independent basis, Debye):
    X=              0.0000    Y=              0.0000    Z=             -2.0000  Tot=              2.0000
                         Standard orientation:
 ---------------------------------------------------------------------
 Center     Atomic      Atomic             Coordinates (Angstroms)
 Number     Number       Type             X           Y           Z
 ---------------------------------------------------------------------
      1          8           0        0.000000    0.000000    0.119262
      2          1           0        0.000000    0.763239   -0.477047
      3          1           0        0.000000   -0.763239   -0.477047
 ---------------------------------------------------------------------
 Mulliken charges:
               1
     1  O   -0.834000
     2  H    0.417000
     3  H    0.417000
 Sum of Mulliken charges =   0.00000
 Mulliken charges with hydrogens summed into heavy atoms:
               1
     1  O    0.000000
 Sum of Mulliken charges =   0.00000
 Hirshfeld charges, spin densities, dipoles, and CM5 charges using IRadAn=      4:
              Q-H        S-H        Dx         Dy         Dz        Q-CM5
     1  O   -0.331000   0.000000   0.000000   0.000000  -0.160000  -0.648000
     2  H    0.165500   0.000000   0.000000   0.110000   0.080000   0.324000
     3  H    0.165500   0.000000   0.000000  -0.110000   0.080000   0.324000
       Tot   0.000000   0.000000   0.000000   0.000000   0.000000   0.000000
 Dipole moment (field-independent basis, Debye):
    X=              0.0000    Y=              0.0000    Z=             -2.1000  Tot=              2.1000
 Normal termination of Gaussian 16 at Mon Jan  1 00:00:00 2024.
"#;

    /// Same run cut short before the termination marker.
    pub fn truncated_water_log() -> String {
        WATER_LOG.replace(
            " Normal termination of Gaussian 16 at Mon Jan  1 00:00:00 2024.\n",
            " Error termination via Lnk1e in l9999.exe\n",
        )
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;
    use std::io::Cursor;

    fn read(content: &str, max_atom: usize, options: LogOptions) -> Result<MoleculeRecord, LogError> {
        LogFile::read_from(&mut Cursor::new(content), max_atom, &options)
    }

    #[test]
    fn reads_last_geometry_charges_and_dipole() {
        let record = read(WATER_LOG, 5, LogOptions::default()).unwrap();
        let s = record.structure.unwrap();
        assert_eq!(s.shape(), (5, 4));
        assert_eq!(s.column(0).as_slice(), &[8.0, 1.0, 1.0, 0.0, 0.0]);
        assert_eq!(s[(0, 3)], 0.119262);
        assert_eq!(s[(2, 2)], -0.763239);

        let c = record.charges.unwrap();
        assert_eq!(c.as_slice(), &[-0.834, 0.417, 0.417, 0.0, 0.0]);
        assert_eq!(record.dipole.unwrap(), Vector3::new(0.0, 0.0, -2.1));
        assert!(record.topology.is_none());
    }

    #[test]
    fn reads_hirshfeld_charges_when_requested() {
        let options = LogOptions {
            charge_type: ChargeType::Hirshfeld,
            validation: true,
        };
        let c = read(WATER_LOG, 3, options).unwrap().charges.unwrap();
        assert_eq!(c.as_slice(), &[-0.331, 0.1655, 0.1655]);
    }

    #[test]
    fn falls_back_to_input_orientation() {
        let content = WATER_LOG.replace("Standard orientation:", "Other block:");
        let s = read(&content, 3, LogOptions::default())
            .unwrap()
            .structure
            .unwrap();
        assert_eq!(s[(1, 3)], 1.0);
    }

    #[test]
    fn abnormal_termination_fails_only_with_validation() {
        let content = truncated_water_log();
        assert!(matches!(
            read(&content, 3, LogOptions::default()),
            Err(LogError::AbnormalTermination)
        ));
        let options = LogOptions {
            validation: false,
            ..LogOptions::default()
        };
        assert!(read(&content, 3, options).is_ok());
    }

    #[test]
    fn missing_blocks_are_reported() {
        let no_dipole = WATER_LOG.replace(DIPOLE_HEADER, "Quadrupole moment:");
        assert!(matches!(
            read(&no_dipole, 3, LogOptions::default()),
            Err(LogError::MissingBlock("dipole moment"))
        ));

        let no_geometry = WATER_LOG
            .replace(STANDARD_ORIENTATION, "x")
            .replace(INPUT_ORIENTATION, "y");
        assert!(matches!(
            read(&no_geometry, 3, LogOptions::default()),
            Err(LogError::MissingBlock("orientation"))
        ));

        let no_hirshfeld = WATER_LOG.replace(HIRSHFELD_HEADER, "CM5 only");
        let options = LogOptions {
            charge_type: ChargeType::Hirshfeld,
            validation: true,
        };
        assert!(matches!(
            read(&no_hirshfeld, 3, options),
            Err(LogError::MissingBlock("Hirshfeld charges"))
        ));
    }

    #[test]
    fn charge_count_must_match_geometry() {
        let content = WATER_LOG.replace("     3  H    0.417000\n", "");
        assert!(matches!(
            read(&content, 3, LogOptions::default()),
            Err(LogError::ChargeCountMismatch {
                atoms: 3,
                charges: 2,
                ..
            })
        ));
    }

    #[test]
    fn bad_coordinates_report_line_numbers() {
        let content = WATER_LOG.replace("0.763239   -0.477047", "0.76x239   -0.477047");
        match read(&content, 3, LogOptions::default()) {
            Err(LogError::Parse { line, kind }) => {
                assert_eq!(line, 36);
                assert!(matches!(kind, LogParseErrorKind::InvalidFloat(_)));
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn too_many_atoms_fail_with_atom_count_error() {
        assert!(matches!(
            read(WATER_LOG, 2, LogOptions::default()),
            Err(LogError::AtomCountExceeded(_))
        ));
    }
}
