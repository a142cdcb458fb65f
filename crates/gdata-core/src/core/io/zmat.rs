use crate::core::elements::{UnknownElementError, parse_element_token};
use crate::core::io::traits::MoleculeFile;
use crate::core::models::record::{
    AtomCountExceededError, MoleculeRecord, ParsedAtom, build_topology, pad_structure,
};
use crate::core::utils::geometry::{place_from_internal, place_in_plane};
use nalgebra::{Point3, Vector3};
use std::collections::HashMap;
use std::io::{self, BufRead};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ZmatError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Parse error on line {line}: {kind}")]
    Parse { line: usize, kind: ZmatParseErrorKind },
    #[error("Missing required section: {0}")]
    MissingSection(&'static str),
    #[error("Line {line} references atom '{reference}', which is not an earlier atom")]
    InvalidReference { line: usize, reference: String },
    #[error("Reference atoms on line {line} are collinear; the position is undefined")]
    Collinear { line: usize },
    #[error("Connectivity lists {connectivity} atoms but the molecule has {atoms}")]
    AtomCountMismatch { atoms: usize, connectivity: usize },
    #[error(transparent)]
    UnknownElement(#[from] UnknownElementError),
    #[error(transparent)]
    AtomCountExceeded(#[from] AtomCountExceededError),
}

#[derive(Debug, Error)]
pub enum ZmatParseErrorKind {
    #[error("Invalid charge/multiplicity line")]
    InvalidChargeMultiplicity,
    #[error("Expected {expected} fields, found {found}")]
    WrongFieldCount { expected: usize, found: usize },
    #[error("Invalid value '{0}'")]
    InvalidValue(String),
    #[error("Unknown variable '{0}'")]
    UnknownVariable(String),
    #[error("Reference atoms must be distinct")]
    DuplicateReference,
    #[error("Invalid connectivity entry '{0}'")]
    InvalidConnectivity(String),
}

/// Gaussian input files as written by `newzmat`, plus bare molecule specifications.
///
/// Rows of the molecule specification are either Cartesian (`El x y z`) or internal
/// coordinates (`El`, `El a r`, `El a r b angle`, `El a r b angle c dihedral`) with
/// 1-based references to earlier atoms. A trailing connectivity block, if present,
/// fills the topology; without one the topology is all zero.
pub struct ZmatFile;

impl MoleculeFile for ZmatFile {
    type Options = ();
    type Error = ZmatError;

    fn read_from(
        reader: &mut impl BufRead,
        max_atom: usize,
        _options: &Self::Options,
    ) -> Result<MoleculeRecord, Self::Error> {
        let lines = reader.lines().collect::<Result<Vec<_>, _>>()?;
        let mut pos = skip_blank(&lines, 0);

        while pos < lines.len() && lines[pos].trim_start().starts_with('%') {
            pos += 1;
        }
        if lines.get(pos).is_some_and(|l| l.trim_start().starts_with('#')) {
            pos = next_section(&lines, pos); // route
            pos = next_section(&lines, pos); // title
            let line = lines
                .get(pos)
                .filter(|l| !is_blank(l))
                .ok_or(ZmatError::MissingSection("charge and multiplicity"))?;
            check_charge_multiplicity(line, pos + 1)?;
            pos += 1;
        }

        let spec = section_range(&lines, pos);
        if spec.is_empty() {
            return Err(ZmatError::MissingSection("molecule specification"));
        }
        pos = next_section(&lines, pos);

        let mut variables = HashMap::new();
        let mut connectivity = None;
        if pos < lines.len() && !is_blank(&lines[pos]) {
            if looks_like_connectivity(&lines[pos]) {
                connectivity = Some(section_range(&lines, pos));
            } else {
                let range = section_range(&lines, pos);
                variables = parse_variables(&lines, range)?;
                pos = next_section(&lines, pos);
                if lines.get(pos).is_some_and(|l| looks_like_connectivity(l)) {
                    connectivity = Some(section_range(&lines, pos));
                }
            }
        }

        let atoms = build_atoms(&lines, spec, &variables)?;
        let structure = pad_structure(&atoms, max_atom)?;
        let bonds = match connectivity {
            Some(range) => parse_connectivity(&lines, range, atoms.len())?,
            None => Vec::new(),
        };
        let topology = build_topology(&bonds, max_atom);

        Ok(MoleculeRecord::new()
            .with_structure(structure)
            .with_topology(topology))
    }
}

fn is_blank(line: &str) -> bool {
    line.trim().is_empty()
}

fn skip_blank(lines: &[String], mut pos: usize) -> usize {
    while pos < lines.len() && is_blank(&lines[pos]) {
        pos += 1;
    }
    pos
}

/// Range of the section starting at `start`, up to the next blank line or EOF.
fn section_range(lines: &[String], start: usize) -> std::ops::Range<usize> {
    let end = (start..lines.len())
        .find(|&i| is_blank(&lines[i]))
        .unwrap_or(lines.len());
    start.min(end)..end
}

/// Index of the first line after the section starting at `start` and its blank
/// separator line.
fn next_section(lines: &[String], start: usize) -> usize {
    section_range(lines, start).end + 1
}

fn tokens(line: &str) -> Vec<&str> {
    line.split(|c: char| c.is_whitespace() || c == ',')
        .filter(|t| !t.is_empty())
        .collect()
}

fn looks_like_connectivity(line: &str) -> bool {
    tokens(line)
        .first()
        .is_some_and(|t| t.parse::<usize>().is_ok())
}

fn check_charge_multiplicity(line: &str, line_num: usize) -> Result<(), ZmatError> {
    let fields = tokens(line);
    let valid = fields.len() >= 2
        && fields.len() % 2 == 0
        && fields.iter().all(|f| f.parse::<i32>().is_ok());
    if valid {
        Ok(())
    } else {
        Err(ZmatError::Parse {
            line: line_num,
            kind: ZmatParseErrorKind::InvalidChargeMultiplicity,
        })
    }
}

fn parse_variables(
    lines: &[String],
    range: std::ops::Range<usize>,
) -> Result<HashMap<String, f64>, ZmatError> {
    let mut variables = HashMap::new();
    for i in range {
        let line = lines[i].trim();
        if line.ends_with(':') {
            // "Variables:" / "Constants:" headers.
            continue;
        }
        let normalised = line.replace('=', " ");
        let fields = tokens(&normalised);
        if fields.len() != 2 {
            return Err(ZmatError::Parse {
                line: i + 1,
                kind: ZmatParseErrorKind::WrongFieldCount {
                    expected: 2,
                    found: fields.len(),
                },
            });
        }
        let value = fields[1].parse::<f64>().map_err(|_| ZmatError::Parse {
            line: i + 1,
            kind: ZmatParseErrorKind::InvalidValue(fields[1].to_string()),
        })?;
        variables.insert(fields[0].to_string(), value);
    }
    Ok(variables)
}

fn resolve_value(
    token: &str,
    variables: &HashMap<String, f64>,
    line_num: usize,
) -> Result<f64, ZmatError> {
    if let Ok(value) = token.parse::<f64>() {
        return Ok(value);
    }
    let (sign, name) = match token.strip_prefix('-') {
        Some(rest) => (-1.0, rest),
        None => (1.0, token.strip_prefix('+').unwrap_or(token)),
    };
    variables
        .get(name)
        .map(|v| sign * v)
        .ok_or_else(|| ZmatError::Parse {
            line: line_num,
            kind: ZmatParseErrorKind::UnknownVariable(token.to_string()),
        })
}

/// Resolves a reference to an earlier atom, given as a 1-based index or as the label
/// of an earlier row. Returns the zero-based index.
fn resolve_reference(
    token: &str,
    labels: &[&str],
    line_num: usize,
) -> Result<usize, ZmatError> {
    let invalid = || ZmatError::InvalidReference {
        line: line_num,
        reference: token.to_string(),
    };
    let index = match token.parse::<usize>() {
        Ok(n) => n.checked_sub(1).ok_or_else(invalid)?,
        Err(_) => labels.iter().position(|l| *l == token).ok_or_else(invalid)?,
    };
    if index >= labels.len() {
        return Err(invalid());
    }
    Ok(index)
}

fn build_atoms(
    lines: &[String],
    spec: std::ops::Range<usize>,
    variables: &HashMap<String, f64>,
) -> Result<Vec<ParsedAtom>, ZmatError> {
    let mut atoms: Vec<ParsedAtom> = Vec::with_capacity(spec.len());
    let mut labels: Vec<&str> = Vec::with_capacity(spec.len());

    for i in spec {
        let line_num = i + 1;
        let fields = tokens(&lines[i]);
        if fields.is_empty() {
            return Err(ZmatError::Parse {
                line: line_num,
                kind: ZmatParseErrorKind::WrongFieldCount {
                    expected: 1,
                    found: 0,
                },
            });
        }
        let atomic_number = parse_element_token(fields[0])?;
        let value = |index: usize| resolve_value(fields[index], variables, line_num);

        let position = if fields.len() == 4 {
            Point3::new(value(1)?, value(2)?, value(3)?)
        } else {
            let references = atoms.len().min(3);
            let expected = 1 + 2 * references;
            if fields.len() != expected {
                return Err(ZmatError::Parse {
                    line: line_num,
                    kind: ZmatParseErrorKind::WrongFieldCount {
                        expected,
                        found: fields.len(),
                    },
                });
            }
            let refs = (0..references)
                .map(|k| resolve_reference(fields[1 + 2 * k], &labels, line_num))
                .collect::<Result<Vec<_>, _>>()?;
            for (k, r) in refs.iter().enumerate() {
                if refs[..k].contains(r) {
                    return Err(ZmatError::Parse {
                        line: line_num,
                        kind: ZmatParseErrorKind::DuplicateReference,
                    });
                }
            }
            let at = |k: usize| atoms[refs[k]].position;
            let collinear = || ZmatError::Collinear { line: line_num };

            match references {
                0 => Point3::origin(),
                1 => at(0) + Vector3::z() * value(2)?,
                2 => place_in_plane(&at(0), &at(1), value(2)?, value(4)?)
                    .ok_or_else(collinear)?,
                _ => place_from_internal(&at(0), &at(1), &at(2), value(2)?, value(4)?, value(6)?)
                    .ok_or_else(collinear)?,
            }
        };

        atoms.push(ParsedAtom::new(atomic_number, position));
        labels.push(fields[0]);
    }
    Ok(atoms)
}

/// Parses `atom [partner order]...` rows into zero-based bonds. Bond orders are
/// floored to integers.
fn parse_connectivity(
    lines: &[String],
    range: std::ops::Range<usize>,
    atom_count: usize,
) -> Result<Vec<(usize, usize, u8)>, ZmatError> {
    if range.len() != atom_count {
        return Err(ZmatError::AtomCountMismatch {
            atoms: atom_count,
            connectivity: range.len(),
        });
    }

    let mut bonds = Vec::new();
    for i in range {
        let line_num = i + 1;
        let fields = tokens(&lines[i]);
        let invalid = |entry: &str| ZmatError::Parse {
            line: line_num,
            kind: ZmatParseErrorKind::InvalidConnectivity(entry.to_string()),
        };
        let atom_index = |token: &str| {
            token
                .parse::<usize>()
                .ok()
                .filter(|&n| (1..=atom_count).contains(&n))
                .map(|n| n - 1)
                .ok_or_else(|| invalid(token))
        };

        let first = fields.first().ok_or_else(|| invalid(lines[i].trim()))?;
        let atom = atom_index(first)?;
        let pairs = &fields[1..];
        if pairs.len() % 2 != 0 {
            return Err(invalid(lines[i].trim()));
        }
        for pair in pairs.chunks(2) {
            let partner = atom_index(pair[0])?;
            let order = pair[1]
                .parse::<f64>()
                .ok()
                .filter(|o| o.is_finite() && *o >= 0.0)
                .ok_or_else(|| invalid(pair[1]))?;
            bonds.push((atom, partner, order.floor().min(u8::MAX as f64) as u8));
        }
    }
    Ok(bonds)
}
