//! Minimal NumPy `.npy` codec for the dataset series.
//!
//! Writes format version 1.0 and reads versions 1.0, 2.0 and 3.0. Supported element
//! types are little-endian `f8`, `i8`, `i4`, single-byte integers and fixed-width
//! unicode strings (`<U{n}`). Only C-ordered arrays are accepted.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;
use thiserror::Error;

const MAGIC: &[u8; 6] = b"\x93NUMPY";
/// Magic, two version bytes and the v1 header length field.
const V1_PREAMBLE_LEN: usize = 10;
const HEADER_ALIGNMENT: usize = 64;

#[derive(Debug, Error)]
pub enum NpyError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Not an npy file (bad magic string)")]
    BadMagic,
    #[error("Unsupported npy format version {0}.{1}")]
    UnsupportedVersion(u8, u8),
    #[error("Invalid npy header: {0}")]
    InvalidHeader(String),
    #[error("Unsupported element type '{0}'")]
    UnsupportedDtype(String),
    #[error("Fortran-ordered arrays are not supported")]
    FortranOrder,
    #[error("Expected {expected} bytes of array data, found {found}")]
    DataLength { expected: usize, found: usize },
    #[error("Invalid unicode code point {0:#x}")]
    InvalidUnicode(u32),
    #[error("Expected {expected} data, found '{found}'")]
    UnexpectedDtype {
        expected: &'static str,
        found: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum NpyData {
    Float(Vec<f64>),
    /// Every integer element type is widened to `i64`.
    Int(Vec<i64>),
    Unicode(Vec<String>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct NpyArray {
    /// The element type as written in the header, e.g. `<f8`.
    pub descr: String,
    pub shape: Vec<usize>,
    pub data: NpyData,
}

impl NpyArray {
    pub fn element_count(&self) -> usize {
        self.shape.iter().product()
    }

    pub fn into_floats(self) -> Result<Vec<f64>, NpyError> {
        match self.data {
            NpyData::Float(values) => Ok(values),
            _ => Err(NpyError::UnexpectedDtype {
                expected: "floating-point",
                found: self.descr,
            }),
        }
    }

    pub fn into_ints(self) -> Result<Vec<i64>, NpyError> {
        match self.data {
            NpyData::Int(values) => Ok(values),
            _ => Err(NpyError::UnexpectedDtype {
                expected: "integer",
                found: self.descr,
            }),
        }
    }

    pub fn into_strings(self) -> Result<Vec<String>, NpyError> {
        match self.data {
            NpyData::Unicode(values) => Ok(values),
            _ => Err(NpyError::UnexpectedDtype {
                expected: "unicode",
                found: self.descr,
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Dtype {
    F8,
    I8,
    I4,
    I1,
    U1,
    Unicode(usize),
}

impl Dtype {
    fn parse(descr: &str) -> Result<Self, NpyError> {
        match descr {
            "<f8" => Ok(Self::F8),
            "<i8" => Ok(Self::I8),
            "<i4" => Ok(Self::I4),
            "|i1" | "<i1" => Ok(Self::I1),
            "|u1" | "<u1" => Ok(Self::U1),
            _ => descr
                .strip_prefix("<U")
                .and_then(|w| w.parse::<usize>().ok())
                .map(Self::Unicode)
                .ok_or_else(|| NpyError::UnsupportedDtype(descr.to_string())),
        }
    }

    fn item_size(self) -> usize {
        match self {
            Self::F8 | Self::I8 => 8,
            Self::I4 => 4,
            Self::I1 | Self::U1 => 1,
            Self::Unicode(width) => width * 4,
        }
    }
}

pub fn write_floats(writer: &mut impl Write, shape: &[usize], values: &[f64]) -> Result<(), NpyError> {
    check_length(shape, values.len())?;
    write_header(writer, "<f8", shape)?;
    for v in values {
        writer.write_all(&v.to_le_bytes())?;
    }
    writer.flush()?;
    Ok(())
}

pub fn write_ints(writer: &mut impl Write, shape: &[usize], values: &[i64]) -> Result<(), NpyError> {
    check_length(shape, values.len())?;
    write_header(writer, "<i8", shape)?;
    for v in values {
        writer.write_all(&v.to_le_bytes())?;
    }
    writer.flush()?;
    Ok(())
}

/// Writes a one-dimensional `<U{n}` array, `n` being the longest string in characters.
pub fn write_strings(writer: &mut impl Write, values: &[String]) -> Result<(), NpyError> {
    let width = values
        .iter()
        .map(|s| s.chars().count())
        .max()
        .unwrap_or(0)
        .max(1);
    write_header(writer, &format!("<U{}", width), &[values.len()])?;
    for s in values {
        let mut written = 0;
        for c in s.chars() {
            writer.write_all(&(c as u32).to_le_bytes())?;
            written += 1;
        }
        for _ in written..width {
            writer.write_all(&0u32.to_le_bytes())?;
        }
    }
    writer.flush()?;
    Ok(())
}

pub fn read(reader: &mut impl Read) -> Result<NpyArray, NpyError> {
    let mut magic = [0u8; 6];
    reader.read_exact(&mut magic)?;
    if &magic != MAGIC {
        return Err(NpyError::BadMagic);
    }
    let mut version = [0u8; 2];
    reader.read_exact(&mut version)?;
    let header_len = match version[0] {
        1 => {
            let mut len = [0u8; 2];
            reader.read_exact(&mut len)?;
            u16::from_le_bytes(len) as usize
        }
        2 | 3 => {
            let mut len = [0u8; 4];
            reader.read_exact(&mut len)?;
            u32::from_le_bytes(len) as usize
        }
        _ => return Err(NpyError::UnsupportedVersion(version[0], version[1])),
    };

    let mut header = vec![0u8; header_len];
    reader.read_exact(&mut header)?;
    let header = String::from_utf8(header)
        .map_err(|_| NpyError::InvalidHeader("header is not valid text".to_string()))?;
    let (descr, fortran_order, shape) = parse_header(&header)?;
    if fortran_order {
        return Err(NpyError::FortranOrder);
    }
    let dtype = Dtype::parse(&descr)?;

    let count: usize = shape.iter().product();
    let expected = count * dtype.item_size();
    let mut bytes = Vec::with_capacity(expected);
    reader.read_to_end(&mut bytes)?;
    if bytes.len() != expected {
        return Err(NpyError::DataLength {
            expected,
            found: bytes.len(),
        });
    }

    let data = decode(dtype, &bytes)?;
    Ok(NpyArray { descr, shape, data })
}

pub fn write_floats_to_path<P: AsRef<Path>>(
    path: P,
    shape: &[usize],
    values: &[f64],
) -> Result<(), NpyError> {
    let mut writer = BufWriter::new(File::create(path)?);
    write_floats(&mut writer, shape, values)
}

pub fn write_ints_to_path<P: AsRef<Path>>(
    path: P,
    shape: &[usize],
    values: &[i64],
) -> Result<(), NpyError> {
    let mut writer = BufWriter::new(File::create(path)?);
    write_ints(&mut writer, shape, values)
}

pub fn write_strings_to_path<P: AsRef<Path>>(path: P, values: &[String]) -> Result<(), NpyError> {
    let mut writer = BufWriter::new(File::create(path)?);
    write_strings(&mut writer, values)
}

pub fn read_from_path<P: AsRef<Path>>(path: P) -> Result<NpyArray, NpyError> {
    let mut reader = BufReader::new(File::open(path)?);
    read(&mut reader)
}

fn check_length(shape: &[usize], len: usize) -> Result<(), NpyError> {
    let expected: usize = shape.iter().product();
    if expected != len {
        return Err(NpyError::DataLength {
            expected,
            found: len,
        });
    }
    Ok(())
}

fn format_shape(shape: &[usize]) -> String {
    match shape {
        [] => "()".to_string(),
        [n] => format!("({},)", n),
        _ => {
            let dims: Vec<String> = shape.iter().map(|d| d.to_string()).collect();
            format!("({})", dims.join(", "))
        }
    }
}

fn write_header(writer: &mut impl Write, descr: &str, shape: &[usize]) -> Result<(), NpyError> {
    let dict = format!(
        "{{'descr': '{}', 'fortran_order': False, 'shape': {}, }}",
        descr,
        format_shape(shape)
    );
    let unpadded = V1_PREAMBLE_LEN + dict.len() + 1;
    let padding = (HEADER_ALIGNMENT - unpadded % HEADER_ALIGNMENT) % HEADER_ALIGNMENT;
    let header_len = dict.len() + padding + 1;
    let header_len = u16::try_from(header_len)
        .map_err(|_| NpyError::InvalidHeader(format!("header of {} bytes is too long", header_len)))?;

    writer.write_all(MAGIC)?;
    writer.write_all(&[1, 0])?;
    writer.write_all(&header_len.to_le_bytes())?;
    writer.write_all(dict.as_bytes())?;
    writer.write_all(&vec![b' '; padding])?;
    writer.write_all(b"\n")?;
    Ok(())
}

/// Returns the text following `'key':` in a header dictionary.
fn header_value<'a>(header: &'a str, key: &str) -> Result<&'a str, NpyError> {
    let missing = || NpyError::InvalidHeader(format!("missing key '{}'", key));
    let start = header
        .find(&format!("'{}'", key))
        .or_else(|| header.find(&format!("\"{}\"", key)))
        .ok_or_else(missing)?;
    let rest = &header[start + key.len() + 2..];
    rest.trim_start()
        .strip_prefix(':')
        .map(str::trim_start)
        .ok_or_else(missing)
}

fn parse_header(header: &str) -> Result<(String, bool, Vec<usize>), NpyError> {
    let descr_value = header_value(header, "descr")?;
    let quote = descr_value
        .chars()
        .next()
        .filter(|c| *c == '\'' || *c == '"')
        .ok_or_else(|| NpyError::InvalidHeader("descr is not a string".to_string()))?;
    let descr = descr_value[1..]
        .split(quote)
        .next()
        .unwrap_or_default()
        .to_string();

    let fortran_value = header_value(header, "fortran_order")?;
    let fortran_order = if fortran_value.starts_with("True") {
        true
    } else if fortran_value.starts_with("False") {
        false
    } else {
        return Err(NpyError::InvalidHeader("fortran_order is not a boolean".to_string()));
    };

    let shape_value = header_value(header, "shape")?;
    let tuple = shape_value
        .strip_prefix('(')
        .and_then(|s| s.split(')').next())
        .ok_or_else(|| NpyError::InvalidHeader("shape is not a tuple".to_string()))?;
    let shape = tuple
        .split(',')
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .map(|d| {
            d.parse::<usize>()
                .map_err(|_| NpyError::InvalidHeader(format!("invalid dimension '{}'", d)))
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok((descr, fortran_order, shape))
}

fn decode(dtype: Dtype, bytes: &[u8]) -> Result<NpyData, NpyError> {
    let data = match dtype {
        Dtype::F8 => NpyData::Float(
            bytes
                .chunks_exact(8)
                .map(|c| f64::from_le_bytes([c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7]]))
                .collect(),
        ),
        Dtype::I8 => NpyData::Int(
            bytes
                .chunks_exact(8)
                .map(|c| i64::from_le_bytes([c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7]]))
                .collect(),
        ),
        Dtype::I4 => NpyData::Int(
            bytes
                .chunks_exact(4)
                .map(|c| i32::from_le_bytes([c[0], c[1], c[2], c[3]]) as i64)
                .collect(),
        ),
        Dtype::I1 => NpyData::Int(bytes.iter().map(|&b| b as i8 as i64).collect()),
        Dtype::U1 => NpyData::Int(bytes.iter().map(|&b| b as i64).collect()),
        Dtype::Unicode(0) => NpyData::Unicode(Vec::new()),
        Dtype::Unicode(width) => {
            let mut strings = Vec::with_capacity(bytes.len() / (width * 4));
            for item in bytes.chunks_exact(width * 4) {
                let mut s = String::with_capacity(width);
                for unit in item.chunks_exact(4) {
                    let code = u32::from_le_bytes([unit[0], unit[1], unit[2], unit[3]]);
                    if code == 0 {
                        break;
                    }
                    s.push(char::from_u32(code).ok_or(NpyError::InvalidUnicode(code))?);
                }
                strings.push(s);
            }
            NpyData::Unicode(strings)
        }
    };
    Ok(data)
}
