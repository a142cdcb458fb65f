use phf::{Map, phf_map};
use std::fmt;
use thiserror::Error;

/// A single entry of the periodic reference table.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Element {
    /// Atomic number. `0` is reserved for the ghost entry used by padding slots.
    pub number: u8,
    /// Canonical element symbol (e.g. `"Cl"`).
    pub symbol: &'static str,
    /// Standard atomic weight in unified atomic mass units.
    pub mass: f64,
}

const fn element(number: u8, symbol: &'static str, mass: f64) -> Element {
    Element {
        number,
        symbol,
        mass,
    }
}

/// Source table, indexed by atomic number.
static ELEMENTS: [Element; 55] = [
    element(0, "Ghost", 0.0),
    element(1, "H", 1.008),
    element(2, "He", 4.0026),
    element(3, "Li", 6.94),
    element(4, "Be", 9.0122),
    element(5, "B", 10.81),
    element(6, "C", 12.011),
    element(7, "N", 14.007),
    element(8, "O", 15.999),
    element(9, "F", 18.998),
    element(10, "Ne", 20.180),
    element(11, "Na", 22.990),
    element(12, "Mg", 24.305),
    element(13, "Al", 26.982),
    element(14, "Si", 28.085),
    element(15, "P", 30.974),
    element(16, "S", 32.06),
    element(17, "Cl", 35.45),
    element(18, "Ar", 39.948),
    element(19, "K", 39.098),
    element(20, "Ca", 40.078),
    element(21, "Sc", 44.956),
    element(22, "Ti", 47.867),
    element(23, "V", 50.942),
    element(24, "Cr", 51.996),
    element(25, "Mn", 54.938),
    element(26, "Fe", 55.845),
    element(27, "Co", 58.933),
    element(28, "Ni", 58.693),
    element(29, "Cu", 63.546),
    element(30, "Zn", 65.38),
    element(31, "Ga", 69.723),
    element(32, "Ge", 72.630),
    element(33, "As", 74.922),
    element(34, "Se", 78.971),
    element(35, "Br", 79.904),
    element(36, "Kr", 83.798),
    element(37, "Rb", 85.468),
    element(38, "Sr", 87.62),
    element(39, "Y", 88.906),
    element(40, "Zr", 91.224),
    element(41, "Nb", 92.906),
    element(42, "Mo", 95.95),
    element(43, "Tc", 98.0),
    element(44, "Ru", 101.07),
    element(45, "Rh", 102.91),
    element(46, "Pd", 106.42),
    element(47, "Ag", 107.87),
    element(48, "Cd", 112.41),
    element(49, "In", 114.82),
    element(50, "Sn", 118.71),
    element(51, "Sb", 121.76),
    element(52, "Te", 127.60),
    element(53, "I", 126.90),
    element(54, "Xe", 131.29),
];

static SYMBOL_TO_NUMBER: Map<&'static str, u8> = phf_map! {
    "Ghost" => 0,
    "H" => 1, "He" => 2,
    "Li" => 3, "Be" => 4, "B" => 5, "C" => 6, "N" => 7, "O" => 8, "F" => 9, "Ne" => 10,
    "Na" => 11, "Mg" => 12, "Al" => 13, "Si" => 14, "P" => 15, "S" => 16, "Cl" => 17, "Ar" => 18,
    "K" => 19, "Ca" => 20, "Sc" => 21, "Ti" => 22, "V" => 23, "Cr" => 24, "Mn" => 25, "Fe" => 26,
    "Co" => 27, "Ni" => 28, "Cu" => 29, "Zn" => 30, "Ga" => 31, "Ge" => 32, "As" => 33, "Se" => 34,
    "Br" => 35, "Kr" => 36,
    "Rb" => 37, "Sr" => 38, "Y" => 39, "Zr" => 40, "Nb" => 41, "Mo" => 42, "Tc" => 43, "Ru" => 44,
    "Rh" => 45, "Pd" => 46, "Ag" => 47, "Cd" => 48, "In" => 49, "Sn" => 50, "Sb" => 51, "Te" => 52,
    "I" => 53, "Xe" => 54,
};

#[derive(Debug, Clone, PartialEq, Error)]
#[error("Unknown element: '{0}'")]
pub struct UnknownElementError(pub String);

/// Key accepted by the reference-table lookups.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ElementKey<'a> {
    Number(usize),
    /// A floating-point atomic number, as stored in column 0 of a structure array.
    Value(f64),
    Symbol(&'a str),
}

impl fmt::Display for ElementKey<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{}", n),
            Self::Value(v) => write!(f, "{}", v),
            Self::Symbol(s) => write!(f, "{}", s),
        }
    }
}

impl From<u8> for ElementKey<'_> {
    fn from(n: u8) -> Self {
        Self::Number(n as usize)
    }
}

impl From<u32> for ElementKey<'_> {
    fn from(n: u32) -> Self {
        Self::Number(n as usize)
    }
}

impl From<usize> for ElementKey<'_> {
    fn from(n: usize) -> Self {
        Self::Number(n)
    }
}

impl From<f64> for ElementKey<'_> {
    fn from(v: f64) -> Self {
        Self::Value(v)
    }
}

impl<'a> From<&'a str> for ElementKey<'a> {
    fn from(s: &'a str) -> Self {
        Self::Symbol(s)
    }
}

impl<'a> From<&'a String> for ElementKey<'a> {
    fn from(s: &'a String) -> Self {
        Self::Symbol(s.as_str())
    }
}

/// Resolves any [`ElementKey`] to its table entry.
pub fn element_lookup<'a>(key: impl Into<ElementKey<'a>>) -> Result<&'static Element, UnknownElementError> {
    let key = key.into();
    let number = match key {
        ElementKey::Number(n) => n,
        ElementKey::Value(v) => {
            if v.fract() != 0.0 || v < 0.0 || !v.is_finite() {
                return Err(UnknownElementError(key.to_string()));
            }
            v as usize
        }
        ElementKey::Symbol(s) => atomic_number(s)? as usize,
    };
    ELEMENTS
        .get(number)
        .ok_or_else(|| UnknownElementError(key.to_string()))
}

/// Returns the atomic number for an element symbol. Case of the symbol is normalised.
pub fn atomic_number(symbol: &str) -> Result<u8, UnknownElementError> {
    let normalised = normalise_symbol(symbol.trim());
    SYMBOL_TO_NUMBER
        .get(normalised.as_str())
        .copied()
        .ok_or_else(|| UnknownElementError(symbol.to_string()))
}

/// Looks up the symbol of an atomic number.
///
/// # Errors
///
/// Returns [`UnknownElementError`] for numbers past the end of the table. Number 0
/// is the ghost atom used for padding.
pub fn element_symbol(number: u8) -> Result<&'static str, UnknownElementError> {
    ELEMENTS
        .get(number as usize)
        .map(|e| e.symbol)
        .ok_or_else(|| UnknownElementError(number.to_string()))
}

/// Standard atomic mass in daltons, keyed by atomic number (integer or integral
/// float) or symbol.
pub fn atomic_mass<'a>(key: impl Into<ElementKey<'a>>) -> Result<f64, UnknownElementError> {
    element_lookup(key).map(|e| e.mass)
}

/// Parses an element token as found in molecule files: either an atomic number or a
/// symbol, optionally followed by a label (`C1`, `H-Ct`, `O(Fragment=1)`).
///
/// Ghost entries are rejected because atomic number zero marks a padding slot.
pub(crate) fn parse_element_token(token: &str) -> Result<u8, UnknownElementError> {
    let token = token.trim();
    let number = if let Ok(n) = token.parse::<u32>() {
        element_lookup(n)?.number
    } else {
        let symbol: String = token
            .chars()
            .take_while(|c| c.is_ascii_alphabetic())
            .collect();
        match atomic_number(&symbol) {
            Ok(n) => n,
            // "CA1" style labels: fall back to the one-letter symbol.
            Err(_) if symbol.len() > 1 => atomic_number(&symbol[..1])
                .map_err(|_| UnknownElementError(token.to_string()))?,
            Err(_) => return Err(UnknownElementError(token.to_string())),
        }
    };
    if number == 0 {
        return Err(UnknownElementError(token.to_string()));
    }
    Ok(number)
}

fn normalise_symbol(symbol: &str) -> String {
    let mut chars = symbol.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(|c| c.to_lowercase()))
            .collect(),
        None => String::new(),
    }
}
