use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Partial-charge partitioning scheme read from log files.
///
/// One scheme is active per dataset and fixed at construction; it selects which
/// charge block the log parser extracts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub enum ChargeType {
    #[default]
    Mulliken,
    Hirshfeld,
}

#[derive(Debug, Error)]
#[error("Invalid charge type '{0}' (expected 'mulliken' or 'hirshfeld')")]
pub struct ParseChargeTypeError(pub String);

impl FromStr for ChargeType {
    type Err = ParseChargeTypeError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "mulliken" => Ok(Self::Mulliken),
            "hirshfeld" => Ok(Self::Hirshfeld),
            _ => Err(ParseChargeTypeError(s.to_string())),
        }
    }
}

impl<'de> Deserialize<'de> for ChargeType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

impl fmt::Display for ChargeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Self::Mulliken => "Mulliken",
                Self::Hirshfeld => "Hirshfeld",
            }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn charge_type_from_str_is_case_insensitive() {
        assert_eq!("mulliken".parse::<ChargeType>().unwrap(), ChargeType::Mulliken);
        assert_eq!("Hirshfeld".parse::<ChargeType>().unwrap(), ChargeType::Hirshfeld);
        assert_eq!(" HIRSHFELD ".parse::<ChargeType>().unwrap(), ChargeType::Hirshfeld);
    }

    #[test]
    fn charge_type_from_str_rejects_other_schemes() {
        assert!("cm5".parse::<ChargeType>().is_err());
        assert!("".parse::<ChargeType>().is_err());
    }

    #[test]
    fn charge_type_display_round_trips_through_from_str() {
        for ct in [ChargeType::Mulliken, ChargeType::Hirshfeld] {
            assert_eq!(ct.to_string().parse::<ChargeType>().unwrap(), ct);
        }
    }

    #[test]
    fn charge_type_default_is_mulliken() {
        assert_eq!(ChargeType::default(), ChargeType::Mulliken);
    }
}
