//! Hierarchy level definitions
//!
//! Each level maps onto one table. Levels are ordered from the root down so
//! that `Level::City < Level::Town` reads as "city is shallower than town".
use crate::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One level of the administrative hierarchy
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Province,
    City,
    District,
    Town,
}

impl Level {
    /// All levels, root first
    pub const ALL: [Level; 4] = [Level::Province, Level::City, Level::District, Level::Town];

    /// The level whose rows own rows of this level
    pub fn parent(&self) -> Option<Level> {
        match self {
            Self::Province => None,
            Self::City => Some(Self::Province),
            Self::District => Some(Self::City),
            Self::Town => Some(Self::District),
        }
    }

    /// The level produced by expanding a row of this level
    pub fn child(&self) -> Option<Level> {
        match self {
            Self::Province => Some(Self::City),
            Self::City => Some(Self::District),
            Self::District => Some(Self::Town),
            Self::Town => None,
        }
    }

    /// Table holding rows of this level
    pub fn table(&self) -> &'static str {
        match self {
            Self::Province => "provinces",
            Self::City => "cities",
            Self::District => "districts",
            Self::Town => "towns",
        }
    }

    /// Column referencing the parent row's code
    pub fn parent_column(&self) -> Option<&'static str> {
        match self {
            Self::Province => None,
            Self::City => Some("province_code"),
            Self::District => Some("city_code"),
            Self::Town => Some("district_code"),
        }
    }

    /// Column recording how many children an expansion found.
    ///
    /// Towns are leaves and carry no completion column.
    pub fn completion_column(&self) -> Option<&'static str> {
        match self {
            Self::Province => Some("cities_expanded"),
            Self::City => Some("districts_expanded"),
            Self::District => Some("towns_expanded"),
            Self::Town => None,
        }
    }

    /// Converts the level to its database/CLI string
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Province => "province",
            Self::City => "city",
            Self::District => "district",
            Self::Town => "town",
        }
    }

    /// Parses a level from its database/CLI string
    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "province" => Some(Self::Province),
            "city" => Some(Self::City),
            "district" => Some(Self::District),
            "town" => Some(Self::Town),
            _ => None,
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}

impl FromStr for Level {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_db_string(&s.trim().to_ascii_lowercase()).ok_or_else(|| {
            ConfigError::Validation(format!(
                "unknown level '{}', expected one of province, city, district, town",
                s
            ))
        })
    }
}
