//! Completion state of a parent node
use std::fmt;

/// Whether a node's child listing has been fetched and committed
///
/// A node starts `NotExpanded`. Once an expansion attempt parses its page,
/// the node becomes `Expanded(n)` where `n` is the number of child records
/// found, which may be zero. Stored as a nullable integer column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Expansion {
    #[default]
    NotExpanded,
    Expanded(u32),
}

impl Expansion {
    /// Reads the state from a nullable completion column
    pub fn from_column(value: Option<u32>) -> Self {
        value.map_or(Self::NotExpanded, Self::Expanded)
    }
}

impl fmt::Display for Expansion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotExpanded => write!(f, "not expanded"),
            Self::Expanded(n) => write!(f, "expanded ({} children)", n),
        }
    }
}
