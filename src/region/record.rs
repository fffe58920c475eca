//! Region rows as they move between extraction and storage

use crate::region::{Expansion, Level};

/// A child row extracted from a parent's listing page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildRecord {
    /// Division code as printed by the directory
    pub code: String,

    /// Display name
    pub name: String,

    /// Absolute URL of the child's own listing page, if it has one
    pub url: Option<String>,
}

impl ChildRecord {
    pub fn new(code: impl Into<String>, name: impl Into<String>, url: Option<String>) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
            url,
        }
    }
}

/// A stored region row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionNode {
    pub id: i64,
    pub level: Level,
    pub year: u16,
    pub code: String,
    pub name: String,
    pub url: Option<String>,

    /// Code of the owning row one level up (None for provinces)
    pub parent_code: Option<String>,

    /// Completion marker; always `NotExpanded` for towns
    pub expansion: Expansion,

    pub created_at: String,
    pub expanded_at: Option<String>,
}

impl RegionNode {
    /// Returns true if this node has a listing page to expand
    pub fn is_expandable(&self) -> bool {
        self.level.child().is_some() && self.url.as_deref().is_some_and(|u| !u.is_empty())
    }
}

/// A row about to be inserted
#[derive(Debug, Clone, Copy)]
pub struct NewRegion<'a> {
    pub year: u16,
    pub code: &'a str,
    pub name: &'a str,
    pub url: Option<&'a str>,
    pub parent_code: Option<&'a str>,
}

impl<'a> NewRegion<'a> {
    /// Builds an insert for an extracted child of `parent_code`
    pub fn from_record(year: u16, record: &'a ChildRecord, parent_code: Option<&'a str>) -> Self {
        Self {
            year,
            code: &record.code,
            name: &record.name,
            url: record.url.as_deref(),
            parent_code,
        }
    }
}
