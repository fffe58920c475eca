//! Per-node persist task
//!
//! Children are written first, then the parent's completion marker. A crash
//! between the two leaves the parent unexpanded; the next run re-fetches it
//! and the already-inserted children are skipped by key.

use crate::region::{ChildRecord, Level, NewRegion, RegionNode};
use crate::storage::{RegionStore, StorageResult};

/// What one persist pass did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PersistSummary {
    /// Records returned by extraction
    pub found: u32,

    /// Records newly inserted
    pub inserted: u32,

    /// Records already present at their key
    pub existing: u32,

    /// Whether this pass wrote the parent's completion marker
    pub marked: bool,
}

/// Writes extracted children of `parent` and marks it expanded
///
/// With `parent = None` (the province index) only the children are written.
/// The marker records `records.len()`, counting children that already
/// existed.
pub fn persist_children<S: RegionStore + ?Sized>(
    store: &mut S,
    year: u16,
    level: Level,
    parent: Option<&RegionNode>,
    records: &[ChildRecord],
) -> StorageResult<PersistSummary> {
    let mut summary = PersistSummary {
        found: records.len() as u32,
        ..PersistSummary::default()
    };
    let parent_code = parent.map(|p| p.code.as_str());

    for record in records {
        if store.exists(level, year, &record.code)? {
            summary.existing += 1;
            continue;
        }

        match store.insert(level, &NewRegion::from_record(year, record, parent_code)) {
            Ok(()) => summary.inserted += 1,
            Err(e) if e.is_conflict() => summary.existing += 1,
            Err(e) => return Err(e),
        }
    }

    if let Some(parent) = parent {
        summary.marked = store.update_completion(parent.level, year, &parent.code, summary.found)?;
        if !summary.marked {
            tracing::debug!("{} {} was already marked expanded", parent.level, parent.code);
        }
    }

    Ok(summary)
}
