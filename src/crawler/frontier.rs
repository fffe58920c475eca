//! Frontier selection
//!
//! The frontier for a level pass is every parent row of the year whose
//! completion marker is unset and that has a listing page. It is read once
//! per level per run, so a node appears in at most one frontier per run,
//! and never again once its expansion has been committed.

use crate::region::{Level, RegionNode};
use crate::storage::{RegionStore, StorageResult};

/// Selects the parent nodes whose children are still unknown
///
/// `parent` is the level being expanded: `Level::Province` yields the
/// provinces whose cities have not been fetched yet. Towns have no children
/// and always yield an empty frontier.
pub fn select_frontier<S: RegionStore + ?Sized>(
    store: &S,
    year: u16,
    parent: Level,
) -> StorageResult<Vec<RegionNode>> {
    let nodes = store.find_missing_completion(year, parent)?;
    let frontier: Vec<RegionNode> = nodes.into_iter().filter(RegionNode::is_expandable).collect();

    tracing::debug!(
        "Frontier for {} {}: {} node(s)",
        year,
        parent,
        frontier.len()
    );
    Ok(frontier)
}
