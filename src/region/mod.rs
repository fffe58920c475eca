//! Region model for the administrative hierarchy
//!
//! # Components
//!
//! - `Level`: the four hierarchy levels and their storage layout
//! - `Expansion`: whether a node's children are fully known
//! - `ChildRecord`, `RegionNode`, `NewRegion`: rows as extracted, stored and inserted

mod expansion;
mod level;
mod record;

pub use expansion::Expansion;
pub use level::Level;
pub use record::{ChildRecord, NewRegion, RegionNode};
