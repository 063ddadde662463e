//! Shared identifiers and point types for the pin-cell workspace.
//!
//! # Invariants
//! - Every model object carries a positive integer id, matching the engine's XML.
//! - Ids of different object kinds are distinct types and never mix.

mod types;

pub use glam::DVec3;
pub use types::{CellId, FilterId, MaterialId, SurfaceId, TallyId, UniverseId};
