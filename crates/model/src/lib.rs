//! Pin-cell model: the typed mirror of everything the transport engine reads.
//!
//! # Invariants
//! - A validated [`Model`] only references ids it defines.
//! - Regions of the pin-cell geometry partition the pitch box: every interior
//!   point belongs to exactly one cell.
//! - Materials export as nuclides only; elements expand by natural abundance.

pub mod config;
pub mod error;
pub mod geometry;
pub mod material;
pub mod model;
pub mod nuclides;
pub mod region;
pub mod settings;
pub mod surface;
pub mod tally;

pub use config::PinCellConfig;
pub use error::{ModelError, ModelResult};
pub use geometry::{Bounds, Cell, Fill, Geometry, PartitionReport};
pub use material::{Component, Density, DensityUnit, Material};
pub use model::Model;
pub use region::{Region, Side};
pub use settings::{Discrete, RunMode, Settings, Source, SpatialDistribution};
pub use surface::{BoundaryType, Surface, SurfaceKind};
pub use tally::{FilterKind, Tally, TallyFilter};
