use crate::error::{ModelError, ModelResult};
use crate::region::Region;
use crate::surface::Surface;
use glam::DVec3;
use pincell_common::{CellId, MaterialId, SurfaceId, UniverseId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Sample points closer than this to any surface are skipped by the partition check.
const SURFACE_TOLERANCE: f64 = 1e-9;

/// Overlap and gap examples kept in a [`PartitionReport`].
const MAX_EXAMPLES: usize = 8;

/// What a cell is filled with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Fill {
    Material(MaterialId),
    Void,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cell {
    pub id: CellId,
    pub name: String,
    /// `None` means the cell spans all space.
    pub region: Option<Region>,
    pub fill: Fill,
    pub universe: UniverseId,
}

impl Cell {
    pub fn new(id: CellId, name: impl Into<String>, region: Region, fill: Fill) -> Self {
        Self {
            id,
            name: name.into(),
            region: Some(region),
            fill,
            universe: Geometry::ROOT_UNIVERSE,
        }
    }

    pub fn contains(&self, point: DVec3, surfaces: &BTreeMap<SurfaceId, Surface>) -> bool {
        self.region
            .as_ref()
            .is_none_or(|r| r.contains(point, surfaces))
    }
}

/// Axis-aligned box used to sample the geometry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min: DVec3,
    pub max: DVec3,
}

impl Bounds {
    pub fn new(min: DVec3, max: DVec3) -> Self {
        Self { min, max }
    }

    pub fn extent(&self) -> DVec3 {
        self.max - self.min
    }
}

/// Result of sampling a box for overlapping or missing cells.
#[derive(Debug, Clone, Default)]
pub struct PartitionReport {
    pub samples: usize,
    /// Samples skipped because they sit on a surface.
    pub skipped: usize,
    pub overlap_count: usize,
    pub gap_count: usize,
    /// First few overlapping points with the cells claiming them.
    pub overlaps: Vec<(DVec3, Vec<CellId>)>,
    /// First few points no cell claims.
    pub gaps: Vec<DVec3>,
    /// Samples owned by exactly one cell, per cell.
    pub hits: BTreeMap<CellId, usize>,
}

impl PartitionReport {
    /// True when every classified sample belongs to exactly one cell.
    pub fn is_partition(&self) -> bool {
        self.overlap_count == 0 && self.gap_count == 0
    }

    /// Fraction of classified samples owned by `cell`.
    pub fn fraction(&self, cell: CellId) -> f64 {
        let classified = self.samples - self.skipped;
        if classified == 0 {
            return 0.0;
        }
        self.hits.get(&cell).copied().unwrap_or(0) as f64 / classified as f64
    }
}

/// Root universe of cells plus the surfaces they reference.
///
/// BTreeMaps keep export order deterministic.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Geometry {
    surfaces: BTreeMap<SurfaceId, Surface>,
    cells: BTreeMap<CellId, Cell>,
}

impl Geometry {
    pub const ROOT_UNIVERSE: UniverseId = UniverseId(1);

    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_surface(&mut self, surface: Surface) -> ModelResult<()> {
        if self.surfaces.contains_key(&surface.id) {
            return Err(ModelError::DuplicateId {
                kind: "surface",
                id: surface.id.get(),
            });
        }
        self.surfaces.insert(surface.id, surface);
        Ok(())
    }

    pub fn add_cell(&mut self, cell: Cell) -> ModelResult<()> {
        if self.cells.contains_key(&cell.id) {
            return Err(ModelError::DuplicateId {
                kind: "cell",
                id: cell.id.get(),
            });
        }
        self.cells.insert(cell.id, cell);
        Ok(())
    }

    pub fn surfaces(&self) -> &BTreeMap<SurfaceId, Surface> {
        &self.surfaces
    }

    pub fn cells(&self) -> &BTreeMap<CellId, Cell> {
        &self.cells
    }

    pub fn surface(&self, id: SurfaceId) -> Option<&Surface> {
        self.surfaces.get(&id)
    }

    pub fn cell(&self, id: CellId) -> Option<&Cell> {
        self.cells.get(&id)
    }

    /// Every cell containing `point`. A well-formed geometry returns exactly one.
    pub fn find_cells(&self, point: DVec3) -> Vec<CellId> {
        self.cells
            .values()
            .filter(|c| c.contains(point, &self.surfaces))
            .map(|c| c.id)
            .collect()
    }

    /// Whether `point` is within `tol` of any surface.
    pub fn on_surface(&self, point: DVec3, tol: f64) -> bool {
        self.surfaces
            .values()
            .any(|s| s.evaluate(point).abs() < tol)
    }

    /// Check that every cell's surfaces exist.
    pub fn check_references(&self) -> ModelResult<()> {
        for cell in self.cells.values() {
            let Some(region) = &cell.region else { continue };
            if !region.is_well_formed() {
                return Err(ModelError::EmptyRegion { cell: cell.id.get() });
            }
            if let Some(missing) = region
                .surfaces()
                .into_iter()
                .find(|s| !self.surfaces.contains_key(s))
            {
                return Err(ModelError::MissingSurface {
                    cell: cell.id.get(),
                    surface: missing.get(),
                });
            }
        }
        Ok(())
    }

    /// Sample a cell-centred grid over `bounds` and count points claimed by
    /// more than one cell or by none. Axes with zero extent get a single layer.
    pub fn check_partition(&self, bounds: &Bounds, resolution: usize) -> PartitionReport {
        let _span = tracing::info_span!("check_partition", resolution).entered();
        let resolution = resolution.max(1);
        let extent = bounds.extent();
        let steps = |len: f64| if len > 0.0 { resolution } else { 1 };
        let (nx, ny, nz) = (steps(extent.x), steps(extent.y), steps(extent.z));

        let mut report = PartitionReport::default();
        for k in 0..nz {
            for j in 0..ny {
                for i in 0..nx {
                    let t = DVec3::new(
                        (i as f64 + 0.5) / nx as f64,
                        (j as f64 + 0.5) / ny as f64,
                        (k as f64 + 0.5) / nz as f64,
                    );
                    let point = bounds.min + extent * t;
                    report.samples += 1;
                    if self.on_surface(point, SURFACE_TOLERANCE) {
                        report.skipped += 1;
                        continue;
                    }
                    let owners = self.find_cells(point);
                    match owners.len() {
                        0 => {
                            report.gap_count += 1;
                            if report.gaps.len() < MAX_EXAMPLES {
                                report.gaps.push(point);
                            }
                        }
                        1 => *report.hits.entry(owners[0]).or_default() += 1,
                        _ => {
                            report.overlap_count += 1;
                            if report.overlaps.len() < MAX_EXAMPLES {
                                report.overlaps.push((point, owners));
                            }
                        }
                    }
                }
            }
        }

        tracing::debug!(
            samples = report.samples,
            overlaps = report.overlap_count,
            gaps = report.gap_count,
            "partition check done"
        );
        report
    }
}
