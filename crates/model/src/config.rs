//! Pin-cell study configuration.
//!
//! Every field has a default, so an empty YAML document describes the
//! reference case: a U-238 rod in zirconium clad inside a water-moderated
//! square pitch, a 2 MeV point source and a fuel capture tally.

use crate::error::{ModelError, ModelResult};
use crate::geometry::{Bounds, Cell, Fill, Geometry};
use crate::material::{DensityUnit, Material};
use crate::model::Model;
use crate::region::Region;
use crate::settings::{Discrete, RunMode, Settings, Source};
use crate::surface::{BoundaryType, Surface, SurfaceKind};
use crate::tally::{FilterKind, Tally, TallyFilter};
use glam::DVec3;
use pincell_common::{CellId, FilterId, MaterialId, SurfaceId, TallyId};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const FUEL_MATERIAL: MaterialId = MaterialId(1);
pub const MODERATOR_MATERIAL: MaterialId = MaterialId(2);
pub const CLAD_MATERIAL: MaterialId = MaterialId(3);

pub const FUEL_CELL: CellId = CellId(1);
pub const GAP_CELL: CellId = CellId(2);
pub const CLAD_CELL: CellId = CellId(3);
pub const MODERATOR_CELL: CellId = CellId(4);

/// Top-level study configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PinCellConfig {
    pub dimensions: PinDimensions,
    pub fuel: MaterialSpec,
    pub clad: MaterialSpec,
    pub moderator: MaterialSpec,
    pub run: RunConfig,
    pub source: SourceConfig,
    pub tally: TallyConfig,
    /// Cross-section library index. Falls back to `OPENMC_CROSS_SECTIONS`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cross_sections: Option<PathBuf>,
}

/// Pin radii and lattice pitch, in cm.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PinDimensions {
    pub fuel_outer_radius: f64,
    pub clad_inner_radius: f64,
    pub clad_outer_radius: f64,
    pub pitch: f64,
}

impl Default for PinDimensions {
    fn default() -> Self {
        Self {
            fuel_outer_radius: 0.42,
            clad_inner_radius: 0.45,
            clad_outer_radius: 0.48,
            pitch: 1.26,
        }
    }
}

impl PinDimensions {
    /// Radii must nest strictly inside the half pitch.
    pub fn validate(&self) -> ModelResult<()> {
        let radii = [
            0.0,
            self.fuel_outer_radius,
            self.clad_inner_radius,
            self.clad_outer_radius,
            self.pitch / 2.0,
        ];
        if radii.iter().any(|r| !r.is_finite()) {
            return Err(ModelError::InvalidDimensions("non-finite dimension".into()));
        }
        if radii.windows(2).any(|w| w[0] >= w[1]) {
            return Err(ModelError::InvalidDimensions(format!(
                "need 0 < fuel_or ({}) < clad_ir ({}) < clad_or ({}) < pitch/2 ({})",
                radii[1], radii[2], radii[3], radii[4]
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentSpec {
    pub name: String,
    pub fraction: f64,
}

impl ComponentSpec {
    fn new(name: &str, fraction: f64) -> Self {
        Self {
            name: name.into(),
            fraction,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialSpec {
    pub name: String,
    pub density_g_cm3: f64,
    #[serde(default)]
    pub nuclides: Vec<ComponentSpec>,
    #[serde(default)]
    pub elements: Vec<ComponentSpec>,
    #[serde(default)]
    pub s_alpha_beta: Vec<String>,
}

impl MaterialSpec {
    fn build(&self, id: MaterialId) -> ModelResult<Material> {
        let mut m = Material::new(id, &self.name);
        for n in &self.nuclides {
            m.add_nuclide(&n.name, n.fraction);
        }
        for e in &self.elements {
            m.add_element(&e.name, e.fraction)?;
        }
        m.set_density(DensityUnit::GramsPerCm3, self.density_g_cm3)?;
        for table in &self.s_alpha_beta {
            m.add_s_alpha_beta(table);
        }
        Ok(m)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub mode: RunMode,
    pub batches: u32,
    pub inactive: u32,
    pub particles: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            mode: RunMode::Eigenvalue,
            batches: 100,
            inactive: 10,
            particles: 1000,
            seed: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Point source position, cm.
    pub position: [f64; 3],
    /// Discrete source energies, eV.
    pub energies_ev: Vec<f64>,
    pub probabilities: Vec<f64>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            position: [0.0, 0.0, 0.0],
            energies_ev: vec![2.0e6],
            probabilities: vec![1.0],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TallyConfig {
    pub name: String,
    pub scores: Vec<String>,
}

impl Default for TallyConfig {
    fn default() -> Self {
        Self {
            name: "capture_reactions".into(),
            scores: vec!["(n,gamma)".into()],
        }
    }
}

impl Default for PinCellConfig {
    fn default() -> Self {
        Self {
            dimensions: PinDimensions::default(),
            fuel: MaterialSpec {
                name: "U-238".into(),
                density_g_cm3: 18.95,
                nuclides: vec![ComponentSpec::new("U238", 1.0)],
                elements: Vec::new(),
                s_alpha_beta: Vec::new(),
            },
            clad: MaterialSpec {
                name: "Zirconium".into(),
                density_g_cm3: 6.52,
                nuclides: Vec::new(),
                elements: vec![ComponentSpec::new("Zr", 1.0)],
                s_alpha_beta: Vec::new(),
            },
            moderator: MaterialSpec {
                name: "Water".into(),
                density_g_cm3: 1.0,
                nuclides: Vec::new(),
                elements: vec![ComponentSpec::new("H", 2.0), ComponentSpec::new("O", 1.0)],
                s_alpha_beta: vec!["c_H_in_H2O".into()],
            },
            run: RunConfig::default(),
            source: SourceConfig::default(),
            tally: TallyConfig::default(),
            cross_sections: None,
        }
    }
}

impl PinCellConfig {
    /// Load from a YAML file. Missing keys take their defaults.
    pub fn from_file(path: impl AsRef<Path>) -> ModelResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    pub fn from_yaml(contents: &str) -> ModelResult<Self> {
        let config: Self = serde_yaml::from_str(contents)?;
        Ok(config)
    }

    pub fn to_yaml(&self) -> ModelResult<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// The pitch box in the z = 0 plane.
    pub fn bounds(&self) -> Bounds {
        let h = self.dimensions.pitch / 2.0;
        Bounds::new(DVec3::new(-h, -h, 0.0), DVec3::new(h, h, 0.0))
    }

    /// Build the engine model: fuel disk, void gap, clad annulus and moderator
    /// bounded by reflective planes at ±pitch/2.
    pub fn build_model(&self) -> ModelResult<Model> {
        let _span = tracing::info_span!("build_model").entered();
        let dims = &self.dimensions;
        dims.validate()?;

        let materials = vec![
            self.fuel.build(FUEL_MATERIAL)?,
            self.moderator.build(MODERATOR_MATERIAL)?,
            self.clad.build(CLAD_MATERIAL)?,
        ];

        let h = dims.pitch / 2.0;
        let cylinder = |r: f64| SurfaceKind::ZCylinder { x0: 0.0, y0: 0.0, r };
        let mut geometry = Geometry::new();
        let surfaces = [
            (1, cylinder(dims.fuel_outer_radius), BoundaryType::Transmission),
            (2, cylinder(dims.clad_inner_radius), BoundaryType::Transmission),
            (3, cylinder(dims.clad_outer_radius), BoundaryType::Transmission),
            (4, SurfaceKind::XPlane { x0: -h }, BoundaryType::Reflective),
            (5, SurfaceKind::XPlane { x0: h }, BoundaryType::Reflective),
            (6, SurfaceKind::YPlane { y0: -h }, BoundaryType::Reflective),
            (7, SurfaceKind::YPlane { y0: h }, BoundaryType::Reflective),
        ];
        for (id, kind, boundary) in surfaces {
            geometry.add_surface(Surface::new(SurfaceId(id), kind)?.with_boundary(boundary))?;
        }
        let below = |id| Region::below(SurfaceId(id));
        let above = |id| Region::above(SurfaceId(id));

        geometry.add_cell(Cell::new(FUEL_CELL, "fuel", below(1), Fill::Material(FUEL_MATERIAL)))?;
        geometry.add_cell(Cell::new(GAP_CELL, "gap", above(1) & below(2), Fill::Void))?;
        geometry.add_cell(Cell::new(
            CLAD_CELL,
            "clad",
            above(2) & below(3),
            Fill::Material(CLAD_MATERIAL),
        ))?;
        geometry.add_cell(Cell::new(
            MODERATOR_CELL,
            "moderator",
            above(3) & above(4) & below(5) & above(6) & below(7),
            Fill::Material(MODERATOR_MATERIAL),
        ))?;

        let [x, y, z] = self.source.position;
        let energy = Discrete::new(
            self.source.energies_ev.clone(),
            self.source.probabilities.clone(),
        )?;
        let settings = Settings {
            run_mode: self.run.mode,
            batches: self.run.batches,
            inactive: self.run.inactive,
            particles: self.run.particles,
            seed: self.run.seed,
            source: Source::point(DVec3::new(x, y, z), energy),
            tally_report: true,
        };

        let tally = self
            .tally
            .scores
            .iter()
            .fold(Tally::new(TallyId(1), &self.tally.name), |t, s| t.with_score(s))
            .with_filter(TallyFilter {
                id: FilterId(1),
                kind: FilterKind::Cell(vec![FUEL_CELL]),
            });

        let model = Model {
            materials,
            geometry,
            settings,
            tallies: vec![tally],
            cross_sections: self.cross_sections.clone(),
        };
        model.validate()?;
        tracing::info!(
            cells = model.geometry.cells().len(),
            surfaces = model.geometry.surfaces().len(),
            "pin-cell model built"
        );
        Ok(model)
    }
}
