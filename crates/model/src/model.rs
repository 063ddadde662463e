use crate::error::{ModelError, ModelResult};
use crate::geometry::{Fill, Geometry};
use crate::material::Material;
use crate::settings::Settings;
use crate::tally::{FilterKind, Tally, TallyFilter};
use pincell_common::MaterialId;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;

/// Everything the engine needs for one run.
///
/// Construction is unchecked; call [`Model::validate`] before exporting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Model {
    pub materials: Vec<Material>,
    pub geometry: Geometry,
    pub settings: Settings,
    pub tallies: Vec<Tally>,
    /// Cross-section library index written into `materials.xml`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cross_sections: Option<PathBuf>,
}

impl Model {
    pub fn material(&self, id: MaterialId) -> Option<&Material> {
        self.materials.iter().find(|m| m.id == id)
    }

    pub fn tally_by_name(&self, name: &str) -> Option<&Tally> {
        self.tallies.iter().find(|t| t.name == name)
    }

    /// The model as the engine will see it: materials hold nuclides only.
    pub fn expanded(&self) -> Model {
        Model {
            materials: self.materials.iter().map(Material::expanded).collect(),
            ..self.clone()
        }
    }

    /// Check cross references and run parameters.
    pub fn validate(&self) -> ModelResult<()> {
        let _span = tracing::debug_span!("validate_model").entered();

        let mut material_ids = HashSet::new();
        for m in &self.materials {
            if !material_ids.insert(m.id) {
                return Err(ModelError::DuplicateId {
                    kind: "material",
                    id: m.id.get(),
                });
            }
            if m.density().is_none() {
                return Err(ModelError::MissingDensity(m.id.get()));
            }
        }

        for cell in self.geometry.cells().values() {
            if let Fill::Material(id) = cell.fill {
                if !material_ids.contains(&id) {
                    return Err(ModelError::MissingMaterial {
                        cell: cell.id.get(),
                        material: id.get(),
                    });
                }
            }
        }
        self.geometry.check_references()?;

        let mut tally_ids = HashSet::new();
        let mut tally_names = HashSet::new();
        let mut filter_ids = HashSet::new();
        for tally in &self.tallies {
            if !tally_ids.insert(tally.id) {
                return Err(ModelError::DuplicateId {
                    kind: "tally",
                    id: tally.id.get(),
                });
            }
            if !tally_names.insert(tally.name.as_str()) {
                return Err(ModelError::DuplicateTallyName(tally.name.clone()));
            }
            for filter in &tally.filters {
                // A filter may be shared between tallies only if it is identical.
                if !filter_ids.insert(filter.id) && !self.filter_is_shared(filter) {
                    return Err(ModelError::DuplicateId {
                        kind: "filter",
                        id: filter.id.get(),
                    });
                }
                self.check_filter_bins(tally, &filter.kind)?;
            }
        }

        self.settings.validate()?;
        tracing::debug!(
            materials = self.materials.len(),
            cells = self.geometry.cells().len(),
            tallies = self.tallies.len(),
            "model valid"
        );
        Ok(())
    }

    fn filter_is_shared(&self, filter: &TallyFilter) -> bool {
        self.tallies
            .iter()
            .flat_map(|t| &t.filters)
            .filter(|f| f.id == filter.id)
            .all(|f| f == filter)
    }

    fn check_filter_bins(&self, tally: &Tally, kind: &FilterKind) -> ModelResult<()> {
        match kind {
            FilterKind::Cell(cells) => {
                if let Some(c) = cells.iter().find(|c| self.geometry.cell(**c).is_none()) {
                    return Err(ModelError::DanglingFilter {
                        tally: tally.id.get(),
                        kind: "cell",
                        id: c.get(),
                    });
                }
            }
            FilterKind::Material(mats) => {
                if let Some(m) = mats.iter().find(|m| self.material(**m).is_none()) {
                    return Err(ModelError::DanglingFilter {
                        tally: tally.id.get(),
                        kind: "material",
                        id: m.get(),
                    });
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PinCellConfig;
    use crate::geometry::Cell;
    use crate::region::Region;
    use pincell_common::{CellId, FilterId, SurfaceId, TallyId};

    fn model() -> Model {
        PinCellConfig::default().build_model().unwrap()
    }

    #[test]
    fn pin_cell_model_is_valid() {
        model().validate().unwrap();
    }

    #[test]
    fn duplicate_material_id_rejected() {
        let mut m = model();
        let copy = m.materials[0].clone();
        m.materials.push(copy);
        assert!(matches!(
            m.validate(),
            Err(ModelError::DuplicateId { kind: "material", .. })
        ));
    }

    #[test]
    fn cell_with_missing_material_rejected() {
        let mut m = model();
        m.geometry
            .add_cell(Cell::new(
                CellId(50),
                "orphan",
                Region::below(SurfaceId(1)),
                Fill::Material(MaterialId(42)),
            ))
            .unwrap();
        assert!(matches!(
            m.validate(),
            Err(ModelError::MissingMaterial { cell: 50, material: 42 })
        ));
    }

    #[test]
    fn dangling_tally_filter_rejected() {
        let mut m = model();
        m.tallies.push(
            Tally::new(TallyId(9), "ghost")
                .with_filter(TallyFilter {
                    id: FilterId(9),
                    kind: FilterKind::Cell(vec![CellId(77)]),
                })
                .with_score("flux"),
        );
        assert!(matches!(
            m.validate(),
            Err(ModelError::DanglingFilter { kind: "cell", id: 77, .. })
        ));
    }

    #[test]
    fn duplicate_tally_name_rejected() {
        let mut m = model();
        let mut copy = m.tallies[0].clone();
        copy.id = TallyId(2);
        m.tallies.push(copy);
        assert!(matches!(m.validate(), Err(ModelError::DuplicateTallyName(_))));
    }

    #[test]
    fn identical_shared_filter_allowed() {
        let mut m = model();
        let mut copy = m.tallies[0].clone();
        copy.id = TallyId(2);
        copy.name = "capture_again".into();
        m.tallies.push(copy);
        m.validate().unwrap();
    }

    #[test]
    fn expanded_model_has_only_nuclides() {
        let m = model().expanded();
        let water = m
            .materials
            .iter()
            .find(|mat| mat.name == "Water")
            .unwrap();
        assert_eq!(water.expanded_nuclides().len(), water.components().len());
    }

    #[test]
    fn lookup_by_name() {
        let m = model();
        assert!(m.tally_by_name("capture_reactions").is_some());
        assert!(m.tally_by_name("missing").is_none());
    }
}
