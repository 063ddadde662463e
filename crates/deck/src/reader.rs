use crate::error::DeckError;
use crate::xml::{Element, parse};
use crate::{GEOMETRY_FILE, MATERIALS_FILE, SETTINGS_FILE, TALLIES_FILE};
use pincell_common::{CellId, FilterId, MaterialId, SurfaceId, TallyId, UniverseId};
use pincell_model::{
    BoundaryType, Cell, DensityUnit, Discrete, FilterKind, Fill, Geometry, Material, Model,
    Region, RunMode, Settings, Source, SpatialDistribution, Surface, SurfaceKind, Tally,
    TallyFilter,
};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Parse a deck directory back into a model.
///
/// Materials come back in expanded (nuclide-only) form.
pub fn read_deck(dir: impl AsRef<Path>) -> Result<Model, DeckError> {
    let dir = dir.as_ref();
    let _span = tracing::info_span!("read_deck", dir = %dir.display()).entered();
    let load = |name: &str| -> Result<Doc, DeckError> {
        let text = std::fs::read_to_string(dir.join(name))?;
        Ok(Doc {
            file: name.to_string(),
            root: parse(&text)?,
        })
    };

    let materials_doc = load(MATERIALS_FILE)?;
    let materials = read_materials(&materials_doc)?;
    let cross_sections = read_cross_sections(&materials_doc)?;
    let geometry = read_geometry(&load(GEOMETRY_FILE)?)?;
    let settings = read_settings(&load(SETTINGS_FILE)?)?;
    let tallies = read_tallies(&load(TALLIES_FILE)?)?;

    tracing::debug!(
        materials = materials.len(),
        cells = geometry.cells().len(),
        tallies = tallies.len(),
        "deck parsed"
    );
    Ok(Model {
        materials,
        geometry,
        settings,
        tallies,
        cross_sections,
    })
}

/// A parsed file, kept with its name for error messages.
struct Doc {
    file: String,
    root: Element,
}

impl Doc {
    fn root(&self, expected: &str) -> Result<&Element, DeckError> {
        if self.root.name != expected {
            return Err(DeckError::UnexpectedRoot {
                file: self.file.clone(),
                expected: expected.into(),
                found: self.root.name.clone(),
            });
        }
        Ok(&self.root)
    }

    fn attr<'a>(&self, elem: &'a Element, key: &str) -> Result<&'a str, DeckError> {
        elem.attr(key).ok_or_else(|| DeckError::MissingAttribute {
            file: self.file.clone(),
            element: elem.name.clone(),
            attribute: key.into(),
        })
    }

    fn child<'a>(&self, elem: &'a Element, name: &str) -> Result<&'a Element, DeckError> {
        elem.child(name).ok_or_else(|| DeckError::MissingElement {
            file: self.file.clone(),
            element: format!("{}/{}", elem.name, name),
        })
    }

    fn child_text<'a>(&self, elem: &'a Element, name: &str) -> Result<&'a str, DeckError> {
        Ok(self.child(elem, name)?.text.as_str())
    }

    fn value<T: FromStr>(&self, elem: &Element, raw: &str) -> Result<T, DeckError> {
        raw.trim().parse().map_err(|_| self.invalid(elem, raw))
    }

    fn list<T: FromStr>(&self, elem: &Element, raw: &str) -> Result<Vec<T>, DeckError> {
        raw.split_whitespace()
            .map(|tok| tok.parse().map_err(|_| self.invalid(elem, raw)))
            .collect()
    }

    fn invalid(&self, elem: &Element, raw: &str) -> DeckError {
        DeckError::InvalidValue {
            file: self.file.clone(),
            element: elem.name.clone(),
            value: raw.to_string(),
        }
    }
}

fn read_materials(doc: &Doc) -> Result<Vec<Material>, DeckError> {
    let root = doc.root("materials")?;
    let mut out = Vec::new();
    for elem in root.children_named("material") {
        let id: u32 = doc.value(elem, doc.attr(elem, "id")?)?;
        let mut m = Material::new(MaterialId(id), elem.attr("name").unwrap_or_default());
        let density = doc.child(elem, "density")?;
        let units = DensityUnit::from_str(doc.attr(density, "units")?)?;
        m.set_density(units, doc.value(density, doc.attr(density, "value")?)?)?;
        for nuc in elem.children_named("nuclide") {
            let fraction: f64 = doc.value(nuc, doc.attr(nuc, "ao")?)?;
            m.add_nuclide(doc.attr(nuc, "name")?, fraction);
        }
        for sab in elem.children_named("sab") {
            m.add_s_alpha_beta(doc.attr(sab, "name")?);
        }
        out.push(m);
    }
    Ok(out)
}

fn read_cross_sections(doc: &Doc) -> Result<Option<PathBuf>, DeckError> {
    let root = doc.root("materials")?;
    Ok(root
        .child("cross_sections")
        .map(|e| PathBuf::from(e.text.trim())))
}

fn read_geometry(doc: &Doc) -> Result<Geometry, DeckError> {
    let root = doc.root("geometry")?;
    let mut geometry = Geometry::new();
    for elem in root.children_named("surface") {
        let id: u32 = doc.value(elem, doc.attr(elem, "id")?)?;
        let coeffs: Vec<f64> = doc.list(elem, doc.attr(elem, "coeffs")?)?;
        let kind = SurfaceKind::from_type_coeffs(doc.attr(elem, "type")?, &coeffs)?;
        let boundary = match elem.attr("boundary") {
            Some(b) => BoundaryType::from_str(b)?,
            None => BoundaryType::Transmission,
        };
        geometry.add_surface(Surface::new(SurfaceId(id), kind)?.with_boundary(boundary))?;
    }
    for elem in root.children_named("cell") {
        let id: u32 = doc.value(elem, doc.attr(elem, "id")?)?;
        let fill = match doc.attr(elem, "material")? {
            "void" => Fill::Void,
            raw => Fill::Material(MaterialId(doc.value(elem, raw)?)),
        };
        let region = elem.attr("region").map(Region::from_str).transpose()?;
        let universe = match elem.attr("universe") {
            Some(raw) => UniverseId(doc.value(elem, raw)?),
            None => Geometry::ROOT_UNIVERSE,
        };
        geometry.add_cell(Cell {
            id: CellId(id),
            name: elem.attr("name").unwrap_or_default().to_string(),
            region,
            fill,
            universe,
        })?;
    }
    Ok(geometry)
}

fn read_settings(doc: &Doc) -> Result<Settings, DeckError> {
    let root = doc.root("settings")?;
    let run_mode = RunMode::from_str(doc.child_text(root, "run_mode")?.trim())?;
    let particles = doc.value(root, doc.child_text(root, "particles")?)?;
    let batches = doc.value(root, doc.child_text(root, "batches")?)?;
    let inactive = match root.child("inactive") {
        Some(e) => doc.value(e, &e.text)?,
        None => 0,
    };
    let seed = root
        .child("seed")
        .map(|e| doc.value(e, &e.text))
        .transpose()?;

    let source_elem = doc.child(root, "source")?;
    let strength = match source_elem.attr("strength") {
        Some(raw) => doc.value(source_elem, raw)?,
        None => 1.0,
    };
    let space_elem = doc.child(source_elem, "space")?;
    let space_params: Vec<f64> =
        doc.list(space_elem, &doc.child(space_elem, "parameters")?.text)?;
    let space = SpatialDistribution::from_type_parameters(doc.attr(space_elem, "type")?, &space_params)?;

    let energy_elem = doc.child(source_elem, "energy")?;
    let energy_type = doc.attr(energy_elem, "type")?;
    if energy_type != "discrete" {
        return Err(doc.invalid(energy_elem, energy_type));
    }
    let energy_params: Vec<f64> =
        doc.list(energy_elem, &doc.child(energy_elem, "parameters")?.text)?;
    let energy = Discrete::from_parameters(&energy_params)?;

    let tally_report = root
        .child("output")
        .and_then(|o| o.child("tallies"))
        .is_some_and(|t| t.text.trim() == "true");

    Ok(Settings {
        run_mode,
        batches,
        inactive,
        particles,
        seed,
        source: Source {
            space,
            energy,
            strength,
        },
        tally_report,
    })
}

fn read_tallies(doc: &Doc) -> Result<Vec<Tally>, DeckError> {
    let root = doc.root("tallies")?;
    let mut filters = BTreeMap::new();
    for elem in root.children_named("filter") {
        let id: u32 = doc.value(elem, doc.attr(elem, "id")?)?;
        let type_name = doc.attr(elem, "type")?;
        let bins: Vec<u32> = doc.list(elem, &doc.child(elem, "bins")?.text)?;
        let kind = FilterKind::from_type_bins(type_name, &bins)
            .ok_or_else(|| doc.invalid(elem, type_name))?;
        filters.insert(
            FilterId(id),
            TallyFilter {
                id: FilterId(id),
                kind,
            },
        );
    }

    let mut out = Vec::new();
    for elem in root.children_named("tally") {
        let id: u32 = doc.value(elem, doc.attr(elem, "id")?)?;
        let mut tally = Tally::new(TallyId(id), elem.attr("name").unwrap_or_default());
        if let Some(f) = elem.child("filters") {
            for fid in doc.list::<u32>(f, &f.text)? {
                let filter = filters
                    .get(&FilterId(fid))
                    .ok_or_else(|| doc.invalid(f, &f.text))?;
                tally.filters.push(filter.clone());
            }
        }
        if let Some(n) = elem.child("nuclides") {
            tally.nuclides = n.text.split_whitespace().map(String::from).collect();
        }
        tally.scores = doc
            .child(elem, "scores")?
            .text
            .split_whitespace()
            .map(String::from)
            .collect();
        out.push(tally);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::write_deck;
    use pincell_model::PinCellConfig;

    #[test]
    fn export_then_import_is_identity() {
        let tmp = tempfile::tempdir().unwrap();
        let model = PinCellConfig::default().build_model().unwrap();
        write_deck(&model, tmp.path()).unwrap();

        let read = read_deck(tmp.path()).unwrap();
        let expected = model.expanded();
        assert_eq!(read.materials, expected.materials);
        assert_eq!(read.geometry, expected.geometry);
        assert_eq!(read.settings, expected.settings);
        assert_eq!(read.tallies, expected.tallies);
        read.validate().unwrap();
    }

    #[test]
    fn round_trip_with_seed_and_fixed_source() {
        let tmp = tempfile::tempdir().unwrap();
        let mut config = PinCellConfig::default();
        config.run.mode = RunMode::FixedSource;
        config.run.inactive = 0;
        config.run.seed = Some(12345);
        config.source.energies_ev = vec![1.0e6, 2.5e6];
        config.source.probabilities = vec![0.3, 0.7];
        let model = config.build_model().unwrap();
        write_deck(&model, tmp.path()).unwrap();
        assert_eq!(read_deck(tmp.path()).unwrap(), model.expanded());
    }

    #[test]
    fn cross_section_path_round_trips() {
        let tmp = tempfile::tempdir().unwrap();
        let mut config = PinCellConfig::default();
        config.cross_sections = Some(PathBuf::from("/data/endfb-vii.1-hdf5/cross_sections.xml"));
        let model = config.build_model().unwrap();
        write_deck(&model, tmp.path()).unwrap();
        let read = read_deck(tmp.path()).unwrap();
        assert_eq!(read.cross_sections, config.cross_sections);
        assert_eq!(read, model.expanded());
    }

    #[test]
    fn wrong_root_reported() {
        let tmp = tempfile::tempdir().unwrap();
        let model = PinCellConfig::default().build_model().unwrap();
        write_deck(&model, tmp.path()).unwrap();
        std::fs::write(tmp.path().join(TALLIES_FILE), "<talies/>").unwrap();
        assert!(matches!(
            read_deck(tmp.path()),
            Err(DeckError::UnexpectedRoot { .. })
        ));
    }

    #[test]
    fn missing_attribute_reported() {
        let doc = Doc {
            file: MATERIALS_FILE.into(),
            root: parse("<materials><material id=\"1\"><density value=\"1\"/></material></materials>")
                .unwrap(),
        };
        match read_materials(&doc) {
            Err(DeckError::MissingAttribute { attribute, .. }) => assert_eq!(attribute, "units"),
            other => panic!("expected MissingAttribute, got {other:?}"),
        }
    }

    #[test]
    fn bad_number_reported() {
        let doc = Doc {
            file: SETTINGS_FILE.into(),
            root: parse(
                "<settings><run_mode>eigenvalue</run_mode><particles>many</particles>\
                 <batches>10</batches></settings>",
            )
            .unwrap(),
        };
        assert!(matches!(
            read_settings(&doc),
            Err(DeckError::InvalidValue { value, .. }) if value == "many"
        ));
    }

    #[test]
    fn unknown_filter_reference_rejected() {
        let doc = Doc {
            file: TALLIES_FILE.into(),
            root: parse(
                "<tallies><tally id=\"1\" name=\"t\"><filters>3</filters>\
                 <scores>flux</scores></tally></tallies>",
            )
            .unwrap(),
        };
        assert!(read_tallies(&doc).is_err());
    }
}
