use crate::error::DeckError;
use crate::manifest::DeckManifest;
use crate::xml::XmlWriter;
use crate::{GEOMETRY_FILE, MATERIALS_FILE, SETTINGS_FILE, TALLIES_FILE};
use pincell_model::{BoundaryType, Fill, Model, RunMode, TallyFilter};
use std::collections::BTreeMap;
use std::path::Path;

/// Validate `model`, write the four XML files into `dir` and record their
/// hashes in the manifest.
pub fn write_deck(model: &Model, dir: impl AsRef<Path>) -> Result<DeckManifest, DeckError> {
    let dir = dir.as_ref();
    let _span = tracing::info_span!("write_deck", dir = %dir.display()).entered();
    model.validate()?;
    std::fs::create_dir_all(dir)?;

    let files = [
        (MATERIALS_FILE, materials_xml(model)?),
        (GEOMETRY_FILE, geometry_xml(model)?),
        (SETTINGS_FILE, settings_xml(model)?),
        (TALLIES_FILE, tallies_xml(model)?),
    ];

    let mut manifest = DeckManifest::new();
    for (name, contents) in &files {
        std::fs::write(dir.join(name), contents)?;
        manifest.record(name, contents.as_bytes());
        tracing::debug!(file = name, bytes = contents.len(), "wrote deck file");
    }
    manifest.save(dir)?;
    tracing::info!(files = files.len(), "deck written");
    Ok(manifest)
}

fn join<T: ToString>(values: impl IntoIterator<Item = T>) -> String {
    values
        .into_iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn materials_xml(model: &Model) -> Result<String, DeckError> {
    let mut w = XmlWriter::new()?;
    w.start("materials", &[])?;
    if let Some(path) = &model.cross_sections {
        w.text_element("cross_sections", &path.to_string_lossy())?;
    }
    for m in &model.materials {
        let id = m.id.to_string();
        w.start("material", &[("id", id.as_str()), ("name", m.name.as_str())])?;
        if let Some(density) = m.density() {
            let value = density.value.to_string();
            w.empty("density", &[("units", density.units.as_str()), ("value", value.as_str())])?;
        }
        for (name, fraction) in m.expanded_nuclides() {
            let ao = fraction.to_string();
            w.empty("nuclide", &[("name", name.as_str()), ("ao", ao.as_str())])?;
        }
        for table in m.s_alpha_beta() {
            w.empty("sab", &[("name", table.as_str())])?;
        }
        w.end("material")?;
    }
    w.end("materials")?;
    w.finish()
}

pub fn geometry_xml(model: &Model) -> Result<String, DeckError> {
    let mut w = XmlWriter::new()?;
    w.start("geometry", &[])?;
    for cell in model.geometry.cells().values() {
        let id = cell.id.to_string();
        let material = match cell.fill {
            Fill::Material(m) => m.to_string(),
            Fill::Void => "void".to_string(),
        };
        let universe = cell.universe.to_string();
        let region = cell.region.as_ref().map(|r| r.to_string());
        let mut attrs = vec![("id", id.as_str()), ("material", material.as_str())];
        if !cell.name.is_empty() {
            attrs.push(("name", cell.name.as_str()));
        }
        if let Some(region) = &region {
            attrs.push(("region", region.as_str()));
        }
        attrs.push(("universe", universe.as_str()));
        w.empty("cell", &attrs)?;
    }
    for surface in model.geometry.surfaces().values() {
        let id = surface.id.to_string();
        let coeffs = join(surface.kind.coeffs());
        let mut attrs = vec![
            ("id", id.as_str()),
            ("type", surface.kind.type_name()),
            ("coeffs", coeffs.as_str()),
        ];
        if surface.boundary != BoundaryType::Transmission {
            attrs.push(("boundary", surface.boundary.as_str()));
        }
        w.empty("surface", &attrs)?;
    }
    w.end("geometry")?;
    w.finish()
}

pub fn settings_xml(model: &Model) -> Result<String, DeckError> {
    let s = &model.settings;
    let mut w = XmlWriter::new()?;
    w.start("settings", &[])?;
    w.text_element("run_mode", s.run_mode.as_str())?;
    w.text_element("particles", &s.particles.to_string())?;
    w.text_element("batches", &s.batches.to_string())?;
    if s.run_mode == RunMode::Eigenvalue {
        w.text_element("inactive", &s.inactive.to_string())?;
    }
    if let Some(seed) = s.seed {
        w.text_element("seed", &seed.to_string())?;
    }

    let strength = s.source.strength.to_string();
    w.start("source", &[("strength", strength.as_str())])?;
    w.start("space", &[("type", s.source.space.type_name())])?;
    w.text_element("parameters", &join(s.source.space.parameters()))?;
    w.end("space")?;
    w.start("energy", &[("type", "discrete")])?;
    w.text_element("parameters", &join(s.source.energy.parameters()))?;
    w.end("energy")?;
    w.end("source")?;

    if s.tally_report {
        w.start("output", &[])?;
        w.text_element("tallies", "true")?;
        w.end("output")?;
    }
    w.end("settings")?;
    w.finish()
}

pub fn tallies_xml(model: &Model) -> Result<String, DeckError> {
    // Filters shared between tallies are written once.
    let filters: BTreeMap<_, &TallyFilter> = model
        .tallies
        .iter()
        .flat_map(|t| &t.filters)
        .map(|f| (f.id, f))
        .collect();

    let mut w = XmlWriter::new()?;
    w.start("tallies", &[])?;
    for filter in filters.values() {
        let id = filter.id.to_string();
        w.start("filter", &[("id", id.as_str()), ("type", filter.kind.type_name())])?;
        w.text_element("bins", &join(filter.kind.bins()))?;
        w.end("filter")?;
    }
    for tally in &model.tallies {
        let id = tally.id.to_string();
        w.start("tally", &[("id", id.as_str()), ("name", tally.name.as_str())])?;
        if !tally.filters.is_empty() {
            w.text_element("filters", &join(tally.filters.iter().map(|f| f.id)))?;
        }
        if !tally.nuclides.is_empty() {
            w.text_element("nuclides", &tally.nuclides.join(" "))?;
        }
        w.text_element("scores", &tally.scores.join(" "))?;
        w.end("tally")?;
    }
    w.end("tallies")?;
    w.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pincell_model::PinCellConfig;

    fn model() -> Model {
        PinCellConfig::default().build_model().unwrap()
    }

    #[test]
    fn materials_carry_expanded_nuclides() {
        let xml = materials_xml(&model()).unwrap();
        assert!(xml.contains(r#"<material id="1" name="U-238">"#));
        assert!(xml.contains(r#"<density units="g/cm3" value="18.95"/>"#));
        assert!(xml.contains(r#"<nuclide name="U238" ao="1"/>"#));
        assert!(xml.contains(r#"<nuclide name="Zr90" ao="0.5145"/>"#));
        assert!(xml.contains(r#"<sab name="c_H_in_H2O"/>"#));
        assert!(!xml.contains("element"));
    }

    #[test]
    fn cross_section_path_written_only_when_set() {
        let mut m = model();
        assert!(!materials_xml(&m).unwrap().contains("cross_sections"));
        m.cross_sections = Some("/xs/cross_sections.xml".into());
        let xml = materials_xml(&m).unwrap();
        assert!(xml.contains("\n  <cross_sections>/xs/cross_sections.xml</cross_sections>\n"));
    }

    #[test]
    fn geometry_regions_and_boundaries() {
        let xml = geometry_xml(&model()).unwrap();
        assert!(xml.contains(r#"<cell id="1" material="1" name="fuel" region="-1" universe="1"/>"#));
        assert!(xml.contains(r#"material="void" name="gap" region="(+1 -2)""#));
        assert!(xml.contains(r#"region="(+3 +4 -5 +6 -7)""#));
        assert!(xml.contains(r#"<surface id="1" type="z-cylinder" coeffs="0 0 0.42"/>"#));
        assert!(xml.contains(r#"<surface id="5" type="x-plane" coeffs="0.63" boundary="reflective"/>"#));
    }

    #[test]
    fn settings_run_parameters_and_source() {
        let xml = settings_xml(&model()).unwrap();
        assert!(xml.contains("<run_mode>eigenvalue</run_mode>"));
        assert!(xml.contains("<particles>1000</particles>"));
        assert!(xml.contains("<batches>100</batches>"));
        assert!(xml.contains("<inactive>10</inactive>"));
        assert!(xml.contains("<parameters>0 0 0</parameters>"));
        assert!(xml.contains("<parameters>2000000 1</parameters>"));
        assert!(xml.contains("<tallies>true</tallies>"));
        assert!(!xml.contains("<seed>"));
    }

    #[test]
    fn fixed_source_omits_inactive() {
        let mut m = model();
        m.settings.run_mode = RunMode::FixedSource;
        m.settings.inactive = 0;
        let xml = settings_xml(&m).unwrap();
        assert!(xml.contains("<run_mode>fixed source</run_mode>"));
        assert!(!xml.contains("<inactive>"));
    }

    #[test]
    fn tallies_reference_filters() {
        let xml = tallies_xml(&model()).unwrap();
        assert!(xml.contains(r#"<filter id="1" type="cell">"#));
        assert!(xml.contains("<bins>1</bins>"));
        assert!(xml.contains(r#"<tally id="1" name="capture_reactions">"#));
        assert!(xml.contains("<filters>1</filters>"));
        assert!(xml.contains("<scores>(n,gamma)</scores>"));
    }

    #[test]
    fn shared_filter_written_once() {
        let mut m = model();
        let mut second = m.tallies[0].clone();
        second.id = pincell_common::TallyId(2);
        second.name = "capture_copy".into();
        m.tallies.push(second);
        let xml = tallies_xml(&m).unwrap();
        assert_eq!(xml.matches("<filter id=").count(), 1);
        assert_eq!(xml.matches("<tally id=").count(), 2);
    }

    #[test]
    fn write_deck_creates_files() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("deck");
        let manifest = write_deck(&model(), &dir).unwrap();
        for name in crate::DECK_FILES {
            assert!(dir.join(name).is_file(), "{name} missing");
        }
        assert_eq!(manifest.entries.len(), 4);
        assert!(dir.join(crate::MANIFEST_FILE).is_file());
    }

    #[test]
    fn write_deck_refuses_invalid_model() {
        let tmp = tempfile::tempdir().unwrap();
        let mut m = model();
        m.settings.batches = 0;
        assert!(matches!(
            write_deck(&m, tmp.path()),
            Err(DeckError::Model(_))
        ));
        assert!(!tmp.path().join(MATERIALS_FILE).exists());
    }
}
