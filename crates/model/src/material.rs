use crate::error::{ModelError, ModelResult};
use crate::nuclides::natural_isotopes;
use pincell_common::MaterialId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One constituent of a material, as added by the user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Component {
    /// A single nuclide such as `U238`, with its atom fraction.
    Nuclide { name: String, fraction: f64 },
    /// A natural element such as `Zr`, expanded on export.
    Element { symbol: String, fraction: f64 },
}

/// Density units accepted by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DensityUnit {
    GramsPerCm3,
    KilogramsPerM3,
    AtomsPerBarnCm,
}

impl DensityUnit {
    pub fn as_str(self) -> &'static str {
        match self {
            DensityUnit::GramsPerCm3 => "g/cm3",
            DensityUnit::KilogramsPerM3 => "kg/m3",
            DensityUnit::AtomsPerBarnCm => "atom/b-cm",
        }
    }
}

impl fmt::Display for DensityUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DensityUnit {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "g/cm3" | "g/cc" => Ok(DensityUnit::GramsPerCm3),
            "kg/m3" => Ok(DensityUnit::KilogramsPerM3),
            "atom/b-cm" => Ok(DensityUnit::AtomsPerBarnCm),
            other => Err(ModelError::UnknownDensityUnit(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Density {
    pub value: f64,
    pub units: DensityUnit,
}

/// A material: composition, density and thermal scattering tables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Material {
    pub id: MaterialId,
    pub name: String,
    components: Vec<Component>,
    density: Option<Density>,
    s_alpha_beta: Vec<String>,
}

impl Material {
    pub fn new(id: MaterialId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            components: Vec::new(),
            density: None,
            s_alpha_beta: Vec::new(),
        }
    }

    pub fn add_nuclide(&mut self, name: impl Into<String>, fraction: f64) {
        self.components.push(Component::Nuclide {
            name: name.into(),
            fraction,
        });
    }

    /// Add a natural element. Fails if its isotopic composition is unknown.
    pub fn add_element(&mut self, symbol: impl Into<String>, fraction: f64) -> ModelResult<()> {
        let symbol = symbol.into();
        if natural_isotopes(&symbol).is_none() {
            return Err(ModelError::UnknownElement(symbol));
        }
        self.components.push(Component::Element { symbol, fraction });
        Ok(())
    }

    pub fn set_density(&mut self, units: DensityUnit, value: f64) -> ModelResult<()> {
        if !(value.is_finite() && value > 0.0) {
            return Err(ModelError::InvalidDensity {
                value,
                units: units.to_string(),
            });
        }
        self.density = Some(Density { value, units });
        Ok(())
    }

    /// Attach a thermal scattering table such as `c_H_in_H2O`.
    pub fn add_s_alpha_beta(&mut self, table: impl Into<String>) {
        self.s_alpha_beta.push(table.into());
    }

    pub fn components(&self) -> &[Component] {
        &self.components
    }

    pub fn density(&self) -> Option<Density> {
        self.density
    }

    pub fn s_alpha_beta(&self) -> &[String] {
        &self.s_alpha_beta
    }

    /// Composition as nuclide atom fractions, elements expanded by natural
    /// abundance. Repeated nuclides are merged in first-seen order.
    pub fn expanded_nuclides(&self) -> Vec<(String, f64)> {
        let mut out: Vec<(String, f64)> = Vec::new();
        let mut push = |name: &str, fraction: f64| {
            match out.iter_mut().find(|(n, _)| n == name) {
                Some((_, f)) => *f += fraction,
                None => out.push((name.to_string(), fraction)),
            }
        };
        for component in &self.components {
            match component {
                Component::Nuclide { name, fraction } => push(name, *fraction),
                Component::Element { symbol, fraction } => {
                    // add_element guarantees the table entry exists
                    for (nuclide, abundance) in natural_isotopes(symbol).unwrap_or(&[]) {
                        push(nuclide, fraction * abundance);
                    }
                }
            }
        }
        out
    }

    /// The same material with every element replaced by its nuclides.
    pub fn expanded(&self) -> Material {
        Material {
            components: self
                .expanded_nuclides()
                .into_iter()
                .map(|(name, fraction)| Component::Nuclide { name, fraction })
                .collect(),
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn water() -> Material {
        let mut m = Material::new(MaterialId(2), "Water");
        m.add_element("H", 2.0).unwrap();
        m.add_element("O", 1.0).unwrap();
        m.set_density(DensityUnit::GramsPerCm3, 1.0).unwrap();
        m.add_s_alpha_beta("c_H_in_H2O");
        m
    }

    #[test]
    fn element_expands_by_abundance() {
        let nuclides = water().expanded_nuclides();
        let names: Vec<&str> = nuclides.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, ["H1", "H2", "O16", "O17", "O18"]);
        let h1 = nuclides[0].1;
        assert!((h1 - 2.0 * 0.999_844_26).abs() < 1e-12);
        let total: f64 = nuclides.iter().map(|(_, f)| f).sum();
        assert!((total - 3.0).abs() < 1e-9);
    }

    #[test]
    fn nuclide_passes_through() {
        let mut m = Material::new(MaterialId(1), "U-238");
        m.add_nuclide("U238", 1.0);
        assert_eq!(m.expanded_nuclides(), vec![("U238".to_string(), 1.0)]);
    }

    #[test]
    fn repeated_nuclides_merge() {
        let mut m = Material::new(MaterialId(1), "mix");
        m.add_nuclide("U238", 0.5);
        m.add_element("U", 1.0).unwrap();
        let nuclides = m.expanded_nuclides();
        assert_eq!(nuclides.len(), 3);
        assert_eq!(nuclides[0].0, "U238");
        assert!((nuclides[0].1 - (0.5 + 0.992_742)).abs() < 1e-12);
    }

    #[test]
    fn unknown_element_rejected() {
        let mut m = Material::new(MaterialId(1), "bad");
        assert!(matches!(
            m.add_element("Qq", 1.0),
            Err(ModelError::UnknownElement(_))
        ));
    }

    #[test]
    fn non_positive_density_rejected() {
        let mut m = Material::new(MaterialId(1), "bad");
        assert!(m.set_density(DensityUnit::GramsPerCm3, 0.0).is_err());
        assert!(m.set_density(DensityUnit::GramsPerCm3, f64::NAN).is_err());
        assert!(m.density().is_none());
    }

    #[test]
    fn expanded_keeps_density_and_sab() {
        let w = water().expanded();
        assert!(w
            .components()
            .iter()
            .all(|c| matches!(c, Component::Nuclide { .. })));
        assert_eq!(w.s_alpha_beta(), ["c_H_in_H2O"]);
        assert_eq!(w.density().map(|d| d.value), Some(1.0));
    }

    #[test]
    fn density_unit_parse() {
        assert_eq!("g/cm3".parse::<DensityUnit>().unwrap(), DensityUnit::GramsPerCm3);
        assert!("furlong".parse::<DensityUnit>().is_err());
    }
}
