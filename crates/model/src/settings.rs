use crate::error::{ModelError, ModelResult};
use glam::DVec3;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Relative tolerance on the sum of discrete source probabilities.
const PROBABILITY_TOLERANCE: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RunMode {
    /// k-eigenvalue calculation with inactive batches for source convergence.
    #[default]
    Eigenvalue,
    FixedSource,
}

impl RunMode {
    /// Spelling used in `settings.xml`.
    pub fn as_str(self) -> &'static str {
        match self {
            RunMode::Eigenvalue => "eigenvalue",
            RunMode::FixedSource => "fixed source",
        }
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RunMode {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "eigenvalue" => Ok(RunMode::Eigenvalue),
            "fixed source" => Ok(RunMode::FixedSource),
            other => Err(ModelError::InvalidSettings(format!(
                "unknown run mode '{other}'"
            ))),
        }
    }
}

/// Where source particles are born.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum SpatialDistribution {
    Point(DVec3),
    /// Uniform over an axis-aligned box.
    Box { lower: DVec3, upper: DVec3 },
}

impl SpatialDistribution {
    /// Type name used in `settings.xml`.
    pub fn type_name(&self) -> &'static str {
        match self {
            SpatialDistribution::Point(_) => "point",
            SpatialDistribution::Box { .. } => "box",
        }
    }

    pub fn parameters(&self) -> Vec<f64> {
        match *self {
            SpatialDistribution::Point(p) => p.to_array().to_vec(),
            SpatialDistribution::Box { lower, upper } => {
                let mut v = lower.to_array().to_vec();
                v.extend_from_slice(&upper.to_array());
                v
            }
        }
    }

    pub fn from_type_parameters(type_name: &str, params: &[f64]) -> ModelResult<Self> {
        match (type_name, params) {
            ("point", [x, y, z]) => Ok(SpatialDistribution::Point(DVec3::new(*x, *y, *z))),
            ("box", [x0, y0, z0, x1, y1, z1]) => Ok(SpatialDistribution::Box {
                lower: DVec3::new(*x0, *y0, *z0),
                upper: DVec3::new(*x1, *y1, *z1),
            }),
            _ => Err(ModelError::InvalidSource(format!(
                "cannot build '{type_name}' space from {} parameters",
                params.len()
            ))),
        }
    }

    fn check(&self) -> ModelResult<()> {
        if self.parameters().iter().any(|v| !v.is_finite()) {
            return Err(ModelError::InvalidSource("non-finite position".into()));
        }
        if let SpatialDistribution::Box { lower, upper } = self {
            if lower.cmpgt(*upper).any() {
                return Err(ModelError::InvalidSource(format!(
                    "box lower corner {lower} exceeds upper corner {upper}"
                )));
            }
        }
        Ok(())
    }
}

/// Discrete distribution: `values[i]` with probability `probabilities[i]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Discrete {
    pub values: Vec<f64>,
    pub probabilities: Vec<f64>,
}

impl Discrete {
    pub fn new(values: Vec<f64>, probabilities: Vec<f64>) -> ModelResult<Self> {
        let d = Self {
            values,
            probabilities,
        };
        d.check()?;
        Ok(d)
    }

    /// A single value with probability one.
    pub fn single(value: f64) -> Self {
        Self {
            values: vec![value],
            probabilities: vec![1.0],
        }
    }

    /// Values followed by probabilities, as the engine lays them out.
    pub fn parameters(&self) -> Vec<f64> {
        self.values
            .iter()
            .chain(self.probabilities.iter())
            .copied()
            .collect()
    }

    pub fn from_parameters(params: &[f64]) -> ModelResult<Self> {
        if params.is_empty() || params.len() % 2 != 0 {
            return Err(ModelError::InvalidSource(format!(
                "discrete distribution needs an even, non-zero parameter count, got {}",
                params.len()
            )));
        }
        let (values, probabilities) = params.split_at(params.len() / 2);
        Self::new(values.to_vec(), probabilities.to_vec())
    }

    fn check(&self) -> ModelResult<()> {
        if self.values.is_empty() {
            return Err(ModelError::InvalidSource("empty discrete distribution".into()));
        }
        if self.values.len() != self.probabilities.len() {
            return Err(ModelError::InvalidSource(format!(
                "{} values but {} probabilities",
                self.values.len(),
                self.probabilities.len()
            )));
        }
        if self.probabilities.iter().any(|p| !(p.is_finite() && *p >= 0.0)) {
            return Err(ModelError::InvalidSource("negative probability".into()));
        }
        let total: f64 = self.probabilities.iter().sum();
        if (total - 1.0).abs() > PROBABILITY_TOLERANCE {
            return Err(ModelError::InvalidSource(format!(
                "probabilities sum to {total}, expected 1"
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    pub space: SpatialDistribution,
    /// Neutron energies in eV.
    pub energy: Discrete,
    pub strength: f64,
}

impl Source {
    pub fn point(position: DVec3, energy: Discrete) -> Self {
        Self {
            space: SpatialDistribution::Point(position),
            energy,
            strength: 1.0,
        }
    }

    pub fn validate(&self) -> ModelResult<()> {
        self.space.check()?;
        self.energy.check()?;
        if self.energy.values.iter().any(|e| !(e.is_finite() && *e > 0.0)) {
            return Err(ModelError::InvalidSource("energies must be positive".into()));
        }
        if !(self.strength.is_finite() && self.strength > 0.0) {
            return Err(ModelError::InvalidSource(format!(
                "strength must be positive, got {}",
                self.strength
            )));
        }
        Ok(())
    }
}

/// Run parameters for the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    pub run_mode: RunMode,
    pub batches: u32,
    pub inactive: u32,
    pub particles: u64,
    pub seed: Option<u64>,
    pub source: Source,
    /// Ask the engine for the `tallies.out` text report.
    pub tally_report: bool,
}

impl Settings {
    pub fn validate(&self) -> ModelResult<()> {
        if self.batches == 0 {
            return Err(ModelError::InvalidSettings("batches must be positive".into()));
        }
        if self.particles == 0 {
            return Err(ModelError::InvalidSettings(
                "particles must be positive".into(),
            ));
        }
        match self.run_mode {
            RunMode::Eigenvalue if self.inactive >= self.batches => {
                return Err(ModelError::InvalidSettings(format!(
                    "inactive batches ({}) must be fewer than batches ({})",
                    self.inactive, self.batches
                )));
            }
            RunMode::FixedSource if self.inactive != 0 => {
                return Err(ModelError::InvalidSettings(
                    "fixed-source runs have no inactive batches".into(),
                ));
            }
            _ => {}
        }
        self.source.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> Settings {
        Settings {
            run_mode: RunMode::Eigenvalue,
            batches: 100,
            inactive: 10,
            particles: 1000,
            seed: None,
            source: Source::point(DVec3::ZERO, Discrete::single(2.0e6)),
            tally_report: true,
        }
    }

    #[test]
    fn default_run_is_valid() {
        settings().validate().unwrap();
    }

    #[test]
    fn inactive_must_be_fewer_than_batches() {
        let mut s = settings();
        s.inactive = 100;
        assert!(matches!(s.validate(), Err(ModelError::InvalidSettings(_))));
    }

    #[test]
    fn zero_particles_rejected() {
        let mut s = settings();
        s.particles = 0;
        assert!(s.validate().is_err());
    }

    #[test]
    fn fixed_source_without_inactive() {
        let mut s = settings();
        s.run_mode = RunMode::FixedSource;
        assert!(s.validate().is_err());
        s.inactive = 0;
        s.validate().unwrap();
    }

    #[test]
    fn discrete_parameters_layout() {
        let d = Discrete::new(vec![1.0e6, 2.0e6], vec![0.25, 0.75]).unwrap();
        assert_eq!(d.parameters(), vec![1.0e6, 2.0e6, 0.25, 0.75]);
        assert_eq!(Discrete::from_parameters(&d.parameters()).unwrap(), d);
    }

    #[test]
    fn discrete_rejects_bad_probabilities() {
        assert!(Discrete::new(vec![1.0], vec![0.5]).is_err());
        assert!(Discrete::new(vec![1.0, 2.0], vec![1.0]).is_err());
        assert!(Discrete::from_parameters(&[1.0, 2.0, 1.0]).is_err());
        assert!(Discrete::new(vec![], vec![]).is_err());
    }

    #[test]
    fn negative_energy_rejected() {
        let mut s = settings();
        s.source.energy = Discrete::single(-1.0);
        assert!(matches!(s.validate(), Err(ModelError::InvalidSource(_))));
    }

    #[test]
    fn spatial_rebuild_and_box_check() {
        let p = SpatialDistribution::Point(DVec3::new(0.1, 0.2, 0.3));
        assert_eq!(
            SpatialDistribution::from_type_parameters(p.type_name(), &p.parameters()).unwrap(),
            p
        );
        let inverted = SpatialDistribution::Box {
            lower: DVec3::ONE,
            upper: DVec3::ZERO,
        };
        assert!(inverted.check().is_err());
        assert!(SpatialDistribution::from_type_parameters("point", &[1.0]).is_err());
    }

    #[test]
    fn run_mode_text() {
        assert_eq!(RunMode::FixedSource.to_string(), "fixed source");
        assert_eq!("eigenvalue".parse::<RunMode>().unwrap(), RunMode::Eigenvalue);
    }
}
