use crate::error::{ModelError, ModelResult};
use glam::DVec3;
use pincell_common::SurfaceId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Quadric surface shapes and their coefficients.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum SurfaceKind {
    XPlane { x0: f64 },
    YPlane { y0: f64 },
    ZPlane { z0: f64 },
    /// Infinite cylinder parallel to the z axis.
    ZCylinder { x0: f64, y0: f64, r: f64 },
    Sphere { x0: f64, y0: f64, z0: f64, r: f64 },
}

impl SurfaceKind {
    /// Type name used in `geometry.xml`.
    pub fn type_name(&self) -> &'static str {
        match self {
            SurfaceKind::XPlane { .. } => "x-plane",
            SurfaceKind::YPlane { .. } => "y-plane",
            SurfaceKind::ZPlane { .. } => "z-plane",
            SurfaceKind::ZCylinder { .. } => "z-cylinder",
            SurfaceKind::Sphere { .. } => "sphere",
        }
    }

    /// Coefficients in the engine's order.
    pub fn coeffs(&self) -> Vec<f64> {
        match *self {
            SurfaceKind::XPlane { x0 } => vec![x0],
            SurfaceKind::YPlane { y0 } => vec![y0],
            SurfaceKind::ZPlane { z0 } => vec![z0],
            SurfaceKind::ZCylinder { x0, y0, r } => vec![x0, y0, r],
            SurfaceKind::Sphere { x0, y0, z0, r } => vec![x0, y0, z0, r],
        }
    }

    /// Rebuild a surface from its XML type name and coefficients.
    pub fn from_type_coeffs(type_name: &str, coeffs: &[f64]) -> ModelResult<Self> {
        let invalid = |message: String| ModelError::InvalidSurface {
            kind: type_name.to_string(),
            message,
        };
        let expect = |n: usize| {
            if coeffs.len() == n {
                Ok(())
            } else {
                Err(invalid(format!("expected {n} coefficients, got {}", coeffs.len())))
            }
        };
        let kind = match type_name {
            "x-plane" => {
                expect(1)?;
                SurfaceKind::XPlane { x0: coeffs[0] }
            }
            "y-plane" => {
                expect(1)?;
                SurfaceKind::YPlane { y0: coeffs[0] }
            }
            "z-plane" => {
                expect(1)?;
                SurfaceKind::ZPlane { z0: coeffs[0] }
            }
            "z-cylinder" => {
                expect(3)?;
                SurfaceKind::ZCylinder {
                    x0: coeffs[0],
                    y0: coeffs[1],
                    r: coeffs[2],
                }
            }
            "sphere" => {
                expect(4)?;
                SurfaceKind::Sphere {
                    x0: coeffs[0],
                    y0: coeffs[1],
                    z0: coeffs[2],
                    r: coeffs[3],
                }
            }
            other => return Err(invalid(format!("unsupported surface type '{other}'"))),
        };
        kind.check()?;
        Ok(kind)
    }

    fn check(&self) -> ModelResult<()> {
        let radius = match *self {
            SurfaceKind::ZCylinder { r, .. } | SurfaceKind::Sphere { r, .. } => Some(r),
            _ => None,
        };
        if self.coeffs().iter().any(|c| !c.is_finite()) {
            return Err(ModelError::InvalidSurface {
                kind: self.type_name().to_string(),
                message: "non-finite coefficient".into(),
            });
        }
        if let Some(r) = radius {
            if r <= 0.0 {
                return Err(ModelError::InvalidSurface {
                    kind: self.type_name().to_string(),
                    message: format!("radius must be positive, got {r}"),
                });
            }
        }
        Ok(())
    }

    /// Signed quadric value f(p). Negative inside cylinders and spheres,
    /// negative below planes.
    pub fn evaluate(&self, p: DVec3) -> f64 {
        match *self {
            SurfaceKind::XPlane { x0 } => p.x - x0,
            SurfaceKind::YPlane { y0 } => p.y - y0,
            SurfaceKind::ZPlane { z0 } => p.z - z0,
            SurfaceKind::ZCylinder { x0, y0, r } => {
                let dx = p.x - x0;
                let dy = p.y - y0;
                dx * dx + dy * dy - r * r
            }
            SurfaceKind::Sphere { x0, y0, z0, r } => {
                (p - DVec3::new(x0, y0, z0)).length_squared() - r * r
            }
        }
    }
}

/// What happens to a particle crossing the surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BoundaryType {
    #[default]
    Transmission,
    Vacuum,
    Reflective,
}

impl BoundaryType {
    pub fn as_str(self) -> &'static str {
        match self {
            BoundaryType::Transmission => "transmission",
            BoundaryType::Vacuum => "vacuum",
            BoundaryType::Reflective => "reflective",
        }
    }
}

impl fmt::Display for BoundaryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BoundaryType {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "transmission" => Ok(BoundaryType::Transmission),
            "vacuum" => Ok(BoundaryType::Vacuum),
            "reflective" => Ok(BoundaryType::Reflective),
            other => Err(ModelError::InvalidSurface {
                kind: "boundary".into(),
                message: format!("unknown boundary type '{other}'"),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Surface {
    pub id: SurfaceId,
    pub kind: SurfaceKind,
    pub boundary: BoundaryType,
}

impl Surface {
    pub fn new(id: SurfaceId, kind: SurfaceKind) -> ModelResult<Self> {
        kind.check()?;
        Ok(Self {
            id,
            kind,
            boundary: BoundaryType::Transmission,
        })
    }

    pub fn with_boundary(mut self, boundary: BoundaryType) -> Self {
        self.boundary = boundary;
        self
    }

    pub fn evaluate(&self, p: DVec3) -> f64 {
        self.kind.evaluate(p)
    }
}
