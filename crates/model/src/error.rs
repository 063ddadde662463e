use thiserror::Error;

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("unknown element: {0}")]
    UnknownElement(String),

    #[error("invalid density {value} {units}")]
    InvalidDensity { value: f64, units: String },

    #[error("unknown density unit: {0}")]
    UnknownDensityUnit(String),

    #[error("material {0} has no density")]
    MissingDensity(u32),

    #[error("invalid surface '{kind}': {message}")]
    InvalidSurface { kind: String, message: String },

    #[error("region parse error at offset {position}: {message}")]
    RegionParse { position: usize, message: String },

    #[error("duplicate {kind} id {id}")]
    DuplicateId { kind: &'static str, id: u32 },

    #[error("cell {cell} is filled with missing material {material}")]
    MissingMaterial { cell: u32, material: u32 },

    #[error("cell {cell} has an intersection or union with no operands")]
    EmptyRegion { cell: u32 },

    #[error("cell {cell} references missing surface {surface}")]
    MissingSurface { cell: u32, surface: u32 },

    #[error("tally {tally} filters on missing {kind} {id}")]
    DanglingFilter {
        tally: u32,
        kind: &'static str,
        id: u32,
    },

    #[error("duplicate tally name: {0}")]
    DuplicateTallyName(String),

    #[error("invalid settings: {0}")]
    InvalidSettings(String),

    #[error("invalid source: {0}")]
    InvalidSource(String),

    #[error("invalid pin-cell dimensions: {0}")]
    InvalidDimensions(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

pub type ModelResult<T> = Result<T, ModelError>;
