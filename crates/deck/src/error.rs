use pincell_model::ModelError;

/// Errors from writing, reading or verifying a deck.
#[derive(Debug, thiserror::Error)]
pub enum DeckError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("XML error: {0}")]
    Xml(String),
    #[error("model error: {0}")]
    Model(#[from] ModelError),
    #[error("{file}: expected root element <{expected}>, found <{found}>")]
    UnexpectedRoot {
        file: String,
        expected: String,
        found: String,
    },
    #[error("{file}: <{element}> is missing")]
    MissingElement { file: String, element: String },
    #[error("{file}: <{element}> is missing attribute '{attribute}'")]
    MissingAttribute {
        file: String,
        element: String,
        attribute: String,
    },
    #[error("{file}: <{element}> has invalid value '{value}'")]
    InvalidValue {
        file: String,
        element: String,
        value: String,
    },
    #[error("integrity check failed for {filename}: expected {expected}, got {actual}")]
    IntegrityMismatch {
        filename: String,
        expected: String,
        actual: String,
    },
    #[error("schema version mismatch: file has v{file_version}, expected v{expected_version}")]
    SchemaMismatch {
        file_version: u32,
        expected_version: u32,
    },
}

pub(crate) fn xml_error(e: impl std::fmt::Display) -> DeckError {
    DeckError::Xml(e.to_string())
}
