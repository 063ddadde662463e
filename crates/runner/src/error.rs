use pincell_deck::DeckError;
use pincell_model::ModelError;
use std::path::PathBuf;

/// Errors from running the engine or reading its output.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("deck error: {0}")]
    Deck(#[from] DeckError),
    #[error("model error: {0}")]
    Model(#[from] ModelError),
    #[error("engine executable not found: {0}")]
    EngineNotFound(PathBuf),
    #[error("engine exited with {status}: {message}")]
    EngineFailed { status: String, message: String },
    #[error("statepoint not found: {0}")]
    MissingStatepoint(PathBuf),
    #[error("tally report not found: {0}")]
    MissingReport(PathBuf),
    #[error("the model does not request a tally report")]
    ReportDisabled,
    #[error("no tally named '{0}'")]
    TallyNotFound(String),
    #[error("tally report line {line}: {message}")]
    ReportParse { line: usize, message: String },
}
