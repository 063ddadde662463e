//! Runner: invoke the transport engine on a deck and read one tally back.
//!
//! # Invariants
//! - The engine runs only on a deck that passed validation and whose files
//!   match their manifest.
//! - A result is read only after the final statepoint exists; outputs left
//!   over from an earlier run are removed before the engine starts.

mod engine;
mod error;
mod results;
mod study;

pub use engine::{CROSS_SECTIONS_ENV, Engine, OpenMcEngine, RunEnvironment, RunOutcome};
pub use error::RunError;
pub use results::{
    ScoreValue, TALLY_REPORT_FILE, TallyBin, TallyReport, TallyResult, statepoint_filename,
};
pub use study::{Study, collect_result};
