use crate::engine::{Engine, RunEnvironment};
use crate::error::RunError;
use crate::results::{TALLY_REPORT_FILE, TallyReport, TallyResult, statepoint_filename};
use pincell_model::Model;
use std::path::{Path, PathBuf};

/// One end-to-end calculation: write the deck, run the engine, read a tally.
pub struct Study<E: Engine> {
    pub engine: E,
    pub env: RunEnvironment,
    pub deck_dir: PathBuf,
}

impl<E: Engine> Study<E> {
    pub fn new(engine: E, env: RunEnvironment, deck_dir: impl Into<PathBuf>) -> Self {
        Self {
            engine,
            env,
            deck_dir: deck_dir.into(),
        }
    }

    /// Run `model` and return the tally called `tally_name`.
    ///
    /// Outputs of a previous run in the deck directory are removed first, so
    /// a stale statepoint can never stand in for a failed run.
    pub fn run(&self, model: &Model, tally_name: &str) -> Result<TallyResult, RunError> {
        let _span = tracing::info_span!("study", dir = %self.deck_dir.display()).entered();
        if model.tally_by_name(tally_name).is_none() {
            return Err(RunError::TallyNotFound(tally_name.to_string()));
        }
        if !model.settings.tally_report {
            return Err(RunError::ReportDisabled);
        }

        if self.deck_dir.is_dir() {
            remove_previous_outputs(&self.deck_dir)?;
        }
        pincell_deck::write_deck(model, &self.deck_dir)?;
        pincell_deck::verify_manifest(&self.deck_dir)?;

        let outcome = self.engine.run(&self.deck_dir, &self.env)?;
        tracing::info!(elapsed_ms = outcome.elapsed.as_millis() as u64, "transport run complete");

        collect_result(&self.deck_dir, model.settings.batches, tally_name)
    }
}

fn remove_previous_outputs(dir: &Path) -> Result<(), RunError> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let name = name.to_string_lossy();
        let is_output = name == TALLY_REPORT_FILE
            || (name.starts_with("statepoint.") && name.ends_with(".h5"));
        if is_output && entry.file_type()?.is_file() {
            tracing::debug!(file = %name, "removing previous run output");
            std::fs::remove_file(entry.path())?;
        }
    }
    Ok(())
}

/// Read tally `tally_name` from a finished run in `dir`.
///
/// The final statepoint must exist; its presence marks a completed run.
pub fn collect_result(
    dir: impl AsRef<Path>,
    batches: u32,
    tally_name: &str,
) -> Result<TallyResult, RunError> {
    let dir = dir.as_ref();
    let statepoint = dir.join(statepoint_filename(batches, batches));
    if !statepoint.is_file() {
        return Err(RunError::MissingStatepoint(statepoint));
    }
    let report = TallyReport::from_file(dir.join(TALLY_REPORT_FILE))?;
    let tally = report.get_tally(tally_name)?.clone();
    tracing::info!(tally = %tally.name, bins = tally.bins.len(), "tally read back");
    Ok(tally)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::RunOutcome;
    use pincell_model::PinCellConfig;
    use std::cell::Cell;
    use std::time::Duration;

    /// Writes a statepoint and tally report the way a finished run would.
    struct FakeEngine {
        write_statepoint: bool,
        runs: Cell<u32>,
    }

    impl FakeEngine {
        fn new() -> Self {
            Self {
                write_statepoint: true,
                runs: Cell::new(0),
            }
        }
    }

    impl Engine for FakeEngine {
        fn run(&self, deck_dir: &Path, _env: &RunEnvironment) -> Result<RunOutcome, RunError> {
            self.runs.set(self.runs.get() + 1);
            assert!(deck_dir.join(pincell_deck::SETTINGS_FILE).is_file());
            let settings = pincell_deck::read_deck(deck_dir)?.settings;
            if self.write_statepoint {
                let name = statepoint_filename(settings.batches, settings.batches);
                std::fs::write(deck_dir.join(name), b"\x89HDF")?;
            }
            std::fs::write(
                deck_dir.join(TALLY_REPORT_FILE),
                " ============================>     TALLY 1: capture_reactions     <============================\n\n Cell 1\n   Total Material\n     (n,gamma)     0.0421 +/- 0.0007\n",
            )?;
            Ok(RunOutcome {
                elapsed: Duration::from_millis(5),
                output_lines: 0,
            })
        }
    }

    fn model() -> Model {
        PinCellConfig::default().build_model().unwrap()
    }

    #[test]
    fn pipeline_returns_named_tally() {
        let tmp = tempfile::tempdir().unwrap();
        let study = Study::new(FakeEngine::new(), RunEnvironment::default(), tmp.path().join("run"));
        let tally = study.run(&model(), "capture_reactions").unwrap();
        assert_eq!(tally.name, "capture_reactions");
        assert_eq!(tally.score("(n,gamma)").unwrap().mean, 0.0421);
        assert_eq!(study.engine.runs.get(), 1);
    }

    #[test]
    fn unknown_tally_rejected_before_running() {
        let tmp = tempfile::tempdir().unwrap();
        let study = Study::new(FakeEngine::new(), RunEnvironment::default(), tmp.path());
        assert!(matches!(
            study.run(&model(), "flux"),
            Err(RunError::TallyNotFound(_))
        ));
        assert_eq!(study.engine.runs.get(), 0);
    }

    #[test]
    fn disabled_report_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let mut m = model();
        m.settings.tally_report = false;
        let study = Study::new(FakeEngine::new(), RunEnvironment::default(), tmp.path());
        assert!(matches!(
            study.run(&m, "capture_reactions"),
            Err(RunError::ReportDisabled)
        ));
    }

    #[test]
    fn missing_statepoint_fails_even_with_stale_one() {
        let tmp = tempfile::tempdir().unwrap();
        let stale = tmp.path().join(statepoint_filename(100, 100));
        std::fs::write(&stale, b"old").unwrap();
        let engine = FakeEngine {
            write_statepoint: false,
            runs: Cell::new(0),
        };
        let study = Study::new(engine, RunEnvironment::default(), tmp.path());
        match study.run(&model(), "capture_reactions") {
            Err(RunError::MissingStatepoint(path)) => assert_eq!(path, stale),
            other => panic!("expected MissingStatepoint, got {other:?}"),
        }
    }

    #[test]
    fn invalid_model_never_reaches_engine() {
        let tmp = tempfile::tempdir().unwrap();
        let mut m = model();
        m.settings.particles = 0;
        let study = Study::new(FakeEngine::new(), RunEnvironment::default(), tmp.path());
        assert!(matches!(
            study.run(&m, "capture_reactions"),
            Err(RunError::Deck(_))
        ));
        assert_eq!(study.engine.runs.get(), 0);
    }

    #[test]
    fn collect_requires_report() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("statepoint.10.h5"), b"").unwrap();
        assert!(matches!(
            collect_result(tmp.path(), 10, "capture_reactions"),
            Err(RunError::MissingReport(_))
        ));
    }
}
