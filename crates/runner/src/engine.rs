use crate::error::RunError;
use std::ffi::OsString;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

/// Environment variable the engine reads to locate its cross-section library.
pub const CROSS_SECTIONS_ENV: &str = "OPENMC_CROSS_SECTIONS";

/// Settings passed to the engine process through its environment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunEnvironment {
    pub cross_sections: Option<PathBuf>,
}

impl RunEnvironment {
    /// Prefer the configured library path, else inherit `OPENMC_CROSS_SECTIONS`.
    pub fn resolve(configured: Option<PathBuf>) -> Self {
        Self::resolve_with(configured, |key: &str| std::env::var_os(key))
    }

    /// [`RunEnvironment::resolve`] with the variable lookup supplied by the caller.
    pub fn resolve_with(
        configured: Option<PathBuf>,
        lookup: impl Fn(&str) -> Option<OsString>,
    ) -> Self {
        let cross_sections =
            configured.or_else(|| lookup(CROSS_SECTIONS_ENV).map(PathBuf::from));
        match &cross_sections {
            Some(path) if !path.is_file() => {
                tracing::warn!(path = %path.display(), "cross-section library not found");
            }
            None => tracing::warn!("no cross-section library configured"),
            _ => {}
        }
        Self { cross_sections }
    }
}

#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub elapsed: Duration,
    /// Lines the engine printed to stdout.
    pub output_lines: usize,
}

/// Something that runs a transport calculation on a deck directory.
///
/// The engine reads the deck from `deck_dir` and leaves its outputs there.
pub trait Engine {
    fn run(&self, deck_dir: &Path, env: &RunEnvironment) -> Result<RunOutcome, RunError>;
}

/// The OpenMC executable, run as a subprocess.
#[derive(Debug, Clone)]
pub struct OpenMcEngine {
    pub executable: PathBuf,
    /// OpenMP thread count (`-s`); engine default when `None`.
    pub threads: Option<u32>,
}

impl Default for OpenMcEngine {
    fn default() -> Self {
        Self {
            executable: PathBuf::from("openmc"),
            threads: None,
        }
    }
}

impl OpenMcEngine {
    pub fn new(executable: impl Into<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
            threads: None,
        }
    }

    fn command(&self, deck_dir: &Path, env: &RunEnvironment) -> Command {
        let mut cmd = Command::new(&self.executable);
        cmd.current_dir(deck_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(threads) = self.threads {
            cmd.args(["-s", &threads.to_string()]);
        }
        if let Some(path) = &env.cross_sections {
            cmd.env(CROSS_SECTIONS_ENV, path);
        }
        cmd
    }
}

impl Engine for OpenMcEngine {
    fn run(&self, deck_dir: &Path, env: &RunEnvironment) -> Result<RunOutcome, RunError> {
        let _span = tracing::info_span!("engine", exe = %self.executable.display()).entered();
        let start = Instant::now();

        let mut child = self
            .command(deck_dir, env)
            .spawn()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => RunError::EngineNotFound(self.executable.clone()),
                _ => RunError::Io(e),
            })?;
        tracing::info!(pid = child.id(), dir = %deck_dir.display(), "engine started");

        // Drain stderr on its own thread so a full pipe cannot stall the child.
        let stderr_reader = child
            .stderr
            .take()
            .map(|stderr| std::thread::spawn(move || lossy_lines(stderr).collect::<Vec<_>>()));

        let mut output_lines = 0;
        let mut last_error = None;
        if let Some(stdout) = child.stdout.take() {
            for line in lossy_lines(stdout) {
                output_lines += 1;
                if line.contains("ERROR") {
                    last_error = Some(line.trim().to_string());
                }
                tracing::debug!(target: "openmc", "{line}");
            }
        }

        let status = child.wait()?;
        let stderr_lines = stderr_reader
            .and_then(|h| h.join().ok())
            .unwrap_or_default();
        for line in &stderr_lines {
            tracing::warn!(target: "openmc", "{line}");
            if line.contains("ERROR") {
                last_error = Some(line.trim().to_string());
            }
        }

        let elapsed = start.elapsed();
        if !status.success() {
            let message = last_error
                .or_else(|| stderr_lines.last().map(|l| l.trim().to_string()))
                .unwrap_or_else(|| "no error output".into());
            return Err(RunError::EngineFailed {
                status: status.to_string(),
                message,
            });
        }
        tracing::info!(elapsed_ms = elapsed.as_millis() as u64, output_lines, "engine finished");
        Ok(RunOutcome {
            elapsed,
            output_lines,
        })
    }
}

/// Lines of `reader` until EOF. Bytes that are not UTF-8 are replaced
/// rather than ending the stream, so the pipe keeps draining.
fn lossy_lines(reader: impl Read) -> impl Iterator<Item = String> {
    BufReader::new(reader)
        .split(b'\n')
        .map_while(Result::ok)
        .map(|mut bytes| {
            if bytes.last() == Some(&b'\r') {
                bytes.pop();
            }
            String::from_utf8_lossy(&bytes).into_owned()
        })
}
