//! Read-back of tally results from the engine's text tally report.
//!
//! The report lists every tally as a header line followed by an indented
//! tree of filter bins and nuclides, ending in score lines:
//!
//! ```text
//!  ============================>     TALLY 1: capture_reactions     <============================
//!
//!  Cell 1
//!    U238
//!      (n,gamma)                            0.012345 +/- 0.000123
//! ```

use crate::error::RunError;
use pincell_common::TallyId;
use serde::Serialize;
use std::fmt;
use std::path::Path;

/// Text tally report written when `<output><tallies>` is enabled.
pub const TALLY_REPORT_FILE: &str = "tallies.out";

/// Statepoint file name for `batch` out of `total_batches`.
///
/// The batch number is zero-padded to the digit count of `total_batches`.
pub fn statepoint_filename(batch: u32, total_batches: u32) -> String {
    let width = total_batches.max(batch).to_string().len();
    format!("statepoint.{batch:0width$}.h5")
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreValue {
    pub score: String,
    pub mean: f64,
    pub std_dev: f64,
}

/// One combination of filter bins and nuclide.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TallyBin {
    /// Filter bin labels, outermost first (e.g. `Cell 1`).
    pub filters: Vec<String>,
    pub nuclide: String,
    pub scores: Vec<ScoreValue>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TallyResult {
    pub id: TallyId,
    pub name: String,
    pub bins: Vec<TallyBin>,
}

impl TallyResult {
    /// First value recorded for `score` across all bins.
    pub fn score(&self, score: &str) -> Option<&ScoreValue> {
        self.bins
            .iter()
            .flat_map(|b| &b.scores)
            .find(|s| s.score == score)
    }
}

impl fmt::Display for TallyResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.name.is_empty() {
            writeln!(f, "Tally {}", self.id)?;
        } else {
            writeln!(f, "Tally {}: {}", self.id, self.name)?;
        }
        for bin in &self.bins {
            let mut label = bin.filters.join(", ");
            if !label.is_empty() {
                label.push_str(", ");
            }
            label.push_str(&bin.nuclide);
            writeln!(f, "  {label}")?;
            for s in &bin.scores {
                writeln!(
                    f,
                    "    {:<24} {:.6e} +/- {:.6e}",
                    s.score, s.mean, s.std_dev
                )?;
            }
        }
        Ok(())
    }
}

/// All tallies found in a report.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TallyReport {
    pub tallies: Vec<TallyResult>,
}

impl TallyReport {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, RunError> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(RunError::MissingReport(path.to_path_buf()));
        }
        Self::parse(&std::fs::read_to_string(path)?)
    }

    pub fn parse(text: &str) -> Result<Self, RunError> {
        let mut tallies: Vec<TallyResult> = Vec::new();
        // (indent, label) of the enclosing filter bins and nuclide.
        let mut labels: Vec<(usize, String)> = Vec::new();

        for (index, raw) in text.lines().enumerate() {
            let line_no = index + 1;
            let trimmed = raw.trim();
            if trimmed.is_empty() {
                continue;
            }
            if let Some(header) = parse_header(trimmed) {
                let (id, name) = header.map_err(|message| RunError::ReportParse {
                    line: line_no,
                    message,
                })?;
                tallies.push(TallyResult {
                    id,
                    name,
                    bins: Vec::new(),
                });
                labels.clear();
                continue;
            }
            let Some(tally) = tallies.last_mut() else {
                return Err(RunError::ReportParse {
                    line: line_no,
                    message: "content before the first tally header".into(),
                });
            };

            if trimmed.contains("+/-") {
                let score = parse_score(trimmed).map_err(|message| RunError::ReportParse {
                    line: line_no,
                    message,
                })?;
                let Some(((_, nuclide), filters)) = labels.split_last() else {
                    return Err(RunError::ReportParse {
                        line: line_no,
                        message: "score line outside any bin".into(),
                    });
                };
                let filters: Vec<String> = filters.iter().map(|(_, l)| l.clone()).collect();
                match tally.bins.last_mut() {
                    Some(bin) if bin.nuclide == *nuclide && bin.filters == filters => {
                        bin.scores.push(score)
                    }
                    _ => tally.bins.push(TallyBin {
                        filters,
                        nuclide: nuclide.clone(),
                        scores: vec![score],
                    }),
                }
            } else {
                let indent = raw.len() - raw.trim_start().len();
                while labels.last().is_some_and(|(i, _)| *i >= indent) {
                    labels.pop();
                }
                labels.push((indent, trimmed.to_string()));
            }
        }
        tracing::debug!(tallies = tallies.len(), "parsed tally report");
        Ok(Self { tallies })
    }

    pub fn get_tally(&self, name: &str) -> Result<&TallyResult, RunError> {
        self.tallies
            .iter()
            .find(|t| t.name == name)
            .ok_or_else(|| RunError::TallyNotFound(name.to_string()))
    }
}

/// `Some` when the line is a tally header; the inner result carries the
/// parsed id and name.
fn parse_header(line: &str) -> Option<Result<(TallyId, String), String>> {
    if !(line.starts_with("=") && line.contains("TALLY")) {
        return None;
    }
    let inner = line
        .trim_start_matches(['=', '>'])
        .trim_end_matches(['=', '<'])
        .trim();
    let rest = inner.strip_prefix("TALLY")?.trim_start();
    let (id, name) = match rest.split_once(':') {
        Some((id, name)) => (id.trim(), name.trim()),
        None => (rest.trim(), ""),
    };
    Some(
        id.parse::<u32>()
            .map(|id| (TallyId(id), name.to_string()))
            .map_err(|_| format!("invalid tally id '{id}'")),
    )
}

/// `<score name> <mean> +/- <std dev>`; score names may contain spaces.
fn parse_score(line: &str) -> Result<ScoreValue, String> {
    let (left, right) = line
        .split_once("+/-")
        .ok_or_else(|| "missing '+/-'".to_string())?;
    let (score, mean) = left
        .trim_end()
        .rsplit_once(char::is_whitespace)
        .ok_or_else(|| format!("missing score name in '{line}'"))?;
    let mean = mean
        .parse::<f64>()
        .map_err(|_| format!("invalid mean '{mean}'"))?;
    let std_dev = right.trim();
    let std_dev = std_dev
        .parse::<f64>()
        .map_err(|_| format!("invalid standard deviation '{std_dev}'"))?;
    Ok(ScoreValue {
        score: score.trim().to_string(),
        mean,
        std_dev,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const REPORT: &str = "
 ============================>     TALLY 1: capture_reactions     <============================

 Cell 1
   Total Material
     (n,gamma)                            0.012345 +/- 1.23e-4
     absorption                           0.5      +/- 0.01

 ============================>     TALLY 2: flux     <============================

 Cell 1
   Total Material
     Flux                                 3.5 +/- 0.2
 Cell 4
   Total Material
     Flux                                 7.25 +/- 0.3
";

    #[test]
    fn statepoint_name_zero_pads_to_total() {
        assert_eq!(statepoint_filename(100, 100), "statepoint.100.h5");
        assert_eq!(statepoint_filename(7, 100), "statepoint.007.h5");
        assert_eq!(statepoint_filename(5, 5), "statepoint.5.h5");
        assert_eq!(statepoint_filename(20, 1000), "statepoint.0020.h5");
    }

    #[test]
    fn parses_headers_bins_and_scores() {
        let report = TallyReport::parse(REPORT).unwrap();
        assert_eq!(report.tallies.len(), 2);

        let capture = report.get_tally("capture_reactions").unwrap();
        assert_eq!(capture.id, TallyId(1));
        assert_eq!(capture.bins.len(), 1);
        assert_eq!(capture.bins[0].filters, ["Cell 1"]);
        assert_eq!(capture.bins[0].nuclide, "Total Material");
        let gamma = capture.score("(n,gamma)").unwrap();
        assert_eq!(gamma.mean, 0.012345);
        assert_eq!(gamma.std_dev, 1.23e-4);
        assert_eq!(capture.score("absorption").unwrap().mean, 0.5);

        let flux = report.get_tally("flux").unwrap();
        assert_eq!(flux.bins.len(), 2);
        assert_eq!(flux.bins[1].filters, ["Cell 4"]);
        assert_eq!(flux.bins[1].scores[0].mean, 7.25);
    }

    #[test]
    fn unknown_tally_is_an_error() {
        let report = TallyReport::parse(REPORT).unwrap();
        assert!(matches!(
            report.get_tally("heating"),
            Err(RunError::TallyNotFound(name)) if name == "heating"
        ));
    }

    #[test]
    fn unnamed_tally_header() {
        let report =
            TallyReport::parse(" ===> TALLY 3 <===\n Total Material\n  Flux 1 +/- 0.1\n")
                .unwrap();
        assert_eq!(report.tallies[0].id, TallyId(3));
        assert_eq!(report.tallies[0].name, "");
        assert!(report.tallies[0].bins[0].filters.is_empty());
    }

    #[test]
    fn malformed_lines_report_their_position() {
        let err = TallyReport::parse(" ===> TALLY 1: a <===\n Cell 1\n  Flux abc +/- 0.1\n")
            .unwrap_err();
        assert!(matches!(err, RunError::ReportParse { line: 3, .. }));

        let err = TallyReport::parse(" Cell 1\n").unwrap_err();
        assert!(matches!(err, RunError::ReportParse { line: 1, .. }));

        let err = TallyReport::parse(" ===> TALLY x: a <===\n").unwrap_err();
        assert!(matches!(err, RunError::ReportParse { line: 1, .. }));
    }

    #[test]
    fn display_lists_bins_and_scores() {
        let report = TallyReport::parse(REPORT).unwrap();
        let text = report.get_tally("capture_reactions").unwrap().to_string();
        assert!(text.starts_with("Tally 1: capture_reactions\n"));
        assert!(text.contains("  Cell 1, Total Material\n"));
        assert!(text.contains("(n,gamma)"));
        assert!(text.contains("1.234500e-2 +/- 1.230000e-4"));
    }

    #[test]
    fn missing_report_file() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(matches!(
            TallyReport::from_file(tmp.path().join(TALLY_REPORT_FILE)),
            Err(RunError::MissingReport(_))
        ));
    }
}
