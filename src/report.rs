//! Size accounting and batch reporting.

use std::path::PathBuf;
use std::time::Duration;

use crate::walker::WalkStats;

/// Per-document record, created once processing of that document finishes and
/// immutable thereafter.
#[derive(Debug, Clone)]
pub struct DocumentResult {
    pub input: PathBuf,
    /// Input file size in bytes.
    pub original_size: u64,
    pub outcome: DocumentOutcome,
}

#[derive(Debug, Clone)]
pub enum DocumentOutcome {
    Compressed {
        /// Output file size in bytes.
        output_size: u64,
        stats: WalkStats,
    },
    Failed {
        cause: String,
    },
}

impl DocumentResult {
    pub fn compressed(input: PathBuf, original_size: u64, output_size: u64, stats: WalkStats) -> Self {
        Self {
            input,
            original_size,
            outcome: DocumentOutcome::Compressed { output_size, stats },
        }
    }

    pub fn failed(input: PathBuf, original_size: u64, cause: impl Into<String>) -> Self {
        Self {
            input,
            original_size,
            outcome: DocumentOutcome::Failed {
                cause: cause.into(),
            },
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.outcome, DocumentOutcome::Failed { .. })
    }

    /// Size reduction in percent, `None` for failures or a zero-length
    /// original (never NaN).
    pub fn reduction_percent(&self) -> Option<f64> {
        match &self.outcome {
            DocumentOutcome::Compressed { output_size, .. } => {
                reduction_percent(self.original_size, *output_size)
            }
            DocumentOutcome::Failed { .. } => None,
        }
    }

    /// One human-readable line per document, using locale-stable decimal
    /// points.
    pub fn summary_line(&self) -> String {
        let name = self
            .input
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.input.display().to_string());

        match &self.outcome {
            DocumentOutcome::Compressed { output_size, stats } => {
                let reduction = self
                    .reduction_percent()
                    .map(|p| format!("{:.2}%", p))
                    .unwrap_or_else(|| "n/a".to_string());
                format!(
                    "{}: {:.2} MB -> {:.2} MB ({} smaller, {} of {} images rewritten)",
                    name,
                    megabytes(self.original_size),
                    megabytes(*output_size),
                    reduction,
                    stats.rewritten,
                    stats.examined,
                )
            }
            DocumentOutcome::Failed { cause } => format!("{}: failed: {}", name, cause),
        }
    }
}

/// Aggregate outcome of one batch run; always holds exactly one result per
/// input.
#[derive(Debug, Clone)]
pub struct BatchReport {
    pub results: Vec<DocumentResult>,
    pub elapsed: Duration,
}

impl BatchReport {
    pub fn failed_count(&self) -> usize {
        self.results.iter().filter(|r| r.is_failed()).count()
    }

    pub fn summary(&self) -> String {
        let mut out = String::new();
        for result in &self.results {
            out.push_str(&result.summary_line());
            out.push('\n');
        }
        out.push_str(&format!("Elapsed time: {}\n", format_elapsed(self.elapsed)));
        out
    }
}

/// `(original - new) / original * 100`, or `None` when the original is empty.
pub fn reduction_percent(original_size: u64, output_size: u64) -> Option<f64> {
    if original_size == 0 {
        return None;
    }
    Some((original_size as f64 - output_size as f64) / original_size as f64 * 100.0)
}

/// Whole minutes and seconds of wall-clock time.
pub fn format_elapsed(elapsed: Duration) -> String {
    let total_seconds = elapsed.as_secs();
    format!("{} min {} s", total_seconds / 60, total_seconds % 60)
}

fn megabytes(bytes: u64) -> f64 {
    bytes as f64 / (1024.0 * 1024.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reduction_is_computed_in_percent() {
        let p = reduction_percent(1000, 250).unwrap();
        assert!((p - 75.0).abs() < 1e-9);
    }

    #[test]
    fn zero_length_original_yields_no_reduction_figure() {
        assert_eq!(reduction_percent(0, 0), None);
        assert_eq!(reduction_percent(0, 100), None);
    }

    #[test]
    fn growth_is_reported_as_negative_reduction() {
        let p = reduction_percent(100, 150).unwrap();
        assert!((p + 50.0).abs() < 1e-9);
    }

    #[test]
    fn summary_line_uses_decimal_points() {
        let result = DocumentResult::compressed(
            PathBuf::from("/tmp/a.pdf"),
            3 * 1024 * 1024,
            1024 * 1024,
            WalkStats {
                examined: 2,
                rewritten: 2,
                skipped: 0,
            },
        );
        let line = result.summary_line();
        assert!(line.contains("3.00 MB"), "bad line: {}", line);
        assert!(line.contains("1.00 MB"), "bad line: {}", line);
        assert!(line.contains("66.67%"), "bad line: {}", line);
        assert!(!line.contains(','), "locale-unstable separator in: {}", line);
    }

    #[test]
    fn failed_result_carries_its_cause() {
        let result = DocumentResult::failed(PathBuf::from("b.pdf"), 10, "corrupt file");
        assert!(result.is_failed());
        assert_eq!(result.reduction_percent(), None);
        assert!(result.summary_line().contains("corrupt file"));
    }

    #[test]
    fn elapsed_is_whole_minutes_and_seconds() {
        assert_eq!(format_elapsed(Duration::from_secs(125)), "2 min 5 s");
        assert_eq!(format_elapsed(Duration::from_secs(59)), "0 min 59 s");
        assert_eq!(format_elapsed(Duration::from_millis(1999)), "0 min 1 s");
    }

    #[test]
    fn report_counts_failures() {
        let report = BatchReport {
            results: vec![
                DocumentResult::failed(PathBuf::from("a.pdf"), 0, "missing"),
                DocumentResult::compressed(PathBuf::from("b.pdf"), 100, 50, WalkStats::default()),
            ],
            elapsed: Duration::from_secs(61),
        };
        assert_eq!(report.failed_count(), 1);
        let summary = report.summary();
        assert!(summary.contains("1 min 1 s"));
        assert!(summary.lines().count() >= 3);
    }
}
