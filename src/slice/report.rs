//! Slice report types for tracking skip conditions and run statistics.
//!
//! Every skip path in the core (oversized boxes, discarded empty windows,
//! unloadable images) is non-fatal; this report is the structured channel
//! that surfaces them to the user instead of raised failures.

use serde::Serialize;
use std::fmt;

/// A report generated while slicing a dataset.
#[derive(Clone, Debug, Default, Serialize)]
pub struct SliceReport {
    /// Images submitted for slicing.
    pub images_in: usize,
    /// Images that produced at least one window.
    pub images_sliced: usize,
    /// Images skipped because they could not be loaded or decoded.
    pub images_skipped: usize,
    /// Windows emitted across all images.
    pub windows_emitted: usize,
    /// Label lines emitted across all windows.
    pub labels_emitted: usize,
    /// Seed boxes rejected for exceeding the window size.
    pub boxes_rejected: usize,
    /// Windows discarded because no box survived the containment test.
    pub windows_discarded: usize,
    /// Issues discovered during the run.
    pub issues: Vec<SliceIssue>,
}

impl SliceReport {
    /// Create a new empty report.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an issue to the report.
    pub fn add(&mut self, issue: SliceIssue) {
        self.issues.push(issue);
    }

    /// Count of warning-level issues.
    pub fn warning_count(&self) -> usize {
        self.issues
            .iter()
            .filter(|i| i.severity == SliceSeverity::Warning)
            .count()
    }

    /// Count of info-level issues.
    pub fn info_count(&self) -> usize {
        self.issues
            .iter()
            .filter(|i| i.severity == SliceSeverity::Info)
            .count()
    }
}

impl fmt::Display for SliceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "  {} image(s) in, {} sliced, {} skipped",
            self.images_in, self.images_sliced, self.images_skipped
        )?;
        writeln!(
            f,
            "  {} window(s) emitted, {} label(s)",
            self.windows_emitted, self.labels_emitted
        )?;

        if self.boxes_rejected > 0 || self.windows_discarded > 0 {
            writeln!(
                f,
                "  {} oversized box(es) rejected, {} empty window(s) discarded",
                self.boxes_rejected, self.windows_discarded
            )?;
        }

        if !self.issues.is_empty() {
            let warnings = self.warning_count();
            let infos = self.info_count();

            if warnings > 0 {
                writeln!(f)?;
                writeln!(f, "Warnings ({}):", warnings)?;
                for issue in self
                    .issues
                    .iter()
                    .filter(|i| i.severity == SliceSeverity::Warning)
                {
                    writeln!(f, "  - {}", issue.message)?;
                }
            }

            if infos > 0 {
                writeln!(f)?;
                writeln!(f, "Notes ({}):", infos)?;
                for issue in self
                    .issues
                    .iter()
                    .filter(|i| i.severity == SliceSeverity::Info)
                {
                    writeln!(f, "  - {}", issue.message)?;
                }
            }
        }

        Ok(())
    }
}

/// A single issue discovered while slicing.
#[derive(Clone, Debug, Serialize)]
pub struct SliceIssue {
    pub severity: SliceSeverity,
    pub code: SliceIssueCode,
    pub message: String,
}

impl SliceIssue {
    /// Create a warning-level issue (content was skipped).
    pub fn warning(code: SliceIssueCode, message: impl Into<String>) -> Self {
        Self {
            severity: SliceSeverity::Warning,
            code,
            message: message.into(),
        }
    }

    /// Create an info-level issue (a note that does not affect output).
    pub fn info(code: SliceIssueCode, message: impl Into<String>) -> Self {
        Self {
            severity: SliceSeverity::Info,
            code,
            message: message.into(),
        }
    }
}

/// Severity level for slice issues.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SliceSeverity {
    /// Some input was skipped and is missing from the output.
    Warning,
    /// A note about a policy decision; output is unaffected.
    Info,
}

/// Stable issue codes for programmatic consumption.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SliceIssueCode {
    /// A seed box was wider or taller than the window size.
    OversizedBox,
    /// An image could not be fetched or decoded.
    ImageLoadFailed,
    /// An image stem could not be parsed as a numeric index while a
    /// training range was configured.
    NonNumericStem,
    /// Malformed boxes were dropped while parsing annotations.
    InvalidBoxDropped,
}
