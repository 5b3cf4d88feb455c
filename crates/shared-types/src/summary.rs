//! Per-item results and batch summaries

use crate::section::SectionKind;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// What happened to one section of one document during extraction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ExtractionStatus {
    Written { path: PathBuf, bytes: u64 },
    /// Target already existed and was left untouched
    Collision { path: PathBuf },
    /// The diagnosis marked the section as not found
    SkippedByDiagnosis,
    Failed { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub document_name: String,
    pub kind: SectionKind,
    /// Derived output file name, absent for sections that were not found
    pub file_name: Option<String>,
    #[serde(flatten)]
    pub status: ExtractionStatus,
    pub elapsed_ms: u64,
}

impl ExtractionResult {
    pub fn is_success(&self) -> bool {
        matches!(self.status, ExtractionStatus::Written { .. })
    }

    pub fn is_skip(&self) -> bool {
        matches!(
            self.status,
            ExtractionStatus::Collision { .. } | ExtractionStatus::SkippedByDiagnosis
        )
    }

    pub fn is_error(&self) -> bool {
        matches!(self.status, ExtractionStatus::Failed { .. })
    }
}

/// Success / skip / error counts for one invocation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub succeeded: usize,
    pub skipped: usize,
    pub failed: usize,
    pub elapsed_ms: u64,
}

impl BatchSummary {
    pub fn total(&self) -> usize {
        self.succeeded + self.skipped + self.failed
    }

    pub fn record_success(&mut self) {
        self.succeeded += 1;
    }

    pub fn record_skip(&mut self) {
        self.skipped += 1;
    }

    pub fn record_failure(&mut self) {
        self.failed += 1;
    }

    /// Tally a list of extraction results
    pub fn from_extractions<'a>(results: impl IntoIterator<Item = &'a ExtractionResult>) -> Self {
        let mut summary = Self::default();
        for result in results {
            if result.is_success() {
                summary.record_success();
            } else if result.is_skip() {
                summary.record_skip();
            } else {
                summary.record_failure();
            }
        }
        summary
    }

    pub fn has_errors(&self) -> bool {
        self.failed > 0
    }
}

impl fmt::Display for BatchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} succeeded, {} skipped, {} failed ({} total) in {}ms",
            self.succeeded,
            self.skipped,
            self.failed,
            self.total(),
            self.elapsed_ms
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(status: ExtractionStatus) -> ExtractionResult {
        ExtractionResult {
            document_name: "a.pdf".into(),
            kind: SectionKind::Contrato,
            file_name: None,
            status,
            elapsed_ms: 1,
        }
    }

    #[test]
    fn test_summary_tallies_each_category() {
        let results = vec![
            result(ExtractionStatus::Written {
                path: "x.pdf".into(),
                bytes: 10,
            }),
            result(ExtractionStatus::Collision {
                path: "x.pdf".into(),
            }),
            result(ExtractionStatus::SkippedByDiagnosis),
            result(ExtractionStatus::Failed {
                reason: "boom".into(),
            }),
        ];
        let summary = BatchSummary::from_extractions(&results);
        assert_eq!(summary.succeeded, 1);
        assert_eq!(summary.skipped, 2);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.total(), 4);
        assert!(summary.has_errors());
    }

    #[test]
    fn test_status_serializes_with_tag() {
        let json = serde_json::to_value(result(ExtractionStatus::SkippedByDiagnosis)).unwrap();
        assert_eq!(json["status"], "skipped_by_diagnosis");
        assert_eq!(json["kind"], "Contrato de Trabajo");
    }
}
