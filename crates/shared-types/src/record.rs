//! Diagnostic record: the persisted result of diagnosing one document
//!
//! Page numbers are 1-indexed and span ends are exclusive.

use crate::section::SectionKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ffi::OsStr;
use std::ops::Range;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Current artifact schema. Readers accept any record with this or an older version.
pub const SCHEMA_VERSION: u32 = 1;

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

/// A resolved page range attributed to one section
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionSpan {
    pub kind: SectionKind,
    /// First page (1-indexed)
    pub start_page: u32,
    /// One past the last page
    pub end_page: u32,
}

impl SectionSpan {
    pub fn new(kind: SectionKind, start_page: u32, end_page: u32) -> Self {
        Self {
            kind,
            start_page,
            end_page,
        }
    }

    pub fn pages(&self) -> Range<u32> {
        self.start_page..self.end_page
    }

    pub fn page_count(&self) -> u32 {
        self.end_page.saturating_sub(self.start_page)
    }

    pub fn overlaps(&self, other: &SectionSpan) -> bool {
        self.start_page < other.end_page && other.start_page < self.end_page
    }
}

/// Detection outcome for one kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Detection {
    Found {
        start_page: u32,
        end_page: u32,
        #[serde(default)]
        confidence: f32,
        /// Signals that produced the winning candidate
        #[serde(default)]
        signals: Vec<String>,
    },
    NotFound,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionOutcome {
    pub kind: SectionKind,
    #[serde(flatten)]
    pub detection: Detection,
}

impl SectionOutcome {
    pub fn not_found(kind: SectionKind) -> Self {
        Self {
            kind,
            detection: Detection::NotFound,
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self.detection, Detection::Found { .. })
    }

    pub fn span(&self) -> Option<SectionSpan> {
        match self.detection {
            Detection::Found {
                start_page,
                end_page,
                ..
            } => Some(SectionSpan::new(self.kind, start_page, end_page)),
            Detection::NotFound => None,
        }
    }
}

/// Structural problems found when validating a record read from disk
#[derive(Error, Debug, PartialEq)]
pub enum RecordError {
    #[error("unsupported schema version {0}")]
    UnsupportedSchema(u32),

    #[error("document name '{0}' is not a plain file name")]
    InvalidDocumentName(String),

    #[error("expected 12 section outcomes, found {0}")]
    WrongOutcomeCount(usize),

    #[error("section '{0}' appears more than once")]
    DuplicateKind(SectionKind),

    #[error("section '{kind}' has invalid page range {start}..{end}")]
    InvalidRange {
        kind: SectionKind,
        start: u32,
        end: u32,
    },

    #[error("sections '{0}' and '{1}' overlap")]
    Overlap(SectionKind, SectionKind),
}

/// Diagnosis of one document, total over the section catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosticRecord {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    /// Absolute path of the source document at diagnosis time
    pub document: PathBuf,
    /// File name of the source document
    pub document_name: String,
    #[serde(default)]
    pub page_count: u32,
    /// Contract date as `MM.YYYY`, null when no date was found
    pub contract_date: Option<String>,
    pub generated_at: DateTime<Utc>,
    /// One outcome per kind, in catalog order
    pub sections: Vec<SectionOutcome>,
}

impl DiagnosticRecord {
    /// Build a record from the detections that were made.
    ///
    /// Kinds missing from `detections` are recorded as not found, so the
    /// result always holds exactly one outcome per catalog entry.
    pub fn new(
        document: PathBuf,
        page_count: u32,
        contract_date: Option<String>,
        detections: impl IntoIterator<Item = (SectionKind, Detection)>,
        generated_at: DateTime<Utc>,
    ) -> Self {
        let mut by_kind: BTreeMap<SectionKind, Detection> = detections.into_iter().collect();
        let sections = SectionKind::ALL
            .iter()
            .map(|&kind| SectionOutcome {
                kind,
                detection: by_kind.remove(&kind).unwrap_or(Detection::NotFound),
            })
            .collect();

        let document_name = document
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        Self {
            schema_version: SCHEMA_VERSION,
            document,
            document_name,
            page_count,
            contract_date,
            generated_at,
            sections,
        }
    }

    pub fn outcome(&self, kind: SectionKind) -> Option<&SectionOutcome> {
        self.sections.iter().find(|o| o.kind == kind)
    }

    pub fn is_found(&self, kind: SectionKind) -> bool {
        self.outcome(kind).is_some_and(SectionOutcome::is_found)
    }

    pub fn found_count(&self) -> usize {
        self.sections.iter().filter(|o| o.is_found()).count()
    }

    /// Found spans ordered by start page
    pub fn spans(&self) -> Vec<SectionSpan> {
        let mut spans: Vec<SectionSpan> = self.sections.iter().filter_map(|o| o.span()).collect();
        spans.sort_by_key(|s| s.start_page);
        spans
    }

    /// Document file name without its extension
    pub fn base_name(&self) -> &str {
        self.document_name
            .rsplit_once('.')
            .map(|(stem, _)| stem)
            .filter(|stem| !stem.is_empty())
            .unwrap_or(&self.document_name)
    }

    /// True when both records describe the same diagnosis, ignoring when they were generated
    pub fn same_diagnosis(&self, other: &DiagnosticRecord) -> bool {
        self.document_name == other.document_name
            && self.contract_date == other.contract_date
            && self.sections == other.sections
    }

    /// Check the structural invariants a reader relies on
    pub fn validate(&self) -> Result<(), RecordError> {
        if self.schema_version > SCHEMA_VERSION {
            return Err(RecordError::UnsupportedSchema(self.schema_version));
        }
        let name = self.document_name.as_str();
        if Path::new(name).file_name() != Some(OsStr::new(name)) {
            return Err(RecordError::InvalidDocumentName(self.document_name.clone()));
        }
        if self.sections.len() != SectionKind::ALL.len() {
            return Err(RecordError::WrongOutcomeCount(self.sections.len()));
        }

        let mut seen = [false; 12];
        for outcome in &self.sections {
            let slot = &mut seen[outcome.kind.ordinal()];
            if *slot {
                return Err(RecordError::DuplicateKind(outcome.kind));
            }
            *slot = true;
        }

        let spans = self.spans();
        for span in &spans {
            let past_end = self.page_count > 0 && span.end_page > self.page_count + 1;
            if span.start_page == 0 || span.start_page >= span.end_page || past_end {
                return Err(RecordError::InvalidRange {
                    kind: span.kind,
                    start: span.start_page,
                    end: span.end_page,
                });
            }
        }
        for pair in spans.windows(2) {
            if pair[0].overlaps(&pair[1]) {
                return Err(RecordError::Overlap(pair[0].kind, pair[1].kind));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn found(start_page: u32, end_page: u32) -> Detection {
        Detection::Found {
            start_page,
            end_page,
            confidence: 0.9,
            signals: vec![],
        }
    }

    fn sample_record() -> DiagnosticRecord {
        DiagnosticRecord::new(
            PathBuf::from("/data/Juan Perez.pdf"),
            10,
            Some("11.2025".into()),
            vec![
                (SectionKind::Contrato, found(1, 4)),
                (SectionKind::AltaSunat, found(4, 6)),
                (SectionKind::Auditoria, found(9, 11)),
            ],
            Utc::now(),
        )
    }

    #[test]
    fn test_record_is_total_over_catalog() {
        let record = sample_record();
        assert_eq!(record.sections.len(), 12);
        assert_eq!(record.found_count(), 3);
        assert!(!record.is_found(SectionKind::Risst));
        assert!(record.validate().is_ok());
    }

    #[test]
    fn test_outcomes_follow_catalog_order() {
        let record = sample_record();
        let kinds: Vec<_> = record.sections.iter().map(|o| o.kind).collect();
        assert_eq!(kinds, SectionKind::ALL.to_vec());
    }

    #[test]
    fn test_base_name_strips_extension() {
        let record = sample_record();
        assert_eq!(record.document_name, "Juan Perez.pdf");
        assert_eq!(record.base_name(), "Juan Perez");
    }

    #[test]
    fn test_json_shape() {
        let record = sample_record();
        let value = serde_json::to_value(&record).unwrap();
        let first = &value["sections"][0];
        assert_eq!(first["kind"], "Contrato de Trabajo");
        assert_eq!(first["status"], "found");
        assert_eq!(first["start_page"], 1);
        assert_eq!(first["end_page"], 4);
        assert_eq!(value["sections"][9]["status"], "not_found");
        assert_eq!(value["schema_version"], 1);
    }

    #[test]
    fn test_reads_minimal_older_artifact() {
        // No schema_version, page_count, confidence or signals fields
        let mut sections: Vec<String> = SectionKind::ALL
            .iter()
            .map(|k| format!(r#"{{"kind":"{}","status":"not_found"}}"#, k.label()))
            .collect();
        sections[0] =
            r#"{"kind":"Contrato de Trabajo","status":"found","start_page":1,"end_page":3}"#.into();
        let json = format!(
            r#"{{"document":"/x/a.pdf","document_name":"a.pdf","contract_date":null,
                "generated_at":"2025-11-03T10:00:00Z","sections":[{}],"extra_field":true}}"#,
            sections.join(",")
        );

        let record: DiagnosticRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(record.schema_version, SCHEMA_VERSION);
        assert!(record.validate().is_ok());
        assert_eq!(
            record.spans(),
            vec![SectionSpan::new(SectionKind::Contrato, 1, 3)]
        );
    }

    #[test]
    fn test_validate_rejects_missing_outcome() {
        let mut record = sample_record();
        record.sections.pop();
        assert_eq!(record.validate(), Err(RecordError::WrongOutcomeCount(11)));
    }

    #[test]
    fn test_validate_rejects_duplicate_kind() {
        let mut record = sample_record();
        record.sections[11] = SectionOutcome::not_found(SectionKind::Contrato);
        assert_eq!(
            record.validate(),
            Err(RecordError::DuplicateKind(SectionKind::Contrato))
        );
    }

    #[test]
    fn test_validate_rejects_overlap() {
        let mut record = sample_record();
        record.sections[1].detection = found(3, 6);
        assert_eq!(
            record.validate(),
            Err(RecordError::Overlap(SectionKind::Contrato, SectionKind::AltaSunat))
        );
    }

    #[test]
    fn test_validate_rejects_document_name_with_path() {
        for name in ["", "..", "../../escaped.pdf", "lote/a.pdf", "/tmp/a.pdf"] {
            let mut record = sample_record();
            record.document_name = name.to_string();
            assert_eq!(
                record.validate(),
                Err(RecordError::InvalidDocumentName(name.to_string())),
                "{name:?}"
            );
        }
    }

    #[test]
    fn test_validate_rejects_empty_range() {
        let mut record = sample_record();
        record.sections[1].detection = found(5, 5);
        assert!(matches!(
            record.validate(),
            Err(RecordError::InvalidRange { .. })
        ));
    }

    #[test]
    fn test_same_diagnosis_ignores_timestamp() {
        let a = sample_record();
        let mut b = a.clone();
        b.generated_at = a.generated_at + chrono::Duration::seconds(30);
        assert!(a.same_diagnosis(&b));
        b.contract_date = None;
        assert!(!a.same_diagnosis(&b));
    }

    #[test]
    fn test_span_overlap() {
        let a = SectionSpan::new(SectionKind::Contrato, 1, 4);
        let b = SectionSpan::new(SectionKind::AltaSunat, 4, 6);
        let c = SectionSpan::new(SectionKind::Rit, 3, 5);
        assert!(!a.overlaps(&b));
        assert!(a.overlaps(&c));
        assert!(c.overlaps(&b));
        assert_eq!(a.page_count(), 3);
    }
}
