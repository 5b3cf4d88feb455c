//! Segment extraction: cut each diagnosed section out of its source PDF
//!
//! Files are named `{section}-{MM.YYYY}-{document}.pdf` and land in
//! `<output_root>/<document>/`. An existing file is never replaced; the
//! section is reported as a collision and the rest of the document proceeds.

use crate::batch::map_items;
use crate::config::{resolve_dir, PipelineConfig};
use crate::diagnose::{BatchManifest, DocumentFailure};
use crate::error::{ItemError, PipelineError};
use crate::events::{CancelToken, EventSink, PipelineEvent, ProgressCounter, ProgressFn, Stage};
use crate::targets::{write_new, WriteOutcome};
use serde::Deserialize;
use shared_pdf::{slice_pages, PdfDocument};
use shared_types::{
    BatchSummary, DiagnosticRecord, ExtractionResult, ExtractionStatus, SectionKind, SectionOutcome,
    SCHEMA_VERSION,
};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};

const FORBIDDEN_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];
const MAX_FILE_NAME_CHARS: usize = 200;

/// Strip characters that are invalid in file names and cap the length.
///
/// The `.pdf` extension survives truncation.
pub fn sanitize_file_name(name: &str) -> String {
    let cleaned: String = name.chars().filter(|c| !FORBIDDEN_CHARS.contains(c)).collect();
    let (stem, ext) = match cleaned.len().checked_sub(4) {
        Some(at) if cleaned.is_char_boundary(at) && cleaned[at..].eq_ignore_ascii_case(".pdf") => {
            cleaned.split_at(at)
        }
        _ => (cleaned.as_str(), ""),
    };

    let budget = MAX_FILE_NAME_CHARS.saturating_sub(ext.chars().count());
    let stem: String = stem.chars().take(budget).collect();
    format!("{}{}", stem.trim(), ext)
}

/// Output file name for one section
pub fn section_file_name(
    kind: SectionKind,
    contract_date: Option<&str>,
    base_name: &str,
    placeholder: &str,
) -> String {
    let date = contract_date.unwrap_or(placeholder);
    sanitize_file_name(&format!("{}-{}-{}.pdf", kind.label(), date, base_name))
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Artifact {
    Manifest(BatchManifest),
    Record(DiagnosticRecord),
}

/// Read a per-document artifact or a batch manifest and return its records
pub fn load_artifact(path: &Path) -> Result<Vec<DiagnosticRecord>, PipelineError> {
    if !path.is_file() {
        return Err(PipelineError::ArtifactNotFound(path.to_path_buf()));
    }
    let invalid = |reason: String| PipelineError::InvalidArtifact {
        path: path.to_path_buf(),
        reason,
    };

    let bytes = fs::read(path).map_err(|e| PipelineError::io(path, e))?;
    let artifact: Artifact = serde_json::from_slice(&bytes).map_err(|e| {
        invalid(format!(
            "neither a diagnostic record nor a batch manifest ({e})"
        ))
    })?;

    let records = match artifact {
        Artifact::Manifest(manifest) if manifest.schema_version > SCHEMA_VERSION => {
            return Err(invalid(format!(
                "unsupported manifest schema version {}",
                manifest.schema_version
            )));
        }
        Artifact::Manifest(manifest) => manifest.records,
        Artifact::Record(record) => vec![record],
    };
    for record in &records {
        record
            .validate()
            .map_err(|e| invalid(format!("{}: {e}", record.document_name)))?;
    }
    Ok(records)
}

/// Find the source PDF of `record`, preferring `source_folder`
fn locate_source(record: &DiagnosticRecord, source_folder: &Path) -> Result<PathBuf, ItemError> {
    let local = source_folder.join(&record.document_name);
    if local.is_file() {
        return Ok(local);
    }
    if record.document.is_file() {
        debug!(
            document = %record.document_name,
            path = %record.document.display(),
            "using recorded source path"
        );
        return Ok(record.document.clone());
    }
    Err(ItemError::SourceMissing(local))
}

fn extract_section(
    source: &PdfDocument,
    outcome: &SectionOutcome,
    record: &DiagnosticRecord,
    output_dir: &Path,
    placeholder: &str,
) -> ExtractionResult {
    let start = Instant::now();
    let kind = outcome.kind;
    let document_name = record.document_name.clone();

    let Some(span) = outcome.span() else {
        return ExtractionResult {
            document_name,
            kind,
            file_name: None,
            status: ExtractionStatus::SkippedByDiagnosis,
            elapsed_ms: 0,
        };
    };

    let file_name = section_file_name(
        kind,
        record.contract_date.as_deref(),
        record.base_name(),
        placeholder,
    );
    let target = output_dir.join(&file_name);

    let status = match slice_pages(source.lopdf(), span.pages()) {
        Err(e) => ExtractionStatus::Failed {
            reason: e.to_string(),
        },
        Ok(bytes) => match write_new(&target, &bytes) {
            Ok(WriteOutcome::Written(bytes)) => ExtractionStatus::Written {
                path: target,
                bytes,
            },
            Ok(WriteOutcome::Exists) => ExtractionStatus::Collision { path: target },
            Err(e) => ExtractionStatus::Failed {
                reason: ItemError::io(&target, e).to_string(),
            },
        },
    };

    ExtractionResult {
        document_name,
        kind,
        file_name: Some(file_name),
        status,
        elapsed_ms: start.elapsed().as_millis() as u64,
    }
}

/// Extract every found section of one diagnosed document.
///
/// Returns one result per catalog kind. Section failures are carried in the
/// results; only a missing or unreadable source fails the whole document.
pub fn extract_document(
    record: &DiagnosticRecord,
    source_folder: &Path,
    output_root: &Path,
    placeholder: &str,
    sink: &dyn EventSink,
) -> Result<Vec<ExtractionResult>, ItemError> {
    let start = Instant::now();
    let source_path = locate_source(record, source_folder)?;
    let source = PdfDocument::open(&source_path)?;

    let output_dir = output_root.join(sanitize_file_name(record.base_name()));
    fs::create_dir_all(&output_dir).map_err(|e| ItemError::io(&output_dir, e))?;

    let results: Vec<ExtractionResult> = record
        .sections
        .iter()
        .map(|outcome| {
            let result = extract_section(&source, outcome, record, &output_dir, placeholder);
            match &result.status {
                ExtractionStatus::Written { path, bytes } => {
                    debug!(section = %result.kind, path = %path.display(), bytes, "section written")
                }
                ExtractionStatus::Collision { path } => {
                    warn!(section = %result.kind, path = %path.display(), "target exists, skipped")
                }
                ExtractionStatus::Failed { reason } => {
                    warn!(section = %result.kind, error = %reason, "section extraction failed")
                }
                ExtractionStatus::SkippedByDiagnosis => {}
            }
            sink.record(&PipelineEvent::SectionExtracted {
                result: result.clone(),
            });
            result
        })
        .collect();

    let written = results.iter().filter(|r| r.is_success()).count();
    info!(document = %record.document_name, written, "document extracted");
    sink.record(&PipelineEvent::DocumentExtracted {
        document: record.document_name.clone(),
        written,
        elapsed_ms: start.elapsed().as_millis() as u64,
    });
    Ok(results)
}

#[derive(Debug, Clone, Default)]
pub struct ExtractReport {
    /// Per-section results of every document that could be opened
    pub results: Vec<ExtractionResult>,
    /// Documents that could not be processed at all
    pub failures: Vec<DocumentFailure>,
    pub summary: BatchSummary,
}

impl ExtractReport {
    pub fn written(&self) -> impl Iterator<Item = &Path> {
        self.results.iter().filter_map(|r| match &r.status {
            ExtractionStatus::Written { path, .. } => Some(path.as_path()),
            _ => None,
        })
    }

    pub fn collisions(&self) -> usize {
        self.results
            .iter()
            .filter(|r| matches!(r.status, ExtractionStatus::Collision { .. }))
            .count()
    }
}

enum DocumentOutcome {
    Extracted(Vec<ExtractionResult>),
    Failed(DocumentFailure),
    Cancelled,
}

/// Extract every document described by `artifact`.
///
/// A missing or malformed artifact is fatal. Everything after that is
/// reported per document and per section.
pub fn extract_artifact(
    artifact: &Path,
    source_folder: &Path,
    config: &PipelineConfig,
    sink: &dyn EventSink,
    progress: &ProgressFn,
    cancel: &CancelToken,
) -> Result<ExtractReport, PipelineError> {
    let start = Instant::now();
    let records = load_artifact(artifact)?;
    let output_root = resolve_dir(source_folder, &config.extraction.output_dir);
    let placeholder = config.extraction.date_placeholder.as_str();

    info!(
        artifact = %artifact.display(),
        documents = records.len(),
        output = %output_root.display(),
        "extracting sections"
    );
    sink.record(&PipelineEvent::RunStarted {
        stage: Stage::Extract,
        folder: source_folder.to_path_buf(),
        total: records.len(),
    });

    let counter = ProgressCounter::new(records.len(), progress);

    let outcomes = map_items(&records, config.parallel, |record| {
        let name = record.document_name.clone();
        if cancel.is_cancelled() {
            sink.record(&PipelineEvent::ItemSkipped {
                item: name.clone(),
                reason: "cancelled".into(),
            });
            counter.tick(format!("Cancelled: {name}"));
            return DocumentOutcome::Cancelled;
        }

        let outcome = match extract_document(record, source_folder, &output_root, placeholder, sink)
        {
            Ok(results) => DocumentOutcome::Extracted(results),
            Err(e) => {
                warn!(document = %name, error = %e, "extraction failed");
                sink.record(&PipelineEvent::ItemFailed {
                    item: name.clone(),
                    reason: e.to_string(),
                });
                DocumentOutcome::Failed(DocumentFailure {
                    document_name: name.clone(),
                    reason: e.to_string(),
                })
            }
        };
        counter.tick(format!("Extracted: {name}"));
        outcome
    });

    let mut report = ExtractReport::default();
    let mut cancelled = 0;
    for outcome in outcomes {
        match outcome {
            DocumentOutcome::Extracted(results) => report.results.extend(results),
            DocumentOutcome::Failed(failure) => report.failures.push(failure),
            DocumentOutcome::Cancelled => cancelled += 1,
        }
    }

    report.summary = BatchSummary::from_extractions(&report.results);
    report.summary.failed += report.failures.len();
    report.summary.skipped += cancelled;
    report.summary.elapsed_ms = start.elapsed().as_millis() as u64;

    info!(summary = %report.summary, "extraction finished");
    sink.record(&PipelineEvent::RunFinished {
        stage: Stage::Extract,
        summary: report.summary,
    });
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use pretty_assertions::assert_eq;
    use shared_types::Detection;

    #[test]
    fn test_section_file_name() {
        assert_eq!(
            section_file_name(SectionKind::Rit, Some("03.2025"), "Juan Perez", "00.0000"),
            "RIT 2025-03.2025-Juan Perez.pdf"
        );
        assert_eq!(
            section_file_name(SectionKind::Contrato, None, "Juan Perez", "00.0000"),
            "Contrato de Trabajo-00.0000-Juan Perez.pdf"
        );
    }

    #[test]
    fn test_forbidden_characters_removed() {
        assert_eq!(sanitize_file_name("a<b>c:d\"e/f\\g|h?i*.pdf"), "abcdefghi.pdf");
        assert_eq!(
            section_file_name(SectionKind::ConstanciaRitRisst, None, "Ana", "00.0000"),
            "Constancia de RIT,RISST,HOST.SEXUAL,P.SALARIAL-00.0000-Ana.pdf"
        );
    }

    #[test]
    fn test_long_name_keeps_extension() {
        let long = format!("{}.pdf", "x".repeat(300));
        let sanitized = sanitize_file_name(&long);
        assert_eq!(sanitized.chars().count(), 200);
        assert!(sanitized.ends_with("x.pdf"));
    }

    #[test]
    fn test_truncation_counts_characters() {
        let long = format!("{}.pdf", "ñ".repeat(250));
        let sanitized = sanitize_file_name(&long);
        assert_eq!(sanitized.chars().count(), 200);
        assert!(sanitized.ends_with(".pdf"));
    }

    #[test]
    fn test_missing_artifact() {
        let result = load_artifact(Path::new("/definitely/not/here.json"));
        assert!(matches!(result, Err(PipelineError::ArtifactNotFound(_))));
    }

    #[test]
    fn test_garbage_artifact_is_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.json");
        fs::write(&path, r#"{"hello": "world"}"#).unwrap();
        assert!(matches!(
            load_artifact(&path),
            Err(PipelineError::InvalidArtifact { .. })
        ));
    }

    #[test]
    fn test_inconsistent_record_is_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.json");
        let mut record = DiagnosticRecord::new(
            PathBuf::from("/lote/a.pdf"),
            4,
            None,
            vec![
                (
                    SectionKind::Contrato,
                    Detection::Found {
                        start_page: 1,
                        end_page: 3,
                        confidence: 0.9,
                        signals: vec![],
                    },
                ),
            ],
            Utc::now(),
        );
        record.sections.pop();
        fs::write(&path, serde_json::to_vec(&record).unwrap()).unwrap();

        match load_artifact(&path) {
            Err(PipelineError::InvalidArtifact { reason, .. }) => {
                assert!(reason.contains("expected 12 section outcomes"))
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_newer_manifest_is_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("diagnostico_rangos.json");
        let manifest = BatchManifest {
            schema_version: SCHEMA_VERSION + 1,
            generated_at: Utc::now(),
            source_folder: dir.path().to_path_buf(),
            records: Vec::new(),
            failures: Vec::new(),
        };
        fs::write(&path, serde_json::to_vec(&manifest).unwrap()).unwrap();

        match load_artifact(&path) {
            Err(PipelineError::InvalidArtifact { reason, .. }) => {
                assert!(reason.contains("unsupported manifest schema version"))
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_missing_source_is_document_error() {
        let dir = tempfile::tempdir().unwrap();
        let record = DiagnosticRecord::new(
            PathBuf::from("/gone/Juan Perez.pdf"),
            1,
            None,
            Vec::new(),
            Utc::now(),
        );
        let result = extract_document(
            &record,
            dir.path(),
            &dir.path().join("out"),
            "00.0000",
            &crate::events::NullSink,
        );
        assert!(matches!(result, Err(ItemError::SourceMissing(_))));
    }
}
