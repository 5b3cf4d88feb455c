//! Diagnosis: detect sections in every PDF of a folder and persist the results
//!
//! Each document gets its own JSON artifact, named after the document and the
//! moment it was diagnosed, so re-running never replaces an earlier diagnosis.
//! A batch manifest lists every record of the run together with the
//! documents that could not be diagnosed.

use crate::batch::map_items;
use crate::config::{resolve_dir, PipelineConfig};
use crate::error::{ItemError, PipelineError};
use crate::events::{CancelToken, EventSink, PipelineEvent, ProgressCounter, ProgressFn, Stage};
use crate::targets::write_unique;
use chrono::{DateTime, Utc};
use section_engine::SectionDetector;
use serde::{Deserialize, Serialize};
use shared_pdf::{PageSource, PdfDocument, PdfError};
use shared_types::{BatchSummary, DiagnosticRecord, SectionKind, SCHEMA_VERSION};
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Manifest file stem
pub const MANIFEST_STEM: &str = "diagnostico_rangos";

/// A document that could not be diagnosed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentFailure {
    pub document_name: String,
    pub reason: String,
}

/// Every record produced by one diagnosis run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchManifest {
    #[serde(default = "schema_version")]
    pub schema_version: u32,
    pub generated_at: DateTime<Utc>,
    pub source_folder: PathBuf,
    pub records: Vec<DiagnosticRecord>,
    #[serde(default)]
    pub failures: Vec<DocumentFailure>,
}

fn schema_version() -> u32 {
    SCHEMA_VERSION
}

/// Detection statistics across a batch
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiagnosisStats {
    pub documents: usize,
    /// Documents in which each kind was found, in catalog order
    pub found_per_kind: Vec<(SectionKind, usize)>,
    pub total_sections: usize,
    /// Documents with fewer found sections than the threshold, with their count
    pub incomplete: Vec<(String, usize)>,
    pub without_date: Vec<String>,
    pub failed: Vec<DocumentFailure>,
    pub incomplete_threshold: usize,
}

impl DiagnosisStats {
    pub fn from_records(
        records: &[DiagnosticRecord],
        failures: &[DocumentFailure],
        incomplete_threshold: usize,
    ) -> Self {
        let found_per_kind = SectionKind::ALL
            .iter()
            .map(|&kind| (kind, records.iter().filter(|r| r.is_found(kind)).count()))
            .collect();

        Self {
            documents: records.len(),
            found_per_kind,
            total_sections: records.iter().map(DiagnosticRecord::found_count).sum(),
            incomplete: records
                .iter()
                .filter(|r| r.found_count() < incomplete_threshold)
                .map(|r| (r.document_name.clone(), r.found_count()))
                .collect(),
            without_date: records
                .iter()
                .filter(|r| r.contract_date.is_none())
                .map(|r| r.document_name.clone())
                .collect(),
            failed: failures.to_vec(),
            incomplete_threshold,
        }
    }

    /// Text report for the run log
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "DIAGNOSIS REPORT");
        let _ = writeln!(out, "Documents diagnosed: {}", self.documents);
        let _ = writeln!(out, "Documents with errors: {}", self.failed.len());
        let _ = writeln!(out, "Sections found: {}", self.total_sections);
        let _ = writeln!(out, "Per section:");
        for (kind, count) in &self.found_per_kind {
            let _ = writeln!(out, "  {:<58} {}/{}", kind.label(), count, self.documents);
        }
        if !self.incomplete.is_empty() {
            let _ = writeln!(out, "Incomplete (fewer than {} sections):", self.incomplete_threshold);
            for (name, found) in &self.incomplete {
                let _ = writeln!(out, "  - {name} ({found}/{})", SectionKind::ALL.len());
            }
        }
        if !self.without_date.is_empty() {
            let _ = writeln!(out, "Without contract date:");
            for name in &self.without_date {
                let _ = writeln!(out, "  - {name}");
            }
        }
        if !self.failed.is_empty() {
            let _ = writeln!(out, "Failed:");
            for failure in &self.failed {
                let _ = writeln!(out, "  - {}: {}", failure.document_name, failure.reason);
            }
        }
        out
    }
}

#[derive(Debug, Clone, Default)]
pub struct DiagnoseReport {
    pub records: Vec<DiagnosticRecord>,
    /// Per-document artifacts, parallel to `records`
    pub artifacts: Vec<PathBuf>,
    pub manifest: Option<PathBuf>,
    pub failures: Vec<DocumentFailure>,
    pub stats: DiagnosisStats,
    pub summary: BatchSummary,
}

/// Open one PDF and build its diagnostic record
pub fn diagnose_document(
    detector: &SectionDetector,
    path: &Path,
    generated_at: DateTime<Utc>,
) -> Result<DiagnosticRecord, ItemError> {
    let document = PdfDocument::open(path)?;
    if !document.has_text() {
        return Err(PdfError::NoText(path.to_path_buf()).into());
    }

    let diagnosis = detector.detect(&document);
    let absolute = fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());

    Ok(DiagnosticRecord::new(
        absolute,
        diagnosis.page_count as u32,
        diagnosis.contract_date.map(|d| d.to_string()),
        diagnosis.detections(),
        generated_at,
    ))
}

fn timestamp(at: DateTime<Utc>) -> String {
    at.format("%Y%m%dT%H%M%S%.3f").to_string()
}

/// Persist `record` as `<dir>/<stem>.diagnostico.<timestamp>.json`
pub fn write_artifact(dir: &Path, record: &DiagnosticRecord) -> Result<PathBuf, ItemError> {
    let stem = format!(
        "{}.diagnostico.{}",
        record.base_name(),
        timestamp(record.generated_at)
    );
    let json = serde_json::to_vec_pretty(record)?;
    write_unique(dir, &stem, "json", &json).map_err(|e| ItemError::io(dir, e))
}

fn list_documents(folder: &Path) -> Result<Vec<PathBuf>, PipelineError> {
    if !folder.is_dir() {
        return Err(PipelineError::FolderNotFound(folder.to_path_buf()));
    }
    let entries = fs::read_dir(folder).map_err(|e| PipelineError::io(folder, e))?;

    let mut paths: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .filter(|path| {
            path.extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"))
        })
        .collect();
    paths.sort();
    Ok(paths)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

enum DocumentOutcome {
    Diagnosed(DiagnosticRecord, PathBuf),
    Failed(DocumentFailure),
    Cancelled,
}

/// Diagnose every PDF in `folder`.
///
/// Per-document failures are reported in the result and never abort the
/// batch. Only a missing folder or an unusable artifact directory is fatal.
pub fn diagnose_folder(
    folder: &Path,
    config: &PipelineConfig,
    detector: &SectionDetector,
    sink: &dyn EventSink,
    progress: &ProgressFn,
    cancel: &CancelToken,
) -> Result<DiagnoseReport, PipelineError> {
    let start = Instant::now();
    let documents = list_documents(folder)?;
    let artifact_dir = resolve_dir(folder, &config.diagnosis.artifact_dir);
    fs::create_dir_all(&artifact_dir).map_err(|e| PipelineError::io(&artifact_dir, e))?;

    info!(
        folder = %folder.display(),
        documents = documents.len(),
        parallel = config.parallel,
        "diagnosing documents"
    );
    sink.record(&PipelineEvent::RunStarted {
        stage: Stage::Diagnose,
        folder: folder.to_path_buf(),
        total: documents.len(),
    });

    let counter = ProgressCounter::new(documents.len(), progress);

    let outcomes = map_items(&documents, config.parallel, |path| {
        let name = file_name(path);
        if cancel.is_cancelled() {
            sink.record(&PipelineEvent::ItemSkipped {
                item: name.clone(),
                reason: "cancelled".into(),
            });
            counter.tick(format!("Cancelled: {name}"));
            return DocumentOutcome::Cancelled;
        }

        let doc_start = Instant::now();
        let result = diagnose_document(detector, path, Utc::now()).and_then(|record| {
            let artifact = write_artifact(&artifact_dir, &record)?;
            Ok((record, artifact))
        });

        let outcome = match result {
            Ok((record, artifact)) => {
                info!(
                    document = %name,
                    found = record.found_count(),
                    date = record.contract_date.as_deref().unwrap_or("-"),
                    "diagnosed"
                );
                sink.record(&PipelineEvent::DocumentDiagnosed {
                    record: record.clone(),
                    elapsed_ms: doc_start.elapsed().as_millis() as u64,
                });
                sink.record(&PipelineEvent::ArtifactWritten {
                    path: artifact.clone(),
                });
                DocumentOutcome::Diagnosed(record, artifact)
            }
            Err(e) => {
                warn!(document = %name, error = %e, "diagnosis failed");
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
        counter.tick(format!("Diagnosed: {name}"));
        outcome
    });

    let mut report = DiagnoseReport::default();
    for outcome in outcomes {
        match outcome {
            DocumentOutcome::Diagnosed(record, artifact) => {
                report.summary.record_success();
                report.records.push(record);
                report.artifacts.push(artifact);
            }
            DocumentOutcome::Failed(failure) => {
                report.summary.record_failure();
                report.failures.push(failure);
            }
            DocumentOutcome::Cancelled => report.summary.record_skip(),
        }
    }

    if !report.records.is_empty() || !report.failures.is_empty() {
        let manifest = BatchManifest {
            schema_version: SCHEMA_VERSION,
            generated_at: Utc::now(),
            source_folder: folder.to_path_buf(),
            records: report.records.clone(),
            failures: report.failures.clone(),
        };
        match write_manifest(&artifact_dir, &manifest) {
            Ok(path) => {
                debug!(path = %path.display(), "manifest written");
                sink.record(&PipelineEvent::ArtifactWritten { path: path.clone() });
                report.manifest = Some(path);
            }
            Err(e) => {
                warn!(error = %e, "failed to write batch manifest");
                sink.record(&PipelineEvent::ItemFailed {
                    item: MANIFEST_STEM.into(),
                    reason: e.to_string(),
                });
            }
        }
    }

    report.stats = DiagnosisStats::from_records(
        &report.records,
        &report.failures,
        config.diagnosis.incomplete_threshold,
    );
    sink.record(&PipelineEvent::Report {
        text: report.stats.render(),
    });

    report.summary.elapsed_ms = start.elapsed().as_millis() as u64;
    info!(summary = %report.summary, "diagnosis finished");
    sink.record(&PipelineEvent::RunFinished {
        stage: Stage::Diagnose,
        summary: report.summary,
    });
    Ok(report)
}

fn write_manifest(dir: &Path, manifest: &BatchManifest) -> Result<PathBuf, ItemError> {
    let stem = format!("{MANIFEST_STEM}.{}", timestamp(manifest.generated_at));
    let json = serde_json::to_vec_pretty(manifest)?;
    write_unique(dir, &stem, "json", &json).map_err(|e| ItemError::io(dir, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use shared_types::Detection;

    fn record(name: &str, found: &[SectionKind], date: Option<&str>) -> DiagnosticRecord {
        let detections = found.iter().enumerate().map(|(idx, &kind)| {
            let page = idx as u32 + 1;
            (
                kind,
                Detection::Found {
                    start_page: page,
                    end_page: page + 1,
                    confidence: 0.9,
                    signals: vec![],
                },
            )
        });
        DiagnosticRecord::new(
            PathBuf::from(format!("/lote/{name}")),
            found.len() as u32,
            date.map(str::to_string),
            detections,
            Utc.with_ymd_and_hms(2025, 5, 2, 14, 30, 0).unwrap(),
        )
    }

    #[test]
    fn test_stats() {
        let records = vec![
            record("A.pdf", &SectionKind::ALL, Some("03.2025")),
            record("B.pdf", &SectionKind::ALL[..4], None),
        ];
        let failures = vec![DocumentFailure {
            document_name: "C.pdf".into(),
            reason: "Failed to parse PDF".into(),
        }];
        let stats = DiagnosisStats::from_records(&records, &failures, 10);

        assert_eq!(stats.documents, 2);
        assert_eq!(stats.total_sections, 16);
        assert_eq!(stats.found_per_kind[0], (SectionKind::Contrato, 2));
        assert_eq!(stats.found_per_kind[11], (SectionKind::Auditoria, 1));
        assert_eq!(stats.incomplete, vec![("B.pdf".to_string(), 4)]);
        assert_eq!(stats.without_date, vec!["B.pdf".to_string()]);

        let text = stats.render();
        assert!(text.contains("Incomplete (fewer than 10 sections):"));
        assert!(text.contains("  - B.pdf (4/12)"));
        assert!(text.contains("  - C.pdf: Failed to parse PDF"));
    }

    #[test]
    fn test_artifact_name_and_content() {
        let dir = tempfile::tempdir().unwrap();
        let record = record("Juan Perez.pdf", &[SectionKind::Contrato], Some("03.2025"));

        let path = write_artifact(dir.path(), &record).unwrap();
        assert_eq!(
            path.file_name().unwrap(),
            "Juan Perez.diagnostico.20250502T143000.000.json"
        );

        let back: DiagnosticRecord = serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn test_rewriting_same_record_keeps_both() {
        let dir = tempfile::tempdir().unwrap();
        let record = record("Juan Perez.pdf", &[SectionKind::Contrato], None);

        let first = write_artifact(dir.path(), &record).unwrap();
        let second = write_artifact(dir.path(), &record).unwrap();
        assert_ne!(first, second);
        assert!(first.exists() && second.exists());
    }

    #[test]
    fn test_manifest_reads_without_failures_field() {
        let manifest = BatchManifest {
            schema_version: SCHEMA_VERSION,
            generated_at: Utc.with_ymd_and_hms(2025, 5, 2, 14, 30, 0).unwrap(),
            source_folder: PathBuf::from("/lote"),
            records: vec![record("A.pdf", &[SectionKind::Rit], None)],
            failures: vec![],
        };
        let mut value = serde_json::to_value(&manifest).unwrap();
        value.as_object_mut().unwrap().remove("failures");

        let back: BatchManifest = serde_json::from_value(value).unwrap();
        assert_eq!(back, manifest);
    }
}
