//! Persistent run log
//!
//! One human-readable file per invocation, laid out as
//! `<log_root>/<workflow>/<YYYY>/<MM>/<prefix>_<DD.MM.YYYY_HH.MM.SS>.log`.

use crate::error::PipelineError;
use crate::events::{EventSink, PipelineEvent, Stage};
use crate::targets::create_unique;
use chrono::{DateTime, Local};
use shared_types::{Detection, ExtractionStatus};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tracing::warn;

const RULE_WIDTH: usize = 90;

/// Render a duration the way operators read it: `45s`, `2m 5s`, `1h 2m 5s`
pub fn format_duration(duration: Duration) -> String {
    let total = duration.as_secs();
    let (hours, minutes, seconds) = (total / 3600, (total % 3600) / 60, total % 60);

    if hours == 0 && minutes == 0 {
        return format!("{seconds}s");
    }

    let mut parts = Vec::new();
    if hours > 0 {
        parts.push(format!("{hours}h"));
    }
    if minutes > 0 {
        parts.push(format!("{minutes}m"));
    }
    if seconds > 0 {
        parts.push(format!("{seconds}s"));
    }
    parts.join(" ")
}

/// Event sink writing the run log file
pub struct RunLogger {
    path: PathBuf,
    out: Mutex<BufWriter<File>>,
}

impl RunLogger {
    /// Create the log file for a run of `stage` starting now
    pub fn create(log_root: &Path, workflow: &str, stage: Stage) -> Result<Self, PipelineError> {
        Self::create_at(log_root, workflow, stage, Local::now())
    }

    /// Create the log file for a run of `stage` starting at `started`
    pub fn create_at(
        log_root: &Path,
        workflow: &str,
        stage: Stage,
        started: DateTime<Local>,
    ) -> Result<Self, PipelineError> {
        let dir = log_root
            .join(workflow)
            .join(started.format("%Y").to_string())
            .join(started.format("%m").to_string());
        fs::create_dir_all(&dir).map_err(|e| PipelineError::io(&dir, e))?;

        let stem = format!("{}_{}", stage.log_prefix(), started.format("%d.%m.%Y_%H.%M.%S"));
        let (path, file) = create_unique(&dir, &stem, "log").map_err(|e| PipelineError::io(&dir, e))?;

        Ok(Self {
            path,
            out: Mutex::new(BufWriter::new(file)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_lines(&self, lines: &[String]) {
        let mut out = self.out.lock().unwrap_or_else(PoisonError::into_inner);
        let stamp = Local::now().format("%H:%M:%S");
        let result = lines
            .iter()
            .try_for_each(|line| writeln!(out, "[{stamp}] {line}"))
            .and_then(|_| out.flush());
        if let Err(e) = result {
            warn!(path = %self.path.display(), error = %e, "failed to write run log");
        }
    }

    fn render(event: &PipelineEvent) -> Vec<String> {
        match event {
            PipelineEvent::RunStarted {
                stage,
                folder,
                total,
            } => vec![
                "=".repeat(RULE_WIDTH),
                stage.title().to_string(),
                format!("Started: {}", Local::now().format("%Y-%m-%d %H:%M:%S")),
                format!("Folder: {}", folder.display()),
                format!("Items: {total}"),
                "=".repeat(RULE_WIDTH),
            ],
            PipelineEvent::FileRenamed { from, to } => vec![format!("RENAMED   {from} -> {to}")],
            PipelineEvent::FileUnchanged { file } => vec![format!("UNCHANGED {file}")],
            PipelineEvent::RenameConflict { file, target } => {
                vec![format!("CONFLICT  {file} -> {target} (target exists, skipped)")]
            }
            PipelineEvent::DocumentDiagnosed { record, elapsed_ms } => {
                let mut lines = vec![
                    "-".repeat(RULE_WIDTH),
                    format!("Document: {}", record.document_name),
                    format!("Pages: {}", record.page_count),
                    format!(
                        "Contract date: {}",
                        record.contract_date.as_deref().unwrap_or("not found")
                    ),
                    format!(
                        "Sections found: {}/{} in {}",
                        record.found_count(),
                        record.sections.len(),
                        format_duration(Duration::from_millis(*elapsed_ms))
                    ),
                ];
                for outcome in &record.sections {
                    let line = match &outcome.detection {
                        Detection::Found {
                            start_page,
                            end_page,
                            confidence,
                            ..
                        } => format!(
                            "  found     {:<58} pages {}-{} ({:.2})",
                            outcome.kind.label(),
                            start_page,
                            end_page.saturating_sub(1),
                            confidence
                        ),
                        Detection::NotFound => {
                            format!("  not found {}", outcome.kind.label())
                        }
                    };
                    lines.push(line);
                }
                lines
            }
            PipelineEvent::ArtifactWritten { path } => {
                vec![format!("Diagnostic written: {}", path.display())]
            }
            PipelineEvent::SectionExtracted { result } => {
                let line = match &result.status {
                    ExtractionStatus::Written { path, bytes } => format!(
                        "  written   {} ({} bytes, {}ms)",
                        path.display(),
                        bytes,
                        result.elapsed_ms
                    ),
                    ExtractionStatus::Collision { path } => {
                        format!("  collision {} (exists, skipped)", path.display())
                    }
                    ExtractionStatus::SkippedByDiagnosis => {
                        format!("  skipped   {} (not found in diagnosis)", result.kind)
                    }
                    ExtractionStatus::Failed { reason } => {
                        format!("  error     {}: {}", result.kind, reason)
                    }
                };
                vec![line]
            }
            PipelineEvent::DocumentExtracted {
                document,
                written,
                elapsed_ms,
            } => vec![format!(
                "Document {document}: {written} section file(s) written in {}",
                format_duration(Duration::from_millis(*elapsed_ms))
            )],
            PipelineEvent::ItemSkipped { item, reason } => vec![format!("SKIPPED   {item}: {reason}")],
            PipelineEvent::ItemFailed { item, reason } => vec![format!("ERROR     {item}: {reason}")],
            PipelineEvent::Report { text } => text.lines().map(str::to_string).collect(),
            PipelineEvent::RunFinished { stage, summary } => vec![
                String::new(),
                "=".repeat(RULE_WIDTH),
                format!("{} FINISHED", stage.title()),
                format!("Finished: {}", Local::now().format("%Y-%m-%d %H:%M:%S")),
                format!(
                    "Elapsed: {}",
                    format_duration(Duration::from_millis(summary.elapsed_ms))
                ),
                format!("Succeeded: {}", summary.succeeded),
                format!("Skipped: {}", summary.skipped),
                format!("Errors: {}", summary.failed),
                format!("Total: {}", summary.total()),
                "=".repeat(RULE_WIDTH),
            ],
        }
    }
}

impl EventSink for RunLogger {
    fn record(&self, event: &PipelineEvent) {
        self.write_lines(&Self::render(event));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use shared_types::BatchSummary;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_secs(0)), "0s");
        assert_eq!(format_duration(Duration::from_secs(45)), "45s");
        assert_eq!(format_duration(Duration::from_secs(120)), "2m");
        assert_eq!(format_duration(Duration::from_secs(125)), "2m 5s");
        assert_eq!(format_duration(Duration::from_secs(3725)), "1h 2m 5s");
        assert_eq!(format_duration(Duration::from_secs(3605)), "1h 5s");
        assert_eq!(format_duration(Duration::from_millis(59_999)), "59s");
    }

    #[test]
    fn test_log_path_layout() {
        let root = tempfile::tempdir().unwrap();
        let started = Local.with_ymd_and_hms(2025, 3, 7, 9, 5, 1).unwrap();
        let logger = RunLogger::create_at(root.path(), "contratos", Stage::Diagnose, started).unwrap();

        let expected = root
            .path()
            .join("contratos/2025/03/diagnostico_07.03.2025_09.05.01.log");
        assert_eq!(logger.path(), expected);
    }

    #[test]
    fn test_same_second_runs_get_distinct_files() {
        let root = tempfile::tempdir().unwrap();
        let started = Local.with_ymd_and_hms(2025, 3, 7, 9, 5, 1).unwrap();
        let first = RunLogger::create_at(root.path(), "contratos", Stage::Extract, started).unwrap();
        let second = RunLogger::create_at(root.path(), "contratos", Stage::Extract, started).unwrap();
        assert_ne!(first.path(), second.path());
    }

    #[test]
    fn test_events_are_written() {
        let root = tempfile::tempdir().unwrap();
        let logger = RunLogger::create(root.path(), "contratos", Stage::Normalize).unwrap();

        logger.record(&PipelineEvent::RunStarted {
            stage: Stage::Normalize,
            folder: PathBuf::from("/data/lote"),
            total: 2,
        });
        logger.record(&PipelineEvent::FileRenamed {
            from: "Contrato - Juan Perez (2).pdf".into(),
            to: "Juan Perez.pdf".into(),
        });
        logger.record(&PipelineEvent::RunFinished {
            stage: Stage::Normalize,
            summary: BatchSummary {
                succeeded: 1,
                skipped: 1,
                failed: 0,
                elapsed_ms: 125_000,
            },
        });

        let text = fs::read_to_string(logger.path()).unwrap();
        assert!(text.contains("FILENAME NORMALIZATION"));
        assert!(text.contains("RENAMED   Contrato - Juan Perez (2).pdf -> Juan Perez.pdf"));
        assert!(text.contains("Elapsed: 2m 5s"));
        assert!(text.contains("Total: 2"));
    }
}
