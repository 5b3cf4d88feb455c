//! Filename normalization
//!
//! Scanned contracts arrive with names like `Contrato - JUAN PEREZ (2).pdf`
//! or `2024-12-15-juan_perez.pdf`. Each is renamed in place to the person's
//! name in title case, `Juan Perez.pdf`, without ever replacing another file.

use crate::error::PipelineError;
use crate::events::{CancelToken, EventSink, PipelineEvent, ProgressCounter, ProgressFn, Stage};
use crate::targets::TargetClaims;
use lazy_static::lazy_static;
use regex::Regex;
use section_engine::text::fold;
use shared_types::BatchSummary;
use std::fs;
use std::io;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info, warn};

lazy_static! {
    /// One or more trailing duplicate markers: "(2)", "(3) (1)"
    static ref DUPLICATE_MARKERS: Regex = Regex::new(r"(\s*\(\d+\))+\s*$").unwrap();
}

/// What happened to one file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenameOutcome {
    Renamed { from: String, to: String },
    /// Already normalized, or no name could be derived
    Unchanged { file: String },
    /// The target name exists or was taken by an earlier file of the batch
    Conflict { file: String, target: String },
    Failed { file: String, reason: String },
}

impl RenameOutcome {
    pub fn file(&self) -> &str {
        match self {
            RenameOutcome::Renamed { from, .. } => from,
            RenameOutcome::Unchanged { file }
            | RenameOutcome::Conflict { file, .. }
            | RenameOutcome::Failed { file, .. } => file,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct NormalizeReport {
    pub outcomes: Vec<RenameOutcome>,
    pub summary: BatchSummary,
}

impl NormalizeReport {
    pub fn renamed(&self) -> usize {
        self.count(|o| matches!(o, RenameOutcome::Renamed { .. }))
    }

    pub fn unchanged(&self) -> usize {
        self.count(|o| matches!(o, RenameOutcome::Unchanged { .. }))
    }

    pub fn conflicts(&self) -> usize {
        self.count(|o| matches!(o, RenameOutcome::Conflict { .. }))
    }

    fn count(&self, pred: impl Fn(&RenameOutcome) -> bool) -> usize {
        self.outcomes.iter().filter(|o| pred(o)).count()
    }
}

/// Counts from a dry run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NormalizePreview {
    pub total: usize,
    pub to_rename: usize,
    pub already_normalized: usize,
}

fn has_pdf_extension(name: &str) -> bool {
    Path::new(name)
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"))
}

fn title_case(text: &str) -> String {
    text.split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Canonical name for `file_name`, or None when it is not a PDF or no name segment remains.
///
/// The stem is split on `-`. Segments that are boilerplate (compared without
/// case or accents) or carry no letter at all, such as dates, are dropped and
/// the first remaining segment is the name.
pub fn normalized_name(file_name: &str, boilerplate: &[String]) -> Option<String> {
    if !has_pdf_extension(file_name) {
        return None;
    }
    let stem = &file_name[..file_name.len() - ".pdf".len()];
    let stem = stem.replace('_', " ");
    let boilerplate: Vec<String> = boilerplate.iter().map(|b| fold(b)).collect();

    let name = stem
        .split('-')
        .map(|segment| {
            let collapsed = segment.split_whitespace().collect::<Vec<_>>().join(" ");
            DUPLICATE_MARKERS.replace(&collapsed, "").trim().to_string()
        })
        .filter(|segment| !segment.is_empty())
        .filter(|segment| segment.chars().any(char::is_alphabetic))
        .find(|segment| !boilerplate.contains(&fold(segment)))?;

    Some(format!("{}.pdf", title_case(&name)))
}

/// PDF file names in `folder`, sorted
fn list_pdfs(folder: &Path) -> Result<Vec<String>, PipelineError> {
    if !folder.is_dir() {
        return Err(PipelineError::FolderNotFound(folder.to_path_buf()));
    }
    let entries = fs::read_dir(folder).map_err(|e| PipelineError::io(folder, e))?;

    let mut names: Vec<String> = entries
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_ok_and(|t| t.is_file()))
        .filter_map(|entry| entry.file_name().into_string().ok())
        .filter(|name| has_pdf_extension(name))
        .collect();
    names.sort();
    Ok(names)
}

/// Count how many PDFs in `folder` would be renamed, touching nothing
pub fn preview_normalization(folder: &Path, boilerplate: &[String]) -> Result<NormalizePreview, PipelineError> {
    let names = list_pdfs(folder)?;
    let to_rename = names
        .iter()
        .filter(|name| normalized_name(name, boilerplate).is_some_and(|target| &target != *name))
        .count();

    Ok(NormalizePreview {
        total: names.len(),
        to_rename,
        already_normalized: names.len() - to_rename,
    })
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Move `source` to `destination`, failing with `AlreadyExists` rather than
/// replacing a file that appears at `destination` in the meantime.
///
/// The move is a hard link followed by removing the old name. Case-only
/// renames, and filesystems without hard links, fall back to `fs::rename`.
fn move_no_clobber(source: &Path, destination: &Path) -> io::Result<()> {
    if same_file(source, destination) {
        return fs::rename(source, destination);
    }
    match fs::hard_link(source, destination) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => return Err(e),
        Err(e) => {
            debug!(error = %e, "hard link unavailable, renaming");
            if destination.exists() {
                return Err(io::Error::from(io::ErrorKind::AlreadyExists));
            }
            return fs::rename(source, destination);
        }
    }
    if let Err(e) = fs::remove_file(source) {
        let _ = fs::remove_file(destination);
        return Err(e);
    }
    Ok(())
}

fn rename_one(folder: &Path, file: &str, boilerplate: &[String], claims: &TargetClaims) -> RenameOutcome {
    let Some(target) = normalized_name(file, boilerplate) else {
        return RenameOutcome::Unchanged { file: file.to_string() };
    };
    if target == file {
        return RenameOutcome::Unchanged { file: file.to_string() };
    }

    let source = folder.join(file);
    let destination = folder.join(&target);
    let conflict = || RenameOutcome::Conflict {
        file: file.to_string(),
        target: target.clone(),
    };

    if !claims.claim(&destination) {
        return conflict();
    }
    // A case-only rename on a case-insensitive filesystem resolves to the same file
    if destination.exists() && !same_file(&source, &destination) {
        return conflict();
    }

    match move_no_clobber(&source, &destination) {
        Ok(()) => RenameOutcome::Renamed {
            from: file.to_string(),
            to: target,
        },
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => conflict(),
        Err(e) => {
            claims.release(&destination);
            RenameOutcome::Failed {
                file: file.to_string(),
                reason: e.to_string(),
            }
        }
    }
}

/// Rename every PDF in `folder` to its canonical name.
///
/// Files are handled in lexicographic order, so when two files map to the
/// same name the first one wins and the other is reported as a conflict.
/// Per-file failures are reported and do not stop the batch.
pub fn normalize_folder(
    folder: &Path,
    boilerplate: &[String],
    sink: &dyn EventSink,
    progress: &ProgressFn,
    cancel: &CancelToken,
) -> Result<NormalizeReport, PipelineError> {
    let start = Instant::now();
    let names = list_pdfs(folder)?;
    info!(folder = %folder.display(), files = names.len(), "normalizing file names");
    sink.record(&PipelineEvent::RunStarted {
        stage: Stage::Normalize,
        folder: folder.to_path_buf(),
        total: names.len(),
    });

    let claims = TargetClaims::new();
    let counter = ProgressCounter::new(names.len(), progress);
    let mut report = NormalizeReport::default();

    for name in &names {
        if cancel.is_cancelled() {
            sink.record(&PipelineEvent::ItemSkipped {
                item: name.clone(),
                reason: "cancelled".into(),
            });
            report.summary.record_skip();
            counter.tick(format!("Cancelled: {name}"));
            continue;
        }

        let outcome = rename_one(folder, name, boilerplate, &claims);
        match &outcome {
            RenameOutcome::Renamed { from, to } => {
                debug!(from = %from, to = %to, "renamed");
                report.summary.record_success();
                sink.record(&PipelineEvent::FileRenamed {
                    from: from.clone(),
                    to: to.clone(),
                });
            }
            RenameOutcome::Unchanged { file } => {
                report.summary.record_skip();
                sink.record(&PipelineEvent::FileUnchanged { file: file.clone() });
            }
            RenameOutcome::Conflict { file, target } => {
                warn!(file = %file, target = %target, "rename target exists, skipped");
                report.summary.record_skip();
                sink.record(&PipelineEvent::RenameConflict {
                    file: file.clone(),
                    target: target.clone(),
                });
            }
            RenameOutcome::Failed { file, reason } => {
                warn!(file = %file, error = %reason, "rename failed");
                report.summary.record_failure();
                sink.record(&PipelineEvent::ItemFailed {
                    item: file.clone(),
                    reason: reason.clone(),
                });
            }
        }
        counter.tick(format!("Normalized: {name}"));
        report.outcomes.push(outcome);
    }

    report.summary.elapsed_ms = start.elapsed().as_millis() as u64;
    info!(summary = %report.summary, "normalization finished");
    sink.record(&PipelineEvent::RunFinished {
        stage: Stage::Normalize,
        summary: report.summary,
    });
    Ok(report)
}
