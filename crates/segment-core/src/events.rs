//! Progress reporting, run events and cancellation
//!
//! Nothing here is global: every entry point receives the sink, progress
//! callback and cancel token it should use.

use shared_types::{BatchSummary, DiagnosticRecord, ExtractionResult};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// Pipeline stage, one run log per invocation of a stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Normalize,
    Diagnose,
    Extract,
}

impl Stage {
    /// Run log file name prefix
    pub fn log_prefix(self) -> &'static str {
        match self {
            Stage::Normalize => "normalizacion",
            Stage::Diagnose => "diagnostico",
            Stage::Extract => "extraccion",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Stage::Normalize => "FILENAME NORMALIZATION",
            Stage::Diagnose => "CONTRACT DIAGNOSIS",
            Stage::Extract => "SECTION EXTRACTION",
        }
    }
}

/// Something that happened during a run, in the order it happened per item
#[derive(Debug, Clone)]
pub enum PipelineEvent {
    RunStarted {
        stage: Stage,
        folder: PathBuf,
        total: usize,
    },
    FileRenamed {
        from: String,
        to: String,
    },
    FileUnchanged {
        file: String,
    },
    RenameConflict {
        file: String,
        target: String,
    },
    DocumentDiagnosed {
        record: DiagnosticRecord,
        elapsed_ms: u64,
    },
    ArtifactWritten {
        path: PathBuf,
    },
    SectionExtracted {
        result: ExtractionResult,
    },
    DocumentExtracted {
        document: String,
        written: usize,
        elapsed_ms: u64,
    },
    ItemSkipped {
        item: String,
        reason: String,
    },
    ItemFailed {
        item: String,
        reason: String,
    },
    /// Multi-line text such as the diagnosis report
    Report {
        text: String,
    },
    RunFinished {
        stage: Stage,
        summary: BatchSummary,
    },
}

/// Receives run events. Sinks are shared between worker threads.
pub trait EventSink: Sync {
    fn record(&self, event: &PipelineEvent);
}

/// Discards every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl EventSink for NullSink {
    fn record(&self, _event: &PipelineEvent) {}
}

impl<F> EventSink for F
where
    F: Fn(&PipelineEvent) + Sync,
{
    fn record(&self, event: &PipelineEvent) {
        self(event)
    }
}

/// Per-item progress notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Progress {
    /// Items finished so far, including this one
    pub current: usize,
    pub total: usize,
    pub message: String,
}

pub type ProgressFn<'a> = dyn Fn(&Progress) + Sync + 'a;

/// Progress callback that ignores every notification
pub fn no_progress(_: &Progress) {}

/// Counts finished items across worker threads
pub(crate) struct ProgressCounter<'a> {
    done: AtomicUsize,
    total: usize,
    callback: &'a ProgressFn<'a>,
}

impl<'a> ProgressCounter<'a> {
    pub(crate) fn new(total: usize, callback: &'a ProgressFn<'a>) -> Self {
        Self {
            done: AtomicUsize::new(0),
            total,
            callback,
        }
    }

    pub(crate) fn tick(&self, message: impl Into<String>) {
        let current = self.done.fetch_add(1, Ordering::SeqCst) + 1;
        (self.callback)(&Progress {
            current,
            total: self.total,
            message: message.into(),
        });
    }
}

/// Cooperative cancellation, checked before each document
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_cancel_is_shared_between_clones() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        token.cancel();
        assert!(clone.is_cancelled());
    }

    #[test]
    fn test_closure_sink() {
        let seen = Mutex::new(Vec::new());
        let sink = |event: &PipelineEvent| {
            if let PipelineEvent::FileUnchanged { file } = event {
                seen.lock().unwrap().push(file.clone());
            }
        };
        sink.record(&PipelineEvent::FileUnchanged { file: "a.pdf".into() });
        assert_eq!(*seen.lock().unwrap(), vec!["a.pdf".to_string()]);
    }

    #[test]
    fn test_progress_counter_counts_up() {
        let seen = Mutex::new(Vec::new());
        let callback = |p: &Progress| seen.lock().unwrap().push((p.current, p.total));
        let counter = ProgressCounter::new(2, &callback);
        counter.tick("one");
        counter.tick("two");
        assert_eq!(*seen.lock().unwrap(), vec![(1, 2), (2, 2)]);
    }
}
