//! Contract file segmentation pipeline
//!
//! Three stages, each runnable on its own:
//! - [`normalize`]: rename scanned PDFs to the person's name
//! - [`diagnose`]: detect the sections of each PDF and persist a diagnostic artifact
//! - [`extract`]: cut the diagnosed sections into separate PDFs
//!
//! The diagnostic artifact is the only thing passed from diagnosis to
//! extraction, so extraction can run later, elsewhere, or after a human has
//! corrected an artifact by hand.

pub mod config;
pub mod diagnose;
pub mod error;
pub mod events;
pub mod extract;
pub mod logger;
pub mod normalize;
pub mod targets;

mod batch;

pub use config::PipelineConfig;
pub use diagnose::{BatchManifest, DiagnoseReport, DiagnosisStats, DocumentFailure};
pub use error::{ItemError, PipelineError};
pub use events::{
    no_progress, CancelToken, EventSink, NullSink, PipelineEvent, Progress, ProgressFn, Stage,
};
pub use extract::ExtractReport;
pub use logger::RunLogger;
pub use normalize::{NormalizePreview, NormalizeReport, RenameOutcome};
pub use shared_types::{
    BatchSummary, DiagnosticRecord, ExtractionResult, ExtractionStatus, SectionKind,
};

use section_engine::SectionDetector;
use std::path::Path;

/// A configured pipeline: settings, detector, event sink and cancellation
pub struct Pipeline<'a> {
    config: PipelineConfig,
    detector: SectionDetector,
    sink: &'a dyn EventSink,
    cancel: CancelToken,
}

impl Pipeline<'static> {
    /// Build a pipeline that reports to no sink
    pub fn new(config: PipelineConfig) -> Result<Self, PipelineError> {
        let detector = config.detector()?;
        Ok(Self {
            config,
            detector,
            sink: &NullSink,
            cancel: CancelToken::new(),
        })
    }
}

impl<'a> Pipeline<'a> {
    /// Report run events to `sink`
    pub fn with_sink<'b>(self, sink: &'b dyn EventSink) -> Pipeline<'b> {
        Pipeline {
            config: self.config,
            detector: self.detector,
            sink,
            cancel: self.cancel,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Handle that stops the pipeline before its next document
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn normalize(
        &self,
        folder: &Path,
        progress: &ProgressFn,
    ) -> Result<NormalizeReport, PipelineError> {
        normalize::normalize_folder(
            folder,
            &self.config.normalize.boilerplate,
            self.sink,
            progress,
            &self.cancel,
        )
    }

    pub fn preview_normalization(&self, folder: &Path) -> Result<NormalizePreview, PipelineError> {
        normalize::preview_normalization(folder, &self.config.normalize.boilerplate)
    }

    pub fn diagnose(
        &self,
        folder: &Path,
        progress: &ProgressFn,
    ) -> Result<DiagnoseReport, PipelineError> {
        diagnose::diagnose_folder(
            folder,
            &self.config,
            &self.detector,
            self.sink,
            progress,
            &self.cancel,
        )
    }

    pub fn extract(
        &self,
        artifact: &Path,
        source_folder: &Path,
        progress: &ProgressFn,
    ) -> Result<ExtractReport, PipelineError> {
        extract::extract_artifact(
            artifact,
            source_folder,
            &self.config,
            self.sink,
            progress,
            &self.cancel,
        )
    }
}

/// Normalize the PDF file names in `folder` with default settings
pub fn normalize(folder: &Path, progress: &ProgressFn) -> Result<NormalizeReport, PipelineError> {
    Pipeline::new(PipelineConfig::default())?.normalize(folder, progress)
}

/// Diagnose every PDF in `folder` with default settings
pub fn diagnose(folder: &Path, progress: &ProgressFn) -> Result<DiagnoseReport, PipelineError> {
    Pipeline::new(PipelineConfig::default())?.diagnose(folder, progress)
}

/// Extract the sections described by `artifact` with default settings
pub fn extract(
    artifact: &Path,
    source_folder: &Path,
    progress: &ProgressFn,
) -> Result<ExtractReport, PipelineError> {
    Pipeline::new(PipelineConfig::default())?.extract(artifact, source_folder, progress)
}
