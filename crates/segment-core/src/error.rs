use section_engine::RuleTableError;
use shared_pdf::PdfError;
use shared_types::RecordError;
use std::path::PathBuf;
use thiserror::Error;

/// Failures that end a whole invocation
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Source folder not found: {0}")]
    FolderNotFound(PathBuf),

    #[error("Diagnostic artifact not found: {0}")]
    ArtifactNotFound(PathBuf),

    #[error("Invalid diagnostic artifact {path}: {reason}")]
    InvalidArtifact { path: PathBuf, reason: String },

    #[error("Failed to read config file {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse configuration: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Invalid rule table {path}: {source}")]
    Rules {
        path: PathBuf,
        #[source]
        source: RuleTableError,
    },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl PipelineError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Failures confined to one document or one section
#[derive(Error, Debug)]
pub enum ItemError {
    #[error(transparent)]
    Pdf(#[from] PdfError),

    #[error("Source document not found: {0}")]
    SourceMissing(PathBuf),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize diagnostic: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Inconsistent diagnostic record: {0}")]
    Record(#[from] RecordError),
}

impl ItemError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
