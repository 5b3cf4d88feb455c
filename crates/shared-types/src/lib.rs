//! Domain types shared by the segmentation pipeline
//!
//! The diagnostic record defined here is the interchange artifact between the
//! diagnosis and extraction stages, so its serialized shape is a stable contract.

pub mod record;
pub mod section;
pub mod summary;

pub use record::{
    Detection, DiagnosticRecord, RecordError, SectionOutcome, SectionSpan, SCHEMA_VERSION,
};
pub use section::SectionKind;
pub use summary::{BatchSummary, ExtractionResult, ExtractionStatus};
