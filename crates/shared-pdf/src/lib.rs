//! Shared PDF handling utilities
//!
//! This crate provides page-level text access and page-range slicing on top
//! of lopdf. Documents are opened once per pipeline stage and their page text
//! is extracted lazily and cached.

pub mod document;
pub mod error;
pub mod pages;
pub mod slice;

#[cfg(any(test, feature = "fixtures"))]
pub mod fixtures;

pub use document::PdfDocument;
pub use error::PdfError;
pub use pages::{PageSource, TextPages};
pub use slice::slice_pages;
