//! An opened source PDF with lazily extracted page text

use crate::error::PdfError;
use crate::pages::{PageSource, TextPages};
use lopdf::Document;
use once_cell::unsync::OnceCell;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// One source PDF, held open for the duration of a single pipeline stage.
///
/// Page text is extracted on first access and cached. Text comes from lopdf
/// page by page; when lopdf cannot decode a page the whole document is run
/// through pdf-extract once and split on form feeds.
pub struct PdfDocument {
    path: PathBuf,
    bytes: Vec<u8>,
    inner: Document,
    page_numbers: Vec<u32>,
    cache: Vec<OnceCell<String>>,
    fallback: OnceCell<Option<Vec<String>>>,
}

impl PdfDocument {
    /// Read and parse a PDF from disk
    pub fn open(path: impl AsRef<Path>) -> Result<Self, PdfError> {
        let path = path.as_ref();
        let bytes = fs::read(path).map_err(|source| PdfError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_bytes(path, bytes)
    }

    /// Parse PDF bytes, remembering `path` as the document identity
    pub fn from_bytes(path: impl Into<PathBuf>, bytes: Vec<u8>) -> Result<Self, PdfError> {
        let path = path.into();
        let inner =
            Document::load_mem(&bytes).map_err(|e| PdfError::ParseError(e.to_string()))?;
        let page_numbers: Vec<u32> = inner.get_pages().keys().copied().collect();
        let cache = page_numbers.iter().map(|_| OnceCell::new()).collect();

        debug!(path = %path.display(), pages = page_numbers.len(), "opened PDF");

        Ok(Self {
            path,
            bytes,
            inner,
            page_numbers,
            cache,
            fallback: OnceCell::new(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The parsed lopdf document, for slicing
    pub fn lopdf(&self) -> &Document {
        &self.inner
    }

    fn extract_page(&self, index: usize) -> String {
        let Some(&page_number) = self.page_numbers.get(index) else {
            return String::new();
        };

        match self.inner.extract_text(&[page_number]) {
            Ok(text) => text,
            Err(e) => {
                debug!(page = page_number, error = %e, "lopdf text extraction failed");
                self.fallback_pages()
                    .and_then(|pages| pages.get(index).cloned())
                    .unwrap_or_default()
            }
        }
    }

    fn fallback_pages(&self) -> Option<&Vec<String>> {
        self.fallback
            .get_or_init(|| match pdf_extract::extract_text_from_mem(&self.bytes) {
                Ok(text) => {
                    let TextPages(pages) = TextPages::from_form_feeds(&text);
                    if pages.len() == self.page_numbers.len() {
                        Some(pages)
                    } else {
                        warn!(
                            path = %self.path.display(),
                            expected = self.page_numbers.len(),
                            got = pages.len(),
                            "fallback extraction page count mismatch"
                        );
                        None
                    }
                }
                Err(e) => {
                    warn!(path = %self.path.display(), error = %e, "fallback extraction failed");
                    None
                }
            })
            .as_ref()
    }
}

impl PageSource for PdfDocument {
    fn page_count(&self) -> usize {
        self.page_numbers.len()
    }

    fn page_text(&self, index: usize) -> &str {
        match self.cache.get(index) {
            Some(cell) => cell.get_or_init(|| self.extract_page(index)),
            None => "",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::build_text_pdf;

    #[test]
    fn test_reads_page_text_in_order() {
        let bytes = build_text_pdf(&["First page", "Second page", "Third page"]);
        let doc = PdfDocument::from_bytes("/tmp/doc.pdf", bytes).unwrap();

        assert_eq!(doc.page_count(), 3);
        assert!(doc.page_text(0).contains("First page"));
        assert!(doc.page_text(2).contains("Third page"));
        assert_eq!(doc.page_text(9), "");
    }

    #[test]
    fn test_blank_page_has_no_density() {
        let bytes = build_text_pdf(&["Some text", ""]);
        let doc = PdfDocument::from_bytes("/tmp/doc.pdf", bytes).unwrap();

        assert!(doc.text_density(0) > 0);
        assert_eq!(doc.text_density(1), 0);
        assert!(doc.has_text());
    }

    #[test]
    fn test_garbage_bytes_fail_to_parse() {
        let result = PdfDocument::from_bytes("/tmp/bad.pdf", b"not a pdf".to_vec());
        assert!(matches!(result, Err(PdfError::ParseError(_))));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let result = PdfDocument::open("/definitely/not/here.pdf");
        assert!(matches!(result, Err(PdfError::Io { .. })));
    }
}
