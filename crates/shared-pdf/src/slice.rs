//! Page-range extraction
//!
//! Builds a new PDF holding a contiguous run of pages from a parsed source
//! document: clone, drop every page outside the range, prune the objects that
//! are no longer reachable, and serialize.

use crate::error::PdfError;
use lopdf::Document;
use std::ops::Range;

/// Extract pages `range` (1-indexed, end exclusive) into new PDF bytes
pub fn slice_pages(doc: &Document, range: Range<u32>) -> Result<Vec<u8>, PdfError> {
    if range.start == 0 {
        return Err(PdfError::InvalidRange(
            "Page numbers must be >= 1".into(),
        ));
    }
    if range.is_empty() {
        return Err(PdfError::InvalidRange(format!(
            "Empty range {}..{}",
            range.start, range.end
        )));
    }

    let page_count = doc.get_pages().len() as u32;
    if range.end - 1 > page_count {
        return Err(PdfError::InvalidRange(format!(
            "Page {} does not exist (document has {} pages)",
            range.end - 1,
            page_count
        )));
    }

    let mut new_doc = doc.clone();

    // Delete from the back so lower page numbers stay valid
    let mut pages_to_delete: Vec<u32> = (1..=page_count).filter(|p| !range.contains(p)).collect();
    pages_to_delete.reverse();
    for page_num in pages_to_delete {
        new_doc.delete_pages(&[page_num]);
    }

    new_doc.prune_objects();
    new_doc.compress();

    let mut buffer = Vec::new();
    new_doc
        .save_to(&mut buffer)
        .map_err(|e| PdfError::OperationError(format!("Save failed: {}", e)))?;

    Ok(buffer)
}
