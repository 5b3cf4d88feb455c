//! Read-only page text access

/// Anything that can hand out the text of its pages.
///
/// Indices are 0-based. Implementations must return an empty string for a
/// page without text rather than failing.
pub trait PageSource {
    fn page_count(&self) -> usize;

    fn page_text(&self, index: usize) -> &str;

    /// Number of non-whitespace characters on a page
    fn text_density(&self, index: usize) -> usize {
        self.page_text(index)
            .chars()
            .filter(|c| !c.is_whitespace())
            .count()
    }

    /// True when at least one page carries text
    fn has_text(&self) -> bool {
        (0..self.page_count()).any(|i| self.text_density(i) > 0)
    }
}

/// Page text held in memory
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextPages(pub Vec<String>);

impl TextPages {
    pub fn new<S: Into<String>>(pages: impl IntoIterator<Item = S>) -> Self {
        Self(pages.into_iter().map(Into::into).collect())
    }

    /// Split text on form feed characters, one page per chunk
    pub fn from_form_feeds(text: &str) -> Self {
        Self::new(text.split('\x0C'))
    }
}

impl PageSource for TextPages {
    fn page_count(&self) -> usize {
        self.0.len()
    }

    fn page_text(&self, index: usize) -> &str {
        self.0.get(index).map(String::as_str).unwrap_or("")
    }
}
