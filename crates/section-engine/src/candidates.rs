//! Signal evaluation and candidate generation

use crate::rules::{Extent, Placement, SectionRule, Signal};
use crate::text::{contains_phrase, fold};
use shared_pdf::PageSource;
use shared_types::SectionKind;
use std::collections::BTreeMap;
use std::ops::Range;

/// Folded page text plus raw density, computed once per document
#[derive(Debug, Clone, Default)]
pub struct FoldedPages {
    text: Vec<String>,
    density: Vec<usize>,
}

impl FoldedPages {
    pub fn from_source<S: PageSource + ?Sized>(source: &S) -> Self {
        let count = source.page_count();
        let mut text = Vec::with_capacity(count);
        let mut density = Vec::with_capacity(count);
        for index in 0..count {
            text.push(fold(source.page_text(index)));
            density.push(source.text_density(index));
        }
        Self { text, density }
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn text(&self, index: usize) -> &str {
        self.text.get(index).map(String::as_str).unwrap_or("")
    }

    pub fn density(&self, index: usize) -> usize {
        self.density.get(index).copied().unwrap_or(0)
    }
}

/// Hypothesis that `kind` begins on page `anchor` (0-based)
#[derive(Debug, Clone, PartialEq)]
pub struct SectionCandidate {
    pub kind: SectionKind,
    pub anchor: usize,
    pub confidence: f32,
    /// Human-readable description of every signal that matched
    pub signals: Vec<String>,
    /// Pages the rule attributes to the section, starting at `anchor`
    pub claim: Range<usize>,
}

/// Claims of the sections accepted so far, by kind
pub type Placed = BTreeMap<SectionKind, Range<usize>>;

/// Evaluate one signal on one page, describing the match when it holds
pub fn evaluate_signal(signal: &Signal, pages: &FoldedPages, index: usize) -> Option<String> {
    let text = pages.text(index);
    match signal {
        Signal::AnyPhrase(phrases) => phrases.iter().find(|p| contains_phrase(text, p)).cloned(),
        Signal::AllPhrases(phrases) => {
            let all = !phrases.is_empty() && phrases.iter().all(|p| contains_phrase(text, p));
            all.then(|| phrases.join(" + "))
        }
        Signal::SparseText { max_chars } => {
            let density = pages.density(index);
            (density <= *max_chars).then(|| format!("sparse page ({density} chars)"))
        }
        Signal::AnyOf(inner) => inner
            .iter()
            .find_map(|signal| evaluate_signal(signal, pages, index)),
    }
}

/// Score a page against a rule, ignoring placement.
///
/// The base confidence is the weight of the strongest matching anchor, or the
/// rule weight for marker-only rules. Every signal beyond what the rule
/// requires adds `boost`.
pub fn score_page(
    rule: &SectionRule,
    pages: &FoldedPages,
    index: usize,
    boost: f32,
) -> Option<(f32, Vec<String>)> {
    let mut signals = Vec::new();
    let mut base: Option<f32> = None;
    let mut anchor_hits = 0usize;

    for anchor in &rule.anchors {
        if let Some(hit) = evaluate_signal(&anchor.signal, pages, index) {
            anchor_hits += 1;
            base = Some(base.map_or(anchor.weight, |b| b.max(anchor.weight)));
            signals.push(hit);
        }
    }

    let base = if rule.anchors.is_empty() {
        rule.weight
    } else {
        base?
    };

    let mut marker_hits = 0usize;
    for marker in &rule.markers {
        if let Some(hit) = evaluate_signal(marker, pages, index) {
            marker_hits += 1;
            signals.push(hit);
        }
    }
    if marker_hits < rule.min_markers {
        return None;
    }

    let extra = anchor_hits.saturating_sub(1) + (marker_hits - rule.min_markers);
    let confidence = (base + boost * extra as f32).min(1.0);
    Some((confidence, signals))
}

/// Pages the rule claims for a section anchored at `anchor`, never past `limit`
fn claim(rule: &SectionRule, pages: &FoldedPages, anchor: usize, limit: usize, boost: f32) -> Range<usize> {
    let limit = limit.min(pages.len()).max(anchor + 1);
    let end = match &rule.extent {
        Extent::AnchorPage => anchor + 1,
        Extent::UntilMarker { markers, max_pages } => (anchor..limit)
            .take(*max_pages)
            .find(|&i| markers.iter().any(|m| contains_phrase(pages.text(i), m)))
            .map_or(anchor + 1, |i| i + 1),
        Extent::Continuation { signal, max_pages } => {
            let mut end = anchor + 1;
            while end < limit
                && end - anchor - 1 < *max_pages
                && evaluate_signal(signal, pages, end).is_some()
            {
                end += 1;
            }
            end
        }
        Extent::ThroughLastMatch => (anchor..limit)
            .rev()
            .find(|&i| score_page(rule, pages, i, boost).is_some())
            .map_or(anchor + 1, |i| i + 1),
    };
    anchor..end
}

fn scan(
    rule: &SectionRule,
    pages: &FoldedPages,
    window: Range<usize>,
    limit: usize,
    boost: f32,
) -> Vec<SectionCandidate> {
    let window = window.start.min(pages.len())..window.end.min(pages.len());
    window
        .filter_map(|index| {
            let (confidence, signals) = score_page(rule, pages, index, boost)?;
            Some(SectionCandidate {
                kind: rule.kind,
                anchor: index,
                confidence,
                signals,
                claim: claim(rule, pages, index, limit, boost),
            })
        })
        .collect()
}

/// Every candidate for `rule`, honoring its placement against `placed`.
///
/// Rules placed anywhere scan the whole document. Relative rules scan only the
/// window their reference sections define and yield nothing when a reference
/// section is missing.
pub fn candidates(
    rule: &SectionRule,
    pages: &FoldedPages,
    placed: &Placed,
    boost: f32,
) -> Vec<SectionCandidate> {
    let total = pages.len();
    match &rule.placement {
        Placement::Anywhere => scan(rule, pages, 0..total, total, boost),
        Placement::After { kinds, within } => kinds
            .iter()
            .filter_map(|kind| placed.get(kind))
            .map(|reference| {
                let start = reference.end;
                scan(rule, pages, start..start + within, total, boost)
            })
            .find(|found| !found.is_empty())
            .unwrap_or_default(),
        Placement::Before { kind, within } => match placed.get(kind) {
            Some(reference) => {
                let end = reference.start;
                scan(rule, pages, end.saturating_sub(*within)..end, total, boost)
            }
            None => Vec::new(),
        },
        Placement::Between { after, before } => match (placed.get(after), placed.get(before)) {
            (Some(after), Some(before)) if after.end < before.start => {
                let first = after.end;
                scan(rule, pages, first..first + 1, before.start, boost)
            }
            _ => Vec::new(),
        },
    }
}
