//! Section anchor detection for scanned contract files
//!
//! Given the page text of one document, locate where each of the twelve
//! catalog sections begins and extract the contract date. Detection is a pure
//! function of page text: rules in [`rules`] produce scored candidates, and
//! [`resolve`] picks a non-overlapping set of them.
//!
//! Position-free rules are resolved first. Rules placed relative to another
//! section (the dependants form, the RIT/RISST acknowledgement, the Chinalco
//! acknowledgement) are then evaluated against those results and resolved on
//! top of them.

pub mod candidates;
pub mod date;
pub mod resolve;
pub mod rules;
pub mod text;

pub use candidates::{FoldedPages, SectionCandidate};
pub use date::ContractDate;
pub use resolve::ResolvedSection;
pub use rules::{RuleTable, RuleTableError, SectionRule};

use candidates::{candidates, Placed};
use resolve::{into_sections, resolve};
use serde::{Deserialize, Serialize};
use shared_pdf::PageSource;
use shared_types::{Detection, SectionKind};
use tracing::debug;

/// Detector tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Candidates below this confidence are discarded
    pub min_confidence: f32,
    /// Added per matched signal beyond what a rule requires
    pub boost_per_signal: f32,
    /// Most pages scanned for the contract date
    pub date_window_pages: usize,
    /// Pages with at most this many text characters count as unreadable scans
    pub illegible_max_chars: usize,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            min_confidence: 0.5,
            boost_per_signal: 0.05,
            date_window_pages: 15,
            illegible_max_chars: rules::DEFAULT_ILLEGIBLE_MAX_CHARS,
        }
    }
}

/// Everything detection learned about one document
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentDiagnosis {
    pub page_count: usize,
    /// Found sections, sorted by start page
    pub sections: Vec<ResolvedSection>,
    pub contract_date: Option<ContractDate>,
}

impl DocumentDiagnosis {
    pub fn section(&self, kind: SectionKind) -> Option<&ResolvedSection> {
        self.sections.iter().find(|s| s.span.kind == kind)
    }

    /// Found sections as record detections
    pub fn detections(&self) -> impl Iterator<Item = (SectionKind, Detection)> + '_ {
        self.sections.iter().map(|section| {
            (
                section.span.kind,
                Detection::Found {
                    start_page: section.span.start_page,
                    end_page: section.span.end_page,
                    confidence: section.confidence,
                    signals: section.signals.clone(),
                },
            )
        })
    }
}

pub struct SectionDetector {
    config: DetectorConfig,
    table: RuleTable,
}

impl Default for SectionDetector {
    fn default() -> Self {
        Self::new(DetectorConfig::default())
    }
}

impl SectionDetector {
    /// Detector with the built-in rule table
    pub fn new(config: DetectorConfig) -> Self {
        let table = RuleTable::standard(config.illegible_max_chars);
        Self { config, table }
    }

    /// Detector with a custom rule table
    pub fn with_rules(config: DetectorConfig, table: RuleTable) -> Result<Self, RuleTableError> {
        Ok(Self {
            config,
            table: table.validated()?,
        })
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    pub fn rules(&self) -> &RuleTable {
        &self.table
    }

    /// Detect sections and the contract date of one document
    pub fn detect<S: PageSource + ?Sized>(&self, source: &S) -> DocumentDiagnosis {
        let pages = FoldedPages::from_source(source);
        self.detect_folded(&pages)
    }

    pub fn detect_folded(&self, pages: &FoldedPages) -> DocumentDiagnosis {
        let boost = self.config.boost_per_signal;
        let min_confidence = self.config.min_confidence;
        let (relative, fixed): (Vec<&SectionRule>, Vec<&SectionRule>) = self
            .table
            .rules
            .iter()
            .partition(|rule| rule.placement.is_relative());

        let mut accepted = Vec::new();

        let pool = fixed
            .iter()
            .flat_map(|rule| candidates(rule, pages, &Placed::new(), boost))
            .collect();
        resolve(&mut accepted, pool, &self.table, min_confidence);

        let placed: Placed = accepted.iter().map(|c| (c.kind, c.claim.clone())).collect();
        let pool = relative
            .iter()
            .flat_map(|rule| candidates(rule, pages, &placed, boost))
            .collect();
        resolve(&mut accepted, pool, &self.table, min_confidence);

        let sections = into_sections(accepted, pages.len());

        let date_window = sections
            .iter()
            .find(|s| s.span.kind == SectionKind::Contrato)
            .map_or(0..self.config.date_window_pages, |s| {
                (s.span.start_page as usize - 1)..(s.span.end_page as usize - 1)
            });
        let contract_date =
            date::extract_contract_date(pages, date_window, self.config.date_window_pages);

        debug!(
            pages = pages.len(),
            found = sections.len(),
            date = ?contract_date.map(|d| d.to_string()),
            "detection complete"
        );

        DocumentDiagnosis {
            page_count: pages.len(),
            sections,
            contract_date,
        }
    }
}
