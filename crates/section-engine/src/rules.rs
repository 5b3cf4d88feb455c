//! Heuristic rule table for the twelve contract sections
//!
//! Each section kind is described by data only: which page signals anchor it,
//! which corroborating markers confirm it, where in the document it may sit
//! relative to other sections, and how far it claims to extend. The detector
//! evaluates this table generically; tuning a rule never touches control flow.

use crate::text::fold;
use serde::{Deserialize, Serialize};
use shared_types::SectionKind;
use thiserror::Error;

/// Default text density at or below which a page counts as an unreadable scan
pub const DEFAULT_ILLEGIBLE_MAX_CHARS: usize = 100;

/// Upper bound on consecutive sparse pages attributed to the dependants form
const DERECHOHABIENTE_MAX_PAGES: usize = 50;

/// A page-local test
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Signal {
    /// At least one phrase appears on the page
    AnyPhrase(Vec<String>),
    /// Every phrase appears on the page
    AllPhrases(Vec<String>),
    /// The page carries at most `max_chars` non-whitespace characters
    SparseText { max_chars: usize },
    /// At least one nested signal holds
    AnyOf(Vec<Signal>),
}

impl Signal {
    fn folded(self) -> Self {
        match self {
            Signal::AnyPhrase(p) => Signal::AnyPhrase(p.iter().map(|s| fold(s)).collect()),
            Signal::AllPhrases(p) => Signal::AllPhrases(p.iter().map(|s| fold(s)).collect()),
            Signal::AnyOf(inner) => Signal::AnyOf(inner.into_iter().map(Signal::folded).collect()),
            sparse @ Signal::SparseText { .. } => sparse,
        }
    }
}

/// An anchor signal together with the confidence it grants on its own
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Anchor {
    pub signal: Signal,
    pub weight: f32,
}

/// Where a section may start, relative to sections found in the first pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum Placement {
    Anywhere,
    /// Within `within` pages after the anchor of the first listed kind that was found
    After {
        kinds: Vec<SectionKind>,
        within: usize,
    },
    /// Within `within` pages before the anchor of `kind`
    Before { kind: SectionKind, within: usize },
    /// On the first page after the claim of `after`, and no later than the anchor of `before`
    Between {
        after: SectionKind,
        before: SectionKind,
    },
}

impl Placement {
    pub fn is_relative(&self) -> bool {
        !matches!(self, Placement::Anywhere)
    }
}

/// Which candidate a kind prefers when several pages match equally well
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Occurrence {
    First,
    Last,
}

/// Pages a candidate claims beyond its anchor. Relative placements are
/// measured from the end of this claim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum Extent {
    AnchorPage,
    /// Through the first page (from the anchor on) carrying one of `markers`
    UntilMarker {
        markers: Vec<String>,
        max_pages: usize,
    },
    /// Following pages that keep matching `signal`, at most `max_pages` of them
    Continuation { signal: Signal, max_pages: usize },
    /// Through the last page of the document that matches the rule
    ThroughLastMatch,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionRule {
    pub kind: SectionKind,
    /// Confidence for rules without anchors (marker-only rules)
    #[serde(default)]
    pub weight: f32,
    #[serde(default)]
    pub anchors: Vec<Anchor>,
    #[serde(default)]
    pub markers: Vec<Signal>,
    #[serde(default)]
    pub min_markers: usize,
    pub placement: Placement,
    pub occurrence: Occurrence,
    pub extent: Extent,
}

#[derive(Error, Debug)]
pub enum RuleTableError {
    #[error("Failed to parse rule table: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("No rule for section '{0}'")]
    MissingKind(SectionKind),

    #[error("More than one rule for section '{0}'")]
    DuplicateKind(SectionKind),

    #[error("Rule for '{0}' has no anchor and requires no marker")]
    EmptyRule(SectionKind),

    #[error("Rule for '{0}' refers to another relative section '{1}'")]
    ChainedPlacement(SectionKind, SectionKind),
}

/// The complete rule set, one rule per kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleTable {
    pub rules: Vec<SectionRule>,
}

impl Default for RuleTable {
    fn default() -> Self {
        Self::standard(DEFAULT_ILLEGIBLE_MAX_CHARS)
    }
}

fn phrases(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn any(items: &[&str]) -> Signal {
    Signal::AnyPhrase(phrases(items))
}

fn all(items: &[&str]) -> Signal {
    Signal::AllPhrases(phrases(items))
}

fn each(items: &[&str]) -> Vec<Signal> {
    items.iter().map(|p| any(&[p])).collect()
}

fn anchored(signal: Signal, weight: f32) -> Anchor {
    Anchor { signal, weight }
}

/// Alta SUNAT first page
pub const ALTA_PRIMARY: &[&str] = &[
    "formulario 1604",
    "comprobante de informacion registrada",
    "se realizo satisfactoriamente la modificacion del registro del trabajador",
    "constancia de modificacion o actualizacion de datos",
];

/// Alta SUNAT follow-up pages from the T-Registro system
pub const ALTA_SECONDARY: &[&str] = &[
    "t-registro",
    "t - registro",
    "t-registro: registro de prestadores",
];

pub const ALTA_END: &[&str] = &["convenio para evitar doble imposicion"];

pub const GUIA_TITLE: &[&str] = &["guia de tipos de peligros"];

pub const POLITICA_COMPORTAMIENTO_TITLE: &[&str] =
    &["constancia de recepcion de la politica de comportamiento"];

/// Wording of the signed acknowledgement, as opposed to a bare heading
pub const SIGNATURE_MARKERS: &[&str] = &[
    "el que suscribe",
    "apellidos y nombres",
    "documento de identidad",
];

pub const REEMBOLSO_TITLE: &[&str] = &[
    "politica de gestion de viajes y reembolso",
    "politica de reembolso",
];

pub const CONSTANCIA_RIT_RISST_MARKERS: &[&str] = &[
    "reglamento interno de seguridad y salud en el trabajo",
    "risst",
    "reglamento interno de trabajo",
    "rit",
    "procedimiento de investigacion y sancion del hostigamiento sexual",
    "dejo constancia que he recibido lo siguiente",
];

pub const RISST_MARKERS: &[&str] = &[
    "reglamento interno de seguridad",
    "reglamento interno de seguridad y salud en el trabajo",
    "certificacion y compromiso",
    "certificado de recepcion y compromiso",
    "risst",
    "ristt",
    "habiendo recibido una copia del presente",
    "declaro haber tomado pleno conocimiento del contenido",
];

pub const CHINALCO_MARKERS: &[&str] = &[
    "constancia",
    "reglamento interno de seguridad y salud ocupacional",
    "ha recibido un ejemplar del",
    "ademas se compromete a cumplir",
    "mcp",
];

pub const AUDITORIA_TITLE: &[&str] = &["informe de auditoria final", "auditoria final"];

impl RuleTable {
    /// The built-in rule set. `illegible_max_chars` sets the density under
    /// which a page is treated as an unreadable scan.
    pub fn standard(illegible_max_chars: usize) -> Self {
        let guia_continuation = Signal::AnyOf(vec![any(GUIA_TITLE), all(&["peligros", "riesgos"])]);

        let rules = vec![
            SectionRule {
                kind: SectionKind::Contrato,
                weight: 0.0,
                anchors: vec![anchored(any(&["contrato de trabajo"]), 0.9)],
                markers: vec![],
                min_markers: 0,
                placement: Placement::Anywhere,
                occurrence: Occurrence::First,
                extent: Extent::AnchorPage,
            },
            SectionRule {
                kind: SectionKind::AltaSunat,
                weight: 0.0,
                anchors: vec![
                    anchored(any(ALTA_PRIMARY), 0.9),
                    anchored(any(ALTA_SECONDARY), 0.7),
                ],
                markers: vec![],
                min_markers: 0,
                placement: Placement::Anywhere,
                occurrence: Occurrence::First,
                extent: Extent::UntilMarker {
                    markers: phrases(ALTA_END),
                    max_pages: 10,
                },
            },
            SectionRule {
                kind: SectionKind::GuiaPeligros,
                weight: 0.0,
                anchors: vec![anchored(any(GUIA_TITLE), 0.8)],
                markers: vec![
                    all(&["peligros", "riesgos"]),
                    any(&["evento o exposicion peligrosa"]),
                    any(&["dano o deterioro"]),
                    any(&["peligros mecanicos"]),
                    all(&["1.1", "1.2"]),
                ],
                min_markers: 2,
                placement: Placement::Anywhere,
                occurrence: Occurrence::First,
                extent: Extent::Continuation {
                    signal: guia_continuation,
                    max_pages: 5,
                },
            },
            SectionRule {
                kind: SectionKind::AltaDerechohabiente,
                weight: 0.0,
                anchors: vec![anchored(
                    Signal::SparseText {
                        max_chars: illegible_max_chars,
                    },
                    0.6,
                )],
                markers: vec![],
                min_markers: 0,
                placement: Placement::Between {
                    after: SectionKind::AltaSunat,
                    before: SectionKind::GuiaPeligros,
                },
                occurrence: Occurrence::First,
                extent: Extent::Continuation {
                    signal: Signal::SparseText {
                        max_chars: illegible_max_chars,
                    },
                    max_pages: DERECHOHABIENTE_MAX_PAGES,
                },
            },
            SectionRule {
                kind: SectionKind::PoliticaComportamiento,
                weight: 0.0,
                anchors: vec![anchored(any(POLITICA_COMPORTAMIENTO_TITLE), 0.85)],
                markers: each(SIGNATURE_MARKERS),
                min_markers: 1,
                placement: Placement::Anywhere,
                occurrence: Occurrence::First,
                extent: Extent::AnchorPage,
            },
            SectionRule {
                kind: SectionKind::PoliticaReembolso,
                weight: 0.0,
                anchors: vec![anchored(any(REEMBOLSO_TITLE), 0.7)],
                markers: vec![],
                min_markers: 0,
                placement: Placement::Anywhere,
                occurrence: Occurrence::Last,
                extent: Extent::AnchorPage,
            },
            SectionRule {
                kind: SectionKind::CodigoConducta,
                weight: 0.0,
                anchors: vec![anchored(
                    all(&["constancia de entrega", "codigo de conducta"]),
                    0.85,
                )],
                markers: vec![],
                min_markers: 0,
                placement: Placement::Anywhere,
                occurrence: Occurrence::First,
                extent: Extent::AnchorPage,
            },
            SectionRule {
                kind: SectionKind::ConstanciaRitRisst,
                weight: 0.75,
                anchors: vec![],
                markers: each(CONSTANCIA_RIT_RISST_MARKERS),
                min_markers: 3,
                placement: Placement::After {
                    kinds: vec![SectionKind::PoliticaReembolso, SectionKind::CodigoConducta],
                    within: 1,
                },
                occurrence: Occurrence::First,
                extent: Extent::AnchorPage,
            },
            SectionRule {
                kind: SectionKind::Rit,
                weight: 0.0,
                anchors: vec![anchored(
                    all(&[
                        "conste por el presente documento que yo",
                        "reglamento interno de trabajo",
                    ]),
                    0.85,
                )],
                markers: vec![],
                min_markers: 0,
                placement: Placement::Anywhere,
                occurrence: Occurrence::First,
                extent: Extent::AnchorPage,
            },
            SectionRule {
                kind: SectionKind::Risst,
                weight: 0.7,
                anchors: vec![],
                markers: each(RISST_MARKERS),
                min_markers: 2,
                placement: Placement::Anywhere,
                occurrence: Occurrence::Last,
                extent: Extent::AnchorPage,
            },
            SectionRule {
                kind: SectionKind::RisstChinalco,
                weight: 0.7,
                anchors: vec![],
                markers: each(CHINALCO_MARKERS),
                min_markers: 2,
                placement: Placement::Before {
                    kind: SectionKind::Auditoria,
                    within: 1,
                },
                occurrence: Occurrence::First,
                extent: Extent::AnchorPage,
            },
            SectionRule {
                kind: SectionKind::Auditoria,
                weight: 0.0,
                anchors: vec![anchored(any(AUDITORIA_TITLE), 0.8)],
                markers: vec![],
                min_markers: 0,
                placement: Placement::Anywhere,
                occurrence: Occurrence::First,
                extent: Extent::ThroughLastMatch,
            },
        ];

        Self { rules }
    }

    /// Parse a rule table from TOML and check it covers the catalog
    pub fn from_toml_str(s: &str) -> Result<Self, RuleTableError> {
        let table: RuleTable = toml::from_str(s)?;
        table.validated()
    }

    /// Fold every phrase and check the table is usable by the detector
    pub fn validated(self) -> Result<Self, RuleTableError> {
        let mut seen = [false; 12];
        for rule in &self.rules {
            if std::mem::replace(&mut seen[rule.kind.ordinal()], true) {
                return Err(RuleTableError::DuplicateKind(rule.kind));
            }
            if rule.anchors.is_empty() && (rule.markers.is_empty() || rule.min_markers == 0) {
                return Err(RuleTableError::EmptyRule(rule.kind));
            }
        }
        if let Some(missing) = SectionKind::ALL.iter().find(|k| !seen[k.ordinal()]) {
            return Err(RuleTableError::MissingKind(*missing));
        }

        // Relative placements may only point at sections placed anywhere
        for rule in &self.rules {
            for target in placement_targets(&rule.placement) {
                if self.rule(target).is_some_and(|r| r.placement.is_relative()) {
                    return Err(RuleTableError::ChainedPlacement(rule.kind, target));
                }
            }
        }

        let rules = self
            .rules
            .into_iter()
            .map(|mut rule| {
                for anchor in &mut rule.anchors {
                    anchor.signal = anchor.signal.clone().folded();
                }
                rule.markers = rule.markers.into_iter().map(Signal::folded).collect();
                if let Extent::UntilMarker { markers, .. } = &mut rule.extent {
                    *markers = markers.iter().map(|m| fold(m)).collect();
                }
                if let Extent::Continuation { signal, .. } = &mut rule.extent {
                    *signal = signal.clone().folded();
                }
                rule
            })
            .collect();

        Ok(Self { rules })
    }

    pub fn rule(&self, kind: SectionKind) -> Option<&SectionRule> {
        self.rules.iter().find(|r| r.kind == kind)
    }
}

fn placement_targets(placement: &Placement) -> Vec<SectionKind> {
    match placement {
        Placement::Anywhere => vec![],
        Placement::After { kinds, .. } => kinds.clone(),
        Placement::Before { kind, .. } => vec![*kind],
        Placement::Between { after, before } => vec![*after, *before],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_table_is_valid() {
        let table = RuleTable::default().validated().unwrap();
        assert_eq!(table.rules.len(), 12);
        for kind in SectionKind::ALL {
            assert!(table.rule(kind).is_some(), "missing rule for {kind}");
        }
    }

    #[test]
    fn test_relative_rules_point_at_anywhere_rules() {
        let table = RuleTable::default();
        let relative: Vec<_> = table
            .rules
            .iter()
            .filter(|r| r.placement.is_relative())
            .map(|r| r.kind)
            .collect();
        assert_eq!(
            relative,
            vec![
                SectionKind::AltaDerechohabiente,
                SectionKind::ConstanciaRitRisst,
                SectionKind::RisstChinalco,
            ]
        );
    }

    #[test]
    fn test_validated_folds_phrases() {
        let mut table = RuleTable::default();
        table.rules[0].anchors[0].signal = Signal::AnyPhrase(vec!["CONTRATO  DE TRABAJO".into()]);
        let table = table.validated().unwrap();
        assert_eq!(
            table.rules[0].anchors[0].signal,
            Signal::AnyPhrase(vec!["contrato de trabajo".into()])
        );
    }

    #[test]
    fn test_missing_rule_is_rejected() {
        let mut table = RuleTable::default();
        table.rules.retain(|r| r.kind != SectionKind::Risst);
        assert!(matches!(
            table.validated(),
            Err(RuleTableError::MissingKind(SectionKind::Risst))
        ));
    }

    #[test]
    fn test_duplicate_rule_is_rejected() {
        let mut table = RuleTable::default();
        let copy = table.rules[0].clone();
        table.rules.push(copy);
        assert!(matches!(
            table.validated(),
            Err(RuleTableError::DuplicateKind(SectionKind::Contrato))
        ));
    }

    #[test]
    fn test_chained_placement_is_rejected() {
        let mut table = RuleTable::default();
        let idx = SectionKind::RisstChinalco.ordinal();
        table.rules[idx].placement = Placement::Before {
            kind: SectionKind::ConstanciaRitRisst,
            within: 1,
        };
        assert!(matches!(
            table.validated(),
            Err(RuleTableError::ChainedPlacement(
                SectionKind::RisstChinalco,
                SectionKind::ConstanciaRitRisst
            ))
        ));
    }

    #[test]
    fn test_table_round_trips_through_toml() {
        let table = RuleTable::default();
        let text = toml::to_string(&table).unwrap();
        let parsed = RuleTable::from_toml_str(&text).unwrap();
        assert_eq!(parsed.rules.len(), 12);
        assert_eq!(parsed.rule(SectionKind::Risst).unwrap().min_markers, 2);
    }
}
