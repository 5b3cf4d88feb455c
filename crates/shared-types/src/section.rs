//! The fixed catalog of contract sections

use serde::{Deserialize, Serialize};
use std::fmt;

/// One of the twelve sections a contract file is expected to contain.
///
/// Variants are declared in the order the sections normally appear in the
/// scanned file. The serialized form is the human label, which is also the
/// prefix of every extracted file name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SectionKind {
    #[serde(rename = "Contrato de Trabajo")]
    Contrato,
    #[serde(rename = "Constancia de Alta")]
    AltaSunat,
    #[serde(rename = "Guia de Peligro")]
    GuiaPeligros,
    #[serde(rename = "Constancia de Alta DerechoHabiente")]
    AltaDerechohabiente,
    #[serde(rename = "Constancia de recepcion de la Politica de Comportamiento")]
    PoliticaComportamiento,
    #[serde(rename = "Constancia de politica de reembolso de viajes")]
    PoliticaReembolso,
    #[serde(rename = "Codigo de Conducta")]
    CodigoConducta,
    #[serde(rename = "Constancia de RIT,RISST,HOST.SEXUAL,P.SALARIAL")]
    ConstanciaRitRisst,
    #[serde(rename = "RIT 2025")]
    Rit,
    #[serde(rename = "RISST 2025")]
    Risst,
    #[serde(rename = "RISST CHINALCO 2025")]
    RisstChinalco,
    #[serde(rename = "Contrato Auditoria")]
    Auditoria,
}

impl SectionKind {
    /// All kinds in catalog order
    pub const ALL: [SectionKind; 12] = [
        SectionKind::Contrato,
        SectionKind::AltaSunat,
        SectionKind::GuiaPeligros,
        SectionKind::AltaDerechohabiente,
        SectionKind::PoliticaComportamiento,
        SectionKind::PoliticaReembolso,
        SectionKind::CodigoConducta,
        SectionKind::ConstanciaRitRisst,
        SectionKind::Rit,
        SectionKind::Risst,
        SectionKind::RisstChinalco,
        SectionKind::Auditoria,
    ];

    /// Label used in artifacts, logs and output file names
    pub fn label(self) -> &'static str {
        match self {
            SectionKind::Contrato => "Contrato de Trabajo",
            SectionKind::AltaSunat => "Constancia de Alta",
            SectionKind::GuiaPeligros => "Guia de Peligro",
            SectionKind::AltaDerechohabiente => "Constancia de Alta DerechoHabiente",
            SectionKind::PoliticaComportamiento => {
                "Constancia de recepcion de la Politica de Comportamiento"
            }
            SectionKind::PoliticaReembolso => "Constancia de politica de reembolso de viajes",
            SectionKind::CodigoConducta => "Codigo de Conducta",
            SectionKind::ConstanciaRitRisst => "Constancia de RIT,RISST,HOST.SEXUAL,P.SALARIAL",
            SectionKind::Rit => "RIT 2025",
            SectionKind::Risst => "RISST 2025",
            SectionKind::RisstChinalco => "RISST CHINALCO 2025",
            SectionKind::Auditoria => "Contrato Auditoria",
        }
    }

    /// Zero-based position in the catalog
    pub fn ordinal(self) -> usize {
        self as usize
    }
}

impl fmt::Display for SectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_has_twelve_distinct_kinds() {
        let mut labels: Vec<_> = SectionKind::ALL.iter().map(|k| k.label()).collect();
        labels.sort();
        labels.dedup();
        assert_eq!(labels.len(), 12);
    }

    #[test]
    fn test_ordinal_matches_catalog_position() {
        for (idx, kind) in SectionKind::ALL.iter().enumerate() {
            assert_eq!(kind.ordinal(), idx);
        }
    }

    #[test]
    fn test_serialized_name_is_label() {
        for kind in SectionKind::ALL {
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind.label()));
        }
    }

    #[test]
    fn test_deserializes_from_label() {
        let kind: SectionKind = serde_json::from_str("\"RISST 2025\"").unwrap();
        assert_eq!(kind, SectionKind::Risst);
    }
}
