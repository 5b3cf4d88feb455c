//! Fixture contract files

#![allow(dead_code)]

use shared_pdf::fixtures::build_text_pdf;
use std::fs;
use std::path::{Path, PathBuf};

/// Page text of a complete 16-page contract file, one entry per page
pub fn contract_pages() -> Vec<String> {
    let legible_filler = "Texto legible del formulario. ".repeat(6);
    vec![
        "CONTRATO DE TRABAJO SUJETO A MODALIDAD\nConste por el presente...".into(),
        "Clausulas\nFirmado en Lima, el 15 de marzo del 2025.".into(),
        "FORMULARIO 1604 - Comprobante de Informacion Registrada".into(),
        "Datos del trabajador\nConvenio para evitar doble imposicion: ninguno".into(),
        "".into(),
        "GUIA DE TIPOS DE PELIGROS\nPeligros y riesgos\n1.1 Caidas 1.2 Golpes\nDano o deterioro".into(),
        format!("Constancia de recepcion de la Politica de Comportamiento\nEl que suscribe {legible_filler}"),
        "Politica de gestion de viajes y reembolso - constancia".into(),
        "Dejo constancia que he recibido lo siguiente: RIT, RISST, Procedimiento de investigacion y sancion del hostigamiento sexual".into(),
        "Constancia de entrega del Codigo de Conducta".into(),
        "Conste por el presente documento que yo recibi el Reglamento Interno de Trabajo".into(),
        "RISST - Certificado de recepcion y compromiso".into(),
        "Constancia: ha recibido un ejemplar del Reglamento Interno de Seguridad y Salud Ocupacional de MCP".into(),
        "INFORME DE AUDITORIA FINAL".into(),
        "anexo de auditoria".into(),
        "Auditoria final - firmas".into(),
    ]
}

/// Write a PDF with `pages` as `<dir>/<name>`
pub fn write_pdf(dir: &Path, name: &str, pages: &[String]) -> PathBuf {
    let refs: Vec<&str> = pages.iter().map(String::as_str).collect();
    let path = dir.join(name);
    fs::write(&path, build_text_pdf(&refs)).unwrap();
    path
}

/// Every file directly inside `dir`, sorted by name
pub fn file_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}
