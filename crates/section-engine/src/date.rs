//! Contract date extraction
//!
//! Contracts close with a signature line such as "Lima, el 15 de marzo del
//! 2025". Only the month and year are kept.

use crate::candidates::FoldedPages;
use chrono::{Datelike, NaiveDate};
use lazy_static::lazy_static;
use regex::Regex;
use std::fmt;
use std::ops::Range;

lazy_static! {
    /// "el <day> de <month> de[l] <year>" on folded text
    static ref SIGNATURE_DATE_PATTERN: Regex =
        Regex::new(r"\bel\s+(\d{1,2})\s+de\s+([a-z]+)\s+del?\s+(\d{4})\b").unwrap();
}

/// Month and year of a contract
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContractDate {
    pub month: u32,
    pub year: i32,
}

impl ContractDate {
    /// Build from a calendar date
    pub fn from_date(date: NaiveDate) -> Self {
        Self {
            month: date.month(),
            year: date.year(),
        }
    }
}

/// Rendered as `MM.YYYY`
impl fmt::Display for ContractDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}.{:04}", self.month, self.year)
    }
}

fn month_number(name: &str) -> Option<u32> {
    let month = match name {
        "enero" => 1,
        "febrero" => 2,
        "marzo" => 3,
        "abril" => 4,
        "mayo" => 5,
        "junio" => 6,
        "julio" => 7,
        "agosto" => 8,
        "septiembre" | "setiembre" => 9,
        "octubre" => 10,
        "noviembre" => 11,
        "diciembre" => 12,
        _ => return None,
    };
    Some(month)
}

/// First valid signature date in folded `text`
pub fn find_date(text: &str) -> Option<ContractDate> {
    SIGNATURE_DATE_PATTERN.captures_iter(text).find_map(|caps| {
        let day: u32 = caps[1].parse().ok()?;
        let month = month_number(&caps[2])?;
        let year: i32 = caps[3].parse().ok()?;
        NaiveDate::from_ymd_opt(year, month, day).map(ContractDate::from_date)
    })
}

/// Scan `window` (0-based page indices) in page order, at most `max_pages` pages
pub fn extract_contract_date(
    pages: &FoldedPages,
    window: Range<usize>,
    max_pages: usize,
) -> Option<ContractDate> {
    window
        .take(max_pages)
        .filter(|&index| index < pages.len())
        .find_map(|index| find_date(pages.text(index)))
}
