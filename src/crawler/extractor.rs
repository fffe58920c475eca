//! Level extractors for directory listing pages
//!
//! Each hierarchy level is listed as an HTML table:
//!
//! | Level | Rows | Code | Name | Link |
//! |-------|------|------|------|------|
//! | Province | `tr.provincetr a[href]` | href stem (`11.html` → `11`) | anchor text | href |
//! | City | `tr.citytr` | first cell | second cell | first `a[href]` |
//! | District | `tr.countytr` | first cell | second cell | first `a[href]` |
//! | Town | `tr.towntr` | first cell | second cell | first `a[href]` |
//!
//! Malformed rows are dropped rather than reported. Extraction is a pure
//! function of the loaded document.

use crate::region::{ChildRecord, Level};
use scraper::{ElementRef, Html, Selector};
use url::Url;

/// Label for a municipal district that has no page of its own
pub const MUNICIPAL_DISTRICT: &str = "市辖区";

/// Turns a loaded listing page into child records for one level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LevelExtractor {
    Province,
    City,
    District,
    Town,
}

impl LevelExtractor {
    /// Extractor producing rows of `level`
    pub fn for_level(level: Level) -> Self {
        match level {
            Level::Province => Self::Province,
            Level::City => Self::City,
            Level::District => Self::District,
            Level::Town => Self::Town,
        }
    }

    /// Level of the records this extractor produces
    pub fn level(&self) -> Level {
        match self {
            Self::Province => Level::Province,
            Self::City => Level::City,
            Self::District => Level::District,
            Self::Town => Level::Town,
        }
    }

    /// Extracts child records in document order
    pub fn extract(&self, document: &Html, base_url: &Url) -> Vec<ChildRecord> {
        match self {
            Self::Province => extract_provinces(document, base_url),
            Self::City => extract_table_rows(document, base_url, "tr.citytr"),
            Self::District => extract_districts(document, base_url),
            Self::Town => extract_table_rows(document, base_url, "tr.towntr"),
        }
    }
}

/// Province links carry their code in the target file name
fn extract_provinces(document: &Html, base_url: &Url) -> Vec<ChildRecord> {
    let Ok(link_selector) = Selector::parse("tr.provincetr a[href]") else {
        return Vec::new();
    };

    let mut records = Vec::new();
    for link in document.select(&link_selector) {
        let Some(href) = link.value().attr("href") else {
            continue;
        };

        let code = href
            .trim()
            .rsplit('/')
            .next()
            .and_then(|file| file.strip_suffix(".html"))
            .filter(|stem| is_code(stem));
        let name = element_text(&link);

        match code {
            Some(code) if !name.is_empty() => {
                records.push(ChildRecord::new(code, name, resolve_link(href, base_url)));
            }
            _ => tracing::trace!("Dropping province link '{}'", href),
        }
    }

    records
}

fn extract_districts(document: &Html, base_url: &Url) -> Vec<ChildRecord> {
    let records: Vec<ChildRecord> = extract_table_rows(document, base_url, "tr.countytr")
        .into_iter()
        .filter(|record| {
            let keep = record.name != MUNICIPAL_DISTRICT;
            if !keep {
                tracing::trace!("Dropping municipal district row {}", record.code);
            }
            keep
        })
        .collect();

    // Cities without a county level list their towns directly; those towns
    // are not harvested.
    if records.is_empty() && lists_rows(document, "tr.towntr") {
        tracing::debug!("{} lists towns with no district rows", base_url);
    }

    records
}

fn lists_rows(document: &Html, rows: &str) -> bool {
    Selector::parse(rows)
        .map(|selector| document.select(&selector).next().is_some())
        .unwrap_or(false)
}

/// Rows with a code cell, a name cell, and an optional link
fn extract_table_rows(document: &Html, base_url: &Url, rows: &str) -> Vec<ChildRecord> {
    let (Ok(row_selector), Ok(cell_selector), Ok(link_selector)) = (
        Selector::parse(rows),
        Selector::parse("td"),
        Selector::parse("a[href]"),
    ) else {
        return Vec::new();
    };

    let mut records = Vec::new();
    for row in document.select(&row_selector) {
        let cells: Vec<String> = row.select(&cell_selector).map(|c| element_text(&c)).collect();

        let (Some(code), Some(name)) = (cells.first(), cells.get(1)) else {
            tracing::trace!("Dropping row with {} cell(s)", cells.len());
            continue;
        };

        if !is_code(code) || name.is_empty() {
            tracing::trace!("Dropping malformed row '{}' / '{}'", code, name);
            continue;
        }

        let url = row
            .select(&link_selector)
            .filter_map(|a| a.value().attr("href"))
            .find_map(|href| resolve_link(href, base_url));

        records.push(ChildRecord::new(code.as_str(), name.as_str(), url));
    }

    records
}

fn element_text(element: &ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

fn is_code(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_digit())
}

/// Resolves a link href to an absolute http(s) URL
fn resolve_link(href: &str, base_url: &Url) -> Option<String> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') || href.starts_with("javascript:") {
        return None;
    }

    match base_url.join(href) {
        Ok(absolute_url) if matches!(absolute_url.scheme(), "http" | "https") => {
            Some(absolute_url.to_string())
        }
        _ => None,
    }
}
