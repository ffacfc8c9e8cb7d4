//! Name and address extraction from raw OCR text.
//!
//! Two independent label patterns, first occurrence wins, value is the rest
//! of the label's line. Missing values stay `NotFound` until a caller needs
//! text, at which point the fixed sentinels are substituted.

use std::sync::LazyLock;

use regex::Regex;

pub const NAME_NOT_FOUND: &str = "No se encontró el nombre";
pub const ADDRESS_NOT_FOUND: &str = "No se encontró la dirección";

static NAME_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Nombre:[^\S\n]*([^\n]*)").unwrap());

static ADDRESS_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Dirección:[^\S\n]*([^\n]*)").unwrap());

/// Result of looking for one labelled field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldOutcome {
    Found(String),
    NotFound,
}

impl FieldOutcome {
    pub fn is_found(&self) -> bool {
        matches!(self, Self::Found(_))
    }

    pub fn value(&self) -> Option<&str> {
        match self {
            Self::Found(v) => Some(v),
            Self::NotFound => None,
        }
    }

    /// The found value, or `sentinel`.
    pub fn or_sentinel<'a>(&'a self, sentinel: &'a str) -> &'a str {
        self.value().unwrap_or(sentinel)
    }
}

/// The (name, address) pair read from one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedFields {
    pub name: FieldOutcome,
    pub address: FieldOutcome,
}

impl ExtractedFields {
    /// Name as presented to clients and the store.
    pub fn name_text(&self) -> &str {
        self.name.or_sentinel(NAME_NOT_FOUND)
    }

    /// Address as presented to clients and the store.
    pub fn address_text(&self) -> &str {
        self.address.or_sentinel(ADDRESS_NOT_FOUND)
    }
}

/// Parse the name and address out of OCR text. Pure and deterministic.
pub fn parse_fields(text: &str) -> ExtractedFields {
    ExtractedFields {
        name: capture_first(&NAME_PATTERN, text),
        address: capture_first(&ADDRESS_PATTERN, text),
    }
}

fn capture_first(pattern: &Regex, text: &str) -> FieldOutcome {
    pattern
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim())
        .filter(|v| !v.is_empty())
        .map(|v| FieldOutcome::Found(v.to_string()))
        .unwrap_or(FieldOutcome::NotFound)
}
