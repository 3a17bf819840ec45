//! Document type detection. Patterns are tried in order; the first match
//! wins.

use once_cell::sync::Lazy;
use regex::Regex;

use casefile_core::DEFAULT_DOCUMENT_TYPE;

const TYPE_PATTERNS: &[(&str, &str)] = &[
    ("deposition", r"(?i)\b(?:deposition|sworn\s+testimony|videotaped\s+examination)\b"),
    ("flight log", r"(?i)\b(?:flight\s+log|passenger\s+manifest|tail\s+number)\b"),
    ("email", r"(?im)^\s*(?:from|sent|subject):\s+\S"),
    (
        "court filing",
        r"(?i)\b(?:united\s+states\s+district\s+court|case\s+no\.|motion\s+to|plaintiffs?|defendants?)\b",
    ),
    ("police report", r"(?i)\b(?:police\s+department|incident\s+report|offense\s+report)\b"),
    ("fbi report", r"(?i)\b(?:federal\s+bureau\s+of\s+investigation|FD-302)\b|\bFBI\b"),
    (
        "financial record",
        r"(?i)\b(?:bank\s+statement|wire\s+transfer|account\s+(?:number|no\.)|invoice)\b",
    ),
    ("correspondence", r"(?i)\b(?:dear\s+(?:mr|ms|mrs|dr|sir|madam)\b|sincerely|yours\s+truly)"),
];

static TYPE_MATCHERS: Lazy<Vec<(&'static str, Regex)>> = Lazy::new(|| {
    TYPE_PATTERNS
        .iter()
        .map(|(kind, pattern)| (*kind, Regex::new(pattern).unwrap()))
        .collect()
});

/// The first matching document type, or "government record".
pub fn classify_document_type(text: &str) -> &'static str {
    TYPE_MATCHERS
        .iter()
        .find(|(_, re)| re.is_match(text))
        .map_or(DEFAULT_DOCUMENT_TYPE, |(kind, _)| kind)
}
