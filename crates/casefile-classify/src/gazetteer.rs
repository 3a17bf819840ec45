//! Date extraction and the location gazetteer.

use once_cell::sync::Lazy;
use regex::Regex;

const DATE_PATTERNS: &[&str] = &[
    r"\b(?:January|February|March|April|May|June|July|August|September|October|November|December)\s+\d{1,2}(?:st|nd|rd|th)?,?\s+\d{4}\b",
    r"\b(?:Jan|Feb|Mar|Apr|Jun|Jul|Aug|Sep|Sept|Oct|Nov|Dec)\.?\s+\d{1,2},?\s+\d{4}\b",
    r"\b\d{1,2}/\d{1,2}/(?:19|20)\d{2}\b",
    r"\b(?:19|20)\d{2}-\d{2}-\d{2}\b",
];

/// Canonical location name and the pattern that recognizes it.
const LOCATIONS: &[(&str, &str)] = &[
    ("Palm Beach, Florida", r"(?i)\bpalm\s+beach\b"),
    ("New York, New York", r"(?i)\b(?:new\s+york|manhattan)\b"),
    (
        "Little St. James, U.S. Virgin Islands",
        r"(?i)\blittle\s+(?:st\.?|saint)\s+james\b",
    ),
    ("U.S. Virgin Islands", r"(?i)\bvirgin\s+islands\b|\bUSVI\b|\bSt\.?\s+Thomas\b"),
    ("Zorro Ranch, New Mexico", r"(?i)\bzorro\s+ranch\b|\bstanley,?\s+new\s+mexico\b"),
    ("Paris, France", r"\bParis\b"),
    ("London, United Kingdom", r"\bLondon\b"),
];

static DATE_RES: Lazy<Vec<Regex>> =
    Lazy::new(|| DATE_PATTERNS.iter().map(|p| Regex::new(p).unwrap()).collect());

static LOCATION_RES: Lazy<Vec<(&'static str, Regex)>> = Lazy::new(|| {
    LOCATIONS
        .iter()
        .map(|(name, p)| (*name, Regex::new(p).unwrap()))
        .collect()
});

/// Distinct dates in order of appearance.
pub fn extract_dates(text: &str, max: usize) -> Vec<String> {
    let mut hits: Vec<(usize, String)> = DATE_RES
        .iter()
        .flat_map(|re| re.find_iter(text).map(|m| (m.start(), m.as_str().to_string())))
        .collect();
    hits.sort();

    let mut dates: Vec<String> = Vec::new();
    for (_, date) in hits {
        let date = date.split_whitespace().collect::<Vec<_>>().join(" ");
        if !dates.contains(&date) {
            dates.push(date);
        }
        if dates.len() >= max {
            break;
        }
    }
    dates
}

/// Gazetteer locations mentioned in `text`, in gazetteer order.
pub fn extract_locations(text: &str) -> Vec<String> {
    LOCATION_RES
        .iter()
        .filter(|(_, re)| re.is_match(text))
        .map(|(name, _)| name.to_string())
        .collect()
}
