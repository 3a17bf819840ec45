//! Tier 0 entry point.

use casefile_core::{AnalysisResult, AnalysisTier};
use tracing::debug;

use crate::dictionary::match_known_persons;
use crate::doc_type::classify_document_type;
use crate::gazetteer::{extract_dates, extract_locations};

/// Dates listed as key facts.
const MAX_KEY_DATES: usize = 5;

/// Classify a document with rules only. Tier 0 never infers connections or
/// events, and costs nothing.
pub fn classify(text: &str) -> AnalysisResult {
    let text = text.trim();
    if text.is_empty() {
        return AnalysisResult {
            tier: AnalysisTier::Rules,
            summary: "No extracted text available.".to_string(),
            ..Default::default()
        };
    }

    let document_type = classify_document_type(text);
    let persons = match_known_persons(text);
    let dates = extract_dates(text, MAX_KEY_DATES);
    let locations = extract_locations(text);

    let mut summary = capitalize(document_type);
    if persons.is_empty() {
        summary.push_str(" with no known individuals identified");
    } else {
        let names: Vec<&str> = persons.iter().map(|p| p.name.as_str()).collect();
        summary.push_str(&format!(" referencing {}", names.join(", ")));
    }
    if let Some(date) = dates.first() {
        summary.push_str(&format!(", dated {}", date));
    }
    summary.push('.');

    let key_facts = dates.iter().map(|d| format!("Date referenced: {}", d)).collect();

    debug!(
        "Tier 0: type={}, persons={}, dates={}, locations={}",
        document_type,
        persons.len(),
        dates.len(),
        locations.len()
    );

    AnalysisResult {
        tier: AnalysisTier::Rules,
        document_type: document_type.to_string(),
        date_original: dates.first().cloned(),
        summary,
        persons,
        locations,
        key_facts,
        ..Default::default()
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FILING: &str = "UNITED STATES DISTRICT COURT\nSOUTHERN DISTRICT OF FLORIDA\n\
        Case No. 08-80736\n\nOn July 7, 2008 counsel for Jeffrey Epstein wrote to \
        Alexander Acosta regarding the Palm Beach investigation. Epstein's counsel, \
        Alan Dershowitz, attended. A further letter followed on 2008-07-15.";

    #[test]
    fn test_court_filing() {
        let result = classify(FILING);
        assert_eq!(result.tier, AnalysisTier::Rules);
        assert_eq!(result.document_type, "court filing");
        assert_eq!(result.date_original.as_deref(), Some("July 7, 2008"));
        let names: Vec<&str> = result.persons.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["Jeffrey Epstein", "Alexander Acosta", "Alan Dershowitz"]);
        assert_eq!(result.locations, vec!["Palm Beach, Florida"]);
        assert!(result.connections.is_empty());
        assert!(result.events.is_empty());
        assert_eq!(result.cost_cents, 0.0);
        assert_eq!(result.input_tokens, 0);
        assert!(result.summary.starts_with("Court filing referencing Jeffrey Epstein"));
    }

    #[test]
    fn test_is_deterministic() {
        for text in [FILING, "", "Dear Sir, sincerely yours", "FLIGHT LOG N908JE"] {
            let a = serde_json::to_string(&classify(text)).unwrap();
            let b = serde_json::to_string(&classify(text)).unwrap();
            assert_eq!(a, b);
        }
    }

    #[test]
    fn test_empty_text() {
        let result = classify("   \n ");
        assert_eq!(result.document_type, "government record");
        assert!(result.persons.is_empty());
        assert_eq!(result.summary, "No extracted text available.");
    }
}
