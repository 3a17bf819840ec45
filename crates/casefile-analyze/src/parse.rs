//! Lenient parsing of one chunk's model output.
//!
//! Accepts JSON wrapped in code fences or surrounded by prose, numbers
//! given as strings, and camelCase or snake_case keys. Excluded names are
//! filtered again after parsing.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};

use casefile_core::analysis::clamp_score;
use casefile_core::{
    AnalysisResult, AnalysisTier, ConnectionMention, EventMention, PersonMention,
    DEFAULT_DOCUMENT_TYPE,
};

static PLACEHOLDER_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)redacted|\[|\]|x{3,}|^(?:jane|john|j\.)\s+doe\b|^(?:minor\s+)?victim\b|^witness\s+\w+$|^(?:unknown|unidentified|unnamed)\b|^(?:individual|person|employee|female|male)\s*(?:\d+|[a-z])$|^(?:the\s+)?(?:defendant|plaintiff|witness|victim)$",
    )
    .unwrap()
});

static ORGANIZATION_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(?:inc|llc|ltd|corp|corporation|company|co|foundation|trust|bank|department|bureau|court|office|agency|police|university|school|group|holdings|associates|partners)\b\.?$|^(?:the\s+)?(?:fbi|doj|cia|irs|sec|nypd)$|^(?:united\s+states|state\s+of)\b",
    )
    .unwrap()
});

/// Parse one chunk response. `None` means the chunk is unusable.
pub fn parse_chunk_response(raw: &str) -> Option<AnalysisResult> {
    let cleaned = strip_code_fences(raw);
    let value: Value = serde_json::from_str(cleaned).ok().or_else(|| {
        let inner = braced_substring(cleaned)?;
        serde_json::from_str(inner).ok()
    })?;
    let obj = value.as_object()?;
    Some(result_from_object(obj))
}

/// Remove a leading ```/```json fence and a trailing ``` fence.
pub fn strip_code_fences(raw: &str) -> &str {
    let mut s = raw.trim();
    if let Some(rest) = s.strip_prefix("```") {
        s = match rest.find('\n') {
            Some(i) => &rest[i + 1..],
            None => rest.trim_start_matches(|c: char| c.is_ascii_alphabetic()),
        };
    }
    if let Some(rest) = s.trim_end().strip_suffix("```") {
        s = rest;
    }
    s.trim()
}

/// First `{` through last `}`.
fn braced_substring(s: &str) -> Option<&str> {
    let start = s.find('{')?;
    let end = s.rfind('}')?;
    (end > start).then(|| &s[start..=end])
}

/// Names the exclusion rules forbid.
pub fn is_excluded_name(name: &str) -> bool {
    let name = name.trim();
    if name.chars().filter(|c| c.is_alphabetic()).count() < 2 {
        return true;
    }
    PLACEHOLDER_NAME.is_match(name) || ORGANIZATION_NAME.is_match(name)
}

fn result_from_object(obj: &Map<String, Value>) -> AnalysisResult {
    let document_type = str_field(obj, &["documentType", "document_type", "type"])
        .map(|s| s.to_lowercase())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| DEFAULT_DOCUMENT_TYPE.to_string());
    let date_original = str_field(obj, &["dateOriginal", "date_original", "date"])
        .filter(|s| !s.is_empty() && !s.eq_ignore_ascii_case("null") && !s.eq_ignore_ascii_case("unknown"));

    let persons = array_field(obj, &["persons", "people"])
        .filter_map(Value::as_object)
        .filter_map(|p| {
            let name = str_field(p, &["name", "fullName"])?;
            if is_excluded_name(&name) {
                return None;
            }
            Some(PersonMention {
                name,
                role: str_field(p, &["role"]).unwrap_or_default(),
                category: str_field(p, &["category"]).unwrap_or_default().to_lowercase(),
                context: str_field(p, &["context", "quote"]).unwrap_or_default(),
                mention_count: int_field(p, &["mentionCount", "mention_count", "mentions"])
                    .unwrap_or(1)
                    .clamp(1, u32::MAX as i64) as u32,
            })
        })
        .collect();

    let connections = array_field(obj, &["connections", "relationships"])
        .filter_map(Value::as_object)
        .filter_map(|c| {
            let person1 = str_field(c, &["person1", "from", "source"])?;
            let person2 = str_field(c, &["person2", "to", "target"])?;
            if person1.eq_ignore_ascii_case(&person2)
                || is_excluded_name(&person1)
                || is_excluded_name(&person2)
            {
                return None;
            }
            Some(ConnectionMention {
                person1,
                person2,
                relationship_type: str_field(c, &["relationshipType", "relationship_type", "type"])
                    .unwrap_or_default()
                    .to_lowercase(),
                description: str_field(c, &["description"]).unwrap_or_default(),
                strength: clamp_score(int_field(c, &["strength"]).unwrap_or(1)),
            })
        })
        .collect();

    let events = array_field(obj, &["events", "timeline"])
        .filter_map(Value::as_object)
        .filter_map(|e| {
            let title = str_field(e, &["title", "name"]).filter(|t| !t.is_empty())?;
            Some(EventMention {
                date: str_field(e, &["date"]).unwrap_or_default(),
                title,
                description: str_field(e, &["description"]).unwrap_or_default(),
                category: str_field(e, &["category"]).unwrap_or_default().to_lowercase(),
                significance: clamp_score(int_field(e, &["significance"]).unwrap_or(1)),
                persons_involved: array_field(e, &["personsInvolved", "persons_involved", "persons"])
                    .filter_map(|v| v.as_str().map(|s| s.trim().to_string()))
                    .filter(|s| !s.is_empty() && !is_excluded_name(s))
                    .collect(),
            })
        })
        .collect();

    AnalysisResult {
        tier: AnalysisTier::Ai,
        document_type,
        date_original,
        summary: str_field(obj, &["summary"]).unwrap_or_default(),
        persons,
        connections,
        events,
        locations: string_list(obj, &["locations", "places"]),
        key_facts: string_list(obj, &["keyFacts", "key_facts", "facts"]),
        ..Default::default()
    }
}

fn field<'a>(obj: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().find_map(|k| obj.get(*k)).filter(|v| !v.is_null())
}

fn str_field(obj: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    match field(obj, keys)? {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn int_field(obj: &Map<String, Value>, keys: &[&str]) -> Option<i64> {
    match field(obj, keys)? {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.round() as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn array_field<'a>(obj: &'a Map<String, Value>, keys: &[&str]) -> impl Iterator<Item = &'a Value> {
    field(obj, keys)
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
}

fn string_list(obj: &Map<String, Value>, keys: &[&str]) -> Vec<String> {
    array_field(obj, keys)
        .filter_map(|v| v.as_str().map(|s| s.trim().to_string()))
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const RESPONSE: &str = r#"{
        "documentType": "Deposition",
        "dateOriginal": "2009-03-17",
        "summary": "Deposition transcript.",
        "persons": [
            {"name": "Ghislaine Maxwell", "role": "witness", "category": "associate", "context": "Q. Do you know...", "mentionCount": "4"},
            {"name": "[REDACTED]", "role": "x"},
            {"name": "Jane Doe 3"},
            {"name": "Palm Beach Police Department"}
        ],
        "connections": [
            {"person1": "Ghislaine Maxwell", "person2": "Jeffrey Epstein", "relationshipType": "Associate", "strength": 9},
            {"person1": "Ghislaine Maxwell", "person2": "ghislaine maxwell", "strength": 2}
        ],
        "events": [{"date": "2005-03-01", "title": "Interview", "significance": 2.6, "personsInvolved": ["Ghislaine Maxwell", "Victim 2"]}],
        "locations": ["New York", ""],
        "keyFacts": ["Testimony was videotaped."]
    }"#;

    #[test]
    fn test_parse_full_response() {
        let result = parse_chunk_response(RESPONSE).unwrap();
        assert_eq!(result.document_type, "deposition");
        assert_eq!(result.date_original.as_deref(), Some("2009-03-17"));
        assert_eq!(result.persons.len(), 1);
        assert_eq!(result.persons[0].mention_count, 4);
        assert_eq!(result.connections.len(), 1);
        assert_eq!(result.connections[0].strength, 5);
        assert_eq!(result.connections[0].relationship_type, "associate");
        assert_eq!(result.events[0].significance, 3);
        assert_eq!(result.events[0].persons_involved, vec!["Ghislaine Maxwell"]);
        assert_eq!(result.locations, vec!["New York"]);
    }

    #[test]
    fn test_code_fences_stripped() {
        let raw = "```json\n{\"summary\": \"ok\", \"persons\": []}\n```";
        assert_eq!(parse_chunk_response(raw).unwrap().summary, "ok");
    }

    #[test]
    fn test_braced_substring_fallback() {
        let raw = "Here is the analysis you asked for: {\"summary\": \"found\"} Hope this helps.";
        assert_eq!(parse_chunk_response(raw).unwrap().summary, "found");
    }

    #[test]
    fn test_unparseable() {
        assert!(parse_chunk_response("I cannot help with that.").is_none());
        assert!(parse_chunk_response("{\"summary\": ").is_none());
        assert!(parse_chunk_response("[1, 2]").is_none());
    }

    #[test]
    fn test_excluded_names() {
        for name in ["REDACTED", "John Doe", "Minor Victim 1", "Witness A", "Unknown Male", "FBI", "Acme Holdings LLC", "J"] {
            assert!(is_excluded_name(name), "{name} should be excluded");
        }
        for name in ["Jeffrey Epstein", "Sarah Kellen", "Jean-Luc Brunel"] {
            assert!(!is_excluded_name(name), "{name} should be kept");
        }
    }
}
