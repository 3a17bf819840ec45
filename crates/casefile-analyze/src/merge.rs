//! Merge per-chunk results into one document result.
//!
//! Persons, connections, and events are keyed case-insensitively and every
//! field is combined with a commutative rule (sum, max, union, or the
//! preferred of two strings), so those sets do not depend on chunk order
//! and merging is associative. Locations, key facts, and summaries keep
//! first-seen order.

use std::collections::{BTreeMap, HashSet};

use casefile_core::{
    AnalysisResult, AnalysisTier, ConnectionMention, EventMention, PersonMention,
    DEFAULT_DOCUMENT_TYPE,
};

type ConnectionKey = (String, String, String);
type EventKey = (String, String);

/// Merge chunk results. An empty input gives the default result.
pub fn merge_results(results: Vec<AnalysisResult>) -> AnalysisResult {
    let mut merged = AnalysisResult::default();
    let mut persons: BTreeMap<String, PersonMention> = BTreeMap::new();
    let mut connections: BTreeMap<ConnectionKey, ConnectionMention> = BTreeMap::new();
    let mut events: BTreeMap<EventKey, EventMention> = BTreeMap::new();
    let mut seen_locations = HashSet::new();
    let mut seen_facts = HashSet::new();
    let mut summaries: Vec<String> = Vec::new();

    for result in results {
        if result.tier == AnalysisTier::Ai {
            merged.tier = AnalysisTier::Ai;
        }
        if merged.document_type == DEFAULT_DOCUMENT_TYPE && !result.document_type.is_empty() {
            merged.document_type = result.document_type;
        }
        if merged.date_original.is_none() {
            merged.date_original = result.date_original;
        }
        if merged.model.is_none() {
            merged.model = result.model;
        }
        let summary = result.summary.trim();
        if !summary.is_empty() {
            summaries.push(summary.to_string());
        }

        for person in result.persons {
            let key = person.name.trim().to_lowercase();
            if key.is_empty() {
                continue;
            }
            match persons.get_mut(&key) {
                Some(existing) => merge_person(existing, person),
                None => {
                    persons.insert(key, person);
                }
            }
        }

        for connection in result.connections {
            let (key, connection) = orient_connection(connection);
            match connections.get_mut(&key) {
                Some(existing) => merge_connection(existing, connection),
                None => {
                    connections.insert(key, connection);
                }
            }
        }

        for event in result.events {
            let key = (event.date.trim().to_string(), event.title.trim().to_lowercase());
            match events.get_mut(&key) {
                Some(existing) => merge_event(existing, event),
                None => {
                    let mut event = event;
                    event.persons_involved = union_names(Vec::new(), event.persons_involved);
                    events.insert(key, event);
                }
            }
        }

        for location in result.locations {
            if seen_locations.insert(location.trim().to_lowercase()) {
                merged.locations.push(location);
            }
        }
        for fact in result.key_facts {
            if seen_facts.insert(fact.trim().to_lowercase()) {
                merged.key_facts.push(fact);
            }
        }

        merged.cost_cents += result.cost_cents;
        merged.input_tokens += result.input_tokens;
        merged.output_tokens += result.output_tokens;
        merged.chunks_analyzed += result.chunks_analyzed;
        merged.chunks_failed += result.chunks_failed;
    }

    merged.summary = summaries.join(" ");
    merged.persons = persons.into_values().collect();
    merged.connections = connections.into_values().collect();
    merged.events = events.into_values().collect();
    merged
}

/// The longer string wins; equal lengths fall back to lexicographic order.
fn prefer(a: String, b: String) -> String {
    let (la, lb) = (a.chars().count(), b.chars().count());
    if la > lb || (la == lb && a <= b) {
        a
    } else {
        b
    }
}

fn prefer_in_place(slot: &mut String, other: String) {
    let current = std::mem::take(slot);
    *slot = prefer(current, other);
}

fn merge_person(existing: &mut PersonMention, other: PersonMention) {
    existing.mention_count = existing.mention_count.saturating_add(other.mention_count);
    prefer_in_place(&mut existing.name, other.name);
    prefer_in_place(&mut existing.role, other.role);
    prefer_in_place(&mut existing.category, other.category);
    prefer_in_place(&mut existing.context, other.context);
}

/// Put the lexicographically smaller name first.
fn orient_connection(mut c: ConnectionMention) -> (ConnectionKey, ConnectionMention) {
    let mut a = c.person1.trim().to_lowercase();
    let mut b = c.person2.trim().to_lowercase();
    if a > b {
        std::mem::swap(&mut a, &mut b);
        std::mem::swap(&mut c.person1, &mut c.person2);
    }
    let key = (a, b, c.relationship_type.trim().to_lowercase());
    (key, c)
}

fn merge_connection(existing: &mut ConnectionMention, other: ConnectionMention) {
    existing.strength = existing.strength.max(other.strength);
    prefer_in_place(&mut existing.person1, other.person1);
    prefer_in_place(&mut existing.person2, other.person2);
    prefer_in_place(&mut existing.relationship_type, other.relationship_type);
    prefer_in_place(&mut existing.description, other.description);
}

fn merge_event(existing: &mut EventMention, other: EventMention) {
    existing.significance = existing.significance.max(other.significance);
    prefer_in_place(&mut existing.title, other.title);
    prefer_in_place(&mut existing.description, other.description);
    prefer_in_place(&mut existing.category, other.category);
    let current = std::mem::take(&mut existing.persons_involved);
    existing.persons_involved = union_names(current, other.persons_involved);
}

/// Case-insensitive union, sorted by lower-cased name.
fn union_names(a: Vec<String>, b: Vec<String>) -> Vec<String> {
    let mut by_key: BTreeMap<String, String> = BTreeMap::new();
    for name in a.into_iter().chain(b) {
        let key = name.trim().to_lowercase();
        if key.is_empty() {
            continue;
        }
        let chosen = match by_key.remove(&key) {
            Some(existing) => prefer(existing, name),
            None => name,
        };
        by_key.insert(key, chosen);
    }
    by_key.into_values().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn person(name: &str, context: &str, count: u32) -> PersonMention {
        PersonMention {
            name: name.into(),
            role: "associate".into(),
            category: "associate".into(),
            context: context.into(),
            mention_count: count,
        }
    }

    fn connection(p1: &str, p2: &str, strength: u8, description: &str) -> ConnectionMention {
        ConnectionMention {
            person1: p1.into(),
            person2: p2.into(),
            relationship_type: "associate".into(),
            description: description.into(),
            strength,
        }
    }

    fn event(title: &str, significance: u8, persons: &[&str]) -> EventMention {
        EventMention {
            date: "2005-03-01".into(),
            title: title.into(),
            description: String::new(),
            category: "legal".into(),
            significance,
            persons_involved: persons.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn chunk_a() -> AnalysisResult {
        AnalysisResult {
            tier: AnalysisTier::Ai,
            document_type: "deposition".into(),
            summary: "First part.".into(),
            persons: vec![person("Ghislaine Maxwell", "short", 2)],
            connections: vec![connection("Jeffrey Epstein", "Ghislaine Maxwell", 3, "")],
            events: vec![event("Interview", 2, &["Ghislaine Maxwell"])],
            locations: vec!["New York".into()],
            input_tokens: 100,
            output_tokens: 10,
            ..Default::default()
        }
    }

    fn chunk_b() -> AnalysisResult {
        AnalysisResult {
            tier: AnalysisTier::Ai,
            date_original: Some("2009-03-17".into()),
            summary: "Second part.".into(),
            persons: vec![
                person("ghislaine maxwell", "a much longer context", 1),
                person("Sarah Kellen", "assistant", 1),
            ],
            connections: vec![connection("Ghislaine Maxwell", "Jeffrey Epstein", 5, "close")],
            events: vec![event("interview", 4, &["Sarah Kellen"])],
            locations: vec!["new york".into(), "Palm Beach".into()],
            input_tokens: 200,
            output_tokens: 20,
            ..Default::default()
        }
    }

    fn chunk_c() -> AnalysisResult {
        AnalysisResult {
            tier: AnalysisTier::Ai,
            document_type: "email".into(),
            persons: vec![person("Jean-Luc Brunel", "", 3)],
            key_facts: vec!["Flight manifest attached.".into()],
            ..Default::default()
        }
    }

    #[test]
    fn test_persons_combined_case_insensitively() {
        let merged = merge_results(vec![chunk_a(), chunk_b()]);
        let maxwell = merged
            .persons
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case("ghislaine maxwell"))
            .unwrap();
        assert_eq!(maxwell.mention_count, 3);
        assert_eq!(maxwell.context, "a much longer context");
        assert_eq!(merged.persons.len(), 2);
    }

    #[test]
    fn test_connections_and_events() {
        let merged = merge_results(vec![chunk_a(), chunk_b()]);
        assert_eq!(merged.connections.len(), 1);
        assert_eq!(merged.connections[0].strength, 5);
        assert_eq!(merged.connections[0].description, "close");
        assert_eq!(merged.events.len(), 1);
        assert_eq!(merged.events[0].significance, 4);
        assert_eq!(
            merged.events[0].persons_involved,
            vec!["Ghislaine Maxwell", "Sarah Kellen"]
        );
    }

    #[test]
    fn test_first_seen_fields() {
        let merged = merge_results(vec![chunk_a(), chunk_b(), chunk_c()]);
        assert_eq!(merged.document_type, "deposition");
        assert_eq!(merged.date_original.as_deref(), Some("2009-03-17"));
        assert_eq!(merged.summary, "First part. Second part.");
        assert_eq!(merged.locations, vec!["New York", "Palm Beach"]);
        assert_eq!(merged.input_tokens, 300);
        assert_eq!(merged.tier, AnalysisTier::Ai);
    }

    #[test]
    fn test_order_independent() {
        let abc = merge_results(vec![chunk_a(), chunk_b(), chunk_c()]);
        let cab = merge_results(vec![chunk_c(), chunk_a(), chunk_b()]);
        assert_eq!(abc.persons, cab.persons);
        assert_eq!(abc.connections, cab.connections);
        assert_eq!(abc.events, cab.events);
    }

    #[test]
    fn test_associative() {
        let flat = merge_results(vec![chunk_a(), chunk_b(), chunk_c()]);
        let nested = merge_results(vec![merge_results(vec![chunk_a(), chunk_b()]), chunk_c()]);
        assert_eq!(flat.persons, nested.persons);
        assert_eq!(flat.connections, nested.connections);
        assert_eq!(flat.events, nested.events);
        assert_eq!(flat.input_tokens, nested.input_tokens);
    }

    #[test]
    fn test_empty_input() {
        let merged = merge_results(Vec::new());
        assert_eq!(merged.document_type, DEFAULT_DOCUMENT_TYPE);
        assert!(merged.persons.is_empty());
    }
}
