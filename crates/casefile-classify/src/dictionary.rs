//! Fixed dictionary of individuals who appear throughout the public court
//! record, with the spellings they are written under.

use once_cell::sync::Lazy;
use regex::Regex;

use casefile_core::PersonMention;

/// Characters of context captured on each side of the first hit.
const CONTEXT_RADIUS: usize = 40;

/// A dictionary entry. `variants` are matched case-insensitively on word
/// boundaries; internal spaces match any run of whitespace.
#[derive(Debug, Clone, Copy)]
pub struct KnownPerson {
    pub name: &'static str,
    pub variants: &'static [&'static str],
    pub role: &'static str,
    pub category: &'static str,
}

pub static KNOWN_PERSONS: &[KnownPerson] = &[
    KnownPerson {
        name: "Jeffrey Epstein",
        variants: &["Jeffrey Epstein", "Jeffrey E. Epstein", "Jeffrey Edward Epstein", "JE"],
        role: "Financier; defendant",
        category: "principal",
    },
    KnownPerson {
        name: "Ghislaine Maxwell",
        variants: &["Ghislaine Maxwell", "Ghislaine Noelle Maxwell", "G. Maxwell"],
        role: "Associate",
        category: "associate",
    },
    KnownPerson {
        name: "Jean-Luc Brunel",
        variants: &["Jean-Luc Brunel", "Jean Luc Brunel"],
        role: "Modeling agent",
        category: "associate",
    },
    KnownPerson {
        name: "Sarah Kellen",
        variants: &["Sarah Kellen", "Sarah Kensington"],
        role: "Assistant",
        category: "associate",
    },
    KnownPerson {
        name: "Nadia Marcinkova",
        variants: &["Nadia Marcinkova", "Nadia Marcinko"],
        role: "Associate",
        category: "associate",
    },
    KnownPerson {
        name: "Lesley Groff",
        variants: &["Lesley Groff"],
        role: "Executive assistant",
        category: "associate",
    },
    KnownPerson {
        name: "Alexander Acosta",
        variants: &["Alexander Acosta", "Alex Acosta", "R. Alexander Acosta"],
        role: "U.S. Attorney, Southern District of Florida",
        category: "official",
    },
    KnownPerson {
        name: "Alan Dershowitz",
        variants: &["Alan Dershowitz", "Alan M. Dershowitz"],
        role: "Defense attorney",
        category: "legal",
    },
    KnownPerson {
        name: "Michael Reiter",
        variants: &["Michael Reiter", "Chief Reiter"],
        role: "Palm Beach Police Chief",
        category: "law enforcement",
    },
];

static MATCHERS: Lazy<Vec<(&'static KnownPerson, Regex)>> = Lazy::new(|| {
    KNOWN_PERSONS
        .iter()
        .map(|person| {
            let alternation = person
                .variants
                .iter()
                .map(|v| {
                    let escaped = v
                        .split_whitespace()
                        .map(regex::escape)
                        .collect::<Vec<_>>()
                        .join(r"\s+");
                    // bare initials only match in upper case
                    if v.len() <= 2 {
                        escaped
                    } else {
                        format!("(?i:{})", escaped)
                    }
                })
                .collect::<Vec<_>>()
                .join("|");
            (person, Regex::new(&format!(r"\b(?:{})\b", alternation)).unwrap())
        })
        .collect()
});

/// Every dictionary individual mentioned in `text`, in dictionary order,
/// with the hit count and a context window around the first hit.
pub fn match_known_persons(text: &str) -> Vec<PersonMention> {
    MATCHERS
        .iter()
        .filter_map(|(person, re)| {
            let mut hits = re.find_iter(text);
            let first = hits.next()?;
            let count = 1 + hits.count() as u32;
            Some(PersonMention {
                name: person.name.to_string(),
                role: person.role.to_string(),
                category: person.category.to_string(),
                context: context_window(text, first.start(), first.end(), CONTEXT_RADIUS),
                mention_count: count,
            })
        })
        .collect()
}

/// Up to `radius` characters either side of `start..end`, whitespace
/// collapsed. Always cuts on char boundaries.
pub(crate) fn context_window(text: &str, start: usize, end: usize, radius: usize) -> String {
    let from = text[..start]
        .char_indices()
        .rev()
        .take(radius)
        .last()
        .map_or(start, |(i, _)| i);
    let to = text[end..]
        .char_indices()
        .nth(radius)
        .map_or(text.len(), |(i, _)| end + i);
    text[from..to].split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_variants_and_counts() {
        let text = "Jeffrey  Epstein met with counsel. Later, jeffrey e. epstein returned.";
        let persons = match_known_persons(text);
        assert_eq!(persons.len(), 1);
        assert_eq!(persons[0].name, "Jeffrey Epstein");
        assert_eq!(persons[0].mention_count, 2);
        assert_eq!(persons[0].category, "principal");
    }

    #[test]
    fn test_every_person_has_a_matcher() {
        assert_eq!(MATCHERS.len(), KNOWN_PERSONS.len());
    }

    #[test]
    fn test_initials_are_case_sensitive() {
        let persons = match_known_persons("Flight manifest: JE, GM.");
        assert_eq!(persons.len(), 1);
        assert_eq!(persons[0].name, "Jeffrey Epstein");
        assert!(match_known_persons("je ne sais quoi, Je suis").is_empty());
    }

    #[test]
    fn test_word_boundaries() {
        assert!(match_known_persons("The JEWEL case and the jet were discussed.").is_empty());
        assert!(match_known_persons("Brunelleschi designed the dome.").is_empty());
    }

    #[test]
    fn test_dictionary_order() {
        let text = "Alan Dershowitz wrote to Alexander Acosta about Ghislaine Maxwell.";
        let names: Vec<String> = match_known_persons(text).into_iter().map(|p| p.name).collect();
        assert_eq!(names, vec!["Ghislaine Maxwell", "Alexander Acosta", "Alan Dershowitz"]);
    }

    #[test]
    fn test_context_window_is_char_safe() {
        let text = "ééééééééé Ghislaine Maxwell ééééé";
        let start = text.find("Ghislaine").unwrap();
        let end = start + "Ghislaine Maxwell".len();
        assert_eq!(context_window(text, start, end, 3), "éé Ghislaine Maxwell éé");
        assert_eq!(context_window(text, start, end, 100), text);
    }
}
