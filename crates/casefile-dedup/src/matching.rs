//! Name normalization, candidate blocking, and the pairwise matching
//! strategies.

use std::collections::{BTreeSet, HashMap};

use casefile_store::Person;
use tracing::warn;

use crate::nicknames::equivalent_first_names;
use crate::types::{DedupConfig, MatchStrategy};

/// Honorifics dropped before token comparison.
const TITLES: &[&str] = &[
    "mr", "mrs", "ms", "miss", "dr", "prof", "sir", "dame", "hon", "rev", "judge", "det",
    "detective", "officer", "agent", "sgt",
];

/// Blocks larger than this are skipped; they come from very common
/// prefixes and would dominate the comparison count.
const MAX_BLOCK_SIZE: usize = 5_000;

/// Lower-case, punctuation to spaces, titles dropped, whitespace collapsed.
pub fn normalize_name(name: &str) -> String {
    let cleaned: String = name
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();
    cleaned
        .split_whitespace()
        .filter(|t| !TITLES.contains(t))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Precomputed comparison keys for one person.
#[derive(Debug, Clone)]
pub struct NameProfile {
    pub index: usize,
    exact: String,
    compact: String,
    normalized: String,
    tokens: Vec<String>,
    sorted: String,
    aliases: Vec<String>,
}

impl NameProfile {
    pub fn new(index: usize, person: &Person) -> Self {
        let exact = person.name.trim().to_lowercase();
        let compact: String = exact.chars().filter(|c| !c.is_whitespace()).collect();
        let normalized = normalize_name(&person.name);
        let tokens: Vec<String> = normalized.split(' ').filter(|t| !t.is_empty()).map(String::from).collect();
        let mut sorted_tokens = tokens.clone();
        sorted_tokens.sort();
        let aliases = person
            .aliases
            .iter()
            .map(|a| normalize_name(a))
            .filter(|a| !a.is_empty())
            .collect();
        Self {
            index,
            exact,
            compact,
            normalized,
            sorted: sorted_tokens.join(" "),
            tokens,
            aliases,
        }
    }

    /// 3-character prefixes of every name and alias token, plus the
    /// whitespace-free name.
    pub fn blocking_keys(&self) -> BTreeSet<String> {
        let mut keys = BTreeSet::new();
        if !self.compact.is_empty() {
            keys.insert(format!("c:{}", self.compact));
        }
        let alias_tokens = self.aliases.iter().flat_map(|a| a.split(' '));
        for token in self.tokens.iter().map(String::as_str).chain(alias_tokens) {
            let prefix: String = token.chars().take(3).collect();
            if !prefix.is_empty() {
                keys.insert(format!("t:{}", prefix));
            }
        }
        keys
    }
}

/// Index pairs `(i, j)` with `i < j` that share at least one blocking key,
/// in ascending order.
pub fn candidate_pairs(profiles: &[NameProfile]) -> Vec<(usize, usize)> {
    let mut blocks: HashMap<String, Vec<usize>> = HashMap::new();
    for profile in profiles {
        for key in profile.blocking_keys() {
            blocks.entry(key).or_default().push(profile.index);
        }
    }

    let mut pairs = BTreeSet::new();
    for (key, members) in &blocks {
        if members.len() > MAX_BLOCK_SIZE {
            warn!("Skipping oversized block {} ({} persons)", key, members.len());
            continue;
        }
        for (n, &a) in members.iter().enumerate() {
            for &b in &members[n + 1..] {
                pairs.insert((a.min(b), a.max(b)));
            }
        }
    }
    pairs.into_iter().collect()
}

/// The first strategy under which `a` and `b` name the same person.
pub fn match_strategy(a: &NameProfile, b: &NameProfile, config: &DedupConfig) -> Option<MatchStrategy> {
    if a.exact.is_empty() || b.exact.is_empty() {
        return None;
    }
    if a.exact == b.exact {
        return Some(MatchStrategy::ExactName);
    }
    if a.compact == b.compact {
        return Some(MatchStrategy::WhitespaceInsensitive);
    }
    if a.normalized.is_empty() || b.normalized.is_empty() {
        return None;
    }
    if a.sorted == b.sorted {
        return Some(MatchStrategy::SortedTokens);
    }

    let shorter = a.normalized.chars().count().min(b.normalized.chars().count());
    if shorter >= config.min_edit_length
        && strsim::levenshtein(&a.normalized, &b.normalized) <= config.max_edit_distance
    {
        return Some(MatchStrategy::EditDistance);
    }

    if a.tokens.len() >= 2
        && a.tokens.len() == b.tokens.len()
        && a.tokens[1..] == b.tokens[1..]
        && equivalent_first_names(&a.tokens[0], &b.tokens[0])
    {
        return Some(MatchStrategy::Nickname);
    }

    if a.aliases.contains(&b.normalized) || b.aliases.contains(&a.normalized) {
        return Some(MatchStrategy::AliasContainment);
    }
    None
}
