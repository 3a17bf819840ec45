//! Deduplication types.

use std::collections::BTreeMap;

use serde::Serialize;

/// Matching strategies, tried in this order for every candidate pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStrategy {
    ExactName,
    WhitespaceInsensitive,
    SortedTokens,
    EditDistance,
    Nickname,
    AliasContainment,
}

impl MatchStrategy {
    pub fn all() -> &'static [MatchStrategy] {
        &[
            Self::ExactName,
            Self::WhitespaceInsensitive,
            Self::SortedTokens,
            Self::EditDistance,
            Self::Nickname,
            Self::AliasContainment,
        ]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::ExactName => "exact_name",
            Self::WhitespaceInsensitive => "whitespace_insensitive",
            Self::SortedTokens => "sorted_tokens",
            Self::EditDistance => "edit_distance",
            Self::Nickname => "nickname",
            Self::AliasContainment => "alias_containment",
        }
    }
}

/// Matching thresholds.
#[derive(Debug, Clone)]
pub struct DedupConfig {
    /// Largest Levenshtein distance treated as a typo.
    pub max_edit_distance: usize,
    /// Edit distance is only tried when the shorter normalized name has at
    /// least this many characters.
    pub min_edit_length: usize,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            max_edit_distance: 2,
            min_edit_length: 8,
        }
    }
}

/// One set of persons judged to be the same individual.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DedupGroup {
    pub canonical_id: i64,
    pub canonical_name: String,
    pub duplicate_ids: Vec<i64>,
    pub duplicate_names: Vec<String>,
}

/// Result of a deduplication pass.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DedupReport {
    pub dry_run: bool,
    pub persons_scanned: usize,
    pub candidate_pairs: usize,
    /// Unions made, by the strategy that matched.
    pub matches: BTreeMap<MatchStrategy, usize>,
    pub groups_found: usize,
    pub groups_merged: usize,
    pub persons_removed: usize,
    pub self_loops_purged: usize,
    pub duplicate_connections_collapsed: usize,
    pub duration_ms: u64,
    pub groups: Vec<DedupGroup>,
}

impl DedupReport {
    pub fn total_matches(&self) -> usize {
        self.matches.values().sum()
    }
}
