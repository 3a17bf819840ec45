//! Analysis result data model shared by both tiers, the artifact cache,
//! and the graph upsert stage.

use serde::{Deserialize, Serialize};

use crate::tier::AnalysisTier;

/// Document type used when nothing more specific can be determined.
pub const DEFAULT_DOCUMENT_TYPE: &str = "government record";

/// Summary written when every chunk of a Tier-1 analysis failed.
pub const UNABLE_TO_ANALYZE: &str = "Unable to analyze document";

/// A named individual mentioned in a document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PersonMention {
    pub name: String,
    pub role: String,
    pub category: String,
    pub context: String,
    pub mention_count: u32,
}

/// A relationship between two mentioned individuals.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConnectionMention {
    pub person1: String,
    pub person2: String,
    pub relationship_type: String,
    pub description: String,
    /// 1 (weak) ..= 5 (strong).
    pub strength: u8,
}

/// A dated event described in a document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EventMention {
    pub date: String,
    pub title: String,
    pub description: String,
    pub category: String,
    /// 1 (minor) ..= 5 (major).
    pub significance: u8,
    pub persons_involved: Vec<String>,
}

/// Output of one document's analysis, merged across chunks.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AnalysisResult {
    /// Key of the document this result was written for; set when the
    /// result is stored as an artifact.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_key: Option<String>,
    pub tier: AnalysisTier,
    pub document_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_original: Option<String>,
    pub summary: String,
    pub persons: Vec<PersonMention>,
    pub connections: Vec<ConnectionMention>,
    pub events: Vec<EventMention>,
    pub locations: Vec<String>,
    pub key_facts: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub cost_cents: f64,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub chunks_analyzed: u32,
    pub chunks_failed: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analyzed_at: Option<String>,
}

impl Default for AnalysisResult {
    fn default() -> Self {
        Self {
            document_key: None,
            tier: AnalysisTier::Rules,
            document_type: DEFAULT_DOCUMENT_TYPE.to_string(),
            date_original: None,
            summary: String::new(),
            persons: Vec::new(),
            connections: Vec::new(),
            events: Vec::new(),
            locations: Vec::new(),
            key_facts: Vec::new(),
            model: None,
            cost_cents: 0.0,
            input_tokens: 0,
            output_tokens: 0,
            chunks_analyzed: 0,
            chunks_failed: 0,
            analyzed_at: None,
        }
    }
}

impl AnalysisResult {
    /// Placeholder for a Tier-1 document whose chunks all failed to parse.
    pub fn unable_to_analyze() -> Self {
        Self {
            tier: AnalysisTier::Ai,
            summary: UNABLE_TO_ANALYZE.to_string(),
            ..Default::default()
        }
    }

    pub fn is_placeholder(&self) -> bool {
        self.summary == UNABLE_TO_ANALYZE && self.persons.is_empty()
    }
}

/// Clamp a model-supplied 1–5 score, defaulting missing/zero values to 1.
pub fn clamp_score(value: i64) -> u8 {
    value.clamp(1, 5) as u8
}
