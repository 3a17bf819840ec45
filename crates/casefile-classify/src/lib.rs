//! Casefile Classify — free, rule-based (Tier 0) document analysis.
//!
//! Dictionary matching of known individuals, ordered document-type
//! patterns, date extraction, and a small location gazetteer. No network,
//! no randomness: the same text always yields the same result.

pub mod classifier;
pub mod dictionary;
pub mod doc_type;
pub mod gazetteer;

pub use classifier::classify;
pub use dictionary::{KnownPerson, KNOWN_PERSONS};
