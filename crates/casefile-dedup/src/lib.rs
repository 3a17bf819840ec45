//! Person deduplication — collapses duplicate person records created by
//! independent analysis runs into canonical individuals.
//!
//! Candidates are blocked by name-token prefixes, matched by a fixed
//! sequence of strategies, clustered with union-find, and each cluster is
//! merged into its heaviest member.

pub mod matching;
pub mod nicknames;
pub mod pipeline;
pub mod types;
pub mod union_find;

pub use matching::{normalize_name, NameProfile};
pub use pipeline::Deduplicator;
pub use types::*;
pub use union_find::UnionFind;
