//! Deduplication pass over the person table.

use std::collections::HashMap;

use casefile_core::Result;
use casefile_store::{Person, PersonStore};
use tracing::{debug, info, warn};

use crate::matching::{candidate_pairs, match_strategy, NameProfile};
use crate::types::*;
use crate::union_find::UnionFind;

/// Clusters duplicate persons and folds each cluster into its canonical
/// record.
#[derive(Debug, Clone, Default)]
pub struct Deduplicator {
    config: DedupConfig,
}

impl Deduplicator {
    pub fn new(config: DedupConfig) -> Self {
        Self { config }
    }

    /// Group `persons` without touching storage. The canonical member of a
    /// group has the highest `document_count + connection_count`, ties going
    /// to the lowest id.
    pub fn find_groups(&self, persons: &[Person], report: &mut DedupReport) -> Vec<DedupGroup> {
        let mut persons: Vec<&Person> = persons.iter().collect();
        persons.sort_by_key(|p| p.id);

        let profiles: Vec<NameProfile> = persons
            .iter()
            .enumerate()
            .map(|(i, p)| NameProfile::new(i, p))
            .collect();
        let pairs = candidate_pairs(&profiles);
        report.persons_scanned = persons.len();
        report.candidate_pairs = pairs.len();

        let mut sets = UnionFind::new(persons.len());
        for (a, b) in pairs {
            if let Some(strategy) = match_strategy(&profiles[a], &profiles[b], &self.config) {
                if sets.union(a, b) {
                    *report.matches.entry(strategy).or_default() += 1;
                    debug!(
                        "{:?} matches {:?} ({})",
                        persons[a].name,
                        persons[b].name,
                        strategy.as_str()
                    );
                }
            }
        }

        let groups: Vec<DedupGroup> = sets
            .groups()
            .into_iter()
            .map(|members| {
                let mut members: Vec<&Person> = members.into_iter().map(|i| persons[i]).collect();
                members.sort_by(|a, b| b.weight().cmp(&a.weight()).then(a.id.cmp(&b.id)));
                let canonical = members[0];
                DedupGroup {
                    canonical_id: canonical.id,
                    canonical_name: canonical.name.clone(),
                    duplicate_ids: members[1..].iter().map(|p| p.id).collect(),
                    duplicate_names: members[1..].iter().map(|p| p.name.clone()).collect(),
                }
            })
            .collect();
        report.groups_found = groups.len();
        groups
    }

    /// Run a full pass. Each group is merged in its own transaction, so an
    /// interrupted run can simply be repeated. With `dry_run` the groups are
    /// reported and nothing is written.
    pub fn run<S: PersonStore + ?Sized>(&self, store: &S, dry_run: bool) -> Result<DedupReport> {
        let start = std::time::Instant::now();
        let mut report = DedupReport {
            dry_run,
            ..Default::default()
        };

        let persons = store.list_persons()?;
        info!("Starting deduplication over {} persons", persons.len());
        let groups = self.find_groups(&persons, &mut report);

        if !dry_run {
            for group in &groups {
                match store.merge_persons(group.canonical_id, &group.duplicate_ids) {
                    Ok(()) => {
                        report.groups_merged += 1;
                        report.persons_removed += group.duplicate_ids.len();
                        debug!(
                            "Merged {:?} into {} ({:?})",
                            group.duplicate_names, group.canonical_id, group.canonical_name
                        );
                    }
                    Err(e) => warn!("Failed to merge group for {}: {}", group.canonical_id, e),
                }
            }
            report.self_loops_purged = store.purge_self_connections()?;
            report.duplicate_connections_collapsed = store.collapse_duplicate_connections()?;
        }

        report.groups = groups;
        report.duration_ms = start.elapsed().as_millis() as u64;
        let by_strategy: HashMap<&str, usize> =
            report.matches.iter().map(|(s, n)| (s.as_str(), *n)).collect();
        info!(
            "Deduplication complete: scanned={}, candidates={}, groups={}, merged={}, removed={}, self_loops={}, collapsed={}, matches={:?}, duration={}ms",
            report.persons_scanned,
            report.candidate_pairs,
            report.groups_found,
            report.groups_merged,
            report.persons_removed,
            report.self_loops_purged,
            report.duplicate_connections_collapsed,
            by_strategy,
            report.duration_ms
        );
        Ok(report)
    }
}
