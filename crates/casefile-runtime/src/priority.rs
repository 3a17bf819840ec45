//! Static per-data-set job priorities.

/// Built-in priorities. Private correspondence and travel records carry
/// the most names per page and go first; image-heavy sets go last.
pub const DATA_SET_PRIORITIES: &[(&str, i32)] = &[
    ("correspondence", 100),
    ("emails", 95),
    ("flight-logs", 90),
    ("contact-book", 90),
    ("depositions", 85),
    ("court-filings", 70),
    ("police-reports", 65),
    ("fbi-vault", 60),
    ("financial-records", 60),
    ("media", 30),
    ("photos", 20),
];

#[derive(Debug, Clone)]
pub struct PriorityTable {
    entries: Vec<(String, i32)>,
    default_priority: i32,
}

impl PriorityTable {
    pub fn new(entries: Vec<(String, i32)>, default_priority: i32) -> Self {
        Self {
            entries,
            default_priority,
        }
    }

    pub fn builtin(default_priority: i32) -> Self {
        Self::new(
            DATA_SET_PRIORITIES
                .iter()
                .map(|(name, p)| (name.to_string(), *p))
                .collect(),
            default_priority,
        )
    }

    /// Priority for a data set; unknown or missing sets get the default.
    pub fn priority_for(&self, data_set_id: Option<&str>) -> i32 {
        let Some(id) = data_set_id.map(str::trim) else {
            return self.default_priority;
        };
        self.entries
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(id))
            .map(|(_, p)| *p)
            .unwrap_or(self.default_priority)
    }

    pub fn default_priority(&self) -> i32 {
        self.default_priority
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_and_unknown_sets() {
        let table = PriorityTable::builtin(50);
        assert_eq!(table.priority_for(Some("correspondence")), 100);
        assert_eq!(table.priority_for(Some("Flight-Logs")), 90);
        assert_eq!(table.priority_for(Some("data-set-7")), 50);
        assert_eq!(table.priority_for(None), 50);
    }
}
