use parking_lot::RwLock;
use std::collections::{BTreeSet, HashMap};

/// Per-context record of distinct tracker domains.
///
/// Entries are created lazily on the first hit for a context and dropped
/// wholesale when the context is torn down; nothing here is persisted.
#[derive(Default)]
pub struct Ledger {
    entries: RwLock<HashMap<u32, BTreeSet<String>>>,
}

/// Badge rendering for a context, derived from the score
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Badge {
    pub text: String,
    pub color: &'static str,
}

impl Ledger {
    /// Add a tracker hit; repeated hits on the same domain are no-ops.
    /// Returns the context's score after recording.
    pub fn record(&self, context_id: u32, hostname: &str) -> u8 {
        let mut entries = self.entries.write();
        let trackers = entries.entry(context_id).or_default();
        trackers.insert(hostname.to_string());
        score_for(trackers.len())
    }

    /// Score in [0, 100], or None for a context with no recorded hits
    pub fn score(&self, context_id: u32) -> Option<u8> {
        self.entries
            .read()
            .get(&context_id)
            .map(|t| score_for(t.len()))
    }

    /// Sorted tracker domains for a context, empty when absent
    pub fn snapshot(&self, context_id: u32) -> Vec<String> {
        self.entries
            .read()
            .get(&context_id)
            .map(|t| t.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Drop a context's entry; safe to call for an unknown context
    pub fn evict(&self, context_id: u32) {
        self.entries.write().remove(&context_id);
    }

    pub fn badge(&self, context_id: u32) -> Badge {
        let entries = self.entries.read();
        let count = entries.get(&context_id).map_or(0, |t| t.len());
        let score = score_for(count);

        let color = if score <= 40 {
            "#dc3545"
        } else if score <= 70 {
            "#ffc107"
        } else {
            "#28a745"
        };

        let text = if count > 0 {
            count.to_string()
        } else {
            String::new()
        };

        Badge { text, color }
    }
}

fn score_for(count: usize) -> u8 {
    100u8.saturating_sub(count.min(100) as u8)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_is_idempotent_per_domain() {
        let ledger = Ledger::default();
        let a = ledger.record(1, "tracker.example");
        let b = ledger.record(1, "tracker.example");
        assert_eq!(a, b);
        assert_eq!(ledger.score(1), Some(99));
    }

    #[test]
    fn score_clamps_at_zero() {
        let ledger = Ledger::default();
        for i in 0..150 {
            ledger.record(7, &format!("t{i}.example"));
        }
        assert_eq!(ledger.score(7), Some(0));
    }

    #[test]
    fn absent_context_has_no_score() {
        let ledger = Ledger::default();
        assert_eq!(ledger.score(42), None);
        assert!(ledger.snapshot(42).is_empty());
    }

    #[test]
    fn snapshot_is_sorted_and_distinct() {
        let ledger = Ledger::default();
        ledger.record(3, "b.example");
        ledger.record(3, "a.example");
        ledger.record(3, "b.example");
        assert_eq!(ledger.snapshot(3), vec!["a.example", "b.example"]);
    }

    #[test]
    fn evict_clears_history() {
        let ledger = Ledger::default();
        ledger.record(9, "t.example");
        ledger.evict(9);
        assert_eq!(ledger.score(9), None);
        assert!(ledger.snapshot(9).is_empty());

        // unknown context is a no-op
        ledger.evict(1000);
    }

    #[test]
    fn badge_buckets() {
        let ledger = Ledger::default();
        assert_eq!(ledger.badge(1).color, "#28a745");
        assert_eq!(ledger.badge(1).text, "");

        for i in 0..30 {
            ledger.record(1, &format!("t{i}.example"));
        }
        // score 70 is the top of the yellow bucket
        assert_eq!(ledger.badge(1).color, "#ffc107");
        assert_eq!(ledger.badge(1).text, "30");

        for i in 30..60 {
            ledger.record(1, &format!("t{i}.example"));
        }
        assert_eq!(ledger.badge(1).color, "#dc3545");
    }
}
