use serde::{Deserialize, Serialize};

/// Audit counters for one importer run.
///
/// Every recoverable skip is counted under exactly one field, so a test or an
/// operator can assert exact numbers after a run.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportStageResult {
    pub rows_read: usize,

    // Nodes
    pub created: usize,
    pub merged: usize,
    pub labels_added: usize,
    pub ambiguous: usize,
    /// Merge-only rows whose match keys found nothing.
    pub unmatched: usize,
    pub filtered: usize,
    pub missing_field: usize,
    /// Rows whose local key is already taken by an entity the match keys did
    /// not find.
    pub key_conflicts: usize,
    /// Second and later occurrences of a local key within one run.
    pub duplicates_in_run: usize,

    // Edges
    pub edges_created: usize,
    pub edges_existing: usize,
    pub edges_unmatched_subject: usize,
    pub edges_unmatched_object: usize,
    pub edges_ambiguous: usize,
}

impl ImportStageResult {
    pub fn absorb(&mut self, other: &ImportStageResult) {
        self.rows_read += other.rows_read;
        self.created += other.created;
        self.merged += other.merged;
        self.labels_added += other.labels_added;
        self.ambiguous += other.ambiguous;
        self.unmatched += other.unmatched;
        self.filtered += other.filtered;
        self.missing_field += other.missing_field;
        self.key_conflicts += other.key_conflicts;
        self.duplicates_in_run += other.duplicates_in_run;
        self.edges_created += other.edges_created;
        self.edges_existing += other.edges_existing;
        self.edges_unmatched_subject += other.edges_unmatched_subject;
        self.edges_unmatched_object += other.edges_unmatched_object;
        self.edges_ambiguous += other.edges_ambiguous;
    }

    pub fn rows_skipped(&self) -> usize {
        self.ambiguous
            + self.unmatched
            + self.filtered
            + self.missing_field
            + self.key_conflicts
            + self.duplicates_in_run
    }

    pub fn edges_skipped(&self) -> usize {
        self.edges_unmatched_subject + self.edges_unmatched_object + self.edges_ambiguous
    }
}
