//! Merge-or-create for one incoming row.
//!
//! ```text
//!   record ─▶ local key ─▶ seen this run? ──yes──▶ Duplicate
//!                              │no
//!                              ▼
//!                    resolve_any(match keys)
//!            ┌─────────────┼──────────────┐
//!        NotFound        Found         Ambiguous
//!     create (or Unmatched  apply props     count, skip
//!     when merge-only)      + labels
//! ```

use comptox_graphdb::{GraphStore, NodeId, Value};
use comptox_ontology::Ontology;
use std::collections::HashSet;

use crate::apply::{initial_slots, ApplyOutcome, PropertyApplier};
use crate::error::BuildError;
use crate::normalize::local_key;
use crate::resolve::{resolve_any, MatchKey, Resolution};
use crate::summary::ImportStageResult;

/// One incoming entity, as an importer describes it.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeRecord {
    pub entity_type: String,
    /// Primary human-readable name; the local key is derived from it.
    pub name: String,
    /// Tried together through [`resolve_any`]. When empty, the local key is
    /// the identity.
    pub match_keys: Vec<MatchKey>,
    /// Applied in order, on creation and on every merge.
    pub properties: Vec<(String, Value)>,
    /// Set only when the entity is created here.
    pub on_create: Vec<(String, Value)>,
    pub extra_labels: Vec<String>,
    /// Add `entity_type` (and its supertypes) to an existing entity.
    pub reclassify: bool,
    pub create_if_missing: bool,
    /// Source line, for diagnostics.
    pub line: usize,
}

impl NodeRecord {
    pub fn new(entity_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            entity_type: entity_type.into(),
            name: name.into(),
            match_keys: Vec::new(),
            properties: Vec::new(),
            on_create: Vec::new(),
            extra_labels: Vec::new(),
            reclassify: false,
            create_if_missing: true,
            line: 0,
        }
    }

    pub fn at_line(mut self, line: usize) -> Self {
        self.line = line;
        self
    }

    pub fn match_on(mut self, key: MatchKey) -> Self {
        self.match_keys.push(key);
        self
    }

    pub fn with(mut self, property: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.push((property.into(), value.into()));
        self
    }

    pub fn with_opt<V: Into<Value>>(self, property: impl Into<String>, value: Option<V>) -> Self {
        match value {
            Some(v) => self.with(property, v),
            None => self,
        }
    }

    pub fn on_create(mut self, property: impl Into<String>, value: impl Into<Value>) -> Self {
        self.on_create.push((property.into(), value.into()));
        self
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.extra_labels.push(label.into());
        self
    }

    pub fn reclassify(mut self) -> Self {
        self.reclassify = true;
        self
    }

    pub fn merge_only(mut self) -> Self {
        self.create_if_missing = false;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeOutcome {
    Created(NodeId),
    Merged(NodeId),
    Ambiguous(Vec<NodeId>),
    Unmatched,
    Duplicate,
    MissingField,
    KeyConflict(NodeId),
}

impl MergeOutcome {
    pub fn node(&self) -> Option<NodeId> {
        match self {
            MergeOutcome::Created(n) | MergeOutcome::Merged(n) => Some(*n),
            _ => None,
        }
    }
}

/// Per-importer merge state: the ontology and the local keys handled so far in
/// this run.
pub struct NodeMerger<'o> {
    importer: String,
    ontology: &'o Ontology,
    applier: PropertyApplier<'o>,
    seen: HashSet<String>,
}

impl<'o> NodeMerger<'o> {
    pub fn new(importer: impl Into<String>, ontology: &'o Ontology) -> Self {
        Self {
            importer: importer.into(),
            ontology,
            applier: PropertyApplier::new(ontology),
            seen: HashSet::new(),
        }
    }

    /// Local keys handled so far in this run.
    pub fn seen(&self) -> usize {
        self.seen.len()
    }

    pub fn merge<S: GraphStore + ?Sized>(
        &mut self,
        store: &mut S,
        record: NodeRecord,
        stats: &mut ImportStageResult,
    ) -> Result<MergeOutcome, BuildError> {
        let Some(type_def) = self.ontology.entity_type(&record.entity_type) else {
            return Err(BuildError::UnknownEntityType(record.entity_type));
        };

        let key = match local_key(&type_def.short_code, &record.name) {
            Ok(key) => key,
            Err(err) => {
                stats.missing_field += 1;
                tracing::warn!(
                    importer = %self.importer,
                    line = record.line,
                    error = %err,
                    "skipping row without a usable name"
                );
                return Ok(MergeOutcome::MissingField);
            }
        };

        if !self.seen.insert(key.clone()) {
            stats.duplicates_in_run += 1;
            tracing::debug!(importer = %self.importer, key = %key, "duplicate row in this run");
            return Ok(MergeOutcome::Duplicate);
        }

        let resolution = if record.match_keys.is_empty() {
            match store.node_by_key(&key) {
                Some(n) => Resolution::Found(n),
                None => Resolution::NotFound,
            }
        } else {
            resolve_any(store, &record.match_keys)
        };

        match resolution {
            Resolution::Found(node) => {
                self.merge_into(store, node, &record, stats)?;
                stats.merged += 1;
                tracing::debug!(importer = %self.importer, key = %key, node, "merged");
                Ok(MergeOutcome::Merged(node))
            }
            Resolution::Ambiguous(candidates) => {
                stats.ambiguous += 1;
                tracing::warn!(
                    importer = %self.importer,
                    line = record.line,
                    key = %key,
                    candidates = ?candidates,
                    "ambiguous match, skipping row"
                );
                Ok(MergeOutcome::Ambiguous(candidates))
            }
            Resolution::NotFound if !record.create_if_missing => {
                stats.unmatched += 1;
                tracing::debug!(importer = %self.importer, key = %key, "no existing entity to merge into");
                Ok(MergeOutcome::Unmatched)
            }
            Resolution::NotFound => {
                if let Some(existing) = store.node_by_key(&key) {
                    stats.key_conflicts += 1;
                    tracing::warn!(
                        importer = %self.importer,
                        line = record.line,
                        key = %key,
                        existing,
                        "local key taken by an entity the match keys did not find, skipping row"
                    );
                    return Ok(MergeOutcome::KeyConflict(existing));
                }
                let node = self.create(store, &key, &record)?;
                stats.created += 1;
                tracing::debug!(importer = %self.importer, key = %key, node, "created");
                Ok(MergeOutcome::Created(node))
            }
        }
    }

    fn labels_for(&self, record: &NodeRecord) -> Vec<String> {
        let mut labels: Vec<String> = Vec::new();
        let ancestry = self.ontology.ancestors(&record.entity_type);
        let extra = record
            .extra_labels
            .iter()
            .flat_map(|l| self.ontology.ancestors(l).into_iter().chain(std::iter::once(l.as_str())));
        for label in ancestry.into_iter().chain(extra) {
            if !labels.iter().any(|l| l == label) {
                labels.push(label.to_string());
            }
        }
        labels
    }

    fn create<S: GraphStore + ?Sized>(
        &self,
        store: &mut S,
        key: &str,
        record: &NodeRecord,
    ) -> Result<NodeId, BuildError> {
        let labels = self.labels_for(record);
        let defs = record
            .on_create
            .iter()
            .chain(&record.properties)
            .map(|(name, value)| {
                self.applier
                    .definition(&labels, name)
                    .map(|def| (def.clone(), value.clone()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(store.create_node(key, &labels, initial_slots(defs))?)
    }

    fn merge_into<S: GraphStore + ?Sized>(
        &self,
        store: &mut S,
        node: NodeId,
        record: &NodeRecord,
        stats: &mut ImportStageResult,
    ) -> Result<(), BuildError> {
        let mut new_labels = self.labels_for(record);
        if !record.reclassify {
            new_labels.retain(|l| record.extra_labels.contains(l));
        }
        for label in &new_labels {
            if store.add_label(node, label)? {
                stats.labels_added += 1;
                tracing::debug!(importer = %self.importer, node, label = %label, "label added");
            }
        }

        for (name, value) in &record.properties {
            let outcome = self.applier.apply(store, node, name, Some(value.clone()))?;
            if outcome != ApplyOutcome::Unchanged {
                tracing::trace!(importer = %self.importer, node, property = %name, "property updated");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use comptox_graphdb::{GraphDb, PropertySlot};

    fn ontology() -> Ontology {
        Ontology::comptox().unwrap()
    }

    #[test]
    fn create_then_merge() {
        let ont = ontology();
        let mut db = GraphDb::new();
        let mut stats = ImportStageResult::default();

        let mut first = NodeMerger::new("hetionet", &ont);
        let rec = NodeRecord::new("Chemical", "Warfarin")
            .match_on(MatchKey::new("xrefCasRN", "81-81-2"))
            .with("xrefCasRN", "81-81-2")
            .with("commonName", "Warfarin");
        let created = first.merge(&mut db, rec, &mut stats).unwrap();
        let node = created.node().unwrap();
        assert_eq!(db.key_of(node).as_deref(), Some("chem_warfarin"));

        let mut second = NodeMerger::new("ctd", &ont);
        let rec = NodeRecord::new("Chemical", "warfarin sodium")
            .match_on(MatchKey::new("xrefCasRN", "81-81-2"))
            .with("chemicalIsInCTD", true)
            .merge_only();
        assert_eq!(
            second.merge(&mut db, rec, &mut stats).unwrap(),
            MergeOutcome::Merged(node)
        );
        assert_eq!(db.node_count(), 1);
        assert_eq!(
            db.property(node, "chemicalIsInCTD"),
            Some(PropertySlot::Single(true.into()))
        );
        assert_eq!(stats.created, 1);
        assert_eq!(stats.merged, 1);
    }

    #[test]
    fn creation_only_properties_survive_merges() {
        let ont = ontology();
        let mut db = GraphDb::new();
        let mut stats = ImportStageResult::default();
        let record = |name: &str| {
            NodeRecord::new("Disease", name)
                .match_on(MatchKey::new("xrefMeSH", "D010300"))
                .with("xrefMeSH", "D010300")
                .on_create("commonName", name)
        };
        let node = NodeMerger::new("hetionet", &ont)
            .merge(&mut db, record("Parkinson's disease"), &mut stats)
            .unwrap()
            .node()
            .unwrap();
        NodeMerger::new("ctd", &ont)
            .merge(&mut db, record("Parkinson Disease"), &mut stats)
            .unwrap();
        assert_eq!(
            db.property(node, "commonName"),
            Some(PropertySlot::Single("Parkinson's disease".into()))
        );
    }

    #[test]
    fn duplicate_rows_are_skipped_without_resolving() {
        let ont = ontology();
        let mut db = GraphDb::new();
        let mut stats = ImportStageResult::default();
        let mut merger = NodeMerger::new("t", &ont);
        for _ in 0..3 {
            merger
                .merge(&mut db, NodeRecord::new("Gene", "TP53"), &mut stats)
                .unwrap();
        }
        assert_eq!(stats.created, 1);
        assert_eq!(stats.duplicates_in_run, 2);
    }

    #[test]
    fn subtype_nodes_carry_supertype_labels() {
        let ont = ontology();
        let mut db = GraphDb::new();
        let mut stats = ImportStageResult::default();
        let mut merger = NodeMerger::new("aop", &ont);
        let out = merger
            .merge(
                &mut db,
                NodeRecord::new("MolecularInitiatingEvent", "Binding to AhR"),
                &mut stats,
            )
            .unwrap();
        let node = out.node().unwrap();
        assert_eq!(
            db.labels(node),
            vec!["MolecularInitiatingEvent".to_string(), "KeyEvent".to_string()]
        );
    }

    #[test]
    fn unknown_property_is_fatal() {
        let ont = ontology();
        let mut db = GraphDb::new();
        let mut stats = ImportStageResult::default();
        let mut merger = NodeMerger::new("t", &ont);
        let err = merger
            .merge(
                &mut db,
                NodeRecord::new("Gene", "TP53").with("notAProperty", "x"),
                &mut stats,
            )
            .unwrap_err();
        assert!(matches!(err, BuildError::UnknownProperty { .. }));
    }

    #[test]
    fn unusable_name_counts_missing_field() {
        let ont = ontology();
        let mut db = GraphDb::new();
        let mut stats = ImportStageResult::default();
        let mut merger = NodeMerger::new("t", &ont);
        let out = merger
            .merge(&mut db, NodeRecord::new("Gene", "--"), &mut stats)
            .unwrap();
        assert_eq!(out, MergeOutcome::MissingField);
        assert_eq!(stats.missing_field, 1);
        assert_eq!(db.node_count(), 0);
    }

    #[test]
    fn taken_key_without_matching_identifier_is_a_conflict() {
        let ont = ontology();
        let mut db = GraphDb::new();
        let mut stats = ImportStageResult::default();
        let rec = |cas: &str| {
            NodeRecord::new("Chemical", "Warfarin")
                .match_on(MatchKey::new("xrefCasRN", cas))
                .with("xrefCasRN", cas)
        };
        let node = NodeMerger::new("hetionet", &ont)
            .merge(&mut db, rec("81-81-2"), &mut stats)
            .unwrap()
            .node()
            .unwrap();

        let out = NodeMerger::new("epa", &ont)
            .merge(&mut db, rec("99-99-9"), &mut stats)
            .unwrap();
        assert_eq!(out, MergeOutcome::KeyConflict(node));
        assert_eq!(stats.key_conflicts, 1);
        assert_eq!(stats.created, 1);
        assert_eq!(db.node_count(), 1);
        assert_eq!(
            db.property(node, "xrefCasRN"),
            Some(PropertySlot::Single("81-81-2".into()))
        );
    }
}
