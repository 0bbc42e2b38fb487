//! Entity resolution: match keys to merge/create decisions.
//!
//! ```text
//!   resolve(key)        → 0 hits: NotFound | 1 hit: Found | >1: Ambiguous
//!   resolve_any([k..])  → union of hits over every key, then the same rule
//! ```
//!
//! Lookups only read the store.

use comptox_graphdb::{GraphStore, NodeId, Value};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// A `(property, value)` pair used to look up existing entities, optionally
/// restricted to entities carrying `label`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchKey {
    pub property: String,
    pub value: Value,
    pub label: Option<String>,
}

impl MatchKey {
    pub fn new(property: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            property: property.into(),
            value: value.into(),
            label: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

impl fmt::Display for MatchKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.label {
            Some(label) => write!(f, "{label}.{}={}", self.property, self.value),
            None => write!(f, "{}={}", self.property, self.value),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Found(NodeId),
    NotFound,
    /// Every distinct candidate, ascending.
    Ambiguous(Vec<NodeId>),
}

impl Resolution {
    fn from_hits(hits: BTreeSet<NodeId>) -> Self {
        let mut hits = hits.into_iter();
        match (hits.next(), hits.next()) {
            (None, _) => Resolution::NotFound,
            (Some(one), None) => Resolution::Found(one),
            (Some(a), Some(b)) => {
                let mut all = vec![a, b];
                all.extend(hits);
                Resolution::Ambiguous(all)
            }
        }
    }

    pub fn found(&self) -> Option<NodeId> {
        match self {
            Resolution::Found(n) => Some(*n),
            _ => None,
        }
    }
}

fn hits<S: GraphStore + ?Sized>(store: &S, key: &MatchKey) -> Vec<NodeId> {
    match &key.label {
        Some(label) => store.find_nodes_with_label(label, &key.property, &key.value),
        None => store.find_nodes(&key.property, &key.value),
    }
}

pub fn resolve<S: GraphStore + ?Sized>(store: &S, key: &MatchKey) -> Resolution {
    Resolution::from_hits(hits(store, key).into_iter().collect())
}

/// Resolve a record that carries several alternate identifiers.
///
/// One entity reached through several keys is `Found`; two or more distinct
/// entities are `Ambiguous`. An empty key list is `NotFound`.
pub fn resolve_any<S: GraphStore + ?Sized>(store: &S, keys: &[MatchKey]) -> Resolution {
    Resolution::from_hits(keys.iter().flat_map(|k| hits(store, k)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use comptox_graphdb::{GraphDb, Properties, PropertySlot};

    fn with_prop(db: &mut GraphDb, key: &str, label: &str, prop: &str, value: &str) -> NodeId {
        let mut props = Properties::new();
        props.insert(prop.to_string(), PropertySlot::Single(value.into()));
        db.create_node(key, &[label.to_string()], props).unwrap()
    }

    #[test]
    fn single_key_classification() {
        let mut db = GraphDb::new();
        let a = with_prop(&mut db, "chem_a", "Chemical", "xrefCasRN", "1");
        with_prop(&mut db, "chem_b", "Chemical", "xrefCasRN", "2");
        with_prop(&mut db, "chem_c", "Chemical", "xrefCasRN", "2");

        assert_eq!(resolve(&db, &MatchKey::new("xrefCasRN", "1")), Resolution::Found(a));
        assert_eq!(resolve(&db, &MatchKey::new("xrefCasRN", "3")), Resolution::NotFound);
        assert_eq!(
            resolve(&db, &MatchKey::new("xrefCasRN", "2")),
            Resolution::Ambiguous(vec![1, 2])
        );
    }

    #[test]
    fn label_scope_filters_candidates() {
        let mut db = GraphDb::new();
        let d = with_prop(&mut db, "dis_x", "Disease", "xrefMeSH", "D1");
        with_prop(&mut db, "phen_x", "Phenotype", "xrefMeSH", "D1");
        let key = MatchKey::new("xrefMeSH", "D1");
        assert!(matches!(resolve(&db, &key), Resolution::Ambiguous(_)));
        assert_eq!(resolve(&db, &key.with_label("Disease")), Resolution::Found(d));
    }

    #[test]
    fn resolve_any_unions_keys() {
        let mut db = GraphDb::new();
        let d = with_prop(&mut db, "dis_x", "Disease", "xrefMeSH", "D1");
        db.append_to_property(d, "xrefDiseaseOntology", "DOID1".into())
            .unwrap();
        let other = with_prop(&mut db, "dis_y", "Disease", "xrefMeSH", "D2");

        let same = [
            MatchKey::new("xrefDiseaseOntology", "DOID1"),
            MatchKey::new("xrefMeSH", "D1"),
        ];
        assert_eq!(resolve_any(&db, &same), Resolution::Found(d));

        let split = [
            MatchKey::new("xrefDiseaseOntology", "DOID1"),
            MatchKey::new("xrefMeSH", "D2"),
        ];
        assert_eq!(resolve_any(&db, &split), Resolution::Ambiguous(vec![d, other]));
        assert_eq!(resolve_any(&db, &[]), Resolution::NotFound);
    }
}
