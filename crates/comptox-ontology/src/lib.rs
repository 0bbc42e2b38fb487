//! ComptoxAI ontology schema
//!
//! The ontology is the configuration input of the graph build: it names the
//! entity types that may appear in the graph, the short code each type uses
//! as a local-key prefix, the property slots each type carries and whether
//! those slots are functional or multi-valued, and the relationship types
//! that may connect entities.
//!
//! ```text
//! ontology ComptoxAI
//!
//! entity KeyEvent (ke):
//!   functional keyEventID
//!
//! entity MolecularInitiatingEvent (mie) : KeyEvent
//!
//! relationship keyEventTriggers: KeyEvent -> KeyEvent inverse keyEventTriggeredBy
//! ```
//!
//! Cardinality is resolved once, when the ontology is loaded. The build engine
//! looks it up by `(entity type, property)` and never infers it from data.

pub mod parse;

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub use parse::parse_ontology;

/// The ontology bundled with the crate.
pub const COMPTOX_ONTOLOGY: &str = include_str!("comptox.ont");

// ============================================================================
// Core Types
// ============================================================================

/// How many values a property slot may hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cardinality {
    /// At most one value; a new write replaces the old one.
    Functional,
    /// A deduplicated list; a new write appends when not already present.
    MultiValued,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyDef {
    pub name: String,
    pub cardinality: Cardinality,
}

impl PropertyDef {
    pub fn functional(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cardinality: Cardinality::Functional,
        }
    }

    pub fn multi_valued(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cardinality: Cardinality::MultiValued,
        }
    }

    pub fn is_functional(&self) -> bool {
        self.cardinality == Cardinality::Functional
    }
}

/// An entity type (node label) and the property slots it declares directly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityTypeDef {
    pub name: String,
    /// Local-key prefix, e.g. `chem` for `chem_benzene`.
    pub short_code: String,
    /// Supertype whose properties this type inherits.
    pub parent: Option<String>,
    pub properties: BTreeMap<String, PropertyDef>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationshipTypeDef {
    pub name: String,
    pub subject: String,
    pub object: String,
    pub inverse: Option<String>,
}

#[derive(Debug, Error)]
pub enum OntologyError {
    #[error("parse error on line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("short code `{code}` is used by both `{first}` and `{second}`")]
    DuplicateShortCode {
        code: String,
        first: String,
        second: String,
    },

    #[error("entity type `{child}` extends unknown type `{parent}`")]
    UnknownParent { child: String, parent: String },

    #[error("subtype cycle through `{0}`")]
    SubtypeCycle(String),

    #[error("relationship `{relationship}` refers to unknown entity type `{entity_type}`")]
    UnknownEndpoint {
        relationship: String,
        entity_type: String,
    },

    #[error(
        "property `{property}` is {first:?} on `{first_type}` but {second:?} on `{second_type}`"
    )]
    ConflictingCardinality {
        property: String,
        first_type: String,
        first: Cardinality,
        second_type: String,
        second: Cardinality,
    },

    #[error("failed to read ontology file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

// ============================================================================
// Ontology
// ============================================================================

/// A validated ontology: the property-definition table used by the build.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ontology {
    pub name: String,
    entity_types: BTreeMap<String, EntityTypeDef>,
    relationship_types: BTreeMap<String, RelationshipTypeDef>,
}

impl Ontology {
    /// Parse and validate ontology text.
    pub fn from_text(text: &str) -> Result<Self, OntologyError> {
        let ontology = parse_ontology(text)?;
        ontology.validate()?;
        Ok(ontology)
    }

    /// Read, parse and validate an ontology file.
    pub fn load(path: &Path) -> Result<Self, OntologyError> {
        let text = std::fs::read_to_string(path).map_err(|source| OntologyError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_text(&text)
    }

    /// The bundled ComptoxAI ontology.
    pub fn comptox() -> Result<Self, OntologyError> {
        Self::from_text(COMPTOX_ONTOLOGY)
    }

    pub(crate) fn from_parts(
        name: String,
        entity_types: BTreeMap<String, EntityTypeDef>,
        relationship_types: BTreeMap<String, RelationshipTypeDef>,
    ) -> Self {
        Self {
            name,
            entity_types,
            relationship_types,
        }
    }

    pub fn entity_types(&self) -> impl Iterator<Item = &EntityTypeDef> {
        self.entity_types.values()
    }

    pub fn relationship_types(&self) -> impl Iterator<Item = &RelationshipTypeDef> {
        self.relationship_types.values()
    }

    pub fn entity_type(&self, name: &str) -> Option<&EntityTypeDef> {
        self.entity_types.get(name)
    }

    pub fn short_code(&self, entity_type: &str) -> Option<&str> {
        self.entity_types
            .get(entity_type)
            .map(|t| t.short_code.as_str())
    }

    pub fn relationship(&self, name: &str) -> Option<&RelationshipTypeDef> {
        self.relationship_types.get(name)
    }

    pub fn inverse_of(&self, relationship: &str) -> Option<&str> {
        self.relationship_types
            .get(relationship)
            .and_then(|r| r.inverse.as_deref())
    }

    /// The type itself followed by its supertypes, nearest first.
    pub fn ancestors<'a>(&'a self, entity_type: &'a str) -> Vec<&'a str> {
        let mut out = Vec::new();
        let mut current = Some(entity_type);
        while let Some(name) = current {
            if out.contains(&name) {
                break;
            }
            let Some(def) = self.entity_types.get(name) else {
                break;
            };
            out.push(def.name.as_str());
            current = def.parent.as_deref();
        }
        out
    }

    pub fn is_a(&self, entity_type: &str, ancestor: &str) -> bool {
        self.ancestors(entity_type).contains(&ancestor)
    }

    /// Look up a property slot on an entity type, walking the supertype chain.
    pub fn property(&self, entity_type: &str, property: &str) -> Option<&PropertyDef> {
        self.ancestors(entity_type)
            .into_iter()
            .filter_map(|t| self.entity_types.get(t))
            .find_map(|t| t.properties.get(property))
    }

    /// Look up a property slot for an entity that carries several labels.
    ///
    /// Labels are tried in the order given; the first label that declares (or
    /// inherits) the property wins. Validation guarantees all labels agree on
    /// the cardinality, so the order only matters for which definition is
    /// returned.
    pub fn property_for_labels<'a, I>(&self, labels: I, property: &str) -> Option<&PropertyDef>
    where
        I: IntoIterator<Item = &'a str>,
    {
        labels
            .into_iter()
            .find_map(|label| self.property(label, property))
    }

    /// All property names an entity type can carry (own and inherited).
    pub fn properties_of(&self, entity_type: &str) -> BTreeSet<&str> {
        self.ancestors(entity_type)
            .into_iter()
            .filter_map(|t| self.entity_types.get(t))
            .flat_map(|t| t.properties.keys().map(String::as_str))
            .collect()
    }

    // ========================================================================
    // Validation
    // ========================================================================

    pub fn validate(&self) -> Result<(), OntologyError> {
        let mut codes: BTreeMap<&str, &str> = BTreeMap::new();
        for def in self.entity_types.values() {
            if let Some(first) = codes.insert(def.short_code.as_str(), def.name.as_str()) {
                return Err(OntologyError::DuplicateShortCode {
                    code: def.short_code.clone(),
                    first: first.to_string(),
                    second: def.name.clone(),
                });
            }
            if let Some(parent) = &def.parent {
                if !self.entity_types.contains_key(parent) {
                    return Err(OntologyError::UnknownParent {
                        child: def.name.clone(),
                        parent: parent.clone(),
                    });
                }
            }
        }

        for def in self.entity_types.values() {
            let mut seen = BTreeSet::new();
            let mut current = Some(def.name.as_str());
            while let Some(name) = current {
                if !seen.insert(name) {
                    return Err(OntologyError::SubtypeCycle(def.name.clone()));
                }
                current = self
                    .entity_types
                    .get(name)
                    .and_then(|t| t.parent.as_deref());
            }
        }

        let mut cardinalities: BTreeMap<&str, (&str, Cardinality)> = BTreeMap::new();
        for def in self.entity_types.values() {
            for prop in def.properties.values() {
                match cardinalities.get(prop.name.as_str()) {
                    Some(&(first_type, first)) if first != prop.cardinality => {
                        return Err(OntologyError::ConflictingCardinality {
                            property: prop.name.clone(),
                            first_type: first_type.to_string(),
                            first,
                            second_type: def.name.clone(),
                            second: prop.cardinality,
                        });
                    }
                    Some(_) => {}
                    None => {
                        cardinalities.insert(prop.name.as_str(), (def.name.as_str(), prop.cardinality));
                    }
                }
            }
        }

        for rel in self.relationship_types.values() {
            for endpoint in [&rel.subject, &rel.object] {
                if !self.entity_types.contains_key(endpoint) {
                    return Err(OntologyError::UnknownEndpoint {
                        relationship: rel.name.clone(),
                        entity_type: endpoint.clone(),
                    });
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bundled_ontology_is_valid() {
        let ont = Ontology::comptox().unwrap();
        assert_eq!(ont.name, "ComptoxAI");
        assert_eq!(ont.short_code("Chemical"), Some("chem"));
        assert_eq!(ont.short_code("Disease"), Some("dis"));
        assert_eq!(
            ont.property("Disease", "xrefDiseaseOntology")
                .map(|p| p.cardinality),
            Some(Cardinality::MultiValued)
        );
        assert!(ont.property("Chemical", "xrefCasRN").unwrap().is_functional());
    }

    #[test]
    fn subtype_inherits_properties() {
        let ont = Ontology::comptox().unwrap();
        assert!(ont.is_a("MolecularInitiatingEvent", "KeyEvent"));
        assert!(ont.property("MolecularInitiatingEvent", "keyEventID").is_some());
        assert_eq!(
            ont.ancestors("AdverseOutcome"),
            vec!["AdverseOutcome", "KeyEvent"]
        );
    }

    #[test]
    fn inverse_is_registered_both_ways() {
        let ont = Ontology::comptox().unwrap();
        assert_eq!(ont.inverse_of("keyEventTriggers"), Some("keyEventTriggeredBy"));
        assert_eq!(ont.inverse_of("keyEventTriggeredBy"), Some("keyEventTriggers"));
        let inv = ont.relationship("chemicalInList").unwrap();
        assert_eq!(inv.subject, "Chemical");
        assert_eq!(inv.object, "ChemicalList");
    }

    #[test]
    fn property_for_labels_uses_first_declaring_label() {
        let ont = Ontology::comptox().unwrap();
        let def = ont
            .property_for_labels(["AOP", "Chemical"], "xrefCasRN")
            .unwrap();
        assert_eq!(def.name, "xrefCasRN");
        assert!(ont.property_for_labels(["AOP"], "xrefCasRN").is_none());
    }
}
