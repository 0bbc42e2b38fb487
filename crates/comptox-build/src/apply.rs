//! Property application under the functional / multi-valued contract.

use comptox_graphdb::{GraphError, GraphStore, NodeId, PropertySlot, Value};
use comptox_ontology::{Cardinality, Ontology, PropertyDef};

use crate::error::BuildError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// Value absent, or already present.
    Unchanged,
    /// Functional slot written.
    Set,
    /// Value appended to a multi-valued slot.
    Appended,
}

/// Apply one value to one property slot of `node`.
///
/// - `None` is a no-op.
/// - Functional: the slot is overwritten (last write wins).
/// - Multi-valued: the value is appended unless already present, so
///   re-applying the same value never grows the slot.
pub fn apply<S: GraphStore + ?Sized>(
    store: &mut S,
    node: NodeId,
    def: &PropertyDef,
    value: Option<Value>,
) -> Result<ApplyOutcome, GraphError> {
    let Some(value) = value else {
        return Ok(ApplyOutcome::Unchanged);
    };
    match def.cardinality {
        Cardinality::Functional => {
            if store.property(node, &def.name) == Some(PropertySlot::Single(value.clone())) {
                return Ok(ApplyOutcome::Unchanged);
            }
            store.set_property(node, &def.name, value)?;
            Ok(ApplyOutcome::Set)
        }
        Cardinality::MultiValued => {
            if store.append_to_property(node, &def.name, value)? {
                Ok(ApplyOutcome::Appended)
            } else {
                Ok(ApplyOutcome::Unchanged)
            }
        }
    }
}

/// Applies properties by name, taking cardinality from the ontology.
pub struct PropertyApplier<'o> {
    ontology: &'o Ontology,
}

impl<'o> PropertyApplier<'o> {
    pub fn new(ontology: &'o Ontology) -> Self {
        Self { ontology }
    }

    /// Find the definition of `property` for a node with `labels`.
    pub fn definition(&self, labels: &[String], property: &str) -> Result<&'o PropertyDef, BuildError> {
        self.ontology
            .property_for_labels(labels.iter().map(String::as_str), property)
            .ok_or_else(|| BuildError::UnknownProperty {
                entity_type: labels.first().cloned().unwrap_or_default(),
                property: property.to_string(),
            })
    }

    pub fn apply<S: GraphStore + ?Sized>(
        &self,
        store: &mut S,
        node: NodeId,
        property: &str,
        value: Option<Value>,
    ) -> Result<ApplyOutcome, BuildError> {
        let labels = store.labels(node);
        let def = self.definition(&labels, property)?;
        Ok(apply(store, node, def, value)?)
    }
}

/// Initial slots for a node about to be created, folding repeated values the
/// same way [`apply`] would.
pub fn initial_slots(
    defs_and_values: impl IntoIterator<Item = (PropertyDef, Value)>,
) -> comptox_graphdb::Properties {
    let mut props = comptox_graphdb::Properties::new();
    for (def, value) in defs_and_values {
        match def.cardinality {
            Cardinality::Functional => {
                props.insert(def.name, PropertySlot::Single(value));
            }
            Cardinality::MultiValued => match props.get_mut(&def.name) {
                Some(PropertySlot::Many(values)) => {
                    if !values.contains(&value) {
                        values.push(value);
                    }
                }
                _ => {
                    props.insert(def.name, PropertySlot::Many(vec![value]));
                }
            },
        }
    }
    props
}
