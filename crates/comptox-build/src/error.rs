use comptox_graphdb::GraphError;
use thiserror::Error;

use crate::normalize::NormalizeError;

#[derive(Debug, Error)]
pub enum BuildError {
    #[error(transparent)]
    Normalize(#[from] NormalizeError),

    /// A row's type tag matched none of the importer's known types.
    #[error("importer `{importer}`: unknown {field} `{value}` on line {line}")]
    UnknownDiscriminator {
        importer: String,
        field: String,
        value: String,
        line: usize,
    },

    #[error("importer dependency cycle among: {}", .0.join(", "))]
    DependencyCycle(Vec<String>),

    #[error("importer `{importer}` requires `{dependency}`, which is not registered")]
    MissingDependency {
        importer: String,
        dependency: String,
    },

    #[error("importer `{0}` is registered twice")]
    DuplicateImporter(String),

    #[error("entity type `{0}` is not declared in the ontology")]
    UnknownEntityType(String),

    #[error("property `{property}` is not declared for `{entity_type}`")]
    UnknownProperty {
        entity_type: String,
        property: String,
    },

    #[error("relationship type `{0}` is not declared in the ontology")]
    UnknownRelationship(String),

    #[error("build cancelled")]
    Cancelled,

    #[error(transparent)]
    Graph(#[from] GraphError),
}

impl BuildError {
    /// True when `err` is (or wraps) a cancellation.
    pub fn is_cancellation(err: &anyhow::Error) -> bool {
        err.chain().any(|cause| {
            matches!(
                cause.downcast_ref::<BuildError>(),
                Some(BuildError::Cancelled)
            )
        })
    }
}
