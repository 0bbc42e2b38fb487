//! ComptoxAI graph store
//!
//! An in-process property graph holding the merged knowledge graph:
//!
//! ```text
//!   nodes:  key ─┬─ labels {Chemical, ...}         label_index : label → bitmap
//!                └─ props  {xrefCasRN: "50-00-0"}  value_index : (prop, value) → bitmap
//!   edges:  (source) ──rel_type──▶ (target)        outgoing / incoming / edge_set
//! ```
//!
//! 1. **Interning**: labels, property names, relationship types and keys are
//!    stored once and referenced by [`Sym`].
//! 2. **Bitmap indexes**: label membership and exact-match property lookup
//!    return roaring bitmaps; list-valued properties index every element.
//! 3. **Unique keys**: a local key names at most one node.
//! 4. **Snapshots**: bincode with a magic/version header; indexes are derived
//!    data and are rebuilt on load.
//!
//! The build engine talks to the store only through [`GraphStore`]; read-side
//! algorithms live in [`algo`].

pub mod algo;
mod db;
mod interner;
mod value;

use std::collections::BTreeMap;
use std::path::PathBuf;
use thiserror::Error;

pub use db::{EdgeView, GraphDb, NodeView};
pub use interner::{Interner, Sym};
pub use value::{PropertySlot, Value};

pub type NodeId = u32;
pub type EdgeId = u32;

pub type Properties = BTreeMap<String, PropertySlot>;
pub type EdgeProperties = BTreeMap<String, Value>;

#[derive(Debug, Error)]
pub enum GraphError {
    #[error("unknown node id {0}")]
    UnknownNode(NodeId),

    #[error("a node with local key `{0}` already exists")]
    DuplicateKey(String),

    #[error("node `{0}` must carry at least one label")]
    NoLabels(String),

    #[error("invalid snapshot: {0}")]
    InvalidSnapshot(String),

    #[error("unsupported snapshot version {0}")]
    UnsupportedVersion(u32),

    #[error("snapshot encoding failed: {0}")]
    Encoding(#[from] bincode::Error),

    #[error("snapshot I/O on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// The graph-store interface the build engine is written against.
///
/// Lookups never fail for "no data": they return empty results. Mutations
/// fail only for unknown node ids and key collisions.
pub trait GraphStore {
    /// Create a node. Fails if `key` is already taken or `labels` is empty.
    fn create_node(
        &mut self,
        key: &str,
        labels: &[String],
        properties: Properties,
    ) -> Result<NodeId, GraphError>;

    /// Exact-match lookup; a list-valued property matches on any element.
    /// Results are in ascending id order.
    fn find_nodes(&self, property: &str, value: &Value) -> Vec<NodeId>;

    fn node_by_key(&self, key: &str) -> Option<NodeId>;

    fn key_of(&self, node: NodeId) -> Option<String>;

    fn labels(&self, node: NodeId) -> Vec<String>;

    fn has_label(&self, node: NodeId, label: &str) -> bool;

    /// Add a label. Returns `false` when the node already carries it.
    fn add_label(&mut self, node: NodeId, label: &str) -> Result<bool, GraphError>;

    fn property(&self, node: NodeId, property: &str) -> Option<PropertySlot>;

    /// Replace the slot with a single value.
    fn set_property(&mut self, node: NodeId, property: &str, value: Value)
        -> Result<(), GraphError>;

    /// Append to a list slot unless already present. Returns `true` on append.
    fn append_to_property(
        &mut self,
        node: NodeId,
        property: &str,
        value: Value,
    ) -> Result<bool, GraphError>;

    /// Create an edge. Returns `false` (and changes nothing) when an edge of
    /// this type already connects `from` to `to`.
    fn create_edge(
        &mut self,
        from: NodeId,
        to: NodeId,
        rel_type: &str,
        properties: EdgeProperties,
    ) -> Result<bool, GraphError>;

    fn edge_exists(&self, from: NodeId, to: NodeId, rel_type: &str) -> bool;

    fn node_count(&self) -> usize;

    fn edge_count(&self) -> usize;

    /// Exact-match lookup restricted to nodes carrying `label`.
    fn find_nodes_with_label(&self, label: &str, property: &str, value: &Value) -> Vec<NodeId> {
        self.find_nodes(property, value)
            .into_iter()
            .filter(|&n| self.has_label(n, label))
            .collect()
    }
}
