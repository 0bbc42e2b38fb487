use roaring::RoaringBitmap;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use crate::interner::{Interner, Sym};
use crate::value::{PropertySlot, Value};
use crate::{EdgeId, EdgeProperties, GraphError, GraphStore, NodeId, Properties};

const SNAPSHOT_MAGIC: &[u8; 4] = b"CTXG";
const SNAPSHOT_VERSION: u32 = 1;

// ============================================================================
// Node Storage (Columnar)
// ============================================================================

/// Columnar node storage; the index of a row is the node id.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct NodeColumns {
    keys: Vec<Sym>,
    labels: Vec<Vec<Sym>>,
    props: Vec<BTreeMap<Sym, PropertySlot>>,
}

impl NodeColumns {
    fn len(&self) -> usize {
        self.keys.len()
    }

    fn contains(&self, node: NodeId) -> bool {
        (node as usize) < self.keys.len()
    }
}

#[derive(Debug, Clone, Default)]
struct NodeIndexes {
    by_key: HashMap<Sym, NodeId>,
    by_label: HashMap<Sym, RoaringBitmap>,
    /// property → value index key → nodes
    by_value: HashMap<Sym, HashMap<String, RoaringBitmap>>,
}

impl NodeIndexes {
    fn index_slot(&mut self, prop: Sym, slot: &PropertySlot, node: NodeId) {
        let col = self.by_value.entry(prop).or_default();
        for v in slot.values() {
            col.entry(v.index_key()).or_default().insert(node);
        }
    }

    fn unindex_slot(&mut self, prop: Sym, slot: &PropertySlot, node: NodeId) {
        let Some(col) = self.by_value.get_mut(&prop) else {
            return;
        };
        for v in slot.values() {
            let key = v.index_key();
            if let Some(bitmap) = col.get_mut(&key) {
                bitmap.remove(node);
                if bitmap.is_empty() {
                    col.remove(&key);
                }
            }
        }
    }
}

// ============================================================================
// Edge Storage (Edge-List with Indexes)
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Edge {
    rel_type: Sym,
    source: NodeId,
    target: NodeId,
    props: BTreeMap<Sym, Value>,
}

#[derive(Debug, Clone, Default)]
struct EdgeIndexes {
    outgoing: HashMap<NodeId, Vec<EdgeId>>,
    incoming: HashMap<NodeId, Vec<EdgeId>>,
    by_triple: HashMap<(NodeId, Sym, NodeId), EdgeId>,
    by_type: HashMap<Sym, RoaringBitmap>,
}

impl EdgeIndexes {
    fn insert(&mut self, id: EdgeId, edge: &Edge) {
        self.outgoing.entry(edge.source).or_default().push(id);
        self.incoming.entry(edge.target).or_default().push(id);
        self.by_triple
            .insert((edge.source, edge.rel_type, edge.target), id);
        self.by_type.entry(edge.rel_type).or_default().insert(id);
    }
}

// ============================================================================
// Views
// ============================================================================

/// A node with every string resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeView {
    pub id: NodeId,
    pub key: String,
    pub labels: Vec<String>,
    pub properties: Properties,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EdgeView {
    pub id: EdgeId,
    pub source: NodeId,
    pub target: NodeId,
    pub rel_type: String,
    pub properties: EdgeProperties,
}

// ============================================================================
// GraphDb
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct GraphDb {
    interner: Interner,
    nodes: NodeColumns,
    edges: Vec<Edge>,
    node_index: NodeIndexes,
    edge_index: EdgeIndexes,
}

impl GraphDb {
    pub fn new() -> Self {
        Self::default()
    }

    fn sym(&self, s: &str) -> Option<Sym> {
        self.interner.get(s)
    }

    fn name(&self, sym: Sym) -> String {
        self.interner.resolve(sym).unwrap_or_default()
    }

    fn check_node(&self, node: NodeId) -> Result<(), GraphError> {
        if self.nodes.contains(node) {
            Ok(())
        } else {
            Err(GraphError::UnknownNode(node))
        }
    }

    /// Rebuild every derived index from the node and edge columns.
    fn rebuild_indexes(&mut self) {
        let mut node_index = NodeIndexes::default();
        for (i, key) in self.nodes.keys.iter().enumerate() {
            let id = i as NodeId;
            node_index.by_key.insert(*key, id);
            for label in &self.nodes.labels[i] {
                node_index.by_label.entry(*label).or_default().insert(id);
            }
            for (prop, slot) in &self.nodes.props[i] {
                node_index.index_slot(*prop, slot, id);
            }
        }

        let mut edge_index = EdgeIndexes::default();
        for (i, edge) in self.edges.iter().enumerate() {
            edge_index.insert(i as EdgeId, edge);
        }

        self.node_index = node_index;
        self.edge_index = edge_index;
    }

    // ========================================================================
    // Read API
    // ========================================================================

    pub fn node(&self, node: NodeId) -> Option<NodeView> {
        let i = node as usize;
        let key = *self.nodes.keys.get(i)?;
        Some(NodeView {
            id: node,
            key: self.name(key),
            labels: self.nodes.labels[i].iter().map(|l| self.name(*l)).collect(),
            properties: self.nodes.props[i]
                .iter()
                .map(|(k, v)| (self.name(*k), v.clone()))
                .collect(),
        })
    }

    pub fn edge(&self, edge: EdgeId) -> Option<EdgeView> {
        let e = self.edges.get(edge as usize)?;
        Some(EdgeView {
            id: edge,
            source: e.source,
            target: e.target,
            rel_type: self.name(e.rel_type),
            properties: e
                .props
                .iter()
                .map(|(k, v)| (self.name(*k), v.clone()))
                .collect(),
        })
    }

    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> {
        0..self.nodes.len() as NodeId
    }

    pub fn edge_ids(&self) -> impl Iterator<Item = EdgeId> {
        0..self.edges.len() as EdgeId
    }

    /// `(source, relationship type, target)` of an edge.
    pub fn edge_endpoints(&self, edge: EdgeId) -> Option<(NodeId, String, NodeId)> {
        let e = self.edges.get(edge as usize)?;
        Some((e.source, self.name(e.rel_type), e.target))
    }

    pub fn nodes_with_label(&self, label: &str) -> RoaringBitmap {
        self.sym(label)
            .and_then(|l| self.node_index.by_label.get(&l))
            .cloned()
            .unwrap_or_default()
    }

    pub fn edges_of_type(&self, rel_type: &str) -> RoaringBitmap {
        self.sym(rel_type)
            .and_then(|r| self.edge_index.by_type.get(&r))
            .cloned()
            .unwrap_or_default()
    }

    pub fn outgoing(&self, node: NodeId) -> &[EdgeId] {
        self.edge_index
            .outgoing
            .get(&node)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn incoming(&self, node: NodeId) -> &[EdgeId] {
        self.edge_index
            .incoming
            .get(&node)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn out_neighbors(&self, node: NodeId) -> Vec<NodeId> {
        let mut out: Vec<NodeId> = self
            .outgoing(node)
            .iter()
            .map(|&e| self.edges[e as usize].target)
            .collect();
        out.sort_unstable();
        out.dedup();
        out
    }

    pub fn in_neighbors(&self, node: NodeId) -> Vec<NodeId> {
        let mut out: Vec<NodeId> = self
            .incoming(node)
            .iter()
            .map(|&e| self.edges[e as usize].source)
            .collect();
        out.sort_unstable();
        out.dedup();
        out
    }

    /// Neighbours ignoring edge direction and type, ascending.
    pub fn neighbors(&self, node: NodeId) -> Vec<NodeId> {
        let mut out = self.out_neighbors(node);
        out.extend(self.in_neighbors(node));
        out.sort_unstable();
        out.dedup();
        out
    }

    pub fn label_counts(&self) -> BTreeMap<String, u64> {
        self.node_index
            .by_label
            .iter()
            .map(|(l, b)| (self.name(*l), b.len()))
            .collect()
    }

    pub fn relationship_counts(&self) -> BTreeMap<String, u64> {
        self.edge_index
            .by_type
            .iter()
            .map(|(r, b)| (self.name(*r), b.len()))
            .collect()
    }

    /// A new store holding `nodes` and every edge between them. Node ids are
    /// reassigned densely; keys, labels and properties are preserved.
    pub fn induced_subgraph(&self, nodes: &RoaringBitmap) -> Result<GraphDb, GraphError> {
        let mut sub = GraphDb::new();
        let mut remap: HashMap<NodeId, NodeId> = HashMap::new();
        for id in nodes.iter() {
            let Some(view) = self.node(id) else {
                return Err(GraphError::UnknownNode(id));
            };
            let new_id = sub.create_node(&view.key, &view.labels, view.properties)?;
            remap.insert(id, new_id);
        }
        for edge in &self.edges {
            if let (Some(&s), Some(&t)) = (remap.get(&edge.source), remap.get(&edge.target)) {
                let props = edge
                    .props
                    .iter()
                    .map(|(k, v)| (self.name(*k), v.clone()))
                    .collect();
                sub.create_edge(s, t, &self.name(edge.rel_type), props)?;
            }
        }
        Ok(sub)
    }

    // ========================================================================
    // Serialization
    // ========================================================================

    /// Serialize to the snapshot format:
    /// `magic | version | len | interner strings | len | (nodes, edges)`.
    pub fn to_bytes(&self) -> Result<Vec<u8>, GraphError> {
        let interner_bytes = bincode::serialize(&self.interner.strings())?;
        let data_bytes = bincode::serialize(&(&self.nodes, &self.edges))?;

        let mut out = Vec::with_capacity(24 + interner_bytes.len() + data_bytes.len());
        out.extend_from_slice(SNAPSHOT_MAGIC);
        out.extend_from_slice(&SNAPSHOT_VERSION.to_le_bytes());
        out.extend_from_slice(&(interner_bytes.len() as u64).to_le_bytes());
        out.extend_from_slice(&interner_bytes);
        out.extend_from_slice(&(data_bytes.len() as u64).to_le_bytes());
        out.extend_from_slice(&data_bytes);
        Ok(out)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, GraphError> {
        if bytes.len() < 8 || &bytes[0..4] != SNAPSHOT_MAGIC {
            return Err(GraphError::InvalidSnapshot("bad magic".to_string()));
        }
        let version = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
        if version != SNAPSHOT_VERSION {
            return Err(GraphError::UnsupportedVersion(version));
        }

        let mut offset = 8;
        let interner_bytes = read_section(bytes, &mut offset)?;
        let data_bytes = read_section(bytes, &mut offset)?;

        let strings: Vec<String> = bincode::deserialize(interner_bytes)?;
        let (nodes, edges): (NodeColumns, Vec<Edge>) = bincode::deserialize(data_bytes)?;
        if nodes.labels.len() != nodes.keys.len() || nodes.props.len() != nodes.keys.len() {
            return Err(GraphError::InvalidSnapshot(
                "node columns have different lengths".to_string(),
            ));
        }
        if let Some(e) = edges
            .iter()
            .find(|e| !nodes.contains(e.source) || !nodes.contains(e.target))
        {
            return Err(GraphError::InvalidSnapshot(format!(
                "edge {} -> {} references a missing node",
                e.source, e.target
            )));
        }

        let mut db = GraphDb {
            interner: Interner::from_strings(strings),
            nodes,
            edges,
            node_index: NodeIndexes::default(),
            edge_index: EdgeIndexes::default(),
        };
        db.rebuild_indexes();
        Ok(db)
    }

    pub fn save(&self, path: &Path) -> Result<(), GraphError> {
        let bytes = self.to_bytes()?;
        std::fs::write(path, bytes).map_err(|source| GraphError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!(
            path = %path.display(),
            nodes = self.nodes.len(),
            edges = self.edges.len(),
            "wrote graph snapshot"
        );
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, GraphError> {
        let bytes = std::fs::read(path).map_err(|source| GraphError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_bytes(&bytes)
    }
}

fn read_section<'a>(bytes: &'a [u8], offset: &mut usize) -> Result<&'a [u8], GraphError> {
    let truncated = || GraphError::InvalidSnapshot("truncated snapshot".to_string());
    let len_end = offset.checked_add(8).ok_or_else(truncated)?;
    let len_bytes: [u8; 8] = bytes
        .get(*offset..len_end)
        .and_then(|s| s.try_into().ok())
        .ok_or_else(truncated)?;
    let len = usize::try_from(u64::from_le_bytes(len_bytes)).map_err(|_| truncated())?;
    let end = len_end.checked_add(len).ok_or_else(truncated)?;
    let section = bytes.get(len_end..end).ok_or_else(truncated)?;
    *offset = end;
    Ok(section)
}

// ============================================================================
// GraphStore
// ============================================================================

impl GraphStore for GraphDb {
    fn create_node(
        &mut self,
        key: &str,
        labels: &[String],
        properties: Properties,
    ) -> Result<NodeId, GraphError> {
        if labels.is_empty() {
            return Err(GraphError::NoLabels(key.to_string()));
        }
        if self.node_by_key(key).is_some() {
            return Err(GraphError::DuplicateKey(key.to_string()));
        }

        let id = self.nodes.len() as NodeId;
        let key_sym = self.interner.intern(key);

        let mut label_syms = Vec::with_capacity(labels.len());
        for label in labels {
            let l = self.interner.intern(label);
            if !label_syms.contains(&l) {
                label_syms.push(l);
                self.node_index.by_label.entry(l).or_default().insert(id);
            }
        }

        let mut props = BTreeMap::new();
        for (name, slot) in properties {
            if slot.is_empty() {
                continue;
            }
            let p = self.interner.intern(&name);
            self.node_index.index_slot(p, &slot, id);
            props.insert(p, slot);
        }

        self.node_index.by_key.insert(key_sym, id);
        self.nodes.keys.push(key_sym);
        self.nodes.labels.push(label_syms);
        self.nodes.props.push(props);
        Ok(id)
    }

    fn find_nodes(&self, property: &str, value: &Value) -> Vec<NodeId> {
        self.sym(property)
            .and_then(|p| self.node_index.by_value.get(&p))
            .and_then(|col| col.get(&value.index_key()))
            .map(|bitmap| bitmap.iter().collect())
            .unwrap_or_default()
    }

    fn node_by_key(&self, key: &str) -> Option<NodeId> {
        self.sym(key)
            .and_then(|k| self.node_index.by_key.get(&k))
            .copied()
    }

    fn key_of(&self, node: NodeId) -> Option<String> {
        self.nodes
            .keys
            .get(node as usize)
            .map(|k| self.name(*k))
    }

    fn labels(&self, node: NodeId) -> Vec<String> {
        self.nodes
            .labels
            .get(node as usize)
            .map(|ls| ls.iter().map(|l| self.name(*l)).collect())
            .unwrap_or_default()
    }

    fn has_label(&self, node: NodeId, label: &str) -> bool {
        self.sym(label)
            .and_then(|l| self.node_index.by_label.get(&l))
            .is_some_and(|b| b.contains(node))
    }

    fn add_label(&mut self, node: NodeId, label: &str) -> Result<bool, GraphError> {
        self.check_node(node)?;
        let l = self.interner.intern(label);
        let labels = &mut self.nodes.labels[node as usize];
        if labels.contains(&l) {
            return Ok(false);
        }
        labels.push(l);
        self.node_index.by_label.entry(l).or_default().insert(node);
        Ok(true)
    }

    fn property(&self, node: NodeId, property: &str) -> Option<PropertySlot> {
        let p = self.sym(property)?;
        self.nodes.props.get(node as usize)?.get(&p).cloned()
    }

    fn set_property(
        &mut self,
        node: NodeId,
        property: &str,
        value: Value,
    ) -> Result<(), GraphError> {
        self.check_node(node)?;
        let p = self.interner.intern(property);
        let slot = PropertySlot::Single(value);
        if let Some(old) = self.nodes.props[node as usize].insert(p, slot.clone()) {
            self.node_index.unindex_slot(p, &old, node);
        }
        self.node_index.index_slot(p, &slot, node);
        Ok(())
    }

    fn append_to_property(
        &mut self,
        node: NodeId,
        property: &str,
        value: Value,
    ) -> Result<bool, GraphError> {
        self.check_node(node)?;
        let p = self.interner.intern(property);
        let props = &mut self.nodes.props[node as usize];
        let values = match props.remove(&p) {
            None => vec![],
            Some(PropertySlot::Single(v)) => vec![v],
            Some(PropertySlot::Many(vs)) => vs,
        };
        let appended = !values.contains(&value);
        let mut values = values;
        if appended {
            values.push(value);
        }
        let slot = PropertySlot::Many(values);
        self.node_index.index_slot(p, &slot, node);
        props.insert(p, slot);
        Ok(appended)
    }

    fn create_edge(
        &mut self,
        from: NodeId,
        to: NodeId,
        rel_type: &str,
        properties: EdgeProperties,
    ) -> Result<bool, GraphError> {
        self.check_node(from)?;
        self.check_node(to)?;
        if self.edge_exists(from, to, rel_type) {
            return Ok(false);
        }
        let rel = self.interner.intern(rel_type);
        let props = properties
            .into_iter()
            .map(|(k, v)| (self.interner.intern(&k), v))
            .collect();
        let edge = Edge {
            rel_type: rel,
            source: from,
            target: to,
            props,
        };
        let id = self.edges.len() as EdgeId;
        self.edge_index.insert(id, &edge);
        self.edges.push(edge);
        Ok(true)
    }

    fn edge_exists(&self, from: NodeId, to: NodeId, rel_type: &str) -> bool {
        self.sym(rel_type)
            .is_some_and(|r| self.edge_index.by_triple.contains_key(&(from, r, to)))
    }

    fn node_count(&self) -> usize {
        self.nodes.len()
    }

    fn edge_count(&self) -> usize {
        self.edges.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(ls: &[&str]) -> Vec<String> {
        ls.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn create_and_find_by_property() {
        let mut db = GraphDb::new();
        let mut props = Properties::new();
        props.insert(
            "xrefCasRN".to_string(),
            PropertySlot::Single("81-81-2".into()),
        );
        let id = db
            .create_node("chem_warfarin", &labels(&["Chemical"]), props)
            .unwrap();
        assert_eq!(db.find_nodes("xrefCasRN", &"81-81-2".into()), vec![id]);
        assert!(db.find_nodes("xrefCasRN", &"50-00-0".into()).is_empty());
        assert!(db.find_nodes("unknownProp", &"81-81-2".into()).is_empty());
        assert_eq!(db.node_by_key("chem_warfarin"), Some(id));
    }

    #[test]
    fn duplicate_key_is_rejected() {
        let mut db = GraphDb::new();
        db.create_node("dis_x", &labels(&["Disease"]), Properties::new())
            .unwrap();
        let err = db
            .create_node("dis_x", &labels(&["Disease"]), Properties::new())
            .unwrap_err();
        assert!(matches!(err, GraphError::DuplicateKey(k) if k == "dis_x"));
        assert_eq!(db.node_count(), 1);
    }

    #[test]
    fn set_property_reindexes() {
        let mut db = GraphDb::new();
        let id = db
            .create_node("gene_a", &labels(&["Gene"]), Properties::new())
            .unwrap();
        db.set_property(id, "geneSymbol", "A1".into()).unwrap();
        db.set_property(id, "geneSymbol", "A2".into()).unwrap();
        assert!(db.find_nodes("geneSymbol", &"A1".into()).is_empty());
        assert_eq!(db.find_nodes("geneSymbol", &"A2".into()), vec![id]);
    }

    #[test]
    fn append_indexes_every_element() {
        let mut db = GraphDb::new();
        let id = db
            .create_node("dis_a", &labels(&["Disease"]), Properties::new())
            .unwrap();
        assert!(db.append_to_property(id, "xrefOMIM", "1".into()).unwrap());
        assert!(db.append_to_property(id, "xrefOMIM", "2".into()).unwrap());
        assert!(!db.append_to_property(id, "xrefOMIM", "1".into()).unwrap());
        assert_eq!(db.find_nodes("xrefOMIM", &"1".into()), vec![id]);
        assert_eq!(db.find_nodes("xrefOMIM", &"2".into()), vec![id]);
        assert_eq!(db.property(id, "xrefOMIM").map(|s| s.len()), Some(2));
    }

    #[test]
    fn create_edge_is_idempotent() {
        let mut db = GraphDb::new();
        let a = db
            .create_node("a", &labels(&["Gene"]), Properties::new())
            .unwrap();
        let b = db
            .create_node("b", &labels(&["Pathway"]), Properties::new())
            .unwrap();
        assert!(db
            .create_edge(a, b, "geneInPathway", EdgeProperties::new())
            .unwrap());
        assert!(!db
            .create_edge(a, b, "geneInPathway", EdgeProperties::new())
            .unwrap());
        assert!(db.edge_exists(a, b, "geneInPathway"));
        assert!(!db.edge_exists(b, a, "geneInPathway"));
        assert_eq!(db.edge_count(), 1);
        assert!(matches!(
            db.create_edge(a, 99, "geneInPathway", EdgeProperties::new()),
            Err(GraphError::UnknownNode(99))
        ));
    }

    #[test]
    fn add_label_is_monotonic() {
        let mut db = GraphDb::new();
        let id = db
            .create_node("ke_x", &labels(&["KeyEvent"]), Properties::new())
            .unwrap();
        assert!(db.add_label(id, "MolecularInitiatingEvent").unwrap());
        assert!(!db.add_label(id, "MolecularInitiatingEvent").unwrap());
        assert_eq!(db.labels(id), labels(&["KeyEvent", "MolecularInitiatingEvent"]));
        assert!(db.nodes_with_label("MolecularInitiatingEvent").contains(id));
    }

    #[test]
    fn truncated_snapshot_is_rejected() {
        let db = GraphDb::new();
        let bytes = db.to_bytes().unwrap();
        assert!(matches!(
            GraphDb::from_bytes(&bytes[..bytes.len() - 1]),
            Err(GraphError::InvalidSnapshot(_))
        ));
        assert!(matches!(
            GraphDb::from_bytes(b"NOPE\x01\x00\x00\x00"),
            Err(GraphError::InvalidSnapshot(_))
        ));
    }
}
