use comptox_graphdb::algo::{bipartite_projection, degree_centrality};
use comptox_graphdb::{
    EdgeProperties, GraphDb, GraphError, GraphStore, Properties, PropertySlot, Value,
};
use proptest::prelude::*;

fn label(l: &str) -> Vec<String> {
    vec![l.to_string()]
}

fn sample_graph() -> GraphDb {
    let mut db = GraphDb::new();
    let mut props = Properties::new();
    props.insert("xrefCasRN".into(), PropertySlot::Single("50-00-0".into()));
    props.insert(
        "synonyms".into(),
        PropertySlot::Many(vec!["formalin".into(), "methanal".into()]),
    );
    let chem = db
        .create_node("chem_formaldehyde", &label("Chemical"), props)
        .unwrap();
    let list = db
        .create_node("list_hpv", &label("ChemicalList"), Properties::new())
        .unwrap();
    let mut edge_props = EdgeProperties::new();
    edge_props.insert("source".into(), Value::from("EPA"));
    db.create_edge(list, chem, "listIncludesChemical", edge_props)
        .unwrap();
    db.create_edge(chem, list, "chemicalInList", EdgeProperties::new())
        .unwrap();
    db.add_label(chem, "Drug").unwrap();
    db
}

#[test]
fn snapshot_round_trip_through_file() {
    let db = sample_graph();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("graph.ctxg");
    db.save(&path).unwrap();

    let loaded = GraphDb::load(&path).unwrap();
    assert_eq!(loaded.node_count(), 2);
    assert_eq!(loaded.edge_count(), 2);

    let chem = loaded.node_by_key("chem_formaldehyde").unwrap();
    assert_eq!(loaded.find_nodes("synonyms", &"methanal".into()), vec![chem]);
    assert!(loaded.has_label(chem, "Drug"));
    let list = loaded.node_by_key("list_hpv").unwrap();
    assert!(loaded.edge_exists(list, chem, "listIncludesChemical"));

    let view = loaded.edge(0).unwrap();
    assert_eq!(view.properties.get("source"), Some(&Value::from("EPA")));
    assert_eq!(loaded.node(chem), db.node(chem));
}

#[test]
fn loading_a_missing_file_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = GraphDb::load(&dir.path().join("nope.ctxg")).unwrap_err();
    assert!(matches!(err, GraphError::Io { .. }));
}

#[test]
fn label_restricted_lookup() {
    let db = sample_graph();
    let hits = db.find_nodes_with_label("ChemicalList", "xrefCasRN", &"50-00-0".into());
    assert!(hits.is_empty());
    let hits = db.find_nodes_with_label("Chemical", "xrefCasRN", &"50-00-0".into());
    assert_eq!(hits.len(), 1);
}

#[test]
fn bipartite_and_degree() {
    let db = sample_graph();
    let b = bipartite_projection(&db, "ChemicalList", "listIncludesChemical", "Chemical");
    assert_eq!(b.rows.len(), 1);
    assert_eq!(b.columns.len(), 1);
    assert_eq!(b.edges, vec![(0, 0)]);

    let degrees = degree_centrality(&db, None);
    assert_eq!(degrees[0].1, 2);
    assert_eq!(degrees[1].1, 2);
}

#[test]
fn induced_subgraph_keeps_internal_edges_only() {
    let db = sample_graph();
    let mut only_chem = roaring::RoaringBitmap::new();
    only_chem.insert(db.node_by_key("chem_formaldehyde").unwrap());
    let sub = db.induced_subgraph(&only_chem).unwrap();
    assert_eq!(sub.node_count(), 1);
    assert_eq!(sub.edge_count(), 0);
    assert!(sub.node_by_key("chem_formaldehyde").is_some());
}

#[derive(Debug, Clone)]
enum Op {
    Set(u8, u8),
    Append(u8, u8),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0u8..4, 0u8..6).prop_map(|(n, v)| Op::Set(n, v)),
        (0u8..4, 0u8..6).prop_map(|(n, v)| Op::Append(n, v)),
    ]
}

proptest! {
    // The value index always agrees with a scan of the stored slots.
    #[test]
    fn value_index_matches_scan(ops in proptest::collection::vec(op(), 0..40)) {
        let mut db = GraphDb::new();
        for i in 0..4 {
            db.create_node(&format!("n{i}"), &label("Node"), Properties::new()).unwrap();
        }
        for op in ops {
            match op {
                Op::Set(n, v) => db.set_property(n as u32, "p", Value::Int(v as i64)).unwrap(),
                Op::Append(n, v) => { db.append_to_property(n as u32, "p", Value::Int(v as i64)).unwrap(); }
            }
        }
        for v in 0..6i64 {
            let value = Value::Int(v);
            let indexed = db.find_nodes("p", &value);
            let scanned: Vec<u32> = (0..4u32)
                .filter(|&n| db.property(n, "p").is_some_and(|s| s.contains(&value)))
                .collect();
            prop_assert_eq!(indexed, scanned);
        }
    }
}
