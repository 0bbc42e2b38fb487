use comptox_ontology::{Cardinality, Ontology, OntologyError};
use proptest::prelude::*;
use std::io::Write;

#[test]
fn conflicting_cardinality_is_rejected() {
    let text = r#"
ontology T
entity A (a):
  functional tag
entity B (b):
  multi tag
"#;
    match Ontology::from_text(text) {
        Err(OntologyError::ConflictingCardinality { property, .. }) => assert_eq!(property, "tag"),
        other => panic!("expected cardinality conflict, got {other:?}"),
    }
}

#[test]
fn duplicate_short_code_is_rejected() {
    let text = "entity A (x):\nentity B (x):\n";
    assert!(matches!(
        Ontology::from_text(text),
        Err(OntologyError::DuplicateShortCode { .. })
    ));
}

#[test]
fn unknown_parent_and_endpoint_are_rejected() {
    assert!(matches!(
        Ontology::from_text("entity A (a) : Missing\n"),
        Err(OntologyError::UnknownParent { .. })
    ));
    assert!(matches!(
        Ontology::from_text("entity A (a):\nrelationship r: A -> Missing\n"),
        Err(OntologyError::UnknownEndpoint { .. })
    ));
}

#[test]
fn subtype_cycle_is_rejected() {
    let text = "entity A (a) : B\nentity B (b) : A\n";
    assert!(matches!(
        Ontology::from_text(text),
        Err(OntologyError::SubtypeCycle(_))
    ));
}

#[test]
fn load_reads_file_from_disk() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "ontology Small").unwrap();
    writeln!(file, "entity Thing (thing):").unwrap();
    writeln!(file, "  functional label").unwrap();
    let ont = Ontology::load(file.path()).unwrap();
    assert_eq!(ont.name, "Small");
    assert_eq!(ont.short_code("Thing"), Some("thing"));
}

#[test]
fn load_missing_file_reports_path() {
    let err = Ontology::load(std::path::Path::new("/definitely/not/here.ont")).unwrap_err();
    assert!(err.to_string().contains("/definitely/not/here.ont"));
}

#[test]
fn every_relationship_endpoint_is_declared() {
    let ont = Ontology::comptox().unwrap();
    for rel in ont.relationship_types() {
        assert!(ont.entity_type(&rel.subject).is_some(), "{}", rel.name);
        assert!(ont.entity_type(&rel.object).is_some(), "{}", rel.name);
        if let Some(inv) = &rel.inverse {
            assert_eq!(ont.inverse_of(inv), Some(rel.name.as_str()));
        }
    }
}

proptest! {
    #[test]
    fn declared_cardinality_is_what_lookup_returns(
        props in proptest::collection::btree_map("[a-z][a-zA-Z0-9]{0,8}", any::<bool>(), 1..8)
    ) {
        let mut text = String::from("ontology P\nentity Node (node):\n");
        for (name, functional) in &props {
            let kw = if *functional { "functional" } else { "multi" };
            text.push_str(&format!("  {kw} {name}\n"));
        }
        text.push_str("entity Leaf (leaf) : Node\n");
        let ont = Ontology::from_text(&text).unwrap();
        for (name, functional) in &props {
            let expected = if *functional { Cardinality::Functional } else { Cardinality::MultiValued };
            prop_assert_eq!(ont.property("Leaf", name).map(|p| p.cardinality), Some(expected));
        }
    }
}
