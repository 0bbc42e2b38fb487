//! Integration tests for the complete ComptoxAI build
//!
//! These tests run real importers over the fixture datasets in
//! `crates/comptox-ingest/tests/fixtures`:
//! - pipeline config → Orchestrator → GraphDb, twice (idempotence)
//! - cross-source merges, ambiguity and unmatched endpoints
//! - snapshot round trip and feature export over the built graph
//!
//! Run with: cargo test --test integration_tests

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use comptox_build::{
    BuildReport, CancelToken, LinkRequest, Linker, MatchKey, Orchestrator, SourceImporter, StageStatus,
};
use comptox_graphdb::{GraphDb, GraphStore, Properties, Value};
use comptox_ingest::{CtdImporter, CtdOptions, HetionetImporter, PipelineConfig, TableImporter, TableSourceConfig};
use comptox_ontology::Ontology;
use parking_lot::RwLock;
use proptest::prelude::*;
use tempfile::tempdir;

fn fixtures() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("crates/comptox-ingest/tests/fixtures")
}

fn pipeline() -> PipelineConfig {
    PipelineConfig::load(&fixtures().join("pipeline.json")).expect("fixture config")
}

fn run_on(db: &mut GraphDb, importers: Vec<Box<dyn SourceImporter>>) -> BuildReport {
    let ontology = Ontology::comptox().unwrap();
    Orchestrator::new(&ontology).run(db, importers).unwrap()
}

/// Every node by key, without ids, so graphs built in different orders compare.
fn contents(db: &GraphDb) -> BTreeMap<String, (Vec<String>, Properties)> {
    db.node_ids()
        .filter_map(|id| db.node(id))
        .map(|n| {
            let mut labels = n.labels;
            labels.sort();
            (n.key, (labels, n.properties))
        })
        .collect()
}

fn edges(db: &GraphDb) -> Vec<(String, String, String)> {
    let key = |id| db.key_of(id).unwrap();
    let mut out: Vec<_> = db
        .edge_ids()
        .filter_map(|e| db.edge_endpoints(e))
        .map(|(s, t, o)| (key(s), t, key(o)))
        .collect();
    out.sort();
    out
}

fn write(dir: &Path, name: &str, text: &str) {
    std::fs::write(dir.join(name), text).unwrap();
}

fn table(config: serde_json::Value) -> Box<dyn SourceImporter> {
    let config: TableSourceConfig = serde_json::from_value(config).unwrap();
    Box::new(TableImporter::new(config).unwrap())
}

// ============================================================================
// Full pipeline
// ============================================================================

#[test]
fn test_pipeline_rerun_changes_nothing() {
    let config = pipeline();
    let mut db = GraphDb::new();

    let first = run_on(&mut db, config.build_importers().unwrap());
    assert!(first.is_success());
    let (nodes, links) = (contents(&db), edges(&db));
    assert_eq!((nodes.len(), links.len()), (22, 25));

    let second = run_on(&mut db, config.build_importers().unwrap());
    assert!(second.is_success());
    assert_eq!(contents(&db), nodes);
    assert_eq!(edges(&db), links);

    let totals = second.totals();
    assert_eq!(totals.created, 0);
    assert_eq!(totals.labels_added, 0);
    assert_eq!(totals.edges_created, 0);
    assert_eq!(totals.key_conflicts, 0);
    let before = first.totals();
    assert_eq!(totals.edges_existing, before.edges_created + before.edges_existing);
    assert_eq!(totals.unmatched, before.unmatched);
}

#[test]
fn test_pipeline_result_is_independent_of_source_order() {
    let config = pipeline();
    let mut forward = GraphDb::new();
    run_on(&mut forward, config.build_importers().unwrap());

    let mut reversed = GraphDb::new();
    let mut importers = config.build_importers().unwrap();
    importers.reverse();
    let report = run_on(&mut reversed, importers);

    assert_eq!(report.stages[0].importer, "hetionet");
    assert_eq!(contents(&reversed), contents(&forward));
    assert_eq!(edges(&reversed), edges(&forward));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(8))]

    #[test]
    fn test_any_registration_order_builds_the_same_graph(
        order in Just((0..6usize).collect::<Vec<_>>()).prop_shuffle()
    ) {
        let config = pipeline();
        let mut expected = GraphDb::new();
        run_on(&mut expected, config.build_importers().unwrap());

        let mut slots: Vec<Option<Box<dyn SourceImporter>>> =
            config.build_importers().unwrap().into_iter().map(Some).collect();
        let shuffled: Vec<Box<dyn SourceImporter>> =
            order.iter().filter_map(|&i| slots[i].take()).collect();
        prop_assert_eq!(shuffled.len(), 6);

        let mut db = GraphDb::new();
        let report = run_on(&mut db, shuffled);
        let executed: Vec<&str> = report.stages.iter().map(|s| s.importer.as_str()).collect();
        prop_assert_eq!(executed, ["hetionet", "ctd", "aopwiki", "epa", "pathways", "gene_pathways"]);
        prop_assert_eq!(contents(&db), contents(&expected));
        prop_assert_eq!(edges(&db), edges(&expected));
    }
}

#[test]
fn test_cancelled_build_resumes_to_the_same_graph() {
    let config = pipeline();
    let ontology = Ontology::comptox().unwrap();

    let cancel = CancelToken::new();
    cancel.cancel();
    let mut db = GraphDb::new();
    let cancelled = Orchestrator::new(&ontology)
        .with_cancel(cancel)
        .run(&mut db, config.build_importers().unwrap())
        .unwrap();
    assert!(cancelled.was_cancelled());
    assert_eq!(cancelled.stage("hetionet").unwrap().status, StageStatus::Cancelled);
    assert!(cancelled.stages.iter().all(|s| s.status != StageStatus::Completed));
    assert_eq!(db.node_count(), 0);

    let resumed = Orchestrator::new(&ontology)
        .resume_from(&cancelled)
        .run(&mut db, config.build_importers().unwrap())
        .unwrap();
    assert!(resumed.is_success());

    let mut fresh = GraphDb::new();
    run_on(&mut fresh, config.build_importers().unwrap());
    assert_eq!(contents(&db), contents(&fresh));
}

#[test]
fn test_snapshot_and_export_of_built_graph() {
    let mut db = GraphDb::new();
    run_on(&mut db, pipeline().build_importers().unwrap());

    let dir = tempdir().unwrap();
    let path = dir.path().join("comptox.graph");
    db.save(&path).unwrap();
    let loaded = GraphDb::load(&path).unwrap();
    assert_eq!(contents(&loaded), contents(&db));
    assert_eq!(edges(&loaded), edges(&db));
    assert_eq!(
        loaded.find_nodes("xrefCasRN", &Value::from("71-43-2")),
        db.find_nodes("xrefCasRN", &Value::from("71-43-2"))
    );

    let incidence = dir.path().join("chemical_lists.tsv");
    let projection = comptox_ingest::export::export_incidence(
        &loaded,
        "Chemical",
        "chemicalInList",
        "ChemicalList",
        &incidence,
    )
    .unwrap();
    assert_eq!(projection.rows.len(), loaded.nodes_with_label("Chemical").len() as usize);
    assert_eq!(projection.edges.len(), 2);
    let text = std::fs::read_to_string(incidence).unwrap();
    assert!(text.starts_with("key\tlist_carcinogens\n"));
    assert!(text.contains("chem_formaldehyde\t1\n"));
    assert!(text.contains("chem_dexamethasone\t0\n"));
}

// ============================================================================
// Merge scenarios
// ============================================================================

#[test]
fn test_disease_row_twice_keeps_one_entity() {
    let dir = tempdir().unwrap();
    write(
        dir.path(),
        "diseases.tsv",
        "name\tmesh\talt_id\nParkinson Disease\tD010300\tDO:DOID0001\n",
    );
    let source = || {
        table(serde_json::json!({
            "name": "diseases",
            "file": dir.path().join("diseases.tsv"),
            "mapping": {
                "table": "nodes", "entity_type": "Disease", "name_column": "name",
                "match_columns": ["alt_id", "mesh"],
                "properties": { "mesh": "xrefMeSH", "alt_id": "xrefDiseaseOntology" },
                "split_last": { "alt_id": ":" }
            }
        }))
    };

    let mut db = GraphDb::new();
    let first = run_on(&mut db, vec![source()]);
    assert_eq!(first.totals().created, 1);
    run_on(&mut db, vec![source()]);

    assert_eq!(db.node_count(), 1);
    let node = db.node(db.node_by_key("dis_parkinson_disease").unwrap()).unwrap();
    assert_eq!(node.labels, ["Disease"]);
    assert_eq!(node.properties["xrefMeSH"].values(), [Value::from("D010300")]);
    assert_eq!(node.properties["xrefDiseaseOntology"].values(), [Value::from("DOID0001")]);
}

/// Minimal Hetionet + DrugBank + CTD inputs around the given drug links.
fn ctd_world(dir: &Path, compounds: &[(&str, &str)], drug_links: &[(&str, &str)]) {
    let mut nodes = String::from("id\tname\tkind\n");
    for (id, name) in compounds {
        nodes.push_str(&format!("Compound::{id}\t{name}\tCompound\n"));
    }
    write(dir, "hetionet-v1.0-nodes.tsv", &nodes);
    write(dir, "hetionet-v1.0-edges.sif", "source\tmetaedge\ttarget\n");

    let mut links = String::from("DrugBank ID,CAS Number\n");
    for (id, cas) in drug_links {
        links.push_str(&format!("{id},{cas}\n"));
    }
    write(dir, "drug_links.csv", &links);
    write(
        dir,
        "CTD_chemicals.csv",
        "# Fields:\n# ChemicalName,ChemicalID,CasRN\n#\nWarfarin,MESH:D014859,81-81-2\n",
    );
    write(
        dir,
        "CTD_diseases.csv",
        "# Fields:\n# DiseaseName,DiseaseID,AltDiseaseIDs\n#\n",
    );
}

fn ctd_sources(dir: &Path) -> Vec<Box<dyn SourceImporter>> {
    let options = CtdOptions {
        link_chemical_diseases: false,
        ..CtdOptions::default()
    };
    vec![
        Box::new(HetionetImporter::new(dir)),
        Box::new(CtdImporter::new(dir).with_drugbank(dir).with_options(options)),
    ]
}

#[test]
fn test_second_source_adds_to_entity_matched_by_cas() {
    let dir = tempdir().unwrap();
    ctd_world(dir.path(), &[("DB00682", "Warfarin")], &[("DB00682", "81-81-2")]);

    let mut db = GraphDb::new();
    let report = run_on(&mut db, ctd_sources(dir.path()));
    assert!(report.is_success());

    let hits = db.find_nodes("xrefCasRN", &Value::from("81-81-2"));
    assert_eq!(hits.len(), 1);
    let node = db.node(hits[0]).unwrap();
    assert_eq!(node.key, "chem_warfarin");
    assert_eq!(node.properties["xrefDrugbank"].values(), [Value::from("DB00682")]);
    assert_eq!(node.properties["chemicalIsInCTD"].values(), [Value::Bool(true)]);
    assert_eq!(node.properties["xrefMeSHUI"].values(), [Value::from("D014859")]);
}

#[test]
fn test_shared_cas_number_is_never_merged_into_either() {
    let dir = tempdir().unwrap();
    ctd_world(
        dir.path(),
        &[("DB00682", "Warfarin"), ("DB99999", "Warfarin sodium")],
        &[("DB00682", "81-81-2"), ("DB99999", "81-81-2")],
    );

    let mut db = GraphDb::new();
    let report = run_on(&mut db, ctd_sources(dir.path()));
    let ctd = &report.stage("ctd").unwrap().result;
    assert_eq!(ctd.ambiguous, 1);
    assert_eq!(ctd.merged, 2);

    let hits = db.find_nodes("xrefCasRN", &Value::from("81-81-2"));
    assert_eq!(hits.len(), 2);
    for id in hits {
        assert!(db.property(id, "chemicalIsInCTD").is_none());
        assert!(db.property(id, "xrefMeSHUI").is_none());
    }
}

#[test]
fn test_link_to_missing_pathway_is_counted() {
    let dir = tempdir().unwrap();
    write(dir.path(), "gene_pathways.tsv", "gene\tpathway\n1\tPWY123\n");

    let mut db = GraphDb::new();
    let gene_pathways = table(serde_json::json!({
        "name": "gene_pathways",
        "file": dir.path().join("gene_pathways.tsv"),
        "mapping": {
            "table": "relationships", "relationship": "geneInPathway",
            "subject": { "column": "gene", "property": "xrefNcbiGene", "label": "Gene" },
            "object": { "column": "pathway", "property": "pathwayId", "label": "Pathway" }
        }
    }));
    let importers: Vec<Box<dyn SourceImporter>> = vec![
        Box::new(HetionetImporter::new(fixtures().join("hetionet"))),
        gene_pathways,
    ];
    let report = run_on(&mut db, importers);

    let stats = &report.stage("gene_pathways").unwrap().result;
    assert_eq!(stats.edges_unmatched_object, 1);
    assert_eq!(stats.edges_created, 0);
    assert!(db.edges_of_type("geneInPathway").is_empty());
}

#[test]
fn test_parallel_linking_writes_each_edge_once() {
    let ontology = Ontology::comptox().unwrap();
    let mut db = GraphDb::new();
    run_on(&mut db, pipeline().build_importers().unwrap());
    let edges_before = db.edge_count();

    let formaldehyde = || MatchKey::new("xrefCasRN", "50-00-0").with_label("Chemical");
    let mut requests: Vec<LinkRequest> = (0..8)
        .map(|_| {
            LinkRequest::new(
                formaldehyde(),
                "chemicalAssociatesWithDisease",
                MatchKey::new("xrefMeSH", "D008175").with_label("Disease"),
            )
        })
        .collect();
    requests.push(LinkRequest::new(
        formaldehyde(),
        "chemicalAssociatesWithDisease",
        MatchKey::new("xrefMeSH", "D999999").with_label("Disease"),
    ));

    let store = RwLock::new(db);
    let stats = Linker::new("parallel", &ontology)
        .link_parallel(&store, &requests, &CancelToken::new())
        .unwrap();
    assert_eq!(stats.edges_created, 1);
    assert_eq!(stats.edges_existing, 7);
    assert_eq!(stats.edges_unmatched_object, 1);

    let db = store.into_inner();
    assert_eq!(db.edge_count(), edges_before + 1);
    let lung = db.node_by_key("dis_lung_neoplasms").unwrap();
    let formaldehyde = db.node_by_key("chem_formaldehyde").unwrap();
    assert!(db.edge_exists(formaldehyde, lung, "chemicalAssociatesWithDisease"));
}
