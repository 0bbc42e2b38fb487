//! Hetionet v1.0: the backbone of chemicals, diseases, genes, anatomy, side
//! effects and symptoms. Depends on nothing.

use anyhow::{bail, Result};
use comptox_build::{
    BuildContext, BuildError, LinkRequest, Linker, MatchKey, NodeMerger, NodeRecord,
    SourceImporter,
};
use std::path::PathBuf;

use crate::ids::strip_namespace;
use crate::table::{Table, TableSpec};

pub const NAME: &str = "hetionet";
pub const NODES_FILE: &str = "hetionet-v1.0-nodes.tsv";
pub const EDGES_FILE: &str = "hetionet-v1.0-edges.sif";

/// How entities of one type are identified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Endpoint {
    label: &'static str,
    xref: &'static str,
}

const ANATOMY: Endpoint = Endpoint {
    label: "StructuralEntity",
    xref: "xrefUberon",
};
const CHEMICAL: Endpoint = Endpoint {
    label: "Chemical",
    xref: "xrefDrugbank",
};
const DISEASE: Endpoint = Endpoint {
    label: "Disease",
    xref: "xrefDiseaseOntology",
};
const GENE: Endpoint = Endpoint {
    label: "Gene",
    xref: "xrefNcbiGene",
};
const SIDE_EFFECT: Endpoint = Endpoint {
    label: "AdverseEffect",
    xref: "xrefUmlsCUI",
};
const SYMPTOM: Endpoint = Endpoint {
    label: "Phenotype",
    xref: "xrefMeSH",
};

/// Node kinds; `None` marks kinds Hetionet has but the graph does not model.
const NODE_KINDS: &[(&str, Option<Endpoint>)] = &[
    ("Anatomy", Some(ANATOMY)),
    ("Biological Process", None),
    ("Cellular Component", None),
    ("Compound", Some(CHEMICAL)),
    ("Disease", Some(DISEASE)),
    ("Gene", Some(GENE)),
    ("Molecular Function", None),
    ("Pathway", None),
    ("Pharmacologic Class", None),
    ("Side Effect", Some(SIDE_EFFECT)),
    ("Symptom", Some(SYMPTOM)),
];

struct Metaedge {
    rel_type: &'static str,
    subject: Endpoint,
    object: Endpoint,
}

const fn edge(rel_type: &'static str, subject: Endpoint, object: Endpoint) -> Option<Metaedge> {
    Some(Metaedge {
        rel_type,
        subject,
        object,
    })
}

const METAEDGES: &[(&str, Option<Metaedge>)] = &[
    ("AdG", edge("anatomyDownregulatesGene", ANATOMY, GENE)),
    ("AeG", edge("anatomyExpressesGene", ANATOMY, GENE)),
    ("AuG", edge("anatomyUpregulatesGene", ANATOMY, GENE)),
    ("CbG", edge("chemicalBindsGene", CHEMICAL, GENE)),
    ("CcSE", edge("chemicalCausesEffect", CHEMICAL, SIDE_EFFECT)),
    ("CdG", None),
    ("CpD", None),
    ("CrC", None),
    ("CtD", edge("chemicalTreatsDisease", CHEMICAL, DISEASE)),
    ("CuG", None),
    ("DaG", edge("diseaseRegulatesGeneOther", DISEASE, GENE)),
    ("DdG", edge("diseaseDownregulatesGene", DISEASE, GENE)),
    ("DlA", edge("diseaseLocalizesToAnatomy", DISEASE, ANATOMY)),
    ("DpS", None),
    ("DrD", None),
    ("DuG", edge("diseaseUpregulatesGene", DISEASE, GENE)),
    ("GcG", None),
    ("GiG", None),
    ("GpBP", None),
    ("GpCC", None),
    ("GpMF", None),
    ("GpPW", None),
    ("Gr>G", None),
    ("PCiC", None),
];

fn lookup<'t, T>(table: &'t [(&str, Option<T>)], tag: &str) -> Option<&'t Option<T>> {
    table.iter().find(|(t, _)| *t == tag).map(|(_, v)| v)
}

pub struct HetionetImporter {
    dir: PathBuf,
    nodes: Option<Table>,
    edges: Option<Table>,
}

impl HetionetImporter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            nodes: None,
            edges: None,
        }
    }

    fn parse_nodes(&self, ctx: &mut BuildContext<'_>, nodes: &Table) -> Result<()> {
        let mut merger = NodeMerger::new(NAME, ctx.ontology);
        for row in nodes.rows() {
            ctx.checkpoint()?;
            ctx.stats.rows_read += 1;

            let Some(kind) = row.get("kind") else {
                ctx.stats.missing_field += 1;
                tracing::warn!(importer = NAME, line = row.line(), "node row without a kind");
                continue;
            };
            let endpoint = match lookup(NODE_KINDS, kind) {
                Some(Some(endpoint)) => *endpoint,
                Some(None) => {
                    ctx.stats.filtered += 1;
                    continue;
                }
                None => {
                    return Err(BuildError::UnknownDiscriminator {
                        importer: NAME.to_string(),
                        field: "node kind".to_string(),
                        value: kind.to_string(),
                        line: row.line(),
                    }
                    .into())
                }
            };
            let (Some(id), Some(name)) = (row.get("id").map(strip_namespace), row.get("name")) else {
                ctx.stats.missing_field += 1;
                tracing::warn!(importer = NAME, line = row.line(), "node row without id or name");
                continue;
            };

            let mut record = NodeRecord::new(endpoint.label, name)
                .at_line(row.line())
                .match_on(MatchKey::new(endpoint.xref, id).with_label(endpoint.label))
                .with(endpoint.xref, id)
                .on_create("commonName", name);
            if endpoint == CHEMICAL {
                record = record.with("chemicalIsDrug", true);
            } else if endpoint == GENE {
                record = record.with("geneSymbol", name);
            }
            ctx.merge(&mut merger, record)?;
        }
        Ok(())
    }

    fn parse_edges(&self, ctx: &mut BuildContext<'_>, edges: &Table) -> Result<()> {
        let linker = Linker::new(NAME, ctx.ontology);
        for row in edges.rows() {
            ctx.checkpoint()?;
            ctx.stats.rows_read += 1;

            let (Some(source), Some(code), Some(target)) =
                (row.get("source"), row.get("metaedge"), row.get("target"))
            else {
                ctx.stats.missing_field += 1;
                tracing::warn!(importer = NAME, line = row.line(), "incomplete edge row");
                continue;
            };
            let metaedge = match lookup(METAEDGES, code) {
                Some(Some(m)) => m,
                Some(None) => {
                    ctx.stats.filtered += 1;
                    continue;
                }
                None => {
                    return Err(BuildError::UnknownDiscriminator {
                        importer: NAME.to_string(),
                        field: "metaedge".to_string(),
                        value: code.to_string(),
                        line: row.line(),
                    }
                    .into())
                }
            };

            let request = LinkRequest::new(
                MatchKey::new(metaedge.subject.xref, strip_namespace(source))
                    .with_label(metaedge.subject.label),
                metaedge.rel_type,
                MatchKey::new(metaedge.object.xref, strip_namespace(target))
                    .with_label(metaedge.object.label),
            );
            ctx.link(&linker, &request)?;
        }
        Ok(())
    }
}

impl SourceImporter for HetionetImporter {
    fn name(&self) -> &str {
        NAME
    }

    fn fetch_raw_data(&mut self) -> Result<()> {
        let nodes = Table::read(&self.dir.join(NODES_FILE), &TableSpec::tsv())?;
        nodes.require_columns(&["id", "name", "kind"])?;
        let edges = Table::read(&self.dir.join(EDGES_FILE), &TableSpec::tsv())?;
        edges.require_columns(&["source", "metaedge", "target"])?;
        tracing::info!(importer = NAME, nodes = nodes.len(), edges = edges.len(), "hetionet loaded");
        self.nodes = Some(nodes);
        self.edges = Some(edges);
        Ok(())
    }

    fn parse(&mut self, ctx: &mut BuildContext<'_>) -> Result<()> {
        let (Some(nodes), Some(edges)) = (self.nodes.take(), self.edges.take()) else {
            bail!("{NAME}: parse called before fetch_raw_data");
        };
        self.parse_nodes(ctx, &nodes)?;
        self.parse_edges(ctx, &edges)
    }
}
