//! Relationship linking between already-existing entities.
//!
//! Both endpoints are resolved independently; an edge is written only when
//! both resolve to exactly one entity, and never twice. Compound cells
//! (several identifiers in one field) expand to the Cartesian product of
//! subject and object candidates.

use comptox_graphdb::{EdgeProperties, GraphStore, NodeId};
use comptox_ontology::Ontology;
use parking_lot::RwLock;
use rayon::prelude::*;

use crate::cancel::CancelToken;
use crate::error::BuildError;
use crate::resolve::{resolve, MatchKey, Resolution};
use crate::summary::ImportStageResult;

#[derive(Debug, Clone, PartialEq)]
pub struct LinkRequest {
    pub subject: MatchKey,
    pub object: MatchKey,
    pub rel_type: String,
    pub inverse: Option<String>,
    pub properties: EdgeProperties,
}

impl LinkRequest {
    pub fn new(subject: MatchKey, rel_type: impl Into<String>, object: MatchKey) -> Self {
        Self {
            subject,
            object,
            rel_type: rel_type.into(),
            inverse: None,
            properties: EdgeProperties::new(),
        }
    }

    pub fn with_inverse(mut self, inverse: impl Into<String>) -> Self {
        self.inverse = Some(inverse.into());
        self
    }

    pub fn with_properties(mut self, properties: EdgeProperties) -> Self {
        self.properties = properties;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkOutcome {
    Created,
    Existing,
    UnmatchedSubject,
    UnmatchedObject,
    Ambiguous,
}

/// Split a compound identifier cell, dropping blanks and repeats.
pub fn split_compound(cell: &str, delimiter: char) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for part in cell.split(delimiter).map(str::trim).filter(|p| !p.is_empty()) {
        if !out.iter().any(|o| o == part) {
            out.push(part.to_string());
        }
    }
    out
}

pub struct Linker<'o> {
    importer: String,
    ontology: &'o Ontology,
}

enum Endpoints {
    Resolved(NodeId, NodeId),
    Skipped(LinkOutcome),
}

impl<'o> Linker<'o> {
    pub fn new(importer: impl Into<String>, ontology: &'o Ontology) -> Self {
        Self {
            importer: importer.into(),
            ontology,
        }
    }

    fn check_types(&self, request: &LinkRequest) -> Result<(), BuildError> {
        for rel in std::iter::once(&request.rel_type).chain(request.inverse.as_ref()) {
            if self.ontology.relationship(rel).is_none() {
                return Err(BuildError::UnknownRelationship(rel.clone()));
            }
        }
        Ok(())
    }

    fn endpoints<S: GraphStore + ?Sized>(
        &self,
        store: &S,
        request: &LinkRequest,
        stats: &mut ImportStageResult,
    ) -> Endpoints {
        let subject = resolve(store, &request.subject);
        let object = resolve(store, &request.object);
        match (subject, object) {
            (Resolution::Found(s), Resolution::Found(o)) => Endpoints::Resolved(s, o),
            (Resolution::Ambiguous(c), _) | (_, Resolution::Ambiguous(c)) => {
                stats.edges_ambiguous += 1;
                tracing::warn!(
                    importer = %self.importer,
                    rel_type = %request.rel_type,
                    subject = %request.subject,
                    object = %request.object,
                    candidates = ?c,
                    "ambiguous edge endpoint, skipping"
                );
                Endpoints::Skipped(LinkOutcome::Ambiguous)
            }
            (Resolution::NotFound, _) => {
                stats.edges_unmatched_subject += 1;
                Endpoints::Skipped(LinkOutcome::UnmatchedSubject)
            }
            (_, Resolution::NotFound) => {
                stats.edges_unmatched_object += 1;
                Endpoints::Skipped(LinkOutcome::UnmatchedObject)
            }
        }
    }

    /// Resolve both endpoints and ensure the edge (and its inverse) exists.
    pub fn link<S: GraphStore + ?Sized>(
        &self,
        store: &mut S,
        request: &LinkRequest,
        stats: &mut ImportStageResult,
    ) -> Result<LinkOutcome, BuildError> {
        self.check_types(request)?;
        let (s, o) = match self.endpoints(store, request, stats) {
            Endpoints::Resolved(s, o) => (s, o),
            Endpoints::Skipped(outcome) => return Ok(outcome),
        };
        Ok(self.write_edges(store, s, o, request, stats)?)
    }

    fn write_edges<S: GraphStore + ?Sized>(
        &self,
        store: &mut S,
        subject: NodeId,
        object: NodeId,
        request: &LinkRequest,
        stats: &mut ImportStageResult,
    ) -> Result<LinkOutcome, BuildError> {
        let created = ensure_edge(store, subject, object, &request.rel_type, &request.properties, stats)?;
        if let Some(inverse) = &request.inverse {
            ensure_edge(store, object, subject, inverse, &request.properties, stats)?;
        }
        Ok(if created {
            LinkOutcome::Created
        } else {
            LinkOutcome::Existing
        })
    }

    /// Link every subject candidate to every object candidate.
    pub fn link_compound<S: GraphStore + ?Sized>(
        &self,
        store: &mut S,
        subjects: &[MatchKey],
        rel_type: &str,
        objects: &[MatchKey],
        inverse: Option<&str>,
        properties: &EdgeProperties,
        stats: &mut ImportStageResult,
    ) -> Result<Vec<LinkOutcome>, BuildError> {
        let mut outcomes = Vec::with_capacity(subjects.len() * objects.len());
        for subject in subjects {
            for object in objects {
                let mut request = LinkRequest::new(subject.clone(), rel_type, object.clone())
                    .with_properties(properties.clone());
                request.inverse = inverse.map(str::to_string);
                outcomes.push(self.link(store, &request, stats)?);
            }
        }
        Ok(outcomes)
    }

    /// Link independent requests on the rayon pool.
    ///
    /// Endpoints are resolved under the read lock. Creation takes the write
    /// lock and re-checks existence there, so two workers racing on the same
    /// edge write it once.
    pub fn link_parallel<S>(
        &self,
        store: &RwLock<S>,
        requests: &[LinkRequest],
        cancel: &CancelToken,
    ) -> Result<ImportStageResult, BuildError>
    where
        S: GraphStore + Send + Sync,
    {
        for request in requests {
            self.check_types(request)?;
        }

        requests
            .par_iter()
            .map(|request| -> Result<ImportStageResult, BuildError> {
                cancel.check()?;
                let mut stats = ImportStageResult::default();
                let endpoints = {
                    let guard = store.read();
                    match self.endpoints(&*guard, request, &mut stats) {
                        Endpoints::Resolved(s, o)
                            if guard.edge_exists(s, o, &request.rel_type)
                                && request
                                    .inverse
                                    .as_deref()
                                    .map_or(true, |inv| guard.edge_exists(o, s, inv)) =>
                        {
                            stats.edges_existing += 1 + usize::from(request.inverse.is_some());
                            None
                        }
                        Endpoints::Resolved(s, o) => Some((s, o)),
                        Endpoints::Skipped(_) => None,
                    }
                };
                if let Some((s, o)) = endpoints {
                    let mut guard = store.write();
                    self.write_edges(&mut *guard, s, o, request, &mut stats)?;
                }
                Ok(stats)
            })
            .try_reduce(ImportStageResult::default, |mut acc, part| {
                acc.absorb(&part);
                Ok(acc)
            })
    }
}

fn ensure_edge<S: GraphStore + ?Sized>(
    store: &mut S,
    from: NodeId,
    to: NodeId,
    rel_type: &str,
    properties: &EdgeProperties,
    stats: &mut ImportStageResult,
) -> Result<bool, BuildError> {
    if store.edge_exists(from, to, rel_type) {
        stats.edges_existing += 1;
        return Ok(false);
    }
    let created = store.create_edge(from, to, rel_type, properties.clone())?;
    if created {
        stats.edges_created += 1;
    } else {
        stats.edges_existing += 1;
    }
    Ok(created)
}

#[cfg(test)]
mod tests {
    use super::*;
    use comptox_graphdb::{GraphDb, Properties, PropertySlot};

    fn node(db: &mut GraphDb, key: &str, label: &str, prop: &str, value: &str) -> NodeId {
        let mut props = Properties::new();
        props.insert(prop.to_string(), PropertySlot::Single(value.into()));
        db.create_node(key, &[label.to_string()], props).unwrap()
    }

    #[test]
    fn missing_object_is_counted_not_created() {
        let ont = Ontology::comptox().unwrap();
        let mut db = GraphDb::new();
        node(&mut db, "gene_cdkn1a", "Gene", "xrefNcbiGene", "1026");
        let linker = Linker::new("t", &ont);
        let mut stats = ImportStageResult::default();
        let req = LinkRequest::new(
            MatchKey::new("xrefNcbiGene", "1026"),
            "geneInPathway",
            MatchKey::new("pathwayId", "PWY123"),
        );
        assert_eq!(
            linker.link(&mut db, &req, &mut stats).unwrap(),
            LinkOutcome::UnmatchedObject
        );
        assert_eq!(stats.edges_unmatched_object, 1);
        assert_eq!(db.edge_count(), 0);
    }

    #[test]
    fn shared_endpoint_value_is_ambiguous() {
        let ont = Ontology::comptox().unwrap();
        let mut db = GraphDb::new();
        node(&mut db, "gene_cdkn1a", "Gene", "xrefNcbiGene", "1026");
        node(&mut db, "pw_cell_cycle", "Pathway", "pathwayId", "PWY1");
        node(&mut db, "pw_cell_cycle_checkpoints", "Pathway", "pathwayId", "PWY1");
        let linker = Linker::new("t", &ont);
        let mut stats = ImportStageResult::default();
        let req = LinkRequest::new(
            MatchKey::new("xrefNcbiGene", "1026"),
            "geneInPathway",
            MatchKey::new("pathwayId", "PWY1").with_label("Pathway"),
        );
        assert_eq!(
            linker.link(&mut db, &req, &mut stats).unwrap(),
            LinkOutcome::Ambiguous
        );
        assert_eq!(stats.edges_ambiguous, 1);
        assert_eq!(stats.edges_created, 0);
        assert_eq!(db.edge_count(), 0);
    }

    #[test]
    fn inverse_is_written_once() {
        let ont = Ontology::comptox().unwrap();
        let mut db = GraphDb::new();
        let l = node(&mut db, "list_x", "ChemicalList", "listAcronym", "X");
        let c = node(&mut db, "chem_y", "Chemical", "xrefCasRN", "1-1-1");
        let linker = Linker::new("t", &ont);
        let mut stats = ImportStageResult::default();
        let req = LinkRequest::new(
            MatchKey::new("listAcronym", "X"),
            "listIncludesChemical",
            MatchKey::new("xrefCasRN", "1-1-1"),
        )
        .with_inverse("chemicalInList");
        assert_eq!(linker.link(&mut db, &req, &mut stats).unwrap(), LinkOutcome::Created);
        assert_eq!(linker.link(&mut db, &req, &mut stats).unwrap(), LinkOutcome::Existing);
        assert!(db.edge_exists(c, l, "chemicalInList"));
        assert_eq!(db.edge_count(), 2);
        assert_eq!(stats.edges_created, 2);
        assert_eq!(stats.edges_existing, 2);
    }

    #[test]
    fn undeclared_relationship_is_rejected() {
        let ont = Ontology::comptox().unwrap();
        let mut db = GraphDb::new();
        let linker = Linker::new("t", &ont);
        let req = LinkRequest::new(MatchKey::new("a", "1"), "madeUp", MatchKey::new("b", "2"));
        assert!(matches!(
            linker.link(&mut db, &req, &mut ImportStageResult::default()),
            Err(BuildError::UnknownRelationship(_))
        ));
    }

    #[test]
    fn split_compound_trims_and_dedups() {
        assert_eq!(split_compound(" 1; 2;;1 ", ';'), vec!["1", "2"]);
        assert!(split_compound("", ';').is_empty());
    }
}
