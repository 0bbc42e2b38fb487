use anyhow::Result;
use comptox_graphdb::GraphStore;
use comptox_ontology::Ontology;

use crate::cancel::CancelToken;
use crate::error::BuildError;
use crate::link::{LinkOutcome, LinkRequest, Linker};
use crate::merge::{MergeOutcome, NodeMerger, NodeRecord};
use crate::summary::ImportStageResult;

/// Everything an importer may touch while it runs. Handles are passed in
/// explicitly; importers hold no global state.
pub struct BuildContext<'a> {
    pub store: &'a mut dyn GraphStore,
    pub ontology: &'a Ontology,
    pub stats: &'a mut ImportStageResult,
    pub cancel: &'a CancelToken,
}

impl<'a> BuildContext<'a> {
    /// Row-boundary cancellation point.
    pub fn checkpoint(&self) -> Result<(), BuildError> {
        self.cancel.check()
    }

    pub fn merge(
        &mut self,
        merger: &mut NodeMerger<'_>,
        record: NodeRecord,
    ) -> Result<MergeOutcome, BuildError> {
        merger.merge(&mut *self.store, record, self.stats)
    }

    pub fn link(&mut self, linker: &Linker<'_>, request: &LinkRequest) -> Result<LinkOutcome, BuildError> {
        linker.link(&mut *self.store, request, self.stats)
    }
}

/// One external dataset.
///
/// The orchestrator calls `prepopulate`, `fetch_raw_data` and `parse` in that
/// order, after every importer named by `requires` has finished `parse`.
pub trait SourceImporter {
    fn name(&self) -> &str;

    /// Importers whose output this one cross-references.
    fn requires(&self) -> Vec<String> {
        Vec::new()
    }

    /// Load small auxiliary cross-reference tables.
    fn prepopulate(&mut self, _ctx: &mut BuildContext<'_>) -> Result<()> {
        Ok(())
    }

    /// Load the primary dataset into memory. No graph access.
    fn fetch_raw_data(&mut self) -> Result<()>;

    /// Merge-or-create every row, in input order.
    fn parse(&mut self, ctx: &mut BuildContext<'_>) -> Result<()>;
}
