//! Comparative Toxicogenomics Database.
//!
//! ```text
//!   prepopulate  drug_links.csv        DrugBank id ─▶ xrefCasRN on Hetionet compounds
//!   parse        CTD_chemicals.csv     merge-only by CAS: chemicalIsInCTD, xrefMeSHUI
//!                CTD_diseases.csv      resolve [DO ids.., MeSH] ─▶ merge or create dis_*
//!                CTD_chemicals_diseases.csv ─▶ chemicalAssociatesWithDisease
//! ```

use anyhow::{bail, Result};
use comptox_build::{
    BuildContext, LinkRequest, Linker, MatchKey, NodeMerger, NodeRecord, SourceImporter,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::ids::{after_last, prefixed};
use crate::table::{Table, TableSpec};

pub const NAME: &str = "ctd";
pub const CHEMICALS_FILE: &str = "CTD_chemicals.csv";
pub const DISEASES_FILE: &str = "CTD_diseases.csv";
pub const CHEMICAL_DISEASES_FILE: &str = "CTD_chemicals_diseases.csv";
pub const DRUG_LINKS_FILE: &str = "drug_links.csv";

/// Separator inside CTD list cells (`AltDiseaseIDs`).
const LIST_DELIMITER: char = '|';

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CtdOptions {
    /// Keep only chemical–disease rows with curated direct evidence.
    pub direct_evidence_only: bool,
    pub link_chemical_diseases: bool,
}

impl Default for CtdOptions {
    fn default() -> Self {
        Self {
            direct_evidence_only: true,
            link_chemical_diseases: true,
        }
    }
}

#[derive(Default)]
struct Loaded {
    chemicals: Option<Table>,
    diseases: Option<Table>,
    chemical_diseases: Option<Table>,
}

pub struct CtdImporter {
    dir: PathBuf,
    drugbank_dir: Option<PathBuf>,
    options: CtdOptions,
    loaded: Loaded,
}

impl CtdImporter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            drugbank_dir: None,
            options: CtdOptions::default(),
            loaded: Loaded::default(),
        }
    }

    pub fn with_drugbank(mut self, dir: impl Into<PathBuf>) -> Self {
        self.drugbank_dir = Some(dir.into());
        self
    }

    pub fn with_options(mut self, options: CtdOptions) -> Self {
        self.options = options;
        self
    }

    fn read(&self, file: &str) -> Result<Table> {
        Table::read(&self.dir.join(file), &TableSpec::csv().commented_fields())
    }

    fn parse_chemicals(&self, ctx: &mut BuildContext<'_>, table: &Table) -> Result<()> {
        let mut merger = NodeMerger::new(NAME, ctx.ontology);
        for row in table.rows() {
            ctx.checkpoint()?;
            ctx.stats.rows_read += 1;
            let (Some(name), Some(cas)) = (row.get("ChemicalName"), row.get("CasRN")) else {
                ctx.stats.missing_field += 1;
                tracing::debug!(importer = NAME, line = row.line(), "chemical without name or CAS number");
                continue;
            };
            let record = NodeRecord::new("Chemical", name)
                .at_line(row.line())
                .match_on(MatchKey::new("xrefCasRN", cas).with_label("Chemical"))
                .with("chemicalIsInCTD", true)
                .with_opt("xrefMeSHUI", row.get("ChemicalID").map(|id| after_last(id, ':')))
                .merge_only();
            ctx.merge(&mut merger, record)?;
        }
        Ok(())
    }

    fn parse_diseases(&self, ctx: &mut BuildContext<'_>, table: &Table) -> Result<()> {
        let mut merger = NodeMerger::new(NAME, ctx.ontology);
        for row in table.rows() {
            ctx.checkpoint()?;
            ctx.stats.rows_read += 1;
            let (Some(name), Some(mesh)) = (
                row.get("DiseaseName"),
                row.get("DiseaseID").map(|id| after_last(id, ':')),
            ) else {
                ctx.stats.missing_field += 1;
                tracing::warn!(importer = NAME, line = row.line(), "disease without name or MeSH id");
                continue;
            };
            let alt_ids = row.get("AltDiseaseIDs").unwrap_or_default();

            let mut record = NodeRecord::new("Disease", name).at_line(row.line());
            for doid in prefixed(alt_ids, LIST_DELIMITER, "DO:") {
                record = record
                    .match_on(MatchKey::new("xrefDiseaseOntology", doid).with_label("Disease"))
                    .with("xrefDiseaseOntology", doid);
            }
            record = record
                .match_on(MatchKey::new("xrefMeSH", mesh).with_label("Disease"))
                .with("xrefMeSH", mesh)
                .on_create("commonName", name);
            for omim in prefixed(alt_ids, LIST_DELIMITER, "OMIM:") {
                record = record.with("xrefOMIM", omim);
            }
            ctx.merge(&mut merger, record)?;
        }
        Ok(())
    }

    fn link_chemical_diseases(&self, ctx: &mut BuildContext<'_>, table: &Table) -> Result<()> {
        let linker = Linker::new(NAME, ctx.ontology);
        for row in table.rows() {
            ctx.checkpoint()?;
            ctx.stats.rows_read += 1;
            if self.options.direct_evidence_only && row.get("DirectEvidence").is_none() {
                ctx.stats.filtered += 1;
                continue;
            }
            let (Some(chemical), Some(disease)) = (row.get("ChemicalID"), row.get("DiseaseID")) else {
                ctx.stats.missing_field += 1;
                continue;
            };
            let request = LinkRequest::new(
                MatchKey::new("xrefMeSHUI", after_last(chemical, ':')).with_label("Chemical"),
                "chemicalAssociatesWithDisease",
                MatchKey::new("xrefMeSH", after_last(disease, ':')).with_label("Disease"),
            );
            ctx.link(&linker, &request)?;
        }
        Ok(())
    }
}

impl SourceImporter for CtdImporter {
    fn name(&self) -> &str {
        NAME
    }

    fn requires(&self) -> Vec<String> {
        vec![crate::hetionet::NAME.to_string()]
    }

    /// Annotate Hetionet compounds with CAS numbers through DrugBank so the
    /// CTD chemical table can find them.
    fn prepopulate(&mut self, ctx: &mut BuildContext<'_>) -> Result<()> {
        let Some(dir) = &self.drugbank_dir else {
            return Ok(());
        };
        let links = Table::read(&dir.join(DRUG_LINKS_FILE), &TableSpec::csv())?;
        links.require_columns(&["DrugBank ID", "CAS Number"])?;

        let mut merger = NodeMerger::new(NAME, ctx.ontology);
        for row in links.rows() {
            ctx.checkpoint()?;
            ctx.stats.rows_read += 1;
            let (Some(drugbank), Some(cas)) = (row.get("DrugBank ID"), row.get("CAS Number")) else {
                ctx.stats.missing_field += 1;
                tracing::debug!(importer = NAME, line = row.line(), "drug link without CAS number");
                continue;
            };
            let record = NodeRecord::new("Chemical", drugbank)
                .at_line(row.line())
                .match_on(MatchKey::new("xrefDrugbank", drugbank).with_label("Chemical"))
                .with("xrefCasRN", cas)
                .merge_only();
            ctx.merge(&mut merger, record)?;
        }
        tracing::info!(importer = NAME, links = links.len(), "drugbank cross-references applied");
        Ok(())
    }

    fn fetch_raw_data(&mut self) -> Result<()> {
        let chemicals = self.read(CHEMICALS_FILE)?;
        chemicals.require_columns(&["ChemicalName", "ChemicalID", "CasRN"])?;
        let diseases = self.read(DISEASES_FILE)?;
        diseases.require_columns(&["DiseaseName", "DiseaseID", "AltDiseaseIDs"])?;
        let chemical_diseases = if self.options.link_chemical_diseases {
            let table = self.read(CHEMICAL_DISEASES_FILE)?;
            table.require_columns(&["ChemicalID", "DiseaseID", "DirectEvidence"])?;
            Some(table)
        } else {
            None
        };
        self.loaded = Loaded {
            chemicals: Some(chemicals),
            diseases: Some(diseases),
            chemical_diseases,
        };
        Ok(())
    }

    fn parse(&mut self, ctx: &mut BuildContext<'_>) -> Result<()> {
        let loaded = std::mem::take(&mut self.loaded);
        let (Some(chemicals), Some(diseases)) = (loaded.chemicals, loaded.diseases) else {
            bail!("{NAME}: parse called before fetch_raw_data");
        };
        self.parse_chemicals(ctx, &chemicals)?;
        self.parse_diseases(ctx, &diseases)?;
        if let Some(links) = loaded.chemical_diseases {
            self.link_chemical_diseases(ctx, &links)?;
        }
        Ok(())
    }
}
