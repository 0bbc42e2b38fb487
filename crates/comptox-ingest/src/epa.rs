//! EPA CompTox: DSSTox substances, PubChem cross-references and chemical
//! lists. Runs after Hetionet and CTD so DSSTox rows land on the chemicals
//! those sources already carry CAS numbers for.

use anyhow::{bail, Result};
use comptox_build::{
    split_compound, BuildContext, Linker, MatchKey, NodeMerger, NodeRecord, SourceImporter,
};
use comptox_graphdb::EdgeProperties;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::ids::after_last;
use crate::table::{Table, TableSpec};

pub const NAME: &str = "epa";

/// Separator for several CAS numbers in one list-membership cell.
const CAS_DELIMITER: char = '|';

/// Input files, relative to the EPA data directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EpaFiles {
    pub dsstox: String,
    pub pubchem: Option<String>,
    pub lists: Option<String>,
    pub list_members: Option<String>,
}

impl Default for EpaFiles {
    fn default() -> Self {
        Self {
            dsstox: "Dsstox_CAS_number_name.csv".to_string(),
            pubchem: None,
            lists: None,
            list_members: None,
        }
    }
}

#[derive(Default)]
struct Loaded {
    dsstox: Option<Table>,
    pubchem: Option<Table>,
    lists: Option<Table>,
    list_members: Option<Table>,
}

pub struct EpaImporter {
    dir: PathBuf,
    files: EpaFiles,
    loaded: Loaded,
}

impl EpaImporter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self::with_files(dir, EpaFiles::default())
    }

    pub fn with_files(dir: impl Into<PathBuf>, files: EpaFiles) -> Self {
        Self {
            dir: dir.into(),
            files,
            loaded: Loaded::default(),
        }
    }

    fn read(&self, file: &str, columns: &[&str]) -> Result<Table> {
        let path = self.dir.join(file);
        let table = Table::read(&path, &TableSpec::for_path(&path))?;
        table.require_columns(columns)?;
        Ok(table)
    }

    fn read_optional(&self, file: Option<&String>, columns: &[&str]) -> Result<Option<Table>> {
        file.map(|f| self.read(f, columns)).transpose()
    }

    fn parse_dsstox(&self, ctx: &mut BuildContext<'_>, table: &Table) -> Result<()> {
        let mut merger = NodeMerger::new(NAME, ctx.ontology);
        for row in table.rows() {
            ctx.checkpoint()?;
            ctx.stats.rows_read += 1;
            let cas = row.get("casrn");
            let dtxsid = row.get("dsstox_substance_id");
            let (Some(name), true) = (row.get("preferred_name"), cas.is_some() || dtxsid.is_some())
            else {
                ctx.stats.missing_field += 1;
                tracing::debug!(importer = NAME, line = row.line(), "substance without name or identifiers");
                continue;
            };

            let mut record = NodeRecord::new("Chemical", name).at_line(row.line());
            if let Some(cas) = cas {
                record = record.match_on(MatchKey::new("xrefCasRN", cas).with_label("Chemical"));
            }
            if let Some(dtxsid) = dtxsid {
                record = record.match_on(MatchKey::new("xrefDTXSID", dtxsid).with_label("Chemical"));
            }
            let record = record
                .with_opt("xrefCasRN", cas)
                .with_opt("xrefDTXSID", dtxsid)
                .with("commonName", name);
            ctx.merge(&mut merger, record)?;
        }
        Ok(())
    }

    fn parse_pubchem(&self, ctx: &mut BuildContext<'_>, table: &Table) -> Result<()> {
        let mut merger = NodeMerger::new(NAME, ctx.ontology);
        for row in table.rows() {
            ctx.checkpoint()?;
            ctx.stats.rows_read += 1;
            let Some(dtxsid) = row.get("DTXSID") else {
                ctx.stats.missing_field += 1;
                continue;
            };
            let record = NodeRecord::new("Chemical", dtxsid)
                .at_line(row.line())
                .match_on(MatchKey::new("xrefDTXSID", dtxsid).with_label("Chemical"))
                .with_opt("xrefPubchemCID", row.get("CID"))
                .with_opt("xrefPubchemSID", row.get("SID"))
                .merge_only();
            ctx.merge(&mut merger, record)?;
        }
        Ok(())
    }

    fn parse_lists(&self, ctx: &mut BuildContext<'_>, table: &Table) -> Result<()> {
        let mut merger = NodeMerger::new(NAME, ctx.ontology);
        for row in table.rows() {
            ctx.checkpoint()?;
            ctx.stats.rows_read += 1;
            let Some(acronym) = row.get("LIST_ACRONYM").map(|a| after_last(a, '/')) else {
                ctx.stats.missing_field += 1;
                continue;
            };
            let record = NodeRecord::new("ChemicalList", acronym)
                .at_line(row.line())
                .match_on(MatchKey::new("listAcronym", acronym).with_label("ChemicalList"))
                .with("listAcronym", acronym)
                .with_opt("commonName", row.get("LIST_NAME"))
                .with_opt("listDescription", row.get("LIST_DESCRIPTION"));
            ctx.merge(&mut merger, record)?;
        }
        Ok(())
    }

    fn link_list_members(&self, ctx: &mut BuildContext<'_>, table: &Table) -> Result<()> {
        let linker = Linker::new(NAME, ctx.ontology);
        for row in table.rows() {
            ctx.checkpoint()?;
            ctx.stats.rows_read += 1;
            let (Some(acronym), Some(cas)) = (row.get("list_acronym"), row.get("casrn")) else {
                ctx.stats.missing_field += 1;
                continue;
            };
            let list = [MatchKey::new("listAcronym", after_last(acronym, '/')).with_label("ChemicalList")];
            let chemicals: Vec<MatchKey> = split_compound(cas, CAS_DELIMITER)
                .into_iter()
                .map(|c| MatchKey::new("xrefCasRN", c).with_label("Chemical"))
                .collect();
            linker.link_compound(
                &mut *ctx.store,
                &list,
                "listIncludesChemical",
                &chemicals,
                Some("chemicalInList"),
                &EdgeProperties::new(),
                &mut *ctx.stats,
            )?;
        }
        Ok(())
    }
}

impl SourceImporter for EpaImporter {
    fn name(&self) -> &str {
        NAME
    }

    fn requires(&self) -> Vec<String> {
        vec![crate::hetionet::NAME.to_string(), crate::ctd::NAME.to_string()]
    }

    fn fetch_raw_data(&mut self) -> Result<()> {
        self.loaded = Loaded {
            dsstox: Some(self.read(
                &self.files.dsstox,
                &["casrn", "preferred_name", "dsstox_substance_id"],
            )?),
            pubchem: self.read_optional(self.files.pubchem.as_ref(), &["DTXSID"])?,
            lists: self.read_optional(self.files.lists.as_ref(), &["LIST_ACRONYM"])?,
            list_members: self
                .read_optional(self.files.list_members.as_ref(), &["list_acronym", "casrn"])?,
        };
        Ok(())
    }

    fn parse(&mut self, ctx: &mut BuildContext<'_>) -> Result<()> {
        let loaded = std::mem::take(&mut self.loaded);
        let Some(dsstox) = loaded.dsstox else {
            bail!("{NAME}: parse called before fetch_raw_data");
        };
        self.parse_dsstox(ctx, &dsstox)?;
        if let Some(pubchem) = loaded.pubchem {
            self.parse_pubchem(ctx, &pubchem)?;
        }
        if let Some(lists) = loaded.lists {
            self.parse_lists(ctx, &lists)?;
        }
        if let Some(members) = loaded.list_members {
            self.link_list_members(ctx, &members)?;
        }
        Ok(())
    }
}
