//! Pipeline configuration.
//!
//! ```json
//! {
//!   "ontology": "comptox.ont",
//!   "snapshot": "out/comptox.graph",
//!   "sources": [
//!     { "kind": "hetionet", "dir": "data/hetionet" },
//!     { "kind": "ctd", "dir": "data/ctd", "drugbank_dir": "data/drugbank",
//!       "options": { "direct_evidence_only": true } },
//!     { "kind": "aop_wiki", "dir": "data/aopwiki" },
//!     { "kind": "epa", "dir": "data/epa", "requires": ["hetionet"] }
//!   ]
//! }
//! ```
//!
//! Relative paths are resolved against the directory holding the config file.

use anyhow::{Context, Result};
use comptox_build::{BuildContext, SourceImporter};
use comptox_ontology::Ontology;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::aopwiki::AopWikiImporter;
use crate::ctd::{CtdImporter, CtdOptions};
use crate::declarative::{TableImporter, TableSourceConfig};
use crate::epa::{EpaFiles, EpaImporter};
use crate::hetionet::HetionetImporter;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Replacement ontology file; the built-in ComptoxAI ontology otherwise.
    pub ontology: Option<PathBuf>,
    pub snapshot: PathBuf,
    pub report: PathBuf,
    pub sources: Vec<SourceEntry>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            ontology: None,
            snapshot: PathBuf::from("comptox.graph"),
            report: PathBuf::from("comptox-report.json"),
            sources: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceEntry {
    #[serde(flatten)]
    pub source: SourceConfig,
    /// Replaces the importer's own dependency list.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requires: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceConfig {
    Hetionet {
        dir: PathBuf,
    },
    Ctd {
        dir: PathBuf,
        #[serde(default)]
        drugbank_dir: Option<PathBuf>,
        #[serde(default)]
        options: CtdOptions,
    },
    AopWiki {
        dir: PathBuf,
    },
    Epa {
        dir: PathBuf,
        #[serde(default)]
        files: EpaFiles,
    },
    Table(TableSourceConfig),
}

fn rebase(base: &Path, path: &mut PathBuf) {
    if path.is_relative() {
        *path = base.join(&*path);
    }
}

impl PipelineConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let mut config: PipelineConfig = serde_json::from_str(&text)
            .with_context(|| format!("invalid config {}", path.display()))?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        config.resolve_paths(base);
        tracing::debug!(config = %path.display(), sources = config.sources.len(), "pipeline config loaded");
        Ok(config)
    }

    /// Make every relative path absolute against `base`.
    pub fn resolve_paths(&mut self, base: &Path) {
        if let Some(ontology) = &mut self.ontology {
            rebase(base, ontology);
        }
        rebase(base, &mut self.snapshot);
        rebase(base, &mut self.report);
        for entry in &mut self.sources {
            match &mut entry.source {
                SourceConfig::Hetionet { dir } | SourceConfig::AopWiki { dir } | SourceConfig::Epa { dir, .. } => {
                    rebase(base, dir)
                }
                SourceConfig::Ctd {
                    dir, drugbank_dir, ..
                } => {
                    rebase(base, dir);
                    if let Some(d) = drugbank_dir {
                        rebase(base, d);
                    }
                }
                SourceConfig::Table(table) => rebase(base, &mut table.file),
            }
        }
    }

    pub fn load_ontology(&self) -> Result<Ontology> {
        match &self.ontology {
            Some(path) => Ok(Ontology::load(path)?),
            None => Ok(Ontology::comptox()?),
        }
    }

    pub fn build_importers(&self) -> Result<Vec<Box<dyn SourceImporter>>> {
        self.sources.iter().map(SourceEntry::build).collect()
    }
}

impl SourceEntry {
    pub fn build(&self) -> Result<Box<dyn SourceImporter>> {
        let importer: Box<dyn SourceImporter> = match &self.source {
            SourceConfig::Hetionet { dir } => Box::new(HetionetImporter::new(dir)),
            SourceConfig::Ctd {
                dir,
                drugbank_dir,
                options,
            } => {
                let mut ctd = CtdImporter::new(dir).with_options(options.clone());
                if let Some(d) = drugbank_dir {
                    ctd = ctd.with_drugbank(d);
                }
                Box::new(ctd)
            }
            SourceConfig::AopWiki { dir } => Box::new(AopWikiImporter::new(dir)),
            SourceConfig::Epa { dir, files } => Box::new(EpaImporter::with_files(dir, files.clone())),
            SourceConfig::Table(table) => Box::new(TableImporter::new(table.clone())?),
        };
        Ok(match &self.requires {
            Some(requires) => Box::new(Requiring {
                inner: importer,
                requires: requires.clone(),
            }),
            None => importer,
        })
    }
}

/// An importer with its dependency list replaced.
struct Requiring {
    inner: Box<dyn SourceImporter>,
    requires: Vec<String>,
}

impl SourceImporter for Requiring {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn requires(&self) -> Vec<String> {
        self.requires.clone()
    }

    fn prepopulate(&mut self, ctx: &mut BuildContext<'_>) -> Result<()> {
        self.inner.prepopulate(ctx)
    }

    fn fetch_raw_data(&mut self) -> Result<()> {
        self.inner.fetch_raw_data()
    }

    fn parse(&mut self, ctx: &mut BuildContext<'_>) -> Result<()> {
        self.inner.parse(ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = r#"{
        "snapshot": "out/graph.bin",
        "sources": [
            { "kind": "hetionet", "dir": "hetionet" },
            { "kind": "ctd", "dir": "/abs/ctd", "options": { "direct_evidence_only": false } },
            { "kind": "epa", "dir": "epa", "requires": ["hetionet"],
              "files": { "lists": "lists.tsv" } }
        ]
    }"#;

    #[test]
    fn loads_with_defaults_and_rebased_paths() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pipeline.json");
        std::fs::write(&path, CONFIG).unwrap();

        let config = PipelineConfig::load(&path).unwrap();
        assert_eq!(config.snapshot, dir.path().join("out/graph.bin"));
        assert_eq!(config.report, dir.path().join("comptox-report.json"));
        assert_eq!(
            config.sources[0].source,
            SourceConfig::Hetionet {
                dir: dir.path().join("hetionet")
            }
        );
        match &config.sources[1].source {
            SourceConfig::Ctd { dir, options, .. } => {
                assert_eq!(dir, &PathBuf::from("/abs/ctd"));
                assert!(!options.direct_evidence_only);
                assert!(options.link_chemical_diseases);
            }
            other => panic!("expected ctd, got {other:?}"),
        }
        match &config.sources[2].source {
            SourceConfig::Epa { files, .. } => {
                assert_eq!(files.dsstox, "Dsstox_CAS_number_name.csv");
                assert_eq!(files.lists.as_deref(), Some("lists.tsv"));
            }
            other => panic!("expected epa, got {other:?}"),
        }
    }

    #[test]
    fn requires_override_replaces_dependencies() {
        let mut config: PipelineConfig = serde_json::from_str(CONFIG).unwrap();
        config.resolve_paths(Path::new("/data"));
        let importers = config.build_importers().unwrap();
        let names: Vec<&str> = importers.iter().map(|i| i.name()).collect();
        assert_eq!(names, vec!["hetionet", "ctd", "epa"]);
        assert_eq!(importers[1].requires(), vec!["hetionet"]);
        assert_eq!(importers[2].requires(), vec!["hetionet"]);
    }

    #[test]
    fn unknown_kind_is_rejected() {
        let err = serde_json::from_str::<PipelineConfig>(r#"{"sources": [{"kind": "tox21", "dir": "x"}]}"#);
        assert!(err.is_err());
    }
}
