//! Table importers described in configuration instead of code.
//!
//! A node table maps a name column, match columns and property columns onto
//! one entity type:
//!
//! ```json
//! { "name": "maccs", "file": "epa/maccs.tsv",
//!   "mapping": { "table": "nodes", "entity_type": "Chemical",
//!                "name_column": "DTXSID", "match_columns": ["DTXSID"],
//!                "properties": { "DTXSID": "xrefDTXSID", "MACCS": "maccs" },
//!                "create_if_missing": false } }
//! ```
//!
//! A relationship table maps a subject column and an object column onto one
//! relationship type (and optionally its inverse).

use anyhow::{bail, Result};
use comptox_build::{
    split_compound, BuildContext, Linker, MatchKey, NodeMerger, NodeRecord, SourceImporter,
};
use comptox_graphdb::{EdgeProperties, Value};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::ids::after_last;
use crate::table::{HeaderMode, Row, Table, TableSpec};

fn yes() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableSourceConfig {
    pub name: String,
    pub file: PathBuf,
    /// Defaults to tab for `.tsv`/`.txt`/`.sif`, comma otherwise.
    #[serde(default)]
    pub delimiter: Option<char>,
    /// Column names for a headerless file.
    #[serde(default)]
    pub columns: Option<Vec<String>>,
    /// Header is a commented `# Fields:` line (CTD layout).
    #[serde(default)]
    pub commented_header: bool,
    pub mapping: TableMapping,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "table", rename_all = "snake_case")]
pub enum TableMapping {
    Nodes(NodeMapping),
    Relationships(RelationshipMapping),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeMapping {
    pub entity_type: String,
    pub name_column: String,
    /// Columns tried together through `resolve_any`; each must also appear
    /// in `properties`.
    #[serde(default)]
    pub match_columns: Vec<String>,
    /// Column → property.
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
    /// Split property cells into several values.
    #[serde(default)]
    pub list_delimiter: Option<char>,
    /// Column → delimiter; keep only the text after the last delimiter.
    #[serde(default)]
    pub split_last: BTreeMap<String, char>,
    #[serde(default = "yes")]
    pub create_if_missing: bool,
    #[serde(default)]
    pub labels: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndpointColumn {
    pub column: String,
    pub property: String,
    #[serde(default)]
    pub label: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationshipMapping {
    pub relationship: String,
    #[serde(default)]
    pub inverse: Option<String>,
    pub subject: EndpointColumn,
    pub object: EndpointColumn,
    /// Several identifiers in one endpoint cell.
    #[serde(default)]
    pub compound_delimiter: Option<char>,
    /// Column → edge property.
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
}

pub struct TableImporter {
    config: TableSourceConfig,
    table: Option<Table>,
}

impl TableImporter {
    /// Fails when a match column has no property mapping.
    pub fn new(config: TableSourceConfig) -> Result<Self> {
        if let TableMapping::Nodes(nodes) = &config.mapping {
            if let Some(c) = nodes
                .match_columns
                .iter()
                .find(|c| !nodes.properties.contains_key(*c))
            {
                bail!(
                    "table source `{}`: match column `{c}` has no property mapping",
                    config.name
                );
            }
        }
        Ok(Self {
            config,
            table: None,
        })
    }

    fn spec(&self) -> TableSpec {
        let mut spec = TableSpec::for_path(&self.config.file);
        if let Some(d) = self.config.delimiter {
            spec.delimiter = d as u8;
        }
        if let Some(columns) = &self.config.columns {
            spec.header = HeaderMode::Given(columns.clone());
        } else if self.config.commented_header {
            spec.header = HeaderMode::CommentedFields;
        }
        spec
    }

    fn required_columns(&self) -> Vec<&str> {
        match &self.config.mapping {
            TableMapping::Nodes(m) => std::iter::once(m.name_column.as_str())
                .chain(m.properties.keys().map(String::as_str))
                .collect(),
            TableMapping::Relationships(m) => [m.subject.column.as_str(), m.object.column.as_str()]
                .into_iter()
                .chain(m.properties.keys().map(String::as_str))
                .collect(),
        }
    }

    fn parse_nodes(&self, ctx: &mut BuildContext<'_>, table: &Table, mapping: &NodeMapping) -> Result<()> {
        let name = self.config.name.as_str();
        let mut merger = NodeMerger::new(name, ctx.ontology);
        let cell = |row: &Row, column: &str| -> Option<String> {
            let raw = row.get(column)?;
            Some(match mapping.split_last.get(column) {
                Some(&d) => after_last(raw, d).to_string(),
                None => raw.to_string(),
            })
        };
        // List cells are split before the split-last transform sees each element.
        let values = |row: &Row, column: &str| -> Vec<String> {
            let Some(raw) = row.get(column) else {
                return Vec::new();
            };
            let items = match mapping.list_delimiter {
                Some(d) => split_compound(raw, d),
                None => vec![raw.to_string()],
            };
            match mapping.split_last.get(column) {
                Some(&d) => items.iter().map(|v| after_last(v, d).to_string()).collect(),
                None => items,
            }
        };

        for row in table.rows() {
            ctx.checkpoint()?;
            ctx.stats.rows_read += 1;
            let Some(entity_name) = cell(row, mapping.name_column.as_str()) else {
                ctx.stats.missing_field += 1;
                tracing::warn!(importer = name, line = row.line(), column = %mapping.name_column, "row without a name");
                continue;
            };

            let mut record = NodeRecord::new(mapping.entity_type.as_str(), entity_name).at_line(row.line());
            for column in &mapping.match_columns {
                let property = &mapping.properties[column];
                for value in values(row, column.as_str()) {
                    record = record.match_on(
                        MatchKey::new(property.as_str(), value).with_label(mapping.entity_type.as_str()),
                    );
                }
            }
            if !mapping.match_columns.is_empty() && record.match_keys.is_empty() {
                ctx.stats.missing_field += 1;
                tracing::warn!(importer = name, line = row.line(), "row without any match column");
                continue;
            }
            for (column, property) in &mapping.properties {
                for value in values(row, column.as_str()) {
                    record = record.with(property.as_str(), value);
                }
            }
            for label in &mapping.labels {
                record = record.label(label.as_str());
            }
            if !mapping.create_if_missing {
                record = record.merge_only();
            }
            ctx.merge(&mut merger, record)?;
        }
        Ok(())
    }

    fn parse_relationships(
        &self,
        ctx: &mut BuildContext<'_>,
        table: &Table,
        mapping: &RelationshipMapping,
    ) -> Result<()> {
        let name = self.config.name.as_str();
        let linker = Linker::new(name, ctx.ontology);
        let keys = |cell: &str, endpoint: &EndpointColumn| -> Vec<MatchKey> {
            let ids = match mapping.compound_delimiter {
                Some(d) => split_compound(cell, d),
                None => vec![cell.to_string()],
            };
            ids.into_iter()
                .map(|id| {
                    let key = MatchKey::new(endpoint.property.as_str(), id);
                    match &endpoint.label {
                        Some(label) => key.with_label(label.as_str()),
                        None => key,
                    }
                })
                .collect()
        };

        for row in table.rows() {
            ctx.checkpoint()?;
            ctx.stats.rows_read += 1;
            let (Some(subject), Some(object)) =
                (row.get(&mapping.subject.column), row.get(&mapping.object.column))
            else {
                ctx.stats.missing_field += 1;
                continue;
            };
            let properties: EdgeProperties = mapping
                .properties
                .iter()
                .filter_map(|(column, property)| Some((property.clone(), Value::from(row.get(column)?))))
                .collect();
            linker.link_compound(
                &mut *ctx.store,
                &keys(subject, &mapping.subject),
                &mapping.relationship,
                &keys(object, &mapping.object),
                mapping.inverse.as_deref(),
                &properties,
                &mut *ctx.stats,
            )?;
        }
        Ok(())
    }
}

impl SourceImporter for TableImporter {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn fetch_raw_data(&mut self) -> Result<()> {
        let table = Table::read(&self.config.file, &self.spec())?;
        table.require_columns(&self.required_columns())?;
        self.table = Some(table);
        Ok(())
    }

    fn parse(&mut self, ctx: &mut BuildContext<'_>) -> Result<()> {
        let Some(table) = self.table.take() else {
            bail!("{}: parse called before fetch_raw_data", self.config.name);
        };
        match &self.config.mapping {
            TableMapping::Nodes(m) => self.parse_nodes(ctx, &table, m),
            TableMapping::Relationships(m) => self.parse_relationships(ctx, &table, m),
        }
    }
}
