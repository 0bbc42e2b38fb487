//! AOP-Wiki: adverse outcome pathways and their key events.
//!
//! Key-event rows are dispatched on their type column. The same event can be
//! listed as a KeyEvent in one AOP and as a MolecularInitiatingEvent in
//! another; the second sighting adds its label to the existing node.

use anyhow::{bail, Result};
use comptox_build::{
    BuildContext, BuildError, LinkRequest, Linker, MatchKey, NodeMerger, NodeRecord,
    SourceImporter,
};
use comptox_graphdb::{EdgeProperties, Value};
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

use crate::ids::after_last;
use crate::json::{read_json_array, AopEntry};
use crate::table::{Table, TableSpec};

pub const NAME: &str = "aopwiki";
pub const KEY_EVENTS_FILE: &str = "aop_ke_mie_ao.tsv";
pub const RELATIONSHIPS_FILE: &str = "aop_ke_ker.tsv";
pub const COMPONENTS_FILE: &str = "aop_ke_ec.tsv";
pub const AOPS_FILE: &str = "aops.json";

const KEY_EVENT_COLUMNS: [&str; 4] = ["aop_id", "key_event_id", "key_event_type", "key_event_name"];
const RELATIONSHIP_COLUMNS: [&str; 7] = [
    "aop_id",
    "upstream_event_id",
    "downstream_event_id",
    "relationship_id",
    "direct_or_indirect",
    "evidence",
    "quantitative_understanding",
];
const COMPONENT_COLUMNS: [&str; 9] = [
    "aop_id",
    "key_event_id",
    "action",
    "object_source",
    "object_ontology_id",
    "object_term",
    "process_source",
    "process_ontology_id",
    "process_term",
];

/// Entity type and AOP membership relationship for each key-event tag.
fn dispatch(tag: &str) -> Option<(&'static str, &'static str)> {
    match tag {
        "MolecularInitiatingEvent" => Some(("MolecularInitiatingEvent", "aopHasMIE")),
        "KeyEvent" => Some(("KeyEvent", "aopContainsKE")),
        "AdverseOutcome" => Some(("AdverseOutcome", "aopCausesAO")),
        _ => None,
    }
}

fn event_key(id: &str) -> MatchKey {
    MatchKey::new("keyEventID", id).with_label("KeyEvent")
}

fn aop_key(id: &str) -> MatchKey {
    MatchKey::new("xrefAOPWiki", id).with_label("AOP")
}

#[derive(Default)]
struct Loaded {
    key_events: Option<Table>,
    relationships: Option<Table>,
    components: Option<Table>,
    aops: HashMap<String, AopEntry>,
}

pub struct AopWikiImporter {
    dir: PathBuf,
    loaded: Loaded,
}

impl AopWikiImporter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            loaded: Loaded::default(),
        }
    }

    fn read(&self, file: &str, columns: &[&str]) -> Result<Table> {
        Table::read(&self.dir.join(file), &TableSpec::tsv().given(columns.iter().copied()))
    }

    /// Key events, their AOPs and membership edges. Returns the ids of every
    /// adverse outcome seen.
    fn parse_key_events(
        &self,
        ctx: &mut BuildContext<'_>,
        table: &Table,
        aops: &HashMap<String, AopEntry>,
    ) -> Result<HashSet<String>> {
        let mut events = NodeMerger::new(NAME, ctx.ontology);
        let mut aop_nodes = NodeMerger::new(NAME, ctx.ontology);
        let linker = Linker::new(NAME, ctx.ontology);
        let mut aops_done: HashSet<String> = HashSet::new();
        let mut adverse_outcomes = HashSet::new();

        for row in table.rows() {
            ctx.checkpoint()?;
            ctx.stats.rows_read += 1;

            let Some(tag) = row.get("key_event_type") else {
                ctx.stats.missing_field += 1;
                tracing::warn!(importer = NAME, line = row.line(), "key event without a type");
                continue;
            };
            let Some((entity_type, membership)) = dispatch(tag) else {
                return Err(BuildError::UnknownDiscriminator {
                    importer: NAME.to_string(),
                    field: "key_event_type".to_string(),
                    value: tag.to_string(),
                    line: row.line(),
                }
                .into());
            };
            let (Some(event_id), Some(name)) = (row.get("key_event_id"), row.get("key_event_name")) else {
                ctx.stats.missing_field += 1;
                tracing::warn!(importer = NAME, line = row.line(), "key event without id or name");
                continue;
            };

            let record = NodeRecord::new(entity_type, name)
                .at_line(row.line())
                .match_on(event_key(event_id))
                .with("keyEventID", event_id)
                .on_create("commonName", name)
                .reclassify();
            ctx.merge(&mut events, record)?;
            if entity_type == "AdverseOutcome" {
                adverse_outcomes.insert(event_id.to_string());
            }

            // The event row itself was merged above; only the membership is absent.
            let Some(aop_id) = row.get("aop_id") else {
                tracing::debug!(importer = NAME, line = row.line(), "key event outside any AOP");
                continue;
            };
            let Some(entry) = aops.get(after_last(aop_id, ':')) else {
                ctx.stats.filtered += 1;
                tracing::debug!(importer = NAME, aop = aop_id, "obsolete AOP, membership skipped");
                continue;
            };
            if aops_done.insert(aop_id.to_string()) {
                let record = NodeRecord::new("AOP", entry.title.as_str())
                    .at_line(row.line())
                    .match_on(aop_key(aop_id))
                    .with("xrefAOPWiki", aop_id)
                    .on_create("commonName", entry.title.as_str())
                    .with_opt("aopShortName", entry.short_name.as_deref());
                ctx.merge(&mut aop_nodes, record)?;
            }
            ctx.link(
                &linker,
                &LinkRequest::new(aop_key(aop_id), membership, event_key(event_id)),
            )?;
        }
        Ok(adverse_outcomes)
    }

    fn parse_relationships(&self, ctx: &mut BuildContext<'_>, table: &Table) -> Result<()> {
        let linker = Linker::new(NAME, ctx.ontology);
        let mut seen: HashSet<&str> = HashSet::new();
        for row in table.rows() {
            ctx.checkpoint()?;
            ctx.stats.rows_read += 1;
            let (Some(upstream), Some(downstream)) =
                (row.get("upstream_event_id"), row.get("downstream_event_id"))
            else {
                ctx.stats.missing_field += 1;
                continue;
            };
            // A relationship is listed once per AOP that uses it.
            if let Some(rel_id) = row.get("relationship_id") {
                if !seen.insert(rel_id) {
                    ctx.stats.duplicates_in_run += 1;
                    continue;
                }
            }

            let mut properties = EdgeProperties::new();
            for (column, property) in [
                ("direct_or_indirect", "adjacency"),
                ("evidence", "evidence"),
                ("quantitative_understanding", "quantitativeUnderstanding"),
            ] {
                if let Some(v) = row.get(column) {
                    properties.insert(property.to_string(), Value::from(v));
                }
            }
            let request = LinkRequest::new(event_key(upstream), "keyEventTriggers", event_key(downstream))
                .with_inverse("keyEventTriggeredBy")
                .with_properties(properties);
            ctx.link(&linker, &request)?;
        }
        Ok(())
    }

    /// Adverse outcomes link to every disease named by a MeSH object or
    /// process term of their event components.
    fn parse_components(
        &self,
        ctx: &mut BuildContext<'_>,
        table: &Table,
        adverse_outcomes: &HashSet<String>,
    ) -> Result<()> {
        let linker = Linker::new(NAME, ctx.ontology);
        for row in table.rows() {
            ctx.checkpoint()?;
            ctx.stats.rows_read += 1;
            let Some(event_id) = row.get("key_event_id") else {
                ctx.stats.missing_field += 1;
                continue;
            };
            let diseases: Vec<MatchKey> = [
                ("object_source", "object_ontology_id"),
                ("process_source", "process_ontology_id"),
            ]
            .into_iter()
            .filter(|(source, _)| row.get(source).is_some_and(|s| s.eq_ignore_ascii_case("MESH")))
            .filter_map(|(_, id)| row.get(id))
            .map(|id| MatchKey::new("xrefMeSH", after_last(id, ':')).with_label("Disease"))
            .collect();

            if !adverse_outcomes.contains(event_id) || diseases.is_empty() {
                ctx.stats.filtered += 1;
                continue;
            }
            let subject = [MatchKey::new("keyEventID", event_id).with_label("AdverseOutcome")];
            linker.link_compound(
                &mut *ctx.store,
                &subject,
                "aoManifestedAsDisease",
                &diseases,
                None,
                &EdgeProperties::new(),
                &mut *ctx.stats,
            )?;
        }
        Ok(())
    }
}

impl SourceImporter for AopWikiImporter {
    fn name(&self) -> &str {
        NAME
    }

    /// Adverse outcomes link to diseases by MeSH id, which CTD provides.
    fn requires(&self) -> Vec<String> {
        vec![crate::ctd::NAME.to_string()]
    }

    fn fetch_raw_data(&mut self) -> Result<()> {
        let aops: Vec<AopEntry> = read_json_array(&self.dir.join(AOPS_FILE))?;
        self.loaded = Loaded {
            key_events: Some(self.read(KEY_EVENTS_FILE, &KEY_EVENT_COLUMNS)?),
            relationships: Some(self.read(RELATIONSHIPS_FILE, &RELATIONSHIP_COLUMNS)?),
            components: Some(self.read(COMPONENTS_FILE, &COMPONENT_COLUMNS)?),
            aops: aops.into_iter().map(|a| (a.id.text(), a)).collect(),
        };
        tracing::info!(importer = NAME, aops = self.loaded.aops.len(), "aop-wiki loaded");
        Ok(())
    }

    fn parse(&mut self, ctx: &mut BuildContext<'_>) -> Result<()> {
        let loaded = std::mem::take(&mut self.loaded);
        let (Some(key_events), Some(relationships), Some(components)) =
            (loaded.key_events, loaded.relationships, loaded.components)
        else {
            bail!("{NAME}: parse called before fetch_raw_data");
        };
        let adverse_outcomes = self.parse_key_events(ctx, &key_events, &loaded.aops)?;
        self.parse_relationships(ctx, &relationships)?;
        self.parse_components(ctx, &components, &adverse_outcomes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dispatch_covers_event_types() {
        let ont = comptox_ontology::Ontology::comptox().unwrap();
        for tag in ["MolecularInitiatingEvent", "KeyEvent", "AdverseOutcome"] {
            let (entity_type, membership) = dispatch(tag).unwrap();
            assert!(ont.is_a(entity_type, "KeyEvent"));
            assert_eq!(ont.relationship(membership).unwrap().object, entity_type);
        }
        assert!(dispatch("Stressor").is_none());
    }
}
