//! Tab-separated feature tables for downstream ML tooling.
//!
//! ```text
//!   nodes.tsv      id  key  labels  <prop>...
//!   edges.tsv      source  type  target            (local keys)
//!   incidence.tsv  key  <column key>...            0/1 per (row, column)
//! ```
//!
//! Multi-valued properties are written `|`-joined; labels likewise.

use anyhow::{Context, Result};
use comptox_graphdb::algo::{bipartite_projection, Bipartite};
use comptox_graphdb::{GraphDb, NodeId};
use std::fs::File;
use std::io::Write;
use std::path::Path;

fn tsv_writer<W: Write>(out: W) -> csv::Writer<W> {
    csv::WriterBuilder::new()
        .delimiter(b'\t')
        .quote_style(csv::QuoteStyle::Necessary)
        .from_writer(out)
}

fn create(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    File::create(path).with_context(|| format!("failed to create {}", path.display()))
}

/// One row per node (restricted to `label` when given). Returns the number of
/// rows written.
pub fn write_node_table<W: Write>(
    db: &GraphDb,
    label: Option<&str>,
    properties: &[String],
    out: W,
) -> Result<usize> {
    let mut writer = tsv_writer(out);
    let mut header = vec!["id".to_string(), "key".to_string(), "labels".to_string()];
    header.extend(properties.iter().cloned());
    writer.write_record(&header)?;

    let ids: Vec<NodeId> = match label {
        Some(label) => db.nodes_with_label(label).iter().collect(),
        None => db.node_ids().collect(),
    };
    let mut written = 0;
    for id in ids {
        let Some(node) = db.node(id) else { continue };
        let mut record = vec![node.id.to_string(), node.key, node.labels.join("|")];
        for prop in properties {
            record.push(match node.properties.get(prop) {
                Some(slot) => slot
                    .values()
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join("|"),
                None => String::new(),
            });
        }
        writer.write_record(&record)?;
        written += 1;
    }
    writer.flush()?;
    Ok(written)
}

/// One row per edge (restricted to `rel_type` when given).
pub fn write_edge_list<W: Write>(db: &GraphDb, rel_type: Option<&str>, out: W) -> Result<usize> {
    let mut writer = tsv_writer(out);
    writer.write_record(["source", "type", "target"])?;
    let ids: Vec<u32> = match rel_type {
        Some(t) => db.edges_of_type(t).iter().collect(),
        None => db.edge_ids().collect(),
    };
    let mut written = 0;
    for id in ids {
        let Some((source, ty, target)) = db.edge_endpoints(id) else {
            continue;
        };
        let (Some(source), Some(target)) = (db.node(source), db.node(target)) else {
            continue;
        };
        writer.write_record([source.key.as_str(), ty.as_str(), target.key.as_str()])?;
        written += 1;
    }
    writer.flush()?;
    Ok(written)
}

/// Dense 0/1 matrix of `rel_type` edges from `row_label` nodes to
/// `column_label` nodes, headed by local keys.
pub fn write_incidence<W: Write>(
    db: &GraphDb,
    row_label: &str,
    rel_type: &str,
    column_label: &str,
    out: W,
) -> Result<Bipartite> {
    let projection = bipartite_projection(db, row_label, rel_type, column_label);
    let key = |id: NodeId| db.node(id).map(|n| n.key).unwrap_or_default();

    let mut writer = tsv_writer(out);
    let mut header = vec!["key".to_string()];
    header.extend(projection.columns.iter().map(|&c| key(c)));
    writer.write_record(&header)?;

    let mut edges = projection.edges.iter().peekable();
    for (r, &row) in projection.rows.iter().enumerate() {
        let mut cells = vec!["0".to_string(); projection.columns.len()];
        while let Some(&&(er, c)) = edges.peek() {
            if er != r {
                break;
            }
            cells[c] = "1".to_string();
            edges.next();
        }
        let mut record = vec![key(row)];
        record.extend(cells);
        writer.write_record(&record)?;
    }
    writer.flush()?;
    tracing::debug!(
        rows = projection.rows.len(),
        columns = projection.columns.len(),
        ones = projection.edges.len(),
        "incidence matrix written"
    );
    Ok(projection)
}

pub fn export_node_table(
    db: &GraphDb,
    label: Option<&str>,
    properties: &[String],
    path: &Path,
) -> Result<usize> {
    write_node_table(db, label, properties, create(path)?)
        .with_context(|| format!("failed to write node table {}", path.display()))
}

pub fn export_edge_list(db: &GraphDb, rel_type: Option<&str>, path: &Path) -> Result<usize> {
    write_edge_list(db, rel_type, create(path)?)
        .with_context(|| format!("failed to write edge list {}", path.display()))
}

pub fn export_incidence(
    db: &GraphDb,
    row_label: &str,
    rel_type: &str,
    column_label: &str,
    path: &Path,
) -> Result<Bipartite> {
    write_incidence(db, row_label, rel_type, column_label, create(path)?)
        .with_context(|| format!("failed to write incidence matrix {}", path.display()))
}
