//! Read-only commands over a saved snapshot.

use anyhow::{anyhow, bail, Context, Result};
use colored::Colorize;
use comptox_graphdb::algo::{
    degree_centrality, forest_fire_sample, neighborhood, pagerank, shortest_path,
    ForestFireConfig, PageRankConfig, Subgraph,
};
use comptox_graphdb::{GraphDb, GraphStore, NodeId, NodeView, Value};
use comptox_ontology::Ontology;
use serde_json::json;
use std::path::{Path, PathBuf};

pub fn open(snapshot: &Path) -> Result<GraphDb> {
    GraphDb::load(snapshot).with_context(|| format!("failed to open snapshot {}", snapshot.display()))
}

fn node_id(db: &GraphDb, key: &str) -> Result<NodeId> {
    db.node_by_key(key)
        .ok_or_else(|| anyhow!("no node with key `{key}`"))
}

fn view(db: &GraphDb, id: NodeId) -> Result<NodeView> {
    db.node(id).ok_or_else(|| anyhow!("unknown node id {id}"))
}

fn view_json(node: &NodeView) -> serde_json::Value {
    let properties: serde_json::Map<String, serde_json::Value> = node
        .properties
        .iter()
        .map(|(name, slot)| (name.clone(), json!(slot.to_string())))
        .collect();
    json!({
        "id": node.id,
        "key": node.key,
        "labels": node.labels,
        "properties": properties,
    })
}

fn print_node(node: &NodeView) {
    println!("{} {}", node.key.bold(), format!("[{}]", node.labels.join(", ")).cyan());
    for (name, slot) in &node.properties {
        println!("    {name} = {slot}");
    }
}

// ============================================================================
// stats / find
// ============================================================================

pub fn cmd_stats(snapshot: &Path, as_json: bool) -> Result<()> {
    let db = open(snapshot)?;
    let labels = db.label_counts();
    let relationships = db.relationship_counts();
    if as_json {
        let out = json!({
            "nodes": db.node_count(),
            "edges": db.edge_count(),
            "labels": labels,
            "relationships": relationships,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }
    println!("{} {}", "nodes".bold(), db.node_count());
    for (label, n) in &labels {
        println!("    {label:<28} {n}");
    }
    println!("{} {}", "edges".bold(), db.edge_count());
    for (rel, n) in &relationships {
        println!("    {rel:<28} {n}");
    }
    Ok(())
}

/// Lookups are type-exact, so a bare `true` or `42` is also tried as a
/// boolean or integer.
fn candidate_values(text: &str) -> Vec<Value> {
    let mut values = vec![Value::from(text)];
    if let Ok(b) = text.parse::<bool>() {
        values.push(Value::Bool(b));
    }
    if let Ok(i) = text.parse::<i64>() {
        values.push(Value::Int(i));
    }
    values
}

pub fn cmd_find(
    snapshot: &Path,
    property: &str,
    value: &str,
    label: Option<&str>,
    as_json: bool,
) -> Result<()> {
    let db = open(snapshot)?;
    let mut ids: Vec<NodeId> = Vec::new();
    for v in candidate_values(value) {
        let hits = match label {
            Some(label) => db.find_nodes_with_label(label, property, &v),
            None => db.find_nodes(property, &v),
        };
        ids.extend(hits);
    }
    ids.sort_unstable();
    ids.dedup();

    let nodes = ids.into_iter().map(|id| view(&db, id)).collect::<Result<Vec<_>>>()?;
    if as_json {
        let out: Vec<_> = nodes.iter().map(view_json).collect();
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else if nodes.is_empty() {
        eprintln!("{} no node has {property} = {value}", "info:".yellow().bold());
    } else {
        nodes.iter().for_each(print_node);
    }
    Ok(())
}

// ============================================================================
// path / pagerank
// ============================================================================

/// `-rel->` or `<-rel-` for one step of an undirected path.
fn step(db: &GraphDb, a: NodeId, b: NodeId) -> String {
    let forward = db
        .outgoing(a)
        .iter()
        .filter_map(|&e| db.edge_endpoints(e))
        .find(|(_, _, t)| *t == b);
    if let Some((_, rel, _)) = forward {
        return format!("-{rel}->");
    }
    let backward = db
        .incoming(a)
        .iter()
        .filter_map(|&e| db.edge_endpoints(e))
        .find(|(s, _, _)| *s == b);
    match backward {
        Some((_, rel, _)) => format!("<-{rel}-"),
        None => "--".to_string(),
    }
}

pub fn cmd_path(snapshot: &Path, from: &str, to: &str, max_depth: Option<usize>) -> Result<()> {
    let db = open(snapshot)?;
    let (a, b) = (node_id(&db, from)?, node_id(&db, to)?);
    let Some(path) = shortest_path(&db, a, b, max_depth) else {
        bail!("no path between `{from}` and `{to}`");
    };
    let mut line = view(&db, path[0])?.key.bold().to_string();
    for pair in path.windows(2) {
        line.push_str(&format!(" {} {}", step(&db, pair[0], pair[1]).cyan(), view(&db, pair[1])?.key.bold()));
    }
    println!("{line}");
    eprintln!("{} {} hop(s)", "ok".green().bold(), path.len() - 1);
    Ok(())
}

pub struct RankArgs {
    pub label: Option<String>,
    pub top: usize,
    pub damping: Option<f64>,
    pub max_iterations: Option<usize>,
    pub degree: bool,
}

pub fn cmd_pagerank(snapshot: &Path, args: &RankArgs) -> Result<()> {
    let db = open(snapshot)?;
    let scored: Vec<(NodeId, String)> = if args.degree {
        degree_centrality(&db, args.label.as_deref())
            .into_iter()
            .map(|(id, d)| (id, d.to_string()))
            .collect()
    } else {
        let mut config = PageRankConfig {
            label: args.label.clone(),
            ..PageRankConfig::default()
        };
        if let Some(d) = args.damping {
            config.damping = d;
        }
        if let Some(n) = args.max_iterations {
            config.max_iterations = n;
        }
        pagerank(&db, &config)
            .into_iter()
            .map(|(id, score)| (id, format!("{score:.6}")))
            .collect()
    };
    for (rank, (id, score)) in scored.into_iter().take(args.top).enumerate() {
        println!("{:>4}  {score:>10}  {}", rank + 1, view(&db, id)?.key);
    }
    Ok(())
}

// ============================================================================
// subgraph / sample
// ============================================================================

fn save_subgraph(db: &GraphDb, subgraph: &Subgraph, out: &Path) -> Result<()> {
    let induced = db.induced_subgraph(&subgraph.nodes)?;
    induced.save(out)?;
    eprintln!(
        "{} {} (nodes={} edges={})",
        "wrote".green().bold(),
        out.display().to_string().bold(),
        induced.node_count(),
        induced.edge_count()
    );
    Ok(())
}

pub fn cmd_subgraph(snapshot: &Path, seeds: &[String], hops: usize, out: &Path) -> Result<()> {
    let db = open(snapshot)?;
    let ids = seeds
        .iter()
        .map(|k| node_id(&db, k))
        .collect::<Result<Vec<_>>>()?;
    save_subgraph(&db, &neighborhood(&db, &ids, hops), out)
}

fn check_sample_config(config: &ForestFireConfig) -> Result<()> {
    if !(config.sample_fraction > 0.0 && config.sample_fraction <= 1.0) {
        bail!("--fraction must be in (0, 1], got {}", config.sample_fraction);
    }
    for (flag, p) in [
        ("--forward", config.forward_probability),
        ("--backward", config.backward_probability),
    ] {
        if !(0.0..=1.0).contains(&p) {
            bail!("{flag} must be in [0, 1], got {p}");
        }
    }
    Ok(())
}

pub fn cmd_sample(snapshot: &Path, config: &ForestFireConfig, out: &Path) -> Result<()> {
    check_sample_config(config)?;
    let db = open(snapshot)?;
    save_subgraph(&db, &forest_fire_sample(&db, config), out)
}

// ============================================================================
// schema
// ============================================================================

/// Validate an ontology and, optionally, a snapshot against it.
pub fn cmd_schema(ontology: Option<&PathBuf>, snapshot: Option<&PathBuf>) -> Result<()> {
    let ontology = match ontology {
        Some(path) => Ontology::load(path)?,
        None => Ontology::comptox()?,
    };
    println!(
        "{} ontology {} ({} entity types, {} relationship types)",
        "ok".green().bold(),
        ontology.name.bold(),
        ontology.entity_types().count(),
        ontology.relationship_types().count()
    );
    let Some(snapshot) = snapshot else {
        return Ok(());
    };

    let db = open(snapshot)?;
    let undeclared_labels: Vec<String> = db
        .label_counts()
        .into_keys()
        .filter(|l| ontology.entity_type(l).is_none())
        .collect();
    let undeclared_relationships: Vec<String> = db
        .relationship_counts()
        .into_keys()
        .filter(|r| ontology.relationship(r).is_none())
        .collect();
    for label in &undeclared_labels {
        println!("{} undeclared label `{label}`", "error:".red().bold());
    }
    for rel in &undeclared_relationships {
        println!("{} undeclared relationship `{rel}`", "error:".red().bold());
    }
    if !undeclared_labels.is_empty() || !undeclared_relationships.is_empty() {
        bail!("{} does not conform to the ontology", snapshot.display());
    }
    println!("{} {} conforms", "ok".green().bold(), snapshot.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_literals_are_tried_with_their_types() {
        assert_eq!(
            candidate_values("true"),
            vec![Value::from("true"), Value::Bool(true)]
        );
        assert_eq!(candidate_values("42"), vec![Value::from("42"), Value::Int(42)]);
        assert_eq!(candidate_values("50-00-0"), vec![Value::from("50-00-0")]);
    }

    #[test]
    fn sample_probabilities_must_be_in_range() {
        assert!(check_sample_config(&ForestFireConfig::default()).is_ok());
        for bad in [f64::NAN, -0.1, 1.5] {
            let config = ForestFireConfig {
                forward_probability: bad,
                ..ForestFireConfig::default()
            };
            let err = check_sample_config(&config).unwrap_err();
            assert!(err.to_string().contains("--forward"), "{err}");
        }
        let config = ForestFireConfig {
            sample_fraction: f64::NAN,
            ..ForestFireConfig::default()
        };
        assert!(check_sample_config(&config).is_err());
    }
}
