//! Read-side graph algorithms over a built [`GraphDb`].
//!
//! None of these mutate the store. Results are deterministic: ties are broken
//! by ascending node id and sampling takes an explicit seed.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use roaring::RoaringBitmap;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};

use crate::{EdgeId, GraphDb, GraphStore, NodeId};

// ============================================================================
// Shortest path
// ============================================================================

/// Undirected shortest path between two nodes by breadth-first search.
///
/// Returns the node sequence including both endpoints, or `None` when no path
/// of at most `max_depth` edges exists.
pub fn shortest_path(
    db: &GraphDb,
    from: NodeId,
    to: NodeId,
    max_depth: Option<usize>,
) -> Option<Vec<NodeId>> {
    if from as usize >= db.node_count() || to as usize >= db.node_count() {
        return None;
    }
    if from == to {
        return Some(vec![from]);
    }

    let mut parent: HashMap<NodeId, NodeId> = HashMap::new();
    let mut depth: HashMap<NodeId, usize> = HashMap::from([(from, 0)]);
    let mut queue = VecDeque::from([from]);

    while let Some(node) = queue.pop_front() {
        let d = depth[&node];
        if max_depth.is_some_and(|m| d >= m) {
            continue;
        }
        for next in db.neighbors(node) {
            if depth.contains_key(&next) {
                continue;
            }
            depth.insert(next, d + 1);
            parent.insert(next, node);
            if next == to {
                let mut path = vec![to];
                let mut cur = to;
                while let Some(&p) = parent.get(&cur) {
                    path.push(p);
                    cur = p;
                }
                path.reverse();
                return Some(path);
            }
            queue.push_back(next);
        }
    }
    None
}

// ============================================================================
// Centrality
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PageRankConfig {
    pub damping: f64,
    pub max_iterations: usize,
    pub tolerance: f64,
    /// Rank only nodes carrying this label (and edges between them).
    pub label: Option<String>,
}

impl Default for PageRankConfig {
    fn default() -> Self {
        Self {
            damping: 0.85,
            max_iterations: 100,
            tolerance: 1e-6,
            label: None,
        }
    }
}

/// PageRank over directed edges, sorted by descending score.
///
/// Mass from nodes without out-edges is spread uniformly.
pub fn pagerank(db: &GraphDb, config: &PageRankConfig) -> Vec<(NodeId, f64)> {
    let members: RoaringBitmap = match &config.label {
        Some(label) => db.nodes_with_label(label),
        None => db.node_ids().collect(),
    };
    let nodes: Vec<NodeId> = members.iter().collect();
    let n = nodes.len();
    if n == 0 {
        return vec![];
    }
    let pos: HashMap<NodeId, usize> = nodes.iter().enumerate().map(|(i, &v)| (v, i)).collect();

    let out: Vec<Vec<usize>> = nodes
        .iter()
        .map(|&v| {
            db.out_neighbors(v)
                .into_iter()
                .filter_map(|t| pos.get(&t).copied())
                .collect()
        })
        .collect();

    let nf = n as f64;
    let mut rank = vec![1.0 / nf; n];
    for iteration in 0..config.max_iterations {
        let dangling: f64 = (0..n).filter(|&i| out[i].is_empty()).map(|i| rank[i]).sum();
        let base = (1.0 - config.damping) / nf + config.damping * dangling / nf;
        let mut next = vec![base; n];
        for (i, targets) in out.iter().enumerate() {
            if targets.is_empty() {
                continue;
            }
            let share = config.damping * rank[i] / targets.len() as f64;
            for &t in targets {
                next[t] += share;
            }
        }
        let delta: f64 = next.iter().zip(&rank).map(|(a, b)| (a - b).abs()).sum();
        rank = next;
        if delta < config.tolerance {
            tracing::debug!(iteration, delta, "pagerank converged");
            break;
        }
    }

    let mut scored: Vec<(NodeId, f64)> = nodes.into_iter().zip(rank).collect();
    scored.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
    scored
}

/// Total degree (in + out edges), descending.
pub fn degree_centrality(db: &GraphDb, label: Option<&str>) -> Vec<(NodeId, usize)> {
    let members: Vec<NodeId> = match label {
        Some(label) => db.nodes_with_label(label).iter().collect(),
        None => db.node_ids().collect(),
    };
    let mut scored: Vec<(NodeId, usize)> = members
        .into_iter()
        .map(|v| (v, db.outgoing(v).len() + db.incoming(v).len()))
        .collect();
    scored.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
    scored
}

// ============================================================================
// Subgraphs
// ============================================================================

/// A node set plus the edges of the store that lie inside it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Subgraph {
    pub nodes: RoaringBitmap,
    pub edges: Vec<EdgeId>,
}

impl Subgraph {
    fn induced(db: &GraphDb, nodes: RoaringBitmap) -> Self {
        let mut edges: Vec<EdgeId> = nodes
            .iter()
            .flat_map(|v| db.outgoing(v).iter().copied())
            .filter(|&e| {
                db.edge_endpoints(e)
                    .is_some_and(|(_, _, t)| nodes.contains(t))
            })
            .collect();
        edges.sort_unstable();
        Self { nodes, edges }
    }
}

/// Every node within `hops` undirected steps of a seed.
pub fn neighborhood(db: &GraphDb, seeds: &[NodeId], hops: usize) -> Subgraph {
    let mut seen = RoaringBitmap::new();
    let mut frontier: Vec<NodeId> = Vec::new();
    for &s in seeds {
        if (s as usize) < db.node_count() && seen.insert(s) {
            frontier.push(s);
        }
    }
    for _ in 0..hops {
        let mut next = Vec::new();
        for v in frontier {
            for w in db.neighbors(v) {
                if seen.insert(w) {
                    next.push(w);
                }
            }
        }
        if next.is_empty() {
            break;
        }
        frontier = next;
    }
    Subgraph::induced(db, seen)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ForestFireConfig {
    /// Fraction of the graph's nodes to sample, in `(0, 1]`.
    pub sample_fraction: f64,
    pub forward_probability: f64,
    pub backward_probability: f64,
    pub seed: u64,
}

impl Default for ForestFireConfig {
    fn default() -> Self {
        Self {
            sample_fraction: 0.17,
            forward_probability: 0.35,
            backward_probability: 0.20,
            seed: 0,
        }
    }
}

/// NaN burns nothing.
fn burn_probability(p: f64) -> f64 {
    if p.is_nan() {
        0.0
    } else {
        p.clamp(0.0, 1.0)
    }
}

/// Forest-fire sampling.
///
/// A fire starts at a random unburned node and spreads along each out-edge
/// with `forward_probability` and each in-edge with `backward_probability`.
/// When a fire dies out before the target size is reached, a new one starts.
pub fn forest_fire_sample(db: &GraphDb, config: &ForestFireConfig) -> Subgraph {
    let n = db.node_count();
    let fraction = config.sample_fraction.clamp(0.0, 1.0);
    let target = ((n as f64) * fraction).ceil() as usize;
    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut burned = RoaringBitmap::new();

    let mut unburned: Vec<NodeId> = db.node_ids().collect();
    unburned.shuffle(&mut rng);

    while (burned.len() as usize) < target {
        let Some(start) = unburned.pop() else {
            break;
        };
        if !burned.insert(start) {
            continue;
        }
        let mut queue = VecDeque::from([start]);
        while let Some(v) = queue.pop_front() {
            if burned.len() as usize >= target {
                break;
            }
            let forward = db.out_neighbors(v).into_iter().map(|w| (w, config.forward_probability));
            let backward = db.in_neighbors(v).into_iter().map(|w| (w, config.backward_probability));
            for (w, p) in forward.chain(backward) {
                if burned.len() as usize >= target {
                    break;
                }
                if !burned.contains(w) && rng.gen_bool(burn_probability(p)) {
                    burned.insert(w);
                    queue.push_back(w);
                }
            }
        }
    }

    Subgraph::induced(db, burned)
}

// ============================================================================
// Bipartite projection
// ============================================================================

/// Nodes of two labels and the `rel_type` edges running from the first set to
/// the second, as row/column positions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Bipartite {
    pub rows: Vec<NodeId>,
    pub columns: Vec<NodeId>,
    pub edges: Vec<(usize, usize)>,
}

pub fn bipartite_projection(
    db: &GraphDb,
    row_label: &str,
    rel_type: &str,
    column_label: &str,
) -> Bipartite {
    let rows: Vec<NodeId> = db.nodes_with_label(row_label).iter().collect();
    let columns: Vec<NodeId> = db.nodes_with_label(column_label).iter().collect();
    let col_pos: HashMap<NodeId, usize> =
        columns.iter().enumerate().map(|(i, &v)| (v, i)).collect();

    let mut edges = Vec::new();
    for (r, &v) in rows.iter().enumerate() {
        for &e in db.outgoing(v) {
            let Some((_, ty, t)) = db.edge_endpoints(e) else {
                continue;
            };
            if ty != rel_type {
                continue;
            }
            if let Some(&c) = col_pos.get(&t) {
                edges.push((r, c));
            }
        }
    }
    edges.sort_unstable();
    edges.dedup();

    Bipartite {
        rows,
        columns,
        edges,
    }
}
