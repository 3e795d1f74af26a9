use crate::memory::NodeId;
use crate::store::GraphStore;
use lazy_static::lazy_static;
use parking_lot::Mutex;
use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use rayon::prelude::*;
use repograph_core::{validate_identifier, NodeLabel, RelType, RepographError, Result};
use std::collections::{HashMap, HashSet, VecDeque};
use tracing::{debug, info};

lazy_static! {
    /// Named projections are process-wide resources; concurrent analyses
    /// must not reuse a live name. Registration fails on collision and the
    /// guard releases the name on drop.
    static ref PROJECTIONS: Mutex<HashSet<String>> = Mutex::new(HashSet::new());
}

/// An in-memory projection over one node label and relationship type.
pub struct Projection {
    name: String,
    pub graph: DiGraph<NodeId, ()>,
    pub index_of: HashMap<NodeId, NodeIndex>,
}

impl Projection {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn node_id(&self, index: NodeIndex) -> NodeId {
        self.graph[index]
    }
}

impl Drop for Projection {
    fn drop(&mut self) {
        PROJECTIONS.lock().remove(&self.name);
        debug!(projection = %self.name, "dropped graph projection");
    }
}

/// Wrappers over projected in-memory subgraphs for the analysis algorithms.
/// Lifecycle: create projection -> run -> read results -> drop projection;
/// `scoped` guarantees the drop on every exit path.
pub struct GraphAlgorithms<'a> {
    store: &'a GraphStore,
}

impl<'a> GraphAlgorithms<'a> {
    pub fn new(store: &'a GraphStore) -> Self {
        Self { store }
    }

    /// The embedded algorithm library is always linked; remote deployments
    /// would probe their plugin here.
    pub fn is_available(&self) -> bool {
        true
    }

    /// Create a named projection over `label` nodes connected by `rel_type`
    /// edges (both endpoints must carry the label).
    pub fn create_projection(
        &self,
        name: &str,
        label: NodeLabel,
        rel_type: RelType,
    ) -> Result<Projection> {
        validate_identifier(name, "projection name")?;

        {
            let mut registry = PROJECTIONS.lock();
            if !registry.insert(name.to_string()) {
                return Err(RepographError::Validation(format!(
                    "projection {name} already exists"
                )));
            }
        }

        let mut graph = DiGraph::new();
        let mut index_of = HashMap::new();
        for node in self.store.nodes_with_label(label) {
            let index = graph.add_node(node.id);
            index_of.insert(node.id, index);
        }
        let mut edges = 0usize;
        for rel in self.store.relationships(rel_type) {
            if let (Some(&s), Some(&t)) = (index_of.get(&rel.source), index_of.get(&rel.target)) {
                graph.add_edge(s, t, ());
                edges += 1;
            }
        }

        info!(
            projection = name,
            nodes = graph.node_count(),
            edges,
            "created graph projection"
        );

        Ok(Projection {
            name: name.to_string(),
            graph,
            index_of,
        })
    }

    /// Build a projection from explicit edges (used for derived graphs such
    /// as the file-level import graph).
    pub fn create_projection_from_edges(
        &self,
        name: &str,
        nodes: &[NodeId],
        edges: &[(NodeId, NodeId)],
    ) -> Result<Projection> {
        validate_identifier(name, "projection name")?;

        {
            let mut registry = PROJECTIONS.lock();
            if !registry.insert(name.to_string()) {
                return Err(RepographError::Validation(format!(
                    "projection {name} already exists"
                )));
            }
        }

        let mut graph = DiGraph::new();
        let mut index_of = HashMap::new();
        for &node in nodes {
            let index = graph.add_node(node);
            index_of.insert(node, index);
        }
        for &(s, t) in edges {
            if let (Some(&si), Some(&ti)) = (index_of.get(&s), index_of.get(&t)) {
                graph.add_edge(si, ti, ());
            }
        }

        Ok(Projection {
            name: name.to_string(),
            graph,
            index_of,
        })
    }

    /// Run `body` against a fresh projection, dropping it on every exit
    /// path.
    pub fn scoped<T>(
        &self,
        name: &str,
        label: NodeLabel,
        rel_type: RelType,
        body: impl FnOnce(&Projection) -> Result<T>,
    ) -> Result<T> {
        let projection = self.create_projection(name, label, rel_type)?;
        body(&projection)
    }
}

/// Strongly connected components; each component lists member node ids.
/// Components of size >= 2 are cycles in the projected relationship.
pub fn strongly_connected_components(projection: &Projection) -> Vec<Vec<NodeId>> {
    tarjan_scc(&projection.graph)
        .into_iter()
        .map(|component| component.into_iter().map(|i| projection.graph[i]).collect())
        .collect()
}

/// PageRank by power iteration (damping 0.85).
pub fn pagerank(projection: &Projection, iterations: usize) -> HashMap<NodeId, f64> {
    const DAMPING: f64 = 0.85;
    let n = projection.graph.node_count();
    if n == 0 {
        return HashMap::new();
    }

    let mut ranks = vec![1.0 / n as f64; n];
    let out_degree: Vec<usize> = projection
        .graph
        .node_indices()
        .map(|i| projection.graph.neighbors(i).count())
        .collect();

    for _ in 0..iterations {
        let mut next = vec![(1.0 - DAMPING) / n as f64; n];
        let mut dangling = 0.0;
        for i in projection.graph.node_indices() {
            let share = ranks[i.index()];
            if out_degree[i.index()] == 0 {
                dangling += share;
                continue;
            }
            let contribution = DAMPING * share / out_degree[i.index()] as f64;
            for neighbor in projection.graph.neighbors(i) {
                next[neighbor.index()] += contribution;
            }
        }
        let dangling_share = DAMPING * dangling / n as f64;
        for value in &mut next {
            *value += dangling_share;
        }
        ranks = next;
    }

    projection
        .graph
        .node_indices()
        .map(|i| (projection.graph[i], ranks[i.index()]))
        .collect()
}

/// Betweenness centrality via Brandes' algorithm; sources run in parallel.
pub fn betweenness_centrality(projection: &Projection) -> HashMap<NodeId, f64> {
    let n = projection.graph.node_count();
    if n == 0 {
        return HashMap::new();
    }

    let adjacency: Vec<Vec<usize>> = projection
        .graph
        .node_indices()
        .map(|i| projection.graph.neighbors(i).map(|j| j.index()).collect())
        .collect();

    let partials: Vec<Vec<f64>> = (0..n)
        .into_par_iter()
        .map(|source| {
            let mut centrality = vec![0.0; n];
            let mut stack = Vec::new();
            let mut predecessors: Vec<Vec<usize>> = vec![Vec::new(); n];
            let mut sigma = vec![0.0f64; n];
            let mut distance = vec![-1i64; n];
            sigma[source] = 1.0;
            distance[source] = 0;

            let mut queue = VecDeque::new();
            queue.push_back(source);
            while let Some(v) = queue.pop_front() {
                stack.push(v);
                for &w in &adjacency[v] {
                    if distance[w] < 0 {
                        distance[w] = distance[v] + 1;
                        queue.push_back(w);
                    }
                    if distance[w] == distance[v] + 1 {
                        sigma[w] += sigma[v];
                        predecessors[w].push(v);
                    }
                }
            }

            let mut delta = vec![0.0f64; n];
            while let Some(w) = stack.pop() {
                for &v in &predecessors[w] {
                    delta[v] += sigma[v] / sigma[w] * (1.0 + delta[w]);
                }
                if w != source {
                    centrality[w] += delta[w];
                }
            }
            centrality
        })
        .collect();

    let mut totals = vec![0.0; n];
    for partial in partials {
        for (i, value) in partial.into_iter().enumerate() {
            totals[i] += value;
        }
    }

    projection
        .graph
        .node_indices()
        .map(|i| (projection.graph[i], totals[i.index()]))
        .collect()
}

/// Harmonic centrality: sum of 1/d(u, v) over reachable nodes, normalized
/// by n-1. High values mark central coordinators, low values isolation.
pub fn harmonic_centrality(projection: &Projection) -> HashMap<NodeId, f64> {
    let n = projection.graph.node_count();
    if n == 0 {
        return HashMap::new();
    }

    // Harmonic centrality of v sums over distances *to* v; BFS runs on the
    // reversed adjacency.
    let reversed: Vec<Vec<usize>> = {
        let mut rev = vec![Vec::new(); n];
        for i in projection.graph.node_indices() {
            for j in projection.graph.neighbors(i) {
                rev[j.index()].push(i.index());
            }
        }
        rev
    };

    let scores: Vec<f64> = (0..n)
        .into_par_iter()
        .map(|target| {
            let mut distance = vec![-1i64; n];
            distance[target] = 0;
            let mut queue = VecDeque::new();
            queue.push_back(target);
            let mut score = 0.0;
            while let Some(v) = queue.pop_front() {
                for &w in &reversed[v] {
                    if distance[w] < 0 {
                        distance[w] = distance[v] + 1;
                        score += 1.0 / distance[w] as f64;
                        queue.push_back(w);
                    }
                }
            }
            if n > 1 {
                score / (n - 1) as f64
            } else {
                0.0
            }
        })
        .collect();

    projection
        .graph
        .node_indices()
        .map(|i| (projection.graph[i], scores[i.index()]))
        .collect()
}

/// In/out degree per node.
pub fn degrees(projection: &Projection) -> HashMap<NodeId, (usize, usize)> {
    projection
        .graph
        .node_indices()
        .map(|i| {
            let out = projection.graph.neighbors(i).count();
            let inc = projection
                .graph
                .neighbors_directed(i, petgraph::Direction::Incoming)
                .count();
            (projection.graph[i], (inc, out))
        })
        .collect()
}

/// Result of Louvain community detection.
#[derive(Debug, Clone)]
pub struct CommunityResult {
    pub communities: HashMap<NodeId, usize>,
    pub community_count: usize,
    pub modularity: f64,
}

/// Single-level Louvain over the undirected view of the projection: local
/// moves until no move improves modularity. Returns None when the
/// projection has no edges (modularity is undefined there).
pub fn louvain_communities(projection: &Projection) -> Option<CommunityResult> {
    let n = projection.graph.node_count();
    let m = projection.graph.edge_count();
    if n == 0 || m == 0 {
        return None;
    }

    // Undirected weighted adjacency; parallel/reciprocal edges accumulate.
    let mut weights: HashMap<(usize, usize), f64> = HashMap::new();
    for edge in projection.graph.edge_indices() {
        let (a, b) = projection.graph.edge_endpoints(edge)?;
        let (a, b) = (a.index(), b.index());
        if a == b {
            continue;
        }
        let key = if a < b { (a, b) } else { (b, a) };
        *weights.entry(key).or_insert(0.0) += 1.0;
    }

    let mut adjacency: Vec<Vec<(usize, f64)>> = vec![Vec::new(); n];
    let mut total_weight = 0.0;
    for (&(a, b), &w) in &weights {
        adjacency[a].push((b, w));
        adjacency[b].push((a, w));
        total_weight += w;
    }
    if total_weight == 0.0 {
        return None;
    }

    let degree: Vec<f64> = adjacency
        .iter()
        .map(|neighbors| neighbors.iter().map(|(_, w)| w).sum())
        .collect();

    let mut community: Vec<usize> = (0..n).collect();
    let two_m = 2.0 * total_weight;

    let mut improved = true;
    let mut rounds = 0;
    while improved && rounds < 32 {
        improved = false;
        rounds += 1;
        for v in 0..n {
            let current = community[v];

            // Weight from v into each neighboring community.
            let mut links: HashMap<usize, f64> = HashMap::new();
            for &(u, w) in &adjacency[v] {
                *links.entry(community[u]).or_insert(0.0) += w;
            }

            let mut community_degree: HashMap<usize, f64> = HashMap::new();
            for u in 0..n {
                *community_degree.entry(community[u]).or_insert(0.0) += degree[u];
            }

            let mut best = current;
            let mut best_gain = 0.0;
            for (&candidate, &link_weight) in &links {
                if candidate == current {
                    continue;
                }
                let sigma_tot = community_degree.get(&candidate).copied().unwrap_or(0.0);
                let sigma_cur =
                    community_degree.get(&current).copied().unwrap_or(0.0) - degree[v];
                let gain_in = link_weight - sigma_tot * degree[v] / two_m;
                let loss_out =
                    links.get(&current).copied().unwrap_or(0.0) - sigma_cur * degree[v] / two_m;
                let gain = gain_in - loss_out;
                if gain > best_gain + 1e-12 {
                    best_gain = gain;
                    best = candidate;
                }
            }

            if best != current {
                community[v] = best;
                improved = true;
            }
        }
    }

    // Renumber communities densely.
    let mut renumber: HashMap<usize, usize> = HashMap::new();
    for &c in &community {
        let next = renumber.len();
        renumber.entry(c).or_insert(next);
    }
    let community: Vec<usize> = community.iter().map(|c| renumber[c]).collect();

    // Modularity: sum_c (e_c/m - (d_c/2m)^2).
    let mut internal: HashMap<usize, f64> = HashMap::new();
    for (&(a, b), &w) in &weights {
        if community[a] == community[b] {
            *internal.entry(community[a]).or_insert(0.0) += w;
        }
    }
    let mut community_degree: HashMap<usize, f64> = HashMap::new();
    for v in 0..n {
        *community_degree.entry(community[v]).or_insert(0.0) += degree[v];
    }
    let modularity: f64 = renumber
        .values()
        .map(|&c| {
            let e_c = internal.get(&c).copied().unwrap_or(0.0) / total_weight;
            let d_c = community_degree.get(&c).copied().unwrap_or(0.0) / two_m;
            e_c - d_c * d_c
        })
        .sum();

    let communities = projection
        .graph
        .node_indices()
        .map(|i| (projection.graph[i], community[i.index()]))
        .collect();

    Some(CommunityResult {
        communities,
        community_count: renumber.len(),
        modularity,
    })
}

/// Mean and population standard deviation of a score map.
pub fn score_statistics(scores: &HashMap<NodeId, f64>) -> Option<(f64, f64)> {
    if scores.is_empty() {
        return None;
    }
    let n = scores.len() as f64;
    let mean = scores.values().sum::<f64>() / n;
    let variance = scores.values().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    Some((mean, variance.sqrt()))
}

/// Percentile (0-100) of a score distribution; linear interpolation.
pub fn score_percentile(scores: &HashMap<NodeId, f64>, percentile: f64) -> Option<f64> {
    if scores.is_empty() {
        return None;
    }
    let mut sorted: Vec<f64> = scores.values().copied().collect();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let rank = (percentile / 100.0) * (sorted.len() - 1) as f64;
    let low = rank.floor() as usize;
    let high = rank.ceil() as usize;
    if low == high {
        return Some(sorted[low]);
    }
    let weight = rank - low as f64;
    Some(sorted[low] * (1.0 - weight) + sorted[high] * weight)
}
