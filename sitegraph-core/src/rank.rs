//! Reference graph construction and pagerank ranking.
//!
//! An edge P -> Q exists when Q's URL occurs verbatim in P's fetched text.
//! This over-approximates on URL prefixes (`/page` also matches inside
//! `/page2`).

use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};
use serde::{Deserialize, Serialize};
use sitegraph_scanner::Page;
use std::cmp::Ordering;
use tracing::{debug, info, warn};

pub const DEFAULT_DAMPING: f64 = 0.9;
pub const DEFAULT_TOLERANCE: f64 = 1e-6;
pub const DEFAULT_MAX_ITERATIONS: usize = 100;

/// Candidate count used for small crawls.
pub const MIN_CANDIDATES: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RankOptions {
    pub damping: f64,
    pub tolerance: f64,
    pub max_iterations: usize,
}

impl Default for RankOptions {
    fn default() -> Self {
        Self {
            damping: DEFAULT_DAMPING,
            tolerance: DEFAULT_TOLERANCE,
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedPage {
    pub page: Page,
    pub score: f64,
}

/// Directed graph over pages. Node `i` is the page at index `i` of the slice
/// the graph was built from.
#[derive(Debug, Clone, Default)]
pub struct ReferenceGraph {
    graph: DiGraph<usize, ()>,
}

impl ReferenceGraph {
    pub fn build(pages: &[Page]) -> Self {
        let mut graph = DiGraph::with_capacity(pages.len(), 0);
        let nodes: Vec<NodeIndex> = (0..pages.len()).map(|idx| graph.add_node(idx)).collect();

        for (from, page) in pages.iter().enumerate() {
            let Some(content) = page.content.as_deref() else {
                continue;
            };
            for (to, target) in pages.iter().enumerate() {
                if from == to || target.url.is_empty() {
                    continue;
                }
                if content.contains(target.url.as_str()) {
                    graph.update_edge(nodes[from], nodes[to], ());
                }
            }
        }

        debug!(
            "Built reference graph with {} nodes and {} edges",
            graph.node_count(),
            graph.edge_count()
        );
        Self { graph }
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Edges as `(from, to)` page indices, in insertion order.
    pub fn edges(&self) -> Vec<(usize, usize)> {
        self.graph
            .raw_edges()
            .iter()
            .map(|edge| (self.graph[edge.source()], self.graph[edge.target()]))
            .collect()
    }

    pub fn has_edge(&self, from: usize, to: usize) -> bool {
        if from >= self.node_count() || to >= self.node_count() {
            return false;
        }
        self.graph
            .find_edge(NodeIndex::new(from), NodeIndex::new(to))
            .is_some()
    }

    /// Power-iteration pagerank with uniform teleport. Sink nodes spread their
    /// mass uniformly over all nodes. Returns one score per page index.
    pub fn pagerank(&self, options: &RankOptions) -> Vec<f64> {
        let n = self.node_count();
        if n == 0 {
            return Vec::new();
        }

        let uniform = 1.0 / n as f64;
        let alpha = options.damping;
        let out_degree: Vec<usize> = self
            .graph
            .node_indices()
            .map(|node| self.graph.neighbors_directed(node, Direction::Outgoing).count())
            .collect();

        let mut scores = vec![uniform; n];
        for iteration in 0..options.max_iterations {
            let previous = scores;
            let dangling: f64 = previous
                .iter()
                .zip(&out_degree)
                .filter(|(_, degree)| **degree == 0)
                .map(|(score, _)| *score)
                .sum();

            let base = (alpha * dangling + (1.0 - alpha)) * uniform;
            scores = vec![base; n];
            for node in self.graph.node_indices() {
                let degree = out_degree[node.index()];
                if degree == 0 {
                    continue;
                }
                let share = alpha * previous[node.index()] / degree as f64;
                for target in self.graph.neighbors_directed(node, Direction::Outgoing) {
                    scores[target.index()] += share;
                }
            }

            let change: f64 = scores
                .iter()
                .zip(&previous)
                .map(|(now, before)| (now - before).abs())
                .sum();
            if change < n as f64 * options.tolerance {
                debug!("pagerank converged after {} iterations", iteration + 1);
                return scores;
            }
        }

        warn!(
            "pagerank did not converge within {} iterations",
            options.max_iterations
        );
        scores
    }
}

/// How many candidates to keep for a crawl of `max_pages`.
pub fn candidate_limit(max_pages: usize) -> usize {
    if max_pages > 50 {
        max_pages / 5
    } else {
        MIN_CANDIDATES
    }
}

/// Orders ids numerically when both are integers, lexicographically otherwise.
pub fn compare_ids(a: &str, b: &str) -> Ordering {
    match (a.parse::<u64>(), b.parse::<u64>()) {
        (Ok(a), Ok(b)) => a.cmp(&b),
        _ => a.cmp(b),
    }
}

/// Ranks pages by pagerank over their reference graph and keeps the top
/// `limit`. Ties are broken by page id.
pub fn rank_candidates(pages: &[Page], limit: usize, options: &RankOptions) -> Vec<RankedPage> {
    if pages.is_empty() {
        return Vec::new();
    }

    let graph = ReferenceGraph::build(pages);
    rank_with_graph(pages, &graph, limit, options)
}

/// Same as [`rank_candidates`] for a graph the caller already built.
pub fn rank_with_graph(
    pages: &[Page],
    graph: &ReferenceGraph,
    limit: usize,
    options: &RankOptions,
) -> Vec<RankedPage> {
    let scores = graph.pagerank(options);

    let mut order: Vec<usize> = (0..pages.len()).collect();
    order.sort_by(|&a, &b| {
        scores[b]
            .total_cmp(&scores[a])
            .then_with(|| compare_ids(&pages[a].id, &pages[b].id))
    });

    // Failed pages stay in the graph but are never handed out as candidates.
    let ranked: Vec<RankedPage> = order
        .into_iter()
        .filter(|&idx| !pages[idx].is_error)
        .take(limit)
        .map(|idx| RankedPage {
            page: pages[idx].clone(),
            score: scores[idx],
        })
        .collect();

    info!(
        "Ranked {} pages, kept {} candidates",
        pages.len(),
        ranked.len()
    );
    ranked
}
