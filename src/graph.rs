//! Problem similarity graph.
//!
//! Two problems are connected when the share of users who solved both is
//! large enough:
//!
//! ```text
//! overlap(a, b) = |a ∩ b| / (|a| + |b|)
//! ```
//!
//! Every connected pair is emitted as two directed edges, `(i, j)` followed
//! by `(j, i)`, walking `i` then `j > i` in configured order.

use crate::{
    cache::SolverMap,
    error::{GraphError, Result},
    problems::ProblemId,
};
use derive_builder::Builder;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, trace};

/// Overlap of two solver sets. Zero when neither has solvers.
pub fn overlap_ratio(a: &HashSet<&str>, b: &HashSet<&str>) -> f64 {
    ratio(common_count(a, b), a.len() + b.len())
}

fn ratio(common: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    common as f64 / total as f64
}

fn common_count(a: &HashSet<&str>, b: &HashSet<&str>) -> usize {
    let (small, large) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    small.iter().filter(|user| large.contains(*user)).count()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeEntry {
    pub node_id: usize,
    pub prob_id: ProblemId,
}

/// Edges over dense node indices plus the index-to-problem table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexedGraph {
    pub edges: Vec<[usize; 2]>,
    pub nodes: Vec<NodeEntry>,
}

#[derive(Debug, Clone, Builder)]
#[builder(build_fn(error = "GraphError", validate = "Self::validate"))]
pub struct EdgeExtractor {
    /// Minimum overlap for two problems to be connected.
    alpha: f64,
    /// Node order of the graph.
    #[builder(setter(into))]
    problems: Vec<ProblemId>,
}

impl EdgeExtractorBuilder {
    fn validate(&self) -> Result<()> {
        if let Some(alpha) = self.alpha {
            if !(0.0..=1.0).contains(&alpha) {
                return Err(GraphError::Config(format!(
                    "alpha must be within [0, 1], got {alpha}"
                )));
            }
        }

        if let Some(problems) = &self.problems {
            let mut seen = HashSet::new();
            let repeated: Vec<_> = problems.iter().filter(|p| !seen.insert(**p)).collect();
            if !repeated.is_empty() {
                return Err(GraphError::Config(format!(
                    "problems listed more than once: {repeated:?}"
                )));
            }
        }

        Ok(())
    }
}

impl EdgeExtractor {
    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    pub fn problems(&self) -> &[ProblemId] {
        &self.problems
    }

    /// Edges between problem ids.
    pub fn extract_edges(&self, solvers: &SolverMap) -> Result<Vec<[ProblemId; 2]>> {
        let edges = self
            .connected_pairs(solvers)?
            .into_iter()
            .flat_map(|(i, j)| {
                let (a, b) = (self.problems[i], self.problems[j]);
                [[a, b], [b, a]]
            })
            .collect();
        Ok(edges)
    }

    /// Edges between node indices, where node `i` is the `i`-th configured
    /// problem.
    pub fn extract_indexed(&self, solvers: &SolverMap) -> Result<IndexedGraph> {
        let edges = self
            .connected_pairs(solvers)?
            .into_iter()
            .flat_map(|(i, j)| [[i, j], [j, i]])
            .collect();
        let nodes = self
            .problems
            .iter()
            .enumerate()
            .map(|(node_id, &prob_id)| NodeEntry { node_id, prob_id })
            .collect();

        Ok(IndexedGraph { edges, nodes })
    }

    fn connected_pairs(&self, solvers: &SolverMap) -> Result<Vec<(usize, usize)>> {
        let missing: Vec<_> = self
            .problems
            .iter()
            .copied()
            .filter(|p| !solvers.contains_key(p))
            .collect();
        if !missing.is_empty() {
            return Err(GraphError::DataMismatch(missing));
        }

        let sets: Vec<HashSet<&str>> = self
            .problems
            .iter()
            .map(|p| solvers[p].iter().map(String::as_str).collect())
            .collect();

        let mut pairs = vec![];
        for i in 0..sets.len() {
            for j in i + 1..sets.len() {
                let common = common_count(&sets[i], &sets[j]);
                let total = sets[i].len() + sets[j].len();
                let overlap = ratio(common, total);
                trace!(
                    target: "solver_graph",
                    "{} ~ {}: {} common of {}, ratio {:.4}",
                    self.problems[i],
                    self.problems[j],
                    common,
                    total,
                    overlap
                );

                if !sets[i].is_empty() && !sets[j].is_empty() && overlap >= self.alpha {
                    pairs.push((i, j));
                }
            }
        }

        debug!(
            target: "solver_graph",
            "{} of {} problem pairs connected at alpha {}",
            pairs.len(),
            sets.len() * sets.len().saturating_sub(1) / 2,
            self.alpha
        );
        Ok(pairs)
    }
}
