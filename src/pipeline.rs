//! End-to-end run: load the cache, fill the gaps, build and save the graph.

use crate::{
    cache::{CacheState, FetchCache},
    error::Result,
    fetcher::{RetryPolicy, SolverPageSource},
    graph::EdgeExtractorBuilder,
    problems::ProblemId,
    writer,
};
use std::{collections::HashSet, path::PathBuf};
use strum::Display;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum Stage {
    Uninitialized,
    CacheLoaded,
    CacheComplete,
    GraphBuilt,
    Persisted,
}

/// Where the graph goes and which node naming it uses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphOutput {
    /// `[[problem_id, problem_id], ..]`
    Problems { edges: PathBuf },
    /// `[[node, node], ..]` plus the node table.
    Indexed { edges: PathBuf, nodes: PathBuf },
}

#[derive(Debug, Clone)]
pub struct Pipeline {
    pub cache_path: PathBuf,
    pub problems: Vec<ProblemId>,
    pub retry: RetryPolicy,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub stage: Stage,
    pub fetched: usize,
    pub edges: usize,
}

impl Pipeline {
    /// Repeated problems keep their first position.
    pub fn new(cache_path: impl Into<PathBuf>, problems: Vec<ProblemId>) -> Self {
        let mut seen = HashSet::new();
        Self {
            cache_path: cache_path.into(),
            problems: problems.into_iter().filter(|p| seen.insert(*p)).collect(),
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Loads the cache and fetches whatever is missing.
    pub async fn fill<S: SolverPageSource>(&self, source: &S) -> Result<(FetchCache, usize)> {
        enter(Stage::Uninitialized);
        let mut cache = FetchCache::load(&self.cache_path);
        enter(Stage::CacheLoaded);

        let missing = cache.missing(&self.problems);
        let extra = cache.extra(&self.problems);
        if !extra.is_empty() {
            warn!(
                target: "solver_graph",
                "solver cache holds {} problems that are not configured: {:?}",
                extra.len(),
                extra
            );
        }

        if missing.is_empty() {
            info!(
                target: "solver_graph",
                "reusing solver cache {} ({} problems)",
                cache.path().display(),
                cache.len()
            );
        } else if cache.state() == CacheState::Loaded {
            warn!(
                target: "solver_graph",
                "solver cache is missing {} of {} problems, resuming",
                missing.len(),
                self.problems.len()
            );
        } else {
            warn!(
                target: "solver_graph",
                "rebuilding solver cache {} for {} problems",
                cache.path().display(),
                self.problems.len()
            );
        }

        let report = cache
            .ensure_complete(source, &self.problems, &self.retry)
            .await?;
        enter(Stage::CacheComplete);

        Ok((cache, report.fetched))
    }

    /// Runs every stage and writes the graph for `alpha` to `output`.
    pub async fn run<S: SolverPageSource>(
        &self,
        source: &S,
        alpha: f64,
        output: &GraphOutput,
    ) -> Result<RunSummary> {
        let extractor = EdgeExtractorBuilder::default()
            .alpha(alpha)
            .problems(self.problems.clone())
            .build()?;
        let (cache, fetched) = self.fill(source).await?;

        let edges = match output {
            GraphOutput::Problems { edges } => {
                let list = extractor.extract_edges(cache.entries())?;
                enter(Stage::GraphBuilt);
                writer::write_edges(edges, list.as_slice())?;
                list.len()
            }
            GraphOutput::Indexed { edges, nodes } => {
                let graph = extractor.extract_indexed(cache.entries())?;
                enter(Stage::GraphBuilt);
                writer::write_edges(edges, graph.edges.as_slice())?;
                writer::write_nodes(nodes, &graph.nodes)?;
                graph.edges.len()
            }
        };
        enter(Stage::Persisted);

        Ok(RunSummary {
            stage: Stage::Persisted,
            fetched,
            edges,
        })
    }
}

fn enter(stage: Stage) {
    info!(target: "solver_graph", stage = %stage, "pipeline stage");
}
