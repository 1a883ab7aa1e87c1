//! Durable `problem -> solvers` cache.
//!
//! The cache lives in a single JSON object keyed by problem id. A problem
//! counts as done as soon as its key is present, so an interrupted crawl can
//! be resumed by running [`FetchCache::ensure_complete`] again. The file is
//! rewritten after every problem through a temporary sibling and a rename,
//! which keeps half-written entries out of the durable copy.

use crate::{
    error::{GraphError, Result},
    fetcher::{fetch_solver_set, RetryPolicy, SolverPageSource},
    problems::ProblemId,
};
use std::{
    collections::{BTreeMap, HashSet},
    fs,
    io::{BufWriter, ErrorKind, Write},
    path::{Path, PathBuf},
};
use tracing::{info, warn};

pub type SolverMap = BTreeMap<ProblemId, Vec<String>>;

/// What [`FetchCache::load`] found on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheState {
    Missing,
    Malformed,
    Loaded,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct EnsureReport {
    pub fetched: usize,
    pub skipped: usize,
}

#[derive(Debug, Clone)]
pub struct FetchCache {
    path: PathBuf,
    entries: SolverMap,
    state: CacheState,
}

impl FetchCache {
    /// Reads the cache at `path`. An absent or unreadable file gives an
    /// empty cache rather than an error.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let (entries, state) = match fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str::<SolverMap>(&content) {
                Ok(entries) => {
                    info!(
                        target: "solver_graph",
                        "read solver cache {} with {} problems",
                        path.display(),
                        entries.len()
                    );
                    (entries, CacheState::Loaded)
                }
                Err(err) => {
                    warn!(
                        target: "solver_graph",
                        "solver cache {} is malformed, starting over: {}",
                        path.display(),
                        err
                    );
                    (SolverMap::new(), CacheState::Malformed)
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                warn!(target: "solver_graph", "solver cache {} not found", path.display());
                (SolverMap::new(), CacheState::Missing)
            }
            Err(err) => {
                warn!(
                    target: "solver_graph",
                    "solver cache {} is unreadable, starting over: {}",
                    path.display(),
                    err
                );
                (SolverMap::new(), CacheState::Malformed)
            }
        };

        Self {
            path,
            entries,
            state,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn state(&self) -> CacheState {
        self.state
    }

    pub fn entries(&self) -> &SolverMap {
        &self.entries
    }

    pub fn get(&self, problem: ProblemId) -> Option<&[String]> {
        self.entries.get(&problem).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Configured problems without an entry, in configured order.
    pub fn missing(&self, problems: &[ProblemId]) -> Vec<ProblemId> {
        problems
            .iter()
            .copied()
            .filter(|p| !self.entries.contains_key(p))
            .collect()
    }

    /// Cached problems that are not configured.
    pub fn extra(&self, problems: &[ProblemId]) -> Vec<ProblemId> {
        let wanted: HashSet<_> = problems.iter().collect();
        self.entries
            .keys()
            .copied()
            .filter(|p| !wanted.contains(p))
            .collect()
    }

    /// Whether the cached key set is exactly the configured set.
    pub fn is_complete(&self, problems: &[ProblemId]) -> bool {
        self.missing(problems).is_empty() && self.extra(problems).is_empty()
    }

    /// Fetches every configured problem that has no entry yet, persisting the
    /// whole cache after each one.
    pub async fn ensure_complete<S: SolverPageSource>(
        &mut self,
        source: &S,
        problems: &[ProblemId],
        retry: &RetryPolicy,
    ) -> Result<EnsureReport> {
        let missing = self.missing(problems);
        let mut report = EnsureReport {
            fetched: 0,
            skipped: problems.len() - missing.len(),
        };

        for (done, problem) in missing.iter().copied().enumerate() {
            let solvers = fetch_solver_set(source, problem, retry).await?;
            let count = solvers.len();
            self.entries.insert(problem, solvers);
            self.persist()?;
            report.fetched += 1;

            info!(
                target: "solver_graph",
                "[{}/{}] problem {} has {} solvers",
                done + 1,
                missing.len(),
                problem,
                count
            );
        }

        Ok(report)
    }

    /// Overwrites the durable copy with the current entries.
    pub fn persist(&self) -> Result<()> {
        let tmp = self.path.with_extension("json.tmp");
        let write_err = |source| GraphError::Write {
            path: self.path.clone(),
            source,
        };

        let file = fs::File::create(&tmp).map_err(write_err)?;
        let written = write_entries(file, &self.entries).and_then(|_| fs::rename(&tmp, &self.path));
        if written.is_err() {
            let _ = fs::remove_file(&tmp);
        }
        written.map_err(write_err)
    }
}

fn write_entries(file: fs::File, entries: &SolverMap) -> std::io::Result<()> {
    let mut writer = BufWriter::new(file);
    serde_json::to_writer(&mut writer, entries)?;
    writer.flush()?;
    writer.get_ref().sync_all()
}
