use anyhow::{bail, Result};
use clap::{Args, Parser, Subcommand};
use solver_graph::{
    fetcher::{DirectorySource, HttpSettingsBuilder, RetryPolicy, Source},
    problems::{load_problem_list, TagGroups},
    Backend, GraphOutput, Pipeline,
};
use std::{path::PathBuf, time::Duration};
use tracing_subscriber::EnvFilter;

/// Builds a problem similarity graph from the users who solved each problem.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Fill the solver cache for every configured problem.
    Fetch(Common),
    /// Fill the solver cache, then extract and save the graph.
    Build(BuildArgs),
}

#[derive(Debug, Args)]
struct Common {
    /// JSON array of problem ids.
    #[arg(long, conflicts_with = "tags", required_unless_present = "tags")]
    problems: Option<PathBuf>,
    /// Tag grouping JSON (`{tag: {prob_list: [..]}}`).
    #[arg(long)]
    tags: Option<PathBuf>,
    #[arg(
        long,
        env = "SOLVER_GRAPH_CACHE",
        default_value = "_temp_fetched_solved_users.json"
    )]
    cache: PathBuf,
    #[arg(long, value_enum, default_value_t = Backend::Http)]
    backend: Backend,
    /// Root of saved status pages, for the directory backend.
    #[arg(long, required_if_eq("backend", "directory"))]
    pages: Option<PathBuf>,
    #[arg(long, env = "SOLVER_GRAPH_BASE_URL", default_value = solver_graph::fetcher::DEFAULT_BASE_URL)]
    base_url: String,
    /// Milliseconds to wait before each request.
    #[arg(long, default_value_t = 500)]
    delay_ms: u64,
    #[arg(long, default_value_t = 3)]
    retries: u32,
}

#[derive(Debug, Args)]
struct BuildArgs {
    #[command(flatten)]
    common: Common,
    /// Minimum overlap ratio for an edge.
    #[arg(long)]
    alpha: f64,
    #[arg(long, default_value = "edges.json")]
    edges: PathBuf,
    /// Also write a node table and use node indices in the edge list.
    #[arg(long)]
    nodes: Option<PathBuf>,
}

impl Common {
    fn problem_ids(&self) -> Result<Vec<u32>> {
        let ids = match (&self.problems, &self.tags) {
            (Some(path), _) => load_problem_list(path)?,
            (None, Some(path)) => TagGroups::from_path(path)?.problem_ids(),
            (None, None) => bail!("either --problems or --tags is required"),
        };
        tracing::info!(target: "solver_graph", "{} problems configured", ids.len());
        Ok(ids)
    }

    fn source(&self) -> Result<Source> {
        let source = match self.backend {
            Backend::Http => Source::Http(
                HttpSettingsBuilder::default()
                    .base_url(self.base_url.as_str())
                    .delay(Duration::from_millis(self.delay_ms))
                    .build()?
                    .connect()?,
            ),
            Backend::Directory => match &self.pages {
                Some(root) => Source::Directory(DirectorySource::new(root)),
                None => bail!("--pages is required for the directory backend"),
            },
        };
        Ok(source)
    }

    fn pipeline(&self) -> Result<Pipeline> {
        let retry = RetryPolicy {
            max_retries: self.retries,
            ..Default::default()
        };
        Ok(Pipeline::new(&self.cache, self.problem_ids()?).with_retry(retry))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    match Cli::parse().command {
        Command::Fetch(args) => {
            let pipeline = args.pipeline()?;
            let source = args.source()?;
            let (cache, fetched) = pipeline.fill(&source).await?;
            tracing::info!(
                target: "solver_graph",
                "fetched {} problems, {} cached at {}",
                fetched,
                cache.len(),
                cache.path().display()
            );
        }
        Command::Build(args) => {
            let pipeline = args.common.pipeline()?;
            let source = args.common.source()?;
            let output = match args.nodes {
                Some(nodes) => GraphOutput::Indexed {
                    edges: args.edges,
                    nodes,
                },
                None => GraphOutput::Problems { edges: args.edges },
            };
            let summary = pipeline.run(&source, args.alpha, &output).await?;
            tracing::info!(
                target: "solver_graph",
                "fetched {} problems, wrote {} edges",
                summary.fetched,
                summary.edges
            );
        }
    }

    Ok(())
}
