pub mod cache;
pub mod error;
pub mod fetcher;
pub mod graph;
pub mod pipeline;
pub mod problems;
pub mod writer;

pub use cache::{FetchCache, SolverMap};
pub use error::{FetchError, GraphError, Result};
pub use fetcher::{Backend, SolverPage, SolverPageSource};
pub use graph::{overlap_ratio, EdgeExtractor, EdgeExtractorBuilder, IndexedGraph, NodeEntry};
pub use pipeline::{GraphOutput, Pipeline};
pub use problems::ProblemId;
