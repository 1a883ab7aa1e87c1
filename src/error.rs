use crate::problems::ProblemId;
use std::path::PathBuf;

pub type Result<T, E = GraphError> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    #[error("Invalid configuration: {0}")]
    Config(String),
    #[error("Problems missing from solver cache: {0:?}")]
    DataMismatch(Vec<ProblemId>),
    #[error("Failed to fetch solvers of problem {problem}: {source}")]
    Fetch {
        problem: ProblemId,
        #[source]
        source: FetchError,
    },
    #[error("Failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Missing field: {0}")]
    Builder(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Failure of a single solver page request.
///
/// These are kept apart from the end of pagination so a flaky request never
/// truncates a solver list.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error("Bad status code: {0}")]
    Status(u16),
    #[error("Unexpected markup: {0}")]
    Markup(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl FetchError {
    /// Whether another attempt at the same page could succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            FetchError::Http(_) | FetchError::Io(_) => true,
            FetchError::Status(code) => *code == 429 || *code >= 500,
            FetchError::Markup(_) => false,
        }
    }
}

impl From<derive_builder::UninitializedFieldError> for GraphError {
    fn from(err: derive_builder::UninitializedFieldError) -> Self {
        GraphError::Builder(err.field_name().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_statuses() {
        assert!(FetchError::Status(503).is_retryable());
        assert!(FetchError::Status(429).is_retryable());
        assert!(!FetchError::Status(404).is_retryable());
        assert!(!FetchError::Markup("no table".into()).is_retryable());
    }

    #[test]
    fn mismatch_lists_problems() {
        let err = GraphError::DataMismatch(vec![1000, 1001]);
        assert_eq!(err.to_string(), "Problems missing from solver cache: [1000, 1001]");
    }
}
