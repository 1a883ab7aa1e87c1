//! Solver lists of judge problems.
//!
//! A problem's "solved" status listing is paginated. [`fetch_solver_set`]
//! walks the pages of one problem through any [`SolverPageSource`] until the
//! judge reports there is nothing left, retrying pages that fail in between.

use crate::{
    error::{FetchError, GraphError, Result},
    problems::ProblemId,
};
use derive_builder::Builder;
use reqwest::{header, StatusCode};
use scraper::{Html, Selector};
use std::{
    collections::HashSet,
    io::ErrorKind,
    path::{Path, PathBuf},
    time::Duration,
};
use strum::{Display, EnumString};
use tracing::{debug, trace, warn};

pub const DEFAULT_BASE_URL: &str = "https://www.acmicpc.net";
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// One page of a problem's solver listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SolverPage {
    Solvers(Vec<String>),
    End,
}

/// Anything that can produce a single page of solvers for a problem.
#[allow(async_fn_in_trait)]
pub trait SolverPageSource {
    async fn fetch_solver_page(
        &self,
        problem: ProblemId,
        page: u32,
    ) -> std::result::Result<SolverPage, FetchError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    /// Multiplied by the attempt number before each retry.
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff: Duration::from_secs(2),
        }
    }
}

/// Collects every solver of `problem`, deduplicated in first-seen order.
///
/// Pages are requested from 1 upwards and the walk stops at the first page
/// that is [`SolverPage::End`] or has no rows. A page that keeps failing
/// after the retry budget aborts the whole problem so that a partial list is
/// never mistaken for a complete one.
pub async fn fetch_solver_set<S: SolverPageSource>(
    source: &S,
    problem: ProblemId,
    retry: &RetryPolicy,
) -> Result<Vec<String>> {
    let mut seen = HashSet::new();
    let mut solvers = vec![];

    for page in 1.. {
        let rows = match fetch_page_with_retry(source, problem, page, retry).await? {
            SolverPage::Solvers(rows) if !rows.is_empty() => rows,
            _ => break,
        };
        trace!(target: "solver_graph", problem, page, rows = rows.len(), "fetched solver page");

        for user in rows {
            if seen.insert(user.clone()) {
                solvers.push(user);
            }
        }
    }

    debug!(target: "solver_graph", problem, solvers = solvers.len(), "solver set complete");
    Ok(solvers)
}

async fn fetch_page_with_retry<S: SolverPageSource>(
    source: &S,
    problem: ProblemId,
    page: u32,
    retry: &RetryPolicy,
) -> Result<SolverPage> {
    let mut attempt = 0;
    loop {
        match source.fetch_solver_page(problem, page).await {
            Ok(result) => return Ok(result),
            Err(err) if err.is_retryable() && attempt < retry.max_retries => {
                attempt += 1;
                warn!(
                    target: "solver_graph",
                    problem, page, attempt, "solver page request failed, retrying: {}", err
                );
                tokio::time::sleep(retry.backoff * attempt).await;
            }
            Err(err) => return Err(GraphError::Fetch { problem, source: err }),
        }
    }
}

/// Extracts user ids from a solver status page.
///
/// The judge renders its own error box (`.error-v1`) past the last page.
pub fn parse_status_page(html: &str) -> std::result::Result<SolverPage, FetchError> {
    let document = Html::parse_document(html);

    if document
        .select(&Selector::parse(".error-v1").unwrap())
        .next()
        .is_some()
    {
        return Ok(SolverPage::End);
    }

    let tbody = document
        .select(&Selector::parse("div.col-md-10 tbody").unwrap())
        .next()
        .ok_or_else(|| FetchError::Markup("No status table found".to_string()))?;

    let cell = Selector::parse("td").unwrap();
    let mut users = vec![];
    for row in tbody.select(&Selector::parse("tr").unwrap()) {
        let user = row
            .select(&cell)
            .nth(3)
            .ok_or_else(|| FetchError::Markup("No user column found".to_string()))?
            .text()
            .collect::<String>();
        users.push(user.trim().to_string());
    }

    if users.is_empty() {
        Ok(SolverPage::End)
    } else {
        Ok(SolverPage::Solvers(users))
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, EnumString, Display, clap::ValueEnum)]
#[strum(serialize_all = "lowercase")]
pub enum Backend {
    /// Live requests against the judge.
    #[default]
    Http,
    /// Status pages saved earlier as `<root>/<problem>/<page>.html`.
    Directory,
}

#[derive(Debug, Clone, Builder)]
#[builder(build_fn(error = "GraphError"))]
pub struct HttpSettings {
    #[builder(setter(into), default = "DEFAULT_BASE_URL.to_string()")]
    base_url: String,
    #[builder(setter(into), default = "DEFAULT_USER_AGENT.to_string()")]
    user_agent: String,
    /// Pause before every request.
    #[builder(default)]
    delay: Duration,
    #[builder(default = "Duration::from_secs(30)")]
    timeout: Duration,
}

impl HttpSettings {
    /// Opens the HTTP client. It lives as long as the returned source.
    pub fn connect(self) -> Result<HttpSource> {
        let client = reqwest::Client::builder()
            .user_agent(self.user_agent)
            .timeout(self.timeout)
            .build()
            .map_err(|err| GraphError::Config(format!("cannot build http client: {err}")))?;

        Ok(HttpSource {
            client,
            base_url: self.base_url.trim_end_matches('/').to_string(),
            delay: self.delay,
        })
    }
}

#[derive(Debug, Clone)]
pub struct HttpSource {
    client: reqwest::Client,
    base_url: String,
    delay: Duration,
}

impl HttpSource {
    pub fn page_url(&self, problem: ProblemId, page: u32) -> String {
        format!("{}/problem/status/{}/{}", self.base_url, problem, page)
    }
}

impl SolverPageSource for HttpSource {
    async fn fetch_solver_page(
        &self,
        problem: ProblemId,
        page: u32,
    ) -> std::result::Result<SolverPage, FetchError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let url = self.page_url(problem, page);
        trace!(target: "solver_graph", "GET {}", url);
        let response = self
            .client
            .get(&url)
            .header(header::ACCEPT, "text/html")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() && status != StatusCode::NOT_FOUND {
            return Err(FetchError::Status(status.as_u16()));
        }

        let html = response.text().await?;
        classify_response(status, &html)
    }
}

/// Decides what a status page response means.
///
/// The judge answers 404 together with its error box past the last page, so
/// a 404 is only the end when the body says so.
pub fn classify_response(
    status: StatusCode,
    html: &str,
) -> std::result::Result<SolverPage, FetchError> {
    if !status.is_success() && status != StatusCode::NOT_FOUND {
        return Err(FetchError::Status(status.as_u16()));
    }

    match parse_status_page(html)? {
        SolverPage::Solvers(_) if !status.is_success() => Err(FetchError::Status(status.as_u16())),
        page => Ok(page),
    }
}

#[derive(Debug, Clone)]
pub struct DirectorySource {
    root: PathBuf,
}

impl DirectorySource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn page_path(&self, problem: ProblemId, page: u32) -> PathBuf {
        self.root
            .join(problem.to_string())
            .join(format!("{page}.html"))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl SolverPageSource for DirectorySource {
    async fn fetch_solver_page(
        &self,
        problem: ProblemId,
        page: u32,
    ) -> std::result::Result<SolverPage, FetchError> {
        let path = self.page_path(problem, page);
        match tokio::fs::read_to_string(&path).await {
            Ok(html) => parse_status_page(&html),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(SolverPage::End),
            Err(err) => Err(err.into()),
        }
    }
}

/// The configured backend, picked at runtime.
#[derive(Debug, Clone)]
pub enum Source {
    Http(HttpSource),
    Directory(DirectorySource),
}

impl SolverPageSource for Source {
    async fn fetch_solver_page(
        &self,
        problem: ProblemId,
        page: u32,
    ) -> std::result::Result<SolverPage, FetchError> {
        match self {
            Source::Http(source) => source.fetch_solver_page(problem, page).await,
            Source::Directory(source) => source.fetch_solver_page(problem, page).await,
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::{collections::HashMap, fs, sync::Mutex};

    /// Serves canned pages and records every request.
    #[derive(Debug, Default)]
    pub(crate) struct ScriptedSource {
        pages: HashMap<ProblemId, Vec<Vec<String>>>,
        failures: Mutex<HashMap<(ProblemId, u32), u32>>,
        pub(crate) calls: Mutex<Vec<(ProblemId, u32)>>,
    }

    impl ScriptedSource {
        pub(crate) fn with_problem(mut self, problem: ProblemId, pages: &[&[&str]]) -> Self {
            let pages = pages
                .iter()
                .map(|page| page.iter().map(|s| s.to_string()).collect())
                .collect();
            self.pages.insert(problem, pages);
            self
        }

        pub(crate) fn failing(self, problem: ProblemId, page: u32, times: u32) -> Self {
            self.failures.lock().unwrap().insert((problem, page), times);
            self
        }

        pub(crate) fn requested_problems(&self) -> Vec<ProblemId> {
            let mut problems: Vec<_> = self.calls.lock().unwrap().iter().map(|c| c.0).collect();
            problems.dedup();
            problems
        }
    }

    impl SolverPageSource for ScriptedSource {
        async fn fetch_solver_page(
            &self,
            problem: ProblemId,
            page: u32,
        ) -> std::result::Result<SolverPage, FetchError> {
            self.calls.lock().unwrap().push((problem, page));

            if let Some(left) = self.failures.lock().unwrap().get_mut(&(problem, page)) {
                if *left > 0 {
                    *left -= 1;
                    return Err(FetchError::Status(503));
                }
            }

            Ok(self
                .pages
                .get(&problem)
                .and_then(|pages| pages.get(page as usize - 1))
                .map(|rows| SolverPage::Solvers(rows.clone()))
                .unwrap_or(SolverPage::End))
        }
    }

    fn no_wait() -> RetryPolicy {
        RetryPolicy {
            max_retries: 2,
            backoff: Duration::ZERO,
        }
    }

    #[test]
    fn parse_status_page_should_work() {
        let content = fs::read_to_string("fixtures/status_page.html").unwrap();
        let page = parse_status_page(&content).unwrap();

        assert_eq!(
            page,
            SolverPage::Solvers(vec![
                "koosaga".to_string(),
                "cki86201".to_string(),
                "ainta".to_string(),
                "koosaga".to_string(),
            ])
        );
    }

    #[test]
    fn parse_status_page_should_detect_end() {
        let content = fs::read_to_string("fixtures/error_page.html").unwrap();
        assert_eq!(parse_status_page(&content).unwrap(), SolverPage::End);

        let content = fs::read_to_string("fixtures/empty_page.html").unwrap();
        assert_eq!(parse_status_page(&content).unwrap(), SolverPage::End);
    }

    #[test]
    fn parse_status_page_should_reject_unknown_markup() {
        let content = fs::read_to_string("fixtures/blocked_page.html").unwrap();
        let err = parse_status_page(&content).unwrap_err();
        assert!(matches!(err, FetchError::Markup(_)));
    }

    #[tokio::test]
    async fn fetch_solver_set_should_paginate_and_dedup() {
        let source = ScriptedSource::default().with_problem(
            1000,
            &[&["alice", "bob"], &["carol", "alice"], &["dave"]],
        );

        let solvers = fetch_solver_set(&source, 1000, &no_wait()).await.unwrap();

        assert_eq!(solvers, vec!["alice", "bob", "carol", "dave"]);
        assert_eq!(
            *source.calls.lock().unwrap(),
            vec![(1000, 1), (1000, 2), (1000, 3), (1000, 4)]
        );
    }

    #[tokio::test]
    async fn fetch_solver_set_should_stop_on_empty_page() {
        let source = ScriptedSource::default().with_problem(1000, &[&["alice"], &[], &["bob"]]);

        let solvers = fetch_solver_set(&source, 1000, &no_wait()).await.unwrap();

        assert_eq!(solvers, vec!["alice"]);
        assert_eq!(source.calls.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn fetch_solver_set_should_retry_transient_failures() {
        let source = ScriptedSource::default()
            .with_problem(1000, &[&["alice"], &["bob"]])
            .failing(1000, 2, 2);

        let solvers = fetch_solver_set(&source, 1000, &no_wait()).await.unwrap();

        assert_eq!(solvers, vec!["alice", "bob"]);
    }

    #[tokio::test]
    async fn fetch_solver_set_should_surface_exhausted_retries() {
        let source = ScriptedSource::default()
            .with_problem(1000, &[&["alice"], &["bob"]])
            .failing(1000, 2, 3);

        let err = fetch_solver_set(&source, 1000, &no_wait())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            GraphError::Fetch {
                problem: 1000,
                source: FetchError::Status(503)
            }
        ));
    }

    #[tokio::test]
    async fn directory_source_should_read_saved_pages() {
        let dir = tempfile::tempdir().unwrap();
        let source = DirectorySource::new(dir.path());
        fs::create_dir_all(dir.path().join("1149")).unwrap();
        fs::copy("fixtures/status_page.html", source.page_path(1149, 1)).unwrap();

        let solvers = fetch_solver_set(&source, 1149, &no_wait()).await.unwrap();

        assert_eq!(solvers, vec!["koosaga", "cki86201", "ainta"]);
        assert_eq!(
            source.fetch_solver_page(1149, 2).await.unwrap(),
            SolverPage::End
        );
    }

    #[test]
    fn http_source_should_build_page_urls() {
        let source = HttpSettingsBuilder::default()
            .base_url("https://judge.example/")
            .build()
            .unwrap()
            .connect()
            .unwrap();

        assert_eq!(
            source.page_url(1149, 3),
            "https://judge.example/problem/status/1149/3"
        );
    }

    #[test]
    fn classify_response_should_split_end_from_failures() {
        let rows = fs::read_to_string("fixtures/status_page.html").unwrap();
        let error_box = fs::read_to_string("fixtures/error_page.html").unwrap();
        let blocked = fs::read_to_string("fixtures/blocked_page.html").unwrap();

        assert!(matches!(
            classify_response(StatusCode::OK, &rows).unwrap(),
            SolverPage::Solvers(users) if users.len() == 4
        ));
        assert_eq!(
            classify_response(StatusCode::OK, &error_box).unwrap(),
            SolverPage::End
        );
        assert_eq!(
            classify_response(StatusCode::NOT_FOUND, &error_box).unwrap(),
            SolverPage::End
        );

        let err = classify_response(StatusCode::NOT_FOUND, &rows).unwrap_err();
        assert!(matches!(err, FetchError::Status(404)));
        assert!(!err.is_retryable());

        for status in [
            StatusCode::TOO_MANY_REQUESTS,
            StatusCode::INTERNAL_SERVER_ERROR,
            StatusCode::BAD_GATEWAY,
        ] {
            let err = classify_response(status, &error_box).unwrap_err();
            assert!(matches!(err, FetchError::Status(code) if code == status.as_u16()));
            assert!(err.is_retryable());
        }

        let err = classify_response(StatusCode::FORBIDDEN, &blocked).unwrap_err();
        assert!(matches!(err, FetchError::Status(403)));
        assert!(!err.is_retryable());

        let err = classify_response(StatusCode::OK, &blocked).unwrap_err();
        assert!(matches!(err, FetchError::Markup(_)));
    }

    #[test]
    fn backend_should_parse_from_str() {
        assert_eq!("http".parse::<Backend>().unwrap(), Backend::Http);
        assert_eq!("directory".parse::<Backend>().unwrap(), Backend::Directory);
        assert_eq!(Backend::Directory.to_string(), "directory");
    }
}
