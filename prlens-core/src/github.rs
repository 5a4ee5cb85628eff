use std::time::Duration;

use reqwest::header::ACCEPT;
use reqwest::{Response, StatusCode, Url};
use serde::{Deserialize, Serialize};

use crate::config::GitHubConfig;
use crate::AnalysisError;

const FILES_PER_PAGE: usize = 100;
/// GitHub stops listing files after 3000 entries.
const MAX_FILE_PAGES: usize = 30;

/// One changed file of a pull request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrFile {
    pub name: String,
    /// Unified diff hunk; empty for binary or oversized files.
    pub patch: String,
    pub status: String,
}

/// What the analysis needs to know about a pull request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PullRequestContents {
    pub title: String,
    pub description: String,
    pub files: Vec<PrFile>,
}

#[derive(Deserialize)]
struct PullRequestPayload {
    title: Option<String>,
    body: Option<String>,
}

#[derive(Deserialize)]
struct FilePayload {
    filename: Option<String>,
    patch: Option<String>,
    status: Option<String>,
}

#[derive(Deserialize)]
struct RepoPayload {
    private: Option<bool>,
}

/// GitHub REST client for reading pull requests.
///
/// # Examples
///
/// ```
/// use prlens_core::github::parse_repo_url;
///
/// let (owner, repo) = parse_repo_url("https://github.com/rust-lang/rust.git").unwrap();
/// assert_eq!(owner, "rust-lang");
/// assert_eq!(repo, "rust");
/// ```
pub struct GitHubClient {
    http: reqwest::Client,
    api_url: String,
    default_token: Option<String>,
}

impl GitHubClient {
    /// # Errors
    ///
    /// Returns [`AnalysisError::Http`] if the HTTP client cannot be built.
    pub fn new(config: &GitHubConfig) -> Result<Self, AnalysisError> {
        let http = reqwest::Client::builder()
            .user_agent("prlens")
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            http,
            api_url: config.api_url.trim_end_matches('/').to_owned(),
            default_token: config.token.clone(),
        })
    }

    /// Fetch title, description and changed files of a pull request.
    ///
    /// `token` takes precedence over the configured default token. Without
    /// any token the repository must be publicly visible.
    ///
    /// # Errors
    ///
    /// Returns the [`AnalysisError`] matching the GitHub response, or
    /// [`AnalysisError::EmptyPullRequest`] when no named file was found.
    pub async fn pull_request_contents(
        &self,
        repo_url: &str,
        pr_number: u64,
        token: Option<&str>,
    ) -> Result<PullRequestContents, AnalysisError> {
        let (owner, repo) = parse_repo_url(repo_url)?;
        let token = token
            .filter(|t| !t.trim().is_empty())
            .or(self.default_token.as_deref());

        if token.is_none() && self.is_private(&owner, &repo).await {
            return Err(AnalysisError::TokenRequired);
        }

        let pr_url = format!("{}/repos/{owner}/{repo}/pulls/{pr_number}", self.api_url);
        tracing::info!(url = %pr_url, authenticated = token.is_some(), "fetching pull request");

        let response = self.get(&pr_url, token).await?;
        let response = check_status(response, token.is_some()).await?;
        let pr: PullRequestPayload = response.json().await?;

        let mut files = Vec::new();
        for page in 1..=MAX_FILE_PAGES {
            let url = format!("{pr_url}/files?per_page={FILES_PER_PAGE}&page={page}");
            let response = check_status(self.get(&url, token).await?, token.is_some()).await?;
            let batch: Vec<FilePayload> = response.json().await?;
            let last_page = batch.len() < FILES_PER_PAGE;
            files.extend(batch.into_iter().filter_map(|f| {
                let name = f.filename.filter(|n| !n.is_empty())?;
                Some(PrFile {
                    name,
                    patch: f.patch.unwrap_or_default(),
                    status: f.status.unwrap_or_else(|| "unknown".to_owned()),
                })
            }));
            if last_page {
                break;
            }
        }

        if files.is_empty() {
            return Err(AnalysisError::EmptyPullRequest);
        }

        tracing::info!(files = files.len(), "fetched pull request contents");
        Ok(PullRequestContents {
            title: pr.title.unwrap_or_else(|| "Untitled PR".to_owned()),
            description: pr.body.unwrap_or_default(),
            files,
        })
    }

    async fn get(&self, url: &str, token: Option<&str>) -> Result<Response, AnalysisError> {
        let mut request = self
            .http
            .get(url)
            .header(ACCEPT, "application/vnd.github.v3+json");
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        Ok(request.send().await?)
    }

    /// Anonymous visibility check. Anything but a readable public repository
    /// counts as private.
    async fn is_private(&self, owner: &str, repo: &str) -> bool {
        let url = format!("{}/repos/{owner}/{repo}", self.api_url);
        let response = match self.get(&url, None).await {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(error = %e, "repository visibility check failed");
                return true;
            }
        };
        if !response.status().is_success() {
            return true;
        }
        match response.json::<RepoPayload>().await {
            Ok(payload) => payload.private.unwrap_or(true),
            Err(e) => {
                tracing::warn!(error = %e, "unreadable repository metadata");
                true
            }
        }
    }
}

async fn check_status(response: Response, authenticated: bool) -> Result<Response, AnalysisError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    match status {
        StatusCode::NOT_FOUND => Err(AnalysisError::PullRequestNotFound),
        StatusCode::UNAUTHORIZED => Err(AnalysisError::Authentication(if authenticated {
            "invalid GitHub token or insufficient permissions".to_owned()
        } else {
            "this repository requires authentication".to_owned()
        })),
        StatusCode::FORBIDDEN => Err(AnalysisError::Forbidden),
        _ => {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<serde_json::Value>(&body)
                .ok()
                .and_then(|v| v.get("message")?.as_str().map(str::to_owned))
                .unwrap_or(body);
            Err(AnalysisError::GitHubApi {
                status: status.as_u16(),
                message,
            })
        }
    }
}

/// Split `https://host/{owner}/{repo}` into owner and repository name.
///
/// A trailing slash and a `.git` suffix are tolerated.
///
/// # Errors
///
/// Returns [`AnalysisError::InvalidRepoUrl`] for anything else.
pub fn parse_repo_url(repo_url: &str) -> Result<(String, String), AnalysisError> {
    let invalid = || AnalysisError::InvalidRepoUrl(repo_url.to_owned());
    let url = Url::parse(repo_url.trim()).map_err(|_| invalid())?;
    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return Err(invalid());
    }
    let segments: Vec<&str> = url
        .path()
        .trim_matches('/')
        .split('/')
        .filter(|s| !s.is_empty())
        .collect();
    let [owner, repo] = segments.as_slice() else {
        return Err(invalid());
    };
    let repo = repo.strip_suffix(".git").unwrap_or(*repo);
    if repo.is_empty() {
        return Err(invalid());
    }
    Ok(((*owner).to_owned(), repo.to_owned()))
}
