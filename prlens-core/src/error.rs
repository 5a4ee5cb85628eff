use std::time::Duration;

use thiserror::Error;

/// Errors raised while fetching or analysing a pull request.
///
/// The `Display` text of these errors is what ends up in the `error`
/// field of a failed task, so messages are written for the API caller.
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// The repository URL does not look like `https://host/{owner}/{repo}`.
    #[error("Invalid repository URL format: {0}")]
    InvalidRepoUrl(String),

    /// GitHub answered 404 for the pull request.
    #[error("Pull request not found")]
    PullRequestNotFound,

    /// The repository is private (or invisible) and no token was supplied.
    #[error("GitHub token required for private repository access")]
    TokenRequired,

    /// GitHub rejected the credentials (HTTP 401).
    #[error("GitHub authentication failed: {0}")]
    Authentication(String),

    /// GitHub answered 403: rate limited or the token lacks access.
    #[error("Rate limit exceeded or access denied")]
    Forbidden,

    /// Any other non-success status from the GitHub API.
    #[error("GitHub API error {status}: {message}")]
    GitHubApi { status: u16, message: String },

    /// The pull request has no files with a name.
    #[error("No valid files found in PR")]
    EmptyPullRequest,

    /// The LLM provider failed or returned something unusable.
    #[error("LLM error: {0}")]
    Llm(String),

    /// A required setting is missing.
    #[error("configuration error: {0}")]
    Config(String),

    /// The task ran longer than the configured limit.
    #[error("task exceeded the time limit of {0:?}")]
    TimeLimit(Duration),

    /// Transport-level HTTP failure (DNS, TLS, connection reset, ...).
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn authentication_error_mentions_authentication() {
        let err = AnalysisError::Authentication("bad credentials".into());
        assert!(err.to_string().contains("authentication"));
    }

    #[test]
    fn api_error_shows_status() {
        let err = AnalysisError::GitHubApi {
            status: 502,
            message: "bad gateway".into(),
        };
        assert_eq!(err.to_string(), "GitHub API error 502: bad gateway");
    }
}
