use std::borrow::Cow;

use prlens_core::AnalysisRequest;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::{Validate, ValidationError};

/// Body of `POST /api/analyze`.
#[derive(Deserialize, ToSchema, Validate)]
pub struct AnalyzeRequest {
    /// `https://github.com/{owner}/{repo}`
    #[validate(custom(function = "not_blank"))]
    pub repo_url: String,

    #[validate(range(min = 1, message = "pr_number must be a positive integer"))]
    pub pr_number: i64,

    /// Needed for private repositories unless the worker has a default token.
    #[serde(default)]
    pub github_token: Option<String>,
}

impl AnalyzeRequest {
    /// Job payload; call only after validation.
    pub fn to_job(&self) -> AnalysisRequest {
        AnalysisRequest {
            repo_url: self.repo_url.trim().to_owned(),
            pr_number: u64::try_from(self.pr_number).unwrap_or_default(),
            github_token: self
                .github_token
                .as_deref()
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_owned),
        }
    }
}

fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("blank")
            .with_message(Cow::Borrowed("repo_url must not be empty")));
    }
    Ok(())
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AnalyzeResponse {
    pub task_id: String,
}

#[cfg(test)]
mod test {
    use super::*;

    fn request(repo_url: &str, pr_number: i64) -> AnalyzeRequest {
        AnalyzeRequest {
            repo_url: repo_url.into(),
            pr_number,
            github_token: Some("  ".into()),
        }
    }

    #[test]
    fn blank_repo_url_is_rejected() {
        let errors = request("   ", 5).validate().unwrap_err();
        assert!(errors.field_errors().contains_key("repo_url"));
    }

    #[test]
    fn non_positive_pr_number_is_rejected() {
        for n in [0, -3] {
            let errors = request("https://github.com/a/b", n).validate().unwrap_err();
            assert!(errors.field_errors().contains_key("pr_number"));
        }
    }

    #[test]
    fn job_drops_blank_token() {
        let job = request(" https://github.com/a/b ", 5).to_job();
        assert_eq!(job.repo_url, "https://github.com/a/b");
        assert_eq!(job.pr_number, 5);
        assert!(job.github_token.is_none());
    }
}
