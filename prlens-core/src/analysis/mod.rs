//! LLM review of pull request contents.
//!
//! Contents are split into [`chunk::Chunk`]s that fit the prompt budget, each
//! chunk is reviewed in its own request, and the joined answers are parsed
//! into an [`AnalysisReport`].

pub mod chunk;
pub mod prompt;
pub mod report;

pub use report::{AnalysisReport, FileIssues, Issue, Summary};

use crate::config::{AnalysisConfig, LlmConfig};
use crate::github::PullRequestContents;
use crate::llm::{ChatMessage, LlmClient};
use crate::AnalysisError;

pub struct Analyzer {
    llm: LlmClient,
    config: AnalysisConfig,
}

impl Analyzer {
    pub fn new(llm: &LlmConfig, config: AnalysisConfig) -> Result<Self, AnalysisError> {
        Ok(Self {
            llm: LlmClient::new(llm)?,
            config,
        })
    }

    pub async fn analyze(
        &self,
        contents: &PullRequestContents,
    ) -> Result<AnalysisReport, AnalysisError> {
        let chunks = chunk::split(contents, self.config.chunk_max_tokens);
        let total = chunks.len();
        let mut answers = Vec::with_capacity(total);

        for (index, chunk) in chunks.iter().enumerate() {
            if index > 0 && !self.config.chunk_delay.is_zero() {
                tokio::time::sleep(self.config.chunk_delay).await;
            }
            tracing::debug!(part = index + 1, total, files = chunk.files.len(), "reviewing chunk");
            let messages = [
                ChatMessage::system(prompt::SYSTEM_PROMPT),
                ChatMessage::user(prompt::user_prompt(chunk, index, total)),
            ];
            answers.push(self.llm.chat(&messages).await?);
        }

        Ok(report::build(
            &contents.files,
            answers.join("\n\n"),
            self.llm.model(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::github::PrFile;
    use mockito::{Matcher, Server};
    use std::time::{Duration, Instant};

    fn contents(patch_len: usize) -> PullRequestContents {
        PullRequestContents {
            title: "Refactor".into(),
            description: String::new(),
            files: vec![
                PrFile {
                    name: "a.rs".into(),
                    patch: "a".repeat(patch_len),
                    status: "modified".into(),
                },
                PrFile {
                    name: "b.rs".into(),
                    patch: "b".repeat(patch_len),
                    status: "modified".into(),
                },
            ],
        }
    }

    fn analyzer(base_url: &str, chunk_max_tokens: usize) -> Analyzer {
        analyzer_with_delay(base_url, chunk_max_tokens, Duration::ZERO)
    }

    fn analyzer_with_delay(base_url: &str, chunk_max_tokens: usize, delay: Duration) -> Analyzer {
        let llm = LlmConfig {
            api_key: Some("sk-test".into()),
            base_url: base_url.to_owned(),
            ..LlmConfig::default()
        };
        Analyzer::new(
            &llm,
            AnalysisConfig {
                chunk_max_tokens,
                chunk_delay: delay,
            },
        )
        .unwrap()
    }

    #[tokio::test]
    async fn single_chunk_answer_is_kept_verbatim() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/chat/completions")
            .with_status(200)
            .with_body(r#"{"choices":[{"message":{"content":"No problems found."}}]}"#)
            .expect(1)
            .create_async()
            .await;

        let report = analyzer(&server.url(), 6000)
            .analyze(&contents(10))
            .await
            .unwrap();
        mock.assert_async().await;
        assert_eq!(report.analysis, "No problems found.");
        assert_eq!(report.summary.total_files, 2);
        assert_eq!(report.model, "gpt-3.5-turbo");
    }

    #[tokio::test]
    async fn chunk_answers_are_joined_with_blank_line() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/v1/chat/completions")
            .match_body(Matcher::Regex("part 1/2".to_string()))
            .with_status(200)
            .with_body(r#"{"choices":[{"message":{"content":"first"}}]}"#)
            .create_async()
            .await;
        server
            .mock("POST", "/v1/chat/completions")
            .match_body(Matcher::Regex("part 2/2".to_string()))
            .with_status(200)
            .with_body(r#"{"choices":[{"message":{"content":"second"}}]}"#)
            .create_async()
            .await;

        // Each file alone is about 100 tokens.
        let report = analyzer(&server.url(), 150)
            .analyze(&contents(400))
            .await
            .unwrap();
        assert_eq!(report.analysis, "first\n\nsecond");
    }

    #[tokio::test]
    async fn later_chunks_wait_for_the_delay() {
        const DELAY: Duration = Duration::from_millis(800);
        let mut server = Server::new_async().await;
        let first = server
            .mock("POST", "/v1/chat/completions")
            .match_body(Matcher::Regex("part 1/2".to_string()))
            .with_status(200)
            .with_body(r#"{"choices":[{"message":{"content":"first"}}]}"#)
            .create_async()
            .await;
        let second = server
            .mock("POST", "/v1/chat/completions")
            .match_body(Matcher::Regex("part 2/2".to_string()))
            .with_status(200)
            .with_body(r#"{"choices":[{"message":{"content":"second"}}]}"#)
            .create_async()
            .await;

        let analyzer = analyzer_with_delay(&server.url(), 150, DELAY);
        let contents = contents(400);
        let started = Instant::now();
        let (report, (first_seen, second_seen)) = tokio::join!(analyzer.analyze(&contents), async {
            tokio::time::sleep(DELAY / 2).await;
            (first.matched_async().await, second.matched_async().await)
        });

        assert!(first_seen, "first chunk must not be delayed");
        assert!(!second_seen, "second chunk sent before the delay");
        assert_eq!(report.unwrap().analysis, "first\n\nsecond");
        assert!(started.elapsed() >= DELAY);
        assert!(second.matched_async().await);
    }

    #[tokio::test]
    async fn single_chunk_is_not_delayed() {
        const DELAY: Duration = Duration::from_secs(30);
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/v1/chat/completions")
            .with_status(200)
            .with_body(r#"{"choices":[{"message":{"content":"ok"}}]}"#)
            .create_async()
            .await;

        let report = tokio::time::timeout(
            Duration::from_secs(10),
            analyzer_with_delay(&server.url(), 6000, DELAY).analyze(&contents(10)),
        )
        .await
        .expect("no delay before the first request")
        .unwrap();
        assert_eq!(report.analysis, "ok");
    }

    #[tokio::test]
    async fn provider_failure_aborts_analysis() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/v1/chat/completions")
            .with_status(500)
            .with_body("boom")
            .create_async()
            .await;

        let err = analyzer(&server.url(), 6000)
            .analyze(&contents(10))
            .await
            .unwrap_err();
        assert!(matches!(err, AnalysisError::Llm(_)));
    }
}
