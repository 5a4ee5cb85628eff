//! Turns the free-form review text into a per-file issue list.

use std::sync::LazyLock;

use regex::{Captures, Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

use crate::github::PrFile;

const DEFAULT_SUGGESTION: &str = "See description for details";

/// `Type: line N - description - suggestion`
static LINE_FIRST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(?P<type>error|warning|issue|critical):\s*(?:line\s*)?(?P<line>\d+)\s*-\s*(?P<description>[^-]+)(?:\s*-\s*(?P<solution>.+))?",
    )
    .expect("valid issue pattern")
});

/// `Type: description (line N) - suggestion`
static LINE_LAST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(?P<type>error|warning|issue|critical):\s*(?P<description>[^(]+)\s*\(line\s*(?P<line>\d+)\)(?:\s*-\s*(?P<solution>.+))?",
    )
    .expect("valid issue pattern")
});

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    #[serde(rename = "type")]
    pub kind: String,
    /// 0 when the issue is not tied to a line.
    pub line: u64,
    pub description: String,
    pub suggestion: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileIssues {
    pub name: String,
    pub issues: Vec<Issue>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    pub total_files: usize,
    /// Issues other than `Info` and `Analysis` entries.
    pub total_issues: usize,
    /// `Error` and `Critical` issues.
    pub critical_issues: usize,
}

/// Stored result of a successful task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisReport {
    /// The model's answer, verbatim.
    pub analysis: String,
    pub files: Vec<FileIssues>,
    pub summary: Summary,
    pub model: String,
}

pub fn build(files: &[PrFile], analysis: String, model: &str) -> AnalysisReport {
    let issues = extract_issues(&analysis);

    let files_with_issues = files
        .iter()
        .map(|file| {
            let mentions = mention_matcher(&file.name);
            let matched: Vec<Issue> = issues
                .iter()
                .filter(|issue| {
                    issue.line > 0 && (files.len() == 1 || mentions(issue.description.as_str()))
                })
                .cloned()
                .collect();
            FileIssues {
                name: file.name.clone(),
                issues: if matched.is_empty() {
                    vec![Issue {
                        kind: "Info".to_owned(),
                        line: 0,
                        description: "No specific issues detected".to_owned(),
                        suggestion: "No action needed".to_owned(),
                    }]
                } else {
                    matched
                },
            }
        })
        .collect();

    let summary = Summary {
        total_files: files.len(),
        total_issues: issues
            .iter()
            .filter(|i| !matches!(i.kind.to_lowercase().as_str(), "info" | "analysis"))
            .count(),
        critical_issues: issues
            .iter()
            .filter(|i| matches!(i.kind.to_lowercase().as_str(), "error" | "critical"))
            .count(),
    };

    AnalysisReport {
        analysis,
        files: files_with_issues,
        summary,
        model: model.to_owned(),
    }
}

/// Issues in either format; every paragraph becomes an `Analysis` issue
/// when neither format matches.
pub fn extract_issues(analysis: &str) -> Vec<Issue> {
    let issues: Vec<Issue> = [&*LINE_FIRST, &*LINE_LAST]
        .into_iter()
        .flat_map(|pattern| pattern.captures_iter(analysis))
        .filter_map(|caps| issue_from(&caps))
        .collect();
    if !issues.is_empty() {
        return issues;
    }

    analysis
        .split("\n\n")
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(|paragraph| Issue {
            kind: "Analysis".to_owned(),
            line: 0,
            description: paragraph.to_owned(),
            suggestion: DEFAULT_SUGGESTION.to_owned(),
        })
        .collect()
}

fn issue_from(caps: &Captures<'_>) -> Option<Issue> {
    let line = caps.name("line")?.as_str().parse().ok()?;
    Some(Issue {
        kind: capitalize(caps.name("type")?.as_str()),
        line,
        description: caps.name("description")?.as_str().trim().to_owned(),
        suggestion: caps
            .name("solution")
            .map(|m| m.as_str().trim())
            .filter(|s| !s.is_empty())
            .unwrap_or(DEFAULT_SUGGESTION)
            .to_owned(),
    })
}

fn capitalize(word: &str) -> String {
    let lower = word.to_lowercase();
    let mut chars = lower.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Case-insensitive whole-word match of `file_name`.
fn mention_matcher(file_name: &str) -> impl Fn(&str) -> bool {
    let pattern = RegexBuilder::new(&format!(r"\b{}\b", regex::escape(file_name)))
        .case_insensitive(true)
        .build()
        .ok();
    let needle = file_name.to_lowercase();
    move |text: &str| match &pattern {
        Some(re) => re.is_match(text),
        None => text.to_lowercase().contains(&needle),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(name: &str) -> PrFile {
        PrFile {
            name: name.into(),
            patch: String::new(),
            status: "modified".into(),
        }
    }

    #[test]
    fn parses_line_first_format() {
        let issues = extract_issues("ERROR: line 12 - unchecked index - use get()");
        assert_eq!(
            issues,
            vec![Issue {
                kind: "Error".into(),
                line: 12,
                description: "unchecked index".into(),
                suggestion: "use get()".into(),
            }]
        );
    }

    #[test]
    fn parses_line_last_format() {
        let issues = extract_issues("Warning: slow loop in parser.rs (line 7) - hoist the lookup");
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].kind, "Warning");
        assert_eq!(issues[0].line, 7);
        assert_eq!(issues[0].description, "slow loop in parser.rs");
        assert_eq!(issues[0].suggestion, "hoist the lookup");
    }

    #[test]
    fn missing_suggestion_uses_default() {
        let issues = extract_issues("issue: 3 - shadowed variable");
        assert_eq!(issues[0].suggestion, DEFAULT_SUGGESTION);
    }

    #[test]
    fn unstructured_text_becomes_analysis_paragraphs() {
        let issues = extract_issues("Looks fine overall.\n\n  \n\nConsider more tests.");
        assert_eq!(issues.len(), 2);
        assert!(issues.iter().all(|i| i.kind == "Analysis" && i.line == 0));
    }

    #[test]
    fn single_file_receives_every_line_issue() {
        let analysis = "Critical: line 4 - SQL injection - bind parameters\n\
                        Warning: line 9 - unused import - remove it"
            .to_owned();
        let report = build(&[file("db.rs")], analysis.clone(), "model-x");
        assert_eq!(report.analysis, analysis);
        assert_eq!(report.model, "model-x");
        assert_eq!(report.files[0].issues.len(), 2);
        assert_eq!(
            report.summary,
            Summary {
                total_files: 1,
                total_issues: 2,
                critical_issues: 1,
            }
        );
    }

    #[test]
    fn issues_are_grouped_by_mentioned_file() {
        let analysis = "Error: line 3 - panic in src/lib.rs - return a Result".to_owned();
        let report = build(&[file("src/lib.rs"), file("README.md")], analysis, "m");
        assert_eq!(report.files[0].issues[0].kind, "Error");
        assert_eq!(report.files[1].issues[0].kind, "Info");
        assert_eq!(report.files[1].issues[0].description, "No specific issues detected");
    }

    #[test]
    fn analysis_paragraphs_do_not_count_as_issues() {
        let report = build(&[file("a.rs")], "All good.".to_owned(), "m");
        assert_eq!(report.summary.total_issues, 0);
        assert_eq!(report.files[0].issues[0].kind, "Info");
    }
}
