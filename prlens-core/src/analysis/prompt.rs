use std::fmt::Write;

use super::chunk::Chunk;

pub const SYSTEM_PROMPT: &str = "You are an expert code reviewer. Focus on critical issues \
and provide clear, actionable feedback.";

/// User prompt for chunk `index` (zero based) of `total`.
pub fn user_prompt(chunk: &Chunk<'_>, index: usize, total: usize) -> String {
    let mut prompt = format!(
        "Analyze these changes (part {}/{total}):\nPR Title: {}\n",
        index + 1,
        chunk.title
    );
    if !chunk.description.trim().is_empty() {
        let _ = writeln!(prompt, "PR Description:\n{}", chunk.description.trim());
    }

    prompt.push_str("\nChanges to analyze:\n");
    for file in &chunk.files {
        let _ = write!(prompt, "\nFile: {}\nChanges:\n{}\n", file.name, file.patch);
    }

    prompt.push_str(
        "\nPlease review the code for:\n\
         1. Critical issues (syntax errors, security vulnerabilities)\n\
         2. Performance concerns\n\
         3. Code quality issues\n\
         4. Best practice violations\n\
         \n\
         Format each issue as:\n\
         Type: (line number) - Description - Suggested fix\n",
    );
    prompt
}
