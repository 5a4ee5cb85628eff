use crate::github::{PrFile, PullRequestContents};

/// A slice of a pull request small enough for one LLM request.
#[derive(Debug, Clone)]
pub struct Chunk<'a> {
    pub title: &'a str,
    /// Only the first chunk carries the description.
    pub description: &'a str,
    pub files: Vec<&'a PrFile>,
}

/// Rough token count: four characters per token.
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count() / 4
}

fn file_tokens(file: &PrFile) -> usize {
    estimate_tokens(&format!("File: {}\nChanges:\n{}", file.name, file.patch))
}

/// Pack files greedily, in order, into chunks of at most `max_tokens`.
///
/// A file larger than the budget gets a chunk of its own. At least one
/// chunk is always returned.
pub fn split(contents: &PullRequestContents, max_tokens: usize) -> Vec<Chunk<'_>> {
    let mut chunks = Vec::new();
    let mut current = Chunk {
        title: &contents.title,
        description: &contents.description,
        files: Vec::new(),
    };
    let mut current_tokens =
        estimate_tokens(&contents.title) + estimate_tokens(&contents.description);

    for file in &contents.files {
        let tokens = file_tokens(file);
        if current_tokens + tokens > max_tokens && !current.files.is_empty() {
            chunks.push(std::mem::replace(
                &mut current,
                Chunk {
                    title: &contents.title,
                    description: "",
                    files: vec![file],
                },
            ));
            current_tokens = estimate_tokens(&contents.title) + tokens;
        } else {
            current.files.push(file);
            current_tokens += tokens;
        }
    }

    if !current.files.is_empty() || chunks.is_empty() {
        chunks.push(current);
    }
    chunks
}
