//! Query preparation for the LLM backend

/// Prepended to queries so the backend answers in renderable Markdown
pub const MARKDOWN_INSTRUCTION: &str = "Please respond only in Markdown.";

/// Build the text sent to the LLM command
pub fn prepare_query(query: &str, inject: bool) -> String {
    if inject {
        format!("{}\n{}", MARKDOWN_INSTRUCTION, query)
    } else {
        query.to_string()
    }
}
