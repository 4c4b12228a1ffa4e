//! Prompt used to extract data from one chunk of page text.

/// Instruction framing for a single extraction call.
///
/// `{content}` receives the chunk text; `{description}` the user's request.
pub const EXTRACTION_TEMPLATE: &str = "You are extracting specific information from the following text content: {content}\n\n\
Follow these instructions exactly:\n\n\
1. **Extract Information:** Only extract the information that directly matches this description: {description}\n\
2. **No Extra Content:** Do not add any other text, comments, or explanations to your response.\n\
3. **Empty Response:** If nothing matches the description, return an empty string ('').\n\
4. **Direct Data Only:** Your output must contain only the data that was explicitly requested.";

/// Render [`EXTRACTION_TEMPLATE`] for one chunk.
///
/// ```
/// use gleaner_llm::prompt::render_extraction_prompt;
///
/// let prompt = render_extraction_prompt("Price: $10", "extract the price");
/// assert!(prompt.contains("Price: $10"));
/// assert!(prompt.contains("extract the price"));
/// ```
pub fn render_extraction_prompt(content: &str, description: &str) -> String {
    // Substitute the description first so braces inside page text are never
    // mistaken for a placeholder.
    let (head, tail) = EXTRACTION_TEMPLATE
        .split_once("{content}")
        .unwrap_or((EXTRACTION_TEMPLATE, ""));
    let tail = tail.replace("{description}", description);
    let mut out = String::with_capacity(head.len() + content.len() + tail.len());
    out.push_str(head);
    out.push_str(content);
    out.push_str(&tail);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholders_are_all_replaced() {
        let prompt = render_extraction_prompt("chunk", "desc");
        assert!(!prompt.contains("{content}"));
        assert!(!prompt.contains("{description}"));
    }

    #[test]
    fn page_text_with_placeholder_syntax_is_left_alone() {
        let prompt = render_extraction_prompt("template uses {description} literally", "prices");
        assert!(prompt.contains("template uses {description} literally"));
        assert!(prompt.contains("matches this description: prices"));
    }
}
