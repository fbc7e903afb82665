//! Prompts for the figure-description model.
//!
//! Kept in one place so the wording can be changed and tested without
//! touching the adapter that sends it.

/// System prompt sent before every figure description request.
pub const DESCRIPTION_SYSTEM_PROMPT: &str = "You explain figures taken from technical documents. \
Answer in plain prose in the language of the caption. Do not use Markdown, \
headings or lists, and do not repeat the caption.";

/// User prompt asking for a ~500 character explanation of the captioned figure.
pub fn describe_figure_prompt(caption: &str) -> String {
    format!("这是{caption}，请你对这张图的工作原理或流程等做出详细解释，字数在500字左右")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn caption_is_embedded_verbatim() {
        let p = describe_figure_prompt("图 3 系统架构");
        assert!(p.starts_with("这是图 3 系统架构，"));
        assert!(p.ends_with("字数在500字左右"));
    }

    #[test]
    fn system_prompt_forbids_markdown() {
        assert!(DESCRIPTION_SYSTEM_PROMPT.contains("Markdown"));
    }
}
