//! Post-processing: deterministic cleanup of resolver output before it is
//! written into the document.
//!
//! Formula recognisers and vision models return text with artefacts that are
//! harmless to them but wrong in a Word paragraph:
//!
//! - LaTeX already wrapped in `$`, `$$`, `\(` or `\[`, which would double up
//!   with the `$...$` the router adds
//! - descriptions wrapped in a Markdown code fence
//! - `\r\n` line endings and runs of blank lines
//! - zero-width characters and BOMs
//!
//! Each rule is a small pure function, applied in a fixed order.

use once_cell::sync::Lazy;
use regex::Regex;

/// Normalise recogniser LaTeX to a bare expression.
///
/// Rules (applied in order):
/// 1. Strip an outer code fence (```` ```latex ````)
/// 2. Remove invisible Unicode
/// 3. Normalise line endings
/// 4. Unwrap one layer of math delimiters
/// 5. Trim
pub fn clean_latex(input: &str) -> String {
    let s = strip_code_fences(input);
    let s = remove_invisible_chars(&s);
    let s = normalise_line_endings(&s);
    unwrap_math_delimiters(s.trim()).trim().to_string()
}

/// Normalise a figure description to plain paragraph text.
///
/// Rules (applied in order):
/// 1. Strip an outer code fence
/// 2. Normalise line endings
/// 3. Trim trailing whitespace per line
/// 4. Collapse 2+ blank lines down to 1
/// 5. Remove invisible Unicode
/// 6. Trim
pub fn clean_description(input: &str) -> String {
    let s = strip_code_fences(input);
    let s = normalise_line_endings(&s);
    let s = trim_trailing_whitespace(&s);
    let s = collapse_blank_lines(&s);
    let s = remove_invisible_chars(&s);
    s.trim().to_string()
}

// ── Rule: Strip outer code fences ───────────────────────────────────────────

static RE_OUTER_FENCES: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)^```(?:markdown|md|latex|tex|text)?[ \t]*\r?\n(.*?)\r?\n```\s*$").unwrap()
});

fn strip_code_fences(input: &str) -> String {
    if let Some(caps) = RE_OUTER_FENCES.captures(input.trim()) {
        caps[1].to_string()
    } else {
        input.to_string()
    }
}

// ── Rule: Normalise line endings ────────────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

// ── Rule: Trim trailing whitespace per line ─────────────────────────────────

fn trim_trailing_whitespace(input: &str) -> String {
    input
        .lines()
        .map(|line| line.trim_end())
        .collect::<Vec<_>>()
        .join("\n")
}

// ── Rule: Collapse blank lines ──────────────────────────────────────────────

static RE_BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

fn collapse_blank_lines(input: &str) -> String {
    RE_BLANK_LINES.replace_all(input, "\n\n").to_string()
}

// ── Rule: Remove invisible Unicode characters ───────────────────────────────

fn remove_invisible_chars(input: &str) -> String {
    input.replace(
        [
            '\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{200C}', '\u{200D}', '\u{2060}',
        ],
        "",
    )
}

// ── Rule: Unwrap math delimiters ────────────────────────────────────────────

/// Longest delimiters first so `$$x$$` is not read as `$` + `$x$` + `$`.
const MATH_DELIMITERS: [(&str, &str); 4] = [("$$", "$$"), ("\\[", "\\]"), ("\\(", "\\)"), ("$", "$")];

fn unwrap_math_delimiters(input: &str) -> &str {
    for (open, close) in MATH_DELIMITERS {
        if input.len() >= open.len() + close.len() {
            if let Some(inner) = input
                .strip_prefix(open)
                .and_then(|rest| rest.strip_suffix(close))
            {
                return inner;
            }
        }
    }
    input
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latex_plain_passthrough() {
        assert_eq!(clean_latex("  E = mc^2 \n"), "E = mc^2");
    }

    #[test]
    fn test_latex_unwraps_each_delimiter() {
        assert_eq!(clean_latex("$x^2$"), "x^2");
        assert_eq!(clean_latex("$$ \\sum_i a_i $$"), "\\sum_i a_i");
        assert_eq!(clean_latex("\\[a+b\\]"), "a+b");
        assert_eq!(clean_latex("\\(a\\)"), "a");
    }

    #[test]
    fn test_latex_unwraps_one_layer_only() {
        assert_eq!(clean_latex("$$$x$$$"), "$x$");
    }

    #[test]
    fn test_latex_inner_dollars_untouched() {
        assert_eq!(clean_latex("a $b$ c"), "a $b$ c");
        // A lone "$" is not a wrapped expression
        assert_eq!(clean_latex("$"), "$");
    }

    #[test]
    fn test_latex_fenced() {
        assert_eq!(clean_latex("```latex\n\\frac{1}{2}\n```"), "\\frac{1}{2}");
    }

    #[test]
    fn test_latex_invisible_removed() {
        assert_eq!(clean_latex("\u{FEFF}x\u{200B}+y"), "x+y");
    }

    #[test]
    fn test_description_unfenced_and_trimmed() {
        let raw = "```markdown\n该图展示了系统流程。  \r\n\r\n\r\n\r\n第二段。\n```";
        assert_eq!(clean_description(raw), "该图展示了系统流程。\n\n第二段。");
    }

    #[test]
    fn test_description_passthrough() {
        assert_eq!(clean_description("A plain answer."), "A plain answer.");
    }

    #[test]
    fn test_normalise_line_endings() {
        assert_eq!(normalise_line_endings("a\r\nb\rc"), "a\nb\nc");
    }

    #[test]
    fn test_collapse_blank_lines() {
        assert_eq!(collapse_blank_lines("a\n\n\n\nb"), "a\n\nb");
        assert_eq!(collapse_blank_lines("a\n\nb"), "a\n\nb");
    }
}
