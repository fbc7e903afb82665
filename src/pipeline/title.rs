//! Heading depth from a dotted numeric prefix: `"2.3.1 Intro"` is level 3.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Texts at or above this many characters are never headings.
const MAX_TITLE_CHARS: usize = 30;

/// Prefixes with this many dotted parts or more are not section numbers.
const MAX_TITLE_PARTS: usize = 4;

/// Heading depth, always ≥ 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct HeadingLevel(u8);

impl HeadingLevel {
    /// Top-level heading, also the fallback for unnumbered heading text.
    pub const TOP: HeadingLevel = HeadingLevel(1);

    /// Returns `None` for level 0.
    pub fn new(level: u8) -> Option<Self> {
        (level >= 1).then_some(HeadingLevel(level))
    }

    pub fn get(self) -> u8 {
        self.0
    }
}

impl Default for HeadingLevel {
    fn default() -> Self {
        HeadingLevel::TOP
    }
}

impl fmt::Display for HeadingLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Parse the section-number prefix of `text` into a heading level.
///
/// The text before the first space is split on `.`; every part must be an
/// integer and there must be fewer than four parts. Texts of 30 characters
/// or more never qualify.
pub fn parse_title_level(text: &str) -> Option<HeadingLevel> {
    if text.chars().count() >= MAX_TITLE_CHARS {
        return None;
    }

    let prefix = text.split(' ').next().unwrap_or_default();
    let parts: Vec<&str> = prefix.split('.').collect();
    if parts.len() >= MAX_TITLE_PARTS {
        return None;
    }
    if !parts.iter().all(|p| is_integer(p)) {
        return None;
    }

    u8::try_from(parts.len()).ok().and_then(HeadingLevel::new)
}

/// Integer literal: optional sign, then ASCII or full-width digits.
fn is_integer(part: &str) -> bool {
    let part = part.trim();
    let digits = part
        .strip_prefix('+')
        .or_else(|| part.strip_prefix('-'))
        .unwrap_or(part);
    !digits.is_empty()
        && digits
            .chars()
            .all(|c| c.is_ascii_digit() || ('\u{FF10}'..='\u{FF19}').contains(&c))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn level(text: &str) -> Option<u8> {
        parse_title_level(text).map(HeadingLevel::get)
    }

    #[test]
    fn dotted_prefix_depth() {
        assert_eq!(level("2.3.1 Intro"), Some(3));
        assert_eq!(level("2.3 Methods"), Some(2));
        assert_eq!(level("4 Results"), Some(1));
        assert_eq!(level("7"), Some(1));
    }

    #[test]
    fn non_numeric_prefix_fails() {
        assert_eq!(level("A. Overview"), None);
        assert_eq!(level("Abstract"), None);
        assert_eq!(level("图 3 流程"), None);
    }

    #[test]
    fn trailing_dot_fails() {
        // "1." splits into ["1", ""] and the empty part is not an integer
        assert_eq!(level("1. Introduction"), None);
    }

    #[test]
    fn four_parts_fail() {
        assert_eq!(level("1.2.3.4 x"), None);
    }

    #[test]
    fn long_text_fails() {
        let text = "1 This heading is far too long to be a title";
        assert!(text.chars().count() >= 30);
        assert_eq!(level(text), None);
    }

    #[test]
    fn length_counts_characters_not_bytes() {
        let text = "3 研究方法与实验设计概述";
        assert!(text.len() >= 30);
        assert_eq!(level(text), Some(1));
    }

    #[test]
    fn full_width_digits_accepted() {
        assert_eq!(level("１.２ 背景"), Some(2));
    }

    #[test]
    fn signed_parts_accepted() {
        assert_eq!(level("-1 x"), Some(1));
    }

    #[test]
    fn empty_text_fails() {
        assert_eq!(level(""), None);
    }

    #[test]
    fn heading_level_rejects_zero() {
        assert!(HeadingLevel::new(0).is_none());
        assert_eq!(HeadingLevel::default(), HeadingLevel::TOP);
        assert_eq!(HeadingLevel::TOP.to_string(), "1");
    }
}
