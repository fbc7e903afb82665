//! Paragraph classification: footer, heading or body text.
//!
//! A document starts in [`Region::Preamble`] (title page, abstract, front
//! matter) and switches once, for good, to [`Region::MainBody`] at the first
//! extractor heading whose text starts with a digit. Before the switch the
//! extractor's outline level decides what is a heading; after it, only a
//! numeric section prefix does.

use crate::pipeline::blocks::ContentBlock;
use crate::pipeline::title::{parse_title_level, HeadingLevel};
use serde::{Deserialize, Serialize};

/// Which part of the document the router is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Region {
    #[default]
    Preamble,
    MainBody,
}

/// Structural role of a paragraph block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Footer-like text long enough to keep.
    Footer,
    /// Footer-like text too short to keep (page numbers and the like).
    Dropped,
    Heading(HeadingLevel),
    Body,
}

/// Outcome of classifying one paragraph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub role: Role,
    /// Region to use for the next block.
    pub region: Region,
}

/// Classify a paragraph block in `region`.
///
/// `min_footer_chars` is the shortest footer text that is kept.
pub fn classify(block: &ContentBlock, region: Region, min_footer_chars: usize) -> Decision {
    if block.is_footer_like {
        let role = if block.text.chars().count() >= min_footer_chars {
            Role::Footer
        } else {
            Role::Dropped
        };
        return Decision { role, region };
    }

    match region {
        Region::Preamble => match block.outline_level {
            Some(_) if starts_with_digit(&block.text) => Decision {
                role: Role::Heading(parse_title_level(&block.text).unwrap_or_default()),
                region: Region::MainBody,
            },
            Some(_) => Decision {
                role: Role::Heading(HeadingLevel::TOP),
                region,
            },
            None => Decision {
                role: Role::Body,
                region,
            },
        },
        Region::MainBody => Decision {
            role: parse_title_level(&block.text).map_or(Role::Body, Role::Heading),
            region,
        },
    }
}

fn starts_with_digit(text: &str) -> bool {
    text.chars().next().is_some_and(|c| c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn heading(level: u8) -> Role {
        Role::Heading(HeadingLevel::new(level).unwrap())
    }

    #[test]
    fn short_footer_dropped_long_footer_kept() {
        for region in [Region::Preamble, Region::MainBody] {
            let d = classify(&ContentBlock::footer("12", 1), region, 3);
            assert_eq!(d.role, Role::Dropped);
            assert_eq!(d.region, region);

            let d = classify(&ContentBlock::footer("Page 12", 1), region, 3);
            assert_eq!(d.role, Role::Footer);
            assert_eq!(d.region, region);
        }
    }

    #[test]
    fn footer_flag_beats_outline_level() {
        let b = ContentBlock::footer("1 Running head", 1).with_outline(0);
        let d = classify(&b, Region::Preamble, 3);
        assert_eq!(d.role, Role::Footer);
        assert_eq!(d.region, Region::Preamble);
    }

    #[test]
    fn numbered_outline_heading_enters_main_body() {
        let b = ContentBlock::paragraph("2.1 Setup", 1).with_outline(1);
        let d = classify(&b, Region::Preamble, 3);
        assert_eq!(d.role, heading(2));
        assert_eq!(d.region, Region::MainBody);
    }

    #[test]
    fn unparseable_trigger_defaults_to_level_one() {
        // Starts with a digit but "1." leaves an empty part
        let b = ContentBlock::paragraph("1. Introduction", 1).with_outline(0);
        let d = classify(&b, Region::Preamble, 3);
        assert_eq!(d.role, heading(1));
        assert_eq!(d.region, Region::MainBody);
    }

    #[test]
    fn unnumbered_outline_heading_stays_in_preamble() {
        let b = ContentBlock::paragraph("Abstract", 1).with_outline(2);
        let d = classify(&b, Region::Preamble, 3);
        assert_eq!(d.role, heading(1));
        assert_eq!(d.region, Region::Preamble);
    }

    #[test]
    fn empty_outline_heading_is_not_a_trigger() {
        let b = ContentBlock::paragraph("", 1).with_outline(0);
        let d = classify(&b, Region::Preamble, 3);
        assert_eq!(d.role, heading(1));
        assert_eq!(d.region, Region::Preamble);
    }

    #[test]
    fn preamble_ignores_numeric_prefix_without_outline() {
        let b = ContentBlock::paragraph("3 apples", 1);
        let d = classify(&b, Region::Preamble, 3);
        assert_eq!(d.role, Role::Body);
        assert_eq!(d.region, Region::Preamble);
    }

    #[test]
    fn main_body_uses_numeric_prefix_only() {
        let numbered = ContentBlock::paragraph("3.2 Results", 4);
        assert_eq!(classify(&numbered, Region::MainBody, 3).role, heading(2));

        // Outline level is no longer trusted
        let outlined = ContentBlock::paragraph("Discussion", 4).with_outline(0);
        assert_eq!(classify(&outlined, Region::MainBody, 3).role, Role::Body);

        let body = ContentBlock::paragraph("We observe that the error drops.", 4);
        let d = classify(&body, Region::MainBody, 3);
        assert_eq!(d.role, Role::Body);
        assert_eq!(d.region, Region::MainBody);
    }

    #[test]
    fn min_footer_chars_is_configurable() {
        let b = ContentBlock::footer("abc", 1);
        assert_eq!(classify(&b, Region::MainBody, 4).role, Role::Dropped);
        assert_eq!(classify(&b, Region::MainBody, 0).role, Role::Footer);
    }
}
