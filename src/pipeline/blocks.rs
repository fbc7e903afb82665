//! Content blocks: the flat, ordered unit list the OCR extractor returns.
//!
//! The extractor's wire records are loose (optional fields, `-1` sentinels,
//! integer flags). They are deserialised into [`RawBlock`] and normalised
//! once into [`ContentBlock`], so the rest of the pipeline never has to
//! re-interpret sentinels.

use crate::error::Pdf2DocxError;
use serde::{Deserialize, Serialize};

/// What kind of content a block carries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlockKind {
    Paragraph,
    Image,
    Table,
    Other(String),
}

impl BlockKind {
    fn from_tag(tag: &str) -> Self {
        match tag {
            "paragraph" => BlockKind::Paragraph,
            "image" => BlockKind::Image,
            "table" => BlockKind::Table,
            other => BlockKind::Other(other.to_string()),
        }
    }

    /// The wire tag for this kind.
    pub fn tag(&self) -> &str {
        match self {
            BlockKind::Paragraph => "paragraph",
            BlockKind::Image => "image",
            BlockKind::Table => "table",
            BlockKind::Other(tag) => tag,
        }
    }
}

/// One recognised unit of the source document, in reading order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentBlock {
    pub kind: BlockKind,
    /// Recognised text, table markup for tables, usually empty for images.
    pub text: String,
    /// The extractor flagged this block as header/footer material.
    pub is_footer_like: bool,
    /// Extractor's heading depth guess; only present for heading paragraphs.
    pub outline_level: Option<u32>,
    pub page_id: u32,
    pub image_url: Option<String>,
}

impl ContentBlock {
    /// A plain paragraph on `page_id`.
    pub fn paragraph(text: impl Into<String>, page_id: u32) -> Self {
        Self {
            kind: BlockKind::Paragraph,
            text: text.into(),
            is_footer_like: false,
            outline_level: None,
            page_id,
            image_url: None,
        }
    }

    /// A footer-like paragraph on `page_id`.
    pub fn footer(text: impl Into<String>, page_id: u32) -> Self {
        Self {
            is_footer_like: true,
            ..Self::paragraph(text, page_id)
        }
    }

    /// An image block pointing at `url`.
    pub fn image(url: impl Into<String>, page_id: u32) -> Self {
        Self {
            kind: BlockKind::Image,
            text: String::new(),
            is_footer_like: false,
            outline_level: None,
            page_id,
            image_url: Some(url.into()),
        }
    }

    /// A table block holding HTML markup.
    pub fn table(markup: impl Into<String>, page_id: u32) -> Self {
        Self {
            kind: BlockKind::Table,
            ..Self::paragraph(markup, page_id)
        }
    }

    /// Attach an extractor outline level.
    pub fn with_outline(mut self, level: u32) -> Self {
        self.outline_level = Some(level);
        self
    }
}

/// One block exactly as the extractor serialises it.
#[derive(Debug, Clone, Deserialize)]
pub struct RawBlock {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub content: i64,
    #[serde(default)]
    pub outline_level: Option<i64>,
    #[serde(default)]
    pub page_id: u32,
    #[serde(default)]
    pub image_url: Option<String>,
}

impl From<RawBlock> for ContentBlock {
    fn from(raw: RawBlock) -> Self {
        Self {
            kind: BlockKind::from_tag(&raw.kind),
            text: raw.text,
            is_footer_like: raw.content == 1,
            // -1 is the extractor's "not a heading" sentinel
            outline_level: raw.outline_level.and_then(|l| u32::try_from(l).ok()),
            page_id: raw.page_id,
            image_url: raw.image_url.filter(|u| !u.is_empty()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ExtractionEnvelope {
    #[serde(default)]
    code: Option<i64>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    result: Option<ExtractionResult>,
}

#[derive(Debug, Deserialize)]
struct ExtractionResult {
    #[serde(default)]
    detail: Vec<RawBlock>,
}

/// Parse the extractor's top-level `{ "result": { "detail": [...] } }` body.
pub fn parse_extraction(body: &str) -> Result<Vec<ContentBlock>, Pdf2DocxError> {
    let envelope: ExtractionEnvelope =
        serde_json::from_str(body).map_err(|e| Pdf2DocxError::ExtractionFailed {
            detail: format!("unparseable response: {e}"),
        })?;

    if let Some(code) = envelope.code {
        if code != 200 {
            return Err(Pdf2DocxError::ExtractionRejected {
                code,
                message: envelope.message.unwrap_or_default(),
            });
        }
    }

    let result = envelope.result.ok_or_else(|| Pdf2DocxError::ExtractionRejected {
        code: envelope.code.unwrap_or(0),
        message: envelope
            .message
            .unwrap_or_else(|| "response has no 'result' field".to_string()),
    })?;

    Ok(result.detail.into_iter().map(ContentBlock::from).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_detail_list() {
        let body = r#"{
            "code": 200,
            "result": { "detail": [
                {"type": "paragraph", "text": "1 Introduction", "content": 0, "outline_level": 0, "page_id": 1},
                {"type": "paragraph", "text": "body", "content": 0, "outline_level": -1, "page_id": 1},
                {"type": "paragraph", "text": "Page 3", "content": 1, "page_id": 2},
                {"type": "image", "text": "", "content": 0, "page_id": 2, "image_url": "https://x/y.png"},
                {"type": "table", "text": "<table></table>", "content": 0, "page_id": 3},
                {"type": "formula", "text": "x", "page_id": 3}
            ]}
        }"#;
        let blocks = parse_extraction(body).unwrap();
        assert_eq!(blocks.len(), 6);
        assert_eq!(blocks[0].outline_level, Some(0));
        assert_eq!(blocks[1].outline_level, None, "-1 means no heading");
        assert!(blocks[2].is_footer_like);
        assert_eq!(blocks[3].kind, BlockKind::Image);
        assert_eq!(blocks[3].image_url.as_deref(), Some("https://x/y.png"));
        assert_eq!(blocks[4].kind, BlockKind::Table);
        assert_eq!(blocks[5].kind, BlockKind::Other("formula".into()));
        assert_eq!(blocks[5].kind.tag(), "formula");
    }

    #[test]
    fn missing_result_is_rejected() {
        let err = parse_extraction(r#"{"message": "quota exhausted"}"#).unwrap_err();
        match err {
            Pdf2DocxError::ExtractionRejected { message, .. } => {
                assert_eq!(message, "quota exhausted")
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn error_code_is_rejected() {
        let err = parse_extraction(r#"{"code": 40003, "message": "bad secret"}"#).unwrap_err();
        assert!(matches!(
            err,
            Pdf2DocxError::ExtractionRejected { code: 40003, .. }
        ));
    }

    #[test]
    fn garbage_is_extraction_failure() {
        let err = parse_extraction("<html>502</html>").unwrap_err();
        assert!(matches!(err, Pdf2DocxError::ExtractionFailed { .. }));
    }

    #[test]
    fn builders_set_flags() {
        let b = ContentBlock::footer("p. 3", 2);
        assert!(b.is_footer_like);
        assert_eq!(b.page_id, 2);
        let h = ContentBlock::paragraph("Abstract", 1).with_outline(0);
        assert_eq!(h.outline_level, Some(0));
    }
}
