use serde::Deserialize;

/// Top-level Notion block, reduced to what content extraction needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    Paragraph(String),
    BulletedListItem(String),
    Other(String),
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawBlock {
    #[serde(rename = "type")]
    kind: String,
    paragraph: Option<RichTextBody>,
    bulleted_list_item: Option<RichTextBody>,
}

#[derive(Debug, Deserialize)]
struct RichTextBody {
    #[serde(default)]
    rich_text: Vec<RichText>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RichText {
    #[serde(default)]
    pub plain_text: String,
}

pub(crate) fn plain_text(runs: &[RichText]) -> String {
    runs.iter().map(|r| r.plain_text.as_str()).collect()
}

impl From<RawBlock> for Block {
    fn from(raw: RawBlock) -> Self {
        let text = |body: Option<RichTextBody>| {
            body.map(|b| plain_text(&b.rich_text)).unwrap_or_default()
        };
        match raw.kind.as_str() {
            "paragraph" => Block::Paragraph(text(raw.paragraph)),
            "bulleted_list_item" => Block::BulletedListItem(text(raw.bulleted_list_item)),
            _ => Block::Other(raw.kind),
        }
    }
}

/// Flatten blocks into the text body sent to the classifier.
///
/// Paragraphs are separated by a blank line, bullet items become `- item`
/// lines, other block types and empty runs contribute nothing.
pub fn extract_text(blocks: &[Block]) -> String {
    let mut out = String::new();
    for block in blocks {
        match block {
            Block::Paragraph(t) if !t.is_empty() => {
                out.push_str(t);
                out.push_str("\n\n");
            }
            Block::BulletedListItem(t) if !t.is_empty() => {
                out.push_str("- ");
                out.push_str(t);
                out.push('\n');
            }
            _ => {}
        }
    }
    out.trim().to_string()
}
