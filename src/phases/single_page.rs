use anyhow::{Context, Result};
use tracing::info;

use crate::classify::{classify_page, ClassifyRequest, TagClassifier};
use crate::notion::{extract_text, ContentSource, TagWriter};
use crate::vocabulary::Vocabulary;

#[derive(Debug)]
pub struct SinglePageOutcome {
    pub page_id: String,
    pub title: String,
    pub content_chars: usize,
    /// `None` when the page had no content to classify.
    pub tags: Option<Vec<String>>,
    pub written: bool,
}

/// Fetch, classify and write one page without touching the pipeline store
/// and without syncing the database schema.
pub fn run(
    page_id: &str,
    source: &dyn ContentSource,
    classifier: &dyn TagClassifier,
    writer: &dyn TagWriter,
    vocabulary: &Vocabulary,
    guidance: Option<&str>,
) -> Result<SinglePageOutcome> {
    let page = source
        .fetch_page(page_id)
        .with_context(|| format!("Failed to fetch page {}", page_id))?;
    let content = extract_text(&page.blocks);
    let content_chars = content.chars().count();
    info!(page_id, chars = content_chars, "content retrieved");

    let tags = if content.is_empty() {
        None
    } else {
        let request = ClassifyRequest {
            title: &page.title,
            content: &content,
            vocabulary,
            guidance,
        };
        Some(
            classify_page(classifier, &request)
                .with_context(|| format!("Failed to classify page {}", page_id))?,
        )
    };

    let written = match &tags {
        Some(t) if !t.is_empty() => {
            writer
                .set_tags(page_id, t)
                .with_context(|| format!("Failed to write tags to page {}", page_id))?;
            true
        }
        _ => false,
    };

    Ok(SinglePageOutcome {
        page_id: page_id.to_string(),
        title: page.title,
        content_chars,
        tags,
        written,
    })
}
