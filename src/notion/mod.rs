pub mod blocks;
pub mod client;

use std::sync::LazyLock;

use regex::Regex;

use crate::error::Result;
pub use blocks::{extract_text, Block};
pub use client::NotionClient;

static ID_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}|[0-9a-f]{32}",
    )
    .unwrap()
});

/// One page as reported by the database listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryEntry {
    pub page_id: String,
    pub title: Option<String>,
}

/// A single page of a cursor-paginated database listing.
#[derive(Debug, Clone, Default)]
pub struct DirectoryPage {
    pub entries: Vec<DirectoryEntry>,
    pub next_cursor: Option<String>,
}

#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub title: String,
    pub blocks: Vec<Block>,
}

/// Enumerates the pages of a database.
pub trait PageDirectory {
    fn list_pages(&self, database_id: &str, cursor: Option<&str>) -> Result<DirectoryPage>;
}

/// Retrieves a page's title and top-level blocks.
pub trait ContentSource {
    fn fetch_page(&self, page_id: &str) -> Result<FetchedPage>;
}

/// Writes tags onto pages and keeps the database's tag options in sync.
pub trait TagWriter {
    fn registered_options(&self, database_id: &str) -> Result<Vec<String>>;
    fn sync_schema(&self, database_id: &str, new_options: &[String]) -> Result<()>;
    fn set_tags(&self, page_id: &str, tags: &[String]) -> Result<()>;
}

/// Pull a Notion id out of a raw id or a page/database URL.
///
/// Notion URLs end in `<slug>-<32 hex>` optionally followed by a query
/// string; the last id-shaped token before the query wins.
pub fn notion_id_from_input(input: &str) -> Option<String> {
    let path = input.trim().split(['?', '#']).next().unwrap_or_default();
    ID_RE
        .find_iter(path)
        .last()
        .map(|m| m.as_str().to_lowercase())
}
