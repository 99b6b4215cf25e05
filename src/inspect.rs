//! Read-only views of the pipeline store.

use anyhow::Result;
use clap::ValueEnum;
use rusqlite::Connection;

use crate::db::{self, PageRecord};
use crate::phases::{truncate, Phase};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DebugTarget {
    /// Page ids and per-page state after discovery
    Pages,
    /// Titles and content previews after fetching
    Content,
    /// Assigned tags and written flags after classify/write
    Tags,
    /// Pages without tags, including unfetched and empty ones
    Missing,
}

fn tags_label(record: &PageRecord) -> String {
    match &record.new_tags {
        None => "-".to_string(),
        Some(t) if t.is_empty() => "(none)".to_string(),
        Some(t) => t.join(", "),
    }
}

fn state_label(record: &PageRecord) -> &'static str {
    if record.written {
        "written"
    } else if record.pending_write() {
        "tagged"
    } else if record.classified {
        "no tags"
    } else if record.content.is_some() {
        "fetched"
    } else {
        "discovered"
    }
}

fn preview(content: Option<&str>, chars: usize) -> String {
    match content {
        None => "(not fetched)".to_string(),
        Some("") => "(no content)".to_string(),
        Some(c) => truncate(&c.replace('\n', " "), chars),
    }
}

/// Render the report for one debug target.
pub fn render(records: &[PageRecord], target: DebugTarget, chars: usize) -> String {
    let mut out = String::new();
    let mut shown = 0usize;
    for r in records {
        let title = r.title.as_deref().unwrap_or("(untitled)");
        let block = match target {
            DebugTarget::Pages => format!(
                "{}  [{}]{}\n",
                r.page_id,
                state_label(r),
                r.last_error
                    .as_deref()
                    .map(|e| format!("  error: {}", e))
                    .unwrap_or_default()
            ),
            DebugTarget::Content => format!(
                "Page ID: {}\nTitle: {}\nContent: {}\n---\n",
                r.page_id,
                title,
                preview(r.content.as_deref(), chars)
            ),
            DebugTarget::Tags => format!(
                "Page ID: {}\nTitle: {}\nTags: {}\nWritten: {}\n---\n",
                r.page_id,
                title,
                tags_label(r),
                r.written
            ),
            DebugTarget::Missing => {
                if r.new_tags.as_ref().is_some_and(|t| !t.is_empty()) {
                    continue;
                }
                format!(
                    "Page ID: {}\nContent Snippet: {}\n---\n",
                    r.page_id,
                    preview(r.content.as_deref(), chars)
                )
            }
        };
        out.push_str(&block);
        shown += 1;
    }
    if target == DebugTarget::Missing && shown == 0 {
        out.push_str("All pages have tags.\n");
    } else {
        out.push_str(&format!("\n{} of {} pages shown.\n", shown, records.len()));
    }
    out
}

pub fn print(conn: &Connection, target: DebugTarget, chars: usize) -> Result<()> {
    let records = db::load_pages(conn)?;
    if records.is_empty() {
        println!("Pipeline store is empty. Run phase 1 (discover) first.");
        return Ok(());
    }
    print!("{}", render(&records, target, chars));
    Ok(())
}

pub fn print_stats(conn: &Connection) -> Result<()> {
    let s = db::get_stats(conn)?;
    println!("Pages:       {}", s.total);
    println!("Fetched:     {} ({} with content)", s.fetched, s.with_content);
    println!("Classified:  {}", s.classified);
    println!("Tagged:      {}", s.tagged);
    println!("Written:     {}", s.written);
    println!("Errors:      {}", s.failed);
    println!();
    for phase in Phase::ALL {
        let when = db::phase_completed_at(conn, phase)?
            .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
            .unwrap_or_else(|| "never".to_string());
        println!("Phase {} ({:<8}) last completed: {}", phase.number(), phase.name(), when);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn records() -> Vec<PageRecord> {
        vec![
            PageRecord::new("p1"),
            PageRecord {
                page_id: "p2".into(),
                title: Some("Lisbon".into()),
                content: Some("Day one:\nwalked to the castle and ate far too many pastries".into()),
                new_tags: Some(vec![]),
                classified: true,
                ..Default::default()
            },
            PageRecord {
                page_id: "p3".into(),
                title: Some("Standup".into()),
                content: Some("blocked on review".into()),
                new_tags: Some(vec!["Work".into()]),
                classified: true,
                written: true,
                ..Default::default()
            },
        ]
    }

    #[test]
    fn content_preview_is_bounded() {
        let out = render(&records(), DebugTarget::Content, 10);
        assert!(out.contains("Content: Day one: w..."));
        assert!(out.contains("Content: (not fetched)"));
        assert!(out.contains("3 of 3 pages shown."));
    }

    #[test]
    fn tags_view_shows_written_flag() {
        let out = render(&records(), DebugTarget::Tags, 100);
        assert!(out.contains("Tags: Work\nWritten: true"));
        assert!(out.contains("Tags: (none)\nWritten: false"));
        assert!(out.contains("Tags: -\nWritten: false"));
    }

    #[test]
    fn missing_lists_every_untagged_page() {
        let mut records = records();
        records.push(PageRecord {
            page_id: "p4".into(),
            content: Some(String::new()),
            ..Default::default()
        });
        let out = render(&records, DebugTarget::Missing, 100);
        assert!(out.contains("Page ID: p1\nContent Snippet: (not fetched)"));
        assert!(out.contains("Page ID: p2\nContent Snippet: Day one: walked"));
        assert!(out.contains("Page ID: p4\nContent Snippet: (no content)"));
        assert!(!out.contains("Page ID: p3"));
        assert!(out.contains("3 of 4 pages shown."));
    }

    #[test]
    fn missing_reports_all_tagged() {
        let out = render(&records()[2..], DebugTarget::Missing, 100);
        assert_eq!(out, "All pages have tags.\n");
    }

    #[test]
    fn pages_view_labels_state() {
        let out = render(&records(), DebugTarget::Pages, 100);
        assert!(out.contains("p1  [discovered]"));
        assert!(out.contains("p2  [no tags]"));
        assert!(out.contains("p3  [written]"));
    }
}
