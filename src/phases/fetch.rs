use anyhow::Result;
use rusqlite::Connection;
use tracing::warn;

use super::{page_line, progress_bar, truncate, Phase, PhaseReport};
use crate::db;
use crate::notion::{extract_text, ContentSource};

/// Phase 2. Every record is re-fetched, whether or not it already has
/// content. A failed page keeps its previous title/content.
pub fn run(conn: &Connection, source: &dyn ContentSource) -> Result<PhaseReport> {
    let records = db::load_pages(conn)?;
    let mut report = PhaseReport::new(Phase::Fetch, records.len());
    if records.is_empty() {
        return Ok(report);
    }

    let pb = progress_bar(records.len());
    for (i, mut record) in records.into_iter().enumerate() {
        match source.fetch_page(&record.page_id) {
            Ok(page) => {
                let content = extract_text(&page.blocks);
                if content.is_empty() {
                    report.empty += 1;
                }
                page_line(
                    &pb,
                    format!(
                        "[{}/{}] {} {:?} ({} chars)",
                        i + 1,
                        report.total,
                        record.page_id,
                        truncate(&page.title, 40),
                        content.chars().count()
                    ),
                );
                record.title = Some(page.title);
                record.content = Some(content);
                record.last_error = None;
                report.succeeded += 1;
            }
            Err(e) => {
                warn!(page_id = %record.page_id, error = %e, "fetch failed");
                record.last_error = Some(report.fail(&record.page_id, &e));
            }
        }
        db::save_page(conn, &record)?;
        pb.inc(1);
    }
    pb.finish_and_clear();

    db::mark_phase_complete(conn, Phase::Fetch)?;
    Ok(report)
}
