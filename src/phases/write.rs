use anyhow::{Context, Result};
use rusqlite::Connection;
use tracing::{info, warn};

use super::{page_line, progress_bar, Phase, PhaseReport};
use crate::db;
use crate::notion::TagWriter;
use crate::vocabulary::Vocabulary;

/// Register vocabulary tags the database does not know yet, in a single
/// schema update. Returns the names that were added.
pub fn sync_schema(
    writer: &dyn TagWriter,
    database_id: &str,
    vocabulary: &Vocabulary,
) -> Result<Vec<String>> {
    let existing = writer
        .registered_options(database_id)
        .context("Failed to read database tag options")?;
    let missing = vocabulary.missing_from(&existing);
    if !missing.is_empty() {
        writer
            .sync_schema(database_id, &missing)
            .context("Failed to register new tag options")?;
        info!(added = ?missing, "registered new tag options");
    }
    Ok(missing)
}

/// Phase 4. Only records with a non-empty verdict that were never written
/// reach the writer; a failed schema sync aborts before any page is touched.
pub fn run(
    conn: &Connection,
    writer: &dyn TagWriter,
    database_id: &str,
    vocabulary: &Vocabulary,
) -> Result<PhaseReport> {
    let records = db::load_pages(conn)?;
    let mut report = PhaseReport::new(Phase::Write, records.len());
    if records.is_empty() {
        return Ok(report);
    }

    let added = sync_schema(writer, database_id, vocabulary)?;
    if !added.is_empty() {
        println!("Added tag options: {}", added.join(", "));
    }

    let pb = progress_bar(records.len());
    for (i, mut record) in records.into_iter().enumerate() {
        let tags = match &record.new_tags {
            _ if record.written => {
                report.skipped += 1;
                pb.inc(1);
                continue;
            }
            None => {
                report.pending += 1;
                pb.inc(1);
                continue;
            }
            Some(tags) if tags.is_empty() => {
                report.empty += 1;
                pb.inc(1);
                continue;
            }
            Some(tags) => tags.clone(),
        };

        match writer.set_tags(&record.page_id, &tags) {
            Ok(()) => {
                page_line(
                    &pb,
                    format!(
                        "[{}/{}] {} <- [{}]",
                        i + 1,
                        report.total,
                        record.page_id,
                        tags.join(", ")
                    ),
                );
                record.written = true;
                record.last_error = None;
                report.succeeded += 1;
            }
            Err(e) => {
                warn!(page_id = %record.page_id, error = %e, "write failed");
                record.last_error = Some(report.fail(&record.page_id, &e));
            }
        }
        db::save_page(conn, &record)?;
        pb.inc(1);
    }
    pb.finish_and_clear();

    db::mark_phase_complete(conn, Phase::Write)?;
    Ok(report)
}
