use anyhow::Result;
use rusqlite::Connection;
use tracing::warn;

use super::{page_line, progress_bar, Phase, PhaseReport};
use crate::classify::{classify_page, ClassifyRequest, TagClassifier};
use crate::db;
use crate::vocabulary::Vocabulary;

/// Phase 3. Pages without content keep whatever verdict they had; every
/// other page is reclassified and its previous verdict replaced.
pub fn run(
    conn: &Connection,
    classifier: &dyn TagClassifier,
    vocabulary: &Vocabulary,
    guidance: Option<&str>,
) -> Result<PhaseReport> {
    let records = db::load_pages(conn)?;
    let mut report = PhaseReport::new(Phase::Classify, records.len());
    if records.is_empty() {
        return Ok(report);
    }

    let pb = progress_bar(records.len());
    for (i, mut record) in records.into_iter().enumerate() {
        if !record.has_content() {
            report.skipped += 1;
            pb.inc(1);
            continue;
        }

        let request = ClassifyRequest {
            title: record.title.as_deref().unwrap_or_default(),
            content: record.content.as_deref().unwrap_or_default(),
            vocabulary,
            guidance,
        };
        match classify_page(classifier, &request) {
            Ok(tags) => {
                page_line(
                    &pb,
                    format!(
                        "[{}/{}] {} -> [{}]",
                        i + 1,
                        report.total,
                        record.page_id,
                        tags.join(", ")
                    ),
                );
                if tags.is_empty() {
                    report.empty += 1;
                }
                record.new_tags = Some(tags);
                record.classified = true;
                record.last_error = None;
                report.succeeded += 1;
            }
            Err(e) => {
                warn!(page_id = %record.page_id, error = %e, "classification failed");
                record.last_error = Some(report.fail(&record.page_id, &e));
            }
        }
        db::save_page(conn, &record)?;
        pb.inc(1);
    }
    pb.finish_and_clear();

    db::mark_phase_complete(conn, Phase::Classify)?;
    Ok(report)
}
