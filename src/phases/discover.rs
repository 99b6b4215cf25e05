use std::collections::HashSet;

use anyhow::{bail, Context, Result};
use rusqlite::Connection;
use tracing::{info, warn};

use super::{Phase, PhaseReport};
use crate::db::{self, PageRecord};
use crate::notion::{DirectoryEntry, PageDirectory};

/// Walk the database listing until the source reports no further cursor.
/// Ids keep arrival order; repeats are dropped.
pub fn collect_entries(
    directory: &dyn PageDirectory,
    database_id: &str,
) -> Result<Vec<DirectoryEntry>> {
    let mut seen = HashSet::new();
    let mut entries = Vec::new();
    let mut cursor: Option<String> = None;
    let mut batches = 0usize;

    loop {
        let page = directory
            .list_pages(database_id, cursor.as_deref())
            .with_context(|| format!("Failed to list pages of database {}", database_id))?;
        batches += 1;
        for entry in page.entries {
            if seen.insert(entry.page_id.clone()) {
                entries.push(entry);
            } else {
                warn!(page_id = %entry.page_id, "duplicate page in listing, skipped");
            }
        }
        match page.next_cursor {
            Some(next) if cursor.as_deref() == Some(next.as_str()) => {
                bail!("Database listing returned the same cursor twice: {}", next)
            }
            Some(next) => cursor = Some(next),
            None => break,
        }
    }

    info!(batches, pages = entries.len(), "database listing complete");
    Ok(entries)
}

/// Phase 1. The store is only replaced once the whole listing succeeded.
pub fn run(
    conn: &Connection,
    directory: &dyn PageDirectory,
    database_id: &str,
) -> Result<PhaseReport> {
    let entries = collect_entries(directory, database_id)?;

    for entry in &entries {
        println!(
            "  {}  {}",
            entry.page_id,
            entry.title.as_deref().unwrap_or("(untitled)")
        );
    }

    let records: Vec<PageRecord> = entries
        .iter()
        .map(|e| PageRecord::new(e.page_id.clone()))
        .collect();
    let n = db::replace_pages(conn, &records)?;
    db::mark_phase_complete(conn, Phase::Discover)?;

    let mut report = PhaseReport::new(Phase::Discover, n);
    report.succeeded = n;
    Ok(report)
}
