use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OpenFlags, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use crate::phases::Phase;

/// Per-page checkpoint row shared by all phases.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRecord {
    pub page_id: String,
    pub title: Option<String>,
    pub content: Option<String>,
    pub new_tags: Option<Vec<String>>,
    pub classified: bool,
    pub written: bool,
    pub last_error: Option<String>,
}

impl PageRecord {
    pub fn new(page_id: impl Into<String>) -> Self {
        PageRecord {
            page_id: page_id.into(),
            ..Default::default()
        }
    }

    pub fn has_content(&self) -> bool {
        self.content.as_deref().is_some_and(|c| !c.is_empty())
    }

    /// Eligible for phase 4: classified with at least one tag, not yet written.
    pub fn pending_write(&self) -> bool {
        !self.written && self.new_tags.as_ref().is_some_and(|t| !t.is_empty())
    }
}

pub fn connect(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {:?}", parent))?;
    }
    let conn = Connection::open(path).with_context(|| format!("Failed to open {:?}", path))?;
    conn.execute_batch("PRAGMA journal_mode=WAL;")?;
    Ok(conn)
}

/// Open an existing store without write access.
pub fn connect_read_only(path: &Path) -> Result<Connection> {
    if !path.exists() {
        anyhow::bail!("No pipeline store at {:?}. Run phase 1 (discover) first.", path);
    }
    Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .with_context(|| format!("Failed to open {:?} read-only", path))
}

#[cfg(test)]
pub fn connect_in_memory() -> Result<Connection> {
    let conn = Connection::open_in_memory()?;
    init_schema(&conn)?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS pages (
            page_id     TEXT PRIMARY KEY,
            position    INTEGER NOT NULL,
            title       TEXT,
            content     TEXT,
            new_tags    TEXT,
            classified  BOOLEAN NOT NULL DEFAULT 0,
            written     BOOLEAN NOT NULL DEFAULT 0,
            last_error  TEXT,
            updated_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );
        CREATE INDEX IF NOT EXISTS idx_pages_position ON pages(position);

        CREATE TABLE IF NOT EXISTS pipeline_phases (
            phase        INTEGER PRIMARY KEY,
            name         TEXT NOT NULL,
            completed_at TEXT NOT NULL
        );
        ",
    )?;
    Ok(())
}

// ── Records ──

fn encode_tags(tags: &Option<Vec<String>>) -> Result<Option<String>> {
    tags.as_ref()
        .map(serde_json::to_string)
        .transpose()
        .context("Failed to encode tags")
}

fn record_from_row(row: &Row) -> rusqlite::Result<(PageRecord, Option<String>)> {
    Ok((
        PageRecord {
            page_id: row.get(0)?,
            title: row.get(1)?,
            content: row.get(2)?,
            new_tags: None,
            classified: row.get(4)?,
            written: row.get(5)?,
            last_error: row.get(6)?,
        },
        row.get(3)?,
    ))
}

/// Replace the whole record set in one transaction and reset the phase
/// markers. Either every record lands or the previous store is kept.
pub fn replace_pages(conn: &Connection, records: &[PageRecord]) -> Result<usize> {
    let tx = conn.unchecked_transaction()?;
    tx.execute("DELETE FROM pages", [])?;
    tx.execute("DELETE FROM pipeline_phases", [])?;
    {
        let mut stmt = tx.prepare(
            "INSERT INTO pages (page_id, position, title, content, new_tags, classified, written, last_error)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        )?;
        for (position, r) in records.iter().enumerate() {
            stmt.execute(params![
                r.page_id,
                position as i64,
                r.title,
                r.content,
                encode_tags(&r.new_tags)?,
                r.classified,
                r.written,
                r.last_error,
            ])?;
        }
    }
    tx.commit()?;
    Ok(records.len())
}

/// Persist one record. Each call is its own transaction, so an interrupted
/// phase keeps every record saved before the interruption.
pub fn save_page(conn: &Connection, record: &PageRecord) -> Result<()> {
    let updated = conn.execute(
        "UPDATE pages
         SET title = ?2, content = ?3, new_tags = ?4, classified = ?5, written = ?6,
             last_error = ?7, updated_at = datetime('now')
         WHERE page_id = ?1",
        params![
            record.page_id,
            record.title,
            record.content,
            encode_tags(&record.new_tags)?,
            record.classified,
            record.written,
            record.last_error,
        ],
    )?;
    if updated == 0 {
        anyhow::bail!("Page {} is not in the pipeline store", record.page_id);
    }
    Ok(())
}

pub fn load_pages(conn: &Connection) -> Result<Vec<PageRecord>> {
    let mut stmt = conn.prepare(
        "SELECT page_id, title, content, new_tags, classified, written, last_error
         FROM pages ORDER BY position",
    )?;
    let rows = stmt
        .query_map([], record_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    rows.into_iter()
        .map(|(mut record, tags)| {
            record.new_tags = tags
                .map(|t| serde_json::from_str(&t))
                .transpose()
                .with_context(|| format!("Corrupt tags for page {}", record.page_id))?;
            Ok(record)
        })
        .collect()
}

// ── Phase markers ──

pub fn mark_phase_complete(conn: &Connection, phase: Phase) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO pipeline_phases (phase, name, completed_at) VALUES (?1, ?2, ?3)",
        params![phase.number(), phase.name(), Utc::now().to_rfc3339()],
    )?;
    Ok(())
}

pub fn phase_completed_at(conn: &Connection, phase: Phase) -> Result<Option<DateTime<Utc>>> {
    let raw: Option<String> = conn
        .query_row(
            "SELECT completed_at FROM pipeline_phases WHERE phase = ?1",
            params![phase.number()],
            |r| r.get(0),
        )
        .optional()?;
    raw.map(|s| {
        DateTime::parse_from_rfc3339(&s)
            .map(|d| d.with_timezone(&Utc))
            .with_context(|| format!("Bad timestamp for phase {}: {}", phase.number(), s))
    })
    .transpose()
}

// ── Stats ──

pub struct Stats {
    pub total: usize,
    pub fetched: usize,
    pub with_content: usize,
    pub classified: usize,
    pub tagged: usize,
    pub written: usize,
    pub failed: usize,
}

pub fn get_stats(conn: &Connection) -> Result<Stats> {
    let count = |sql: &str| -> Result<usize> { Ok(conn.query_row(sql, [], |r| r.get(0))?) };
    Ok(Stats {
        total: count("SELECT COUNT(*) FROM pages")?,
        fetched: count("SELECT COUNT(*) FROM pages WHERE content IS NOT NULL")?,
        with_content: count("SELECT COUNT(*) FROM pages WHERE content IS NOT NULL AND content != ''")?,
        classified: count("SELECT COUNT(*) FROM pages WHERE classified = 1")?,
        tagged: count("SELECT COUNT(*) FROM pages WHERE new_tags IS NOT NULL AND new_tags != '[]'")?,
        written: count("SELECT COUNT(*) FROM pages WHERE written = 1")?,
        failed: count("SELECT COUNT(*) FROM pages WHERE last_error IS NOT NULL")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_store() -> Connection {
        connect_in_memory().unwrap()
    }

    fn sample() -> Vec<PageRecord> {
        vec![
            PageRecord::new("p1"),
            PageRecord {
                page_id: "p2".into(),
                title: Some("Groceries".into()),
                content: Some(String::new()),
                new_tags: Some(vec![]),
                classified: true,
                ..Default::default()
            },
            PageRecord {
                page_id: "p3".into(),
                title: Some("Lab notes".into()),
                content: Some("pipette calibration".into()),
                new_tags: Some(vec!["Work".into(), "Research".into()]),
                classified: true,
                written: true,
                last_error: Some("write: timeout".into()),
            },
        ]
    }

    #[test]
    fn round_trip_preserves_every_field() {
        let conn = memory_store();
        replace_pages(&conn, &sample()).unwrap();
        let loaded = load_pages(&conn).unwrap();
        assert_eq!(loaded, sample());
        // absent vs empty content and tags survive
        assert_eq!(loaded[0].content, None);
        assert_eq!(loaded[1].content.as_deref(), Some(""));
        assert_eq!(loaded[0].new_tags, None);
        assert_eq!(loaded[1].new_tags, Some(vec![]));
    }

    #[test]
    fn replace_drops_previous_records_and_markers() {
        let conn = memory_store();
        replace_pages(&conn, &sample()).unwrap();
        mark_phase_complete(&conn, Phase::Fetch).unwrap();
        replace_pages(&conn, &[PageRecord::new("fresh")]).unwrap();
        let loaded = load_pages(&conn).unwrap();
        assert_eq!(loaded, vec![PageRecord::new("fresh")]);
        assert!(phase_completed_at(&conn, Phase::Fetch).unwrap().is_none());
    }

    #[test]
    fn load_keeps_discovery_order() {
        let conn = memory_store();
        let ids = ["zeta", "alpha", "mid"];
        let records: Vec<_> = ids.iter().map(|id| PageRecord::new(*id)).collect();
        replace_pages(&conn, &records).unwrap();
        let loaded: Vec<_> = load_pages(&conn).unwrap().into_iter().map(|r| r.page_id).collect();
        assert_eq!(loaded, ids);
    }

    #[test]
    fn save_page_updates_single_record() {
        let conn = memory_store();
        replace_pages(&conn, &sample()).unwrap();
        let mut r = PageRecord::new("p1");
        r.content = Some("hello".into());
        save_page(&conn, &r).unwrap();
        let loaded = load_pages(&conn).unwrap();
        assert_eq!(loaded[0].content.as_deref(), Some("hello"));
        assert_eq!(loaded[2], sample()[2]);
    }

    #[test]
    fn save_page_rejects_unknown_id() {
        let conn = memory_store();
        assert!(save_page(&conn, &PageRecord::new("ghost")).is_err());
    }

    #[test]
    fn phase_marker_round_trip() {
        let conn = memory_store();
        assert!(phase_completed_at(&conn, Phase::Classify).unwrap().is_none());
        mark_phase_complete(&conn, Phase::Classify).unwrap();
        assert!(phase_completed_at(&conn, Phase::Classify).unwrap().is_some());
    }

    #[test]
    fn stats_count_states() {
        let conn = memory_store();
        replace_pages(&conn, &sample()).unwrap();
        let s = get_stats(&conn).unwrap();
        assert_eq!(s.total, 3);
        assert_eq!(s.fetched, 2);
        assert_eq!(s.with_content, 1);
        assert_eq!(s.classified, 2);
        assert_eq!(s.tagged, 1);
        assert_eq!(s.written, 1);
        assert_eq!(s.failed, 1);
    }

    #[test]
    fn on_disk_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("pipeline.sqlite");
        {
            let conn = connect(&path).unwrap();
            init_schema(&conn).unwrap();
            replace_pages(&conn, &sample()).unwrap();
        }
        let ro = connect_read_only(&path).unwrap();
        assert_eq!(load_pages(&ro).unwrap(), sample());
        assert!(ro.execute("DELETE FROM pages", []).is_err());
    }

    #[test]
    fn read_only_requires_existing_store() {
        let dir = tempfile::tempdir().unwrap();
        assert!(connect_read_only(&dir.path().join("missing.sqlite")).is_err());
    }
}
