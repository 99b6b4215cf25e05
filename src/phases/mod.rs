//! Notion tagging pipeline: four checkpointed phases over the page store.
//!
//!   1. discover: enumerate database pages, replace the store
//!   2. fetch: refresh title + flattened content of every page
//!   3. classify: assign vocabulary tags to every page with content
//!   4. write: register missing tag options, write tags not yet written
//!
//! Each phase commits records one by one and isolates per-page failures,
//! so re-running a phase picks up where the last run stopped.

pub mod classify;
pub mod discover;
pub mod fetch;
pub mod single_page;
pub mod write;


use indicatif::{ProgressBar, ProgressStyle};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Discover,
    Fetch,
    Classify,
    Write,
}

impl Phase {
    pub const ALL: [Phase; 4] = [Phase::Discover, Phase::Fetch, Phase::Classify, Phase::Write];

    pub fn number(self) -> i64 {
        match self {
            Phase::Discover => 1,
            Phase::Fetch => 2,
            Phase::Classify => 3,
            Phase::Write => 4,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Phase::Discover => "discover",
            Phase::Fetch => "fetch",
            Phase::Classify => "classify",
            Phase::Write => "write",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageFailure {
    pub page_id: String,
    pub error: String,
}

/// Per-phase counters printed at the end of a run.
#[derive(Debug)]
pub struct PhaseReport {
    pub phase: Phase,
    pub total: usize,
    pub succeeded: usize,
    /// fetch: pages with no body; classify: zero-tag verdicts;
    /// write: classified with zero tags, nothing to write.
    pub empty: usize,
    /// classify: no content yet; write: already written.
    pub skipped: usize,
    /// write: not classified yet.
    pub pending: usize,
    pub failed: Vec<PageFailure>,
}

impl PhaseReport {
    pub fn new(phase: Phase, total: usize) -> Self {
        PhaseReport {
            phase,
            total,
            succeeded: 0,
            empty: 0,
            skipped: 0,
            pending: 0,
            failed: Vec::new(),
        }
    }

    pub(crate) fn fail(&mut self, page_id: &str, error: impl std::fmt::Display) -> String {
        let message = format!("{}: {}", self.phase.name(), error);
        self.failed.push(PageFailure {
            page_id: page_id.to_string(),
            error: message.clone(),
        });
        message
    }

    pub fn failed_ids(&self) -> Vec<&str> {
        self.failed.iter().map(|f| f.page_id.as_str()).collect()
    }

    pub fn summary(&self) -> String {
        let mut line = match self.phase {
            Phase::Discover => format!("Discovered {} pages.", self.succeeded),
            Phase::Fetch => format!(
                "Fetched {} of {} pages ({} with no body).",
                self.succeeded, self.total, self.empty
            ),
            Phase::Classify => format!(
                "Classified {} of {} pages ({} with zero tags), skipped {} without content.",
                self.succeeded, self.total, self.empty, self.skipped
            ),
            Phase::Write => format!(
                "Wrote tags to {} of {} pages; {} already written, {} with nothing to write, {} not classified yet.",
                self.succeeded, self.total, self.skipped, self.empty, self.pending
            ),
        };
        if !self.failed.is_empty() {
            line.push_str(&format!(
                " {} failed (ids: {}).",
                self.failed.len(),
                self.failed_ids().join(", ")
            ));
        }
        line
    }

    pub fn print(&self) {
        println!("{}", self.summary());
        for f in &self.failed {
            println!("  {}: {}", f.page_id, f.error);
        }
    }
}

pub(crate) fn progress_bar(len: usize) -> ProgressBar {
    let pb = ProgressBar::new(len as u64);
    let style = ProgressStyle::default_bar()
        .template("[{elapsed_precise}] {bar:40} {pos}/{len} ({per_sec}, eta {eta})")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=> ");
    pb.set_style(style);
    pb
}

/// Print a per-page progress line without tearing the progress bar.
pub(crate) fn page_line(pb: &ProgressBar, line: String) {
    pb.suspend(|| println!("{}", line));
}

pub(crate) fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max).collect();
        format!("{}...", truncated)
    }
}
