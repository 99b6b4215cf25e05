mod classify;
mod config;
mod db;
mod error;
mod inspect;
mod notion;
mod phases;
mod throttle;
mod vocabulary;

use std::path::PathBuf;
use std::time::Instant;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;

use crate::classify::OpenAiClassifier;
use crate::config::Settings;
use crate::inspect::DebugTarget;
use crate::notion::NotionClient;
use crate::phases::PhaseReport;

#[derive(Parser)]
#[command(name = "notion_tagger", about = "Tag Notion pages with an LLM in four resumable phases")]
struct Cli {
    /// Pipeline store (overrides STORE_PATH)
    #[arg(long, global = true)]
    store: Option<PathBuf>,
    /// Config file (default: ./notion_tagger.toml if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Phase 1: list database pages and reset the store
    #[command(visible_alias = "1")]
    Discover,
    /// Phase 2: fetch title and content of every page
    #[command(visible_alias = "2")]
    Fetch,
    /// Phase 3: classify every page with content
    #[command(visible_alias = "3")]
    Classify,
    /// Phase 4: write tags back to Notion
    #[command(visible_alias = "4")]
    Write,
    /// Inspect the store without changing it
    Debug {
        #[arg(value_enum)]
        target: DebugTarget,
        /// Content preview length
        #[arg(short = 'n', long, default_value = "100")]
        chars: usize,
    },
    /// Fetch, classify and write a single page (id or URL), bypassing the store
    Page {
        page: String,
    },
    /// Show store counts and phase completion times
    Stats,
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();
}

fn open_store(settings: &Settings) -> anyhow::Result<rusqlite::Connection> {
    let conn = db::connect(&settings.store_path)?;
    db::init_schema(&conn)?;
    Ok(conn)
}

fn finish(report: PhaseReport) -> anyhow::Result<()> {
    if report.total == 0 {
        println!("No pages in the pipeline store. Run phase 1 (discover) first.");
        return Ok(());
    }
    report.print();
    Ok(())
}

fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let t0 = Instant::now();

    let mut settings = config::load(cli.config.as_deref())?;
    if let Some(store) = cli.store {
        settings.store_path = store;
    }
    info!(store = ?settings.store_path, model = %settings.openai_model, "configuration loaded");

    match cli.command {
        Commands::Discover => {
            let database_id = settings.database_id()?;
            let notion = NotionClient::new(&settings)?;
            let conn = open_store(&settings)?;
            println!("Phase 1: discovering pages of database {}", database_id);
            let report = phases::discover::run(&conn, &notion, &database_id)?;
            report.print();
        }
        Commands::Fetch => {
            let notion = NotionClient::new(&settings)?;
            let conn = open_store(&settings)?;
            println!("Phase 2: fetching page content");
            finish(phases::fetch::run(&conn, &notion)?)?;
        }
        Commands::Classify => {
            let vocabulary = settings.vocabulary()?;
            let classifier = OpenAiClassifier::new(&settings)?;
            let conn = open_store(&settings)?;
            println!(
                "Phase 3: classifying with {} against {} tags",
                settings.openai_model,
                vocabulary.len()
            );
            finish(phases::classify::run(
                &conn,
                &classifier,
                &vocabulary,
                settings.guidance(),
            )?)?;
        }
        Commands::Write => {
            let vocabulary = settings.vocabulary()?;
            let database_id = settings.database_id()?;
            let notion = NotionClient::new(&settings)?;
            let conn = open_store(&settings)?;
            println!("Phase 4: writing tags to Notion");
            finish(phases::write::run(&conn, &notion, &database_id, &vocabulary)?)?;
        }
        Commands::Debug { target, chars } => {
            let conn = db::connect_read_only(&settings.store_path)?;
            inspect::print(&conn, target, chars)?;
        }
        Commands::Page { page } => {
            let page_id = notion::notion_id_from_input(&page)
                .with_context(|| format!("No Notion page id found in {:?}", page))?;
            let vocabulary = settings.vocabulary()?;
            let notion = NotionClient::new(&settings)?;
            let classifier = OpenAiClassifier::new(&settings)?;
            let outcome = phases::single_page::run(
                &page_id,
                &notion,
                &classifier,
                &notion,
                &vocabulary,
                settings.guidance(),
            )?;
            println!("Page:    {} ({})", outcome.page_id, outcome.title);
            println!("Content: {} chars", outcome.content_chars);
            match &outcome.tags {
                None => println!("Tags:    skipped, page has no content"),
                Some(t) if t.is_empty() => println!("Tags:    none apply"),
                Some(t) => println!("Tags:    {}", t.join(", ")),
            }
            println!("Written: {}", outcome.written);
        }
        Commands::Stats => {
            let conn = db::connect_read_only(&settings.store_path)?;
            inspect::print_stats(&conn)?;
        }
    }

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }
    Ok(())
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn numeric_phase_aliases() {
        let cli = Cli::try_parse_from(["notion_tagger", "3"]).unwrap();
        assert!(matches!(cli.command, Commands::Classify));
        let cli = Cli::try_parse_from(["notion_tagger", "--store", "x.sqlite", "1"]).unwrap();
        assert!(matches!(cli.command, Commands::Discover));
        assert_eq!(cli.store, Some(PathBuf::from("x.sqlite")));
    }

    #[test]
    fn debug_requires_target() {
        assert!(Cli::try_parse_from(["notion_tagger", "debug"]).is_err());
        let cli = Cli::try_parse_from(["notion_tagger", "debug", "missing", "-n", "40"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Debug { target: DebugTarget::Missing, chars: 40 }
        ));
    }

    #[test]
    fn unknown_phase_is_rejected() {
        assert!(Cli::try_parse_from(["notion_tagger", "5"]).is_err());
        assert!(Cli::try_parse_from(["notion_tagger"]).is_err());
    }

    #[test]
    fn durations() {
        assert_eq!(format_duration(std::time::Duration::from_millis(1500)), "1.5s");
        assert_eq!(format_duration(std::time::Duration::from_secs(125)), "2m 5s");
        assert_eq!(format_duration(std::time::Duration::from_secs(3725)), "1h 2m 5s");
    }
}
