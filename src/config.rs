use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, Environment, File};
use serde::{Deserialize, Deserializer};

use crate::vocabulary::Vocabulary;

const DEFAULT_CONFIG_FILE: &str = "notion_tagger";

#[derive(Clone, Deserialize, Debug)]
pub struct Settings {
    pub notion_api_key: Option<String>,
    pub notion_database_id: Option<String>,
    #[serde(default = "default_tag_property")]
    pub notion_tag_property: String,
    #[serde(default = "default_notion_base_url")]
    pub notion_base_url: String,
    #[serde(default = "default_notion_version")]
    pub notion_version: String,
    #[serde(default = "default_notion_min_interval_ms")]
    pub notion_min_interval_ms: u64,
    pub openai_api_key: Option<String>,
    #[serde(default = "default_openai_model")]
    pub openai_model: String,
    #[serde(default = "default_openai_base_url")]
    pub openai_base_url: String,
    #[serde(default, deserialize_with = "tag_list")]
    pub tags: Vec<String>,
    pub additional_context: Option<String>,
    #[serde(default = "default_store_path")]
    pub store_path: PathBuf,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_openai_min_interval_ms")]
    pub openai_min_interval_ms: u64,
}

/// `TAGS` arrives as one comma-separated string from the environment and as
/// an array from a config file.
#[derive(Deserialize)]
#[serde(untagged)]
enum TagList {
    Joined(String),
    Items(Vec<String>),
}

fn tag_list<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match TagList::deserialize(deserializer)? {
        TagList::Joined(joined) => joined.split(',').map(str::to_string).collect(),
        TagList::Items(items) => items,
    })
}

fn default_tag_property() -> String {
    "Tags".to_string()
}

fn default_notion_base_url() -> String {
    "https://api.notion.com/v1".to_string()
}

fn default_notion_version() -> String {
    "2022-06-28".to_string()
}

fn default_notion_min_interval_ms() -> u64 {
    350
}

fn default_openai_model() -> String {
    "gpt-4o-2024-08-06".to_string()
}

fn default_openai_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_store_path() -> PathBuf {
    PathBuf::from("data/pipeline.sqlite")
}

fn default_request_timeout_secs() -> u64 {
    60
}

fn default_openai_min_interval_ms() -> u64 {
    200
}

/// Load settings from an optional TOML file and the process environment.
/// Environment variables win; `TAGS` is a comma-separated list.
pub fn load(file: Option<&Path>) -> Result<Settings> {
    let file_source = match file {
        Some(path) => File::from(path.to_path_buf()).required(true),
        None => File::with_name(DEFAULT_CONFIG_FILE).required(false),
    };
    build(Config::builder().add_source(file_source), Environment::default())
}

// Environment values stay strings; serde converts the numeric fields, so ids
// made only of digits are kept as written.
fn build(builder: ConfigBuilder<DefaultState>, env: Environment) -> Result<Settings> {
    builder
        .add_source(env)
        .build()
        .context("Failed to read configuration")?
        .try_deserialize()
        .context("Invalid configuration")
}

fn required<'a>(value: &'a Option<String>, env_name: &str) -> Result<&'a str> {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => bail!("{} is not set (environment or config file)", env_name),
    }
}

impl Settings {
    pub fn notion_api_key(&self) -> Result<&str> {
        required(&self.notion_api_key, "NOTION_API_KEY")
    }

    pub fn openai_api_key(&self) -> Result<&str> {
        required(&self.openai_api_key, "OPENAI_API_KEY")
    }

    /// Target database id; a full Notion URL is accepted as well.
    pub fn database_id(&self) -> Result<String> {
        let raw = required(&self.notion_database_id, "NOTION_DATABASE_ID")?;
        crate::notion::notion_id_from_input(raw)
            .with_context(|| format!("NOTION_DATABASE_ID does not contain a Notion id: {}", raw))
    }

    pub fn vocabulary(&self) -> Result<Vocabulary> {
        let vocabulary = Vocabulary::new(&self.tags);
        if vocabulary.is_empty() {
            bail!("TAGS is not set: configure the tag vocabulary as a comma-separated list");
        }
        Ok(vocabulary)
    }

    /// Free-text classification guidance, if any.
    pub fn guidance(&self) -> Option<&str> {
        self.additional_context
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn notion_min_interval(&self) -> Duration {
        Duration::from_millis(self.notion_min_interval_ms)
    }

    pub fn openai_min_interval(&self) -> Duration {
        Duration::from_millis(self.openai_min_interval_ms)
    }
}
