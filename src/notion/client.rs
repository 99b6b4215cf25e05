use std::collections::HashMap;

use reqwest::blocking::{Client, RequestBuilder};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::debug;

use super::blocks::{plain_text, RawBlock, RichText};
use super::{
    Block, ContentSource, DirectoryEntry, DirectoryPage, FetchedPage, PageDirectory, TagWriter,
};
use crate::config::Settings;
use crate::error::{PipelineError, Result};
use crate::throttle::Throttle;

const SERVICE: &str = "Notion";
const PAGE_SIZE: u32 = 100;

/// Blocking Notion API client. Requests are spaced by at least
/// `NOTION_MIN_INTERVAL_MS` to stay under the API's per-integration rate limit.
pub struct NotionClient {
    client: Client,
    base_url: String,
    tag_property: String,
    throttle: Throttle,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    results: Vec<PageObject>,
    #[serde(default)]
    has_more: bool,
    next_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PageObject {
    id: String,
    #[serde(default)]
    properties: HashMap<String, Property>,
}

#[derive(Debug, Deserialize)]
struct Property {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    title: Vec<RichText>,
}

#[derive(Debug, Deserialize)]
struct BlockChildren {
    results: Vec<RawBlock>,
    #[serde(default)]
    has_more: bool,
    next_cursor: Option<String>,
}

impl PageObject {
    fn title(&self) -> Option<String> {
        self.properties
            .values()
            .find(|p| p.kind == "title")
            .map(|p| plain_text(&p.title))
    }
}

impl NotionClient {
    pub fn new(settings: &Settings) -> anyhow::Result<Self> {
        let mut headers = HeaderMap::new();
        let auth = format!("Bearer {}", settings.notion_api_key()?);
        headers.insert(AUTHORIZATION, HeaderValue::from_str(&auth)?);
        headers.insert(
            "Notion-Version",
            HeaderValue::from_str(&settings.notion_version)?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .default_headers(headers)
            .timeout(settings.request_timeout())
            .build()?;
        Ok(NotionClient {
            client,
            base_url: settings.notion_base_url.trim_end_matches('/').to_string(),
            tag_property: settings.notion_tag_property.clone(),
            throttle: Throttle::new(settings.notion_min_interval()),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        self.throttle.wait();
        let resp = request.send()?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp
                .text()
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            return Err(PipelineError::Api {
                service: SERVICE,
                status: status.as_u16(),
                body,
            });
        }
        Ok(resp.json()?)
    }

    fn fetch_blocks(&self, page_id: &str) -> Result<Vec<Block>> {
        let mut blocks = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let mut query = vec![("page_size", PAGE_SIZE.to_string())];
            if let Some(c) = &cursor {
                query.push(("start_cursor", c.clone()));
            }
            let page: BlockChildren = self.send(
                self.client
                    .get(self.url(&format!("blocks/{}/children", page_id)))
                    .query(&query),
            )?;
            blocks.extend(page.results.into_iter().map(Block::from));
            match page.next_cursor {
                Some(next) if page.has_more => cursor = Some(next),
                _ => break,
            }
        }
        Ok(blocks)
    }

    /// `{"properties": {<tag property>: {"multi_select": value}}}`
    fn tag_property_patch(&self, multi_select: Value) -> Value {
        let mut properties = Map::new();
        properties.insert(
            self.tag_property.clone(),
            json!({ "multi_select": multi_select }),
        );
        json!({ "properties": properties })
    }

    fn database(&self, database_id: &str) -> Result<Value> {
        self.send(self.client.get(self.url(&format!("databases/{}", database_id))))
    }
}

impl PageDirectory for NotionClient {
    fn list_pages(&self, database_id: &str, cursor: Option<&str>) -> Result<DirectoryPage> {
        let mut body = json!({ "page_size": PAGE_SIZE });
        if let Some(c) = cursor {
            body["start_cursor"] = json!(c);
        }
        let resp: QueryResponse = self.send(
            self.client
                .post(self.url(&format!("databases/{}/query", database_id)))
                .json(&body),
        )?;
        debug!(count = resp.results.len(), has_more = resp.has_more, "database query page");
        Ok(DirectoryPage {
            entries: resp
                .results
                .iter()
                .map(|p| DirectoryEntry {
                    page_id: p.id.clone(),
                    title: p.title(),
                })
                .collect(),
            next_cursor: resp.next_cursor.filter(|_| resp.has_more),
        })
    }
}

impl ContentSource for NotionClient {
    fn fetch_page(&self, page_id: &str) -> Result<FetchedPage> {
        let page: PageObject = self.send(self.client.get(self.url(&format!("pages/{}", page_id))))?;
        let blocks = self.fetch_blocks(page_id)?;
        Ok(FetchedPage {
            title: page.title().unwrap_or_default(),
            blocks,
        })
    }
}

impl TagWriter for NotionClient {
    fn registered_options(&self, database_id: &str) -> Result<Vec<String>> {
        let db = self.database(database_id)?;
        multi_select_options(&db, &self.tag_property)
    }

    fn sync_schema(&self, database_id: &str, new_options: &[String]) -> Result<()> {
        // The options list replaces the property's options, so resend the
        // existing ones alongside the additions.
        let mut names = self.registered_options(database_id)?;
        let additions: Vec<String> = new_options
            .iter()
            .filter(|n| !names.contains(n))
            .cloned()
            .collect();
        names.extend(additions);
        let options: Vec<Value> = names.iter().map(|n| json!({ "name": n })).collect();
        let body = self.tag_property_patch(json!({ "options": options }));
        let _: Value = self.send(
            self.client
                .patch(self.url(&format!("databases/{}", database_id)))
                .json(&body),
        )?;
        Ok(())
    }

    fn set_tags(&self, page_id: &str, tags: &[String]) -> Result<()> {
        let values: Vec<Value> = tags.iter().map(|t| json!({ "name": t })).collect();
        let body = self.tag_property_patch(Value::Array(values));
        let _: Value = self.send(
            self.client
                .patch(self.url(&format!("pages/{}", page_id)))
                .json(&body),
        )?;
        Ok(())
    }
}

fn multi_select_options(database: &Value, property: &str) -> Result<Vec<String>> {
    let prop = database
        .get("properties")
        .and_then(|p| p.get(property))
        .ok_or_else(|| PipelineError::InvalidResponse {
            service: SERVICE,
            message: format!("database has no property named {:?}", property),
        })?;
    if prop.get("type").and_then(Value::as_str) != Some("multi_select") {
        return Err(PipelineError::InvalidResponse {
            service: SERVICE,
            message: format!("property {:?} is not a multi-select", property),
        });
    }
    Ok(prop
        .pointer("/multi_select/options")
        .and_then(Value::as_array)
        .map(|opts| {
            opts.iter()
                .filter_map(|o| o.get("name").and_then(Value::as_str))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_response_titles() {
        let json = r#"{
            "object": "list",
            "results": [
                {"id": "a1", "properties": {
                    "Tags": {"id": "x", "type": "multi_select", "multi_select": []},
                    "Name": {"id": "title", "type": "title",
                             "title": [{"plain_text": "Trip "}, {"plain_text": "plans"}]}}},
                {"id": "b2", "properties": {}}
            ],
            "has_more": true,
            "next_cursor": "cur-2"
        }"#;
        let resp: QueryResponse = serde_json::from_str(json).unwrap();
        assert!(resp.has_more);
        assert_eq!(resp.next_cursor.as_deref(), Some("cur-2"));
        assert_eq!(resp.results[0].title().as_deref(), Some("Trip plans"));
        assert_eq!(resp.results[1].title(), None);
    }

    #[test]
    fn options_from_database() {
        let db = json!({
            "properties": {
                "Tags": {"type": "multi_select", "multi_select": {"options": [
                    {"id": "1", "name": "Work", "color": "red"},
                    {"id": "2", "name": "Family", "color": "blue"}
                ]}}
            }
        });
        assert_eq!(multi_select_options(&db, "Tags").unwrap(), ["Work", "Family"]);
    }

    #[test]
    fn options_require_multi_select_property() {
        let db = json!({ "properties": { "Tags": {"type": "rich_text"} } });
        assert!(multi_select_options(&db, "Tags").is_err());
        assert!(multi_select_options(&db, "Labels").is_err());
    }
}
