use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::{user_prompt, ClassifyRequest, TagClassifier, SYSTEM_PROMPT};
use crate::config::Settings;
use crate::error::{PipelineError, Result};
use crate::throttle::Throttle;
use crate::vocabulary::Vocabulary;

const SERVICE: &str = "OpenAI";

/// Chat-completions classifier using structured outputs: the response schema
/// enumerates the vocabulary, so the model cannot emit other tags. Calls are
/// spaced by `OPENAI_MIN_INTERVAL_MS`.
pub struct OpenAiClassifier {
    client: Client,
    model: String,
    base_url: String,
    throttle: Throttle,
}

impl OpenAiClassifier {
    pub fn new(settings: &Settings) -> anyhow::Result<Self> {
        let mut headers = HeaderMap::new();
        let auth = format!("Bearer {}", settings.openai_api_key()?);
        headers.insert(AUTHORIZATION, HeaderValue::from_str(&auth)?);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .default_headers(headers)
            .timeout(settings.request_timeout())
            .build()?;
        Ok(OpenAiClassifier {
            client,
            model: settings.openai_model.clone(),
            base_url: settings.openai_base_url.trim_end_matches('/').to_string(),
            throttle: Throttle::new(settings.openai_min_interval()),
        })
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    response_format: Value,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: AssistantMessage,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    content: Option<String>,
    refusal: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TaggedContent {
    tags: Vec<String>,
}

fn response_format(vocabulary: &Vocabulary) -> Value {
    json!({
        "type": "json_schema",
        "json_schema": {
            "name": "tagged_content",
            "strict": true,
            "schema": {
                "type": "object",
                "properties": {
                    "tags": {
                        "type": "array",
                        "items": { "type": "string", "enum": vocabulary.tags() }
                    }
                },
                "required": ["tags"],
                "additionalProperties": false
            }
        }
    })
}

fn parse_tags(response: ChatResponse) -> Result<Vec<String>> {
    let message = response
        .choices
        .into_iter()
        .next()
        .map(|c| c.message)
        .ok_or_else(|| PipelineError::InvalidResponse {
            service: SERVICE,
            message: "no choices returned".to_string(),
        })?;
    if let Some(refusal) = message.refusal {
        return Err(PipelineError::Refusal(refusal));
    }
    let content = message.content.ok_or_else(|| PipelineError::InvalidResponse {
        service: SERVICE,
        message: "empty message content".to_string(),
    })?;
    let parsed: TaggedContent = serde_json::from_str(&content)?;
    Ok(parsed.tags)
}

impl TagClassifier for OpenAiClassifier {
    fn classify(&self, request: &ClassifyRequest<'_>) -> Result<Vec<String>> {
        let prompt = user_prompt(request);
        let body = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: &prompt,
                },
            ],
            response_format: response_format(request.vocabulary),
        };
        self.throttle.wait();
        let resp = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .json(&body)
            .send()?;
        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp
                .text()
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            return Err(PipelineError::Api {
                service: SERVICE,
                status: status.as_u16(),
                body: text,
            });
        }
        parse_tags(resp.json()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_enumerates_vocabulary() {
        let vocab = Vocabulary::new(["Work", "Friends"]);
        let format = response_format(&vocab);
        assert_eq!(
            format.pointer("/json_schema/schema/properties/tags/items/enum"),
            Some(&json!(["Work", "Friends"]))
        );
        assert_eq!(format.pointer("/json_schema/strict"), Some(&json!(true)));
    }

    #[test]
    fn parses_structured_reply() {
        let resp: ChatResponse = serde_json::from_str(
            r#"{"choices": [{"message": {"role": "assistant",
                "content": "{\"tags\": [\"Work\", \"Research\"]}", "refusal": null}}]}"#,
        )
        .unwrap();
        assert_eq!(parse_tags(resp).unwrap(), ["Work", "Research"]);
    }

    #[test]
    fn refusal_is_an_error() {
        let resp: ChatResponse = serde_json::from_str(
            r#"{"choices": [{"message": {"content": null, "refusal": "I can't help with that."}}]}"#,
        )
        .unwrap();
        assert!(matches!(parse_tags(resp), Err(PipelineError::Refusal(_))));
    }

    #[test]
    fn no_choices_is_an_error() {
        let resp: ChatResponse = serde_json::from_str(r#"{"choices": []}"#).unwrap();
        assert!(matches!(
            parse_tags(resp),
            Err(PipelineError::InvalidResponse { .. })
        ));
    }
}
