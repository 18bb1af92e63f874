//! Quality tier: an OpenAI-compatible chat-completions backend.
//!
//! Each batch is sent as a JSON array of `{index, text}` items with a system
//! prompt demanding a strict JSON array reply. Models wrap replies in code
//! fences or prose often enough that parsing tolerates both.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::config::OpenAiProviderConfig;
use crate::error::{ProviderError, Result, SubtransError};
use crate::translate::provider::{BatchRequest, BatchResponse, TranslatedItem, TranslationProvider};

pub const OPENAI_PROVIDER_NAME: &str = "openai";

pub struct OpenAiProvider {
    client: Client,
    base_url: String,
    model: String,
    api_key: String,
    max_retries: u32,
}

impl OpenAiProvider {
    pub fn new(config: &OpenAiProviderConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
            .filter(|k| !k.trim().is_empty())
            .ok_or(ProviderError::MissingApiKey(OPENAI_PROVIDER_NAME.to_string()))?;
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| SubtransError::Config(format!("openai HTTP client: {}", e)))?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key,
            max_retries: config.max_retries,
        })
    }

    async fn request_with_retry(&self, body: &serde_json::Value) -> std::result::Result<String, ProviderError> {
        let url = format!("{}/chat/completions", self.base_url);
        let mut attempt = 0u32;
        loop {
            let result = self
                .client
                .post(&url)
                .bearer_auth(&self.api_key)
                .json(body)
                .send()
                .await;
            match result {
                Ok(resp) if resp.status().is_success() => {
                    return resp
                        .text()
                        .await
                        .map_err(|e| ProviderError::Request(e.to_string()));
                }
                Ok(resp) => {
                    let status = resp.status();
                    let retryable = status.as_u16() == 429 || status.is_server_error();
                    if retryable && attempt < self.max_retries {
                        let backoff_secs = 1u64 << attempt;
                        debug!("openai returned {}, retrying in {} s", status, backoff_secs);
                        sleep(Duration::from_secs(backoff_secs)).await;
                        attempt += 1;
                        continue;
                    }
                    let body = resp.text().await.unwrap_or_default();
                    return Err(ProviderError::Status {
                        status: status.as_u16(),
                        body,
                    });
                }
                Err(e) => {
                    if attempt < self.max_retries {
                        let backoff_secs = 1u64 << attempt;
                        debug!("openai request failed ({}), retrying in {} s", e, backoff_secs);
                        sleep(Duration::from_secs(backoff_secs)).await;
                        attempt += 1;
                        continue;
                    }
                    return Err(ProviderError::Request(e.to_string()));
                }
            }
        }
    }
}

#[async_trait]
impl TranslationProvider for OpenAiProvider {
    fn name(&self) -> &str {
        OPENAI_PROVIDER_NAME
    }

    async fn translate_batch(&self, request: &BatchRequest) -> std::result::Result<BatchResponse, ProviderError> {
        let items: Vec<_> = request
            .items
            .iter()
            .filter(|item| !item.text.trim().is_empty())
            .collect();
        if items.is_empty() {
            return Ok(BatchResponse::default());
        }

        let payload = serde_json::to_string(&items)
            .map_err(|e| ProviderError::Request(format!("encoding batch: {}", e)))?;
        let body = json!({
            "model": self.model,
            "messages": [
                {
                    "role": "system",
                    "content": system_prompt(&request.source_language, &request.target_language),
                },
                { "role": "user", "content": payload },
            ],
            "temperature": 0.3,
        });

        let raw = self.request_with_retry(&body).await?;
        let response: ChatResponse = serde_json::from_str(&raw)
            .map_err(|e| ProviderError::MalformedResponse(e.to_string()))?;
        let content = response
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| ProviderError::MalformedResponse("no choices in reply".to_string()))?;

        let translated = parse_reply(&content)?;
        if translated.len() != items.len() {
            warn!(
                "openai returned {} translations for {} items",
                translated.len(),
                items.len()
            );
        }
        Ok(BatchResponse { items: translated })
    }
}

fn system_prompt(source: &str, target: &str) -> String {
    let source_clause = if source.eq_ignore_ascii_case("auto") {
        "the detected source language".to_string()
    } else {
        format!("'{}'", source)
    };
    format!(
        "You are a subtitle translator. Translate the text of every item from {} to '{}'. \
         Keep each translation natural and concise enough for subtitle display. \
         Reply with only a JSON array of objects shaped like \
         [{{\"index\": 0, \"translation\": \"...\"}}], one per input item, \
         reusing each item's original index. No commentary, no code fences.",
        source_clause, target
    )
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: String,
}

#[derive(Deserialize)]
struct ReplyItem {
    #[serde(alias = "id")]
    index: usize,
    #[serde(alias = "translated_text")]
    translation: String,
}

/// Parses the model's reply into translated items, tolerating code fences
/// and surrounding prose.
fn parse_reply(content: &str) -> std::result::Result<Vec<TranslatedItem>, ProviderError> {
    let cleaned = strip_code_fence(content);
    let candidate = extract_json_array(cleaned).unwrap_or(cleaned);
    let parsed: Vec<ReplyItem> = serde_json::from_str(candidate).map_err(|e| {
        ProviderError::MalformedResponse(format!("reply is not a translation array: {}", e))
    })?;
    Ok(parsed
        .into_iter()
        .map(|item| TranslatedItem {
            index: item.index,
            translated_text: item.translation,
        })
        .collect())
}

fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    if !trimmed.starts_with("```") {
        return trimmed;
    }
    let without_open = match trimmed.find('\n') {
        Some(pos) => &trimmed[pos + 1..],
        None => return trimmed,
    };
    let body = without_open.strip_suffix("```").unwrap_or(without_open);
    body.trim()
}

fn extract_json_array(text: &str) -> Option<&str> {
    let start = text.find('[')?;
    let end = text.rfind(']')?;
    (end > start).then(|| &text[start..=end])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_code_fence() {
        assert_eq!(strip_code_fence("[1]"), "[1]");
        assert_eq!(strip_code_fence("```json\n[1]\n```"), "[1]");
        assert_eq!(strip_code_fence("```\n[1]\n```"), "[1]");
        assert_eq!(strip_code_fence("  ```json\n[1]\n```  "), "[1]");
    }

    #[test]
    fn test_extract_json_array() {
        assert_eq!(extract_json_array("noise [1, 2] more"), Some("[1, 2]"));
        assert_eq!(extract_json_array("no array here"), None);
    }

    #[test]
    fn test_parse_reply_plain() {
        let out = parse_reply(r#"[{"index": 0, "translation": "hola"}]"#).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].index, 0);
        assert_eq!(out[0].translated_text, "hola");
    }

    #[test]
    fn test_parse_reply_fenced_with_prose() {
        let content = "Here you go:\n```json\n[{\"index\": 2, \"translation\": \"mundo\"}]\n```";
        let out = parse_reply(content).unwrap();
        assert_eq!(out[0].index, 2);
        assert_eq!(out[0].translated_text, "mundo");
    }

    #[test]
    fn test_parse_reply_id_alias() {
        let out = parse_reply(r#"[{"id": 5, "translation": "ciao"}]"#).unwrap();
        assert_eq!(out[0].index, 5);
    }

    #[test]
    fn test_parse_reply_rejects_non_array() {
        assert!(parse_reply(r#"{"index": 0}"#).is_err());
    }

    #[test]
    fn test_system_prompt_mentions_languages() {
        let prompt = system_prompt("en", "es");
        assert!(prompt.contains("'en'"));
        assert!(prompt.contains("'es'"));

        let auto = system_prompt("auto", "fr");
        assert!(auto.contains("detected source language"));
    }
}
