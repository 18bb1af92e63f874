//! Fast baseline tier: the public Google Translate web endpoint.
//!
//! Speaks the unofficial `translate_a/single` API with `client=gtx` and one
//! `q` parameter per batch item. Replies are positional JSON arrays in one
//! of two shapes depending on how many queries were sent.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::config::GoogleProviderConfig;
use crate::error::{ProviderError, Result, SubtransError};
use crate::translate::provider::{BatchRequest, BatchResponse, TranslatedItem, TranslationProvider};

pub const GOOGLE_PROVIDER_NAME: &str = "google";

pub struct GoogleProvider {
    client: Client,
    endpoint: String,
    max_retries: u32,
}

impl GoogleProvider {
    pub fn new(config: &GoogleProviderConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| SubtransError::Config(format!("google HTTP client: {}", e)))?;
        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            max_retries: config.max_retries,
        })
    }

    async fn request_with_retry(&self, params: &[(String, String)]) -> std::result::Result<String, ProviderError> {
        let mut attempt = 0u32;
        loop {
            let result = self.client.get(&self.endpoint).query(params).send().await;
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
                        let backoff_ms = 200u64 << attempt;
                        debug!("google returned {}, retrying in {} ms", status, backoff_ms);
                        sleep(Duration::from_millis(backoff_ms)).await;
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
                        let backoff_ms = 200u64 << attempt;
                        debug!("google request failed ({}), retrying in {} ms", e, backoff_ms);
                        sleep(Duration::from_millis(backoff_ms)).await;
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
impl TranslationProvider for GoogleProvider {
    fn name(&self) -> &str {
        GOOGLE_PROVIDER_NAME
    }

    async fn translate_batch(&self, request: &BatchRequest) -> std::result::Result<BatchResponse, ProviderError> {
        let mut params: Vec<(String, String)> = vec![
            ("client".into(), "gtx".into()),
            ("sl".into(), normalize_lang(&request.source_language, false)),
            ("tl".into(), normalize_lang(&request.target_language, true)),
            ("dt".into(), "t".into()),
        ];
        let mut positions: Vec<usize> = Vec::with_capacity(request.items.len());
        for item in &request.items {
            let text = item.text.trim();
            if text.is_empty() {
                continue;
            }
            positions.push(item.index);
            params.push(("q".into(), text.to_string()));
        }
        if positions.is_empty() {
            return Ok(BatchResponse::default());
        }

        let body = self.request_with_retry(&params).await?;
        let value: Value = serde_json::from_str(&body)
            .map_err(|e| ProviderError::MalformedResponse(e.to_string()))?;
        let translations = parse_payload(&value, positions.len())?;

        if translations.len() != positions.len() {
            warn!(
                "google returned {} translations for {} queries",
                translations.len(),
                positions.len()
            );
        }

        let items = positions
            .into_iter()
            .zip(translations)
            .map(|(index, translated_text)| TranslatedItem {
                index,
                translated_text,
            })
            .collect();
        Ok(BatchResponse { items })
    }
}

/// Maps common speech-model language codes onto the codes the web endpoint
/// accepts. `auto` passes through for source detection.
fn normalize_lang(code: &str, is_target: bool) -> String {
    let code = code.trim();
    if code.eq_ignore_ascii_case("auto") {
        return "auto".to_string();
    }
    match code {
        "jw" => "jv".to_string(),
        "yue" => "zh-TW".to_string(),
        "nn" if is_target => "no".to_string(),
        other => other.to_string(),
    }
}

/// Extracts positional translations from the endpoint's reply.
///
/// Single-query replies put the translated pieces at the top level;
/// multi-query replies wrap one such block per query.
fn parse_payload(value: &Value, sent: usize) -> std::result::Result<Vec<String>, ProviderError> {
    let top = value
        .as_array()
        .ok_or_else(|| ProviderError::MalformedResponse("expected array payload".to_string()))?;

    let single_shape = top
        .first()
        .and_then(|e| e.get(0))
        .and_then(|e| e.as_array())
        .and_then(|arr| arr.first())
        .and_then(|e| e.as_str())
        .is_some();

    if single_shape {
        if sent != 1 {
            return Err(ProviderError::CountMismatch { sent, received: 1 });
        }
        return Ok(vec![concat_pieces(value.get(0))]);
    }

    Ok(top.iter().map(|elem| concat_pieces(elem.get(0))).collect())
}

fn concat_pieces(block: Option<&Value>) -> String {
    let mut out = String::new();
    if let Some(arr) = block.and_then(|b| b.as_array()) {
        for item in arr {
            if let Some(piece) = item.get(0).and_then(|p| p.as_str()) {
                out.push_str(piece);
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_normalize_lang() {
        assert_eq!(normalize_lang("auto", false), "auto");
        assert_eq!(normalize_lang("AUTO", false), "auto");
        assert_eq!(normalize_lang("jw", false), "jv");
        assert_eq!(normalize_lang("yue", true), "zh-TW");
        assert_eq!(normalize_lang("nn", true), "no");
        assert_eq!(normalize_lang("nn", false), "nn");
        assert_eq!(normalize_lang("en", false), "en");
    }

    #[test]
    fn test_parse_single_query_payload() {
        let value = json!([[["Hola. ", "Hello. ", null], ["Adiós.", "Bye.", null]], null, "en"]);
        let out = parse_payload(&value, 1).unwrap();
        assert_eq!(out, vec!["Hola. Adiós.".to_string()]);
    }

    #[test]
    fn test_parse_multi_query_payload() {
        let value = json!([
            [[["Hola", "Hello"]], null, "en"],
            [[["Mundo", "World"]], null, "en"]
        ]);
        let out = parse_payload(&value, 2).unwrap();
        assert_eq!(out, vec!["Hola".to_string(), "Mundo".to_string()]);
    }

    #[test]
    fn test_parse_single_shape_for_multi_send_is_error() {
        let value = json!([[["Todo junto", "All together"]], null, "en"]);
        let err = parse_payload(&value, 3).unwrap_err();
        assert!(matches!(
            err,
            ProviderError::CountMismatch { sent: 3, received: 1 }
        ));
    }

    #[test]
    fn test_parse_rejects_non_array() {
        let value = json!({"unexpected": true});
        assert!(parse_payload(&value, 1).is_err());
    }
}
