//! Provider abstraction for batch translation backends.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;
use crate::schedule::BatchItem;

/// One batch-translate call: the items to translate plus the language pair.
///
/// `source_language` may be `"auto"` for providers that detect the source.
#[derive(Debug, Clone, Serialize)]
pub struct BatchRequest {
    pub items: Vec<BatchItem>,
    pub source_language: String,
    pub target_language: String,
}

impl BatchRequest {
    pub fn new(items: Vec<BatchItem>, source_language: &str, target_language: &str) -> Self {
        Self {
            items,
            source_language: source_language.to_string(),
            target_language: target_language.to_string(),
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// One translated item, keyed by the stable cue identifier it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslatedItem {
    pub index: usize,
    pub translated_text: String,
}

/// A provider's answer. Items the provider could not translate are absent;
/// callers never treat absence as an empty translation.
#[derive(Debug, Clone, Default)]
pub struct BatchResponse {
    pub items: Vec<TranslatedItem>,
}

/// A batch translation backend.
#[async_trait]
pub trait TranslationProvider: Send + Sync {
    /// Short stable name, used in logs, cache records, and tier comparison.
    fn name(&self) -> &str;

    /// Translates one batch. Implementations retry transient failures
    /// internally; a returned error means the batch is spent.
    async fn translate_batch(&self, request: &BatchRequest) -> Result<BatchResponse, ProviderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_translated_item_roundtrip() {
        let json = r#"{"index":3,"translated_text":"hola"}"#;
        let item: TranslatedItem = serde_json::from_str(json).unwrap();
        assert_eq!(item.index, 3);
        assert_eq!(item.translated_text, "hola");
    }

    #[test]
    fn test_batch_request_serializes_items() {
        let request = BatchRequest::new(
            vec![BatchItem {
                index: 0,
                text: "hello".to_string(),
            }],
            "en",
            "es",
        );
        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains("\"source_language\":\"en\""));
        assert!(json.contains("\"hello\""));
    }
}
