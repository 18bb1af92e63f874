//! Test fixtures for integration tests
//!
//! Provides a scripted translation provider and cue/session/state builders
//! so scheduler behavior can be tested without network access.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::config::ServerConfig;
use crate::cue::Cue;
use crate::error::ProviderError;
use crate::session::{SessionInit, TranslationSession};
use crate::state::AppState;
use crate::store::{RecordMetadata, TranslationRecord};
use crate::translate::provider::{BatchRequest, BatchResponse, TranslatedItem};
use crate::translate::TranslationProvider;

/// Scripted provider: translates every item deterministically, with
/// optional per-call delay and injected failures for batches containing
/// configured cue identifiers.
pub struct MockProvider {
    name: String,
    delay_ms: u64,
    fail_indices: HashSet<usize>,
    calls: AtomicUsize,
    /// Cue identifiers of every request, in dispatch order.
    requests: Mutex<Vec<Vec<usize>>>,
}

impl MockProvider {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            delay_ms: 0,
            fail_indices: HashSet::new(),
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Sleep this long before answering each request.
    pub fn with_delay_ms(mut self, delay_ms: u64) -> Self {
        self.delay_ms = delay_ms;
        self
    }

    /// Fail any batch containing one of these cue identifiers.
    pub fn failing_on(mut self, indices: &[usize]) -> Self {
        self.fail_indices = indices.iter().copied().collect();
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn request_log(&self) -> Vec<Vec<usize>> {
        self.requests.lock().clone()
    }

    /// The translation this provider produces for one text.
    pub fn translation(&self, target_language: &str, text: &str) -> String {
        format!("[{}:{}] {}", self.name, target_language, text)
    }
}

#[async_trait]
impl TranslationProvider for MockProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn translate_batch(
        &self,
        request: &BatchRequest,
    ) -> Result<BatchResponse, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests
            .lock()
            .push(request.items.iter().map(|item| item.index).collect());

        if self.delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.delay_ms)).await;
        }
        if request
            .items
            .iter()
            .any(|item| self.fail_indices.contains(&item.index))
        {
            return Err(ProviderError::Request("injected batch failure".to_string()));
        }

        Ok(BatchResponse {
            items: request
                .items
                .iter()
                .map(|item| TranslatedItem {
                    index: item.index,
                    translated_text: self.translation(&request.target_language, &item.text),
                })
                .collect(),
        })
    }
}

/// Normalized cues at one-second spacing, one per text.
pub fn make_cues(texts: &[&str]) -> Vec<Cue> {
    texts
        .iter()
        .enumerate()
        .map(|(i, text)| Cue::new(i, i as u64 * 1000, i as u64 * 1000 + 900, *text))
        .collect()
}

/// A ready-to-run session over `texts`, en -> es.
pub fn make_session(texts: &[&str], anchor_index: usize) -> Arc<TranslationSession> {
    Arc::new(TranslationSession::new(SessionInit {
        platform: "youtube".to_string(),
        video_id: "e2e".to_string(),
        source_language: "en".to_string(),
        target_language: "es".to_string(),
        cues: make_cues(texts),
        anchor_index,
        batch_count: texts.len().div_ceil(10),
        auto_generated: false,
        consolidated: false,
    }))
}

/// Session init for registry tests, keyed by video identifier.
pub fn sample_session_init(video_id: &str) -> SessionInit {
    SessionInit {
        platform: "youtube".to_string(),
        video_id: video_id.to_string(),
        source_language: "en".to_string(),
        target_language: "es".to_string(),
        cues: make_cues(&["one", "two", "three"]),
        anchor_index: 0,
        batch_count: 1,
        auto_generated: false,
        consolidated: false,
    }
}

/// A storable record with one translated cue.
pub fn sample_record(video_id: &str) -> TranslationRecord {
    let mut cue = Cue::new(0, 0, 1000, "hello");
    cue.translated_text = Some("hola".to_string());
    TranslationRecord {
        platform: "youtube".to_string(),
        video_id: video_id.to_string(),
        source_language: "en".to_string(),
        target_language: "es".to_string(),
        cues: vec![cue],
        metadata: RecordMetadata {
            quick_provider: Some("mock-quick".to_string()),
            quality_provider: "mock-quality".to_string(),
            translated_units: 1,
            failed_batches: 0,
            total_batches: 1,
            consolidated: false,
            auto_generated: false,
        },
        created_at_ms: 0,
        updated_at_ms: 0,
    }
}

/// Application state wired to mock providers and default configuration.
pub fn make_state() -> AppState {
    AppState::with_providers(
        ServerConfig::default(),
        Arc::new(MockProvider::new("mock-quick")),
        Arc::new(MockProvider::new("mock-quality")),
    )
}
