//! Application state management
//!
//! This module defines the AppState structure that holds:
//! - Active translation sessions, with a per-page index
//! - The translation record store
//! - The provider handles for both tiers
//! - Server configuration

use std::sync::Arc;

use dashmap::DashMap;

use crate::config::ServerConfig;
use crate::error::{ProviderError, Result};
use crate::session::TranslationSession;
use crate::store::RecordStore;
use crate::translate::google::GoogleProvider;
use crate::translate::openai::OpenAiProvider;
use crate::translate::TranslationProvider;

/// Terminal sessions older than this are dropped by the maintenance task.
pub const SESSION_TTL_SECS: u64 = 3600;

/// Shared application state
pub struct AppState {
    /// Server configuration
    pub config: ServerConfig,

    /// Finished translations, keyed by page context and language pair
    pub store: RecordStore,

    /// Fast baseline tier
    pub quick_provider: Arc<dyn TranslationProvider>,

    /// Quality tier
    pub quality_provider: Arc<dyn TranslationProvider>,

    /// Active sessions (session_id -> session)
    sessions: DashMap<String, Arc<TranslationSession>>,

    /// Page index (page_key -> session_id); at most one active session per
    /// playing video.
    pages: DashMap<String, String>,
}

/// Builds a provider client from its configured name.
pub fn build_provider(
    name: &str,
    config: &ServerConfig,
) -> Result<Arc<dyn TranslationProvider>> {
    match name {
        "google" => Ok(Arc::new(GoogleProvider::new(&config.providers.google)?)),
        "openai" => Ok(Arc::new(OpenAiProvider::new(&config.providers.openai)?)),
        other => Err(ProviderError::UnknownProvider(other.to_string()).into()),
    }
}

impl AppState {
    /// Create application state, constructing both provider tiers from the
    /// configuration.
    pub fn new(config: ServerConfig) -> Result<Self> {
        let quick = build_provider(&config.providers.quick, &config)?;
        let quality = build_provider(&config.providers.quality, &config)?;
        Ok(Self::with_providers(config, quick, quality))
    }

    /// Create application state with explicit provider handles.
    pub fn with_providers(
        config: ServerConfig,
        quick_provider: Arc<dyn TranslationProvider>,
        quality_provider: Arc<dyn TranslationProvider>,
    ) -> Self {
        let store = RecordStore::new(config.cache.clone());
        Self {
            config,
            store,
            quick_provider,
            quality_provider,
            sessions: DashMap::new(),
            pages: DashMap::new(),
        }
    }

    /// Register a new session, cancelling any session still running for the
    /// same page.
    pub fn register_session(&self, session: TranslationSession) -> Arc<TranslationSession> {
        let session = Arc::new(session);
        if let Some(previous_id) = self.pages.insert(session.page_key(), session.id.clone()) {
            if let Some(previous) = self.sessions.get(&previous_id) {
                tracing::info!(
                    "Cancelling session {} superseded by {}",
                    previous_id,
                    session.id
                );
                previous.cancel();
            }
        }
        self.sessions.insert(session.id.clone(), session.clone());
        session
    }

    /// Get a session by its identifier
    pub fn get_session(&self, session_id: &str) -> Option<Arc<TranslationSession>> {
        self.sessions.get(session_id).map(|entry| entry.clone())
    }

    /// Get the current session for a page, if any
    pub fn get_page_session(&self, page_key: &str) -> Option<Arc<TranslationSession>> {
        let session_id = self.pages.get(page_key)?.clone();
        self.get_session(&session_id)
    }

    /// Snapshot of every registered session
    pub fn sessions(&self) -> Vec<Arc<TranslationSession>> {
        self.sessions.iter().map(|entry| entry.clone()).collect()
    }

    /// Number of registered sessions
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Remove a session and its page index entry, returning whether one was
    /// present. The session is cancelled first so a running orchestrator
    /// stops at its next poll point.
    pub fn remove_session(&self, session_id: &str) -> bool {
        let Some((_, session)) = self.sessions.remove(session_id) else {
            return false;
        };
        session.cancel();
        self.pages
            .remove_if(&session.page_key(), |_, current| current == session_id);
        true
    }

    /// Drop terminal sessions that finished more than `max_age_secs` ago.
    /// Returns how many were removed.
    pub fn cleanup_sessions(&self, max_age_secs: u64) -> usize {
        let stale: Vec<String> = self
            .sessions
            .iter()
            .filter(|entry| {
                entry
                    .seconds_since_finished()
                    .is_some_and(|age| age > max_age_secs)
            })
            .map(|entry| entry.key().clone())
            .collect();
        for session_id in &stale {
            self.remove_session(session_id);
        }
        stale.len()
    }
}
