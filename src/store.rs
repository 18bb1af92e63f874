//! Translation record store
//!
//! Keeps finished bilingual cue sets keyed by page context and language
//! pair, with TTL expiry and oldest-access eviction at capacity. Serving a
//! stored record skips a whole translation run, so the store is consulted
//! before any session starts.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::time::SystemTime;

use crate::config::RecordCacheConfig;
use crate::cue::Cue;
use crate::error::{Result, SubtransError};
use crate::session::TranslationSession;

/// Run details carried alongside the cues of a record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordMetadata {
    /// Fast baseline provider, absent when the quick pass was skipped.
    pub quick_provider: Option<String>,
    pub quality_provider: String,
    pub translated_units: usize,
    pub failed_batches: usize,
    pub total_batches: usize,
    pub consolidated: bool,
    pub auto_generated: bool,
}

/// The persisted outcome of one translation session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslationRecord {
    pub platform: String,
    pub video_id: String,
    pub source_language: String,
    pub target_language: String,
    pub cues: Vec<Cue>,
    pub metadata: RecordMetadata,
    pub created_at_ms: i64,
    pub updated_at_ms: i64,
}

impl TranslationRecord {
    /// Packages a finished session into a record.
    pub fn from_session(
        session: &TranslationSession,
        quick_provider: Option<&str>,
        quality_provider: &str,
    ) -> Self {
        let now = chrono::Utc::now().timestamp_millis();
        Self {
            platform: session.platform.clone(),
            video_id: session.video_id.clone(),
            source_language: session.source_language.clone(),
            target_language: session.target_language.clone(),
            cues: session.record_cues(),
            metadata: RecordMetadata {
                quick_provider: quick_provider.map(str::to_string),
                quality_provider: quality_provider.to_string(),
                translated_units: session.translated_units(),
                failed_batches: session.failed_batches(),
                total_batches: session.batch_count,
                consolidated: session.consolidated,
                auto_generated: session.auto_generated,
            },
            created_at_ms: now,
            updated_at_ms: now,
        }
    }

    /// Cues carrying a real translation.
    pub fn translated_units(&self) -> usize {
        self.cues.iter().filter(|c| c.is_translated()).count()
    }
}

/// Store entry with access metadata
#[derive(Debug, Clone)]
pub struct StoredRecord {
    pub record: TranslationRecord,
    pub stored_at: SystemTime,
    pub last_accessed: SystemTime,
    pub hits: usize,
}

impl StoredRecord {
    pub fn new(record: TranslationRecord) -> Self {
        let now = SystemTime::now();
        Self {
            record,
            stored_at: now,
            last_accessed: now,
            hits: 0,
        }
    }

    pub fn touch(&mut self) {
        self.last_accessed = SystemTime::now();
        self.hits += 1;
    }

    pub fn age_secs(&self) -> u64 {
        self.stored_at.elapsed().map(|d| d.as_secs()).unwrap_or(0)
    }

    pub fn is_expired(&self, ttl_secs: u64) -> bool {
        self.age_secs() > ttl_secs
    }
}

/// In-memory record store with TTL and capacity limits
pub struct RecordStore {
    /// Stored records (key -> entry)
    entries: DashMap<String, StoredRecord>,
    /// Store configuration
    config: RecordCacheConfig,
}

impl RecordStore {
    /// Create a new record store
    pub fn new(config: RecordCacheConfig) -> Self {
        Self {
            entries: DashMap::new(),
            config,
        }
    }

    /// Generate store key from components
    pub fn make_key(platform: &str, video_id: &str, source: &str, target: &str) -> String {
        format!("{}:{}:{}:{}", platform, video_id, source, target)
    }

    /// Get a stored record
    pub fn get(
        &self,
        platform: &str,
        video_id: &str,
        source: &str,
        target: &str,
    ) -> Option<TranslationRecord> {
        let key = Self::make_key(platform, video_id, source, target);

        if let Some(mut entry) = self.entries.get_mut(&key) {
            if entry.is_expired(self.config.ttl_secs) {
                drop(entry);
                self.entries.remove(&key);
                return None;
            }
            entry.touch();
            Some(entry.record.clone())
        } else {
            None
        }
    }

    /// Check whether a record is stored
    pub fn contains(&self, platform: &str, video_id: &str, source: &str, target: &str) -> bool {
        let key = Self::make_key(platform, video_id, source, target);
        self.entries
            .get(&key)
            .map(|entry| !entry.is_expired(self.config.ttl_secs))
            .unwrap_or(false)
    }

    /// Store a record
    ///
    /// Rejects records with no translated cues and records over the per
    /// record cue cap. Overwriting an existing key keeps its original
    /// creation timestamp.
    pub fn put(&self, record: TranslationRecord) -> Result<()> {
        if record.cues.len() > self.config.max_cues_per_record {
            return Err(SubtransError::RecordRejected(format!(
                "{} cues exceeds limit of {}",
                record.cues.len(),
                self.config.max_cues_per_record
            )));
        }
        if record.translated_units() == 0 {
            return Err(SubtransError::RecordRejected(
                "record has no translated cues".to_string(),
            ));
        }

        let key = Self::make_key(
            &record.platform,
            &record.video_id,
            &record.source_language,
            &record.target_language,
        );

        if !self.entries.contains_key(&key) && self.entries.len() >= self.config.max_records {
            self.evict_one();
        }

        let mut record = record;
        if let Some(existing) = self.entries.get(&key) {
            record.created_at_ms = existing.record.created_at_ms;
        }
        self.entries.insert(key, StoredRecord::new(record));
        Ok(())
    }

    /// Evict to make room: expired entries first, then the entry with the
    /// oldest access time.
    fn evict_one(&self) {
        self.clear_expired();
        if self.entries.len() < self.config.max_records {
            return;
        }

        let oldest = self
            .entries
            .iter()
            .min_by_key(|entry| entry.value().last_accessed)
            .map(|entry| entry.key().clone());
        if let Some(key) = oldest {
            self.entries.remove(&key);
        }
    }

    /// Remove a record, returning whether one was present
    pub fn remove(&self, platform: &str, video_id: &str, source: &str, target: &str) -> bool {
        let key = Self::make_key(platform, video_id, source, target);
        self.entries.remove(&key).is_some()
    }

    /// Clear all expired entries, returning how many were dropped
    pub fn clear_expired(&self) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|_, entry| !entry.is_expired(self.config.ttl_secs));
        before - self.entries.len()
    }

    /// Get store statistics
    pub fn stats(&self) -> RecordStoreStats {
        let mut count = 0;
        let mut total_cues = 0;
        let mut total_hits = 0;
        let mut oldest_age = 0;

        for entry in self.entries.iter() {
            count += 1;
            total_cues += entry.value().record.cues.len();
            total_hits += entry.value().hits;
            let age = entry.value().age_secs();
            if age > oldest_age {
                oldest_age = age;
            }
        }

        RecordStoreStats {
            entry_count: count,
            total_cues,
            total_hits,
            capacity: self.config.max_records,
            oldest_entry_age_secs: oldest_age,
        }
    }

    /// Get the number of stored records
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the store is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Store statistics
#[derive(Debug, Serialize)]
pub struct RecordStoreStats {
    pub entry_count: usize,
    pub total_cues: usize,
    pub total_hits: usize,
    pub capacity: usize,
    pub oldest_entry_age_secs: u64,
}

impl Default for RecordStore {
    fn default() -> Self {
        Self::new(RecordCacheConfig::default())
    }
}
