//! Translation session lifecycle and shared run state.
//!
//! A session owns everything one translation run mutates: the timing array,
//! the lookup memo, the cancellation flag, and the progress/revision
//! counters the HTTP surface reads. The orchestrator is the only writer of
//! the timing array; handlers only snapshot it.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, AtomicUsize, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use dashmap::DashMap;
use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::Notify;
use uuid::Uuid;

use crate::cue::{build_timings, Cue, CueTiming};
use crate::translate::apply::apply_translation;

/// Where a session is in its run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    Pending,
    QuickPass,
    QualityPass,
    Complete,
    Failed,
    Cancelled,
}

impl SessionPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete | Self::Failed | Self::Cancelled)
    }
}

/// Key identifying one playing video; at most one active session each.
pub fn page_key(platform: &str, video_id: &str) -> String {
    format!("{}:{}", platform, video_id)
}

/// Everything needed to start a session.
pub struct SessionInit {
    pub platform: String,
    pub video_id: String,
    pub source_language: String,
    pub target_language: String,
    pub cues: Vec<Cue>,
    pub anchor_index: usize,
    pub batch_count: usize,
    pub auto_generated: bool,
    pub consolidated: bool,
}

/// One translation run over one cue sequence.
pub struct TranslationSession {
    pub id: String,
    pub platform: String,
    pub video_id: String,
    pub source_language: String,
    pub target_language: String,
    pub anchor_index: usize,
    pub batch_count: usize,
    pub auto_generated: bool,
    pub consolidated: bool,

    /// Source cues after normalization (and consolidation, for ASR input).
    /// Position i corresponds to timing slot i for the whole run.
    cues: Vec<Cue>,
    timings: RwLock<Vec<CueTiming>>,
    /// Trimmed source text -> translated text, quick-pass memo.
    memo: DashMap<String, String>,

    active: AtomicBool,
    phase: RwLock<SessionPhase>,
    progress: AtomicU8,
    revision: AtomicU64,
    notify: Notify,

    failed_batches: AtomicUsize,
    completed_batches: AtomicUsize,

    created_at: u64,
    /// Epoch seconds when the session reached a terminal phase, 0 while
    /// running.
    finished_at: AtomicU64,
}

fn epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

impl TranslationSession {
    pub fn new(init: SessionInit) -> Self {
        let timings = build_timings(&init.cues);
        Self {
            id: Uuid::new_v4().to_string(),
            platform: init.platform,
            video_id: init.video_id,
            source_language: init.source_language,
            target_language: init.target_language,
            anchor_index: init.anchor_index,
            batch_count: init.batch_count,
            auto_generated: init.auto_generated,
            consolidated: init.consolidated,
            cues: init.cues,
            timings: RwLock::new(timings),
            memo: DashMap::new(),
            active: AtomicBool::new(true),
            phase: RwLock::new(SessionPhase::Pending),
            progress: AtomicU8::new(0),
            revision: AtomicU64::new(0),
            notify: Notify::new(),
            failed_batches: AtomicUsize::new(0),
            completed_batches: AtomicUsize::new(0),
            created_at: epoch_secs(),
            finished_at: AtomicU64::new(0),
        }
    }

    pub fn page_key(&self) -> String {
        page_key(&self.platform, &self.video_id)
    }

    pub fn cues(&self) -> &[Cue] {
        &self.cues
    }

    pub fn cue_count(&self) -> usize {
        self.cues.len()
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Requests cooperative cancellation. The orchestrator observes the flag
    /// at its next poll point and reports the terminal phase itself.
    pub fn cancel(&self) {
        self.active.store(false, Ordering::SeqCst);
    }

    pub fn phase(&self) -> SessionPhase {
        *self.phase.read()
    }

    pub fn set_phase(&self, phase: SessionPhase) {
        *self.phase.write() = phase;
    }

    /// Moves the session into a terminal phase and wakes snapshot waiters.
    pub fn finish(&self, phase: SessionPhase) {
        {
            let mut current = self.phase.write();
            if current.is_terminal() {
                return;
            }
            *current = phase;
        }
        if phase == SessionPhase::Complete {
            self.set_progress(100);
        }
        self.finished_at.store(epoch_secs(), Ordering::Relaxed);
        self.bump_revision();
    }

    pub fn progress(&self) -> u8 {
        self.progress.load(Ordering::Relaxed)
    }

    pub fn set_progress(&self, percent: u8) {
        self.progress.store(percent.min(100), Ordering::Relaxed);
    }

    pub fn revision(&self) -> u64 {
        self.revision.load(Ordering::SeqCst)
    }

    /// Marks the timing array as changed so renderers re-fetch.
    pub fn bump_revision(&self) {
        self.revision.fetch_add(1, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    /// Waits until the revision moves past `last_seen` or the timeout runs
    /// out. Returns immediately when it already has.
    pub async fn wait_for_revision(&self, last_seen: u64, timeout: Duration) {
        // Subscribe before the check so a bump in between cannot be missed.
        let notified = self.notify.notified();
        if self.revision() != last_seen {
            return;
        }
        let _ = tokio::time::timeout(timeout, notified).await;
    }

    /// Applies one translated item to the timing array. Returns false when
    /// no slot matched and the result was dropped.
    pub fn apply_item(
        &self,
        index: usize,
        source_text: &str,
        translated_text: &str,
        require_untranslated: bool,
    ) -> bool {
        let mut timings = self.timings.write();
        apply_translation(
            &mut timings,
            index,
            source_text,
            translated_text,
            require_untranslated,
        )
    }

    pub fn memo_get(&self, source_text: &str) -> Option<String> {
        self.memo
            .get(source_text.trim())
            .map(|entry| entry.value().clone())
    }

    pub fn memo_insert(&self, source_text: &str, translated_text: &str) {
        self.memo
            .insert(source_text.trim().to_string(), translated_text.to_string());
    }

    pub fn memo_len(&self) -> usize {
        self.memo.len()
    }

    pub fn snapshot_timings(&self) -> Vec<CueTiming> {
        self.timings.read().clone()
    }

    /// Slots holding a real translation (non-empty, differs from original).
    pub fn translated_units(&self) -> usize {
        self.timings.read().iter().filter(|t| t.is_translated()).count()
    }

    /// Source cues with the final translations folded back in, for the
    /// persistence boundary.
    pub fn record_cues(&self) -> Vec<Cue> {
        let timings = self.timings.read();
        self.cues
            .iter()
            .zip(timings.iter())
            .map(|(cue, timing)| {
                let mut out = cue.clone();
                if timing.is_translated() {
                    out.translated_text = Some(timing.translated_text.clone());
                }
                out
            })
            .collect()
    }

    pub fn mark_batch_completed(&self) {
        self.completed_batches.fetch_add(1, Ordering::Relaxed);
    }

    pub fn mark_batch_failed(&self) {
        self.failed_batches.fetch_add(1, Ordering::Relaxed);
    }

    pub fn completed_batches(&self) -> usize {
        self.completed_batches.load(Ordering::Relaxed)
    }

    pub fn failed_batches(&self) -> usize {
        self.failed_batches.load(Ordering::Relaxed)
    }

    pub fn created_at_secs(&self) -> u64 {
        self.created_at
    }

    /// Seconds since the session finished, None while it is still running.
    pub fn seconds_since_finished(&self) -> Option<u64> {
        let finished = self.finished_at.load(Ordering::Relaxed);
        if finished == 0 {
            return None;
        }
        Some(epoch_secs().saturating_sub(finished))
    }
}
