//! Two-phase translation driver.
//!
//! Runs a sequential quick pass with the fast baseline provider, then a
//! bounded-parallel quality pass, both over the same priority-ordered batch
//! list. Either pass stops at the next poll point once the session is
//! cancelled, and results arriving after cancellation are discarded.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tracing::{debug, info, warn};

use crate::config::SchedulerConfig;
use crate::error::ProviderError;
use crate::schedule::{order_by_priority, partition_cues, Batch, BatchItem};
use crate::session::{SessionPhase, TranslationSession};
use crate::translate::provider::{BatchRequest, BatchResponse, TranslationProvider};

/// Drives one session from `Pending` to a terminal phase.
///
/// The quick pass is skipped when the quality provider is already the fast
/// baseline; the quality pass then reports progress over the full range.
/// The session ends `Complete` as soon as at least one slot holds a real
/// translation, `Failed` when every batch came back empty or in error.
pub async fn run_session(
    session: Arc<TranslationSession>,
    quick: Arc<dyn TranslationProvider>,
    quality: Arc<dyn TranslationProvider>,
    config: SchedulerConfig,
) {
    if !session.is_active() {
        session.finish(SessionPhase::Cancelled);
        return;
    }

    let batches = order_by_priority(
        partition_cues(session.cues(), config.batch_size),
        session.anchor_index,
        config.batch_size,
    );
    if batches.is_empty() {
        warn!("session {} started with no batches", session.id);
        session.finish(SessionPhase::Failed);
        return;
    }

    let skip_quick = quick.name() == quality.name();
    info!(
        "session {}: {} cues in {} batches, anchor {}, quick pass {}",
        session.id,
        session.cue_count(),
        batches.len(),
        session.anchor_index,
        if skip_quick { "skipped" } else { quick.name() }
    );

    if !skip_quick
        && !run_quick_pass(&session, &quick, &batches, config.batch_timeout_ms).await
    {
        info!("session {} cancelled during quick pass", session.id);
        session.finish(SessionPhase::Cancelled);
        return;
    }

    let (base, range) = if skip_quick { (0u8, 100u8) } else { (50u8, 50u8) };
    if !run_quality_pass(&session, &quality, &batches, &config, base, range).await {
        info!("session {} cancelled during quality pass", session.id);
        session.finish(SessionPhase::Cancelled);
        return;
    }

    let translated = session.translated_units();
    if translated > 0 {
        info!(
            "session {} complete: {} of {} cues translated, {} batches failed",
            session.id,
            translated,
            session.cue_count(),
            session.failed_batches()
        );
        session.finish(SessionPhase::Complete);
    } else {
        warn!("session {} produced no translations", session.id);
        session.finish(SessionPhase::Failed);
    }
}

/// Sequential pass over every batch in priority order. Returns false when
/// the session was cancelled part-way.
async fn run_quick_pass(
    session: &Arc<TranslationSession>,
    provider: &Arc<dyn TranslationProvider>,
    batches: &[Batch],
    timeout_ms: u64,
) -> bool {
    session.set_phase(SessionPhase::QuickPass);
    let total = batches.len();

    for (position, batch) in batches.iter().enumerate() {
        if !session.is_active() {
            return false;
        }

        // Memo first; only misses go over the wire.
        let mut misses: Vec<BatchItem> = Vec::new();
        for item in &batch.items {
            match session.memo_get(&item.text) {
                Some(translated) => {
                    session.apply_item(item.index, &item.text, &translated, true);
                }
                None => misses.push(item.clone()),
            }
        }

        if misses.is_empty() {
            debug!(
                "session {}: quick batch {}/{} served from memo",
                session.id,
                position + 1,
                total
            );
            session.mark_batch_completed();
        } else {
            let request = BatchRequest::new(
                misses,
                &session.source_language,
                &session.target_language,
            );
            match call_provider(provider, &request, timeout_ms).await {
                Ok(response) => {
                    // Cancellation race: the reply may have arrived after a
                    // stop request, in which case it must not be applied.
                    if !session.is_active() {
                        return false;
                    }
                    apply_response(session, &request, &response, true);
                    session.mark_batch_completed();
                }
                Err(e) => {
                    session.mark_batch_failed();
                    warn!(
                        "session {}: quick batch {}/{} failed: {}",
                        session.id,
                        position + 1,
                        total,
                        e
                    );
                }
            }
        }

        session.set_progress(progress_value(position + 1, total, 0, 50));
        session.bump_revision();
    }

    true
}

/// Bounded-parallel pass: groups of up to `quality_concurrency` batches are
/// dispatched together and awaited to settlement, so one failure never
/// cancels its siblings. Returns false when the session was cancelled.
async fn run_quality_pass(
    session: &Arc<TranslationSession>,
    provider: &Arc<dyn TranslationProvider>,
    batches: &[Batch],
    config: &SchedulerConfig,
    base: u8,
    range: u8,
) -> bool {
    session.set_phase(SessionPhase::QualityPass);
    let total = batches.len();
    let group_size = config.quality_concurrency.max(1);
    let mut processed = 0usize;

    for group in batches.chunks(group_size) {
        if !session.is_active() {
            return false;
        }

        let calls = group.iter().map(|batch| {
            let request = BatchRequest::new(
                batch.items.clone(),
                &session.source_language,
                &session.target_language,
            );
            async move {
                let result = call_provider(provider, &request, config.batch_timeout_ms).await;
                (request, result)
            }
        });
        let settled = join_all(calls).await;

        let still_active = session.is_active();
        for (request, result) in settled {
            processed += 1;
            match result {
                Ok(response) if still_active => {
                    apply_response(session, &request, &response, false);
                    session.mark_batch_completed();
                }
                Ok(_) => {
                    debug!(
                        "session {}: discarding quality batch reply after cancel",
                        session.id
                    );
                }
                Err(e) => {
                    session.mark_batch_failed();
                    warn!("session {}: quality batch failed: {}", session.id, e);
                }
            }
        }
        if !still_active {
            return false;
        }

        session.set_progress(progress_value(processed, total, base, range));
        session.bump_revision();
    }

    true
}

/// Applies every non-empty item of a reply to the timing array and feeds
/// the memo. Returns how many slots were written.
fn apply_response(
    session: &TranslationSession,
    request: &BatchRequest,
    response: &BatchResponse,
    require_untranslated: bool,
) -> usize {
    let mut applied = 0;
    for item in &response.items {
        if item.translated_text.trim().is_empty() {
            continue;
        }
        let source = request
            .items
            .iter()
            .find(|sent| sent.index == item.index)
            .map(|sent| sent.text.as_str());
        let Some(source) = source else {
            warn!(
                "session {}: dropping translation for unknown index {}",
                session.id, item.index
            );
            continue;
        };
        session.memo_insert(source, &item.translated_text);
        if session.apply_item(item.index, source, &item.translated_text, require_untranslated) {
            applied += 1;
        }
    }
    applied
}

async fn call_provider(
    provider: &Arc<dyn TranslationProvider>,
    request: &BatchRequest,
    timeout_ms: u64,
) -> Result<BatchResponse, ProviderError> {
    if timeout_ms == 0 {
        return provider.translate_batch(request).await;
    }
    match tokio::time::timeout(
        Duration::from_millis(timeout_ms),
        provider.translate_batch(request),
    )
    .await
    {
        Ok(result) => result,
        Err(_) => Err(ProviderError::Timeout(timeout_ms)),
    }
}

fn progress_value(processed: usize, total: usize, base: u8, range: u8) -> u8 {
    if total == 0 {
        return base;
    }
    let fraction = processed as f64 / total as f64;
    let scaled = (fraction * range as f64).round() as u8;
    base.saturating_add(scaled).min(100)
}
