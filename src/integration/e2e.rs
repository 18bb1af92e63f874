//! End-to-end scheduler tests
//!
//! Drive `run_session` against scripted providers and assert on the final
//! timing array, counters, and terminal phase.

use std::sync::Arc;

use crate::config::SchedulerConfig;
use crate::integration::fixtures::{make_session, MockProvider};
use crate::session::SessionPhase;
use crate::store::{RecordStore, TranslationRecord};
use crate::translate::{run_session, TranslationProvider};

fn texts(count: usize) -> Vec<String> {
    (0..count).map(|i| format!("line number {}", i)).collect()
}

fn config(batch_size: usize, quality_concurrency: usize) -> SchedulerConfig {
    SchedulerConfig {
        batch_size,
        quality_concurrency,
        batch_timeout_ms: 0,
    }
}

#[tokio::test]
async fn test_two_pass_translates_everything() {
    let lines = texts(25);
    let refs: Vec<&str> = lines.iter().map(String::as_str).collect();
    let session = make_session(&refs, 12);
    let quick = Arc::new(MockProvider::new("mock-quick"));
    let quality = Arc::new(MockProvider::new("mock-quality"));

    run_session(
        session.clone(),
        quick.clone(),
        quality.clone(),
        config(10, 3),
    )
    .await;

    assert_eq!(session.phase(), SessionPhase::Complete);
    assert_eq!(session.progress(), 100);
    assert_eq!(session.translated_units(), 25);
    assert_eq!(session.failed_batches(), 0);
    // Three batches per pass.
    assert_eq!(session.completed_batches(), 6);
    assert_eq!(quick.calls(), 3);
    assert_eq!(quality.calls(), 3);

    // The quality tier has the last word on every slot.
    for timing in session.snapshot_timings() {
        assert_eq!(
            timing.translated_text,
            quality.translation("es", &timing.original_text)
        );
    }
}

#[tokio::test]
async fn test_priority_order_starts_at_anchor() {
    let lines = texts(50);
    let refs: Vec<&str> = lines.iter().map(String::as_str).collect();
    // Anchor cue 25 lives in batch 2 of five.
    let session = make_session(&refs, 25);
    let quick = Arc::new(MockProvider::new("mock-quick"));
    let quality = Arc::new(MockProvider::new("mock-quality"));

    run_session(
        session.clone(),
        quick.clone(),
        quality.clone(),
        config(10, 3),
    )
    .await;

    let log = quick.request_log();
    let batch_starts: Vec<usize> = log.iter().map(|indices| indices[0]).collect();
    assert_eq!(batch_starts, vec![20, 30, 10, 40, 0]);
}

#[tokio::test]
async fn test_quick_pass_skipped_for_same_tier() {
    let lines = texts(25);
    let refs: Vec<&str> = lines.iter().map(String::as_str).collect();
    let session = make_session(&refs, 0);
    let provider: Arc<MockProvider> = Arc::new(MockProvider::new("mock-quality"));

    run_session(
        session.clone(),
        provider.clone(),
        provider.clone(),
        config(10, 3),
    )
    .await;

    assert_eq!(session.phase(), SessionPhase::Complete);
    assert_eq!(session.progress(), 100);
    // Only the quality pass ran.
    assert_eq!(provider.calls(), 3);
    assert_eq!(session.completed_batches(), 3);
    assert_eq!(session.translated_units(), 25);
}

#[tokio::test]
async fn test_partial_group_failure_keeps_siblings() {
    let lines = texts(9);
    let refs: Vec<&str> = lines.iter().map(String::as_str).collect();
    let session = make_session(&refs, 0);
    // Single-tier run; the middle batch of the only group fails.
    let provider: Arc<MockProvider> =
        Arc::new(MockProvider::new("mock-quality").failing_on(&[4]));

    run_session(
        session.clone(),
        provider.clone(),
        provider.clone(),
        config(3, 3),
    )
    .await;

    assert_eq!(session.phase(), SessionPhase::Complete);
    assert_eq!(session.failed_batches(), 1);
    assert_eq!(session.completed_batches(), 2);
    assert_eq!(session.translated_units(), 6);

    let timings = session.snapshot_timings();
    for (i, timing) in timings.iter().enumerate() {
        let translated = timing.translated_text != timing.original_text;
        assert_eq!(translated, !(3..=5).contains(&i), "slot {}", i);
    }
}

#[tokio::test]
async fn test_all_batches_failing_marks_failed() {
    let session = make_session(&["one", "two", "three"], 0);
    let indices: Vec<usize> = (0..3).collect();
    let quick = Arc::new(MockProvider::new("mock-quick").failing_on(&indices));
    let quality = Arc::new(MockProvider::new("mock-quality").failing_on(&indices));

    run_session(session.clone(), quick, quality, config(10, 3)).await;

    assert_eq!(session.phase(), SessionPhase::Failed);
    assert_eq!(session.translated_units(), 0);
    // One batch per pass, both failed.
    assert_eq!(session.failed_batches(), 2);
}

#[tokio::test]
async fn test_cancel_before_start() {
    let session = make_session(&["one", "two"], 0);
    session.cancel();
    let quick = Arc::new(MockProvider::new("mock-quick"));
    let quality = Arc::new(MockProvider::new("mock-quality"));

    run_session(session.clone(), quick.clone(), quality, config(10, 3)).await;

    assert_eq!(session.phase(), SessionPhase::Cancelled);
    assert_eq!(session.translated_units(), 0);
    assert_eq!(quick.calls(), 0);
}

#[tokio::test]
async fn test_quick_pass_memo_serves_duplicates() {
    let lines: Vec<String> = (0..20).map(|_| "repeat me".to_string()).collect();
    let refs: Vec<&str> = lines.iter().map(String::as_str).collect();
    let session = make_session(&refs, 0);
    let quick = Arc::new(MockProvider::new("mock-quick"));
    let quality = Arc::new(MockProvider::new("mock-quality"));

    run_session(
        session.clone(),
        quick.clone(),
        quality.clone(),
        config(10, 3),
    )
    .await;

    // The second quick batch is served entirely from the memo.
    assert_eq!(quick.calls(), 1);
    assert_eq!(quality.calls(), 2);
    assert_eq!(session.translated_units(), 20);
    assert_eq!(session.memo_len(), 1);
}

#[tokio::test]
async fn test_completed_session_persists_as_record() {
    let session = make_session(&["one", "two", "three"], 0);
    let quick = Arc::new(MockProvider::new("mock-quick"));
    let quality = Arc::new(MockProvider::new("mock-quality"));

    run_session(
        session.clone(),
        quick.clone(),
        quality.clone(),
        config(10, 3),
    )
    .await;
    assert_eq!(session.phase(), SessionPhase::Complete);

    let record = TranslationRecord::from_session(&session, Some(quick.name()), quality.name());
    assert_eq!(record.metadata.translated_units, 3);
    assert_eq!(record.metadata.quick_provider.as_deref(), Some("mock-quick"));

    let store = RecordStore::default();
    store.put(record).unwrap();
    let fetched = store.get("youtube", "e2e", "en", "es").unwrap();
    assert_eq!(fetched.translated_units(), 3);
    assert_eq!(
        fetched.cues[0].translated_text.as_deref(),
        Some(quality.translation("es", "one").as_str())
    );
}
