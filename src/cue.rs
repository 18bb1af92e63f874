//! Timed subtitle cues and the ordering contract shared by the scheduler.
//!
//! Every downstream component assumes that a cue sequence sorted by start
//! time has each cue's `index` equal to its array position. The sequence is
//! normalized once at the ingest boundary; after that, cues are only ever
//! mutated in place and the invariant holds for the life of a session.

use serde::{Deserialize, Serialize};

/// A single timed subtitle line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cue {
    /// Stable identifier, equal to the array position once normalized.
    pub index: usize,
    /// Start time in milliseconds.
    pub start_time_ms: u64,
    /// End time in milliseconds.
    pub end_time_ms: u64,
    /// Original subtitle text.
    pub text: String,
    /// Translation, if one is already known.
    #[serde(default)]
    pub translated_text: Option<String>,
    /// Speaker label, if the source format carries one.
    #[serde(default)]
    pub speaker: Option<String>,
}

impl Cue {
    pub fn new(index: usize, start_time_ms: u64, end_time_ms: u64, text: impl Into<String>) -> Self {
        Self {
            index,
            start_time_ms,
            end_time_ms,
            text: text.into(),
            translated_text: None,
            speaker: None,
        }
    }

    /// Duration of this cue in milliseconds.
    pub fn duration_ms(&self) -> u64 {
        self.end_time_ms.saturating_sub(self.start_time_ms)
    }

    /// True when the cue carries a real translation (non-empty, differs from
    /// the original text).
    pub fn is_translated(&self) -> bool {
        match &self.translated_text {
            Some(t) => !t.trim().is_empty() && t != &self.text,
            None => false,
        }
    }
}

/// Render-facing projection of one cue: timing plus both texts, decoupled
/// from the stable identifier. Built once per session and mutated in place
/// by slot position, never reconstructed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CueTiming {
    pub start_time_ms: u64,
    pub end_time_ms: u64,
    pub original_text: String,
    pub translated_text: String,
}

impl CueTiming {
    pub fn from_cue(cue: &Cue) -> Self {
        let translated_text = cue
            .translated_text
            .as_ref()
            .filter(|t| !t.trim().is_empty())
            .cloned()
            .unwrap_or_else(|| cue.text.clone());
        Self {
            start_time_ms: cue.start_time_ms,
            end_time_ms: cue.end_time_ms,
            original_text: cue.text.clone(),
            translated_text,
        }
    }

    /// A slot counts as untranslated while the translation still equals the
    /// original text.
    pub fn is_translated(&self) -> bool {
        !self.translated_text.trim().is_empty() && self.translated_text != self.original_text
    }
}

/// Builds the render-facing timing array for a normalized cue sequence.
pub fn build_timings(cues: &[Cue]) -> Vec<CueTiming> {
    cues.iter().map(CueTiming::from_cue).collect()
}

/// Sorts cues by start time and rewrites each `index` to its array position.
///
/// The sort is stable, so cues sharing a start time keep their relative
/// order from the source document.
pub fn normalize_cues(cues: &mut [Cue]) {
    cues.sort_by_key(|c| (c.start_time_ms, c.end_time_ms));
    for (position, cue) in cues.iter_mut().enumerate() {
        cue.index = position;
    }
}

/// Checks the ordering contract: indexes positional, start times
/// non-decreasing.
pub fn is_normalized(cues: &[Cue]) -> bool {
    cues.iter().enumerate().all(|(position, cue)| {
        cue.index == position
            && (position == 0 || cues[position - 1].start_time_ms <= cue.start_time_ms)
    })
}

/// Finds the cue at or immediately before the playback position.
///
/// Binary search for the right-most cue whose start time is `<=`
/// `current_time_ms`, clamping to the first cue when playback precedes all
/// of them. Returns the cue's stable identifier, which future-proofs callers
/// against reordering even though identifier and position coincide for a
/// normalized sequence. Empty input returns 0.
pub fn find_active_cue(cues: &[Cue], current_time_ms: u64) -> usize {
    if cues.is_empty() {
        return 0;
    }
    let upper = cues.partition_point(|c| c.start_time_ms <= current_time_ms);
    if upper == 0 {
        cues[0].index
    } else {
        cues[upper - 1].index
    }
}
