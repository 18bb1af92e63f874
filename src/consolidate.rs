//! Consolidation of fragmented ASR captions into sentence-level cues.
//!
//! Auto-generated captions arrive as short phrase fragments with near-zero
//! gaps. A single greedy pass merges consecutive fragments into one cue
//! until a gap, duration, length, or sentence-end boundary closes the group.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::cue::Cue;

/// How a merged cue derives its timing from the member fragments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimingStrategy {
    /// Span of the whole group: first start to last end.
    First,
    /// Anchor on the last fragment, with a minimum display window.
    Last,
    /// Character-weighted mean of member start times.
    Weighted,
    /// Midpoint between the first and last member start times.
    Midpoint,
}

/// Options controlling the consolidation pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsolidateOptions {
    /// A silence gap larger than this closes the current group (ms).
    pub max_gap_ms: u64,
    /// Maximum spanned duration of one merged cue (ms).
    pub max_duration_ms: u64,
    /// Maximum character count of one merged cue.
    pub max_chars_per_cue: usize,
    /// Sentence-end punctuation only closes a group at least this long.
    pub min_chars_for_sentence: usize,
    /// Characters that mark the end of a sentence.
    pub sentence_end_chars: Vec<char>,
    /// Timing derivation for merged cues.
    pub timing_strategy: TimingStrategy,
}

impl Default for ConsolidateOptions {
    fn default() -> Self {
        Self {
            max_gap_ms: 800,
            max_duration_ms: 4000,
            max_chars_per_cue: 80,
            min_chars_for_sentence: 5,
            sentence_end_chars: vec!['.', '!', '?', '。', '！', '？', '…'],
            timing_strategy: TimingStrategy::First,
        }
    }
}

/// Classifies a cue sequence as fragmented ASR output.
///
/// Fragmented means many short, short-lived cues: at least 10 units with a
/// mean text length under 20 characters and a mean duration under 2 seconds.
pub fn is_fragmented(cues: &[Cue]) -> bool {
    if cues.len() < 10 {
        return false;
    }
    let count = cues.len() as f64;
    let mean_chars = cues.iter().map(|c| c.text.chars().count()).sum::<usize>() as f64 / count;
    let mean_duration = cues.iter().map(|c| c.duration_ms()).sum::<u64>() as f64 / count;
    mean_chars < 20.0 && mean_duration < 2000.0
}

/// Runs consolidation when the source is auto-generated, otherwise passes
/// the cues through untouched.
///
/// ASR sources are always normalized, whether or not they look fragmented;
/// `is_fragmented` feeds diagnostics only.
pub fn maybe_consolidate(cues: Vec<Cue>, auto_generated: bool, options: &ConsolidateOptions) -> Vec<Cue> {
    if !auto_generated {
        return cues;
    }
    let before = cues.len();
    let fragmented = is_fragmented(&cues);
    let merged = consolidate(&cues, options);
    info!(
        "Consolidated ASR captions: {} -> {} cues (fragmented: {})",
        before,
        merged.len(),
        fragmented
    );
    merged
}

struct Group<'a> {
    members: Vec<&'a Cue>,
    /// Character count of the joined, whitespace-normalized text so far.
    joined_chars: usize,
}

/// Merges fragmented cues into sentence-level cues in one greedy pass.
///
/// Input is assumed sorted by start time. Whitespace-only cues are dropped.
/// Output is reindexed from zero and every output cue ends after it starts.
pub fn consolidate(cues: &[Cue], options: &ConsolidateOptions) -> Vec<Cue> {
    let mut output: Vec<Cue> = Vec::new();
    let mut group: Option<Group<'_>> = None;

    for cue in cues {
        let text = normalize_ws(&cue.text);
        if text.is_empty() {
            continue;
        }
        let chars = text.chars().count();

        group = match group.take() {
            None => Some(Group {
                members: vec![cue],
                joined_chars: chars,
            }),
            Some(mut current) => {
                if should_flush(&current, cue, chars, options) {
                    output.push(build_merged(&current, output.len(), options));
                    Some(Group {
                        members: vec![cue],
                        joined_chars: chars,
                    })
                } else {
                    current.members.push(cue);
                    current.joined_chars += 1 + chars;
                    Some(current)
                }
            }
        };
    }

    if let Some(current) = group {
        output.push(build_merged(&current, output.len(), options));
    }

    debug!("consolidate: {} cues in, {} out", cues.len(), output.len());
    output
}

/// Decides whether the current group must close before `next` is added.
fn should_flush(group: &Group<'_>, next: &Cue, next_chars: usize, options: &ConsolidateOptions) -> bool {
    let last = group.members[group.members.len() - 1];
    let first = group.members[0];

    let gap = next.start_time_ms.saturating_sub(last.end_time_ms);
    if gap > options.max_gap_ms {
        return true;
    }

    let projected_duration = next.end_time_ms.saturating_sub(first.start_time_ms);
    if projected_duration > options.max_duration_ms {
        return true;
    }

    let projected_chars = group.joined_chars + 1 + next_chars;
    if projected_chars > options.max_chars_per_cue {
        return true;
    }

    // Sentence-end punctuation only ends a group once it has accumulated
    // enough text; abbreviations like "Mr." stay glued to their sentence.
    if group.joined_chars >= options.min_chars_for_sentence {
        if let Some(last_char) = last.text.trim().chars().last() {
            if options.sentence_end_chars.contains(&last_char) {
                return true;
            }
        }
    }

    false
}

fn build_merged(group: &Group<'_>, index: usize, options: &ConsolidateOptions) -> Cue {
    let members = &group.members;

    let text = members
        .iter()
        .map(|m| normalize_ws(&m.text))
        .collect::<Vec<_>>()
        .join(" ");

    let (start, end) = merged_timing(members, options.timing_strategy);
    // Output invariant: every cue ends after it starts, whatever the input.
    let end = end.max(start + 1);

    let translated_text = if members.iter().any(|m| m.is_translated()) {
        Some(
            members
                .iter()
                .map(|m| normalize_ws(m.translated_text.as_deref().unwrap_or(&m.text)))
                .collect::<Vec<_>>()
                .join(" "),
        )
    } else {
        None
    };

    let speaker = members[0].speaker.as_ref().and_then(|s| {
        members
            .iter()
            .all(|m| m.speaker.as_deref() == Some(s.as_str()))
            .then(|| s.clone())
    });

    Cue {
        index,
        start_time_ms: start,
        end_time_ms: end,
        text,
        translated_text,
        speaker,
    }
}

fn merged_timing(members: &[&Cue], strategy: TimingStrategy) -> (u64, u64) {
    let first = members[0];
    let last = members[members.len() - 1];

    match strategy {
        TimingStrategy::First => (first.start_time_ms, last.end_time_ms),
        TimingStrategy::Last => {
            let start = last.start_time_ms;
            let span = last.end_time_ms.saturating_sub(first.start_time_ms);
            let end = last.end_time_ms.max(start + span.max(2000));
            (start, end)
        }
        TimingStrategy::Weighted => {
            let mut weighted_sum: u128 = 0;
            let mut total_weight: u128 = 0;
            for m in members {
                let weight = normalize_ws(&m.text).chars().count() as u128;
                weighted_sum += weight * m.start_time_ms as u128;
                total_weight += weight;
            }
            let start = if total_weight == 0 {
                first.start_time_ms
            } else {
                ((weighted_sum + total_weight / 2) / total_weight) as u64
            };
            let window = (last.end_time_ms.saturating_sub(start) + 500).max(2000);
            let end = last.end_time_ms.max(start + window);
            (start, end)
        }
        TimingStrategy::Midpoint => {
            let start = (first.start_time_ms + last.start_time_ms + 1) / 2;
            (start, last.end_time_ms)
        }
    }
}

fn normalize_ws(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
