//! Batch partitioning and playback-priority scheduling.
//!
//! Cues are split into fixed-size batches, then the batch list is reordered
//! so translation starts at the viewer's playback position and expands
//! outward, alternating forward and backward.

use serde::{Deserialize, Serialize};

use crate::cue::Cue;

/// One cue's worth of work inside a batch: the stable identifier plus the
/// text to translate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchItem {
    pub index: usize,
    pub text: String,
}

/// A contiguous group of cues submitted together to a provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    pub items: Vec<BatchItem>,
}

impl Batch {
    /// Stable identifiers of the member cues, in batch order.
    pub fn cue_indices(&self) -> Vec<usize> {
        self.items.iter().map(|item| item.index).collect()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Splits cues into contiguous batches of at most `batch_size`, preserving
/// each cue's stable identifier. A zero batch size is treated as 1.
pub fn partition_cues(cues: &[Cue], batch_size: usize) -> Vec<Batch> {
    let batch_size = batch_size.max(1);
    cues.chunks(batch_size)
        .map(|chunk| Batch {
            items: chunk
                .iter()
                .map(|cue| BatchItem {
                    index: cue.index,
                    text: cue.text.clone(),
                })
                .collect(),
        })
        .collect()
}

/// Reorders batches so the one containing `anchor_index` comes first, then
/// its neighbors alternating forward and backward.
///
/// An anchor beyond the last batch clamps to the last batch. Every input
/// batch appears exactly once in the output.
pub fn order_by_priority(batches: Vec<Batch>, anchor_index: usize, batch_size: usize) -> Vec<Batch> {
    if batches.is_empty() {
        return batches;
    }
    let batch_size = batch_size.max(1);
    let anchor_batch = (anchor_index / batch_size).min(batches.len() - 1);

    let mut order = Vec::with_capacity(batches.len());
    order.push(anchor_batch);
    for offset in 1..batches.len() {
        let forward = anchor_batch + offset;
        if forward < batches.len() {
            order.push(forward);
        }
        if let Some(backward) = anchor_batch.checked_sub(offset) {
            order.push(backward);
        }
    }

    let mut slots: Vec<Option<Batch>> = batches.into_iter().map(Some).collect();
    order
        .into_iter()
        .filter_map(|position| slots[position].take())
        .collect()
}
