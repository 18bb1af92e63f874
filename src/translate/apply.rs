//! Applying a translated string to the correct timing slot.
//!
//! Slots are addressed by stable identifier first, with an exact-text scan
//! as the fallback for stale identifiers. Matching is exact on trimmed
//! text only; fuzzy matching corrupts timing on near-duplicate lines and
//! is deliberately not offered.

use crate::cue::CueTiming;

/// Writes `translated_text` into the slot that owns `source_text`.
///
/// Tries the identifier slot first. If its original text does not match,
/// scans for the first slot with the same trimmed original text, skipping
/// already-translated slots when `require_untranslated` is set. Returns
/// false when no slot matches; the caller drops the result.
pub fn apply_translation(
    timings: &mut [CueTiming],
    index: usize,
    source_text: &str,
    translated_text: &str,
    require_untranslated: bool,
) -> bool {
    let wanted = source_text.trim();

    if let Some(slot) = timings.get_mut(index) {
        if slot.original_text.trim() == wanted {
            slot.translated_text = translated_text.to_string();
            return true;
        }
    }

    for slot in timings.iter_mut() {
        if slot.original_text.trim() == wanted && (!require_untranslated || !slot.is_translated()) {
            slot.translated_text = translated_text.to_string();
            return true;
        }
    }

    false
}
