//! SRT subtitle ingest.
//!
//! Lenient parser for SubRip text: tolerates BOMs, CRLF line endings,
//! missing sequence numbers, and `.` as the millisecond separator.
//! Malformed blocks are skipped with a warning rather than failing the
//! whole document. Sequence numbers are not trusted; callers renumber by
//! normalizing the returned cues.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::warn;

use crate::cue::Cue;
use crate::error::{Result, SubtransError};

static TIMESTAMP_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(\d{1,2}):(\d{2}):(\d{2})[,.](\d{1,3})\s*-->\s*(\d{1,2}):(\d{2}):(\d{2})[,.](\d{1,3})",
    )
    .expect("timestamp regex")
});

/// Parses SRT content into cues, indexed by block position.
///
/// Returns an error only when no block could be parsed at all.
pub fn parse_srt(content: &str) -> Result<Vec<Cue>> {
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);
    let content = content.replace("\r\n", "\n").replace('\r', "\n");

    let mut cues = Vec::new();
    let mut skipped = 0usize;
    for block in content.split("\n\n") {
        if block.trim().is_empty() {
            continue;
        }
        match parse_block(block) {
            Some((start_time_ms, end_time_ms, text)) => {
                cues.push(Cue::new(cues.len(), start_time_ms, end_time_ms, text));
            }
            None => {
                skipped += 1;
                warn!(
                    "skipping malformed subtitle block: {:?}",
                    block.lines().next().unwrap_or("")
                );
            }
        }
    }

    if cues.is_empty() {
        return Err(SubtransError::SubtitleParse(format!(
            "no valid cue blocks found ({} skipped)",
            skipped
        )));
    }
    Ok(cues)
}

/// One block: optional sequence line, timestamp line, then text lines.
fn parse_block(block: &str) -> Option<(u64, u64, String)> {
    let lines: Vec<&str> = block.lines().map(str::trim_end).collect();

    let (time_pos, caps) = lines
        .iter()
        .take(2)
        .enumerate()
        .find_map(|(i, line)| TIMESTAMP_LINE.captures(line).map(|c| (i, c)))?;

    let start = timestamp_ms(&caps, 1)?;
    let end = timestamp_ms(&caps, 5)?;
    let text = lines
        .get(time_pos + 1..)
        .map(|rest| rest.join("\n"))
        .unwrap_or_default()
        .trim()
        .to_string();
    if text.is_empty() {
        return None;
    }
    Some((start, end, text))
}

/// Milliseconds from four capture groups starting at `base`. The fraction
/// is read as a decimal: `1,5` means one and a half seconds.
fn timestamp_ms(caps: &regex::Captures<'_>, base: usize) -> Option<u64> {
    let hours: u64 = caps.get(base)?.as_str().parse().ok()?;
    let minutes: u64 = caps.get(base + 1)?.as_str().parse().ok()?;
    let seconds: u64 = caps.get(base + 2)?.as_str().parse().ok()?;
    let fraction = format!("{:0<3}", caps.get(base + 3)?.as_str());
    let millis: u64 = fraction.parse().ok()?;
    Some(hours * 3_600_000 + minutes * 60_000 + seconds * 1000 + millis)
}

/// Formats milliseconds as `HH:MM:SS,mmm` for diagnostics.
pub fn format_timestamp(ms: u64) -> String {
    let hours = ms / 3_600_000;
    let minutes = (ms % 3_600_000) / 60_000;
    let seconds = (ms % 60_000) / 1000;
    let millis = ms % 1000;
    format!("{:02}:{:02}:{:02},{:03}", hours, minutes, seconds, millis)
}
