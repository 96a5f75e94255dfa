// SPDX-License-Identifier: MIT

//! Pure song/activity correlation and description composition.
//!
//! No I/O here: given an activity time window and candidate plays, pick
//! the plays inside the window and render the description block that is
//! written back to Strava.

use crate::models::Song;
use crate::time_utils::format_local_time;
use chrono::{DateTime, Duration, Utc};

/// Marker line opening the appended song block. Re-processing an event
/// replaces everything from this marker on instead of appending a second
/// block, which makes the description update idempotent under webhook
/// re-delivery.
pub const SOUNDTRACK_MARKER: &str = "🎵 Workout soundtrack:";

/// Select the candidate songs whose play instant falls inside
/// `[start, start + elapsed_seconds]`, inclusive on both ends.
///
/// Input order (most-recent-first as the upstream returns it) is
/// preserved, and duplicates pass through unchanged.
pub fn match_songs(start: DateTime<Utc>, elapsed_seconds: i64, candidates: &[Song]) -> Vec<Song> {
    let end = start + Duration::seconds(elapsed_seconds);
    candidates
        .iter()
        .filter(|song| song.played_at >= start && song.played_at <= end)
        .cloned()
        .collect()
}

/// Compose the updated activity description.
///
/// Any existing soundtrack block is removed first; the new block is then
/// appended to the remaining description, separated by a blank line when
/// that remainder is non-empty. With no matched songs the description is
/// returned without a block.
pub fn compose_description(existing: Option<&str>, songs: &[Song]) -> String {
    let base = strip_soundtrack_block(existing.unwrap_or(""));

    if songs.is_empty() {
        return base.to_string();
    }

    let lines: Vec<String> = songs
        .iter()
        .enumerate()
        .map(|(i, song)| {
            format!(
                "{}. {} by {} ({})",
                i + 1,
                song.name,
                song.artists.join(", "),
                format_local_time(song.played_at)
            )
        })
        .collect();

    let block = format!("{}\n{}", SOUNDTRACK_MARKER, lines.join("\n"));

    if base.is_empty() {
        block
    } else {
        format!("{}\n\n{}", base, block)
    }
}

/// Drop a previously appended soundtrack block, if present.
fn strip_soundtrack_block(description: &str) -> &str {
    match description.find(SOUNDTRACK_MARKER) {
        Some(idx) => description[..idx].trim_end(),
        None => description.trim_end(),
    }
}
