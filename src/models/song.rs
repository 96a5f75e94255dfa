// SPDX-License-Identifier: MIT

//! Song model, sourced from Spotify listening history.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// A played track from the user's Spotify listening history.
#[derive(Debug, Clone, Serialize)]
pub struct Song {
    /// Track name
    pub name: String,
    /// Artist names, in track order
    pub artists: Vec<String>,
    /// Album name
    pub album: String,
    /// When the track was played (UTC)
    pub played_at: DateTime<Utc>,
    /// Album art URL, if available
    pub album_art_url: Option<String>,
    /// Track length in milliseconds
    pub duration_ms: u64,
}
