// SPDX-License-Identifier: MIT

//! Activity model, sourced from the Strava API. Request-scoped only;
//! activities are never persisted.

use crate::models::Song;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// A workout activity as returned to the UI.
#[derive(Debug, Clone, Serialize)]
pub struct Activity {
    /// Strava activity id
    pub id: u64,
    /// Activity name/title
    pub name: String,
    /// Sport type (Ride, Run, Hike, etc.)
    pub sport_type: String,
    /// Start instant (UTC)
    pub start_date: DateTime<Utc>,
    /// Elapsed wall-clock duration in seconds. This is the matching
    /// window length: songs keep playing during pauses, so elapsed time
    /// is used rather than moving time.
    pub elapsed_time: i64,
    /// Distance in meters
    pub distance: f64,
    /// Provider-owned description, if any
    pub description: Option<String>,
}

impl Activity {
    /// End of the song-correlation window: `start_date + elapsed_time`.
    pub fn end_date(&self) -> DateTime<Utc> {
        self.start_date + chrono::Duration::seconds(self.elapsed_time)
    }
}

/// An activity plus its matched songs.
///
/// `songs` is `None` when enrichment was not evaluated (no Spotify
/// credential, or the lookup failed) and `Some(vec![])` when evaluated
/// and nothing matched. The two states are distinct end-to-end, so
/// `None` must serialize as JSON `null` rather than being omitted.
#[derive(Debug, Clone, Serialize)]
pub struct ActivityWithSongs {
    #[serde(flatten)]
    pub activity: Activity,
    pub songs: Option<Vec<Song>>,
}
