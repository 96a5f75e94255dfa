// SPDX-License-Identifier: MIT

//! Webhook event processing.
//!
//! One inbound Strava activity-creation event drives the pipeline:
//! resolve the owning user from the athlete id, fetch the activity,
//! match recently-played songs into its time window, and write the
//! song list back into the activity description.
//!
//! Failure policy: unresolvable events (wrong type, unknown owner) are
//! acknowledged outcomes because Strava's retry cannot fix them.
//! Upstream failures while fetching the activity or writing the
//! description propagate as errors so the HTTP handler returns non-2xx
//! and Strava's webhook retry becomes the recovery path.

use crate::db::FirestoreDb;
use crate::error::AppError;
use crate::models::{Provider, Song};
use crate::services::matcher;
use crate::services::{SpotifyService, StravaService};
use serde::Deserialize;

/// Inbound Strava webhook event payload.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEvent {
    /// "activity" or "athlete"
    pub object_type: String,
    pub object_id: u64,
    /// "create", "update", "delete"
    pub aspect_type: String,
    pub owner_id: u64,
}

/// Terminal outcome of processing one event.
#[derive(Debug)]
pub enum WebhookOutcome {
    /// Song list written back to the activity description.
    DescriptionUpdated { activity_id: u64, songs: usize },
    /// Evaluated, but nothing matched the window; no write performed.
    NoMatches { activity_id: u64 },
    /// Not an activity-creation event; acknowledged no-op.
    Ignored,
    /// No credential matches the event's owner; acknowledged and dropped
    /// (retrying cannot create a credential).
    UserNotFound { owner_id: u64 },
    /// More than one credential matches the owner. Invariant violation;
    /// logged and dropped rather than guessing which user to annotate.
    AmbiguousOwner { owner_id: u64, matches: usize },
}

/// Processes inbound activity-creation events.
#[derive(Clone)]
pub struct WebhookProcessor {
    db: FirestoreDb,
    strava: StravaService,
    spotify: SpotifyService,
}

impl WebhookProcessor {
    pub fn new(db: FirestoreDb, strava: StravaService, spotify: SpotifyService) -> Self {
        Self {
            db,
            strava,
            spotify,
        }
    }

    /// Run one event through the pipeline.
    pub async fn process(&self, event: &WebhookEvent) -> Result<WebhookOutcome, AppError> {
        if event.object_type != "activity" || event.aspect_type != "create" {
            tracing::debug!(
                object_type = %event.object_type,
                aspect_type = %event.aspect_type,
                "Ignoring non-activity-creation event"
            );
            return Ok(WebhookOutcome::Ignored);
        }

        // Resolve the owning user from the athlete id.
        let credentials = self
            .db
            .find_strava_credentials_by_athlete(event.owner_id)
            .await?;

        let user_id = match credentials.as_slice() {
            [] => {
                tracing::warn!(owner_id = event.owner_id, "No user found for webhook owner");
                return Ok(WebhookOutcome::UserNotFound {
                    owner_id: event.owner_id,
                });
            }
            [credential] => credential.user_id.clone(),
            many => {
                tracing::error!(
                    owner_id = event.owner_id,
                    matches = many.len(),
                    "Multiple credentials share one athlete id"
                );
                return Ok(WebhookOutcome::AmbiguousOwner {
                    owner_id: event.owner_id,
                    matches: many.len(),
                });
            }
        };

        let activity = self.strava.get_activity(&user_id, event.object_id).await?;

        tracing::info!(
            user_id = %user_id,
            activity_id = activity.id,
            start_date = %activity.start_date,
            elapsed_time = activity.elapsed_time,
            "Processing activity-creation event"
        );

        let matched = self.songs_for_window(&user_id, &activity).await?;

        if matched.is_empty() {
            tracing::info!(activity_id = activity.id, "No songs in activity window");
            return Ok(WebhookOutcome::NoMatches {
                activity_id: activity.id,
            });
        }

        let description = matcher::compose_description(activity.description.as_deref(), &matched);
        self.strava
            .update_activity_description(&user_id, activity.id, &description)
            .await?;

        tracing::info!(
            activity_id = activity.id,
            songs = matched.len(),
            "Activity description updated with soundtrack"
        );

        Ok(WebhookOutcome::DescriptionUpdated {
            activity_id: activity.id,
            songs: matched.len(),
        })
    }

    /// Match listening history into the activity's window.
    ///
    /// A missing Spotify credential (or one that can no longer refresh)
    /// yields zero songs rather than a rejection; the annotation is just
    /// skipped. Genuine upstream failures propagate so the event retries.
    async fn songs_for_window(
        &self,
        user_id: &str,
        activity: &crate::models::Activity,
    ) -> Result<Vec<Song>, AppError> {
        if self
            .db
            .get_credential(Provider::Spotify, user_id)
            .await?
            .is_none()
        {
            return Ok(Vec::new());
        }

        let access_token = match self.spotify.ensure_valid_token(user_id).await {
            Ok(token) => token,
            Err(AppError::NotConnected(_)) | Err(AppError::TokenRefresh(_)) => {
                tracing::warn!(user_id, "Spotify credential unusable, skipping song match");
                return Ok(Vec::new());
            }
            Err(e) => return Err(e),
        };

        let candidates = self
            .spotify
            .recently_played(&access_token, activity.end_date())
            .await?;

        Ok(matcher::match_songs(
            activity.start_date,
            activity.elapsed_time,
            &candidates,
        ))
    }
}
