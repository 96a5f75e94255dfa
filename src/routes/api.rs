// SPDX-License-Identifier: MIT

//! API routes for authenticated users.

use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::{ActivityWithSongs, Provider, Song};
use crate::services::matcher;
use crate::AppState;
use axum::{
    extract::{Path, State},
    routing::{delete, get},
    Extension, Json, Router,
};
use futures_util::future::join_all;
use serde::Serialize;
use std::sync::Arc;

/// API routes (require authentication via JWT).
/// The auth middleware is applied in routes/mod.rs for these routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/activities", get(get_activities))
        .route("/api/connections/{service}", get(get_connection))
        .route("/api/connections/{service}", delete(disconnect))
        .route("/api/me/{service}", get(get_user_info))
}

// ─── Activities with songs ───────────────────────────────────

#[derive(Serialize)]
struct ActivitiesResponse {
    activities: Vec<ActivityWithSongs>,
}

/// The user's recent activities, each enriched with the songs playing
/// during it.
///
/// The activity fetch is the primary path and its failures propagate.
/// Song enrichment is best-effort: per-activity lookups run concurrently
/// and any failure maps to `songs: null` for that activity, never a
/// failed response. `null` means "not evaluated"; `[]` means "evaluated,
/// none matched".
async fn get_activities(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<ActivitiesResponse>> {
    let activities = state.strava.recent_activities(&user.user_id).await?;

    // One token refresh per request; the per-activity fetches below share
    // the token. An unusable Spotify credential downgrades every activity
    // to songs: null rather than failing the list.
    let spotify_token = match state.spotify.ensure_valid_token(&user.user_id).await {
        Ok(token) => Some(token),
        Err(AppError::NotConnected(_)) => None,
        Err(e) => {
            tracing::warn!(user_id = %user.user_id, error = %e, "Spotify unavailable, skipping songs");
            None
        }
    };

    let enriched = join_all(activities.into_iter().map(|activity| {
        let state = state.clone();
        let token = spotify_token.clone();
        async move {
            let songs = match token {
                Some(token) => fetch_songs_for_activity(&state, &token, &activity).await,
                None => None,
            };
            ActivityWithSongs { activity, songs }
        }
    }))
    .await;

    Ok(Json(ActivitiesResponse {
        activities: enriched,
    }))
}

/// Fetch and match songs for one activity; `None` on any failure.
async fn fetch_songs_for_activity(
    state: &AppState,
    access_token: &str,
    activity: &crate::models::Activity,
) -> Option<Vec<Song>> {
    match state
        .spotify
        .recently_played(access_token, activity.end_date())
        .await
    {
        Ok(candidates) => Some(matcher::match_songs(
            activity.start_date,
            activity.elapsed_time,
            &candidates,
        )),
        Err(e) => {
            tracing::warn!(
                activity_id = activity.id,
                error = %e,
                "Failed to fetch songs for activity"
            );
            None
        }
    }
}

// ─── Connections ─────────────────────────────────────────────

#[derive(Serialize)]
struct ConnectionResponse {
    connected: bool,
}

/// Report connected-state for a provider.
async fn get_connection(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(service): Path<String>,
) -> Result<Json<ConnectionResponse>> {
    let provider = parse_service(&service)?;

    let connected = match provider {
        Provider::Strava => state.strava.is_connected(&user.user_id).await?,
        Provider::Spotify => state.spotify.is_connected(&user.user_id).await?,
    };

    Ok(Json(ConnectionResponse { connected }))
}

#[derive(Serialize)]
struct DisconnectResponse {
    success: bool,
}

/// Disconnect a provider. Idempotent: disconnecting twice succeeds.
async fn disconnect(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(service): Path<String>,
) -> Result<Json<DisconnectResponse>> {
    let provider = parse_service(&service)?;

    match provider {
        Provider::Strava => state.strava.disconnect(&user.user_id).await?,
        Provider::Spotify => state.spotify.disconnect(&user.user_id).await?,
    }

    Ok(Json(DisconnectResponse { success: true }))
}

// ─── User info passthrough ───────────────────────────────────

#[derive(Serialize)]
struct UserInfoResponse {
    username: String,
    profile_url: String,
}

/// Provider profile passthrough for the UI connection cards.
async fn get_user_info(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(service): Path<String>,
) -> Result<Json<UserInfoResponse>> {
    let provider = parse_service(&service)?;

    let (username, profile_url) = match provider {
        Provider::Strava => state.strava.athlete_profile(&user.user_id).await?,
        Provider::Spotify => state.spotify.user_profile(&user.user_id).await?,
    };

    Ok(Json(UserInfoResponse {
        username,
        profile_url,
    }))
}

fn parse_service(service: &str) -> Result<Provider> {
    Provider::from_path(service)
        .ok_or_else(|| AppError::BadRequest(format!("Unknown service: {}", service)))
}
