// SPDX-License-Identifier: MIT

//! OAuth connection routes: connect-URL issuance and provider callbacks.
//!
//! The connect URL carries an HMAC-signed state value binding the
//! provider callback to the user who initiated it; callbacks verify the
//! signature before touching any credentials.

use axum::{
    extract::{Path, Query, State},
    response::Redirect,
    routing::get,
    Extension, Json, Router,
};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::Provider;
use crate::AppState;

type HmacSha256 = Hmac<Sha256>;

/// Public callback routes (the provider redirects the browser here).
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/strava/callback", get(strava_callback))
        .route("/auth/spotify/callback", get(spotify_callback))
}

/// Authenticated connect-URL issuance.
pub fn connect_routes() -> Router<Arc<AppState>> {
    Router::new().route("/api/auth/{service}/url", get(connect_url))
}

// ─── OAuth state signing ─────────────────────────────────────

/// Sign `user_id` into an opaque state value: base64url of
/// "user_id|timestamp_hex|signature_hex".
pub fn sign_state(user_id: &str, secret: &[u8]) -> Result<String> {
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("System time error: {}", e)))?
        .as_millis();

    let payload = format!("{}|{:x}", user_id, timestamp);

    let mut mac = HmacSha256::new_from_slice(secret)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("HMAC init failed: {}", e)))?;
    mac.update(payload.as_bytes());
    let signature = hex::encode(mac.finalize().into_bytes());

    Ok(URL_SAFE_NO_PAD.encode(format!("{}|{}", payload, signature).as_bytes()))
}

/// Verify the signature on a state value and recover the user id.
pub fn verify_state(state: &str, secret: &[u8]) -> Option<String> {
    let bytes = URL_SAFE_NO_PAD.decode(state).ok()?;
    let state_str = String::from_utf8(bytes).ok()?;

    // Format is "user_id|timestamp_hex|signature_hex"
    let parts: Vec<&str> = state_str.splitn(3, '|').collect();
    if parts.len() != 3 {
        return None;
    }

    let payload = format!("{}|{}", parts[0], parts[1]);

    let mut mac = HmacSha256::new_from_slice(secret).ok()?;
    mac.update(payload.as_bytes());
    let expected = hex::encode(mac.finalize().into_bytes());

    if parts[2] != expected {
        tracing::error!("OAuth state signature mismatch! Potential tampering.");
        return None;
    }

    Some(parts[0].to_string())
}

// ─── Connect-URL issuance ────────────────────────────────────

#[derive(Serialize)]
struct ConnectUrlResponse {
    auth_url: String,
}

/// Issue the provider authorization URL for the authenticated user.
async fn connect_url(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(service): Path<String>,
) -> Result<Json<ConnectUrlResponse>> {
    let provider = Provider::from_path(&service)
        .ok_or_else(|| AppError::BadRequest(format!("Unknown service: {}", service)))?;

    let oauth_state = sign_state(&user.user_id, &state.config.oauth_state_key)?;

    let auth_url = match provider {
        Provider::Strava => {
            let callback = format!("{}/auth/strava/callback", state.config.public_url);
            format!(
                "{}/oauth/authorize?client_id={}&redirect_uri={}&response_type=code&approval_prompt=auto&scope=activity:read_all,activity:write&state={}",
                state.config.strava_oauth_base,
                state.config.strava_client_id,
                urlencoding::encode(&callback),
                oauth_state
            )
        }
        Provider::Spotify => {
            let callback = format!("{}/auth/spotify/callback", state.config.public_url);
            format!(
                "{}/authorize?client_id={}&response_type=code&scope={}&redirect_uri={}&state={}",
                state.config.spotify_accounts_base,
                state.config.spotify_client_id,
                urlencoding::encode("user-read-recently-played user-read-private"),
                urlencoding::encode(&callback),
                oauth_state
            )
        }
    };

    tracing::info!(user_id = %user.user_id, service = %provider, "Issued connect URL");

    Ok(Json(ConnectUrlResponse { auth_url }))
}

// ─── Provider callbacks ──────────────────────────────────────

#[derive(Deserialize)]
struct CallbackParams {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Strava OAuth callback: exchange code, persist credential, register
/// webhook subscription.
async fn strava_callback(
    State(state): State<Arc<AppState>>,
    Query(params): Query<CallbackParams>,
) -> Result<Redirect> {
    let (user_id, code) = match unpack_callback(&state, &params, Provider::Strava)? {
        Ok(pair) => pair,
        Err(redirect) => return Ok(redirect),
    };

    state.strava.connect(&user_id, &code).await?;

    Ok(Redirect::temporary(&format!(
        "{}?connected=strava",
        state.config.frontend_url
    )))
}

/// Spotify OAuth callback: exchange code, persist credential.
async fn spotify_callback(
    State(state): State<Arc<AppState>>,
    Query(params): Query<CallbackParams>,
) -> Result<Redirect> {
    let (user_id, code) = match unpack_callback(&state, &params, Provider::Spotify)? {
        Ok(pair) => pair,
        Err(redirect) => return Ok(redirect),
    };

    state.spotify.connect(&user_id, &code).await?;

    Ok(Redirect::temporary(&format!(
        "{}?connected=spotify",
        state.config.frontend_url
    )))
}

/// Shared callback validation: verify state, handle provider-reported
/// errors (user denied the consent screen) as a frontend redirect.
fn unpack_callback(
    state: &AppState,
    params: &CallbackParams,
    provider: Provider,
) -> Result<std::result::Result<(String, String), Redirect>> {
    let user_id = params
        .state
        .as_deref()
        .and_then(|s| verify_state(s, &state.config.oauth_state_key))
        .ok_or(AppError::Unauthenticated)?;

    if let Some(error) = &params.error {
        tracing::warn!(user_id = %user_id, provider = %provider, error = %error, "OAuth denied");
        return Ok(Err(Redirect::temporary(&format!(
            "{}?error={}",
            state.config.frontend_url,
            urlencoding::encode(error)
        ))));
    }

    let code = params
        .code
        .clone()
        .ok_or_else(|| AppError::BadRequest("Missing authorization code".to_string()))?;

    Ok(Ok((user_id, code)))
}
