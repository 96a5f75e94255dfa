// SPDX-License-Identifier: MIT

//! Spotify API client and connection lifecycle.
//!
//! Handles:
//! - OAuth code exchange (HTTP Basic client auth) and credential persistence
//! - Recently-played history fetching, bounded by a `before` instant
//! - Token refresh via the shared OAuth algorithm

use crate::db::FirestoreDb;
use crate::error::AppError;
use crate::models::{Credential, Provider, Song};
use crate::services::oauth::{self, AuthScheme, TokenEndpoint};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::time::Duration;

/// Maximum number of recently-played items the upstream returns per call.
/// If a workout window spans more plays than this, the overflow is
/// unreachable; known limitation of the recently-played endpoint.
pub const RECENTLY_PLAYED_LIMIT: u32 = 50;

/// Spotify API client.
#[derive(Clone)]
pub struct SpotifyClient {
    http: reqwest::Client,
    api_base: String,
    accounts_base: String,
    client_id: String,
    client_secret: String,
    timeout: Duration,
}

impl SpotifyClient {
    pub fn new(
        client_id: String,
        client_secret: String,
        api_base: String,
        accounts_base: String,
        timeout: Duration,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_base,
            accounts_base,
            client_id,
            client_secret,
            timeout,
        }
    }

    /// Token endpoint descriptor for the shared refresh algorithm.
    /// Spotify authenticates the client with an HTTP Basic header and
    /// frequently omits a new refresh token on refresh.
    pub fn token_endpoint(&self) -> TokenEndpoint {
        TokenEndpoint {
            provider: Provider::Spotify,
            url: format!("{}/api/token", self.accounts_base),
            auth: AuthScheme::BasicHeader,
            client_id: self.client_id.clone(),
            client_secret: self.client_secret.clone(),
            timeout: self.timeout,
        }
    }

    /// Exchange an authorization code for tokens.
    pub async fn exchange_code(
        &self,
        code: &str,
        redirect_uri: &str,
    ) -> Result<SpotifyTokenExchange, AppError> {
        self.token_endpoint()
            .exchange_code(&self.http, code, Some(redirect_uri))
            .await
    }

    /// Fetch tracks played strictly before `before`, most-recent-first.
    ///
    /// The wire parameter is epoch milliseconds; that conversion happens
    /// only here, at the boundary.
    pub async fn recently_played(
        &self,
        access_token: &str,
        before: DateTime<Utc>,
        limit: u32,
    ) -> Result<Vec<Song>, AppError> {
        let url = format!("{}/me/player/recently-played", self.api_base);

        let response = self
            .http
            .get(&url)
            .timeout(self.timeout)
            .bearer_auth(access_token)
            .query(&[
                ("limit", limit.to_string()),
                ("before", before.timestamp_millis().to_string()),
            ])
            .send()
            .await
            .map_err(|e| AppError::upstream_transport(Provider::Spotify, e))?;

        let history: RecentlyPlayedResponse = self.check_response_json(response).await?;
        Ok(history.items.into_iter().map(Song::from).collect())
    }

    /// Get the authenticated user's profile.
    pub async fn get_profile(&self, access_token: &str) -> Result<SpotifyProfile, AppError> {
        let url = format!("{}/me", self.api_base);

        let response = self
            .http
            .get(&url)
            .timeout(self.timeout)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| AppError::upstream_transport(Provider::Spotify, e))?;

        self.check_response_json(response).await
    }

    /// Check response and parse JSON body.
    async fn check_response_json<T: for<'de> Deserialize<'de>>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, AppError> {
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();

            if status == 429 {
                tracing::warn!("Spotify rate limit hit (429)");
            }

            return Err(AppError::upstream_status(Provider::Spotify, status, body));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::upstream_transport(Provider::Spotify, e))
    }
}

/// Token exchange response from Spotify OAuth.
#[derive(Debug, Clone, Deserialize)]
pub struct SpotifyTokenExchange {
    pub access_token: String,
    pub refresh_token: String,
    /// Relative lifetime, seconds
    pub expires_in: i64,
}

/// Spotify user profile.
#[derive(Debug, Clone, Deserialize)]
pub struct SpotifyProfile {
    pub id: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub external_urls: SpotifyExternalUrls,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SpotifyExternalUrls {
    #[serde(default)]
    pub spotify: Option<String>,
}

/// Recently-played wire shapes.
#[derive(Debug, Deserialize)]
struct RecentlyPlayedResponse {
    items: Vec<PlayHistoryItem>,
}

#[derive(Debug, Deserialize)]
struct PlayHistoryItem {
    track: Track,
    played_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct Track {
    name: String,
    artists: Vec<Artist>,
    album: Album,
    duration_ms: u64,
}

#[derive(Debug, Deserialize)]
struct Artist {
    name: String,
}

#[derive(Debug, Deserialize)]
struct Album {
    name: String,
    #[serde(default)]
    images: Vec<AlbumImage>,
}

#[derive(Debug, Deserialize)]
struct AlbumImage {
    url: String,
}

impl From<PlayHistoryItem> for Song {
    fn from(item: PlayHistoryItem) -> Self {
        Song {
            name: item.track.name,
            artists: item.track.artists.into_iter().map(|a| a.name).collect(),
            album: item.track.album.name,
            played_at: item.played_at,
            album_art_url: item.track.album.images.into_iter().next().map(|i| i.url),
            duration_ms: item.track.duration_ms,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// SpotifyService - connection lifecycle and token management
// ─────────────────────────────────────────────────────────────────────────────

/// High-level Spotify service: credential lifecycle plus history fetching
/// with automatic token refresh.
#[derive(Clone)]
pub struct SpotifyService {
    client: SpotifyClient,
    db: FirestoreDb,
    /// Redirect URI registered with Spotify; required on code exchange.
    redirect_uri: String,
}

impl SpotifyService {
    pub fn new(config: &crate::config::Config, db: FirestoreDb) -> Self {
        Self {
            client: SpotifyClient::new(
                config.spotify_client_id.clone(),
                config.spotify_client_secret.clone(),
                config.spotify_api_base.clone(),
                config.spotify_accounts_base.clone(),
                Duration::from_secs(config.upstream_timeout_secs),
            ),
            db,
            redirect_uri: format!("{}/auth/spotify/callback", config.public_url),
        }
    }

    // ─── Token Management ────────────────────────────────────────────────────

    /// Get a valid (non-expired) access token for the given user.
    pub async fn ensure_valid_token(&self, user_id: &str) -> Result<String, AppError> {
        oauth::ensure_valid_token(
            &self.db,
            &self.client.http,
            &self.client.token_endpoint(),
            user_id,
        )
        .await
    }

    // ─── Connection Lifecycle ────────────────────────────────────────────────

    /// Handle OAuth callback: exchange the code and persist the credential.
    pub async fn connect(&self, user_id: &str, code: &str) -> Result<(), AppError> {
        let exchange = self.client.exchange_code(code, &self.redirect_uri).await?;

        let credential = Credential {
            user_id: user_id.to_string(),
            access_token: exchange.access_token,
            refresh_token: exchange.refresh_token,
            expires_at: crate::time_utils::epoch_seconds_now() + exchange.expires_in,
            athlete_id: None,
            webhook_subscription_id: None,
        };
        self.db
            .set_credential(Provider::Spotify, &credential)
            .await?;

        tracing::info!(user_id, "Spotify connected, credential stored");
        Ok(())
    }

    /// Disconnect Spotify by deleting the credential. Spotify has no
    /// token-revocation endpoint; the grant stays valid upstream until
    /// the user removes the app from their account. Idempotent.
    pub async fn disconnect(&self, user_id: &str) -> Result<(), AppError> {
        self.db
            .delete_credential(Provider::Spotify, user_id)
            .await?;
        tracing::info!(user_id, "Spotify disconnected");
        Ok(())
    }

    /// Connected-state: credential exists with a non-empty access token.
    pub async fn is_connected(&self, user_id: &str) -> Result<bool, AppError> {
        Ok(self
            .db
            .get_credential(Provider::Spotify, user_id)
            .await?
            .is_some_and(|c| !c.access_token.is_empty()))
    }

    // ─── API Wrappers ────────────────────────────────────────────────────────

    /// Fetch up to 50 tracks played strictly before `before` using an
    /// already-validated token (callers refresh once per request, then
    /// issue per-activity fetches concurrently).
    pub async fn recently_played(
        &self,
        access_token: &str,
        before: DateTime<Utc>,
    ) -> Result<Vec<Song>, AppError> {
        self.client
            .recently_played(access_token, before, RECENTLY_PLAYED_LIMIT)
            .await
    }

    /// User profile passthrough for the UI.
    pub async fn user_profile(&self, user_id: &str) -> Result<(String, String), AppError> {
        let access_token = self.ensure_valid_token(user_id).await?;
        let profile = self.client.get_profile(&access_token).await?;
        let username = profile
            .display_name
            .unwrap_or_else(|| profile.id.clone());
        let profile_url = profile
            .external_urls
            .spotify
            .unwrap_or_else(|| format!("https://open.spotify.com/user/{}", profile.id));
        Ok((username, profile_url))
    }
}
