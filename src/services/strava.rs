// SPDX-License-Identifier: MIT

//! Strava API client and connection lifecycle.
//!
//! Handles:
//! - OAuth code exchange and credential persistence
//! - Push-subscription registration/removal
//! - Recent-activity and activity-detail fetching
//! - Activity description updates
//! - Token refresh via the shared OAuth algorithm

use crate::db::FirestoreDb;
use crate::error::AppError;
use crate::models::{Activity, Credential, Provider};
use crate::services::oauth::{self, AuthScheme, TokenEndpoint};
use serde::Deserialize;
use std::time::Duration;

/// Fixed page size for the recent-activity list; there is no pagination.
pub const RECENT_ACTIVITIES_COUNT: u32 = 10;

/// Strava API client.
#[derive(Clone)]
pub struct StravaClient {
    http: reqwest::Client,
    api_base: String,
    oauth_base: String,
    client_id: String,
    client_secret: String,
    timeout: Duration,
}

impl StravaClient {
    pub fn new(
        client_id: String,
        client_secret: String,
        api_base: String,
        oauth_base: String,
        timeout: Duration,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_base,
            oauth_base,
            client_id,
            client_secret,
            timeout,
        }
    }

    /// Token endpoint descriptor for the shared refresh algorithm.
    /// Strava authenticates the client via form body fields.
    pub fn token_endpoint(&self) -> TokenEndpoint {
        TokenEndpoint {
            provider: Provider::Strava,
            url: format!("{}/oauth/token", self.oauth_base),
            auth: AuthScheme::FormBody,
            client_id: self.client_id.clone(),
            client_secret: self.client_secret.clone(),
            timeout: self.timeout,
        }
    }

    /// Exchange an authorization code for tokens (includes athlete info).
    pub async fn exchange_code(&self, code: &str) -> Result<StravaTokenExchange, AppError> {
        self.token_endpoint()
            .exchange_code(&self.http, code, None)
            .await
    }

    /// Get the authenticated athlete's 10 most recent activities.
    pub async fn recent_activities(
        &self,
        access_token: &str,
    ) -> Result<Vec<StravaActivity>, AppError> {
        let url = format!("{}/athlete/activities", self.api_base);

        let response = self
            .http
            .get(&url)
            .timeout(self.timeout)
            .bearer_auth(access_token)
            .query(&[("per_page", RECENT_ACTIVITIES_COUNT.to_string())])
            .send()
            .await
            .map_err(|e| AppError::upstream_transport(Provider::Strava, e))?;

        self.check_response_json(response).await
    }

    /// Get a detailed activity by ID.
    pub async fn get_activity(
        &self,
        access_token: &str,
        activity_id: u64,
    ) -> Result<StravaActivity, AppError> {
        let url = format!("{}/activities/{}", self.api_base, activity_id);
        self.get_json(&url, access_token).await
    }

    /// Update an activity's description.
    pub async fn update_activity_description(
        &self,
        access_token: &str,
        activity_id: u64,
        description: &str,
    ) -> Result<(), AppError> {
        let url = format!("{}/activities/{}", self.api_base, activity_id);

        let body = serde_json::json!({
            "description": description
        });

        let response = self
            .http
            .put(&url)
            .timeout(self.timeout)
            .bearer_auth(access_token)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::upstream_transport(Provider::Strava, e))?;

        self.check_response(response).await
    }

    /// Get authenticated athlete profile.
    pub async fn get_athlete(&self, access_token: &str) -> Result<StravaAthlete, AppError> {
        let url = format!("{}/athlete", self.api_base);
        self.get_json(&url, access_token).await
    }

    /// Deauthorize the application for a user.
    ///
    /// This invalidates all access and refresh tokens for the user and
    /// removes the app from their Strava settings.
    pub async fn deauthorize(&self, access_token: &str) -> Result<(), AppError> {
        let url = format!("{}/oauth/deauthorize", self.oauth_base);
        let response = self
            .http
            .post(&url)
            .timeout(self.timeout)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| AppError::upstream_transport(Provider::Strava, e))?;

        self.check_response(response).await
    }

    /// Register a webhook push subscription; returns the subscription id.
    pub async fn create_push_subscription(
        &self,
        callback_url: &str,
        verify_token: &str,
    ) -> Result<u64, AppError> {
        let url = format!("{}/push_subscriptions", self.api_base);

        let response = self
            .http
            .post(&url)
            .timeout(self.timeout)
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("callback_url", callback_url),
                ("verify_token", verify_token),
            ])
            .send()
            .await
            .map_err(|e| AppError::upstream_transport(Provider::Strava, e))?;

        let subscription: PushSubscription = self.check_response_json(response).await?;
        Ok(subscription.id)
    }

    /// Remove a webhook push subscription.
    pub async fn delete_push_subscription(&self, subscription_id: u64) -> Result<(), AppError> {
        let url = format!("{}/push_subscriptions/{}", self.api_base, subscription_id);

        let response = self
            .http
            .delete(&url)
            .timeout(self.timeout)
            .query(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
            ])
            .send()
            .await
            .map_err(|e| AppError::upstream_transport(Provider::Strava, e))?;

        self.check_response(response).await
    }

    /// Generic GET request with JSON response.
    async fn get_json<T: for<'de> Deserialize<'de>>(
        &self,
        url: &str,
        access_token: &str,
    ) -> Result<T, AppError> {
        let response = self
            .http
            .get(url)
            .timeout(self.timeout)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| AppError::upstream_transport(Provider::Strava, e))?;

        self.check_response_json(response).await
    }

    /// Check response status and return error if not successful.
    async fn check_response(&self, response: reqwest::Response) -> Result<(), AppError> {
        if response.status().is_success() {
            return Ok(());
        }

        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();

        if status == 429 {
            tracing::warn!("Strava rate limit hit (429)");
        }

        Err(AppError::upstream_status(Provider::Strava, status, body))
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
                tracing::warn!("Strava rate limit hit (429)");
            }

            return Err(AppError::upstream_status(Provider::Strava, status, body));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::upstream_transport(Provider::Strava, e))
    }
}

/// Token exchange response from Strava OAuth (includes athlete info).
#[derive(Debug, Clone, Deserialize)]
pub struct StravaTokenExchange {
    pub access_token: String,
    pub refresh_token: String,
    /// Absolute expiry, epoch seconds
    pub expires_at: i64,
    pub athlete: StravaAthlete,
}

/// Athlete info from Strava.
#[derive(Debug, Clone, Deserialize)]
pub struct StravaAthlete {
    pub id: u64,
    #[serde(default)]
    pub username: Option<String>,
}

/// Push subscription registration response.
#[derive(Debug, Deserialize)]
struct PushSubscription {
    id: u64,
}

/// Activity as returned by the Strava API.
#[derive(Debug, Clone, Deserialize)]
pub struct StravaActivity {
    pub id: u64,
    pub name: String,
    pub sport_type: String,
    pub start_date: chrono::DateTime<chrono::Utc>,
    /// Wall-clock duration, seconds. Used for the song-matching window
    /// (music keeps playing through pauses, so moving_time is not).
    pub elapsed_time: i64,
    pub distance: f64,
    #[serde(default)]
    pub description: Option<String>,
}

impl From<StravaActivity> for Activity {
    fn from(a: StravaActivity) -> Self {
        Activity {
            id: a.id,
            name: a.name,
            sport_type: a.sport_type,
            start_date: a.start_date,
            elapsed_time: a.elapsed_time,
            distance: a.distance,
            description: a.description,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// StravaService - connection lifecycle and token management
// ─────────────────────────────────────────────────────────────────────────────

/// High-level Strava service: credential lifecycle plus API calls with
/// automatic token refresh.
#[derive(Clone)]
pub struct StravaService {
    client: StravaClient,
    db: FirestoreDb,
    webhook_verify_token: String,
    /// Public base URL of this API, used for the webhook callback URL.
    public_url: String,
}

impl StravaService {
    pub fn new(config: &crate::config::Config, db: FirestoreDb) -> Self {
        Self {
            client: StravaClient::new(
                config.strava_client_id.clone(),
                config.strava_client_secret.clone(),
                config.strava_api_base.clone(),
                config.strava_oauth_base.clone(),
                Duration::from_secs(config.upstream_timeout_secs),
            ),
            db,
            webhook_verify_token: config.webhook_verify_token.clone(),
            public_url: config.public_url.clone(),
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

    /// Handle OAuth callback: exchange the code, persist the credential,
    /// and register the webhook push subscription.
    ///
    /// The subscription id lands in a second single-document write; if
    /// subscription setup fails the credential still stands and the
    /// failure is logged (best-effort, no transaction).
    pub async fn connect(&self, user_id: &str, code: &str) -> Result<(), AppError> {
        let exchange = self.client.exchange_code(code).await?;

        let mut credential = Credential {
            user_id: user_id.to_string(),
            access_token: exchange.access_token.clone(),
            refresh_token: exchange.refresh_token,
            expires_at: exchange.expires_at,
            athlete_id: Some(exchange.athlete.id),
            webhook_subscription_id: None,
        };
        self.db
            .set_credential(Provider::Strava, &credential)
            .await?;

        tracing::info!(
            user_id,
            athlete_id = exchange.athlete.id,
            "Strava connected, credential stored"
        );

        let callback_url = format!("{}/webhook/strava", self.public_url);
        match self
            .client
            .create_push_subscription(&callback_url, &self.webhook_verify_token)
            .await
        {
            Ok(subscription_id) => {
                credential.webhook_subscription_id = Some(subscription_id);
                self.db
                    .set_credential(Provider::Strava, &credential)
                    .await?;
                tracing::info!(user_id, subscription_id, "Webhook subscription registered");
            }
            Err(e) => {
                tracing::warn!(
                    user_id,
                    error = %e,
                    "Webhook subscription failed, continuing without push events"
                );
            }
        }

        Ok(())
    }

    /// Disconnect Strava: best-effort revoke and unsubscribe, then delete
    /// the credential. Idempotent: disconnecting an already-disconnected
    /// user succeeds.
    pub async fn disconnect(&self, user_id: &str) -> Result<(), AppError> {
        let credential = match self.db.get_credential(Provider::Strava, user_id).await? {
            Some(c) => c,
            None => return Ok(()), // already disconnected
        };

        // Revoke upstream; failure is logged, not fatal. The user's intent
        // is to stop the linkage even if the upstream revoke fails.
        if let Err(e) = self.client.deauthorize(&credential.access_token).await {
            tracing::warn!(user_id, error = %e, "Strava deauthorize failed");
        }

        if let Some(subscription_id) = credential.webhook_subscription_id {
            if let Err(e) = self.client.delete_push_subscription(subscription_id).await {
                tracing::warn!(
                    user_id,
                    subscription_id,
                    error = %e,
                    "Webhook unsubscribe failed"
                );
            }
        }

        self.db.delete_credential(Provider::Strava, user_id).await?;
        tracing::info!(user_id, "Strava disconnected");
        Ok(())
    }

    /// Connected-state: credential exists with a non-empty access token.
    pub async fn is_connected(&self, user_id: &str) -> Result<bool, AppError> {
        Ok(self
            .db
            .get_credential(Provider::Strava, user_id)
            .await?
            .is_some_and(|c| !c.access_token.is_empty()))
    }

    // ─── API Wrappers ────────────────────────────────────────────────────────

    /// Get the user's 10 most recent activities.
    pub async fn recent_activities(&self, user_id: &str) -> Result<Vec<Activity>, AppError> {
        let access_token = self.ensure_valid_token(user_id).await?;
        let activities = self.client.recent_activities(&access_token).await?;
        Ok(activities.into_iter().map(Activity::from).collect())
    }

    /// Get a detailed activity by ID.
    pub async fn get_activity(&self, user_id: &str, activity_id: u64) -> Result<Activity, AppError> {
        let access_token = self.ensure_valid_token(user_id).await?;
        let activity = self.client.get_activity(&access_token, activity_id).await?;
        Ok(activity.into())
    }

    /// Update an activity's description.
    pub async fn update_activity_description(
        &self,
        user_id: &str,
        activity_id: u64,
        description: &str,
    ) -> Result<(), AppError> {
        let access_token = self.ensure_valid_token(user_id).await?;
        self.client
            .update_activity_description(&access_token, activity_id, description)
            .await
    }

    /// Athlete profile passthrough for the UI.
    pub async fn athlete_profile(&self, user_id: &str) -> Result<(String, String), AppError> {
        let access_token = self.ensure_valid_token(user_id).await?;
        let athlete = self.client.get_athlete(&access_token).await?;
        let username = athlete
            .username
            .unwrap_or_else(|| athlete.id.to_string());
        let profile_url = format!("https://www.strava.com/athletes/{}", athlete.id);
        Ok((username, profile_url))
    }
}
