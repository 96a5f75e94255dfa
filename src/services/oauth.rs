// SPDX-License-Identifier: MIT

//! Shared OAuth token-refresh algorithm.
//!
//! Strava and Spotify run the same refresh-token grant against different
//! endpoints with different client-authentication schemes (Strava puts
//! client id/secret in the form body, Spotify uses HTTP Basic) and
//! different expiry wire formats (absolute `expires_at` vs. relative
//! `expires_in`). Both are normalized here into absolute epoch seconds
//! the moment the response is parsed, so every expiry comparison in the
//! rest of the crate uses one unit.

use crate::db::FirestoreDb;
use crate::error::AppError;
use crate::models::{Credential, Provider};
use crate::time_utils::epoch_seconds_now;
use serde::Deserialize;

/// How a provider authenticates the client on its token endpoint.
#[derive(Debug, Clone)]
pub enum AuthScheme {
    /// client_id/client_secret as form body fields (Strava)
    FormBody,
    /// client_id:client_secret as an HTTP Basic authorization header (Spotify)
    BasicHeader,
}

/// One provider's token endpoint.
#[derive(Debug, Clone)]
pub struct TokenEndpoint {
    pub provider: Provider,
    pub url: String,
    pub auth: AuthScheme,
    pub client_id: String,
    pub client_secret: String,
    pub timeout: std::time::Duration,
}

/// Token response as the providers actually send it.
#[derive(Debug, Deserialize)]
struct WireTokenResponse {
    access_token: String,
    /// Spotify frequently omits this on refresh; the prior refresh token
    /// is retained in that case.
    #[serde(default)]
    refresh_token: Option<String>,
    /// Absolute expiry, epoch seconds (Strava)
    #[serde(default)]
    expires_at: Option<i64>,
    /// Relative lifetime, seconds (Spotify)
    #[serde(default)]
    expires_in: Option<i64>,
}

/// A normalized token grant: expiry is always absolute epoch seconds.
#[derive(Debug, Clone)]
pub struct TokenGrant {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: i64,
}

fn normalize(wire: WireTokenResponse, now: i64) -> Result<TokenGrant, AppError> {
    let expires_at = match (wire.expires_at, wire.expires_in) {
        (Some(at), _) => at,
        (None, Some(lifetime)) => now + lifetime,
        (None, None) => {
            return Err(AppError::BadRequest(
                "Token response carries neither expires_at nor expires_in".to_string(),
            ))
        }
    };

    Ok(TokenGrant {
        access_token: wire.access_token,
        refresh_token: wire.refresh_token,
        expires_at,
    })
}

impl TokenEndpoint {
    /// Run the refresh-token grant.
    ///
    /// A non-2xx response is a refresh failure, not a generic upstream
    /// error: the caller must not mutate the stored credential and the
    /// user is told to reconnect.
    pub async fn refresh(
        &self,
        http: &reqwest::Client,
        refresh_token: &str,
    ) -> Result<TokenGrant, AppError> {
        let form = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
        ];

        let request = http.post(&self.url).timeout(self.timeout);
        let request = match self.auth {
            AuthScheme::FormBody => request.form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
            ]),
            AuthScheme::BasicHeader => request
                .basic_auth(&self.client_id, Some(&self.client_secret))
                .form(&form),
        };

        let response = request
            .send()
            .await
            .map_err(|e| AppError::upstream_transport(self.provider, e))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(
                provider = %self.provider,
                status = %status,
                body = %body,
                "Token refresh rejected"
            );
            return Err(AppError::TokenRefresh(self.provider));
        }

        let wire: WireTokenResponse = response
            .json()
            .await
            .map_err(|e| AppError::upstream_transport(self.provider, e))?;

        normalize(wire, epoch_seconds_now())
    }

    /// Exchange an authorization code on this endpoint.
    ///
    /// The response shape differs per provider (Strava includes the
    /// athlete object), so the caller supplies the target type. Failures
    /// here are in the primary connect path and surface as upstream
    /// errors.
    pub async fn exchange_code<T: for<'de> Deserialize<'de>>(
        &self,
        http: &reqwest::Client,
        code: &str,
        redirect_uri: Option<&str>,
    ) -> Result<T, AppError> {
        let mut form = vec![
            ("grant_type".to_string(), "authorization_code".to_string()),
            ("code".to_string(), code.to_string()),
        ];
        if let Some(uri) = redirect_uri {
            form.push(("redirect_uri".to_string(), uri.to_string()));
        }

        let request = http.post(&self.url).timeout(self.timeout);
        let request = match self.auth {
            AuthScheme::FormBody => {
                form.push(("client_id".to_string(), self.client_id.clone()));
                form.push(("client_secret".to_string(), self.client_secret.clone()));
                request.form(&form)
            }
            AuthScheme::BasicHeader => request
                .basic_auth(&self.client_id, Some(&self.client_secret))
                .form(&form),
        };

        let response = request
            .send()
            .await
            .map_err(|e| AppError::upstream_transport(self.provider, e))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            tracing::error!(
                provider = %self.provider,
                status,
                body = %body,
                "OAuth code exchange failed"
            );
            return Err(AppError::upstream_status(self.provider, status, body));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::upstream_transport(self.provider, e))
    }
}

/// Get a valid (non-expired) access token for the given user, refreshing
/// and persisting when needed.
///
/// The stored token is returned unchanged whenever `now < expires_at`
/// (strict, epoch seconds). Otherwise one refresh call runs and the new
/// credential is persisted before the token is returned. Concurrent
/// refreshes for the same user are tolerated: the store is last-writer-
/// wins and both callers end up with a usable token.
pub async fn ensure_valid_token(
    db: &FirestoreDb,
    http: &reqwest::Client,
    endpoint: &TokenEndpoint,
    user_id: &str,
) -> Result<String, AppError> {
    let credential = db
        .get_credential(endpoint.provider, user_id)
        .await?
        .ok_or(AppError::NotConnected(endpoint.provider))?;

    if credential.is_valid_at(epoch_seconds_now()) {
        return Ok(credential.access_token);
    }

    tracing::info!(
        user_id,
        provider = %endpoint.provider,
        "Access token expired, refreshing"
    );

    let grant = endpoint.refresh(http, &credential.refresh_token).await?;

    let updated = Credential {
        access_token: grant.access_token.clone(),
        // Retain the prior refresh token when the provider omits a new one
        refresh_token: grant
            .refresh_token
            .unwrap_or_else(|| credential.refresh_token.clone()),
        expires_at: grant.expires_at,
        ..credential
    };
    db.set_credential(endpoint.provider, &updated).await?;

    tracing::info!(user_id, provider = %endpoint.provider, "Token refreshed");
    Ok(grant.access_token)
}
