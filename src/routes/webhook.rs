// SPDX-License-Identifier: MIT

//! Webhook routes for Strava events.

use crate::services::{WebhookEvent, WebhookOutcome, WebhookProcessor};
use crate::AppState;
use axum::{
    extract::{Json, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Webhook routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/webhook/strava", get(verify).post(handle_event))
}

/// Strava webhook verification query params.
#[derive(Deserialize)]
struct VerifyParams {
    #[serde(rename = "hub.mode")]
    mode: String,
    #[serde(rename = "hub.challenge")]
    challenge: String,
    #[serde(rename = "hub.verify_token")]
    verify_token: String,
}

/// Verification response.
#[derive(Serialize, Default)]
struct VerifyResponse {
    #[serde(rename = "hub.challenge")]
    challenge: String,
}

/// Verify webhook subscription (GET): echo the challenge when the mode
/// and verify token match, 400 otherwise.
async fn verify(
    State(state): State<Arc<AppState>>,
    Query(params): Query<VerifyParams>,
) -> impl IntoResponse {
    if params.mode == "subscribe" && params.verify_token == state.config.webhook_verify_token {
        tracing::info!("Webhook subscription verified");
        (
            StatusCode::OK,
            axum::Json(VerifyResponse {
                challenge: params.challenge,
            }),
        )
    } else {
        tracing::warn!(
            mode = %params.mode,
            "Webhook verification failed: invalid token"
        );
        (StatusCode::BAD_REQUEST, axum::Json(VerifyResponse::default()))
    }
}

/// Event acknowledgement body.
#[derive(Serialize)]
struct EventResponse {
    status: &'static str,
}

/// Handle incoming webhook events (POST).
///
/// Response-code contract with Strava: 2xx acknowledges and stops
/// delivery; non-2xx triggers upstream retry. Events that retrying
/// cannot fix (unparseable, wrong type, unknown owner) are acknowledged;
/// genuine processing failures for activity-creation events surface as
/// non-2xx so the retry becomes the recovery path.
async fn handle_event(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<serde_json::Value>,
) -> Response {
    tracing::info!(payload = %payload, "Webhook event received");

    let event: WebhookEvent = match serde_json::from_value(payload) {
        Ok(e) => e,
        Err(e) => {
            tracing::error!(error = %e, "Failed to parse webhook event");
            // Still acknowledge; a retry would deliver the same bytes.
            return (StatusCode::OK, axum::Json(EventResponse { status: "ignored" }))
                .into_response();
        }
    };

    let processor = WebhookProcessor::new(
        state.db.clone(),
        state.strava.clone(),
        state.spotify.clone(),
    );

    match processor.process(&event).await {
        Ok(outcome) => {
            let status = match outcome {
                WebhookOutcome::DescriptionUpdated { .. } => "updated",
                WebhookOutcome::NoMatches { .. } => "no_matches",
                WebhookOutcome::Ignored => "ignored",
                WebhookOutcome::UserNotFound { .. } => "user_not_found",
                WebhookOutcome::AmbiguousOwner { .. } => "ambiguous_owner",
            };
            (StatusCode::OK, axum::Json(EventResponse { status })).into_response()
        }
        Err(e) => {
            tracing::error!(
                object_id = event.object_id,
                owner_id = event.owner_id,
                error = %e,
                "Webhook processing failed"
            );
            e.into_response()
        }
    }
}
