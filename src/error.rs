// SPDX-License-Identifier: MIT

//! Application error types with consistent API responses.

use crate::models::Provider;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Application error type that converts to HTTP responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Authentication required")]
    Unauthenticated,

    #[error("{0} is not connected")]
    NotConnected(Provider),

    #[error("{provider} API error: {detail}")]
    Upstream {
        provider: Provider,
        /// HTTP status from the provider, if a response was received.
        status: Option<u16>,
        /// True when the request timed out before a response arrived.
        timeout: bool,
        detail: String,
    },

    #[error("Failed to refresh {0} token")]
    TokenRefresh(Provider),

    #[error("No user found for athlete {0}")]
    UserNotFound(u64),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Build an Upstream error from a reqwest transport failure.
    ///
    /// Timeouts are tagged so callers can distinguish them from
    /// connection-level failures.
    pub fn upstream_transport(provider: Provider, err: reqwest::Error) -> Self {
        AppError::Upstream {
            provider,
            status: None,
            timeout: err.is_timeout(),
            detail: err.to_string(),
        }
    }

    /// Build an Upstream error from a non-2xx provider response.
    pub fn upstream_status(provider: Provider, status: u16, body: String) -> Self {
        AppError::Upstream {
            provider,
            status: Some(status),
            timeout: false,
            detail: format!("HTTP {}: {}", status, body),
        }
    }
}

/// JSON error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, details) = match &self {
            AppError::Unauthenticated => (StatusCode::UNAUTHORIZED, "unauthenticated", None),
            AppError::NotConnected(provider) => (
                StatusCode::BAD_REQUEST,
                "not_connected",
                Some(format!("{} is not connected", provider)),
            ),
            AppError::Upstream {
                provider, detail, ..
            } => {
                tracing::error!(provider = %provider, detail = %detail, "Upstream error");
                (
                    StatusCode::BAD_GATEWAY,
                    "upstream_error",
                    Some(detail.clone()),
                )
            }
            // Refresh failures mean the stored grant is no longer usable;
            // the user has to reconnect, so this is user-actionable.
            AppError::TokenRefresh(provider) => (
                StatusCode::BAD_REQUEST,
                "reconnect_required",
                Some(format!("{} credentials expired, please reconnect", provider)),
            ),
            AppError::UserNotFound(athlete_id) => (
                StatusCode::NOT_FOUND,
                "user_not_found",
                Some(format!("No user for athlete {}", athlete_id)),
            ),
            AppError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, "bad_request", Some(msg.clone()))
            }
            AppError::Database(msg) => {
                tracing::error!(error = %msg, "Database error");
                (StatusCode::INTERNAL_SERVER_ERROR, "database_error", None)
            }
            AppError::Internal(err) => {
                tracing::error!(error = %err, "Internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", None)
            }
        };

        let body = ErrorResponse {
            error: error.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for handlers
pub type Result<T> = std::result::Result<T, AppError>;
