//! Application configuration loaded from environment variables.
//!
//! Provider base URLs are configurable so integration tests can point
//! the API clients at local mock servers.

use std::env;

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    // --- OAuth application credentials ---
    /// Strava OAuth client ID (public)
    pub strava_client_id: String,
    /// Strava OAuth client secret
    pub strava_client_secret: String,
    /// Spotify OAuth client ID (public)
    pub spotify_client_id: String,
    /// Spotify OAuth client secret
    pub spotify_client_secret: String,

    // --- Service identity ---
    /// Frontend URL for OAuth redirects
    pub frontend_url: String,
    /// Public base URL of this API (callback and webhook URLs are built
    /// from it)
    pub public_url: String,
    /// GCP project ID (Firestore)
    pub gcp_project_id: String,
    /// Server port
    pub port: u16,

    // --- Secrets ---
    /// JWT signing key for session tokens (raw bytes)
    pub jwt_signing_key: Vec<u8>,
    /// HMAC key for signing OAuth state values
    pub oauth_state_key: Vec<u8>,
    /// Strava webhook verification token
    pub webhook_verify_token: String,

    // --- Upstream endpoints ---
    /// Strava REST API base (default `https://www.strava.com/api/v3`)
    pub strava_api_base: String,
    /// Strava OAuth base (default `https://www.strava.com`)
    pub strava_oauth_base: String,
    /// Spotify REST API base (default `https://api.spotify.com/v1`)
    pub spotify_api_base: String,
    /// Spotify accounts base (default `https://accounts.spotify.com`)
    pub spotify_accounts_base: String,
    /// Timeout applied to every outbound provider call, in seconds
    pub upstream_timeout_secs: u64,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        Ok(Self {
            strava_client_id: env::var("STRAVA_CLIENT_ID")
                .map_err(|_| ConfigError::Missing("STRAVA_CLIENT_ID"))?,
            strava_client_secret: env::var("STRAVA_CLIENT_SECRET")
                .map(|v| v.trim().to_string())
                .map_err(|_| ConfigError::Missing("STRAVA_CLIENT_SECRET"))?,
            spotify_client_id: env::var("SPOTIFY_CLIENT_ID")
                .map_err(|_| ConfigError::Missing("SPOTIFY_CLIENT_ID"))?,
            spotify_client_secret: env::var("SPOTIFY_CLIENT_SECRET")
                .map(|v| v.trim().to_string())
                .map_err(|_| ConfigError::Missing("SPOTIFY_CLIENT_SECRET"))?,

            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),
            public_url: env::var("PUBLIC_URL")
                .unwrap_or_else(|_| "http://localhost:8080".to_string()),
            gcp_project_id: env::var("GCP_PROJECT_ID").unwrap_or_else(|_| "local-dev".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .unwrap_or(8080),

            jwt_signing_key: env::var("JWT_SIGNING_KEY")
                .map_err(|_| ConfigError::Missing("JWT_SIGNING_KEY"))?
                .into_bytes(),
            oauth_state_key: env::var("OAUTH_STATE_KEY")
                .map_err(|_| ConfigError::Missing("OAUTH_STATE_KEY"))?
                .into_bytes(),
            webhook_verify_token: env::var("WEBHOOK_VERIFY_TOKEN")
                .map(|v| v.trim().to_string())
                .map_err(|_| ConfigError::Missing("WEBHOOK_VERIFY_TOKEN"))?,

            strava_api_base: env::var("STRAVA_API_BASE")
                .unwrap_or_else(|_| "https://www.strava.com/api/v3".to_string()),
            strava_oauth_base: env::var("STRAVA_OAUTH_BASE")
                .unwrap_or_else(|_| "https://www.strava.com".to_string()),
            spotify_api_base: env::var("SPOTIFY_API_BASE")
                .unwrap_or_else(|_| "https://api.spotify.com/v1".to_string()),
            spotify_accounts_base: env::var("SPOTIFY_ACCOUNTS_BASE")
                .unwrap_or_else(|_| "https://accounts.spotify.com".to_string()),
            upstream_timeout_secs: env::var("UPSTREAM_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(10),
        })
    }

    /// Default config for testing only.
    pub fn test_default() -> Self {
        Self {
            strava_client_id: "test_strava_id".to_string(),
            strava_client_secret: "test_strava_secret".to_string(),
            spotify_client_id: "test_spotify_id".to_string(),
            spotify_client_secret: "test_spotify_secret".to_string(),
            frontend_url: "http://localhost:5173".to_string(),
            public_url: "http://localhost:8080".to_string(),
            gcp_project_id: "test-project".to_string(),
            port: 8080,
            jwt_signing_key: b"test_jwt_key_32_bytes_minimum!!".to_vec(),
            oauth_state_key: b"test_oauth_state_key".to_vec(),
            webhook_verify_token: "test_verify_token".to_string(),
            strava_api_base: "http://127.0.0.1:1/api/v3".to_string(),
            strava_oauth_base: "http://127.0.0.1:1".to_string(),
            spotify_api_base: "http://127.0.0.1:1/v1".to_string(),
            spotify_accounts_base: "http://127.0.0.1:1".to_string(),
            upstream_timeout_secs: 2,
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_from_env() {
        // Set required env vars for test
        env::set_var("STRAVA_CLIENT_ID", "test_id");
        env::set_var("STRAVA_CLIENT_SECRET", "test_secret");
        env::set_var("SPOTIFY_CLIENT_ID", "sp_id");
        env::set_var("SPOTIFY_CLIENT_SECRET", "sp_secret");
        env::set_var("JWT_SIGNING_KEY", "test_jwt_key_32_bytes_minimum!!");
        env::set_var("OAUTH_STATE_KEY", "test_state_key");
        env::set_var("WEBHOOK_VERIFY_TOKEN", "test_verify");

        let config = Config::from_env().expect("Config should load");

        assert_eq!(config.strava_client_id, "test_id");
        assert_eq!(config.spotify_client_id, "sp_id");
        assert_eq!(config.port, 8080);
        assert_eq!(config.upstream_timeout_secs, 10);
        assert_eq!(config.strava_api_base, "https://www.strava.com/api/v3");
    }
}
