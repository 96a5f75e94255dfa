// SPDX-License-Identifier: MIT

//! OAuth credential records, one per (user, provider) pair.

use serde::{Deserialize, Serialize};

/// The two upstream providers we integrate with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Strava,
    Spotify,
}

impl Provider {
    /// Firestore collection holding this provider's credentials.
    pub fn collection(&self) -> &'static str {
        match self {
            Provider::Strava => "strava",
            Provider::Spotify => "spotify",
        }
    }

    /// Parse from a URL path segment; `None` for anything else.
    pub fn from_path(s: &str) -> Option<Self> {
        match s {
            "strava" => Some(Provider::Strava),
            "spotify" => Some(Provider::Spotify),
            _ => None,
        }
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.collection())
    }
}

/// OAuth token set stored in Firestore, keyed by user id.
///
/// A credential exists iff the user has completed the OAuth exchange and
/// has not disconnected. `expires_at` is always absolute epoch seconds,
/// for both providers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credential {
    /// Owning user id (duplicates the document id, so webhook owner
    /// resolution can query by athlete_id and still recover the user).
    pub user_id: String,
    /// Bearer token for provider API calls; never stored empty.
    pub access_token: String,
    /// Used to mint new access tokens.
    pub refresh_token: String,
    /// Absolute expiry, epoch seconds.
    pub expires_at: i64,
    /// Strava athlete id; used to resolve inbound webhook events.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub athlete_id: Option<u64>,
    /// Strava push-subscription id, needed to unsubscribe at disconnect.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook_subscription_id: Option<u64>,
}

impl Credential {
    /// Whether the access token is still valid at `now` (epoch seconds).
    /// Strictly before expiry; at or past expiry means refresh.
    pub fn is_valid_at(&self, now: i64) -> bool {
        now < self.expires_at
    }
}
