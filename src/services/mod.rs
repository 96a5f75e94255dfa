// SPDX-License-Identifier: MIT

//! Services module - business logic layer.

pub mod matcher;
pub mod oauth;
pub mod spotify;
pub mod strava;
pub mod webhook;

pub use spotify::SpotifyService;
pub use strava::StravaService;
pub use webhook::{WebhookEvent, WebhookOutcome, WebhookProcessor};
