// SPDX-License-Identifier: MIT

//! StrideTunes: annotate workouts with the songs playing during them.
//!
//! This crate provides the backend API that links a user's Strava and
//! Spotify accounts, correlates listening history with activity time
//! windows, and writes song lists back to activity descriptions.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

use config::Config;
use db::FirestoreDb;
use services::{SpotifyService, StravaService};

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub db: FirestoreDb,
    pub strava: StravaService,
    pub spotify: SpotifyService,
}
