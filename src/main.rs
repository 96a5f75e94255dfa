// SPDX-License-Identifier: MIT

//! StrideTunes API Server
//!
//! Links Strava and Spotify accounts and annotates workouts with the
//! songs that were playing during them.

use std::sync::Arc;
use stridetunes::{
    config::Config,
    db::FirestoreDb,
    services::{SpotifyService, StravaService},
    AppState,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging
    init_logging();

    // Load configuration from environment
    let config = Config::from_env().expect("Failed to load configuration");
    tracing::info!(port = config.port, "Starting StrideTunes API");

    // Initialize Firestore database
    let db = FirestoreDb::new(&config.gcp_project_id)
        .await
        .expect("Failed to connect to Firestore");

    // Initialize provider services
    let strava = StravaService::new(&config, db.clone());
    let spotify = SpotifyService::new(&config, db.clone());
    tracing::info!("Provider services initialized");

    // Build shared state
    let state = Arc::new(AppState {
        config: config.clone(),
        db,
        strava,
        spotify,
    });

    // Build router
    let app = stridetunes::routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize structured JSON logging.
fn init_logging() {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("stridetunes=debug".parse().unwrap())
                .add_directive("info".parse().unwrap()),
        )
        .with(format)
        .init();
}
