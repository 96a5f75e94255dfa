// SPDX-License-Identifier: MIT

//! Shared test harness: in-memory database, app construction, and a
//! local mock server standing in for the Strava and Spotify APIs.

use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
    routing::{get, post},
    Router,
};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU16, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use stridetunes::config::Config;
use stridetunes::db::FirestoreDb;
use stridetunes::middleware::auth::create_jwt;
use stridetunes::models::{Credential, Provider};
use stridetunes::routes::create_router;
use stridetunes::services::{SpotifyService, StravaService};
use stridetunes::AppState;

/// Call counters and canned responses for the mock upstream.
pub struct MockUpstream {
    pub strava_token_calls: AtomicUsize,
    pub spotify_token_calls: AtomicUsize,
    pub activity_list_calls: AtomicUsize,
    pub activity_detail_calls: AtomicUsize,
    pub recently_played_calls: AtomicUsize,
    pub deauthorize_calls: AtomicUsize,
    pub subscription_creates: AtomicUsize,
    pub subscription_deletes: AtomicUsize,
    /// (activity id, description) pairs written via PUT.
    pub description_updates: Mutex<Vec<(u64, String)>>,

    pub strava_token_status: AtomicU16,
    pub spotify_token_status: AtomicU16,
    pub activity_detail_status: AtomicU16,
    pub recently_played_status: AtomicU16,

    pub strava_token_body: Mutex<Value>,
    pub spotify_token_body: Mutex<Value>,
    pub activity_list_body: Mutex<Value>,
    pub activity_detail_body: Mutex<Value>,
    pub recently_played_body: Mutex<Value>,
}

impl Default for MockUpstream {
    fn default() -> Self {
        let now = chrono::Utc::now().timestamp();
        Self {
            strava_token_calls: AtomicUsize::new(0),
            spotify_token_calls: AtomicUsize::new(0),
            activity_list_calls: AtomicUsize::new(0),
            activity_detail_calls: AtomicUsize::new(0),
            recently_played_calls: AtomicUsize::new(0),
            deauthorize_calls: AtomicUsize::new(0),
            subscription_creates: AtomicUsize::new(0),
            subscription_deletes: AtomicUsize::new(0),
            description_updates: Mutex::new(Vec::new()),

            strava_token_status: AtomicU16::new(200),
            spotify_token_status: AtomicU16::new(200),
            activity_detail_status: AtomicU16::new(200),
            recently_played_status: AtomicU16::new(200),

            strava_token_body: Mutex::new(json!({
                "access_token": "strava-fresh",
                "refresh_token": "strava-refresh-2",
                "expires_at": now + 3600,
                "athlete": { "id": 42, "username": "runner" }
            })),
            spotify_token_body: Mutex::new(json!({
                "access_token": "spotify-fresh",
                "refresh_token": "spotify-refresh-2",
                "expires_in": 3600
            })),
            activity_list_body: Mutex::new(json!([])),
            activity_detail_body: Mutex::new(json!({
                "id": 1001,
                "name": "Morning Run",
                "sport_type": "Run",
                "start_date": "2024-06-01T09:00:00Z",
                "elapsed_time": 600,
                "distance": 2500.0,
                "description": null
            })),
            recently_played_body: Mutex::new(json!({ "items": [] })),
        }
    }
}

impl MockUpstream {
    pub fn total_calls(&self) -> usize {
        self.strava_token_calls.load(Ordering::SeqCst)
            + self.spotify_token_calls.load(Ordering::SeqCst)
            + self.activity_list_calls.load(Ordering::SeqCst)
            + self.activity_detail_calls.load(Ordering::SeqCst)
            + self.recently_played_calls.load(Ordering::SeqCst)
            + self.deauthorize_calls.load(Ordering::SeqCst)
            + self.subscription_creates.load(Ordering::SeqCst)
            + self.subscription_deletes.load(Ordering::SeqCst)
    }
}

fn canned(status: &AtomicU16, body: &Mutex<Value>) -> (StatusCode, Json<Value>) {
    let code = StatusCode::from_u16(status.load(Ordering::SeqCst)).unwrap();
    let value = body.lock().unwrap().clone();
    (code, Json(value))
}

/// Serve mock Strava + Spotify endpoints on an ephemeral local port.
/// Returns the shared state and the base URL.
pub async fn spawn_mock_upstream() -> (Arc<MockUpstream>, String) {
    let mock = Arc::new(MockUpstream::default());

    let router = Router::new()
        // Strava OAuth
        .route(
            "/oauth/token",
            post(|State(m): State<Arc<MockUpstream>>| async move {
                m.strava_token_calls.fetch_add(1, Ordering::SeqCst);
                canned(&m.strava_token_status, &m.strava_token_body)
            }),
        )
        .route(
            "/oauth/deauthorize",
            post(|State(m): State<Arc<MockUpstream>>| async move {
                m.deauthorize_calls.fetch_add(1, Ordering::SeqCst);
                StatusCode::OK
            }),
        )
        // Strava API
        .route(
            "/api/v3/athlete/activities",
            get(|State(m): State<Arc<MockUpstream>>| async move {
                m.activity_list_calls.fetch_add(1, Ordering::SeqCst);
                (StatusCode::OK, Json(m.activity_list_body.lock().unwrap().clone()))
            }),
        )
        .route(
            "/api/v3/activities/{id}",
            get(
                |State(m): State<Arc<MockUpstream>>, Path(_id): Path<u64>| async move {
                    m.activity_detail_calls.fetch_add(1, Ordering::SeqCst);
                    canned(&m.activity_detail_status, &m.activity_detail_body)
                },
            )
            .put(
                |State(m): State<Arc<MockUpstream>>,
                 Path(id): Path<u64>,
                 Json(body): Json<Value>| async move {
                    let description = body["description"].as_str().unwrap_or("").to_string();
                    m.description_updates.lock().unwrap().push((id, description));
                    StatusCode::OK
                },
            ),
        )
        .route(
            "/api/v3/athlete",
            get(|| async { Json(json!({ "id": 42, "username": "runner" })) }),
        )
        .route(
            "/api/v3/push_subscriptions",
            post(|State(m): State<Arc<MockUpstream>>| async move {
                m.subscription_creates.fetch_add(1, Ordering::SeqCst);
                (StatusCode::OK, Json(json!({ "id": 7001 })))
            }),
        )
        .route(
            "/api/v3/push_subscriptions/{id}",
            axum::routing::delete(
                |State(m): State<Arc<MockUpstream>>, Path(_id): Path<u64>| async move {
                    m.subscription_deletes.fetch_add(1, Ordering::SeqCst);
                    StatusCode::OK
                },
            ),
        )
        // Spotify accounts + API
        .route(
            "/api/token",
            post(|State(m): State<Arc<MockUpstream>>| async move {
                m.spotify_token_calls.fetch_add(1, Ordering::SeqCst);
                canned(&m.spotify_token_status, &m.spotify_token_body)
            }),
        )
        .route(
            "/v1/me/player/recently-played",
            get(|State(m): State<Arc<MockUpstream>>| async move {
                m.recently_played_calls.fetch_add(1, Ordering::SeqCst);
                canned(&m.recently_played_status, &m.recently_played_body)
            }),
        )
        .route(
            "/v1/me",
            get(|| async {
                Json(json!({
                    "id": "listener",
                    "display_name": "Listener",
                    "external_urls": { "spotify": "https://open.spotify.com/user/listener" }
                }))
            }),
        )
        .with_state(mock.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind mock upstream");
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    (mock, format!("http://{}", addr))
}

/// Config pointing every provider base URL at the mock upstream.
pub fn test_config(upstream_base: &str) -> Config {
    let mut config = Config::test_default();
    config.strava_api_base = format!("{}/api/v3", upstream_base);
    config.strava_oauth_base = upstream_base.to_string();
    config.spotify_api_base = format!("{}/v1", upstream_base);
    config.spotify_accounts_base = upstream_base.to_string();
    config
}

/// Create a test app over an in-memory store and the given config.
/// Returns the router and the shared state.
pub fn create_test_app(config: Config) -> (axum::Router, Arc<AppState>) {
    let db = FirestoreDb::new_memory();
    let strava = StravaService::new(&config, db.clone());
    let spotify = SpotifyService::new(&config, db.clone());

    let state = Arc::new(AppState {
        config,
        db,
        strava,
        spotify,
    });

    (create_router(state.clone()), state)
}

/// Bearer header value for an authenticated test user.
pub fn bearer(state: &AppState, user_id: &str) -> String {
    let jwt = create_jwt(user_id, &state.config.jwt_signing_key).unwrap();
    format!("Bearer {}", jwt)
}

/// Seed a Strava credential.
#[allow(dead_code)]
pub async fn seed_strava(state: &AppState, user_id: &str, athlete_id: u64, expires_at: i64) {
    let credential = Credential {
        user_id: user_id.to_string(),
        access_token: "strava-access".to_string(),
        refresh_token: "strava-refresh".to_string(),
        expires_at,
        athlete_id: Some(athlete_id),
        webhook_subscription_id: None,
    };
    state
        .db
        .set_credential(Provider::Strava, &credential)
        .await
        .unwrap();
}

/// Seed a Spotify credential.
#[allow(dead_code)]
pub async fn seed_spotify(state: &AppState, user_id: &str, expires_at: i64) {
    let credential = Credential {
        user_id: user_id.to_string(),
        access_token: "spotify-access".to_string(),
        refresh_token: "spotify-refresh".to_string(),
        expires_at,
        athlete_id: None,
        webhook_subscription_id: None,
    };
    state
        .db
        .set_credential(Provider::Spotify, &credential)
        .await
        .unwrap();
}

/// Epoch seconds helper.
#[allow(dead_code)]
pub fn now() -> i64 {
    chrono::Utc::now().timestamp()
}
