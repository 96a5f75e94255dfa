// SPDX-License-Identifier: MIT

//! Integration tests for the authenticated API surface.

mod common;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use serde_json::json;
use tower::ServiceExt;

fn get(uri: &str, auth: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(value) = auth {
        builder = builder.header(header::AUTHORIZATION, value);
    }
    builder.body(Body::empty()).unwrap()
}

async fn json_body(response: axum::response::Response) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

#[tokio::test]
async fn test_activities_requires_auth() {
    let (_, base) = common::spawn_mock_upstream().await;
    let (app, _) = common::create_test_app(common::test_config(&base));

    let response = app.oneshot(get("/api/activities", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_activities_rejects_bad_token() {
    let (_, base) = common::spawn_mock_upstream().await;
    let (app, _) = common::create_test_app(common::test_config(&base));

    let response = app
        .oneshot(get("/api/activities", Some("Bearer not-a-jwt")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_activities_without_strava_connection() {
    let (_, base) = common::spawn_mock_upstream().await;
    let (app, state) = common::create_test_app(common::test_config(&base));

    let response = app
        .oneshot(get("/api/activities", Some(&common::bearer(&state, "u1"))))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["error"], "not_connected");
}

#[tokio::test]
async fn test_activities_with_songs() {
    let (mock, base) = common::spawn_mock_upstream().await;
    let (app, state) = common::create_test_app(common::test_config(&base));

    let now = common::now();
    common::seed_strava(&state, "u1", 42, now + 3600).await;
    common::seed_spotify(&state, "u1", now + 3600).await;

    // One activity at 09:00 for 10 minutes, one at 07:00 for 5 minutes.
    *mock.activity_list_body.lock().unwrap() = json!([
        {
            "id": 1,
            "name": "Morning Run",
            "sport_type": "Run",
            "start_date": "2024-06-01T09:00:00Z",
            "elapsed_time": 600,
            "distance": 2500.0
        },
        {
            "id": 2,
            "name": "Dawn Patrol",
            "sport_type": "Ride",
            "start_date": "2024-06-01T07:00:00Z",
            "elapsed_time": 300,
            "distance": 8000.0
        }
    ]);

    // One play inside the first activity's window, none in the second's.
    *mock.recently_played_body.lock().unwrap() = json!({
        "items": [
            {
                "track": {
                    "name": "Run Boy Run",
                    "artists": [{ "name": "Woodkid" }],
                    "album": { "name": "The Golden Age", "images": [{ "url": "http://img/1" }] },
                    "duration_ms": 212000
                },
                "played_at": "2024-06-01T09:02:00Z"
            },
            {
                "track": {
                    "name": "Night Owl",
                    "artists": [{ "name": "Gerry Rafferty" }],
                    "album": { "name": "Night Owl", "images": [] },
                    "duration_ms": 230000
                },
                "played_at": "2024-06-01T06:00:00Z"
            }
        ]
    });

    let response = app
        .oneshot(get("/api/activities", Some(&common::bearer(&state, "u1"))))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;

    let activities = body["activities"].as_array().unwrap();
    assert_eq!(activities.len(), 2);

    assert_eq!(activities[0]["name"], "Morning Run");
    let songs = activities[0]["songs"].as_array().unwrap();
    assert_eq!(songs.len(), 1);
    assert_eq!(songs[0]["name"], "Run Boy Run");
    assert_eq!(songs[0]["artists"][0], "Woodkid");

    // Evaluated with nothing in the window: empty list, not null.
    assert_eq!(activities[1]["songs"], json!([]));
}

#[tokio::test]
async fn test_activities_without_spotify_have_null_songs() {
    let (mock, base) = common::spawn_mock_upstream().await;
    let (app, state) = common::create_test_app(common::test_config(&base));

    common::seed_strava(&state, "u1", 42, common::now() + 3600).await;

    *mock.activity_list_body.lock().unwrap() = json!([
        {
            "id": 1,
            "name": "Morning Run",
            "sport_type": "Run",
            "start_date": "2024-06-01T09:00:00Z",
            "elapsed_time": 600,
            "distance": 2500.0
        }
    ]);

    let response = app
        .oneshot(get("/api/activities", Some(&common::bearer(&state, "u1"))))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;

    // Never evaluated: null, distinguishable from "no matches".
    assert!(body["activities"][0]["songs"].is_null());
}

#[tokio::test]
async fn test_song_lookup_failure_degrades_to_null() {
    let (mock, base) = common::spawn_mock_upstream().await;
    let (app, state) = common::create_test_app(common::test_config(&base));

    let now = common::now();
    common::seed_strava(&state, "u1", 42, now + 3600).await;
    common::seed_spotify(&state, "u1", now + 3600).await;

    *mock.activity_list_body.lock().unwrap() = json!([
        {
            "id": 1,
            "name": "Morning Run",
            "sport_type": "Run",
            "start_date": "2024-06-01T09:00:00Z",
            "elapsed_time": 600,
            "distance": 2500.0
        }
    ]);
    mock.recently_played_status
        .store(503, std::sync::atomic::Ordering::SeqCst);

    let response = app
        .oneshot(get("/api/activities", Some(&common::bearer(&state, "u1"))))
        .await
        .unwrap();

    // The activity list still succeeds; only the enrichment is lost.
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["activities"][0]["name"], "Morning Run");
    assert!(body["activities"][0]["songs"].is_null());
}

#[tokio::test]
async fn test_connection_status() {
    let (_, base) = common::spawn_mock_upstream().await;
    let (app, state) = common::create_test_app(common::test_config(&base));

    let auth = common::bearer(&state, "u1");

    let response = app
        .clone()
        .oneshot(get("/api/connections/strava", Some(&auth)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["connected"], false);

    common::seed_strava(&state, "u1", 42, common::now() + 3600).await;

    let response = app
        .oneshot(get("/api/connections/strava", Some(&auth)))
        .await
        .unwrap();
    assert_eq!(json_body(response).await["connected"], true);
}

#[tokio::test]
async fn test_unknown_service_rejected() {
    let (_, base) = common::spawn_mock_upstream().await;
    let (app, state) = common::create_test_app(common::test_config(&base));

    let response = app
        .oneshot(get(
            "/api/connections/soundcloud",
            Some(&common::bearer(&state, "u1")),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_disconnect_is_idempotent() {
    let (_, base) = common::spawn_mock_upstream().await;
    let (app, state) = common::create_test_app(common::test_config(&base));

    common::seed_spotify(&state, "u1", common::now() + 3600).await;
    let auth = common::bearer(&state, "u1");

    for _ in 0..2 {
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri("/api/connections/spotify")
                    .header(header::AUTHORIZATION, &auth)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["success"], true);
    }

    assert!(state
        .db
        .get_credential(stridetunes::models::Provider::Spotify, "u1")
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_connect_url_carries_signed_state() {
    let (_, base) = common::spawn_mock_upstream().await;
    let (app, state) = common::create_test_app(common::test_config(&base));

    let response = app
        .oneshot(get(
            "/api/auth/strava/url",
            Some(&common::bearer(&state, "u1")),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    let auth_url = body["auth_url"].as_str().unwrap();

    assert!(auth_url.contains("client_id=test_strava_id"));
    assert!(auth_url.contains("scope=activity:read_all,activity:write"));

    // The state parameter round-trips back to the issuing user.
    let state_param = auth_url
        .split("state=")
        .nth(1)
        .unwrap()
        .split('&')
        .next()
        .unwrap();
    assert_eq!(
        stridetunes::routes::auth::verify_state(state_param, &state.config.oauth_state_key),
        Some("u1".to_string())
    );
}

#[tokio::test]
async fn test_user_info_passthrough() {
    let (_, base) = common::spawn_mock_upstream().await;
    let (app, state) = common::create_test_app(common::test_config(&base));

    common::seed_strava(&state, "u1", 42, common::now() + 3600).await;

    let response = app
        .oneshot(get("/api/me/strava", Some(&common::bearer(&state, "u1"))))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["username"], "runner");
    assert_eq!(body["profile_url"], "https://www.strava.com/athletes/42");
}
