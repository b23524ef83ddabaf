//! Integration tests for the Spotify client
//!
//! Runs the client against a local axum stub of the Web API to check token
//! caching, paging and status mapping.

use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use mashup_engine::services::SpotifyClient;
use mashup_engine::types::{SectionFetcher, SourceResolver, SourceType};
use mashup_engine::ServiceError;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::num::NonZeroU32;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio::net::TcpListener;

/// Behaviour switches and request counters shared with the handlers
#[derive(Default)]
struct StubState {
    base_url: OnceLock<String>,
    reject_credentials: bool,
    reject_first_analysis: bool,
    token_requests: AtomicUsize,
    analysis_requests: AtomicUsize,
    album_requests: AtomicUsize,
}

type SharedState = Arc<StubState>;

async fn token(State(state): State<SharedState>) -> Response {
    state.token_requests.fetch_add(1, Ordering::SeqCst);
    if state.reject_credentials {
        return (StatusCode::BAD_REQUEST, Json(json!({"error": "invalid_client"}))).into_response();
    }
    Json(json!({"access_token": "tok", "token_type": "Bearer", "expires_in": 3600}))
        .into_response()
}

async fn audio_analysis(State(state): State<SharedState>, Path(id): Path<String>) -> Response {
    let previous = state.analysis_requests.fetch_add(1, Ordering::SeqCst);
    if state.reject_first_analysis && previous == 0 {
        return (StatusCode::UNAUTHORIZED, Json(json!({"error": "expired"}))).into_response();
    }

    match id.as_str() {
        "missing" => (StatusCode::NOT_FOUND, Json(json!({"error": "nope"}))).into_response(),
        "busy" => (
            StatusCode::TOO_MANY_REQUESTS,
            [(header::RETRY_AFTER, "7")],
            Json(json!({})),
        )
            .into_response(),
        "broken" => (StatusCode::INTERNAL_SERVER_ERROR, "boom").into_response(),
        _ => Json(analysis()).into_response(),
    }
}

async fn album_tracks(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Json<Value> {
    state.album_requests.fetch_add(1, Ordering::SeqCst);
    let base_url = state.base_url.get().cloned().unwrap_or_default();

    match params.get("offset").map(String::as_str) {
        Some("0") | None => Json(json!({
            "items": [{"id": "t1"}, {"id": "t2"}],
            "next": format!("{}/v1/albums/{}/tracks?limit=50&offset=50", base_url, id),
        })),
        _ => Json(json!({"items": [{"id": "t3"}, null], "next": null})),
    }
}

async fn playlist_tracks() -> Json<Value> {
    Json(json!({
        "items": [
            {"track": {"id": "p1"}},
            {"track": null},
            {"track": {"id": null}},
            {"track": {"id": "p2"}}
        ],
        "next": null
    }))
}

fn analysis() -> Value {
    json!({
        "sections": [
            {"start": 0.0, "duration": 12.5, "loudness": -7.5, "tempo": 128.0,
             "key": 9, "mode": 1, "time_signature": 4},
            {"start": 12.5, "duration": 30.0, "loudness": -6.0, "tempo": 127.5,
             "key": 9, "mode": 1, "time_signature": 4}
        ]
    })
}

/// Serve the stub on an ephemeral port and return a client pointed at it
async fn start_stub(state: StubState) -> (SharedState, SpotifyClient) {
    let state = Arc::new(state);
    let router = Router::new()
        .route("/api/token", post(token))
        .route("/v1/audio-analysis/:id", get(audio_analysis))
        .route("/v1/albums/:id/tracks", get(album_tracks))
        .route("/v1/playlists/:id/tracks", get(playlist_tracks))
        .with_state(state.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base_url = format!("http://{}", listener.local_addr().unwrap());
    state.base_url.set(base_url.clone()).unwrap();

    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    let client = SpotifyClient::new(
        "client".to_string(),
        "secret".to_string(),
        format!("{}/v1", base_url),
        format!("{}/api/token", base_url),
        NonZeroU32::new(100).unwrap(),
        Duration::from_secs(5),
    )
    .unwrap();

    (state, client)
}

#[tokio::test]
async fn test_token_is_cached_across_requests() {
    let (state, client) = start_stub(StubState::default()).await;

    let first = client.fetch_sections("t1").await.unwrap();
    client.fetch_sections("t2").await.unwrap();

    assert_eq!(first.len(), 2);
    assert_eq!(first[1].start_ms, 12_500);
    assert_eq!(first[1].end_ms, 42_500);
    assert_eq!(state.token_requests.load(Ordering::SeqCst), 1);
    assert_eq!(state.analysis_requests.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_album_listing_follows_next_links() {
    let (state, client) = start_stub(StubState::default()).await;

    let track_ids = client.resolve("alb", SourceType::Album).await.unwrap();

    assert_eq!(track_ids, vec!["t1", "t2", "t3"]);
    assert_eq!(state.album_requests.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_playlist_skips_local_and_removed_tracks() {
    let (_state, client) = start_stub(StubState::default()).await;

    let track_ids = client.resolve("pl", SourceType::Playlist).await.unwrap();
    assert_eq!(track_ids, vec!["p1", "p2"]);
}

#[tokio::test]
async fn test_status_mapping() {
    let (_state, client) = start_stub(StubState::default()).await;

    assert!(matches!(
        client.fetch_sections("missing").await,
        Err(ServiceError::NotFound(_))
    ));
    assert!(matches!(
        client.fetch_sections("busy").await,
        Err(ServiceError::RateLimited {
            retry_after_secs: Some(7)
        })
    ));
    assert!(matches!(
        client.fetch_sections("broken").await,
        Err(ServiceError::ApiError(500, _))
    ));
}

#[tokio::test]
async fn test_rejected_token_is_refetched() {
    let (state, client) = start_stub(StubState {
        reject_first_analysis: true,
        ..StubState::default()
    })
    .await;

    assert!(matches!(
        client.fetch_sections("t1").await,
        Err(ServiceError::AuthError(_))
    ));
    client.fetch_sections("t1").await.unwrap();
    assert_eq!(state.token_requests.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_bad_credentials_are_auth_error() {
    let (state, client) = start_stub(StubState {
        reject_credentials: true,
        ..StubState::default()
    })
    .await;

    let err = client.resolve("alb", SourceType::Album).await.unwrap_err();
    assert!(matches!(err, ServiceError::AuthError(_)));
    assert_eq!(state.album_requests.load(Ordering::SeqCst), 0);
}
