//! In-process stand-in for the Unsplash API, used by the tests of this crate.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};

/// Access key the fake API answers with 401.
pub const REVOKED_KEY: &str = "revoked";

pub const IMAGE_BYTES: &[u8] = b"\xFF\xD8\xFF\xE0not really a jpeg\xFF\xD9";

/// A well-formed `/photos/random` body for `id`.
pub fn photo_json(id: &str) -> Value {
    json!({
        "id": id,
        "urls": {
            "full": format!("https://images.unsplash.com/{id}?full"),
            "thumb": format!("https://images.unsplash.com/{id}?thumb"),
        },
        "user": { "name": "Ansel Adams" },
        "links": {
            "html": format!("https://unsplash.com/photos/{id}"),
            "download_location": format!("https://api.unsplash.com/photos/{id}/download"),
        },
    })
}

#[derive(Default)]
struct Recorded {
    last_authorization: Mutex<Option<String>>,
    tracked: AtomicUsize,
}

pub struct FakeApi {
    pub base_url: String,
    recorded: Arc<Recorded>,
}

impl FakeApi {
    pub async fn spawn() -> Self {
        let recorded = Arc::new(Recorded::default());
        let app = Router::new()
            .route("/photos/random", get(random_photo))
            .route("/broken/photos/random", get(broken_photo))
            .route("/photos/abc/download", get(track_download))
            .route("/images/full.jpg", get(image))
            .with_state(recorded.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url: format!("http://{addr}"),
            recorded,
        }
    }

    pub fn last_authorization(&self) -> Option<String> {
        self.recorded.last_authorization.lock().unwrap().clone()
    }

    pub fn tracked(&self) -> usize {
        self.recorded.tracked.load(Ordering::SeqCst)
    }
}

fn remember_authorization(recorded: &Recorded, headers: &HeaderMap) -> Option<String> {
    let value = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    *recorded.last_authorization.lock().unwrap() = value.clone();
    value
}

async fn random_photo(
    State(recorded): State<Arc<Recorded>>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let key = remember_authorization(&recorded, &headers)
        .and_then(|auth| auth.strip_prefix("Client-ID").map(|k| k.trim().to_string()));
    match key.as_deref() {
        None | Some("") | Some(REVOKED_KEY) => {
            return StatusCode::UNAUTHORIZED.into_response();
        }
        Some(_) => {}
    }
    if params.get("orientation").map(String::as_str) != Some("landscape") {
        return StatusCode::BAD_REQUEST.into_response();
    }

    let id = params.get("query").cloned().unwrap_or_else(|| "random".into());
    Json(photo_json(&id)).into_response()
}

async fn broken_photo() -> Json<Value> {
    Json(json!({ "id": "x", "urls": { "full": "https://images.unsplash.com/x" } }))
}

async fn track_download(
    State(recorded): State<Arc<Recorded>>,
    headers: HeaderMap,
) -> Json<Value> {
    remember_authorization(&recorded, &headers);
    recorded.tracked.fetch_add(1, Ordering::SeqCst);
    Json(json!({ "url": "https://images.unsplash.com/abc?ixid=tracked" }))
}

async fn image() -> &'static [u8] {
    IMAGE_BYTES
}
