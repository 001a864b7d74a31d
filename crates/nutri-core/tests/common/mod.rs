//! In-process Gemini stand-in bound to an ephemeral port.

#![allow(dead_code)]

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use nutri_core::{
    ConfigHandle, ConfigResolver, CredentialStore, Environment, MemoryKv, ResolverOptions,
};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const VALID_KEY: &str = "AIzaSyTestKey_0123456789abcdefghijkl";

/// What the stub answers to `generateContent`.
#[derive(Clone)]
pub enum Reply {
    Text(String),
    Status(u16),
    Body(String),
}

#[derive(Clone)]
struct StubState {
    reply: Reply,
    /// Prompts containing this marker are answered after `slow_delay`.
    slow_marker: Option<String>,
    slow_delay: Duration,
    events: Arc<Mutex<Vec<String>>>,
}

pub struct GeminiStub {
    pub base: String,
    pub events: Arc<Mutex<Vec<String>>>,
}

impl GeminiStub {
    pub async fn start(reply: Reply) -> Self {
        Self::start_with(reply, None, Duration::ZERO).await
    }

    pub async fn start_with(reply: Reply, slow_marker: Option<&str>, slow_delay: Duration) -> Self {
        let events = Arc::new(Mutex::new(Vec::new()));
        let state = StubState {
            reply,
            slow_marker: slow_marker.map(str::to_string),
            slow_delay,
            events: events.clone(),
        };
        let app = Router::new()
            .route("/v1beta/models", get(list_models))
            .route("/v1beta/models/:action", post(generate))
            .with_state(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        Self {
            base: format!("http://{}", addr),
            events,
        }
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }
}

fn api_key(headers: &HeaderMap) -> Option<&str> {
    headers.get("x-goog-api-key").and_then(|v| v.to_str().ok())
}

async fn list_models(headers: HeaderMap) -> StatusCode {
    if api_key(&headers) == Some(VALID_KEY) {
        StatusCode::OK
    } else {
        StatusCode::BAD_REQUEST
    }
}

async fn generate(
    State(state): State<StubState>,
    Path(action): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if !action.ends_with(":generateContent") {
        return StatusCode::NOT_FOUND.into_response();
    }
    if api_key(&headers).is_none() {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    let prompt = body["contents"][0]["parts"][0]["text"]
        .as_str()
        .unwrap_or_default()
        .to_string();
    let label = prompt
        .split("Pergunta: ")
        .nth(1)
        .and_then(|rest| rest.lines().next())
        .unwrap_or("plan")
        .to_string();

    state.events.lock().unwrap().push(format!("start:{}", label));
    if let Some(marker) = &state.slow_marker {
        if prompt.contains(marker.as_str()) {
            tokio::time::sleep(state.slow_delay).await;
        }
    }
    state.events.lock().unwrap().push(format!("end:{}", label));

    match state.reply {
        Reply::Text(text) => Json(json!({
            "candidates": [{ "content": { "parts": [{ "text": text }] } }]
        }))
        .into_response(),
        Reply::Status(code) => (
            StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            "upstream exploded",
        )
            .into_response(),
        Reply::Body(raw) => ([("content-type", "application/json")], raw).into_response(),
    }
}

/// Handle whose AI key comes from the environment and whose probes hit `base`.
pub fn handle_for(base: &str, env: Environment) -> ConfigHandle {
    let options = ResolverOptions {
        gemini_api_base: base.to_string(),
        database_probe_delay: Duration::from_millis(10),
        ..ResolverOptions::default()
    };
    let store = CredentialStore::new(Arc::new(MemoryKv::new()));
    ConfigHandle::new(ConfigResolver::new(env, store, options))
}

pub fn env_with_key() -> Environment {
    Environment::from_pairs([("GEMINI_API_KEY", VALID_KEY)])
}
