//! HTTP surface of the gateway.
//!
//! Service calls always answer 200 with a [`Served`] body, whichever path
//! produced it. Only configuration input can be refused (400).

use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{Request, StatusCode},
    middleware::Next,
    response::Response,
    routing::{get, post},
    Json, Router,
};
use nutri_core::{
    mask_secret, AiService, Capability, ChatReply, ChatRole, ChatTurn, ConfigHandle, ConfigStatus,
    ConversationRecord, DatabaseService, DietPlan, Served, Source, UserProfile, UserRecord,
    ValidationIssue,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

pub struct AppState {
    pub config: ConfigHandle,
    pub ai: AiService,
    pub db: DatabaseService,
}

type SharedState = State<Arc<AppState>>;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/config", get(get_config))
        .route("/api/config/reset", post(reset_config))
        .route("/api/config/:capability", post(configure))
        .route("/api/config/:capability/test", post(test_connection))
        .route("/api/chat", post(chat))
        .route("/api/diet-plans", post(create_diet_plan))
        .route("/api/users", post(save_user).get(find_user))
        .route("/api/users/:user_id/diet-plans", get(user_diet_plans))
        .route("/api/users/:user_id/conversations", get(user_conversations))
        .with_state(state)
        .layer(axum::middleware::from_fn(log_request))
}

async fn log_request(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let started = Instant::now();
    let response = next.run(request).await;
    tracing::info!(
        target: "nutri::gateway",
        "{} {} -> {} ({} ms)",
        method,
        path,
        response.status().as_u16(),
        started.elapsed().as_millis()
    );
    response
}

async fn health() -> &'static str {
    "OK"
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EntryView {
    /// Masked; the clear value never leaves the process. Always absent for
    /// the signing secret.
    value: Option<String>,
    is_configured: bool,
    source: Source,
}

#[derive(Serialize)]
struct ConfigView {
    status: ConfigStatus,
    entries: BTreeMap<Capability, EntryView>,
    issues: Vec<ValidationIssue>,
}

async fn config_view(config: &ConfigHandle) -> ConfigView {
    let snapshot = config.snapshot().await;
    let entries = snapshot
        .iter()
        .map(|(capability, entry)| {
            (
                *capability,
                EntryView {
                    value: match capability {
                        Capability::SigningSecret => None,
                        _ => entry.value.as_deref().map(mask_secret),
                    },
                    is_configured: entry.is_configured,
                    source: entry.source,
                },
            )
        })
        .collect();
    ConfigView {
        status: config.status().await,
        entries,
        issues: config.issues().await,
    }
}

async fn get_config(State(state): SharedState) -> Json<ConfigView> {
    Json(config_view(&state.config).await)
}

async fn reset_config(State(state): SharedState) -> Json<ConfigView> {
    state.config.reset().await;
    Json(config_view(&state.config).await)
}

#[derive(Deserialize)]
struct ConfigureRequest {
    value: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct Outcome {
    success: bool,
    message: String,
}

type OutcomeResponse = (StatusCode, Json<Outcome>);

fn outcome(status: StatusCode, success: bool, message: impl Into<String>) -> OutcomeResponse {
    (
        status,
        Json(Outcome {
            success,
            message: message.into(),
        }),
    )
}

fn parse_capability(raw: &str) -> Result<Capability, OutcomeResponse> {
    raw.parse::<Capability>().map_err(|_| {
        outcome(
            StatusCode::BAD_REQUEST,
            false,
            format!("Serviço desconhecido: {}", raw),
        )
    })
}

fn configured_message(capability: Capability) -> &'static str {
    match capability {
        Capability::Ai => "Gemini configurado com sucesso!",
        Capability::Database => "Banco de dados configurado com sucesso!",
        Capability::SigningSecret => "Segredo JWT configurado com sucesso!",
    }
}

fn connection_message(capability: Capability, ok: bool) -> &'static str {
    match (capability, ok) {
        (Capability::Ai, true) => "Conexão com Gemini OK!",
        (Capability::Ai, false) => "Erro na conexão com Gemini",
        (Capability::Database, true) => "Conexão com banco OK!",
        (Capability::Database, false) => "Erro na conexão com banco",
        (Capability::SigningSecret, true) => "Segredo JWT disponível",
        (Capability::SigningSecret, false) => "Segredo JWT ausente",
    }
}

async fn configure(
    State(state): SharedState,
    Path(raw): Path<String>,
    Json(req): Json<ConfigureRequest>,
) -> OutcomeResponse {
    let capability = match parse_capability(&raw) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    match state.config.configure(capability, &req.value).await {
        Ok(_) => outcome(StatusCode::OK, true, configured_message(capability)),
        Err(rejection) => outcome(StatusCode::BAD_REQUEST, false, rejection.message),
    }
}

async fn test_connection(State(state): SharedState, Path(raw): Path<String>) -> OutcomeResponse {
    let capability = match parse_capability(&raw) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let ok = state.config.test_connection(capability).await;
    outcome(StatusCode::OK, ok, connection_message(capability, ok))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChatRequest {
    message: String,
    #[serde(default)]
    context: Vec<ChatTurn>,
    #[serde(default)]
    user_id: Option<String>,
}

async fn chat(State(state): SharedState, Json(req): Json<ChatRequest>) -> Json<Served<ChatReply>> {
    let served = match req.user_id.as_deref() {
        Some(user_id) => state.ai.chat_in(user_id, &req.message, &req.context).await,
        None => state.ai.chat(&req.message, &req.context).await,
    };
    if let Some(user_id) = req.user_id.as_deref() {
        state
            .db
            .save_conversation(ConversationRecord::new(user_id, ChatRole::User, &req.message))
            .await;
        let mut answer =
            ConversationRecord::new(user_id, ChatRole::Assistant, &served.value.message);
        answer.source = Some(served.value.source);
        state.db.save_conversation(answer).await;
    }
    Json(served)
}

/// Generates a plan (live or computed) and stores it; the path reported is the generator's.
async fn create_diet_plan(
    State(state): SharedState,
    Json(profile): Json<UserProfile>,
) -> Json<Served<DietPlan>> {
    let generated = state.ai.generate_diet_plan(&profile).await;
    let saved = state.db.save_diet_plan(generated.value).await;
    Json(Served {
        value: saved.value,
        path: generated.path,
    })
}

async fn user_diet_plans(
    State(state): SharedState,
    Path(user_id): Path<String>,
) -> Json<Served<Vec<DietPlan>>> {
    Json(state.db.get_user_diet_plans(&user_id).await)
}

async fn user_conversations(
    State(state): SharedState,
    Path(user_id): Path<String>,
) -> Json<Served<Vec<ConversationRecord>>> {
    Json(state.db.get_conversations(&user_id).await)
}

async fn save_user(State(state): SharedState, Json(user): Json<UserRecord>) -> Json<Served<UserRecord>> {
    Json(state.db.save_user(user).await)
}

#[derive(Deserialize)]
struct EmailQuery {
    email: String,
}

async fn find_user(
    State(state): SharedState,
    Query(q): Query<EmailQuery>,
) -> Json<Served<Option<UserRecord>>> {
    Json(state.db.find_user(&q.email).await)
}
