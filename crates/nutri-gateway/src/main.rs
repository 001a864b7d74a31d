//! NutriAI Gateway: configuration page API, chat and diet plans over HTTP.
//!
//! Startup order: `.env` → tracing → settings → sled store → resolver →
//! services → router. Every component is built here once and shared by `Arc`.

mod routes;

use nutri_core::{
    AiService, ConfigHandle, ConfigResolver, CredentialStore, DatabaseService, Environment,
    NutriConfig, SledKv,
};
use routes::AppState;
use std::sync::Arc;
use thiserror::Error;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Error, Debug)]
enum GatewayError {
    #[error("settings: {0}")]
    Settings(#[from] config::ConfigError),

    #[error("storage: {0}")]
    Storage(#[from] nutri_core::StoreError),

    #[error("bind {addr}: {source}")]
    Bind {
        addr: String,
        source: std::io::Error,
    },

    #[error("server: {0}")]
    Serve(std::io::Error),
}

#[tokio::main]
async fn main() -> Result<(), GatewayError> {
    let dotenv_loaded = dotenvy::dotenv().is_ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if dotenv_loaded {
        tracing::info!(target: "nutri::gateway", "Loaded environment from .env");
    }

    let settings = NutriConfig::load()?;
    let options = settings.resolver_options();

    let kv = Arc::new(SledKv::open(Some(&settings.storage_path))?);
    let store = CredentialStore::new(kv.clone());
    let config = ConfigHandle::new(ConfigResolver::new(
        Environment::from_process(),
        store,
        options.clone(),
    ));

    for issue in config.issues().await {
        tracing::warn!(target: "nutri::gateway", "[{}] {}", issue.service, issue.message);
    }

    let ai = AiService::new(config.clone())
        .with_api_base(&options.gemini_api_base)
        .with_model(&settings.gemini_model)
        .with_timeout(options.ai_timeout);
    let db = DatabaseService::new(config.clone(), kv);

    let state = Arc::new(AppState { config, ai, db });
    let app = routes::router(state);

    let addr = format!("{}:{}", settings.host, settings.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|source| GatewayError::Bind {
            addr: addr.clone(),
            source,
        })?;

    tracing::info!(
        target: "nutri::gateway",
        "{} gateway v{} listening on {}",
        settings.app_name,
        nutri_core::version(),
        addr
    );
    axum::serve(listener, app).await.map_err(GatewayError::Serve)
}
