//! LivePlay Engine - Main entry point.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::header::HeaderName;
use axum::http::{HeaderValue, Method};
use axum::routing::get;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use liveplay_engine::api::{
    self,
    http::{PARTICIPANT_TOKEN_HEADER, USER_ID_HEADER},
    websocket::WsState,
    ConnectionManager,
};
use liveplay_engine::app::{App, Collaborators};
use liveplay_engine::infrastructure::{
    clock::{SystemClock, SystemRandom},
    config::{EngineConfig, StoreBackend},
    content::{HttpContentProvider, StaticContentProvider},
    gamification::{HttpGamificationSink, LoggingGamificationSink},
    memory,
    ports::{ContentPort, GamificationPort},
    sqlite,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment from repo root (the engine may run from `crates/engine`).
    load_dotenv_from_repo_root();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "liveplay_engine=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting LivePlay Engine");

    let config = EngineConfig::from_env()?;

    let repos = match &config.store {
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory store, sessions are lost on restart");
            memory::repositories()
        }
        StoreBackend::Sqlite { path } => {
            tracing::info!("Opening SQLite store at {}", path.display());
            sqlite::connect(path).await?
        }
    };

    let content: Arc<dyn ContentPort> = if let Some(url) = &config.content_url {
        tracing::info!(url = %url, "Using HTTP content catalogue");
        Arc::new(HttpContentProvider::new(url))
    } else if let Some(path) = &config.content_file {
        tracing::info!(path = %path.display(), "Loading static content catalogue");
        Arc::new(StaticContentProvider::from_file(path).await?)
    } else {
        tracing::info!("No content catalogue configured, boards use session names");
        Arc::new(StaticContentProvider::empty())
    };

    let gamification: Arc<dyn GamificationPort> = match &config.gamification_url {
        Some(url) => Arc::new(HttpGamificationSink::new(
            url,
            config.runtime.gamification_timeout,
        )),
        None => Arc::new(LoggingGamificationSink),
    };

    // The connection registry is also the broadcast port.
    let connections = Arc::new(ConnectionManager::new());

    let app = Arc::new(App::new(
        repos,
        Collaborators {
            content,
            gamification,
            broadcast: connections.clone(),
            clock: Arc::new(SystemClock::new()),
            random: Arc::new(SystemRandom::new()),
        },
        config.runtime.clone(),
    ));

    let ws_state = Arc::new(WsState {
        app: app.clone(),
        connections,
    });

    // Spawn presence sweeper
    let sweep_app = app.clone();
    let sweep_interval = config.presence_sweep_interval;
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(sweep_interval);
        loop {
            ticker.tick().await;
            match sweep_app.use_cases.participants.sweep_presence().await {
                Ok(0) => {}
                Ok(swept) => tracing::debug!(swept, "Presence sweep finished"),
                Err(e) => tracing::warn!(error = %e, "Presence sweep failed"),
            }
        }
    });

    // Build router with separate states for HTTP and WebSocket
    let mut router = api::http::routes()
        .with_state(app)
        .route(
            "/ws/sessions/{id}",
            get(api::websocket::ws_handler).with_state(ws_state),
        )
        .layer(TraceLayer::new_for_http());

    if let Some(cors) = build_cors_layer_from_env() {
        router = router.layer(cors);
    }

    // Start server
    let addr: SocketAddr = format!("{}:{}", config.server_host, config.server_port).parse()?;
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;

    Ok(())
}

fn load_dotenv_from_repo_root() {
    let repo_root = std::path::Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("..");

    // Prefer local overrides.
    for filename in [".env.local", ".env"] {
        let path = repo_root.join(filename);
        if path.exists() {
            let _ = dotenvy::from_path(path);
        }
    }
}

fn build_cors_layer_from_env() -> Option<CorsLayer> {
    let allowed_origins = std::env::var("CORS_ALLOWED_ORIGINS")
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())?;

    let mut cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        // Credentials travel in custom headers, which trigger CORS preflights.
        .allow_headers([
            HeaderName::from_static(USER_ID_HEADER),
            HeaderName::from_static(PARTICIPANT_TOKEN_HEADER),
            axum::http::header::CONTENT_TYPE,
        ]);

    if allowed_origins == "*" {
        cors = cors.allow_origin(Any);
    } else {
        let origins: Vec<HeaderValue> = allowed_origins
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .filter_map(|s| HeaderValue::from_str(s).ok())
            .collect();

        if origins.is_empty() {
            return None;
        }

        cors = cors.allow_origin(origins);
    }

    Some(cors)
}
