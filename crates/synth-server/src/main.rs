//! SynthesisTalk HTTP Server
//!
//! Axum-based server exposing the research orchestrator over a REST API:
//! chat with none/chain-of-thought/ReAct reasoning, the tool catalog,
//! session history, notes, documents and web search.

mod config;
mod handlers;
mod state;

use std::sync::Arc;

use axum::{
    Router,
    routing::{delete, get, post},
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use synth_core::{Orchestrator, ProviderRouter, ToolRegistry};
use synth_tools::{RESEARCH_ASSISTANT_PROMPT, ResearchToolkit};

use crate::config::ServerConfig;
use crate::handlers::{
    chat_handler, clear_history, delete_document, delete_session, get_history, health_check, list_documents, list_notes,
    list_sessions, list_tools, save_note, search, upload_document,
};
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::from_env()?;
    let router = Arc::new(synth_runtime::router_from_env()?);

    if router.health_check().await {
        tracing::info!(profile = router.active_profile(), model = router.active_model(), "provider reachable");
    } else {
        tracing::warn!(
            profile = router.active_profile(),
            "provider not reachable; chat requests will fail over or return 503"
        );
    }

    let toolkit = ResearchToolkit::in_memory(ResearchToolkit::search_backend(config.serpapi_key.as_deref())?);
    let state = build_state(&config, router, &toolkit)?;

    let app = app(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!(addr = %config.bind_addr, "SynthesisTalk server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("server stopped");
    Ok(())
}

/// Wire the toolkit and router into the orchestrator
fn build_state(config: &ServerConfig, router: Arc<ProviderRouter>, toolkit: &ResearchToolkit) -> synth_core::Result<AppState> {
    let mut tools = ToolRegistry::new();
    toolkit.register_all(&mut tools, &router)?;
    tracing::info!(tools = ?tools.names(), "registered tools");

    let orchestrator = Orchestrator::builder()
        .router(router)
        .tools(tools)
        .system_prompt(RESEARCH_ASSISTANT_PROMPT)
        .max_context_messages(config.max_context_messages)
        .max_iterations(config.react_max_iterations)
        .build()?;

    Ok(AppState {
        orchestrator: Arc::new(orchestrator),
        documents: toolkit.documents.clone(),
    })
}

fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_check))
        .route("/chat", post(chat_handler))
        .route("/tools", get(list_tools))
        .route("/conversation-history/{id}", get(get_history).delete(clear_history))
        .route("/sessions", get(list_sessions))
        .route("/sessions/{id}", delete(delete_session))
        .route("/notes", post(save_note).get(list_notes))
        .route("/search", post(search))
        .route("/documents", post(upload_document).get(list_documents))
        .route("/documents/{id}", delete(delete_document))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
