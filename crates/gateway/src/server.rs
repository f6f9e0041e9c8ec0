use std::{sync::Arc, time::Duration};

use {
    axum::{
        Router,
        body::Bytes,
        extract::State,
        http::{HeaderMap, StatusCode},
        response::{IntoResponse, Json},
        routing::{get, post},
    },
    courier_agents::{GeminiBackend, Runner},
    courier_config::CourierConfig,
    courier_sessions::{InMemorySessionStore, SessionLimits},
    courier_telegram::client::WEBHOOK_PATH,
    tokio::net::TcpListener,
    tower_http::trace::TraceLayer,
    tracing::{debug, info, warn},
};

use crate::{
    dispatcher::{AckStatus, WebhookDispatcher},
    lifecycle::Lifecycle,
    state::AppState,
};

/// Header Telegram uses to echo the `secret_token` given to `setWebhook`.
pub const SECRET_HEADER: &str = "x-telegram-bot-api-secret-token";

/// Build the router: the webhook endpoint and a health check.
pub fn build_app(state: AppState) -> Router {
    Router::new()
        .route(WEBHOOK_PATH, post(webhook_handler))
        .route("/health", get(health_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Validate config, register the webhook and serve until a shutdown signal.
///
/// The shutdown hook runs whether the server stopped cleanly or failed.
pub async fn start_gateway(config: CourierConfig) -> anyhow::Result<()> {
    // Built before the webhook is registered so a failure leaves nothing to
    // undo.
    let backend = Arc::new(GeminiBackend::from_config(&config.agent)?);
    let lifecycle = Lifecycle::startup(&config).await?;

    let runner = Runner::new(
        backend,
        Duration::from_secs(config.agent.turn_timeout_secs),
    );
    let sessions = Arc::new(InMemorySessionStore::with_limits(
        config.agent.app_name.clone(),
        SessionLimits::new(config.sessions.max_sessions, config.sessions.idle_ttl_secs),
    ));
    let dispatcher = Arc::new(WebhookDispatcher::new(
        sessions,
        runner,
        lifecycle.client(),
    ));
    let state = AppState::new(
        Arc::clone(&dispatcher),
        config.telegram.webhook_secret.clone(),
    );

    let listener = match TcpListener::bind((config.server.bind.as_str(), config.server.port)).await
    {
        Ok(listener) => listener,
        Err(e) => {
            drop(state);
            lifecycle.shutdown(dispatcher).await;
            return Err(anyhow::anyhow!(
                "failed to bind {}:{}: {e}",
                config.server.bind,
                config.server.port
            ));
        },
    };
    match listener.local_addr() {
        Ok(addr) => info!(addr = %addr, model = %config.agent.model, "courier gateway listening"),
        Err(e) => warn!(error = %e, "courier gateway listening on unknown address"),
    }

    let served = axum::serve(listener, build_app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await;
    if let Err(ref e) = served {
        warn!(error = %e, "server exited with error");
    }

    lifecycle.shutdown(dispatcher).await;
    served?;
    Ok(())
}

// ── Handlers ─────────────────────────────────────────────────────────────────

async fn webhook_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    let token = headers.get(SECRET_HEADER).and_then(|v| v.to_str().ok());
    if !state.secret_matches(token) {
        warn!("rejected webhook call with wrong secret token");
        return StatusCode::UNAUTHORIZED;
    }

    match state.dispatcher.accept(&body) {
        AckStatus::Accepted => debug!(bytes = body.len(), "update accepted"),
        AckStatus::Ignored => debug!(bytes = body.len(), "update ignored"),
    }
    StatusCode::OK
}

async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let sessions = state.dispatcher.sessions().len().await;
    Json(serde_json::json!({
        "status": "ok",
        "sessions": sessions,
    }))
}

/// Resolves on Ctrl-C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            },
            Err(e) => {
                warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("received ctrl-c, shutting down"),
        () = terminate => info!("received SIGTERM, shutting down"),
    }
}
