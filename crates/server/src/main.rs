//! Voice call agent server

mod collaborators;
mod http;
mod state;
mod webhook;
mod ws;

use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use call_agent_config::{load_settings, EngineSettings};

use crate::state::{AppState, Collaborators};

fn init_tracing(settings: &EngineSettings) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.observability.log_level));

    if settings.observability.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("ctrl-c handler installation failed");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("sigterm handler installation failed")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("shutdown signal received");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let env_name = std::env::var("CALL_AGENT_ENV").ok();
    let settings = load_settings(env_name.as_deref())?;
    init_tracing(&settings);

    tracing::info!(
        host = %settings.server.host,
        port = settings.server.port,
        max_sessions = settings.server.max_sessions,
        "starting call agent server"
    );

    let state = AppState::build(settings.clone(), Collaborators::default()).await;
    let (monitor, monitor_stop) = state.stream_engine.start_silence_monitor();

    let router = http::build_router(state);
    let addr = format!("{}:{}", settings.server.host, settings.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(addr = %addr, "listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    let _ = monitor_stop.send(true);
    let _ = monitor.await;
    tracing::info!("server stopped");
    Ok(())
}
