//! PixelCrafter development backend
//!
//! In-memory implementation of the REST API the editor talks to, plus the
//! per-project collaboration relay at `/api/ws/collaborate/{project_id}`.
//! State lives only as long as the process.

mod config;
mod error;
mod relay;
mod routes;
mod state;

use config::ServerConfig;
use state::AppState;
use std::sync::Arc;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pixelcrafter_server=info,tower_http=info".into()),
        )
        .init();

    let config = ServerConfig::from_env();
    let addr = config.addr;
    if config.assistant_reply.is_none() {
        info!("Assistant not configured; /api/chat answers 503");
    }
    let app = routes::router(Arc::new(AppState::new(config)));

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Could not bind {}: {}", addr, e);
            std::process::exit(1);
        }
    };
    info!("PixelCrafter backend listening on http://{}", addr);
    info!("Collaboration endpoint: ws://{}/api/ws/collaborate/{{project_id}}", addr);

    if let Err(e) = axum::serve(listener, app).await {
        error!("Server error: {}", e);
    }
}
