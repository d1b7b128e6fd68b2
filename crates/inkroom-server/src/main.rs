//! InkRoom WebSocket Relay Server
//!
//! Relays room-scoped drawing messages between clients and keeps a copy of
//! every room's elements for hydration.
//!
//! ## Protocol
//!
//! Messages are JSON with a `type` tag:
//! ```json
//! { "type": "joinRoom", "roomId": "room-id" }
//! { "type": "draw", "roomId": "room-id", "drawing": { "id": "...", "type": "rectangle", ... } }
//! { "type": "erase", "roomId": "room-id", "erasedIds": ["..."] }
//! { "type": "update", "roomId": "room-id", "updatedElement": { ... } }
//! ```
//! The server answers a join with `joined` and bad input with `error`.

mod config;
mod relay;
mod rooms;

use config::{ServerConfig, ServerError};
use inkroom_core::store::MemoryStore;
use relay::AppState;
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), ServerError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "inkroom_server=info,tower_http=info".into()),
        )
        .init();

    let config = ServerConfig::from_env()?;
    let state = Arc::new(AppState::new(Arc::new(MemoryStore::new()), config.channel_capacity));
    let app = relay::router(state);

    let listener = tokio::net::TcpListener::bind(config.bind).await?;
    info!("InkRoom relay server listening on {}", config.bind);
    info!("WebSocket endpoint: ws://{}/ws", config.bind);

    axum::serve(listener, app).await?;
    Ok(())
}
