//! Server settings read from the environment.

use std::net::SocketAddr;
use thiserror::Error;

pub const DEFAULT_BIND: &str = "0.0.0.0:3030";
pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;

/// Server errors.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("invalid INKROOM_BIND {0:?}")]
    InvalidBind(String),
    #[error("invalid INKROOM_CHANNEL_CAPACITY {0:?}")]
    InvalidCapacity(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub bind: SocketAddr,
    /// Per-room broadcast buffer; slow peers past this lag and drop frames.
    pub channel_capacity: usize,
}

impl ServerConfig {
    /// Read `INKROOM_BIND` and `INKROOM_CHANNEL_CAPACITY`.
    pub fn from_env() -> Result<Self, ServerError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ServerError> {
        let bind_text = lookup("INKROOM_BIND").unwrap_or_else(|| DEFAULT_BIND.to_string());
        let bind = bind_text
            .parse()
            .map_err(|_| ServerError::InvalidBind(bind_text.clone()))?;

        let channel_capacity = match lookup("INKROOM_CHANNEL_CAPACITY") {
            Some(text) => match text.parse::<usize>() {
                Ok(capacity) if capacity > 0 => capacity,
                _ => return Err(ServerError::InvalidCapacity(text)),
            },
            None => DEFAULT_CHANNEL_CAPACITY,
        };

        Ok(Self { bind, channel_capacity })
    }
}
