//! Server configuration from the environment.

use std::net::SocketAddr;

/// Environment variable for the listen address.
pub const ADDR_ENV: &str = "PIXELCRAFTER_ADDR";
/// Environment variable holding a canned assistant reply for local testing.
pub const ASSISTANT_REPLY_ENV: &str = "PIXELCRAFTER_ASSISTANT_REPLY";

const DEFAULT_ADDR: ([u8; 4], u16) = ([0, 0, 0, 0], 8001);

#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub addr: SocketAddr,
    /// When set, `/api/chat` answers with this text instead of 503.
    pub assistant_reply: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { addr: SocketAddr::from(DEFAULT_ADDR), assistant_reply: None }
    }
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F: Fn(&str) -> Option<String>>(lookup: F) -> Self {
        let mut config = Self::default();
        if let Some(addr) = lookup(ADDR_ENV) {
            match addr.trim().parse() {
                Ok(addr) => config.addr = addr,
                Err(e) => tracing::warn!("Ignoring {}={:?}: {}", ADDR_ENV, addr, e),
            }
        }
        config.assistant_reply = lookup(ASSISTANT_REPLY_ENV).filter(|r| !r.trim().is_empty());
        config
    }
}
