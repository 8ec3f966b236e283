//! Error types for connection handling and server startup.

use crate::config::ConfigError;
use protocol::FrameError;
use std::io;
use std::net::SocketAddr;

/// Ends one connection. Never affects other connections or the tick task.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("framing error: {0}")]
    Framing(#[from] FrameError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Prevents the server from starting or keeps it from running.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("failed to bind {addr}: {source}")]
    Bind { addr: SocketAddr, source: io::Error },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}
