//! Mini RESP - a Redis Serialization Protocol client in Rust
//!
//! This crate provides a client for Redis-compatible servers with:
//! - Binary-safe command encoding (unified request format)
//! - A typed reply decoder for all five RESP2 reply shapes
//! - A pipelining mode that writes many commands before reading replies
//! - A TCP client with bounded connect retries and optional I/O timeouts

pub mod client;
pub mod config;
pub mod protocol;

#[cfg(test)]
mod test_util;

pub use client::{Connection, TcpClient};
pub use config::ClientConfig;
pub use protocol::{Command, Reply};

use std::time::Duration;

/// Result type for mini-resp operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for mini-resp
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Pipeline error: {0}")]
    Pipeline(String),

    /// An `Error` reply the caller chose to treat as a failure.
    #[error("Server error: {0}")]
    Server(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Config error: {0}")]
    Config(String),
}

impl Error {
    /// Whether this failure leaves the byte stream at an unknown position.
    ///
    /// Transport, protocol and timeout failures in the middle of a send or
    /// decode do; caller misuse and server errors don't.
    pub fn desyncs_stream(&self) -> bool {
        matches!(
            self,
            Error::Io(_) | Error::Connection(_) | Error::Timeout(_) | Error::Protocol(_)
        )
    }
}
