//! Client module: connection state, pipelining and TCP transport

pub mod connection;
pub mod tcp_client;

pub use connection::{Connection, PipelineState};
pub use tcp_client::TcpClient;
