//! Protocol module for encoding commands and decoding replies

pub mod command;
pub mod parser;
pub mod reply;

pub use command::Command;
pub use parser::{read_reply, read_reply_limited, DEFAULT_MAX_DEPTH};
pub use reply::Reply;

/// Line terminator used by every RESP line.
pub const TERMINATOR: &[u8] = b"\r\n";
