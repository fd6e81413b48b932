//! Typed replies

use crate::protocol::TERMINATOR;
use crate::{Error, Result};
use bytes::{BufMut, Bytes, BytesMut};

/// A single decoded reply.
///
/// `Bulk(None)` and `Array(None)` are the protocol's null sentinels (`$-1`
/// and `*-1`). They are distinct from an empty bulk string or empty array.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// `-ERR unknown command\r\n`
    Error(String),
    /// `+OK\r\n`
    Status(String),
    /// `:1000\r\n`
    Integer(i64),
    /// `$5\r\nhello\r\n` or `$-1\r\n`
    Bulk(Option<Bytes>),
    /// `*2\r\n...` or `*-1\r\n`
    Array(Option<Vec<Reply>>),
}

impl Reply {
    /// Short name of the reply kind, for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Reply::Error(_) => "error",
            Reply::Status(_) => "status",
            Reply::Integer(_) => "integer",
            Reply::Bulk(_) => "bulk",
            Reply::Array(_) => "array",
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Reply::Error(_))
    }

    /// True for the null bulk string and the null array.
    pub fn is_absent(&self) -> bool {
        matches!(self, Reply::Bulk(None) | Reply::Array(None))
    }

    /// Payload of a bulk or status reply.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Reply::Bulk(Some(data)) => Some(data.as_ref()),
            Reply::Status(s) => Some(s.as_bytes()),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Reply::Integer(n) => Some(*n),
            _ => None,
        }
    }

    /// Turn an `Error` reply into `Err(Error::Server)`, passing anything
    /// else through.
    pub fn into_result(self) -> Result<Reply> {
        match self {
            Reply::Error(msg) => Err(Error::Server(msg)),
            other => Ok(other),
        }
    }

    /// Encode a reply the way a server frames it.
    pub fn encode_into(&self, buf: &mut BytesMut) {
        match self {
            Reply::Error(s) => {
                buf.put_u8(b'-');
                buf.put_slice(s.as_bytes());
                buf.put_slice(TERMINATOR);
            }
            Reply::Status(s) => {
                buf.put_u8(b'+');
                buf.put_slice(s.as_bytes());
                buf.put_slice(TERMINATOR);
            }
            Reply::Integer(n) => {
                buf.put_u8(b':');
                buf.put_slice(n.to_string().as_bytes());
                buf.put_slice(TERMINATOR);
            }
            Reply::Bulk(None) => buf.put_slice(b"$-1\r\n"),
            Reply::Bulk(Some(data)) => {
                buf.put_u8(b'$');
                buf.put_slice(data.len().to_string().as_bytes());
                buf.put_slice(TERMINATOR);
                buf.put_slice(data);
                buf.put_slice(TERMINATOR);
            }
            Reply::Array(None) => buf.put_slice(b"*-1\r\n"),
            Reply::Array(Some(items)) => {
                buf.put_u8(b'*');
                buf.put_slice(items.len().to_string().as_bytes());
                buf.put_slice(TERMINATOR);
                for item in items {
                    item.encode_into(buf);
                }
            }
        }
    }

    /// Encode to a fresh buffer.
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::new();
        self.encode_into(&mut buf);
        buf.freeze()
    }
}

impl From<&str> for Reply {
    fn from(s: &str) -> Self {
        Reply::Bulk(Some(Bytes::copy_from_slice(s.as_bytes())))
    }
}

impl From<i64> for Reply {
    fn from(n: i64) -> Self {
        Reply::Integer(n)
    }
}
