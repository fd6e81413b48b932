//! Stream adapters for exercising short reads, partial and failed writes.

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

/// Serves a fixed byte string at most `chunk` bytes per read.
pub struct ChunkedReader {
    data: Vec<u8>,
    pos: usize,
    chunk: usize,
}

impl ChunkedReader {
    pub fn new(data: impl Into<Vec<u8>>, chunk: usize) -> Self {
        ChunkedReader {
            data: data.into(),
            pos: 0,
            chunk,
        }
    }
}

impl AsyncRead for ChunkedReader {
    fn poll_read(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let end = self.data.len().min(self.pos + self.chunk);
        let n = (end - self.pos).min(buf.remaining());
        let start = self.pos;
        buf.put_slice(&self.data[start..start + n]);
        self.pos += n;
        Poll::Ready(Ok(()))
    }
}

/// Accepts at most `chunk` bytes per write and records everything written.
pub struct ChunkedWriter {
    pub written: Vec<u8>,
    pub writes: usize,
    chunk: usize,
}

impl ChunkedWriter {
    pub fn new(chunk: usize) -> Self {
        ChunkedWriter {
            written: Vec::new(),
            writes: 0,
            chunk,
        }
    }
}

impl AsyncWrite for ChunkedWriter {
    fn poll_write(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let n = buf.len().min(self.chunk);
        self.written.extend_from_slice(&buf[..n]);
        self.writes += 1;
        Poll::Ready(Ok(n))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

/// A writer that never accepts a byte: every write either returns `Ok(0)`
/// or fails with a fixed error kind.
pub struct FailingWriter {
    pub attempts: usize,
    error: Option<io::ErrorKind>,
}

impl FailingWriter {
    pub fn zero() -> Self {
        FailingWriter {
            attempts: 0,
            error: None,
        }
    }

    pub fn error(kind: io::ErrorKind) -> Self {
        FailingWriter {
            attempts: 0,
            error: Some(kind),
        }
    }
}

impl AsyncWrite for FailingWriter {
    fn poll_write(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        _buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        self.attempts += 1;
        match self.error {
            Some(kind) => Poll::Ready(Err(io::Error::new(kind, "write failed"))),
            None => Poll::Ready(Ok(0)),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}
