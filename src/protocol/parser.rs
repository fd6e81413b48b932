//! Reply decoder for the RESP wire format
//!
//! Reads exactly one reply from a buffered async byte source. Aggregate
//! replies are decoded with an explicit stack of partially built arrays,
//! so decoding never recurses. Nesting is still capped by a maximum depth:
//! the finished `Reply` tree is dropped, compared and rendered recursively.

use crate::protocol::Reply;
use crate::{Error, Result};
use bytes::Bytes;
use std::io;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};

/// Maximum bulk string length accepted (512 MB, matching Redis).
const MAX_BULK_LEN: i64 = 512 * 1024 * 1024;

/// Cap for up-front allocations sized from a length or count the server
/// declared. Buffers still grow as data actually arrives.
const PREALLOC_CAP: usize = 64 * 1024;

/// Longest header or simple-string line accepted, terminator included.
const MAX_LINE_LEN: usize = 64 * 1024;

/// Default cap on array nesting.
pub const DEFAULT_MAX_DEPTH: usize = 1024;

/// One decoded header line.
enum Step {
    /// A complete reply.
    Value(Reply),
    /// An array header with this many (non-zero) elements still to read.
    Open(usize),
}

/// Read one complete reply from `reader`, nesting at most
/// [`DEFAULT_MAX_DEPTH`] arrays deep.
///
/// Consumes exactly the bytes of that reply. An `Error` reply is returned
/// as a value; only transport and framing problems are `Err`.
pub async fn read_reply<R>(reader: &mut R) -> Result<Reply>
where
    R: AsyncBufRead + Unpin,
{
    read_reply_limited(reader, DEFAULT_MAX_DEPTH).await
}

/// Like [`read_reply`], with an explicit cap on array nesting.
///
/// An array header that would open level `max_depth + 1` is a protocol
/// error.
pub async fn read_reply_limited<R>(reader: &mut R, max_depth: usize) -> Result<Reply>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = Vec::new();
    // Partially built arrays, innermost last, with the number of elements
    // each one is still waiting for.
    let mut stack: Vec<(Vec<Reply>, usize)> = Vec::new();

    'read: loop {
        let mut value = match read_step(reader, &mut line).await? {
            Step::Value(reply) => reply,
            Step::Open(count) => {
                if stack.len() >= max_depth {
                    return Err(Error::Protocol(format!(
                        "Reply nesting exceeds {} levels",
                        max_depth
                    )));
                }
                stack.push((Vec::with_capacity(count.min(PREALLOC_CAP)), count));
                continue;
            }
        };

        while let Some((mut items, remaining)) = stack.pop() {
            items.push(value);
            if remaining > 1 {
                stack.push((items, remaining - 1));
                continue 'read;
            }
            value = Reply::Array(Some(items));
        }

        return Ok(value);
    }
}

async fn read_step<R>(reader: &mut R, line: &mut Vec<u8>) -> Result<Step>
where
    R: AsyncBufRead + Unpin,
{
    let content = read_line(reader, line).await?;
    let (&prefix, rest) = content
        .split_first()
        .ok_or_else(|| Error::Protocol("Empty reply line".to_string()))?;

    match prefix {
        b'-' => Ok(Step::Value(Reply::Error(text(rest, "error")?))),
        b'+' => Ok(Step::Value(Reply::Status(text(rest, "status")?))),
        b':' => Ok(Step::Value(Reply::Integer(parse_int(rest, "integer")?))),
        b'$' => {
            let len = parse_int(rest, "bulk length")?;
            match len {
                -1 => Ok(Step::Value(Reply::Bulk(None))),
                len if len < 0 => Err(Error::Protocol(format!(
                    "Invalid bulk length: {}",
                    len
                ))),
                len if len > MAX_BULK_LEN => Err(Error::Protocol(format!(
                    "Bulk length {} exceeds {} byte limit",
                    len, MAX_BULK_LEN
                ))),
                len => {
                    let data = read_bulk(reader, len as usize).await?;
                    Ok(Step::Value(Reply::Bulk(Some(data))))
                }
            }
        }
        b'*' => {
            let count = parse_int(rest, "array length")?;
            match count {
                -1 => Ok(Step::Value(Reply::Array(None))),
                0 => Ok(Step::Value(Reply::Array(Some(Vec::new())))),
                count if count < 0 => Err(Error::Protocol(format!(
                    "Invalid array length: {}",
                    count
                ))),
                count => usize::try_from(count).map(Step::Open).map_err(|_| {
                    Error::Protocol(format!("Array length {} does not fit in memory", count))
                }),
            }
        }
        other => Err(Error::Protocol(format!(
            "Invalid reply prefix: {:#04x}",
            other
        ))),
    }
}

/// Read one `\r\n`-terminated line and return it without the terminator.
async fn read_line<'a, R>(reader: &mut R, line: &'a mut Vec<u8>) -> Result<&'a [u8]>
where
    R: AsyncBufRead + Unpin,
{
    line.clear();
    (&mut *reader)
        .take(MAX_LINE_LEN as u64)
        .read_until(b'\n', line)
        .await?;

    if line.last() != Some(&b'\n') {
        if line.len() >= MAX_LINE_LEN {
            return Err(Error::Protocol(format!(
                "Reply line exceeds {} byte limit",
                MAX_LINE_LEN
            )));
        }
        return Err(closed());
    }

    line.strip_suffix(b"\r\n")
        .ok_or_else(|| Error::Protocol("Reply line not terminated by CRLF".to_string()))
}

/// Read a bulk payload of `len` bytes plus its trailing `\r\n`.
///
/// The payload may arrive across any number of short reads.
async fn read_bulk<R>(reader: &mut R, len: usize) -> Result<Bytes>
where
    R: AsyncBufRead + Unpin,
{
    let mut data = Vec::with_capacity(len.min(PREALLOC_CAP));
    (&mut *reader)
        .take(len as u64)
        .read_to_end(&mut data)
        .await?;
    if data.len() < len {
        return Err(closed());
    }

    let mut crlf = [0u8; 2];
    reader.read_exact(&mut crlf).await.map_err(|e| match e.kind() {
        io::ErrorKind::UnexpectedEof => closed(),
        _ => Error::Io(e),
    })?;
    if &crlf != b"\r\n" {
        return Err(Error::Protocol(
            "Bulk string not terminated by CRLF".to_string(),
        ));
    }

    Ok(Bytes::from(data))
}

fn text(rest: &[u8], what: &str) -> Result<String> {
    String::from_utf8(rest.to_vec())
        .map_err(|_| Error::Protocol(format!("Invalid UTF-8 in {} reply", what)))
}

fn parse_int(rest: &[u8], what: &str) -> Result<i64> {
    std::str::from_utf8(rest)
        .ok()
        .and_then(|s| s.parse::<i64>().ok())
        .ok_or_else(|| {
            Error::Protocol(format!(
                "Invalid {}: {:?}",
                what,
                String::from_utf8_lossy(rest)
            ))
        })
}

fn closed() -> Error {
    Error::Connection("Connection closed by server".to_string())
}
