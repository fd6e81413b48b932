//! Command definitions and wire encoding

use crate::protocol::TERMINATOR;
use crate::{Error, Result};
use bytes::{BufMut, Bytes, BytesMut};
use std::borrow::Cow;

/// A command ready to be written to the server.
///
/// The unified form is an ordered list of binary-safe elements, the command
/// name first. Each element is length-prefixed on the wire, so any byte
/// value (including `\r\n`) is allowed inside it.
///
/// The inline form is a single text line sent verbatim. The server splits
/// it on whitespace, so it only suits simple commands like `QUIT` or `PING`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    form: Form,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Form {
    Unified(Vec<Bytes>),
    Inline(String),
}

impl Command {
    /// Start a unified command with the given name.
    pub fn new(name: impl AsRef<[u8]>) -> Self {
        Command {
            form: Form::Unified(vec![Bytes::copy_from_slice(name.as_ref())]),
        }
    }

    /// Build a unified command from a name followed by its arguments.
    pub fn from_args<I, A>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = A>,
        A: AsRef<[u8]>,
    {
        let parts: Vec<Bytes> = args
            .into_iter()
            .map(|a| Bytes::copy_from_slice(a.as_ref()))
            .collect();

        if parts.is_empty() {
            return Err(Error::Protocol("Empty command".to_string()));
        }

        Ok(Command {
            form: Form::Unified(parts),
        })
    }

    /// Build a legacy inline command.
    ///
    /// Inline text is not length-prefixed, so a line break inside it would
    /// split the request in two. Such text is rejected.
    pub fn inline(text: impl Into<String>) -> Result<Self> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(Error::Protocol("Empty inline command".to_string()));
        }
        if text.contains(['\r', '\n']) {
            return Err(Error::Protocol(
                "Inline command must not contain line breaks".to_string(),
            ));
        }
        Ok(Command {
            form: Form::Inline(text),
        })
    }

    /// Append an argument.
    pub fn arg(mut self, arg: impl AsRef<[u8]>) -> Self {
        self.push_arg(arg);
        self
    }

    /// Append an argument in place.
    ///
    /// An inline command is first converted to the unified form, one element
    /// per whitespace-separated token, so the new argument stays binary-safe.
    pub fn push_arg(&mut self, arg: impl AsRef<[u8]>) {
        if let Form::Inline(text) = &self.form {
            let parts = text
                .split_whitespace()
                .map(|t| Bytes::copy_from_slice(t.as_bytes()))
                .collect();
            self.form = Form::Unified(parts);
        }
        if let Form::Unified(parts) = &mut self.form {
            parts.push(Bytes::copy_from_slice(arg.as_ref()));
        }
    }

    /// Command name, lossily decoded for logging.
    pub fn name(&self) -> Cow<'_, str> {
        match &self.form {
            Form::Unified(parts) => String::from_utf8_lossy(&parts[0]),
            Form::Inline(text) => Cow::Borrowed(text.split_whitespace().next().unwrap_or("")),
        }
    }

    /// Number of arguments after the command name.
    pub fn arg_count(&self) -> usize {
        match &self.form {
            Form::Unified(parts) => parts.len() - 1,
            Form::Inline(text) => text.split_whitespace().count().saturating_sub(1),
        }
    }

    /// Whether this is the legacy inline form.
    pub fn is_inline(&self) -> bool {
        matches!(self.form, Form::Inline(_))
    }

    /// Encode to wire bytes.
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::new();
        self.encode_into(&mut buf);
        buf.freeze()
    }

    /// Encode into an existing buffer.
    pub fn encode_into(&self, buf: &mut BytesMut) {
        match &self.form {
            Form::Unified(parts) => {
                buf.put_u8(b'*');
                buf.put_slice(parts.len().to_string().as_bytes());
                buf.put_slice(TERMINATOR);
                for part in parts {
                    buf.put_u8(b'$');
                    buf.put_slice(part.len().to_string().as_bytes());
                    buf.put_slice(TERMINATOR);
                    buf.put_slice(part);
                    buf.put_slice(TERMINATOR);
                }
            }
            Form::Inline(text) => {
                buf.put_slice(text.as_bytes());
                buf.put_slice(TERMINATOR);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_set() {
        let cmd = Command::new("SET").arg("k").arg("v");
        assert_eq!(
            &cmd.encode()[..],
            b"*3\r\n$3\r\nSET\r\n$1\r\nk\r\n$1\r\nv\r\n"
        );
    }

    #[test]
    fn encode_from_args() {
        let cmd = Command::from_args(["GET", "key"]).unwrap();
        assert_eq!(&cmd.encode()[..], b"*2\r\n$3\r\nGET\r\n$3\r\nkey\r\n");
        assert_eq!(cmd.name(), "GET");
        assert_eq!(cmd.arg_count(), 1);
    }

    #[test]
    fn from_args_rejects_empty() {
        let empty: [&str; 0] = [];
        assert!(matches!(Command::from_args(empty), Err(Error::Protocol(_))));
    }

    #[test]
    fn length_is_byte_length() {
        // "é" is two bytes in UTF-8
        let cmd = Command::new("SET").arg("k").arg("é");
        assert_eq!(
            &cmd.encode()[..],
            "*3\r\n$3\r\nSET\r\n$1\r\nk\r\n$2\r\né\r\n".as_bytes()
        );
    }

    #[test]
    fn binary_elements_are_length_prefixed() {
        let value: &[u8] = b"a\r\nb\0c";
        let cmd = Command::new("SET").arg("k").arg(value);
        let mut expected = b"*3\r\n$3\r\nSET\r\n$1\r\nk\r\n$6\r\n".to_vec();
        expected.extend_from_slice(value);
        expected.extend_from_slice(b"\r\n");
        assert_eq!(&cmd.encode()[..], &expected[..]);
    }

    #[test]
    fn empty_argument() {
        let cmd = Command::new("SET").arg("k").arg("");
        assert_eq!(
            &cmd.encode()[..],
            b"*3\r\n$3\r\nSET\r\n$1\r\nk\r\n$0\r\n\r\n"
        );
    }

    #[test]
    fn encode_inline() {
        let cmd = Command::inline("QUIT").unwrap();
        assert!(cmd.is_inline());
        assert_eq!(&cmd.encode()[..], b"QUIT\r\n");

        let cmd = Command::inline("PING hello").unwrap();
        assert_eq!(cmd.name(), "PING");
        assert_eq!(cmd.arg_count(), 1);
    }

    #[test]
    fn arg_on_inline_switches_to_unified() {
        let cmd = Command::inline("SET  k").unwrap().arg("two words\r\n");
        assert!(!cmd.is_inline());
        assert_eq!(
            &cmd.encode()[..],
            b"*3\r\n$3\r\nSET\r\n$1\r\nk\r\n$11\r\ntwo words\r\n\r\n"
        );
    }

    #[test]
    fn inline_rejects_line_breaks() {
        assert!(matches!(
            Command::inline("SET k v\r\nDEL k"),
            Err(Error::Protocol(_))
        ));
        assert!(matches!(Command::inline("GET\nk"), Err(Error::Protocol(_))));
        assert!(matches!(Command::inline("  "), Err(Error::Protocol(_))));
    }

    #[test]
    fn encode_into_appends() {
        let mut buf = BytesMut::from(&b"prefix"[..]);
        Command::new("PING").encode_into(&mut buf);
        assert_eq!(&buf[..], b"prefix*1\r\n$4\r\nPING\r\n");
    }
}
