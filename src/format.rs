//! Reply rendering for the command-line client.

use mini_resp::Reply;
use serde_json::{json, Value};

/// Render a reply the way redis-cli does.
///
/// Server-supplied text is escaped so control sequences never reach the
/// terminal.
pub fn format_reply(reply: &Reply) -> String {
    match reply {
        Reply::Status(s) => s.escape_debug().to_string(),
        Reply::Error(e) => format!("(error) {}", e.escape_debug()),
        Reply::Integer(n) => format!("(integer) {}", n),
        Reply::Bulk(None) | Reply::Array(None) => "(nil)".to_string(),
        Reply::Bulk(Some(data)) => match std::str::from_utf8(data) {
            Ok(s) => format!("{:?}", s),
            Err(_) => format!("0x{}", hex(data)),
        },
        Reply::Array(Some(items)) if items.is_empty() => "(empty array)".to_string(),
        Reply::Array(Some(items)) => format_numbered(items),
    }
}

/// Render a drained batch, one numbered entry per reply.
pub fn format_batch(replies: &[Reply]) -> String {
    if replies.is_empty() {
        return "(empty batch)".to_string();
    }
    format_numbered(replies)
}

fn format_numbered(items: &[Reply]) -> String {
    let mut lines = Vec::with_capacity(items.len());
    for (i, item) in items.iter().enumerate() {
        let num = format!("{}) ", i + 1);
        let pad = " ".repeat(num.len());
        let body = format_reply(item);
        let mut body_lines = body.lines();

        lines.push(format!("{}{}", num, body_lines.next().unwrap_or("")));
        for line in body_lines {
            lines.push(format!("{}{}", pad, line));
        }
    }
    lines.join("\n")
}

fn hex(data: &[u8]) -> String {
    data.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Convert a reply to JSON.
///
/// UTF-8 bulk payloads become strings, anything else `{"hex": ...}`.
/// Absent values become `null`.
pub fn to_json(reply: &Reply) -> Value {
    match reply {
        Reply::Status(s) => Value::String(s.clone()),
        Reply::Error(e) => json!({ "error": e }),
        Reply::Integer(n) => json!(n),
        Reply::Bulk(None) | Reply::Array(None) => Value::Null,
        Reply::Bulk(Some(data)) => match std::str::from_utf8(data) {
            Ok(s) => Value::String(s.to_string()),
            Err(_) => json!({ "hex": hex(data) }),
        },
        Reply::Array(Some(items)) => Value::Array(items.iter().map(to_json).collect()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn bulk(s: &str) -> Reply {
        Reply::Bulk(Some(Bytes::copy_from_slice(s.as_bytes())))
    }

    #[test]
    fn format_scalars() {
        assert_eq!(format_reply(&Reply::Status("OK".into())), "OK");
        assert_eq!(
            format_reply(&Reply::Error("ERR unknown".into())),
            "(error) ERR unknown"
        );
        assert_eq!(format_reply(&Reply::Integer(-5)), "(integer) -5");
        assert_eq!(format_reply(&bulk("hello")), "\"hello\"");
        assert_eq!(format_reply(&Reply::Bulk(None)), "(nil)");
        assert_eq!(format_reply(&Reply::Array(None)), "(nil)");
        assert_eq!(format_reply(&Reply::Array(Some(vec![]))), "(empty array)");
    }

    #[test]
    fn format_escapes_control_characters() {
        assert_eq!(format_reply(&bulk("a\r\nb")), "\"a\\r\\nb\"");
        assert_eq!(
            format_reply(&Reply::Status("\x1b[31mred".into())),
            "\\u{1b}[31mred"
        );
    }

    #[test]
    fn format_binary_as_hex() {
        let reply = Reply::Bulk(Some(Bytes::from_static(&[0xff, 0x00, 0x10])));
        assert_eq!(format_reply(&reply), "0xff0010");
    }

    #[test]
    fn format_nested_array() {
        let reply = Reply::Array(Some(vec![
            bulk("a"),
            Reply::Array(Some(vec![Reply::Integer(1), Reply::Bulk(None)])),
            Reply::Status("".into()),
        ]));
        assert_eq!(
            format_reply(&reply),
            "1) \"a\"\n2) 1) (integer) 1\n   2) (nil)\n3) "
        );
    }

    #[test]
    fn format_batch_entries() {
        assert_eq!(format_batch(&[]), "(empty batch)");
        assert_eq!(
            format_batch(&[Reply::Status("OK".into()), Reply::Integer(2)]),
            "1) OK\n2) (integer) 2"
        );
    }

    #[test]
    fn json_conversion() {
        let reply = Reply::Array(Some(vec![
            Reply::Status("OK".into()),
            Reply::Error("ERR x".into()),
            Reply::Integer(3),
            bulk("v"),
            Reply::Bulk(None),
            Reply::Array(None),
            Reply::Array(Some(vec![])),
        ]));
        assert_eq!(
            to_json(&reply),
            json!(["OK", {"error": "ERR x"}, 3, "v", null, null, []])
        );
    }

    #[test]
    fn json_binary_as_hex() {
        let reply = Reply::Bulk(Some(Bytes::from_static(&[0xff, 0x00, 0x10])));
        assert_eq!(to_json(&reply), json!({ "hex": "ff0010" }));
        assert_eq!(format_reply(&reply), "0xff0010");
        assert_eq!(to_json(&bulk("caf\u{e9}")), json!("caf\u{e9}"));
    }
}
