//! Response serialization for the wire

use chrono::Utc;
use serde_json::{json, Value};
use tokio::io::{AsyncWrite, AsyncWriteExt};

use tern_core::{Response, StatusCode};

use crate::error::TernResult;

const SERVER_NAME: &str = concat!("tern/", env!("CARGO_PKG_VERSION"));

/// JSON error body for a status the server answers on its own
pub fn error_response(status: StatusCode, message: impl Into<String>) -> Response<Value> {
    Response::with(
        status,
        json!({
            "error": status.canonical_reason(),
            "message": message.into(),
        }),
    )
}

/// Serialize a response as HTTP/1.1 bytes.
///
/// Handler headers are written in name order. `Content-Length` and
/// `Connection` are always set by the server.
pub fn to_wire_format(response: &Response<Value>) -> TernResult<Vec<u8>> {
    encode(response, true)
}

/// Serialize the answer to a HEAD request: the same head as
/// [`to_wire_format`], including `Content-Length`, but no body bytes
pub fn to_head_format(response: &Response<Value>) -> TernResult<Vec<u8>> {
    encode(response, false)
}

fn encode(response: &Response<Value>, with_body: bool) -> TernResult<Vec<u8>> {
    let body = match response.body() {
        Some(value) => serde_json::to_vec(value)?,
        None => Vec::new(),
    };

    let mut head = format!(
        "HTTP/1.1 {} {}\r\n",
        response.status.as_u16(),
        response.status.canonical_reason()
    );
    head.push_str(&format!(
        "Date: {}\r\n",
        Utc::now().format("%a, %d %b %Y %H:%M:%S GMT")
    ));
    head.push_str(&format!("Server: {}\r\n", SERVER_NAME));

    let mut headers: Vec<(&String, &String)> = response
        .headers
        .iter()
        .filter(|(name, _)| {
            !name.eq_ignore_ascii_case("content-length") && !name.eq_ignore_ascii_case("connection")
        })
        .collect();
    headers.sort();
    for (name, value) in &headers {
        head.push_str(&format!("{}: {}\r\n", name, value));
    }

    let has_content_type = headers
        .iter()
        .any(|(name, _)| name.eq_ignore_ascii_case("content-type"));
    if response.body.is_some() && !has_content_type {
        head.push_str("Content-Type: application/json\r\n");
    }
    head.push_str(&format!("Content-Length: {}\r\n", body.len()));
    head.push_str("Connection: close\r\n\r\n");

    let mut bytes = head.into_bytes();
    if with_body {
        bytes.extend_from_slice(&body);
    }
    Ok(bytes)
}

/// Write a response and flush
pub async fn write_response<W>(writer: &mut W, response: &Response<Value>) -> TernResult<()>
where
    W: AsyncWrite + Unpin,
{
    let bytes = to_wire_format(response)?;
    writer.write_all(&bytes).await?;
    writer.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(bytes: &[u8]) -> String {
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[test]
    fn test_json_body() {
        let response = Response::ok(json!({ "id": 1 })).header("X-Request-Id", "abc");
        let wire = text(&to_wire_format(&response).unwrap());

        assert!(wire.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(wire.contains("\r\nDate: "));
        assert!(wire.contains("\r\nX-Request-Id: abc\r\n"));
        assert!(wire.contains("\r\nContent-Type: application/json\r\n"));
        assert!(wire.contains("\r\nContent-Length: 8\r\n"));
        assert!(wire.ends_with("\r\n\r\n{\"id\":1}"));
    }

    #[test]
    fn test_empty_body() {
        let response: Response<Value> = Response::not_found();
        let wire = text(&to_wire_format(&response).unwrap());

        assert!(wire.starts_with("HTTP/1.1 404 Not Found\r\n"));
        assert!(!wire.contains("Content-Type"));
        assert!(wire.contains("Content-Length: 0\r\n"));
        assert!(wire.ends_with("Connection: close\r\n\r\n"));
    }

    #[test]
    fn test_server_owned_headers_not_duplicated() {
        let response = Response::ok(json!("hi"))
            .header("Content-Length", "999")
            .header("Content-Type", "text/plain");
        let wire = text(&to_wire_format(&response).unwrap());

        assert_eq!(wire.matches("Content-Length").count(), 1);
        assert!(wire.contains("Content-Length: 4\r\n"));
        assert_eq!(wire.matches("Content-Type").count(), 1);
        assert!(wire.contains("Content-Type: text/plain\r\n"));
    }

    #[test]
    fn test_head_format_keeps_length_drops_body() {
        let response = Response::ok(json!("hello world!"));
        let wire = text(&to_head_format(&response).unwrap());

        assert!(wire.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(wire.contains("\r\nContent-Length: 14\r\n"));
        assert!(wire.ends_with("Connection: close\r\n\r\n"));
    }

    #[test]
    fn test_error_response() {
        let response = error_response(StatusCode::PAYLOAD_TOO_LARGE, "request too large");
        assert_eq!(response.status.as_u16(), 413);
        assert_eq!(
            response.body,
            Some(json!({ "error": "Payload Too Large", "message": "request too large" }))
        );
    }

    #[tokio::test]
    async fn test_write_response() {
        let mut out: Vec<u8> = Vec::new();
        write_response(&mut out, &Response::ok(json!(true))).await.unwrap();
        assert!(text(&out).ends_with("\r\n\r\ntrue"));
    }
}
