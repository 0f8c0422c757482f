//! Minimal blocking HTTP/1.1 transport
//!
//! Reads exactly one request from a stream and writes exactly one response.
//! Header parsing is delegated to `httparse`; bodies are framed by
//! `Content-Length` only.

use std::io::{Read, Write};

/// Largest accepted request head (request line plus headers)
const MAX_HEAD_BYTES: usize = 16 * 1024;

/// Most headers a request may carry
const MAX_HEADERS: usize = 64;

/// Raw request as read off the wire
#[derive(Debug)]
pub struct HttpRequest {
    pub method: String,
    /// Request target, still percent-encoded, query string included
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

/// Raw response to write back
#[derive(Debug)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

/// Why a request could not be read
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestError {
    Malformed(String),
    TooLarge,
}

impl RequestError {
    pub fn status(&self) -> u16 {
        match self {
            Self::Malformed(_) => 400,
            Self::TooLarge => 413,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::Malformed(msg) => msg,
            Self::TooLarge => "Request too large",
        }
    }
}

/// Read one request.
///
/// Returns `None` when the peer closed the connection before sending anything.
pub fn read_request(
    stream: &mut impl Read,
    max_body: usize,
) -> Option<Result<HttpRequest, RequestError>> {
    let mut buf = Vec::with_capacity(1024);
    let mut chunk = [0u8; 4096];

    let head_len = loop {
        if let Some(end) = find_head_end(&buf) {
            break end;
        }
        if buf.len() > MAX_HEAD_BYTES {
            return Some(Err(RequestError::Malformed("Request head too large".into())));
        }
        match stream.read(&mut chunk) {
            Ok(0) if buf.is_empty() => return None,
            Ok(0) => return Some(Err(RequestError::Malformed("Incomplete request".into()))),
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
            Err(e) => {
                tracing::debug!(error = %e, "read failed before request head");
                return None;
            }
        }
    };

    Some(parse(stream, buf, head_len, max_body))
}

fn parse(
    stream: &mut impl Read,
    mut buf: Vec<u8>,
    head_len: usize,
    max_body: usize,
) -> Result<HttpRequest, RequestError> {
    let mut header_slots = [httparse::EMPTY_HEADER; MAX_HEADERS];
    let mut parsed = httparse::Request::new(&mut header_slots);
    match parsed.parse(&buf[..head_len]) {
        Ok(httparse::Status::Complete(_)) => {}
        Ok(httparse::Status::Partial) => {
            return Err(RequestError::Malformed("Incomplete request".into()))
        }
        Err(e) => return Err(RequestError::Malformed(format!("Malformed request: {e}"))),
    }

    let method = parsed.method.unwrap_or_default().to_string();
    let path = parsed.path.unwrap_or_default().to_string();
    let headers: Vec<(String, String)> = parsed
        .headers
        .iter()
        .map(|h| {
            (
                h.name.to_string(),
                String::from_utf8_lossy(h.value).trim().to_string(),
            )
        })
        .collect();

    let header = |name: &str| {
        headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    };

    if header("Transfer-Encoding").is_some_and(|v| v.to_ascii_lowercase().contains("chunked")) {
        return Err(RequestError::Malformed(
            "Chunked transfer encoding is not supported".into(),
        ));
    }

    let content_length = match header("Content-Length") {
        Some(raw) => raw
            .parse::<usize>()
            .map_err(|_| RequestError::Malformed("Invalid Content-Length".into()))?,
        None => 0,
    };
    if content_length > max_body {
        return Err(RequestError::TooLarge);
    }

    let mut body = buf.split_off(head_len);
    if body.len() < content_length {
        let mut rest = vec![0u8; content_length - body.len()];
        stream
            .read_exact(&mut rest)
            .map_err(|_| RequestError::Malformed("Incomplete request body".into()))?;
        body.extend_from_slice(&rest);
    }
    body.truncate(content_length);

    Ok(HttpRequest {
        method,
        path,
        headers,
        body,
    })
}

fn find_head_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n").map(|i| i + 4)
}

/// Write one response and flush. Write errors only mean the client went away.
pub fn write_response(stream: &mut impl Write, response: &HttpResponse) {
    let mut out = format!("HTTP/1.1 {} {}\r\n", response.status, reason(response.status));
    for (name, value) in &response.headers {
        out.push_str(&format!("{name}: {value}\r\n"));
    }
    out.push_str(&format!("Content-Length: {}\r\n", response.body.len()));
    out.push_str("Connection: close\r\n\r\n");

    let result = stream
        .write_all(out.as_bytes())
        .and_then(|_| stream.write_all(&response.body))
        .and_then(|_| stream.flush());
    if let Err(e) = result {
        tracing::debug!(error = %e, "client disconnected before response was written");
    }
}

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        201 => "Created",
        400 => "Bad Request",
        404 => "Not Found",
        405 => "Method Not Allowed",
        409 => "Conflict",
        413 => "Payload Too Large",
        500 => "Internal Server Error",
        _ => "",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn read(raw: &str, max_body: usize) -> Option<Result<HttpRequest, RequestError>> {
        read_request(&mut Cursor::new(raw.as_bytes().to_vec()), max_body)
    }

    #[test]
    fn test_reads_request_with_body() {
        let raw = "POST /engineers/e-1/skills HTTP/1.1\r\nHost: x\r\nContent-Length: 17\r\n\r\n\
                   {\"skillId\":\"go\"}\n";
        let req = read(raw, 1024).unwrap().unwrap();
        assert_eq!(req.method, "POST");
        assert_eq!(req.path, "/engineers/e-1/skills");
        assert_eq!(req.body, b"{\"skillId\":\"go\"}\n");
    }

    #[test]
    fn test_empty_stream_is_clean_close() {
        assert!(read("", 1024).is_none());
    }

    #[test]
    fn test_oversized_body_rejected() {
        let raw = "POST / HTTP/1.1\r\nContent-Length: 2048\r\n\r\n";
        let err = read(raw, 1024).unwrap().unwrap_err();
        assert_eq!(err, RequestError::TooLarge);
        assert_eq!(err.status(), 413);
    }

    #[test]
    fn test_chunked_and_garbage_rejected() {
        let chunked = "POST / HTTP/1.1\r\nTransfer-Encoding: chunked\r\n\r\n";
        assert_eq!(read(chunked, 1024).unwrap().unwrap_err().status(), 400);

        let garbage = "NOT AN HTTP REQUEST\r\n\r\n";
        assert_eq!(read(garbage, 1024).unwrap().unwrap_err().status(), 400);
    }

    #[test]
    fn test_write_response_frames_body() {
        let mut out = Vec::new();
        write_response(
            &mut out,
            &HttpResponse {
                status: 201,
                headers: vec![("Content-Type".into(), "application/json".into())],
                body: b"{}".to_vec(),
            },
        );
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("HTTP/1.1 201 Created\r\n"));
        assert!(text.contains("Content-Length: 2\r\n"));
        assert!(text.contains("Connection: close\r\n"));
        assert!(text.ends_with("\r\n\r\n{}"));
    }
}
