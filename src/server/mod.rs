//! HTTP surface for skillsheet
//!
//! Design: blocking HTTP microserver (no async runtime). One request per
//! connection, one thread per connection, one database transaction per
//! request.

pub mod handlers;
pub mod microserver;
pub mod router;

use anyhow::{Context, Result};
use parking_lot::Mutex;
use std::io::{Read, Write};
use std::net::{Shutdown, TcpListener};
use std::sync::Arc;
use std::time::Instant;

use crate::db::SqliteDatabase;
use crate::error::ServiceResult;
pub use router::{route_request, HttpRequest, HttpResponse};

/// Default request body limit (1 MiB)
pub const DEFAULT_MAX_BODY_BYTES: usize = 1_048_576;

/// Options for the serve command
#[derive(Debug, Clone)]
pub struct ServeOptions {
    pub host: String,
    pub port: u16,
    pub max_body_bytes: usize,
}

impl Default for ServeOptions {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}

impl ServeOptions {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Server state shared across request handlers
pub struct ServerState {
    start_time: Instant,
    version: String,
    db: Mutex<SqliteDatabase>,
    max_body_bytes: usize,
}

impl ServerState {
    pub fn new(db: SqliteDatabase, max_body_bytes: usize) -> Self {
        Self {
            start_time: Instant::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            db: Mutex::new(db),
            max_body_bytes,
        }
    }

    fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Run `f` with exclusive use of the database connection
    fn with_db<T>(
        &self,
        f: impl FnOnce(&mut SqliteDatabase) -> ServiceResult<T>,
    ) -> ServiceResult<T> {
        let mut db = self.db.lock();
        f(&mut db)
    }
}

// === Transport: microserver accept loop ===

/// Convert microserver request to internal HttpRequest
fn from_micro(req: microserver::HttpRequest) -> HttpRequest {
    HttpRequest {
        method: req.method,
        path: req.path,
        headers: req.headers,
        body: req.body,
    }
}

/// Convert internal HttpResponse to microserver response
fn to_micro(resp: HttpResponse) -> microserver::HttpResponse {
    microserver::HttpResponse {
        status: resp.status,
        headers: resp.headers,
        body: resp.body,
    }
}

/// Handle one connection on any Read + Write stream.
///
/// Takes `&mut` so the caller keeps the concrete stream and can shut down
/// its write half once the response is out.
pub fn handle_connection(stream: &mut (impl Read + Write), state: &ServerState) {
    let resp = match microserver::read_request(stream, state.max_body_bytes) {
        Some(Ok(req)) => route_request(&from_micro(req), state),
        Some(Err(err)) => {
            tracing::warn!(status = err.status(), error = err.message(), "unreadable request");
            router::with_security_headers(router::json_error(err.status(), err.message()))
        }
        None => return,
    };

    microserver::write_response(stream, &to_micro(resp));
}

/// Bind and serve until the process is stopped
pub fn run(options: &ServeOptions, db: SqliteDatabase) -> Result<()> {
    let addr = options.addr();
    let listener =
        TcpListener::bind(&addr).with_context(|| format!("Failed to bind {addr}"))?;
    let state = Arc::new(ServerState::new(db, options.max_body_bytes));

    tracing::info!(%addr, version = %state.version, "skillsheet server listening");
    accept_loop(listener, state);
    Ok(())
}

fn accept_loop(listener: TcpListener, state: Arc<ServerState>) {
    for stream in listener.incoming() {
        match stream {
            Ok(mut stream) => {
                let state = Arc::clone(&state);
                std::thread::spawn(move || {
                    handle_connection(&mut stream, &state);
                    let _ = stream.shutdown(Shutdown::Write);
                });
            }
            Err(e) => tracing::warn!(error = %e, "accept failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// In-memory duplex stream: reads from `input`, collects writes
    struct Duplex {
        input: std::io::Cursor<Vec<u8>>,
        output: Vec<u8>,
    }

    impl Read for Duplex {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            self.input.read(buf)
        }
    }

    impl Write for Duplex {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.output.write(buf)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn exchange(raw: &str, max_body: usize) -> anyhow::Result<String> {
        let state = ServerState::new(SqliteDatabase::open_in_memory()?, max_body);
        let mut stream = Duplex {
            input: std::io::Cursor::new(raw.as_bytes().to_vec()),
            output: Vec::new(),
        };
        handle_connection(&mut stream, &state);
        Ok(String::from_utf8(stream.output)?)
    }

    #[test]
    fn test_connection_round_trip() -> anyhow::Result<()> {
        let out = exchange("GET /processes/1 HTTP/1.1\r\nHost: x\r\n\r\n", 1024)?;
        assert!(out.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(out.contains("X-Frame-Options: DENY"));
        assert!(out.contains("\"Requirements definition\""));
        Ok(())
    }

    #[test]
    fn test_body_limit_enforced_at_transport() -> anyhow::Result<()> {
        let out = exchange("POST /engineers HTTP/1.1\r\nContent-Length: 4096\r\n\r\n", 64)?;
        assert!(out.starts_with("HTTP/1.1 413 Payload Too Large\r\n"));
        Ok(())
    }

    #[test]
    fn test_default_options() {
        assert_eq!(ServeOptions::default().addr(), "127.0.0.1:3000");
    }
}
