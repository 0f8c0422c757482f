//! Transport-free request routing
//!
//! Handlers only ever see `HttpRequest` / `HttpResponse` defined here; the
//! microserver types are converted at the connection boundary.

use serde::Serialize;
use serde_json::Value;
use std::time::Instant;

use super::handlers::{self, Master, Reply};
use super::ServerState;
use crate::error::{ServiceError, ServiceResult};
use crate::reconcile::{Envelope, IdentifierSet, PrincipalKind, Relation, Strategy};
use crate::records::masters::TagMapFilter;

/// HTTP request independent of transport
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: String,
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

/// HTTP response independent of transport
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl HttpRequest {
    pub fn new(method: &str, path: &str) -> Self {
        Self {
            method: method.to_string(),
            path: path.to_string(),
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    /// Attach a JSON body
    pub fn with_json(mut self, value: &Value) -> Self {
        self.headers
            .push(("Content-Type".to_string(), "application/json".to_string()));
        self.body = value.to_string().into_bytes();
        self
    }

    /// Get header value by name (case-insensitive)
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Value of one query-string parameter, percent-decoded; empty counts as absent
    pub fn query(&self, name: &str) -> Option<String> {
        let (_, query) = self.path.split_once('?')?;
        query
            .split('&')
            .filter_map(|pair| pair.split_once('='))
            .find(|(key, _)| *key == name)
            .and_then(|(_, value)| percent_decode(value))
            .filter(|value| !value.is_empty())
    }

    /// Parse the body as JSON; an empty body is a validation failure
    fn json(&self) -> ServiceResult<Value> {
        if self.body.iter().all(u8::is_ascii_whitespace) {
            return Err(ServiceError::validation("body", "Missing request body"));
        }
        serde_json::from_slice(&self.body)
            .map_err(|e| ServiceError::validation("body", format!("Invalid JSON: {e}")))
    }
}

impl HttpResponse {
    /// Create a JSON response
    pub fn json(status: u16, value: &impl Serialize) -> Self {
        Self {
            status,
            headers: vec![("Content-Type".to_string(), "application/json".to_string())],
            body: serde_json::to_vec(value).unwrap_or_default(),
        }
    }

    /// Add a header
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Health check response
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthResponse {
    status: String,
    version: String,
    uptime_secs: u64,
}

/// Add security headers to response
pub(crate) fn with_security_headers(response: HttpResponse) -> HttpResponse {
    response
        .with_header("X-Content-Type-Options", "nosniff")
        .with_header("X-Frame-Options", "DENY")
}

/// Consistent JSON error response
pub(crate) fn json_error(status: u16, message: &str) -> HttpResponse {
    HttpResponse::json(status, &Envelope::failure(message))
}

fn method_not_allowed(allow: &str) -> HttpResponse {
    json_error(405, "Method not allowed").with_header("Allow", allow)
}

/// Turn a handler result into a response, logging failures by class
fn respond(reply: Reply) -> HttpResponse {
    match reply {
        Ok((status, envelope)) => HttpResponse::json(status, &envelope),
        Err(err) => {
            if err.is_internal() {
                tracing::error!(error = %err, detail = ?err, "request failed");
            } else {
                tracing::warn!(error = %err, "request rejected");
            }
            let (status, envelope) = Envelope::from_error(&err);
            HttpResponse::json(status, &envelope)
        }
    }
}

/// Decode `%XX` escapes in one path segment
fn percent_decode(segment: &str) -> Option<String> {
    let bytes = segment.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = bytes.get(i + 1..i + 3)?;
            if !hex.iter().all(u8::is_ascii_hexdigit) {
                return None;
            }
            let hex = std::str::from_utf8(hex).ok()?;
            out.push(u8::from_str_radix(hex, 16).ok()?);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).ok()
}

/// Split the path (query string dropped) and decode each segment
fn segments(path: &str) -> Option<Vec<String>> {
    let path = path.split_once('?').map_or(path, |(path, _)| path);
    path.split('/')
        .filter(|segment| !segment.is_empty())
        .map(percent_decode)
        .collect()
}

/// Route request to handler
pub fn route_request(request: &HttpRequest, state: &ServerState) -> HttpResponse {
    let started = Instant::now();

    let response = match segments(&request.path) {
        Some(segs) => {
            let segs: Vec<&str> = segs.iter().map(String::as_str).collect();
            dispatch(request, state, &segs)
        }
        None => json_error(400, "Malformed request path"),
    };

    tracing::info!(
        method = %request.method,
        path = %request.path,
        status = response.status,
        latency_ms = started.elapsed().as_millis() as u64,
        "request"
    );
    with_security_headers(response)
}

fn dispatch(request: &HttpRequest, state: &ServerState, segs: &[&str]) -> HttpResponse {
    let method = request.method.as_str();

    if let [principal, id, segment] = segs {
        let relation = PrincipalKind::from_segment(principal)
            .and_then(|kind| Relation::resolve(kind, segment));
        if let Some(relation) = relation {
            return links(request, state, relation, id);
        }
    }

    match segs {
        ["health"] => match method {
            "GET" => handle_health(state),
            _ => method_not_allowed("GET"),
        },

        ["engineers"] => match method {
            "GET" => respond(state.with_db(handlers::list_engineers)),
            "POST" => respond(request.json().and_then(|body| {
                state.with_db(|db| handlers::create_engineer(db, &body))
            })),
            _ => method_not_allowed("GET, POST"),
        },

        ["engineers", id, "career-histories"] => match method {
            "GET" => respond(state.with_db(|db| handlers::list_careers(db, id))),
            "POST" => respond(request.json().and_then(|body| {
                state.with_db(|db| handlers::create_careers(db, id, &body))
            })),
            _ => method_not_allowed("GET, POST"),
        },

        ["engineers", ids @ ..] => records(request, state, PrincipalKind::Engineer, ids),
        ["career-histories", ids @ ..] => records(request, state, PrincipalKind::CareerRecord, ids),

        ["skills", "tag-maps"] => match method {
            "GET" => {
                let filter = TagMapFilter {
                    skill: request.query("skillId"),
                    tag: request.query("tagId"),
                };
                respond(state.with_db(|db| handlers::list_tag_maps(db, &filter)))
            }
            _ => method_not_allowed("GET"),
        },
        ["skills", "categories", ids @ ..] => masters(request, state, Master::Categories, ids),
        ["skills", "tags", ids @ ..] => masters(request, state, Master::Tags, ids),
        ["skills", ids @ ..] => masters(request, state, Master::Skills, ids),
        ["qualifications", ids @ ..] => masters(request, state, Master::Qualifications, ids),
        ["processes", ids @ ..] => masters(request, state, Master::Processes, ids),

        _ => json_error(404, "Not found"),
    }
}

/// `/{principals}/{id}/{relation}`
fn links(
    request: &HttpRequest,
    state: &ServerState,
    relation: Relation,
    id: &str,
) -> HttpResponse {
    let merge = relation.strategy() == Strategy::Merge;
    match request.method.as_str() {
        "GET" => respond(state.with_db(|db| handlers::list_links(db, relation, id))),
        "POST" => respond(request.json().and_then(|body| {
            state.with_db(|db| handlers::apply_links(db, relation, id, &body))
        })),
        "PUT" if merge => respond(request.json().and_then(|body| {
            state.with_db(|db| handlers::apply_links(db, relation, id, &body))
        })),
        "DELETE" => respond(request.json().and_then(|body| {
            state.with_db(|db| handlers::delete_links(db, relation, id, &body))
        })),
        _ if merge => method_not_allowed("GET, POST, PUT, DELETE"),
        _ => method_not_allowed("GET, POST, DELETE"),
    }
}

/// `/engineers/{ids}` and `/career-histories/{ids}`
fn records(
    request: &HttpRequest,
    state: &ServerState,
    kind: PrincipalKind,
    ids: &[&str],
) -> HttpResponse {
    let ids = match IdentifierSet::parse(ids) {
        Ok(ids) => ids,
        Err(err) => return respond(Err(err)),
    };

    match request.method.as_str() {
        "GET" => respond(state.with_db(|db| handlers::get_records(db, kind, &ids))),
        "PUT" => respond(request.json().and_then(|body| {
            state.with_db(|db| handlers::update_records(db, kind, &ids, &body))
        })),
        "DELETE" => respond(state.with_db(|db| handlers::delete_records(db, kind, &ids))),
        _ => method_not_allowed("GET, PUT, DELETE"),
    }
}

/// Read-only master data, whole list or by ids
fn masters(
    request: &HttpRequest,
    state: &ServerState,
    master: Master,
    ids: &[&str],
) -> HttpResponse {
    if request.method != "GET" {
        return method_not_allowed("GET");
    }
    if ids.is_empty() {
        return respond(state.with_db(|db| handlers::list_master(db, master)));
    }
    respond(IdentifierSet::parse(ids).and_then(|ids| {
        state.with_db(|db| handlers::get_master(db, master, &ids))
    }))
}

/// Handle GET /health
fn handle_health(state: &ServerState) -> HttpResponse {
    HttpResponse::json(
        200,
        &HealthResponse {
            status: "ok".to_string(),
            version: state.version.clone(),
            uptime_secs: state.uptime_secs(),
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::SqliteDatabase;
    use serde_json::json;

    fn state() -> anyhow::Result<ServerState> {
        Ok(ServerState::new(SqliteDatabase::open_in_memory()?, 1024))
    }

    fn body(response: &HttpResponse) -> anyhow::Result<Value> {
        Ok(serde_json::from_slice(&response.body)?)
    }

    #[test]
    fn test_percent_decode() {
        assert_eq!(percent_decode("a%2Cb").as_deref(), Some("a,b"));
        assert_eq!(percent_decode("c%2B%2B").as_deref(), Some("c++"));
        assert_eq!(percent_decode("bad%2"), None);
        assert_eq!(percent_decode("bad%zz"), None);
    }

    #[test]
    fn test_segments_drop_query_and_empty_parts() {
        assert_eq!(
            segments("/skills/a%2Cb/?verbose=1"),
            Some(vec!["skills".to_string(), "a,b".to_string()])
        );
    }

    #[test]
    fn test_query_param() {
        let request = HttpRequest::new("GET", "/skills/tag-maps?tagId=c%2B%2B&skillId=&x");
        assert_eq!(request.query("tagId").as_deref(), Some("c++"));
        assert_eq!(request.query("skillId"), None);
        assert_eq!(request.query("x"), None);
        assert_eq!(HttpRequest::new("GET", "/skills").query("tagId"), None);
    }

    #[test]
    fn test_health_and_security_headers() -> anyhow::Result<()> {
        let state = state()?;
        let response = route_request(&HttpRequest::new("GET", "/health"), &state);
        assert_eq!(response.status, 200);
        assert_eq!(response.header("X-Content-Type-Options"), Some("nosniff"));
        assert_eq!(response.header("X-Frame-Options"), Some("DENY"));

        let value = body(&response)?;
        assert_eq!(value["status"], "ok");
        assert!(value["uptimeSecs"].is_u64());
        Ok(())
    }

    #[test]
    fn test_unknown_route_and_method() -> anyhow::Result<()> {
        let state = state()?;
        let response = route_request(&HttpRequest::new("GET", "/nowhere"), &state);
        assert_eq!(response.status, 404);
        assert_eq!(body(&response)?["success"], false);

        let response = route_request(&HttpRequest::new("PATCH", "/skills"), &state);
        assert_eq!(response.status, 405);
        assert_eq!(response.header("Allow"), Some("GET"));

        let request = HttpRequest::new("PUT", "/career-histories/c-1/processes");
        let response = route_request(&request, &state);
        assert_eq!(response.status, 405);

        let response = route_request(&HttpRequest::new("POST", "/skills/tag-maps"), &state);
        assert_eq!(response.status, 405);
        Ok(())
    }

    #[test]
    fn test_invalid_json_is_bad_request() -> anyhow::Result<()> {
        let state = state()?;
        let mut request = HttpRequest::new("POST", "/engineers");
        request.body = b"{not json".to_vec();
        let response = route_request(&request, &state);
        assert_eq!(response.status, 400);
        assert_eq!(body(&response)?["details"][0]["path"], "body");

        let response = route_request(&HttpRequest::new("POST", "/engineers"), &state);
        assert_eq!(response.status, 400);
        Ok(())
    }

    #[test]
    fn test_link_route_validates_before_gate() -> anyhow::Result<()> {
        let state = state()?;
        let request = HttpRequest::new("POST", "/career-histories/ghost/processes")
            .with_json(&json!({"processIds": []}));
        let response = route_request(&request, &state);
        assert_eq!(response.status, 400);

        let request = HttpRequest::new("POST", "/career-histories/ghost/processes")
            .with_json(&json!({"processIds": [1]}));
        let response = route_request(&request, &state);
        assert_eq!(response.status, 404);
        assert_eq!(body(&response)?["error"], "Career history not found");
        Ok(())
    }
}
