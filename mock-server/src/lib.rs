//! HTTP fixture server for the `req` integration tests.
//!
//! Every route is deterministic except `/counter`, which counts hits per
//! `app()` instance.

use std::collections::{BTreeMap, HashMap};
use std::io::{self, Write};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, HeaderMap, Method, StatusCode, Uri},
    response::{AppendHeaders, IntoResponse, Response},
    routing::{any, get},
    Json, Router,
};
use flate2::{write::GzEncoder, Compression};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;

pub const BLOB: &[u8] = b"0123456789abcdef";
pub const LOGIN_COOKIE: &str = "session=test-session-123";
pub const LOGIN_TOKEN: &str = "test-token-456";
pub const REDIRECT_LOGIN_COOKIE: &str = "session=redirected-789";
pub const LARGE_SIZE: usize = 1024 * 1024;

/// What `/echo` saw.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Echo {
    pub method: String,
    pub path: String,
    pub query: Option<String>,
    /// Lowercased names; repeated headers joined with `, `.
    pub headers: BTreeMap<String, String>,
    pub body: String,
}

#[derive(Clone, Default)]
struct AppState {
    hits: Arc<AtomicU64>,
}

#[derive(Deserialize)]
struct RedirectQuery {
    to: Option<String>,
}

pub fn app() -> Router {
    Router::new()
        .route("/echo", any(echo))
        .route("/final", any(echo))
        .route("/redirect/{code}", any(redirect))
        .route("/chain/{hops}/{code}", any(chain))
        .route("/status/{code}", any(status))
        .route("/json", get(json))
        .route("/gzip", get(gzip_json))
        .route("/br-gzip", get(br_gzip_json))
        .route("/login", any(login))
        .route("/login/redirect", any(login_redirect))
        .route("/login/landing", get(login_landing))
        .route("/counter", get(counter))
        .route("/blob", get(blob))
        .route("/large", get(large))
        .with_state(AppState::default())
}

pub async fn run(listener: TcpListener) -> Result<(), io::Error> {
    axum::serve(listener, app()).await
}

async fn echo(method: Method, uri: Uri, headers: HeaderMap, body: Bytes) -> Json<Echo> {
    let mut seen: BTreeMap<String, String> = BTreeMap::new();
    for (name, value) in &headers {
        let value = String::from_utf8_lossy(value.as_bytes()).into_owned();
        seen.entry(name.as_str().to_string())
            .and_modify(|prev| {
                prev.push_str(", ");
                prev.push_str(&value);
            })
            .or_insert(value);
    }
    Json(Echo {
        method: method.to_string(),
        path: uri.path().to_string(),
        query: uri.query().map(str::to_string),
        headers: seen,
        body: String::from_utf8_lossy(&body).into_owned(),
    })
}

fn status_code(code: u16) -> Result<StatusCode, StatusCode> {
    StatusCode::from_u16(code).map_err(|_| StatusCode::BAD_REQUEST)
}

/// `code` redirect to `?to=` (default `/final`).
async fn redirect(Path(code): Path<u16>, Query(q): Query<RedirectQuery>) -> Result<Response, StatusCode> {
    let location = q.to.unwrap_or_else(|| "/final".to_string());
    Ok((status_code(code)?, [(header::LOCATION, location)]).into_response())
}

/// `hops` redirects of status `code`, ending at `/final`.
async fn chain(Path((hops, code)): Path<(u32, u16)>) -> Result<Response, StatusCode> {
    let location = match hops {
        0 | 1 => "/final".to_string(),
        n => format!("/chain/{}/{code}", n - 1),
    };
    Ok((status_code(code)?, [(header::LOCATION, location)]).into_response())
}

async fn status(Path(code): Path<u16>) -> Result<Response, StatusCode> {
    let code = status_code(code)?;
    Ok((code, format!("status {}", code.as_u16())).into_response())
}

fn sample() -> serde_json::Value {
    serde_json::json!({
        "state": "done",
        "items": [{"id": 1, "name": "alpha"}, {"id": 2, "name": "beta"}]
    })
}

async fn json() -> Json<serde_json::Value> {
    Json(sample())
}

fn gzip(data: &[u8]) -> io::Result<Vec<u8>> {
    let mut enc = GzEncoder::new(Vec::new(), Compression::default());
    enc.write_all(data)?;
    enc.finish()
}

fn brotli(data: &[u8]) -> io::Result<Vec<u8>> {
    let mut out = Vec::new();
    {
        let mut writer = brotli::CompressorWriter::new(&mut out, 4096, 5, 22);
        writer.write_all(data)?;
        writer.flush()?;
    }
    Ok(out)
}

fn encoded(encoding: &'static str, body: Vec<u8>) -> Response {
    (
        [
            (header::CONTENT_TYPE, "application/json"),
            (header::CONTENT_ENCODING, encoding),
        ],
        body,
    )
        .into_response()
}

async fn gzip_json() -> Result<Response, StatusCode> {
    let body = gzip(sample().to_string().as_bytes()).map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    Ok(encoded("gzip", body))
}

/// Brotli applied first, then gzip.
async fn br_gzip_json() -> Result<Response, StatusCode> {
    let body = brotli(sample().to_string().as_bytes())
        .and_then(|b| gzip(&b))
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    Ok(encoded("br, gzip", body))
}

async fn login() -> Response {
    (
        AppendHeaders([(header::SET_COOKIE, format!("{LOGIN_COOKIE}; Path=/; HttpOnly"))]),
        Json(serde_json::json!({"access_token": LOGIN_TOKEN, "token_type": "bearer"})),
    )
        .into_response()
}

/// Sets the session cookie on the redirect itself, not the landing page.
async fn login_redirect() -> Response {
    (
        StatusCode::FOUND,
        AppendHeaders([
            (header::SET_COOKIE, format!("{REDIRECT_LOGIN_COOKIE}; Path=/")),
            (header::LOCATION, "/login/landing".to_string()),
        ]),
    )
        .into_response()
}

async fn login_landing(headers: HeaderMap) -> String {
    let cookie = headers
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    format!("welcome ({cookie})")
}

async fn counter(State(state): State<AppState>) -> Json<HashMap<&'static str, u64>> {
    let count = state.hits.fetch_add(1, Ordering::SeqCst) + 1;
    Json(HashMap::from([("count", count)]))
}

/// `BLOB`, honoring `Range: bytes=<start>-`.
async fn blob(headers: HeaderMap) -> Response {
    let start = headers
        .get(header::RANGE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("bytes="))
        .and_then(|v| v.strip_suffix('-'))
        .and_then(|v| v.parse::<usize>().ok());
    match start {
        Some(start) if start < BLOB.len() => (
            StatusCode::PARTIAL_CONTENT,
            [(
                header::CONTENT_RANGE,
                format!("bytes {start}-{}/{}", BLOB.len() - 1, BLOB.len()),
            )],
            BLOB[start..].to_vec(),
        )
            .into_response(),
        Some(_) => StatusCode::RANGE_NOT_SATISFIABLE.into_response(),
        None => BLOB.to_vec().into_response(),
    }
}

async fn large() -> Vec<u8> {
    vec![b'x'; LARGE_SIZE]
}
