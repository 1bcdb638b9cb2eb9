//! The single place that performs network I/O.
//!
//! # Design
//! `Transport` sends one `HttpRequest` and returns one `HttpResponse`, with
//! no redirect following and no status interpretation. Everything above it
//! (redirects, retries, decoding, assertions) works on plain data, so tests
//! can swap in a scripted transport.

use std::io;
use std::time::Duration;

use tracing::debug;
use ureq::http;

use crate::error::TransportError;
use crate::http::{HttpRequest, HttpResponse};

const USER_AGENT: &str = concat!("req/", env!("CARGO_PKG_VERSION"));

/// Per-send knobs taken from the plan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SendOptions {
    /// Time left on the exchange deadline.
    pub timeout: Option<Duration>,
    pub size_limit: Option<u64>,
    pub proxy: Option<String>,
    pub insecure: bool,
}

pub trait Transport {
    fn send(&self, request: &HttpRequest, options: &SendOptions) -> Result<HttpResponse, TransportError>;
}

/// `ureq`-backed transport. Redirects and status errors are disabled in the
/// agent; the executor owns both.
#[derive(Debug, Default, Clone, Copy)]
pub struct UreqTransport;

impl UreqTransport {
    fn agent(options: &SendOptions) -> Result<ureq::Agent, TransportError> {
        let proxy = options
            .proxy
            .as_deref()
            .map(|p| ureq::Proxy::new(p).map_err(|_| TransportError::InvalidProxy(p.to_string())))
            .transpose()?;
        let mut builder = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .max_redirects(0)
            .max_redirects_will_error(false)
            .user_agent(USER_AGENT)
            .timeout_global(options.timeout)
            .proxy(proxy);
        if options.insecure {
            builder = builder.tls_config(
                ureq::tls::TlsConfig::builder()
                    .disable_verification(true)
                    .build(),
            );
        }
        Ok(builder.build().new_agent())
    }
}

impl Transport for UreqTransport {
    fn send(&self, request: &HttpRequest, options: &SendOptions) -> Result<HttpResponse, TransportError> {
        let agent = Self::agent(options)?;
        let mut builder = http::Request::builder()
            .method(request.method.as_str())
            .uri(request.url.as_str());
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        debug!(method = %request.method, url = %request.url, "sending request");

        let mut response = match &request.body {
            Some(body) => run(&agent, builder, body.clone())?,
            None => run(&agent, builder, ())?,
        };

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect();
        let body = response
            .body_mut()
            .with_config()
            .limit(options.size_limit.unwrap_or(u64::MAX))
            .read_to_vec()
            .map_err(|e| map_error(e, options))?;
        debug!(status, bytes = body.len(), "received response");

        Ok(HttpResponse { status, headers, body })
    }
}

fn run<B: ureq::AsSendBody>(
    agent: &ureq::Agent,
    builder: http::request::Builder,
    body: B,
) -> Result<http::Response<ureq::Body>, TransportError> {
    let request = builder
        .body(body)
        .map_err(|e| TransportError::InvalidRequest(e.to_string()))?;
    agent
        .run(request)
        .map_err(|e| map_error(e, &SendOptions::default()))
}

fn map_error(err: ureq::Error, options: &SendOptions) -> TransportError {
    match err {
        ureq::Error::Timeout(_) => TransportError::Timeout,
        ureq::Error::BodyExceedsLimit(limit) => {
            TransportError::SizeLimit(options.size_limit.unwrap_or(limit))
        }
        ureq::Error::Io(e) if e.kind() == io::ErrorKind::TimedOut => TransportError::Timeout,
        other => TransportError::Network(other.to_string()),
    }
}
