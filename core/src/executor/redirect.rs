//! Redirect state machine.
//!
//! # Design
//! One exchange walks `Sending -> RedirectReceived -> Sending ...` until it
//! reaches `Done` or fails. Whether a redirect is followed depends on a
//! `Policy` fixed up front from (verb, method, follow clause):
//!
//! | policy       | 301/302/303                 | 307/308 |
//! |--------------|-----------------------------|---------|
//! | `FollowAll`  | follow, switch to GET       | follow, keep method and body |
//! | `SmartWrite` | reject                      | follow, keep method and body |
//! | `Advise`     | stop, write an advisory     | stop    |
//! | `NoFollow`   | stop                        | stop    |
//!
//! Under `follow=smart` a request is a write when either its verb or its
//! method is, so `save using=POST` gets `SmartWrite`.
//!
//! Every response's `Set-Cookie` values are collected and kept in a per-host
//! jar that is replayed on later hops to the same host. A hop to a
//! different host drops `Authorization` and `Cookie`.

use std::collections::BTreeMap;
use std::io::Write;
use std::time::Instant;

use tracing::debug;
use url::Url;

use crate::error::ExecutionError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse};
use crate::types::{FollowPolicy, Verb};

use super::transport::{SendOptions, Transport};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Policy {
    FollowAll,
    SmartWrite,
    Advise,
    NoFollow,
}

impl Policy {
    pub fn for_request(verb: Verb, method: HttpMethod, follow: FollowPolicy) -> Self {
        let follows_by_default = matches!(verb, Verb::Read | Verb::Save | Verb::Authenticate);
        let write = verb.is_write() || method.is_write();
        match follow {
            FollowPolicy::Smart if write => Policy::SmartWrite,
            FollowPolicy::Smart => Policy::FollowAll,
            FollowPolicy::Default if follows_by_default => Policy::FollowAll,
            FollowPolicy::Default if write => Policy::Advise,
            FollowPolicy::Default => Policy::NoFollow,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Decision {
    Follow,
    Stop,
    Advise,
    Reject,
}

fn decide(policy: Policy, status: u16) -> Decision {
    let preserving = matches!(status, 307 | 308);
    match policy {
        Policy::FollowAll => Decision::Follow,
        Policy::SmartWrite if preserving => Decision::Follow,
        Policy::SmartWrite => Decision::Reject,
        Policy::Advise if preserving => Decision::Stop,
        Policy::Advise => Decision::Advise,
        Policy::NoFollow => Decision::Stop,
    }
}

pub fn is_redirect(status: u16) -> bool {
    matches!(status, 301 | 302 | 303 | 307 | 308)
}

/// Final response of one exchange.
#[derive(Debug, Clone)]
pub struct Outcome {
    pub response: HttpResponse,
    /// URL the final response came from.
    pub url: String,
    /// Every `Set-Cookie` seen on any hop, then the jar's pairs for the
    /// original host.
    pub set_cookies: Vec<String>,
}

/// `name=value` pairs captured per host during one exchange.
#[derive(Debug, Default)]
struct CookieJar {
    hosts: BTreeMap<String, Vec<(String, String)>>,
}

impl CookieJar {
    fn store(&mut self, host: &str, set_cookie: &str) {
        let pair = set_cookie.split(';').next().unwrap_or_default().trim();
        let Some((name, value)) = pair.split_once('=') else {
            return;
        };
        if name.is_empty() {
            return;
        }
        let entries = self.hosts.entry(host.to_string()).or_default();
        match entries.iter_mut().find(|(n, _)| n == name) {
            Some(entry) => entry.1 = value.to_string(),
            None => entries.push((name.to_string(), value.to_string())),
        }
    }

    /// Adds jar cookies for `host` that the request does not already carry.
    fn apply(&self, host: &str, request: &mut HttpRequest) {
        let Some(entries) = self.hosts.get(host) else {
            return;
        };
        let existing = request.header("Cookie").unwrap_or_default().to_string();
        let present: Vec<&str> = existing
            .split(';')
            .filter_map(|p| p.trim().split_once('=').map(|(n, _)| n))
            .collect();
        let added: Vec<String> = entries
            .iter()
            .filter(|(name, _)| !present.contains(&name.as_str()))
            .map(|(name, value)| format!("{name}={value}"))
            .collect();
        if added.is_empty() {
            return;
        }
        let merged = if existing.is_empty() {
            added.join("; ")
        } else {
            format!("{existing}; {}", added.join("; "))
        };
        request.set_header("Cookie", merged);
    }

    fn pairs(&self, host: &str) -> impl Iterator<Item = String> + '_ {
        self.hosts
            .get(host)
            .into_iter()
            .flatten()
            .map(|(name, value)| format!("{name}={value}"))
    }
}

enum State {
    Sending(HttpRequest),
    RedirectReceived { request: HttpRequest, response: HttpResponse },
    Done { request: HttpRequest, response: HttpResponse },
}

pub struct Redirector<'a, T: Transport + ?Sized> {
    pub transport: &'a T,
    /// `timeout` is ignored; each hop gets the time left before `deadline`.
    pub options: SendOptions,
    pub policy: Policy,
    pub max_redirects: usize,
    pub deadline: Instant,
    pub verbose: bool,
}

impl<T: Transport + ?Sized> Redirector<'_, T> {
    pub fn run(&self, request: HttpRequest, diag: &mut dyn Write) -> Result<Outcome, ExecutionError> {
        let origin = authority(&request.url);
        let mut jar = CookieJar::default();
        let mut set_cookies = Vec::new();
        let mut hops = 0;
        let mut state = State::Sending(request);

        loop {
            state = match state {
                State::Sending(request) => {
                    let response = self.send(&request, diag)?;
                    let host = authority(&request.url);
                    for cookie in response.header_values("Set-Cookie") {
                        jar.store(&host, cookie);
                        set_cookies.push(cookie.to_string());
                    }
                    if is_redirect(response.status) && response.header("Location").is_some() {
                        State::RedirectReceived { request, response }
                    } else {
                        State::Done { request, response }
                    }
                }
                State::RedirectReceived { request, response } => {
                    match decide(self.policy, response.status) {
                        Decision::Stop => State::Done { request, response },
                        Decision::Advise => {
                            writeln!(
                                diag,
                                "Advisory: {} redirect for write verb, not following",
                                response.status
                            )
                            .map_err(ExecutionError::Output)?;
                            State::Done { request, response }
                        }
                        Decision::Reject => return Err(ExecutionError::RedirectRejected(response.status)),
                        Decision::Follow => {
                            if hops >= self.max_redirects {
                                return Err(ExecutionError::TooManyRedirects(self.max_redirects));
                            }
                            hops += 1;
                            let mut next = next_hop(request, &response)?;
                            jar.apply(&authority(&next.url), &mut next);
                            writeln!(diag, "→ {} {} {}", response.status, next.method, next.url)
                                .map_err(ExecutionError::Output)?;
                            debug!(status = response.status, url = %next.url, hop = hops, "following redirect");
                            State::Sending(next)
                        }
                    }
                }
                State::Done { request, response } => {
                    set_cookies.extend(jar.pairs(&origin));
                    return Ok(Outcome { response, url: request.url, set_cookies });
                }
            };
        }
    }

    fn send(&self, request: &HttpRequest, diag: &mut dyn Write) -> Result<HttpResponse, ExecutionError> {
        let remaining = self.deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(ExecutionError::Timeout);
        }
        let options = SendOptions {
            timeout: Some(remaining),
            ..self.options.clone()
        };

        if self.verbose {
            writeln!(diag, "> {} {}", request.method, request.url).map_err(ExecutionError::Output)?;
            for (name, value) in &request.headers {
                writeln!(diag, "> {name}: {value}").map_err(ExecutionError::Output)?;
            }
        }
        let response = self.transport.send(request, &options)?;
        if self.verbose {
            writeln!(diag, "< {}", response.status).map_err(ExecutionError::Output)?;
            for (name, value) in &response.headers {
                writeln!(diag, "< {name}: {value}").map_err(ExecutionError::Output)?;
            }
        }
        Ok(response)
    }
}

/// Request for the hop `response` points at.
fn next_hop(mut request: HttpRequest, response: &HttpResponse) -> Result<HttpRequest, ExecutionError> {
    let location = response.header("Location").unwrap_or_default();
    let next_url = Url::parse(&request.url)
        .and_then(|base| base.join(location))
        .map_err(|e| ExecutionError::Network(format!("invalid redirect location '{location}': {e}")))?;
    let next_url: String = next_url.into();

    if matches!(response.status, 301 | 302 | 303) {
        if request.method != HttpMethod::Head {
            request.method = HttpMethod::Get;
        }
        request.body = None;
        request.remove_header("Content-Type");
        request.remove_header("Content-Length");
    }
    if authority(&request.url) != authority(&next_url) {
        request.remove_header("Authorization");
        request.remove_header("Cookie");
    }
    request.url = next_url;
    Ok(request)
}

fn authority(url: &str) -> String {
    Url::parse(url)
        .ok()
        .and_then(|u| {
            u.host_str().map(|h| match u.port() {
                Some(port) => format!("{h}:{port}"),
                None => h.to_string(),
            })
        })
        .unwrap_or_default()
}
