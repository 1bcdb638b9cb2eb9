//! Planner: folds a parsed `Command` into an `ExecutionPlan`.
//!
//! # Design
//! Planning runs in two passes. Verb defaults come first (method, output
//! format). Then each clause mutates the plan in command order,
//! so a later clause wins where two clauses touch the same field. The match
//! over `Clause` is exhaustive, and a new clause variant will not compile
//! until it has a planning rule.
//!
//! The result is side-effect free: nothing here performs network I/O. The
//! only filesystem access is the `save` destination check (is it a
//! directory?).

use std::path::Path;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use percent_encoding::percent_decode_str;
use serde::{Serialize, Serializer};
use url::Url;

use crate::error::PlanError;
use crate::http::{self, HttpMethod};
use crate::types::{
    AttachPart, BodyKind, BodySource, BodySpec, Clause, Command, ExpectCheck, FollowPolicy,
    IncludeItem, Limit, OutputFormat, Verb,
};

pub const DEFAULT_RETRY_ATTEMPTS: u32 = 3;
pub const DEFAULT_BACKOFF_MIN: Duration = Duration::from_millis(200);
pub const DEFAULT_BACKOFF_MAX: Duration = Duration::from_secs(5);
/// Polling interval for `watch ... until=` without `every=`.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);
/// Filename for `save` when the URL path gives nothing usable.
pub const FALLBACK_FILENAME: &str = "download";

/// A fully resolved HTTP exchange, ready for the executor.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionPlan {
    pub verb: Verb,
    pub method: HttpMethod,
    pub url: String,
    /// Last write wins per name (case-insensitive).
    pub headers: Vec<(String, String)>,
    /// Insertion order, repeats preserved.
    pub query_params: Vec<(String, String)>,
    /// Last write wins per name.
    pub cookies: Vec<(String, String)>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<BodyPlan>,
    pub output: OutputPlan,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry: Option<RetryPlan>,
    #[serde(rename = "timeout_ms", serialize_with = "opt_millis", skip_serializing_if = "Option::is_none")]
    pub timeout: Option<Duration>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_limit: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proxy: Option<String>,
    pub insecure: bool,
    pub verbose: bool,
    pub resume: bool,
    pub follow: FollowPolicy,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub expect: Vec<ExpectCheck>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub poll: Option<PollPlan>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase", tag = "type")]
pub enum BodyPlan {
    Content {
        kind: BodyKind,
        source: BodySource,
        /// Kind was guessed from the value's shape.
        inferred: bool,
    },
    Multipart {
        parts: Vec<AttachPart>,
        #[serde(skip_serializing_if = "Option::is_none")]
        boundary: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutputPlan {
    pub format: OutputFormat,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pick: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RetryPlan {
    pub attempts: u32,
    #[serde(rename = "backoff_min_ms", serialize_with = "millis")]
    pub backoff_min: Duration,
    #[serde(rename = "backoff_max_ms", serialize_with = "millis")]
    pub backoff_max: Duration,
}

impl RetryPlan {
    /// Delay before retry number `attempt` (1-based): doubles from the
    /// minimum and is capped at the maximum.
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.backoff_min
            .checked_mul(factor)
            .map_or(self.backoff_max, |d| d.min(self.backoff_max))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PollPlan {
    #[serde(rename = "interval_ms", serialize_with = "millis")]
    pub interval: Duration,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub until: Option<ExpectCheck>,
}

fn millis<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
}

fn opt_millis<S: Serializer>(d: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
    match d {
        Some(d) => millis(d, s),
        None => s.serialize_none(),
    }
}

const READ_METHODS: &[HttpMethod] = &[HttpMethod::Get, HttpMethod::Head, HttpMethod::Options];
const SAVE_METHODS: &[HttpMethod] = &[HttpMethod::Get, HttpMethod::Post];
const SEND_METHODS: &[HttpMethod] = &[HttpMethod::Post, HttpMethod::Put, HttpMethod::Patch];
const UPLOAD_METHODS: &[HttpMethod] = &[HttpMethod::Post, HttpMethod::Put];
const WATCH_METHODS: &[HttpMethod] = &[HttpMethod::Get];
const INSPECT_METHODS: &[HttpMethod] = &[HttpMethod::Head, HttpMethod::Get, HttpMethod::Options];

/// Methods a `using=` clause may select; `None` means any.
pub fn allowed_methods(verb: Verb) -> Option<&'static [HttpMethod]> {
    match verb {
        Verb::Read => Some(READ_METHODS),
        Verb::Save => Some(SAVE_METHODS),
        Verb::Send => Some(SEND_METHODS),
        Verb::Upload => Some(UPLOAD_METHODS),
        Verb::Watch => Some(WATCH_METHODS),
        Verb::Inspect => Some(INSPECT_METHODS),
        Verb::Authenticate | Verb::Session => None,
    }
}

pub fn plan(cmd: Command) -> Result<ExecutionPlan, PlanError> {
    if cmd.verb == Verb::Session {
        return Err(PlanError::SessionVerb);
    }
    validate_url(&cmd.target)?;

    let mut plan = defaults_for(cmd.verb, cmd.target);
    let mut every = None;
    let mut until = None;

    for clause in cmd.clauses {
        match clause {
            Clause::Using(method) => {
                if let Some(allowed) = allowed_methods(plan.verb) {
                    if !allowed.contains(&method) {
                        return Err(PlanError::MethodNotAllowed { verb: plan.verb, method });
                    }
                }
                plan.method = method;
            }
            Clause::With(BodySpec { kind, source, inferred }) => {
                plan.body = Some(BodyPlan::Content { kind, source, inferred });
                promote_to_post(&mut plan);
            }
            Clause::Attach(spec) => {
                match &mut plan.body {
                    Some(BodyPlan::Multipart { parts, boundary }) => {
                        parts.extend(spec.parts);
                        if spec.boundary.is_some() {
                            *boundary = spec.boundary;
                        }
                    }
                    body => {
                        *body = Some(BodyPlan::Multipart {
                            parts: spec.parts,
                            boundary: spec.boundary,
                        });
                    }
                }
                promote_to_post(&mut plan);
            }
            Clause::Include(items) => {
                for item in items {
                    apply_include(&mut plan, item);
                }
            }
            Clause::Expect(checks) => plan.expect = checks,
            Clause::As(format) => plan.output.format = format,
            Clause::To(path) => plan.output.destination = Some(path),
            Clause::Pick(path) => plan.output.pick = Some(path),
            Clause::Retry(attempts) => plan.retry_mut().attempts = attempts,
            Clause::Backoff { min, max } => {
                let retry = plan.retry_mut();
                retry.backoff_min = min;
                retry.backoff_max = max;
            }
            Clause::Timeout(d) | Clause::Under(Limit::Duration(d)) => plan.timeout = Some(d),
            Clause::Under(Limit::Size(bytes)) => plan.size_limit = Some(bytes),
            Clause::Via(proxy) => plan.proxy = Some(proxy),
            Clause::Follow(policy) => plan.follow = policy,
            Clause::Insecure(on) => plan.insecure = on,
            Clause::Every(interval) => every = Some(interval),
            Clause::Until(check) => until = Some(check),
            Clause::Verbose => plan.verbose = true,
            Clause::Resume => plan.resume = true,
        }
    }

    if every.is_some() || until.is_some() {
        if plan.verb != Verb::Watch {
            let clause = if every.is_some() { "every" } else { "until" };
            return Err(PlanError::ClauseNotAllowed { clause, verb: plan.verb });
        }
        plan.poll = Some(PollPlan {
            interval: every.unwrap_or(DEFAULT_POLL_INTERVAL),
            until,
        });
    }

    if plan.verb == Verb::Upload && plan.body.is_none() {
        return Err(PlanError::UploadWithoutBody);
    }

    if plan.verb == Verb::Save {
        plan.output.destination = Some(save_destination(
            plan.output.destination.as_deref(),
            &plan.url,
        ));
    }

    Ok(plan)
}

fn defaults_for(verb: Verb, url: String) -> ExecutionPlan {
    let method = match verb {
        Verb::Upload | Verb::Authenticate => HttpMethod::Post,
        Verb::Inspect => HttpMethod::Head,
        Verb::Read | Verb::Save | Verb::Send | Verb::Watch | Verb::Session => HttpMethod::Get,
    };
    let format = match verb {
        Verb::Save => OutputFormat::Raw,
        Verb::Inspect => OutputFormat::Json,
        _ => OutputFormat::Auto,
    };
    ExecutionPlan {
        verb,
        method,
        url,
        headers: Vec::new(),
        query_params: Vec::new(),
        cookies: Vec::new(),
        body: None,
        output: OutputPlan { format, destination: None, pick: None },
        retry: None,
        timeout: None,
        size_limit: None,
        proxy: None,
        insecure: false,
        verbose: false,
        resume: false,
        follow: FollowPolicy::Default,
        expect: Vec::new(),
        poll: None,
    }
}

impl ExecutionPlan {
    fn retry_mut(&mut self) -> &mut RetryPlan {
        self.retry.get_or_insert(RetryPlan {
            attempts: DEFAULT_RETRY_ATTEMPTS,
            backoff_min: DEFAULT_BACKOFF_MIN,
            backoff_max: DEFAULT_BACKOFF_MAX,
        })
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        http::header_value(&self.headers, name)
    }
}

fn promote_to_post(plan: &mut ExecutionPlan) {
    if plan.method == HttpMethod::Get {
        plan.method = HttpMethod::Post;
    }
}

fn apply_include(plan: &mut ExecutionPlan, item: IncludeItem) {
    match item {
        IncludeItem::Header { name, value } => http::set_header(&mut plan.headers, &name, value),
        IncludeItem::Param { name, value } => plan.query_params.push((name, value)),
        IncludeItem::Cookie { name, value } => {
            match plan.cookies.iter_mut().find(|(n, _)| *n == name) {
                Some(entry) => entry.1 = value,
                None => plan.cookies.push((name, value)),
            }
        }
        IncludeItem::Basic(credentials) => {
            let encoded = STANDARD.encode(credentials.as_bytes());
            http::set_header(&mut plan.headers, "Authorization", format!("Basic {encoded}"));
        }
    }
}

fn validate_url(target: &str) -> Result<(), PlanError> {
    let invalid = |reason: String| PlanError::InvalidUrl { url: target.to_string(), reason };
    let url = Url::parse(target).map_err(|e| invalid(e.to_string()))?;
    match url.scheme() {
        "http" | "https" if url.host_str().is_some_and(|h| !h.is_empty()) => Ok(()),
        "http" | "https" => Err(invalid("missing host".to_string())),
        other => Err(invalid(format!("unsupported scheme '{other}'"))),
    }
}

fn save_destination(given: Option<&str>, url: &str) -> String {
    match given {
        Some(dest) if Path::new(dest).is_dir() => Path::new(dest)
            .join(filename_from_url(url))
            .to_string_lossy()
            .into_owned(),
        Some(dest) => dest.to_string(),
        None => filename_from_url(url),
    }
}

/// Last path segment of `url`, percent-decoded and stripped of any
/// directory part. Falls back to `download` when empty or extension-less.
pub fn filename_from_url(url: &str) -> String {
    let segment = Url::parse(url)
        .ok()
        .and_then(|u| u.path_segments().and_then(|s| s.last()).map(str::to_string))
        .unwrap_or_default();
    let decoded = percent_decode_str(&segment).decode_utf8_lossy().into_owned();
    let name = Path::new(&decoded)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    if name.is_empty() || !name.contains('.') {
        FALLBACK_FILENAME.to_string()
    } else {
        name
    }
}
