//! Error types for each pipeline stage.
//!
//! # Design
//! Each stage has its own enum so a caller can tell a grammar mistake from a
//! network failure without string matching. `Error` unifies them for the
//! runner and owns the process exit-code mapping:
//!
//! | code | meaning                                              |
//! |------|------------------------------------------------------|
//! | 0    | success                                              |
//! | 3    | an `expect=` check failed after a successful exchange |
//! | 4    | network, TLS, timeout, size limit, or HTTP status    |
//! | 5    | grammar, validation, planning, or local input error  |

use std::fmt;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::http::HttpMethod;
use crate::types::Verb;

pub const EXIT_EXPECTATION: u8 = 3;
pub const EXIT_EXECUTION: u8 = 4;
pub const EXIT_INPUT: u8 = 5;

/// A grammar error located at a char offset of the command string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub position: usize,
    pub token: String,
    pub message: String,
    pub suggestion: Option<String>,
}

impl ParseError {
    pub fn new(position: usize, token: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            position,
            token: token.into(),
            message: message.into(),
            suggestion: None,
        }
    }

    pub fn with_suggestion(mut self, suggestion: Option<&str>) -> Self {
        self.suggestion = suggestion.map(str::to_string);
        self
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "parse error at position {} (token: {:?}): {}",
            self.position, self.token, self.message
        )?;
        if let Some(suggestion) = &self.suggestion {
            write!(f, " (did you mean {suggestion:?}?)")?;
        }
        Ok(())
    }
}

impl std::error::Error for ParseError {}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanError {
    #[error("verb '{verb}' does not allow method {method}")]
    MethodNotAllowed { verb: Verb, method: HttpMethod },

    #[error("upload requires a body: add with= or attach=")]
    UploadWithoutBody,

    #[error("{clause}= is only valid for watch, not '{verb}'")]
    ClauseNotAllowed { clause: &'static str, verb: Verb },

    #[error("'session' commands do not produce an HTTP request")]
    SessionVerb,

    #[error("invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },
}

/// Failures of a single HTTP round-trip.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,

    #[error("response body exceeds size limit of {0} bytes")]
    SizeLimit(u64),

    #[error("invalid proxy URL '{0}'")]
    InvalidProxy(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("request failed: {0}")]
    Network(String),
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session file {} is readable by group or others; run: chmod 600 {}", path.display(), path.display())]
    InsecurePermissions { path: PathBuf },

    #[error("session I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("malformed session file {}: {source}", path.display())]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("cannot determine host from '{0}'")]
    InvalidUrl(String),

    #[error("no session found for {0}")]
    NotFound(String),
}

#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("request failed: {0}")]
    Network(String),

    #[error("request timed out")]
    Timeout,

    #[error("response exceeded size limit of {0} bytes")]
    SizeLimit(u64),

    #[error("stopped after {0} redirects")]
    TooManyRedirects(usize),

    /// A write verb with `follow=smart` received a redirect other than 307/308.
    #[error("write verb: not following {0} redirect (use 307/308)")]
    RedirectRejected(u16),

    #[error("HTTP {status} {reason}")]
    HttpStatus { status: u16, reason: String },

    #[error("failed to decode {encoding} response: {reason}")]
    Decode { encoding: String, reason: String },

    #[error("expectation failed: {0}")]
    Expectation(String),

    #[error("pick failed: {0}")]
    Pick(String),

    /// Local input that could not be turned into a request.
    #[error("{0}")]
    Input(String),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("failed to write output: {0}")]
    Output(#[source] io::Error),
}

impl ExecutionError {
    pub fn exit_code(&self) -> u8 {
        match self {
            ExecutionError::Expectation(_) => EXIT_EXPECTATION,
            ExecutionError::Input(_) | ExecutionError::Session(_) => EXIT_INPUT,
            ExecutionError::Network(_)
            | ExecutionError::Timeout
            | ExecutionError::SizeLimit(_)
            | ExecutionError::TooManyRedirects(_)
            | ExecutionError::RedirectRejected(_)
            | ExecutionError::HttpStatus { .. }
            | ExecutionError::Decode { .. }
            | ExecutionError::Pick(_)
            | ExecutionError::Output(_) => EXIT_EXECUTION,
        }
    }

    /// Failures worth another attempt under `retry=`.
    pub fn is_transient(&self) -> bool {
        matches!(self, ExecutionError::Network(_) | ExecutionError::Timeout)
    }
}

impl From<TransportError> for ExecutionError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Timeout => ExecutionError::Timeout,
            TransportError::SizeLimit(limit) => ExecutionError::SizeLimit(limit),
            TransportError::InvalidProxy(_) | TransportError::InvalidRequest(_) => {
                ExecutionError::Input(err.to_string())
            }
            TransportError::Network(msg) => ExecutionError::Network(msg),
        }
    }
}

/// Any failure of one command run.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Plan(#[from] PlanError),

    #[error(transparent)]
    Execution(#[from] ExecutionError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("failed to write output: {0}")]
    Io(#[from] io::Error),
}

impl Error {
    pub fn exit_code(&self) -> u8 {
        match self {
            Error::Parse(_) | Error::Plan(_) | Error::Session(_) => EXIT_INPUT,
            Error::Execution(err) => err.exit_code(),
            Error::Io(_) => EXIT_EXECUTION,
        }
    }

    /// Nearest valid word for a misspelled verb or clause key.
    pub fn suggestion(&self) -> Option<&str> {
        match self {
            Error::Parse(err) => err.suggestion.as_deref(),
            _ => None,
        }
    }
}
