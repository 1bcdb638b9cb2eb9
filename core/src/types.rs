//! Command AST produced by the parser and consumed by the planner.
//!
//! # Design
//! `Clause` is a closed sum type. The planner matches it exhaustively, so a
//! new clause variant fails to compile until every consumer handles it.
//! Each variant already carries validated, typed data: the parser rejects
//! malformed sub-grammars before a `Command` exists.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::http::HttpMethod;

/// The leading word of a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verb {
    Read,
    Save,
    Send,
    Upload,
    Watch,
    Inspect,
    Authenticate,
    Session,
}

impl Verb {
    pub const ALL: [Verb; 8] = [
        Verb::Read,
        Verb::Save,
        Verb::Send,
        Verb::Upload,
        Verb::Watch,
        Verb::Inspect,
        Verb::Authenticate,
        Verb::Session,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Verb::Read => "read",
            Verb::Save => "save",
            Verb::Send => "send",
            Verb::Upload => "upload",
            Verb::Watch => "watch",
            Verb::Inspect => "inspect",
            Verb::Authenticate => "authenticate",
            Verb::Session => "session",
        }
    }

    /// Verbs that submit data. They never follow 301/302/303 on their own.
    pub fn is_write(self) -> bool {
        matches!(self, Verb::Send | Verb::Upload)
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Verb {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Verb::ALL.into_iter().find(|v| v.as_str() == s).ok_or(())
    }
}

/// `session <sub> <host>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionSubcommand {
    Show,
    Clear,
    Use,
}

impl SessionSubcommand {
    pub const NAMES: [&'static str; 3] = ["show", "clear", "use"];
}

impl FromStr for SessionSubcommand {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "show" => Ok(SessionSubcommand::Show),
            "clear" => Ok(SessionSubcommand::Clear),
            "use" => Ok(SessionSubcommand::Use),
            _ => Err(()),
        }
    }
}

/// A parsed command. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    pub verb: Verb,
    /// Absolute URL. For `session`, a bare host promoted to `https://<host>`.
    pub target: String,
    pub clauses: Vec<Clause>,
    pub session_subcommand: Option<SessionSubcommand>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Clause {
    Using(HttpMethod),
    With(BodySpec),
    Include(Vec<IncludeItem>),
    Attach(AttachSpec),
    Expect(Vec<ExpectCheck>),
    As(OutputFormat),
    To(String),
    Retry(u32),
    Backoff { min: Duration, max: Duration },
    Timeout(Duration),
    Under(Limit),
    Via(String),
    Follow(FollowPolicy),
    Insecure(bool),
    Pick(String),
    Every(Duration),
    Until(ExpectCheck),
    Verbose,
    Resume,
}

impl Clause {
    /// Vocabulary key this clause was parsed from.
    pub fn key(&self) -> &'static str {
        match self {
            Clause::Using(_) => "using",
            Clause::With(_) => "with",
            Clause::Include(_) => "include",
            Clause::Attach(_) => "attach",
            Clause::Expect(_) => "expect",
            Clause::As(_) => "as",
            Clause::To(_) => "to",
            Clause::Retry(_) => "retry",
            Clause::Backoff { .. } => "backoff",
            Clause::Timeout(_) => "timeout",
            Clause::Under(_) => "under",
            Clause::Via(_) => "via",
            Clause::Follow(_) => "follow",
            Clause::Insecure(_) => "insecure",
            Clause::Pick(_) => "pick",
            Clause::Every(_) => "every",
            Clause::Until(_) => "until",
            Clause::Verbose => "verbose",
            Clause::Resume => "resume",
        }
    }
}

/// Encoding of a `with=` body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BodyKind {
    Json,
    Form,
    Raw,
}

impl FromStr for BodyKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(BodyKind::Json),
            "form" => Ok(BodyKind::Form),
            "raw" | "text" => Ok(BodyKind::Raw),
            _ => Err(()),
        }
    }
}

/// Where body bytes come from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "source", content = "value")]
pub enum BodySource {
    Inline(String),
    File(String),
    Stdin,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BodySpec {
    pub kind: BodyKind,
    pub source: BodySource,
    /// Kind was guessed from a JSON-shaped inline value rather than given.
    pub inferred: bool,
}

/// One entry of an `include=` clause.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IncludeItem {
    Header { name: String, value: String },
    Param { name: String, value: String },
    Cookie { name: String, value: String },
    /// Raw `user:pass`, encoded by the planner.
    Basic(String),
}

/// One multipart field. Exactly one of `file_path` and `value` is set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachPart {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", rename = "type")]
    pub content_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachSpec {
    pub parts: Vec<AttachPart>,
    pub boundary: Option<String>,
}

/// A response assertion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "type")]
pub enum ExpectCheck {
    /// Exact match against the decimal status code.
    Status { value: String },
    Header { name: String, value: String },
    Contains { value: String },
    /// Path must resolve; when `value` is set, the resolved node must equal it.
    JsonPath {
        path: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        value: Option<String>,
    },
    Matches { regex: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Auto,
    Json,
    Text,
    Csv,
    Raw,
    #[serde(untagged)]
    Other(String),
}

impl OutputFormat {
    pub fn from_name(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "auto" => OutputFormat::Auto,
            "json" => OutputFormat::Json,
            "text" => OutputFormat::Text,
            "csv" => OutputFormat::Csv,
            "raw" => OutputFormat::Raw,
            _ => OutputFormat::Other(name.to_string()),
        }
    }
}

/// Result of `under=`: either a deadline or a byte cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Limit {
    Duration(Duration),
    Size(u64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FollowPolicy {
    #[default]
    Default,
    Smart,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verb_round_trips_through_name() {
        for verb in Verb::ALL {
            assert_eq!(verb.as_str().parse::<Verb>(), Ok(verb));
        }
        assert!("reed".parse::<Verb>().is_err());
    }

    #[test]
    fn unknown_output_format_is_kept() {
        assert_eq!(OutputFormat::from_name("JSON"), OutputFormat::Json);
        assert_eq!(
            OutputFormat::from_name("yaml"),
            OutputFormat::Other("yaml".to_string())
        );
    }

    #[test]
    fn body_kind_accepts_text_alias() {
        assert_eq!("text".parse::<BodyKind>(), Ok(BodyKind::Raw));
        assert!("xml".parse::<BodyKind>().is_err());
    }
}
