//! Core of the `req` HTTP client.
//!
//! # Overview
//! A command such as
//! `read https://host/path include='header: Accept: application/json'`
//! goes through three stages:
//!
//! 1. `lexer` + `parser`: quote-aware tokens, then a typed `Command`.
//! 2. `planner`: verb defaults and clause folding into an `ExecutionPlan`.
//! 3. `executor`: URL and body assembly, session injection, the redirect
//!    machine, decoding, assertions and output.
//!
//! # Design
//! - Network I/O lives behind `executor::transport::Transport`; everything
//!   else operates on plain `HttpRequest` / `HttpResponse` data.
//! - Each stage has its own error type; `Error::exit_code` maps them to
//!   the process exit status.
//! - `Config` is built once by the caller and passed in explicitly.

pub mod config;
pub mod error;
pub mod executor;
pub mod grammar;
pub mod http;
pub mod lexer;
pub mod parser;
pub mod planner;
pub mod runner;
pub mod session;
pub mod suggest;
pub mod types;
pub mod units;

pub use config::Config;
pub use error::{Error, ExecutionError, ParseError, PlanError, SessionError, TransportError};
pub use executor::transport::{SendOptions, Transport, UreqTransport};
pub use executor::{Executor, Streams};
pub use http::{HttpMethod, HttpRequest, HttpResponse};
pub use planner::ExecutionPlan;
pub use types::{Command, Verb};
