//! One command string in, effects out: parse, plan, execute.

use std::io::{self, Write};

use crate::error::{Error, PlanError, SessionError};
use crate::executor::transport::Transport;
use crate::executor::{Executor, Streams};
use crate::grammar;
use crate::parser::parse_command;
use crate::planner::{self, ExecutionPlan};
use crate::session;
use crate::types::{Clause, Command, OutputFormat, SessionSubcommand, Verb};

pub fn run<T: Transport>(input: &str, executor: &Executor<T>, streams: &mut Streams<'_>) -> Result<(), Error> {
    let command = parse_command(input)?;
    if let Some(sub) = command.session_subcommand {
        return run_session(sub, &command, executor, streams.stdout);
    }
    let plan = planner::plan(command)?;
    executor.execute(&plan, streams)?;
    Ok(())
}

/// Parses and plans `input` without executing it.
pub fn plan_for(input: &str) -> Result<ExecutionPlan, Error> {
    let command = parse_command(input)?;
    if command.verb == Verb::Session {
        return Err(PlanError::SessionVerb.into());
    }
    Ok(planner::plan(command)?)
}

/// The plan for `input` as pretty JSON.
pub fn explain(input: &str) -> Result<String, Error> {
    let plan = plan_for(input)?;
    Ok(serde_json::to_string_pretty(&plan).map_err(io::Error::from)?)
}

/// The vocabulary snapshot as pretty JSON.
pub fn grammar_json() -> Result<String, Error> {
    Ok(serde_json::to_string_pretty(&grammar::snapshot()).map_err(io::Error::from)?)
}

fn run_session<T: Transport>(
    sub: SessionSubcommand,
    command: &Command,
    executor: &Executor<T>,
    out: &mut dyn Write,
) -> Result<(), Error> {
    let host = session::extract_host(&command.target)?;
    let store = executor.sessions();
    match sub {
        SessionSubcommand::Show => {
            let machine = command
                .clauses
                .iter()
                .any(|c| matches!(c, Clause::As(OutputFormat::Json)));
            match store.load(&host)? {
                Some(stored) => out.write_all(session::present(&stored, machine).as_bytes())?,
                None => writeln!(out, "No session found for {host}")?,
            }
        }
        SessionSubcommand::Clear => {
            store.delete(&host)?;
            writeln!(out, "Session cleared for {host}")?;
        }
        SessionSubcommand::Use => {
            if store.load(&host)?.is_none() {
                return Err(SessionError::NotFound(host).into());
            }
            writeln!(out, "export REQ_SESSION_HOST={host}")?;
        }
    }
    Ok(())
}
