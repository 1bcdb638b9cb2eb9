//! `req` command-line entry point.
//!
//! Everything after the program name is one sentence:
//! `req read https://host/path as=json`. The words `help`, `explain` and
//! `grammar` in verb position are handled here; the rest goes to the runner.

use std::io::{self, IsTerminal, Write};
use std::process::ExitCode;

use clap::Parser;
use req_core::{grammar, lexer, runner, Config, Error, Executor, Streams};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const LOG_ENV: &str = "REQ_LOG";

/// HTTP client driven by verb + clause sentences
#[derive(Parser, Debug)]
#[command(name = "req", version, disable_help_subcommand = true)]
struct Args {
    /// Print the execution plan as JSON instead of sending anything
    #[arg(long)]
    dry_run: bool,

    /// Command sentence, e.g. `read https://host/path as=json`
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    words: Vec<String>,
}

fn init_logging() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn")))
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging();

    match dispatch(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let mut stderr = io::stderr().lock();
            let _ = writeln!(stderr, "Error: {err}");
            if let Some(suggestion) = err.suggestion() {
                let _ = writeln!(stderr, "Hint: Try using '{suggestion}' instead");
            }
            ExitCode::from(err.exit_code())
        }
    }
}

fn dispatch(args: &Args) -> Result<(), Error> {
    let (first, rest) = match args.words.split_first() {
        Some((first, rest)) => (first.as_str(), rest),
        None => return print(&grammar::help_text()),
    };

    match first {
        "help" => print(&grammar::help_text()),
        "grammar" => print(&format!("{}\n", runner::grammar_json()?)),
        "explain" => print(&format!("{}\n", runner::explain(&lexer::join_args(rest))?)),
        _ => {
            let input = lexer::join_args(&args.words);
            if args.dry_run {
                return print(&format!("{}\n", runner::explain(&input)?));
            }
            run(&input)
        }
    }
}

fn run(input: &str) -> Result<(), Error> {
    let config = Config::from_env();
    tracing::debug!(state_dir = %config.state_dir.display(), "starting");
    let executor = Executor::new(config);

    let stdout = io::stdout();
    let is_tty = stdout.is_terminal();
    let mut stdout = stdout.lock();
    let mut stderr = io::stderr().lock();
    let mut stdin = io::stdin().lock();
    let result = runner::run(
        input,
        &executor,
        &mut Streams {
            stdout: &mut stdout,
            stderr: &mut stderr,
            stdin: &mut stdin,
            is_tty,
        },
    );
    stdout.flush()?;
    result
}

fn print(text: &str) -> Result<(), Error> {
    let mut stdout = io::stdout().lock();
    stdout.write_all(text.as_bytes())?;
    stdout.flush()?;
    Ok(())
}
