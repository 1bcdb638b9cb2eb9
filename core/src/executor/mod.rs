//! Executor: carries out an `ExecutionPlan`.
//!
//! # Design
//! `Executor` owns a `Transport`, the process `Config` and the session
//! store. `execute` assembles one `HttpRequest` from the plan, runs it
//! through the redirect machine (inside the retry loop), decodes the body,
//! then captures the session, evaluates assertions and writes output, in
//! that order.
//!
//! Human-facing notes go to `Streams::stderr` as plain lines; they are part
//! of the tool's observable output. Internal logging goes through `tracing`.

pub mod body;
pub mod decode;
pub mod expect;
pub mod jsonpath;
pub mod redirect;
pub mod render;
pub mod transport;

use std::fs;
use std::io::{Read, Write};
use std::path::Path;
use std::thread;
use std::time::Instant;

use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::config::Config;
use crate::error::ExecutionError;
use crate::http::{header_value, HttpRequest, HttpResponse};
use crate::planner::{BodyPlan, ExecutionPlan, PollPlan};
use crate::session::{self, SessionStore};
use crate::types::Verb;

use self::redirect::{Outcome, Policy, Redirector};
use self::transport::{SendOptions, Transport, UreqTransport};

/// Process streams, injected so runs can be captured in tests.
pub struct Streams<'a> {
    pub stdout: &'a mut dyn Write,
    pub stderr: &'a mut dyn Write,
    pub stdin: &'a mut dyn Read,
    /// Stdout is a terminal: enables pretty `auto` output and watch
    /// timestamps.
    pub is_tty: bool,
}

/// A decoded final response.
#[derive(Debug)]
struct Fetched {
    status: u16,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
    url: String,
    set_cookies: Vec<String>,
}

pub struct Executor<T: Transport = UreqTransport> {
    transport: T,
    config: Config,
    sessions: SessionStore,
}

impl Executor<UreqTransport> {
    pub fn new(config: Config) -> Self {
        Self::with_transport(config, UreqTransport)
    }
}

impl<T: Transport> Executor<T> {
    pub fn with_transport(config: Config, transport: T) -> Self {
        let sessions = SessionStore::new(config.state_dir.clone());
        Self { transport, config, sessions }
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    pub fn execute(&self, plan: &ExecutionPlan, streams: &mut Streams<'_>) -> Result<(), ExecutionError> {
        if plan.insecure {
            note(streams.stderr, "Warning: TLS verification disabled")?;
        }
        let request = self.build_request(plan, streams)?;

        let (fetched, streamed) = match &plan.poll {
            Some(poll) => (self.poll(plan, poll, &request, streams)?, true),
            None => (self.fetch(plan, &request, streams.stderr)?, false),
        };
        metadata(streams.stderr, &fetched)?;

        if plan.verb == Verb::Authenticate && fetched.status < 400 {
            self.capture_session(plan, &fetched, streams.stderr)?;
        }

        if plan.expect.is_empty() {
            if !(200..300).contains(&fetched.status) {
                return Err(ExecutionError::HttpStatus {
                    status: fetched.status,
                    reason: reason_phrase(fetched.status),
                });
            }
        } else {
            expect::evaluate(&plan.expect, fetched.status, &fetched.headers, &fetched.body)?;
        }

        if !streamed {
            self.write_output(plan, &fetched, streams)?;
        }
        Ok(())
    }

    fn build_request(&self, plan: &ExecutionPlan, streams: &mut Streams<'_>) -> Result<HttpRequest, ExecutionError> {
        let mut request = HttpRequest {
            method: plan.method,
            url: body::build_url(&plan.url, &plan.query_params)?,
            headers: plan.headers.clone(),
            body: None,
        };

        if let Some(body_plan) = &plan.body {
            let prepared = body::prepare(body_plan, streams.stdin)?;
            if let Some(content_type) = prepared.content_type {
                if prepared.multipart {
                    if request.header("Content-Type").is_some() {
                        note(streams.stderr, "Note: Content-Type overridden for multipart")?;
                    }
                    request.set_header("Content-Type", content_type);
                } else if request.header("Content-Type").is_none() {
                    if matches!(body_plan, BodyPlan::Content { inferred: true, .. }) {
                        note(streams.stderr, &format!("Inferred Content-Type: {content_type}"))?;
                    }
                    request.set_header("Content-Type", content_type);
                }
            }
            request.body = Some(prepared.bytes);
        }

        if !plan.cookies.is_empty() {
            let pairs = plan
                .cookies
                .iter()
                .map(|(name, value)| format!("{name}={value}"))
                .collect::<Vec<_>>()
                .join("; ");
            let merged = match request.header("Cookie") {
                Some(existing) => format!("{existing}; {pairs}"),
                None => pairs,
            };
            request.set_header("Cookie", merged);
        }
        if request.header("Accept-Encoding").is_none() {
            request.set_header("Accept-Encoding", decode::ACCEPT_ENCODING);
        }

        self.apply_session(&mut request, streams.stderr)?;

        if plan.resume {
            if let Some(dest) = &plan.output.destination {
                let existing = fs::metadata(dest).map(|m| m.len()).unwrap_or(0);
                if existing > 0 {
                    request.set_header("Range", format!("bytes={existing}-"));
                    info!(dest = %dest, offset = existing, "resuming download");
                }
            }
        }
        Ok(request)
    }

    /// Stored credentials only fill in when the request carries none of its
    /// own.
    fn apply_session(&self, request: &mut HttpRequest, stderr: &mut dyn Write) -> Result<(), ExecutionError> {
        if request.header("Authorization").is_some() || request.header("Cookie").is_some() {
            return Ok(());
        }
        let Ok(host) = session::extract_host(&request.url) else {
            return Ok(());
        };
        let Some(stored) = self.sessions.load(&host)? else {
            return Ok(());
        };
        let mut applied = false;
        if let Some(auth) = &stored.authorization {
            request.set_header("Authorization", auth.clone());
            applied = true;
        }
        if let Some(cookie) = stored.cookie_header() {
            request.set_header("Cookie", cookie);
            applied = true;
        }
        if applied {
            note(stderr, &format!("Using session for {host}"))?;
        }
        Ok(())
    }

    /// One exchange, retried on transport failures when the plan asks.
    fn exchange(&self, plan: &ExecutionPlan, request: &HttpRequest, stderr: &mut dyn Write) -> Result<Outcome, ExecutionError> {
        let policy = Policy::for_request(plan.verb, plan.method, plan.follow);
        let options = SendOptions {
            timeout: None,
            size_limit: plan.size_limit,
            proxy: plan.proxy.clone(),
            insecure: plan.insecure,
        };
        let mut attempt = 0;
        loop {
            let redirector = Redirector {
                transport: &self.transport,
                options: options.clone(),
                policy,
                max_redirects: self.config.max_redirects,
                deadline: Instant::now() + plan.timeout.unwrap_or(self.config.default_timeout),
                verbose: plan.verbose,
            };
            match (redirector.run(request.clone(), stderr), &plan.retry) {
                (Err(err), Some(retry)) if err.is_transient() && attempt < retry.attempts => {
                    attempt += 1;
                    let delay = retry.delay(attempt);
                    warn!(attempt, error = %err, "retrying exchange");
                    note(
                        stderr,
                        &format!(
                            "Retrying in {}ms (attempt {attempt}/{}): {err}",
                            delay.as_millis(),
                            retry.attempts
                        ),
                    )?;
                    thread::sleep(delay);
                }
                (result, _) => return result,
            }
        }
    }

    fn fetch(&self, plan: &ExecutionPlan, request: &HttpRequest, stderr: &mut dyn Write) -> Result<Fetched, ExecutionError> {
        let Outcome { response, url, set_cookies } = self.exchange(plan, request, stderr)?;
        let HttpResponse { status, headers, body } = response;
        let encoding = header_value(&headers, "Content-Encoding").map(str::to_string);
        let decoded = decode::decode_body(encoding.as_deref(), body, plan.size_limit)?;
        if decoded.decompressed {
            note(stderr, "Decompressed response")?;
        }
        Ok(Fetched { status, headers, body: decoded.body, url, set_cookies })
    }

    /// Repeats the exchange every `poll.interval`, one output line per
    /// response, until `poll.until` holds.
    fn poll(
        &self,
        plan: &ExecutionPlan,
        poll: &PollPlan,
        request: &HttpRequest,
        streams: &mut Streams<'_>,
    ) -> Result<Fetched, ExecutionError> {
        loop {
            let fetched = self.fetch(plan, request, streams.stderr)?;
            let mut line = Vec::new();
            if streams.is_tty {
                line.extend_from_slice(chrono::Local::now().format("[%H:%M:%S] ").to_string().as_bytes());
            }
            line.extend_from_slice(fetched.body.trim_ascii_end());
            line.push(b'\n');
            streams.stdout.write_all(&line).map_err(ExecutionError::Output)?;
            streams.stdout.flush().map_err(ExecutionError::Output)?;

            let done = poll.until.as_ref().is_some_and(|until| {
                expect::check(until, fetched.status, &fetched.headers, &fetched.body).is_ok()
            });
            if done {
                return Ok(fetched);
            }
            thread::sleep(poll.interval);
        }
    }

    fn capture_session(&self, plan: &ExecutionPlan, fetched: &Fetched, stderr: &mut dyn Write) -> Result<(), ExecutionError> {
        let host = session::extract_host(&plan.url)?;
        let existing = self.sessions.load(&host)?;
        let updated = session::update_from_response(existing, &host, &fetched.set_cookies, &fetched.body);
        self.sessions.save(&updated)?;
        info!(host = %host, cookies = updated.cookies.len(), "captured session");
        note(stderr, &format!("Session saved for {host}"))
    }

    fn write_output(&self, plan: &ExecutionPlan, fetched: &Fetched, streams: &mut Streams<'_>) -> Result<(), ExecutionError> {
        let rendered = if let Some(path) = &plan.output.pick {
            pick(&fetched.body, path)?
        } else if plan.verb == Verb::Inspect {
            inspect(fetched)
        } else if let Some(dest) = &plan.output.destination {
            let append = plan.resume && fetched.status == 206;
            write_file(Path::new(dest), &fetched.body, append).map_err(ExecutionError::Output)?;
            return note(
                streams.stderr,
                &format!("Saved {} bytes to {dest}", fetched.body.len()),
            );
        } else {
            render::render(&fetched.body, &plan.output.format, streams.is_tty)
        };
        streams.stdout.write_all(&rendered).map_err(ExecutionError::Output)?;
        streams.stdout.flush().map_err(ExecutionError::Output)
    }
}

fn note(w: &mut dyn Write, line: &str) -> Result<(), ExecutionError> {
    writeln!(w, "{line}").map_err(ExecutionError::Output)
}

fn metadata(w: &mut dyn Write, fetched: &Fetched) -> Result<(), ExecutionError> {
    let reason = reason_phrase(fetched.status);
    let status_line = format!("HTTP {} {reason}", fetched.status);
    note(w, status_line.trim_end())?;
    note(w, &format!("URL: {}", fetched.url))?;
    note(w, &format!("Size: {} bytes", fetched.body.len()))?;
    if let Some(content_type) = header_value(&fetched.headers, "Content-Type") {
        note(w, &format!("Content-Type: {content_type}"))?;
    }
    Ok(())
}

fn reason_phrase(status: u16) -> String {
    ureq::http::StatusCode::from_u16(status)
        .ok()
        .and_then(|s| s.canonical_reason())
        .unwrap_or_default()
        .to_string()
}

/// A single string match prints bare; anything else prints as JSON.
fn pick(body: &[u8], path: &str) -> Result<Vec<u8>, ExecutionError> {
    let doc: Value = serde_json::from_slice(body)
        .map_err(|e| ExecutionError::Pick(format!("response is not JSON: {e}")))?;
    let nodes = jsonpath::select(&doc, path).map_err(ExecutionError::Pick)?;
    match nodes.as_slice() {
        [] => Err(ExecutionError::Pick(format!("{path} matched nothing"))),
        [Value::String(s)] => Ok(format!("{s}\n").into_bytes()),
        [single] => Ok(render::render_value(single)),
        many => Ok(render::render_value(&Value::Array(
            many.iter().map(|v| (*v).clone()).collect(),
        ))),
    }
}

/// `{status, headers}`; repeated header names are joined with `, `.
fn inspect(fetched: &Fetched) -> Vec<u8> {
    let mut headers = Map::new();
    for (name, value) in &fetched.headers {
        let key = name.to_ascii_lowercase();
        let joined = match headers.get(&key).and_then(Value::as_str) {
            Some(prev) => format!("{prev}, {value}"),
            None => value.clone(),
        };
        headers.insert(key, Value::String(joined));
    }
    let mut doc = Map::new();
    doc.insert("status".to_string(), Value::from(fetched.status));
    doc.insert("headers".to_string(), Value::Object(headers));
    render::render_value(&Value::Object(doc))
}

fn write_file(path: &Path, data: &[u8], append: bool) -> std::io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let mut file = fs::OpenOptions::new()
        .create(true)
        .write(true)
        .append(append)
        .truncate(!append)
        .open(path)?;
    file.write_all(data)
}

#[cfg(test)]
mod tests {
    use std::io;

    use super::transport::testing::{response, Scripted};
    use super::*;
    use crate::error::TransportError;
    use crate::parser::parse_command;
    use crate::planner::plan;
    use crate::session::Session;

    struct Run {
        result: Result<(), ExecutionError>,
        stdout: String,
        stderr: String,
    }

    fn run_with(exec: &Executor<Scripted>, command: &str, tty: bool) -> Run {
        let plan = plan(parse_command(command).unwrap()).unwrap();
        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        let mut stdin = io::empty();
        let result = exec.execute(
            &plan,
            &mut Streams {
                stdout: &mut stdout,
                stderr: &mut stderr,
                stdin: &mut stdin,
                is_tty: tty,
            },
        );
        Run {
            result,
            stdout: String::from_utf8_lossy(&stdout).into_owned(),
            stderr: String::from_utf8_lossy(&stderr).into_owned(),
        }
    }

    fn executor(dir: &Path, responses: Vec<HttpResponse>) -> Executor<Scripted> {
        Executor::with_transport(Config::new(dir), Scripted::new(responses))
    }

    fn ok_json(body: &str) -> HttpResponse {
        response(200, &[("Content-Type", "application/json")], body.as_bytes())
    }

    // --- Request assembly ---------------------------------------------------

    #[test]
    fn inferred_json_body_and_query_params() {
        let dir = tempfile::tempdir().unwrap();
        let exec = executor(dir.path(), vec![ok_json("{}")]);
        let run = run_with(
            &exec,
            r#"send https://api.test/items with={"a":1} include='param: k=v1; param: k=v2'"#,
            false,
        );
        run.result.unwrap();
        assert!(run.stderr.contains("Inferred Content-Type: application/json\n"));
        let sent = exec.transport.sent.borrow();
        assert_eq!(sent[0].url, "https://api.test/items?k=v1&k=v2");
        assert_eq!(sent[0].method, crate::http::HttpMethod::Post);
        assert_eq!(sent[0].header("Content-Type"), Some("application/json"));
        assert_eq!(sent[0].header("Accept-Encoding"), Some("gzip, br, deflate"));
        assert_eq!(sent[0].body.as_deref(), Some(&br#"{"a":1}"#[..]));
    }

    #[test]
    fn multipart_overrides_a_manual_content_type() {
        let dir = tempfile::tempdir().unwrap();
        let exec = executor(dir.path(), vec![ok_json("{}")]);
        let run = run_with(
            &exec,
            "upload https://api.test/files attach='part: name=note, value=hi; boundary: B1' include='header: Content-Type: text/plain'",
            false,
        );
        run.result.unwrap();
        assert!(run.stderr.contains("Note: Content-Type overridden for multipart\n"));
        assert_eq!(
            exec.transport.sent.borrow()[0].header("Content-Type"),
            Some("multipart/form-data; boundary=B1")
        );
    }

    #[test]
    fn cookies_and_basic_auth() {
        let dir = tempfile::tempdir().unwrap();
        let exec = executor(dir.path(), vec![ok_json("{}")]);
        run_with(
            &exec,
            "read https://api.test/me include='cookie: a=1; cookie: b=2; basic: ada:secret'",
            false,
        )
        .result
        .unwrap();
        let sent = exec.transport.sent.borrow();
        assert_eq!(sent[0].header("Cookie"), Some("a=1; b=2"));
        assert_eq!(sent[0].header("Authorization"), Some("Basic YWRhOnNlY3JldA=="));
    }

    // --- Sessions -----------------------------------------------------------

    fn store_session(dir: &Path) {
        let mut stored = Session::new("api.test");
        stored.cookies.insert("sid".into(), "stored".into());
        stored.authorization = Some("Bearer stored-token".into());
        SessionStore::new(dir).save(&stored).unwrap();
    }

    #[test]
    fn stored_session_applies_when_request_has_no_credentials() {
        let dir = tempfile::tempdir().unwrap();
        store_session(dir.path());
        let exec = executor(dir.path(), vec![ok_json("{}")]);
        let run = run_with(&exec, "read https://api.test/me", false);
        run.result.unwrap();
        assert!(run.stderr.contains("Using session for api.test\n"));
        let sent = exec.transport.sent.borrow();
        assert_eq!(sent[0].header("Authorization"), Some("Bearer stored-token"));
        assert_eq!(sent[0].header("Cookie"), Some("sid=stored"));
    }

    #[test]
    fn explicit_credentials_beat_the_stored_session() {
        let dir = tempfile::tempdir().unwrap();
        store_session(dir.path());
        let exec = executor(dir.path(), vec![ok_json("{}"), ok_json("{}")]);

        let run = run_with(&exec, "read https://api.test/me include='header: Authorization: Bearer mine'", false);
        run.result.unwrap();
        assert!(!run.stderr.contains("Using session"));

        let run = run_with(&exec, "read https://api.test/me include='cookie: sid=mine'", false);
        run.result.unwrap();
        assert!(!run.stderr.contains("Using session"));

        let sent = exec.transport.sent.borrow();
        assert_eq!(sent[0].header("Authorization"), Some("Bearer mine"));
        assert_eq!(sent[0].header("Cookie"), None);
        assert_eq!(sent[1].header("Cookie"), Some("sid=mine"));
        assert_eq!(sent[1].header("Authorization"), None);
    }

    #[test]
    fn authenticate_saves_cookies_and_token() {
        let dir = tempfile::tempdir().unwrap();
        let login = response(
            200,
            &[("Set-Cookie", "session=abc; HttpOnly"), ("Content-Type", "application/json")],
            br#"{"access_token":"tok"}"#,
        );
        let exec = executor(dir.path(), vec![login]);
        let run = run_with(&exec, "authenticate https://api.test/login with={\"u\":\"a\"}", false);
        run.result.unwrap();
        assert!(run.stderr.contains("Session saved for api.test\n"));
        let saved = exec.sessions().load("api.test").unwrap().unwrap();
        assert_eq!(saved.cookies.get("session").map(String::as_str), Some("abc"));
        assert_eq!(saved.authorization.as_deref(), Some("Bearer tok"));
    }

    // --- Status and expectations --------------------------------------------

    #[test]
    fn non_2xx_without_expectations_is_an_execution_error() {
        let dir = tempfile::tempdir().unwrap();
        let exec = executor(dir.path(), vec![response(404, &[], b"missing")]);
        let run = run_with(&exec, "read https://api.test/nope", false);
        let err = run.result.unwrap_err();
        assert_eq!(err.to_string(), "HTTP 404 Not Found");
        assert_eq!(err.exit_code(), 4);
        assert!(run.stderr.contains("HTTP 404 Not Found\nURL: https://api.test/nope\nSize: 7 bytes\n"));
    }

    #[test]
    fn expectations_replace_the_status_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let exec = executor(dir.path(), vec![response(404, &[], b""), ok_json("{}")]);
        run_with(&exec, "read https://api.test/nope expect=status:404", false).result.unwrap();
        let err = run_with(&exec, "read https://api.test/ok expect=status:201", false)
            .result
            .unwrap_err();
        assert_eq!(err.exit_code(), 3);
        assert_eq!(err.to_string(), "expectation failed: expected status 201, got 200");
    }

    #[test]
    fn size_limit_applies_to_the_decompressed_body() {
        use std::io::Write as _;

        let mut enc = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
        enc.write_all(&vec![b'x'; 32 * 1024]).unwrap();
        let wire = enc.finish().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let exec = executor(dir.path(), vec![response(200, &[("Content-Encoding", "gzip")], &wire)]);
        let run = run_with(&exec, "read https://api.test/bomb under=1KB", false);
        let err = run.result.unwrap_err();
        assert!(matches!(err, ExecutionError::SizeLimit(1024)));
        assert_eq!(err.exit_code(), 4);
        assert!(run.stdout.is_empty());
    }

    // --- Output -------------------------------------------------------------

    #[test]
    fn json_output_and_pick() {
        let dir = tempfile::tempdir().unwrap();
        let exec = executor(
            dir.path(),
            vec![ok_json(r#"{"a":1}"#), ok_json(r#"{"items":[{"id":"x"},{"id":"y"}]}"#)],
        );
        let run = run_with(&exec, "read https://api.test/a as=json", false);
        assert_eq!(run.stdout, "{\n  \"a\": 1\n}\n");
        let run = run_with(&exec, "read https://api.test/b pick=$.items[1].id", false);
        assert_eq!(run.stdout, "y\n");
    }

    #[test]
    fn inspect_prints_status_and_headers() {
        let dir = tempfile::tempdir().unwrap();
        let exec = executor(dir.path(), vec![response(200, &[("X-Id", "1")], b"")]);
        let run = run_with(&exec, "inspect https://api.test/", false);
        run.result.unwrap();
        let doc: Value = serde_json::from_str(&run.stdout).unwrap();
        assert_eq!(doc["status"], 200);
        assert_eq!(doc["headers"]["x-id"], "1");
        assert_eq!(exec.transport.sent.borrow()[0].method, crate::http::HttpMethod::Head);
    }

    #[test]
    fn save_then_resume_appends_partial_content() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("out").join("blob.bin");
        let exec = executor(
            dir.path(),
            vec![response(200, &[], b"hello "), response(206, &[], b"world")],
        );
        let command = format!("save https://api.test/blob to={}", dest.display());
        run_with(&exec, &command, false).result.unwrap();
        assert_eq!(fs::read(&dest).unwrap(), b"hello ");

        run_with(&exec, &format!("{command} resume"), false).result.unwrap();
        assert_eq!(fs::read(&dest).unwrap(), b"hello world");
        assert_eq!(exec.transport.sent.borrow()[1].header("Range"), Some("bytes=6-"));
    }

    // --- Retry and polling --------------------------------------------------

    #[test]
    fn transient_failures_are_retried() {
        let dir = tempfile::tempdir().unwrap();
        let transport = Scripted::with_results(vec![
            Err(TransportError::Network("connection refused".into())),
            Err(TransportError::Timeout),
            Ok(ok_json("{}")),
        ]);
        let exec = Executor::with_transport(Config::new(dir.path()), transport);
        let run = run_with(&exec, "read https://api.test/ retry=2 backoff=1ms..2ms", false);
        run.result.unwrap();
        assert!(run.stderr.contains("Retrying in 1ms (attempt 1/2): request failed: connection refused\n"));
        assert!(run.stderr.contains("Retrying in 2ms (attempt 2/2): request timed out\n"));
        assert_eq!(exec.transport.sent.borrow().len(), 3);
    }

    #[test]
    fn retries_stop_at_the_attempt_limit() {
        let dir = tempfile::tempdir().unwrap();
        let transport = Scripted::with_results(vec![
            Err(TransportError::Network("down".into())),
            Err(TransportError::Network("down".into())),
        ]);
        let exec = Executor::with_transport(Config::new(dir.path()), transport);
        let err = run_with(&exec, "read https://api.test/ retry=1 backoff=1ms..1ms", false)
            .result
            .unwrap_err();
        assert_eq!(err.exit_code(), 4);
    }

    #[test]
    fn watch_polls_until_the_check_holds() {
        let dir = tempfile::tempdir().unwrap();
        let exec = executor(
            dir.path(),
            vec![ok_json(r#"{"n":1}"#), ok_json(r#"{"n":2}"#), ok_json(r#"{"n":3}"#)],
        );
        let run = run_with(&exec, "watch https://api.test/n every=1ms until=jsonpath:$.n=2", false);
        run.result.unwrap();
        assert_eq!(run.stdout, "{\"n\":1}\n{\"n\":2}\n");
        assert_eq!(exec.transport.sent.borrow().len(), 2);
    }
}
