//! Response assertions for `expect=` and `until=`.

use regex::bytes::Regex;

use crate::error::ExecutionError;
use crate::http::header_value;
use crate::types::ExpectCheck;

use super::jsonpath;

/// `Err` carries a message showing expected against actual.
pub fn check(
    check: &ExpectCheck,
    status: u16,
    headers: &[(String, String)],
    body: &[u8],
) -> Result<(), String> {
    match check {
        ExpectCheck::Status { value } => {
            if status.to_string() == *value {
                Ok(())
            } else {
                Err(format!("expected status {value}, got {status}"))
            }
        }
        ExpectCheck::Header { name, value } => match header_value(headers, name) {
            Some(actual) if actual == value => Ok(()),
            actual => Err(format!(
                "expected header {name}={value}, got {}",
                actual.unwrap_or("(missing)")
            )),
        },
        ExpectCheck::Contains { value } => {
            let needle = value.as_bytes();
            if needle.is_empty() || body.windows(needle.len()).any(|w| w == needle) {
                Ok(())
            } else {
                Err(format!("expected body to contain {value:?}"))
            }
        }
        ExpectCheck::JsonPath { path, value } => {
            let doc: serde_json::Value =
                serde_json::from_slice(body).map_err(|e| format!("failed to parse JSON: {e}"))?;
            let nodes = jsonpath::select(&doc, path)?;
            let Some(first) = nodes.first() else {
                return Err(format!("jsonpath {path} matched nothing"));
            };
            match value {
                None => Ok(()),
                Some(expected) => {
                    let actual = jsonpath::scalar_text(first);
                    if actual == *expected {
                        Ok(())
                    } else {
                        Err(format!("expected jsonpath {path}={expected}, got {actual}"))
                    }
                }
            }
        }
        ExpectCheck::Matches { regex } => {
            let re = Regex::new(regex).map_err(|e| format!("invalid regex {regex:?}: {e}"))?;
            if re.is_match(body) {
                Ok(())
            } else {
                Err(format!("body does not match regex {regex:?}"))
            }
        }
    }
}

/// Runs `checks` in order and reports the first failure.
pub fn evaluate(
    checks: &[ExpectCheck],
    status: u16,
    headers: &[(String, String)],
    body: &[u8],
) -> Result<(), ExecutionError> {
    for c in checks {
        check(c, status, headers, body).map_err(ExecutionError::Expectation)?;
    }
    Ok(())
}
