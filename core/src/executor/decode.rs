//! Content-Encoding removal.
//!
//! `Content-Encoding` lists codings in the order they were applied, so they
//! are removed last-first. An unknown coding stops the walk and the body is
//! returned as decoded so far.
//!
//! `under=<size>` bounds every decoded layer as well as the wire bytes.

use std::io::Read;

use flate2::read::{DeflateDecoder, MultiGzDecoder, ZlibDecoder};

use crate::error::ExecutionError;

/// Codings advertised in `Accept-Encoding`.
pub const ACCEPT_ENCODING: &str = "gzip, br, deflate";

#[derive(Debug)]
pub struct Decoded {
    pub body: Vec<u8>,
    /// At least one coding was removed.
    pub decompressed: bool,
}

pub fn decode_body(
    content_encoding: Option<&str>,
    body: Vec<u8>,
    size_limit: Option<u64>,
) -> Result<Decoded, ExecutionError> {
    let codings: Vec<String> = content_encoding
        .unwrap_or_default()
        .split(',')
        .map(|c| c.trim().to_ascii_lowercase())
        .filter(|c| !c.is_empty() && c != "identity")
        .collect();

    let mut body = body;
    let mut decompressed = false;
    if body.is_empty() {
        return Ok(Decoded { body, decompressed });
    }
    for coding in codings.iter().rev() {
        let decoded = match coding.as_str() {
            "gzip" | "x-gzip" => read_all(MultiGzDecoder::new(&body[..]), coding, size_limit)?,
            "br" => read_all(brotli::Decompressor::new(&body[..], 4096), coding, size_limit)?,
            "deflate" => inflate(&body, size_limit)?,
            other => {
                tracing::debug!(coding = other, "unknown content coding, passing through");
                break;
            }
        };
        body = decoded;
        decompressed = true;
    }
    Ok(Decoded { body, decompressed })
}

fn read_all<R: Read>(reader: R, coding: &str, size_limit: Option<u64>) -> Result<Vec<u8>, ExecutionError> {
    let cap = size_limit.map_or(u64::MAX, |limit| limit.saturating_add(1));
    let mut out = Vec::new();
    reader
        .take(cap)
        .read_to_end(&mut out)
        .map_err(|e| ExecutionError::Decode {
            encoding: coding.to_string(),
            reason: e.to_string(),
        })?;
    match size_limit {
        Some(limit) if out.len() as u64 > limit => Err(ExecutionError::SizeLimit(limit)),
        _ => Ok(out),
    }
}

/// `deflate` is meant to be zlib-wrapped, but some servers send raw deflate.
fn inflate(body: &[u8], size_limit: Option<u64>) -> Result<Vec<u8>, ExecutionError> {
    match read_all(ZlibDecoder::new(body), "deflate", size_limit) {
        Err(ExecutionError::Decode { .. }) => read_all(DeflateDecoder::new(body), "deflate", size_limit),
        result => result,
    }
}
