//! Body rendering for stdout.

use serde_json::Value;

use crate::types::OutputFormat;

/// `json` always re-indents when the body parses; `auto` only on a
/// terminal. Every other format passes the bytes through.
pub fn render(body: &[u8], format: &OutputFormat, is_tty: bool) -> Vec<u8> {
    let pretty = match format {
        OutputFormat::Json => true,
        OutputFormat::Auto => is_tty,
        OutputFormat::Text | OutputFormat::Csv | OutputFormat::Raw | OutputFormat::Other(_) => false,
    };
    if pretty {
        if let Ok(value) = serde_json::from_slice::<Value>(body) {
            return render_value(&value);
        }
    }
    body.to_vec()
}

pub fn render_value(value: &Value) -> Vec<u8> {
    let mut out = serde_json::to_vec_pretty(value).unwrap_or_default();
    out.push(b'\n');
    out
}
