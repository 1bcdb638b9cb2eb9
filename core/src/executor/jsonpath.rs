//! JSONPath subset used by `pick=` and `expect=jsonpath:`.
//!
//! Supported: `$`, `.field`, `['field']` / `["field"]`, `[index]`, `.*` and
//! `[*]`. Filters, slices and recursive descent are rejected.

use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Field(String),
    Index(usize),
    Wildcard,
}

pub fn parse(path: &str) -> Result<Vec<Segment>, String> {
    let chars: Vec<char> = path.trim().chars().collect();
    if chars.first() != Some(&'$') {
        return Err(format!("path '{path}' must start with '$'"));
    }
    let mut segments = Vec::new();
    let mut i = 1;
    while i < chars.len() {
        match chars[i] {
            '.' => {
                i += 1;
                if chars.get(i) == Some(&'*') {
                    segments.push(Segment::Wildcard);
                    i += 1;
                    continue;
                }
                let start = i;
                while i < chars.len() && chars[i] != '.' && chars[i] != '[' {
                    i += 1;
                }
                if start == i {
                    return Err(format!("empty field name in '{path}'"));
                }
                segments.push(Segment::Field(chars[start..i].iter().collect()));
            }
            '[' => {
                let close = chars[i..]
                    .iter()
                    .position(|c| *c == ']')
                    .map(|offset| i + offset)
                    .ok_or_else(|| format!("unclosed '[' in '{path}'"))?;
                let inner: String = chars[i + 1..close].iter().collect();
                segments.push(parse_bracket(inner.trim(), path)?);
                i = close + 1;
            }
            other => return Err(format!("unexpected '{other}' in '{path}'")),
        }
    }
    Ok(segments)
}

fn parse_bracket(inner: &str, path: &str) -> Result<Segment, String> {
    if inner == "*" {
        return Ok(Segment::Wildcard);
    }
    for q in ['\'', '"'] {
        if let Some(name) = inner.strip_prefix(q).and_then(|s| s.strip_suffix(q)) {
            return Ok(Segment::Field(name.to_string()));
        }
    }
    inner
        .parse::<usize>()
        .map(Segment::Index)
        .map_err(|_| format!("unsupported selector '[{inner}]' in '{path}'"))
}

/// Every node `path` selects in `root`. Missing fields select nothing.
pub fn select<'a>(root: &'a Value, path: &str) -> Result<Vec<&'a Value>, String> {
    let mut current = vec![root];
    for segment in parse(path)? {
        current = current
            .into_iter()
            .flat_map(|node| step(node, &segment))
            .collect();
    }
    Ok(current)
}

fn step<'a>(node: &'a Value, segment: &Segment) -> Vec<&'a Value> {
    match (segment, node) {
        (Segment::Field(name), Value::Object(map)) => map.get(name).into_iter().collect(),
        (Segment::Index(idx), Value::Array(items)) => items.get(*idx).into_iter().collect(),
        (Segment::Wildcard, Value::Array(items)) => items.iter().collect(),
        (Segment::Wildcard, Value::Object(map)) => map.values().collect(),
        _ => Vec::new(),
    }
}

/// Text form used for equality checks: strings unquoted, everything else
/// as compact JSON.
pub fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
