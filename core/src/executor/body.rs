//! URL and request body assembly.

use std::fs;
use std::io::Read;
use std::path::Path;

use url::Url;

use crate::error::ExecutionError;
use crate::planner::BodyPlan;
use crate::types::{AttachPart, BodyKind, BodySource};

pub const JSON: &str = "application/json";
pub const FORM: &str = "application/x-www-form-urlencoded";
const OCTET_STREAM: &str = "application/octet-stream";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedBody {
    pub bytes: Vec<u8>,
    /// `None` for raw bodies: no Content-Type is implied.
    pub content_type: Option<String>,
    pub multipart: bool,
}

/// Appends `params` to whatever query `base` already carries. Duplicate keys
/// stay, in insertion order.
pub fn build_url(base: &str, params: &[(String, String)]) -> Result<String, ExecutionError> {
    let mut url = Url::parse(base).map_err(|e| ExecutionError::Input(format!("invalid URL: {e}")))?;
    if !params.is_empty() {
        url.query_pairs_mut().extend_pairs(params);
    }
    Ok(url.into())
}

pub fn prepare(body: &BodyPlan, stdin: &mut dyn Read) -> Result<PreparedBody, ExecutionError> {
    match body {
        BodyPlan::Content { kind, source, .. } => {
            let bytes = match source {
                BodySource::Inline(text) => text.as_bytes().to_vec(),
                BodySource::File(path) => read_file(path)?,
                BodySource::Stdin => {
                    let mut buf = Vec::new();
                    stdin
                        .read_to_end(&mut buf)
                        .map_err(|e| ExecutionError::Input(format!("failed to read stdin: {e}")))?;
                    buf
                }
            };
            let content_type = match kind {
                BodyKind::Json => Some(JSON.to_string()),
                BodyKind::Form => Some(FORM.to_string()),
                BodyKind::Raw => None,
            };
            Ok(PreparedBody { bytes, content_type, multipart: false })
        }
        BodyPlan::Multipart { parts, boundary } => {
            let boundary = boundary
                .clone()
                .unwrap_or_else(|| format!("req-{}", uuid::Uuid::new_v4().simple()));
            let bytes = multipart(parts, &boundary)?;
            Ok(PreparedBody {
                bytes,
                content_type: Some(format!("multipart/form-data; boundary={boundary}")),
                multipart: true,
            })
        }
    }
}

fn read_file(path: &str) -> Result<Vec<u8>, ExecutionError> {
    fs::read(path).map_err(|e| ExecutionError::Input(format!("failed to read file {path}: {e}")))
}

fn multipart(parts: &[AttachPart], boundary: &str) -> Result<Vec<u8>, ExecutionError> {
    let mut out = Vec::new();
    for part in parts {
        let (data, filename, content_type) = match (&part.file_path, &part.value) {
            (Some(path), _) => {
                let filename = part.filename.clone().or_else(|| {
                    Path::new(path)
                        .file_name()
                        .map(|n| n.to_string_lossy().into_owned())
                });
                let content_type = part
                    .content_type
                    .clone()
                    .unwrap_or_else(|| OCTET_STREAM.to_string());
                (read_file(path)?, filename, Some(content_type))
            }
            (None, value) => (
                value.clone().unwrap_or_default().into_bytes(),
                part.filename.clone(),
                part.content_type.clone(),
            ),
        };

        out.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
        let mut disposition = format!("Content-Disposition: form-data; name=\"{}\"", quote(&part.name));
        if let Some(filename) = filename {
            disposition.push_str(&format!("; filename=\"{}\"", quote(&filename)));
        }
        out.extend_from_slice(disposition.as_bytes());
        out.extend_from_slice(b"\r\n");
        if let Some(content_type) = content_type {
            out.extend_from_slice(format!("Content-Type: {content_type}\r\n").as_bytes());
        }
        out.extend_from_slice(b"\r\n");
        out.extend_from_slice(&data);
        out.extend_from_slice(b"\r\n");
    }
    out.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());
    Ok(out)
}

fn quote(s: &str) -> String {
    s.replace('"', "%22")
}

#[cfg(test)]
mod tests {
    use std::io;

    use super::*;

    fn content(kind: BodyKind, source: BodySource) -> BodyPlan {
        BodyPlan::Content { kind, source, inferred: false }
    }

    #[test]
    fn build_url_merges_and_keeps_duplicates() {
        let params = vec![
            ("k".to_string(), "v1".to_string()),
            ("k".to_string(), "v2".to_string()),
            ("q".to_string(), "a b".to_string()),
        ];
        assert_eq!(
            build_url("https://h.test/p?x=1", &params).unwrap(),
            "https://h.test/p?x=1&k=v1&k=v2&q=a+b"
        );
        assert_eq!(build_url("https://h.test/p", &[]).unwrap(), "https://h.test/p");
        assert!(build_url("::", &[]).is_err());
    }

    #[test]
    fn content_types_by_kind() {
        let mut stdin = io::empty();
        let json = prepare(&content(BodyKind::Json, BodySource::Inline("{}".into())), &mut stdin).unwrap();
        assert_eq!(json.content_type.as_deref(), Some(JSON));
        let form = prepare(&content(BodyKind::Form, BodySource::Inline("a=1".into())), &mut stdin).unwrap();
        assert_eq!(form.content_type.as_deref(), Some(FORM));
        let raw = prepare(&content(BodyKind::Raw, BodySource::Inline("hi".into())), &mut stdin).unwrap();
        assert_eq!(raw.content_type, None);
        assert_eq!(raw.bytes, b"hi");
    }

    #[test]
    fn file_and_stdin_sources() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("body.json");
        fs::write(&path, br#"{"from":"file"}"#).unwrap();
        let plan = content(BodyKind::Json, BodySource::File(path.to_string_lossy().into_owned()));
        assert_eq!(prepare(&plan, &mut io::empty()).unwrap().bytes, br#"{"from":"file"}"#);

        let mut stdin: &[u8] = b"piped";
        let plan = content(BodyKind::Raw, BodySource::Stdin);
        assert_eq!(prepare(&plan, &mut stdin).unwrap().bytes, b"piped");

        let missing = content(BodyKind::Raw, BodySource::File("/no/such/file".into()));
        let err = prepare(&missing, &mut io::empty()).unwrap_err();
        assert!(err.to_string().starts_with("failed to read file /no/such/file"));
        assert_eq!(err.exit_code(), 5);
    }

    #[test]
    fn multipart_layout() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.txt");
        fs::write(&path, b"FILE").unwrap();
        let plan = BodyPlan::Multipart {
            parts: vec![
                AttachPart {
                    name: "doc".into(),
                    file_path: Some(path.to_string_lossy().into_owned()),
                    value: None,
                    filename: None,
                    content_type: None,
                },
                AttachPart {
                    name: "note".into(),
                    file_path: None,
                    value: Some("hello".into()),
                    filename: None,
                    content_type: None,
                },
            ],
            boundary: Some("XYZ".into()),
        };
        let body = prepare(&plan, &mut io::empty()).unwrap();
        assert!(body.multipart);
        assert_eq!(body.content_type.as_deref(), Some("multipart/form-data; boundary=XYZ"));
        let text = String::from_utf8(body.bytes).unwrap();
        assert_eq!(
            text,
            "--XYZ\r\n\
             Content-Disposition: form-data; name=\"doc\"; filename=\"a.txt\"\r\n\
             Content-Type: application/octet-stream\r\n\r\n\
             FILE\r\n\
             --XYZ\r\n\
             Content-Disposition: form-data; name=\"note\"\r\n\r\n\
             hello\r\n\
             --XYZ--\r\n"
        );
    }

    #[test]
    fn multipart_generates_a_boundary() {
        let plan = BodyPlan::Multipart {
            parts: vec![AttachPart {
                name: "n".into(),
                file_path: None,
                value: Some("v".into()),
                filename: None,
                content_type: None,
            }],
            boundary: None,
        };
        let body = prepare(&plan, &mut io::empty()).unwrap();
        let ct = body.content_type.unwrap();
        let boundary = ct.strip_prefix("multipart/form-data; boundary=").unwrap();
        assert!(boundary.starts_with("req-"));
        assert!(String::from_utf8(body.bytes).unwrap().ends_with(&format!("--{boundary}--\r\n")));
    }
}
