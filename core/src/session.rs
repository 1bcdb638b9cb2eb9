//! Per-host session persistence.
//!
//! # Design
//! A session is the cookies and bearer token captured by `authenticate`,
//! keyed by URL authority (`host[:port]`). Each host gets one JSON file
//! `session_<host>.json` under the store directory. The directory is passed
//! in at construction, computed once from `Config`, never looked up lazily.
//!
//! Session files hold credentials: they are written owner-only (0600, in a
//! 0700 directory) and a file that group or others can read is refused on
//! load rather than silently ignored.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use crate::error::SessionError;

pub const REDACTED: &str = "***";

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Session {
    pub host: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub cookies: BTreeMap<String, String>,
    /// Full header value, e.g. `Bearer abc`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authorization: Option<String>,
}

impl Session {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            ..Self::default()
        }
    }

    /// `Cookie` header value for the stored cookies.
    pub fn cookie_header(&self) -> Option<String> {
        if self.cookies.is_empty() {
            return None;
        }
        Some(
            self.cookies
                .iter()
                .map(|(name, value)| format!("{name}={value}"))
                .collect::<Vec<_>>()
                .join("; "),
        )
    }
}

#[derive(Debug, Clone)]
pub struct SessionStore {
    dir: PathBuf,
}

impl SessionStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, host: &str) -> PathBuf {
        let safe = host.replace([':', '/'], "_");
        self.dir.join(format!("session_{safe}.json"))
    }

    /// `Ok(None)` when no session exists for `host`. File names are not
    /// unique per host, so a file holding another host's session counts as
    /// absent. Fails when the file is readable by group or others.
    pub fn load(&self, host: &str) -> Result<Option<Session>, SessionError> {
        let path = self.path_for(host);
        let metadata = match fs::metadata(&path) {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(SessionError::Io { path, source }),
        };
        check_permissions(&path, &metadata)?;

        let data = fs::read_to_string(&path).map_err(|source| SessionError::Io {
            path: path.clone(),
            source,
        })?;
        let session: Session = serde_json::from_str(&data)
            .map_err(|source| SessionError::Malformed { path: path.clone(), source })?;
        if session.host != host {
            debug!(host, stored = %session.host, path = %path.display(), "session file belongs to another host");
            return Ok(None);
        }
        debug!(host, path = %path.display(), "loaded session");
        Ok(Some(session))
    }

    pub fn save(&self, session: &Session) -> Result<(), SessionError> {
        create_private_dir(&self.dir).map_err(|source| SessionError::Io {
            path: self.dir.clone(),
            source,
        })?;
        let path = self.path_for(&session.host);
        let data = serde_json::to_vec_pretty(session)
            .map_err(|source| SessionError::Malformed { path: path.clone(), source })?;
        write_private_file(&path, &data).map_err(|source| SessionError::Io {
            path: path.clone(),
            source,
        })?;
        debug!(host = %session.host, path = %path.display(), "saved session");
        Ok(())
    }

    /// Idempotent: a missing file is not an error.
    pub fn delete(&self, host: &str) -> Result<(), SessionError> {
        let path = self.path_for(host);
        match fs::remove_file(&path) {
            Ok(()) => {
                debug!(host, "deleted session");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(SessionError::Io { path, source }),
        }
    }
}

#[cfg(unix)]
fn check_permissions(path: &Path, metadata: &fs::Metadata) -> Result<(), SessionError> {
    use std::os::unix::fs::PermissionsExt;
    if metadata.permissions().mode() & 0o044 != 0 {
        return Err(SessionError::InsecurePermissions { path: path.to_path_buf() });
    }
    Ok(())
}

#[cfg(not(unix))]
fn check_permissions(_path: &Path, _metadata: &fs::Metadata) -> Result<(), SessionError> {
    Ok(())
}

#[cfg(unix)]
fn create_private_dir(dir: &Path) -> io::Result<()> {
    use std::os::unix::fs::DirBuilderExt;
    fs::DirBuilder::new().recursive(true).mode(0o700).create(dir)
}

#[cfg(not(unix))]
fn create_private_dir(dir: &Path) -> io::Result<()> {
    fs::create_dir_all(dir)
}

#[cfg(unix)]
fn write_private_file(path: &Path, data: &[u8]) -> io::Result<()> {
    use std::io::Write;
    use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
    let mut file = fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?;
    // An existing file keeps its old mode through open().
    file.set_permissions(fs::Permissions::from_mode(0o600))?;
    file.write_all(data)
}

#[cfg(not(unix))]
fn write_private_file(path: &Path, data: &[u8]) -> io::Result<()> {
    fs::write(path, data)
}

/// Session key for `url`: its authority, `host[:port]`.
pub fn extract_host(url: &str) -> Result<String, SessionError> {
    let parsed = Url::parse(url).map_err(|_| SessionError::InvalidUrl(url.to_string()))?;
    let host = parsed
        .host_str()
        .filter(|h| !h.is_empty())
        .ok_or_else(|| SessionError::InvalidUrl(url.to_string()))?;
    Ok(match parsed.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    })
}

/// Copy of `session` with every secret replaced by `***`.
pub fn redact(session: &Session) -> Session {
    Session {
        host: session.host.clone(),
        cookies: session
            .cookies
            .keys()
            .map(|name| (name.clone(), REDACTED.to_string()))
            .collect(),
        authorization: session.authorization.as_ref().map(|auth| match auth.split_once(' ') {
            Some((scheme, _)) => format!("{scheme} {REDACTED}"),
            None => REDACTED.to_string(),
        }),
    }
}

/// Text for `session show`. Redacted unless `machine` asks for raw JSON.
pub fn present(session: &Session, machine: bool) -> String {
    if machine {
        return serde_json::to_string_pretty(session).unwrap_or_default();
    }
    let redacted = redact(session);
    let mut out = String::new();
    let _ = writeln!(out, "Session for {}:", redacted.host);
    if !redacted.cookies.is_empty() {
        out.push_str("Cookies:\n");
        for (name, value) in &redacted.cookies {
            let _ = writeln!(out, "  {name}: {value}");
        }
    }
    if let Some(auth) = &redacted.authorization {
        let _ = writeln!(out, "Authorization: {auth}");
    }
    out
}

/// Fold captured `Set-Cookie` values and a JSON `access_token` into the
/// session for `host`.
pub fn update_from_response(
    existing: Option<Session>,
    host: &str,
    set_cookies: &[String],
    body: &[u8],
) -> Session {
    let mut session = existing.unwrap_or_else(|| Session::new(host));
    for header in set_cookies {
        let pair = header.split(';').next().unwrap_or_default().trim();
        if let Some((name, value)) = pair.split_once('=') {
            if !name.is_empty() {
                session.cookies.insert(name.to_string(), value.to_string());
            }
        }
    }
    if let Ok(serde_json::Value::Object(map)) = serde_json::from_slice::<serde_json::Value>(body) {
        if let Some(token) = map.get("access_token").and_then(|t| t.as_str()) {
            if !token.is_empty() {
                session.authorization = Some(format!("Bearer {token}"));
            }
        }
    }
    session
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Session {
        let mut session = Session::new("api.example.com");
        session.cookies.insert("session".to_string(), "abc123".to_string());
        session.authorization = Some("Bearer secret-token".to_string());
        session
    }

    #[test]
    fn save_load_delete() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path().join("state"));
        assert_eq!(store.load("api.example.com").unwrap(), None);

        store.save(&sample()).unwrap();
        assert_eq!(store.load("api.example.com").unwrap(), Some(sample()));
        assert!(store.path_for("api.example.com").is_file());

        store.delete("api.example.com").unwrap();
        store.delete("api.example.com").unwrap();
        assert_eq!(store.load("api.example.com").unwrap(), None);
    }

    #[test]
    fn host_with_port_maps_to_safe_file_name() {
        let store = SessionStore::new("/state");
        assert_eq!(
            store.path_for("127.0.0.1:8080"),
            PathBuf::from("/state/session_127.0.0.1_8080.json")
        );
    }

    #[test]
    fn colliding_file_names_keep_hosts_apart() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path());
        let mut stored = Session::new("my_host:8080");
        stored.authorization = Some("Bearer first".to_string());
        store.save(&stored).unwrap();

        assert_eq!(store.path_for("my:host_8080"), store.path_for("my_host:8080"));
        assert_eq!(store.load("my:host_8080").unwrap(), None);
        assert_eq!(store.load("my_host:8080").unwrap(), Some(stored));
    }

    #[cfg(unix)]
    #[test]
    fn files_are_owner_only_and_loose_files_are_refused() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path());
        store.save(&sample()).unwrap();
        let path = store.path_for("api.example.com");
        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);

        fs::set_permissions(&path, fs::Permissions::from_mode(0o644)).unwrap();
        let err = store.load("api.example.com").unwrap_err();
        assert!(matches!(err, SessionError::InsecurePermissions { .. }));

        store.save(&sample()).unwrap();
        assert!(store.load("api.example.com").unwrap().is_some());
    }

    #[test]
    fn extract_host_keeps_explicit_port() {
        assert_eq!(extract_host("https://api.example.com/login").unwrap(), "api.example.com");
        assert_eq!(extract_host("http://127.0.0.1:3000/x").unwrap(), "127.0.0.1:3000");
        assert_eq!(extract_host("https://api.example.com:443/").unwrap(), "api.example.com");
        assert!(extract_host("not a url").is_err());
    }

    #[test]
    fn redaction_hides_secrets() {
        let text = present(&sample(), false);
        assert!(text.contains("Session for api.example.com:"));
        assert!(text.contains("  session: ***"));
        assert!(text.contains("Authorization: Bearer ***"));
        assert!(!text.contains("abc123"));
        assert!(!text.contains("secret-token"));

        let json = present(&sample(), true);
        assert!(json.contains("secret-token"));
    }

    #[test]
    fn update_captures_cookies_and_token() {
        let set_cookies = vec![
            "session=test-session-123; Path=/; HttpOnly".to_string(),
            "theme=dark".to_string(),
            "=broken".to_string(),
        ];
        let body = br#"{"access_token":"tok-1","token_type":"bearer"}"#;
        let session = update_from_response(None, "api.example.com", &set_cookies, body);
        assert_eq!(session.cookies.get("session").map(String::as_str), Some("test-session-123"));
        assert_eq!(session.cookies.get("theme").map(String::as_str), Some("dark"));
        assert_eq!(session.cookies.len(), 2);
        assert_eq!(session.authorization.as_deref(), Some("Bearer tok-1"));

        let updated = update_from_response(Some(session), "api.example.com", &[], b"not json");
        assert_eq!(updated.authorization.as_deref(), Some("Bearer tok-1"));
    }

    #[test]
    fn cookie_header_joins_pairs() {
        assert_eq!(sample().cookie_header().as_deref(), Some("session=abc123"));
        assert_eq!(Session::new("h").cookie_header(), None);
    }
}
