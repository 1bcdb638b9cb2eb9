//! Process-level settings, resolved once at startup.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

pub const STATE_DIR_ENV: &str = "REQ_STATE_DIR";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
pub const MAX_REDIRECTS: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Directory holding session files.
    pub state_dir: PathBuf,
    /// Deadline for an exchange whose plan sets none.
    pub default_timeout: Duration,
    pub max_redirects: usize,
}

impl Config {
    pub fn new(state_dir: impl Into<PathBuf>) -> Self {
        Self {
            state_dir: state_dir.into(),
            default_timeout: DEFAULT_TIMEOUT,
            max_redirects: MAX_REDIRECTS,
        }
    }

    /// `REQ_STATE_DIR`, else `$HOME/.config/req`, else `.req`.
    pub fn from_env() -> Self {
        Self::new(resolve_state_dir(
            env::var_os(STATE_DIR_ENV).map(PathBuf::from),
            env::var_os("HOME").map(PathBuf::from),
        ))
    }
}

fn resolve_state_dir(explicit: Option<PathBuf>, home: Option<PathBuf>) -> PathBuf {
    explicit
        .filter(|p| !p.as_os_str().is_empty())
        .or_else(|| {
            home.filter(|h| !h.as_os_str().is_empty())
                .map(|h| h.join(".config").join("req"))
        })
        .unwrap_or_else(|| PathBuf::from(".req"))
}
