//! Web API credentials.
//!
//! Looked up the same way the ECMWF API clients do: the `ECMWF_API_URL`,
//! `ECMWF_API_KEY` and `ECMWF_API_EMAIL` environment variables first, then the
//! JSON file `~/.ecmwfapirc`.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{Error, Result};

pub const DEFAULT_API_URL: &str = "https://api.ecmwf.int/v1";
pub const RC_FILE_NAME: &str = ".ecmwfapirc";

#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct Credentials {
    #[serde(default = "default_url")]
    pub url: String,
    pub key: String,
    pub email: String,
}

fn default_url() -> String {
    DEFAULT_API_URL.to_string()
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("url", &self.url)
            .field("key", &"<redacted>")
            .field("email", &self.email)
            .finish()
    }
}

impl Credentials {
    /// Resolve from the process environment, falling back to `rc_file` (or
    /// `~/.ecmwfapirc` when `None`).
    pub fn resolve(rc_file: Option<&Path>) -> Result<Self> {
        let lookup = |name: &str| std::env::var(name).ok();
        if let Some(c) = Self::from_lookup(lookup) {
            tracing::debug!(url = %c.url, "using credentials from environment");
            return Ok(c);
        }

        let path = match rc_file {
            Some(p) => p.to_path_buf(),
            None => default_rc_path()?,
        };
        let c = Self::from_rc_file(&path)?;
        tracing::debug!(url = %c.url, path = %path.display(), "using credentials from rc file");
        Ok(c)
    }

    /// Key and email are both required; url is optional.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Option<Self> {
        let key = lookup("ECMWF_API_KEY").filter(|s| !s.is_empty())?;
        let email = lookup("ECMWF_API_EMAIL").filter(|s| !s.is_empty())?;
        let url = lookup("ECMWF_API_URL")
            .filter(|s| !s.is_empty())
            .unwrap_or_else(default_url);
        Some(Self { url, key, email })
    }

    pub fn from_rc_file(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path).map_err(|e| {
            Error::Config(format!(
                "no ECMWF_API_KEY/ECMWF_API_EMAIL in environment and cannot read {}: {e}",
                path.display()
            ))
        })?;
        Self::from_rc_str(&raw)
    }

    pub fn from_rc_str(raw: &str) -> Result<Self> {
        let c: Credentials = serde_json::from_str(raw)?;
        if c.key.is_empty() || c.email.is_empty() {
            return Err(Error::Config("rc file has an empty key or email".into()));
        }
        Ok(c)
    }
}

fn default_rc_path() -> Result<PathBuf> {
    dirs::home_dir()
        .map(|h| h.join(RC_FILE_NAME))
        .ok_or_else(|| Error::Config("cannot determine home directory for ~/.ecmwfapirc".into()))
}
