//! Bearer credentials for the push endpoint.
//!
//! The token is appended to the connection URL as `?token=<bearer>` when
//! one is stored, and omitted otherwise.

use std::path::{Path, PathBuf};
use tracing::warn;

/// Source of the bearer token used when opening the realtime connection.
///
/// Looked up on every connection attempt so a rotated token is picked up
/// by the next reconnect.
pub trait CredentialStore: Send + Sync {
    fn bearer_token(&self) -> Option<String>;
}

/// A fixed token, or none.
#[derive(Debug, Clone, Default)]
pub struct StaticCredentials {
    token: Option<String>,
}

impl StaticCredentials {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: Some(token.into()),
        }
    }

    pub fn anonymous() -> Self {
        Self { token: None }
    }
}

impl CredentialStore for StaticCredentials {
    fn bearer_token(&self) -> Option<String> {
        self.token.clone()
    }
}

/// Token persisted in a file, written there by whatever performed the login.
#[derive(Debug, Clone)]
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CredentialStore for FileCredentialStore {
    fn bearer_token(&self) -> Option<String> {
        if !self.path.exists() {
            return None;
        }
        match std::fs::read_to_string(&self.path) {
            Ok(contents) => {
                let token = contents.trim();
                (!token.is_empty()).then(|| token.to_string())
            }
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "Failed to read credential file");
                None
            }
        }
    }
}

/// Build the connection URL, appending the bearer token when present.
pub fn endpoint_url(endpoint: &str, token: Option<&str>) -> String {
    match token {
        Some(token) if !token.is_empty() => {
            let separator = if endpoint.contains('?') { '&' } else { '?' };
            format!(
                "{}{}token={}",
                endpoint,
                separator,
                urlencoding::encode(token)
            )
        }
        _ => endpoint.to_string(),
    }
}
