use crate::error::AuthFailure;
use log::{error, info, warn};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

const BEARER_PREFIX: &str = "Bearer ";
const COMMENT_MARKER: char = '#';
/// How much of a rejected token may appear in the logs.
const REDACTED_PREFIX_CHARS: usize = 10;

#[derive(Debug, thiserror::Error)]
pub enum KeyLoadError {
    #[error("API keys file not found at {}", .0.display())]
    NotFound(PathBuf),
    #[error("Failed to read API keys file {}: {source}", .path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Outcome of checking one `Authorization` header value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthDecision {
    Allowed,
    Rejected(AuthFailure),
}

impl AuthDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, AuthDecision::Allowed)
    }

    pub fn error_message(&self) -> Option<&'static str> {
        match self {
            AuthDecision::Allowed => None,
            AuthDecision::Rejected(failure) => Some(failure.message()),
        }
    }
}

/// Allow-list of bearer tokens, fixed once loaded.
///
/// A source that cannot be read yields an empty store, so every credential is
/// refused until the process is restarted with a readable source.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    valid_keys: HashSet<String>,
    source_path: PathBuf,
}

impl CredentialStore {
    /// Load keys from `path`, falling back to an empty set on any read error.
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match Self::try_load(path) {
            Ok(store) => {
                info!(
                    "Loaded {} API keys from {}",
                    store.loaded_count(),
                    path.display()
                );
                store
            }
            Err(e) => {
                error!("{}", e);
                Self {
                    valid_keys: HashSet::new(),
                    source_path: path.to_path_buf(),
                }
            }
        }
    }

    pub fn try_load(path: impl AsRef<Path>) -> Result<Self, KeyLoadError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => KeyLoadError::NotFound(path.to_path_buf()),
            _ => KeyLoadError::Unreadable {
                path: path.to_path_buf(),
                source: e,
            },
        })?;
        Ok(Self::from_content(&content, path))
    }

    /// Build a store from line-oriented text. Blank lines and `#` comments
    /// are skipped; every other line is one key after trimming.
    pub fn from_content(content: &str, source_path: impl Into<PathBuf>) -> Self {
        let valid_keys = content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with(COMMENT_MARKER))
            .map(str::to_string)
            .collect();
        Self {
            valid_keys,
            source_path: source_path.into(),
        }
    }

    pub fn loaded_count(&self) -> usize {
        self.valid_keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.valid_keys.is_empty()
    }

    pub fn source_path(&self) -> &Path {
        &self.source_path
    }

    pub fn contains(&self, token: &str) -> bool {
        self.valid_keys.contains(token)
    }

    /// Check an `Authorization` header value. An absent header is passed as "".
    pub fn validate(&self, auth_header: &str) -> AuthDecision {
        if auth_header.is_empty() {
            return AuthDecision::Rejected(AuthFailure::MissingHeader);
        }

        let Some(token) = auth_header.strip_prefix(BEARER_PREFIX) else {
            return AuthDecision::Rejected(AuthFailure::MalformedHeader);
        };

        if !self.contains(token) {
            warn!("Invalid API key attempt: {}...", redact(token));
            return AuthDecision::Rejected(AuthFailure::UnknownKey);
        }

        AuthDecision::Allowed
    }
}

fn redact(token: &str) -> &str {
    match token.char_indices().nth(REDACTED_PREFIX_CHARS) {
        Some((end, _)) => &token[..end],
        None => token,
    }
}
