//! The per-installation process secret and webhook key derivation.
//!
//! Every event key is derived from the event name and this secret, so the
//! secret file must survive restarts. Losing it invalidates every key that
//! was ever handed to a signal source.

use crate::component::ComponentName;
use md5::{Digest, Md5};
use std::io::Write;
use std::path::Path;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum SecretError {
    #[error("failed to access secret file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("secret file {0} is empty")]
    Empty(String),
}

/// The process secret. Generated once as a UUID v4 and persisted.
#[derive(Clone)]
pub struct ProcessSecret(String);

impl std::fmt::Debug for ProcessSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ProcessSecret([REDACTED])")
    }
}

impl ProcessSecret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Read the secret from `path`, creating it if the file does not exist.
    ///
    /// The file is created with create-new semantics, so two processes
    /// starting at once never overwrite each other's secret.
    pub fn load_or_create(path: impl AsRef<Path>) -> Result<Self, SecretError> {
        let path = path.as_ref();
        match std::fs::read_to_string(path) {
            Ok(content) => Self::from_content(path, &content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Self::create(path),
            Err(source) => Err(io_error(path, source)),
        }
    }

    fn create(path: &Path) -> Result<Self, SecretError> {
        let secret = Uuid::new_v4().to_string();
        let file = std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path);

        let mut file = match file {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                let content =
                    std::fs::read_to_string(path).map_err(|source| io_error(path, source))?;
                return Self::from_content(path, &content);
            }
            Err(source) => return Err(io_error(path, source)),
        };

        file.write_all(secret.as_bytes())
            .and_then(|_| file.sync_all())
            .map_err(|source| io_error(path, source))?;

        tracing::warn!(
            path = %path.display(),
            "Generated a new process secret. All webhook keys are derived from this file; \
             back it up, losing it invalidates every key already handed out"
        );
        Ok(Self(secret))
    }

    fn from_content(path: &Path, content: &str) -> Result<Self, SecretError> {
        let trimmed = content.trim();
        if trimmed.is_empty() {
            return Err(SecretError::Empty(path.display().to_string()));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Derive the webhook key of an event.
    pub fn derive_key(&self, event: &ComponentName) -> WebhookKey {
        WebhookKey::derive(event, self)
    }
}

fn io_error(path: &Path, source: std::io::Error) -> SecretError {
    SecretError::Io {
        path: path.display().to_string(),
        source,
    }
}

/// `"{EventName}:{first six hex chars of MD5(EventName + secret)}"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WebhookKey(String);

impl WebhookKey {
    pub fn derive(event: &ComponentName, secret: &ProcessSecret) -> Self {
        let mut hasher = Md5::new();
        hasher.update(event.as_str().as_bytes());
        hasher.update(secret.0.as_bytes());
        let digest = hasher.finalize();
        let short: String = digest.iter().take(3).map(|b| format!("{b:02x}")).collect();
        Self(format!("{event}:{short}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for WebhookKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl PartialEq<str> for WebhookKey {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(tag: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("sigrelay-secret-{tag}-{}", Uuid::new_v4()))
    }

    #[test]
    fn test_key_matches_md5_prefix() {
        let secret = ProcessSecret::new("s3cr3t");
        let name = ComponentName::parse("PriceAlert").unwrap();
        let key = secret.derive_key(&name);

        let digest = Md5::digest(b"PriceAlerts3cr3t");
        let expected: String = digest.iter().take(3).map(|b| format!("{b:02x}")).collect();
        assert_eq!(key.as_str(), format!("PriceAlert:{expected}"));
        assert_eq!(key.as_str().len(), "PriceAlert:".len() + 6);
    }

    #[test]
    fn test_key_is_stable_and_name_specific() {
        let secret = ProcessSecret::new("fixed");
        let a = ComponentName::parse("PriceAlert").unwrap();
        let b = ComponentName::parse("WebhookReceived").unwrap();
        assert_eq!(secret.derive_key(&a), ProcessSecret::new("fixed").derive_key(&a));
        assert_ne!(secret.derive_key(&a), ProcessSecret::new("other").derive_key(&a));
        assert_ne!(secret.derive_key(&a).as_str(), secret.derive_key(&b).as_str());
    }

    #[test]
    fn test_load_or_create_persists_secret() {
        let path = temp_path("persist");
        let first = ProcessSecret::load_or_create(&path).unwrap();
        let second = ProcessSecret::load_or_create(&path).unwrap();
        assert_eq!(first.0, second.0);
        assert!(Uuid::parse_str(&first.0).is_ok());
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_existing_secret_is_trimmed() {
        let path = temp_path("trim");
        std::fs::write(&path, "abc\n").unwrap();
        let secret = ProcessSecret::load_or_create(&path).unwrap();
        assert_eq!(secret.0, "abc");

        std::fs::write(&path, "  \n").unwrap();
        assert!(matches!(
            ProcessSecret::load_or_create(&path),
            Err(SecretError::Empty(_))
        ));
        std::fs::remove_file(&path).unwrap();
    }
}
