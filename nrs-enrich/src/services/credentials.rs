//! Bearer tokens for gated sources
//!
//! Each source's token file is read at most once per run; the token is then
//! held for the store's lifetime. Acquiring or refreshing tokens happens
//! outside this crate.

use crate::error::{AdapterError, AdapterResult};
use nrs_common::config::CredentialsConfig;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tokio::sync::OnceCell;
use tracing::info;

#[derive(Debug, Deserialize)]
struct TokenFile {
    access_token: String,
}

struct TokenSlot {
    path: PathBuf,
    token: OnceCell<String>,
}

#[derive(Default)]
pub struct CredentialStore {
    slots: BTreeMap<String, TokenSlot>,
}

impl CredentialStore {
    pub fn from_config(config: &CredentialsConfig) -> Self {
        let slots = config
            .token_files
            .iter()
            .map(|(source, path)| {
                (
                    source.clone(),
                    TokenSlot {
                        path: path.clone(),
                        token: OnceCell::new(),
                    },
                )
            })
            .collect();
        Self { slots }
    }

    pub fn has_source(&self, source: &str) -> bool {
        self.slots.contains_key(source)
    }

    /// Token for `source`, loading its file on first use
    pub async fn bearer_token(&self, source: &str) -> AdapterResult<&str> {
        let slot = self.slots.get(source).ok_or_else(|| {
            AdapterError::Auth(format!("No credentials configured for '{}'", source))
        })?;

        let token = slot
            .token
            .get_or_try_init(|| async {
                let content = tokio::fs::read_to_string(&slot.path).await.map_err(|e| {
                    AdapterError::Auth(format!(
                        "Failed to read {} credentials from {}: {}",
                        source,
                        slot.path.display(),
                        e
                    ))
                })?;
                let file: TokenFile = serde_json::from_str(&content).map_err(|e| {
                    AdapterError::Auth(format!(
                        "Malformed {} credentials in {}: {}",
                        source,
                        slot.path.display(),
                        e
                    ))
                })?;
                info!("Loaded {} credentials from {}", source, slot.path.display());
                Ok::<_, AdapterError>(file.access_token)
            })
            .await?;

        Ok(token.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with(source: &str, path: PathBuf) -> CredentialStore {
        let mut config = CredentialsConfig::default();
        config.token_files.insert(source.to_string(), path);
        CredentialStore::from_config(&config)
    }

    #[tokio::test]
    async fn test_token_loaded_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("spotify_credentials.json");
        std::fs::write(&path, r#"{"access_token": "first", "expires_in": 3600}"#).unwrap();

        let store = store_with("spotify", path.clone());
        assert!(store.has_source("spotify"));
        assert_eq!(store.bearer_token("spotify").await.unwrap(), "first");

        // Rewriting the file mid-run has no effect
        std::fs::write(&path, r#"{"access_token": "second"}"#).unwrap();
        assert_eq!(store.bearer_token("spotify").await.unwrap(), "first");
    }

    #[tokio::test]
    async fn test_unknown_source_is_auth_error() {
        let store = CredentialStore::default();
        assert!(matches!(
            store.bearer_token("google").await,
            Err(AdapterError::Auth(_))
        ));
    }

    #[tokio::test]
    async fn test_missing_or_malformed_file() {
        let dir = tempfile::tempdir().unwrap();
        let missing = store_with("google", dir.path().join("absent.json"));
        assert!(matches!(
            missing.bearer_token("google").await,
            Err(AdapterError::Auth(_))
        ));

        let path = dir.path().join("google_credentials.json");
        std::fs::write(&path, r#"{"token": "x"}"#).unwrap();
        let malformed = store_with("google", path);
        assert!(matches!(
            malformed.bearer_token("google").await,
            Err(AdapterError::Auth(_))
        ));
    }
}
