//! Secret resolution.
//!
//! Token signing secrets are referenced by name in configuration and looked
//! up through a [`SecretProvider`] at startup, so the secrets themselves
//! never appear in config files or in the serialized [`crate::Config`].

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SecretError {
    #[error("secret not found: {0}")]
    NotFound(String),

    #[error("failed to read secret file: {0}")]
    FileRead(#[from] std::io::Error),
}

/// Secret lookup interface.
pub trait SecretProvider: Send + Sync {
    fn get(&self, key: &str) -> Result<String, SecretError>;

    fn has(&self, key: &str) -> bool;
}

/// Resolves secrets from process environment variables.
pub struct EnvSecretProvider;

impl SecretProvider for EnvSecretProvider {
    fn get(&self, key: &str) -> Result<String, SecretError> {
        std::env::var(key).map_err(|_| SecretError::NotFound(key.to_string()))
    }

    fn has(&self, key: &str) -> bool {
        std::env::var(key).is_ok()
    }
}

/// Resolves secrets from individual files in a directory, one file per key.
/// Matches Docker/Kubernetes mounted-secret layouts.
pub struct FileSecretProvider {
    base_path: PathBuf,
}

impl FileSecretProvider {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self { base_path: base_path.into() }
    }

    fn path(&self, key: &str) -> PathBuf {
        Path::new(&self.base_path).join(key)
    }
}

impl SecretProvider for FileSecretProvider {
    fn get(&self, key: &str) -> Result<String, SecretError> {
        let path = self.path(key);
        if !path.exists() {
            return Err(SecretError::NotFound(key.to_string()));
        }

        let content = fs::read_to_string(&path)?;
        Ok(content.trim().to_string())
    }

    fn has(&self, key: &str) -> bool {
        self.path(key).exists()
    }
}

/// Fixed in-memory secrets, for tests and local tooling.
#[derive(Default)]
pub struct StaticSecretProvider {
    secrets: HashMap<String, String>,
}

impl StaticSecretProvider {
    pub fn new<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            secrets: entries.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

impl SecretProvider for StaticSecretProvider {
    fn get(&self, key: &str) -> Result<String, SecretError> {
        self.secrets
            .get(key)
            .cloned()
            .ok_or_else(|| SecretError::NotFound(key.to_string()))
    }

    fn has(&self, key: &str) -> bool {
        self.secrets.contains_key(key)
    }
}

/// Tries providers in order, first hit wins. Typical layering is environment
/// first, then a mounted-secrets directory.
#[derive(Default)]
pub struct CompositeSecretProvider {
    providers: Vec<Box<dyn SecretProvider>>,
}

impl CompositeSecretProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_provider(mut self, provider: Box<dyn SecretProvider>) -> Self {
        self.providers.push(provider);
        self
    }
}

impl SecretProvider for CompositeSecretProvider {
    fn get(&self, key: &str) -> Result<String, SecretError> {
        for provider in &self.providers {
            if let Ok(value) = provider.get(key) {
                return Ok(value);
            }
        }
        Err(SecretError::NotFound(key.to_string()))
    }

    fn has(&self, key: &str) -> bool {
        self.providers.iter().any(|p| p.has(key))
    }
}
