// Credential caching for the model provider.
//
// The API key is resolved at most once per process: a direct configuration
// value wins, otherwise the secret store is consulted - and only a single
// caller ever reaches the store, even when the first batches arrive
// concurrently. Once populated, reads don't touch a lock.

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::OnceCell;

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Error)]
pub enum SecretError {
    /// No credential source is configured, or the resolved secret is blank.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The secret store was consulted but the fetch failed.
    #[error("secret store error: {0}")]
    Store(String),
}

// ============================================================================
// SECRET STORE (PORT)
// ============================================================================

/// External secret store (a key vault in production, a fake in tests).
#[async_trait]
pub trait SecretStore: Send + Sync {
    async fn fetch_secret(&self, name: &str) -> Result<String, SecretError>;
}

// ============================================================================
// CACHE
// ============================================================================

/// Write-once credential cache with single-flight resolution.
///
/// Held by the pipeline instance rather than living in a `static`, so tests
/// can inject a fake store and observe how often it gets called.
pub struct SecretCache<S: SecretStore> {
    direct_value: Option<String>,
    secret_name: String,
    store: Option<S>,
    resolved: OnceCell<String>,
}

impl<S: SecretStore> SecretCache<S> {
    /// A blank `direct_value` counts as absent.
    pub fn new(direct_value: Option<String>, secret_name: impl Into<String>, store: Option<S>) -> Self {
        Self {
            direct_value: direct_value.filter(|value| !value.trim().is_empty()),
            secret_name: secret_name.into(),
            store,
            resolved: OnceCell::new(),
        }
    }

    /// Returns the credential, resolving it on first use.
    ///
    /// `OnceCell::get_or_try_init` provides the double-checked discipline:
    /// a populated cell returns without synchronization, an empty one
    /// admits one initializer at a time and re-checks after the wait. A
    /// failed resolution leaves the cell empty, so the next caller tries
    /// again.
    pub async fn get(&self) -> Result<&str, SecretError> {
        self.resolved
            .get_or_try_init(|| self.resolve())
            .await
            .map(String::as_str)
    }

    async fn resolve(&self) -> Result<String, SecretError> {
        if let Some(value) = &self.direct_value {
            return Ok(value.clone());
        }

        let store = self.store.as_ref().ok_or_else(|| {
            SecretError::Configuration(format!(
                "KEY_VAULT_URI is required to load {}",
                self.secret_name
            ))
        })?;

        let value = store.fetch_secret(&self.secret_name).await?;
        if value.trim().is_empty() {
            return Err(SecretError::Configuration(format!(
                "Secret {} is empty.",
                self.secret_name
            )));
        }

        tracing::info!(secret = %self.secret_name, "loaded credential from secret store");
        Ok(value)
    }
}
