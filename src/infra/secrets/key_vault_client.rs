// Azure Key Vault secret store.
//
// Authentication uses the managed-identity flow: an access token for the
// vault resource is requested from the instance metadata endpoint, then
// the secret is read over the vault REST API. The credential cache in core
// calls this at most once per process, so no token caching happens here.

use crate::core::secrets::{SecretError, SecretStore};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

const IMDS_TOKEN_URL: &str = "http://169.254.169.254/metadata/identity/oauth2/token";
const IMDS_API_VERSION: &str = "2018-02-01";
const VAULT_RESOURCE: &str = "https://vault.azure.net";
const VAULT_API_VERSION: &str = "7.4";

/// Response from the instance metadata token endpoint.
#[derive(Debug, Deserialize)]
struct ManagedIdentityToken {
    access_token: String,
}

/// The vault's secret payload; everything but `value` is ignored.
#[derive(Debug, Deserialize)]
struct SecretBundle {
    value: String,
}

pub struct KeyVaultClient {
    client: Client,
    vault_uri: String,
}

impl KeyVaultClient {
    pub fn new(vault_uri: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            vault_uri: vault_uri.into(),
        }
    }

    async fn acquire_access_token(&self) -> Result<String, SecretError> {
        let response = self
            .client
            .get(IMDS_TOKEN_URL)
            .header("Metadata", "true")
            .query(&[
                ("api-version", IMDS_API_VERSION),
                ("resource", VAULT_RESOURCE),
            ])
            .send()
            .await
            .map_err(|err| SecretError::Store(format!("identity endpoint unreachable: {}", err)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(SecretError::Store(format!(
                "identity endpoint returned {}: {}",
                status, body
            )));
        }

        let token: ManagedIdentityToken = response.json().await.map_err(|err| {
            SecretError::Store(format!("identity token response malformed: {}", err))
        })?;
        Ok(token.access_token)
    }
}

#[async_trait]
impl SecretStore for KeyVaultClient {
    async fn fetch_secret(&self, name: &str) -> Result<String, SecretError> {
        let access_token = self.acquire_access_token().await?;
        let url = format!("{}/secrets/{}", self.vault_uri.trim_end_matches('/'), name);

        let response = self
            .client
            .get(&url)
            .query(&[("api-version", VAULT_API_VERSION)])
            .header("Authorization", format!("Bearer {}", access_token))
            .send()
            .await
            .map_err(|err| SecretError::Store(format!("vault unreachable: {}", err)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(SecretError::Store(format!(
                "vault returned {} for secret {}: {}",
                status, name, body
            )));
        }

        let bundle: SecretBundle = response
            .json()
            .await
            .map_err(|err| SecretError::Store(format!("secret bundle malformed: {}", err)))?;
        Ok(bundle.value)
    }
}
