use crate::core::auth::{AuthError, TokenInfo, TokenIntrospector};
use async_trait::async_trait;
use reqwest::Client;

const TOKENINFO_URL: &str = "https://www.googleapis.com/oauth2/v3/tokeninfo";

/// Google tokeninfo client: asks Google what an access token is good for.
pub struct GoogleTokenClient {
    client: Client,
}

impl GoogleTokenClient {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }
}

impl Default for GoogleTokenClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TokenIntrospector for GoogleTokenClient {
    async fn introspect(&self, access_token: &str) -> Result<TokenInfo, AuthError> {
        let response = self
            .client
            .get(TOKENINFO_URL)
            .query(&[("access_token", access_token)])
            .send()
            .await
            .map_err(|err| AuthError::Transport(err.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::InvalidToken { status, body });
        }

        response
            .json()
            .await
            .map_err(|_| AuthError::EmptyIntrospection)
    }
}
