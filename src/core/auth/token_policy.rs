// Google access-token verification.
// The network call (tokeninfo introspection) lives in infra; this module
// owns the claim model and the audience/scope policy checks.

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashSet;
use thiserror::Error;

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid Google token. Status={status} Body={body}")]
    InvalidToken { status: u16, body: String },

    #[error("Invalid Google token (empty response).")]
    EmptyIntrospection,

    #[error("Token audience mismatch.")]
    AudienceMismatch,

    #[error("Missing required scope: {0}")]
    MissingScope(String),

    #[error("token verification transport error: {0}")]
    Transport(String),
}

// ============================================================================
// TOKEN MODEL & INTROSPECTION PORT
// ============================================================================

/// Claims returned by the tokeninfo endpoint. Only `aud` and `scope` are
/// policy-relevant; the rest is diagnostic.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TokenInfo {
    #[serde(default)]
    pub aud: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[allow(dead_code)]
    #[serde(default)]
    pub sub: Option<String>,
    #[allow(dead_code)]
    #[serde(default)]
    pub expires_in: Option<String>,
}

/// Token introspection port, implemented against Google's tokeninfo
/// endpoint in infra.
#[async_trait]
pub trait TokenIntrospector: Send + Sync {
    async fn introspect(&self, access_token: &str) -> Result<TokenInfo, AuthError>;
}

// ============================================================================
// POLICY
// ============================================================================

/// Audience and scope requirements for inbound tokens.
#[derive(Debug, Clone, Default)]
pub struct TokenPolicy {
    /// Expected `aud` claim; skipped when unset.
    pub expected_audience: Option<String>,
    /// Scopes that must all be granted.
    pub required_scopes: Vec<String>,
}

impl TokenPolicy {
    pub fn enforce(&self, info: &TokenInfo) -> Result<(), AuthError> {
        if let Some(expected) = &self.expected_audience {
            if info.aud.as_deref() != Some(expected.as_str()) {
                return Err(AuthError::AudienceMismatch);
            }
        }

        let granted: HashSet<&str> = info
            .scope
            .as_deref()
            .unwrap_or("")
            .split_whitespace()
            .collect();

        for required in &self.required_scopes {
            if !granted.contains(required.as_str()) {
                return Err(AuthError::MissingScope(required.clone()));
            }
        }

        Ok(())
    }
}
