// Expense extraction service - the orchestration seam of the backend.
//
// One call per batch: resolve the credential, render the prompts, issue a
// single completions request, normalize whatever the model answered, and
// align the result 1:1 with the source emails. There is no retry and no
// partial success: a batch either fully parses or fails as a whole.

use super::align::align_to_source;
use super::models::{EmailRecord, ExpenseRecord};
use super::normalize::{self, ParseError};
use super::prompt::{self, DEFAULT_SYSTEM_PROMPT, DEFAULT_USER_PROMPT_TEMPLATE};
use crate::core::secrets::{SecretCache, SecretError, SecretStore};
use async_trait::async_trait;
use thiserror::Error;

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Error)]
pub enum ExpenseError {
    /// Required prompt or credential configuration is missing or blank.
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error(transparent)]
    Secret(#[from] SecretError),

    #[error(transparent)]
    Completion(#[from] CompletionError),

    #[error(transparent)]
    Parse(#[from] ParseError),
}

/// Failure of the outbound completions call.
#[derive(Debug, Error)]
pub enum CompletionError {
    /// The API answered with a non-success status; body kept verbatim.
    #[error("completion request failed. Status={status} Body={body}")]
    Upstream { status: u16, body: String },

    /// The request never produced a response (DNS, TLS, connect, timeout).
    #[error("completion transport error: {0}")]
    Transport(String),
}

// ============================================================================
// COMPLETION PROVIDER (PORT)
// ============================================================================

/// One chat-completion exchange with the model provider.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub model: String,
    pub system_prompt: String,
    pub user_prompt: String,
}

/// Outbound completions port. Implementations return the raw response body;
/// envelope handling belongs to the normalizer, not the client.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Issues exactly one request. No retries, no backoff - a transient
    /// upstream failure fails the batch.
    async fn complete(
        &self,
        api_key: &str,
        request: &CompletionRequest,
    ) -> Result<String, CompletionError>;
}

// ============================================================================
// SETTINGS
// ============================================================================

/// Prompt and model configuration, resolved lazily per batch.
#[derive(Debug, Clone)]
pub struct ParserSettings {
    pub model: String,
    pub system_prompt: Option<String>,
    pub user_prompt_template: Option<String>,
    /// Restores the built-in prompt texts when explicit configuration is
    /// absent. Off by default: a missing prompt is then a configuration
    /// failure rather than a silent fallback.
    pub use_default_prompts: bool,
}

impl ParserSettings {
    fn resolve_system_prompt(&self) -> Result<String, ExpenseError> {
        Self::resolve(
            self.system_prompt.as_deref(),
            DEFAULT_SYSTEM_PROMPT,
            self.use_default_prompts,
            "OPENAI_SYSTEM_PROMPT",
        )
    }

    fn resolve_user_template(&self) -> Result<String, ExpenseError> {
        Self::resolve(
            self.user_prompt_template.as_deref(),
            DEFAULT_USER_PROMPT_TEMPLATE,
            self.use_default_prompts,
            "OPENAI_USER_PROMPT_TEMPLATE",
        )
    }

    fn resolve(
        configured: Option<&str>,
        default_text: &str,
        allow_default: bool,
        config_key: &str,
    ) -> Result<String, ExpenseError> {
        match configured {
            Some(text) if !text.trim().is_empty() => Ok(text.to_string()),
            _ if allow_default => Ok(default_text.to_string()),
            _ => Err(ExpenseError::Configuration(format!(
                "{} is required when default prompts are disabled",
                config_key
            ))),
        }
    }
}

// ============================================================================
// SERVICE
// ============================================================================

pub struct ExpenseService<P: CompletionProvider, S: SecretStore> {
    provider: P,
    secrets: SecretCache<S>,
    settings: ParserSettings,
}

impl<P: CompletionProvider, S: SecretStore> ExpenseService<P, S> {
    pub fn new(provider: P, secrets: SecretCache<S>, settings: ParserSettings) -> Self {
        Self {
            provider,
            secrets,
            settings,
        }
    }

    /// Parses one batch of emails into exactly `emails.len()` expense
    /// records, in input order.
    pub async fn parse_batch(
        &self,
        emails: &[EmailRecord],
        categories: &[String],
    ) -> Result<Vec<ExpenseRecord>, ExpenseError> {
        let api_key = self.secrets.get().await?;
        let system_prompt = self.settings.resolve_system_prompt()?;
        let template = self.settings.resolve_user_template()?;
        let user_prompt = prompt::build_user_prompt(emails, categories, &template);

        let request = CompletionRequest {
            model: self.settings.model.clone(),
            system_prompt,
            user_prompt,
        };

        let raw_body = self.provider.complete(api_key, &request).await?;
        let candidates = normalize::extract_candidates(&raw_body)?;

        tracing::debug!(
            emails = emails.len(),
            candidates = candidates.len(),
            "normalized model response"
        );

        Ok(align_to_source(&candidates, emails))
    }
}
