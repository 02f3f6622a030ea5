// This is the entry point of the expense extraction backend.
//
// **Architecture Overview:**
// - `core/` = Business logic (transport-agnostic)
// - `infra/` = Implementations of core traits (vendor REST APIs)
// - `http/` = HTTP adapters (routes, contracts, error mapping)
//
// This file's job is to:
// 1. Load configuration
// 2. Initialize services (dependency injection)
// 3. Serve the email push trigger

// These attrs point each module declaration at a more descriptive root file
// so we don't end up with half a dozen mod.rs files that all look the same.
#[path = "core/core_layer.rs"]
mod core;
#[path = "http/http_layer.rs"]
mod http;
#[path = "infra/infra_layer.rs"]
mod infra;

use crate::core::auth::TokenPolicy;
use crate::core::expense::{ExpenseService, ParserSettings};
use crate::core::secrets::SecretCache;
use crate::http::routes::{self, AppState};
use crate::infra::google::GoogleTokenClient;
use crate::infra::openai::OpenAiClient;
use crate::infra::secrets::KeyVaultClient;
use std::sync::Arc;

const OPENAI_SECRET_NAME: &str = "openai-api-key";
const DEFAULT_MODEL: &str = "gpt-4o-mini";
const DEFAULT_PORT: u16 = 8080;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging so we can see what's happening
    tracing_subscriber::fmt::init();

    // Load environment variables from .env file (if it exists)
    dotenv::dotenv().ok();

    let settings = ParserSettings {
        model: std::env::var("OPENAI_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string()),
        system_prompt: std::env::var("OPENAI_SYSTEM_PROMPT").ok(),
        user_prompt_template: std::env::var("OPENAI_USER_PROMPT_TEMPLATE").ok(),
        use_default_prompts: std::env::var("OPENAI_PROMPT_DEFAULTS")
            .ok()
            .and_then(|v| v.parse::<bool>().ok())
            .unwrap_or(false),
    };

    // Credential sources: a direct key wins, otherwise Key Vault is
    // consulted lazily on the first batch.
    let direct_api_key = std::env::var("OPENAI_API_KEY").ok();
    let vault = std::env::var("KEY_VAULT_URI")
        .ok()
        .filter(|uri| !uri.trim().is_empty())
        .map(KeyVaultClient::new);
    let secrets = SecretCache::new(direct_api_key, OPENAI_SECRET_NAME, vault);

    let parser = ExpenseService::new(OpenAiClient::new(), secrets, settings);

    let policy = TokenPolicy {
        expected_audience: std::env::var("GOOGLE_CLIENT_ID").ok(),
        required_scopes: std::env::var("REQUIRED_OAUTH_SCOPES")
            .map(|raw| {
                raw.split([',', ' '])
                    .map(str::trim)
                    .filter(|scope| !scope.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default(),
    };

    let state = Arc::new(AppState {
        parser,
        introspector: GoogleTokenClient::new(),
        policy,
    });

    let port = std::env::var("PORT")
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(DEFAULT_PORT);
    let addr = format!("0.0.0.0:{}", port);

    tracing::info!("listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, routes::router(state)).await?;

    Ok(())
}
