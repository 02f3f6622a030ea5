// The email push route - wiring between the HTTP surface and the pipeline.
//
// Error bodies follow a fixed contract: 400 for anything wrong with the
// request itself, 401 for token verification failures, 500 with a
// diagnostic detail when the pipeline gives up on a batch.

use super::contracts::{ErrorBody, PushRequest, PushResponse};
use crate::core::auth::{AuthError, TokenIntrospector, TokenPolicy};
use crate::core::expense::{ExpenseError, ExpenseService};
use crate::core::secrets::SecretError;
use crate::infra::google::GoogleTokenClient;
use crate::infra::openai::OpenAiClient;
use crate::infra::secrets::KeyVaultClient;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

const BEARER_SCHEME: &str = "Bearer";

const ERROR_INVALID_JSON: &str = "Invalid JSON body.";
const ERROR_TOKEN_REQUIRED: &str = "Authorization header with Bearer token is required.";
const ERROR_EMAILS_REQUIRED: &str = "emails must contain at least one entry.";
const ERROR_PARSING_FAILED: &str = "OpenAI parsing failed.";
const ERROR_INTERNAL: &str = "Internal server error while processing emails.";

/// Shared state for request handlers.
pub struct AppState {
    pub parser: ExpenseService<OpenAiClient, KeyVaultClient>,
    pub introspector: GoogleTokenClient,
    pub policy: TokenPolicy,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/OnEmailPush", post(on_email_push))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn on_email_push(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: Result<Json<PushRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match payload {
        Ok(json) => json,
        Err(rejection) => {
            tracing::warn!("invalid request body: {}", rejection);
            return bad_request(ERROR_INVALID_JSON);
        }
    };

    tracing::info!(
        emails = request.emails.len(),
        categories = request.categories.len(),
        "email push request received"
    );

    let token = extract_bearer_token(&headers);
    if token.trim().is_empty() {
        return bad_request(ERROR_TOKEN_REQUIRED);
    }

    if request.emails.is_empty() {
        return bad_request(ERROR_EMAILS_REQUIRED);
    }

    if let Err(err) = verify_token(&state, &token).await {
        tracing::warn!("token verification failed: {}", err);
        return error_response(
            StatusCode::UNAUTHORIZED,
            ErrorBody {
                error: err.to_string(),
                details: None,
            },
        );
    }

    match state
        .parser
        .parse_batch(&request.emails, &request.categories)
        .await
    {
        Ok(entries) => {
            tracing::info!(parsed = entries.len(), "email push request completed");
            (
                StatusCode::OK,
                Json(PushResponse {
                    total: entries.len(),
                    entries,
                }),
            )
                .into_response()
        }
        Err(err) => {
            tracing::error!("expense parsing failed: {}", err);
            map_pipeline_error(err)
        }
    }
}

async fn verify_token(state: &AppState, token: &str) -> Result<(), AuthError> {
    let info = state.introspector.introspect(token).await?;
    state.policy.enforce(&info)?;
    tracing::debug!(email = ?info.email, "token verified");
    Ok(())
}

/// Pulls the access token out of the Authorization header. The `Bearer `
/// prefix is matched case-insensitively; a header without it is treated as
/// the token itself.
fn extract_bearer_token(headers: &HeaderMap) -> String {
    let header = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("")
        .trim();

    match header.split_once(' ') {
        Some((scheme, rest)) if scheme.eq_ignore_ascii_case(BEARER_SCHEME) => {
            rest.trim().to_string()
        }
        _ => header.to_string(),
    }
}

/// Secret-store transport failures stay generic; everything else the
/// pipeline reports is a parsing-side failure and carries its detail.
fn map_pipeline_error(err: ExpenseError) -> Response {
    let body = match &err {
        ExpenseError::Secret(SecretError::Store(_)) => ErrorBody {
            error: ERROR_INTERNAL.to_string(),
            details: None,
        },
        _ => ErrorBody {
            error: ERROR_PARSING_FAILED.to_string(),
            details: Some(err.to_string()),
        },
    };
    error_response(StatusCode::INTERNAL_SERVER_ERROR, body)
}

fn bad_request(message: &str) -> Response {
    error_response(
        StatusCode::BAD_REQUEST,
        ErrorBody {
            error: message.to_string(),
            details: None,
        },
    )
}

fn error_response(status: StatusCode, body: ErrorBody) -> Response {
    (status, Json(body)).into_response()
}
