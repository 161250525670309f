//! HTTP handler for the Kubernetes authentication webhook.

use axum::{Json, body::Bytes, extract::State};
use tracing::debug;

use crate::{
    AppState,
    api::models::token_review::{API_VERSION, TokenReviewRequest, TokenReviewResponse},
    errors::{Error, Result},
};

/// Answer a TokenReview posted by the API server.
///
/// Every failure (unparseable body, wrong apiVersion, bad token encoding, backend trouble) is
/// reported as a 500 with a plain-text message. A token that was evaluated but does not belong
/// to a member of the environment gets a normal `authenticated: false` review.
#[tracing::instrument(skip_all)]
pub async fn review_token(State(state): State<AppState>, body: Bytes) -> Result<Json<TokenReviewResponse>> {
    debug!("Authentication request: {}", String::from_utf8_lossy(&body));

    let request: TokenReviewRequest = serde_json::from_slice(&body).map_err(|e| Error::MalformedRequest { message: e.to_string() })?;

    if request.api_version != API_VERSION {
        return Err(Error::UnsupportedApiVersion {
            version: request.api_version,
        });
    }

    let token = request.spec.token.trim().to_string();

    // The lookup runs to completion even if the API server hangs up on us
    let provider = state.provider.clone();
    let user = tokio::spawn(async move { provider.lookup(&token).await })
        .await
        .map_err(|e| Error::Other(anyhow::anyhow!("Token lookup task failed: {e}")))??;

    let response = TokenReviewResponse::from(user);
    if let Ok(body) = serde_json::to_string(&response) {
        debug!("Authentication response: {}", body);
    }
    Ok(Json(response))
}
