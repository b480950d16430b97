use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use tracing::debug;

use crate::api::handler::AppState;
use crate::error::{AppError, AppResult};

/// Resolves the `profile_id` header into a Profile and attaches it to the
/// request, so every route behind this middleware can take the caller as an
/// extension instead of re-reading ambient request state.
pub async fn resolve_profile(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> AppResult<Response> {
    let header = request
        .headers()
        .get("profile_id")
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| AppError::Unauthenticated("profile_id header is required".to_string()))?;

    let profile_id: i64 = header
        .parse()
        .map_err(|_| AppError::Unauthenticated(format!("invalid profile id: {}", header)))?;

    // A store failure here surfaces as a 500, not a 401: the caller may
    // well exist
    let profile = state
        .store
        .find_profile(profile_id)
        .await?
        .ok_or_else(|| AppError::Unauthenticated(format!("unknown profile: {}", profile_id)))?;

    debug!("Resolved profile {} ({})", profile.id, profile.kind);

    request.extensions_mut().insert(profile);
    Ok(next.run(request).await)
}
