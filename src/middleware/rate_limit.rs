use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use governor::{clock::DefaultClock, state::keyed::DefaultKeyedStateStore, Quota, RateLimiter};
use std::num::NonZeroU32;
use std::time::Duration;
use tracing::warn;

use crate::api::handler::AppState;
use crate::error::{AppError, AppResult};
use crate::ledger::models::Profile;

/// Per-profile limiter for the money-moving endpoints, keyed by profile id
/// so one aggressive caller cannot starve everyone else
pub struct SettlementRateLimit {
    limiter: RateLimiter<i64, DefaultKeyedStateStore<i64>, DefaultClock>,
}

impl SettlementRateLimit {
    pub fn new(requests: u32, per_seconds: u64) -> Self {
        let quota = Quota::with_period(Duration::from_secs(per_seconds))
            .unwrap()
            .allow_burst(NonZeroU32::new(requests).unwrap());

        SettlementRateLimit {
            limiter: RateLimiter::keyed(quota),
        }
    }

    pub fn check(&self, profile_id: i64) -> bool {
        self.limiter.check_key(&profile_id).is_ok()
    }
}

// Rate limiting middleware for the settlement endpoints. Runs after profile
// resolution, so the key is always the authenticated caller.
pub async fn settlement_rate_limit(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> AppResult<Response> {
    if let Some(profile) = request.extensions().get::<Profile>() {
        if !state.rate_limit.check(profile.id) {
            warn!("Settlement rate limit hit by profile {}", profile.id);
            return Err(AppError::RateLimited);
        }
    }

    Ok(next.run(request).await)
}
