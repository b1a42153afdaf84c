//! Quota consume and status endpoints.

use actix_web::http::header;
use actix_web::{HttpResponse, web};
use chrono::{DateTime, Utc};

use quota_core::domain::{Decision, DenyReason, FeatureKey, FeatureUsage, UsageStatus};
use quota_shared::dto::{ConsumeRequest, DecisionView, FeatureStatusView, StatusView};

use crate::middleware::error::{AppError, AppResult};
use crate::state::AppState;

const REMAINING_HEADER: &str = "X-RateLimit-Remaining";

/// POST /api/quota/{user_id}/{feature_key}/consume
///
/// An empty body consumes one unit and honours blocks.
pub async fn consume(
    state: web::Data<AppState>,
    path: web::Path<(String, String)>,
    body: web::Bytes,
) -> AppResult<HttpResponse> {
    let (user_id, feature_key) = path.into_inner();
    let request = parse_request(&body)?;
    let feature_key = FeatureKey::from(feature_key);

    let decision = state
        .engine
        .consume_with(
            &user_id,
            &feature_key,
            request.amount,
            request.respect_blocks,
        )
        .await?;

    Ok(decision_response(&decision, Utc::now()))
}

/// GET /api/quota/{user_id}/status
pub async fn status(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> AppResult<HttpResponse> {
    let user_id = path.into_inner();
    let status = state.engine.status(&user_id).await?;

    Ok(HttpResponse::Ok().json(status_view(status)))
}

fn parse_request(body: &[u8]) -> AppResult<ConsumeRequest> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(ConsumeRequest::default());
    }
    serde_json::from_slice(body).map_err(|e| AppError::BadRequest(format!("Invalid body: {e}")))
}

fn decision_response(decision: &Decision, now: DateTime<Utc>) -> HttpResponse {
    let view = decision_view(decision);

    match decision {
        Decision::Allowed(allowance) => {
            let mut response = HttpResponse::Ok();
            if let Some(remaining) = allowance.remaining {
                response.insert_header((REMAINING_HEADER, remaining.to_string()));
            }
            response.json(view)
        }
        Decision::Denied(denial) => {
            let retry_at = match denial.reason {
                DenyReason::Blocked => denial.blocked_until.unwrap_or(denial.window_reset_at),
                DenyReason::LimitExceeded => denial
                    .blocked_until
                    .map_or(denial.window_reset_at, |until| until.max(denial.window_reset_at)),
            };

            HttpResponse::TooManyRequests()
                .insert_header((header::RETRY_AFTER, retry_after_secs(retry_at, now).to_string()))
                .insert_header((REMAINING_HEADER, "0"))
                .json(view)
        }
    }
}

/// Whole seconds until `retry_at`, rounded up and never below one.
fn retry_after_secs(retry_at: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    let millis = (retry_at - now).num_milliseconds();
    ((millis + 999) / 1000).max(1)
}

fn decision_view(decision: &Decision) -> DecisionView {
    match decision {
        Decision::Allowed(allowance) => DecisionView {
            allowed: true,
            reason: None,
            current_usage: allowance.current_usage,
            limit: allowance.limit_value,
            remaining: allowance.remaining,
            reset_at: allowance.window_reset_at,
            blocked_until: None,
        },
        Decision::Denied(denial) => DecisionView {
            allowed: false,
            reason: Some(
                match denial.reason {
                    DenyReason::LimitExceeded => "limit_exceeded",
                    DenyReason::Blocked => "blocked",
                }
                .to_string(),
            ),
            current_usage: denial.current_usage,
            limit: Some(denial.limit_value),
            remaining: Some(0),
            reset_at: Some(denial.window_reset_at),
            blocked_until: denial.blocked_until,
        },
    }
}

fn status_view(status: UsageStatus) -> StatusView {
    StatusView {
        user_id: status.user_id,
        tier: status.tier,
        features: status.features.into_iter().map(feature_view).collect(),
    }
}

fn feature_view(usage: FeatureUsage) -> FeatureStatusView {
    FeatureStatusView {
        unlimited: usage.limit.is_none(),
        feature_key: usage.feature_key.to_string(),
        used: usage.used,
        limit: usage.limit,
        remaining: usage.remaining,
        reset_at: usage.reset_at,
        blocked_until: usage.blocked_until,
    }
}
