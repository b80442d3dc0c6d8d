//! Event ingestion endpoint

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::HeaderMap,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::core_types::{CustomerId, RuleId, TenantId};
use crate::events::{self, AttemptOutcome, Event, NewEvent};
use crate::issuance::{IssuanceRepository, Issuance, IssueError, SkipReason};

use super::super::state::AppState;
use super::super::types::{created, error_codes, ok, ApiError, ApiResult};

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct IngestEventRequest {
    pub customer_id: CustomerId,
    #[validate(length(min = 1, max = 128))]
    pub event_type: String,
    #[serde(default = "default_properties")]
    pub properties: serde_json::Value,
    /// Defaults to wall-clock now
    pub occurred_at: Option<DateTime<Utc>>,
    /// api, pos, whatsapp, ussd, ...
    pub source: Option<String>,
}

fn default_properties() -> serde_json::Value {
    serde_json::json!({})
}

/// A matched rule that did not fire, with its structured reason.
#[derive(Debug, Serialize, ToSchema)]
pub struct SkippedRule {
    pub rule_id: RuleId,
    pub reason: SkipReason,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct IngestEventResponse {
    pub event: Event,
    /// Issuances reserved by this event
    pub issuances: Vec<Issuance>,
    /// Rules that matched but were skipped (caps, funds, stock, ...)
    pub skipped: Vec<SkippedRule>,
}

/// Ingest one customer event
///
/// `Idempotency-Key` header is required. 201 with the event and resulting
/// issuances when the key is new; 200 with the prior result on replay.
#[utoipa::path(
    post,
    path = "/v1/tenants/{tid}/events",
    params(("tid" = Uuid, Path, description = "Tenant id")),
    request_body = IngestEventRequest,
    responses(
        (status = 201, description = "Event ingested, rules processed"),
        (status = 200, description = "Duplicate idempotency key, prior result returned"),
        (status = 400, description = "Missing Idempotency-Key or invalid body"),
        (status = 404, description = "Customer not visible under this tenant"),
        (status = 503, description = "Database unavailable, retry with the same key")
    ),
    tag = "Events"
)]
pub async fn ingest_event(
    State(state): State<Arc<AppState>>,
    Path(tid): Path<TenantId>,
    headers: HeaderMap,
    Json(req): Json<IngestEventRequest>,
) -> ApiResult<IngestEventResponse> {
    let idempotency_key = match extract_idempotency_key(&headers) {
        Some(key) => key,
        None => {
            return ApiError::new(
                axum::http::StatusCode::BAD_REQUEST,
                error_codes::MISSING_IDEMPOTENCY_KEY,
                "Idempotency-Key header is required",
            )
            .into_err();
        }
    };

    if let Err(e) = req.validate() {
        return ApiError::bad_request(format!("Invalid request: {e}")).into_err();
    }

    // Hot replay: recently seen key short-circuits straight to the stored result
    if let Some(event_id) = state.idempotency_cache.get(tid, &idempotency_key) {
        if let Some(event) = events::EventRepository::get_by_id(state.pool(), tid, event_id)
            .await
            .map_err(ApiError::from)?
        {
            let issuances = IssuanceRepository::list_for_event(state.pool(), tid, event.id)
                .await
                .map_err(ApiError::from)?;
            return ok(IngestEventResponse {
                event,
                issuances,
                skipped: Vec::new(),
            });
        }
    }

    let new_event = NewEvent {
        customer_id: req.customer_id,
        event_type: req.event_type,
        properties: req.properties,
        occurred_at: req.occurred_at,
        source: req.source,
    };

    let (event, was_new) = events::ingest_event(state.pool(), tid, &idempotency_key, new_event)
        .await
        .map_err(ApiError::from)?;

    state
        .idempotency_cache
        .insert(tid, &idempotency_key, event.id);

    if !was_new {
        // Replay: the winning call's issuances, same body shape
        let issuances = IssuanceRepository::list_for_event(state.pool(), tid, event.id)
            .await
            .map_err(ApiError::from)?;
        return ok(IngestEventResponse {
            event,
            issuances,
            skipped: Vec::new(),
        });
    }

    let attempts = events::process_event(state.pool(), &state.selector, &event)
        .await
        .map_err(|e| match e {
            IssueError::Database(db) => ApiError::from(db),
            other => ApiError::internal(other.to_string()),
        })?;

    let mut issuances = Vec::new();
    let mut skipped = Vec::new();
    for attempt in attempts {
        match attempt.outcome {
            AttemptOutcome::Issued { issuance, .. } => issuances.push(issuance),
            AttemptOutcome::Skipped(reason) => skipped.push(SkippedRule {
                rule_id: attempt.rule_id,
                reason,
            }),
        }
    }

    created(IngestEventResponse {
        event,
        issuances,
        skipped,
    })
}

fn extract_idempotency_key(headers: &HeaderMap) -> Option<String> {
    headers
        .get("Idempotency-Key")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_idempotency_key() {
        let mut headers = HeaderMap::new();
        assert!(extract_idempotency_key(&headers).is_none());

        headers.insert("Idempotency-Key", " abc-123 ".parse().unwrap());
        assert_eq!(extract_idempotency_key(&headers).as_deref(), Some("abc-123"));

        headers.insert("Idempotency-Key", "   ".parse().unwrap());
        assert!(extract_idempotency_key(&headers).is_none());
    }
}
