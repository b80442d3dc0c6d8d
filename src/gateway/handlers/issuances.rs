//! Issuance state-transition and query endpoints

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::core_types::{CustomerId, IssuanceId, TenantId};
use crate::issuance::{Issuance, IssuanceRepository, RedeemCredentials, StateTransitions};

use super::super::state::AppState;
use super::super::types::{ok, ApiError, ApiResult};

#[derive(Debug, Deserialize, ToSchema)]
pub struct RedeemRequest {
    /// Customer-presented code; must match the issuance's code exactly
    pub otp: Option<String>,
    /// Operator override; skips the code comparison
    pub staff_pin: Option<String>,
}

/// Redeem an issuance
#[utoipa::path(
    post,
    path = "/v1/tenants/{tid}/issuances/{id}/redeem",
    params(
        ("tid" = Uuid, Path, description = "Tenant id"),
        ("id" = Uuid, Path, description = "Issuance id")
    ),
    request_body = RedeemRequest,
    responses(
        (status = 200, description = "Redeemed (idempotent on replay)"),
        (status = 400, description = "Neither otp nor staff_pin supplied"),
        (status = 404, description = "Issuance not found"),
        (status = 409, description = "Bad state, expired, or code mismatch")
    ),
    tag = "Issuances"
)]
pub async fn redeem_issuance(
    State(state): State<Arc<AppState>>,
    Path((tid, id)): Path<(TenantId, IssuanceId)>,
    Json(req): Json<RedeemRequest>,
) -> ApiResult<Issuance> {
    let credentials = RedeemCredentials {
        otp: req.otp,
        staff_pin: req.staff_pin,
    };
    match StateTransitions::redeem(state.pool(), tid, id, &credentials).await {
        Ok(issuance) => ok(issuance),
        Err(e) => ApiError::from(e).into_err(),
    }
}

/// Cancel a non-terminal issuance, releasing its budget reservation
#[utoipa::path(
    post,
    path = "/v1/tenants/{tid}/issuances/{id}/cancel",
    params(
        ("tid" = Uuid, Path, description = "Tenant id"),
        ("id" = Uuid, Path, description = "Issuance id")
    ),
    responses(
        (status = 200, description = "Cancelled (idempotent on replay)"),
        (status = 404, description = "Issuance not found"),
        (status = 409, description = "Already redeemed or otherwise terminal")
    ),
    tag = "Issuances"
)]
pub async fn cancel_issuance(
    State(state): State<Arc<AppState>>,
    Path((tid, id)): Path<(TenantId, IssuanceId)>,
) -> ApiResult<Issuance> {
    match StateTransitions::cancel(state.pool(), tid, id).await {
        Ok(issuance) => ok(issuance),
        Err(e) => ApiError::from(e).into_err(),
    }
}

/// Confirm external fulfillment: `reserved -> issued`
#[utoipa::path(
    post,
    path = "/v1/tenants/{tid}/issuances/{id}/issue",
    params(
        ("tid" = Uuid, Path, description = "Tenant id"),
        ("id" = Uuid, Path, description = "Issuance id")
    ),
    responses(
        (status = 200, description = "Marked issued (idempotent on replay)"),
        (status = 404, description = "Issuance not found"),
        (status = 409, description = "Not in a state that can be issued")
    ),
    tag = "Issuances"
)]
pub async fn mark_issuance_issued(
    State(state): State<Arc<AppState>>,
    Path((tid, id)): Path<(TenantId, IssuanceId)>,
) -> ApiResult<Issuance> {
    match StateTransitions::mark_issued(state.pool(), tid, id).await {
        Ok(issuance) => ok(issuance),
        Err(e) => ApiError::from(e).into_err(),
    }
}

/// Record permanent fulfillment failure: `reserved -> failed`
#[utoipa::path(
    post,
    path = "/v1/tenants/{tid}/issuances/{id}/fail",
    params(
        ("tid" = Uuid, Path, description = "Tenant id"),
        ("id" = Uuid, Path, description = "Issuance id")
    ),
    responses(
        (status = 200, description = "Marked failed, budget released"),
        (status = 404, description = "Issuance not found"),
        (status = 409, description = "Not in a state that can fail")
    ),
    tag = "Issuances"
)]
pub async fn fail_issuance(
    State(state): State<Arc<AppState>>,
    Path((tid, id)): Path<(TenantId, IssuanceId)>,
) -> ApiResult<Issuance> {
    match StateTransitions::fail(state.pool(), tid, id).await {
        Ok(issuance) => ok(issuance),
        Err(e) => ApiError::from(e).into_err(),
    }
}

/// Fetch one issuance
#[utoipa::path(
    get,
    path = "/v1/tenants/{tid}/issuances/{id}",
    params(
        ("tid" = Uuid, Path, description = "Tenant id"),
        ("id" = Uuid, Path, description = "Issuance id")
    ),
    responses(
        (status = 200, description = "Issuance"),
        (status = 404, description = "Issuance not found")
    ),
    tag = "Issuances"
)]
pub async fn get_issuance(
    State(state): State<Arc<AppState>>,
    Path((tid, id)): Path<(TenantId, IssuanceId)>,
) -> ApiResult<Issuance> {
    match IssuanceRepository::get_by_id(state.pool(), tid, id).await {
        Ok(Some(issuance)) => ok(issuance),
        Ok(None) => ApiError::not_found("Issuance not found").into_err(),
        Err(e) => ApiError::from(e).into_err(),
    }
}

#[derive(Debug, Deserialize)]
pub struct ListIssuancesQuery {
    pub customer_id: CustomerId,
    pub limit: Option<i64>,
}

/// List a customer's issuances, newest first
#[utoipa::path(
    get,
    path = "/v1/tenants/{tid}/issuances",
    params(
        ("tid" = Uuid, Path, description = "Tenant id"),
        ("customer_id" = Uuid, Query, description = "Customer id"),
        ("limit" = Option<i64>, Query, description = "Max rows (default 50)")
    ),
    responses((status = 200, description = "Issuances")),
    tag = "Issuances"
)]
pub async fn list_issuances(
    State(state): State<Arc<AppState>>,
    Path(tid): Path<TenantId>,
    Query(query): Query<ListIssuancesQuery>,
) -> ApiResult<Vec<Issuance>> {
    let limit = query.limit.unwrap_or(50).clamp(1, 500);
    match IssuanceRepository::list_for_customer(state.pool(), tid, query.customer_id, limit).await
    {
        Ok(issuances) => ok(issuances),
        Err(e) => ApiError::from(e).into_err(),
    }
}
