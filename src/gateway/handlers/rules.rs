//! Rule CRUD endpoints
//!
//! Every write here invalidates the tenant's rule-cache entries so the next
//! event sees fresh rules (within the advisory-cache contract).

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::core_types::{CampaignId, RewardId, RuleId, TenantId};
use crate::rules::{repository::RuleSpec, Rule, RuleRepository};

use super::super::state::AppState;
use super::super::types::{created, ok, ApiError, ApiResult};

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct RuleRequest {
    #[validate(length(min = 1, max = 128))]
    pub event_type: String,
    /// JsonLogic conditions; empty object always matches
    #[serde(default = "default_conditions")]
    pub conditions: serde_json::Value,
    pub campaign_id: Option<CampaignId>,
    pub reward_id: RewardId,
    #[serde(default)]
    #[validate(range(min = 0))]
    pub per_user_cap: i32,
    #[validate(range(min = 1))]
    pub global_cap: Option<i32>,
    #[serde(default)]
    #[validate(range(min = 0))]
    pub cool_down_sec: i32,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_conditions() -> serde_json::Value {
    serde_json::json!({})
}

fn default_active() -> bool {
    true
}

impl RuleRequest {
    fn into_spec(self) -> RuleSpec {
        RuleSpec {
            event_type: self.event_type,
            conditions: self.conditions,
            campaign_id: self.campaign_id,
            reward_id: self.reward_id,
            per_user_cap: self.per_user_cap,
            global_cap: self.global_cap,
            cool_down_sec: self.cool_down_sec,
            active: self.active,
        }
    }
}

/// Create a rule
#[utoipa::path(
    post,
    path = "/v1/tenants/{tid}/rules",
    params(("tid" = Uuid, Path, description = "Tenant id")),
    request_body = RuleRequest,
    responses(
        (status = 201, description = "Rule created"),
        (status = 400, description = "Invalid rule")
    ),
    tag = "Rules"
)]
pub async fn create_rule(
    State(state): State<Arc<AppState>>,
    Path(tid): Path<TenantId>,
    Json(req): Json<RuleRequest>,
) -> ApiResult<Rule> {
    if let Err(e) = req.validate() {
        return ApiError::bad_request(format!("Invalid request: {e}")).into_err();
    }

    match RuleRepository::create(state.pool(), tid, &req.into_spec()).await {
        Ok(rule) => {
            state.rule_cache.invalidate_tenant(tid);
            created(rule)
        }
        Err(e) => ApiError::from(e).into_err(),
    }
}

/// Update a rule
#[utoipa::path(
    put,
    path = "/v1/tenants/{tid}/rules/{id}",
    params(
        ("tid" = Uuid, Path, description = "Tenant id"),
        ("id" = Uuid, Path, description = "Rule id")
    ),
    request_body = RuleRequest,
    responses(
        (status = 200, description = "Rule updated"),
        (status = 404, description = "Rule not found")
    ),
    tag = "Rules"
)]
pub async fn update_rule(
    State(state): State<Arc<AppState>>,
    Path((tid, id)): Path<(TenantId, RuleId)>,
    Json(req): Json<RuleRequest>,
) -> ApiResult<Rule> {
    if let Err(e) = req.validate() {
        return ApiError::bad_request(format!("Invalid request: {e}")).into_err();
    }

    match RuleRepository::update(state.pool(), tid, id, &req.into_spec()).await {
        Ok(Some(rule)) => {
            state.rule_cache.invalidate_tenant(tid);
            ok(rule)
        }
        Ok(None) => ApiError::not_found("Rule not found").into_err(),
        Err(e) => ApiError::from(e).into_err(),
    }
}

/// Deactivate a rule
#[utoipa::path(
    post,
    path = "/v1/tenants/{tid}/rules/{id}/deactivate",
    params(
        ("tid" = Uuid, Path, description = "Tenant id"),
        ("id" = Uuid, Path, description = "Rule id")
    ),
    responses(
        (status = 200, description = "Rule deactivated"),
        (status = 404, description = "Rule not found")
    ),
    tag = "Rules"
)]
pub async fn deactivate_rule(
    State(state): State<Arc<AppState>>,
    Path((tid, id)): Path<(TenantId, RuleId)>,
) -> ApiResult<()> {
    match RuleRepository::deactivate(state.pool(), tid, id).await {
        Ok(true) => {
            state.rule_cache.invalidate_tenant(tid);
            ok(())
        }
        Ok(false) => ApiError::not_found("Rule not found").into_err(),
        Err(e) => ApiError::from(e).into_err(),
    }
}

/// Fetch one rule
#[utoipa::path(
    get,
    path = "/v1/tenants/{tid}/rules/{id}",
    params(
        ("tid" = Uuid, Path, description = "Tenant id"),
        ("id" = Uuid, Path, description = "Rule id")
    ),
    responses(
        (status = 200, description = "Rule"),
        (status = 404, description = "Rule not found")
    ),
    tag = "Rules"
)]
pub async fn get_rule(
    State(state): State<Arc<AppState>>,
    Path((tid, id)): Path<(TenantId, RuleId)>,
) -> ApiResult<Rule> {
    match RuleRepository::get_by_id(state.pool(), tid, id).await {
        Ok(Some(rule)) => ok(rule),
        Ok(None) => ApiError::not_found("Rule not found").into_err(),
        Err(e) => ApiError::from(e).into_err(),
    }
}

/// List a tenant's rules
#[utoipa::path(
    get,
    path = "/v1/tenants/{tid}/rules",
    params(("tid" = Uuid, Path, description = "Tenant id")),
    responses((status = 200, description = "Rules")),
    tag = "Rules"
)]
pub async fn list_rules(
    State(state): State<Arc<AppState>>,
    Path(tid): Path<TenantId>,
) -> ApiResult<Vec<Rule>> {
    match RuleRepository::list(state.pool(), tid).await {
        Ok(rules) => ok(rules),
        Err(e) => ApiError::from(e).into_err(),
    }
}
