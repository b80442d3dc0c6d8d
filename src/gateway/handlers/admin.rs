//! Tenant, customer, reward and campaign endpoints

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::account::{Customer, CustomerRepository, Tenant, TenantRepository};
use crate::catalog::{
    Campaign, CampaignRepository, Inventory, Reward, RewardRepository, RewardType,
};
use crate::core_types::{BudgetId, CampaignId, Currency, CustomerId, RewardId, TenantId};

use super::super::state::AppState;
use super::super::types::{created, ok, ApiError, ApiResult};

// ============================================================================
// Tenants
// ============================================================================

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateTenantRequest {
    #[validate(length(min = 1, max = 128))]
    pub name: String,
    pub default_currency: Currency,
}

/// Create a tenant
#[utoipa::path(
    post,
    path = "/v1/tenants",
    request_body = CreateTenantRequest,
    responses((status = 201, description = "Tenant created")),
    tag = "Tenants"
)]
pub async fn create_tenant(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateTenantRequest>,
) -> ApiResult<Tenant> {
    if let Err(e) = req.validate() {
        return ApiError::bad_request(format!("Invalid request: {e}")).into_err();
    }

    match TenantRepository::create(state.pool(), &req.name, req.default_currency).await {
        Ok(tenant) => created(tenant),
        Err(e) => ApiError::from(e).into_err(),
    }
}

/// Fetch one tenant
#[utoipa::path(
    get,
    path = "/v1/tenants/{tid}",
    params(("tid" = Uuid, Path, description = "Tenant id")),
    responses(
        (status = 200, description = "Tenant"),
        (status = 404, description = "Tenant not found")
    ),
    tag = "Tenants"
)]
pub async fn get_tenant(
    State(state): State<Arc<AppState>>,
    Path(tid): Path<TenantId>,
) -> ApiResult<Tenant> {
    match TenantRepository::get_by_id(state.pool(), tid).await {
        Ok(Some(tenant)) => ok(tenant),
        Ok(None) => ApiError::not_found("Tenant not found").into_err(),
        Err(e) => ApiError::from(e).into_err(),
    }
}

// ============================================================================
// Customers
// ============================================================================

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateCustomerRequest {
    /// E.164 phone, unique per tenant when present
    #[validate(length(min = 5, max = 20))]
    pub phone_e164: Option<String>,
    /// External system reference, unique per tenant when present
    #[validate(length(min = 1, max = 128))]
    pub external_ref: Option<String>,
}

/// Create a customer
#[utoipa::path(
    post,
    path = "/v1/tenants/{tid}/customers",
    params(("tid" = Uuid, Path, description = "Tenant id")),
    request_body = CreateCustomerRequest,
    responses(
        (status = 201, description = "Customer created"),
        (status = 409, description = "Phone or external ref already taken")
    ),
    tag = "Customers"
)]
pub async fn create_customer(
    State(state): State<Arc<AppState>>,
    Path(tid): Path<TenantId>,
    Json(req): Json<CreateCustomerRequest>,
) -> ApiResult<Customer> {
    if let Err(e) = req.validate() {
        return ApiError::bad_request(format!("Invalid request: {e}")).into_err();
    }

    match CustomerRepository::create(
        state.pool(),
        tid,
        req.phone_e164.as_deref(),
        req.external_ref.as_deref(),
    )
    .await
    {
        Ok(customer) => created(customer),
        Err(sqlx::Error::Database(db_err)) if db_err.code().as_deref() == Some("23505") => {
            ApiError::conflict("Phone or external ref already registered for this tenant")
                .into_err()
        }
        Err(e) => ApiError::from(e).into_err(),
    }
}

/// Fetch one customer
#[utoipa::path(
    get,
    path = "/v1/tenants/{tid}/customers/{id}",
    params(
        ("tid" = Uuid, Path, description = "Tenant id"),
        ("id" = Uuid, Path, description = "Customer id")
    ),
    responses(
        (status = 200, description = "Customer"),
        (status = 404, description = "Customer not found")
    ),
    tag = "Customers"
)]
pub async fn get_customer(
    State(state): State<Arc<AppState>>,
    Path((tid, id)): Path<(TenantId, CustomerId)>,
) -> ApiResult<Customer> {
    match CustomerRepository::get_by_id(state.pool(), tid, id).await {
        Ok(Some(customer)) => ok(customer),
        Ok(None) => ApiError::not_found("Customer not found").into_err(),
        Err(e) => ApiError::from(e).into_err(),
    }
}

// ============================================================================
// Rewards
// ============================================================================

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateRewardRequest {
    #[validate(length(min = 1, max = 128))]
    pub name: String,
    pub reward_type: RewardType,
    #[serde(default = "default_inventory")]
    pub inventory: Inventory,
    pub face_value: Decimal,
    pub currency: Currency,
    /// Opaque to the core
    #[serde(default = "default_metadata")]
    pub metadata: serde_json::Value,
}

fn default_inventory() -> Inventory {
    Inventory::None
}

fn default_metadata() -> serde_json::Value {
    serde_json::json!({})
}

/// Create a reward catalog entry
#[utoipa::path(
    post,
    path = "/v1/tenants/{tid}/rewards",
    params(("tid" = Uuid, Path, description = "Tenant id")),
    request_body = CreateRewardRequest,
    responses(
        (status = 201, description = "Reward created"),
        (status = 400, description = "Invalid reward")
    ),
    tag = "Rewards"
)]
pub async fn create_reward(
    State(state): State<Arc<AppState>>,
    Path(tid): Path<TenantId>,
    Json(req): Json<CreateRewardRequest>,
) -> ApiResult<Reward> {
    if let Err(e) = req.validate() {
        return ApiError::bad_request(format!("Invalid request: {e}")).into_err();
    }
    if req.face_value <= Decimal::ZERO {
        return ApiError::bad_request("face_value must be positive").into_err();
    }

    match RewardRepository::create(
        state.pool(),
        tid,
        &req.name,
        req.reward_type,
        req.inventory,
        req.face_value,
        req.currency,
        req.metadata,
    )
    .await
    {
        Ok(reward) => created(reward),
        Err(e) => ApiError::from(e).into_err(),
    }
}

/// Fetch one reward
#[utoipa::path(
    get,
    path = "/v1/tenants/{tid}/rewards/{id}",
    params(
        ("tid" = Uuid, Path, description = "Tenant id"),
        ("id" = Uuid, Path, description = "Reward id")
    ),
    responses(
        (status = 200, description = "Reward"),
        (status = 404, description = "Reward not found")
    ),
    tag = "Rewards"
)]
pub async fn get_reward(
    State(state): State<Arc<AppState>>,
    Path((tid, id)): Path<(TenantId, RewardId)>,
) -> ApiResult<Reward> {
    match RewardRepository::get_by_id(state.pool(), tid, id).await {
        Ok(Some(reward)) => ok(reward),
        Ok(None) => ApiError::not_found("Reward not found").into_err(),
        Err(e) => ApiError::from(e).into_err(),
    }
}

// ============================================================================
// Campaigns
// ============================================================================

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateCampaignRequest {
    #[validate(length(min = 1, max = 128))]
    pub name: String,
    #[schema(value_type = Option<Uuid>)]
    pub budget_id: Option<BudgetId>,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
}

/// Create a campaign
#[utoipa::path(
    post,
    path = "/v1/tenants/{tid}/campaigns",
    params(("tid" = Uuid, Path, description = "Tenant id")),
    request_body = CreateCampaignRequest,
    responses(
        (status = 201, description = "Campaign created"),
        (status = 400, description = "Invalid time bounds")
    ),
    tag = "Campaigns"
)]
pub async fn create_campaign(
    State(state): State<Arc<AppState>>,
    Path(tid): Path<TenantId>,
    Json(req): Json<CreateCampaignRequest>,
) -> ApiResult<Campaign> {
    if let Err(e) = req.validate() {
        return ApiError::bad_request(format!("Invalid request: {e}")).into_err();
    }
    if req.ends_at <= req.starts_at {
        return ApiError::bad_request("ends_at must be after starts_at").into_err();
    }

    match CampaignRepository::create(
        state.pool(),
        tid,
        &req.name,
        req.budget_id,
        req.starts_at,
        req.ends_at,
    )
    .await
    {
        Ok(campaign) => {
            // Campaign edits change rule scope; drop the tenant's cached rules
            state.rule_cache.invalidate_tenant(tid);
            created(campaign)
        }
        Err(e) => ApiError::from(e).into_err(),
    }
}

/// Fetch one campaign
#[utoipa::path(
    get,
    path = "/v1/tenants/{tid}/campaigns/{id}",
    params(
        ("tid" = Uuid, Path, description = "Tenant id"),
        ("id" = Uuid, Path, description = "Campaign id")
    ),
    responses(
        (status = 200, description = "Campaign"),
        (status = 404, description = "Campaign not found")
    ),
    tag = "Campaigns"
)]
pub async fn get_campaign(
    State(state): State<Arc<AppState>>,
    Path((tid, id)): Path<(TenantId, CampaignId)>,
) -> ApiResult<Campaign> {
    match CampaignRepository::get_by_id(state.pool(), tid, id).await {
        Ok(Some(campaign)) => ok(campaign),
        Ok(None) => ApiError::not_found("Campaign not found").into_err(),
        Err(e) => ApiError::from(e).into_err(),
    }
}
