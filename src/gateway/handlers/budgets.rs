//! Budget and ledger endpoints

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    Json,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::core_types::{BudgetId, Currency, TenantId};
use crate::ledger::{
    period, reconcile, Budget, BudgetPeriod, BudgetRepository, LedgerEntry, ReconcileReport,
};

use super::super::state::AppState;
use super::super::types::{created, ok, ApiError, ApiResult};

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateBudgetRequest {
    pub currency: Currency,
    pub soft_cap: Decimal,
    pub hard_cap: Decimal,
    #[serde(default = "default_period")]
    pub period: BudgetPeriod,
}

fn default_period() -> BudgetPeriod {
    BudgetPeriod::Rolling
}

/// Create a budget
#[utoipa::path(
    post,
    path = "/v1/tenants/{tid}/budgets",
    params(("tid" = Uuid, Path, description = "Tenant id")),
    request_body = CreateBudgetRequest,
    responses(
        (status = 201, description = "Budget created"),
        (status = 400, description = "Invalid caps or currency")
    ),
    tag = "Budgets"
)]
pub async fn create_budget(
    State(state): State<Arc<AppState>>,
    Path(tid): Path<TenantId>,
    Json(req): Json<CreateBudgetRequest>,
) -> ApiResult<Budget> {
    if req.soft_cap < Decimal::ZERO || req.hard_cap < req.soft_cap {
        return ApiError::bad_request("Caps must satisfy 0 <= soft_cap <= hard_cap").into_err();
    }

    match BudgetRepository::create(
        state.pool(),
        tid,
        req.currency,
        req.soft_cap,
        req.hard_cap,
        req.period,
    )
    .await
    {
        Ok(budget) => created(budget),
        Err(e) => ApiError::from(e).into_err(),
    }
}

/// Fetch one budget
#[utoipa::path(
    get,
    path = "/v1/tenants/{tid}/budgets/{id}",
    params(
        ("tid" = Uuid, Path, description = "Tenant id"),
        ("id" = Uuid, Path, description = "Budget id")
    ),
    responses(
        (status = 200, description = "Budget"),
        (status = 404, description = "Budget not found")
    ),
    tag = "Budgets"
)]
pub async fn get_budget(
    State(state): State<Arc<AppState>>,
    Path((tid, id)): Path<(TenantId, BudgetId)>,
) -> ApiResult<Budget> {
    match BudgetRepository::get_by_id(state.pool(), tid, id).await {
        Ok(Some(budget)) => ok(budget),
        Ok(None) => ApiError::not_found("Budget not found").into_err(),
        Err(e) => ApiError::from(e).into_err(),
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct TopupRequest {
    pub amount: Decimal,
}

#[derive(Debug, serde::Serialize, ToSchema)]
pub struct TopupResponse {
    #[schema(value_type = Uuid)]
    pub budget_id: BudgetId,
    pub balance: Decimal,
}

/// Fund a budget (`fund` ledger entry)
#[utoipa::path(
    post,
    path = "/v1/tenants/{tid}/budgets/{id}/topup",
    params(
        ("tid" = Uuid, Path, description = "Tenant id"),
        ("id" = Uuid, Path, description = "Budget id")
    ),
    request_body = TopupRequest,
    responses(
        (status = 200, description = "Balance updated"),
        (status = 404, description = "Budget not found"),
        (status = 422, description = "Would exceed the hard cap")
    ),
    tag = "Budgets"
)]
pub async fn topup_budget(
    State(state): State<Arc<AppState>>,
    Path((tid, id)): Path<(TenantId, BudgetId)>,
    Json(req): Json<TopupRequest>,
) -> ApiResult<TopupResponse> {
    match BudgetRepository::topup(state.pool(), tid, id, req.amount).await {
        Ok(balance) => ok(TopupResponse {
            budget_id: id,
            balance,
        }),
        Err(e) => ApiError::from(e).into_err(),
    }
}

#[derive(Debug, Deserialize)]
pub struct LedgerQuery {
    pub limit: Option<i64>,
}

/// Read a budget's ledger, in commit order
#[utoipa::path(
    get,
    path = "/v1/tenants/{tid}/budgets/{id}/ledger",
    params(
        ("tid" = Uuid, Path, description = "Tenant id"),
        ("id" = Uuid, Path, description = "Budget id"),
        ("limit" = Option<i64>, Query, description = "Max rows (default 100)")
    ),
    responses((status = 200, description = "Ledger entries")),
    tag = "Budgets"
)]
pub async fn get_budget_ledger(
    State(state): State<Arc<AppState>>,
    Path((tid, id)): Path<(TenantId, BudgetId)>,
    Query(query): Query<LedgerQuery>,
) -> ApiResult<Vec<LedgerEntry>> {
    let limit = query.limit.unwrap_or(100).clamp(1, 1000);
    match BudgetRepository::entries(state.pool(), tid, id, limit).await {
        Ok(entries) => ok(entries),
        Err(e) => ApiError::from(e).into_err(),
    }
}

/// Recompute the balance from entries and report any discrepancy
#[utoipa::path(
    post,
    path = "/v1/tenants/{tid}/budgets/{id}/reconcile",
    params(
        ("tid" = Uuid, Path, description = "Tenant id"),
        ("id" = Uuid, Path, description = "Budget id")
    ),
    responses(
        (status = 200, description = "Reconciliation report"),
        (status = 404, description = "Budget not found")
    ),
    tag = "Budgets"
)]
pub async fn reconcile_budget(
    State(state): State<Arc<AppState>>,
    Path((tid, id)): Path<(TenantId, BudgetId)>,
) -> ApiResult<ReconcileReport> {
    match reconcile::reconcile(state.pool(), tid, id).await {
        Ok(report) => ok(report),
        Err(e) => ApiError::from(e).into_err(),
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct FixDiscrepancyRequest {
    /// Operator-supplied audit note, required
    #[validate(length(min = 1, max = 512))]
    pub note: String,
}

/// Fix a reported discrepancy with a corrective `reverse` entry
#[utoipa::path(
    post,
    path = "/v1/tenants/{tid}/budgets/{id}/reconcile/fix",
    params(
        ("tid" = Uuid, Path, description = "Tenant id"),
        ("id" = Uuid, Path, description = "Budget id")
    ),
    request_body = FixDiscrepancyRequest,
    responses(
        (status = 200, description = "Post-fix report (clean)"),
        (status = 400, description = "Missing operator note"),
        (status = 404, description = "Budget not found")
    ),
    tag = "Budgets"
)]
pub async fn fix_budget_discrepancy(
    State(state): State<Arc<AppState>>,
    Path((tid, id)): Path<(TenantId, BudgetId)>,
    Json(req): Json<FixDiscrepancyRequest>,
) -> ApiResult<ReconcileReport> {
    if let Err(e) = req.validate() {
        return ApiError::bad_request(format!("Invalid request: {e}")).into_err();
    }

    match reconcile::fix_discrepancy(state.pool(), tid, id, &req.note).await {
        Ok(report) => ok(report),
        Err(e) => ApiError::from(e).into_err(),
    }
}

#[derive(Debug, serde::Serialize, ToSchema)]
pub struct PeriodResetResponse {
    /// Budgets whose balance was released at a period boundary
    #[schema(value_type = Vec<Uuid>)]
    pub reset_budget_ids: Vec<BudgetId>,
}

/// Reset monthly/quarterly/yearly budgets past their period boundary
///
/// Called by the external scheduler; rolling budgets never reset.
#[utoipa::path(
    post,
    path = "/v1/maintenance/period-reset",
    responses((status = 200, description = "Budgets reset")),
    tag = "Budgets"
)]
pub async fn run_period_reset(State(state): State<Arc<AppState>>) -> ApiResult<PeriodResetResponse> {
    match period::run_period_reset(state.pool()).await {
        Ok(reset_budget_ids) => ok(PeriodResetResponse { reset_budget_ids }),
        Err(e) => ApiError::from(e).into_err(),
    }
}
