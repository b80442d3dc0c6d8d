//! OpenAPI document (Swagger UI at /docs)

use utoipa::OpenApi;

use super::handlers;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Loyalty Core API",
        description = "Multi-tenant reward-issuance core: idempotent event ingestion, JsonLogic rules, budget ledger"
    ),
    paths(
        handlers::health::health_check,
        handlers::admin::create_tenant,
        handlers::admin::get_tenant,
        handlers::admin::create_customer,
        handlers::admin::get_customer,
        handlers::admin::create_reward,
        handlers::admin::get_reward,
        handlers::admin::create_campaign,
        handlers::admin::get_campaign,
        handlers::events::ingest_event,
        handlers::issuances::redeem_issuance,
        handlers::issuances::cancel_issuance,
        handlers::issuances::mark_issuance_issued,
        handlers::issuances::fail_issuance,
        handlers::issuances::get_issuance,
        handlers::issuances::list_issuances,
        handlers::budgets::create_budget,
        handlers::budgets::get_budget,
        handlers::budgets::topup_budget,
        handlers::budgets::get_budget_ledger,
        handlers::budgets::reconcile_budget,
        handlers::budgets::fix_budget_discrepancy,
        handlers::budgets::run_period_reset,
        handlers::rules::create_rule,
        handlers::rules::update_rule,
        handlers::rules::deactivate_rule,
        handlers::rules::get_rule,
        handlers::rules::list_rules,
    ),
    components(schemas(
        crate::account::Tenant,
        crate::account::Customer,
        crate::account::CustomerStatus,
        crate::catalog::Reward,
        crate::catalog::RewardType,
        crate::catalog::Inventory,
        crate::catalog::Campaign,
        crate::core_types::Currency,
        crate::events::Event,
        crate::issuance::Issuance,
        crate::issuance::IssuanceStatus,
        crate::issuance::SkipReason,
        crate::ledger::Budget,
        crate::ledger::BudgetPeriod,
        crate::ledger::LedgerEntry,
        crate::ledger::EntryType,
        crate::ledger::ReconcileReport,
        crate::rules::Rule,
        handlers::events::IngestEventRequest,
        handlers::events::IngestEventResponse,
        handlers::events::SkippedRule,
        handlers::issuances::RedeemRequest,
        handlers::budgets::CreateBudgetRequest,
        handlers::budgets::TopupRequest,
        handlers::budgets::TopupResponse,
        handlers::budgets::FixDiscrepancyRequest,
        handlers::budgets::PeriodResetResponse,
        handlers::rules::RuleRequest,
        handlers::admin::CreateTenantRequest,
        handlers::admin::CreateCustomerRequest,
        handlers::admin::CreateRewardRequest,
        handlers::admin::CreateCampaignRequest,
    )),
    tags(
        (name = "Health", description = "Liveness"),
        (name = "Tenants", description = "Tenant administration"),
        (name = "Customers", description = "Customer administration"),
        (name = "Rewards", description = "Reward catalog"),
        (name = "Campaigns", description = "Campaigns"),
        (name = "Events", description = "Event ingestion"),
        (name = "Issuances", description = "Issuance lifecycle"),
        (name = "Budgets", description = "Budgets and ledger"),
        (name = "Rules", description = "Rule management"),
    )
)]
pub struct ApiDoc;
