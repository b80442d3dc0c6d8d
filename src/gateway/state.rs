use std::sync::Arc;

use sqlx::PgPool;

use crate::db::Database;
use crate::events::IdempotencyCache;
use crate::rules::{RuleCache, RuleSelector};

/// Gateway application state (shared)
#[derive(Clone)]
pub struct AppState {
    /// PostgreSQL database
    pub db: Arc<Database>,
    /// Active-rule TTL cache (invalidated by rule/campaign writes)
    pub rule_cache: Arc<RuleCache>,
    /// Cache-backed rule lookup
    pub selector: Arc<RuleSelector>,
    /// Hot idempotency-key cache
    pub idempotency_cache: Arc<IdempotencyCache>,
}

impl AppState {
    pub fn new(
        db: Arc<Database>,
        rule_cache: Arc<RuleCache>,
        idempotency_cache: Arc<IdempotencyCache>,
    ) -> Self {
        let selector = Arc::new(RuleSelector::new(rule_cache.clone()));
        Self {
            db,
            rule_cache,
            selector,
            idempotency_cache,
        }
    }

    pub fn pool(&self) -> &PgPool {
        self.db.pool()
    }
}
