//! Database connection management
//!
//! One bounded PostgreSQL pool for the whole process. Tenant isolation is
//! enforced with row-level security keyed on the `app.tenant_id` session
//! setting; [`begin_tenant_tx`] opens a transaction with that setting applied
//! for its duration.

pub mod schema;

use std::hash::Hasher;
use std::time::Duration;

use rustc_hash::FxHasher;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{PgConnection, Postgres, Transaction};

use crate::core_types::{CustomerId, RuleId, TenantId};

/// PostgreSQL database connection pool
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Create a new database connection pool
    pub async fn connect(database_url: &str) -> Result<Self, sqlx::Error> {
        let max_connections = std::env::var("PG_POOL_SIZE")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(10);

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(5))
            .connect(database_url)
            .await?;

        tracing::info!("PostgreSQL connection pool established");
        Ok(Self { pool })
    }

    /// Get a reference to the connection pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Check database health
    pub async fn health_check(&self) -> Result<(), sqlx::Error> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

/// Begin a transaction with `app.tenant_id` set for row-level security.
///
/// `set_config(..., true)` is transaction-local: the setting evaporates at
/// commit or rollback, so pooled connections never leak a tenant id.
pub async fn begin_tenant_tx(
    pool: &PgPool,
    tenant_id: TenantId,
) -> Result<Transaction<'_, Postgres>, sqlx::Error> {
    let mut tx = pool.begin().await?;
    sqlx::query("SELECT set_config('app.tenant_id', $1, true)")
        .bind(tenant_id.to_string())
        .execute(&mut *tx)
        .await?;
    Ok(tx)
}

/// Deterministic 64-bit advisory-lock key for one `(tenant, rule, customer)`
/// triple. FxHasher has no per-process random state, so every worker process
/// computes the same key for the same triple.
pub fn issuance_lock_key(tenant_id: TenantId, rule_id: RuleId, customer_id: CustomerId) -> i64 {
    let mut hasher = FxHasher::default();
    hasher.write(tenant_id.as_bytes());
    hasher.write(rule_id.as_bytes());
    hasher.write(customer_id.as_bytes());
    hasher.finish() as i64
}

/// Take the transaction-scoped advisory lock for an issuance triple.
/// Released automatically at commit or rollback.
pub async fn acquire_issuance_lock(conn: &mut PgConnection, key: i64) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT pg_advisory_xact_lock($1)")
        .bind(key)
        .execute(conn)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_lock_key_is_stable() {
        let t = Uuid::from_u128(1);
        let r = Uuid::from_u128(2);
        let c = Uuid::from_u128(3);
        assert_eq!(issuance_lock_key(t, r, c), issuance_lock_key(t, r, c));
    }

    #[test]
    fn test_lock_key_differs_per_triple() {
        let t = Uuid::from_u128(1);
        let r = Uuid::from_u128(2);
        let c1 = Uuid::from_u128(3);
        let c2 = Uuid::from_u128(4);
        assert_ne!(issuance_lock_key(t, r, c1), issuance_lock_key(t, r, c2));
        // Order matters: swapping rule and customer must change the key
        assert_ne!(issuance_lock_key(t, r, c1), issuance_lock_key(t, c1, r));
    }
}
