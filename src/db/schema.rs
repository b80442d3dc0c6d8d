//! Schema bootstrap
//!
//! Creates every table, index and row-level-security policy the core needs.
//! All statements are `IF NOT EXISTS`-guarded so bootstrap is safe to run on
//! every startup.
//!
//! RLS note: policies compare `tenant_id` with the `app.tenant_id` session
//! setting installed by [`super::begin_tenant_tx`]. The table owner (the role
//! that ran this bootstrap) bypasses RLS by PostgreSQL default, which is what
//! cross-tenant maintenance paths (expiry reaper, period reset) rely on;
//! request-path roles in a hardened deployment should be non-owner roles.

use sqlx::PgPool;

const DDL: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS tenants (
        id UUID PRIMARY KEY,
        name TEXT NOT NULL,
        default_currency TEXT NOT NULL CHECK (default_currency IN ('ZWG', 'USD')),
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS customers (
        id UUID PRIMARY KEY,
        tenant_id UUID NOT NULL REFERENCES tenants(id),
        phone_e164 TEXT,
        external_ref TEXT,
        status SMALLINT NOT NULL DEFAULT 1,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    r#"
    CREATE UNIQUE INDEX IF NOT EXISTS idx_customers_tenant_phone
    ON customers(tenant_id, phone_e164) WHERE phone_e164 IS NOT NULL
    "#,
    r#"
    CREATE UNIQUE INDEX IF NOT EXISTS idx_customers_tenant_ref
    ON customers(tenant_id, external_ref) WHERE external_ref IS NOT NULL
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS budgets (
        id UUID PRIMARY KEY,
        tenant_id UUID NOT NULL REFERENCES tenants(id),
        currency TEXT NOT NULL CHECK (currency IN ('ZWG', 'USD')),
        soft_cap NUMERIC(18,2) NOT NULL,
        hard_cap NUMERIC(18,2) NOT NULL,
        balance NUMERIC(18,2) NOT NULL DEFAULT 0,
        period SMALLINT NOT NULL DEFAULT 0,
        last_reset_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        CHECK (balance >= 0 AND balance <= hard_cap)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS ledger_entries (
        id BIGSERIAL PRIMARY KEY,
        tenant_id UUID NOT NULL REFERENCES tenants(id),
        budget_id UUID NOT NULL REFERENCES budgets(id),
        entry_type SMALLINT NOT NULL,
        amount NUMERIC(18,2) NOT NULL,
        ref_type TEXT,
        ref_id UUID,
        note TEXT,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS idx_ledger_budget ON ledger_entries(budget_id, id)
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS idx_ledger_ref ON ledger_entries(budget_id, ref_id, entry_type)
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS rewards (
        id UUID PRIMARY KEY,
        tenant_id UUID NOT NULL REFERENCES tenants(id),
        name TEXT NOT NULL,
        reward_type SMALLINT NOT NULL,
        inventory SMALLINT NOT NULL DEFAULT 0,
        face_value NUMERIC(18,2) NOT NULL,
        currency TEXT NOT NULL CHECK (currency IN ('ZWG', 'USD')),
        metadata JSONB NOT NULL DEFAULT '{}'::jsonb,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS voucher_codes (
        id UUID PRIMARY KEY,
        tenant_id UUID NOT NULL REFERENCES tenants(id),
        reward_id UUID NOT NULL REFERENCES rewards(id),
        code TEXT NOT NULL,
        status SMALLINT NOT NULL DEFAULT 0,
        issuance_id UUID,
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        UNIQUE (reward_id, code)
    )
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS idx_voucher_available
    ON voucher_codes(reward_id, status) WHERE status = 0
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS campaigns (
        id UUID PRIMARY KEY,
        tenant_id UUID NOT NULL REFERENCES tenants(id),
        name TEXT NOT NULL,
        budget_id UUID REFERENCES budgets(id),
        starts_at TIMESTAMPTZ NOT NULL,
        ends_at TIMESTAMPTZ NOT NULL,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS rules (
        id UUID PRIMARY KEY,
        tenant_id UUID NOT NULL REFERENCES tenants(id),
        event_type TEXT NOT NULL,
        conditions JSONB NOT NULL DEFAULT '{}'::jsonb,
        campaign_id UUID REFERENCES campaigns(id),
        reward_id UUID NOT NULL REFERENCES rewards(id),
        per_user_cap INT NOT NULL DEFAULT 0 CHECK (per_user_cap >= 0),
        global_cap INT,
        cool_down_sec INT NOT NULL DEFAULT 0 CHECK (cool_down_sec >= 0),
        active BOOLEAN NOT NULL DEFAULT TRUE,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS idx_rules_active
    ON rules(tenant_id, event_type) WHERE active
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS events (
        id UUID PRIMARY KEY,
        tenant_id UUID NOT NULL REFERENCES tenants(id),
        customer_id UUID NOT NULL REFERENCES customers(id),
        event_type TEXT NOT NULL,
        properties JSONB NOT NULL DEFAULT '{}'::jsonb,
        occurred_at TIMESTAMPTZ NOT NULL,
        source TEXT NOT NULL DEFAULT 'api',
        idempotency_key TEXT NOT NULL,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        UNIQUE (tenant_id, idempotency_key)
    )
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS idx_events_customer_type
    ON events(tenant_id, customer_id, event_type, occurred_at)
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS issuances (
        id UUID PRIMARY KEY,
        tenant_id UUID NOT NULL REFERENCES tenants(id),
        customer_id UUID NOT NULL REFERENCES customers(id),
        event_id UUID NOT NULL REFERENCES events(id),
        rule_id UUID NOT NULL REFERENCES rules(id),
        campaign_id UUID REFERENCES campaigns(id),
        reward_id UUID NOT NULL REFERENCES rewards(id),
        status SMALLINT NOT NULL DEFAULT 10,
        cost_amount NUMERIC(18,2) NOT NULL,
        face_amount NUMERIC(18,2) NOT NULL,
        currency TEXT NOT NULL CHECK (currency IN ('ZWG', 'USD')),
        code TEXT,
        expires_at TIMESTAMPTZ,
        redeemed_at TIMESTAMPTZ,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS idx_issuances_cap_rule
    ON issuances(tenant_id, rule_id, customer_id) WHERE status > 0
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS idx_issuances_cap_campaign
    ON issuances(tenant_id, campaign_id, customer_id) WHERE status > 0
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS idx_issuances_event ON issuances(event_id)
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS idx_issuances_expiry
    ON issuances(expires_at) WHERE status IN (10, 20) AND expires_at IS NOT NULL
    "#,
];

/// Tables that carry a `tenant_id` column and get the isolation policy.
const TENANT_TABLES: &[&str] = &[
    "customers",
    "budgets",
    "ledger_entries",
    "rewards",
    "voucher_codes",
    "campaigns",
    "rules",
    "events",
    "issuances",
];

/// Create all tables, indexes and RLS policies. Idempotent.
pub async fn init_schema(pool: &PgPool) -> Result<(), sqlx::Error> {
    for stmt in DDL {
        sqlx::query(stmt).execute(pool).await?;
    }

    for table in TENANT_TABLES {
        sqlx::query(&format!(
            "ALTER TABLE {table} ENABLE ROW LEVEL SECURITY"
        ))
        .execute(pool)
        .await?;

        // CREATE POLICY has no IF NOT EXISTS; drop-and-recreate keeps bootstrap idempotent.
        sqlx::query(&format!("DROP POLICY IF EXISTS tenant_isolation ON {table}"))
            .execute(pool)
            .await?;
        sqlx::query(&format!(
            "CREATE POLICY tenant_isolation ON {table}
             USING (tenant_id = current_setting('app.tenant_id', true)::uuid)
             WITH CHECK (tenant_id = current_setting('app.tenant_id', true)::uuid)"
        ))
        .execute(pool)
        .await?;
    }

    tracing::info!("Schema bootstrap complete ({} tables)", TENANT_TABLES.len() + 1);
    Ok(())
}
