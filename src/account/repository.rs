//! Repository layer for tenant and customer rows

use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::core_types::{Currency, CustomerId, TenantId};

use super::models::{Customer, CustomerStatus, Tenant};

fn decode_err(detail: String) -> sqlx::Error {
    sqlx::Error::Decode(detail.into())
}

/// Tenant repository
pub struct TenantRepository;

impl TenantRepository {
    pub async fn create(
        pool: &PgPool,
        name: &str,
        default_currency: Currency,
    ) -> Result<Tenant, sqlx::Error> {
        let row = sqlx::query(
            r#"
            INSERT INTO tenants (id, name, default_currency)
            VALUES ($1, $2, $3)
            RETURNING id, name, default_currency, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(name)
        .bind(default_currency.as_str())
        .fetch_one(pool)
        .await?;

        tenant_from_row(&row)
    }

    pub async fn get_by_id(pool: &PgPool, tenant_id: TenantId) -> Result<Option<Tenant>, sqlx::Error> {
        let row = sqlx::query(
            "SELECT id, name, default_currency, created_at FROM tenants WHERE id = $1",
        )
        .bind(tenant_id)
        .fetch_optional(pool)
        .await?;

        row.map(|r| tenant_from_row(&r)).transpose()
    }
}

fn tenant_from_row(row: &PgRow) -> Result<Tenant, sqlx::Error> {
    let currency_str: String = row.get("default_currency");
    let default_currency = currency_str
        .parse::<Currency>()
        .map_err(|_| decode_err(format!("invalid currency: {currency_str}")))?;

    Ok(Tenant {
        id: row.get("id"),
        name: row.get("name"),
        default_currency,
        created_at: row.get("created_at"),
    })
}

/// Customer repository
pub struct CustomerRepository;

impl CustomerRepository {
    pub async fn create(
        pool: &PgPool,
        tenant_id: TenantId,
        phone_e164: Option<&str>,
        external_ref: Option<&str>,
    ) -> Result<Customer, sqlx::Error> {
        let row = sqlx::query(
            r#"
            INSERT INTO customers (id, tenant_id, phone_e164, external_ref, status)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, tenant_id, phone_e164, external_ref, status, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(tenant_id)
        .bind(phone_e164)
        .bind(external_ref)
        .bind(CustomerStatus::Active.id())
        .fetch_one(pool)
        .await?;

        customer_from_row(&row)
    }

    pub async fn get_by_id(
        pool: &PgPool,
        tenant_id: TenantId,
        customer_id: CustomerId,
    ) -> Result<Option<Customer>, sqlx::Error> {
        let row = sqlx::query(
            r#"
            SELECT id, tenant_id, phone_e164, external_ref, status, created_at
            FROM customers WHERE tenant_id = $1 AND id = $2
            "#,
        )
        .bind(tenant_id)
        .bind(customer_id)
        .fetch_optional(pool)
        .await?;

        row.map(|r| customer_from_row(&r)).transpose()
    }

    /// Soft delete / suspend / reactivate
    pub async fn set_status(
        pool: &PgPool,
        tenant_id: TenantId,
        customer_id: CustomerId,
        status: CustomerStatus,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE customers SET status = $3 WHERE tenant_id = $1 AND id = $2",
        )
        .bind(tenant_id)
        .bind(customer_id)
        .bind(status.id())
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}

fn customer_from_row(row: &PgRow) -> Result<Customer, sqlx::Error> {
    let status_id: i16 = row.get("status");
    let status = CustomerStatus::from_id(status_id)
        .ok_or_else(|| decode_err(format!("invalid customer status: {status_id}")))?;

    Ok(Customer {
        id: row.get("id"),
        tenant_id: row.get("tenant_id"),
        phone_e164: row.get("phone_e164"),
        external_ref: row.get("external_ref"),
        status,
        created_at: row.get("created_at"),
    })
}
