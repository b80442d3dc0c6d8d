//! Voucher-code pool
//!
//! Pool-backed rewards draw pre-loaded opaque codes. Claiming must be atomic
//! under concurrency: one statement selects an available row with
//! `FOR UPDATE SKIP LOCKED` and flips it to reserved, so two concurrent
//! issuances can never hold the same code. Once a code has been delivered to
//! a customer it never returns to the pool.

use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::core_types::{IssuanceId, RewardId, TenantId};

/// Voucher code status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i16)]
pub enum VoucherStatus {
    Available = 0,
    Reserved = 1,
    Issued = 2,
    Invalid = 3,
}

impl VoucherStatus {
    #[inline]
    pub fn id(&self) -> i16 {
        *self as i16
    }

    pub fn from_id(id: i16) -> Option<Self> {
        match id {
            0 => Some(VoucherStatus::Available),
            1 => Some(VoucherStatus::Reserved),
            2 => Some(VoucherStatus::Issued),
            3 => Some(VoucherStatus::Invalid),
            _ => None,
        }
    }
}

/// Pool operations
pub struct VoucherPool;

impl VoucherPool {
    /// Load codes into the pool. Duplicate codes for the same reward are
    /// skipped; returns how many were actually inserted.
    pub async fn add_codes(
        pool: &PgPool,
        tenant_id: TenantId,
        reward_id: RewardId,
        codes: &[String],
    ) -> Result<u64, sqlx::Error> {
        let mut inserted = 0u64;
        for code in codes {
            let result = sqlx::query(
                r#"
                INSERT INTO voucher_codes (id, tenant_id, reward_id, code, status)
                VALUES ($1, $2, $3, $4, $5)
                ON CONFLICT (reward_id, code) DO NOTHING
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(tenant_id)
            .bind(reward_id)
            .bind(code)
            .bind(VoucherStatus::Available.id())
            .execute(pool)
            .await?;
            inserted += result.rows_affected();
        }
        Ok(inserted)
    }

    /// Atomically pop one available code for the reward and mark it reserved
    /// for the issuance. `None` means the pool is exhausted.
    pub async fn claim_code(
        conn: &mut PgConnection,
        tenant_id: TenantId,
        reward_id: RewardId,
        issuance_id: IssuanceId,
    ) -> Result<Option<String>, sqlx::Error> {
        let code = sqlx::query_scalar::<_, String>(
            r#"
            UPDATE voucher_codes SET status = $4, issuance_id = $3, updated_at = NOW()
            WHERE id = (
                SELECT id FROM voucher_codes
                WHERE tenant_id = $1 AND reward_id = $2 AND status = $5
                LIMIT 1
                FOR UPDATE SKIP LOCKED
            )
            RETURNING code
            "#,
        )
        .bind(tenant_id)
        .bind(reward_id)
        .bind(issuance_id)
        .bind(VoucherStatus::Reserved.id())
        .bind(VoucherStatus::Available.id())
        .fetch_optional(conn)
        .await?;

        Ok(code)
    }

    /// Finalize the claimed code once it has been handed to the customer.
    pub async fn mark_issued(
        conn: &mut PgConnection,
        issuance_id: IssuanceId,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE voucher_codes SET status = $2, updated_at = NOW() WHERE issuance_id = $1 AND status = $3",
        )
        .bind(issuance_id)
        .bind(VoucherStatus::Issued.id())
        .bind(VoucherStatus::Reserved.id())
        .execute(conn)
        .await?;
        Ok(())
    }

    /// Return a still-reserved code to the pool. A code already issued stays
    /// issued - once delivered it is never re-circulated.
    pub async fn return_to_pool(
        conn: &mut PgConnection,
        issuance_id: IssuanceId,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE voucher_codes
            SET status = $2, issuance_id = NULL, updated_at = NOW()
            WHERE issuance_id = $1 AND status = $3
            "#,
        )
        .bind(issuance_id)
        .bind(VoucherStatus::Available.id())
        .bind(VoucherStatus::Reserved.id())
        .execute(conn)
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_roundtrip() {
        for s in [
            VoucherStatus::Available,
            VoucherStatus::Reserved,
            VoucherStatus::Issued,
            VoucherStatus::Invalid,
        ] {
            assert_eq!(VoucherStatus::from_id(s.id()), Some(s));
        }
        assert!(VoucherStatus::from_id(9).is_none());
    }
}
