//! Expiry reaper
//!
//! Moves `reserved`/`issued` issuances past their `expires_at` to `expired`,
//! releasing each reservation. Rows are claimed with `FOR UPDATE SKIP
//! LOCKED` so several reapers (the in-process task plus an external
//! scheduler calling the API) never fight over the same batch.

use std::time::Duration;

use sqlx::PgPool;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::error::TransitionError;
use super::models::IssuanceStatus;
use super::repository::issuance_from_row;
use super::state::apply_release;

/// Default reaper cadence
pub const REAP_INTERVAL: Duration = Duration::from_secs(60);

const BATCH: i64 = 100;

/// Expire one batch of due issuances. Returns how many were expired; callers
/// loop until zero if they want the backlog drained.
pub async fn expire_due_issuances(pool: &PgPool, batch: i64) -> Result<u64, TransitionError> {
    let mut tx = pool.begin().await.map_err(TransitionError::Database)?;

    let rows = sqlx::query(
        r#"
        SELECT id, tenant_id, customer_id, event_id, rule_id, campaign_id, reward_id,
               status, cost_amount, face_amount, currency, code, expires_at, redeemed_at,
               created_at, updated_at
        FROM issuances
        WHERE status IN ($1, $2) AND expires_at IS NOT NULL AND expires_at <= NOW()
        ORDER BY expires_at
        LIMIT $3
        FOR UPDATE SKIP LOCKED
        "#,
    )
    .bind(IssuanceStatus::Reserved.id())
    .bind(IssuanceStatus::Issued.id())
    .bind(batch)
    .fetch_all(&mut *tx)
    .await
    .map_err(TransitionError::Database)?;

    let mut expired = 0u64;
    for row in &rows {
        let issuance = issuance_from_row(row)?;
        apply_release(&mut tx, &issuance, IssuanceStatus::Expired).await?;
        sqlx::query("UPDATE issuances SET status = $2, updated_at = NOW() WHERE id = $1")
            .bind(issuance.id)
            .bind(IssuanceStatus::Expired.id())
            .execute(&mut *tx)
            .await
            .map_err(TransitionError::Database)?;
        expired += 1;
    }

    tx.commit().await.map_err(TransitionError::Database)?;

    if expired > 0 {
        tracing::info!(expired, "expiry reaper pass");
    }
    Ok(expired)
}

/// Spawn the cooperative background reaper. Runs until `shutdown` flips.
pub fn spawn_reaper(pool: PgPool, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(REAP_INTERVAL);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = expire_due_issuances(&pool, BATCH).await {
                        tracing::error!(error = %e, "expiry reaper failed");
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
    })
}
