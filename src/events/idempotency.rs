//! In-process idempotency-key cache
//!
//! Hot replay detection: recently seen `(tenant, key)` pairs map to their
//! event id so an immediate duplicate skips the insert round-trip. Purely an
//! optimization - the unique index on `(tenant_id, idempotency_key)` is the
//! source of truth, and a miss here just falls through to the database.

use std::time::{Duration, Instant};

use dashmap::DashMap;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::core_types::{EventId, TenantId};

/// How long a seen key is remembered
pub const IDEMPOTENCY_TTL: Duration = Duration::from_secs(600);

/// Sweep cadence for expired entries
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Concurrent TTL map of recently ingested idempotency keys.
pub struct IdempotencyCache {
    entries: DashMap<(TenantId, String), (EventId, Instant)>,
    ttl: Duration,
}

impl Default for IdempotencyCache {
    fn default() -> Self {
        Self::new(IDEMPOTENCY_TTL)
    }
}

impl IdempotencyCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    pub fn get(&self, tenant_id: TenantId, key: &str) -> Option<EventId> {
        let entry = self.entries.get(&(tenant_id, key.to_string()))?;
        let (event_id, seen_at) = *entry;
        if seen_at.elapsed() > self.ttl {
            return None;
        }
        Some(event_id)
    }

    pub fn insert(&self, tenant_id: TenantId, key: &str, event_id: EventId) {
        self.entries
            .insert((tenant_id, key.to_string()), (event_id, Instant::now()));
    }

    /// Drop expired entries; returns how many were removed.
    pub fn sweep(&self) -> usize {
        let before = self.entries.len();
        let ttl = self.ttl;
        self.entries.retain(|_, (_, seen_at)| seen_at.elapsed() <= ttl);
        before - self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Spawn the cooperative background sweeper.
    pub fn spawn_sweeper(
        self: std::sync::Arc<Self>,
        mut shutdown: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        let cache = self;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(SWEEP_INTERVAL);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let dropped = cache.sweep();
                        if dropped > 0 {
                            tracing::debug!(dropped, "idempotency cache sweep");
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
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_get_insert() {
        let cache = IdempotencyCache::new(Duration::from_secs(60));
        let tenant = Uuid::new_v4();
        let event = Uuid::new_v4();

        assert!(cache.get(tenant, "k1").is_none());
        cache.insert(tenant, "k1", event);
        assert_eq!(cache.get(tenant, "k1"), Some(event));
        // Tenant-scoped: another tenant with the same key misses
        assert!(cache.get(Uuid::new_v4(), "k1").is_none());
    }

    #[test]
    fn test_expiry_and_sweep() {
        let cache = IdempotencyCache::new(Duration::ZERO);
        let tenant = Uuid::new_v4();
        cache.insert(tenant, "k1", Uuid::new_v4());
        std::thread::sleep(Duration::from_millis(5));
        assert!(cache.get(tenant, "k1").is_none());
        assert_eq!(cache.sweep(), 1);
        assert!(cache.is_empty());
    }
}
