//! TTL cache for active rules
//!
//! In-process map keyed by `(tenant, event_type)` behind a readers-writer
//! lock. Entries live for [`RULE_CACHE_TTL`]; a background sweeper drops
//! expired entries every [`SWEEP_INTERVAL`] so the map never accumulates
//! dead tenants. Rule and campaign writes invalidate the whole tenant
//! (coarse fallback - the write path does not track which event types a
//! campaign edit touches).
//!
//! The cache is advisory: a stale-for-TTL result only affects which rules
//! get *attempted*; the cap gate re-reads fresh state inside the issuance
//! transaction.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use sqlx::PgPool;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::core_types::TenantId;

use super::models::Rule;
use super::repository::RuleRepository;

/// How long a cached rule list is served before a database refresh
pub const RULE_CACHE_TTL: Duration = Duration::from_secs(300);

/// Cadence of the background expiry sweep
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

struct CacheEntry {
    rules: Arc<Vec<Rule>>,
    inserted_at: Instant,
}

/// Shared rule cache.
pub struct RuleCache {
    entries: RwLock<HashMap<(TenantId, String), CacheEntry>>,
    ttl: Duration,
}

impl Default for RuleCache {
    fn default() -> Self {
        Self::new(RULE_CACHE_TTL)
    }
}

impl RuleCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    /// Fresh-enough cached rules, or None on miss/expiry.
    pub fn get(&self, tenant_id: TenantId, event_type: &str) -> Option<Arc<Vec<Rule>>> {
        let entries = self.entries.read().unwrap();
        let entry = entries.get(&(tenant_id, event_type.to_string()))?;
        if entry.inserted_at.elapsed() > self.ttl {
            return None;
        }
        Some(entry.rules.clone())
    }

    pub fn insert(&self, tenant_id: TenantId, event_type: &str, rules: Arc<Vec<Rule>>) {
        let mut entries = self.entries.write().unwrap();
        entries.insert(
            (tenant_id, event_type.to_string()),
            CacheEntry {
                rules,
                inserted_at: Instant::now(),
            },
        );
    }

    /// Drop every cached entry for one tenant. Called on any rule or
    /// campaign write.
    pub fn invalidate_tenant(&self, tenant_id: TenantId) {
        let mut entries = self.entries.write().unwrap();
        entries.retain(|(t, _), _| *t != tenant_id);
    }

    /// Remove expired entries; returns how many were dropped.
    pub fn sweep(&self) -> usize {
        let mut entries = self.entries.write().unwrap();
        let before = entries.len();
        let ttl = self.ttl;
        entries.retain(|_, e| e.inserted_at.elapsed() <= ttl);
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Spawn the cooperative background sweeper. Runs until `shutdown`
    /// flips to true.
    pub fn spawn_sweeper(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        let cache = self;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(SWEEP_INTERVAL);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let dropped = cache.sweep();
                        if dropped > 0 {
                            tracing::debug!(dropped, "rule cache sweep");
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

/// Cache-backed active-rule lookup.
pub struct RuleSelector {
    cache: Arc<RuleCache>,
}

impl RuleSelector {
    pub fn new(cache: Arc<RuleCache>) -> Self {
        Self { cache }
    }

    pub fn cache(&self) -> &Arc<RuleCache> {
        &self.cache
    }

    /// Active rules for `(tenant, event_type)`, cached for the TTL,
    /// populated on miss with one query.
    pub async fn active_rules(
        &self,
        pool: &PgPool,
        tenant_id: TenantId,
        event_type: &str,
    ) -> Result<Arc<Vec<Rule>>, sqlx::Error> {
        if let Some(hit) = self.cache.get(tenant_id, event_type) {
            return Ok(hit);
        }

        tracing::debug!(%tenant_id, event_type, "rule cache miss");
        let rules = Arc::new(RuleRepository::list_active(pool, tenant_id, event_type).await?);
        self.cache.insert(tenant_id, event_type, rules.clone());
        Ok(rules)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn dummy_rule(tenant_id: TenantId) -> Rule {
        Rule {
            id: Uuid::new_v4(),
            tenant_id,
            event_type: "purchase".to_string(),
            conditions: serde_json::json!({}),
            campaign_id: None,
            reward_id: Uuid::new_v4(),
            per_user_cap: 0,
            global_cap: None,
            cool_down_sec: 0,
            active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_hit_and_miss() {
        let cache = RuleCache::new(Duration::from_secs(60));
        let tenant = Uuid::new_v4();
        assert!(cache.get(tenant, "purchase").is_none());

        cache.insert(tenant, "purchase", Arc::new(vec![dummy_rule(tenant)]));
        let hit = cache.get(tenant, "purchase").unwrap();
        assert_eq!(hit.len(), 1);
        // Key includes event type
        assert!(cache.get(tenant, "visit").is_none());
    }

    #[test]
    fn test_ttl_expiry() {
        let cache = RuleCache::new(Duration::ZERO);
        let tenant = Uuid::new_v4();
        cache.insert(tenant, "purchase", Arc::new(vec![]));
        std::thread::sleep(Duration::from_millis(5));
        assert!(cache.get(tenant, "purchase").is_none());
        // Entry is still in the map until a sweep removes it
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.sweep(), 1);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_invalidate_tenant_is_scoped() {
        let cache = RuleCache::new(Duration::from_secs(60));
        let t1 = Uuid::new_v4();
        let t2 = Uuid::new_v4();
        cache.insert(t1, "purchase", Arc::new(vec![]));
        cache.insert(t1, "visit", Arc::new(vec![]));
        cache.insert(t2, "purchase", Arc::new(vec![]));

        cache.invalidate_tenant(t1);
        assert!(cache.get(t1, "purchase").is_none());
        assert!(cache.get(t1, "visit").is_none());
        assert!(cache.get(t2, "purchase").is_some());
    }
}
