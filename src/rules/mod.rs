//! Rules: conditions, quota constraints and the active-rule cache
//!
//! A rule binds a JsonLogic condition to a target reward plus quota
//! constraints (per-user cap, global cap, cooldown). Active rules for a
//! `(tenant, event_type)` pair are served from a TTL cache; the cache is
//! advisory only - the cap gate re-checks everything inside the issuance
//! transaction.

pub mod cache;
pub mod models;
pub mod repository;

pub use cache::{RuleCache, RuleSelector, RULE_CACHE_TTL, SWEEP_INTERVAL};
pub use models::Rule;
pub use repository::RuleRepository;
