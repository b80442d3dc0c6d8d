//! Loyalty Core - Multi-tenant reward-issuance engine
//!
//! Turns an inbound customer event into zero-or-more reserved rewards under
//! budget, cap, cooldown and idempotency guarantees.
//!
//! # Modules
//!
//! - [`core_types`] - Id aliases and shared enums (TenantId, Currency, ...)
//! - [`config`] - Environment-driven configuration
//! - [`db`] - Connection pool, schema bootstrap, RLS tenant scoping, advisory locks
//! - [`account`] - Tenants and customers
//! - [`catalog`] - Reward catalog and campaigns
//! - [`rules`] - Rules, the active-rule TTL cache and its sweeper
//! - [`jsonlogic`] - JsonLogic evaluator with history-fact prefetch
//! - [`caps`] - Per-user / global / cooldown cap gate
//! - [`ledger`] - Double-entry budget ledger (fund/reserve/charge/release/expire/reverse)
//! - [`vouchers`] - Voucher-code pool with atomic claim
//! - [`events`] - Idempotent ingestion and the processing pipeline
//! - [`issuance`] - Transactional issuer, state machine, expiry reaper
//! - [`gateway`] - HTTP surface (axum) with OpenAPI docs

// Core types - must be first!
pub mod core_types;

// Configuration and logging
pub mod config;
pub mod logging;

// Storage
pub mod db;

// Domain components
pub mod account;
pub mod caps;
pub mod catalog;
pub mod events;
pub mod issuance;
pub mod jsonlogic;
pub mod ledger;
pub mod rules;
pub mod vouchers;

// HTTP surface
pub mod gateway;

// Convenient re-exports at crate root
pub use config::AppConfig;
pub use core_types::{
    BudgetId, CampaignId, Currency, CustomerId, EventId, IssuanceId, RewardId, RuleId, TenantId,
};
pub use db::Database;
pub use events::{ingest_event, process_event, Event};
pub use issuance::{Issuance, IssuanceStatus, SkipReason, StateTransitions};
pub use ledger::{Budget, EntryType, LedgerEntry};
pub use rules::{Rule, RuleCache, RuleSelector};
