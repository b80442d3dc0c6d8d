//! Tenants and customers
//!
//! The tenant is the isolation boundary; a customer belongs to exactly one
//! tenant and is soft-deleted by status, never removed.

pub mod models;
pub mod repository;

pub use models::{Customer, CustomerStatus, Tenant};
pub use repository::{CustomerRepository, TenantRepository};
