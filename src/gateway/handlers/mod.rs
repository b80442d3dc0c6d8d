//! HTTP handlers, grouped by resource

pub mod admin;
pub mod budgets;
pub mod events;
pub mod health;
pub mod issuances;
pub mod rules;

pub use admin::*;
pub use budgets::*;
pub use events::*;
pub use health::*;
pub use issuances::*;
pub use rules::*;
