//! Budget ledger
//!
//! Double-entry discipline for reward budgets. A budget's balance represents
//! *committed funds* and is only ever mutated through the atomic operations
//! in [`ops`], each of which locks the budget row (`FOR UPDATE`) and appends
//! an entry; `ledger_entries` is append-only and commit-ordered.
//!
//! Sign convention (load-bearing, do not "fix"):
//!
//! | entry     | stored amount | balance delta |
//! |-----------|---------------|---------------|
//! | fund      | +amount       | +amount       |
//! | reserve   | +amount       | +amount       |
//! | charge    | +amount       | none          |
//! | release   | -amount       | -amount       |
//! | expire    | -amount       | -amount       |
//! | reverse   | signed        | signed        |
//!
//! `charge` records the realization of a prior `reserve` - the balance
//! already moved at reserve time. Reconciliation sums every entry except
//! `charge` and compares against the stored balance.

pub mod models;
pub mod ops;
pub mod period;
pub mod reconcile;
pub mod repository;

pub use models::{Budget, BudgetPeriod, EntryType, LedgerEntry};
pub use ops::{LedgerError, ReserveOutcome};
pub use reconcile::ReconcileReport;
pub use repository::BudgetRepository;
