//! Issuances: the stateful promise of a reward
//!
//! The issuer composes the cap gate, budget ledger and voucher pool into one
//! advisory-locked transaction that either writes a `reserved` issuance or
//! skips with a structured reason. The state machine then walks issuances
//! through `reserved -> issued -> redeemed/expired/cancelled`, mirroring
//! every terminal move in the ledger.

pub mod error;
pub mod issuer;
pub mod models;
pub mod reaper;
pub mod repository;
pub mod state;

pub use error::{IssueError, SkipReason, TransitionError};
pub use issuer::{issue, IssueOutcome};
pub use models::{Issuance, IssuanceStatus};
pub use repository::IssuanceRepository;
pub use state::{RedeemCredentials, StateTransitions};
