//! Issuance error types

use serde::Serialize;
use thiserror::Error;

use crate::core_types::{CampaignId, RewardId};
use crate::ledger::LedgerError;

use super::models::IssuanceStatus;

/// Why a rule that matched did not produce an issuance.
///
/// A skip is not an error: the event succeeded, this rule simply did not
/// fire. Skips ride inside 2xx ingest responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    CapsExceeded,
    Cooldown,
    InsufficientFunds,
    OutOfStock,
    CurrencyMismatch,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::CapsExceeded => "caps_exceeded",
            SkipReason::Cooldown => "cooldown",
            SkipReason::InsufficientFunds => "insufficient_funds",
            SkipReason::OutOfStock => "out_of_stock",
            SkipReason::CurrencyMismatch => "currency_mismatch",
        }
    }
}

/// Infrastructure/configuration failures inside the issuance transaction.
#[derive(Debug, Error)]
pub enum IssueError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Reward not found: {0}")]
    RewardNotFound(RewardId),

    #[error("Campaign not found: {0}")]
    CampaignNotFound(CampaignId),
}

/// State-transition failures.
#[derive(Debug, Error)]
pub enum TransitionError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Issuance not found")]
    NotFound,

    #[error("Invalid state transition: {from} -> {to}")]
    InvalidTransition {
        from: IssuanceStatus,
        to: IssuanceStatus,
    },

    #[error("Issuance is past its expiry")]
    PastExpiry,

    #[error("Presented code does not match")]
    CodeMismatch,

    #[error("Either otp or staff_pin is required")]
    CredentialsRequired,
}

impl TransitionError {
    /// Error code for API responses
    pub fn code(&self) -> &'static str {
        match self {
            TransitionError::Database(_) => "DATABASE_ERROR",
            TransitionError::Ledger(_) => "LEDGER_ERROR",
            TransitionError::NotFound => "ISSUANCE_NOT_FOUND",
            TransitionError::InvalidTransition { .. } => "INVALID_STATE_TRANSITION",
            TransitionError::PastExpiry => "PAST_EXPIRY",
            TransitionError::CodeMismatch => "CODE_MISMATCH",
            TransitionError::CredentialsRequired => "CREDENTIALS_REQUIRED",
        }
    }

    /// HTTP status suggestion
    pub fn http_status(&self) -> u16 {
        match self {
            TransitionError::NotFound => 404,
            TransitionError::InvalidTransition { .. }
            | TransitionError::PastExpiry
            | TransitionError::CodeMismatch => 409,
            TransitionError::CredentialsRequired => 400,
            TransitionError::Database(_) | TransitionError::Ledger(_) => 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skip_reason_wire_names() {
        assert_eq!(SkipReason::CapsExceeded.as_str(), "caps_exceeded");
        assert_eq!(SkipReason::InsufficientFunds.as_str(), "insufficient_funds");
        assert_eq!(SkipReason::OutOfStock.as_str(), "out_of_stock");
    }

    #[test]
    fn test_transition_http_status() {
        assert_eq!(TransitionError::NotFound.http_status(), 404);
        assert_eq!(TransitionError::CodeMismatch.http_status(), 409);
        assert_eq!(TransitionError::CredentialsRequired.http_status(), 400);
        assert_eq!(
            TransitionError::InvalidTransition {
                from: IssuanceStatus::Redeemed,
                to: IssuanceStatus::Cancelled,
            }
            .http_status(),
            409
        );
    }
}
