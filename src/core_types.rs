//! Core types used throughout the system
//!
//! Id aliases and the small enums shared by every domain module.
//! All resource ids are UUIDs (canonical 8-4-4-4-12 form in the API).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Tenant id - the isolation boundary. Every row and every query is scoped by it.
pub type TenantId = Uuid;

/// Customer id - unique within the system, owned by exactly one tenant.
pub type CustomerId = Uuid;

/// Budget id
pub type BudgetId = Uuid;

/// Reward catalog entry id
pub type RewardId = Uuid;

/// Campaign id
pub type CampaignId = Uuid;

/// Rule id
pub type RuleId = Uuid;

/// Event id
pub type EventId = Uuid;

/// Issuance id
pub type IssuanceId = Uuid;

/// Supported settlement currencies.
///
/// Stored as TEXT in PostgreSQL; every amount on an issuance must match its
/// budget's currency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, utoipa::ToSchema)]
pub enum Currency {
    ZWG,
    USD,
}

impl Currency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Currency::ZWG => "ZWG",
            Currency::USD => "USD",
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Currency {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ZWG" => Ok(Currency::ZWG),
            "USD" => Ok(Currency::USD),
            _ => Err(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_currency_roundtrip() {
        for c in [Currency::ZWG, Currency::USD] {
            assert_eq!(c.as_str().parse::<Currency>().unwrap(), c);
        }
        assert!("EUR".parse::<Currency>().is_err());
    }
}
