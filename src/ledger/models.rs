//! Budget and ledger-entry data models

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core_types::{BudgetId, Currency, TenantId};

/// Budget reset period, stored as SMALLINT
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum BudgetPeriod {
    /// Never resets
    Rolling,
    Monthly,
    Quarterly,
    Yearly,
}

impl BudgetPeriod {
    pub fn id(&self) -> i16 {
        match self {
            BudgetPeriod::Rolling => 0,
            BudgetPeriod::Monthly => 1,
            BudgetPeriod::Quarterly => 2,
            BudgetPeriod::Yearly => 3,
        }
    }

    pub fn from_id(id: i16) -> Option<Self> {
        match id {
            0 => Some(BudgetPeriod::Rolling),
            1 => Some(BudgetPeriod::Monthly),
            2 => Some(BudgetPeriod::Quarterly),
            3 => Some(BudgetPeriod::Yearly),
            _ => None,
        }
    }
}

/// Ledger entry class, stored as SMALLINT
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum EntryType {
    Fund,
    Reserve,
    Charge,
    Release,
    Expire,
    Reverse,
}

impl EntryType {
    pub fn id(&self) -> i16 {
        match self {
            EntryType::Fund => 1,
            EntryType::Reserve => 2,
            EntryType::Charge => 3,
            EntryType::Release => 4,
            EntryType::Expire => 5,
            EntryType::Reverse => 6,
        }
    }

    pub fn from_id(id: i16) -> Option<Self> {
        match id {
            1 => Some(EntryType::Fund),
            2 => Some(EntryType::Reserve),
            3 => Some(EntryType::Charge),
            4 => Some(EntryType::Release),
            5 => Some(EntryType::Expire),
            6 => Some(EntryType::Reverse),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EntryType::Fund => "fund",
            EntryType::Reserve => "reserve",
            EntryType::Charge => "charge",
            EntryType::Release => "release",
            EntryType::Expire => "expire",
            EntryType::Reverse => "reverse",
        }
    }

    /// Whether this entry's stored amount participates in the balance
    /// reconciliation sum. `charge` does not - the balance moved at reserve.
    #[inline]
    pub fn counts_toward_balance(&self) -> bool {
        !matches!(self, EntryType::Charge)
    }
}

/// A currency pot with soft/hard caps. `0 <= balance <= hard_cap` always.
#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct Budget {
    pub id: BudgetId,
    pub tenant_id: TenantId,
    pub currency: Currency,
    pub soft_cap: Decimal,
    pub hard_cap: Decimal,
    pub balance: Decimal,
    pub period: BudgetPeriod,
    pub last_reset_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Append-only record of one monetary movement class.
#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct LedgerEntry {
    pub id: i64,
    pub tenant_id: TenantId,
    pub budget_id: BudgetId,
    pub entry_type: EntryType,
    /// Signed per the module convention (release/expire stored negative)
    pub amount: Decimal,
    pub ref_type: Option<String>,
    pub ref_id: Option<Uuid>,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl LedgerEntry {
    /// Contribution to the reconciliation sum.
    pub fn signed_amount(&self) -> Decimal {
        if self.entry_type.counts_toward_balance() {
            self.amount
        } else {
            Decimal::ZERO
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(entry_type: EntryType, amount: Decimal) -> LedgerEntry {
        LedgerEntry {
            id: 0,
            tenant_id: Uuid::nil(),
            budget_id: Uuid::nil(),
            entry_type,
            amount,
            ref_type: None,
            ref_id: None,
            note: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_entry_type_roundtrip() {
        for t in [
            EntryType::Fund,
            EntryType::Reserve,
            EntryType::Charge,
            EntryType::Release,
            EntryType::Expire,
            EntryType::Reverse,
        ] {
            assert_eq!(EntryType::from_id(t.id()), Some(t));
        }
        assert!(EntryType::from_id(0).is_none());
    }

    #[test]
    fn test_reconciliation_sum_excludes_charge() {
        // fund 100, reserve 10, charge 10 (realized), release -5
        let entries = [
            entry(EntryType::Fund, Decimal::from(100)),
            entry(EntryType::Reserve, Decimal::from(10)),
            entry(EntryType::Charge, Decimal::from(10)),
            entry(EntryType::Release, Decimal::from(-5)),
        ];
        let sum: Decimal = entries.iter().map(|e| e.signed_amount()).sum();
        // 100 + 10 + 0 - 5
        assert_eq!(sum, Decimal::from(105));
    }

    #[test]
    fn test_period_roundtrip() {
        for p in [
            BudgetPeriod::Rolling,
            BudgetPeriod::Monthly,
            BudgetPeriod::Quarterly,
            BudgetPeriod::Yearly,
        ] {
            assert_eq!(BudgetPeriod::from_id(p.id()), Some(p));
        }
    }
}
