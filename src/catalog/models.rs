//! Data models for the reward catalog

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::core_types::{BudgetId, CampaignId, Currency, RewardId, TenantId};

/// Reward type, stored as SMALLINT
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum RewardType {
    Discount,
    VoucherCode,
    PointsCredit,
    ExternalVoucher,
    PhysicalItem,
    WebhookCustom,
}

impl RewardType {
    pub fn id(&self) -> i16 {
        match self {
            RewardType::Discount => 1,
            RewardType::VoucherCode => 2,
            RewardType::PointsCredit => 3,
            RewardType::ExternalVoucher => 4,
            RewardType::PhysicalItem => 5,
            RewardType::WebhookCustom => 6,
        }
    }

    pub fn from_id(id: i16) -> Option<Self> {
        match id {
            1 => Some(RewardType::Discount),
            2 => Some(RewardType::VoucherCode),
            3 => Some(RewardType::PointsCredit),
            4 => Some(RewardType::ExternalVoucher),
            5 => Some(RewardType::PhysicalItem),
            6 => Some(RewardType::WebhookCustom),
            _ => None,
        }
    }
}

/// Inventory backing for a reward, stored as SMALLINT
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Inventory {
    /// Nothing to consume at issuance time
    None,
    /// Pre-loaded voucher-code pool; issuance pops one code
    Pool,
    /// Fetched just-in-time from an external provider at fulfillment
    JitExternal,
}

impl Inventory {
    pub fn id(&self) -> i16 {
        match self {
            Inventory::None => 0,
            Inventory::Pool => 1,
            Inventory::JitExternal => 2,
        }
    }

    pub fn from_id(id: i16) -> Option<Self> {
        match id {
            0 => Some(Inventory::None),
            1 => Some(Inventory::Pool),
            2 => Some(Inventory::JitExternal),
            _ => None,
        }
    }
}

/// Reward catalog entry. `metadata` is opaque to the core.
#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct Reward {
    #[schema(value_type = Uuid)]
    pub id: RewardId,
    #[schema(value_type = Uuid)]
    pub tenant_id: TenantId,
    pub name: String,
    pub reward_type: RewardType,
    pub inventory: Inventory,
    pub face_value: Decimal,
    pub currency: Currency,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// Time-bounded campaign, optionally budgeted
#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct Campaign {
    #[schema(value_type = Uuid)]
    pub id: CampaignId,
    #[schema(value_type = Uuid)]
    pub tenant_id: TenantId,
    pub name: String,
    #[schema(value_type = Option<Uuid>)]
    pub budget_id: Option<BudgetId>,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reward_type_roundtrip() {
        for t in [
            RewardType::Discount,
            RewardType::VoucherCode,
            RewardType::PointsCredit,
            RewardType::ExternalVoucher,
            RewardType::PhysicalItem,
            RewardType::WebhookCustom,
        ] {
            assert_eq!(RewardType::from_id(t.id()), Some(t));
        }
        assert!(RewardType::from_id(0).is_none());
    }

    #[test]
    fn test_inventory_roundtrip() {
        for i in [Inventory::None, Inventory::Pool, Inventory::JitExternal] {
            assert_eq!(Inventory::from_id(i.id()), Some(i));
        }
        assert!(Inventory::from_id(-1).is_none());
    }
}
