//! Data models for tenants and customers

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::core_types::{Currency, CustomerId, TenantId};

/// Customer status, stored as SMALLINT
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum CustomerStatus {
    Deleted,
    Active,
    Suspended,
}

impl CustomerStatus {
    pub fn id(&self) -> i16 {
        match self {
            CustomerStatus::Deleted => 0,
            CustomerStatus::Active => 1,
            CustomerStatus::Suspended => 2,
        }
    }

    pub fn from_id(id: i16) -> Option<Self> {
        match id {
            0 => Some(CustomerStatus::Deleted),
            1 => Some(CustomerStatus::Active),
            2 => Some(CustomerStatus::Suspended),
            _ => None,
        }
    }
}

/// Tenant - owns every row bearing its id
#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct Tenant {
    #[schema(value_type = Uuid)]
    pub id: TenantId,
    pub name: String,
    pub default_currency: Currency,
    pub created_at: DateTime<Utc>,
}

/// Customer of one tenant
#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct Customer {
    #[schema(value_type = Uuid)]
    pub id: CustomerId,
    #[schema(value_type = Uuid)]
    pub tenant_id: TenantId,
    pub phone_e164: Option<String>,
    pub external_ref: Option<String>,
    pub status: CustomerStatus,
    pub created_at: DateTime<Utc>,
}

impl Customer {
    pub fn is_active(&self) -> bool {
        self.status == CustomerStatus::Active
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_id_roundtrip() {
        for s in [
            CustomerStatus::Deleted,
            CustomerStatus::Active,
            CustomerStatus::Suspended,
        ] {
            assert_eq!(CustomerStatus::from_id(s.id()), Some(s));
        }
        assert!(CustomerStatus::from_id(99).is_none());
    }
}
