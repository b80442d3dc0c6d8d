//! Rule data model

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::core_types::{CampaignId, RewardId, RuleId, TenantId};

/// A reward rule: JsonLogic condition + target reward + quota constraints.
#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct Rule {
    pub id: RuleId,
    pub tenant_id: TenantId,
    pub event_type: String,
    /// JsonLogic expression; the empty object always matches
    pub conditions: serde_json::Value,
    pub campaign_id: Option<CampaignId>,
    pub reward_id: RewardId,
    /// 0 means unlimited
    pub per_user_cap: i32,
    /// None means unlimited
    pub global_cap: Option<i32>,
    /// 0 means no cooldown
    pub cool_down_sec: i32,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
