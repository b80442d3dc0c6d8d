//! Reward catalog and campaigns
//!
//! A reward describes what a customer can earn (type, face value, inventory
//! backing); a campaign is a time-bounded grouping that optionally pins the
//! budget its issuances draw from.

pub mod models;
pub mod repository;

pub use models::{Campaign, Inventory, Reward, RewardType};
pub use repository::{CampaignRepository, RewardRepository};
