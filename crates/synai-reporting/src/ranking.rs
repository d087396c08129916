use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Shown in place of the owner for agents nobody has adopted yet.
pub const ENCRYPTED_OWNER: &str = "[ENCRYPTED]";

/// Number of rows in each leaderboard unless configured otherwise.
pub const DEFAULT_RANKING_LIMIT: usize = 10;

/// One row of the agent leaderboard.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentRankEntry {
    pub agent_id: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub balance: Decimal,
    /// Owner username, or [`ENCRYPTED_OWNER`] for ghost agents.
    pub owner_id: String,
    pub owner_twitter: Option<String>,
    pub wallet_address: String,
    pub is_ghost: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OwnerRankEntry {
    /// Owner username.
    pub owner_id: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_profit: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlatformStats {
    pub total_agents: usize,
    /// Sum of all job prices regardless of status.
    #[serde(with = "rust_decimal::serde::float")]
    pub total_bounty_volume: Decimal,
    /// Jobs not yet completed.
    pub active_tasks: usize,
}

/// Response body of the ranking endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Ranking {
    pub stats: PlatformStats,
    pub agent_ranking: Vec<AgentRankEntry>,
    pub owner_ranking: Vec<OwnerRankEntry>,
    #[serde(with = "rust_decimal::serde::float")]
    pub platform_revenue: Decimal,
}
