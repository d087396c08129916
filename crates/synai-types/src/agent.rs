use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A human identity that can adopt agents.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Owner {
    pub owner_id: String,
    pub username: String,
    pub twitter_handle: Option<String>,
    pub avatar_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Owner {
    pub fn new(owner_id: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            owner_id: owner_id.into(),
            username: username.into(),
            twitter_handle: None,
            avatar_url: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_twitter_handle(mut self, handle: Option<String>) -> Self {
        self.twitter_handle = handle;
        self
    }
}

/// Managed wallet material issued to an agent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Wallet {
    pub address: String,
    /// Base64 AES-GCM ciphertext of the hex-encoded private key.
    pub encrypted_privkey: String,
}

/// A worker agent that claims and solves jobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    pub agent_id: String,
    pub owner_id: Option<String>,
    pub name: String,
    pub adopted_at: Option<DateTime<Utc>>,
    /// Not yet bound to a human owner.
    pub is_ghost: bool,
    pub wallet_address: String,
    pub encrypted_privkey: String,
    #[serde(with = "rust_decimal::serde::str")]
    pub balance: Decimal,
    pub created_at: DateTime<Utc>,
}

impl Agent {
    /// A freshly provisioned, unowned agent with zero balance.
    pub fn provision(agent_id: impl Into<String>, wallet: Wallet) -> Self {
        let agent_id = agent_id.into();
        let name = default_agent_name(&agent_id);
        Self {
            agent_id,
            owner_id: None,
            name,
            adopted_at: None,
            is_ghost: true,
            wallet_address: wallet.address,
            encrypted_privkey: wallet.encrypted_privkey,
            balance: Decimal::ZERO,
            created_at: Utc::now(),
        }
    }

    /// Bind this agent to an owner.
    pub fn adopt(&mut self, owner_id: impl Into<String>) {
        self.owner_id = Some(owner_id.into());
        self.is_ghost = false;
        self.adopted_at = Some(Utc::now());
    }

    /// Public projection without key material.
    pub fn view(&self) -> AgentView {
        AgentView {
            agent_id: self.agent_id.clone(),
            owner_id: self.owner_id.clone(),
            name: self.name.clone(),
            adopted_at: self.adopted_at,
            is_ghost: self.is_ghost,
            wallet_address: self.wallet_address.clone(),
            balance: self.balance,
            created_at: self.created_at,
        }
    }
}

/// `Agent_` followed by the first six characters of the id.
pub fn default_agent_name(agent_id: &str) -> String {
    let prefix: String = agent_id.chars().take(6).collect();
    format!("Agent_{prefix}")
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentView {
    pub agent_id: String,
    pub owner_id: Option<String>,
    pub name: String,
    pub adopted_at: Option<DateTime<Utc>>,
    pub is_ghost: bool,
    pub wallet_address: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub balance: Decimal,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wallet() -> Wallet {
        Wallet {
            address: "0x0000000000000000000000000000000000000001".into(),
            encrypted_privkey: "ciphertext".into(),
        }
    }

    #[test]
    fn test_provisioned_agent_is_ghost_with_zero_balance() {
        let agent = Agent::provision("WORKER_AGENT_X", wallet());
        assert_eq!(agent.name, "Agent_WORKER");
        assert!(agent.is_ghost);
        assert!(agent.owner_id.is_none());
        assert_eq!(agent.balance, Decimal::ZERO);
    }

    #[test]
    fn test_default_name_handles_short_and_multibyte_ids() {
        assert_eq!(default_agent_name("A1"), "Agent_A1");
        assert_eq!(default_agent_name("ägent-zero"), "Agent_ägent-");
    }

    #[test]
    fn test_adopt_clears_ghost_flag() {
        let mut agent = Agent::provision("A1", wallet());
        agent.adopt("owner-1");
        assert!(!agent.is_ghost);
        assert_eq!(agent.owner_id.as_deref(), Some("owner-1"));
        assert!(agent.adopted_at.is_some());
    }

    #[test]
    fn test_view_hides_key_material() {
        let agent = Agent::provision("A1", wallet());
        let json = serde_json::to_value(agent.view()).unwrap();
        assert!(json.get("encrypted_privkey").is_none());
        assert_eq!(json["balance"], serde_json::json!(0.0));
    }
}
