use serde::Deserialize;

/// Caller input for posting a job. Missing fields fall back to demo defaults.
#[derive(Debug, Clone, Default)]
pub struct NewJob {
    pub title: Option<String>,
    pub description: Option<String>,
    /// Raw price as received: a JSON number or numeric string.
    pub price: serde_json::Value,
    pub buyer_id: Option<String>,
    pub envelope: Option<serde_json::Value>,
}

pub const DEFAULT_TITLE: &str = "Untitled Task";
pub const DEFAULT_BUYER: &str = "unknown";

/// Caller input for registering an owner.
#[derive(Debug, Clone, Deserialize)]
pub struct NewOwner {
    #[serde(default)]
    pub owner_id: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub twitter_handle: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
}
