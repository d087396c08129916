use serde::{Deserialize, Serialize};

use synai_ledger::LedgerEntry;
use synai_types::{Agent, Job, Owner};

/// The top-level persisted state.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StoreSnapshot {
    #[serde(default)]
    pub owners: Vec<Owner>,
    #[serde(default)]
    pub agents: Vec<Agent>,
    #[serde(default)]
    pub jobs: Vec<Job>,
    #[serde(default)]
    pub ledger_entries: Vec<LedgerEntry>,
}

impl StoreSnapshot {
    pub fn is_empty(&self) -> bool {
        self.owners.is_empty()
            && self.agents.is_empty()
            && self.jobs.is_empty()
            && self.ledger_entries.is_empty()
    }
}
