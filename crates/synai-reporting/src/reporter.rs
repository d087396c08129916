use std::collections::HashMap;
use std::sync::Arc;

use rust_decimal::Decimal;

use synai_ledger::Ledger;
use synai_store::{AgentStore, JobStore, OwnerStore};
use synai_types::{Agent, Owner, PLATFORM_ADMIN_ACCOUNT, RelayError};

use crate::ranking::{
    AgentRankEntry, DEFAULT_RANKING_LIMIT, ENCRYPTED_OWNER, OwnerRankEntry, PlatformStats,
    Ranking,
};

/// Read-only leaderboards and platform totals, recomputed on every call.
#[derive(Clone)]
pub struct Reporter {
    jobs: Arc<dyn JobStore>,
    agents: Arc<dyn AgentStore>,
    owners: Arc<dyn OwnerStore>,
    ledger: Arc<dyn Ledger>,
    limit: usize,
}

impl Reporter {
    pub fn new(
        jobs: Arc<dyn JobStore>,
        agents: Arc<dyn AgentStore>,
        owners: Arc<dyn OwnerStore>,
        ledger: Arc<dyn Ledger>,
    ) -> Self {
        Self {
            jobs,
            agents,
            owners,
            ledger,
            limit: DEFAULT_RANKING_LIMIT,
        }
    }

    /// Cap both leaderboards at `limit` rows.
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// Richest agents first; ties broken by agent id.
    pub async fn top_agents(&self, limit: usize) -> Result<Vec<AgentRankEntry>, RelayError> {
        let owners = self.owners_by_id().await?;
        let mut agents = self.agents.list_agents().await?;
        agents.sort_by(|a, b| {
            b.balance
                .cmp(&a.balance)
                .then_with(|| a.agent_id.cmp(&b.agent_id))
        });

        Ok(agents
            .into_iter()
            .take(limit)
            .map(|agent| rank_agent(agent, &owners))
            .collect())
    }

    /// Owners by the summed balance of the agents they adopted.
    pub async fn owner_ranking(&self, limit: usize) -> Result<Vec<OwnerRankEntry>, RelayError> {
        let mut profit: HashMap<String, Decimal> = HashMap::new();
        for agent in self.agents.list_agents().await? {
            if let Some(owner_id) = agent.owner_id {
                *profit.entry(owner_id).or_default() += agent.balance;
            }
        }

        let mut ranking: Vec<OwnerRankEntry> = self
            .owners
            .list_owners()
            .await?
            .into_iter()
            .map(|owner| OwnerRankEntry {
                total_profit: profit.get(&owner.owner_id).copied().unwrap_or_default(),
                owner_id: owner.username,
            })
            .collect();
        ranking.sort_by(|a, b| {
            b.total_profit
                .cmp(&a.total_profit)
                .then_with(|| a.owner_id.cmp(&b.owner_id))
        });
        ranking.truncate(limit);
        Ok(ranking)
    }

    pub async fn platform_stats(&self) -> Result<PlatformStats, RelayError> {
        let jobs = self.jobs.list_jobs().await?;
        let total_bounty_volume: Decimal = jobs.iter().map(|j| j.price).sum();
        let active_tasks = jobs.iter().filter(|j| j.status.is_active()).count();
        let total_agents = self.agents.list_agents().await?.len();

        Ok(PlatformStats {
            total_agents,
            total_bounty_volume,
            active_tasks,
        })
    }

    /// Fees collected so far.
    pub async fn platform_revenue(&self) -> Result<Decimal, RelayError> {
        self.ledger.total_received(PLATFORM_ADMIN_ACCOUNT).await
    }

    pub async fn ranking(&self) -> Result<Ranking, RelayError> {
        let ranking = Ranking {
            stats: self.platform_stats().await?,
            agent_ranking: self.top_agents(self.limit).await?,
            owner_ranking: self.owner_ranking(self.limit).await?,
            platform_revenue: self.platform_revenue().await?,
        };
        tracing::debug!(
            agents = ranking.stats.total_agents,
            active_tasks = ranking.stats.active_tasks,
            "Computed ranking"
        );
        Ok(ranking)
    }

    async fn owners_by_id(&self) -> Result<HashMap<String, Owner>, RelayError> {
        Ok(self
            .owners
            .list_owners()
            .await?
            .into_iter()
            .map(|o| (o.owner_id.clone(), o))
            .collect())
    }
}

fn rank_agent(agent: Agent, owners: &HashMap<String, Owner>) -> AgentRankEntry {
    let owner = agent.owner_id.as_ref().and_then(|id| owners.get(id));
    let owner_id = match owner {
        Some(o) if !agent.is_ghost => o.username.clone(),
        _ => ENCRYPTED_OWNER.to_string(),
    };

    AgentRankEntry {
        agent_id: agent.agent_id,
        balance: agent.balance,
        owner_id,
        owner_twitter: owner.and_then(|o| o.twitter_handle.clone()),
        wallet_address: agent.wallet_address,
        is_ghost: agent.is_ghost,
    }
}
