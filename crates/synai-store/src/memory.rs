use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::Arc;
use uuid::Uuid;

use synai_types::{Agent, Job, Owner, RelayError};

use crate::traits::{AgentFactory, AgentStore, AgentUpdate, JobStore, JobUpdate, OwnerStore};

/// DashMap-backed store for jobs, agents and owners.
///
/// Every mutation runs while holding the entry's shard lock, which makes status
/// transitions a compare-and-swap: two concurrent claims on the same job see
/// each other's result instead of both succeeding.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    jobs: Arc<DashMap<Uuid, Job>>,
    agents: Arc<DashMap<String, Agent>>,
    owners: Arc<DashMap<String, Owner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a store from persisted records.
    pub fn restore(owners: Vec<Owner>, agents: Vec<Agent>, jobs: Vec<Job>) -> Self {
        let store = Self::new();
        for owner in owners {
            store.owners.insert(owner.owner_id.clone(), owner);
        }
        for agent in agents {
            store.agents.insert(agent.agent_id.clone(), agent);
        }
        for job in jobs {
            store.jobs.insert(job.task_id, job);
        }
        store
    }
}

#[async_trait]
impl JobStore for MemoryStore {
    async fn insert_job(&self, job: Job) -> Result<(), RelayError> {
        match self.jobs.entry(job.task_id) {
            Entry::Occupied(_) => Err(RelayError::Storage(format!(
                "job {} already exists",
                job.task_id
            ))),
            Entry::Vacant(slot) => {
                slot.insert(job);
                Ok(())
            }
        }
    }

    async fn get_job(&self, task_id: Uuid) -> Result<Option<Job>, RelayError> {
        Ok(self.jobs.get(&task_id).map(|j| j.clone()))
    }

    async fn list_jobs(&self) -> Result<Vec<Job>, RelayError> {
        let mut jobs: Vec<Job> = self.jobs.iter().map(|r| r.value().clone()).collect();
        jobs.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(jobs)
    }

    async fn update_job(&self, task_id: Uuid, update: JobUpdate) -> Result<Job, RelayError> {
        let mut job = self
            .jobs
            .get_mut(&task_id)
            .ok_or_else(|| RelayError::JobNotFound(task_id.to_string()))?;

        let mut draft = job.clone();
        update(&mut draft)?;
        *job = draft;
        Ok(job.clone())
    }
}

#[async_trait]
impl AgentStore for MemoryStore {
    async fn get_agent(&self, agent_id: &str) -> Result<Option<Agent>, RelayError> {
        Ok(self.agents.get(agent_id).map(|a| a.clone()))
    }

    async fn list_agents(&self) -> Result<Vec<Agent>, RelayError> {
        let mut agents: Vec<Agent> = self.agents.iter().map(|r| r.value().clone()).collect();
        agents.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(agents)
    }

    async fn get_or_create_agent(
        &self,
        agent_id: &str,
        create: AgentFactory,
    ) -> Result<(Agent, bool), RelayError> {
        match self.agents.entry(agent_id.to_string()) {
            Entry::Occupied(existing) => Ok((existing.get().clone(), false)),
            Entry::Vacant(slot) => {
                let agent = create()?;
                slot.insert(agent.clone());
                Ok((agent, true))
            }
        }
    }

    async fn update_agent(
        &self,
        agent_id: &str,
        update: AgentUpdate,
    ) -> Result<Agent, RelayError> {
        let mut agent = self
            .agents
            .get_mut(agent_id)
            .ok_or_else(|| RelayError::AgentNotFound(agent_id.to_string()))?;

        let mut draft = agent.clone();
        update(&mut draft)?;
        *agent = draft;
        Ok(agent.clone())
    }
}

#[async_trait]
impl OwnerStore for MemoryStore {
    async fn insert_owner(&self, owner: Owner) -> Result<(), RelayError> {
        match self.owners.entry(owner.owner_id.clone()) {
            Entry::Occupied(_) => Err(RelayError::Validation(format!(
                "owner {} already exists",
                owner.owner_id
            ))),
            Entry::Vacant(slot) => {
                slot.insert(owner);
                Ok(())
            }
        }
    }

    async fn get_owner(&self, owner_id: &str) -> Result<Option<Owner>, RelayError> {
        Ok(self.owners.get(owner_id).map(|o| o.clone()))
    }

    async fn list_owners(&self) -> Result<Vec<Owner>, RelayError> {
        let mut owners: Vec<Owner> = self.owners.iter().map(|r| r.value().clone()).collect();
        owners.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(owners)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use synai_types::{JobEvent, JobStatus, Wallet};

    fn job() -> Job {
        Job::new("t", "d", dec!(1), "buyer", serde_json::json!({}))
    }

    fn agent(id: &str) -> Agent {
        Agent::provision(
            id,
            Wallet {
                address: format!("0x{id}"),
                encrypted_privkey: String::new(),
            },
        )
    }

    #[tokio::test]
    async fn test_insert_and_get_job() {
        let store = MemoryStore::new();
        let job = job();
        let id = job.task_id;
        store.insert_job(job.clone()).await.unwrap();

        assert_eq!(store.get_job(id).await.unwrap().unwrap().title, "t");
        assert!(store.insert_job(job).await.is_err());
        assert!(store.get_job(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_failed_update_leaves_job_untouched() {
        let store = MemoryStore::new();
        let job = job();
        let id = job.task_id;
        store.insert_job(job).await.unwrap();

        let result = store
            .update_job(
                id,
                Box::new(|job: &mut Job| {
                    job.claimed_by = Some("A1".into());
                    job.apply_event(JobEvent::Claim)
                }),
            )
            .await;
        assert!(result.is_err());

        let stored = store.get_job(id).await.unwrap().unwrap();
        assert_eq!(stored.status, JobStatus::Posted);
        assert!(stored.claimed_by.is_none());
    }

    #[tokio::test]
    async fn test_update_missing_job() {
        let store = MemoryStore::new();
        let err = store
            .update_job(Uuid::new_v4(), Box::new(|_: &mut Job| Ok(())))
            .await
            .unwrap_err();
        assert!(matches!(err, RelayError::JobNotFound(_)));
    }

    #[tokio::test]
    async fn test_get_or_create_agent_runs_factory_once() {
        let store = MemoryStore::new();
        let (first, created) = store
            .get_or_create_agent("A1", Box::new(|| Ok(agent("A1"))))
            .await
            .unwrap();
        assert!(created);

        let (second, created) = store
            .get_or_create_agent(
                "A1",
                Box::new(|| Err(RelayError::Internal("factory must not run".into()))),
            )
            .await
            .unwrap();
        assert!(!created);
        assert_eq!(first.wallet_address, second.wallet_address);
        assert_eq!(store.list_agents().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_credit() {
        let store = MemoryStore::new();
        store
            .get_or_create_agent("A1", Box::new(|| Ok(agent("A1"))))
            .await
            .unwrap();

        assert_eq!(store.credit("A1", dec!(0.8)).await.unwrap(), dec!(0.8));
        assert_eq!(store.credit("A1", dec!(0.8)).await.unwrap(), dec!(1.6));
        assert!(matches!(
            store.credit("ghost", dec!(1)).await.unwrap_err(),
            RelayError::AgentNotFound(_)
        ));
    }

    #[tokio::test]
    async fn test_duplicate_owner_rejected() {
        let store = MemoryStore::new();
        store.insert_owner(Owner::new("o1", "alice")).await.unwrap();
        let err = store
            .insert_owner(Owner::new("o1", "mallory"))
            .await
            .unwrap_err();
        assert!(matches!(err, RelayError::Validation(_)));
        assert_eq!(
            store.get_owner("o1").await.unwrap().unwrap().username,
            "alice"
        );
    }
}
