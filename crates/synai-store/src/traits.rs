use async_trait::async_trait;
use rust_decimal::Decimal;
use uuid::Uuid;

use synai_types::{Agent, Job, Owner, RelayError};

/// Check-and-mutate step applied to a job under its write lock.
pub type JobUpdate = Box<dyn FnOnce(&mut Job) -> Result<(), RelayError> + Send>;

/// Mutation applied to an agent under its write lock.
pub type AgentUpdate = Box<dyn FnOnce(&mut Agent) -> Result<(), RelayError> + Send>;

/// Builds an agent when get-or-create finds none.
pub type AgentFactory = Box<dyn FnOnce() -> Result<Agent, RelayError> + Send>;

/// Durable mapping of task identifiers to job records.
#[async_trait]
pub trait JobStore: Send + Sync {
    async fn insert_job(&self, job: Job) -> Result<(), RelayError>;

    async fn get_job(&self, task_id: Uuid) -> Result<Option<Job>, RelayError>;

    /// All jobs, oldest first.
    async fn list_jobs(&self) -> Result<Vec<Job>, RelayError>;

    /// Apply `update` atomically. The stored job is left untouched when the
    /// update fails, so a rejected transition never leaks partial changes.
    async fn update_job(&self, task_id: Uuid, update: JobUpdate) -> Result<Job, RelayError>;
}

/// Agent records and balances.
#[async_trait]
pub trait AgentStore: Send + Sync {
    async fn get_agent(&self, agent_id: &str) -> Result<Option<Agent>, RelayError>;

    async fn list_agents(&self) -> Result<Vec<Agent>, RelayError>;

    /// Return the agent with this id, creating it with `create` if absent.
    /// The flag is true when a new record was inserted.
    async fn get_or_create_agent(
        &self,
        agent_id: &str,
        create: AgentFactory,
    ) -> Result<(Agent, bool), RelayError>;

    async fn update_agent(&self, agent_id: &str, update: AgentUpdate)
    -> Result<Agent, RelayError>;

    /// Add `amount` to the balance and return the new balance.
    async fn credit(&self, agent_id: &str, amount: Decimal) -> Result<Decimal, RelayError> {
        let agent = self
            .update_agent(
                agent_id,
                Box::new(move |agent: &mut Agent| {
                    agent.balance = agent.balance.checked_add(amount).ok_or_else(|| {
                        RelayError::Internal(format!("balance overflow for {}", agent.agent_id))
                    })?;
                    Ok(())
                }),
            )
            .await?;
        Ok(agent.balance)
    }
}

/// Human owner identities.
#[async_trait]
pub trait OwnerStore: Send + Sync {
    /// Insert a new owner. Fails if the id is taken.
    async fn insert_owner(&self, owner: Owner) -> Result<(), RelayError>;

    async fn get_owner(&self, owner_id: &str) -> Result<Option<Owner>, RelayError>;

    async fn list_owners(&self) -> Result<Vec<Owner>, RelayError>;
}
