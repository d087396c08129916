use std::sync::Arc;

use rust_decimal::Decimal;
use tokio::sync::RwLock;
use uuid::Uuid;

use synai_ledger::{InMemoryLedger, Ledger, LedgerEntry, NewLedgerEntry};
use synai_store::{AgentStore, FileStore, JobStore, MemoryStore, OwnerStore, StoreSnapshot};
use synai_types::{
    Agent, FeeSplit, Job, JobEvent, JobStatus, Owner, RelayError, Result, parse_price,
};
use synai_wallet::WalletIssuer;

use crate::request::{DEFAULT_BUYER, DEFAULT_TITLE, NewJob, NewOwner};

const UNAUTHORIZED_SUBMIT: &str = "Unauthorized or not found";
const UNAUTHORIZED_CONFIRM: &str = "Unauthorized";

/// Drives jobs through posted → funded → claimed → submitted → completed and
/// records the settlement on the ledger.
///
/// Each transition is checked and applied under the job's store lock, so a
/// transition can succeed at most once even with concurrent callers.
///
/// Mutations hold `commit_gate` shared while they touch the stores; checkpoints
/// hold it exclusively, so a snapshot only ever sees whole operations and the
/// last file written reflects every mutation that finished before it.
#[derive(Clone)]
pub struct SettlementEngine {
    jobs: Arc<dyn JobStore>,
    agents: Arc<dyn AgentStore>,
    owners: Arc<dyn OwnerStore>,
    ledger: Arc<dyn Ledger>,
    wallets: Arc<dyn WalletIssuer>,
    persistence: Option<Arc<FileStore>>,
    commit_gate: Arc<RwLock<()>>,
}

impl SettlementEngine {
    pub fn new(
        jobs: Arc<dyn JobStore>,
        agents: Arc<dyn AgentStore>,
        owners: Arc<dyn OwnerStore>,
        ledger: Arc<dyn Ledger>,
        wallets: Arc<dyn WalletIssuer>,
    ) -> Self {
        Self {
            jobs,
            agents,
            owners,
            ledger,
            wallets,
            persistence: None,
            commit_gate: Arc::new(RwLock::new(())),
        }
    }

    /// Engine over fresh in-memory stores, nothing persisted.
    pub fn in_memory(wallets: Arc<dyn WalletIssuer>) -> Self {
        let store = Arc::new(MemoryStore::new());
        Self::new(
            store.clone(),
            store.clone(),
            store,
            Arc::new(InMemoryLedger::new()),
            wallets,
        )
    }

    /// Restore state from `file_store` and checkpoint back to it after every mutation.
    pub fn open(file_store: FileStore, wallets: Arc<dyn WalletIssuer>) -> Result<Self> {
        let snapshot = file_store.load()?;
        tracing::info!(
            path = %file_store.path().display(),
            jobs = snapshot.jobs.len(),
            agents = snapshot.agents.len(),
            "Restoring relay state"
        );
        let store = Arc::new(MemoryStore::restore(
            snapshot.owners,
            snapshot.agents,
            snapshot.jobs,
        ));
        let ledger = Arc::new(InMemoryLedger::from_entries(snapshot.ledger_entries));
        Ok(Self::new(store.clone(), store.clone(), store, ledger, wallets)
            .with_persistence(Arc::new(file_store)))
    }

    pub fn with_persistence(mut self, file_store: Arc<FileStore>) -> Self {
        self.persistence = Some(file_store);
        self
    }

    pub fn jobs(&self) -> &Arc<dyn JobStore> {
        &self.jobs
    }

    pub fn agents(&self) -> &Arc<dyn AgentStore> {
        &self.agents
    }

    pub fn owners(&self) -> &Arc<dyn OwnerStore> {
        &self.owners
    }

    pub fn ledger(&self) -> &Arc<dyn Ledger> {
        &self.ledger
    }

    // ---- lifecycle -------------------------------------------------------

    /// Create a job in `posted` state.
    pub async fn post(&self, request: NewJob) -> Result<Job> {
        let price = parse_price(&request.price)?;
        let job = Job::new(
            request.title.unwrap_or_else(|| DEFAULT_TITLE.to_string()),
            request.description.unwrap_or_default(),
            price,
            request.buyer_id.unwrap_or_else(|| DEFAULT_BUYER.to_string()),
            request
                .envelope
                .unwrap_or_else(|| serde_json::Value::Object(Default::default())),
        );

        {
            let _commit = self.commit_gate.read().await;
            self.jobs.insert_job(job.clone()).await?;
        }
        tracing::info!(task_id = %job.task_id, buyer_id = %job.buyer_id, price = %job.price, "Job posted");
        self.checkpoint().await?;
        Ok(job)
    }

    /// Record the buyer's escrow reference and open the job for claiming.
    pub async fn fund(&self, task_id: Uuid, escrow_tx_hash: Option<&str>) -> Result<Job> {
        let commit = self.commit_gate.read().await;
        if self.jobs.get_job(task_id).await?.is_none() {
            return Err(RelayError::JobNotFound(task_id.to_string()));
        }
        let tx_hash = escrow_tx_hash
            .map(str::trim)
            .filter(|h| !h.is_empty())
            .ok_or(RelayError::MissingField("escrow_tx_hash"))?
            .to_string();

        let job = self
            .jobs
            .update_job(
                task_id,
                Box::new(move |job: &mut Job| {
                    job.apply_event(JobEvent::Fund)?;
                    job.escrow_tx_hash = Some(tx_hash);
                    Ok(())
                }),
            )
            .await?;
        drop(commit);

        tracing::info!(task_id = %task_id, tx_hash = ?job.escrow_tx_hash, "Job funded");
        self.checkpoint().await?;
        Ok(job)
    }

    /// Bind a funded job to `agent_id`, provisioning the agent if it is new.
    /// Only the winning claimant is provisioned.
    pub async fn claim(&self, task_id: Uuid, agent_id: &str) -> Result<Job> {
        let commit = self.commit_gate.read().await;
        let current = self
            .jobs
            .get_job(task_id)
            .await?
            .ok_or_else(|| RelayError::JobNotFound(task_id.to_string()))?;
        ensure_claimable(current.status)?;

        let agent_id = agent_id.trim();
        if agent_id.is_empty() {
            return Err(RelayError::MissingField("agent_id"));
        }

        let claimant = agent_id.to_string();
        let job = self
            .jobs
            .update_job(
                task_id,
                Box::new(move |job: &mut Job| {
                    ensure_claimable(job.status)?;
                    job.apply_event(JobEvent::Claim)?;
                    job.claimed_by = Some(claimant);
                    Ok(())
                }),
            )
            .await?;
        self.provision_agent(agent_id).await.inspect_err(|e| {
            tracing::error!(task_id = %task_id, agent_id = %agent_id, error = %e, "Failed to provision claimant");
        })?;
        drop(commit);

        tracing::info!(task_id = %task_id, agent_id = %agent_id, "Job claimed");
        self.checkpoint().await?;
        Ok(job)
    }

    /// Store the claimant's result verbatim. Nothing in the envelope is enforced.
    pub async fn submit(
        &self,
        task_id: Uuid,
        agent_id: &str,
        result: serde_json::Value,
    ) -> Result<Job> {
        let submitter = agent_id.to_string();
        let commit = self.commit_gate.read().await;
        let job = self
            .jobs
            .update_job(
                task_id,
                Box::new(move |job: &mut Job| {
                    if job.claimed_by.as_deref() != Some(submitter.as_str()) {
                        return Err(RelayError::forbidden(UNAUTHORIZED_SUBMIT));
                    }
                    if job.status != JobStatus::Claimed {
                        return Err(RelayError::forbidden(format!(
                            "Job is {}, results can only be submitted once",
                            job.status
                        )));
                    }
                    job.apply_event(JobEvent::Submit)?;
                    job.result = Some(result);
                    Ok(())
                }),
            )
            .await
            .map_err(|e| match e {
                RelayError::JobNotFound(_) => RelayError::forbidden(UNAUTHORIZED_SUBMIT),
                other => other,
            })?;
        drop(commit);

        tracing::info!(task_id = %task_id, agent_id = %agent_id, "Result submitted, awaiting buyer confirmation");
        self.checkpoint().await?;
        Ok(job)
    }

    /// Buyer sign-off: split the price, credit the agent and write both ledger entries.
    pub async fn confirm(&self, task_id: Uuid, buyer_id: &str, signature: &str) -> Result<FeeSplit> {
        let buyer = buyer_id.to_string();
        let signature = signature.trim().to_string();
        let commit = self.commit_gate.read().await;
        let job = self
            .jobs
            .update_job(
                task_id,
                Box::new(move |job: &mut Job| {
                    if job.buyer_id != buyer {
                        return Err(RelayError::forbidden(UNAUTHORIZED_CONFIRM));
                    }
                    if job.status != JobStatus::Submitted {
                        return Err(RelayError::InvalidStateTransition {
                            from: job.status,
                            event: JobEvent::Confirm,
                        });
                    }
                    if signature.is_empty() {
                        return Err(RelayError::MissingField("signature"));
                    }
                    if job.claimed_by.is_none() {
                        return Err(RelayError::Internal(format!(
                            "submitted job {} has no claimant",
                            job.task_id
                        )));
                    }
                    FeeSplit::of(job.price)?;

                    job.signature = Some(signature);
                    job.apply_event(JobEvent::Confirm)
                }),
            )
            .await
            .map_err(|e| match e {
                RelayError::JobNotFound(_) => RelayError::forbidden(UNAUTHORIZED_CONFIRM),
                other => other,
            })?;

        let split = FeeSplit::of(job.price)?;
        let agent_id = job
            .claimed_by
            .clone()
            .ok_or_else(|| RelayError::Internal(format!("job {task_id} lost its claimant")))?;
        tracing::debug!(task_id = %task_id, price = %job.price, payout = %split.payout, fee = %split.fee, "Settling job");

        // The job is already completed; failures past this point are reported, not rolled back.
        let balance = self.agents.credit(&agent_id, split.payout).await.inspect_err(|e| {
            tracing::error!(task_id = %task_id, agent_id = %agent_id, error = %e, "Failed to credit agent after completion");
        })?;
        self.ledger
            .append_all(NewLedgerEntry::settlement(task_id, &agent_id, &split).to_vec())
            .await
            .inspect_err(|e| {
                tracing::error!(task_id = %task_id, error = %e, "Failed to record settlement on ledger");
            })?;
        drop(commit);

        tracing::info!(
            task_id = %task_id,
            buyer_id = %buyer_id,
            agent_id = %agent_id,
            payout = %split.payout,
            fee = %split.fee,
            balance = %balance,
            "Settlement complete"
        );
        self.checkpoint().await?;
        Ok(split)
    }

    // ---- agents & owners -------------------------------------------------

    /// Return the agent, creating it with a fresh managed wallet if unknown.
    /// The flag is true when the agent was created by this call.
    pub async fn get_or_create_agent(&self, agent_id: &str) -> Result<(Agent, bool)> {
        let (agent, created) = {
            let _commit = self.commit_gate.read().await;
            self.provision_agent(agent_id).await?
        };
        if created {
            self.checkpoint().await?;
        }
        Ok((agent, created))
    }

    async fn provision_agent(&self, agent_id: &str) -> Result<(Agent, bool)> {
        let wallets = self.wallets.clone();
        let id = agent_id.to_string();
        let (agent, created) = self
            .agents
            .get_or_create_agent(
                agent_id,
                Box::new(move || {
                    let wallet = wallets.create_wallet()?;
                    Ok(Agent::provision(id, wallet))
                }),
            )
            .await?;

        if created {
            tracing::info!(
                agent_id = %agent.agent_id,
                wallet = %agent.wallet_address,
                "New agent registered with managed wallet"
            );
        }
        Ok((agent, created))
    }

    pub async fn register_owner(&self, request: NewOwner) -> Result<Owner> {
        let owner_id = request.owner_id.trim();
        if owner_id.is_empty() {
            return Err(RelayError::MissingField("owner_id"));
        }
        let username = request.username.trim();
        if username.is_empty() {
            return Err(RelayError::MissingField("username"));
        }

        let mut owner = Owner::new(owner_id, username)
            .with_twitter_handle(non_blank(request.twitter_handle));
        owner.avatar_url = non_blank(request.avatar_url);
        {
            let _commit = self.commit_gate.read().await;
            self.owners.insert_owner(owner.clone()).await?;
        }
        tracing::info!(owner_id = %owner.owner_id, "Owner registered");
        self.checkpoint().await?;
        Ok(owner)
    }

    /// Bind a ghost agent to an owner. Adopting an agent twice by the same owner is a no-op.
    pub async fn adopt_agent(&self, agent_id: &str, owner_id: &str) -> Result<Agent> {
        if self.owners.get_owner(owner_id).await?.is_none() {
            return Err(RelayError::OwnerNotFound(owner_id.to_string()));
        }

        let new_owner = owner_id.to_string();
        let commit = self.commit_gate.read().await;
        let agent = self
            .agents
            .update_agent(
                agent_id,
                Box::new(move |agent: &mut Agent| {
                    match agent.owner_id.as_deref() {
                        Some(current) if current == new_owner => {}
                        Some(_) => {
                            return Err(RelayError::forbidden(
                                "Agent already adopted by another owner",
                            ));
                        }
                        None => agent.adopt(new_owner),
                    }
                    Ok(())
                }),
            )
            .await?;
        drop(commit);

        tracing::info!(agent_id = %agent_id, owner_id = %owner_id, "Agent adopted");
        self.checkpoint().await?;
        Ok(agent)
    }

    // ---- reads -----------------------------------------------------------

    pub async fn list_jobs(&self) -> Result<Vec<Job>> {
        self.jobs.list_jobs().await
    }

    pub async fn get_job(&self, task_id: Uuid) -> Result<Job> {
        self.jobs
            .get_job(task_id)
            .await?
            .ok_or_else(|| RelayError::JobNotFound(task_id.to_string()))
    }

    pub async fn get_agent(&self, agent_id: &str) -> Result<Agent> {
        self.agents
            .get_agent(agent_id)
            .await?
            .ok_or_else(|| RelayError::AgentNotFound(agent_id.to_string()))
    }

    /// Agent balance, zero for agents never seen.
    pub async fn balance(&self, agent_id: &str) -> Result<Decimal> {
        Ok(self
            .agents
            .get_agent(agent_id)
            .await?
            .map(|a| a.balance)
            .unwrap_or(Decimal::ZERO))
    }

    pub async fn ledger_for_task(&self, task_id: Uuid) -> Result<Vec<LedgerEntry>> {
        self.get_job(task_id).await?;
        self.ledger.query_by_task(task_id).await
    }

    pub fn decrypt_privkey(&self, agent: &Agent) -> Result<String> {
        self.wallets.decrypt_privkey(&agent.encrypted_privkey)
    }

    // ---- persistence -----------------------------------------------------

    async fn capture(&self) -> Result<StoreSnapshot> {
        Ok(StoreSnapshot {
            owners: self.owners.list_owners().await?,
            agents: self.agents.list_agents().await?,
            jobs: self.jobs.list_jobs().await?,
            ledger_entries: self.ledger.all_entries().await?,
        })
    }

    async fn checkpoint(&self) -> Result<()> {
        let Some(file_store) = &self.persistence else {
            return Ok(());
        };
        let _exclusive = self.commit_gate.write().await;
        let snapshot = self.capture().await?;
        file_store.save(&snapshot).inspect_err(|e| {
            tracing::error!(error = %e, "Failed to checkpoint relay state");
        })
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn ensure_claimable(status: JobStatus) -> Result<()> {
    match status {
        JobStatus::Funded => Ok(()),
        JobStatus::Posted => Err(RelayError::forbidden("Job not yet funded")),
        other => Err(RelayError::forbidden(format!("Job already {other}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::collections::HashSet;
    use synai_ledger::TransactionType;
    use synai_types::ErrorKind;
    use synai_wallet::WalletManager;

    fn job_request(title: &str, price: serde_json::Value) -> NewJob {
        NewJob {
            title: Some(title.into()),
            price,
            buyer_id: Some("BOSS".into()),
            ..NewJob::default()
        }
    }

    fn engine() -> SettlementEngine {
        SettlementEngine::in_memory(Arc::new(WalletManager::from_key([9u8; 32])))
    }

    async fn posted(engine: &SettlementEngine, price: serde_json::Value) -> Uuid {
        engine
            .post(job_request("Text Summarization Task", price))
            .await
            .unwrap()
            .task_id
    }

    async fn submitted(engine: &SettlementEngine, agent: &str) -> Uuid {
        let id = posted(engine, serde_json::json!(1.0)).await;
        engine.fund(id, Some("0xabc")).await.unwrap();
        engine.claim(id, agent).await.unwrap();
        engine
            .submit(id, agent, serde_json::json!("x"))
            .await
            .unwrap();
        id
    }

    #[tokio::test]
    async fn test_full_settlement_scenario() {
        let engine = engine();
        let id = posted(&engine, serde_json::json!(1.0)).await;

        let funded = engine.fund(id, Some("0xabc")).await.unwrap();
        assert_eq!(funded.status, JobStatus::Funded);
        assert_eq!(funded.escrow_tx_hash.as_deref(), Some("0xabc"));

        let claimed = engine.claim(id, "A1").await.unwrap();
        assert_eq!(claimed.status, JobStatus::Claimed);
        assert_eq!(claimed.claimed_by.as_deref(), Some("A1"));

        engine.submit(id, "A1", serde_json::json!("x")).await.unwrap();
        let balance_before = engine.balance("A1").await.unwrap();

        let split = engine.confirm(id, "BOSS", "S").await.unwrap();
        assert_eq!(split.payout, dec!(0.8));
        assert_eq!(split.fee, dec!(0.2));

        let job = engine.get_job(id).await.unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.signature.as_deref(), Some("S"));
        assert_eq!(job.result, Some(serde_json::json!("x")));
        assert_eq!(engine.balance("A1").await.unwrap() - balance_before, dec!(0.8));

        let entries = engine.ledger_for_task(id).await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].transaction_type, TransactionType::TaskPayout);
        assert_eq!(entries[0].target_id, "A1");
        assert_eq!(entries[1].transaction_type, TransactionType::PlatformFee);
        assert_eq!(entries[1].target_id, "platform_admin");
    }

    #[tokio::test]
    async fn test_post_defaults_and_validation() {
        let engine = engine();
        let job = engine
            .post(NewJob {
                price: serde_json::json!("2"),
                ..NewJob::default()
            })
            .await
            .unwrap();
        assert_eq!(job.title, "Untitled Task");
        assert_eq!(job.buyer_id, "unknown");
        assert_eq!(job.envelope, serde_json::json!({}));
        assert_eq!(job.status, JobStatus::Posted);

        for bad in [serde_json::json!(-1), serde_json::json!("ten"), serde_json::Value::Null] {
            let err = engine.post(job_request("t", bad)).await.unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Validation);
        }
        assert_eq!(engine.list_jobs().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_fund_errors() {
        let engine = engine();
        let err = engine.fund(Uuid::new_v4(), Some("0x1")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let id = posted(&engine, serde_json::json!(1)).await;
        for hash in [None, Some(""), Some("   ")] {
            let err = engine.fund(id, hash).await.unwrap_err();
            assert!(matches!(err, RelayError::MissingField("escrow_tx_hash")));
        }
        assert_eq!(engine.get_job(id).await.unwrap().status, JobStatus::Posted);

        engine.fund(id, Some("0x1")).await.unwrap();
        let err = engine.fund(id, Some("0x2")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(
            engine.get_job(id).await.unwrap().escrow_tx_hash.as_deref(),
            Some("0x1")
        );
    }

    #[tokio::test]
    async fn test_claim_requires_funded() {
        let engine = engine();
        let err = engine.claim(Uuid::new_v4(), "A1").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let id = posted(&engine, serde_json::json!(1)).await;
        let err = engine.claim(id, "A1").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);
        assert_eq!(engine.get_job(id).await.unwrap().status, JobStatus::Posted);
        // A rejected claim must not provision the agent.
        assert!(engine.get_agent("A1").await.is_err());

        engine.fund(id, Some("0x1")).await.unwrap();
        engine.claim(id, "A1").await.unwrap();
        let err = engine.claim(id, "A2").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);
        let job = engine.get_job(id).await.unwrap();
        assert_eq!(job.status, JobStatus::Claimed);
        assert_eq!(job.claimed_by.as_deref(), Some("A1"));
    }

    #[tokio::test]
    async fn test_claim_provisions_unknown_agent_once() {
        let engine = engine();
        let (existing, _) = engine.get_or_create_agent("OLD").await.unwrap();

        let id = posted(&engine, serde_json::json!(1)).await;
        engine.fund(id, Some("0x1")).await.unwrap();
        engine.claim(id, "NEW_AGENT").await.unwrap();

        let agents = engine.agents().list_agents().await.unwrap();
        assert_eq!(agents.len(), 2);
        let created = engine.get_agent("NEW_AGENT").await.unwrap();
        assert_eq!(created.balance, Decimal::ZERO);
        assert!(created.is_ghost);
        assert_eq!(created.name, "Agent_NEW_AG");
        assert_ne!(created.wallet_address, existing.wallet_address);

        let privkey = engine.decrypt_privkey(&created).unwrap();
        assert_eq!(privkey.len(), 64);

        let (again, was_created) = engine.get_or_create_agent("NEW_AGENT").await.unwrap();
        assert!(!was_created);
        assert_eq!(again.wallet_address, created.wallet_address);
    }

    #[tokio::test]
    async fn test_submit_by_other_agent_rejected() {
        let engine = engine();
        let id = posted(&engine, serde_json::json!(1)).await;
        engine.fund(id, Some("0x1")).await.unwrap();
        engine.claim(id, "A1").await.unwrap();

        let err = engine
            .submit(id, "A2", serde_json::json!("stolen"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);
        let job = engine.get_job(id).await.unwrap();
        assert_eq!(job.status, JobStatus::Claimed);
        assert!(job.result.is_none());

        let err = engine
            .submit(Uuid::new_v4(), "A1", serde_json::json!("x"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);
    }

    #[tokio::test]
    async fn test_submit_twice_rejected() {
        let engine = engine();
        let id = submitted(&engine, "A1").await;
        let err = engine
            .submit(id, "A1", serde_json::json!("again"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);
        assert_eq!(
            engine.get_job(id).await.unwrap().result,
            Some(serde_json::json!("x"))
        );
    }

    #[tokio::test]
    async fn test_confirm_is_not_idempotent() {
        let engine = engine();
        let id = submitted(&engine, "A1").await;

        engine.confirm(id, "BOSS", "S").await.unwrap();
        let err = engine.confirm(id, "BOSS", "S").await.unwrap_err();
        assert!(matches!(
            err,
            RelayError::InvalidStateTransition {
                from: JobStatus::Completed,
                ..
            }
        ));
        assert_eq!(engine.balance("A1").await.unwrap(), dec!(0.8));
        assert_eq!(engine.ledger().all_entries().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_confirm_with_empty_signature() {
        let engine = engine();
        let id = submitted(&engine, "A1").await;

        let err = engine.confirm(id, "BOSS", "").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(engine.get_job(id).await.unwrap().status, JobStatus::Submitted);
        assert_eq!(engine.balance("A1").await.unwrap(), Decimal::ZERO);
        assert!(engine.ledger().all_entries().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_confirm_by_wrong_buyer() {
        let engine = engine();
        let id = submitted(&engine, "A1").await;

        let err = engine.confirm(id, "IMPOSTOR", "S").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);
        let err = engine.confirm(Uuid::new_v4(), "BOSS", "S").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);
        assert_eq!(engine.get_job(id).await.unwrap().status, JobStatus::Submitted);
    }

    #[tokio::test]
    async fn test_confirm_before_submit_is_wrong_state() {
        let engine = engine();
        let id = posted(&engine, serde_json::json!(1)).await;
        engine.fund(id, Some("0x1")).await.unwrap();
        engine.claim(id, "A1").await.unwrap();

        let err = engine.confirm(id, "BOSS", "S").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(engine.get_job(id).await.unwrap().status, JobStatus::Claimed);
    }

    #[tokio::test]
    async fn test_split_is_exact_for_odd_prices() {
        let engine = engine();
        let id = posted(&engine, serde_json::json!("3.333333")).await;
        engine.fund(id, Some("0x1")).await.unwrap();
        engine.claim(id, "A1").await.unwrap();
        engine.submit(id, "A1", serde_json::json!({"summary": "ok"})).await.unwrap();

        let split = engine.confirm(id, "BOSS", "S").await.unwrap();
        assert_eq!(split.fee, dec!(0.6666666));
        assert_eq!(split.payout, dec!(2.6666664));
        assert_eq!(split.fee + split.payout, dec!(3.333333));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_claims_have_one_winner() {
        let engine = engine();
        let id = posted(&engine, serde_json::json!(1)).await;
        engine.fund(id, Some("0x1")).await.unwrap();

        let mut handles = Vec::new();
        for i in 0..16 {
            let engine = engine.clone();
            handles.push(tokio::spawn(async move {
                engine.claim(id, &format!("racer-{i}")).await
            }));
        }

        let mut winners = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => winners += 1,
                Err(e) => assert_eq!(e.kind(), ErrorKind::Forbidden),
            }
        }
        assert_eq!(winners, 1);

        // Losing racers leave no agents behind.
        let agents = engine.agents().list_agents().await.unwrap();
        assert_eq!(agents.len(), 1);
        let job = engine.get_job(id).await.unwrap();
        assert_eq!(job.claimed_by.as_deref(), Some(agents[0].agent_id.as_str()));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_confirms_settle_once() {
        let engine = engine();
        let id = submitted(&engine, "A1").await;

        let mut handles = Vec::new();
        for _ in 0..8 {
            let engine = engine.clone();
            handles.push(tokio::spawn(
                async move { engine.confirm(id, "BOSS", "S").await },
            ));
        }
        let successes = futures_ok(handles).await;
        assert_eq!(successes, 1);
        assert_eq!(engine.balance("A1").await.unwrap(), dec!(0.8));
        assert_eq!(engine.ledger().all_entries().await.unwrap().len(), 2);
    }

    async fn futures_ok<T>(handles: Vec<tokio::task::JoinHandle<Result<T>>>) -> usize {
        let mut ok = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                ok += 1;
            }
        }
        ok
    }

    #[tokio::test]
    async fn test_distinct_wallets_across_agents() {
        let engine = engine();
        let mut addresses = HashSet::new();
        for i in 0..10 {
            let (agent, created) = engine.get_or_create_agent(&format!("agent-{i}")).await.unwrap();
            assert!(created);
            addresses.insert(agent.wallet_address);
        }
        assert_eq!(addresses.len(), 10);
    }

    #[tokio::test]
    async fn test_adoption() {
        let engine = engine();
        engine.get_or_create_agent("A1").await.unwrap();

        let err = engine.adopt_agent("A1", "nobody").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        engine
            .register_owner(NewOwner {
                owner_id: "o1".into(),
                username: "alice".into(),
                twitter_handle: Some("@alice".into()),
                avatar_url: None,
            })
            .await
            .unwrap();
        engine
            .register_owner(NewOwner {
                owner_id: "o2".into(),
                username: "bob".into(),
                twitter_handle: None,
                avatar_url: None,
            })
            .await
            .unwrap();

        let agent = engine.adopt_agent("A1", "o1").await.unwrap();
        assert!(!agent.is_ghost);
        assert_eq!(agent.owner_id.as_deref(), Some("o1"));
        let adopted_at = agent.adopted_at;

        let again = engine.adopt_agent("A1", "o1").await.unwrap();
        assert_eq!(again.adopted_at, adopted_at);

        let err = engine.adopt_agent("A1", "o2").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);

        let err = engine.adopt_agent("missing", "o1").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_register_owner_validation() {
        let engine = engine();
        let err = engine
            .register_owner(NewOwner {
                owner_id: " ".into(),
                username: "alice".into(),
                twitter_handle: None,
                avatar_url: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, RelayError::MissingField("owner_id")));
    }

    #[tokio::test]
    async fn test_balance_of_unknown_agent_is_zero() {
        let engine = engine();
        assert_eq!(engine.balance("never-seen").await.unwrap(), Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_state_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let wallets: Arc<dyn WalletIssuer> = Arc::new(WalletManager::from_key([9u8; 32]));

        let id = {
            let engine =
                SettlementEngine::open(FileStore::new(dir.path()), wallets.clone()).unwrap();
            let id = submitted(&engine, "A1").await;
            engine.confirm(id, "BOSS", "S").await.unwrap();
            id
        };

        let reopened = SettlementEngine::open(FileStore::new(dir.path()), wallets).unwrap();
        let job = reopened.get_job(id).await.unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(reopened.balance("A1").await.unwrap(), dec!(0.8));

        let agent = reopened.get_agent("A1").await.unwrap();
        assert!(reopened.decrypt_privkey(&agent).is_ok());

        let next = submitted(&reopened, "A1").await;
        reopened.confirm(next, "BOSS", "S").await.unwrap();
        let ids: Vec<u64> = reopened
            .ledger()
            .all_entries()
            .await
            .unwrap()
            .iter()
            .map(|e| e.id)
            .collect();
        assert_eq!(ids, vec![1, 2, 3, 4]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_mutations_all_reach_disk() {
        let dir = tempfile::tempdir().unwrap();
        let wallets: Arc<dyn WalletIssuer> = Arc::new(WalletManager::from_key([9u8; 32]));
        let engine = SettlementEngine::open(FileStore::new(dir.path()), wallets.clone()).unwrap();

        let mut handles = Vec::new();
        for i in 0..24 {
            let engine = engine.clone();
            handles.push(tokio::spawn(async move {
                let agent = format!("worker-{}", i % 4);
                let id = submitted(&engine, &agent).await;
                engine.confirm(id, "BOSS", "S").await.map(|_| ())
            }));
        }
        for i in 0..24 {
            let engine = engine.clone();
            handles.push(tokio::spawn(async move {
                engine
                    .post(job_request(&format!("extra-{i}"), serde_json::json!(1)))
                    .await
                    .map(|_| ())
            }));
        }
        assert_eq!(futures_ok(handles).await, 48);

        let reopened = SettlementEngine::open(FileStore::new(dir.path()), wallets).unwrap();
        let live = engine.list_jobs().await.unwrap();
        let restored = reopened.list_jobs().await.unwrap();
        assert_eq!(live.len(), 48);
        assert_eq!(restored.len(), live.len());

        let completed = restored
            .iter()
            .filter(|j| j.status == JobStatus::Completed)
            .count();
        assert_eq!(completed, 24);
        assert_eq!(reopened.ledger().all_entries().await.unwrap().len(), 48);
        for i in 0..4 {
            let agent = format!("worker-{i}");
            assert_eq!(reopened.balance(&agent).await.unwrap(), dec!(4.8));
        }
    }
}
