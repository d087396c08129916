use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::RelayError;

/// Job lifecycle states. Transitions are linear and never reverse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Posted,
    Funded,
    Claimed,
    Submitted,
    Completed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Posted => "posted",
            JobStatus::Funded => "funded",
            JobStatus::Claimed => "claimed",
            JobStatus::Submitted => "submitted",
            JobStatus::Completed => "completed",
        }
    }

    /// Whether the job still counts as active work on the platform.
    pub fn is_active(&self) -> bool {
        !matches!(self, JobStatus::Completed)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Caller-triggered events that drive job state transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobEvent {
    Fund,
    Claim,
    Submit,
    Confirm,
}

impl JobStatus {
    /// Attempt a state transition given an event.
    /// Returns the new state or an error if the transition is invalid.
    pub fn transition(self, event: JobEvent) -> super::error::Result<JobStatus> {
        match (self, event) {
            (JobStatus::Posted, JobEvent::Fund) => Ok(JobStatus::Funded),
            (JobStatus::Funded, JobEvent::Claim) => Ok(JobStatus::Claimed),
            (JobStatus::Claimed, JobEvent::Submit) => Ok(JobStatus::Submitted),
            (JobStatus::Submitted, JobEvent::Confirm) => Ok(JobStatus::Completed),

            // No cancellation, dispute or rollback edges.
            (from, event) => Err(RelayError::InvalidStateTransition { from, event }),
        }
    }
}

/// A bounty task posted by a buyer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub task_id: Uuid,
    pub title: String,
    pub description: String,
    #[serde(with = "rust_decimal::serde::str")]
    pub price: Decimal,
    pub buyer_id: String,
    pub claimed_by: Option<String>,
    pub status: JobStatus,
    pub escrow_tx_hash: Option<String>,
    pub signature: Option<String>,
    /// Buyer-supplied verification metadata. Stored, never interpreted.
    pub envelope: serde_json::Value,
    pub result: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    pub fn new(
        title: impl Into<String>,
        description: impl Into<String>,
        price: Decimal,
        buyer_id: impl Into<String>,
        envelope: serde_json::Value,
    ) -> Self {
        let now = Utc::now();
        Self {
            task_id: Uuid::new_v4(),
            title: title.into(),
            description: description.into(),
            price,
            buyer_id: buyer_id.into(),
            claimed_by: None,
            status: JobStatus::Posted,
            escrow_tx_hash: None,
            signature: None,
            envelope,
            result: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Apply a state transition event.
    pub fn apply_event(&mut self, event: JobEvent) -> super::error::Result<()> {
        self.status = self.status.transition(event)?;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Compact view used by job listings.
    pub fn summary(&self) -> JobSummary {
        JobSummary {
            task_id: self.task_id,
            title: self.title.clone(),
            price: self.price,
            status: self.status,
            claimed_by: self.claimed_by.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JobSummary {
    pub task_id: Uuid,
    pub title: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    pub status: JobStatus,
    pub claimed_by: Option<String>,
}
