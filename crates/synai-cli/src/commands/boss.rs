use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::Result;
use serde_json::{Value, json};
use uuid::Uuid;

use synai_types::{JobStatus, JobSummary};

use crate::client::RelayClient;

pub const DEFAULT_BUYER_ID: &str = "BOSS_AGENT_001";

/// The demo summarization job.
pub fn summarization_job(buyer_id: &str) -> Value {
    json!({
        "title": "Text Summarization Task",
        "description": "Please summarize this sentence into 3 words: 'The artificial intelligence system demonstrated remarkable efficiency in processing complex datasets.'",
        "terms": { "price": 1.0 },
        "buyer_id": buyer_id,
        "envelope_json": {
            "payload": {
                "verification_regex": "^[\\w\\s]{1,50}$",
                "entrypoint": "summarizer.v1"
            }
        }
    })
}

/// Simulated escrow reference: `0x` plus 32 hex digits.
pub fn escrow_tx_hash() -> String {
    format!("0x{}", Uuid::new_v4().simple())
}

pub fn confirm_signature(task_id: Uuid, unix_secs: u64) -> String {
    format!("SIG_CONFIRM_{task_id}_{unix_secs}")
}

/// Submitted jobs that have a claimant to pay.
pub fn awaiting_confirmation(jobs: &[JobSummary]) -> Vec<&JobSummary> {
    jobs.iter()
        .filter(|j| j.status == JobStatus::Submitted && j.claimed_by.is_some())
        .collect()
}

/// `synai post`: post the demo job and fund it.
pub async fn post(client: &RelayClient, buyer_id: &str) -> Result<()> {
    println!("[BOSS] Posting new task...");
    let posted = client.post_job(&summarization_job(buyer_id)).await?;
    println!("[BOSS] Job posted. Task ID: {}", posted.task_id);

    let tx_hash = escrow_tx_hash();
    client.fund(posted.task_id, &tx_hash).await?;
    println!(
        "[BOSS] Task {} funded (escrow {tx_hash}) and open for agents.",
        posted.task_id
    );
    Ok(())
}

/// `synai confirm`: wait for submitted work, confirm one round of it, then exit.
pub async fn confirm(client: &RelayClient, buyer_id: &str, poll_interval: Duration) -> Result<()> {
    println!("[BOSS] {buyer_id} checking for submitted tasks...");
    loop {
        let jobs = match client.list_jobs().await {
            Ok(jobs) => jobs,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to list jobs");
                tokio::time::sleep(poll_interval).await;
                continue;
            }
        };

        let pending = awaiting_confirmation(&jobs);
        if pending.is_empty() {
            println!(
                "[BOSS] No tasks awaiting verification. Retrying in {}s...",
                poll_interval.as_secs()
            );
            tokio::time::sleep(poll_interval).await;
            continue;
        }

        for job in pending {
            let agent = job.claimed_by.as_deref().unwrap_or_default();
            println!("[BOSS] Verifying task {} submitted by {agent}...", job.task_id);
            let now = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or_default();
            match client
                .confirm(job.task_id, buyer_id, &confirm_signature(job.task_id, now))
                .await
            {
                Ok(settlement) => println!(
                    "[BOSS] Task {} confirmed. Payout: {} USDC, Fee: {} USDC.",
                    job.task_id, settlement.payout, settlement.fee
                ),
                Err(e) => println!("[BOSS] Confirmation of {} failed: {e}", job.task_id),
            }
        }
        return Ok(());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn summary(status: JobStatus, claimed_by: Option<&str>) -> JobSummary {
        JobSummary {
            task_id: Uuid::new_v4(),
            title: "t".into(),
            price: dec!(1),
            status,
            claimed_by: claimed_by.map(str::to_string),
        }
    }

    #[test]
    fn test_escrow_hash_shape() {
        let hash = escrow_tx_hash();
        assert!(hash.starts_with("0x"));
        assert_eq!(hash.len(), 34);
        assert!(hash[2..].chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_confirm_signature_format() {
        let id = Uuid::nil();
        assert_eq!(
            confirm_signature(id, 1700000000),
            "SIG_CONFIRM_00000000-0000-0000-0000-000000000000_1700000000"
        );
    }

    #[test]
    fn test_demo_job_payload() {
        let job = summarization_job(DEFAULT_BUYER_ID);
        assert_eq!(job["terms"]["price"], json!(1.0));
        assert_eq!(job["buyer_id"], "BOSS_AGENT_001");
        assert_eq!(
            job["envelope_json"]["payload"]["verification_regex"],
            "^[\\w\\s]{1,50}$"
        );
    }

    #[test]
    fn test_awaiting_confirmation_filter() {
        let jobs = vec![
            summary(JobStatus::Funded, None),
            summary(JobStatus::Submitted, Some("A1")),
            summary(JobStatus::Submitted, None),
            summary(JobStatus::Completed, Some("A2")),
        ];
        let pending = awaiting_confirmation(&jobs);
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].claimed_by.as_deref(), Some("A1"));
    }
}
