use std::time::Duration;

use anyhow::Result;
use serde_json::json;

use synai_types::{JobStatus, JobSummary};

use crate::client::RelayClient;

pub const DEFAULT_AGENT_ID: &str = "WORKER_AGENT_X";

/// Canned answer to the summarization job.
pub const DEMO_RESULT: &str = "AI Processing Efficiency";

pub fn first_funded(jobs: &[JobSummary]) -> Option<&JobSummary> {
    jobs.iter().find(|j| j.status == JobStatus::Funded)
}

/// `synai work`: poll for a funded job, claim it, submit the result, exit.
pub async fn work(client: &RelayClient, agent_id: &str, poll_interval: Duration) -> Result<()> {
    println!("[WORKER] Agent {agent_id} online. Polling for tasks...");
    loop {
        let jobs = match client.list_jobs().await {
            Ok(jobs) => jobs,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to list jobs");
                tokio::time::sleep(poll_interval).await;
                continue;
            }
        };

        let Some(job) = first_funded(&jobs) else {
            println!(
                "[WORKER] No funded tasks found. Retrying in {}s...",
                poll_interval.as_secs()
            );
            tokio::time::sleep(poll_interval).await;
            continue;
        };
        println!("[WORKER] Found funded task: {} ({})", job.title, job.task_id);

        if let Err(e) = client.claim(job.task_id, agent_id).await {
            println!("[WORKER] Claim failed: {e}");
            tokio::time::sleep(poll_interval).await;
            continue;
        }
        println!("[WORKER] Task claimed. Submitting result: '{DEMO_RESULT}'");

        match client.submit(job.task_id, agent_id, &json!(DEMO_RESULT)).await {
            Ok(_) => {
                println!("[WORKER] Result submitted. Awaiting buyer confirmation.");
                return Ok(());
            }
            Err(e) => {
                println!("[WORKER] Submission failed: {e}");
                tokio::time::sleep(poll_interval).await;
            }
        }
    }
}
