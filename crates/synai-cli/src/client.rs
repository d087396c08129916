use anyhow::{Context, Result, bail};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use uuid::Uuid;

use synai_reporting::Ranking;
use synai_types::JobSummary;

/// Thin JSON client for the relay REST API.
pub struct RelayClient {
    http: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
pub struct PostedJob {
    pub task_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct Settlement {
    #[serde(with = "rust_decimal::serde::float")]
    pub payout: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub fee: Decimal,
}

#[derive(Debug, Deserialize)]
struct Balance {
    #[serde(with = "rust_decimal::serde::float")]
    balance: Decimal,
}

impl RelayClient {
    pub fn new(base_url: &str) -> Result<Self> {
        let http = reqwest::Client::builder()
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    pub async fn list_jobs(&self) -> Result<Vec<JobSummary>> {
        self.get("/jobs").await
    }

    pub async fn post_job(&self, body: &Value) -> Result<PostedJob> {
        self.post("/jobs", body).await
    }

    pub async fn fund(&self, task_id: Uuid, escrow_tx_hash: &str) -> Result<Value> {
        self.post(
            &format!("/jobs/{task_id}/fund"),
            &json!({ "escrow_tx_hash": escrow_tx_hash }),
        )
        .await
    }

    pub async fn claim(&self, task_id: Uuid, agent_id: &str) -> Result<Value> {
        self.post(
            &format!("/jobs/{task_id}/claim"),
            &json!({ "agent_id": agent_id }),
        )
        .await
    }

    pub async fn submit(&self, task_id: Uuid, agent_id: &str, result: &Value) -> Result<Value> {
        self.post(
            &format!("/jobs/{task_id}/submit"),
            &json!({ "agent_id": agent_id, "result": result }),
        )
        .await
    }

    pub async fn confirm(&self, task_id: Uuid, buyer_id: &str, signature: &str) -> Result<Settlement> {
        self.post(
            &format!("/jobs/{task_id}/confirm"),
            &json!({ "buyer_id": buyer_id, "signature": signature }),
        )
        .await
    }

    pub async fn balance(&self, agent_id: &str) -> Result<Decimal> {
        let body: Balance = self.get(&format!("/ledger/{agent_id}")).await?;
        Ok(body.balance)
    }

    pub async fn ranking(&self) -> Result<Ranking> {
        self.get("/ledger/ranking").await
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.url(path);
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .with_context(|| format!("GET {url}"))?;
        decode(response).await
    }

    async fn post<T: DeserializeOwned>(&self, path: &str, body: &Value) -> Result<T> {
        let url = self.url(path);
        let response = self
            .http
            .post(&url)
            .json(body)
            .send()
            .await
            .with_context(|| format!("POST {url}"))?;
        decode(response).await
    }
}

async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
    let status = response.status();
    if !status.is_success() {
        let text = response.text().await.unwrap_or_default();
        bail!("relay returned {status}: {}", error_message(&text));
    }
    response
        .json::<T>()
        .await
        .context("Failed to decode relay response")
}

/// Pull `error` out of a relay error body, falling back to the raw text.
pub fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("error").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| body.to_string())
}
