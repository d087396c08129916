use axum::{
    Json, Router,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use synai_ledger::{LedgerEntry, TransactionType};
use synai_reporting::Ranking;
use synai_settlement::{NewJob, NewOwner};
use synai_types::{AgentView, Job, JobStatus, JobSummary, Owner, RelayError};

use crate::error::ApiError;
use crate::state::AppState;

type ApiResult<T> = Result<Json<T>, ApiError>;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/jobs", post(create_job).get(list_jobs))
        .route("/jobs/{task_id}", get(get_job))
        .route("/jobs/{task_id}/fund", post(fund_job))
        .route("/jobs/{task_id}/claim", post(claim_job))
        .route("/jobs/{task_id}/submit", post(submit_job))
        .route("/jobs/{task_id}/confirm", post(confirm_job))
        .route("/jobs/{task_id}/ledger", get(task_ledger))
        .route("/ledger/ranking", get(ranking))
        .route("/ledger/{agent_id}", get(balance))
        .route("/owners", post(register_owner))
        .route("/agents/{agent_id}", get(get_agent))
        .route("/agents/{agent_id}/adopt", post(adopt_agent))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Unparseable ids can never name a job.
fn parse_task_id(raw: &str) -> Result<Uuid, RelayError> {
    Uuid::parse_str(raw).map_err(|_| RelayError::JobNotFound(raw.to_string()))
}

#[derive(Serialize)]
struct Health {
    status: &'static str,
    service: &'static str,
}

async fn health() -> Json<Health> {
    Json(Health {
        status: "healthy",
        service: "synai-relay",
    })
}

// ---- jobs ------------------------------------------------------------------

#[derive(Deserialize, Default)]
#[serde(default)]
struct Terms {
    price: Option<serde_json::Value>,
}

#[derive(Deserialize)]
struct CreateJobRequest {
    title: Option<String>,
    description: Option<String>,
    #[serde(default)]
    terms: Terms,
    buyer_id: Option<String>,
    envelope_json: Option<serde_json::Value>,
}

#[derive(Serialize)]
struct CreateJobResponse {
    status: JobStatus,
    task_id: Uuid,
}

async fn create_job(
    State(state): State<AppState>,
    body: Result<Json<CreateJobRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<CreateJobResponse>), ApiError> {
    let Json(req) = body?;
    let job = state
        .engine
        .post(NewJob {
            title: req.title,
            description: req.description,
            // An omitted price posts a free job.
            price: req.terms.price.unwrap_or_else(|| serde_json::json!(0)),
            buyer_id: req.buyer_id,
            envelope: req.envelope_json,
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(CreateJobResponse {
            status: job.status,
            task_id: job.task_id,
        }),
    ))
}

async fn list_jobs(State(state): State<AppState>) -> ApiResult<Vec<JobSummary>> {
    let jobs = state.engine.list_jobs().await?;
    Ok(Json(jobs.iter().map(Job::summary).collect()))
}

/// Full job record with the price as a JSON number.
#[derive(Serialize)]
struct JobDetail {
    task_id: Uuid,
    title: String,
    description: String,
    #[serde(with = "rust_decimal::serde::float")]
    price: Decimal,
    buyer_id: String,
    claimed_by: Option<String>,
    status: JobStatus,
    escrow_tx_hash: Option<String>,
    signature: Option<String>,
    envelope_json: serde_json::Value,
    result: Option<serde_json::Value>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<Job> for JobDetail {
    fn from(job: Job) -> Self {
        Self {
            task_id: job.task_id,
            title: job.title,
            description: job.description,
            price: job.price,
            buyer_id: job.buyer_id,
            claimed_by: job.claimed_by,
            status: job.status,
            escrow_tx_hash: job.escrow_tx_hash,
            signature: job.signature,
            envelope_json: job.envelope,
            result: job.result,
            created_at: job.created_at,
            updated_at: job.updated_at,
        }
    }
}

async fn get_job(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> ApiResult<JobDetail> {
    let job = state.engine.get_job(parse_task_id(&task_id)?).await?;
    Ok(Json(job.into()))
}

#[derive(Deserialize)]
struct FundRequest {
    escrow_tx_hash: Option<String>,
}

#[derive(Serialize)]
struct FundResponse {
    status: JobStatus,
    tx_hash: Option<String>,
}

async fn fund_job(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
    body: Result<Json<FundRequest>, JsonRejection>,
) -> ApiResult<FundResponse> {
    let task_id = parse_task_id(&task_id)?;
    let Json(req) = body?;
    let job = state
        .engine
        .fund(task_id, req.escrow_tx_hash.as_deref())
        .await?;
    Ok(Json(FundResponse {
        status: job.status,
        tx_hash: job.escrow_tx_hash,
    }))
}

#[derive(Serialize)]
struct MessageResponse {
    status: &'static str,
    message: String,
}

#[derive(Deserialize)]
struct ClaimRequest {
    #[serde(default)]
    agent_id: String,
}

async fn claim_job(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
    body: Result<Json<ClaimRequest>, JsonRejection>,
) -> ApiResult<MessageResponse> {
    let task_id = parse_task_id(&task_id)?;
    let Json(req) = body?;
    state.engine.claim(task_id, &req.agent_id).await?;
    Ok(Json(MessageResponse {
        status: "success",
        message: format!("Job claimed by {}", req.agent_id.trim()),
    }))
}

#[derive(Deserialize)]
struct SubmitRequest {
    #[serde(default)]
    agent_id: String,
    #[serde(default)]
    result: serde_json::Value,
}

async fn submit_job(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
    body: Result<Json<SubmitRequest>, JsonRejection>,
) -> ApiResult<MessageResponse> {
    let Json(req) = body?;
    let task_id = parse_task_id(&task_id)
        .map_err(|_| RelayError::forbidden("Unauthorized or not found"))?;
    state
        .engine
        .submit(task_id, &req.agent_id, req.result)
        .await?;
    Ok(Json(MessageResponse {
        status: "submitted",
        message: "Result pending verification".to_string(),
    }))
}

#[derive(Deserialize)]
struct ConfirmRequest {
    #[serde(default)]
    buyer_id: String,
    #[serde(default)]
    signature: String,
}

#[derive(Serialize)]
struct ConfirmResponse {
    status: &'static str,
    #[serde(with = "rust_decimal::serde::float")]
    payout: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    fee: Decimal,
}

async fn confirm_job(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
    body: Result<Json<ConfirmRequest>, JsonRejection>,
) -> ApiResult<ConfirmResponse> {
    let Json(req) = body?;
    let task_id = parse_task_id(&task_id).map_err(|_| RelayError::forbidden("Unauthorized"))?;
    let split = state
        .engine
        .confirm(task_id, &req.buyer_id, &req.signature)
        .await?;
    Ok(Json(ConfirmResponse {
        status: "success",
        payout: split.payout,
        fee: split.fee,
    }))
}

#[derive(Serialize)]
struct LedgerEntryView {
    id: u64,
    source_id: String,
    target_id: String,
    #[serde(with = "rust_decimal::serde::float")]
    amount: Decimal,
    transaction_type: TransactionType,
    task_id: Option<Uuid>,
    created_at: DateTime<Utc>,
}

impl From<LedgerEntry> for LedgerEntryView {
    fn from(entry: LedgerEntry) -> Self {
        Self {
            id: entry.id,
            source_id: entry.source_id,
            target_id: entry.target_id,
            amount: entry.amount,
            transaction_type: entry.transaction_type,
            task_id: entry.task_id,
            created_at: entry.created_at,
        }
    }
}

async fn task_ledger(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> ApiResult<Vec<LedgerEntryView>> {
    let entries = state
        .engine
        .ledger_for_task(parse_task_id(&task_id)?)
        .await?;
    Ok(Json(entries.into_iter().map(Into::into).collect()))
}

// ---- ledger ----------------------------------------------------------------

#[derive(Serialize)]
struct BalanceResponse {
    #[serde(with = "rust_decimal::serde::float")]
    balance: Decimal,
}

async fn balance(
    State(state): State<AppState>,
    Path(agent_id): Path<String>,
) -> ApiResult<BalanceResponse> {
    let balance = state.engine.balance(&agent_id).await?;
    Ok(Json(BalanceResponse { balance }))
}

async fn ranking(State(state): State<AppState>) -> ApiResult<Ranking> {
    Ok(Json(state.reporter.ranking().await?))
}

// ---- owners & agents -------------------------------------------------------

async fn register_owner(
    State(state): State<AppState>,
    body: Result<Json<NewOwner>, JsonRejection>,
) -> Result<(StatusCode, Json<Owner>), ApiError> {
    let Json(req) = body?;
    let owner = state.engine.register_owner(req).await?;
    Ok((StatusCode::CREATED, Json(owner)))
}

async fn get_agent(
    State(state): State<AppState>,
    Path(agent_id): Path<String>,
) -> ApiResult<AgentView> {
    Ok(Json(state.engine.get_agent(&agent_id).await?.view()))
}

#[derive(Deserialize)]
struct AdoptRequest {
    #[serde(default)]
    owner_id: String,
}

async fn adopt_agent(
    State(state): State<AppState>,
    Path(agent_id): Path<String>,
    body: Result<Json<AdoptRequest>, JsonRejection>,
) -> ApiResult<AgentView> {
    let Json(req) = body?;
    let agent = state.engine.adopt_agent(&agent_id, &req.owner_id).await?;
    Ok(Json(agent.view()))
}
