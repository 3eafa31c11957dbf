use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Json;
use serde::{Deserialize, Serialize};
use tracing::info;

use drop_ledger::{Eligibility, LedgerError, PoolInfo};
use drop_types::{Assignment, Category, IdentityKeys};

use crate::error::ServerResult;
use crate::state::AppState;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ClaimRequest {
    #[serde(flatten)]
    pub keys: IdentityKeys,
    pub category: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ClaimResponse {
    pub already_claimed: bool,
    pub assignment: Assignment,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CheckResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignment: Option<Assignment>,
    pub eligibility: Eligibility,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AdminRequest {
    pub secret: String,
}

pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".into(),
        version: env!("CARGO_PKG_VERSION").into(),
    })
}

pub async fn info_handler(
    State(state): State<AppState>,
    Path(campaign): Path<String>,
) -> ServerResult<Json<PoolInfo>> {
    let partition = state.partition(&campaign)?;
    Ok(Json(partition.info().await?))
}

/// 200 with the assignment if the keys hold one, 404 otherwise. Both carry
/// the eligibility of every supplied key.
pub async fn check_handler(
    State(state): State<AppState>,
    Path(campaign): Path<String>,
    payload: Result<Json<IdentityKeys>, JsonRejection>,
) -> ServerResult<(StatusCode, Json<CheckResponse>)> {
    let partition = state.partition(&campaign)?;
    let Json(keys) = payload?;
    let outcome = partition.check(&keys).await?;
    let status = if outcome.assignment.is_some() {
        StatusCode::OK
    } else {
        StatusCode::NOT_FOUND
    };
    Ok((
        status,
        Json(CheckResponse {
            assignment: outcome.assignment,
            eligibility: outcome.eligibility,
        }),
    ))
}

pub async fn claim_handler(
    State(state): State<AppState>,
    Path(campaign): Path<String>,
    payload: Result<Json<ClaimRequest>, JsonRejection>,
) -> ServerResult<Json<ClaimResponse>> {
    let partition = state.partition(&campaign)?;
    let Json(request) = payload?;
    let category = Category::parse(&request.category).map_err(LedgerError::from)?;
    let outcome = partition.claim(&request.keys, &category).await?;
    Ok(Json(ClaimResponse {
        already_claimed: !outcome.is_new(),
        assignment: outcome.into_assignment(),
    }))
}

pub async fn reset_handler(
    State(state): State<AppState>,
    Path(campaign): Path<String>,
    payload: Result<Json<AdminRequest>, JsonRejection>,
) -> ServerResult<StatusCode> {
    let partition = state.partition(&campaign)?;
    let Json(request) = payload?;
    state.admin().verify(&request.secret)?;
    partition.reset().await?;
    info!(campaign = %campaign, "campaign reset by admin");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn resync_handler(
    State(state): State<AppState>,
    Path(campaign): Path<String>,
    payload: Result<Json<AdminRequest>, JsonRejection>,
) -> ServerResult<Json<PoolInfo>> {
    let partition = state.partition(&campaign)?;
    let Json(request) = payload?;
    state.admin().verify(&request.secret)?;
    let report = partition.resync().await?;
    info!(campaign = %campaign, available = report.available, revoked = report.revoked, "campaign resynced by admin");
    Ok(Json(partition.info().await?))
}
