use axum::{
    extract::{Path, State},
    Json,
};
use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::api::models::*;
use crate::error::AppResult;
use crate::gateway::ExecutionGateway;
use crate::invoice::{InvoiceRepository, InvoiceState};
use crate::scheduler::PaymentScheduler;
use crate::treasury::TreasuryRebalancer;

#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<InvoiceRepository>,
    pub scheduler: Arc<PaymentScheduler>,
    pub rebalancer: Arc<TreasuryRebalancer>,
    pub gateway: Arc<dyn ExecutionGateway>,
    pub started_at: DateTime<Utc>,
}

/// GET / - liveness text, the original dashboard placeholder.
pub async fn root() -> &'static str {
    "SyncPay agent is running."
}

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> AppResult<Json<HealthResponse>> {
    let counts = state.repo.count_by_state().await;
    let by = |s: InvoiceState| counts.get(&s).copied().unwrap_or(0);

    Ok(Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: Utc::now(),
        uptime_seconds: Utc::now().signed_duration_since(state.started_at).num_seconds(),
        pending_jobs: state.scheduler.pending_jobs(),
        invoices: StateCounts {
            received: by(InvoiceState::Received),
            scheduled: by(InvoiceState::Scheduled),
            paid: by(InvoiceState::Paid),
            failed: by(InvoiceState::Failed),
        },
    }))
}

/// GET /api/v1/invoices
pub async fn list_invoices(State(state): State<AppState>) -> Json<InvoiceListResponse> {
    let invoices: Vec<InvoiceResponse> = state
        .repo
        .list()
        .await
        .into_iter()
        .map(InvoiceResponse::from)
        .collect();
    let total = invoices.len();
    Json(InvoiceListResponse { invoices, total })
}

/// GET /api/v1/invoices/:number
pub async fn get_invoice(
    State(state): State<AppState>,
    Path(invoice_number): Path<String>,
) -> AppResult<Json<InvoiceResponse>> {
    let record = state.repo.get(&invoice_number).await?;
    Ok(Json(record.into()))
}

/// GET /api/v1/treasury - balance snapshot plus what the next tick would do.
pub async fn treasury_status(
    State(state): State<AppState>,
) -> AppResult<Json<TreasuryResponse>> {
    let balance = state.gateway.get_balance().await?;
    let planned = state.rebalancer.preview(Utc::now()).await?;

    Ok(Json(TreasuryResponse {
        operating_balance: balance,
        keep_threshold: state.rebalancer.keep_threshold(),
        planned_action: planned.map(PlannedActionResponse::from),
    }))
}
