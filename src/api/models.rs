use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::invoice::InvoiceRecord;
use crate::treasury::RebalanceAction;

// ========== RESPONSE MODELS ==========

#[derive(Debug, Serialize)]
pub struct InvoiceResponse {
    pub id: Uuid,
    pub vendor_name: String,
    pub invoice_number: String,
    pub due_date: String,
    pub amount_owed: Decimal,
    pub state: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheduled_for: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<InvoiceRecord> for InvoiceResponse {
    fn from(record: InvoiceRecord) -> Self {
        Self {
            id: record.id,
            vendor_name: record.vendor_name,
            invoice_number: record.invoice_number,
            due_date: record.due_date,
            amount_owed: record.amount_owed,
            state: record.state.as_str().to_string(),
            failure_reason: record.failure_reason.map(|r| r.as_str().to_string()),
            scheduled_for: record.scheduled_for,
            tx_hash: record.tx_hash,
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct InvoiceListResponse {
    pub invoices: Vec<InvoiceResponse>,
    pub total: usize,
}

#[derive(Debug, Serialize)]
pub struct StateCounts {
    pub received: usize,
    pub scheduled: usize,
    pub paid: usize,
    pub failed: usize,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub uptime_seconds: i64,
    pub pending_jobs: usize,
    pub invoices: StateCounts,
}

#[derive(Debug, Serialize)]
pub struct PlannedActionResponse {
    pub action: String,
    pub amount: Decimal,
}

impl From<RebalanceAction> for PlannedActionResponse {
    fn from(action: RebalanceAction) -> Self {
        match action {
            RebalanceAction::DepositExcess(amount) => Self {
                action: "deposit_excess".to_string(),
                amount,
            },
            RebalanceAction::WithdrawShortfall(amount) => Self {
                action: "withdraw_shortfall".to_string(),
                amount,
            },
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TreasuryResponse {
    pub operating_balance: Decimal,
    pub keep_threshold: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub planned_action: Option<PlannedActionResponse>,
}
