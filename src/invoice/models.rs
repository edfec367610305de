use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use rust_decimal::Decimal;

/// Invoice lifecycle state
///
/// Transitions: Received -> Scheduled -> Paid | Failed, plus Received -> Failed
/// for records that never become schedulable. Paid and Failed are terminal;
/// a record never re-enters Scheduled once it has left it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvoiceState {
    Received,
    Scheduled,
    Paid,
    Failed,
}

impl InvoiceState {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceState::Received => "received",
            InvoiceState::Scheduled => "scheduled",
            InvoiceState::Paid => "paid",
            InvoiceState::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, InvoiceState::Paid | InvoiceState::Failed)
    }
}

impl fmt::Display for InvoiceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Why a record reached Failed. Surfaced on the status API for manual review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    ExtractionFailed,
    ValidationFailed,
    InvalidDueDate,
    GatewayError,
}

impl FailureReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureReason::ExtractionFailed => "extraction_failed",
            FailureReason::ValidationFailed => "validation_failed",
            FailureReason::InvalidDueDate => "invalid_due_date",
            FailureReason::GatewayError => "gateway_error",
        }
    }
}

/// One extracted payment obligation and its lifecycle.
///
/// Records are never deleted; the store doubles as the audit trail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceRecord {
    pub id: Uuid,
    pub vendor_name: String,
    /// Unique key within the store.
    pub invoice_number: String,
    /// Payment address resolved from the vendor allow-list at intake.
    pub vendor_address: Option<String>,
    /// Raw ISO-8601 calendar date as reported by the extraction collaborator.
    /// Parsed by the scheduler, kept raw here for auditability.
    pub due_date: String,
    pub amount_owed: Decimal,
    pub state: InvoiceState,
    pub failure_reason: Option<FailureReason>,
    /// Fire instant of the payment job, set when the record enters Scheduled.
    pub scheduled_for: Option<DateTime<Utc>>,
    /// Transaction hash of the executed payment.
    pub tx_hash: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl InvoiceRecord {
    pub fn received(
        vendor_name: String,
        invoice_number: String,
        vendor_address: String,
        due_date: String,
        amount_owed: Decimal,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            vendor_name,
            invoice_number,
            vendor_address: Some(vendor_address),
            due_date,
            amount_owed,
            state: InvoiceState::Received,
            failure_reason: None,
            scheduled_for: None,
            tx_hash: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// A record that died at the intake boundary. Kept for the audit trail
    /// even though it will never be scheduled.
    pub fn dead_on_arrival(
        vendor_name: String,
        invoice_number: String,
        due_date: String,
        amount_owed: Decimal,
        reason: FailureReason,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            vendor_name,
            invoice_number,
            vendor_address: None,
            due_date,
            amount_owed,
            state: InvoiceState::Failed,
            failure_reason: Some(reason),
            scheduled_for: None,
            tx_hash: None,
            created_at: now,
            updated_at: now,
        }
    }
}
