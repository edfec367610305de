// Payment Scheduler - turns a received invoice into a time-triggered,
// exactly-once payment.
//
// One live timer per invoice number, owned by this scheduler through an
// explicit job handle. A fired timer re-checks the record's state before
// acting, so cancellation racing its own fire degrades to a no-op.

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::error::{AppResult, GatewayError, ScheduleError};
use crate::gateway::{ExecutionGateway, TxHash};
use crate::invoice::{FailureReason, InvoiceRepository, InvoiceState};
use crate::time::Clock;

/// Outcome of a schedule computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// A one-shot timer fires at the contained instant.
    ScheduleForLater(DateTime<Utc>),
    /// The due date is inside the buffer window (or past); pay now.
    ExecuteImmediately,
}

/// One registered payment timer.
pub struct ScheduledJob {
    pub fire_at: DateTime<Utc>,
    handle: JoinHandle<()>,
}

/// Compute when an invoice should be paid.
///
/// `fire_at` is the due date at 00:00 UTC minus the buffer. An invoice due
/// within the buffer window is never silently deferred past its due date:
/// anything with `fire_at <= now` executes immediately.
pub fn decide(due_date: NaiveDate, now: DateTime<Utc>, buffer_days: i64) -> Decision {
    let due_midnight = Utc.from_utc_datetime(&due_date.and_hms_opt(0, 0, 0).unwrap());
    let fire_at = due_midnight - Duration::days(buffer_days);

    if fire_at > now {
        Decision::ScheduleForLater(fire_at)
    } else {
        Decision::ExecuteImmediately
    }
}

pub struct PaymentScheduler {
    buffer_days: i64,
    repo: Arc<InvoiceRepository>,
    gateway: Arc<dyn ExecutionGateway>,
    clock: Arc<dyn Clock>,
    jobs: Arc<Mutex<HashMap<String, ScheduledJob>>>,
}

impl PaymentScheduler {
    pub fn new(
        buffer_days: i64,
        repo: Arc<InvoiceRepository>,
        gateway: Arc<dyn ExecutionGateway>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            buffer_days,
            repo,
            gateway,
            clock,
            jobs: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Schedule payment for a received invoice.
    ///
    /// Idempotent per invoice number: a repeat call while a job is pending
    /// (or after the record left Received) is a no-op and never registers a
    /// second timer.
    pub async fn schedule(&self, invoice_number: &str) -> AppResult<Decision> {
        if let Some(existing) = self.job_fire_at(invoice_number) {
            info!(
                "Invoice {} already has a pending job for {}, ignoring",
                invoice_number, existing
            );
            return Ok(Decision::ScheduleForLater(existing));
        }

        let record = self.repo.get(invoice_number).await?;

        if record.state != InvoiceState::Received {
            if record.state == InvoiceState::Scheduled {
                // Scheduled but no job in this process; treat like the
                // pending-job case rather than racing a second timer.
                let fire_at = record.scheduled_for.unwrap_or_else(|| self.clock.now());
                return Ok(Decision::ScheduleForLater(fire_at));
            }
            return Err(ScheduleError::NotSchedulable {
                invoice_number: invoice_number.to_string(),
                state: record.state.to_string(),
            }
            .into());
        }

        let now = self.clock.now();

        let due_date: NaiveDate = match record.due_date.parse() {
            Ok(date) => date,
            Err(_) => {
                warn!(
                    "Invoice {} has unusable due date {:?}",
                    invoice_number, record.due_date
                );
                self.repo
                    .mark_failed(invoice_number, FailureReason::InvalidDueDate, now)
                    .await?;
                return Err(ScheduleError::InvalidDueDate {
                    invoice_number: invoice_number.to_string(),
                    raw: record.due_date,
                }
                .into());
            }
        };

        let decision = decide(due_date, now, self.buffer_days);

        match decision {
            Decision::ScheduleForLater(fire_at) => {
                self.repo.mark_scheduled(invoice_number, fire_at, now).await?;
                self.register_job(invoice_number, fire_at);
                info!(
                    "Payment for invoice {} scheduled for {}",
                    invoice_number, fire_at
                );
            }
            Decision::ExecuteImmediately => {
                info!(
                    "Due date for invoice {} is within the {}-day buffer, paying now",
                    invoice_number, self.buffer_days
                );
                self.repo.mark_scheduled(invoice_number, now, now).await?;
                execute_payment(&self.repo, &self.gateway, &self.clock, invoice_number).await;
            }
        }

        Ok(decision)
    }

    /// Cancel a pending payment job. Safe to call concurrently with its own
    /// fire; the record itself is untouched.
    pub fn cancel(&self, invoice_number: &str) {
        if let Some(job) = self.jobs.lock().remove(invoice_number) {
            job.handle.abort();
            info!("Cancelled payment job for invoice {}", invoice_number);
        }
    }

    pub fn pending_jobs(&self) -> usize {
        self.jobs.lock().len()
    }

    fn job_fire_at(&self, invoice_number: &str) -> Option<DateTime<Utc>> {
        self.jobs.lock().get(invoice_number).map(|j| j.fire_at)
    }

    fn register_job(&self, invoice_number: &str, fire_at: DateTime<Utc>) {
        let repo = self.repo.clone();
        let gateway = self.gateway.clone();
        let clock = self.clock.clone();
        let jobs = self.jobs.clone();
        let number = invoice_number.to_string();

        let handle = tokio::spawn(async move {
            clock.sleep_until(fire_at).await;

            // The record may have been cancelled or failed while the timer
            // was pending; only a still-Scheduled record gets paid.
            match repo.get(&number).await {
                Ok(record) if record.state == InvoiceState::Scheduled => {
                    info!("Executing scheduled payment for invoice {}", number);
                    execute_payment(&repo, &gateway, &clock, &number).await;
                }
                Ok(record) => {
                    info!(
                        "Timer for invoice {} fired but record is {}, skipping",
                        number, record.state
                    );
                }
                Err(_) => {
                    info!("Timer for invoice {} fired but record is gone, skipping", number);
                }
            }

            jobs.lock().remove(&number);
        });

        self.jobs.lock().insert(
            invoice_number.to_string(),
            ScheduledJob { fire_at, handle },
        );
    }
}

/// Execute the payment and settle the record into Paid or Failed.
/// Gateway failures are terminal; no retry, to avoid double-payment risk.
async fn execute_payment(
    repo: &Arc<InvoiceRepository>,
    gateway: &Arc<dyn ExecutionGateway>,
    clock: &Arc<dyn Clock>,
    invoice_number: &str,
) {
    let record = match repo.get(invoice_number).await {
        Ok(record) => record,
        Err(e) => {
            warn!("Payment for invoice {} aborted: {}", invoice_number, e);
            return;
        }
    };

    let result = match record.vendor_address.as_deref() {
        Some(address) => pay(gateway, address, record.amount_owed).await,
        None => Err(GatewayError::TransferFailed(
            "record has no vendor address".to_string(),
        )),
    };

    let now = clock.now();
    match result {
        Ok(tx_hash) => {
            info!("Invoice {} paid, tx {}", invoice_number, tx_hash);
            if let Err(e) = repo.mark_paid(invoice_number, tx_hash, now).await {
                warn!("Failed to record payment of {}: {}", invoice_number, e);
            }
        }
        Err(e) => {
            warn!("Payment for invoice {} failed: {}", invoice_number, e);
            if let Err(e) = repo
                .mark_failed(invoice_number, FailureReason::GatewayError, now)
                .await
            {
                warn!("Failed to record failure of {}: {}", invoice_number, e);
            }
        }
    }
}

/// Withdraw any shortfall from the yield pool, then transfer to the vendor.
/// The gateway serializes the underlying transactions.
async fn pay(
    gateway: &Arc<dyn ExecutionGateway>,
    to_address: &str,
    amount: Decimal,
) -> Result<TxHash, GatewayError> {
    let balance = gateway.get_balance().await?;
    if balance < amount {
        gateway.withdraw(amount - balance).await?;
    }
    gateway.transfer(to_address, amount).await
}
