use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::HashMap;

use crate::error::{AppError, AppResult};
use crate::invoice::models::{FailureReason, InvoiceRecord, InvoiceState};

/// In-memory invoice record store, keyed by invoice number.
///
/// Records are mutated only by the scheduler and the execution-result path,
/// and only along the legal transitions; a terminal record is immutable.
pub struct InvoiceRepository {
    records: tokio::sync::RwLock<HashMap<String, InvoiceRecord>>,
}

impl InvoiceRepository {
    pub fn new() -> Self {
        Self {
            records: tokio::sync::RwLock::new(HashMap::new()),
        }
    }

    /// Insert a new record. If the invoice number is already known the
    /// existing record wins and is returned; intake is idempotent per key.
    pub async fn insert(&self, record: InvoiceRecord) -> InvoiceRecord {
        let mut records = self.records.write().await;
        records
            .entry(record.invoice_number.clone())
            .or_insert(record)
            .clone()
    }

    pub async fn get(&self, invoice_number: &str) -> AppResult<InvoiceRecord> {
        let records = self.records.read().await;
        records
            .get(invoice_number)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Invoice {}", invoice_number)))
    }

    pub async fn list(&self) -> Vec<InvoiceRecord> {
        let records = self.records.read().await;
        let mut all: Vec<InvoiceRecord> = records.values().cloned().collect();
        all.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        all
    }

    pub async fn count_by_state(&self) -> HashMap<InvoiceState, usize> {
        let records = self.records.read().await;
        let mut counts = HashMap::new();
        for record in records.values() {
            *counts.entry(record.state).or_insert(0) += 1;
        }
        counts
    }

    /// Received -> Scheduled, stamping the job's fire instant.
    pub async fn mark_scheduled(
        &self,
        invoice_number: &str,
        fire_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> AppResult<InvoiceRecord> {
        self.transition(invoice_number, InvoiceState::Received, now, |record| {
            record.state = InvoiceState::Scheduled;
            record.scheduled_for = Some(fire_at);
        })
        .await
    }

    /// Scheduled -> Paid with the executed transaction hash.
    pub async fn mark_paid(
        &self,
        invoice_number: &str,
        tx_hash: String,
        now: DateTime<Utc>,
    ) -> AppResult<InvoiceRecord> {
        self.transition(invoice_number, InvoiceState::Scheduled, now, |record| {
            record.state = InvoiceState::Paid;
            record.tx_hash = Some(tx_hash);
        })
        .await
    }

    /// Received|Scheduled -> Failed with a reason. Rejected on terminal records.
    pub async fn mark_failed(
        &self,
        invoice_number: &str,
        reason: FailureReason,
        now: DateTime<Utc>,
    ) -> AppResult<InvoiceRecord> {
        let mut records = self.records.write().await;
        let record = records
            .get_mut(invoice_number)
            .ok_or_else(|| AppError::NotFound(format!("Invoice {}", invoice_number)))?;

        if record.state.is_terminal() {
            return Err(AppError::InvalidInput(format!(
                "Invoice {} already terminal ({})",
                invoice_number, record.state
            )));
        }

        record.state = InvoiceState::Failed;
        record.failure_reason = Some(reason);
        record.updated_at = now;
        Ok(record.clone())
    }

    /// Total owed across Scheduled records whose fire instant is at or before
    /// `deadline`. Drives the rebalancer's withdraw-for-shortfall check.
    pub async fn scheduled_amount_due_by(&self, deadline: DateTime<Utc>) -> Decimal {
        let records = self.records.read().await;
        records
            .values()
            .filter(|r| r.state == InvoiceState::Scheduled)
            .filter(|r| r.scheduled_for.map(|at| at <= deadline).unwrap_or(false))
            .map(|r| r.amount_owed)
            .sum()
    }

    async fn transition<F>(
        &self,
        invoice_number: &str,
        expected: InvoiceState,
        now: DateTime<Utc>,
        apply: F,
    ) -> AppResult<InvoiceRecord>
    where
        F: FnOnce(&mut InvoiceRecord),
    {
        let mut records = self.records.write().await;
        let record = records
            .get_mut(invoice_number)
            .ok_or_else(|| AppError::NotFound(format!("Invoice {}", invoice_number)))?;

        if record.state != expected {
            return Err(AppError::InvalidInput(format!(
                "Invoice {} is {}, expected {}",
                invoice_number, record.state, expected
            )));
        }

        apply(record);
        record.updated_at = now;
        Ok(record.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn record(number: &str, amount: Decimal) -> InvoiceRecord {
        InvoiceRecord::received(
            "Acme Corp".to_string(),
            number.to_string(),
            "sei1vendor1".to_string(),
            "2025-08-30".to_string(),
            amount,
            Utc::now(),
        )
    }

    #[tokio::test]
    async fn test_full_lifecycle_to_paid() {
        let repo = InvoiceRepository::new();
        repo.insert(record("INV-1", dec!(500))).await;

        let now = Utc::now();
        let fire_at = now + chrono::Duration::days(8);
        let scheduled = repo.mark_scheduled("INV-1", fire_at, now).await.unwrap();
        assert_eq!(scheduled.state, InvoiceState::Scheduled);
        assert_eq!(scheduled.scheduled_for, Some(fire_at));

        let paid = repo
            .mark_paid("INV-1", "TXHASH".to_string(), now)
            .await
            .unwrap();
        assert_eq!(paid.state, InvoiceState::Paid);
        assert_eq!(paid.tx_hash.as_deref(), Some("TXHASH"));
    }

    #[tokio::test]
    async fn test_terminal_records_never_transition_again() {
        let repo = InvoiceRepository::new();
        repo.insert(record("INV-2", dec!(100))).await;

        let now = Utc::now();
        repo.mark_scheduled("INV-2", now, now).await.unwrap();
        repo.mark_failed("INV-2", FailureReason::GatewayError, now)
            .await
            .unwrap();

        // Scheduled again, paid, or failed again: all rejected.
        assert!(repo.mark_scheduled("INV-2", now, now).await.is_err());
        assert!(repo.mark_paid("INV-2", "TX".to_string(), now).await.is_err());
        assert!(repo
            .mark_failed("INV-2", FailureReason::GatewayError, now)
            .await
            .is_err());

        let stored = repo.get("INV-2").await.unwrap();
        assert_eq!(stored.state, InvoiceState::Failed);
        assert_eq!(stored.failure_reason, Some(FailureReason::GatewayError));
    }

    #[tokio::test]
    async fn test_paid_requires_scheduled_state() {
        let repo = InvoiceRepository::new();
        repo.insert(record("INV-3", dec!(100))).await;

        let result = repo.mark_paid("INV-3", "TX".to_string(), Utc::now()).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_insert_is_idempotent_per_invoice_number() {
        let repo = InvoiceRepository::new();
        let first = repo.insert(record("INV-4", dec!(100))).await;
        let second = repo.insert(record("INV-4", dec!(999))).await;
        assert_eq!(first.id, second.id);
        assert_eq!(second.amount_owed, dec!(100));
    }

    #[tokio::test]
    async fn test_scheduled_amount_due_by_window() {
        let repo = InvoiceRepository::new();
        let now = Utc::now();

        repo.insert(record("SOON", dec!(300))).await;
        repo.insert(record("LATER", dec!(700))).await;
        repo.insert(record("UNSCHEDULED", dec!(50))).await;

        repo.mark_scheduled("SOON", now + chrono::Duration::hours(6), now)
            .await
            .unwrap();
        repo.mark_scheduled("LATER", now + chrono::Duration::days(10), now)
            .await
            .unwrap();

        let upcoming = repo
            .scheduled_amount_due_by(now + chrono::Duration::hours(24))
            .await;
        assert_eq!(upcoming, dec!(300));
    }
}
