// Invoice intake - acquisition boundary plus the recordInvoice pipeline.

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use uuid::Uuid;

use rust_decimal::Decimal;
use tracing::{info, warn};

use crate::time::Clock;
use crate::config::VendorAllowlist;
use crate::error::{AppResult, ExtractionError};
use crate::extraction::InvoiceExtractor;
use crate::invoice::{FailureReason, InvoiceRecord, InvoiceRepository, InvoiceState};

/// Invoice acquisition boundary. Email/cloud polling lives behind this trait;
/// the core only sees raw text blobs.
#[async_trait]
pub trait InvoiceSource: Send + Sync {
    async fn poll(&self) -> AppResult<Vec<String>>;
}

/// Source that consumes `*.txt` blobs dropped into a local inbox directory.
pub struct FsInboxSource {
    dir: PathBuf,
}

impl FsInboxSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

#[async_trait]
impl InvoiceSource for FsInboxSource {
    async fn poll(&self) -> AppResult<Vec<String>> {
        let mut blobs = Vec::new();

        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            // Missing inbox just means nothing to ingest yet.
            Err(_) => return Ok(blobs),
        };

        while let Ok(Some(entry)) = entries.next_entry().await {
            let path = entry.path();
            if path.extension().map(|e| e == "txt").unwrap_or(false) {
                match tokio::fs::read_to_string(&path).await {
                    Ok(text) => {
                        blobs.push(text);
                        if let Err(e) = tokio::fs::remove_file(&path).await {
                            warn!("Failed to consume inbox file {:?}: {}", path, e);
                        }
                    }
                    Err(e) => warn!("Failed to read inbox file {:?}: {}", path, e),
                }
            }
        }

        Ok(blobs)
    }
}

/// Turns raw invoice text into a stored record.
///
/// Every outcome lands in the store: a valid extraction becomes a Received
/// record, a collaborator or schema failure becomes a terminal Failed record
/// so the audit trail covers rejected intakes too.
pub struct IntakePipeline {
    extractor: Arc<dyn InvoiceExtractor>,
    vendors: VendorAllowlist,
    repo: Arc<InvoiceRepository>,
    clock: Arc<dyn Clock>,
}

impl IntakePipeline {
    pub fn new(
        extractor: Arc<dyn InvoiceExtractor>,
        vendors: VendorAllowlist,
        repo: Arc<InvoiceRepository>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            extractor,
            vendors,
            repo,
            clock,
        }
    }

    pub async fn record_invoice(&self, invoice_text: &str) -> AppResult<InvoiceRecord> {
        let now = self.clock.now();

        let extracted = match self.extractor.extract(invoice_text).await {
            Ok(extracted) => extracted,
            Err(e) => {
                warn!("Invoice extraction failed: {}", e);
                let reason = match e {
                    ExtractionError::Validation(_) => FailureReason::ValidationFailed,
                    _ => FailureReason::ExtractionFailed,
                };
                let record = InvoiceRecord::dead_on_arrival(
                    String::new(),
                    format!("unparsed-{}", Uuid::new_v4()),
                    String::new(),
                    Decimal::ZERO,
                    reason,
                    now,
                );
                return Ok(self.repo.insert(record).await);
            }
        };

        if let Err(e) = extracted.check() {
            warn!(
                "Extracted invoice {} failed validation: {}",
                extracted.invoice_number, e
            );
            return Ok(self
                .repo
                .insert(InvoiceRecord::dead_on_arrival(
                    extracted.vendor_name,
                    self.key_for(&extracted.invoice_number),
                    extracted.due_date,
                    extracted.amount_owed,
                    FailureReason::ValidationFailed,
                    now,
                ))
                .await);
        }

        let Some(vendor_address) = self.vendors.resolve(&extracted.vendor_name) else {
            warn!(
                "Vendor {:?} not in allow-list, rejecting invoice {}",
                extracted.vendor_name, extracted.invoice_number
            );
            return Ok(self
                .repo
                .insert(InvoiceRecord::dead_on_arrival(
                    extracted.vendor_name,
                    self.key_for(&extracted.invoice_number),
                    extracted.due_date,
                    extracted.amount_owed,
                    FailureReason::ValidationFailed,
                    now,
                ))
                .await);
        };

        let record = InvoiceRecord::received(
            extracted.vendor_name,
            extracted.invoice_number,
            vendor_address.to_string(),
            extracted.due_date,
            extracted.amount_owed,
            now,
        );

        let stored = self.repo.insert(record).await;
        if stored.state == InvoiceState::Received {
            info!(
                "Recorded invoice {} from {} for {} due {}",
                stored.invoice_number, stored.vendor_name, stored.amount_owed, stored.due_date
            );
        }
        Ok(stored)
    }

    fn key_for(&self, invoice_number: &str) -> String {
        if invoice_number.is_empty() {
            format!("unparsed-{}", Uuid::new_v4())
        } else {
            invoice_number.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::SystemClock;
    use crate::extraction::ExtractedInvoice;
    use parking_lot::Mutex;
    use rust_decimal_macros::dec;

    struct ScriptedExtractor {
        results: Mutex<Vec<Result<ExtractedInvoice, ExtractionError>>>,
    }

    impl ScriptedExtractor {
        fn returning(result: Result<ExtractedInvoice, ExtractionError>) -> Self {
            Self {
                results: Mutex::new(vec![result]),
            }
        }
    }

    #[async_trait]
    impl InvoiceExtractor for ScriptedExtractor {
        async fn extract(&self, _text: &str) -> Result<ExtractedInvoice, ExtractionError> {
            self.results.lock().pop().expect("no scripted result left")
        }
    }

    fn pipeline(
        result: Result<ExtractedInvoice, ExtractionError>,
    ) -> (IntakePipeline, Arc<InvoiceRepository>) {
        let repo = Arc::new(InvoiceRepository::new());
        let vendors = VendorAllowlist::parse("Acme Corp=sei1vendor1").unwrap();
        let pipeline = IntakePipeline::new(
            Arc::new(ScriptedExtractor::returning(result)),
            vendors,
            repo.clone(),
            Arc::new(SystemClock),
        );
        (pipeline, repo)
    }

    fn acme_invoice() -> ExtractedInvoice {
        ExtractedInvoice {
            vendor_name: "Acme Corp".to_string(),
            invoice_number: "123456".to_string(),
            due_date: "2025-08-30".to_string(),
            amount_owed: dec!(500),
        }
    }

    #[tokio::test]
    async fn test_valid_invoice_becomes_received() {
        let (pipeline, repo) = pipeline(Ok(acme_invoice()));

        let record = pipeline.record_invoice("INVOICE #123456 ...").await.unwrap();
        assert_eq!(record.state, InvoiceState::Received);
        assert_eq!(record.vendor_address.as_deref(), Some("sei1vendor1"));
        assert_eq!(repo.get("123456").await.unwrap().amount_owed, dec!(500));
    }

    #[tokio::test]
    async fn test_extraction_failure_becomes_failed_record() {
        let (pipeline, repo) =
            pipeline(Err(ExtractionError::Api("model unavailable".to_string())));

        let record = pipeline.record_invoice("garbled").await.unwrap();
        assert_eq!(record.state, InvoiceState::Failed);
        assert_eq!(record.failure_reason, Some(FailureReason::ExtractionFailed));
        // Kept in the store under a synthetic key.
        assert_eq!(repo.list().await.len(), 1);
    }

    #[tokio::test]
    async fn test_schema_violation_becomes_validation_failed() {
        let mut invoice = acme_invoice();
        invoice.amount_owed = dec!(-5);
        let (pipeline, _repo) = pipeline(Ok(invoice));

        let record = pipeline.record_invoice("text").await.unwrap();
        assert_eq!(record.state, InvoiceState::Failed);
        assert_eq!(record.failure_reason, Some(FailureReason::ValidationFailed));
    }

    #[tokio::test]
    async fn test_unknown_vendor_rejected() {
        let mut invoice = acme_invoice();
        invoice.vendor_name = "Initech".to_string();
        let (pipeline, _repo) = pipeline(Ok(invoice));

        let record = pipeline.record_invoice("text").await.unwrap();
        assert_eq!(record.state, InvoiceState::Failed);
        assert_eq!(record.failure_reason, Some(FailureReason::ValidationFailed));
    }
}
