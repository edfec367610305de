// Natural-language field extraction boundary.
//
// The collaborator is a black-box model call; whatever comes back is
// validated against a strict schema here and converted to a typed record or
// a typed failure before it touches the core.

pub mod llm;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Deserialize;
use validator::Validate;

use crate::error::ExtractionError;

pub use llm::LlmExtractor;

/// Structured result of invoice text extraction, pre-validation.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedInvoice {
    #[validate(length(min = 1, message = "vendor name is empty"))]
    pub vendor_name: String,

    #[validate(length(min = 1, message = "invoice number is empty"))]
    pub invoice_number: String,

    /// ISO-8601 calendar date. Presence is checked here; the scheduler owns
    /// the actual parse so an unusable date fails with InvalidDueDate there.
    #[validate(length(min = 1, message = "due date is empty"))]
    pub due_date: String,

    pub amount_owed: Decimal,
}

impl ExtractedInvoice {
    /// Strict schema check: non-empty identity fields, positive amount.
    pub fn check(&self) -> Result<(), ExtractionError> {
        self.validate().map_err(|e| {
            let fields = e
                .field_errors()
                .into_iter()
                .map(|(field, errors)| {
                    let messages: Vec<String> = errors
                        .iter()
                        .map(|e| {
                            e.message
                                .as_ref()
                                .map(|m| m.to_string())
                                .unwrap_or_default()
                        })
                        .collect();
                    format!("{}: {}", field, messages.join(", "))
                })
                .collect::<Vec<String>>()
                .join("; ");
            ExtractionError::Validation(fields)
        })?;

        if self.amount_owed <= Decimal::ZERO {
            return Err(ExtractionError::Validation(format!(
                "amount_owed must be positive, got {}",
                self.amount_owed
            )));
        }

        Ok(())
    }
}

/// Extraction collaborator boundary.
#[async_trait]
pub trait InvoiceExtractor: Send + Sync {
    /// Extract structured fields from a raw invoice text blob.
    async fn extract(&self, invoice_text: &str) -> Result<ExtractedInvoice, ExtractionError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn extracted(vendor: &str, number: &str, due: &str, amount: Decimal) -> ExtractedInvoice {
        ExtractedInvoice {
            vendor_name: vendor.to_string(),
            invoice_number: number.to_string(),
            due_date: due.to_string(),
            amount_owed: amount,
        }
    }

    #[test]
    fn test_valid_record_passes() {
        assert!(extracted("Acme Corp", "123456", "2025-08-30", dec!(500))
            .check()
            .is_ok());
    }

    #[test]
    fn test_empty_vendor_name_rejected() {
        assert!(extracted("", "123456", "2025-08-30", dec!(500))
            .check()
            .is_err());
    }

    #[test]
    fn test_empty_invoice_number_rejected() {
        assert!(extracted("Acme Corp", "", "2025-08-30", dec!(500))
            .check()
            .is_err());
    }

    #[test]
    fn test_non_positive_amount_rejected() {
        assert!(extracted("Acme Corp", "123456", "2025-08-30", dec!(0))
            .check()
            .is_err());
        assert!(extracted("Acme Corp", "123456", "2025-08-30", dec!(-10))
            .check()
            .is_err());
    }

    #[test]
    fn test_camel_case_wire_format() {
        let json = r#"{
            "vendorName": "Acme Corp",
            "invoiceNumber": "123456",
            "dueDate": "2025-08-30",
            "amountOwed": 500.0
        }"#;
        let parsed: ExtractedInvoice = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.vendor_name, "Acme Corp");
        assert_eq!(parsed.amount_owed, dec!(500));
    }
}
