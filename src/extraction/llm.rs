use async_trait::async_trait;
use serde::Deserialize;
use tracing::warn;

use crate::config::ExtractionConfig;
use crate::error::ExtractionError;
use crate::extraction::{ExtractedInvoice, InvoiceExtractor};

/// Extractor backed by a generateContent-style model endpoint with a JSON
/// response schema constraining the output to the four invoice fields.
pub struct LlmExtractor {
    client: reqwest::Client,
    config: ExtractionConfig,
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Content,
}

#[derive(Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Deserialize)]
struct Part {
    text: String,
}

impl LlmExtractor {
    pub fn new(config: ExtractionConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    fn request_payload(invoice_text: &str) -> serde_json::Value {
        let prompt = format!(
            "Extract the following data from the invoice text: vendor name, \
             invoice number, due date, and amount owed. Return the data as a \
             JSON object. Invoice text: {}",
            invoice_text
        );

        serde_json::json!({
            "contents": [{
                "role": "user",
                "parts": [{ "text": prompt }]
            }],
            "generationConfig": {
                "responseMimeType": "application/json",
                "responseSchema": {
                    "type": "OBJECT",
                    "properties": {
                        "vendorName": { "type": "STRING" },
                        "invoiceNumber": { "type": "STRING" },
                        "dueDate": { "type": "STRING" },
                        "amountOwed": { "type": "NUMBER" }
                    },
                    "propertyOrdering": ["vendorName", "invoiceNumber", "dueDate", "amountOwed"]
                }
            }
        })
    }

    fn parse_response(body: &str) -> Result<ExtractedInvoice, ExtractionError> {
        let response: GenerateContentResponse = serde_json::from_str(body)
            .map_err(|e| ExtractionError::MalformedResponse(format!("bad envelope: {}", e)))?;

        let text = response
            .candidates
            .first()
            .and_then(|c| c.content.parts.first())
            .map(|p| p.text.as_str())
            .ok_or_else(|| {
                ExtractionError::MalformedResponse("response has no content parts".to_string())
            })?;

        serde_json::from_str(text)
            .map_err(|e| ExtractionError::MalformedResponse(format!("bad invoice JSON: {}", e)))
    }
}

#[async_trait]
impl InvoiceExtractor for LlmExtractor {
    async fn extract(&self, invoice_text: &str) -> Result<ExtractedInvoice, ExtractionError> {
        let url = format!("{}?key={}", self.config.api_url, self.config.api_key);

        let response = self
            .client
            .post(&url)
            .json(&Self::request_payload(invoice_text))
            .send()
            .await?;

        if !response.status().is_success() {
            warn!("Extraction API returned {}", response.status());
            return Err(ExtractionError::Api(format!(
                "extraction API returned {}",
                response.status()
            )));
        }

        let body = response.text().await?;
        Self::parse_response(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_parse_well_formed_response() {
        let body = r#"{
            "candidates": [{
                "content": {
                    "parts": [{
                        "text": "{\"vendorName\":\"Acme Corp\",\"invoiceNumber\":\"123456\",\"dueDate\":\"2025-08-30\",\"amountOwed\":500.0}"
                    }]
                }
            }]
        }"#;

        let invoice = LlmExtractor::parse_response(body).unwrap();
        assert_eq!(invoice.vendor_name, "Acme Corp");
        assert_eq!(invoice.invoice_number, "123456");
        assert_eq!(invoice.due_date, "2025-08-30");
        assert_eq!(invoice.amount_owed, dec!(500));
    }

    #[test]
    fn test_parse_empty_candidates() {
        let err = LlmExtractor::parse_response(r#"{"candidates": []}"#).unwrap_err();
        assert!(matches!(err, ExtractionError::MalformedResponse(_)));
    }

    #[test]
    fn test_parse_garbled_inner_json() {
        let body = r#"{
            "candidates": [{
                "content": { "parts": [{ "text": "not json at all" }] }
            }]
        }"#;
        let err = LlmExtractor::parse_response(body).unwrap_err();
        assert!(matches!(err, ExtractionError::MalformedResponse(_)));
    }
}
