//! Structured data extraction for entry prints and commercial invoices.

use bytes::Bytes;

use crate::config::EngineConfig;
use crate::llm::{with_retry, DocumentPart, GenerateRequest, LlmClient, LlmError, LlmGate};

use super::schema::{CommercialInvoiceRecord, EntryPrintRecord, ExtractedRecord};
use super::DocumentType;

const ENTRY_PRINT_SYSTEM_PROMPT: &str = "\
You are an expert at extracting structured data from Australian Customs Entry Print documents.

Extract all fields accurately from the document following the schema in the prompt.
Pay special attention to:
- Line items with tariff codes, quantities, and values
- Monetary values in both foreign currency and AUD
- Owner vs Supplier details (they are different parties)
- INVOICE PRICE vs CUSTOMS VALUE columns (extract from the correct column)
- Origin/Pref codes: country code before the slash, treatment code after the slash

Return valid JSON matching the exact schema structure.";

const COMMERCIAL_INVOICE_SYSTEM_PROMPT: &str = "\
You are an expert at extracting structured data from Commercial Invoice documents.

Extract all fields accurately from the document following the schema in the prompt.
Pay special attention to:
- The supplier is NEVER the importing-country entity, always the foreign party
- Incoterms must be the 3-letter code (FOB, CIF, DDP, ...)
- The material number is NOT the HS/tariff code
- The FOB amount is the net value of goods, NOT the invoice total
- Line items with quantities, prices, and country of origin

Return valid JSON matching the exact schema structure.";

const ENTRY_PRINT_SCHEMA_OUTLINE: &str = "\
{
  \"preparedDateTime\", \"jobNo\", \"entryNo\", \"destinationPort\",
  \"ownerName\" (null if empty), \"ownerCode\" (null if empty),
  \"supplierName\", \"supplierCode\",
  \"agency\", \"mode\", \"aRef\", \"aircr\", \"loadPt\", \"firstPt\", \"dschPt\",
  \"iTerms\" (3-letter incoterm), \"oRef\",
  \"fob\", \"fobAUD\", \"cif\", \"cifAUD\", \"grwtKg\", \"tAndI\", \"itot\", \"itotAUD\" (numbers),
  \"totalCustomsValueAUD\", \"factor\", \"valuationDate\", \"crncys\" (currency code),
  \"calculationDate\", \"currencyConversionRate\",
  \"lineItems\": [{\"lineNo\", \"tariff\" (8 digits), \"stat\" (2 digits), \"quantity\",
    \"quantityUnit\", \"trt\", \"originPref\", \"invoicePrice\", \"customsValue\",
    \"dutyRate\", \"duty\", \"gst\", \"addInfo\", \"description\", \"tAndI\", \"wet\",
    \"voti\", \"instrumentNo\" (null if none)}],
  \"totalNumberOfPackages\" (integer), \"billNos\" (array of strings),
  \"totalDuty\", \"totalGST\", \"totalWET\", \"otherCharges\", \"totalAmtPayable\"
}";

const COMMERCIAL_INVOICE_SCHEMA_OUTLINE: &str = "\
{
  \"invoice_number\", \"invoice_date\" (YYYY-MM-DD), \"invoice_currency\",
  \"supplier_company_name\", \"supplier_address_line1\",
  \"buyer_company_name\", \"buyer_address_line1\",
  \"inco_terms\" (3-letter code), \"invoice_total_amount\" (number),
  \"international_freight\", \"insurance_charges\", \"destination_charges\",
  \"import_duties\", \"inland_transportation\", \"other_charges\",
  \"fob_amount\", \"cif_amount\", \"transport_and_insurance\" (numbers or null),
  \"invoice_items\": [{\"item_number\", \"material_number\", \"invoice_tariff_code\" (null if empty),
    \"description\", \"quantity\", \"quantity_unit\", \"net_weight\", \"net_weight_unit\",
    \"total_price\", \"unit_price\", \"country_of_origin\"}]
}";

/// Extract a structured record from a classified PDF. Returns `None`
/// without touching the provider for document types outside the
/// extraction set, and `None` with a warning when retries are exhausted;
/// the file stays persisted either way.
pub async fn extract_document(
    llm: &dyn LlmClient,
    gate: &LlmGate,
    config: &EngineConfig,
    content: &Bytes,
    filename: &str,
    document_type: DocumentType,
) -> Option<ExtractedRecord> {
    if !document_type.is_extractable() {
        return None;
    }

    match try_extract(llm, gate, config, content, filename, document_type).await {
        Ok(record) => Some(record),
        Err(error) => {
            tracing::warn!(
                filename,
                document_type = %document_type,
                error = %error,
                "extraction failed after retries, continuing without a record"
            );
            None
        }
    }
}

pub async fn try_extract(
    llm: &dyn LlmClient,
    gate: &LlmGate,
    config: &EngineConfig,
    content: &Bytes,
    filename: &str,
    document_type: DocumentType,
) -> Result<ExtractedRecord, LlmError> {
    let (system, outline) = match document_type {
        DocumentType::EntryPrint => (ENTRY_PRINT_SYSTEM_PROMPT, ENTRY_PRINT_SCHEMA_OUTLINE),
        DocumentType::CommercialInvoice => (
            COMMERCIAL_INVOICE_SYSTEM_PROMPT,
            COMMERCIAL_INVOICE_SCHEMA_OUTLINE,
        ),
        other => {
            return Err(LlmError::InvalidInput(format!(
                "extraction not supported for document type {other}"
            )))
        }
    };

    with_retry(&config.retry, "extract", || {
        let request = GenerateRequest {
            model: config.fast_model.clone(),
            system: system.to_string(),
            prompt: format!(
                "Extract all data from this {}: {filename}\n\n\
                 Return a single JSON object with these fields:\n{outline}",
                document_type.prompt_label()
            ),
            documents: vec![DocumentPart::new(
                document_type.prompt_label(),
                content.clone(),
            )],
            temperature: 0.1,
        };
        async move {
            let _permit = gate.acquire().await;
            let raw = llm.generate(request).await?;
            parse_extraction(document_type, &raw)
        }
    })
    .await
}

/// Deserialize into the schema for `document_type`: whole record or
/// schema fault, never a partial record.
fn parse_extraction(document_type: DocumentType, raw: &str) -> Result<ExtractedRecord, LlmError> {
    match document_type {
        DocumentType::EntryPrint => serde_json::from_str::<EntryPrintRecord>(raw)
            .map(ExtractedRecord::EntryPrint)
            .map_err(|e| LlmError::SchemaFault(format!("entry print record: {e}"))),
        DocumentType::CommercialInvoice => serde_json::from_str::<CommercialInvoiceRecord>(raw)
            .map(ExtractedRecord::CommercialInvoice)
            .map_err(|e| LlmError::SchemaFault(format!("commercial invoice record: {e}"))),
        other => Err(LlmError::InvalidInput(format!(
            "extraction not supported for document type {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::retry::RetryPolicy;
    use crate::llm::MockLlmClient;
    use crate::pipeline::schema::fixtures;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn test_config() -> EngineConfig {
        EngineConfig {
            retry: RetryPolicy::immediate(3),
            ..EngineConfig::default()
        }
    }

    fn pdf() -> Bytes {
        Bytes::from_static(b"%PDF-1.4")
    }

    #[tokio::test]
    async fn entry_print_reply_parses_into_a_record() {
        let llm = MockLlmClient::new(fixtures::entry_print_json());
        let gate = LlmGate::new(4);
        let record = extract_document(
            &llm,
            &gate,
            &test_config(),
            &pdf(),
            "1_ENT.pdf",
            DocumentType::EntryPrint,
        )
        .await
        .expect("record");
        assert_eq!(record.as_entry_print().unwrap().entry_no, "AAE1234567");
    }

    #[tokio::test]
    async fn invoice_reply_parses_into_a_record() {
        let llm = MockLlmClient::new(fixtures::commercial_invoice_json());
        let gate = LlmGate::new(4);
        let record = extract_document(
            &llm,
            &gate,
            &test_config(),
            &pdf(),
            "1_INV.pdf",
            DocumentType::CommercialInvoice,
        )
        .await
        .expect("record");
        assert_eq!(
            record.as_commercial_invoice().unwrap().invoice_number,
            "INV-2025-8891"
        );
    }

    #[tokio::test]
    async fn inactive_types_return_none_without_calling_the_provider() {
        struct PanickingLlm;

        #[async_trait]
        impl LlmClient for PanickingLlm {
            async fn generate(&self, _request: GenerateRequest) -> Result<String, LlmError> {
                panic!("provider must not be called for inactive document types");
            }
        }

        let gate = LlmGate::new(4);
        for doc_type in [
            DocumentType::AirWaybill,
            DocumentType::PackingList,
            DocumentType::Other,
        ] {
            let result = extract_document(
                &PanickingLlm,
                &gate,
                &test_config(),
                &pdf(),
                "1_X.pdf",
                doc_type,
            )
            .await;
            assert!(result.is_none());
        }
    }

    #[tokio::test]
    async fn provider_failure_resolves_to_none() {
        struct DeadLlm {
            calls: AtomicU32,
        }

        #[async_trait]
        impl LlmClient for DeadLlm {
            async fn generate(&self, _request: GenerateRequest) -> Result<String, LlmError> {
                self.calls.fetch_add(1, Ordering::SeqCst);
                Err(LlmError::ProviderFault {
                    status: 503,
                    message: "unavailable".into(),
                })
            }
        }

        let llm = DeadLlm {
            calls: AtomicU32::new(0),
        };
        let gate = LlmGate::new(4);
        let result = extract_document(
            &llm,
            &gate,
            &test_config(),
            &pdf(),
            "1_ENT.pdf",
            DocumentType::EntryPrint,
        )
        .await;
        assert!(result.is_none());
        assert_eq!(llm.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn wrong_shape_reply_is_a_schema_fault() {
        let llm = MockLlmClient::new(r#"{"jobNo": "only a fragment"}"#);
        let gate = LlmGate::new(4);
        let result = try_extract(
            &llm,
            &gate,
            &test_config(),
            &pdf(),
            "1_ENT.pdf",
            DocumentType::EntryPrint,
        )
        .await;
        assert!(matches!(result, Err(LlmError::SchemaFault(_))));
    }

    #[test]
    fn parse_routes_by_document_type() {
        let entry = parse_extraction(DocumentType::EntryPrint, fixtures::entry_print_json());
        assert!(entry.unwrap().as_entry_print().is_some());

        let invoice = parse_extraction(
            DocumentType::CommercialInvoice,
            fixtures::commercial_invoice_json(),
        );
        assert!(invoice.unwrap().as_commercial_invoice().is_some());

        let unsupported = parse_extraction(DocumentType::AirWaybill, "{}");
        assert!(matches!(unsupported, Err(LlmError::InvalidInput(_))));
    }
}
