//! Per-PDF document-type classification.

use bytes::Bytes;
use serde::Deserialize;

use crate::config::EngineConfig;
use crate::llm::{with_retry, DocumentPart, GenerateRequest, LlmClient, LlmError, LlmGate};

use super::DocumentType;

const CLASSIFIER_SYSTEM_PROMPT: &str = "\
You are a customs document classification expert for express air freight shipments.

Classify the attached PDF into exactly one of these categories:

1. entry_print - Customs entry/declaration form.
   Contains entry number, declarant details, line items with HS codes, customs values.
   Keywords: \"Entry\", \"Declaration\", \"Customs\", \"Declarant\", \"HS Code\", \"Tariff\".

2. air_waybill - Air Waybill (AWB).
   Contains AWB number, shipper/consignee details, weight, pieces, flight info.
   Keywords: \"Air Waybill\", \"AWB\", \"Shipper\", \"Consignee\", \"Flight\", \"MAWB\", \"HAWB\".

3. commercial_invoice - Commercial invoice from the supplier.
   Contains invoice number, supplier/buyer details, line items with prices, totals.
   Keywords: \"Commercial Invoice\", \"Invoice\", \"Supplier\", \"Buyer\", \"Payment Terms\".

4. packing_list - Packing list with physical package details.
   Keywords: \"Packing List\", \"Package\", \"Carton\", \"Dimensions\", \"Gross Weight\".

5. other - Certificates, licenses, or anything unrecognizable.

Return JSON with exactly one field:
{\"document_type\": one of the 5 categories above}";

#[derive(Deserialize)]
struct ClassificationReply {
    document_type: String,
}

fn classification_prompt(filename: &str) -> String {
    format!(
        "Analyze this PDF document and classify it.\n\n\
         Filename: {filename}\n\n\
         Determine what type of customs document this is based on the content.\n\
         Return the classification in the required JSON format with document_type."
    )
}

/// Classify a PDF, resolving to [`DocumentType::Other`] once retries are
/// exhausted. Classification failure must not abort the job; the cost is
/// only that extraction is skipped for the file.
pub async fn classify_document(
    llm: &dyn LlmClient,
    gate: &LlmGate,
    config: &EngineConfig,
    content: &Bytes,
    filename: &str,
) -> DocumentType {
    match try_classify(llm, gate, config, content, filename).await {
        Ok(document_type) => document_type,
        Err(error) => {
            tracing::warn!(
                filename,
                error = %error,
                "classification failed after retries, labeling as other"
            );
            DocumentType::Other
        }
    }
}

/// Classification without the `other` fallback, for callers that need
/// the failure itself.
pub async fn try_classify(
    llm: &dyn LlmClient,
    gate: &LlmGate,
    config: &EngineConfig,
    content: &Bytes,
    filename: &str,
) -> Result<DocumentType, LlmError> {
    with_retry(&config.retry, "classify", || {
        let request = GenerateRequest {
            model: config.fast_model.clone(),
            system: CLASSIFIER_SYSTEM_PROMPT.to_string(),
            prompt: classification_prompt(filename),
            documents: vec![DocumentPart::new(
                DocumentType::Other.prompt_label(),
                content.clone(),
            )],
            temperature: 0.1,
        };
        async move {
            let _permit = gate.acquire().await;
            let raw = llm.generate(request).await?;
            parse_classification(&raw)
        }
    })
    .await
}

fn parse_classification(raw: &str) -> Result<DocumentType, LlmError> {
    let reply: ClassificationReply = serde_json::from_str(raw)
        .map_err(|e| LlmError::SchemaFault(format!("classification reply: {e}")))?;
    DocumentType::parse(&reply.document_type).ok_or_else(|| {
        LlmError::SchemaFault(format!("unknown document type `{}`", reply.document_type))
    })
}
