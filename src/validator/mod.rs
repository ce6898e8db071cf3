//! Batched checklist validation against the original PDFs.

pub mod batch;
pub mod prompt;
pub mod tariff;

pub use batch::BatchValidator;
pub use tariff::{SuggestedCode, TariffClassifier, TariffSuggestion};

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::checklist::ChecklistError;
use crate::llm::{DocumentPart, LlmError};
use crate::pipeline::DocumentType;

/// Outcome of a single check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CheckStatus {
    #[serde(rename = "PASS")]
    Pass,
    #[serde(rename = "FAIL")]
    Fail,
    #[serde(rename = "QUESTIONABLE")]
    Questionable,
    #[serde(rename = "N/A")]
    NotApplicable,
}

impl CheckStatus {
    /// FAIL > QUESTIONABLE > PASS > N/A.
    fn severity(&self) -> u8 {
        match self {
            CheckStatus::Fail => 3,
            CheckStatus::Questionable => 2,
            CheckStatus::Pass => 1,
            CheckStatus::NotApplicable => 0,
        }
    }

    pub fn worst(statuses: impl IntoIterator<Item = CheckStatus>) -> CheckStatus {
        statuses
            .into_iter()
            .max_by_key(CheckStatus::severity)
            .unwrap_or(CheckStatus::NotApplicable)
    }
}

/// A per-check verdict with citations from the documents. For any status
/// other than N/A, `source_value` and `target_value` must quote the
/// concrete text the model extracted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    pub check_id: String,
    pub auditing_criteria: String,
    pub status: CheckStatus,
    pub assessment: String,
    pub source_document: DocumentType,
    pub target_document: DocumentType,
    pub source_value: String,
    pub target_value: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub questionable: usize,
    pub not_applicable: usize,
}

impl ValidationSummary {
    pub fn tally<'a>(verdicts: impl IntoIterator<Item = &'a Verdict>) -> Self {
        let mut summary = Self::default();
        for verdict in verdicts {
            summary.total += 1;
            match verdict.status {
                CheckStatus::Pass => summary.passed += 1,
                CheckStatus::Fail => summary.failed += 1,
                CheckStatus::Questionable => summary.questionable += 1,
                CheckStatus::NotApplicable => summary.not_applicable += 1,
            }
        }
        summary
    }
}

/// Verdict for one matched tariff line item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineVerdict {
    pub line_number: u32,
    pub description: String,
    pub extracted_tariff_code: String,
    pub extracted_stat_code: String,
    pub suggested_tariff_code: String,
    pub suggested_stat_code: String,
    /// Tariff classification comparison.
    pub status: CheckStatus,
    pub assessment: String,
    pub other_suggested_codes: Vec<String>,
    pub concession_status: CheckStatus,
    pub quantity_status: CheckStatus,
    pub gst_exemption_status: CheckStatus,
    /// Worst of the four sub-checks.
    pub overall_status: CheckStatus,
}

/// The complete validation result for one job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchValidationResult {
    pub header: Vec<Verdict>,
    pub valuation: Vec<Verdict>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tariff_line_checks: Option<Vec<LineVerdict>>,
    pub summary: ValidationSummary,
}

/// The PDFs a job's validation runs against. Entry print and commercial
/// invoice are required; the air waybill rides along when present.
#[derive(Debug, Clone)]
pub struct ValidationDocuments {
    pub entry_print: Bytes,
    pub commercial_invoice: Bytes,
    pub air_waybill: Option<Bytes>,
}

impl ValidationDocuments {
    /// Labeled provider parts, in a fixed document order.
    pub fn parts(&self) -> Vec<DocumentPart> {
        let mut parts = vec![
            DocumentPart::new(
                DocumentType::EntryPrint.prompt_label(),
                self.entry_print.clone(),
            ),
            DocumentPart::new(
                DocumentType::CommercialInvoice.prompt_label(),
                self.commercial_invoice.clone(),
            ),
        ];
        if let Some(air_waybill) = &self.air_waybill {
            parts.push(DocumentPart::new(
                DocumentType::AirWaybill.prompt_label(),
                air_waybill.clone(),
            ));
        }
        parts
    }
}

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("checklist error: {0}")]
    Checklist(#[from] ChecklistError),

    #[error("provider error: {0}")]
    Provider(#[from] LlmError),
}
