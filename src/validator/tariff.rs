//! Optional tariff line-item checks.
//!
//! Pairs entry-print and invoice line items by line number, asks an
//! external tariff-classification agent for a suggested code per line,
//! and derives four independent sub-check statuses per line. The agent
//! itself lives outside the engine; only its interface is defined here.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::llm::retry::RetryPolicy;
use crate::llm::{with_retry, LlmError, LlmGate};
use crate::pipeline::schema::{CommercialInvoiceRecord, EntryPrintLineItem, EntryPrintRecord, InvoiceLineItem};

use super::{CheckStatus, LineVerdict};

/// An alternative classification offered by the agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuggestedCode {
    pub hs_code: String,
    pub stat_code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tco_link: Option<String>,
}

/// The agent's answer for one line item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TariffSuggestion {
    /// Best 8-digit HS code.
    pub hs_code: String,
    /// Best statistical code.
    pub stat_code: String,
    #[serde(default)]
    pub other_codes: Vec<SuggestedCode>,
    /// Concession/by-law reference when one likely applies.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub concession_link: Option<String>,
    pub reasoning: String,
}

/// External tariff-classification agent.
#[async_trait]
pub trait TariffClassifier: Send + Sync {
    async fn classify_line(&self, description: &str) -> Result<TariffSuggestion, LlmError>;
}

/// Run the line-item checks for one job. Per-line agent failures produce
/// FAIL verdicts for that line; they never abort the batch.
pub async fn run_line_checks(
    agent: &dyn TariffClassifier,
    gate: &LlmGate,
    retry: &RetryPolicy,
    entry_print: &EntryPrintRecord,
    invoice: &CommercialInvoiceRecord,
    tolerance: f64,
) -> Vec<LineVerdict> {
    let mut verdicts = Vec::new();

    for entry_line in &entry_print.line_items {
        let Some(invoice_line) = invoice
            .invoice_items
            .iter()
            .find(|item| item.item_number == entry_line.line_no)
        else {
            tracing::warn!(
                line_no = entry_line.line_no,
                "entry print line has no matching invoice line, skipping"
            );
            continue;
        };

        let suggestion = with_retry(retry, "tariff_line", || {
            let description = invoice_line.description.clone();
            async move {
                let _permit = gate.acquire().await;
                agent.classify_line(&description).await
            }
        })
        .await;

        let verdict = match suggestion {
            Ok(suggestion) => line_verdict(entry_line, invoice_line, &suggestion, tolerance),
            Err(error) => {
                tracing::warn!(
                    line_no = entry_line.line_no,
                    error = %error,
                    "tariff classification failed for line"
                );
                failed_line_verdict(entry_line, invoice_line, &error)
            }
        };
        verdicts.push(verdict);
    }

    verdicts
}

fn line_verdict(
    entry_line: &EntryPrintLineItem,
    invoice_line: &InvoiceLineItem,
    suggestion: &TariffSuggestion,
    tolerance: f64,
) -> LineVerdict {
    let (status, assessment) = classification_status(entry_line, suggestion);
    let concession_status = concession_status(entry_line, suggestion);
    let quantity_status = quantity_status(entry_line, invoice_line, tolerance);
    let gst_exemption_status = gst_exemption_status(entry_line);

    LineVerdict {
        line_number: entry_line.line_no,
        description: invoice_line.description.clone(),
        extracted_tariff_code: entry_line.tariff.clone(),
        extracted_stat_code: entry_line.stat.clone(),
        suggested_tariff_code: suggestion.hs_code.clone(),
        suggested_stat_code: suggestion.stat_code.clone(),
        status,
        assessment: format!("{assessment}\n{}", suggestion.reasoning),
        other_suggested_codes: suggestion
            .other_codes
            .iter()
            .map(|code| format!("{}.{}", code.hs_code, code.stat_code))
            .collect(),
        concession_status,
        quantity_status,
        gst_exemption_status,
        overall_status: CheckStatus::worst([
            status,
            concession_status,
            quantity_status,
            gst_exemption_status,
        ]),
    }
}

fn failed_line_verdict(
    entry_line: &EntryPrintLineItem,
    invoice_line: &InvoiceLineItem,
    error: &LlmError,
) -> LineVerdict {
    LineVerdict {
        line_number: entry_line.line_no,
        description: invoice_line.description.clone(),
        extracted_tariff_code: entry_line.tariff.clone(),
        extracted_stat_code: entry_line.stat.clone(),
        suggested_tariff_code: "ERROR".to_string(),
        suggested_stat_code: "ER".to_string(),
        status: CheckStatus::Fail,
        assessment: format!("Classification error: {error}"),
        other_suggested_codes: vec![],
        concession_status: CheckStatus::NotApplicable,
        quantity_status: CheckStatus::NotApplicable,
        gst_exemption_status: CheckStatus::NotApplicable,
        overall_status: CheckStatus::Fail,
    }
}

/// Exact HS + stat match passes; a match among the alternatives, or a
/// shared first six digits of the HS code, is questionable; anything else
/// fails.
fn classification_status(
    entry_line: &EntryPrintLineItem,
    suggestion: &TariffSuggestion,
) -> (CheckStatus, String) {
    if entry_line.tariff == suggestion.hs_code && entry_line.stat == suggestion.stat_code {
        return (CheckStatus::Pass, "Exact match".to_string());
    }

    let alternative_match = suggestion
        .other_codes
        .iter()
        .any(|code| entry_line.tariff == code.hs_code && entry_line.stat == code.stat_code);
    if alternative_match {
        return (
            CheckStatus::Questionable,
            "Declared code matches an alternative suggestion".to_string(),
        );
    }

    if entry_line.tariff.len() >= 6
        && suggestion.hs_code.len() >= 6
        && entry_line.tariff[..6] == suggestion.hs_code[..6]
    {
        return (
            CheckStatus::Questionable,
            "Declared code agrees to six digits with the suggestion".to_string(),
        );
    }

    (
        CheckStatus::Fail,
        format!(
            "Declared {}.{} does not match suggested {}.{}",
            entry_line.tariff, entry_line.stat, suggestion.hs_code, suggestion.stat_code
        ),
    )
}

/// No instrument claimed is N/A. A claimed instrument with a concession
/// reference from the agent needs human confirmation; one without any
/// reference fails.
fn concession_status(entry_line: &EntryPrintLineItem, suggestion: &TariffSuggestion) -> CheckStatus {
    match entry_line.instrument_no.as_deref() {
        None | Some("") => CheckStatus::NotApplicable,
        Some(_) if suggestion.concession_link.is_some() => CheckStatus::Questionable,
        Some(_) => CheckStatus::Fail,
    }
}

fn quantity_status(
    entry_line: &EntryPrintLineItem,
    invoice_line: &InvoiceLineItem,
    tolerance: f64,
) -> CheckStatus {
    let declared = entry_line.quantity;
    let invoiced = invoice_line.quantity;
    let scale = declared.abs().max(invoiced.abs()).max(1.0);
    if (declared - invoiced).abs() <= tolerance * scale {
        CheckStatus::Pass
    } else {
        CheckStatus::Fail
    }
}

/// A zero GST amount against a positive value of taxable importation
/// reads as a claimed exemption, which always needs human review.
fn gst_exemption_status(entry_line: &EntryPrintLineItem) -> CheckStatus {
    if entry_line.gst == 0.0 && entry_line.voti > 0.0 {
        CheckStatus::Questionable
    } else {
        CheckStatus::NotApplicable
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::schema::fixtures;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct FixedAgent {
        suggestion: TariffSuggestion,
        calls: AtomicU32,
    }

    impl FixedAgent {
        fn new(suggestion: TariffSuggestion) -> Self {
            Self {
                suggestion,
                calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl TariffClassifier for FixedAgent {
        async fn classify_line(&self, _description: &str) -> Result<TariffSuggestion, LlmError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.suggestion.clone())
        }
    }

    fn suggestion(hs_code: &str, stat_code: &str) -> TariffSuggestion {
        TariffSuggestion {
            hs_code: hs_code.to_string(),
            stat_code: stat_code.to_string(),
            other_codes: vec![],
            concession_link: None,
            reasoning: "Looks like engine parts.".to_string(),
        }
    }

    fn entry_line() -> EntryPrintLineItem {
        fixtures::entry_print_record().line_items[0].clone()
    }

    fn invoice_line() -> InvoiceLineItem {
        fixtures::commercial_invoice_record().invoice_items[0].clone()
    }

    #[test]
    fn exact_match_passes() {
        let (status, _) = classification_status(&entry_line(), &suggestion("84099990", "61"));
        assert_eq!(status, CheckStatus::Pass);
    }

    #[test]
    fn six_digit_agreement_is_questionable() {
        let (status, _) = classification_status(&entry_line(), &suggestion("84099910", "22"));
        assert_eq!(status, CheckStatus::Questionable);
    }

    #[test]
    fn alternative_code_match_is_questionable() {
        let mut with_alternatives = suggestion("73181590", "01");
        with_alternatives.other_codes.push(SuggestedCode {
            hs_code: "84099990".to_string(),
            stat_code: "61".to_string(),
            tco_link: None,
        });
        let (status, _) = classification_status(&entry_line(), &with_alternatives);
        assert_eq!(status, CheckStatus::Questionable);
    }

    #[test]
    fn disjoint_codes_fail() {
        let (status, assessment) =
            classification_status(&entry_line(), &suggestion("73181590", "01"));
        assert_eq!(status, CheckStatus::Fail);
        assert!(assessment.contains("84099990.61"));
    }

    #[test]
    fn no_instrument_means_concession_na() {
        assert_eq!(
            concession_status(&entry_line(), &suggestion("84099990", "61")),
            CheckStatus::NotApplicable
        );
    }

    #[test]
    fn claimed_instrument_without_reference_fails() {
        let mut line = entry_line();
        line.instrument_no = Some("1700581".to_string());
        assert_eq!(
            concession_status(&line, &suggestion("84099990", "61")),
            CheckStatus::Fail
        );
    }

    #[test]
    fn claimed_instrument_with_reference_is_questionable() {
        let mut line = entry_line();
        line.instrument_no = Some("1700581".to_string());
        let mut with_link = suggestion("84099990", "61");
        with_link.concession_link = Some("https://example.test/tco/84099990".to_string());
        assert_eq!(concession_status(&line, &with_link), CheckStatus::Questionable);
    }

    #[test]
    fn quantity_within_tolerance_passes() {
        assert_eq!(
            quantity_status(&entry_line(), &invoice_line(), 0.01),
            CheckStatus::Pass
        );
    }

    #[test]
    fn quantity_outside_tolerance_fails() {
        let mut line = entry_line();
        line.quantity = 7.0;
        assert_eq!(
            quantity_status(&line, &invoice_line(), 0.01),
            CheckStatus::Fail
        );
    }

    #[test]
    fn zero_gst_with_positive_voti_is_questionable() {
        let mut line = entry_line();
        line.gst = 0.0;
        line.voti = 1000.0;
        assert_eq!(gst_exemption_status(&line), CheckStatus::Questionable);
        assert_eq!(gst_exemption_status(&entry_line()), CheckStatus::NotApplicable);
    }

    #[tokio::test]
    async fn matched_lines_get_verdicts() {
        let agent = FixedAgent::new(suggestion("84099990", "61"));
        let gate = LlmGate::new(4);
        let verdicts = run_line_checks(
            &agent,
            &gate,
            &RetryPolicy::immediate(3),
            &fixtures::entry_print_record(),
            &fixtures::commercial_invoice_record(),
            0.01,
        )
        .await;

        assert_eq!(verdicts.len(), 1);
        let verdict = &verdicts[0];
        assert_eq!(verdict.line_number, 1);
        assert_eq!(verdict.status, CheckStatus::Pass);
        assert_eq!(verdict.quantity_status, CheckStatus::Pass);
        assert_eq!(verdict.overall_status, CheckStatus::Pass);
        assert_eq!(verdict.description, "Engine parts");
    }

    #[tokio::test]
    async fn overall_status_is_worst_of_sub_checks() {
        // Good classification, but a claimed concession with no reference.
        let agent = FixedAgent::new(suggestion("84099990", "61"));
        let gate = LlmGate::new(4);
        let mut entry_print = fixtures::entry_print_record();
        entry_print.line_items[0].instrument_no = Some("1700581".to_string());

        let verdicts = run_line_checks(
            &agent,
            &gate,
            &RetryPolicy::immediate(3),
            &entry_print,
            &fixtures::commercial_invoice_record(),
            0.01,
        )
        .await;

        assert_eq!(verdicts[0].status, CheckStatus::Pass);
        assert_eq!(verdicts[0].concession_status, CheckStatus::Fail);
        assert_eq!(verdicts[0].overall_status, CheckStatus::Fail);
    }

    #[tokio::test]
    async fn agent_failure_yields_a_fail_verdict_for_the_line() {
        struct DeadAgent;

        #[async_trait]
        impl TariffClassifier for DeadAgent {
            async fn classify_line(&self, _description: &str) -> Result<TariffSuggestion, LlmError> {
                Err(LlmError::ProviderFault {
                    status: 500,
                    message: "agent down".into(),
                })
            }
        }

        let gate = LlmGate::new(4);
        let verdicts = run_line_checks(
            &DeadAgent,
            &gate,
            &RetryPolicy::immediate(2),
            &fixtures::entry_print_record(),
            &fixtures::commercial_invoice_record(),
            0.01,
        )
        .await;

        assert_eq!(verdicts.len(), 1);
        assert_eq!(verdicts[0].status, CheckStatus::Fail);
        assert_eq!(verdicts[0].suggested_tariff_code, "ERROR");
        assert_eq!(verdicts[0].overall_status, CheckStatus::Fail);
    }

    #[tokio::test]
    async fn unmatched_entry_lines_are_skipped() {
        let agent = FixedAgent::new(suggestion("84099990", "61"));
        let gate = LlmGate::new(4);
        let mut entry_print = fixtures::entry_print_record();
        entry_print.line_items[0].line_no = 99;

        let verdicts = run_line_checks(
            &agent,
            &gate,
            &RetryPolicy::immediate(3),
            &entry_print,
            &fixtures::commercial_invoice_record(),
            0.01,
        )
        .await;

        assert!(verdicts.is_empty());
        assert_eq!(agent.calls.load(Ordering::SeqCst), 0);
    }
}
