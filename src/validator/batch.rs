//! The batched validator: two concurrent category invocations per job.

use std::sync::Arc;

use serde::Deserialize;

use crate::checklist::{Check, ChecklistStore, Region};
use crate::config::EngineConfig;
use crate::llm::{with_retry, GenerateRequest, LlmClient, LlmError, LlmGate};
use crate::pipeline::schema::{CommercialInvoiceRecord, EntryPrintRecord};

use super::prompt::{build_batch_prompt, VALIDATOR_SYSTEM_PROMPT};
use super::tariff::{self, TariffClassifier};
use super::{
    BatchValidationResult, CheckStatus, ValidationDocuments, ValidationError, ValidationSummary,
    Verdict,
};

/// Drives checklist validation for one job at a time. Pure with respect
/// to on-disk state: the orchestrator owns all writes.
pub struct BatchValidator {
    llm: Arc<dyn LlmClient>,
    checklists: Arc<ChecklistStore>,
    gate: LlmGate,
    config: EngineConfig,
    tariff_agent: Option<Arc<dyn TariffClassifier>>,
}

impl BatchValidator {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        checklists: Arc<ChecklistStore>,
        gate: LlmGate,
        config: EngineConfig,
        tariff_agent: Option<Arc<dyn TariffClassifier>>,
    ) -> Self {
        Self {
            llm,
            checklists,
            gate,
            config,
            tariff_agent,
        }
    }

    /// Validate one job's documents against the region checklist.
    ///
    /// The header and valuation invocations dispatch concurrently, so
    /// wall-clock time is the slower of the two. The optional tariff
    /// line checks run afterwards, when an agent is wired and both
    /// extraction records exist.
    pub async fn validate_job(
        &self,
        region: Region,
        documents: &ValidationDocuments,
        extractions: Option<(&EntryPrintRecord, &CommercialInvoiceRecord)>,
    ) -> Result<BatchValidationResult, ValidationError> {
        let checklist = self.checklists.load(region).await?;

        let (header, valuation) = tokio::join!(
            self.run_category("header", checklist.header_checks(), documents),
            self.run_category("valuation", checklist.valuation_checks(), documents),
        );
        let header = header?;
        let valuation = valuation?;

        let summary = ValidationSummary::tally(header.iter().chain(valuation.iter()));

        let tariff_line_checks = match (&self.tariff_agent, extractions) {
            (Some(agent), Some((entry_print, invoice))) if self.config.tariff_checks_enabled => {
                Some(
                    tariff::run_line_checks(
                        agent.as_ref(),
                        &self.gate,
                        &self.config.retry,
                        entry_print,
                        invoice,
                        checklist.tolerance(),
                    )
                    .await,
                )
            }
            _ => None,
        };

        tracing::info!(
            region = %region,
            total = summary.total,
            passed = summary.passed,
            failed = summary.failed,
            questionable = summary.questionable,
            not_applicable = summary.not_applicable,
            "checklist validation complete"
        );

        Ok(BatchValidationResult {
            header,
            valuation,
            tariff_line_checks,
            summary,
        })
    }

    /// One batched invocation for one category. An empty check list
    /// short-circuits without a provider call.
    async fn run_category(
        &self,
        category: &'static str,
        checks: &[Check],
        documents: &ValidationDocuments,
    ) -> Result<Vec<Verdict>, ValidationError> {
        if checks.is_empty() {
            return Ok(Vec::new());
        }

        tracing::debug!(category, checks = checks.len(), "dispatching batched validation call");

        with_retry(&self.config.retry, category, || {
            let request = GenerateRequest {
                model: self.config.reasoning_model.clone(),
                system: VALIDATOR_SYSTEM_PROMPT.to_string(),
                prompt: build_batch_prompt(checks),
                documents: documents.parts(),
                temperature: 0.05,
            };
            async move {
                let _permit = self.gate.acquire().await;
                let raw = self.llm.generate(request).await?;
                parse_verdicts(category, checks, &raw)
            }
        })
        .await
        .map_err(Into::into)
    }
}

#[derive(Deserialize)]
struct ValidationReply {
    validations: Vec<Verdict>,
}

/// Parse and check the model's verdict array: one verdict per check, in
/// order, with concrete citations for every non-N/A status. Violations
/// are schema faults, logged distinctly from transport errors.
fn parse_verdicts(category: &str, checks: &[Check], raw: &str) -> Result<Vec<Verdict>, LlmError> {
    let reply: ValidationReply = serde_json::from_str(raw)
        .map_err(|e| LlmError::SchemaFault(format!("{category} validation reply: {e}")))?;

    if reply.validations.len() != checks.len() {
        tracing::warn!(
            category,
            expected = checks.len(),
            actual = reply.validations.len(),
            "model returned wrong number of verdicts"
        );
        return Err(LlmError::SchemaFault(format!(
            "{category}: expected {} verdicts, model returned {}",
            checks.len(),
            reply.validations.len()
        )));
    }

    for verdict in &reply.validations {
        if verdict.status != CheckStatus::NotApplicable
            && (verdict.source_value.is_empty() || verdict.target_value.is_empty())
        {
            tracing::warn!(
                category,
                check_id = %verdict.check_id,
                "verdict is missing value citations"
            );
            return Err(LlmError::SchemaFault(format!(
                "{category}: check {} has status {:?} but empty value citations",
                verdict.check_id, verdict.status
            )));
        }
    }

    Ok(reply.validations)
}
