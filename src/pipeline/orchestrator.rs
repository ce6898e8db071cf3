//! Per-run coordination: partition, allocate, classify, persist, extract,
//! validate, and emit the run manifest.
//!
//! Failure isolation: anything below job granularity stays inside the
//! job's manifest entry; only allocation and input validation abort the
//! run. Manifest order follows the partitioner's group order, not
//! completion order, so identical inputs give identical manifests.

use std::path::Path;
use std::sync::Arc;

use bytes::Bytes;
use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::checklist::{ChecklistStore, Region};
use crate::config::EngineConfig;
use crate::llm::{LlmClient, LlmGate};
use crate::validator::{
    BatchValidationResult, BatchValidator, TariffClassifier, ValidationDocuments,
};

use super::classify::classify_document;
use super::extract::extract_document;
use super::partition::{partition, JobGroup};
use super::persist::{save_classified_pdf, save_extraction_json};
use super::runs::{allocate_run, create_job_directory};
use super::schema::ExtractedRecord;
use super::{DocumentType, EngineError, FileUpload};

/// A classified, persisted file as reported in the manifest.
#[derive(Debug, Clone, Serialize)]
pub struct ClassifiedFile {
    pub original_filename: String,
    pub saved_filename: String,
    pub saved_path: String,
    pub document_type: DocumentType,
    pub extracted_data: Option<ExtractedRecord>,
}

/// One job's manifest entry.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessedJob {
    pub job_id: String,
    pub job_folder: String,
    pub file_count: usize,
    pub classified_files: Vec<ClassifiedFile>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation_results: Option<BatchValidationResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation_file: Option<String>,
    /// Summary of any recovered failure within the job.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// The run manifest returned to the caller and consumed by reporting.
#[derive(Debug, Clone, Serialize)]
pub struct RunManifest {
    pub run_id: String,
    pub run_path: String,
    pub region: Region,
    pub total_files: usize,
    pub total_jobs: usize,
    pub jobs: Vec<ProcessedJob>,
}

/// Validation JSON written at the run root for each validated job.
#[derive(Serialize)]
struct ValidationReport<'a> {
    job_id: &'a str,
    region: Region,
    #[serde(flatten)]
    result: &'a BatchValidationResult,
}

/// A file that has been classified and persisted, with its payload kept
/// in memory for the extraction stage.
struct SavedFile {
    classified: ClassifiedFile,
    content: Bytes,
}

pub struct BatchEngine {
    llm: Arc<dyn LlmClient>,
    validator: BatchValidator,
    config: EngineConfig,
    gate: LlmGate,
}

impl BatchEngine {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        checklists: Arc<ChecklistStore>,
        tariff_agent: Option<Arc<dyn TariffClassifier>>,
        config: EngineConfig,
    ) -> Self {
        let gate = LlmGate::new(config.max_inflight_llm);
        let validator = BatchValidator::new(
            llm.clone(),
            checklists,
            gate.clone(),
            config.clone(),
            tariff_agent,
        );
        Self {
            llm,
            validator,
            config,
            gate,
        }
    }

    /// Process one batch of uploads for a region.
    ///
    /// On cancellation no new jobs start, in-flight work is abandoned,
    /// and partially written directories are left in place.
    pub async fn process_batch(
        self: Arc<Self>,
        files: Vec<FileUpload>,
        region: Region,
        cancel: CancellationToken,
    ) -> Result<RunManifest, EngineError> {
        if files.is_empty() {
            return Err(EngineError::InvalidInput("no files uploaded".to_string()));
        }

        let total_files = files.len();
        let run = allocate_run(&self.config.output_dir, chrono::Local::now().date_naive()).await?;
        let groups = partition(files);
        let total_jobs = groups.len();

        tracing::info!(
            run_id = %run.run_id,
            region = %region,
            files = total_files,
            jobs = total_jobs,
            "batch processing started"
        );

        let job_limit = Arc::new(Semaphore::new(self.config.max_parallel_jobs));
        let mut handles = Vec::with_capacity(total_jobs);

        for group in groups {
            let engine = self.clone();
            let run_path = run.run_path.clone();
            let job_limit = job_limit.clone();
            let cancel = cancel.clone();
            let job_id = group.job_id.clone();

            let handle = tokio::spawn(async move {
                let _permit = job_limit
                    .acquire_owned()
                    .await
                    .expect("job semaphore closed");
                if cancel.is_cancelled() {
                    return None;
                }
                tokio::select! {
                    _ = cancel.cancelled() => None,
                    job = engine.process_job(run_path, region, group) => Some(job),
                }
            });
            handles.push((job_id, handle));
        }

        let mut jobs = Vec::with_capacity(total_jobs);
        for (job_id, handle) in handles {
            match handle.await {
                Ok(Some(job)) => jobs.push(job),
                Ok(None) => {}
                Err(join_error) => {
                    tracing::error!(job_id, error = %join_error, "job task aborted");
                    jobs.push(ProcessedJob {
                        job_folder: run.run_path.join(format!("job_{job_id}")).display().to_string(),
                        job_id,
                        file_count: 0,
                        classified_files: vec![],
                        validation_results: None,
                        validation_file: None,
                        error: Some(format!("job task aborted: {join_error}")),
                    });
                }
            }
        }

        if cancel.is_cancelled() {
            tracing::warn!(run_id = %run.run_id, "batch processing cancelled");
            return Err(EngineError::Cancelled);
        }

        tracing::info!(
            run_id = %run.run_id,
            jobs = jobs.len(),
            "batch processing complete"
        );

        Ok(RunManifest {
            run_id: run.run_id,
            run_path: run.run_path.display().to_string(),
            region,
            total_files,
            total_jobs,
            jobs,
        })
    }

    /// Run one job, converting any failure into its manifest entry.
    async fn process_job(
        self: Arc<Self>,
        run_path: std::path::PathBuf,
        region: Region,
        group: JobGroup,
    ) -> ProcessedJob {
        let job_id = group.job_id.clone();
        let file_count = group.files.len();

        match self.run_job(&run_path, region, group).await {
            Ok(job) => job,
            Err(error) => {
                tracing::warn!(job_id, error = %error, "job failed");
                ProcessedJob {
                    job_folder: run_path.join(format!("job_{job_id}")).display().to_string(),
                    job_id,
                    file_count,
                    classified_files: vec![],
                    validation_results: None,
                    validation_file: None,
                    error: Some(error.to_string()),
                }
            }
        }
    }

    async fn run_job(
        self: Arc<Self>,
        run_path: &Path,
        region: Region,
        group: JobGroup,
    ) -> Result<ProcessedJob, EngineError> {
        let job_id = group.job_id;
        let job_path = create_job_directory(run_path, &job_id).await?;
        tracing::info!(job_id, files = group.files.len(), "processing job");

        // Classify and persist every file, bounded per job.
        let file_limit = Arc::new(Semaphore::new(self.config.max_parallel_files));
        let mut tasks = JoinSet::new();
        let file_count = group.files.len();

        for (index, file) in group.files.into_iter().enumerate() {
            let engine = self.clone();
            let job_path = job_path.clone();
            let file_limit = file_limit.clone();
            tasks.spawn(async move {
                let _permit = file_limit
                    .acquire_owned()
                    .await
                    .expect("file semaphore closed");
                let saved = engine.process_file(&job_path, &file).await;
                (index, saved)
            });
        }

        let mut files: Vec<Option<SavedFile>> = (0..file_count).map(|_| None).collect();
        while let Some(joined) = tasks.join_next().await {
            let (index, saved) =
                joined.map_err(|e| EngineError::Io(std::io::Error::other(e)))?;
            files[index] = Some(saved?);
        }
        let mut files: Vec<SavedFile> = files.into_iter().flatten().collect();

        // Designate at most one file per non-`other` type; extraction and
        // validation only ever see designated files.
        let entry_index = designated_index(&files, DocumentType::EntryPrint);
        let invoice_index = designated_index(&files, DocumentType::CommercialInvoice);
        let waybill_index = designated_index(&files, DocumentType::AirWaybill);

        let (entry_record, invoice_record) = tokio::join!(
            self.extract_designated(&files, entry_index),
            self.extract_designated(&files, invoice_index),
        );
        let entry_record = entry_record?;
        let invoice_record = invoice_record?;

        if let (Some(index), Some(record)) = (entry_index, &entry_record) {
            files[index].classified.extracted_data = Some(record.clone());
        }
        if let (Some(index), Some(record)) = (invoice_index, &invoice_record) {
            files[index].classified.extracted_data = Some(record.clone());
        }

        // Validation needs both designated PDFs on disk.
        let mut validation_results = None;
        let mut validation_file = None;
        let mut error = None;

        if let (Some(entry_index), Some(invoice_index)) = (entry_index, invoice_index) {
            let documents = ValidationDocuments {
                entry_print: read_saved(&files[entry_index]).await?,
                commercial_invoice: read_saved(&files[invoice_index]).await?,
                air_waybill: match waybill_index {
                    Some(index) => Some(read_saved(&files[index]).await?),
                    None => None,
                },
            };

            let extraction_pair = match (&entry_record, &invoice_record) {
                (
                    Some(ExtractedRecord::EntryPrint(entry)),
                    Some(ExtractedRecord::CommercialInvoice(invoice)),
                ) => Some((entry, invoice)),
                _ => None,
            };

            match self
                .validator
                .validate_job(region, &documents, extraction_pair)
                .await
            {
                Ok(result) => {
                    // At the run root, by contract: reporting globs
                    // `*_validation_*.json` once per run.
                    let filename = format!("job_{job_id}_validation_{region}.json");
                    let path = run_path.join(&filename);
                    let report = ValidationReport {
                        job_id: &job_id,
                        region,
                        result: &result,
                    };
                    let body = serde_json::to_vec_pretty(&report)
                        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
                    tokio::fs::write(&path, body).await?;

                    tracing::info!(job_id, file = filename, "validation results saved");
                    validation_file = Some(path.display().to_string());
                    validation_results = Some(result);
                }
                Err(validation_error) => {
                    tracing::warn!(job_id, error = %validation_error, "checklist validation failed");
                    error = Some(format!("validation failed: {validation_error}"));
                }
            }
        } else {
            let mut missing = Vec::new();
            if entry_index.is_none() {
                missing.push(DocumentType::EntryPrint.as_str());
            }
            if invoice_index.is_none() {
                missing.push(DocumentType::CommercialInvoice.as_str());
            }
            tracing::info!(
                job_id,
                missing = missing.join(", "),
                "skipping validation, required documents missing"
            );
        }

        Ok(ProcessedJob {
            job_folder: job_path.display().to_string(),
            job_id,
            file_count,
            classified_files: files.into_iter().map(|f| f.classified).collect(),
            validation_results,
            validation_file,
            error,
        })
    }

    /// Classify one file and persist it under its classified label.
    async fn process_file(&self, job_path: &Path, file: &FileUpload) -> Result<SavedFile, EngineError> {
        let document_type = classify_document(
            self.llm.as_ref(),
            &self.gate,
            &self.config,
            &file.content,
            &file.filename,
        )
        .await;

        let saved_path =
            save_classified_pdf(&file.content, &file.filename, document_type, job_path).await?;
        let saved_filename = saved_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        tracing::info!(
            filename = %file.filename,
            document_type = %document_type,
            saved = %saved_filename,
            "classified and saved"
        );

        Ok(SavedFile {
            classified: ClassifiedFile {
                original_filename: file.filename.clone(),
                saved_filename,
                saved_path: saved_path.display().to_string(),
                document_type,
                extracted_data: None,
            },
            content: file.content.clone(),
        })
    }

    /// Extract the designated file of an active type, writing the record
    /// JSON next to its PDF. Extraction failure is recoverable: the PDF
    /// stays, the record is simply absent.
    async fn extract_designated(
        &self,
        files: &[SavedFile],
        index: Option<usize>,
    ) -> Result<Option<ExtractedRecord>, EngineError> {
        let Some(index) = index else {
            return Ok(None);
        };
        let file = &files[index];

        let record = extract_document(
            self.llm.as_ref(),
            &self.gate,
            &self.config,
            &file.content,
            &file.classified.original_filename,
            file.classified.document_type,
        )
        .await;

        if let Some(record) = &record {
            save_extraction_json(record, Path::new(&file.classified.saved_path)).await?;
        }
        Ok(record)
    }
}

/// The designated file of a type: lexicographically-first saved filename.
fn designated_index(files: &[SavedFile], document_type: DocumentType) -> Option<usize> {
    files
        .iter()
        .enumerate()
        .filter(|(_, file)| file.classified.document_type == document_type)
        .min_by(|(_, a), (_, b)| a.classified.saved_filename.cmp(&b.classified.saved_filename))
        .map(|(index, _)| index)
}

async fn read_saved(file: &SavedFile) -> Result<Bytes, EngineError> {
    let bytes = tokio::fs::read(&file.classified.saved_path).await?;
    Ok(Bytes::from(bytes))
}
