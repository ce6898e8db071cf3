//! Batch upload and processing endpoints.

use axum::extract::{Multipart, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::api::error::ApiError;
use crate::api::ApiContext;
use crate::checklist::Region;
use crate::pipeline::orchestrator::RunManifest;
use crate::pipeline::partition::partition;
use crate::pipeline::FileUpload;

#[derive(Deserialize)]
pub struct RegionQuery {
    pub region: Option<String>,
}

#[derive(Serialize)]
pub struct ProcessBatchResponse {
    pub success: bool,
    pub message: String,
    #[serde(flatten)]
    pub manifest: RunManifest,
}

#[derive(Serialize)]
pub struct FileInfo {
    pub filename: String,
    pub size: usize,
}

#[derive(Serialize)]
pub struct GroupedJobSummary {
    pub job_id: String,
    pub file_count: usize,
    pub files: Vec<FileInfo>,
}

#[derive(Serialize)]
pub struct UploadBatchSummary {
    pub total_files: usize,
    pub total_jobs: usize,
    pub jobs: Vec<GroupedJobSummary>,
}

#[derive(Serialize)]
pub struct UploadResponse {
    pub success: bool,
    pub message: String,
    pub summary: UploadBatchSummary,
}

fn parse_region(query: &RegionQuery) -> Result<Region, ApiError> {
    let raw = query.region.as_deref().unwrap_or("AU");
    Region::parse(raw).ok_or_else(|| ApiError::BadRequest("Region must be 'AU' or 'NZ'".into()))
}

/// Drain the multipart body into uploads, rejecting non-PDF parts.
async fn collect_files(mut multipart: Multipart) -> Result<Vec<FileUpload>, ApiError> {
    let mut files = Vec::new();

    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some("files") {
            continue;
        }

        let filename = field.file_name().unwrap_or("upload.pdf").to_string();
        if let Some(content_type) = field.content_type() {
            if content_type != "application/pdf" {
                return Err(ApiError::BadRequest(format!(
                    "file `{filename}` has content type `{content_type}`, expected application/pdf"
                )));
            }
        }

        let content = field.bytes().await?;
        files.push(FileUpload::new(filename, content));
    }

    if files.is_empty() {
        return Err(ApiError::BadRequest("No files uploaded".into()));
    }
    Ok(files)
}

/// Full batch processing: group, classify, persist, extract, validate.
pub async fn process_batch(
    State(ctx): State<ApiContext>,
    Query(query): Query<RegionQuery>,
    multipart: Multipart,
) -> Result<Json<ProcessBatchResponse>, ApiError> {
    let region = parse_region(&query)?;
    let files = collect_files(multipart).await?;

    tracing::info!(region = %region, files = files.len(), "batch processing requested");

    let manifest = ctx
        .engine
        .clone()
        .process_batch(files, region, CancellationToken::new())
        .await?;

    Ok(Json(ProcessBatchResponse {
        success: true,
        message: format!(
            "Batch processing complete: {} file(s) in {} job(s)",
            manifest.total_files, manifest.total_jobs
        ),
        manifest,
    }))
}

/// Partition-only variant: group files and report, without running the
/// pipeline.
pub async fn upload_batch(
    State(_ctx): State<ApiContext>,
    multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let files = collect_files(multipart).await?;
    let total_files = files.len();

    let groups = partition(files);
    let jobs: Vec<GroupedJobSummary> = groups
        .iter()
        .map(|group| GroupedJobSummary {
            job_id: group.job_id.clone(),
            file_count: group.files.len(),
            files: group
                .files
                .iter()
                .map(|file| FileInfo {
                    filename: file.filename.clone(),
                    size: file.content.len(),
                })
                .collect(),
        })
        .collect();

    tracing::info!(total_files, total_jobs = jobs.len(), "batch grouped");

    Ok(Json(UploadResponse {
        success: true,
        message: "Files grouped successfully".into(),
        summary: UploadBatchSummary {
            total_files,
            total_jobs: jobs.len(),
            jobs,
        },
    }))
}
