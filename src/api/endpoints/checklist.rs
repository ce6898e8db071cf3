//! Checklist read and hot-update endpoints.

use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::api::error::ApiError;
use crate::api::ApiContext;
use crate::checklist::{Checklist, Region};

#[derive(Serialize)]
pub struct ChecklistResponse {
    pub success: bool,
    pub region: Region,
    pub content: Checklist,
}

#[derive(Deserialize)]
pub struct ChecklistUpdateRequest {
    pub content: serde_json::Value,
}

#[derive(Serialize)]
pub struct ChecklistUpdateResponse {
    pub success: bool,
    pub message: String,
    pub region: Region,
}

fn parse_region(raw: &str) -> Result<Region, ApiError> {
    Region::parse(raw).ok_or_else(|| ApiError::BadRequest("Region must be 'AU' or 'NZ'".into()))
}

pub async fn get_checklist(
    State(ctx): State<ApiContext>,
    Path(region): Path<String>,
) -> Result<Json<ChecklistResponse>, ApiError> {
    let region = parse_region(&region)?;
    let checklist = ctx.checklists.load(region).await?;

    Ok(Json(ChecklistResponse {
        success: true,
        region,
        content: (*checklist).clone(),
    }))
}

pub async fn update_checklist(
    State(ctx): State<ApiContext>,
    Path(region): Path<String>,
    Json(request): Json<ChecklistUpdateRequest>,
) -> Result<Json<ChecklistUpdateResponse>, ApiError> {
    let region = parse_region(&region)?;
    ctx.checklists.replace(region, request.content).await?;

    Ok(Json(ChecklistUpdateResponse {
        success: true,
        message: format!("Checklist for {region} updated successfully"),
        region,
    }))
}
