//! Composable router for the audit API.

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;

use super::endpoints;
use super::ApiContext;

/// Uploaded bundles can be large; cap the body well above any realistic
/// batch of scanned PDFs.
const MAX_BODY_BYTES: usize = 200 * 1024 * 1024;

pub fn api_router(ctx: ApiContext) -> Router {
    Router::new()
        .route("/api/process-batch", post(endpoints::batch::process_batch))
        .route("/api/upload-batch", post(endpoints::batch::upload_batch))
        .route(
            "/api/checklist/{region}",
            get(endpoints::checklist::get_checklist).put(endpoints::checklist::update_checklist),
        )
        .route("/health", get(endpoints::health::check))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .with_state(ctx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checklist::{fixtures, ChecklistStore, Region};
    use crate::config::EngineConfig;
    use crate::llm::retry::RetryPolicy;
    use crate::llm::MockLlmClient;
    use crate::pipeline::orchestrator::BatchEngine;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use std::sync::Arc;
    use tempfile::TempDir;
    use tower::ServiceExt;

    struct TestApp {
        router: Router,
        _output: TempDir,
        _checklists: TempDir,
    }

    fn test_app() -> TestApp {
        let output = TempDir::new().unwrap();
        let checklists = TempDir::new().unwrap();

        let checklist = fixtures::checklist(Region::Au, &["H1"], &["V1"]);
        std::fs::write(
            checklists.path().join("au_checklist.json"),
            serde_json::to_vec_pretty(&checklist).unwrap(),
        )
        .unwrap();

        let store = Arc::new(ChecklistStore::new(checklists.path().to_path_buf()));
        let config = EngineConfig {
            output_dir: output.path().to_path_buf(),
            retry: RetryPolicy::immediate(2),
            ..EngineConfig::default()
        };
        let engine = Arc::new(BatchEngine::new(
            Arc::new(MockLlmClient::new(r#"{"document_type": "other"}"#)),
            store.clone(),
            None,
            config,
        ));

        TestApp {
            router: api_router(ApiContext::new(engine, store)),
            _output: output,
            _checklists: checklists,
        }
    }

    fn multipart_body(boundary: &str, files: &[(&str, &[u8])]) -> Body {
        let mut body = Vec::new();
        for (filename, content) in files {
            body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
            body.extend_from_slice(
                format!(
                    "Content-Disposition: form-data; name=\"files\"; filename=\"{filename}\"\r\n"
                )
                .as_bytes(),
            );
            body.extend_from_slice(b"Content-Type: application/pdf\r\n\r\n");
            body.extend_from_slice(content);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());
        Body::from(body)
    }

    #[tokio::test]
    async fn health_reports_the_service() {
        let app = test_app();
        let response = app
            .router
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), 1024).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "healthy");
        assert_eq!(json["service"], "customs-audit");
    }

    #[tokio::test]
    async fn invalid_region_is_rejected_with_400() {
        let app = test_app();
        let boundary = "test-boundary";
        let response = app
            .router
            .oneshot(
                Request::post("/api/process-batch?region=UK")
                    .header(
                        "content-type",
                        format!("multipart/form-data; boundary={boundary}"),
                    )
                    .body(multipart_body(boundary, &[("1_ENT.pdf", b"%PDF-1.4")]))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = to_bytes(response.into_body(), 4096).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"]["message"], "Region must be 'AU' or 'NZ'");
    }

    #[tokio::test]
    async fn empty_multipart_is_rejected_with_400() {
        let app = test_app();
        let boundary = "test-boundary";
        let response = app
            .router
            .oneshot(
                Request::post("/api/upload-batch")
                    .header(
                        "content-type",
                        format!("multipart/form-data; boundary={boundary}"),
                    )
                    .body(multipart_body(boundary, &[]))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn upload_batch_groups_without_processing() {
        let app = test_app();
        let boundary = "test-boundary";
        let response = app
            .router
            .oneshot(
                Request::post("/api/upload-batch")
                    .header(
                        "content-type",
                        format!("multipart/form-data; boundary={boundary}"),
                    )
                    .body(multipart_body(
                        boundary,
                        &[
                            ("2219477116_AWB.pdf", b"%PDF-1.4"),
                            ("2219477116_ENT.pdf", b"%PDF-1.4"),
                            ("2555462195_INV.pdf", b"%PDF-1.4"),
                        ],
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), 65536).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["summary"]["total_files"], 3);
        assert_eq!(json["summary"]["total_jobs"], 2);
        assert_eq!(json["summary"]["jobs"][0]["job_id"], "2219477116");
        assert_eq!(json["summary"]["jobs"][0]["file_count"], 2);
    }

    #[tokio::test]
    async fn get_checklist_round_trips() {
        let app = test_app();
        let response = app
            .router
            .oneshot(Request::get("/api/checklist/AU").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), 65536).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["region"], "AU");
        assert_eq!(json["content"]["categories"]["header"]["checks"][0]["id"], "H1");
    }

    #[tokio::test]
    async fn get_checklist_rejects_unknown_region() {
        let app = test_app();
        let response = app
            .router
            .oneshot(Request::get("/api/checklist/US").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn put_checklist_updates_and_reads_back() {
        let app = test_app();
        let updated = fixtures::checklist(Region::Au, &["H1", "H2"], &["V1"]);
        let body = serde_json::json!({ "content": serde_json::to_value(&updated).unwrap() });

        let response = app
            .router
            .clone()
            .oneshot(
                Request::put("/api/checklist/AU")
                    .header("content-type", "application/json")
                    .body(Body::from(serde_json::to_vec(&body).unwrap()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .router
            .oneshot(Request::get("/api/checklist/AU").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let body = to_bytes(response.into_body(), 65536).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(
            json["content"]["categories"]["header"]["checks"]
                .as_array()
                .unwrap()
                .len(),
            2
        );
    }

    #[tokio::test]
    async fn put_checklist_rejects_region_mismatch() {
        let app = test_app();
        let mismatched = fixtures::checklist(Region::Nz, &["X1"], &[]);
        let body = serde_json::json!({ "content": serde_json::to_value(&mismatched).unwrap() });

        let response = app
            .router
            .oneshot(
                Request::put("/api/checklist/AU")
                    .header("content-type", "application/json")
                    .body(Body::from(serde_json::to_vec(&body).unwrap()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
