pub mod documents;
pub mod health;
pub mod jobs;
pub mod roles;
pub mod webhook;

use axum::{
    routing::{get, post, put},
    Router,
};

use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Jobs
        .route(
            "/api/jobs",
            post(jobs::handle_create_job).get(jobs::handle_list_jobs),
        )
        .route("/api/jobs/:id", get(jobs::handle_get_job))
        .route("/api/jobs/:id/resumes", post(jobs::handle_attach_resumes))
        .route("/api/jobs/:id/process", post(jobs::handle_process_job))
        .route("/api/jobs/:id/rerun", post(jobs::handle_rerun_job))
        .route("/api/jobs/:id/extract", post(jobs::handle_extract_job))
        .route("/api/jobs/:id/status", get(jobs::handle_job_status))
        .route("/api/jobs/:id/rankings", get(jobs::handle_rankings))
        // Documents
        .route("/api/documents", post(documents::handle_upload))
        .route(
            "/api/documents/manual",
            post(documents::handle_manual_extraction),
        )
        .route("/api/documents/:id", get(documents::handle_get_document))
        // Roles
        .route(
            "/api/roles",
            put(roles::handle_upsert_role).get(roles::handle_list_roles),
        )
        // Extraction provider callback
        .route("/api/idp/callback", post(webhook::handle_idp_callback))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use axum::body::{to_bytes, Body};
    use axum::http::{header, Method, Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use super::*;
    use crate::config::{Config, IdpConfig, LlmConfig, PipelineConfig};
    use crate::extraction::fixtures;
    use crate::idp::FixtureIdpAdapter;
    use crate::pipeline::test_support::pipeline_with;
    use crate::store::MemoryStore;

    fn test_state(callback_hmac_secret: Option<&str>) -> AppState {
        let store = Arc::new(MemoryStore::new());
        AppState {
            pipeline: pipeline_with(store.clone()),
            store,
            idp: Arc::new(FixtureIdpAdapter::new(Duration::ZERO)),
            config: Config {
                database_url: None,
                port: 0,
                rust_log: "debug".to_string(),
                idp: IdpConfig::default(),
                llm: LlmConfig::default(),
                pipeline: PipelineConfig::default(),
                callback_hmac_secret: callback_hmac_secret.map(String::from),
            },
        }
    }

    async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let request = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(json) => request
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string())),
            None => request.body(Body::empty()),
        }
        .unwrap();

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json)
    }

    fn multipart_upload(doc_type: &str, content: &[u8]) -> Request<Body> {
        let boundary = "grader-test-boundary";
        let mut body = Vec::new();
        for (name, value) in [("type", doc_type), ("jobNumber", "JOB-UP")] {
            body.extend_from_slice(
                format!(
                    "--{boundary}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
                )
                .as_bytes(),
            );
        }
        body.extend_from_slice(
            format!(
                "--{boundary}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"doc.pdf\"\r\nContent-Type: application/pdf\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(content);
        body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());

        Request::builder()
            .method(Method::POST)
            .uri("/api/documents")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={boundary}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let app = build_router(test_state(None));
        let (status, body) = send(&app, Method::GET, "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["service"], "grader-api");
        assert_eq!(body["idp"], "fixture");
    }

    #[tokio::test]
    async fn test_create_job_twice_returns_same_id() {
        let app = build_router(test_state(None));
        let payload = json!({"externalJobRef": "JOB-1"});

        let (first_status, first) = send(&app, Method::POST, "/api/jobs", Some(payload.clone())).await;
        let (second_status, second) = send(&app, Method::POST, "/api/jobs", Some(payload)).await;

        assert_eq!(first_status, StatusCode::CREATED);
        assert_eq!(second_status, StatusCode::OK);
        assert_eq!(first["jobId"], second["jobId"]);
        assert_eq!(first["created"], true);
        assert_eq!(second["created"], false);

        let (_, jobs) = send(&app, Method::GET, "/api/jobs", None).await;
        assert_eq!(jobs.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_create_job_requires_ref() {
        let app = build_router(test_state(None));
        let (status, body) =
            send(&app, Method::POST, "/api/jobs", Some(json!({"externalJobRef": "  "}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_rankings_before_ready_is_conflict() {
        let app = build_router(test_state(None));
        let (_, created) =
            send(&app, Method::POST, "/api/jobs", Some(json!({"externalJobRef": "JOB-2"}))).await;
        let job_id = created["jobId"].as_str().unwrap();

        let (status, body) =
            send(&app, Method::GET, &format!("/api/jobs/{job_id}/rankings"), None).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"]["code"], "JOB_NOT_READY");
    }

    #[tokio::test]
    async fn test_unknown_job_is_not_found() {
        let app = build_router(test_state(None));
        let uri = format!("/api/jobs/{}/status", uuid::Uuid::new_v4());
        let (status, body) = send(&app, Method::GET, &uri, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_manual_documents_then_process_to_rankings() {
        let state = test_state(None);
        let mut rx = state.pipeline.subscribe();
        let app = build_router(state);

        let (_, jd) = send(
            &app,
            Method::POST,
            "/api/documents/manual",
            Some(json!({"type": "JD", "jobNumber": "JOB-3", "extraction": fixtures::job_description()})),
        )
        .await;
        let (status, resume) = send(
            &app,
            Method::POST,
            "/api/documents/manual",
            Some(json!({"type": "RESUME", "jobNumber": "JOB-3", "extraction": fixtures::resumes()[0]})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        let (_, created) = send(
            &app,
            Method::POST,
            "/api/jobs",
            Some(json!({
                "externalJobRef": "JOB-3",
                "jdDocId": jd["document"]["id"],
                "resumeDocIds": [resume["document"]["id"]],
                "autoStart": true,
            })),
        )
        .await;
        let job_id: uuid::Uuid = serde_json::from_value(created["jobId"].clone()).unwrap();
        crate::pipeline::test_support::next_outcome(&mut rx, job_id).await;

        let (status, ranking) =
            send(&app, Method::GET, &format!("/api/jobs/{job_id}/rankings"), None).await;
        assert_eq!(status, StatusCode::OK);
        let ranking = ranking.as_array().unwrap();
        assert_eq!(ranking.len(), 1);
        assert_eq!(ranking[0]["reasons"].as_array().unwrap().len(), 3);

        let (_, report) =
            send(&app, Method::GET, &format!("/api/jobs/{job_id}/status"), None).await;
        assert_eq!(report["status"], "READY");
        assert_eq!(report["phases"]["extract_jd"], "DONE");
    }

    #[tokio::test]
    async fn test_multipart_jd_upload_dedups() {
        let app = build_router(test_state(None));

        let first = app
            .clone()
            .oneshot(multipart_upload("JD", b"%PDF-1.4 same"))
            .await
            .unwrap();
        let second = app
            .clone()
            .oneshot(multipart_upload("JD", b"%PDF-1.4 same"))
            .await
            .unwrap();
        assert_eq!(first.status(), StatusCode::CREATED);
        assert_eq!(second.status(), StatusCode::OK);

        let first: Value =
            serde_json::from_slice(&to_bytes(first.into_body(), usize::MAX).await.unwrap()).unwrap();
        let second: Value =
            serde_json::from_slice(&to_bytes(second.into_body(), usize::MAX).await.unwrap())
                .unwrap();
        assert_eq!(first["document"]["id"], second["document"]["id"]);
        assert_eq!(second["deduplicated"], true);
    }

    #[tokio::test]
    async fn test_callback_without_signature_is_unauthorized() {
        let app = build_router(test_state(Some("secret")));
        let (status, body) = send(
            &app,
            Method::POST,
            "/api/idp/callback",
            Some(json!({"externalJobRef": "JOB-4", "jd": {"title": "x"}})),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"]["code"], "UNAUTHORIZED");
    }

    #[tokio::test]
    async fn test_roles_dashboard_lists_upserted_role() {
        let app = build_router(test_state(None));
        let role = json!({"externalJobRef": "JOB-5", "title": "Designer"});
        let (status, _) = send(&app, Method::PUT, "/api/roles", Some(role.clone())).await;
        assert_eq!(status, StatusCode::OK);
        send(&app, Method::PUT, "/api/roles", Some(role)).await;

        let (_, roles) = send(&app, Method::GET, "/api/roles", None).await;
        let roles = roles.as_array().unwrap();
        assert_eq!(roles.len(), 1);
        assert_eq!(roles[0]["title"], "Designer");
        assert_eq!(roles[0]["graded"], 0);
    }

    #[tokio::test]
    async fn test_job_created_after_role_links_to_it() {
        let app = build_router(test_state(None));
        let (_, role) = send(
            &app,
            Method::PUT,
            "/api/roles",
            Some(json!({"externalJobRef": "JOB-6", "title": "Analyst"})),
        )
        .await;

        let (_, created) =
            send(&app, Method::POST, "/api/jobs", Some(json!({"externalJobRef": "JOB-6"}))).await;
        let job_id = created["jobId"].as_str().unwrap();
        let (_, job) = send(&app, Method::GET, &format!("/api/jobs/{job_id}"), None).await;

        assert_eq!(job["role_id"], role["id"]);
    }
}
