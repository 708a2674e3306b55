// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP surface: the operator CLI and external callers both talk to the
//! daemon over this `axum` router, never the engine or storage directly.

use crate::auth::AuthGate;
use crate::log_sink::{LogQuery, LogSink, SortOrder};
use crate::state::AppState;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use relay_core::{LogEntry, LogId, LogLevel, LogSource, RelayError, Run, RunId, RunStatus};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/v1/logs", post(submit_log))
        .route("/v1/logs/:project", get(query_logs))
        .route("/v1/logs/:project/document/:document_id", get(logs_by_document))
        .route("/logs", get(query_logs_global))
        .route("/logs/batch", post(submit_log_batch))
        .route("/logs/:id", get(get_log))
        .route("/logs/cleanup", delete(cleanup_logs))
        .route("/logs/cleanup/all", delete(cleanup_logs_all))
        .route("/lifecycle/document/:document_id", get(lifecycle_by_document))
        .route("/lifecycle/file/:file_name", get(lifecycle_by_file))
        .route("/lifecycle/hash/:hash", get(lifecycle_by_hash))
        .route("/workflows/:id/runs", post(start_run))
        .route("/workflows/:id/runs/:run_id", get(get_run))
        .route("/workflows/:id/runs/:run_id/cancel", post(cancel_run))
        .route("/maintenance", post(run_maintenance))
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}

struct ApiError(RelayError);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, self.0.to_string()).into_response()
    }
}

impl From<RelayError> for ApiError {
    fn from(e: RelayError) -> Self {
        ApiError(e)
    }
}

/// Authorize a write (or any project-scoped, non-read) request: 401 for a
/// missing/unparseable key, 403 for a key that doesn't authorize `project`.
fn authorize(gate: &AuthGate, headers: &HeaderMap, project: &str) -> Result<(), ApiError> {
    let key = presented_key(headers)?;
    gate.authorize(key, project).map(|_| ()).ok_or(ApiError(RelayError::Forbidden(
        "api key not authorized for this project".into(),
    )))
}

/// Authorize a request against any configured key, ignoring project scope.
fn authorize_any(gate: &AuthGate, headers: &HeaderMap) -> Result<(), ApiError> {
    let key = presented_key(headers)?;
    gate.authorize_any(key)
        .map(|_| ())
        .ok_or(ApiError(RelayError::Forbidden("api key not recognized".into())))
}

/// Whether a read against `project` should proceed, per §4.8: an
/// unrecognized or expired key is still a hard 401/403 (the caller isn't
/// authenticated at all), but a key that simply isn't scoped to `project`
/// reads back as "no results", not an error.
enum ReadScope {
    Authorized,
    Unscoped,
}

fn authorize_read(gate: &AuthGate, headers: &HeaderMap, project: &str) -> Result<ReadScope, ApiError> {
    let key = presented_key(headers)?;
    if gate.authorize_any(key).is_none() {
        return Err(ApiError(RelayError::Forbidden("api key not recognized".into())));
    }
    if gate.authorize(key, project).is_some() {
        Ok(ReadScope::Authorized)
    } else {
        Ok(ReadScope::Unscoped)
    }
}

fn presented_key(headers: &HeaderMap) -> Result<&str, ApiError> {
    headers
        .get("x-api-key")
        .and_then(|v| v.to_str().ok())
        .ok_or(ApiError(RelayError::Unauthorized))
}

#[derive(Debug, Deserialize)]
struct SubmitLogRequest {
    project: String,
    level: String,
    module: String,
    message: String,
    #[serde(default)]
    document_id: Option<String>,
    #[serde(default)]
    file_name: Option<String>,
    #[serde(default)]
    details: Option<serde_json::Value>,
    #[serde(default)]
    context: Option<serde_json::Value>,
}

impl SubmitLogRequest {
    fn into_entry(self) -> Result<LogEntry, ApiError> {
        let level: LogLevel = self.level.parse().map_err(|e: String| ApiError(RelayError::InvalidRequest(e)))?;
        Ok(LogEntry {
            id: LogId::new(uuid::Uuid::new_v4().to_string()),
            project: self.project,
            level,
            module: self.module,
            message: self.message,
            document_id: self.document_id,
            file_name: self.file_name,
            details: self.details,
            context: self.context,
            source: LogSource::Api,
            timestamp_ms: now_ms(),
        })
    }
}

async fn submit_log(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<SubmitLogRequest>,
) -> Result<Json<LogEntry>, ApiError> {
    authorize(&state.auth, &headers, &body.project)?;
    let entry = body.into_entry()?;
    state.logs.append(entry.clone());
    Ok(Json(entry))
}

#[derive(Debug, Deserialize)]
struct SubmitLogBatchRequest {
    entries: Vec<SubmitLogRequest>,
}

#[derive(Debug, serde::Serialize)]
struct SubmitLogBatchResponse {
    ids: Vec<LogId>,
    count: usize,
}

/// Batch insert is all-or-nothing: every entry in the request is validated
/// before any is appended, so a caller never has to reconcile a partially
/// applied batch — it either lands in full or gets resent whole.
async fn submit_log_batch(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<SubmitLogBatchRequest>,
) -> Result<Json<SubmitLogBatchResponse>, ApiError> {
    for req in &body.entries {
        authorize(&state.auth, &headers, &req.project)?;
    }
    let entries: Vec<LogEntry> = body
        .entries
        .into_iter()
        .map(SubmitLogRequest::into_entry)
        .collect::<Result<_, _>>()?;

    let ids = entries.iter().map(|e| e.id.clone()).collect();
    let count = entries.len();
    for entry in entries {
        state.logs.append(entry);
    }
    Ok(Json(SubmitLogBatchResponse { ids, count }))
}

#[derive(Debug, Deserialize, Default)]
struct QueryParams {
    level: Option<String>,
    module: Option<String>,
    document_id: Option<String>,
    file_name: Option<String>,
    start_date: Option<i64>,
    end_date: Option<i64>,
    #[serde(default = "default_sort_order")]
    sort_order: String,
    #[serde(default = "default_limit")]
    limit: usize,
    #[serde(default)]
    offset: usize,
}

fn default_limit() -> usize {
    100
}

fn default_sort_order() -> String {
    "desc".into()
}

impl QueryParams {
    fn into_query(self, project: Option<String>) -> Result<LogQuery, ApiError> {
        let level = self
            .level
            .map(|l| l.parse::<LogLevel>())
            .transpose()
            .map_err(|e| ApiError(RelayError::InvalidRequest(e)))?;
        let sort_order = match self.sort_order.as_str() {
            "asc" => SortOrder::Asc,
            "desc" => SortOrder::Desc,
            other => return Err(ApiError(RelayError::InvalidRequest(format!("invalid sort_order `{other}`")))),
        };
        Ok(LogQuery {
            project,
            level,
            module: self.module,
            document_id: self.document_id,
            file_name: self.file_name,
            start_date_ms: self.start_date,
            end_date_ms: self.end_date,
            sort_order,
            limit: self.limit,
            offset: self.offset,
        })
    }
}

async fn query_logs(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(project): Path<String>,
    Query(params): Query<QueryParams>,
) -> Result<Json<Vec<LogEntry>>, ApiError> {
    match authorize_read(&state.auth, &headers, &project)? {
        ReadScope::Unscoped => Ok(Json(Vec::new())),
        ReadScope::Authorized => {
            let query = params.into_query(Some(project))?;
            Ok(Json(state.logs.query(&query)))
        }
    }
}

#[derive(Debug, Deserialize, Default)]
struct GlobalQueryParams {
    project: Option<String>,
    level: Option<String>,
    module: Option<String>,
    document_id: Option<String>,
    file_name: Option<String>,
    start_date: Option<i64>,
    end_date: Option<i64>,
    #[serde(default = "default_sort_order")]
    sort_order: String,
    #[serde(default = "default_limit")]
    limit: usize,
    #[serde(default)]
    offset: usize,
}

impl GlobalQueryParams {
    fn into_query_params(self) -> (Option<String>, QueryParams) {
        (
            self.project,
            QueryParams {
                level: self.level,
                module: self.module,
                document_id: self.document_id,
                file_name: self.file_name,
                start_date: self.start_date,
                end_date: self.end_date,
                sort_order: self.sort_order,
                limit: self.limit,
                offset: self.offset,
            },
        )
    }
}

/// `GET /logs`: the unscoped read path. Requires any recognized key (not
/// tied to `project`, since a request with no `project` filter spans every
/// tenant); a `project` filter still narrows results, but never widens
/// visibility beyond what the key would see via `GET /v1/logs/{project}`.
async fn query_logs_global(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<GlobalQueryParams>,
) -> Result<Json<Vec<LogEntry>>, ApiError> {
    authorize_any(&state.auth, &headers)?;
    let (project, rest) = params.into_query_params();
    if let Some(project) = &project {
        if let ReadScope::Unscoped = authorize_read(&state.auth, &headers, project)? {
            return Ok(Json(Vec::new()));
        }
    }
    let query = rest.into_query(project)?;
    Ok(Json(state.logs.query(&query)))
}

async fn get_log(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<LogEntry>, ApiError> {
    authorize_any(&state.auth, &headers)?;
    state
        .logs
        .get_by_id(&LogId::new(id.clone()))
        .map(Json)
        .ok_or_else(|| ApiError(RelayError::NotFound(format!("log `{id}` not found"))))
}

async fn logs_by_document(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((project, document_id)): Path<(String, String)>,
) -> Result<Json<Vec<LogEntry>>, ApiError> {
    match authorize_read(&state.auth, &headers, &project)? {
        ReadScope::Unscoped => Ok(Json(Vec::new())),
        ReadScope::Authorized => Ok(Json(state.logs.by_document(&project, &document_id))),
    }
}

async fn lifecycle_by_document(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(document_id): Path<String>,
) -> Result<Json<Vec<LogEntry>>, ApiError> {
    authorize_any(&state.auth, &headers)?;
    Ok(Json(state.logs.lifecycle_by_document(&document_id)))
}

async fn lifecycle_by_file(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(file_name): Path<String>,
) -> Result<Json<Vec<LogEntry>>, ApiError> {
    authorize_any(&state.auth, &headers)?;
    Ok(Json(state.logs.lifecycle_by_file(&file_name)))
}

async fn lifecycle_by_hash(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(hash): Path<String>,
) -> Result<Json<Vec<LogEntry>>, ApiError> {
    authorize_any(&state.auth, &headers)?;
    Ok(Json(state.logs.lifecycle_by_hash(&hash)))
}

#[derive(Debug, Deserialize, Default)]
struct CleanupParams {
    project: Option<String>,
    #[serde(default)]
    before_date: Option<i64>,
}

async fn cleanup_logs(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<CleanupParams>,
) -> Result<Json<crate::log_sink::MaintenanceReport>, ApiError> {
    authorize_any(&state.auth, &headers)?;
    let before_ms = params.before_date.unwrap_or_else(now_ms);
    Ok(Json(state.logs.cleanup(params.project.as_deref(), before_ms)))
}

async fn cleanup_logs_all(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<crate::log_sink::MaintenanceReport>, ApiError> {
    authorize_any(&state.auth, &headers)?;
    Ok(Json(state.logs.cleanup_all()))
}

#[derive(Debug, Deserialize, Default)]
struct StartRunRequest {
    #[serde(default)]
    inputs: HashMap<String, serde_json::Value>,
}

#[derive(Debug, serde::Serialize)]
struct StartRunResponse {
    run_id: RunId,
    status: RunStatus,
}

async fn start_run(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(workflow_id): Path<String>,
    body: axum::body::Bytes,
) -> Result<Json<StartRunResponse>, ApiError> {
    authorize_any(&state.auth, &headers)?;
    let def = state
        .workflows
        .get(&workflow_id)
        .cloned()
        .ok_or_else(|| ApiError(RelayError::NotFound(format!("workflow `{workflow_id}` not found"))))?;

    let inputs = if body.is_empty() {
        HashMap::new()
    } else {
        serde_json::from_slice::<StartRunRequest>(&body)
            .map_err(|e| ApiError(RelayError::InvalidRequest(e.to_string())))?
            .inputs
    };
    let run = Run::new(RunId::new(uuid::Uuid::new_v4().to_string()), def.id.clone(), def.version, inputs, now_ms());
    let run_id = run.id.clone();
    let cancel = state.runs.start(run.clone());

    let engine = state.engine.clone();
    let runs = state.runs.clone();
    tokio::spawn(async move {
        let mut run = run;
        if let Err(e) = engine.run_cancellable(&def, &mut run, Some(&cancel)).await {
            tracing::warn!(run_id = run.id.short(8), error = %e, "manually triggered run failed");
        }
        runs.finish(run);
    });

    Ok(Json(StartRunResponse { run_id, status: RunStatus::Running }))
}

async fn get_run(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((_workflow_id, run_id)): Path<(String, String)>,
) -> Result<Json<Run>, ApiError> {
    authorize_any(&state.auth, &headers)?;
    state
        .runs
        .get(&RunId::new(run_id.clone()))
        .map(Json)
        .ok_or_else(|| ApiError(RelayError::NotFound(format!("run `{run_id}` not found"))))
}

async fn cancel_run(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((_workflow_id, run_id)): Path<(String, String)>,
) -> Result<StatusCode, ApiError> {
    authorize_any(&state.auth, &headers)?;
    if state.runs.request_cancel(&RunId::new(run_id.clone())) {
        Ok(StatusCode::ACCEPTED)
    } else {
        Err(ApiError(RelayError::NotFound(format!("run `{run_id}` not found"))))
    }
}

#[derive(Debug, serde::Serialize)]
struct MaintenanceResponse {
    projects_swept: usize,
    entries_dropped: usize,
    entries_remaining: usize,
    entries_archived: usize,
    archives_expired: usize,
}

async fn run_maintenance(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<MaintenanceResponse>, ApiError> {
    authorize_any(&state.auth, &headers)?;
    let report = state.logs.sweep(now_ms(), &state.retention_policy, &state.archives_dir);
    Ok(Json(MaintenanceResponse {
        projects_swept: report.projects_swept,
        entries_dropped: report.entries_dropped,
        entries_remaining: report.entries_remaining,
        entries_archived: report.entries_archived,
        archives_expired: report.archives_expired,
    }))
}

fn now_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use relay_engine::Engine;
    use relay_exec::ProcessorRegistry;
    use tower::ServiceExt;

    fn state_with_key(key: &str) -> AppState {
        let dir = tempfile::tempdir().unwrap();
        let keys_path = dir.path().join("api_keys.json");
        std::fs::write(
            &keys_path,
            format!(r#"[{{"name": "n", "key": "{key}", "allowed_projects": [], "expires_at": null}}]"#),
        )
        .unwrap();
        let mut state = AppState::new(
            AuthGate::load(keys_path),
            LogSink::new(),
            std::sync::Arc::new(HashMap::new()),
            std::sync::Arc::new(Engine::new(ProcessorRegistry::with_builtins())),
            dir.path().join("archives"),
            crate::log_sink::RetentionPolicy::from_days(30),
        );
        state._keep_dir = std::sync::Arc::new(dir);
        state
    }

    fn scoped_state(key: &str, project: &str) -> AppState {
        let dir = tempfile::tempdir().unwrap();
        let keys_path = dir.path().join("api_keys.json");
        std::fs::write(
            &keys_path,
            format!(r#"[{{"name": "n", "key": "{key}", "allowed_projects": ["{project}"], "expires_at": null}}]"#),
        )
        .unwrap();
        let mut state = AppState::new(
            AuthGate::load(keys_path),
            LogSink::new(),
            std::sync::Arc::new(HashMap::new()),
            std::sync::Arc::new(Engine::new(ProcessorRegistry::with_builtins())),
            dir.path().join("archives"),
            crate::log_sink::RetentionPolicy::from_days(30),
        );
        state._keep_dir = std::sync::Arc::new(dir);
        state
    }

    #[tokio::test]
    async fn healthz_is_unauthenticated() {
        let app = router(state_with_key("secret"));
        let response = app
            .oneshot(Request::builder().uri("/healthz").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn submit_log_requires_api_key() {
        let app = router(state_with_key("secret"));
        let body = serde_json::json!({"project": "p", "level": "info", "module": "m", "message": "hi"});
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/v1/logs")
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn submit_then_query_roundtrips() {
        let app = router(state_with_key("secret"));
        let body = serde_json::json!({"project": "p", "level": "info", "module": "m", "message": "hi"});
        let submit = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/v1/logs")
                    .header("content-type", "application/json")
                    .header("x-api-key", "secret")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(submit.status(), StatusCode::OK);

        let query = app
            .oneshot(
                Request::builder()
                    .uri("/v1/logs/p")
                    .header("x-api-key", "secret")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(query.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn unscoped_key_reads_back_empty_not_forbidden() {
        let app = router(scoped_state("secret", "allowed-project"));
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/v1/logs/other-project")
                    .header("x-api-key", "secret")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let rows: Vec<LogEntry> = serde_json::from_slice(&bytes).unwrap();
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn unrecognized_key_still_rejected_on_reads() {
        let app = router(scoped_state("secret", "allowed-project"));
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/v1/logs/allowed-project")
                    .header("x-api-key", "wrong")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn batch_submit_is_all_or_nothing_on_validation_failure() {
        let app = router(state_with_key("secret"));
        let body = serde_json::json!({"entries": [
            {"project": "p", "level": "info", "module": "m", "message": "ok"},
            {"project": "p", "level": "bogus", "module": "m", "message": "bad"},
        ]});
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/logs/batch")
                    .header("content-type", "application/json")
                    .header("x-api-key", "secret")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let query = app
            .oneshot(
                Request::builder()
                    .uri("/v1/logs/p")
                    .header("x-api-key", "secret")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let bytes = axum::body::to_bytes(query.into_body(), usize::MAX).await.unwrap();
        let rows: Vec<LogEntry> = serde_json::from_slice(&bytes).unwrap();
        assert!(rows.is_empty(), "a rejected batch must not partially land");
    }

    #[tokio::test]
    async fn get_log_by_id_is_project_agnostic() {
        let app = router(state_with_key("secret"));
        let body = serde_json::json!({"project": "p", "level": "info", "module": "m", "message": "hi"});
        let submit = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/v1/logs")
                    .header("content-type", "application/json")
                    .header("x-api-key", "secret")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        let bytes = axum::body::to_bytes(submit.into_body(), usize::MAX).await.unwrap();
        let entry: LogEntry = serde_json::from_slice(&bytes).unwrap();

        let fetch = app
            .oneshot(
                Request::builder()
                    .uri(format!("/logs/{}", entry.id.as_str()))
                    .header("x-api-key", "secret")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(fetch.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn cleanup_all_requires_a_key_and_wipes_everything() {
        let app = router(state_with_key("secret"));
        let rejected = app
            .clone()
            .oneshot(Request::builder().method("DELETE").uri("/logs/cleanup/all").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(rejected.status(), StatusCode::UNAUTHORIZED);

        let accepted = app
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri("/logs/cleanup/all")
                    .header("x-api-key", "secret")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(accepted.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn starting_a_run_against_an_unknown_workflow_is_not_found() {
        let app = router(state_with_key("secret"));
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/workflows/ghost/runs")
                    .header("x-api-key", "secret")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn cancelling_an_unknown_run_is_not_found() {
        let app = router(state_with_key("secret"));
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/workflows/wf/runs/ghost/cancel")
                    .header("x-api-key", "secret")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn maintenance_requires_api_key() {
        let app = router(state_with_key("secret"));
        let rejected = app
            .clone()
            .oneshot(Request::builder().method("POST").uri("/maintenance").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(rejected.status(), StatusCode::UNAUTHORIZED);

        let accepted = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/maintenance")
                    .header("x-api-key", "secret")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(accepted.status(), StatusCode::OK);
    }
}
