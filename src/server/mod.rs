// SPDX-License-Identifier: MIT

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::net::SocketAddr;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::config::Settings;
use crate::task::{CreateTaskRequest, TaskManager, TaskStatus};

pub async fn serve(port: u16) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let manager = TaskManager::new(Settings::from_env())?;

    let app = Router::new()
        .route("/api/health", get(health_check))
        .route("/api/tasks", post(create_task).get(list_tasks))
        .route("/api/tasks/{id}", get(get_task))
        .route("/api/tasks/{id}/clarify", post(clarify_task))
        .route("/api/tasks/{id}/summary", get(get_summary))
        .route("/api/tasks/{id}/download", get(download_spreadsheet))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(manager);

    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    log::info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn health_check() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn create_task(
    State(manager): State<TaskManager>,
    Json(payload): Json<CreateTaskRequest>,
) -> impl IntoResponse {
    match manager.create_task(payload).await {
        Ok(task) => (StatusCode::OK, Json(json!(task))),
        Err(e) => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": e.to_string() })),
        ),
    }
}

async fn list_tasks(State(manager): State<TaskManager>) -> Json<Value> {
    let tasks = manager.store().list().await;
    Json(json!({ "total": tasks.len(), "tasks": tasks }))
}

async fn get_task(State(manager): State<TaskManager>, Path(id): Path<i64>) -> impl IntoResponse {
    match manager.store().get(id).await {
        Some(task) => (StatusCode::OK, Json(json!(task))),
        None => (StatusCode::NOT_FOUND, Json(json!({ "error": "任务不存在" }))),
    }
}

#[derive(Deserialize)]
struct ClarifyRequest {
    clarification_input: String,
}

async fn clarify_task(
    State(manager): State<TaskManager>,
    Path(id): Path<i64>,
    Json(payload): Json<ClarifyRequest>,
) -> impl IntoResponse {
    match manager.clarify(id, payload.clarification_input).await {
        Ok(task) => (StatusCode::OK, Json(json!(task))),
        Err(e) => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": e.to_string() })),
        ),
    }
}

async fn get_summary(State(manager): State<TaskManager>, Path(id): Path<i64>) -> impl IntoResponse {
    let Some(task) = manager.store().get(id).await else {
        return (StatusCode::NOT_FOUND, Json(json!({ "error": "任务不存在" })));
    };

    let Some(summary_path) = task.output_summary else {
        return (StatusCode::BAD_REQUEST, Json(json!({ "error": "无总结内容" })));
    };

    match manager.extractor().read_summary(&summary_path) {
        Some(content) => (StatusCode::OK, Json(json!({ "summary": content }))),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "总结文件不存在" })),
        ),
    }
}

async fn download_spreadsheet(
    State(manager): State<TaskManager>,
    Path(id): Path<i64>,
) -> impl IntoResponse {
    let Some(task) = manager.store().get(id).await else {
        return (StatusCode::NOT_FOUND, Json(json!({ "error": "任务不存在" }))).into_response();
    };

    if task.status != TaskStatus::Finished {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "任务未完成或无输出文件" })),
        )
            .into_response();
    }

    let Some(path) = task.output_spreadsheet else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "任务未完成或无输出文件" })),
        )
            .into_response();
    };

    match tokio::fs::read(&path).await {
        Ok(bytes) => {
            let download_name = format!(
                "{}.xlsx",
                crate::extract::sanitize_filename(&task.original_filename)
            );
            (
                [
                    (
                        header::CONTENT_TYPE,
                        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
                            .to_string(),
                    ),
                    (
                        header::CONTENT_DISPOSITION,
                        format!("attachment; filename=\"{}\"", download_name),
                    ),
                ],
                bytes,
            )
                .into_response()
        }
        Err(_) => (StatusCode::NOT_FOUND, Json(json!({ "error": "文件不存在" }))).into_response(),
    }
}
