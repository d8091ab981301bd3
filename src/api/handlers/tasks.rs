//! `/tasks` resource. Reads need any authenticated caller; writes need admin.

use axum::{
    extract::{rejection::JsonRejection, Extension, Path},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;
use tracing::debug;

use super::{bad_request, ErrorBody, MessageBody};
use crate::{
    auth::Principal,
    error::Error,
    tasks::{Task, TaskInput, TaskStore},
};

const INVALID_BODY: &str = "invalid request body";

fn task_not_found() -> Response {
    Error::NotFound("Task not found".to_string()).into_response()
}

#[utoipa::path(
    get,
    path= "/tasks",
    responses (
        (status = 200, description = "All tasks in creation order", body = [Task]),
        (status = 401, description = "Missing or invalid token", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag= "tasks"
)]
pub async fn list_tasks(tasks: Extension<Arc<TaskStore>>) -> Response {
    match tasks.get_all().await {
        Ok(all) => (StatusCode::OK, Json(all)).into_response(),
        Err(err) => err.into_response(),
    }
}

#[utoipa::path(
    get,
    path= "/tasks/{id}",
    params(("id" = String, Path, description = "Task id (UUID)")),
    responses (
        (status = 200, description = "Task", body = Task),
        (status = 400, description = "Malformed id", body = ErrorBody),
        (status = 401, description = "Missing or invalid token", body = ErrorBody),
        (status = 404, description = "Task not found", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag= "tasks"
)]
pub async fn get_task(tasks: Extension<Arc<TaskStore>>, Path(id): Path<String>) -> Response {
    match tasks.get_by_id(&id).await {
        Ok(Some(task)) => (StatusCode::OK, Json(task)).into_response(),
        Ok(None) => task_not_found(),
        Err(err) => err.into_response(),
    }
}

#[utoipa::path(
    post,
    path= "/tasks",
    request_body = TaskInput,
    responses (
        (status = 201, description = "Task created", body = Task),
        (status = 400, description = "Missing title or invalid body", body = ErrorBody),
        (status = 401, description = "Missing or invalid token", body = ErrorBody),
        (status = 403, description = "Caller is not admin", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag= "tasks"
)]
pub async fn create_task(
    tasks: Extension<Arc<TaskStore>>,
    Extension(principal): Extension<Principal>,
    payload: Result<Json<TaskInput>, JsonRejection>,
) -> Response {
    let Ok(Json(input)) = payload else {
        return bad_request(INVALID_BODY);
    };

    match tasks.create(input).await {
        Ok(task) => {
            debug!("Task {} created by {}", task.id, principal.username);
            (StatusCode::CREATED, Json(task)).into_response()
        }
        Err(err) => err.into_response(),
    }
}

#[utoipa::path(
    put,
    path= "/tasks/{id}",
    params(("id" = String, Path, description = "Task id (UUID)")),
    request_body = TaskInput,
    responses (
        (status = 200, description = "Task after merging the supplied fields", body = Task),
        (status = 400, description = "Malformed id, invalid body or no fields to update", body = ErrorBody),
        (status = 401, description = "Missing or invalid token", body = ErrorBody),
        (status = 403, description = "Caller is not admin", body = ErrorBody),
        (status = 404, description = "Task not found", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag= "tasks"
)]
pub async fn update_task(
    tasks: Extension<Arc<TaskStore>>,
    Path(id): Path<String>,
    payload: Result<Json<TaskInput>, JsonRejection>,
) -> Response {
    let Ok(Json(input)) = payload else {
        return bad_request(INVALID_BODY);
    };

    match tasks.update(&id, input).await {
        Ok(Some(task)) => (StatusCode::OK, Json(task)).into_response(),
        Ok(None) => task_not_found(),
        Err(err) => err.into_response(),
    }
}

#[utoipa::path(
    delete,
    path= "/tasks/{id}",
    params(("id" = String, Path, description = "Task id (UUID)")),
    responses (
        (status = 200, description = "Task deleted", body = MessageBody),
        (status = 400, description = "Malformed id", body = ErrorBody),
        (status = 401, description = "Missing or invalid token", body = ErrorBody),
        (status = 403, description = "Caller is not admin", body = ErrorBody),
        (status = 404, description = "Task not found", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag= "tasks"
)]
pub async fn delete_task(tasks: Extension<Arc<TaskStore>>, Path(id): Path<String>) -> Response {
    match tasks.delete(&id).await {
        Ok(true) => (
            StatusCode::OK,
            Json(MessageBody {
                message: "Task deleted successfully".to_string(),
            }),
        )
            .into_response(),
        Ok(false) => task_not_found(),
        Err(err) => err.into_response(),
    }
}
