//! HTTP handlers. Each one validates input, delegates to the runner or
//! scheduler, and maps the typed error kinds onto status codes.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::mpsc;
use uuid::Uuid;

use super::{StreamMessage, WebState};
use crate::core::models::SnapraidCommand;
use crate::core::{NewSchedule, SchedulePatch, SchedulerError};
use crate::parse;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunRequest {
    pub command: String,
    #[serde(default)]
    pub config_path: Option<String>,
    #[serde(default)]
    pub args: Option<Vec<String>>,
}

pub async fn run_command(State(state): State<WebState>, Json(req): Json<RunRequest>) -> Response {
    let Some(command) = SnapraidCommand::from_str(&req.command) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": format!("unknown command: {}", req.command)})),
        )
            .into_response();
    };

    // friendlier than the Busy error the runner would raise; the runner
    // still enforces the slot if two requests race past this check
    if let Some(job) = state.ctx.runner.current_job().await {
        return (
            StatusCode::CONFLICT,
            Json(json!({"error": "a job is already running", "job": job})),
        )
            .into_response();
    }

    let config_path = req
        .config_path
        .unwrap_or_else(|| state.ctx.config.config_path.clone());
    let args = req.args.unwrap_or_default();

    tokio::spawn(execute_and_broadcast(
        state.clone(),
        command,
        config_path,
        args,
    ));

    (
        StatusCode::ACCEPTED,
        Json(json!({"command": command.as_str()})),
    )
        .into_response()
}

/// Drive one command to completion, pushing output/completion/status
/// messages onto the broadcast stream.
pub(crate) async fn execute_and_broadcast(
    state: WebState,
    command: SnapraidCommand,
    config_path: String,
    args: Vec<String>,
) {
    let (tx, mut rx) = mpsc::channel::<String>(64);

    let events = state.events.clone();
    let name = command.to_string();
    let forward = tokio::spawn(async move {
        while let Some(chunk) = rx.recv().await {
            let _ = events.send(StreamMessage::Output {
                command: name.clone(),
                chunk,
                timestamp: Utc::now(),
            });
        }
    });

    let result = state
        .ctx
        .runner
        .execute(command, &config_path, &args, tx)
        .await;
    let _ = forward.await;

    match result {
        Ok(output) => {
            let _ = state.events.send(StreamMessage::Complete {
                command: command.to_string(),
                exit_code: output.exit_code,
                timestamp: Utc::now(),
            });
            if command.produces_status() {
                let status = parse::status::parse(&output.output);
                let _ = state.events.send(StreamMessage::Status {
                    command: command.to_string(),
                    status,
                    timestamp: Utc::now(),
                });
            }
        }
        Err(e) => {
            let _ = state.events.send(StreamMessage::Error {
                command: command.to_string(),
                error: e.to_string(),
                timestamp: Utc::now(),
            });
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AbortRequest {
    #[serde(default)]
    pub process_id: Option<String>,
}

pub async fn abort_command(
    State(state): State<WebState>,
    Json(req): Json<AbortRequest>,
) -> Response {
    let process_id = match req.process_id {
        Some(id) => id,
        None => match state.ctx.runner.current_job().await {
            Some(job) => job.process_id,
            None => {
                return (
                    StatusCode::NOT_FOUND,
                    Json(json!({"error": "no job running"})),
                )
                    .into_response();
            }
        },
    };

    if state.ctx.runner.abort(&process_id).await {
        Json(json!({"aborted": true, "processId": process_id})).into_response()
    } else {
        (
            StatusCode::NOT_FOUND,
            Json(json!({"error": format!("no job with process id {process_id}")})),
        )
            .into_response()
    }
}

pub async fn current_job(State(state): State<WebState>) -> Response {
    Json(state.ctx.runner.current_job().await).into_response()
}

pub async fn history(State(state): State<WebState>) -> Response {
    Json(state.ctx.runner.history().await).into_response()
}

pub async fn list_schedules(State(state): State<WebState>) -> Response {
    match state.ctx.scheduler.get_schedules().await {
        Ok(schedules) => Json(schedules).into_response(),
        Err(e) => scheduler_error(e),
    }
}

pub async fn create_schedule(
    State(state): State<WebState>,
    Json(input): Json<NewSchedule>,
) -> Response {
    match state.ctx.scheduler.create_schedule(input).await {
        Ok(schedule) => (StatusCode::CREATED, Json(schedule)).into_response(),
        Err(e) => scheduler_error(e),
    }
}

pub async fn get_schedule(State(state): State<WebState>, Path(id): Path<Uuid>) -> Response {
    match state.ctx.scheduler.get_schedule(id).await {
        Ok(schedule) => Json(schedule).into_response(),
        Err(e) => scheduler_error(e),
    }
}

pub async fn update_schedule(
    State(state): State<WebState>,
    Path(id): Path<Uuid>,
    Json(patch): Json<SchedulePatch>,
) -> Response {
    match state.ctx.scheduler.update_schedule(id, patch).await {
        Ok(schedule) => Json(schedule).into_response(),
        Err(e) => scheduler_error(e),
    }
}

pub async fn delete_schedule(State(state): State<WebState>, Path(id): Path<Uuid>) -> Response {
    match state.ctx.scheduler.delete_schedule(id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => scheduler_error(e),
    }
}

pub async fn next_runs(State(state): State<WebState>) -> Response {
    match state.ctx.scheduler.next_runs().await {
        Ok(map) => Json(map).into_response(),
        Err(e) => scheduler_error(e),
    }
}

fn scheduler_error(e: SchedulerError) -> Response {
    let code = match &e {
        SchedulerError::InvalidCron(_) => StatusCode::BAD_REQUEST,
        SchedulerError::NotFound(_) => StatusCode::NOT_FOUND,
        SchedulerError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (code, Json(json!({"error": e.to_string()}))).into_response()
}
