//! Web surface for the dashboard.
//!
//! Thin orchestration over the runner and scheduler: JSON endpoints for
//! triggering and managing work, and a WebSocket that pushes live command
//! output to every connected client.
//!
//! ## Endpoints
//!
//! - `POST /api/run` - start a snapraid command
//! - `POST /api/abort` - abort the in-flight command
//! - `GET /api/job` - current job, if any
//! - `GET /api/history` - completed invocations
//! - `GET/POST /api/schedules`, `GET/PATCH/DELETE /api/schedules/{id}`
//! - `GET /api/schedules/next-runs`
//! - `WS /ws` - push stream of [`StreamMessage`]

mod routes;
mod websocket;

use axum::{
    Router,
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::net::SocketAddr;
use tokio::sync::broadcast;

use crate::context::AppContext;
use crate::core::models::SnapRaidStatus;

/// One message on the push stream. The `status` variant is only emitted
/// after a completed `status` or `diff` run.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StreamMessage {
    #[serde(rename_all = "camelCase")]
    Output {
        command: String,
        chunk: String,
        timestamp: DateTime<Utc>,
    },
    #[serde(rename_all = "camelCase")]
    Complete {
        command: String,
        exit_code: Option<i32>,
        timestamp: DateTime<Utc>,
    },
    #[serde(rename_all = "camelCase")]
    Error {
        command: String,
        error: String,
        timestamp: DateTime<Utc>,
    },
    #[serde(rename_all = "camelCase")]
    Status {
        command: String,
        status: SnapRaidStatus,
        timestamp: DateTime<Utc>,
    },
}

/// Shared state for the web server.
#[derive(Clone)]
pub struct WebState {
    pub ctx: AppContext,
    pub events: broadcast::Sender<StreamMessage>,
}

/// Web server hosting the dashboard API and WebSocket stream.
pub struct WebServer {
    bind_addr: SocketAddr,
    state: WebState,
}

impl WebServer {
    pub fn new(ctx: AppContext, events: broadcast::Sender<StreamMessage>) -> Self {
        let bind_addr = SocketAddr::from(([0, 0, 0, 0], ctx.config.http_port));
        Self {
            bind_addr,
            state: WebState { ctx, events },
        }
    }

    /// Serve until ctrl-c.
    pub async fn start(&self) -> anyhow::Result<()> {
        let app = self.router();

        let listener = tokio::net::TcpListener::bind(self.bind_addr).await?;
        tracing::info!(addr = %self.bind_addr, "Web dashboard listening");

        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = tokio::signal::ctrl_c().await;
                tracing::info!("Shutting down");
            })
            .await?;

        Ok(())
    }

    fn router(&self) -> Router {
        Router::new()
            .route("/api/run", post(routes::run_command))
            .route("/api/abort", post(routes::abort_command))
            .route("/api/job", get(routes::current_job))
            .route("/api/history", get(routes::history))
            .route(
                "/api/schedules",
                get(routes::list_schedules).post(routes::create_schedule),
            )
            .route("/api/schedules/next-runs", get(routes::next_runs))
            .route(
                "/api/schedules/{id}",
                get(routes::get_schedule)
                    .patch(routes::update_schedule)
                    .delete(routes::delete_schedule),
            )
            .route("/ws", get(websocket::ws_handler))
            .with_state(self.state.clone())
    }
}
