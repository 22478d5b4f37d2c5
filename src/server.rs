use std::sync::Arc;

use anyhow::Result;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::config::{API_KEY_VAR, Config};
use crate::pool::WorkerPool;
use crate::runner::{AgentJob, AgentRunner};
use crate::types::{AgentRequest, AgentResponse};

/// Shared handler state. Cloning is cheap; nothing in here is mutated after
/// startup except the pool's own queue.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub pool: Arc<WorkerPool>,
    pub runner: Arc<dyn AgentRunner>,
}

impl AppState {
    pub fn new(config: Arc<Config>, pool: Arc<WorkerPool>, runner: Arc<dyn AgentRunner>) -> Self {
        Self {
            config,
            pool,
            runner,
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/agent/run", post(run_agent))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn serve(state: AppState) -> Result<()> {
    let addr = format!("0.0.0.0:{}", state.config.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("listening on http://{addr}");
    axum::serve(listener, build_router(state)).await?;
    Ok(())
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "healthy", "service": "nova-act-api" }))
}

/// Run one agent act. Failures from the engine come back as a 200 with
/// `success=false` and `error` set; only a missing credential is an HTTP
/// error, and it short-circuits before any work is scheduled.
async fn run_agent(State(state): State<AppState>, Json(request): Json<AgentRequest>) -> Response {
    let Some(api_key) = state.config.api_key.clone() else {
        error!("{API_KEY_VAR} is not set, refusing agent run");
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "detail": format!("{API_KEY_VAR} environment variable not set") })),
        )
            .into_response();
    };

    if request.starting_page.trim().is_empty() || request.instructions.trim().is_empty() {
        return Json(AgentResponse::failed(
            "starting_page and instructions must be non-empty",
        ))
        .into_response();
    }

    info!(
        starting_page = %request.starting_page,
        headless = request.headless,
        "agent run requested"
    );

    let job = AgentJob {
        starting_page: request.starting_page,
        instructions: request.instructions,
        headless: request.headless,
        api_key,
    };
    let runner = Arc::clone(&state.runner);

    // The only suspension point on the request path: the closure blocks a
    // pool worker while this task yields back to the scheduler. If the client
    // disconnects, only the wait ends; the session runs to completion.
    let result = state.pool.submit(move || runner.run(job)).await;

    let response = match result {
        Ok(Ok(outcome)) => {
            info!(steps = outcome.steps_executed, "agent run completed");
            AgentResponse::completed(outcome)
        }
        Ok(Err(err)) => {
            error!("agent run failed: {err:#}");
            AgentResponse::failed(format!("{err:#}"))
        }
        Err(_) => {
            error!("agent worker terminated before returning a result");
            AgentResponse::failed("agent worker terminated before returning a result")
        }
    };

    Json(response).into_response()
}
