// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP server and request handling.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use abacus_adapters::{CounterStore, StoreStats};
use abacus_engine::{Coordinator, CounterError, Sleeper};
use axum::extract::{Request, State};
use axum::http::{header, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::protocol::{
    self, AddResponse, ErrorResponse, HealthResponse, HealthStatus, NumberInput, ResetResponse,
    ServiceInfo, SumResponse, SERVICE_NAME,
};

/// Seconds a client should wait after contention exhaustion
const RETRY_AFTER_SECS: &str = "1";

/// Shared handler state
pub struct AppState<S, Z> {
    pub coordinator: Arc<Coordinator<S, Z>>,
    pub node_id: Arc<str>,
}

impl<S, Z> AppState<S, Z> {
    pub fn new(coordinator: Arc<Coordinator<S, Z>>, node_id: impl Into<Arc<str>>) -> Self {
        Self {
            coordinator,
            node_id: node_id.into(),
        }
    }
}

impl<S, Z> Clone for AppState<S, Z> {
    fn clone(&self) -> Self {
        Self {
            coordinator: Arc::clone(&self.coordinator),
            node_id: Arc::clone(&self.node_id),
        }
    }
}

/// Build the router for all endpoints
pub fn router<S, Z>(state: AppState<S, Z>) -> Router
where
    S: CounterStore,
    Z: Sleeper,
{
    let node_id = Arc::clone(&state.node_id);
    Router::new()
        .route("/", get(root::<S, Z>))
        .route("/abacus/number", post(add_number::<S, Z>))
        .route("/abacus/sum", get(get_sum::<S, Z>).delete(reset_sum::<S, Z>))
        .route("/health", get(health::<S, Z>))
        .layer(middleware::from_fn_with_state(node_id, log_requests))
        .with_state(state)
}

/// Serve until `shutdown` resolves, then drain in-flight requests
pub async fn serve<S, Z>(
    listener: TcpListener,
    state: AppState<S, Z>,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> std::io::Result<()>
where
    S: CounterStore,
    Z: Sleeper,
{
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
}

/// Counter errors mapped onto HTTP responses
#[derive(Debug)]
pub struct ApiError(pub CounterError);

impl From<CounterError> for ApiError {
    fn from(e: CounterError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorResponse {
            error: self.0.kind().to_string(),
            detail: self.0.to_string(),
        });

        match &self.0 {
            CounterError::StoreUnavailable(e) => {
                error!(error = %e, "store unavailable");
                (StatusCode::SERVICE_UNAVAILABLE, body).into_response()
            }
            CounterError::ContentionExhausted { attempts } => {
                warn!(attempts, "rejecting request under contention");
                (
                    StatusCode::TOO_MANY_REQUESTS,
                    [(header::RETRY_AFTER, RETRY_AFTER_SECS)],
                    body,
                )
                    .into_response()
            }
            CounterError::Overflow { .. } => {
                (StatusCode::UNPROCESSABLE_ENTITY, body).into_response()
            }
        }
    }
}

async fn root<S, Z>(State(state): State<AppState<S, Z>>) -> Json<ServiceInfo>
where
    S: CounterStore,
    Z: Sleeper,
{
    Json(ServiceInfo {
        service: SERVICE_NAME.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        node_id: state.node_id.to_string(),
        endpoints: protocol::endpoints(),
    })
}

async fn add_number<S, Z>(
    State(state): State<AppState<S, Z>>,
    Json(input): Json<NumberInput>,
) -> Result<Json<AddResponse>, ApiError>
where
    S: CounterStore,
    Z: Sleeper,
{
    let new_sum = state.coordinator.add(input.number).await?;
    Ok(Json(AddResponse {
        new_sum,
        added: input.number,
        timestamp: protocol::timestamp(),
        node_id: state.node_id.to_string(),
    }))
}

async fn get_sum<S, Z>(State(state): State<AppState<S, Z>>) -> Result<Json<SumResponse>, ApiError>
where
    S: CounterStore,
    Z: Sleeper,
{
    let sum = state.coordinator.get().await?;
    Ok(Json(SumResponse {
        sum,
        timestamp: protocol::timestamp(),
        node_id: state.node_id.to_string(),
    }))
}

async fn reset_sum<S, Z>(
    State(state): State<AppState<S, Z>>,
) -> Result<Json<ResetResponse>, ApiError>
where
    S: CounterStore,
    Z: Sleeper,
{
    state.coordinator.reset().await?;
    Ok(Json(ResetResponse {
        message: "Sum successfully reset to 0".to_string(),
        timestamp: protocol::timestamp(),
        node_id: state.node_id.to_string(),
    }))
}

/// Always 200; reachability is reported in the body
async fn health<S, Z>(State(state): State<AppState<S, Z>>) -> Json<HealthResponse>
where
    S: CounterStore,
    Z: Sleeper,
{
    let (store_connected, current_sum, stats) = match state.coordinator.get().await {
        Ok(sum) => (true, sum, state.coordinator.stats().await),
        Err(e) => {
            warn!(error = %e, "health check could not reach store");
            (false, -1, StoreStats::new())
        }
    };

    Json(HealthResponse {
        status: if store_connected {
            HealthStatus::Healthy
        } else {
            HealthStatus::Unhealthy
        },
        node_id: state.node_id.to_string(),
        store_connected,
        current_sum,
        stats,
    })
}

async fn log_requests(State(node_id): State<Arc<str>>, request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let start = Instant::now();

    let response = next.run(request).await;

    info!(
        %method,
        path = %path,
        status = response.status().as_u16(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        node_id = %node_id,
        "request completed"
    );
    response
}

#[cfg(test)]
#[path = "server_tests.rs"]
mod tests;
