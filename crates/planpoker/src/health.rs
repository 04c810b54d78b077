//! HTTP liveness endpoint.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use tokio::net::TcpListener;

use crate::PlanpokerError;

#[derive(Debug, Serialize)]
struct Health {
    status: &'static str,
    environment: String,
}

/// `GET /health` → `{"status": "healthy", "environment": "<env>"}`.
pub fn router(environment: &str) -> Router {
    Router::new()
        .route("/health", get(health))
        .with_state(Arc::<str>::from(environment))
}

async fn health(State(environment): State<Arc<str>>) -> Json<Health> {
    Json(Health {
        status: "healthy",
        environment: environment.to_string(),
    })
}

/// Serves [`router`] on `listener` until the task is dropped.
///
/// # Errors
/// Returns [`PlanpokerError::Io`] if the listener fails.
pub async fn serve(listener: TcpListener, environment: &str) -> Result<(), PlanpokerError> {
    let addr = listener.local_addr()?;
    tracing::info!(%addr, "health endpoint listening");
    axum::serve(listener, router(environment)).await?;
    Ok(())
}
