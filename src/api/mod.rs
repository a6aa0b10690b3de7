//! HTTP surface: enqueue, inspect, and cancel sessions, plus a live event stream.
//!
//! Routes are mounted on an axum router bound to `127.0.0.1:{http_port}`.
//! Errors map onto status codes via [`AppError`]'s `IntoResponse` impl and
//! always carry a `{"error": "..."}` body.

pub mod events;
pub mod handlers;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::GenerationDefaults;
use crate::orchestrator::scheduler::QueueScheduler;
use crate::pipeline::wire::ErrorBody;
use crate::{AppError, Result};

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct ApiState {
    /// The running queue.
    pub scheduler: QueueScheduler,
    /// Defaults applied to incoming enqueue requests.
    pub defaults: Arc<GenerationDefaults>,
}

impl ApiState {
    /// Bundle a scheduler with enqueue defaults.
    #[must_use]
    pub fn new(scheduler: QueueScheduler, defaults: GenerationDefaults) -> Self {
        Self {
            scheduler,
            defaults: Arc::new(defaults),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::InvalidTransition(_) => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = ErrorBody {
            error: self.message().to_owned(),
        };
        (status, Json(body)).into_response()
    }
}

/// Build the router with every route mounted.
pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/queue", get(handlers::queue_status))
        .route(
            "/sessions",
            get(handlers::list_sessions).post(handlers::create_session),
        )
        .route("/sessions/cancel-all", post(handlers::cancel_all))
        .route("/sessions/{id}", get(handlers::get_session))
        .route("/sessions/{id}/cancel", post(handlers::cancel_session))
        .route("/events", get(events::stream_events))
        .with_state(state)
}

/// Bind the HTTP listener on the loopback interface.
///
/// # Errors
///
/// Returns `AppError::Http` if the port cannot be bound.
pub async fn bind(port: u16) -> Result<TcpListener> {
    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    TcpListener::bind(addr)
        .await
        .map_err(|err| AppError::Http(format!("failed to bind HTTP on {addr}: {err}")))
}

/// Serve the router on `listener` until `ct` is cancelled.
///
/// # Errors
///
/// Returns `AppError::Http` if the server fails.
pub async fn serve(listener: TcpListener, state: ApiState, ct: CancellationToken) -> Result<()> {
    let local = listener
        .local_addr()
        .map_err(|err| AppError::Http(format!("listener has no local address: {err}")))?;
    info!(%local, "starting HTTP surface");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { ct.cancelled().await })
        .await
        .map_err(|err| AppError::Http(format!("HTTP server error: {err}")))?;

    info!("HTTP surface shut down");
    Ok(())
}
