//! HTTP surface of the payment service.

pub mod error;
pub mod handlers;

use crate::application::{CreationCoordinator, Paginator, StatusWorker};
use crate::error::{PaymentError, Result};
use axum::Router;
use axum::routing::get;
use std::future::{Future, IntoFuture};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub coordinator: Arc<CreationCoordinator>,
    pub paginator: Arc<Paginator>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/v1/health", get(handlers::health))
        .route(
            "/v1/payments",
            get(handlers::list_payments).post(handlers::create_payment),
        )
        .route("/v1/payments/{id}", get(handlers::get_payment))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

/// Serves the API with the status worker running beside it.
///
/// Returns once `shutdown` resolves and in-flight requests finish. If the
/// worker task ends first the server is dropped and the error names why.
pub async fn serve<F>(
    listener: TcpListener,
    state: AppState,
    worker: StatusWorker,
    shutdown: F,
) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let mut worker_task = tokio::spawn(async move { worker.run().await });
    let server = axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .into_future();

    tokio::select! {
        served = server => {
            worker_task.abort();
            served?;
            Ok(())
        }
        joined = &mut worker_task => {
            let reason = match joined {
                Ok(()) => "exited".to_string(),
                Err(e) if e.is_panic() => "panicked".to_string(),
                Err(e) => e.to_string(),
            };
            tracing::error!(%reason, "Status worker stopped, shutting down");
            Err(PaymentError::WorkerStopped(reason))
        }
    }
}
