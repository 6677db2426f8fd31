//! Router assembly and the HTTP server lifecycle.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};
use tracing::Span;

use crate::facade::QueryFacade;
use crate::handlers::{self, ApiState};

/// Upper bound on handling a single request.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Build the `/api` router over `facade`.
pub fn router(facade: Arc<dyn QueryFacade>, span: Span) -> Router {
    let state = ApiState::new(facade, span);
    Router::new()
        .route(
            "/api/block",
            get(handlers::current_block).fallback(handlers::method_not_allowed),
        )
        .route(
            "/api/subscribe",
            post(handlers::subscribe).fallback(handlers::method_not_allowed),
        )
        .route(
            "/api/transactions",
            get(handlers::transactions).fallback(handlers::method_not_allowed),
        )
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
        .with_state(state)
}

/// Serve the API on `listener` until `cancel` fires, then drain in-flight requests.
pub async fn serve(
    listener: TcpListener,
    facade: Arc<dyn QueryFacade>,
    span: Span,
    cancel: CancellationToken,
) -> std::io::Result<()> {
    let local = listener.local_addr()?;
    tracing::info!(parent: &span, addr = %local, "HTTP server listening");

    let app = router(facade, span.clone());
    axum::serve(listener, app)
        .with_graceful_shutdown(cancel.cancelled_owned())
        .await?;

    tracing::info!(parent: &span, "HTTP server stopped");
    Ok(())
}
