//! HTTP server for the estimate bot.
//!
//! # Endpoints
//!
//! - `POST /wh` - Accepts GitHub webhook deliveries (returns 200 once verified)
//! - `GET /_/health` - Returns 200 if the server is running
//!
//! Shutdown is cooperative: cancelling the token stops the listener and gives
//! in-flight requests a bounded grace period before the server gives up on
//! them.

use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::http::{HeaderValue, StatusCode, header};
use axum::routing::{get, post};
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::task::JoinError;
use tokio_util::sync::CancellationToken;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::timeout::TimeoutLayer;
use tracing::{info, warn};

use crate::config::Config;
use crate::github::{AppClientFactory, AppKeyError, CachedClientFactory, InstallationClientFactory};

pub mod health;
pub mod middleware;
pub mod webhook;

pub use health::health_handler;
pub use webhook::{Outcome, process_event, webhook_handler};

/// Route for webhook deliveries.
pub const WEBHOOK_PATH: &str = "/wh";
/// Route for the liveness probe.
pub const HEALTH_PATH: &str = "/_/health";

/// Upper bound on handling a single request. Webhook processing bounds its
/// own outbound calls well below this, so an authenticated delivery is
/// answered before the 408 fires.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);
/// Largest accepted request body. GitHub caps payloads at 25 MiB, but issue
/// events are far smaller.
pub const MAX_BODY_BYTES: usize = 1024 * 1024;
/// How long in-flight requests get to finish after shutdown starts.
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Shared application state.
///
/// This is passed to all handlers via Axum's `State` extractor.
pub struct AppState<F> {
    inner: Arc<AppStateInner<F>>,
}

struct AppStateInner<F> {
    /// Webhook secret for HMAC-SHA256 signature verification.
    webhook_secret: Vec<u8>,

    /// Source of installation-scoped GitHub clients.
    factory: F,
}

impl<F> AppState<F> {
    pub fn new(webhook_secret: impl Into<Vec<u8>>, factory: F) -> Self {
        AppState {
            inner: Arc::new(AppStateInner {
                webhook_secret: webhook_secret.into(),
                factory,
            }),
        }
    }

    /// Returns the webhook secret.
    pub fn webhook_secret(&self) -> &[u8] {
        &self.inner.webhook_secret
    }

    /// Returns the client factory.
    pub fn factory(&self) -> &F {
        &self.inner.factory
    }
}

// Manual impl: cloning the handle must not require `F: Clone`.
impl<F> Clone for AppState<F> {
    fn clone(&self) -> Self {
        AppState {
            inner: Arc::clone(&self.inner),
        }
    }
}

/// Builds the axum Router with all endpoints and middleware.
pub fn build_router<F>(app_state: AppState<F>) -> Router
where
    F: InstallationClientFactory + Send + Sync + 'static,
{
    let routes = Router::new()
        .route(WEBHOOK_PATH, post(webhook_handler::<F>))
        .route(HEALTH_PATH, get(health_handler))
        .with_state(app_state);

    with_middleware(routes)
}

/// Wraps `router` in the middleware stack.
///
/// Layers listed last run first, so from the outside in: panic containment,
/// access logging, security headers, request timeout, body limit.
pub fn with_middleware(router: Router) -> Router {
    router
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            REQUEST_TIMEOUT,
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_XSS_PROTECTION,
            HeaderValue::from_static("0"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(axum::middleware::from_fn(middleware::access_log))
        .layer(CatchPanicLayer::custom(middleware::handle_panic))
}

/// How the server stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownKind {
    /// All in-flight requests finished inside the grace period.
    Graceful,
    /// The grace period ran out with requests still in flight.
    Forced,
}

/// Errors that stop the server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The App key or client could not be set up.
    #[error(transparent)]
    Credentials(#[from] AppKeyError),

    /// The listener could not be bound.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// The accept loop failed.
    #[error("server error: {0}")]
    Serve(#[source] std::io::Error),

    /// The server task panicked or was cancelled.
    #[error("server task failed: {0}")]
    Task(#[from] JoinError),
}

/// Serves `router` on `listener` until `shutdown` is cancelled.
///
/// After cancellation the listener is closed at once and in-flight requests
/// get `grace` to finish. If any are still running after that, the accept
/// task is aborted and [`ShutdownKind::Forced`] is returned. Connection tasks
/// already spawned by axum are not aborted; they keep running until they
/// finish or the runtime is dropped, which for the binary is right after
/// this returns.
pub async fn serve(
    listener: TcpListener,
    router: Router,
    shutdown: CancellationToken,
    grace: Duration,
) -> Result<ShutdownKind, ServerError> {
    let signal = shutdown.clone();
    let server = axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move { signal.cancelled().await });

    let mut task = tokio::spawn(server.into_future());

    tokio::select! {
        result = &mut task => {
            result?.map_err(ServerError::Serve)?;
            return Ok(ShutdownKind::Graceful);
        }
        () = shutdown.cancelled() => {}
    }

    info!(
        grace_ms = grace.as_millis() as u64,
        "Shutdown requested, draining in-flight requests"
    );

    match tokio::time::timeout(grace, &mut task).await {
        Ok(result) => {
            result?.map_err(ServerError::Serve)?;
            info!("Server stopped gracefully");
            Ok(ShutdownKind::Graceful)
        }
        Err(_) => {
            warn!(
                grace_ms = grace.as_millis() as u64,
                "Grace period exceeded, forcing shutdown"
            );
            task.abort();
            Ok(ShutdownKind::Forced)
        }
    }
}

/// Runs the bot with `config` until `shutdown` is cancelled.
pub async fn run(config: Config, shutdown: CancellationToken) -> Result<ShutdownKind, ServerError> {
    let factory = AppClientFactory::new(
        config.app_id,
        &config.private_key_path,
        config.api_base_url.as_deref(),
    )?;
    let app_state = AppState::new(
        config.webhook_secret.clone(),
        CachedClientFactory::new(factory),
    );

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| ServerError::Bind { addr, source })?;

    info!(%addr, app_id = %config.app_id, "Listening");

    serve(listener, build_router(app_state), shutdown, SHUTDOWN_GRACE).await
}
