//! Health check endpoint for liveness probes.
//!
//! Returns 200 with an empty body whenever the server is accepting
//! connections. It does not reach out to GitHub.

use axum::http::StatusCode;

/// Health check handler.
///
/// ```ignore
/// GET /_/health HTTP/1.1
///
/// HTTP/1.1 200 OK
/// content-length: 0
/// ```
pub async fn health_handler() -> StatusCode {
    StatusCode::OK
}
