//! Cross-cutting request wrappers.
//!
//! [`access_log`] records every request, and [`handle_panic`] turns a
//! panicking handler into a 500 for `CatchPanicLayer`. The panic layer sits
//! outside the access log, so a panic unwinds through the log guard first and
//! is then contained.

use std::any::Any;
use std::net::SocketAddr;
use std::time::Instant;

use axum::extract::{ConnectInfo, Request};
use axum::http::{Method, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tracing::{error, info, warn};

/// Logs method, path, status, duration and remote address for each request.
///
/// The line is written when the request finishes, including when the handler
/// panics or the client disconnects and the future is dropped.
pub async fn access_log(request: Request, next: Next) -> Response {
    let mut entry = AccessLogEntry {
        method: request.method().clone(),
        path: request.uri().path().to_owned(),
        remote_addr: request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr),
        started: Instant::now(),
        status: None,
    };

    let response = next.run(request).await;
    entry.status = Some(response.status());
    response
}

struct AccessLogEntry {
    method: Method,
    path: String,
    remote_addr: Option<SocketAddr>,
    started: Instant,
    status: Option<StatusCode>,
}

impl Drop for AccessLogEntry {
    fn drop(&mut self) {
        let duration_ms = self.started.elapsed().as_secs_f64() * 1000.0;
        let remote_addr = match self.remote_addr {
            Some(addr) => addr.to_string(),
            None => "-".to_string(),
        };

        match self.status {
            Some(status) => info!(
                method = %self.method,
                path = %self.path,
                status = status.as_u16(),
                duration_ms,
                remote_addr = %remote_addr,
                "Request completed"
            ),
            None => warn!(
                method = %self.method,
                path = %self.path,
                duration_ms,
                remote_addr = %remote_addr,
                "Request did not complete"
            ),
        }
    }
}

/// Response for a handler that panicked.
///
/// The panic message is logged but never sent to the client.
pub fn handle_panic(panic: Box<dyn Any + Send + 'static>) -> Response {
    let message = if let Some(s) = panic.downcast_ref::<String>() {
        s.as_str()
    } else if let Some(s) = panic.downcast_ref::<&str>() {
        s
    } else {
        "unknown panic payload"
    };

    error!(panic = message, "Request handler panicked");

    (StatusCode::INTERNAL_SERVER_ERROR, "internal server error").into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn panic_response_hides_message() {
        let response = handle_panic(Box::new("secret detail".to_string()));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn panic_with_static_str_payload() {
        let response = handle_panic(Box::new("boom"));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn panic_with_opaque_payload() {
        let response = handle_panic(Box::new(42_u32));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}

#[cfg(test)]
mod access_log_tests {
    use super::*;
    use std::time::Duration;

    use axum::Router;
    use axum::body::Body;
    use axum::routing::get;
    use tower::ServiceExt;
    use tracing_test::traced_test;

    use crate::server::{HEALTH_PATH, health_handler, with_middleware};

    async fn boom() -> StatusCode {
        panic!("handler exploded")
    }

    async fn stall() -> StatusCode {
        std::future::pending().await
    }

    fn app() -> Router {
        with_middleware(
            Router::new()
                .route(HEALTH_PATH, get(health_handler))
                .route("/boom", get(boom))
                .route("/stall", get(stall)),
        )
    }

    fn get_request(path: &str) -> axum::http::Request<Body> {
        axum::http::Request::builder()
            .uri(path)
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    #[traced_test]
    async fn completed_request_is_logged() {
        let response = app().oneshot(get_request(HEALTH_PATH)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        assert!(logs_contain("Request completed"));
        assert!(logs_contain("method=GET"));
        assert!(logs_contain("path=/_/health"));
        assert!(logs_contain("status=200"));
        assert!(logs_contain("duration_ms="));
        assert!(logs_contain("remote_addr=-"));
    }

    #[tokio::test]
    #[traced_test]
    async fn remote_address_comes_from_connect_info() {
        let mut request = get_request(HEALTH_PATH);
        request
            .extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([192, 0, 2, 1], 4242))));

        app().oneshot(request).await.unwrap();

        assert!(logs_contain("remote_addr=192.0.2.1:4242"));
    }

    #[tokio::test]
    #[traced_test]
    async fn panicking_request_is_still_logged() {
        let response = app().oneshot(get_request("/boom")).await.unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        assert!(logs_contain("Request did not complete"));
        assert!(logs_contain("path=/boom"));
        assert!(logs_contain("Request handler panicked"));
        assert!(!logs_contain("Request completed"));
    }

    #[tokio::test]
    #[traced_test]
    async fn dropped_request_is_still_logged() {
        let result =
            tokio::time::timeout(Duration::from_millis(20), app().oneshot(get_request("/stall")))
                .await;
        assert!(result.is_err(), "stalled handler should not respond");

        assert!(logs_contain("Request did not complete"));
        assert!(logs_contain("path=/stall"));
    }
}
