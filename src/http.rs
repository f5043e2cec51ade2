//! Plumbing shared by the document API and the preview server: JSON error
//! responses, request logging and the serve loop.

use crate::error::{Error, Result};
use axum::{
    body::Body,
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json, Router,
};
use log::{error, info, warn};
use serde::Serialize;
use std::net::{SocketAddr, ToSocketAddrs};
use std::time::Instant;

pub mod codes {
    pub const NOT_FOUND: &str = "not_found";
    pub const INTERNAL: &str = "internal_error";
}

#[derive(Debug, Serialize)]
pub struct ApiErrorBody {
    pub error: ApiErrorMessage,
}

#[derive(Debug, Serialize)]
pub struct ApiErrorMessage {
    pub code: String,
    pub message: String,
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// An error response. Built from library errors at the request boundary.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self { status, code, message: message.into() }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, codes::NOT_FOUND, message)
    }

    pub fn internal() -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, codes::INTERNAL, "An unexpected error occurred")
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        match err {
            Error::NotFoundError(_) => ApiError::not_found(err.to_string()),
            other => {
                // Internal details stay in the log, not in the response.
                error!("{other}");
                ApiError::internal()
            }
        }
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(err: tokio::task::JoinError) -> Self {
        error!("request task failed: {err}");
        ApiError::internal()
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ApiErrorBody {
            error: ApiErrorMessage { code: self.code.to_string(), message: self.message },
        };
        (self.status, Json(body)).into_response()
    }
}

/// Logs one line per request with its status and latency.
pub async fn log_responses(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let start = Instant::now();

    let response = next.run(request).await;
    let status = response.status();
    let elapsed_ms = start.elapsed().as_millis();

    if status.is_server_error() {
        error!("{method} {path} -> {} ({elapsed_ms} ms)", status.as_u16());
    } else if status.is_client_error() {
        warn!("{method} {path} -> {} ({elapsed_ms} ms)", status.as_u16());
    } else {
        info!("{method} {path} -> {} ({elapsed_ms} ms)", status.as_u16());
    }
    response
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}

/// Binds `addr` and serves `router` until Ctrl-C.
pub async fn serve_router(router: Router, addr: SocketAddr) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| Error::ServerError(format!("cannot bind {addr}: {e}")))?;
    info!("Listening on http://{addr}");
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| Error::ServerError(e.to_string()))
}

/// Resolves `host` and `port` into a socket address. IPv6 hosts may be given
/// with or without brackets.
pub fn socket_addr(host: &str, port: u16) -> Result<SocketAddr> {
    let bare = host.strip_prefix('[').and_then(|h| h.strip_suffix(']')).unwrap_or(host);
    let invalid = |detail: String| {
        Error::ConfigError(format!("invalid listen address '{host}' port {port}: {detail}"))
    };
    (bare, port)
        .to_socket_addrs()
        .map_err(|e| invalid(e.to_string()))?
        .next()
        .ok_or_else(|| invalid("host resolves to no address".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_socket_addr_forms() {
        assert_eq!(socket_addr("127.0.0.1", 8080).unwrap().to_string(), "127.0.0.1:8080");
        assert_eq!(socket_addr("0.0.0.0", 80).unwrap().to_string(), "0.0.0.0:80");
        assert_eq!(socket_addr("::1", 8000).unwrap().to_string(), "[::1]:8000");
        assert_eq!(socket_addr("[::1]", 8000).unwrap().to_string(), "[::1]:8000");
    }

    #[test]
    fn test_socket_addr_rejects_garbage() {
        assert!(matches!(socket_addr("[[::1]]", 8000), Err(Error::ConfigError(_))));
        assert!(matches!(socket_addr("not a host", 8000), Err(Error::ConfigError(_))));
    }

    #[test]
    fn test_not_found_maps_to_404() {
        let err: ApiError = Error::NotFoundError("x".to_string()).into();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
        let err: ApiError = Error::ServerError("boom".to_string()).into();
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
