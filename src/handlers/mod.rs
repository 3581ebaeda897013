//! HTTP request handlers for the covercat API.
//!
//! Catalog queries and decoding block, so every handler moves its work onto
//! the blocking pool with [`run_blocking`].

pub mod catalog;
pub mod heartbeat;
pub mod image;
pub mod params;

pub use catalog::{coverages_handler, series_handler};
pub use heartbeat::heartbeat_handler;
pub use image::image_handler;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use crate::error::{CovercatError, Result};
use crate::logging::{create_http_trace_layer, log_request_error};
use crate::state::AppState;

/// Every endpoint, with request tracing and permissive CORS.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/heartbeat", get(heartbeat_handler))
        .route("/series", get(series_handler))
        .route("/coverages", get(coverages_handler))
        .route("/image", get(image_handler))
        .layer(create_http_trace_layer())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Run `f` on the blocking thread pool.
pub async fn run_blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| CovercatError::Server {
            message: format!("Worker task failed: {}", e),
        })?
}

/// HTTP status reported for `error`.
pub fn status_of(error: &CovercatError) -> StatusCode {
    match error {
        CovercatError::InvalidParameter { .. } => StatusCode::BAD_REQUEST,
        CovercatError::DataNotFound { .. } => StatusCode::NOT_FOUND,
        e if e.is_io() => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Log `error` and turn it into a JSON error response.
pub fn error_response(
    error: CovercatError,
    endpoint: &str,
    request_id: &str,
    params: Option<&str>,
) -> Response {
    log_request_error(&error, endpoint, request_id, params);
    (
        status_of(&error),
        Json(serde_json::json!({
            "error": error.to_string(),
            "request_id": request_id
        })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;
    use crate::config::Config;
    use crate::coverage::CoverageContext;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use tower::ServiceExt;

    fn app() -> Router {
        let config = Config::default();
        let catalog = Catalog::open_in_memory(&config).unwrap();
        catalog
            .with_connection(|c| {
                c.execute_batch("INSERT INTO series (id, name) VALUES (1, 'SST');")?;
                Ok(())
            })
            .unwrap();
        router(AppState::new_shared(
            config,
            Arc::new(catalog),
            Arc::new(CoverageContext::default()),
        ))
    }

    async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn test_router_serves_the_catalog() {
        let (status, series) = get_json(app(), "/series").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(series[0]["name"], "SST");

        let (status, list) = get_json(app(), "/coverages?series=SST").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(list["count"], 0);

        let (status, error) = get_json(app(), "/image?series=SST").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(error["error"].as_str().unwrap().contains("SST"));

        let (status, _) = get_json(app(), "/coverages?series=SST&resolution=-1").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_status_of() {
        let invalid = CovercatError::InvalidParameter {
            param: "bbox".to_string(),
            message: "bad".to_string(),
        };
        assert_eq!(status_of(&invalid), StatusCode::BAD_REQUEST);

        let missing = CovercatError::DataNotFound {
            message: "no series".to_string(),
        };
        assert_eq!(status_of(&missing), StatusCode::NOT_FOUND);

        let io = CovercatError::Io(std::io::Error::new(std::io::ErrorKind::NotFound, "gone"));
        assert_eq!(status_of(&io), StatusCode::BAD_GATEWAY);

        let illegal = CovercatError::illegal_record("formats", "duplicate");
        assert_eq!(status_of(&illegal), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_run_blocking_propagates_errors() {
        assert_eq!(run_blocking(|| Ok(2 + 2)).await.unwrap(), 4);
        let result: Result<()> = run_blocking(|| {
            Err(CovercatError::DataNotFound {
                message: "nothing".to_string(),
            })
        })
        .await;
        assert!(matches!(result, Err(CovercatError::DataNotFound { .. })));
    }
}
