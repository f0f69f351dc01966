//! Maps the engine's error taxonomies onto HTTP responses. Each crate keeps
//! its own `thiserror` enum (catalog, connectors, engine-core); this is the
//! one place that downcasts them into a status code and a JSON body.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use catalog::CatalogError;
use engine_core::error::EngineError;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Connector(#[from] connectors::ConnectorError),

    #[error("mirror '{0}' is not running")]
    MirrorNotRunning(String),
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::MirrorNotRunning(_) => StatusCode::CONFLICT,
            ApiError::Catalog(CatalogError::MirrorNotFound(_) | CatalogError::PeerNotFound(_)) => {
                StatusCode::NOT_FOUND
            }
            ApiError::Catalog(CatalogError::PeerInUse(_)) => StatusCode::CONFLICT,
            ApiError::Catalog(CatalogError::InvalidRow { .. }) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Catalog(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Engine(err) if !err.retryable() => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Engine(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Connector(_) => StatusCode::SERVICE_UNAVAILABLE,
        };
        (status, Json(ErrorBody { error: self.to_string() })).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
