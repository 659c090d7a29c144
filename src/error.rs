use actix_web::{error::BlockingError, http::StatusCode, HttpResponse, ResponseError};
use thiserror::Error;

use crate::config::ConfigError;
use crate::db::StoreError;
use crate::model::ErrorRes;

/// Failures surfaced by the HTTP handlers. Every variant renders as `{"error": ...}`.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("{0}")]
  BadRequest(String),
  #[error("Invalid todo ID")]
  NotFound,
  #[error(transparent)]
  Store(StoreError),
  #[error("blocking task failed: {0}")]
  Blocking(#[from] BlockingError),
}

impl From<StoreError> for ApiError {
  fn from(err: StoreError) -> Self {
    match err {
      StoreError::NotFound => ApiError::NotFound,
      other => ApiError::Store(other),
    }
  }
}

impl ResponseError for ApiError {
  fn status_code(&self) -> StatusCode {
    match self {
      ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
      ApiError::NotFound => StatusCode::NOT_FOUND,
      ApiError::Store(_) | ApiError::Blocking(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
  }

  fn error_response(&self) -> HttpResponse {
    if self.status_code().is_server_error() {
      tracing::error!(error = %self, "request failed");
    }
    HttpResponse::build(self.status_code()).json(ErrorRes {
      error: self.to_string(),
    })
  }
}

/// Anything that stops the process from coming up or keeps it from serving.
#[derive(Debug, Error)]
pub enum StartupError {
  #[error("configuration: {0}")]
  Config(#[from] ConfigError),
  #[error("database: {0}")]
  Store(#[from] StoreError),
  #[error("server: {0}")]
  Server(#[from] std::io::Error),
}
